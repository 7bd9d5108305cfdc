use {
    async_trait::async_trait,
    reqwest::{StatusCode, multipart},
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    tracing::{debug, info, warn},
};

use wxrelay_platforms::{
    Credentials, DeliveryFailure, DeliveryReceipt, DeliveryRequest, Error, PlatformAccount,
    PlatformKind, PlatformOutbound, Result, http, media,
};

/// Posts statuses to the instance each account lives on.
pub struct MastodonOutbound {
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct MediaAttachment {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Status {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    error: Option<String>,
}

impl MastodonOutbound {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn upload_media(
        &self,
        server: &str,
        token: &Secret<String>,
        url: &str,
    ) -> Result<String> {
        let payload = media::fetch_media(&self.http, url).await?;
        let part = multipart::Part::bytes(payload.bytes)
            .file_name(payload.file_name)
            .mime_str(&payload.content_type)?;
        let form = multipart::Form::new().part("file", part);

        let resp = self
            .http
            .post(format!("{server}/api/v2/media"))
            .bearer_auth(token.expose_secret())
            .multipart(form)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::media(url, format!("upload failed ({status}): {body}")));
        }
        let attachment: MediaAttachment = resp.json().await?;
        Ok(attachment.id)
    }
}

/// Gone (410) means the account was deleted on its instance.
fn classify(status: StatusCode, body: &str) -> DeliveryFailure {
    let detail = serde_json::from_str::<ApiError>(body)
        .ok()
        .and_then(|e| e.error)
        .unwrap_or_else(|| body.to_string());
    if status == StatusCode::GONE {
        return DeliveryFailure::disable("410", detail);
    }
    http::status_failure(status, &detail)
}

#[async_trait]
impl PlatformOutbound for MastodonOutbound {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Mastodon
    }

    async fn deliver(
        &self,
        account: &PlatformAccount,
        request: &DeliveryRequest,
    ) -> std::result::Result<DeliveryReceipt, DeliveryFailure> {
        let Credentials::Mastodon {
            server,
            access_token,
        } = &account.credentials
        else {
            return Err(DeliveryFailure::ignore(
                "credentials",
                format!(
                    "account {} has {} credentials",
                    account.id,
                    account.credentials.kind()
                ),
            ));
        };
        let server = server.trim_end_matches('/');

        let media_id = match request.media_url.as_deref() {
            Some(url) => match self.upload_media(server, access_token, url).await {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!(account_id = %account.id, media_url = url, error = %e, "media upload failed, posting text only");
                    None
                },
            },
            None => None,
        };

        let mut form: Vec<(&str, &str)> = vec![("status", request.text.as_str())];
        if let Some(id) = &media_id {
            form.push(("media_ids[]", id.as_str()));
        }

        debug!(account_id = %account.id, server, source_id = %request.source_id, "posting status");
        let resp = self
            .http
            .post(format!("{server}/api/v1/statuses"))
            .bearer_auth(access_token.expose_secret())
            .header("Idempotency-Key", &request.source_id)
            .form(&form)
            .send()
            .await
            .map_err(|e| http::transport_failure(&e))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| http::transport_failure(&e))?;
        if !status.is_success() {
            return Err(classify(status, &body));
        }

        let remote_id = serde_json::from_str::<Status>(&body).ok().map(|s| s.id);
        info!(account_id = %account.id, status_id = ?remote_id, "status posted");
        Ok(DeliveryReceipt {
            remote_id,
            response: body,
            media_attached: media_id.is_some(),
        })
    }
}
