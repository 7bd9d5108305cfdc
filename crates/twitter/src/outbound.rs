use {
    async_trait::async_trait,
    base64::Engine,
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    tracing::{debug, info, warn},
};

use wxrelay_platforms::{
    Credentials, DeliveryFailure, DeliveryReceipt, DeliveryRequest, Error, PlatformAccount,
    PlatformKind, PlatformOutbound, Result, http, media,
};

use crate::{config::TwitterConfig, errors::classify_response};

/// Outbound poster for microblog accounts.
pub struct TwitterOutbound {
    http: reqwest::Client,
    config: TwitterConfig,
}

#[derive(Debug, Deserialize)]
struct MediaUploadResponse {
    media_id_string: String,
}

#[derive(Debug, Deserialize)]
struct CreateTweetResponse {
    data: CreatedTweet,
}

#[derive(Debug, Deserialize)]
struct CreatedTweet {
    id: String,
}

impl TwitterOutbound {
    pub fn new(http: reqwest::Client, config: TwitterConfig) -> Self {
        Self { http, config }
    }

    fn token<'a>(&self, account: &'a PlatformAccount) -> std::result::Result<&'a Secret<String>, DeliveryFailure> {
        match &account.credentials {
            Credentials::Twitter { access_token, .. } => Ok(access_token),
            other => Err(DeliveryFailure::ignore(
                "credentials",
                format!("account {} has {} credentials", account.id, other.kind()),
            )),
        }
    }

    /// Fetch the image and upload it, returning the media id.
    async fn upload_media(&self, token: &Secret<String>, url: &str) -> Result<String> {
        let payload = media::fetch_media(&self.http, url).await?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&payload.bytes);

        let resp = self
            .http
            .post(format!(
                "{}/1.1/media/upload.json",
                self.config.upload_base.trim_end_matches('/')
            ))
            .bearer_auth(token.expose_secret())
            .form(&[("media_data", encoded.as_str()), ("media_category", "tweet_image")])
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::media(url, format!("upload failed ({status}): {body}")));
        }
        let body: MediaUploadResponse = resp.json().await?;
        Ok(body.media_id_string)
    }
}

#[async_trait]
impl PlatformOutbound for TwitterOutbound {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Twitter
    }

    async fn deliver(
        &self,
        account: &PlatformAccount,
        request: &DeliveryRequest,
    ) -> std::result::Result<DeliveryReceipt, DeliveryFailure> {
        let token = self.token(account)?;

        let media_id = match request.media_url.as_deref() {
            Some(url) => match self.upload_media(token, url).await {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!(
                        account_id = %account.id,
                        media_url = url,
                        error = %e,
                        "media upload failed, posting text only"
                    );
                    None
                },
            },
            None => None,
        };

        let mut payload = serde_json::json!({ "text": request.text });
        if let Some(id) = &media_id
            && let Some(obj) = payload.as_object_mut()
        {
            obj.insert(
                "media".into(),
                serde_json::json!({ "media_ids": [id] }),
            );
        }

        debug!(
            account_id = %account.id,
            source_id = %request.source_id,
            text_len = request.text.len(),
            has_media = media_id.is_some(),
            "posting tweet"
        );
        let resp = self
            .http
            .post(format!("{}/2/tweets", self.config.api_base.trim_end_matches('/')))
            .bearer_auth(token.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|e| http::transport_failure(&e))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| http::transport_failure(&e))?;
        if !status.is_success() {
            return Err(classify_response(status, &body));
        }

        let remote_id = serde_json::from_str::<CreateTweetResponse>(&body)
            .ok()
            .map(|r| r.data.id);
        info!(account_id = %account.id, tweet_id = ?remote_id, "tweet posted");
        Ok(DeliveryReceipt {
            remote_id,
            response: body,
            media_attached: media_id.is_some(),
        })
    }
}
