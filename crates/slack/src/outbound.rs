use {
    async_trait::async_trait,
    secrecy::ExposeSecret,
    serde::Deserialize,
    serde_json::{Value, json},
    tracing::{debug, info},
};

use wxrelay_platforms::{
    Credentials, DeliveryFailure, DeliveryReceipt, DeliveryRequest, PlatformAccount, PlatformKind,
    PlatformOutbound, http,
};

use crate::{config::SlackConfig, errors::classify_api_error};

pub struct SlackOutbound {
    http: reqwest::Client,
    config: SlackConfig,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl SlackOutbound {
    pub fn new(http: reqwest::Client, config: SlackConfig) -> Self {
        Self { http, config }
    }
}

/// Build the message body. Images are referenced by URL in an image block,
/// so Slack fetches them itself.
fn message_body(channel_id: &str, request: &DeliveryRequest) -> Value {
    let mut body = json!({
        "channel": channel_id,
        "text": request.text,
        "unfurl_links": false,
    });
    if let Some(url) = &request.media_url
        && let Some(obj) = body.as_object_mut()
    {
        obj.insert(
            "blocks".into(),
            json!([
                { "type": "section", "text": { "type": "mrkdwn", "text": request.text } },
                { "type": "image", "image_url": url, "alt_text": "alert graphic" },
            ]),
        );
    }
    body
}

#[async_trait]
impl PlatformOutbound for SlackOutbound {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Slack
    }

    async fn deliver(
        &self,
        account: &PlatformAccount,
        request: &DeliveryRequest,
    ) -> Result<DeliveryReceipt, DeliveryFailure> {
        let Credentials::Slack {
            bot_token,
            channel_id,
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

        debug!(account_id = %account.id, channel_id, source_id = %request.source_id, "posting slack message");
        let resp = self
            .http
            .post(format!(
                "{}/api/chat.postMessage",
                self.config.api_base.trim_end_matches('/')
            ))
            .bearer_auth(bot_token.expose_secret())
            .json(&message_body(channel_id, request))
            .send()
            .await
            .map_err(|e| http::transport_failure(&e))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| http::transport_failure(&e))?;
        if !status.is_success() {
            return Err(http::status_failure(status, &body));
        }

        // The Web API reports most failures as 200 with `ok: false`.
        let parsed: PostMessageResponse = serde_json::from_str(&body).map_err(|e| {
            DeliveryFailure::retryable(format!("unparseable slack response: {e}"))
        })?;
        if !parsed.ok {
            return Err(classify_api_error(
                parsed.error.as_deref().unwrap_or("unknown_error"),
            ));
        }

        info!(account_id = %account.id, ts = ?parsed.ts, "slack message posted");
        Ok(DeliveryReceipt {
            remote_id: parsed.ts,
            response: body,
            media_attached: request.media_url.is_some(),
        })
    }
}
