use {
    async_trait::async_trait,
    reqwest::StatusCode,
    serde::Serialize,
    tracing::{debug, info},
};

use wxrelay_platforms::{
    Credentials, DeliveryExtras, DeliveryFailure, DeliveryReceipt, DeliveryRequest,
    PlatformAccount, PlatformKind, PlatformOutbound, http,
};

/// JSON document POSTed to each webhook.
#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    pub source_id: &'a str,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<&'a str>,
    #[serde(flatten)]
    pub extras: &'a DeliveryExtras,
}

impl<'a> From<&'a DeliveryRequest> for WebhookPayload<'a> {
    fn from(request: &'a DeliveryRequest) -> Self {
        Self {
            source_id: &request.source_id,
            text: &request.text,
            media_url: request.media_url.as_deref(),
            extras: &request.extras,
        }
    }
}

/// POSTs alerts to arbitrary HTTP endpoints.
pub struct WebhookOutbound {
    http: reqwest::Client,
}

impl WebhookOutbound {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

fn classify(status: StatusCode, body: &str) -> DeliveryFailure {
    match status {
        StatusCode::GONE | StatusCode::NOT_FOUND => {
            DeliveryFailure::disable(status.as_u16().to_string(), body.to_string())
        },
        _ => http::status_failure(status, body),
    }
}

#[async_trait]
impl PlatformOutbound for WebhookOutbound {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Webhook
    }

    async fn deliver(
        &self,
        account: &PlatformAccount,
        request: &DeliveryRequest,
    ) -> Result<DeliveryReceipt, DeliveryFailure> {
        let Credentials::Webhook { url } = &account.credentials else {
            return Err(DeliveryFailure::ignore(
                "credentials",
                format!("account {} is not a webhook", account.id),
            ));
        };

        debug!(url, source_id = %request.source_id, "posting webhook");
        let resp = self
            .http
            .post(url)
            .json(&WebhookPayload::from(request))
            .send()
            .await
            .map_err(|e| http::transport_failure(&e))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| http::transport_failure(&e))?;
        if !status.is_success() {
            return Err(classify(status, &body));
        }
        info!(url, status = status.as_u16(), "webhook delivered");
        Ok(DeliveryReceipt {
            remote_id: None,
            response: body,
            media_attached: false,
        })
    }
}
