use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
};

use crate::{
    account::{PlatformAccount, PlatformKind},
    retry::FailureClass,
};

/// One alert, shaped for a platform post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRequest {
    /// Correlation key written to the delivery log (product id or alert id).
    pub source_id: String,
    /// Short-form text for the post.
    pub text: String,
    /// Image to fetch and attach before posting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    pub extras: DeliveryExtras,
}

/// Everything else the alert carried; webhooks forward it verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeliveryExtras {
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    pub channels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long: Option<f64>,
}

/// Artifact of a successful post, persisted in the delivery log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliveryReceipt {
    /// Platform-side id of the created post, when the API returns one.
    pub remote_id: Option<String>,
    /// Raw response body.
    pub response: String,
    pub media_attached: bool,
}

/// A classified failure from a single delivery attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryFailure {
    pub class: FailureClass,
    /// Platform error code or HTTP status, when known.
    pub code: Option<String>,
    pub message: String,
}

impl std::fmt::Display for DeliveryFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{:?} failure ({code}): {}", self.class, self.message),
            None => write!(f, "{:?} failure: {}", self.class, self.message),
        }
    }
}

impl std::error::Error for DeliveryFailure {}

impl DeliveryFailure {
    pub fn new(class: FailureClass, code: Option<String>, message: impl Into<String>) -> Self {
        Self {
            class,
            code,
            message: message.into(),
        }
    }

    pub fn retryable(message: impl Into<String>) -> Self {
        Self::new(FailureClass::Retryable, None, message)
    }

    pub fn disable(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FailureClass::Disable, Some(code.into()), message)
    }

    pub fn ignore(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FailureClass::Ignore, Some(code.into()), message)
    }
}

/// Posts alerts to one platform kind.
///
/// Implementations make a single attempt and classify the result; retry
/// and disable handling live in [`crate::retry`] and the session loop.
#[async_trait]
pub trait PlatformOutbound: Send + Sync {
    fn kind(&self) -> PlatformKind;

    async fn deliver(
        &self,
        account: &PlatformAccount,
        request: &DeliveryRequest,
    ) -> Result<DeliveryReceipt, DeliveryFailure>;
}
