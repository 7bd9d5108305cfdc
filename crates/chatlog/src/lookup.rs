//! Long-form product text resolution for logged alerts.

use std::time::Duration;

use {
    async_trait::async_trait,
    reqwest::StatusCode,
    tracing::{debug, warn},
};

use crate::Result;

/// Attached when every lookup attempt came back empty.
pub const PRODUCT_TEXT_PLACEHOLDER: &str = "Product text unavailable.";

#[async_trait]
pub trait ProductLookup: Send + Sync {
    /// `Ok(None)` means "not available yet"; the caller may try again.
    async fn product_text(&self, product_id: &str) -> Result<Option<String>>;
}

/// Fetches product text from an HTTP service.
///
/// The URL template's `{product_id}` placeholder is replaced with the
/// percent-encoded id. A 404 counts as not available yet.
pub struct HttpProductLookup {
    http: reqwest::Client,
    url_template: String,
}

impl HttpProductLookup {
    pub fn new(http: reqwest::Client, url_template: impl Into<String>) -> Self {
        Self {
            http,
            url_template: url_template.into(),
        }
    }

    fn url_for(&self, product_id: &str) -> String {
        self.url_template
            .replace("{product_id}", &urlencoding::encode(product_id))
    }
}

#[async_trait]
impl ProductLookup for HttpProductLookup {
    async fn product_text(&self, product_id: &str) -> Result<Option<String>> {
        let resp = self.http.get(self.url_for(product_id)).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let text = resp.error_for_status()?.text().await?;
        let text = text.trim();
        Ok((!text.is_empty()).then(|| text.to_string()))
    }
}

/// Look up once, then retry up to `retries` more times with `interval`
/// between tries.
///
/// Errors count as empty attempts. Falls back to
/// [`PRODUCT_TEXT_PLACEHOLDER`].
pub async fn resolve_product_text(
    lookup: &dyn ProductLookup,
    product_id: &str,
    retries: u32,
    interval: Duration,
) -> String {
    let attempts = retries.saturating_add(1);
    for attempt in 1..=attempts {
        match lookup.product_text(product_id).await {
            Ok(Some(text)) => {
                debug!(product_id, attempt, "product text resolved");
                return text;
            },
            Ok(None) => debug!(product_id, attempt, "product text not available yet"),
            Err(e) => warn!(product_id, attempt, error = %e, "product text lookup failed"),
        }
        if attempt < attempts {
            tokio::time::sleep(interval).await;
        }
    }
    warn!(product_id, attempts, "giving up on product text");
    PRODUCT_TEXT_PLACEHOLDER.to_string()
}
