use std::sync::Mutex;

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
};

use crate::{
    Result,
    account::PlatformKind,
    retry::{DeliveryOutcome, FailureClass},
};

/// Terminal status of one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Delivered,
    RetriesExhausted,
    Disabled,
    Ignored,
}

impl DeliveryStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::RetriesExhausted => "retries_exhausted",
            Self::Disabled => "disabled",
            Self::Ignored => "ignored",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "delivered" => Some(Self::Delivered),
            "retries_exhausted" => Some(Self::RetriesExhausted),
            "disabled" => Some(Self::Disabled),
            "ignored" => Some(Self::Ignored),
            _ => None,
        }
    }
}

impl From<&DeliveryOutcome> for DeliveryStatus {
    fn from(outcome: &DeliveryOutcome) -> Self {
        match outcome.failure_class() {
            None => Self::Delivered,
            Some(FailureClass::Retryable) => Self::RetriesExhausted,
            Some(FailureClass::Disable) => Self::Disabled,
            Some(FailureClass::Ignore) => Self::Ignored,
        }
    }
}

/// A single logged delivery.
#[derive(Debug, Clone)]
pub struct DeliveryLogEntry {
    pub id: i64,
    pub kind: PlatformKind,
    pub account_id: String,
    pub source_id: String,
    pub status: DeliveryStatus,
    pub attempts: u32,
    /// Platform response on success.
    pub response: Option<String>,
    /// Failure description otherwise.
    pub error: Option<String>,
    pub created_at: i64,
}

impl DeliveryLogEntry {
    pub fn from_outcome(
        kind: PlatformKind,
        account_id: impl Into<String>,
        source_id: impl Into<String>,
        outcome: &DeliveryOutcome,
        created_at: i64,
    ) -> Self {
        let (response, error) = match outcome {
            DeliveryOutcome::Delivered { receipt, .. } => (Some(receipt.response.clone()), None),
            DeliveryOutcome::Failed { failure, .. } => (None, Some(failure.to_string())),
        };
        Self {
            id: 0,
            kind,
            account_id: account_id.into(),
            source_id: source_id.into(),
            status: DeliveryStatus::from(outcome),
            attempts: outcome.attempts(),
            response,
            error,
            created_at,
        }
    }
}

/// Audit log of every terminal delivery outcome.
#[async_trait]
pub trait DeliveryLog: Send + Sync {
    async fn record(&self, entry: DeliveryLogEntry) -> Result<()>;
    async fn list_by_account(
        &self,
        kind: PlatformKind,
        account_id: &str,
        limit: u32,
    ) -> Result<Vec<DeliveryLogEntry>>;
}

/// In-memory delivery log. No persistence — for tests only.
#[derive(Default)]
pub struct InMemoryDeliveryLog {
    entries: Mutex<Vec<DeliveryLogEntry>>,
}

impl InMemoryDeliveryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<DeliveryLogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl DeliveryLog for InMemoryDeliveryLog {
    async fn record(&self, mut entry: DeliveryLogEntry) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entry.id = entries.len() as i64 + 1;
        entries.push(entry);
        Ok(())
    }

    async fn list_by_account(
        &self,
        kind: PlatformKind,
        account_id: &str,
        limit: u32,
    ) -> Result<Vec<DeliveryLogEntry>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries
            .iter()
            .rev()
            .filter(|e| e.kind == kind && e.account_id == account_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
