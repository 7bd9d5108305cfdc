//! Shared retry taxonomy: every platform failure is retryable, disabling, or ignorable.

use std::time::Duration;

use {
    serde::{Deserialize, Serialize},
    tracing::{debug, warn},
};

use crate::{
    account::PlatformAccount,
    outbound::{DeliveryFailure, DeliveryReceipt, DeliveryRequest, PlatformOutbound},
};

/// How a failed attempt is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Network or rate-limit trouble; try again after the fixed delay.
    Retryable,
    /// Authorization or suspension; disable the account unless exempt.
    Disable,
    /// Duplicate content or quota; log and move on.
    Ignore,
}

/// Fixed-count, fixed-delay retry bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Zero is treated as one.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// Terminal result of a delivery after retries.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    Delivered {
        receipt: DeliveryReceipt,
        attempts: u32,
    },
    Failed {
        failure: DeliveryFailure,
        attempts: u32,
    },
}

impl DeliveryOutcome {
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Delivered { attempts, .. } | Self::Failed { attempts, .. } => *attempts,
        }
    }

    #[must_use]
    pub fn failure_class(&self) -> Option<FailureClass> {
        match self {
            Self::Delivered { .. } => None,
            Self::Failed { failure, .. } => Some(failure.class),
        }
    }
}

/// Run one delivery to completion.
///
/// Sleeps between retryable attempts, so this must only run on a worker
/// task, never on the session loop.
pub async fn deliver_with_retry(
    outbound: &dyn PlatformOutbound,
    account: &PlatformAccount,
    request: &DeliveryRequest,
    policy: RetryPolicy,
) -> DeliveryOutcome {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match outbound.deliver(account, request).await {
            Ok(receipt) => {
                debug!(
                    kind = %outbound.kind(),
                    account_id = %account.id,
                    source_id = %request.source_id,
                    attempts,
                    "delivery succeeded"
                );
                return DeliveryOutcome::Delivered { receipt, attempts };
            },
            Err(failure) if failure.class == FailureClass::Retryable && attempts < max_attempts => {
                warn!(
                    kind = %outbound.kind(),
                    account_id = %account.id,
                    attempts,
                    max_attempts,
                    retry_after_secs = policy.delay.as_secs(),
                    error = %failure,
                    "delivery failed, waiting before retry"
                );
                tokio::time::sleep(policy.delay).await;
            },
            Err(failure) => {
                warn!(
                    kind = %outbound.kind(),
                    account_id = %account.id,
                    attempts,
                    error = %failure,
                    "delivery failed"
                );
                return DeliveryOutcome::Failed { failure, attempts };
            },
        }
    }
}
