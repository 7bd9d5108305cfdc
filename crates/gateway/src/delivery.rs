//! Terminal delivery outcomes, applied on the session loop.

use std::sync::Arc;

use tracing::{info, warn};

use wxrelay_platforms::{
    DeliveryOutcome, DisableDecision, FailureClass, PlatformKind,
    delivery_log::DeliveryLogEntry,
};

use crate::session::Session;

/// Sent by a delivery worker when retries are over.
#[derive(Debug, Clone)]
pub struct DeliveryCompletion {
    pub kind: PlatformKind,
    pub account_id: String,
    pub source_id: String,
    pub outcome: DeliveryOutcome,
    pub finished_at: i64,
}

impl Session {
    pub(crate) fn on_delivery(&mut self, done: DeliveryCompletion) {
        let entry = DeliveryLogEntry::from_outcome(
            done.kind,
            done.account_id.clone(),
            done.source_id.clone(),
            &done.outcome,
            done.finished_at,
        );
        let log = Arc::clone(&self.services.delivery_log);
        tokio::spawn(async move {
            if let Err(e) = log.record(entry).await {
                warn!(error = %e, "failed to write delivery log");
            }
        });

        let DeliveryOutcome::Failed { failure, attempts } = &done.outcome else {
            self.state.stats.deliveries_succeeded += 1;
            return;
        };
        self.state.stats.deliveries_failed += 1;

        match failure.class {
            FailureClass::Disable => self.disable_account(&done, &failure.to_string()),
            FailureClass::Retryable => self.operator_alert(&format!(
                "{} delivery to {} failed after {attempts} attempts: {failure}",
                done.kind, done.account_id
            )),
            FailureClass::Ignore => info!(
                kind = %done.kind,
                account_id = %done.account_id,
                source_id = %done.source_id,
                error = %failure,
                "delivery skipped by platform"
            ),
        }
    }

    fn disable_account(&mut self, done: &DeliveryCompletion, reason: &str) {
        match self.state.accounts.apply_disable(done.kind, &done.account_id) {
            DisableDecision::Disabled => {
                self.state.stats.accounts_disabled += 1;
                let store = Arc::clone(&self.services.store);
                let (kind, id) = (done.kind, done.account_id.clone());
                self.spawn_store_write("set_account_disabled", async move {
                    store.set_account_disabled(kind, &id, true).await
                });
                self.operator_alert(&format!(
                    "disabled {} account {}: {reason}",
                    done.kind, done.account_id
                ));
            },
            DisableDecision::Exempt => warn!(
                kind = %done.kind,
                account_id = %done.account_id,
                reason,
                "exempt account kept enabled after authorization failure"
            ),
            DisableDecision::AlreadyDisabled => {},
            DisableDecision::Unknown => {
                if done.kind == PlatformKind::Webhook {
                    self.operator_alert(&format!(
                        "webhook {} is failing permanently: {reason}",
                        done.account_id
                    ));
                } else {
                    warn!(kind = %done.kind, account_id = %done.account_id, "disable for unknown account");
                }
            },
        }
    }
}
