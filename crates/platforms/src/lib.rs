//! Outbound platform contract shared by every delivery adapter.
//!
//! Each platform (microblog, federated social, team chat, webhooks)
//! implements [`PlatformOutbound`]. Failures are classified into the
//! [`FailureClass`] taxonomy and driven through [`retry::deliver_with_retry`],
//! so retry and auto-disable behave the same everywhere.

pub mod account;
pub mod delivery_log;
pub mod error;
pub mod http;
pub mod media;
pub mod outbound;
pub mod retry;

pub use {
    account::{AccountRegistry, Credentials, DisableDecision, PlatformAccount, PlatformKind},
    error::{Error, Result},
    outbound::{DeliveryExtras, DeliveryFailure, DeliveryReceipt, DeliveryRequest, PlatformOutbound},
    retry::{DeliveryOutcome, FailureClass, RetryPolicy},
};
