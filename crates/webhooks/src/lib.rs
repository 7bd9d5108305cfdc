//! Generic HTTP webhook adapter.
//!
//! Each subscribed URL receives the full alert as a JSON POST.

mod outbound;

pub use outbound::{WebhookOutbound, WebhookPayload};
