//! Federated social network adapter: posts statuses to per-account instances.

mod outbound;

pub use outbound::MastodonOutbound;
