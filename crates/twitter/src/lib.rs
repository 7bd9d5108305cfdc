//! Microblog (Twitter/X) delivery adapter.
//!
//! Posts alert text through the v2 tweets endpoint, uploading attached
//! imagery through the v1.1 media endpoint first.

pub mod config;
pub mod errors;
pub mod outbound;

pub use {config::TwitterConfig, outbound::TwitterOutbound};
