//! Shared types, error definitions, and utilities used across all wxrelay crates.

pub mod context;
pub mod error;
pub mod throttle;
pub mod types;

pub use {
    context::FromMessage,
    error::{Error, Result},
    throttle::AlertThrottle,
    types::Channel,
};
