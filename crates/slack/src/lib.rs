//! Team-chat adapter: posts alerts with the Web API `chat.postMessage`.

pub mod config;
mod errors;
mod outbound;

pub use {config::SlackConfig, outbound::SlackOutbound};
