//! HTTP helpers shared by the adapters: client setup and status classification.

use std::time::Duration;

use reqwest::{Client, StatusCode};

use crate::{outbound::DeliveryFailure, retry::FailureClass};

/// Longest response snippet kept in a failure message.
const MAX_ERROR_BODY_CHARS: usize = 300;

pub fn build_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("wxrelay/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Default mapping of an HTTP status to a failure class.
///
/// Adapters consult platform error codes first and fall back to this.
pub fn classify_status(status: StatusCode) -> FailureClass {
    match status {
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => FailureClass::Retryable,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FailureClass::Disable,
        s if s.is_server_error() => FailureClass::Retryable,
        _ => FailureClass::Ignore,
    }
}

/// Failure for a non-success response, classified by status alone.
pub fn status_failure(status: StatusCode, body: &str) -> DeliveryFailure {
    DeliveryFailure::new(
        classify_status(status),
        Some(status.as_u16().to_string()),
        truncate(body),
    )
}

/// Failure for an error raised before a response arrived (or while reading it).
pub fn transport_failure(err: &reqwest::Error) -> DeliveryFailure {
    if let Some(status) = err.status() {
        return status_failure(status, &err.to_string());
    }
    let class = if err.is_builder() {
        FailureClass::Ignore
    } else {
        FailureClass::Retryable
    };
    DeliveryFailure::new(class, None, err.to_string())
}

pub(crate) fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}
