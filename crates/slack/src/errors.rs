use wxrelay_platforms::{DeliveryFailure, FailureClass};

/// Classify the `error` string of an `ok: false` Web API response.
pub fn classify_api_error(error: &str) -> DeliveryFailure {
    let class = match error {
        "invalid_auth" | "not_authed" | "account_inactive" | "token_revoked"
        | "token_expired" | "no_permission" | "missing_scope" | "channel_not_found"
        | "not_in_channel" | "is_archived" | "team_access_not_granted" => FailureClass::Disable,
        "ratelimited" | "internal_error" | "fatal_error" | "service_unavailable"
        | "request_timeout" => FailureClass::Retryable,
        _ => FailureClass::Ignore,
    };
    DeliveryFailure::new(class, Some(error.to_string()), format!("slack error: {error}"))
}
