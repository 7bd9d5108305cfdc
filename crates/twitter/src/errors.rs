//! Map microblog API error payloads onto the shared failure taxonomy.

use {reqwest::StatusCode, serde::Deserialize};

use wxrelay_platforms::{DeliveryFailure, FailureClass, http};

/// Invalid/expired token, suspended, locked, bad auth, app lacks write access.
const DISABLE_CODES: &[i64] = &[32, 64, 89, 261, 326];
/// Daily update limit, text too long, duplicate status.
const IGNORE_CODES: &[i64] = &[185, 186, 187];
/// Rate limit, over capacity, internal error.
const RETRY_CODES: &[i64] = &[88, 130, 131];

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<LegacyError>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LegacyError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

/// Classify a non-success response.
///
/// Numeric error codes take precedence. The v2 API reports duplicates as a
/// plain 403, which must not disable the account.
pub fn classify_response(status: StatusCode, body: &str) -> DeliveryFailure {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

    for err in &parsed.errors {
        let Some(code) = err.code else { continue };
        let message = err.message.clone().unwrap_or_else(|| body.to_string());
        let class = if DISABLE_CODES.contains(&code) {
            FailureClass::Disable
        } else if IGNORE_CODES.contains(&code) {
            FailureClass::Ignore
        } else if RETRY_CODES.contains(&code) {
            FailureClass::Retryable
        } else {
            continue;
        };
        return DeliveryFailure::new(class, Some(code.to_string()), message);
    }

    let detail = parsed
        .detail
        .or(parsed.title)
        .unwrap_or_else(|| body.to_string());
    if status == StatusCode::FORBIDDEN && detail.to_lowercase().contains("duplicate") {
        return DeliveryFailure::ignore("187", detail);
    }

    let mut failure = http::status_failure(status, &detail);
    if status == StatusCode::TOO_MANY_REQUESTS {
        failure.code = Some("88".into());
    }
    failure
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case(401, r#"{"errors":[{"code":89,"message":"Invalid or expired token."}]}"#, FailureClass::Disable, "89")]
    #[case(403, r#"{"errors":[{"code":326,"message":"locked"}]}"#, FailureClass::Disable, "326")]
    #[case(403, r#"{"errors":[{"code":185,"message":"over daily limit"}]}"#, FailureClass::Ignore, "185")]
    #[case(403, r#"{"errors":[{"code":187,"message":"Status is a duplicate."}]}"#, FailureClass::Ignore, "187")]
    #[case(503, r#"{"errors":[{"code":130,"message":"Over capacity"}]}"#, FailureClass::Retryable, "130")]
    #[case(403, r#"{"title":"Forbidden","detail":"You are not allowed to create a Tweet with duplicate content.","status":403}"#, FailureClass::Ignore, "187")]
    #[case(429, r#"{"title":"Too Many Requests"}"#, FailureClass::Retryable, "88")]
    #[case(401, "Unauthorized", FailureClass::Disable, "401")]
    #[case(500, "", FailureClass::Retryable, "500")]
    fn classifies(
        #[case] status: u16,
        #[case] body: &str,
        #[case] class: FailureClass,
        #[case] code: &str,
    ) {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_REQUEST);
        let failure = classify_response(status, body);
        assert_eq!(failure.class, class);
        assert_eq!(failure.code.as_deref(), Some(code));
    }

    #[test]
    fn unknown_code_falls_back_to_status() {
        let failure = classify_response(
            StatusCode::BAD_REQUEST,
            r#"{"errors":[{"code":44,"message":"attachment_url parameter is invalid"}]}"#,
        );
        assert_eq!(failure.class, FailureClass::Ignore);
        assert_eq!(failure.code.as_deref(), Some("400"));
    }
}
