//! Semantic checks on a loaded [`RelayConfig`].

use crate::schema::RelayConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "xmpp.nick"
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(&mut self, severity: Severity, path: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path: path.to_string(),
            message: message.into(),
        });
    }
}

pub fn validate(cfg: &RelayConfig) -> ValidationResult {
    use Severity::{Error, Warning};

    let mut result = ValidationResult::default();
    let xmpp = &cfg.xmpp;

    for (path, jid) in [("xmpp.jid", &xmpp.jid), ("xmpp.ingest_jid", &xmpp.ingest_jid)] {
        if !jid.contains('@') || jid.contains('/') {
            result.push(Error, path, format!("expected a bare user@domain JID, got {jid:?}"));
        }
    }
    for (path, value) in [
        ("xmpp.domain", &xmpp.domain),
        ("xmpp.conference_host", &xmpp.conference_host),
        ("xmpp.firehose_room", &xmpp.firehose_room),
    ] {
        if value.trim().is_empty() {
            result.push(Error, path, "must not be empty");
        }
    }
    if xmpp.nick.is_empty() || xmpp.nick.chars().any(char::is_whitespace) {
        result.push(Error, "xmpp.nick", "room handle must be non-empty without whitespace");
    }
    if xmpp.conference_host == xmpp.domain {
        result.push(
            Warning,
            "xmpp.conference_host",
            "same as xmpp.domain; private messages cannot be told apart from room traffic",
        );
    }
    if xmpp.operator_jids.is_empty() {
        result.push(
            Warning,
            "xmpp.operator_jids",
            "no operators configured; operational alerts are only logged",
        );
    }

    if cfg.storage.database_url.trim().is_empty() {
        result.push(Error, "storage.database_url", "must not be empty");
    }

    if cfg.supervisor.max_outstanding_pings == 0 {
        result.push(Error, "supervisor.max_outstanding_pings", "must be at least 1");
    }
    if cfg.supervisor.status_every_minutes == 0 {
        result.push(Error, "supervisor.status_every_minutes", "must be at least 1");
    }
    if cfg.delivery.max_attempts == 0 {
        result.push(Error, "delivery.max_attempts", "must be at least 1");
    }
    if let Some(url) = &cfg.delivery.product_lookup_url
        && !url.contains("{product_id}")
    {
        result.push(
            Warning,
            "delivery.product_lookup_url",
            "missing {product_id} placeholder; every lookup hits the same URL",
        );
    }

    for (path, base) in [
        ("platforms.twitter_api_base", &cfg.platforms.twitter_api_base),
        ("platforms.twitter_upload_base", &cfg.platforms.twitter_upload_base),
        ("platforms.slack_api_base", &cfg.platforms.slack_api_base),
    ] {
        if let Err(e) = url::Url::parse(base) {
            result.push(Error, path, format!("invalid URL: {e}"));
        }
    }

    result
}
