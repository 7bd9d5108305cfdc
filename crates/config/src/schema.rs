/// Config schema types (xmpp identity, storage, supervisor, delivery, alerts, platforms).
use std::{path::PathBuf, time::Duration};

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub xmpp: XmppConfig,
    pub storage: StorageConfig,
    pub supervisor: SupervisorConfig,
    pub delivery: DeliveryConfig,
    pub alerts: AlertsConfig,
    pub platforms: PlatformsConfig,
}

/// Chat identity and the fixed addresses the relay cares about.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct XmppConfig {
    /// Bare JID the transport logs in as.
    pub jid: String,

    /// Password handed to the stanza transport.
    #[serde(serialize_with = "serialize_secret")]
    pub password: Secret<String>,

    /// Chat service domain. Messages from this bare domain are never answered.
    pub domain: String,

    /// MUC service host, e.g. `conference.example.org`.
    pub conference_host: String,

    /// Handle the bot uses inside rooms. Also the command prefix (`<nick>: ping`).
    pub nick: String,

    /// The only identity whose private messages are routed as alerts.
    pub ingest_jid: String,

    /// Room receiving every routed alert unmodified.
    pub firehose_room: String,

    /// Rooms joined in addition to those listed in the store.
    pub rooms: Vec<String>,

    /// Identities receiving throttled operational alerts.
    pub operator_jids: Vec<String>,
}

impl std::fmt::Debug for XmppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmppConfig")
            .field("jid", &self.jid)
            .field("password", &"[REDACTED]")
            .field("domain", &self.domain)
            .field("conference_host", &self.conference_host)
            .field("nick", &self.nick)
            .field("ingest_jid", &self.ingest_jid)
            .field("firehose_room", &self.firehose_room)
            .field("rooms", &self.rooms)
            .field("operator_jids", &self.operator_jids)
            .finish()
    }
}

impl Default for XmppConfig {
    fn default() -> Self {
        Self {
            jid: "wxrelay@localhost".into(),
            password: Secret::new(String::new()),
            domain: "localhost".into(),
            conference_host: "conference.localhost".into(),
            nick: "wxrelay".into(),
            ingest_jid: "wxrelay_ingest@localhost".into(),
            firehose_room: "botstalk".into(),
            rooms: Vec::new(),
            operator_jids: Vec::new(),
        }
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// sqlx connection string for rooms, subscriptions, accounts and the delivery log.
    pub database_url: String,

    /// JSON file holding the chat-log snapshot.
    pub snapshot_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://wxrelay.db?mode=rwc".into(),
            snapshot_path: PathBuf::from("chatlog.json"),
        }
    }
}

/// Connection liveness and periodic housekeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub ping_interval_secs: u64,
    /// Unanswered pings tolerated before the session is torn down.
    pub max_outstanding_pings: usize,
    pub snapshot_interval_secs: u64,
    /// Presence summary is broadcast when the wall-clock minute is a multiple of this.
    pub status_every_minutes: u32,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: 60,
            max_outstanding_pings: 5,
            snapshot_interval_secs: 600,
            status_every_minutes: 10,
        }
    }
}

impl SupervisorConfig {
    #[must_use]
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }

    #[must_use]
    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot_interval_secs.max(1))
    }
}

/// Retry policy shared by all outbound platforms, plus product-text lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Total attempts for a retryable failure, including the first.
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
    pub request_timeout_secs: u64,
    /// Product-text service; `{product_id}` is substituted.
    pub product_lookup_url: Option<String>,
    /// Lookups repeated after an empty first one.
    pub product_lookup_retries: u32,
    pub product_lookup_interval_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_secs: 5,
            request_timeout_secs: 30,
            product_lookup_url: None,
            product_lookup_retries: 5,
            product_lookup_interval_secs: 10,
        }
    }
}

impl DeliveryConfig {
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    #[must_use]
    pub fn product_lookup_interval(&self) -> Duration {
        Duration::from_secs(self.product_lookup_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    pub max_per_window: usize,
    pub window_secs: u64,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            max_per_window: 10,
            window_secs: 3600,
        }
    }
}

impl AlertsConfig {
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// API endpoints, overridable for staging or tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformsConfig {
    pub twitter_api_base: String,
    pub twitter_upload_base: String,
    pub slack_api_base: String,
}

impl Default for PlatformsConfig {
    fn default() -> Self {
        Self {
            twitter_api_base: "https://api.twitter.com".into(),
            twitter_upload_base: "https://upload.twitter.com".into(),
            slack_api_base: "https://slack.com".into(),
        }
    }
}

impl RelayConfig {
    /// Full JID of a room on the conference service.
    #[must_use]
    pub fn room_jid(&self, room: &str) -> String {
        format!("{room}@{}", self.xmpp.conference_host)
    }
}
