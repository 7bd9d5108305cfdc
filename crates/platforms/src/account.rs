//! Platform accounts: shared flags plus a per-platform credential variant.

use std::{collections::HashMap, fmt, str::FromStr};

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

use crate::Error;

/// The four outbound platform kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    /// Microblogging service.
    Twitter,
    /// Federated social network.
    Mastodon,
    /// Team chat.
    Slack,
    /// Generic HTTP webhooks.
    Webhook,
}

impl PlatformKind {
    pub const ALL: [Self; 4] = [Self::Twitter, Self::Mastodon, Self::Slack, Self::Webhook];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Twitter => "twitter",
            Self::Mastodon => "mastodon",
            Self::Slack => "slack",
            Self::Webhook => "webhook",
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::invalid_input(format!("unknown platform kind: {s}")))
    }
}

/// Credential shape per platform.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Credentials {
    Twitter {
        #[serde(serialize_with = "serialize_secret")]
        access_token: Secret<String>,
        #[serde(default)]
        screen_name: Option<String>,
    },
    Mastodon {
        /// Instance base URL, e.g. `https://mastodon.social`.
        server: String,
        #[serde(serialize_with = "serialize_secret")]
        access_token: Secret<String>,
    },
    Slack {
        #[serde(serialize_with = "serialize_secret")]
        bot_token: Secret<String>,
        channel_id: String,
    },
    Webhook {
        url: String,
    },
}

impl Credentials {
    #[must_use]
    pub fn kind(&self) -> PlatformKind {
        match self {
            Self::Twitter { .. } => PlatformKind::Twitter,
            Self::Mastodon { .. } => PlatformKind::Mastodon,
            Self::Slack { .. } => PlatformKind::Slack,
            Self::Webhook { .. } => PlatformKind::Webhook,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Twitter { screen_name, .. } => f
                .debug_struct("Twitter")
                .field("access_token", &"[REDACTED]")
                .field("screen_name", screen_name)
                .finish(),
            Self::Mastodon { server, .. } => f
                .debug_struct("Mastodon")
                .field("server", server)
                .field("access_token", &"[REDACTED]")
                .finish(),
            Self::Slack { channel_id, .. } => f
                .debug_struct("Slack")
                .field("bot_token", &"[REDACTED]")
                .field("channel_id", channel_id)
                .finish(),
            Self::Webhook { url } => f.debug_struct("Webhook").field("url", url).finish(),
        }
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// A destination account on one platform.
#[derive(Debug, Clone)]
pub struct PlatformAccount {
    pub id: String,
    pub disabled: bool,
    /// Never auto-disabled, whatever the platform returns.
    pub exempt_from_auto_disable: bool,
    pub credentials: Credentials,
}

impl PlatformAccount {
    pub fn new(id: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            id: id.into(),
            disabled: false,
            exempt_from_auto_disable: false,
            credentials,
        }
    }

    /// A webhook "account" is just its URL.
    pub fn webhook(url: impl Into<String>) -> Self {
        let url = url.into();
        Self::new(url.clone(), Credentials::Webhook { url })
    }

    #[must_use]
    pub fn kind(&self) -> PlatformKind {
        self.credentials.kind()
    }

    /// Whether fan-out may deliver to this account.
    #[must_use]
    pub fn is_routable(&self) -> bool {
        !self.disabled || self.exempt_from_auto_disable
    }
}

/// What happened when a disable-class failure was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisableDecision {
    Disabled,
    AlreadyDisabled,
    Exempt,
    Unknown,
}

/// All known accounts, keyed by platform kind and account id.
#[derive(Debug, Clone, Default)]
pub struct AccountRegistry {
    accounts: HashMap<(PlatformKind, String), PlatformAccount>,
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an account.
    pub fn insert(&mut self, account: PlatformAccount) {
        self.accounts
            .insert((account.kind(), account.id.clone()), account);
    }

    pub fn get(&self, kind: PlatformKind, id: &str) -> Option<&PlatformAccount> {
        self.accounts.get(&(kind, id.to_string()))
    }

    pub fn remove(&mut self, kind: PlatformKind, id: &str) -> Option<PlatformAccount> {
        self.accounts.remove(&(kind, id.to_string()))
    }

    /// Apply an auto-disable. Exempt accounts are left untouched.
    pub fn apply_disable(&mut self, kind: PlatformKind, id: &str) -> DisableDecision {
        match self.accounts.get_mut(&(kind, id.to_string())) {
            None => DisableDecision::Unknown,
            Some(account) if account.exempt_from_auto_disable => DisableDecision::Exempt,
            Some(account) if account.disabled => DisableDecision::AlreadyDisabled,
            Some(account) => {
                account.disabled = true;
                DisableDecision::Disabled
            },
        }
    }

    /// Re-enable after an out-of-band credential refresh.
    pub fn enable(&mut self, kind: PlatformKind, id: &str) -> bool {
        match self.accounts.get_mut(&(kind, id.to_string())) {
            Some(account) => {
                account.disabled = false;
                true
            },
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlatformAccount> {
        self.accounts.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl FromIterator<PlatformAccount> for AccountRegistry {
    fn from_iter<I: IntoIterator<Item = PlatformAccount>>(iter: I) -> Self {
        let mut registry = Self::new();
        for account in iter {
            registry.insert(account);
        }
        registry
    }
}
