//! Routing key types shared by the routing table, the command processor and
//! the platform adapters.

use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A subscription topic key, e.g. `DMX` or `SVRDMX`.
///
/// Always stored uppercase with no whitespace. Channels are independent of
/// room names: a room subscribes to any number of channels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Channel(String);

impl Channel {
    /// Normalize and validate a single channel name.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::invalid_channel(raw, "empty channel name"));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(Error::invalid_channel(raw, "embedded whitespace"));
        }
        Ok(Self(trimmed.to_uppercase()))
    }

    /// Split a comma-separated list into a set of channels.
    ///
    /// Empty segments (`"A,,B"`, trailing commas) are skipped. Any invalid
    /// segment fails the whole list.
    pub fn parse_list(raw: &str) -> Result<BTreeSet<Self>> {
        raw.split(',')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(Self::parse)
            .collect()
    }

    /// Join a set of channels back into the comma-separated wire form.
    #[must_use]
    pub fn join<'a>(channels: impl IntoIterator<Item = &'a Self>) -> String {
        channels
            .into_iter()
            .map(Self::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of characters in the normalized name.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Channel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Channel {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Channel> for String {
    fn from(value: Channel) -> Self {
        value.0
    }
}
