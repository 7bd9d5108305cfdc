//! In-memory channel → destination maps.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};

use {
    serde::{Deserialize, Serialize},
    tracing::debug,
};

use {wxrelay_common::Channel, wxrelay_platforms::PlatformKind};

use crate::Error;

/// Which map a subscription lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationKind {
    Room,
    Twitter,
    Mastodon,
    Slack,
    Webhook,
}

impl DestinationKind {
    pub const ALL: [Self; 5] = [
        Self::Room,
        Self::Twitter,
        Self::Mastodon,
        Self::Slack,
        Self::Webhook,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Room => "room",
            Self::Twitter => "twitter",
            Self::Mastodon => "mastodon",
            Self::Slack => "slack",
            Self::Webhook => "webhook",
        }
    }

    /// The platform behind this kind, `None` for rooms.
    #[must_use]
    pub fn platform(self) -> Option<PlatformKind> {
        match self {
            Self::Room => None,
            Self::Twitter => Some(PlatformKind::Twitter),
            Self::Mastodon => Some(PlatformKind::Mastodon),
            Self::Slack => Some(PlatformKind::Slack),
            Self::Webhook => Some(PlatformKind::Webhook),
        }
    }
}

impl From<PlatformKind> for DestinationKind {
    fn from(kind: PlatformKind) -> Self {
        match kind {
            PlatformKind::Twitter => Self::Twitter,
            PlatformKind::Mastodon => Self::Mastodon,
            PlatformKind::Slack => Self::Slack,
            PlatformKind::Webhook => Self::Webhook,
        }
    }
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DestinationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownKind { kind: s.to_string() })
    }
}

type ChannelMap = BTreeMap<Channel, BTreeSet<String>>;

/// Five parallel `channel -> ordered set of destination ids` maps.
///
/// Room destinations are room names; platform destinations are account ids
/// (the URL itself for webhooks).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutingTable {
    maps: BTreeMap<DestinationKind, ChannelMap>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the subscription was new.
    pub fn subscribe(
        &mut self,
        kind: DestinationKind,
        channel: Channel,
        destination: impl Into<String>,
    ) -> bool {
        self.maps
            .entry(kind)
            .or_default()
            .entry(channel)
            .or_default()
            .insert(destination.into())
    }

    /// Returns `true` if the subscription existed. The channel entry is kept
    /// (possibly empty).
    pub fn unsubscribe(&mut self, kind: DestinationKind, channel: &Channel, destination: &str) -> bool {
        self.maps
            .get_mut(&kind)
            .and_then(|m| m.get_mut(channel))
            .is_some_and(|set| set.remove(destination))
    }

    /// Drop a destination from every channel of one kind.
    pub fn remove_destination(&mut self, kind: DestinationKind, destination: &str) -> usize {
        let Some(map) = self.maps.get_mut(&kind) else {
            return 0;
        };
        map.values_mut()
            .map(|set| usize::from(set.remove(destination)))
            .sum()
    }

    /// Subscribers of one channel. Unknown channels yield an empty set.
    pub fn subscribers(&self, kind: DestinationKind, channel: &Channel) -> BTreeSet<String> {
        match self.maps.get(&kind).and_then(|m| m.get(channel)) {
            Some(set) => set.clone(),
            None => {
                debug!(kind = %kind, channel = %channel, "no subscribers for channel");
                BTreeSet::new()
            },
        }
    }

    /// Deduplicated union of the subscribers of every channel.
    pub fn union<'a>(
        &self,
        kind: DestinationKind,
        channels: impl IntoIterator<Item = &'a Channel>,
    ) -> BTreeSet<String> {
        channels
            .into_iter()
            .flat_map(|c| self.subscribers(kind, c))
            .collect()
    }

    /// Channels a destination is subscribed to.
    pub fn channels_for(&self, kind: DestinationKind, destination: &str) -> BTreeSet<Channel> {
        self.maps
            .get(&kind)
            .map(|map| {
                map.iter()
                    .filter(|(_, set)| set.contains(destination))
                    .map(|(channel, _)| channel.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every channel known to one kind's map, including empty ones.
    pub fn channels(&self, kind: DestinationKind) -> impl Iterator<Item = &Channel> {
        self.maps.get(&kind).into_iter().flat_map(BTreeMap::keys)
    }

    /// Count of `(channel, destination)` pairs across all maps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.maps
            .values()
            .flat_map(BTreeMap::values)
            .map(BTreeSet::len)
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    fn ch(name: &str) -> Channel {
        Channel::parse(name).unwrap()
    }

    #[test]
    fn union_dedups_across_channels() {
        let mut table = RoutingTable::new();
        for c in ["DMX", "SVRDMX", "TORDMX"] {
            table.subscribe(DestinationKind::Room, ch(c), "dmxchat");
        }
        table.subscribe(DestinationKind::Room, ch("TORDMX"), "stormchasers");

        let rooms = table.union(
            DestinationKind::Room,
            &[ch("DMX"), ch("SVRDMX"), ch("TORDMX")],
        );
        assert_eq!(
            rooms.into_iter().collect::<Vec<_>>(),
            vec!["dmxchat".to_string(), "stormchasers".to_string()]
        );
    }

    #[test]
    fn kinds_are_independent() {
        let mut table = RoutingTable::new();
        table.subscribe(DestinationKind::Room, ch("DMX"), "dmxchat");
        table.subscribe(DestinationKind::Twitter, ch("DMX"), "iembot_dmx");

        assert_eq!(table.subscribers(DestinationKind::Mastodon, &ch("DMX")).len(), 0);
        assert!(table.subscribers(DestinationKind::Twitter, &ch("DMX")).contains("iembot_dmx"));
        assert!(!table.subscribers(DestinationKind::Room, &ch("DMX")).contains("iembot_dmx"));
    }

    #[test]
    fn unknown_channel_is_empty() {
        let table = RoutingTable::new();
        assert!(table.subscribers(DestinationKind::Room, &ch("NOPE")).is_empty());
        assert!(table.union(DestinationKind::Slack, &[ch("NOPE")]).is_empty());
    }

    #[test]
    fn subscribe_unsubscribe_and_channels_for() {
        let mut table = RoutingTable::new();
        assert!(table.subscribe(DestinationKind::Room, ch("DMX"), "dmxchat"));
        assert!(!table.subscribe(DestinationKind::Room, ch("dmx"), "dmxchat"));
        table.subscribe(DestinationKind::Room, ch("FSD"), "dmxchat");
        assert_eq!(
            table.channels_for(DestinationKind::Room, "dmxchat"),
            [ch("DMX"), ch("FSD")].into_iter().collect()
        );

        assert!(table.unsubscribe(DestinationKind::Room, &ch("DMX"), "dmxchat"));
        assert!(!table.unsubscribe(DestinationKind::Room, &ch("DMX"), "dmxchat"));
        assert!(!table.subscribers(DestinationKind::Room, &ch("DMX")).contains("dmxchat"));
        assert_eq!(table.len(), 1);

        assert_eq!(table.remove_destination(DestinationKind::Room, "dmxchat"), 1);
        assert!(table.is_empty());
    }

    #[rstest]
    #[case("room", DestinationKind::Room)]
    #[case("Twitter", DestinationKind::Twitter)]
    #[case("webhook", DestinationKind::Webhook)]
    fn parses_kind(#[case] raw: &str, #[case] expected: DestinationKind) {
        assert_eq!(raw.parse::<DestinationKind>().unwrap(), expected);
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!(matches!(
            "fax".parse::<DestinationKind>(),
            Err(Error::UnknownKind { .. })
        ));
    }
}
