//! Per-alert destination planning.
//!
//! [`plan`] is pure: it reads the routing table and the account registry and
//! returns who gets the alert. Sending is the caller's job, in plan order.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use {
    wxrelay_common::Channel,
    wxrelay_platforms::{AccountRegistry, PlatformAccount, PlatformKind},
};

use crate::table::{DestinationKind, RoutingTable};

/// Per-destination suppression markers carried by an alert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Suppression {
    pub rooms: bool,
    pub twitter: bool,
    pub mastodon: bool,
    pub slack: bool,
    pub webhook: bool,
}

impl Suppression {
    #[must_use]
    pub fn suppresses(&self, kind: PlatformKind) -> bool {
        match kind {
            PlatformKind::Twitter => self.twitter,
            PlatformKind::Mastodon => self.mastodon,
            PlatformKind::Slack => self.slack,
            PlatformKind::Webhook => self.webhook,
        }
    }
}

/// What the router needs to know about one alert.
#[derive(Debug, Clone, Default)]
pub struct AlertRoute {
    pub channels: BTreeSet<Channel>,
    pub suppress: Suppression,
    /// Whether the platform-formatted text is present. Without it no
    /// platform receives the alert.
    pub has_platform_text: bool,
}

impl AlertRoute {
    /// Channels from the explicit comma list, else the token before the first
    /// colon of the body.
    pub fn resolve_channels(explicit: Option<&str>, body: &str) -> BTreeSet<Channel> {
        if let Some(list) = explicit.filter(|l| !l.trim().is_empty()) {
            match Channel::parse_list(list) {
                Ok(set) => return set,
                Err(e) => {
                    warn!(channels = list, error = %e, "ignoring malformed channel list");
                    return BTreeSet::new();
                },
            }
        }
        body.split_once(':')
            .and_then(|(head, _)| Channel::parse(head).ok())
            .into_iter()
            .collect()
    }
}

/// Deliveries for one platform kind.
#[derive(Debug, Clone)]
pub struct PlatformTargets {
    pub kind: PlatformKind,
    pub accounts: Vec<PlatformAccount>,
}

/// Ordered, deduplicated destinations for one alert.
#[derive(Debug, Clone)]
pub struct FanoutPlan {
    pub firehose: String,
    /// Subscribed rooms, excluding the firehose room.
    pub rooms: Vec<String>,
    pub platforms: Vec<PlatformTargets>,
    /// Accounts matched but skipped because they are disabled.
    pub skipped_disabled: Vec<(PlatformKind, String)>,
}

impl FanoutPlan {
    /// Room sends including the firehose.
    #[must_use]
    pub fn room_count(&self) -> usize {
        1 + self.rooms.len()
    }

    #[must_use]
    pub fn platform_count(&self) -> usize {
        self.platforms.iter().map(|p| p.accounts.len()).sum()
    }
}

/// Compute the destinations of one alert.
///
/// Each destination appears at most once, however many matched channels
/// reach it.
pub fn plan(
    table: &RoutingTable,
    accounts: &AccountRegistry,
    firehose: &str,
    route: &AlertRoute,
) -> FanoutPlan {
    let rooms = if route.suppress.rooms {
        Vec::new()
    } else {
        table
            .union(DestinationKind::Room, &route.channels)
            .into_iter()
            .filter(|room| room != firehose)
            .collect()
    };

    let mut platforms = Vec::new();
    let mut skipped_disabled = Vec::new();
    for kind in PlatformKind::ALL {
        if route.suppress.suppresses(kind) || !route.has_platform_text {
            continue;
        }
        let mut targets = Vec::new();
        for id in table.union(kind.into(), &route.channels) {
            match accounts.get(kind, &id) {
                Some(account) if account.is_routable() => targets.push(account.clone()),
                Some(_) => skipped_disabled.push((kind, id)),
                None if kind == PlatformKind::Webhook => {
                    targets.push(PlatformAccount::webhook(id));
                },
                None => warn!(kind = %kind, account_id = %id, "subscription for unknown account"),
            }
        }
        if !targets.is_empty() {
            platforms.push(PlatformTargets {
                kind,
                accounts: targets,
            });
        }
    }

    let plan = FanoutPlan {
        firehose: firehose.to_string(),
        rooms,
        platforms,
        skipped_disabled,
    };
    debug!(
        channels = %Channel::join(&route.channels),
        rooms = plan.rooms.len(),
        platform_targets = plan.platform_count(),
        skipped = plan.skipped_disabled.len(),
        "fan-out planned"
    );
    plan
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        rstest::rstest,
        secrecy::Secret,
        wxrelay_platforms::Credentials,
    };

    fn ch(name: &str) -> Channel {
        Channel::parse(name).unwrap()
    }

    fn twitter(id: &str) -> PlatformAccount {
        PlatformAccount::new(id, Credentials::Twitter {
            access_token: Secret::new("t".into()),
            screen_name: None,
        })
    }

    fn fixture() -> (RoutingTable, AccountRegistry) {
        let mut table = RoutingTable::new();
        table.subscribe(DestinationKind::Room, ch("DMX"), "dmxchat");
        table.subscribe(DestinationKind::Room, ch("SVRDMX"), "dmxchat");
        table.subscribe(DestinationKind::Room, ch("DMX"), "botstalk");
        table.subscribe(DestinationKind::Twitter, ch("DMX"), "iembot_dmx");
        table.subscribe(DestinationKind::Twitter, ch("SVRDMX"), "iembot_dmx");
        table.subscribe(DestinationKind::Twitter, ch("SVRDMX"), "iembot_ghost");
        table.subscribe(DestinationKind::Webhook, ch("DMX"), "https://example.org/hook");
        let accounts: AccountRegistry = [twitter("iembot_dmx")].into_iter().collect();
        (table, accounts)
    }

    #[rstest]
    #[case(None, "DMX: Winter Storm Warning", &["DMX"])]
    #[case(Some("dmx,svrdmx"), "anything", &["DMX", "SVRDMX"])]
    #[case(Some(""), "FSD: Flood Watch", &["FSD"])]
    #[case(None, "no colon here", &[])]
    #[case(None, "two words: nope", &[])]
    fn resolves_channels(
        #[case] explicit: Option<&str>,
        #[case] body: &str,
        #[case] expected: &[&str],
    ) {
        let got = AlertRoute::resolve_channels(explicit, body);
        let expected: BTreeSet<Channel> = expected.iter().map(|c| ch(c)).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn body_channel_reaches_room_and_no_platforms_without_text() {
        let (table, accounts) = fixture();
        let route = AlertRoute {
            channels: AlertRoute::resolve_channels(None, "DMX: Winter Storm Warning"),
            ..Default::default()
        };
        let plan = plan(&table, &accounts, "botstalk", &route);
        assert_eq!(plan.firehose, "botstalk");
        assert_eq!(plan.rooms, vec!["dmxchat".to_string()]);
        assert_eq!(plan.platform_count(), 0);
    }

    #[test]
    fn overlapping_channels_deliver_once() {
        let (table, accounts) = fixture();
        let route = AlertRoute {
            channels: [ch("DMX"), ch("SVRDMX")].into_iter().collect(),
            has_platform_text: true,
            ..Default::default()
        };
        let plan = plan(&table, &accounts, "botstalk", &route);
        assert_eq!(plan.rooms, vec!["dmxchat".to_string()]);
        let twitter = plan
            .platforms
            .iter()
            .find(|p| p.kind == PlatformKind::Twitter)
            .unwrap();
        assert_eq!(twitter.accounts.len(), 1);
        assert_eq!(twitter.accounts[0].id, "iembot_dmx");
        let hooks = plan
            .platforms
            .iter()
            .find(|p| p.kind == PlatformKind::Webhook)
            .unwrap();
        assert_eq!(hooks.accounts[0].id, "https://example.org/hook");
    }

    #[test]
    fn suppression_markers_skip_destinations() {
        let (table, accounts) = fixture();
        let route = AlertRoute {
            channels: [ch("DMX")].into_iter().collect(),
            suppress: Suppression {
                rooms: true,
                twitter: true,
                ..Default::default()
            },
            has_platform_text: true,
        };
        let plan = plan(&table, &accounts, "botstalk", &route);
        assert!(plan.rooms.is_empty());
        assert_eq!(plan.room_count(), 1);
        assert!(plan.platforms.iter().all(|p| p.kind != PlatformKind::Twitter));
        assert_eq!(plan.platform_count(), 1);
    }

    #[test]
    fn disabled_accounts_are_skipped_unless_exempt() {
        let (table, mut accounts) = fixture();
        accounts.apply_disable(PlatformKind::Twitter, "iembot_dmx");
        let route = AlertRoute {
            channels: [ch("DMX")].into_iter().collect(),
            has_platform_text: true,
            ..Default::default()
        };
        let plan1 = plan(&table, &accounts, "botstalk", &route);
        assert!(plan1.platforms.iter().all(|p| p.kind != PlatformKind::Twitter));
        assert_eq!(plan1.skipped_disabled, vec![(
            PlatformKind::Twitter,
            "iembot_dmx".to_string()
        )]);

        let mut exempt = twitter("iembot_dmx");
        exempt.disabled = true;
        exempt.exempt_from_auto_disable = true;
        accounts.insert(exempt);
        let plan2 = plan(&table, &accounts, "botstalk", &route);
        assert!(plan2.platforms.iter().any(|p| p.kind == PlatformKind::Twitter));
    }
}
