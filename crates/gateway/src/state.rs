//! State owned by the session loop.

use std::collections::BTreeSet;

use serde::Serialize;

use {
    wxrelay_chatlog::ChatLog,
    wxrelay_common::{AlertThrottle, Channel},
    wxrelay_config::RelayConfig,
    wxrelay_platforms::AccountRegistry,
    wxrelay_routing::{DestinationKind, RoutingTable},
    wxrelay_xmpp::{Jid, PingSupervisor, RoomTracker},
};

use crate::{Result, error::Context};

/// Addresses parsed once from configuration.
#[derive(Debug, Clone)]
pub struct Identity {
    pub own_jid: Jid,
    pub nick: String,
    /// Chat service domain; private messages from it are never answered.
    pub domain: String,
    pub conference_host: String,
    pub ingest: Jid,
    pub firehose_room: String,
    pub operators: Vec<Jid>,
}

impl Identity {
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        let x = &config.xmpp;
        let operators = x
            .operator_jids
            .iter()
            .map(|j| j.parse::<Jid>().with_context(|| format!("operator jid {j}")))
            .collect::<Result<Vec<Jid>>>()?;
        Ok(Self {
            own_jid: x.jid.parse::<Jid>().context("xmpp.jid")?,
            nick: x.nick.clone(),
            domain: x.domain.to_lowercase(),
            conference_host: x.conference_host.to_lowercase(),
            ingest: x.ingest_jid.parse::<Jid>().context("xmpp.ingest_jid")?,
            firehose_room: x.firehose_room.to_lowercase(),
            operators,
        })
    }

    /// Bare address of a room.
    #[must_use]
    pub fn room_jid(&self, room: &str) -> Jid {
        Jid::new(Some(room), &self.conference_host, None)
    }

    /// Our occupant address in a room.
    #[must_use]
    pub fn occupant_jid(&self, room: &str) -> Jid {
        Jid::new(Some(room), &self.conference_host, Some(&self.nick))
    }
}

/// Counters reported in status presence and by the read API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelayStats {
    pub alerts_routed: u64,
    pub room_messages_sent: u64,
    pub deliveries_started: u64,
    pub deliveries_succeeded: u64,
    pub deliveries_failed: u64,
    pub accounts_disabled: u64,
    pub reconnects: u64,
}

/// Everything the dispatcher mutates. Only the session loop touches it.
pub struct RelayState {
    pub identity: Identity,
    pub rooms: RoomTracker,
    pub routing: RoutingTable,
    pub accounts: AccountRegistry,
    pub chatlog: ChatLog,
    pub throttle: AlertThrottle,
    pub pings: PingSupervisor,
    pub stats: RelayStats,
    /// Minute of the last status broadcast, so short ping intervals do not
    /// repeat it within the same boundary minute.
    pub last_status_minute: Option<i64>,
}

impl RelayState {
    pub fn new(config: &RelayConfig) -> Result<Self> {
        let identity = Identity::from_config(config)?;
        let mut rooms = RoomTracker::new(identity.nick.clone());
        rooms.add_room(&identity.firehose_room);
        for room in &config.xmpp.rooms {
            rooms.add_room(room);
        }
        Ok(Self {
            identity,
            rooms,
            routing: RoutingTable::new(),
            accounts: AccountRegistry::new(),
            chatlog: ChatLog::new(),
            throttle: AlertThrottle::new(config.alerts.max_per_window, config.alerts.window()),
            pings: PingSupervisor::new(config.supervisor.max_outstanding_pings),
            stats: RelayStats::default(),
            last_status_minute: None,
        })
    }

    /// Channels a room subscribes to.
    pub fn room_channels(&self, room: &str) -> BTreeSet<Channel> {
        self.routing
            .channels_for(DestinationKind::Room, &room.to_lowercase())
    }
}
