use std::collections::BTreeSet;

use {
    serde::Serialize,
    tracing::{debug, info},
};

use {
    wxrelay_platforms::{AccountRegistry, PlatformAccount},
    wxrelay_routing::{RoutingTable, SubscriptionStore},
    wxrelay_xmpp::{Stanza, builder},
};

use crate::{Result, session::Session};

/// Routing state as read from the store.
#[derive(Debug, Clone, Default)]
pub struct ReloadData {
    pub rooms: Vec<String>,
    pub routing: RoutingTable,
    pub accounts: Vec<PlatformAccount>,
}

impl ReloadData {
    pub async fn load(store: &dyn SubscriptionStore) -> Result<Self> {
        Ok(Self {
            rooms: store.load_rooms().await?,
            routing: store.load_routing().await?,
            accounts: store.load_accounts().await?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReloadSummary {
    /// Rooms added by this reload.
    pub added: Vec<String>,
    /// Rooms dropped and left.
    pub removed: Vec<String>,
    pub rooms: usize,
    pub subscriptions: usize,
    pub accounts: usize,
}

impl Session {
    /// Replace routing state and reconcile the room set.
    ///
    /// Configured rooms, store rooms and the firehose room are kept; any
    /// other tracked room is left. When connected, new rooms are joined, and
    /// with `always_join` every room is re-joined.
    pub(crate) fn apply_reload(&mut self, data: ReloadData, always_join: bool) -> ReloadSummary {
        let desired: BTreeSet<String> = self
            .config
            .xmpp
            .rooms
            .iter()
            .chain(data.rooms.iter())
            .map(|r| r.to_lowercase())
            .chain(std::iter::once(self.state.identity.firehose_room.clone()))
            .collect();
        let current: BTreeSet<String> =
            self.state.rooms.room_names().map(str::to_string).collect();

        let removed: Vec<String> = current.difference(&desired).cloned().collect();
        let added: Vec<String> = desired.difference(&current).cloned().collect();

        for room in &removed {
            if self.connected && self.state.rooms.is_joined(room) {
                let occupant = self.state.identity.occupant_jid(room);
                self.send(Stanza::Presence(builder::leave(occupant)));
            }
            self.state.rooms.remove_room(room);
            info!(room, "room dropped from configuration");
        }
        for room in &added {
            self.state.rooms.add_room(room);
            debug!(room, "room added");
        }

        self.state.routing = data.routing;
        let accounts: AccountRegistry = data.accounts.into_iter().collect();
        self.state.accounts = accounts;

        if self.connected {
            let to_join: Vec<String> = if always_join {
                desired.iter().cloned().collect()
            } else {
                added.clone()
            };
            for room in to_join {
                self.join_room(&room);
            }
        }

        let summary = ReloadSummary {
            added,
            removed,
            rooms: self.state.rooms.room_count(),
            subscriptions: self.state.routing.len(),
            accounts: self.state.accounts.len(),
        };
        info!(
            rooms = summary.rooms,
            subscriptions = summary.subscriptions,
            accounts = summary.accounts,
            "routing state loaded"
        );
        summary
    }
}
