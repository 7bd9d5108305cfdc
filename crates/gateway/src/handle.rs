//! Cloneable async handle onto the session loop.
//!
//! The transport feeds stanzas and connection events through it, and the
//! read API queries state by message passing with `oneshot` replies.

use std::collections::{BTreeMap, BTreeSet};

use {
    serde::Serialize,
    tokio::sync::{mpsc, oneshot},
};

use {
    wxrelay_chatlog::ChatLogEntry,
    wxrelay_common::Channel,
    wxrelay_routing::DestinationKind,
    wxrelay_xmpp::Stanza,
};

use crate::{
    Error, Result,
    reload::ReloadSummary,
    session::{Session, SessionEvent},
    state::RelayStats,
};

/// Routable destinations of one channel, by kind. Disabled accounts are
/// left out.
pub type ChannelRoutes = BTreeMap<DestinationKind, Vec<String>>;

pub enum RelayQuery {
    Recent {
        room: String,
        since: u64,
        reply: oneshot::Sender<Vec<ChatLogEntry>>,
    },
    Subscriptions {
        room: String,
        reply: oneshot::Sender<BTreeSet<Channel>>,
    },
    ChannelRoutes {
        channel: Channel,
        reply: oneshot::Sender<ChannelRoutes>,
    },
    Status {
        reply: oneshot::Sender<RelayStatus>,
    },
}

/// Point-in-time summary of the session.
#[derive(Debug, Clone, Serialize)]
pub struct RelayStatus {
    pub connected: bool,
    pub rooms: usize,
    pub joined_rooms: usize,
    pub messages_logged: usize,
    pub seqnum: u64,
    pub outstanding_pings: usize,
    pub stats: RelayStats,
}

#[derive(Clone)]
pub struct RelayHandle {
    tx: mpsc::Sender<SessionEvent>,
}

impl RelayHandle {
    pub(crate) fn new(tx: mpsc::Sender<SessionEvent>) -> Self {
        Self { tx }
    }

    async fn post(&self, event: SessionEvent) -> Result<()> {
        self.tx.send(event).await.map_err(|_| Error::SessionClosed)
    }

    async fn ask<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> RelayQuery) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.post(SessionEvent::Query(build(reply))).await?;
        rx.await.map_err(|_| Error::SessionClosed)
    }

    pub async fn inbound(&self, stanza: Stanza) -> Result<()> {
        self.post(SessionEvent::Stanza(stanza)).await
    }

    pub async fn connected(&self) -> Result<()> {
        self.post(SessionEvent::Connected).await
    }

    pub async fn disconnected(&self) -> Result<()> {
        self.post(SessionEvent::Disconnected).await
    }

    /// Logged entries of a room newer than `since`, newest first.
    pub async fn get_recent(&self, room: &str, since: u64) -> Result<Vec<ChatLogEntry>> {
        let room = room.to_lowercase();
        self.ask(|reply| RelayQuery::Recent { room, since, reply })
            .await
    }

    pub async fn get_subscriptions(&self, room: &str) -> Result<BTreeSet<Channel>> {
        let room = room.to_lowercase();
        self.ask(|reply| RelayQuery::Subscriptions { room, reply })
            .await
    }

    pub async fn channel_routes(&self, channel: Channel) -> Result<ChannelRoutes> {
        self.ask(|reply| RelayQuery::ChannelRoutes { channel, reply })
            .await
    }

    pub async fn status(&self) -> Result<RelayStatus> {
        self.ask(|reply| RelayQuery::Status { reply }).await
    }

    /// Re-read rooms, subscriptions and accounts from the store.
    pub async fn reload_config(&self, always_join: bool) -> Result<ReloadSummary> {
        let (reply, rx) = oneshot::channel();
        self.post(SessionEvent::Reload {
            always_join,
            reply: Some(reply),
        })
        .await?;
        rx.await.map_err(|_| Error::SessionClosed)?
    }

    /// Stop the session after a final snapshot; resolves once written.
    pub async fn shutdown(&self) -> Result<()> {
        let (ack, rx) = oneshot::channel();
        self.post(SessionEvent::Shutdown(Some(ack))).await?;
        rx.await.map_err(|_| Error::SessionClosed)
    }
}

impl Session {
    pub(crate) fn answer(&self, query: RelayQuery) {
        match query {
            RelayQuery::Recent { room, since, reply } => {
                let _ = reply.send(self.state.chatlog.get_recent(&room, since));
            },
            RelayQuery::Subscriptions { room, reply } => {
                let _ = reply.send(self.state.room_channels(&room));
            },
            RelayQuery::ChannelRoutes { channel, reply } => {
                let _ = reply.send(self.channel_routes(&channel));
            },
            RelayQuery::Status { reply } => {
                let _ = reply.send(RelayStatus {
                    connected: self.connected,
                    rooms: self.state.rooms.room_count(),
                    joined_rooms: self.state.rooms.joined_count(),
                    messages_logged: self.state.chatlog.message_count(),
                    seqnum: self.state.chatlog.current_seqnum(),
                    outstanding_pings: self.state.pings.outstanding(),
                    stats: self.state.stats,
                });
            },
        }
    }

    fn channel_routes(&self, channel: &Channel) -> ChannelRoutes {
        DestinationKind::ALL
            .into_iter()
            .map(|kind| {
                let subscribers = self.state.routing.subscribers(kind, channel);
                let routable = subscribers
                    .into_iter()
                    .filter(|id| match kind.platform() {
                        None => true,
                        Some(platform) => self
                            .state
                            .accounts
                            .get(platform, id)
                            .is_none_or(|a| a.is_routable()),
                    })
                    .collect();
                (kind, routable)
            })
            .collect()
    }
}
