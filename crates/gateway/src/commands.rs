//! Admin commands addressed to the relay inside a room.

use std::{collections::BTreeSet, sync::Arc};

use tracing::info;

use {
    wxrelay_common::Channel,
    wxrelay_routing::DestinationKind,
    wxrelay_xmpp::Occupant,
};

use crate::{handlers::HELP_TEXT, session::Session};

/// Channel names of this length or longer are refused.
pub const MAX_CHANNEL_LEN: usize = 24;

pub const DENIED: &str = "Sorry, only room owners and admins may do that.";
pub const NOT_IN_ROSTER: &str =
    "I could not find you in this room's roster. Please leave and rejoin the room.";
pub const NO_REAL_JID: &str =
    "I cannot see your real address in this room, so I cannot send you the user list.";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Ping,
    ChannelsList,
    ChannelsAdd(String),
    ChannelsDel(String),
    Users,
    Unsupported(String),
}

impl Command {
    fn parse(raw: &str) -> Self {
        let lowered = raw.trim().to_lowercase();
        let mut words = lowered.split_whitespace();
        match (words.next(), words.next()) {
            (Some("ping"), _) => Self::Ping,
            (Some("channels"), Some("list")) => Self::ChannelsList,
            (Some("channels"), Some(op @ ("add" | "del"))) => {
                let rest: String = words.collect::<Vec<_>>().join("");
                if op == "add" {
                    Self::ChannelsAdd(rest)
                } else {
                    Self::ChannelsDel(rest)
                }
            },
            (Some("users"), _) => Self::Users,
            _ => Self::Unsupported(raw.trim().to_string()),
        }
    }
}

impl Session {
    pub(crate) fn on_command(&mut self, room: &str, nick: &str, raw: &str) {
        let command = Command::parse(raw);
        info!(room, nick, command = ?command, "room command");
        let reply = match command {
            Command::Ping => "pong".to_string(),
            Command::ChannelsList => self.list_reply(room),
            Command::ChannelsAdd(list) => self
                .privileged(room, nick)
                .map_or_else(|denied| denied.to_string(), |_| self.add_channels(room, &list)),
            Command::ChannelsDel(list) => self
                .privileged(room, nick)
                .map_or_else(|denied| denied.to_string(), |_| self.del_channels(room, &list)),
            Command::Users => self.send_roster(room, nick),
            Command::Unsupported(text) => format!("Unsupported command: '{text}'. {HELP_TEXT}"),
        };
        self.send_room(room, &format!("{nick}: {reply}"), None);
    }

    /// The invoker's occupant record, if they may manage the room.
    fn privileged(&self, room: &str, nick: &str) -> Result<Occupant, &'static str> {
        let occupant = self
            .state
            .rooms
            .occupant(room, nick)
            .ok_or(NOT_IN_ROSTER)?;
        if !occupant.is_privileged() {
            return Err(DENIED);
        }
        Ok(occupant.clone())
    }

    fn list_reply(&self, room: &str) -> String {
        let channels = self.state.room_channels(room);
        if channels.is_empty() {
            "This room is not subscribed to any channels.".to_string()
        } else {
            format!("This room is subscribed to: {}", Channel::join(&channels))
        }
    }

    fn parse_channels(list: &str) -> Result<BTreeSet<Channel>, String> {
        let channels = Channel::parse_list(list).map_err(|e| e.to_string())?;
        if channels.is_empty() {
            return Err("Please give a comma separated list of channels.".to_string());
        }
        if let Some(long) = channels.iter().find(|c| c.len() >= MAX_CHANNEL_LEN) {
            return Err(format!(
                "Channel {long} is too long, names must be under {MAX_CHANNEL_LEN} characters."
            ));
        }
        Ok(channels)
    }

    fn add_channels(&mut self, room: &str, list: &str) -> String {
        let channels = match Self::parse_channels(list) {
            Ok(c) => c,
            Err(reply) => return reply,
        };
        for channel in channels {
            if self
                .state
                .routing
                .subscribe(DestinationKind::Room, channel.clone(), room)
            {
                let store = Arc::clone(&self.services.store);
                let room = room.to_string();
                self.spawn_store_write("add_subscription", async move {
                    store
                        .add_subscription(DestinationKind::Room, &channel, &room)
                        .await
                });
            }
        }
        self.list_reply(room)
    }

    fn del_channels(&mut self, room: &str, list: &str) -> String {
        let channels = match Self::parse_channels(list) {
            Ok(c) => c,
            Err(reply) => return reply,
        };
        for channel in channels {
            if self
                .state
                .routing
                .unsubscribe(DestinationKind::Room, &channel, room)
            {
                let store = Arc::clone(&self.services.store);
                let room = room.to_string();
                self.spawn_store_write("remove_subscription", async move {
                    store
                        .remove_subscription(DestinationKind::Room, &channel, &room)
                        .await
                });
            }
        }
        self.list_reply(room)
    }

    fn send_roster(&mut self, room: &str, nick: &str) -> String {
        let invoker = match self.privileged(room, nick) {
            Ok(o) => o,
            Err(denied) => return denied.to_string(),
        };
        let Some(real) = invoker.jid else {
            return NO_REAL_JID.to_string();
        };
        let Some(tracked) = self.state.rooms.room(room) else {
            return NOT_IN_ROSTER.to_string();
        };
        let mut lines: Vec<String> = tracked
            .occupants
            .values()
            .map(|o| {
                let jid = o
                    .jid
                    .as_ref()
                    .map_or_else(|| "unknown".to_string(), |j| j.bare().to_string());
                format!("{} ({jid}) {:?}/{:?}", o.nick, o.affiliation, o.role)
            })
            .collect();
        lines.sort();
        let text = format!("Users in {room}:\n{}", lines.join("\n"));
        self.send_chat(real.bare(), &text);
        "I sent you the user list privately.".to_string()
    }
}
