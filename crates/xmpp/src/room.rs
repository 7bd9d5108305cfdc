//! Per-room membership and occupant roster, driven by MUC presence.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info};

use crate::{
    Error, Result,
    jid::Jid,
    stanza::{Affiliation, MucUser, Presence, PresenceType, Role},
};

/// One occupant as last reported. Replaced wholesale on every presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occupant {
    pub nick: String,
    pub jid: Option<Jid>,
    pub affiliation: Affiliation,
    pub role: Role,
}

impl Occupant {
    /// Owners and admins may manage subscriptions.
    #[must_use]
    pub fn is_privileged(&self) -> bool {
        matches!(self.affiliation, Affiliation::Owner | Affiliation::Admin)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Room {
    pub name: String,
    pub joined: bool,
    pub occupants: HashMap<String, Occupant>,
}

/// Effect of one presence on room state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceOutcome {
    /// Our own presence confirmed; the room is now joined.
    Joined,
    /// We left or were removed.
    Left,
    /// Roster updated only.
    Occupant,
}

/// Tracks the rooms the relay is configured for.
#[derive(Debug, Clone)]
pub struct RoomTracker {
    own_nick: String,
    rooms: BTreeMap<String, Room>,
}

impl RoomTracker {
    pub fn new(own_nick: impl Into<String>) -> Self {
        Self {
            own_nick: own_nick.into(),
            rooms: BTreeMap::new(),
        }
    }

    pub fn own_nick(&self) -> &str {
        &self.own_nick
    }

    /// Register a configured room, unjoined. Returns `false` if already known.
    pub fn add_room(&mut self, name: &str) -> bool {
        let name = name.to_lowercase();
        if self.rooms.contains_key(&name) {
            return false;
        }
        self.rooms.insert(name.clone(), Room {
            name,
            ..Default::default()
        });
        true
    }

    /// Forget a room dropped from configuration.
    pub fn remove_room(&mut self, name: &str) -> Option<Room> {
        self.rooms.remove(&name.to_lowercase())
    }

    pub fn room(&self, name: &str) -> Option<&Room> {
        self.rooms.get(&name.to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rooms.contains_key(&name.to_lowercase())
    }

    pub fn is_joined(&self, name: &str) -> bool {
        self.room(name).is_some_and(|r| r.joined)
    }

    pub fn occupant(&self, room: &str, nick: &str) -> Option<&Occupant> {
        self.room(room).and_then(|r| r.occupants.get(nick))
    }

    pub fn room_names(&self) -> impl Iterator<Item = &str> {
        self.rooms.keys().map(String::as_str)
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    #[must_use]
    pub fn joined_count(&self) -> usize {
        self.rooms.values().filter(|r| r.joined).count()
    }

    /// Force a room to unjoined, e.g. before a rejoin.
    pub fn vacate(&mut self, name: &str) {
        if let Some(room) = self.rooms.get_mut(&name.to_lowercase()) {
            room.joined = false;
            room.occupants.clear();
        }
    }

    /// Session lost: nothing is joined any more.
    pub fn mark_all_unjoined(&mut self) {
        for room in self.rooms.values_mut() {
            room.joined = false;
            room.occupants.clear();
        }
    }

    /// Apply a MUC presence.
    ///
    /// The occupant entry is always replaced. Our own presence with the
    /// self-presence code joins the room; our own presence with no
    /// affiliation and no role (or unavailable) leaves it.
    pub fn on_presence(&mut self, presence: &Presence) -> Result<PresenceOutcome> {
        let from = presence
            .from
            .as_ref()
            .ok_or_else(|| Error::malformed("presence without from"))?;
        let room_name = from
            .node()
            .ok_or_else(|| Error::malformed(format!("presence from non-room {from}")))?;
        let nick = from
            .resource()
            .ok_or_else(|| Error::malformed(format!("room presence without nick: {from}")))?;
        let own_nick = self.own_nick.clone();
        let room = self
            .rooms
            .get_mut(room_name)
            .ok_or_else(|| Error::UnknownRoom {
                room: room_name.to_string(),
            })?;

        let muc = presence.muc.clone().unwrap_or_default();
        let mut occupant = Occupant {
            nick: nick.to_string(),
            jid: muc.item.jid.clone(),
            affiliation: muc.item.affiliation,
            role: muc.item.role,
        };
        if presence.type_ == PresenceType::Unavailable {
            occupant.role = Role::None;
        }
        debug!(
            room = %room.name,
            nick,
            affiliation = ?occupant.affiliation,
            role = ?occupant.role,
            "occupant updated"
        );

        let is_self = muc.has_status(MucUser::SELF_PRESENCE) || nick == own_nick;
        let gone = occupant.affiliation == Affiliation::None && occupant.role == Role::None;
        let left = is_self && (gone || presence.type_ == PresenceType::Unavailable);
        room.occupants.insert(nick.to_string(), occupant);

        if left {
            room.joined = false;
            info!(room = %room.name, "left room");
            return Ok(PresenceOutcome::Left);
        }
        if is_self && muc.has_status(MucUser::SELF_PRESENCE) {
            if !room.joined {
                info!(room = %room.name, "joined room");
            }
            room.joined = true;
            return Ok(PresenceOutcome::Joined);
        }
        Ok(PresenceOutcome::Occupant)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::stanza::MucItem};

    fn presence(from: &str, affiliation: Affiliation, role: Role, codes: &[u16]) -> Presence {
        Presence {
            from: Some(from.parse().unwrap()),
            muc: Some(MucUser {
                item: MucItem {
                    affiliation,
                    role,
                    jid: Some("akrherz@weather.im/laptop".parse().unwrap()),
                },
                status_codes: codes.to_vec(),
            }),
            ..Default::default()
        }
    }

    fn tracker() -> RoomTracker {
        let mut t = RoomTracker::new("iembot");
        t.add_room("dmxchat");
        t
    }

    #[test]
    fn self_presence_joins_then_leaves() {
        let mut t = tracker();
        assert!(!t.is_joined("dmxchat"));

        let joined = t
            .on_presence(&presence(
                "dmxchat@conference.weather.im/iembot",
                Affiliation::Owner,
                Role::Moderator,
                &[110],
            ))
            .unwrap();
        assert_eq!(joined, PresenceOutcome::Joined);
        assert!(t.is_joined("dmxchat"));

        let left = t
            .on_presence(&presence(
                "dmxchat@conference.weather.im/iembot",
                Affiliation::None,
                Role::None,
                &[110],
            ))
            .unwrap();
        assert_eq!(left, PresenceOutcome::Left);
        assert!(!t.is_joined("dmxchat"));
        assert_eq!(t.occupant("dmxchat", "iembot").unwrap().role, Role::None);
    }

    #[test]
    fn own_nick_without_status_code_does_not_join() {
        let mut t = tracker();
        let outcome = t
            .on_presence(&presence(
                "dmxchat@conference.weather.im/iembot",
                Affiliation::Owner,
                Role::Moderator,
                &[],
            ))
            .unwrap();
        assert_eq!(outcome, PresenceOutcome::Occupant);
        assert!(!t.is_joined("dmxchat"));
    }

    #[test]
    fn other_occupants_are_overwritten_not_merged() {
        let mut t = tracker();
        t.on_presence(&presence(
            "dmxchat@conference.weather.im/akrherz",
            Affiliation::Admin,
            Role::Moderator,
            &[],
        ))
        .unwrap();
        assert!(t.occupant("dmxchat", "akrherz").unwrap().is_privileged());

        let mut demoted = presence(
            "dmxchat@conference.weather.im/akrherz",
            Affiliation::Member,
            Role::Participant,
            &[],
        );
        if let Some(muc) = demoted.muc.as_mut() {
            muc.item.jid = None;
        }
        t.on_presence(&demoted).unwrap();
        let occ = t.occupant("dmxchat", "akrherz").unwrap();
        assert!(!occ.is_privileged());
        assert!(occ.jid.is_none());
    }

    #[test]
    fn unknown_room_is_an_error() {
        let mut t = tracker();
        let err = t
            .on_presence(&presence(
                "nowhere@conference.weather.im/akrherz",
                Affiliation::Member,
                Role::Participant,
                &[],
            ))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownRoom { room } if room == "nowhere"));
    }

    #[test]
    fn disconnect_unjoins_everything() {
        let mut t = tracker();
        t.add_room("fsdchat");
        t.on_presence(&presence(
            "dmxchat@conference.weather.im/iembot",
            Affiliation::Owner,
            Role::Moderator,
            &[110],
        ))
        .unwrap();
        assert_eq!(t.joined_count(), 1);
        t.mark_all_unjoined();
        assert_eq!(t.joined_count(), 0);
        assert_eq!(t.room_count(), 2);
        assert!(t.occupant("dmxchat", "iembot").is_none());
    }
}
