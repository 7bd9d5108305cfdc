//! Chat-protocol side of the relay.
//!
//! Wire encoding belongs to a transport collaborator. This crate holds the
//! parsed stanza model the transport hands over, room membership tracking
//! from presence, the ping supervisor, and outbound message builders.

pub mod builder;
pub mod error;
pub mod jid;
pub mod ping;
pub mod room;
pub mod stanza;
pub mod transport;

pub use {
    error::{Error, Result},
    jid::Jid,
    ping::{PingAction, PingSupervisor, is_status_boundary},
    room::{Occupant, PresenceOutcome, Room, RoomTracker},
    stanza::{
        Affiliation, AlertExtras, Iq, IqPayload, IqType, Message, MessageType, MucItem, MucUser,
        Presence, PresenceType, Role, Stanza,
    },
    transport::{ChannelTransport, MemoryTransport, StanzaTransport, TransportCommand},
};
