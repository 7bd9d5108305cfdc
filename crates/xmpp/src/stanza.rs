//! Parsed stanzas as exchanged with the transport.
//!
//! These mirror the XML elements the relay cares about; anything else the
//! transport drops before handing stanzas over.

use serde::{Deserialize, Serialize};

use crate::jid::Jid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stanza", rename_all = "lowercase")]
pub enum Stanza {
    Message(Message),
    Presence(Presence),
    Iq(Iq),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Chat,
    Groupchat,
    Error,
    #[default]
    Normal,
    Headline,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Jid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Jid>,
    #[serde(rename = "type", default)]
    pub type_: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Inner XHTML of the rich body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    /// Carries a delay element (MUC history replay).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub delayed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<AlertExtras>,
}

impl Message {
    pub fn body(&self) -> &str {
        self.body.as_deref().unwrap_or_default()
    }
}

/// Side-channel element attached to alerts by the ingest identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertExtras {
    /// Comma-separated channel list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<String>,
    /// Short-form text for the platforms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter_media: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    /// Chat-log sequence number stamped on the room copies of a routed alert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seqnum: Option<u64>,
    #[serde(default)]
    pub nochat: bool,
    #[serde(default)]
    pub notwitter: bool,
    #[serde(default)]
    pub nomastodon: bool,
    #[serde(default)]
    pub noslack: bool,
    #[serde(default)]
    pub nowebhook: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceType {
    #[default]
    Available,
    Unavailable,
    Error,
    Subscribe,
    Subscribed,
    Unsubscribe,
    Unsubscribed,
    Probe,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Affiliation {
    Owner,
    Admin,
    Member,
    Outcast,
    #[default]
    None,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Moderator,
    Participant,
    Visitor,
    #[default]
    None,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MucItem {
    #[serde(default)]
    pub affiliation: Affiliation,
    #[serde(default)]
    pub role: Role,
    /// Real identity, visible to the bot when the room is non-anonymous.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jid: Option<Jid>,
}

/// MUC user extension on a presence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MucUser {
    #[serde(default)]
    pub item: MucItem,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub status_codes: Vec<u16>,
}

impl MucUser {
    /// Presence refers to the receiving occupant itself.
    pub const SELF_PRESENCE: u16 = 110;

    #[must_use]
    pub fn has_status(&self, code: u16) -> bool {
        self.status_codes.contains(&code)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Presence {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Jid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Jid>,
    #[serde(rename = "type", default)]
    pub type_: PresenceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muc: Option<MucUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IqType {
    Get,
    Set,
    Result,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IqPayload {
    Ping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Iq {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Jid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Jid>,
    pub id: String,
    #[serde(rename = "type")]
    pub type_: IqType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<IqPayload>,
}
