//! Outbound stanza constructors.

use crate::{
    jid::Jid,
    stanza::{Iq, IqPayload, IqType, Message, MessageType, Presence, PresenceType},
};

const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

/// Escape text for inclusion in XHTML.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Wrap inner XHTML in a namespaced `<body>`.
#[must_use]
pub fn xhtml_wrap(inner: &str) -> String {
    format!("<body xmlns='{XHTML_NS}'>{inner}</body>")
}

fn message(to: Jid, type_: MessageType, plain: &str, html: Option<&str>) -> Message {
    let inner = html.map_or_else(|| escape(plain), str::to_string);
    Message {
        to: Some(to),
        type_,
        body: Some(plain.to_string()),
        html: Some(xhtml_wrap(&inner)),
        ..Default::default()
    }
}

/// Message to a room. `to` is the bare room address.
#[must_use]
pub fn groupchat(room: Jid, plain: &str, html: Option<&str>) -> Message {
    message(room, MessageType::Groupchat, plain, html)
}

/// One-to-one message.
#[must_use]
pub fn chat(to: Jid, plain: &str, html: Option<&str>) -> Message {
    message(to, MessageType::Chat, plain, html)
}

/// Room copy of a routed alert.
///
/// Body, rich body and side-channel element are carried over from `source`;
/// only the address, the type and the stamped `seqnum` differ.
#[must_use]
pub fn forward(room: Jid, source: &Message, seqnum: u64) -> Message {
    let mut extras = source.extras.clone().unwrap_or_default();
    extras.seqnum = Some(seqnum);
    Message {
        extras: Some(extras),
        ..groupchat(room, source.body(), source.html.as_deref())
    }
}

/// Join presence to `room@conference/nick`.
#[must_use]
pub fn join(occupant: Jid) -> Presence {
    Presence {
        to: Some(occupant),
        ..Default::default()
    }
}

#[must_use]
pub fn leave(occupant: Jid) -> Presence {
    Presence {
        to: Some(occupant),
        type_: PresenceType::Unavailable,
        ..Default::default()
    }
}

/// Broadcast presence carrying a status line.
#[must_use]
pub fn status(text: impl Into<String>) -> Presence {
    Presence {
        status: Some(text.into()),
        ..Default::default()
    }
}

#[must_use]
pub fn ping(to: Jid, id: impl Into<String>) -> Iq {
    Iq {
        from: None,
        to: Some(to),
        id: id.into(),
        type_: IqType::Get,
        payload: Some(IqPayload::Ping),
    }
}

/// Empty result answering a server-initiated ping.
#[must_use]
pub fn pong(request: &Iq) -> Iq {
    Iq {
        from: None,
        to: request.from.clone(),
        id: request.id.clone(),
        type_: IqType::Result,
        payload: None,
    }
}
