//! Fixtures shared by the unit tests of this crate.

use std::{collections::HashMap, sync::Arc};

use {
    wxrelay_chatlog::InMemorySnapshotStore,
    wxrelay_config::RelayConfig,
    wxrelay_platforms::delivery_log::InMemoryDeliveryLog,
    wxrelay_routing::InMemoryStore,
    wxrelay_xmpp::{
        Affiliation, AlertExtras, Jid, MemoryTransport, Message, MessageType, MucItem, MucUser,
        Presence, Role, Stanza,
    },
};

use crate::{services::Services, session::Session};

pub(crate) fn session_with(configure: impl FnOnce(&mut RelayConfig)) -> (Session, Arc<MemoryTransport>) {
    let mut config = RelayConfig::default();
    config.xmpp.operator_jids = vec!["ops@localhost".into()];
    config.xmpp.rooms = vec!["dmxchat".into()];
    configure(&mut config);
    let transport = Arc::new(MemoryTransport::new());
    let services = Services {
        transport: Arc::clone(&transport) as _,
        store: Arc::new(InMemoryStore::new()),
        delivery_log: Arc::new(InMemoryDeliveryLog::new()),
        snapshots: Arc::new(InMemorySnapshotStore::new()),
        outbounds: HashMap::new(),
        product_lookup: None,
    };
    let (session, _handle) = Session::new(config, services).unwrap_or_else(|e| panic!("{e}"));
    (session, transport)
}

pub(crate) fn session() -> (Session, Arc<MemoryTransport>) {
    session_with(|_| {})
}

fn jid(raw: &str) -> Jid {
    raw.parse().unwrap_or_else(|e| panic!("{raw}: {e}"))
}

/// Confirm our own presence in `room`.
pub(crate) fn join_room(session: &mut Session, room: &str) {
    session.state.rooms.add_room(room);
    let nick = session.state.identity.nick.clone();
    session.handle_stanza(Stanza::Presence(Presence {
        from: Some(jid(&format!("{room}@conference.localhost/{nick}"))),
        muc: Some(MucUser {
            item: MucItem {
                affiliation: Affiliation::Member,
                role: Role::Participant,
                jid: None,
            },
            status_codes: vec![MucUser::SELF_PRESENCE],
        }),
        ..Default::default()
    }));
}

pub(crate) fn occupant_presence(
    room: &str,
    nick: &str,
    real: Option<&str>,
    affiliation: Affiliation,
    role: Role,
) -> Stanza {
    Stanza::Presence(Presence {
        from: Some(jid(&format!("{room}@conference.localhost/{nick}"))),
        muc: Some(MucUser {
            item: MucItem {
                affiliation,
                role,
                jid: real.map(jid),
            },
            status_codes: Vec::new(),
        }),
        ..Default::default()
    })
}

pub(crate) fn groupchat(room: &str, nick: &str, body: &str) -> Stanza {
    Stanza::Message(Message {
        from: Some(jid(&format!("{room}@conference.localhost/{nick}"))),
        type_: MessageType::Groupchat,
        body: Some(body.into()),
        ..Default::default()
    })
}

pub(crate) fn private(from: &str, body: &str) -> Stanza {
    Stanza::Message(Message {
        from: Some(jid(from)),
        type_: MessageType::Chat,
        body: Some(body.into()),
        ..Default::default()
    })
}

/// An alert from the ingest identity.
pub(crate) fn alert(body: &str, extras: AlertExtras) -> Stanza {
    Stanza::Message(Message {
        from: Some(jid("wxrelay_ingest@localhost/feed")),
        type_: MessageType::Chat,
        body: Some(body.into()),
        extras: Some(extras),
        ..Default::default()
    })
}

/// The room's echo of a groupchat message we sent, as seen under `nick`.
pub(crate) fn echo_of(sent: &Message, nick: &str) -> Stanza {
    let room = sent
        .to
        .as_ref()
        .map(|to| to.bare().to_string())
        .unwrap_or_else(|| panic!("message has no recipient"));
    Stanza::Message(Message {
        from: Some(jid(&format!("{room}/{nick}"))),
        to: None,
        ..sent.clone()
    })
}

/// Groupchat messages the session sent, in order.
pub(crate) fn room_messages(transport: &MemoryTransport) -> Vec<Message> {
    transport
        .sent()
        .into_iter()
        .filter_map(|stanza| match stanza {
            Stanza::Message(m) if m.type_ == MessageType::Groupchat => Some(m),
            _ => None,
        })
        .collect()
}
