//! Inbound stanza classification.

use std::sync::Arc;

use {
    chrono::Utc,
    tracing::{debug, info, warn},
};

use {
    wxrelay_chatlog::{EntryDraft, resolve_product_text},
    wxrelay_xmpp::{Iq, IqPayload, IqType, Message, MessageType, Presence, Stanza, builder},
};

use crate::session::{Session, SessionEvent};

/// Reply to anything a private correspondent sends that is not `ping`.
pub const HELP_TEXT: &str = "I am the weather alert relay. I route alert products to chat rooms \
                             and social media. In a room, address me as \"<nick>: <command>\" with \
                             one of: ping, channels list, channels add <list>, channels del \
                             <list>, users.";

pub(crate) fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

impl Session {
    pub(crate) fn handle_stanza(&mut self, stanza: Stanza) {
        match stanza {
            Stanza::Message(msg) => match msg.type_ {
                MessageType::Groupchat => self.on_groupchat(&msg),
                MessageType::Error => {
                    let from = msg.from.as_ref().map(ToString::to_string).unwrap_or_default();
                    self.operator_alert(&format!("error message from {from}: {}", msg.body()));
                },
                _ => self.on_private(&msg),
            },
            Stanza::Presence(presence) => self.on_presence(&presence),
            Stanza::Iq(iq) => self.on_iq(&iq),
        }
    }

    fn on_groupchat(&mut self, msg: &Message) {
        if msg.delayed {
            return;
        }
        let Some(from) = msg.from.as_ref() else {
            debug!("groupchat without sender");
            return;
        };
        let (Some(room), Some(nick)) = (from.node(), from.resource()) else {
            debug!(from = %from, "groupchat not from a room occupant");
            return;
        };
        if !self.state.rooms.contains(room) {
            debug!(room, "message from untracked room");
            return;
        }
        let room = room.to_string();

        if nick == self.state.identity.nick {
            if msg
                .extras
                .as_ref()
                .is_some_and(|x| x.seqnum.is_some() || x.channels.is_some())
            {
                self.log_own_message(&room, nick, msg);
            }
            return;
        }

        let body = msg.body().trim();
        if starts_with_ignore_case(body, "ping") {
            self.send_room(&room, &format!("{nick}: pong"), None);
            return;
        }
        let prefix = format!("{}:", self.state.identity.nick);
        if starts_with_ignore_case(body, &prefix) {
            let command = body[prefix.len()..].trim().to_string();
            self.on_command(&room, nick, &command);
        }
    }

    /// Append our own echoed alert to the room log, resolving product text
    /// in the background. Echoes of routed alerts carry the seqnum taken at
    /// dispatch; anything else marked gets a fresh one.
    fn log_own_message(&mut self, room: &str, nick: &str, msg: &Message) {
        let extras = msg.extras.as_ref();
        let product_id = extras.and_then(|x| x.product_id.clone());
        let draft = EntryDraft {
            timestamp: Utc::now(),
            author: nick.to_string(),
            rendered_body: msg.html.clone().unwrap_or_else(|| msg.body().to_string()),
            product_id: product_id.clone(),
            raw_text: msg.body().to_string(),
        };
        let seqnum = match extras.and_then(|x| x.seqnum) {
            Some(seqnum) => {
                if !self.state.chatlog.insert_at(room, seqnum, draft) {
                    debug!(room, seqnum, "echo already logged");
                    return;
                }
                seqnum
            },
            None => self.state.chatlog.append(room, draft),
        };
        debug!(room, seqnum, "logged room message");

        let (Some(product_id), Some(lookup)) = (product_id, self.services.product_lookup.clone())
        else {
            return;
        };
        let retries = self.config.delivery.product_lookup_retries;
        let interval = self.config.delivery.product_lookup_interval();
        let tx = self.inbox_tx.clone();
        let room = room.to_string();
        tokio::spawn(async move {
            let text =
                resolve_product_text(Arc::as_ref(&lookup), &product_id, retries, interval).await;
            let _ = tx
                .send(SessionEvent::ProductText { room, seqnum, text })
                .await;
        });
    }

    fn on_private(&mut self, msg: &Message) {
        let Some(from) = msg.from.clone() else {
            debug!("private message without sender");
            return;
        };
        let identity = &self.state.identity;

        if from.node().is_none() && from.domain() == identity.domain {
            info!(from = %from, body = msg.body(), "ignoring message from chat service");
            return;
        }

        if from.domain() == identity.conference_host {
            info!(from = %from, "ignoring private message through a room");
            let (Some(room), Some(nick)) = (from.node(), from.resource()) else {
                return;
            };
            let real = self
                .state
                .rooms
                .occupant(room, nick)
                .and_then(|o| o.jid.clone());
            if let Some(real) = real {
                let text = format!(
                    "Hi {nick}, please message me directly at {} rather than through {room}.",
                    self.state.identity.own_jid.bare()
                );
                self.send_chat(real.bare(), &text);
            }
            return;
        }

        if from.same_bare(&identity.ingest) {
            self.route_alert(msg);
            return;
        }

        if starts_with_ignore_case(msg.body().trim(), "ping") {
            self.send_chat(from, "pong");
        } else {
            self.send_chat(from, HELP_TEXT);
        }
    }

    fn on_presence(&mut self, presence: &Presence) {
        let from_room = presence
            .from
            .as_ref()
            .is_some_and(|f| f.domain() == self.state.identity.conference_host);
        if !from_room {
            debug!(from = ?presence.from, "ignoring non-room presence");
            return;
        }
        if let Err(e) = self.state.rooms.on_presence(presence) {
            self.operator_alert(&format!("presence rejected: {e}"));
        }
    }

    fn on_iq(&mut self, iq: &Iq) {
        match iq.type_ {
            IqType::Get if iq.payload == Some(IqPayload::Ping) => {
                self.send(Stanza::Iq(builder::pong(iq)));
            },
            IqType::Result | IqType::Error => {
                if self.state.pings.on_pong(&iq.id).is_none() {
                    debug!(id = %iq.id, "iq response for unknown id");
                }
            },
            _ => warn!(id = %iq.id, "unhandled iq"),
        }
    }
}
