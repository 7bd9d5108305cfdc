//! Boundary to the stanza transport.

use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

use {tokio::sync::mpsc, tracing::trace};

use crate::{
    Error, Result,
    stanza::{Message, Stanza},
};

/// Sends parsed stanzas; the implementation owns encoding and the socket.
pub trait StanzaTransport: Send + Sync {
    fn send(&self, stanza: Stanza) -> Result<()>;

    /// Drop the current connection. Reconnecting is the transport's job;
    /// it reports back with a fresh `Connected` event.
    fn teardown(&self);
}

/// Commands produced by a [`ChannelTransport`].
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCommand {
    Send(Stanza),
    Teardown,
}

/// Forwards stanzas to a task that owns the real connection.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<TransportCommand>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TransportCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StanzaTransport for ChannelTransport {
    fn send(&self, stanza: Stanza) -> Result<()> {
        trace!(?stanza, "outbound stanza");
        self.tx
            .send(TransportCommand::Send(stanza))
            .map_err(|_| Error::TransportClosed)
    }

    fn teardown(&self) {
        let _ = self.tx.send(TransportCommand::Teardown);
    }
}

/// Records everything sent. For tests.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    sent: Mutex<Vec<Stanza>>,
    teardowns: AtomicUsize,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Stanza> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Sent messages whose `to` matches `to` ignoring resources.
    pub fn messages_to(&self, to: &str) -> Vec<Message> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Stanza::Message(m) => Some(m),
                _ => None,
            })
            .filter(|m| {
                m.to.as_ref()
                    .is_some_and(|jid| jid.bare().to_string() == to)
            })
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn teardowns(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }
}

impl StanzaTransport for MemoryTransport {
    fn send(&self, stanza: Stanza) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(stanza);
        Ok(())
    }

    fn teardown(&self) {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
    }
}
