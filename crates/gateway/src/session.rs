//! The single session loop.
//!
//! All room, routing and chat-log state lives in [`RelayState`] and is only
//! mutated here. Platform calls, store writes, lookups and snapshot writes
//! run on spawned tasks and report back through the inbox.

use std::{future::Future, ops::ControlFlow, sync::Arc};

use {
    chrono::{DateTime, Timelike, Utc},
    tokio::{
        sync::{mpsc, oneshot},
        task::JoinHandle,
        time::{Instant, interval_at},
    },
    tracing::{debug, error, info, warn},
};

use {
    wxrelay_config::RelayConfig,
    wxrelay_platforms::RetryPolicy,
    wxrelay_xmpp::{Jid, Message, PingAction, Stanza, builder, is_status_boundary},
};

use crate::{
    Result,
    delivery::DeliveryCompletion,
    handle::{RelayHandle, RelayQuery},
    reload::{ReloadData, ReloadSummary},
    services::Services,
    state::RelayState,
};

/// Inbox capacity. Workers block on send when the loop falls behind.
const INBOX_CAPACITY: usize = 1024;

/// Everything that can wake the session loop.
pub enum SessionEvent {
    /// A parsed stanza from the transport.
    Stanza(Stanza),
    /// The transport (re)established the session.
    Connected,
    /// The transport lost the session.
    Disconnected,
    /// A platform delivery finished, successfully or not.
    Delivery(Box<DeliveryCompletion>),
    /// Long-form product text resolved for a logged entry.
    ProductText {
        room: String,
        seqnum: u64,
        text: String,
    },
    Query(RelayQuery),
    /// Re-read rooms, subscriptions and accounts from the store.
    Reload {
        always_join: bool,
        reply: Option<oneshot::Sender<Result<ReloadSummary>>>,
    },
    /// Store contents loaded by a reload task.
    Reloaded {
        data: Result<Box<ReloadData>>,
        always_join: bool,
        reply: Option<oneshot::Sender<Result<ReloadSummary>>>,
    },
    /// Write a final snapshot and stop.
    Shutdown(Option<oneshot::Sender<()>>),
}

pub struct Session {
    pub(crate) state: RelayState,
    pub(crate) services: Services,
    pub(crate) config: Arc<RelayConfig>,
    pub(crate) retry: RetryPolicy,
    pub(crate) connected: bool,
    pub(crate) inbox_tx: mpsc::Sender<SessionEvent>,
    inbox_rx: mpsc::Receiver<SessionEvent>,
    /// Periodic snapshot write still in flight, if any.
    snapshot_task: Option<JoinHandle<()>>,
}

impl Session {
    pub fn new(config: RelayConfig, services: Services) -> Result<(Self, RelayHandle)> {
        let state = RelayState::new(&config)?;
        let (inbox_tx, inbox_rx) = mpsc::channel(INBOX_CAPACITY);
        let retry = RetryPolicy {
            max_attempts: config.delivery.max_attempts,
            delay: config.delivery.retry_delay(),
        };
        let handle = RelayHandle::new(inbox_tx.clone());
        Ok((
            Self {
                state,
                services,
                config: Arc::new(config),
                retry,
                connected: false,
                inbox_tx,
                inbox_rx,
                snapshot_task: None,
            },
            handle,
        ))
    }

    /// Restore the chat log and load routing state.
    ///
    /// Load failures are logged and leave the affected state empty.
    pub async fn bootstrap(&mut self) {
        match self.services.snapshots.load().await {
            Ok(Some(snapshot)) => {
                self.state.chatlog.restore(snapshot);
                info!(
                    seqnum = self.state.chatlog.current_seqnum(),
                    rooms = self.state.chatlog.room_count(),
                    "chat log restored"
                );
            },
            Ok(None) => debug!("no chat log snapshot yet"),
            Err(e) => warn!(error = %e, "failed to load chat log snapshot, starting empty"),
        }

        match ReloadData::load(self.services.store.as_ref()).await {
            Ok(data) => {
                self.apply_reload(data, false);
            },
            Err(e) => warn!(error = %e, "failed to load routing state, starting empty"),
        }
    }

    pub fn state(&self) -> &RelayState {
        &self.state
    }

    /// Drive the loop until shutdown.
    pub async fn run(mut self) {
        let supervisor = self.config.supervisor.clone();
        let mut ping_tick = interval_at(
            Instant::now() + supervisor.ping_interval(),
            supervisor.ping_interval(),
        );
        let mut snapshot_tick = interval_at(
            Instant::now() + supervisor.snapshot_interval(),
            supervisor.snapshot_interval(),
        );
        info!(nick = %self.state.identity.nick, "relay session started");

        loop {
            tokio::select! {
                event = self.inbox_rx.recv() => {
                    let Some(event) = event else { break };
                    if let ControlFlow::Break(ack) = self.handle_event(event) {
                        self.write_snapshot().await;
                        if let Some(ack) = ack {
                            let _ = ack.send(());
                        }
                        break;
                    }
                },
                _ = ping_tick.tick() => self.on_ping_tick(),
                _ = snapshot_tick.tick() => self.spawn_snapshot(),
            }
        }
        info!("relay session stopped");
    }

    pub(crate) fn handle_event(
        &mut self,
        event: SessionEvent,
    ) -> ControlFlow<Option<oneshot::Sender<()>>> {
        match event {
            SessionEvent::Stanza(stanza) => self.handle_stanza(stanza),
            SessionEvent::Connected => self.on_connected(),
            SessionEvent::Disconnected => self.on_disconnected(),
            SessionEvent::Delivery(completion) => self.on_delivery(*completion),
            SessionEvent::ProductText { room, seqnum, text } => {
                if !self.state.chatlog.attach_product_text(&room, seqnum, text) {
                    debug!(room, seqnum, "entry evicted before product text arrived");
                }
            },
            SessionEvent::Query(query) => self.answer(query),
            SessionEvent::Reload { always_join, reply } => self.spawn_reload(always_join, reply),
            SessionEvent::Reloaded {
                data,
                always_join,
                reply,
            } => {
                let result = data.map(|data| self.apply_reload(*data, always_join));
                if let Err(e) = &result {
                    warn!(error = %e, "reload failed, keeping current state");
                }
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            },
            SessionEvent::Shutdown(ack) => return ControlFlow::Break(ack),
        }
        ControlFlow::Continue(())
    }

    fn on_connected(&mut self) {
        info!(rooms = self.state.rooms.room_count(), "session connected, joining rooms");
        self.connected = true;
        self.state.pings.reset();
        let rooms: Vec<String> = self.state.rooms.room_names().map(str::to_string).collect();
        for room in rooms {
            self.join_room(&room);
        }
    }

    fn on_disconnected(&mut self) {
        warn!("session disconnected");
        self.connected = false;
        self.state.rooms.mark_all_unjoined();
        self.state.pings.reset();
    }

    pub(crate) fn join_room(&mut self, room: &str) {
        self.state.rooms.vacate(room);
        let occupant = self.state.identity.occupant_jid(room);
        debug!(room, "joining");
        self.send(Stanza::Presence(builder::join(occupant)));
    }

    pub(crate) fn on_ping_tick(&mut self) {
        if !self.connected {
            return;
        }
        match self.state.pings.tick() {
            PingAction::Ping(id) => {
                let server = Jid::new(None, &self.state.identity.domain, None);
                self.send(Stanza::Iq(builder::ping(server, id)));
            },
            PingAction::Teardown { outstanding } => {
                self.operator_alert(&format!(
                    "{outstanding} pings unanswered, forcing reconnect"
                ));
                self.services.transport.teardown();
                self.state.stats.reconnects += 1;
                self.on_disconnected();
                return;
            },
        }
        self.maybe_broadcast_status();
    }

    fn maybe_broadcast_status(&mut self) {
        self.maybe_broadcast_status_at(Utc::now());
    }

    /// At most one status presence per qualifying wall-clock minute.
    pub(crate) fn maybe_broadcast_status_at(&mut self, now: DateTime<Utc>) {
        let minute_stamp = now.timestamp() / 60;
        if !is_status_boundary(now.minute(), self.config.supervisor.status_every_minutes)
            || self.state.last_status_minute == Some(minute_stamp)
        {
            return;
        }
        self.state.last_status_minute = Some(minute_stamp);
        let text = format!(
            "Relaying for {} rooms, {} messages logged",
            self.state.rooms.joined_count(),
            self.state.chatlog.message_count()
        );
        self.send(Stanza::Presence(builder::status(text)));
    }

    /// Send through the transport, logging failures.
    pub(crate) fn send(&self, stanza: Stanza) {
        if let Err(e) = self.services.transport.send(stanza) {
            warn!(error = %e, "failed to send stanza");
        }
    }

    /// Post to a room. Rooms we have not joined are skipped.
    pub(crate) fn send_room(&mut self, room: &str, plain: &str, html: Option<&str>) -> bool {
        let to = self.state.identity.room_jid(room);
        self.post_to_room(room, builder::groupchat(to, plain, html))
    }

    pub(crate) fn post_to_room(&mut self, room: &str, msg: Message) -> bool {
        if !self.state.rooms.is_joined(room) {
            warn!(room, "not joined, dropping room message");
            return false;
        }
        self.send(Stanza::Message(msg));
        self.state.stats.room_messages_sent += 1;
        true
    }

    pub(crate) fn send_chat(&self, to: Jid, plain: &str) {
        self.send(Stanza::Message(builder::chat(to, plain, None)));
    }

    /// Log an operational alert and, within the throttle, message operators.
    pub(crate) fn operator_alert(&mut self, text: &str) {
        error!(alert = text, "operational alert");
        if self.state.identity.operators.is_empty() {
            return;
        }
        if !self.state.throttle.try_acquire() {
            debug!("operator alert throttled");
            return;
        }
        for operator in self.state.identity.operators.clone() {
            self.send_chat(operator, text);
        }
    }

    /// Run a store write off the loop; failures are logged.
    pub(crate) fn spawn_store_write<F>(&self, what: &'static str, fut: F)
    where
        F: Future<Output = wxrelay_routing::Result<()>> + Send + 'static,
    {
        tokio::spawn(async move {
            if let Err(e) = fut.await {
                warn!(operation = what, error = %e, "store write failed");
            }
        });
    }

    fn spawn_reload(
        &self,
        always_join: bool,
        reply: Option<oneshot::Sender<Result<ReloadSummary>>>,
    ) {
        let store = Arc::clone(&self.services.store);
        let tx = self.inbox_tx.clone();
        tokio::spawn(async move {
            let data = ReloadData::load(store.as_ref()).await.map(Box::new);
            let _ = tx
                .send(SessionEvent::Reloaded {
                    data,
                    always_join,
                    reply,
                })
                .await;
        });
    }

    /// Save a point-in-time copy without blocking the loop. At most one
    /// write is in flight; a tick that finds the previous one running is
    /// skipped.
    pub(crate) fn spawn_snapshot(&mut self) {
        if self.snapshot_task.as_ref().is_some_and(|t| !t.is_finished()) {
            debug!("previous chat log snapshot still running, skipping tick");
            return;
        }
        let snapshot = self.state.chatlog.snapshot();
        let store = Arc::clone(&self.services.snapshots);
        self.snapshot_task = Some(tokio::spawn(async move {
            if let Err(e) = store.save(&snapshot).await {
                warn!(error = %e, "chat log snapshot failed, will retry next interval");
            }
        }));
    }

    /// Final write at shutdown, after any periodic write has landed so the
    /// older copy cannot replace this one.
    pub(crate) async fn write_snapshot(&mut self) {
        if let Some(task) = self.snapshot_task.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "periodic chat log snapshot task failed");
        }
        let snapshot = self.state.chatlog.snapshot();
        match self.services.snapshots.save(&snapshot).await {
            Ok(()) => info!(seqnum = snapshot.seqnum, "final chat log snapshot written"),
            Err(e) => warn!(error = %e, "final chat log snapshot failed"),
        }
    }
}
