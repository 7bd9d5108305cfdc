//! End-to-end scenarios through the public relay handle.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::HashMap,
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    secrecy::Secret,
    wxrelay_chatlog::{InMemorySnapshotStore, RING_CAPACITY, SnapshotStore},
    wxrelay_common::Channel,
    wxrelay_config::RelayConfig,
    wxrelay_gateway::{RelayHandle, Services, start},
    wxrelay_platforms::{
        AccountRegistry, Credentials, DeliveryFailure, DeliveryReceipt, DeliveryRequest,
        PlatformAccount, PlatformKind, PlatformOutbound,
        delivery_log::{DeliveryLog, DeliveryStatus, InMemoryDeliveryLog},
    },
    wxrelay_routing::{DestinationKind, InMemoryStore, RoutingTable, SubscriptionStore},
    wxrelay_xmpp::{
        Affiliation, AlertExtras, Jid, MemoryTransport, Message, MessageType, MucItem, MucUser,
        Presence, Role, Stanza,
    },
};

/// Fails every post with an authorization-class error.
#[derive(Default)]
struct RevokedTwitter {
    calls: AtomicU32,
}

#[async_trait]
impl PlatformOutbound for RevokedTwitter {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Twitter
    }

    async fn deliver(
        &self,
        _account: &PlatformAccount,
        _request: &DeliveryRequest,
    ) -> Result<DeliveryReceipt, DeliveryFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(DeliveryFailure::disable("89", "Invalid or expired token."))
    }
}

struct Harness {
    handle: RelayHandle,
    transport: Arc<MemoryTransport>,
    store: Arc<InMemoryStore>,
    delivery_log: Arc<InMemoryDeliveryLog>,
    snapshots: Arc<InMemorySnapshotStore>,
}

fn jid(raw: &str) -> Jid {
    raw.parse().unwrap()
}

fn config() -> RelayConfig {
    let mut config = RelayConfig::default();
    config.xmpp.operator_jids = vec!["ops@localhost".into()];
    config.delivery.retry_delay_secs = 0;
    config
}

async fn harness_with(
    store: InMemoryStore,
    snapshots: Arc<InMemorySnapshotStore>,
    outbounds: Vec<Arc<dyn PlatformOutbound>>,
) -> Harness {
    let transport = Arc::new(MemoryTransport::new());
    let store = Arc::new(store);
    let delivery_log = Arc::new(InMemoryDeliveryLog::new());
    let services = Services {
        transport: Arc::clone(&transport) as _,
        store: Arc::clone(&store) as _,
        delivery_log: Arc::clone(&delivery_log) as _,
        snapshots: Arc::clone(&snapshots) as _,
        outbounds: outbounds.into_iter().map(|o| (o.kind(), o)).collect::<HashMap<_, _>>(),
        product_lookup: None,
    };
    let (handle, _task) = start(config(), services).await.unwrap();
    handle.connected().await.unwrap();
    Harness {
        handle,
        transport,
        store,
        delivery_log,
        snapshots,
    }
}

async fn harness(store: InMemoryStore) -> Harness {
    harness_with(store, Arc::new(InMemorySnapshotStore::new()), Vec::new()).await
}

fn dmx_store(accounts: AccountRegistry) -> InMemoryStore {
    let mut table = RoutingTable::new();
    let dmx = Channel::parse("DMX").unwrap();
    table.subscribe(DestinationKind::Room, dmx.clone(), "dmxchat");
    table.subscribe(DestinationKind::Twitter, dmx, "dmxwx");
    InMemoryStore::with_state(vec!["dmxchat".to_string()], table, accounts)
}

fn presence(room: &str, nick: &str, affiliation: Affiliation, role: Role, codes: &[u16]) -> Stanza {
    Stanza::Presence(Presence {
        from: Some(jid(&format!("{room}@conference.localhost/{nick}"))),
        muc: Some(MucUser {
            item: MucItem {
                affiliation,
                role,
                jid: None,
            },
            status_codes: codes.to_vec(),
        }),
        ..Default::default()
    })
}

async fn join(h: &Harness, room: &str) {
    h.handle
        .inbound(presence(room, "wxrelay", Affiliation::Member, Role::Participant, &[
            MucUser::SELF_PRESENCE,
        ]))
        .await
        .unwrap();
}

fn alert(body: &str, extras: AlertExtras) -> Stanza {
    Stanza::Message(Message {
        from: Some(jid("wxrelay_ingest@localhost/feed")),
        type_: MessageType::Chat,
        body: Some(body.into()),
        extras: Some(extras),
        ..Default::default()
    })
}

fn room_message(room: &str, nick: &str, body: &str, extras: Option<AlertExtras>) -> Stanza {
    Stanza::Message(Message {
        from: Some(jid(&format!("{room}@conference.localhost/{nick}"))),
        type_: MessageType::Groupchat,
        body: Some(body.into()),
        extras,
        ..Default::default()
    })
}

/// Route a DMX alert, then hand every room copy back as the room echoes it.
async fn route_and_echo(h: &Harness, body: &str) {
    h.transport.clear();
    h.handle
        .inbound(alert(body, AlertExtras {
            channels: Some("DMX".into()),
            ..Default::default()
        }))
        .await
        .unwrap();
    h.handle.status().await.unwrap();

    let copies: Vec<Message> = h
        .transport
        .sent()
        .into_iter()
        .filter_map(|stanza| match stanza {
            Stanza::Message(m) if m.type_ == MessageType::Groupchat => Some(m),
            _ => None,
        })
        .collect();
    assert!(!copies.is_empty(), "alert reached no room");
    for copy in copies {
        let room = copy.to.as_ref().unwrap().bare().to_string();
        h.handle
            .inbound(Stanza::Message(Message {
                from: Some(jid(&format!("{room}/wxrelay"))),
                to: None,
                ..copy
            }))
            .await
            .unwrap();
    }
}

/// Poll until `check` holds; workers report back asynchronously.
async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn dmx_alert_reaches_firehose_and_dmxchat_once() {
    let h = harness(dmx_store(AccountRegistry::new())).await;
    join(&h, "botstalk").await;
    join(&h, "dmxchat").await;
    h.handle
        .inbound(alert("DMX: Winter Storm Warning until 6 PM", AlertExtras {
            channels: Some("DMX,SVRDMX".into()),
            ..Default::default()
        }))
        .await
        .unwrap();
    let status = h.handle.status().await.unwrap();
    assert_eq!(status.stats.alerts_routed, 1);

    let firehose = h.transport.messages_to("botstalk@conference.localhost");
    let dmxchat = h.transport.messages_to("dmxchat@conference.localhost");
    assert_eq!(firehose.len(), 1);
    assert_eq!(dmxchat.len(), 1);
    assert_eq!(dmxchat[0].body(), "DMX: Winter Storm Warning until 6 PM");
    for copy in firehose.iter().chain(&dmxchat) {
        let extras = copy.extras.as_ref().unwrap();
        assert_eq!(extras.channels.as_deref(), Some("DMX,SVRDMX"));
        assert_eq!(extras.seqnum, Some(1));
    }
}

#[tokio::test]
async fn firehose_and_room_echoes_share_one_seqnum() {
    let h = harness(dmx_store(AccountRegistry::new())).await;
    join(&h, "botstalk").await;
    join(&h, "dmxchat").await;
    route_and_echo(&h, "DMX: Winter Storm Warning").await;
    route_and_echo(&h, "DMX: Flood Watch").await;

    let status = h.handle.status().await.unwrap();
    assert_eq!(status.seqnum, 2);
    for room in ["botstalk", "dmxchat"] {
        let recent = h.handle.get_recent(room, 0).await.unwrap();
        let seqnums: Vec<u64> = recent.iter().map(|e| e.seqnum).collect();
        assert_eq!(seqnums, vec![2, 1], "{room}");
        assert_eq!(recent[0].raw_text, "DMX: Flood Watch");
    }
}

#[tokio::test]
async fn authorization_failure_disables_account() {
    let mut accounts = AccountRegistry::new();
    accounts.insert(PlatformAccount::new("dmxwx", Credentials::Twitter {
        access_token: Secret::new("revoked".into()),
        screen_name: Some("dmxwx".into()),
    }));
    let twitter = Arc::new(RevokedTwitter::default());
    let h = harness_with(
        dmx_store(accounts),
        Arc::new(InMemorySnapshotStore::new()),
        vec![Arc::clone(&twitter) as Arc<dyn PlatformOutbound>],
    )
    .await;
    join(&h, "botstalk").await;

    let extras = AlertExtras {
        channels: Some("DMX".into()),
        twitter: Some("Winter Storm Warning for Polk County".into()),
        ..Default::default()
    };
    h.handle.inbound(alert("DMX: storm", extras.clone())).await.unwrap();

    let handle = h.handle.clone();
    eventually(move || {
        let handle = handle.clone();
        async move { handle.status().await.unwrap().stats.accounts_disabled == 1 }
    })
    .await;
    let store = Arc::clone(&h.store);
    eventually(move || {
        let disabled = store.is_disabled(PlatformKind::Twitter, "dmxwx");
        async move { disabled == Some(true) }
    })
    .await;
    assert_eq!(twitter.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.transport.messages_to("ops@localhost").len(), 1);

    let logged = h
        .delivery_log
        .list_by_account(PlatformKind::Twitter, "dmxwx", 10)
        .await
        .unwrap();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].status, DeliveryStatus::Disabled);

    let routes = h
        .handle
        .channel_routes(Channel::parse("DMX").unwrap())
        .await
        .unwrap();
    assert!(routes[&DestinationKind::Twitter].is_empty());
    assert_eq!(routes[&DestinationKind::Room], vec!["dmxchat".to_string()]);

    h.handle.inbound(alert("DMX: storm again", extras)).await.unwrap();
    h.handle.status().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(twitter.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn member_cannot_add_channels() {
    let h = harness(dmx_store(AccountRegistry::new())).await;
    join(&h, "dmxchat").await;
    h.handle
        .inbound(presence("dmxchat", "bob", Affiliation::Member, Role::Participant, &[]))
        .await
        .unwrap();
    h.handle
        .inbound(room_message("dmxchat", "bob", "wxrelay: channels add XXX", None))
        .await
        .unwrap();

    let subs = h.handle.get_subscriptions("dmxchat").await.unwrap();
    let names: Vec<&str> = subs.iter().map(Channel::as_str).collect();
    assert_eq!(names, vec!["DMX"]);
    let replies = h.transport.messages_to("dmxchat@conference.localhost");
    assert_eq!(
        replies.last().unwrap().body(),
        format!("bob: {}", wxrelay_gateway::commands::DENIED)
    );
    let table = h.store.load_routing().await.unwrap();
    assert!(
        table
            .subscribers(DestinationKind::Room, &Channel::parse("XXX").unwrap())
            .is_empty()
    );
}

#[tokio::test]
async fn admin_changes_are_persisted() {
    let h = harness(dmx_store(AccountRegistry::new())).await;
    join(&h, "dmxchat").await;
    h.handle
        .inbound(presence("dmxchat", "alice", Affiliation::Owner, Role::Moderator, &[]))
        .await
        .unwrap();
    h.handle
        .inbound(room_message("dmxchat", "alice", "wxrelay: channels add svrdmx", None))
        .await
        .unwrap();
    h.handle
        .inbound(room_message("dmxchat", "alice", "wxrelay: channels del dmx", None))
        .await
        .unwrap();

    let subs = h.handle.get_subscriptions("dmxchat").await.unwrap();
    assert_eq!(Channel::join(&subs), "SVRDMX");
    let store = Arc::clone(&h.store);
    eventually(move || {
        let store = Arc::clone(&store);
        async move {
            let table = store.load_routing().await.unwrap();
            Channel::join(&table.channels_for(DestinationKind::Room, "dmxchat")) == "SVRDMX"
        }
    })
    .await;
}

#[tokio::test]
async fn seqnums_survive_restart() {
    let snapshots = Arc::new(InMemorySnapshotStore::new());
    let first = harness_with(
        dmx_store(AccountRegistry::new()),
        Arc::clone(&snapshots),
        Vec::new(),
    )
    .await;
    join(&first, "dmxchat").await;
    for i in 0..3 {
        route_and_echo(&first, &format!("DMX: product {i}")).await;
    }
    let before = first.handle.get_recent("dmxchat", 0).await.unwrap();
    assert_eq!(before.len(), 3);
    let seqnums: Vec<u64> = before.iter().map(|e| e.seqnum).collect();
    assert_eq!(seqnums, vec![3, 2, 1]);
    assert_eq!(
        first.handle.get_recent("dmxchat", 2).await.unwrap().len(),
        1
    );

    first.handle.shutdown().await.unwrap();
    let saved = first.snapshots.saved().unwrap();
    assert_eq!(saved.seqnum, 3);

    let second = harness_with(
        dmx_store(AccountRegistry::new()),
        Arc::clone(&snapshots),
        Vec::new(),
    )
    .await;
    join(&second, "dmxchat").await;
    assert_eq!(second.handle.get_recent("dmxchat", 0).await.unwrap().len(), 3);
    route_and_echo(&second, "DMX: after restart").await;
    let after = second.handle.get_recent("dmxchat", 3).await.unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].seqnum, 4);
    assert!(snapshots.load().await.unwrap().is_some());
}

#[tokio::test]
async fn ring_keeps_newest_forty() {
    let h = harness(dmx_store(AccountRegistry::new())).await;
    join(&h, "dmxchat").await;
    for i in 0..=RING_CAPACITY {
        route_and_echo(&h, &format!("DMX: product {i}")).await;
    }
    let recent = h.handle.get_recent("dmxchat", 0).await.unwrap();
    assert_eq!(recent.len(), RING_CAPACITY);
    assert_eq!(recent[0].seqnum, RING_CAPACITY as u64 + 1);
    assert_eq!(recent.last().unwrap().seqnum, 2);
}

#[tokio::test]
async fn reload_adds_and_drops_rooms() {
    let h = harness(dmx_store(AccountRegistry::new())).await;
    h.store.add_room("fsdchat").await.unwrap();
    h.store.remove_room("dmxchat").await.unwrap();

    let summary = h.handle.reload_config(false).await.unwrap();
    assert_eq!(summary.added, vec!["fsdchat".to_string()]);
    assert_eq!(summary.removed, vec!["dmxchat".to_string()]);
    let status = h.handle.status().await.unwrap();
    assert_eq!(status.rooms, 2);
}

#[tokio::test]
async fn unknown_room_queries_are_empty() {
    let h = harness(InMemoryStore::new()).await;
    assert!(h.handle.get_recent("nowhere", 0).await.unwrap().is_empty());
    assert!(h.handle.get_subscriptions("nowhere").await.unwrap().is_empty());
}
