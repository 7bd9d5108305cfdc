//! Alert fan-out: rooms first, then one delivery worker per platform account.

use std::sync::Arc;

use tracing::{debug, info, warn};

use {
    wxrelay_platforms::{
        DeliveryExtras, DeliveryRequest, PlatformAccount, PlatformKind, retry::deliver_with_retry,
    },
    wxrelay_routing::{AlertRoute, Suppression, plan},
    wxrelay_xmpp::{Message, builder},
};

use crate::{
    delivery::DeliveryCompletion,
    session::{Session, SessionEvent},
};

impl Session {
    /// Relay an alert from the ingest identity.
    ///
    /// The firehose room always gets the alert unmodified. Subscribed rooms
    /// are sent to before any platform delivery is spawned.
    ///
    /// Each alert takes exactly one chat-log seqnum, stamped on every room
    /// copy; the rooms' echoes are logged under it.
    pub(crate) fn route_alert(&mut self, msg: &Message) {
        let body = msg.body();
        let extras = msg.extras.clone().unwrap_or_default();

        let route = AlertRoute {
            channels: AlertRoute::resolve_channels(extras.channels.as_deref(), body),
            suppress: Suppression {
                rooms: extras.nochat,
                twitter: extras.notwitter,
                mastodon: extras.nomastodon,
                slack: extras.noslack,
                webhook: extras.nowebhook,
            },
            has_platform_text: extras.twitter.as_deref().is_some_and(|t| !t.trim().is_empty()),
        };
        let firehose = self.state.identity.firehose_room.clone();
        let fanout = plan(&self.state.routing, &self.state.accounts, &firehose, &route);
        self.state.stats.alerts_routed += 1;
        let seqnum = self.state.chatlog.next_seqnum();

        self.forward_to_room(&fanout.firehose, msg, seqnum);
        for room in &fanout.rooms {
            self.forward_to_room(room, msg, seqnum);
        }
        for (kind, id) in &fanout.skipped_disabled {
            debug!(kind = %kind, account_id = %id, "skipping disabled account");
        }

        let request = Arc::new(DeliveryRequest {
            source_id: extras
                .product_id
                .clone()
                .or_else(|| msg.id.clone())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            text: extras.twitter.clone().unwrap_or_default(),
            media_url: extras.twitter_media.clone().filter(|u| !u.trim().is_empty()),
            extras: DeliveryExtras {
                body: body.to_string(),
                html: msg.html.clone(),
                channels: route.channels.iter().map(|c| c.as_str().to_string()).collect(),
                product_id: extras.product_id.clone(),
                lat: extras.lat,
                long: extras.long,
            },
        });

        info!(
            source_id = %request.source_id,
            seqnum,
            channels = %wxrelay_common::Channel::join(&route.channels),
            rooms = fanout.room_count(),
            deliveries = fanout.platform_count(),
            "routing alert"
        );

        for targets in fanout.platforms {
            for account in targets.accounts {
                self.spawn_delivery(targets.kind, account, Arc::clone(&request));
            }
        }
    }

    fn forward_to_room(&mut self, room: &str, msg: &Message, seqnum: u64) {
        let to = self.state.identity.room_jid(room);
        self.post_to_room(room, builder::forward(to, msg, seqnum));
    }

    fn spawn_delivery(
        &mut self,
        kind: PlatformKind,
        account: PlatformAccount,
        request: Arc<DeliveryRequest>,
    ) {
        let Some(outbound) = self.services.outbounds.get(&kind).cloned() else {
            warn!(kind = %kind, account_id = %account.id, "no adapter configured for platform");
            return;
        };
        self.state.stats.deliveries_started += 1;
        let policy = self.retry;
        let tx = self.inbox_tx.clone();
        tokio::spawn(async move {
            let outcome =
                deliver_with_retry(outbound.as_ref(), &account, &request, policy).await;
            let completion = DeliveryCompletion {
                kind,
                account_id: account.id,
                source_id: request.source_id.clone(),
                outcome,
                finished_at: chrono::Utc::now().timestamp(),
            };
            if tx
                .send(SessionEvent::Delivery(Box::new(completion)))
                .await
                .is_err()
            {
                debug!(kind = %kind, "session gone before delivery completed");
            }
        });
    }
}
