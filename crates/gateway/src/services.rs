//! Wiring of the collaborators the session drives.

use std::{collections::HashMap, sync::Arc};

use tracing::info;

use {
    wxrelay_chatlog::{FileSnapshotStore, HttpProductLookup, ProductLookup, SnapshotStore},
    wxrelay_config::RelayConfig,
    wxrelay_mastodon::MastodonOutbound,
    wxrelay_platforms::{PlatformKind, PlatformOutbound, delivery_log::DeliveryLog, http},
    wxrelay_routing::{SqliteStore, SubscriptionStore},
    wxrelay_slack::{SlackConfig, SlackOutbound},
    wxrelay_twitter::{TwitterConfig, TwitterOutbound},
    wxrelay_webhooks::WebhookOutbound,
    wxrelay_xmpp::StanzaTransport,
};

use crate::Result;

pub type Outbounds = HashMap<PlatformKind, Arc<dyn PlatformOutbound>>;

pub struct Services {
    pub transport: Arc<dyn StanzaTransport>,
    pub store: Arc<dyn SubscriptionStore>,
    pub delivery_log: Arc<dyn DeliveryLog>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub outbounds: Outbounds,
    pub product_lookup: Option<Arc<dyn ProductLookup>>,
}

impl Services {
    /// Production wiring: SQLite store and delivery log, file snapshots,
    /// and an HTTP adapter per platform sharing one client.
    pub async fn from_config(
        config: &RelayConfig,
        transport: Arc<dyn StanzaTransport>,
    ) -> Result<Self> {
        let client = http::build_client(config.delivery.request_timeout())
            .map_err(wxrelay_platforms::Error::from)?;
        let store = Arc::new(SqliteStore::new(&config.storage.database_url).await?);
        let product_lookup = config.delivery.product_lookup_url.as_ref().map(|url| {
            Arc::new(HttpProductLookup::new(client.clone(), url.clone())) as Arc<dyn ProductLookup>
        });
        info!(
            database_url = %config.storage.database_url,
            snapshot = %config.storage.snapshot_path.display(),
            product_lookup = product_lookup.is_some(),
            "services ready"
        );
        Ok(Self {
            transport,
            store: Arc::clone(&store) as Arc<dyn SubscriptionStore>,
            delivery_log: store,
            snapshots: Arc::new(FileSnapshotStore::new(config.storage.snapshot_path.clone())),
            outbounds: outbounds(config, &client),
            product_lookup,
        })
    }
}

/// One adapter per platform kind.
pub fn outbounds(config: &RelayConfig, client: &reqwest::Client) -> Outbounds {
    let platforms = &config.platforms;
    let adapters: [Arc<dyn PlatformOutbound>; 4] = [
        Arc::new(TwitterOutbound::new(client.clone(), TwitterConfig {
            api_base: platforms.twitter_api_base.clone(),
            upload_base: platforms.twitter_upload_base.clone(),
        })),
        Arc::new(MastodonOutbound::new(client.clone())),
        Arc::new(SlackOutbound::new(client.clone(), SlackConfig {
            api_base: platforms.slack_api_base.clone(),
        })),
        Arc::new(WebhookOutbound::new(client.clone())),
    ];
    adapters.into_iter().map(|a| (a.kind(), a)).collect()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_platform_has_an_adapter() {
        let client = reqwest::Client::new();
        let adapters = outbounds(&RelayConfig::default(), &client);
        for kind in PlatformKind::ALL {
            assert_eq!(adapters.get(&kind).unwrap().kind(), kind);
        }
    }

    #[tokio::test]
    async fn builds_with_in_memory_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RelayConfig::default();
        config.storage.database_url = "sqlite::memory:".into();
        config.storage.snapshot_path = dir.path().join("chatlog.json");
        let transport = Arc::new(wxrelay_xmpp::MemoryTransport::new());
        let services = Services::from_config(&config, transport).await.unwrap();
        assert!(services.product_lookup.is_none());
        assert_eq!(services.outbounds.len(), 4);
        assert!(services.snapshots.load().await.unwrap().is_none());
    }
}
