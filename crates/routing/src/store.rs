//! Persistence trait for rooms, subscriptions and platform accounts.

use async_trait::async_trait;

use {
    wxrelay_common::Channel,
    wxrelay_platforms::{PlatformAccount, PlatformKind},
};

use crate::{Result, table::{DestinationKind, RoutingTable}};

/// Durable source of truth for routing state.
///
/// The session loads everything on (re)load and writes through on every
/// change it makes in memory.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Rooms registered in the store, in addition to configured ones.
    async fn load_rooms(&self) -> Result<Vec<String>>;
    async fn add_room(&self, room: &str) -> Result<()>;
    /// Remove a room and all of its subscriptions.
    async fn remove_room(&self, room: &str) -> Result<()>;

    async fn load_routing(&self) -> Result<RoutingTable>;
    async fn add_subscription(
        &self,
        kind: DestinationKind,
        channel: &Channel,
        destination: &str,
    ) -> Result<()>;
    async fn remove_subscription(
        &self,
        kind: DestinationKind,
        channel: &Channel,
        destination: &str,
    ) -> Result<()>;

    async fn load_accounts(&self) -> Result<Vec<PlatformAccount>>;
    async fn upsert_account(&self, account: &PlatformAccount) -> Result<()>;
    async fn set_account_disabled(&self, kind: PlatformKind, id: &str, disabled: bool)
    -> Result<()>;
}
