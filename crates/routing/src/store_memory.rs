//! In-memory store for testing.

use std::{collections::BTreeSet, sync::Mutex};

use async_trait::async_trait;

use {
    wxrelay_common::Channel,
    wxrelay_platforms::{AccountRegistry, PlatformAccount, PlatformKind},
};

use crate::{
    Error, Result,
    store::SubscriptionStore,
    table::{DestinationKind, RoutingTable},
};

/// In-memory store. No persistence — for tests only.
#[derive(Default)]
pub struct InMemoryStore {
    rooms: Mutex<BTreeSet<String>>,
    table: Mutex<RoutingTable>,
    accounts: Mutex<AccountRegistry>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from prepared state.
    pub fn with_state(
        rooms: impl IntoIterator<Item = String>,
        table: RoutingTable,
        accounts: AccountRegistry,
    ) -> Self {
        Self {
            rooms: Mutex::new(rooms.into_iter().collect()),
            table: Mutex::new(table),
            accounts: Mutex::new(accounts),
        }
    }

    /// Current disabled flag, for assertions.
    pub fn is_disabled(&self, kind: PlatformKind, id: &str) -> Option<bool> {
        let accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
        accounts.get(kind, id).map(|a| a.disabled)
    }
}

#[async_trait]
impl SubscriptionStore for InMemoryStore {
    async fn load_rooms(&self) -> Result<Vec<String>> {
        let rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rooms.iter().cloned().collect())
    }

    async fn add_room(&self, room: &str) -> Result<()> {
        let mut rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
        rooms.insert(room.to_string());
        Ok(())
    }

    async fn remove_room(&self, room: &str) -> Result<()> {
        self.rooms
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(room);
        self.table
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove_destination(DestinationKind::Room, room);
        Ok(())
    }

    async fn load_routing(&self) -> Result<RoutingTable> {
        Ok(self.table.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    async fn add_subscription(
        &self,
        kind: DestinationKind,
        channel: &Channel,
        destination: &str,
    ) -> Result<()> {
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        table.subscribe(kind, channel.clone(), destination);
        Ok(())
    }

    async fn remove_subscription(
        &self,
        kind: DestinationKind,
        channel: &Channel,
        destination: &str,
    ) -> Result<()> {
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        table.unsubscribe(kind, channel, destination);
        Ok(())
    }

    async fn load_accounts(&self) -> Result<Vec<PlatformAccount>> {
        let accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
        Ok(accounts.iter().cloned().collect())
    }

    async fn upsert_account(&self, account: &PlatformAccount) -> Result<()> {
        let mut accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
        accounts.insert(account.clone());
        Ok(())
    }

    async fn set_account_disabled(
        &self,
        kind: PlatformKind,
        id: &str,
        disabled: bool,
    ) -> Result<()> {
        let mut accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
        let Some(mut account) = accounts.remove(kind, id) else {
            return Err(Error::message(format!("unknown {kind} account: {id}")));
        };
        account.disabled = disabled;
        accounts.insert(account);
        Ok(())
    }
}
