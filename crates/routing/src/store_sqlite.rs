//! SQLite-backed subscription store and delivery log using sqlx.

use {
    async_trait::async_trait,
    sqlx::{Row, SqlitePool, sqlite::SqlitePoolOptions},
    tracing::debug,
};

use {
    wxrelay_common::Channel,
    wxrelay_platforms::{
        Credentials, PlatformAccount, PlatformKind,
        delivery_log::{DeliveryLog, DeliveryLogEntry, DeliveryStatus},
    },
};

use crate::{
    Error, Result,
    error::Context,
    store::SubscriptionStore,
    table::{DestinationKind, RoutingTable},
};

/// SQLite persistence for rooms, subscriptions, accounts and delivery outcomes.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect and run migrations.
    ///
    /// In-memory databases get a single connection so every query sees the
    /// same schema.
    pub async fn new(database_url: &str) -> Result<Self> {
        let max_connections = if database_url.contains(":memory:") {
            1
        } else {
            5
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        crate::run_migrations(&pool).await?;
        debug!(database_url, "subscription store ready");

        Ok(Self { pool })
    }

    /// Use an existing pool; [`crate::run_migrations`] must already have run.
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionStore for SqliteStore {
    async fn load_rooms(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT name FROM rooms ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get("name")).collect())
    }

    async fn add_room(&self, room: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO rooms (name) VALUES (?)")
            .bind(room)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove_room(&self, room: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM subscriptions WHERE kind = 'room' AND destination = ?")
            .bind(room)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM rooms WHERE name = ?")
            .bind(room)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn load_routing(&self) -> Result<RoutingTable> {
        let rows = sqlx::query("SELECT kind, channel, destination FROM subscriptions")
            .fetch_all(&self.pool)
            .await?;

        let mut table = RoutingTable::new();
        for row in rows {
            let kind: String = row.get("kind");
            let channel: String = row.get("channel");
            let destination: String = row.get("destination");
            let kind: DestinationKind = kind.parse()?;
            let channel = Channel::parse(&channel)
                .with_context(|| format!("stored channel for {destination}"))?;
            table.subscribe(kind, channel, destination);
        }
        Ok(table)
    }

    async fn add_subscription(
        &self,
        kind: DestinationKind,
        channel: &Channel,
        destination: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO subscriptions (kind, channel, destination) VALUES (?, ?, ?)",
        )
        .bind(kind.as_str())
        .bind(channel.as_str())
        .bind(destination)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_subscription(
        &self,
        kind: DestinationKind,
        channel: &Channel,
        destination: &str,
    ) -> Result<()> {
        sqlx::query("DELETE FROM subscriptions WHERE kind = ? AND channel = ? AND destination = ?")
            .bind(kind.as_str())
            .bind(channel.as_str())
            .bind(destination)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn load_accounts(&self) -> Result<Vec<PlatformAccount>> {
        let rows = sqlx::query("SELECT id, credentials, disabled, exempt FROM platform_accounts")
            .fetch_all(&self.pool)
            .await?;

        let mut accounts = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.get("id");
            let credentials: String = row.get("credentials");
            let credentials: Credentials = serde_json::from_str(&credentials)?;
            accounts.push(PlatformAccount {
                id,
                disabled: row.get::<i64, _>("disabled") != 0,
                exempt_from_auto_disable: row.get::<i64, _>("exempt") != 0,
                credentials,
            });
        }
        Ok(accounts)
    }

    async fn upsert_account(&self, account: &PlatformAccount) -> Result<()> {
        let credentials = serde_json::to_string(&account.credentials)?;
        sqlx::query(
            "INSERT INTO platform_accounts (kind, id, credentials, disabled, exempt)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(kind, id) DO UPDATE SET
                credentials = excluded.credentials,
                disabled = excluded.disabled,
                exempt = excluded.exempt,
                updated_at = strftime('%s', 'now')",
        )
        .bind(account.kind().as_str())
        .bind(&account.id)
        .bind(&credentials)
        .bind(i64::from(account.disabled))
        .bind(i64::from(account.exempt_from_auto_disable))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_account_disabled(
        &self,
        kind: PlatformKind,
        id: &str,
        disabled: bool,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE platform_accounts SET disabled = ?, updated_at = strftime('%s', 'now')
             WHERE kind = ? AND id = ?",
        )
        .bind(i64::from(disabled))
        .bind(kind.as_str())
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::message(format!("unknown {kind} account: {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl DeliveryLog for SqliteStore {
    async fn record(&self, entry: DeliveryLogEntry) -> wxrelay_platforms::Result<()> {
        sqlx::query(
            "INSERT INTO delivery_log (kind, account_id, source_id, status, attempts, response, error, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.kind.as_str())
        .bind(&entry.account_id)
        .bind(&entry.source_id)
        .bind(entry.status.as_str())
        .bind(i64::from(entry.attempts))
        .bind(&entry.response)
        .bind(&entry.error)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| wxrelay_platforms::Error::external("delivery log insert", e))?;
        Ok(())
    }

    async fn list_by_account(
        &self,
        kind: PlatformKind,
        account_id: &str,
        limit: u32,
    ) -> wxrelay_platforms::Result<Vec<DeliveryLogEntry>> {
        let rows = sqlx::query(
            "SELECT id, source_id, status, attempts, response, error, created_at
             FROM delivery_log
             WHERE kind = ? AND account_id = ?
             ORDER BY created_at DESC, id DESC
             LIMIT ?",
        )
        .bind(kind.as_str())
        .bind(account_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| wxrelay_platforms::Error::external("delivery log query", e))?;

        rows.into_iter()
            .map(|row| {
                let status: String = row.get("status");
                let status = DeliveryStatus::parse(&status).ok_or_else(|| {
                    wxrelay_platforms::Error::invalid_input(format!(
                        "unknown delivery status: {status}"
                    ))
                })?;
                Ok(DeliveryLogEntry {
                    id: row.get("id"),
                    kind,
                    account_id: account_id.to_string(),
                    source_id: row.get("source_id"),
                    status,
                    attempts: u32::try_from(row.get::<i64, _>("attempts")).unwrap_or(0),
                    response: row.get("response"),
                    error: row.get("error"),
                    created_at: row.get("created_at"),
                })
            })
            .collect()
    }
}
