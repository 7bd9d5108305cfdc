//! Channel routing: the five subscription maps, per-alert fan-out planning,
//! and the durable subscription store.

pub mod error;
pub mod fanout;
pub mod store;
pub mod store_memory;
pub mod store_sqlite;
pub mod table;

pub use {
    error::{Error, Result},
    fanout::{AlertRoute, FanoutPlan, PlatformTargets, Suppression, plan},
    store::SubscriptionStore,
    store_memory::InMemoryStore,
    store_sqlite::SqliteStore,
    table::{DestinationKind, RoutingTable},
};

/// Run database migrations for the routing tables and delivery log.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
