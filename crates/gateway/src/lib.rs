//! Relay session: one loop owning rooms, routing and the chat log, fed by the
//! stanza transport and by spawned platform workers.
//!
//! Start it with [`start`], then talk to it through the returned
//! [`RelayHandle`].

pub mod commands;
pub mod delivery;
pub mod dispatch;
pub mod error;
pub mod handle;
pub mod handlers;
pub mod reload;
pub mod services;
pub mod session;
pub mod state;

#[cfg(test)]
mod testing;

pub use {
    delivery::DeliveryCompletion,
    error::{Error, Result},
    handle::{ChannelRoutes, RelayHandle, RelayStatus},
    reload::ReloadSummary,
    services::{Outbounds, Services},
    session::Session,
    state::{Identity, RelayState, RelayStats},
};

/// Build the session, restore persisted state, and spawn the loop.
pub async fn start(
    config: wxrelay_config::RelayConfig,
    services: Services,
) -> Result<(RelayHandle, tokio::task::JoinHandle<()>)> {
    let (mut session, handle) = Session::new(config, services)?;
    session.bootstrap().await;
    let task = tokio::spawn(session.run());
    Ok((handle, task))
}
