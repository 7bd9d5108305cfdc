use anyhow::Result;

use {
    wxrelay_common::Channel,
    wxrelay_config::RelayConfig,
    wxrelay_platforms::AccountRegistry,
    wxrelay_routing::{DestinationKind, SqliteStore, SubscriptionStore},
};

/// Print every destination subscribed to `channel`, per kind, straight from
/// the store.
pub async fn show_routes(config: &RelayConfig, channel: &str) -> Result<()> {
    let channel = Channel::parse(channel)?;
    let store = SqliteStore::new(&config.storage.database_url).await?;
    let table = store.load_routing().await?;
    let accounts: AccountRegistry = store.load_accounts().await?.into_iter().collect();

    println!("Routes for {channel}:");
    for kind in DestinationKind::ALL {
        let subscribers = table.subscribers(kind, &channel);
        if subscribers.is_empty() {
            continue;
        }
        println!("  {kind}:");
        for id in subscribers {
            let note = match kind.platform() {
                None => "",
                Some(platform) => match accounts.get(platform, &id) {
                    Some(a) if a.disabled && a.exempt_from_auto_disable => " (disabled, exempt)",
                    Some(a) if a.disabled => " (disabled)",
                    Some(_) => "",
                    None if platform == wxrelay_platforms::PlatformKind::Webhook => "",
                    None => " (unknown account)",
                },
            };
            println!("    {id}{note}");
        }
    }
    Ok(())
}
