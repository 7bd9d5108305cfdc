use {anyhow::Result, clap::Subcommand};

use {
    wxrelay_chatlog::{ChatLog, FileSnapshotStore, SnapshotStore},
    wxrelay_config::RelayConfig,
};

#[derive(Subcommand)]
pub enum SnapshotAction {
    /// Print a room's logged messages, newest first.
    Show {
        room: String,
        /// Only entries with a sequence number above this.
        #[arg(long, default_value_t = 0)]
        since: u64,
        /// Print entries as JSON lines.
        #[arg(long)]
        json: bool,
    },
    /// Print the sequence counter and per-room entry counts.
    Stats,
}

pub async fn handle_snapshot(action: SnapshotAction, config: &RelayConfig) -> Result<()> {
    let store = FileSnapshotStore::new(config.storage.snapshot_path.clone());
    let Some(snapshot) = store.load().await? else {
        eprintln!("No snapshot at {}", store.path().display());
        return Ok(());
    };
    let mut log = ChatLog::new();
    log.restore(snapshot);

    match action {
        SnapshotAction::Show { room, since, json } => {
            let entries = log.get_recent(&room.to_lowercase(), since);
            if entries.is_empty() {
                println!("No entries for {room}.");
            }
            for entry in entries {
                if json {
                    println!("{}", serde_json::to_string(&entry)?);
                } else {
                    let product = entry.product_id.as_deref().unwrap_or("-");
                    println!(
                        "{:>8}  {}  {:<12} {:<32} {}",
                        entry.seqnum,
                        entry.timestamp.format("%Y-%m-%d %H:%M:%SZ"),
                        entry.author,
                        product,
                        entry.raw_text
                    );
                }
            }
        },
        SnapshotAction::Stats => {
            println!("seqnum:   {}", log.current_seqnum());
            println!("rooms:    {}", log.room_count());
            println!("messages: {}", log.message_count());
        },
    }
    Ok(())
}
