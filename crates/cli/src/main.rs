mod config_commands;
mod routes_commands;
mod run_command;
mod snapshot_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
    wxrelay_config::RelayConfig,
};

#[derive(Parser)]
#[command(name = "wxrelay", about = "wxrelay — weather alert chat relay")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery in ./ and the user config dir).
    #[arg(long, global = true, env = "WXRELAY_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay over a JSON-lines stanza stream on stdin/stdout
    /// (default when no subcommand is provided).
    Run,
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
    /// Inspect the chat-log snapshot.
    Snapshot {
        #[command(subcommand)]
        action: snapshot_commands::SnapshotAction,
    },
    /// Show who receives alerts for a channel.
    Routes {
        /// Channel key, e.g. DMX.
        channel: String,
    },
}

/// Logs go to stderr; stdout carries the stanza stream.
fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<RelayConfig> {
    match path {
        Some(path) => wxrelay_config::load_config(path),
        None => Ok(wxrelay_config::discover_and_load()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "wxrelay starting");

    let config = load_config(cli.config.as_ref())?;
    match cli.command {
        None | Some(Commands::Run) => run_command::run(config).await,
        Some(Commands::Config { action }) => {
            config_commands::handle_config(action, &config, cli.config.as_deref())
        },
        Some(Commands::Snapshot { action }) => {
            snapshot_commands::handle_snapshot(action, &config).await
        },
        Some(Commands::Routes { channel }) => routes_commands::show_routes(&config, &channel).await,
    }
}
