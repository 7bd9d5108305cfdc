//! `wxrelay run`: drive the relay over newline-delimited JSON stanzas.
//!
//! Each stdin line is one inbound [`Stanza`]; every stanza the relay sends
//! is written to stdout the same way. A connection-owning bridge can sit on
//! either side of the pipe, and recorded streams can be replayed as-is.

use std::sync::Arc;

use {
    anyhow::Result,
    tokio::{
        io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
        sync::mpsc,
    },
    tracing::{debug, info, warn},
};

use {
    wxrelay_config::{RelayConfig, validate},
    wxrelay_gateway::{RelayHandle, Services},
    wxrelay_xmpp::{ChannelTransport, Stanza, TransportCommand},
};

pub async fn run(config: RelayConfig) -> Result<()> {
    let diagnostics = validate(&config);
    if diagnostics.has_errors() {
        for d in &diagnostics.diagnostics {
            warn!(path = %d.path, severity = %d.severity, "{}", d.message);
        }
        anyhow::bail!("invalid configuration, see `wxrelay config check`");
    }

    let (transport, commands) = ChannelTransport::new();
    let services = Services::from_config(&config, Arc::new(transport)).await?;
    let (handle, session) = wxrelay_gateway::start(config, services).await?;

    let writer = tokio::spawn(write_stanzas(commands, handle.clone()));
    handle.connected().await?;

    tokio::select! {
        res = read_stanzas(&handle) => {
            if let Err(e) = res {
                warn!(error = %e, "stanza input failed");
            }
            info!("input closed, shutting down");
        },
        _ = tokio::signal::ctrl_c() => info!("interrupted, shutting down"),
    }

    handle.shutdown().await?;
    session.await?;
    writer.abort();
    Ok(())
}

async fn read_stanzas(handle: &RelayHandle) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Stanza>(line) {
            Ok(stanza) => handle.inbound(stanza).await?,
            Err(e) => warn!(error = %e, "skipping malformed stanza line"),
        }
    }
    Ok(())
}

/// Print outbound stanzas. A teardown request has no socket to drop here,
/// so the session is simply told it is connected again.
async fn write_stanzas(mut commands: mpsc::UnboundedReceiver<TransportCommand>, handle: RelayHandle) {
    let mut stdout = tokio::io::stdout();
    while let Some(command) = commands.recv().await {
        match command {
            TransportCommand::Send(stanza) => {
                let line = match serde_json::to_string(&stanza) {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(error = %e, "failed to encode stanza");
                        continue;
                    },
                };
                let written = async {
                    stdout.write_all(line.as_bytes()).await?;
                    stdout.write_all(b"\n").await?;
                    stdout.flush().await
                }
                .await;
                if let Err(e) = written {
                    warn!(error = %e, "stdout closed");
                    return;
                }
            },
            TransportCommand::Teardown => {
                debug!("teardown requested, reconnecting");
                if handle.connected().await.is_err() {
                    return;
                }
            },
        }
    }
}
