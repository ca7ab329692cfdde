use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::signal;
use tracing::{debug, info, warn};

use crate::agent::config::Config;
use crate::door::{DoorController, DoorState, MemoryDoor};
use crate::logic::Logic;
use crate::notify::{spawn_qr_renderer, WatchNotifier};
use crate::security::ldap::LdapAuthenticator;
use crate::security::rotation::RotationScheduler;
use crate::security::token::TokenStore;

pub async fn run(config_path: String) -> Result<()> {
    let cfg = Config::from_file(&config_path)?;
    info!(
        version = crate::VERSION,
        ldap_uri = %cfg.ldap_uri,
        token_timeout_secs = cfg.token_timeout_secs,
        "door lock daemon starting"
    );

    let (notifier, uri_rx) = WatchNotifier::channel();
    let renderer = cfg
        .qr_path
        .clone()
        .map(|path| spawn_qr_renderer(uri_rx, path));

    let tokens = TokenStore::from_entropy(cfg.web_prefix.clone(), Arc::new(notifier));
    // The hardware driver lives outside this crate; the in-memory driver stands in for it.
    warn!("no hardware door driver linked, using in-memory door");
    let door = DoorController::new(MemoryDoor::new(DoorState::Locked));
    let verifier = Arc::new(LdapAuthenticator::from_config(&cfg));
    let logic = Logic::new(tokens, door, verifier);

    let scheduler = RotationScheduler::spawn(logic.clone(), cfg.token_timeout());

    // tokio reads stdin on a blocking thread that cannot be cancelled; after
    // Ctrl-C that read stays parked until the next line arrives, so the caller
    // exits the process once this returns instead of waiting on runtime drop.
    let outcome = tokio::select! {
        res = serve_lines(&logic, BufReader::new(tokio::io::stdin()), tokio::io::stdout()) => {
            info!("request input closed, stopping daemon");
            res
        }
        res = signal::ctrl_c() => {
            info!("shutdown signal received, stopping daemon");
            res.context("waiting for shutdown signal")
        }
    };

    scheduler.shutdown().await;
    if let Some(handle) = renderer {
        handle.abort();
        let _ = handle.await; // Ignore cancellation errors
    }

    outcome
}

/// Handle one JSON request per input line, answering with one response
/// identifier per output line. Blank lines are skipped.
pub async fn serve_lines<R, W>(logic: &Logic, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await.context("reading request")? {
        if line.trim().is_empty() {
            continue;
        }
        let response = logic.handle(&line).await;
        debug!(response = %response, "writing response");
        writer
            .write_all(format!("{}\n", response).as_bytes())
            .await
            .context("writing response")?;
        writer.flush().await.context("flushing response")?;
    }
    Ok(())
}
