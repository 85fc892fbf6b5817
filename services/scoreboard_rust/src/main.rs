//! Scoreboard Rust Service
//!
//! Live scoreboard for iterated Prisoner's Dilemma matches.
//!
//! This service:
//! - Connects to the simulation server and identifies as a visualizer
//! - Files streamed round results into per-session logs
//! - Redraws a paged score table for the selected session every tick
//!
//! ```text
//! simulation server (WS :6789) ──> IngestionLoop ──> SessionStore <── PresentationAdapter ──> stdout
//!                                                                          ^
//!                                                               stdin selector commands
//! ```

use anyhow::{Context, Result};
use dilemma_core::stream::{IngestionLoop, IngestionStats, ReconnectConfig, ReconnectStats};
use dilemma_core::{IngestionConfig, SessionStore};
use dotenv::dotenv;
use scoreboard_rust::selector::spawn_stdin_reader;
use scoreboard_rust::{BoardConfig, PresentationAdapter};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // Logs go to stderr so the board owns stdout
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    info!("Starting Scoreboard Rust Service...");

    // Config
    let ingestion_config = IngestionConfig::from_env();
    let reconnect_config = ReconnectConfig::from_env();
    let board_config = BoardConfig::from_env().context("Invalid board configuration")?;
    info!(
        "Config: server={} role={} connect_timeout={:?} refresh={:?} page_size={}",
        ingestion_config.server_url,
        ingestion_config.client_role,
        ingestion_config.connect_timeout,
        board_config.refresh_interval,
        board_config.page_size,
    );

    let store = Arc::new(SessionStore::with_write_timeout(
        ingestion_config.store_write_timeout,
    ));
    let stats_interval = ingestion_config.stats_log_interval;
    let ingestion = Arc::new(IngestionLoop::new(
        ingestion_config,
        reconnect_config,
        store.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);
    let (command_tx, command_rx) = mpsc::channel(16);

    // Tasks
    let mut tasks = Vec::new();

    // 1. Ingestion loop
    {
        let ingestion = ingestion.clone();
        let shutdown = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move { ingestion.run(shutdown).await }));
    }

    // 2. Stats logging
    {
        let stats = ingestion.stats().clone();
        let reconnect = ingestion.reconnect_stats().clone();
        let store = store.clone();
        let shutdown = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            stats_log_loop(stats, reconnect, store, stats_interval, shutdown).await
        }));
    }

    // 3. Board refresh
    {
        let board = PresentationAdapter::new(store.clone(), board_config, std::io::stdout());
        let shutdown = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            board.run(command_rx, shutdown).await;
        }));
    }

    // 4. Selector input
    spawn_stdin_reader(command_tx, shutdown_tx.clone());

    let mut quit = shutdown_rx.clone();
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for ctrl-c: {}", e);
            }
            info!("Ctrl-C received, shutting down...");
        }
        _ = quit.wait_for(|stop| *stop) => {
            info!("Shutting down...");
        }
    }

    let _ = shutdown_tx.send(true);
    for task in tasks {
        match tokio::time::timeout(Duration::from_secs(5), task).await {
            Ok(Err(e)) => error!("Task error: {}", e),
            Err(_) => error!("Task did not stop within 5s"),
            Ok(Ok(())) => {}
        }
    }

    let stats = ingestion.stats().snapshot();
    info!(
        "Final: sessions={} records={} events={} decode_failures={} unresolved={}",
        store.session_count(),
        store.total_records(),
        stats.events_applied,
        stats.decode_failures,
        stats.unresolved_drops,
    );

    Ok(())
}

async fn stats_log_loop(
    stats: Arc<IngestionStats>,
    reconnect: Arc<ReconnectStats>,
    store: Arc<SessionStore>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick fires immediately; nothing to report yet
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        let snapshot = stats.snapshot();
        info!(
            "Ingestion stats: received={}, applied={}, records={}, decode_failures={}, unresolved={}, store_timeouts={}, connects={}/{}, sessions={}, last_event={}",
            snapshot.messages_received,
            snapshot.events_applied,
            snapshot.records_appended,
            snapshot.decode_failures,
            snapshot.unresolved_drops,
            snapshot.store_timeouts,
            reconnect.successful_connects.load(Ordering::Relaxed),
            reconnect.connect_attempts.load(Ordering::Relaxed),
            store.session_count(),
            snapshot
                .last_event_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string()),
        );
    }
}
