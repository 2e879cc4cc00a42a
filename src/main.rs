//! Trade Journal - Entry Point
//!
//! Loads configuration, opens the journal against the configured ledger
//! store and serves the JSON API. Runs until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml (or the path given as first argument) + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Create the ledger store (local file or remote contents API)
//! 4. Open the journal (fail-soft initial load)
//! 5. Serve the API (/trades, /summary, /live, /ready, /metrics, ...)
//! 6. Wait for SIGINT → graceful shutdown

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};

use trade_journal::adapters::api::{self, ApiState, JournalMeta};
use trade_journal::adapters::metrics::JournalMetrics;
use trade_journal::adapters::persistence::FileLedgerStore;
use trade_journal::adapters::remote::{ContentsClient, ContentsClientConfig, RemoteLedgerStore};
use trade_journal::config::{self, AppConfig, StorageBackend};
use trade_journal::ports::store::LedgerStore;
use trade_journal::usecases::{Journal, JournalSettings};

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = config::loader::load_config(&config_path)
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.journal.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.journal.name,
        version = env!("CARGO_PKG_VERSION"),
        backend = ?config.storage.backend,
        timezone = %config.journal.timezone,
        "Starting Trade Journal"
    );

    // ── 3. Ledger store ─────────────────────────────────────
    let store = build_store(&config).await?;

    // ── 4. Open journal ─────────────────────────────────────
    let metrics = Arc::new(JournalMetrics::new().context("Failed to create metrics registry")?);
    let settings = JournalSettings::from_config(&config)?;
    let journal = Arc::new(
        Journal::open(store, settings)
            .await
            .with_metrics(Arc::clone(&metrics)),
    );

    let meta = JournalMeta {
        name: config.journal.name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        timezone: config.journal.timezone.clone(),
        pairs: config.journal.pairs.clone(),
        backend: journal.backend(),
    };

    let state = ApiState {
        journal: Arc::clone(&journal),
        metrics,
        meta: Arc::new(meta),
    };

    // ── 5. Serve API ────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let bind_address = config.server.bind_address.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = api::serve(state, &bind_address, shutdown_rx).await {
            error!(error = %e, "Journal API failed");
        }
    });

    // ── 6. Wait for SIGINT ──────────────────────────────────
    signal::ctrl_c().await.context("Failed to listen for SIGINT")?;
    info!("SIGINT received, initiating graceful shutdown");

    let _ = shutdown_tx.send(());
    let _ = tokio::time::timeout(std::time::Duration::from_secs(10), server_handle).await;

    info!(trades = journal.ledger().await.len(), "Trade Journal stopped");
    Ok(())
}

/// Create the configured `LedgerStore` backend.
async fn build_store(config: &AppConfig) -> Result<Arc<dyn LedgerStore>> {
    match config.storage.backend {
        StorageBackend::File => {
            let store = FileLedgerStore::new(&config.storage.file.path).await?;
            Ok(Arc::new(store))
        }
        StorageBackend::Remote => {
            let remote = config
                .storage
                .remote
                .as_ref()
                .context("Remote backend selected without [storage.remote]")?;
            let client = ContentsClient::new(ContentsClientConfig::from_settings(remote))
                .context("Failed to create contents API client")?;
            Ok(Arc::new(RemoteLedgerStore::new(client)))
        }
    }
}
