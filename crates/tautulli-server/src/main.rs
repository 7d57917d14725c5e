//! Tautulli Active Streams server
//!
//! Loads the config file, sets up every configured Tautulli entry and serves
//! the REST API until interrupted.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tautulli_config::load_config;
use tautulli_hub::Hub;
use tautulli_server::{start_server, AppState, DEFAULT_CONFIG_FILE};
use tautulli_streams::TautulliStreams;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let config = load_config(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    // RUST_LOG wins over the config file
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("invalid log_level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!("Starting Tautulli Active Streams");

    let entries = config.entries().context("invalid entries")?;
    if entries.is_empty() {
        warn!("No Tautulli entries configured in {:?}", config_path);
    }

    let hub = Hub::new();
    let streams = TautulliStreams::new(hub);
    for (entry_id, result) in streams.sync_entries(entries).await {
        if let Err(e) = result {
            error!("Tautulli entry {} not loaded: {}", entry_id, e);
        }
    }
    info!("Loaded {} Tautulli entries", streams.entry_ids().len());

    let state = AppState::new(streams.clone(), Some(config_path));
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
        }
        info!("Shutting down...");
    };
    start_server(state, &config.server.bind_addr(), shutdown).await?;

    streams.unload_all().await;
    Ok(())
}
