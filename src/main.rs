//! raccoon-bot - Receipt Ingestion Service
//!
//! Turns receipt photos posted in chat into categorized rows in the
//! expense store. Startup order: logging, CLI args, secrets, clients,
//! background schedulers, gateway, status server. A missing secret stops
//! the process before any connection is attempted.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use raccoon_bot::chat::{gateway, ChatApi, ChatClient};
use raccoon_bot::config::Config;
use raccoon_bot::db::{ReceiptStore, StoreClient};
use raccoon_bot::services::{AssetStore, ExtractionClient, ReceiptExtractor, StorageClient};
use raccoon_bot::workflow::Pipeline;
use raccoon_bot::{build_router, tasks, AppState, StatusState};

/// Inbound events buffered between the gateway and the dispatch loop.
const EVENT_BUFFER: usize = 64;

/// Receipt ingestion bot for the Receipt Raccoon expense tracker.
#[derive(Debug, Parser)]
#[command(name = "raccoon-bot", version)]
struct Args {
    /// Path to the tunables TOML file (secrets stay in the environment).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("raccoon_bot=info")),
        )
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref()).context("configuration")?;

    info!("Starting raccoon-bot (receipt ingestion)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Extraction model: {}", config.tunables.extraction_model);

    // Process-scoped clients, constructed once and shared by handle.
    let chat: Arc<dyn ChatApi> = Arc::new(ChatClient::new(config.discord_token.clone())?);
    let extractor: Arc<dyn ReceiptExtractor> = Arc::new(ExtractionClient::new(
        config.tunables.extraction_endpoint.clone(),
        config.tunables.extraction_model.clone(),
        config.extraction_api_key.clone(),
    )?);
    let assets: Arc<dyn AssetStore> = Arc::new(StorageClient::new(
        config.store_url.clone(),
        config.tunables.storage_bucket.clone(),
        config.store_key.clone(),
    )?);
    let store: Arc<dyn ReceiptStore> =
        Arc::new(StoreClient::new(config.store_url.clone(), config.store_key.clone())?);

    let status = Arc::new(StatusState::new());
    let pipeline = Pipeline::new(
        chat.clone(),
        extractor,
        assets,
        store.clone(),
        status.clone(),
    );

    tasks::start_schedulers(
        chat,
        store,
        Duration::from_secs(config.tunables.heartbeat_interval_secs),
        Duration::from_secs(config.tunables.profile_resync_interval_secs),
        config.tunables.service_name.clone(),
    );

    // Gateway feeds the dispatch loop; one spawned run per message keeps
    // concurrent receipts independent.
    let (events_tx, mut events_rx) = mpsc::channel(EVENT_BUFFER);
    tokio::spawn(gateway::run(config.discord_token.clone(), events_tx));
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.handle_message(event).await });
        }
    });

    // Status server.
    let app = build_router(AppState {
        status,
        service_name: config.tunables.service_name.clone(),
    });
    let addr = format!("127.0.0.1:{}", config.tunables.status_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding status server on {addr}"))?;
    info!("Status server on http://{addr}");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Status server stopped: {e}");
        }
    });

    tokio::signal::ctrl_c().await.context("shutdown signal")?;
    info!("Shutdown signal received, stopping");
    Ok(())
}
