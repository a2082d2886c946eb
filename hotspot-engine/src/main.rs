//! hotspot-engine - Hotspot clustering service
//!
//! Groups operational signals into hotspots through a hybrid pipeline of
//! domain rules, embedding similarity and quality-driven refinement.
//! Serves a REST + SSE API.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use hotspot_common::config::{
    database_path, load_default_toml_config, load_toml_config, resolve_bind_address, resolve_root_folder,
};
use hotspot_common::events::EventBus;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hotspot_engine::models::ClusteringParameters;
use hotspot_engine::services::{provider_from_config, EmbeddingProvider, JobStore};
use hotspot_engine::{AppState, EngineSettings};

/// Interval between sweeps of expired clustering jobs
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Command-line arguments for hotspot-engine
#[derive(Parser, Debug)]
#[command(name = "hotspot-engine")]
#[command(about = "Hotspot clustering service")]
#[command(version)]
struct Args {
    /// Address to listen on (overrides HOTSPOT_BIND_ADDRESS and TOML)
    #[arg(short, long)]
    bind: Option<String>,

    /// Folder holding the SQLite database (overrides HOTSPOT_ROOT_FOLDER and TOML)
    #[arg(short, long)]
    root_folder: Option<String>,

    /// Path to config.toml (default: platform config dir)
    #[arg(short, long, env = "HOTSPOT_CONFIG")]
    config: Option<PathBuf>,

    /// Embedding provider: "hashing" or "http"
    #[arg(long, env = "HOTSPOT_EMBEDDING_PROVIDER")]
    embedding_provider: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut toml_config = match &args.config {
        Some(path) => load_toml_config(path)?,
        None => load_default_toml_config()?,
    };
    if let Some(provider) = &args.embedding_provider {
        toml_config.embedding.provider = provider.clone();
    }

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&toml_config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting hotspot-engine");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), "HOTSPOT_ROOT_FOLDER", &toml_config);
    let db_path = database_path(&root_folder);
    info!("Database: {}", db_path.display());

    let db_pool = hotspot_engine::db::init_database_pool(&db_path)
        .await
        .context("Failed to open database")?;
    info!("Database connection established");

    let parameters = ClusteringParameters::from_defaults(&toml_config.clustering);
    parameters
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid clustering configuration: {}", e))?;

    let api_key = hotspot_engine::config::resolve_embedding_api_key(&toml_config);
    let provider = provider_from_config(&toml_config.embedding, api_key).context("Failed to set up embedding provider")?;
    info!(
        provider = %toml_config.embedding.provider,
        model_version = %provider.model_version(),
        "Embedding provider ready"
    );

    let event_bus = EventBus::new(256);
    let settings = EngineSettings {
        embedding_timeout: Duration::from_millis(toml_config.embedding.timeout_ms),
        parameters,
        job_retention: toml_config.job_retention(),
    };
    let state = AppState::new(db_pool, event_bus, provider, settings);

    let shutdown = CancellationToken::new();
    let sweeper = spawn_job_sweeper(state.clone(), shutdown.clone());

    let app = hotspot_engine::build_router(state);

    let bind_address = resolve_bind_address(args.bind.as_deref(), &toml_config);
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_address))?;
    info!("Listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        warn!(error = %e, "Job sweeper ended abnormally");
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Periodically evict finished jobs past their retention window
fn spawn_job_sweeper(state: AppState, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
    let job_store = Arc::clone(&state.job_store);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let evicted = job_store.evict_expired().await;
                    if evicted > 0 {
                        tracing::debug!(evicted, "Evicted expired clustering jobs");
                    }
                }
            }
        }
    })
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
