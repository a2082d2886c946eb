//! hotspot-engine library interface
//!
//! Exposes the clustering pipeline, storage and HTTP router for the binary
//! and for integration tests.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use crate::db::{HotspotRepository, SignalRepository, SqliteHotspotRepository, SqliteSignalRepository};
use crate::models::ClusteringParameters;
use crate::services::{
    ClusteringOrchestrator, DomainClassifier, EmbeddingProvider, FeatureExtractor, FeaturePipeline, InMemoryJobStore,
    JobStore,
};
use axum::Router;
use chrono::{DateTime, Utc};
use hotspot_common::events::EventBus;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Engine tuning resolved from configuration
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Per-call embedding timeout
    pub embedding_timeout: Duration,
    /// Clustering defaults; requests override individual fields
    pub parameters: ClusteringParameters,
    /// How long finished jobs stay pollable
    pub job_retention: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            embedding_timeout: Duration::from_secs(5),
            parameters: ClusteringParameters::default(),
            job_retention: Duration::from_secs(hotspot_common::config::DEFAULT_JOB_RETENTION_SECS),
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    pub signals: Arc<dyn SignalRepository>,
    pub hotspots: Arc<dyn HotspotRepository>,
    pub pipeline: Arc<FeaturePipeline>,
    pub job_store: Arc<dyn JobStore>,
    pub orchestrator: Arc<ClusteringOrchestrator>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Wire the pipeline over a SQLite pool and an embedding provider
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        provider: Arc<dyn EmbeddingProvider>,
        settings: EngineSettings,
    ) -> Self {
        let signals: Arc<dyn SignalRepository> = Arc::new(SqliteSignalRepository::new(db.clone()));
        let hotspots: Arc<dyn HotspotRepository> = Arc::new(SqliteHotspotRepository::new(db.clone()));
        let extractor = Arc::new(FeatureExtractor::new(provider, settings.embedding_timeout));
        let classifier = Arc::new(DomainClassifier::default());
        let pipeline = Arc::new(FeaturePipeline::new(
            Arc::clone(&signals),
            extractor,
            classifier,
            event_bus.clone(),
        ));
        let job_store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new(settings.job_retention));
        let orchestrator = Arc::new(ClusteringOrchestrator::new(
            Arc::clone(&signals),
            Arc::clone(&hotspots),
            Arc::clone(&pipeline),
            Arc::clone(&job_store),
            event_bus.clone(),
            settings.parameters,
        ));

        Self {
            db,
            event_bus,
            signals,
            hotspots,
            pipeline,
            job_store,
            orchestrator,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::clustering_routes())
        .merge(api::feature_routes())
        .merge(api::signal_routes())
        .merge(api::hotspot_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
