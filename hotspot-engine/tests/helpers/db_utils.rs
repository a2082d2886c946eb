//! Database and state test utilities

use anyhow::Result;
use hotspot_common::events::EventBus;
use hotspot_engine::models::{ClusteringJob, ClusteringParameters};
use hotspot_engine::services::{EmbeddingProvider, JobStore};
use hotspot_engine::{AppState, EngineSettings};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

/// Create temporary test database with tables initialized
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> Result<(TempDir, SqlitePool)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test_hotspots.db");
    let pool = hotspot_engine::db::init_database_pool(&db_path).await?;
    Ok((temp_dir, pool))
}

/// Full application state over a temporary database
pub async fn create_test_state(
    provider: Arc<dyn EmbeddingProvider>,
    parameters: ClusteringParameters,
) -> Result<(TempDir, AppState)> {
    let (temp_dir, pool) = create_test_db().await?;
    let settings = EngineSettings {
        embedding_timeout: Duration::from_secs(2),
        parameters,
        job_retention: Duration::from_secs(600),
    };
    let state = AppState::new(pool, EventBus::new(256), provider, settings);
    Ok((temp_dir, state))
}

/// Poll the job store until the job reaches a terminal state
pub async fn wait_for_terminal(state: &AppState, job_id: Uuid) -> ClusteringJob {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(20);
    loop {
        let job = state.job_store.get(job_id).await.expect("job should exist");
        if job.is_terminal() {
            return job;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {} did not finish, last status {:?}",
            job_id,
            job.status
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Initialize test logging once; RUST_LOG controls verbosity
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
