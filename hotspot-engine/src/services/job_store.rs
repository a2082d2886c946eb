//! Clustering job store
//!
//! Jobs are ephemeral: they live in memory, one active job per scope, and
//! finished jobs are kept for a retention window so clients can poll results.

use crate::models::ClusteringJob;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Job store errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobStoreError {
    #[error("Clustering job {0} not found")]
    NotFound(Uuid),

    #[error("Clustering job {0} already finished")]
    AlreadyFinished(Uuid),
}

/// Storage for clustering jobs
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert `job` unless its scope already has an active job
    ///
    /// Returns the stored job and whether it was newly created. When the
    /// scope is busy the active job is returned instead and `job` is dropped.
    async fn create_or_get_active(&self, job: ClusteringJob) -> (ClusteringJob, bool);

    async fn get(&self, job_id: Uuid) -> Option<ClusteringJob>;

    /// Replace a job snapshot; a terminal snapshot releases the scope and
    /// starts the retention clock
    async fn update(&self, job: ClusteringJob) -> Result<(), JobStoreError>;

    async fn active_job_for_scope(&self, scope: &str) -> Option<Uuid>;

    /// Drop finished jobs past retention; returns how many were dropped
    async fn evict_expired(&self) -> usize;
}

struct StoredJob {
    job: ClusteringJob,
    expires_at: Option<Instant>,
}

#[derive(Default)]
struct Inner {
    jobs: HashMap<Uuid, StoredJob>,
    active_by_scope: HashMap<String, Uuid>,
}

/// In-memory job store with TTL retention
pub struct InMemoryJobStore {
    inner: RwLock<Inner>,
    retention: Duration,
}

impl InMemoryJobStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            retention,
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create_or_get_active(&self, job: ClusteringJob) -> (ClusteringJob, bool) {
        let mut inner = self.inner.write().await;

        let active = inner
            .active_by_scope
            .get(&job.scope)
            .and_then(|id| inner.jobs.get(id))
            .map(|stored| stored.job.clone());
        if let Some(active) = active {
            debug!(job_id = %active.job_id, scope = %active.scope, "Scope already has an active clustering job");
            return (active, false);
        }

        inner.active_by_scope.insert(job.scope.clone(), job.job_id);
        inner.jobs.insert(
            job.job_id,
            StoredJob {
                job: job.clone(),
                expires_at: None,
            },
        );
        (job, true)
    }

    async fn get(&self, job_id: Uuid) -> Option<ClusteringJob> {
        self.inner.read().await.jobs.get(&job_id).map(|stored| stored.job.clone())
    }

    async fn update(&self, job: ClusteringJob) -> Result<(), JobStoreError> {
        let mut inner = self.inner.write().await;
        let retention = self.retention;

        let stored = inner.jobs.get_mut(&job.job_id).ok_or(JobStoreError::NotFound(job.job_id))?;
        if stored.job.is_terminal() {
            return Err(JobStoreError::AlreadyFinished(job.job_id));
        }

        let job_id = job.job_id;
        let scope = job.scope.clone();
        let terminal = job.is_terminal();
        stored.job = job;
        if terminal {
            stored.expires_at = Some(Instant::now() + retention);
            if inner.active_by_scope.get(&scope) == Some(&job_id) {
                inner.active_by_scope.remove(&scope);
            }
        }
        Ok(())
    }

    async fn active_job_for_scope(&self, scope: &str) -> Option<Uuid> {
        self.inner.read().await.active_by_scope.get(scope).copied()
    }

    async fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.write().await;
        let before = inner.jobs.len();
        inner
            .jobs
            .retain(|_, stored| stored.expires_at.map(|at| at > now).unwrap_or(true));
        before - inner.jobs.len()
    }
}
