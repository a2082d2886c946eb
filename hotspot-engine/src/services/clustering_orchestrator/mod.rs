//! Clustering job orchestrator
//!
//! Drives one clustering job through its stages:
//!
//! QUEUED → DOMAIN_PRECLUSTERING → SEMANTIC_REFINEMENT → QUALITY_VALIDATION
//! → COMPLETED | FAILED | CANCELLED
//!
//! Each stage lives in a `phase_*` module. Cancellation is cooperative and
//! checked between stages (and once more before hotspots are committed), so a
//! cancelled job never writes hotspots. Job snapshots are pushed to the job
//! store at every stage point; clients poll those snapshots.

mod phase_preclustering;
mod phase_refinement;
mod phase_validation;

use crate::db::{HotspotRepository, SignalRepository};
use crate::models::{ClusteringJob, ClusteringParameters, ClusteringRequest, JobStatus, JobWarning};
use crate::services::feature_pipeline::FeaturePipeline;
use crate::services::job_store::JobStore;
use chrono::Utc;
use hotspot_common::events::{ClusteringStage, EventBus, HotspotEvent};
use hotspot_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Response of `POST /clustering/start`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartOutcome {
    pub job_id: Uuid,
    /// True when the scope already had an active job and its id is returned
    pub already_running: bool,
}

/// Response of `POST /clustering/cancel/:job_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelAcknowledgement {
    pub job_id: Uuid,
    /// Job status when the request was handled
    pub status: JobStatus,
    /// False when the job had already finished
    pub cancel_requested: bool,
}

/// Clustering job orchestrator
pub struct ClusteringOrchestrator {
    signals: Arc<dyn SignalRepository>,
    hotspots: Arc<dyn HotspotRepository>,
    pipeline: Arc<FeaturePipeline>,
    job_store: Arc<dyn JobStore>,
    event_bus: EventBus,
    defaults: ClusteringParameters,
    cancellation_tokens: RwLock<HashMap<Uuid, CancellationToken>>,
}

impl ClusteringOrchestrator {
    pub fn new(
        signals: Arc<dyn SignalRepository>,
        hotspots: Arc<dyn HotspotRepository>,
        pipeline: Arc<FeaturePipeline>,
        job_store: Arc<dyn JobStore>,
        event_bus: EventBus,
        defaults: ClusteringParameters,
    ) -> Self {
        Self {
            signals,
            hotspots,
            pipeline,
            job_store,
            event_bus,
            defaults,
            cancellation_tokens: RwLock::new(HashMap::new()),
        }
    }

    /// Configured parameter defaults
    pub fn defaults(&self) -> &ClusteringParameters {
        &self.defaults
    }

    pub fn job_store(&self) -> &Arc<dyn JobStore> {
        &self.job_store
    }

    /// Queue a job and run it in the background
    ///
    /// A scope with an active job gets that job's id back instead.
    pub async fn start(self: &Arc<Self>, request: ClusteringRequest) -> Result<StartOutcome> {
        let parameters = request.resolve_parameters(&self.defaults).map_err(Error::InvalidInput)?;
        let candidate = ClusteringJob::new(request, parameters);

        // The token must exist before the job becomes visible to `cancel`
        let token = CancellationToken::new();
        let candidate_id = candidate.job_id;
        self.cancellation_tokens.write().await.insert(candidate_id, token.clone());
        let (job, created) = self.job_store.create_or_get_active(candidate).await;

        if !created {
            self.cancellation_tokens.write().await.remove(&candidate_id);
            tracing::info!(job_id = %job.job_id, scope = %job.scope, "Clustering already running for scope");
            return Ok(StartOutcome {
                job_id: job.job_id,
                already_running: true,
            });
        }

        tracing::info!(job_id = %job.job_id, scope = %job.scope, "Clustering job queued");
        self.event_bus.emit_lossy(HotspotEvent::ClusteringJobQueued {
            job_id: job.job_id,
            scope: job.scope.clone(),
            timestamp: Utc::now(),
        });

        let job_id = job.job_id;
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let finished = orchestrator.execute_job(job, token).await;
            orchestrator.cancellation_tokens.write().await.remove(&finished.job_id);
            tracing::debug!(job_id = %finished.job_id, status = ?finished.status, "Background clustering task ended");
        });

        Ok(StartOutcome {
            job_id,
            already_running: false,
        })
    }

    /// Request cooperative cancellation
    pub async fn cancel(&self, job_id: Uuid) -> Result<CancelAcknowledgement> {
        let job = self
            .job_store
            .get(job_id)
            .await
            .ok_or_else(|| Error::NotFound(format!("clustering job {}", job_id)))?;

        if job.is_terminal() {
            return Ok(CancelAcknowledgement {
                job_id,
                status: job.status,
                cancel_requested: false,
            });
        }

        let token = self.cancellation_tokens.read().await.get(&job_id).cloned();
        match token {
            Some(token) => {
                token.cancel();
                tracing::info!(job_id = %job_id, "Clustering cancellation requested");
                Ok(CancelAcknowledgement {
                    job_id,
                    status: job.status,
                    cancel_requested: true,
                })
            }
            None => Err(Error::Internal(format!("No cancellation handle for active job {}", job_id))),
        }
    }

    /// Current snapshot of a job
    pub async fn job(&self, job_id: Uuid) -> Option<ClusteringJob> {
        self.job_store.get(job_id).await
    }

    /// Run a job to a terminal state and return its final snapshot
    pub async fn execute_job(&self, mut job: ClusteringJob, cancel_token: CancellationToken) -> ClusteringJob {
        let start_time = std::time::Instant::now();
        job.start();
        self.save(&job).await;

        tracing::info!(
            job_id = %job.job_id,
            scope = %job.scope,
            force_regenerate = job.request.force_regenerate,
            "Starting clustering job"
        );

        if cancel_token.is_cancelled() {
            return self.cancel_job(job).await;
        }

        // Stage 1: DOMAIN_PRECLUSTERING
        let preclustered = match self.phase_preclustering(&mut job).await {
            Ok(outcome) => outcome,
            Err(e) => return self.fail_job(job, e).await,
        };
        if cancel_token.is_cancelled() {
            return self.cancel_job(job).await;
        }

        // Stage 2: SEMANTIC_REFINEMENT
        let refinement = match self.phase_refinement(&mut job, preclustered.outcome).await {
            Ok(outcome) => outcome,
            Err(e) => return self.fail_job(job, e).await,
        };
        if cancel_token.is_cancelled() {
            return self.cancel_job(job).await;
        }

        // Stage 3: QUALITY_VALIDATION (commits hotspots)
        let result = match self
            .phase_validation(&mut job, refinement, preclustered.input_signal_count, start_time, &cancel_token)
            .await
        {
            Ok(Some(result)) => result,
            Ok(None) => return self.cancel_job(job).await,
            Err(e) => return self.fail_job(job, e).await,
        };

        tracing::info!(
            job_id = %job.job_id,
            input_signal_count = result.input_signal_count,
            output_cluster_count = result.output_cluster_count,
            outlier_signal_count = result.outlier_signal_count,
            processing_time_ms = result.processing_time_ms,
            "Clustering job completed"
        );
        self.event_bus.emit_lossy(HotspotEvent::ClusteringCompleted {
            job_id: job.job_id,
            input_signal_count: result.input_signal_count,
            output_cluster_count: result.output_cluster_count,
            outlier_signal_count: result.outlier_signal_count,
            duration_ms: result.processing_time_ms,
            timestamp: Utc::now(),
        });

        job.complete(result);
        self.save(&job).await;
        job
    }

    async fn save(&self, job: &ClusteringJob) {
        if let Err(e) = self.job_store.update(job.clone()).await {
            tracing::warn!(job_id = %job.job_id, error = %e, "Failed to store clustering job snapshot");
        }
    }

    /// Enter a stage and announce it
    async fn enter_stage(&self, job: &mut ClusteringJob, stage: ClusteringStage) {
        job.enter_stage(stage);
        self.save(job).await;
        tracing::info!(job_id = %job.job_id, stage = stage.as_str(), "Clustering stage started");
        self.event_bus.emit_lossy(HotspotEvent::ClusteringStageStarted {
            job_id: job.job_id,
            stage,
            timestamp: Utc::now(),
        });
    }

    /// Record progress within the current stage
    async fn report_progress(&self, job: &mut ClusteringJob, fraction: f64) {
        job.set_stage_progress(fraction);
        self.save(job).await;
        if let Some(stage) = job.current_stage {
            self.event_bus.emit_lossy(HotspotEvent::ClusteringProgress {
                job_id: job.job_id,
                stage,
                stage_progress: job.progress.stage_progress,
                overall_progress: job.progress.overall_progress,
                timestamp: Utc::now(),
            });
        }
    }

    async fn warn(&self, job: &mut ClusteringJob, warning: JobWarning) {
        let message = warning.message();
        tracing::warn!(job_id = %job.job_id, kind = warning.kind(), "{}", message);
        self.event_bus.emit_lossy(HotspotEvent::ClusteringWarning {
            job_id: job.job_id,
            kind: warning.kind().to_string(),
            message,
            timestamp: Utc::now(),
        });
        job.add_warning(warning);
        self.save(job).await;
    }

    async fn fail_job(&self, mut job: ClusteringJob, error: anyhow::Error) -> ClusteringJob {
        let message = format!("{:#}", error);
        tracing::error!(job_id = %job.job_id, error = %message, "Clustering job failed");
        job.fail(message.clone());
        self.save(&job).await;
        self.event_bus.emit_lossy(HotspotEvent::ClusteringFailed {
            job_id: job.job_id,
            error: message,
            timestamp: Utc::now(),
        });
        job
    }

    async fn cancel_job(&self, mut job: ClusteringJob) -> ClusteringJob {
        // The stage that was running finished before the checkpoint
        let last_completed_stage = job.current_stage.or(job.last_completed_stage);
        job.last_completed_stage = last_completed_stage;
        job.cancel();
        self.save(&job).await;
        tracing::info!(
            job_id = %job.job_id,
            last_completed_stage = ?last_completed_stage,
            "Clustering job cancelled; partial results discarded"
        );
        self.event_bus.emit_lossy(HotspotEvent::ClusteringCancelled {
            job_id: job.job_id,
            last_completed_stage,
            timestamp: Utc::now(),
        });
        job
    }
}
