//! Clustering job state machine
//!
//! QUEUED → PROCESSING{DOMAIN_PRECLUSTERING → SEMANTIC_REFINEMENT →
//! QUALITY_VALIDATION} → COMPLETED | FAILED | CANCELLED

use crate::models::{ClusteringParameters, ClusteringRequest, ClusteringResult};
use chrono::{DateTime, Utc};
use hotspot_common::events::ClusteringStage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a clustering job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }
}

/// Recoverable problem absorbed by a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobWarning {
    /// Signals whose features could not be produced this run
    DegradedFeatures { count: usize, signal_ids: Vec<Uuid> },
    /// Input too small or too homogeneous for meaningful clustering
    LowDiversity {
        reasons: Vec<String>,
        signal_count: usize,
        distinct_root_causes: usize,
    },
    /// Weak clusters merged into neighbours or demoted to outliers
    ClustersResolved { merged: usize, demoted: usize },
}

impl JobWarning {
    pub fn kind(&self) -> &'static str {
        match self {
            JobWarning::DegradedFeatures { .. } => "DEGRADED_FEATURES",
            JobWarning::LowDiversity { .. } => "LOW_DIVERSITY",
            JobWarning::ClustersResolved { .. } => "CLUSTERS_RESOLVED",
        }
    }

    pub fn message(&self) -> String {
        match self {
            JobWarning::DegradedFeatures { count, .. } => {
                format!("{} signal(s) excluded: features unavailable", count)
            }
            JobWarning::LowDiversity { reasons, .. } => {
                format!("Low diversity input: {}", reasons.join("; "))
            }
            JobWarning::ClustersResolved { merged, demoted } => {
                format!("{} weak cluster(s) merged, {} demoted to outliers", merged, demoted)
            }
        }
    }
}

/// Progress of a job
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    /// Fraction of the current stage (0.0 - 1.0)
    pub stage_progress: f64,
    /// Weighted fraction of the whole job (0.0 - 1.0)
    pub overall_progress: f64,
}

/// Timing of a job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobTiming {
    pub queued_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub estimated_completion: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// A clustering job (in-memory state)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringJob {
    pub job_id: Uuid,
    pub scope: String,
    pub status: JobStatus,
    pub current_stage: Option<ClusteringStage>,
    /// Last stage that ran to its end
    pub last_completed_stage: Option<ClusteringStage>,
    pub progress: JobProgress,
    pub timing: JobTiming,
    pub warnings: Vec<JobWarning>,
    pub error: Option<String>,
    pub request: ClusteringRequest,
    pub parameters: ClusteringParameters,
    pub result: Option<ClusteringResult>,
}

impl ClusteringJob {
    /// Create a queued job
    pub fn new(request: ClusteringRequest, parameters: ClusteringParameters) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            scope: request.scope_filter.scope.clone(),
            status: JobStatus::Queued,
            current_stage: None,
            last_completed_stage: None,
            progress: JobProgress::default(),
            timing: JobTiming {
                queued_at: Some(Utc::now()),
                ..Default::default()
            },
            warnings: Vec::new(),
            error: None,
            request,
            parameters,
            result: None,
        }
    }

    /// QUEUED → PROCESSING
    pub fn start(&mut self) {
        self.status = JobStatus::Processing;
        self.timing.started_at = Some(Utc::now());
    }

    /// Enter a stage; the previous stage is recorded as completed
    pub fn enter_stage(&mut self, stage: ClusteringStage) {
        if self.current_stage.is_some() {
            self.last_completed_stage = self.current_stage;
        }
        self.current_stage = Some(stage);
        self.set_stage_progress(0.0);
    }

    /// Update progress within the current stage
    pub fn set_stage_progress(&mut self, fraction: f64) {
        let fraction = fraction.clamp(0.0, 1.0);
        let Some(stage) = self.current_stage else {
            return;
        };
        self.progress.stage_progress = fraction;
        let overall = (stage.completed_weight() + stage.weight() * fraction).clamp(0.0, 1.0);
        // Overall progress never moves backwards
        self.progress.overall_progress = self.progress.overall_progress.max(overall);

        if let Some(started_at) = self.timing.started_at {
            self.timing.estimated_completion = hotspot_common::time::estimate_completion(
                started_at,
                Utc::now(),
                self.progress.overall_progress,
            );
        }
    }

    pub fn add_warning(&mut self, warning: JobWarning) {
        self.warnings.push(warning);
    }

    /// PROCESSING → COMPLETED
    pub fn complete(&mut self, result: ClusteringResult) {
        self.last_completed_stage = Some(ClusteringStage::QualityValidation);
        self.finish(JobStatus::Completed);
        self.progress = JobProgress {
            stage_progress: 1.0,
            overall_progress: 1.0,
        };
        self.result = Some(result);
    }

    /// → FAILED
    pub fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.finish(JobStatus::Failed);
    }

    /// → CANCELLED
    pub fn cancel(&mut self) {
        self.finish(JobStatus::Cancelled);
    }

    fn finish(&mut self, status: JobStatus) {
        self.status = status;
        self.current_stage = Some(ClusteringStage::Finished);
        let now = Utc::now();
        self.timing.finished_at = Some(now);
        self.timing.estimated_completion = None;
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Milliseconds between start and finish (or now)
    pub fn elapsed_ms(&self) -> u64 {
        let Some(started_at) = self.timing.started_at else {
            return 0;
        };
        let end = self.timing.finished_at.unwrap_or_else(Utc::now);
        (end - started_at).num_milliseconds().max(0) as u64
    }
}

/// Response body of `GET /clustering/status/:job_id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusView {
    pub job_id: Uuid,
    pub scope: String,
    pub status: JobStatus,
    pub current_stage: Option<ClusteringStage>,
    pub progress: JobProgress,
    pub timing: JobTiming,
    pub warnings: Vec<JobWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&ClusteringJob> for JobStatusView {
    fn from(job: &ClusteringJob) -> Self {
        Self {
            job_id: job.job_id,
            scope: job.scope.clone(),
            status: job.status,
            current_stage: job.current_stage,
            progress: job.progress,
            timing: job.timing.clone(),
            warnings: job.warnings.clone(),
            error: job.error.clone(),
        }
    }
}
