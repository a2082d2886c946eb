//! Event types for the hotspot event system
//!
//! Provides shared event definitions and the EventBus used to fan clustering
//! progress out to SSE clients and log consumers.

mod clustering_types;

pub use clustering_types::{ClusteringStage, RegenerationCounts};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Hotspot event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HotspotEvent {
    /// Clustering job accepted and queued
    ClusteringJobQueued {
        job_id: Uuid,
        scope: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A pipeline stage began
    ClusteringStageStarted {
        job_id: Uuid,
        stage: ClusteringStage,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Progress inside the current stage
    ClusteringProgress {
        job_id: Uuid,
        stage: ClusteringStage,
        /// Fraction of the current stage (0.0 - 1.0)
        stage_progress: f64,
        /// Weighted fraction of the whole job (0.0 - 1.0)
        overall_progress: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Recoverable problem absorbed by the pipeline
    ClusteringWarning {
        job_id: Uuid,
        /// Warning kind (e.g. "LOW_DIVERSITY")
        kind: String,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Job finished and hotspots were committed
    ClusteringCompleted {
        job_id: Uuid,
        input_signal_count: usize,
        output_cluster_count: usize,
        outlier_signal_count: usize,
        duration_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Job failed; nothing was committed
    ClusteringFailed {
        job_id: Uuid,
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Job cancelled at a stage boundary; partial results discarded
    ClusteringCancelled {
        job_id: Uuid,
        last_completed_stage: Option<ClusteringStage>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Feature regeneration batch finished
    FeaturesRegenerated {
        counts: RegenerationCounts,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl HotspotEvent {
    /// Event type name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            HotspotEvent::ClusteringJobQueued { .. } => "ClusteringJobQueued",
            HotspotEvent::ClusteringStageStarted { .. } => "ClusteringStageStarted",
            HotspotEvent::ClusteringProgress { .. } => "ClusteringProgress",
            HotspotEvent::ClusteringWarning { .. } => "ClusteringWarning",
            HotspotEvent::ClusteringCompleted { .. } => "ClusteringCompleted",
            HotspotEvent::ClusteringFailed { .. } => "ClusteringFailed",
            HotspotEvent::ClusteringCancelled { .. } => "ClusteringCancelled",
            HotspotEvent::FeaturesRegenerated { .. } => "FeaturesRegenerated",
        }
    }

    /// Job the event belongs to, if any
    pub fn job_id(&self) -> Option<Uuid> {
        match self {
            HotspotEvent::ClusteringJobQueued { job_id, .. }
            | HotspotEvent::ClusteringStageStarted { job_id, .. }
            | HotspotEvent::ClusteringProgress { job_id, .. }
            | HotspotEvent::ClusteringWarning { job_id, .. }
            | HotspotEvent::ClusteringCompleted { job_id, .. }
            | HotspotEvent::ClusteringFailed { job_id, .. }
            | HotspotEvent::ClusteringCancelled { job_id, .. } => Some(*job_id),
            HotspotEvent::FeaturesRegenerated { .. } => None,
        }
    }
}

/// Central event distribution bus
///
/// Thin wrapper over `tokio::sync::broadcast`. Slow subscribers lose the
/// oldest events once `capacity` is exceeded; emitters never block.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<HotspotEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<HotspotEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: HotspotEvent,
    ) -> Result<usize, broadcast::error::SendError<HotspotEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: HotspotEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
