//! Stage 1: DOMAIN_PRECLUSTERING
//!
//! Reads the scope's signals, refreshes features that are not current,
//! classifies, and buckets the usable signals by (root cause, department).

use super::ClusteringOrchestrator;
use crate::db::SignalFilter;
use crate::models::{ClassifiedSignal, ClusteringJob, JobWarning};
use crate::services::feature_pipeline::FeatureStatus;
use crate::services::pre_clusterer::{pre_cluster, PreClusterOutcome};
use anyhow::{anyhow, Result};
use futures::StreamExt;
use hotspot_common::events::ClusteringStage;

/// Progress is reported about this many times per stage
const PROGRESS_STEPS: usize = 20;

/// Stage 1 output
pub(super) struct Preclustered {
    pub outcome: PreClusterOutcome,
    /// Usable signals entering clustering
    pub input_signal_count: usize,
}

impl ClusteringOrchestrator {
    pub(super) async fn phase_preclustering(&self, job: &mut ClusteringJob) -> Result<Preclustered> {
        self.enter_stage(job, ClusteringStage::DomainPreclustering).await;

        let filter = SignalFilter {
            scope: job.scope.clone(),
            received_after: job.request.scope_filter.received_after,
            limit: job.request.max_signals,
        };
        let signals = self.signals.fetch_signals(&filter).await?;
        let total = signals.len();
        tracing::info!(job_id = %job.job_id, scope = %job.scope, signals = total, "Phase 1: DOMAIN_PRECLUSTERING");

        if total == 0 {
            return Err(anyhow!("No usable signals: scope '{}' has no signals to cluster", job.scope));
        }

        let params = job.parameters.clone();
        let step = (total / PROGRESS_STEPS).max(1);
        let mut classified: Vec<ClassifiedSignal> = Vec::with_capacity(total);
        let mut degraded = Vec::new();
        let mut regenerated = 0usize;
        let mut processed = 0usize;

        let mut annotated_stream =
            self.pipeline
                .annotate_all(signals, job.request.force_regenerate, params.extraction_concurrency);
        while let Some(annotated) = annotated_stream.next().await {
            let annotated = annotated?;
            processed += 1;
            match &annotated.status {
                FeatureStatus::Degraded(_) => degraded.push(annotated.signal.id),
                FeatureStatus::Regenerated => regenerated += 1,
                FeatureStatus::Current => {}
            }
            if let Some(signal) = annotated.classified() {
                classified.push(signal);
            }

            if processed % step == 0 && processed < total {
                // Extraction dominates this stage
                self.report_progress(job, 0.9 * processed as f64 / total as f64).await;
            }
        }
        drop(annotated_stream);

        tracing::info!(
            job_id = %job.job_id,
            processed,
            regenerated,
            degraded = degraded.len(),
            usable = classified.len(),
            "Features refreshed"
        );

        if !degraded.is_empty() {
            degraded.sort();
            self.warn(
                job,
                JobWarning::DegradedFeatures {
                    count: degraded.len(),
                    signal_ids: degraded,
                },
            )
            .await;
        }

        if classified.is_empty() {
            return Err(anyhow!(
                "No usable signals: none of {} signal(s) in scope '{}' has usable features",
                total,
                job.scope
            ));
        }

        // Completion order is nondeterministic
        classified.sort_by_key(|s| s.id);

        let outcome = pre_cluster(&classified, &params);
        if let Some(low_diversity) = outcome.low_diversity.clone() {
            self.warn(job, low_diversity.into()).await;
        }

        tracing::info!(
            job_id = %job.job_id,
            buckets = outcome.buckets.len(),
            signals = outcome.signal_count(),
            "Domain pre-clustering complete"
        );
        self.report_progress(job, 1.0).await;

        Ok(Preclustered {
            input_signal_count: classified.len(),
            outcome,
        })
    }
}
