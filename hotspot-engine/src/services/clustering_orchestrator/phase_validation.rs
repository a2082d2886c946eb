//! Stage 3: QUALITY_VALIDATION
//!
//! Scores candidate clusters, merges or demotes the weak ones, builds hotspot
//! drafts and commits them in one transaction.

use super::ClusteringOrchestrator;
use crate::models::{ClusteringJob, ClusteringResult, FinalCluster, JobWarning};
use crate::services::hotspot_builder::{build_drafts, ensure_conserved, final_cluster};
use crate::services::quality_validator::validate;
use crate::services::semantic_refiner::RefinementOutcome;
use anyhow::{Context, Result};
use hotspot_common::events::ClusteringStage;
use tokio_util::sync::CancellationToken;

impl ClusteringOrchestrator {
    /// Returns `None` when cancelled before the commit
    pub(super) async fn phase_validation(
        &self,
        job: &mut ClusteringJob,
        refinement: RefinementOutcome,
        input_signal_count: usize,
        start_time: std::time::Instant,
        cancel_token: &CancellationToken,
    ) -> Result<Option<ClusteringResult>> {
        self.enter_stage(job, ClusteringStage::QualityValidation).await;
        tracing::info!(
            job_id = %job.job_id,
            candidates = refinement.groups.len(),
            "Phase 3: QUALITY_VALIDATION"
        );

        let params = job.parameters.clone();
        let validation = validate(refinement, &params);
        if validation.merged > 0 || validation.demoted > 0 {
            self.warn(
                job,
                JobWarning::ClustersResolved {
                    merged: validation.merged,
                    demoted: validation.demoted,
                },
            )
            .await;
        }
        self.report_progress(job, 0.4).await;

        let drafts = build_drafts(&validation, &params);
        tracing::debug!(
            job_id = %job.job_id,
            clusters = validation.clusters.len(),
            drafts = drafts.len(),
            outliers = validation.outliers.len(),
            "Hotspot drafts built"
        );
        ensure_conserved(&drafts, &validation.outliers, input_signal_count)
            .context("Signal accounting failed before commit")?;
        self.report_progress(job, 0.7).await;

        if cancel_token.is_cancelled() {
            return Ok(None);
        }

        let summary = self
            .hotspots
            .commit_run(&job.scope, &drafts, params.similarity_threshold)
            .await
            .context("Failed to persist hotspots")?;
        tracing::info!(
            job_id = %job.job_id,
            inserted = summary.inserted,
            updated = summary.updated,
            archived = summary.archived,
            "Hotspots committed"
        );

        let final_clusters: Vec<FinalCluster> = summary
            .hotspot_ids
            .iter()
            .zip(&drafts)
            .map(|(id, draft)| final_cluster(*id, draft))
            .collect();
        self.report_progress(job, 1.0).await;

        Ok(Some(ClusteringResult::new(
            input_signal_count,
            final_clusters,
            validation.outliers.len(),
            start_time.elapsed().as_millis() as u64,
        )))
    }
}
