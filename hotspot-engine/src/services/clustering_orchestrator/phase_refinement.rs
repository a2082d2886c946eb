//! Stage 2: SEMANTIC_REFINEMENT
//!
//! Buckets are refined on the blocking pool; progress advances as each
//! bucket finishes.

use super::ClusteringOrchestrator;
use crate::models::ClusteringJob;
use crate::services::pre_clusterer::PreClusterOutcome;
use crate::services::semantic_refiner::{assemble, spawn_refinements, RefinementOutcome};
use anyhow::{Context, Result};
use futures::StreamExt;
use hotspot_common::events::ClusteringStage;

impl ClusteringOrchestrator {
    pub(super) async fn phase_refinement(
        &self,
        job: &mut ClusteringJob,
        preclustered: PreClusterOutcome,
    ) -> Result<RefinementOutcome> {
        self.enter_stage(job, ClusteringStage::SemanticRefinement).await;

        let params = job.parameters.clone();
        let force_split = preclustered.low_diversity.is_some();
        let bucket_count = preclustered.buckets.len();
        tracing::info!(
            job_id = %job.job_id,
            buckets = bucket_count,
            force_split,
            "Phase 2: SEMANTIC_REFINEMENT"
        );

        let mut tasks = spawn_refinements(preclustered.buckets, &params, force_split);
        let mut refinements = Vec::with_capacity(bucket_count);
        while let Some(joined) = tasks.next().await {
            let (index, refinement) = joined.context("Bucket refinement task panicked")?;
            tracing::debug!(
                job_id = %job.job_id,
                root_cause = %refinement.key.0,
                department = %refinement.key.1,
                groups = refinement.groups.len(),
                outliers = refinement.outliers.len(),
                split = refinement.split,
                variance = refinement.variance,
                "Bucket refined"
            );
            refinements.push((index, refinement));
            // Cross-bucket merging takes the remaining tenth
            self.report_progress(job, 0.9 * refinements.len() as f64 / bucket_count.max(1) as f64)
                .await;
        }

        let outcome = assemble(refinements, &params);
        tracing::info!(
            job_id = %job.job_id,
            groups = outcome.groups.len(),
            outliers = outcome.outliers.len(),
            merged = outcome.merged,
            reassigned = outcome.reassigned,
            "Semantic refinement complete"
        );
        self.report_progress(job, 1.0).await;

        Ok(outcome)
    }
}
