//! Clustering workflow type definitions
//!
//! Supporting types for clustering job progress events.

use serde::{Deserialize, Serialize};

/// Stage of a clustering job
///
/// Stages run strictly in this order; `Finished` marks a job that left the
/// pipeline (completed, failed or cancelled).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusteringStage {
    /// Feature refresh, domain classification, coarse bucketing
    DomainPreclustering,
    /// Embedding-based split/merge inside buckets
    SemanticRefinement,
    /// Actionability scoring, merge-or-demote, finalization
    QualityValidation,
    /// Left the pipeline
    Finished,
}

impl ClusteringStage {
    /// Fixed contribution of this stage to overall progress
    pub fn weight(&self) -> f64 {
        match self {
            ClusteringStage::DomainPreclustering => 0.2,
            ClusteringStage::SemanticRefinement => 0.5,
            ClusteringStage::QualityValidation => 0.3,
            ClusteringStage::Finished => 0.0,
        }
    }

    /// Summed weight of all stages before this one
    pub fn completed_weight(&self) -> f64 {
        match self {
            ClusteringStage::DomainPreclustering => 0.0,
            ClusteringStage::SemanticRefinement => 0.2,
            ClusteringStage::QualityValidation => 0.7,
            ClusteringStage::Finished => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClusteringStage::DomainPreclustering => "DOMAIN_PRECLUSTERING",
            ClusteringStage::SemanticRefinement => "SEMANTIC_REFINEMENT",
            ClusteringStage::QualityValidation => "QUALITY_VALIDATION",
            ClusteringStage::Finished => "FINISHED",
        }
    }
}

/// Counters reported when a feature regeneration batch finishes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegenerationCounts {
    /// Signals examined
    pub processed: usize,
    /// Bundles (re)written
    pub regenerated: usize,
    /// Signals whose bundle was already current
    pub skipped_current: usize,
    /// Signals the provider could not embed this time
    pub degraded: usize,
}
