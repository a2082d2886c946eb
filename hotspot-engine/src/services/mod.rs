//! Service modules for the hotspot clustering pipeline
//!
//! Leaves first: embedding and feature extraction, domain classification,
//! pre-clustering, semantic refinement, quality validation, hotspot
//! finalization, and the job orchestrator that drives them.

pub mod clustering_orchestrator;
pub mod domain_classifier;
pub mod embedding;
pub mod feature_extractor;
pub mod feature_pipeline;
pub mod hotspot_builder;
pub mod job_store;
pub mod pre_clusterer;
pub mod quality_validator;
pub mod semantic_refiner;
pub mod similarity;
pub mod taxonomy;

pub use clustering_orchestrator::{CancelAcknowledgement, ClusteringOrchestrator, StartOutcome};
pub use domain_classifier::DomainClassifier;
pub use embedding::{provider_from_config, EmbeddingError, EmbeddingProvider, HashingEmbedder, HttpEmbeddingProvider};
pub use feature_extractor::{FeatureExtractor, FeatureOutcome};
pub use feature_pipeline::{
    AnnotatedSignal, FeaturePipeline, FeatureStatus, RegenerationRequest, RegenerationSummary,
};
pub use job_store::{InMemoryJobStore, JobStore, JobStoreError};
