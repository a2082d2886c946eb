//! Data models for hotspot-engine
//!
//! - Signals and their derived features
//! - Hotspots and memberships
//! - Clustering job state machine and results

pub mod cluster;
pub mod clustering_job;
pub mod hotspot;
pub mod parameters;
pub mod root_cause;
pub mod signal;

pub use cluster::{ClusterMetrics, ClusteringResult, FinalCluster, SubGroup, ValidatedCluster};
pub use clustering_job::{ClusteringJob, JobProgress, JobStatus, JobStatusView, JobTiming, JobWarning};
pub use hotspot::{
    ClusteringResultsPayload, CommitSummary, Hotspot, HotspotDetail, HotspotDraft, HotspotSignal,
    HotspotStatus, MembershipDraft, CLUSTERING_METHOD, RESULTS_PAYLOAD_VERSION,
};
pub use parameters::{ClusteringParameters, ClusteringRequest, ScopeFilter};
pub use root_cause::RootCause;
pub use signal::{
    BusinessContext, ClassifiedSignal, DomainClassification, FeatureBundle, NewSignal, Severity, Signal,
};
