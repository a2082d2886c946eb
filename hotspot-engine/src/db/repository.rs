//! Typed repository seams
//!
//! The pipeline talks to storage only through these traits, so tests and
//! alternative stores can stand in for SQLite.

use crate::models::{
    CommitSummary, DomainClassification, FeatureBundle, Hotspot, HotspotDetail, HotspotDraft, HotspotStatus, Signal,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hotspot_common::Result;
use uuid::Uuid;

/// Which signals to read
#[derive(Debug, Clone, Default)]
pub struct SignalFilter {
    pub scope: String,
    pub received_after: Option<DateTime<Utc>>,
    /// Newest first, at most this many
    pub limit: Option<usize>,
}

/// Signal storage
#[async_trait]
pub trait SignalRepository: Send + Sync {
    async fn insert_signal(&self, signal: &Signal) -> Result<()>;

    async fn get_signal(&self, id: Uuid) -> Result<Option<Signal>>;

    /// Signals matching the filter, newest first
    async fn fetch_signals(&self, filter: &SignalFilter) -> Result<Vec<Signal>>;

    /// Store a feature bundle beside the signal (text is never touched)
    async fn write_features(&self, id: Uuid, bundle: &FeatureBundle, generated_at: DateTime<Utc>) -> Result<()>;

    async fn write_classification(&self, id: Uuid, classification: &DomainClassification) -> Result<()>;

    async fn count_signals(&self, scope: &str) -> Result<usize>;
}

/// Hotspot storage
#[async_trait]
pub trait HotspotRepository: Send + Sync {
    /// Upsert a run's drafts by fingerprint and archive open hotspots the run
    /// no longer produced, atomically
    async fn commit_run(&self, scope: &str, drafts: &[HotspotDraft], similarity_threshold: f64) -> Result<CommitSummary>;

    async fn list_hotspots(&self, scope: Option<&str>, status: Option<HotspotStatus>) -> Result<Vec<Hotspot>>;

    async fn get_hotspot(&self, id: Uuid) -> Result<Option<HotspotDetail>>;

    /// Manual status change; rejects transitions the lifecycle does not allow
    async fn update_status(&self, id: Uuid, status: HotspotStatus) -> Result<Hotspot>;

    async fn count_hotspots(&self, scope: &str) -> Result<usize>;
}
