//! Hotspot model
//!
//! A hotspot is a committed cluster of signals describing one recurring
//! problem pattern. Membership is owned by the pipeline; status by humans.

use crate::models::RootCause;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Clustering method recorded on every hotspot
pub const CLUSTERING_METHOD: &str = "hybrid-domain-semantic";

/// Version of the `clustering_results` payload layout
pub const RESULTS_PAYLOAD_VERSION: u32 = 1;

/// Review status of a hotspot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HotspotStatus {
    Open,
    Approved,
    Rejected,
    Archived,
}

impl HotspotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HotspotStatus::Open => "open",
            HotspotStatus::Approved => "approved",
            HotspotStatus::Rejected => "rejected",
            HotspotStatus::Archived => "archived",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "open" => Some(HotspotStatus::Open),
            "approved" => Some(HotspotStatus::Approved),
            "rejected" => Some(HotspotStatus::Rejected),
            "archived" => Some(HotspotStatus::Archived),
            _ => None,
        }
    }

    /// Allowed manual transitions
    pub fn can_transition_to(&self, next: HotspotStatus) -> bool {
        use HotspotStatus::*;
        matches!(
            (self, next),
            (Open, Approved) | (Open, Rejected) | (Open, Archived) | (Approved, Archived) | (Rejected, Open)
        )
    }
}

/// Quality snapshot persisted with a hotspot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringResultsPayload {
    pub version: u32,
    pub quality_score: f64,
    pub generated_at: DateTime<Utc>,
}

/// Persisted hotspot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hotspot {
    pub id: Uuid,
    pub scope: String,
    pub title: String,
    pub summary: String,
    pub status: HotspotStatus,
    pub rank_score: f64,
    pub confidence: f64,
    pub root_cause: RootCause,
    pub clustering_method: String,
    pub similarity_threshold: f64,
    pub clustering_results: ClusteringResultsPayload,
    /// SHA-256 hex over sorted member ids; unique per scope
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Membership of a signal in a hotspot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotSignal {
    pub hotspot_id: Uuid,
    pub signal_id: Uuid,
    /// Normalized similarity to the cluster centroid
    pub strength: f64,
    pub is_outlier: bool,
}

/// Membership row before the hotspot id is known
#[derive(Debug, Clone, PartialEq)]
pub struct MembershipDraft {
    pub signal_id: Uuid,
    pub strength: f64,
    pub is_outlier: bool,
}

/// Hotspot ready to be committed by a run
#[derive(Debug, Clone)]
pub struct HotspotDraft {
    pub title: String,
    pub summary: String,
    pub root_cause: RootCause,
    pub rank_score: f64,
    pub confidence: f64,
    pub actionability: f64,
    pub departments: Vec<String>,
    pub fingerprint: String,
    pub memberships: Vec<MembershipDraft>,
}

impl HotspotDraft {
    /// Ids of members that count toward the hotspot
    pub fn primary_signal_ids(&self) -> Vec<Uuid> {
        self.memberships
            .iter()
            .filter(|m| !m.is_outlier)
            .map(|m| m.signal_id)
            .collect()
    }
}

/// Hotspot with its membership rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotspotDetail {
    #[serde(flatten)]
    pub hotspot: Hotspot,
    pub signals: Vec<HotspotSignal>,
}

/// Outcome of committing one run's drafts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitSummary {
    /// Hotspot id for each draft, in draft order
    pub hotspot_ids: Vec<Uuid>,
    pub inserted: usize,
    pub updated: usize,
    pub archived: usize,
}
