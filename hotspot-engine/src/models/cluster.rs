//! Intermediate and final cluster shapes produced by the pipeline

use crate::models::{ClassifiedSignal, RootCause};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Candidate group coming out of semantic refinement
#[derive(Debug, Clone)]
pub struct SubGroup {
    pub root_cause: RootCause,
    /// Departments of the buckets this group was built from
    pub departments: BTreeSet<String>,
    pub members: Vec<ClassifiedSignal>,
}

impl SubGroup {
    pub fn new(root_cause: RootCause, department: impl Into<String>, members: Vec<ClassifiedSignal>) -> Self {
        let mut departments = BTreeSet::new();
        departments.insert(department.into());
        Self {
            root_cause,
            departments,
            members,
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Absorb another group's members and departments
    pub fn absorb(&mut self, other: SubGroup) {
        self.departments.extend(other.departments);
        self.members.extend(other.members);
    }
}

/// Quality measurements of one candidate cluster
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterMetrics {
    pub size: usize,
    /// Mean severity weight (1.0 - 5.0)
    pub severity_score: f64,
    /// Distinct departments among members
    pub department_breadth: usize,
    /// Std of severity weights / 2 (0.0 - 1.0)
    pub severity_dispersion: f64,
    /// Mean normalized similarity to the centroid
    pub cohesion: f64,
    /// Mean domain classification confidence
    pub domain_confidence: f64,
    pub actionability: f64,
    pub confidence: f64,
}

/// Cluster that passed validation, with per-member strengths
#[derive(Debug, Clone)]
pub struct ValidatedCluster {
    pub root_cause: RootCause,
    pub members: Vec<ClassifiedSignal>,
    pub centroid: Vec<f32>,
    pub metrics: ClusterMetrics,
}

/// One cluster in a job result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalCluster {
    /// Hotspot the cluster was committed as
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub cluster_type: RootCause,
    pub signal_ids: Vec<Uuid>,
    pub departments_involved: Vec<String>,
    pub actionability: f64,
    pub confidence: f64,
    pub signal_count: usize,
}

/// Snapshot stored on a completed job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringResult {
    pub input_signal_count: usize,
    pub output_cluster_count: usize,
    pub outlier_signal_count: usize,
    /// Signal-weighted mean actionability over final clusters
    pub executive_actionability: f64,
    pub final_clusters: Vec<FinalCluster>,
    pub processing_time_ms: u64,
    pub last_generated: DateTime<Utc>,
}

impl ClusteringResult {
    pub fn new(
        input_signal_count: usize,
        final_clusters: Vec<FinalCluster>,
        outlier_signal_count: usize,
        processing_time_ms: u64,
    ) -> Self {
        let clustered: usize = final_clusters.iter().map(|c| c.signal_count).sum();
        let executive_actionability = if clustered == 0 {
            0.0
        } else {
            final_clusters
                .iter()
                .map(|c| c.actionability * c.signal_count as f64)
                .sum::<f64>()
                / clustered as f64
        };
        Self {
            input_signal_count,
            output_cluster_count: final_clusters.len(),
            outlier_signal_count,
            executive_actionability,
            final_clusters,
            processing_time_ms,
            last_generated: Utc::now(),
        }
    }

    /// Clustered plus outlier signals account for every input signal
    pub fn is_conserved(&self) -> bool {
        let clustered: usize = self.final_clusters.iter().map(|c| c.signal_count).sum();
        clustered + self.outlier_signal_count == self.input_signal_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(count: usize, actionability: f64) -> FinalCluster {
        FinalCluster {
            id: Uuid::new_v4(),
            name: "x".into(),
            cluster_type: RootCause::Process,
            signal_ids: (0..count).map(|_| Uuid::new_v4()).collect(),
            departments_involved: vec![],
            actionability,
            confidence: 0.5,
            signal_count: count,
        }
    }

    #[test]
    fn test_result_counts_partition_input() {
        let result = ClusteringResult::new(10, vec![cluster(4, 0.5), cluster(2, 0.8)], 4, 12);
        assert_eq!(result.output_cluster_count, 2);
        assert_eq!(result.outlier_signal_count, 4);
        assert!(result.is_conserved());
        assert!((result.executive_actionability - 0.6).abs() < 1e-9);

        let json = serde_json::to_value(&result.final_clusters[0]).unwrap();
        assert_eq!(json["type"], "process");
    }

    #[test]
    fn test_empty_result_has_zero_actionability() {
        let result = ClusteringResult::new(3, vec![], 3, 1);
        assert_eq!(result.outlier_signal_count, 3);
        assert_eq!(result.executive_actionability, 0.0);
    }

    #[test]
    fn test_unbalanced_counts_are_not_conserved() {
        let lost = ClusteringResult::new(10, vec![cluster(4, 0.5)], 5, 1);
        assert!(!lost.is_conserved());
        let duplicated = ClusteringResult::new(10, vec![cluster(4, 0.5), cluster(4, 0.5)], 3, 1);
        assert!(!duplicated.is_conserved());
    }
}
