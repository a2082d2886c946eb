//! Quality Validator / Optimizer
//!
//! Scores candidate clusters and resolves the weak ones.
//!
//! # Metrics
//! - Severity score: mean of Low=1, Medium=3, High=4, Critical=5
//! - Severity dispersion: std of severity weights / 2
//! - Cohesion: mean normalized similarity to centroid
//! - Actionability: 0.4 × min(size/8, 1) + 0.4 × (severity − 1)/4
//!   + 0.2 × min(breadth/3, 1)
//! - Confidence: (0.4 × domain + 0.6 × cohesion) × (1 − 0.5 × dispersion)
//!
//! Clusters below `min_cluster_size` or `min_actionability` are visited in
//! ascending actionability order and merged into the most similar strong
//! cluster when close enough, otherwise demoted to outliers.

use crate::models::{ClassifiedSignal, ClusterMetrics, ClusteringParameters, RootCause, SubGroup, ValidatedCluster};
use crate::services::pre_clusterer::{normalize_department, UNASSIGNED_DEPARTMENT};
use crate::services::semantic_refiner::RefinementOutcome;
use crate::services::similarity::{centroid, normalized_similarity};
use std::collections::BTreeSet;
use tracing::debug;

const SIZE_WEIGHT: f64 = 0.4;
const SEVERITY_WEIGHT: f64 = 0.4;
const BREADTH_WEIGHT: f64 = 0.2;
/// Size at which the size term saturates
const SIZE_SATURATION: f64 = 8.0;
/// Department count at which the breadth term saturates
const BREADTH_SATURATION: f64 = 3.0;
const DOMAIN_CONFIDENCE_WEIGHT: f64 = 0.4;
const COHESION_WEIGHT: f64 = 0.6;
const DISPERSION_PENALTY: f64 = 0.5;

/// Result of validation
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    pub clusters: Vec<ValidatedCluster>,
    pub outliers: Vec<ClassifiedSignal>,
    /// Weak clusters merged into a strong one
    pub merged: usize,
    /// Weak clusters dissolved into outliers
    pub demoted: usize,
}

impl ValidationOutcome {
    pub fn signal_count(&self) -> usize {
        self.clusters.iter().map(|c| c.members.len()).sum::<usize>() + self.outliers.len()
    }
}

/// Actionability from size, mean severity and department breadth
pub fn actionability(size: usize, severity_score: f64, breadth: usize) -> f64 {
    let size_term = (size as f64 / SIZE_SATURATION).min(1.0);
    let severity_term = ((severity_score - 1.0) / 4.0).clamp(0.0, 1.0);
    let breadth_term = (breadth as f64 / BREADTH_SATURATION).min(1.0);
    SIZE_WEIGHT * size_term + SEVERITY_WEIGHT * severity_term + BREADTH_WEIGHT * breadth_term
}

/// Final confidence; strictly decreasing in severity dispersion
pub fn final_confidence(domain_confidence: f64, cohesion: f64, severity_dispersion: f64) -> f64 {
    let base = DOMAIN_CONFIDENCE_WEIGHT * domain_confidence + COHESION_WEIGHT * cohesion;
    (base * (1.0 - DISPERSION_PENALTY * severity_dispersion)).clamp(0.0, 1.0)
}

/// Measure a set of members around their centroid
pub fn measure(members: &[ClassifiedSignal], centroid_vec: &[f32]) -> ClusterMetrics {
    let size = members.len();
    if size == 0 {
        return ClusterMetrics {
            size: 0,
            severity_score: 0.0,
            department_breadth: 0,
            severity_dispersion: 0.0,
            cohesion: 0.0,
            domain_confidence: 0.0,
            actionability: 0.0,
            confidence: 0.0,
        };
    }
    let n = size as f64;

    let weights: Vec<f64> = members.iter().map(|m| m.severity.weight()).collect();
    let severity_score = weights.iter().sum::<f64>() / n;
    let variance = weights.iter().map(|w| (w - severity_score).powi(2)).sum::<f64>() / n;
    let severity_dispersion = (variance.sqrt() / 2.0).clamp(0.0, 1.0);

    let department_breadth = members
        .iter()
        .map(|m| normalize_department(m.department.as_deref()))
        .filter(|d| d != UNASSIGNED_DEPARTMENT)
        .collect::<BTreeSet<_>>()
        .len();

    let cohesion = members
        .iter()
        .map(|m| normalized_similarity(&m.embedding, centroid_vec))
        .sum::<f64>()
        / n;
    let domain_confidence = members.iter().map(|m| m.domain_confidence()).sum::<f64>() / n;

    ClusterMetrics {
        size,
        severity_score,
        department_breadth,
        severity_dispersion,
        cohesion,
        domain_confidence,
        actionability: actionability(size, severity_score, department_breadth),
        confidence: final_confidence(domain_confidence, cohesion, severity_dispersion),
    }
}

fn build_cluster(root_cause: RootCause, members: Vec<ClassifiedSignal>) -> ValidatedCluster {
    let centroid_vec = centroid(members.iter().map(|m| m.embedding.as_slice()));
    let metrics = measure(&members, &centroid_vec);
    ValidatedCluster {
        root_cause,
        members,
        centroid: centroid_vec,
        metrics,
    }
}

fn is_weak(cluster: &ValidatedCluster, params: &ClusteringParameters) -> bool {
    cluster.metrics.size < params.min_cluster_size || cluster.metrics.actionability < params.min_actionability
}

/// Score candidates and merge or demote the weak ones
pub fn validate(refinement: RefinementOutcome, params: &ClusteringParameters) -> ValidationOutcome {
    let mut clusters: Vec<ValidatedCluster> = refinement
        .groups
        .into_iter()
        .filter(|g: &SubGroup| !g.is_empty())
        .map(|g| build_cluster(g.root_cause, g.members))
        .collect();
    let mut outliers = refinement.outliers;
    let mut merged = 0;
    let mut demoted = 0;
    let merge_floor = params.similarity_threshold - params.merge_margin;

    loop {
        // Weakest first; index breaks ties
        let weakest = clusters
            .iter()
            .enumerate()
            .filter(|(_, c)| is_weak(c, params))
            .min_by(|a, b| a.1.metrics.actionability.total_cmp(&b.1.metrics.actionability).then(a.0.cmp(&b.0)))
            .map(|(i, _)| i);
        let Some(index) = weakest else {
            break;
        };
        let weak = clusters.remove(index);

        let target = clusters
            .iter()
            .enumerate()
            .filter(|(_, c)| !is_weak(c, params))
            .map(|(i, c)| (i, normalized_similarity(&weak.centroid, &c.centroid)))
            .filter(|(_, s)| *s >= merge_floor)
            .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)));

        match target {
            Some((target, similarity)) => {
                debug!(
                    size = weak.metrics.size,
                    actionability = weak.metrics.actionability,
                    similarity,
                    "Merging weak cluster into neighbour"
                );
                let host = clusters.remove(target);
                let mut members = host.members;
                members.extend(weak.members);
                clusters.insert(target, build_cluster(host.root_cause, members));
                merged += 1;
            }
            None => {
                debug!(
                    size = weak.metrics.size,
                    actionability = weak.metrics.actionability,
                    "Demoting weak cluster to outliers"
                );
                outliers.extend(weak.members);
                demoted += 1;
            }
        }
    }

    ValidationOutcome {
        clusters,
        outliers,
        merged,
        demoted,
    }
}
