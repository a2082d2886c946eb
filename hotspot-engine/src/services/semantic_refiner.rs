//! Semantic Refiner
//!
//! Splits or keeps each domain bucket using embedding similarity, then
//! merges over-split groups of the same root cause and reassigns weakly
//! classified signals to the group they are semantically closest to.
//!
//! # Bucket decision
//! - Fewer than `min_cluster_size` signals: pass through as one group
//! - Pairwise-distance variance above `split_variance_threshold`, or a
//!   low-diversity run: split into DBSCAN clusters, noise becomes outliers
//! - Otherwise: keep whole, signals with no neighbour within eps are outliers

use crate::models::{ClassifiedSignal, ClusteringParameters, SubGroup};
use crate::services::pre_clusterer::{Bucket, BucketKey};
use crate::services::similarity::{centroid, normalized_similarity, DistanceMatrix};
use futures::stream::FuturesUnordered;
use std::collections::BTreeMap;
use tokio::task::JoinHandle;
use tracing::debug;

/// Refinement of one bucket
#[derive(Debug, Clone)]
pub struct BucketRefinement {
    pub key: BucketKey,
    pub groups: Vec<SubGroup>,
    pub outliers: Vec<ClassifiedSignal>,
    pub split: bool,
    pub variance: f64,
}

/// Result of refining all buckets
#[derive(Debug, Clone, Default)]
pub struct RefinementOutcome {
    pub groups: Vec<SubGroup>,
    pub outliers: Vec<ClassifiedSignal>,
    /// Same-cause groups folded into another
    pub merged: usize,
    /// Borderline signals moved to another group
    pub reassigned: usize,
}

impl RefinementOutcome {
    pub fn signal_count(&self) -> usize {
        self.groups.iter().map(SubGroup::len).sum::<usize>() + self.outliers.len()
    }
}

/// DBSCAN over a precomputed distance matrix
///
/// Returns a cluster label per point, `None` for noise. Labels are assigned
/// in order of first core point, so output is deterministic.
pub fn dbscan(matrix: &DistanceMatrix, eps: f64, min_samples: usize) -> Vec<Option<usize>> {
    let n = matrix.len();
    let mut labels: Vec<Option<usize>> = vec![None; n];
    let mut visited = vec![false; n];
    let mut next_label = 0;

    for i in 0..n {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        let neighbours = matrix.neighbours(i, eps);
        if neighbours.len() < min_samples {
            continue;
        }

        let label = next_label;
        next_label += 1;
        labels[i] = Some(label);

        let mut queue = neighbours;
        let mut cursor = 0;
        while cursor < queue.len() {
            let j = queue[cursor];
            cursor += 1;
            if !visited[j] {
                visited[j] = true;
                let expansion = matrix.neighbours(j, eps);
                if expansion.len() >= min_samples {
                    queue.extend(expansion);
                }
            }
            if labels[j].is_none() {
                labels[j] = Some(label);
            }
        }
    }

    labels
}

/// Split or keep one bucket
pub fn refine_bucket(
    key: BucketKey,
    signals: Vec<ClassifiedSignal>,
    params: &ClusteringParameters,
    force_split: bool,
) -> BucketRefinement {
    let (root_cause, department) = key.clone();

    if signals.len() < params.min_cluster_size {
        let groups = if signals.is_empty() {
            Vec::new()
        } else {
            vec![SubGroup::new(root_cause, department, signals)]
        };
        return BucketRefinement {
            key,
            groups,
            outliers: Vec::new(),
            split: false,
            variance: 0.0,
        };
    }

    let vectors: Vec<&[f32]> = signals.iter().map(|s| s.embedding.as_slice()).collect();
    let matrix = DistanceMatrix::build(&vectors);
    let variance = matrix.pairwise_variance();
    let eps = params.eps();
    let split = force_split || variance > params.split_variance_threshold;

    let mut outliers = Vec::new();
    let groups = if split {
        let labels = dbscan(&matrix, eps, params.min_samples);
        let mut clusters: BTreeMap<usize, Vec<ClassifiedSignal>> = BTreeMap::new();
        for (signal, label) in signals.into_iter().zip(labels) {
            match label {
                Some(label) => clusters.entry(label).or_default().push(signal),
                None => outliers.push(signal),
            }
        }
        clusters
            .into_values()
            .map(|members| SubGroup::new(root_cause, department.clone(), members))
            .collect()
    } else {
        let isolated: Vec<bool> = (0..matrix.len()).map(|i| matrix.neighbours(i, eps).len() < 2).collect();
        let mut members = Vec::new();
        for (signal, isolated) in signals.into_iter().zip(isolated) {
            if isolated {
                outliers.push(signal);
            } else {
                members.push(signal);
            }
        }
        if members.is_empty() {
            Vec::new()
        } else {
            vec![SubGroup::new(root_cause, department.clone(), members)]
        }
    };

    debug!(
        root_cause = %root_cause,
        department = %department,
        variance,
        split,
        groups = groups.len(),
        outliers = outliers.len(),
        "Bucket refined"
    );

    BucketRefinement {
        key,
        groups,
        outliers,
        split,
        variance,
    }
}

/// Refine every bucket on the blocking pool
///
/// Each handle resolves to the bucket's position in key order and its
/// refinement; callers drive the set and restore order with `assemble`.
pub fn spawn_refinements(
    buckets: BTreeMap<BucketKey, Bucket>,
    params: &ClusteringParameters,
    force_split: bool,
) -> FuturesUnordered<JoinHandle<(usize, BucketRefinement)>> {
    buckets
        .into_iter()
        .enumerate()
        .map(|(index, (key, bucket))| {
            let params = params.clone();
            tokio::task::spawn_blocking(move || (index, refine_bucket(key, bucket.signals, &params, force_split)))
        })
        .collect()
}

/// Combine bucket refinements, then merge and reassign across buckets
pub fn assemble(
    mut refinements: Vec<(usize, BucketRefinement)>,
    params: &ClusteringParameters,
) -> RefinementOutcome {
    refinements.sort_by_key(|(index, _)| *index);

    let mut groups = Vec::new();
    let mut outliers = Vec::new();
    for (_, refinement) in refinements {
        groups.extend(refinement.groups);
        outliers.extend(refinement.outliers);
    }

    let merged = merge_similar_groups(&mut groups, params.merge_similarity);
    let reassigned = reassign_borderline(&mut groups, params);
    groups.retain(|g| !g.is_empty());

    RefinementOutcome {
        groups,
        outliers,
        merged,
        reassigned,
    }
}

fn group_centroid(group: &SubGroup) -> Vec<f32> {
    centroid(group.members.iter().map(|m| m.embedding.as_slice()))
}

/// Merge same-cause groups whose centroids are at least `threshold` similar
///
/// Repeatedly merges the most similar qualifying pair; returns the merge count.
pub fn merge_similar_groups(groups: &mut Vec<SubGroup>, threshold: f64) -> usize {
    let mut merges = 0;
    loop {
        let centroids: Vec<Vec<f32>> = groups.iter().map(group_centroid).collect();
        let mut best: Option<(usize, usize, f64)> = None;
        for i in 0..groups.len() {
            for j in (i + 1)..groups.len() {
                if groups[i].root_cause != groups[j].root_cause {
                    continue;
                }
                let similarity = normalized_similarity(&centroids[i], &centroids[j]);
                if similarity >= threshold && best.map(|(_, _, s)| similarity > s).unwrap_or(true) {
                    best = Some((i, j, similarity));
                }
            }
        }
        let Some((i, j, similarity)) = best else {
            break;
        };
        let absorbed = groups.remove(j);
        debug!(
            root_cause = %absorbed.root_cause,
            similarity,
            "Merging same-cause groups"
        );
        groups[i].absorb(absorbed);
        merges += 1;
    }
    merges
}

/// Move low-confidence signals to a clearly closer group
///
/// A signal whose domain confidence is below `borderline_confidence` moves
/// only when its similarity to another group's centroid exceeds both its own
/// group's similarity and `confidence + reassign_margin`. Centroids are
/// computed once, before any move.
pub fn reassign_borderline(groups: &mut [SubGroup], params: &ClusteringParameters) -> usize {
    if groups.len() < 2 {
        return 0;
    }
    let centroids: Vec<Vec<f32>> = groups.iter().map(group_centroid).collect();

    let mut moves: Vec<(usize, usize, usize)> = Vec::new();
    for (g, group) in groups.iter().enumerate() {
        if group.len() < 2 {
            continue;
        }
        for (m, member) in group.members.iter().enumerate() {
            let confidence = member.domain_confidence();
            if confidence >= params.borderline_confidence {
                continue;
            }
            let own = normalized_similarity(&member.embedding, &centroids[g]);
            let required = own.max(confidence + params.reassign_margin);
            let target = centroids
                .iter()
                .enumerate()
                .filter(|(other, _)| *other != g)
                .map(|(other, c)| (other, normalized_similarity(&member.embedding, c)))
                .filter(|(_, s)| *s > required)
                .max_by(|a, b| a.1.total_cmp(&b.1));
            if let Some((target, _)) = target {
                moves.push((g, m, target));
            }
        }
    }

    // Remove from the highest member index down so earlier indices stay valid
    moves.sort_by(|a, b| (a.0, b.1).cmp(&(b.0, a.1)));
    let count = moves.len();
    let mut relocated: Vec<(usize, ClassifiedSignal)> = Vec::with_capacity(count);
    for (g, m, target) in moves {
        let member = groups[g].members.remove(m);
        debug!(signal_id = %member.id, from = g, to = target, "Reassigning borderline signal");
        relocated.push((target, member));
    }
    for (target, member) in relocated {
        groups[target].members.push(member);
    }
    count
}
