//! Domain Pre-Clusterer
//!
//! Partitions classified signals into coarse buckets keyed by
//! (root cause, normalized department) and flags degenerate input.

use crate::models::{ClassifiedSignal, ClusteringParameters, JobWarning, RootCause, Severity};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Department key used when a signal has none
pub const UNASSIGNED_DEPARTMENT: &str = "unassigned";

/// Bucket key: root cause and normalized department
pub type BucketKey = (RootCause, String);

/// Signals sharing a bucket key
#[derive(Debug, Clone, Default)]
pub struct Bucket {
    pub signals: Vec<ClassifiedSignal>,
    pub severity_histogram: BTreeMap<Severity, usize>,
}

impl Bucket {
    fn push(&mut self, signal: ClassifiedSignal) {
        *self.severity_histogram.entry(signal.severity).or_insert(0) += 1;
        self.signals.push(signal);
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

/// Degenerate input description
#[derive(Debug, Clone, PartialEq)]
pub struct LowDiversity {
    pub reasons: Vec<String>,
    pub signal_count: usize,
    pub distinct_root_causes: usize,
}

impl From<LowDiversity> for JobWarning {
    fn from(value: LowDiversity) -> Self {
        JobWarning::LowDiversity {
            reasons: value.reasons,
            signal_count: value.signal_count,
            distinct_root_causes: value.distinct_root_causes,
        }
    }
}

/// Result of pre-clustering
#[derive(Debug, Clone, Default)]
pub struct PreClusterOutcome {
    pub buckets: BTreeMap<BucketKey, Bucket>,
    pub low_diversity: Option<LowDiversity>,
}

impl PreClusterOutcome {
    pub fn signal_count(&self) -> usize {
        self.buckets.values().map(Bucket::len).sum()
    }
}

/// Lowercased, whitespace-collapsed department, or `unassigned`
pub fn normalize_department(department: Option<&str>) -> String {
    let normalized = department
        .map(|d| d.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
        .unwrap_or_default();
    if normalized.is_empty() {
        UNASSIGNED_DEPARTMENT.to_string()
    } else {
        normalized
    }
}

/// Bucket signals by domain and detect low diversity
pub fn pre_cluster(signals: &[ClassifiedSignal], params: &ClusteringParameters) -> PreClusterOutcome {
    let mut buckets: BTreeMap<BucketKey, Bucket> = BTreeMap::new();
    for signal in signals {
        let key = (signal.root_cause(), normalize_department(signal.department.as_deref()));
        buckets.entry(key).or_default().push(signal.clone());
    }

    let distinct: BTreeSet<RootCause> = signals.iter().map(ClassifiedSignal::root_cause).collect();
    let mut reasons = Vec::new();
    if distinct.len() < 2 {
        reasons.push(format!(
            "only {} distinct root cause(s) among {} signals",
            distinct.len(),
            signals.len()
        ));
    }
    if signals.len() < params.min_population {
        reasons.push(format!(
            "{} signals is below the minimum population of {}",
            signals.len(),
            params.min_population
        ));
    }

    for ((cause, department), bucket) in &buckets {
        debug!(
            root_cause = %cause,
            department = %department,
            size = bucket.len(),
            histogram = ?bucket.severity_histogram,
            "Pre-cluster bucket"
        );
    }

    let low_diversity = (!reasons.is_empty()).then(|| LowDiversity {
        reasons,
        signal_count: signals.len(),
        distinct_root_causes: distinct.len(),
    });

    PreClusterOutcome {
        buckets,
        low_diversity,
    }
}
