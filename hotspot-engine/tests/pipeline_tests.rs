//! End-to-end tests of the clustering pipeline
//!
//! Jobs run through the orchestrator against a temporary SQLite database and
//! a fixture embedder whose marker words make the expected grouping known.

mod helpers;

use helpers::{
    create_test_state, group_signals, init_test_logging, seed_signals, wait_for_terminal, FailingEmbedder,
    GroupEmbedder, GroupSpec, FOUR_GROUPS,
};
use hotspot_engine::models::{
    ClusteringParameters, ClusteringRequest, HotspotStatus, JobStatus, JobWarning, RootCause, ScopeFilter, Signal,
};
use hotspot_engine::db::{HotspotRepository, SignalRepository};
use hotspot_engine::services::RegenerationRequest;
use hotspot_engine::AppState;
use std::collections::HashSet;
use std::sync::Arc;

fn markers() -> Vec<&'static str> {
    FOUR_GROUPS.iter().map(|g| g.marker).collect()
}

fn request(scope: &str) -> ClusteringRequest {
    ClusteringRequest {
        scope_filter: ScopeFilter {
            scope: scope.to_string(),
            received_after: None,
        },
        ..Default::default()
    }
}

fn four_families(scope: &str, per_group: usize) -> Vec<Signal> {
    FOUR_GROUPS
        .iter()
        .flat_map(|spec| group_signals(scope, spec, per_group))
        .collect()
}

async fn run_to_completion(state: &AppState, scope: &str) -> hotspot_engine::models::ClusteringJob {
    let outcome = state.orchestrator.start(request(scope)).await.unwrap();
    assert!(!outcome.already_running);
    wait_for_terminal(state, outcome.job_id).await
}

#[tokio::test]
async fn test_regenerated_features_are_byte_identical() {
    init_test_logging();
    let embedder = Arc::new(GroupEmbedder::new(&markers()));
    let (_dir, state) = create_test_state(embedder, ClusteringParameters::default()).await.unwrap();
    let signals = group_signals("acme", &FOUR_GROUPS[0], 5);
    seed_signals(state.signals.as_ref(), &signals).await;

    let regen = |force_regenerate| RegenerationRequest {
        max_signals: None,
        force_regenerate,
        scope: "acme".to_string(),
    };

    let first = state.pipeline.regenerate(&regen(false), 4).await.unwrap();
    assert_eq!(first.counts.regenerated, 5);
    assert!(first.degraded_signal_ids.is_empty());

    let mut before = Vec::new();
    for signal in &signals {
        let stored = state.signals.get_signal(signal.id).await.unwrap().unwrap();
        before.push(serde_json::to_string(&stored.features.unwrap()).unwrap());
    }

    // Unchanged signals are skipped unless forced
    let skipped = state.pipeline.regenerate(&regen(false), 4).await.unwrap();
    assert_eq!(skipped.counts.skipped_current, 5);
    assert_eq!(skipped.counts.regenerated, 0);

    let forced = state.pipeline.regenerate(&regen(true), 4).await.unwrap();
    assert_eq!(forced.counts.regenerated, 5);

    for (signal, expected) in signals.iter().zip(&before) {
        let stored = state.signals.get_signal(signal.id).await.unwrap().unwrap();
        let after = serde_json::to_string(&stored.features.unwrap()).unwrap();
        assert_eq!(&after, expected, "bundle for {} changed on regeneration", signal.id);
    }
}

#[tokio::test]
async fn test_signal_counts_are_conserved() {
    init_test_logging();
    let embedder = Arc::new(GroupEmbedder::new(&markers()));
    let (_dir, state) = create_test_state(embedder, ClusteringParameters::default()).await.unwrap();

    // Two stragglers too few to form a hotspot of their own
    let mut signals = four_families("acme", 8);
    signals.extend(group_signals("acme", &FOUR_GROUPS[0], 10).into_iter().skip(8).map(|mut s| {
        s.department = Some("Logistics".to_string());
        s
    }));
    seed_signals(state.signals.as_ref(), &signals).await;

    let job = run_to_completion(&state, "acme").await;
    assert_eq!(job.status, JobStatus::Completed, "job error: {:?}", job.error);
    let result = job.result.unwrap();

    assert_eq!(result.input_signal_count, signals.len());
    let clustered: usize = result.final_clusters.iter().map(|c| c.signal_count).sum();
    assert_eq!(clustered + result.outlier_signal_count, result.input_signal_count);
    assert!(result.is_conserved());

    // Each signal is the primary member of at most one hotspot
    let seeded: HashSet<_> = signals.iter().map(|s| s.id).collect();
    let mut seen = HashSet::new();
    for cluster in &result.final_clusters {
        assert_eq!(cluster.signal_ids.len(), cluster.signal_count);
        for id in &cluster.signal_ids {
            assert!(seeded.contains(id), "unknown signal {} in a cluster", id);
            assert!(seen.insert(*id), "signal {} appears in two clusters", id);
        }
    }
}

#[tokio::test]
async fn test_four_families_yield_expected_hotspots() {
    init_test_logging();
    let embedder = Arc::new(GroupEmbedder::new(&markers()));
    let parameters = ClusteringParameters {
        min_population: 20,
        ..Default::default()
    };
    let (_dir, state) = create_test_state(embedder, parameters).await.unwrap();
    let mut signals = Vec::new();
    for (spec, count) in FOUR_GROUPS.iter().zip([5, 6, 7, 6]) {
        signals.extend(group_signals("acme", spec, count));
    }
    seed_signals(state.signals.as_ref(), &signals).await;

    let job = run_to_completion(&state, "acme").await;
    assert_eq!(job.status, JobStatus::Completed, "job error: {:?}", job.error);
    assert!(!job.warnings.iter().any(|w| matches!(w, JobWarning::LowDiversity { .. })));

    let result = job.result.unwrap();
    assert!(
        (3..=6).contains(&result.output_cluster_count),
        "expected 3 to 6 clusters, got {}",
        result.output_cluster_count
    );
    assert!(result.executive_actionability > 0.0);

    let causes: HashSet<_> = result.final_clusters.iter().map(|c| c.cluster_type).collect();
    for spec in &FOUR_GROUPS {
        assert!(causes.contains(&spec.root_cause), "no hotspot for {:?}", spec.root_cause);
    }

    let hotspots = state.hotspots.list_hotspots(Some("acme"), Some(HotspotStatus::Open)).await.unwrap();
    assert_eq!(hotspots.len(), result.output_cluster_count);
    // Ranked strongest first
    assert!(hotspots.windows(2).all(|w| w[0].rank_score >= w[1].rank_score));
}

#[tokio::test]
async fn test_semantic_families_within_one_root_cause_are_split() {
    init_test_logging();
    let embedder = Arc::new(GroupEmbedder::new(&markers()));
    let (_dir, state) = create_test_state(embedder, ClusteringParameters::default()).await.unwrap();

    // Same wording and department, four different embedding families
    let mut signals = Vec::new();
    for spec in &FOUR_GROUPS {
        let family = GroupSpec {
            marker: spec.marker,
            ..FOUR_GROUPS[0]
        };
        signals.extend(group_signals("acme", &family, 8));
    }
    // A second root cause keeps the population diverse, so the split is driven by variance
    // Not a fixture marker, so it gets an axis of its own
    let quality = GroupSpec {
        marker: "yankee",
        ..FOUR_GROUPS[2]
    };
    signals.extend(group_signals("acme", &quality, 8));
    seed_signals(state.signals.as_ref(), &signals).await;

    let job = run_to_completion(&state, "acme").await;
    assert_eq!(job.status, JobStatus::Completed, "job error: {:?}", job.error);
    assert!(!job.warnings.iter().any(|w| matches!(w, JobWarning::LowDiversity { .. })));

    let result = job.result.unwrap();
    assert!(result.is_conserved());
    assert!(
        (3..=6).contains(&result.output_cluster_count),
        "expected 3 to 6 clusters, got {}",
        result.output_cluster_count
    );
    let process_clusters = result
        .final_clusters
        .iter()
        .filter(|c| c.cluster_type == RootCause::Process)
        .count();
    assert!(
        (3..=4).contains(&process_clusters),
        "one root cause bucket should split into 3 or 4 hotspots, got {}",
        process_clusters
    );
}

#[tokio::test]
async fn test_homogeneous_input_is_flagged_low_diversity() {
    init_test_logging();
    let embedder = Arc::new(GroupEmbedder::new(&markers()));
    let (_dir, state) = create_test_state(embedder, ClusteringParameters::default()).await.unwrap();
    seed_signals(state.signals.as_ref(), &group_signals("acme", &FOUR_GROUPS[1], 21)).await;

    let job = run_to_completion(&state, "acme").await;
    assert_eq!(job.status, JobStatus::Completed, "job error: {:?}", job.error);

    let low_diversity = job
        .warnings
        .iter()
        .find_map(|w| match w {
            JobWarning::LowDiversity {
                signal_count,
                distinct_root_causes,
                ..
            } => Some((*signal_count, *distinct_root_causes)),
            _ => None,
        })
        .expect("low diversity warning");
    assert_eq!(low_diversity, (21, 1));
}

#[tokio::test]
async fn test_reclustering_does_not_duplicate_hotspots() {
    init_test_logging();
    let embedder = Arc::new(GroupEmbedder::new(&markers()));
    let (_dir, state) = create_test_state(embedder, ClusteringParameters::default()).await.unwrap();
    seed_signals(state.signals.as_ref(), &four_families("acme", 8)).await;

    let first = run_to_completion(&state, "acme").await.result.unwrap();
    let count_after_first = state.hotspots.count_hotspots("acme").await.unwrap();

    let second = run_to_completion(&state, "acme").await.result.unwrap();
    let count_after_second = state.hotspots.count_hotspots("acme").await.unwrap();

    assert_eq!(count_after_first, first.output_cluster_count);
    assert_eq!(count_after_second, count_after_first);

    let first_ids: HashSet<_> = first.final_clusters.iter().map(|c| c.id).collect();
    let second_ids: HashSet<_> = second.final_clusters.iter().map(|c| c.id).collect();
    assert_eq!(first_ids, second_ids);
}

#[tokio::test]
async fn test_reviewed_hotspot_keeps_status_across_runs() {
    init_test_logging();
    let embedder = Arc::new(GroupEmbedder::new(&markers()));
    let (_dir, state) = create_test_state(embedder, ClusteringParameters::default()).await.unwrap();
    seed_signals(state.signals.as_ref(), &four_families("acme", 8)).await;

    let first = run_to_completion(&state, "acme").await.result.unwrap();
    let reviewed = first.final_clusters[0].id;
    state.hotspots.update_status(reviewed, HotspotStatus::Approved).await.unwrap();

    run_to_completion(&state, "acme").await;
    let detail = state.hotspots.get_hotspot(reviewed).await.unwrap().unwrap();
    assert_eq!(detail.hotspot.status, HotspotStatus::Approved);
}

#[tokio::test]
async fn test_scopes_are_isolated() {
    init_test_logging();
    let embedder = Arc::new(GroupEmbedder::new(&markers()));
    let (_dir, state) = create_test_state(embedder, ClusteringParameters::default()).await.unwrap();
    seed_signals(state.signals.as_ref(), &four_families("acme", 8)).await;
    seed_signals(state.signals.as_ref(), &group_signals("globex", &FOUR_GROUPS[2], 6)).await;

    let job = run_to_completion(&state, "globex").await;
    assert_eq!(job.status, JobStatus::Completed, "job error: {:?}", job.error);
    assert_eq!(job.result.unwrap().input_signal_count, 6);
    assert_eq!(state.hotspots.count_hotspots("acme").await.unwrap(), 0);
}

#[tokio::test]
async fn test_empty_scope_fails_with_no_usable_signals() {
    init_test_logging();
    let embedder = Arc::new(GroupEmbedder::new(&markers()));
    let (_dir, state) = create_test_state(embedder, ClusteringParameters::default()).await.unwrap();

    let job = run_to_completion(&state, "empty").await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("No usable signals"));
    assert!(job.result.is_none());
}

#[tokio::test]
async fn test_provider_outage_degrades_and_fails() {
    init_test_logging();
    let (_dir, state) = create_test_state(Arc::new(FailingEmbedder), ClusteringParameters::default())
        .await
        .unwrap();
    seed_signals(state.signals.as_ref(), &group_signals("acme", &FOUR_GROUPS[0], 4)).await;

    let job = run_to_completion(&state, "acme").await;
    assert_eq!(job.status, JobStatus::Failed);
    let degraded = job
        .warnings
        .iter()
        .find_map(|w| match w {
            JobWarning::DegradedFeatures { count, .. } => Some(*count),
            _ => None,
        })
        .expect("degraded features warning");
    assert_eq!(degraded, 4);
    assert_eq!(state.hotspots.count_hotspots("acme").await.unwrap(), 0);

    // Degraded bundles are not persisted
    let signals = state
        .signals
        .fetch_signals(&hotspot_engine::db::SignalFilter {
            scope: "acme".to_string(),
            received_after: None,
            limit: None,
        })
        .await
        .unwrap();
    assert!(signals.iter().all(|s| s.features.is_none()));
}
