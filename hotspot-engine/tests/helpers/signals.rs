//! Signal generators

use chrono::{Duration, Utc};
use hotspot_engine::db::SignalRepository;
use hotspot_engine::models::{RootCause, Severity, Signal};

/// One synthetic issue family
#[derive(Debug, Clone, Copy)]
pub struct GroupSpec {
    /// Word the fixture embedder keys on
    pub marker: &'static str,
    pub title: &'static str,
    pub root_cause: RootCause,
    pub severity: Severity,
}

/// Four families with distinct root causes and orthogonal embeddings
pub const FOUR_GROUPS: [GroupSpec; 4] = [
    GroupSpec {
        marker: "alpha",
        title: "Approval workflow delay",
        root_cause: RootCause::Process,
        severity: Severity::High,
    },
    GroupSpec {
        marker: "bravo",
        title: "Staffing shortage overtime",
        root_cause: RootCause::Resource,
        severity: Severity::High,
    },
    GroupSpec {
        marker: "kilo",
        title: "Recurring defect complaint",
        root_cause: RootCause::Quality,
        severity: Severity::Critical,
    },
    GroupSpec {
        marker: "zulu",
        title: "Onboarding training documentation missing",
        root_cause: RootCause::Training,
        severity: Severity::Medium,
    },
];

/// `count` near-duplicate signals of one family, oldest first
pub fn group_signals(scope: &str, spec: &GroupSpec, count: usize) -> Vec<Signal> {
    let base = Utc::now() - Duration::hours(1);
    (0..count)
        .map(|i| {
            let mut signal = Signal::new(
                scope,
                format!("{} {} case {}", spec.title, spec.marker, 1000 + i),
                format!("Reported again by the {} site, see case {}", spec.marker, 1000 + i),
                spec.severity,
            );
            signal.received_at = base + Duration::seconds(i as i64);
            signal
        })
        .collect()
}

/// Store raw signals without annotations
pub async fn seed_signals(repo: &dyn SignalRepository, signals: &[Signal]) {
    for signal in signals {
        repo.insert_signal(signal).await.expect("insert signal");
    }
}
