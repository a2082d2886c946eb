//! Hotspot finalization
//!
//! Turns validated clusters into hotspot drafts:
//! 1. Primary memberships: the members of each validated cluster, so the
//!    size and actionability gate applied during validation still holds
//! 2. Outlier rows: members of other clusters within `similarity_threshold`
//!    of this cluster's centroid
//! 3. Title, summary, fingerprint and rank (actionability × confidence)

use crate::models::{
    ClassifiedSignal, ClusteringParameters, FinalCluster, HotspotDraft, MembershipDraft, ValidatedCluster,
};
use crate::services::pre_clusterer::{normalize_department, UNASSIGNED_DEPARTMENT};
use crate::services::quality_validator::{measure, ValidationOutcome};
use crate::services::similarity::normalized_similarity;
use hotspot_common::{Error, Result};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use uuid::Uuid;

/// Longest representative title carried into a hotspot title
const MAX_TITLE_CHARS: usize = 80;

/// SHA-256 hex over sorted signal ids
pub fn fingerprint(signal_ids: &[Uuid]) -> String {
    let mut ids: Vec<&Uuid> = signal_ids.iter().collect();
    ids.sort();
    let mut hasher = Sha256::new();
    for id in ids {
        hasher.update(id.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Build drafts, strongest rank first
pub fn build_drafts(validation: &ValidationOutcome, params: &ClusteringParameters) -> Vec<HotspotDraft> {
    let clusters = &validation.clusters;

    let mut drafts: Vec<HotspotDraft> = clusters
        .iter()
        .enumerate()
        .filter(|(_, cluster)| !cluster.members.is_empty())
        .map(|(index, cluster)| {
            let primaries = cluster.members.iter().map(|member| MembershipDraft {
                signal_id: member.id,
                strength: normalized_similarity(&member.embedding, &cluster.centroid),
                is_outlier: false,
            });
            let secondaries = clusters
                .iter()
                .enumerate()
                .filter(|(other_index, _)| *other_index != index)
                .flat_map(|(_, other)| other.members.iter())
                .filter_map(|member| {
                    let strength = normalized_similarity(&member.embedding, &cluster.centroid);
                    (strength >= params.similarity_threshold).then_some(MembershipDraft {
                        signal_id: member.id,
                        strength,
                        is_outlier: true,
                    })
                });

            let mut memberships: Vec<MembershipDraft> = primaries.chain(secondaries).collect();
            memberships.sort_by(|a, b| {
                a.is_outlier
                    .cmp(&b.is_outlier)
                    .then(b.strength.total_cmp(&a.strength))
                    .then(a.signal_id.cmp(&b.signal_id))
            });
            draft_for(cluster, &cluster.members, memberships)
        })
        .collect();

    drafts.sort_by(|a, b| b.rank_score.total_cmp(&a.rank_score).then(a.fingerprint.cmp(&b.fingerprint)));
    drafts
}

/// Check every input signal is a primary member of one draft or an outlier
///
/// Returns the number of clustered signals.
pub fn ensure_conserved(
    drafts: &[HotspotDraft],
    outliers: &[ClassifiedSignal],
    input_signal_count: usize,
) -> Result<usize> {
    let mut seen: HashSet<Uuid> = HashSet::with_capacity(input_signal_count);
    let mut clustered = 0usize;
    for id in drafts.iter().flat_map(|d| d.primary_signal_ids()) {
        if !seen.insert(id) {
            return Err(Error::Internal(format!("Signal {} is a primary member of two hotspots", id)));
        }
        clustered += 1;
    }
    for outlier in outliers {
        if !seen.insert(outlier.id) {
            return Err(Error::Internal(format!(
                "Signal {} is both clustered and an outlier",
                outlier.id
            )));
        }
    }
    if seen.len() != input_signal_count {
        return Err(Error::Internal(format!(
            "{} clustered and {} outlier signals do not add up to {} input signals",
            clustered,
            outliers.len(),
            input_signal_count
        )));
    }
    Ok(clustered)
}

fn draft_for(cluster: &ValidatedCluster, members: &[ClassifiedSignal], memberships: Vec<MembershipDraft>) -> HotspotDraft {
    let metrics = measure(members, &cluster.centroid);
    let primary_ids: Vec<Uuid> = members.iter().map(|m| m.id).collect();

    let departments: Vec<String> = members
        .iter()
        .filter_map(|m| m.department.as_deref())
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .map(|d| (normalize_department(Some(&d)), d))
        .collect::<BTreeMap<_, _>>()
        .into_values()
        .collect();

    // Representative: the member closest to the centroid
    let representative = memberships
        .iter()
        .find(|m| !m.is_outlier)
        .and_then(|m| members.iter().find(|s| s.id == m.signal_id))
        .map(|s| truncate(&s.title, MAX_TITLE_CHARS))
        .unwrap_or_default();

    let title = format!("{}: {}", cluster.root_cause.label(), representative);
    let summary = summarize(cluster, members, &departments, metrics.severity_score, metrics.actionability);

    HotspotDraft {
        title,
        summary,
        root_cause: cluster.root_cause,
        rank_score: metrics.actionability * metrics.confidence,
        confidence: metrics.confidence,
        actionability: metrics.actionability,
        departments,
        fingerprint: fingerprint(&primary_ids),
        memberships,
    }
}

fn summarize(
    cluster: &ValidatedCluster,
    members: &[ClassifiedSignal],
    departments: &[String],
    severity_score: f64,
    actionability: f64,
) -> String {
    let scope = if departments.is_empty() {
        UNASSIGNED_DEPARTMENT.to_string()
    } else {
        departments.join(", ")
    };

    let mut entity_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for member in members {
        for entity in member.entities.iter().collect::<BTreeSet<_>>() {
            *entity_counts.entry(entity.as_str()).or_insert(0) += 1;
        }
    }
    let mut recurring: Vec<(&str, usize)> = entity_counts.into_iter().filter(|(_, n)| *n > 1).collect();
    recurring.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    let recurring: Vec<&str> = recurring.into_iter().take(3).map(|(e, _)| e).collect();

    let mut summary = format!(
        "{} recurring {} signal(s) across {}; mean severity {:.1}/5, actionability {:.2}.",
        members.len(),
        cluster.root_cause.as_str(),
        scope,
        severity_score,
        actionability
    );
    if !recurring.is_empty() {
        summary.push_str(&format!(" Recurring entities: {}.", recurring.join(", ")));
    }
    summary
}

fn truncate(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut cut: String = trimmed.chars().take(max_chars.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

/// Result entry for a committed draft
pub fn final_cluster(hotspot_id: Uuid, draft: &HotspotDraft) -> FinalCluster {
    let signal_ids = draft.primary_signal_ids();
    FinalCluster {
        id: hotspot_id,
        name: draft.title.clone(),
        cluster_type: draft.root_cause,
        signal_count: signal_ids.len(),
        signal_ids,
        departments_involved: draft.departments.clone(),
        actionability: draft.actionability,
        confidence: draft.confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BusinessContext, DomainClassification, RootCause, Severity};
    use crate::services::similarity::centroid;

    fn member(embedding: Vec<f32>, department: &str, entities: &[&str]) -> ClassifiedSignal {
        ClassifiedSignal {
            id: Uuid::new_v4(),
            title: format!("Issue in {}", department),
            severity: Severity::High,
            department: Some(department.into()),
            embedding,
            entities: entities.iter().map(|e| e.to_string()).collect(),
            domain_tags: vec![],
            classification: DomainClassification {
                root_cause: RootCause::Technology,
                confidence: 0.8,
                business_context: BusinessContext {
                    impact: "high".into(),
                    department: None,
                    summary: String::new(),
                },
                ai_enhancement_needed: false,
                matched_rule: None,
            },
        }
    }

    fn cluster(members: Vec<ClassifiedSignal>) -> ValidatedCluster {
        let c = centroid(members.iter().map(|m| m.embedding.as_slice()));
        let metrics = measure(&members, &c);
        ValidatedCluster {
            root_cause: RootCause::Technology,
            members,
            centroid: c,
            metrics,
        }
    }

    #[test]
    fn test_fingerprint_ignores_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(fingerprint(&[a, b]), fingerprint(&[b, a]));
        assert_ne!(fingerprint(&[a]), fingerprint(&[a, b]));
        assert_eq!(fingerprint(&[a]).len(), 64);
    }

    #[test]
    fn test_each_signal_has_one_primary_membership() {
        // The bridge signal sits near both centroids
        let bridge = member(vec![1.0, 0.9], "Ops", &[]);
        let bridge_id = bridge.id;
        let left = cluster(vec![
            member(vec![1.0, 0.8], "Ops", &["ERP"]),
            member(vec![1.0, 0.8], "Ops", &["ERP"]),
            bridge,
        ]);
        let right = cluster(vec![
            member(vec![1.0, 1.0], "IT", &[]),
            member(vec![1.0, 1.0], "IT", &[]),
            member(vec![1.0, 1.0], "IT", &[]),
        ]);
        let validation = ValidationOutcome {
            clusters: vec![left, right],
            ..Default::default()
        };
        let drafts = build_drafts(&validation, &ClusteringParameters::default());

        let primaries: Vec<Uuid> = drafts.iter().flat_map(|d| d.primary_signal_ids()).collect();
        let unique: BTreeSet<Uuid> = primaries.iter().copied().collect();
        assert_eq!(primaries.len(), unique.len());
        assert_eq!(primaries.len(), 6);

        let bridge_rows: Vec<&MembershipDraft> = drafts
            .iter()
            .flat_map(|d| d.memberships.iter())
            .filter(|m| m.signal_id == bridge_id)
            .collect();
        assert_eq!(bridge_rows.iter().filter(|m| !m.is_outlier).count(), 1);
        assert!(bridge_rows.iter().any(|m| m.is_outlier));
    }

    #[test]
    fn test_validated_clusters_keep_their_size() {
        // The drifting member of `a` matches the centroid of `b` exactly
        let drifting = member(vec![0.6, 0.8], "Ops", &[]);
        let drifting_id = drifting.id;
        let a = cluster(vec![
            member(vec![1.0, 0.0], "Ops", &[]),
            member(vec![1.0, 0.0], "Ops", &[]),
            drifting,
        ]);
        let b = cluster(vec![
            member(vec![0.6, 0.8], "IT", &[]),
            member(vec![0.6, 0.8], "IT", &[]),
            member(vec![0.6, 0.8], "IT", &[]),
        ]);
        let a_ids: BTreeSet<Uuid> = a.members.iter().map(|m| m.id).collect();
        let validation = ValidationOutcome {
            clusters: vec![a, b],
            ..Default::default()
        };
        let params = ClusteringParameters::default();
        let drafts = build_drafts(&validation, &params);

        assert_eq!(drafts.len(), 2);
        for draft in &drafts {
            assert!(draft.primary_signal_ids().len() >= params.min_cluster_size);
        }
        let owner = drafts
            .iter()
            .find(|d| d.primary_signal_ids().contains(&drifting_id))
            .unwrap();
        let owner_ids: BTreeSet<Uuid> = owner.primary_signal_ids().into_iter().collect();
        assert_eq!(owner_ids, a_ids);
        let other = drafts.iter().find(|d| d.fingerprint != owner.fingerprint).unwrap();
        assert!(other.memberships.iter().any(|m| m.signal_id == drifting_id && m.is_outlier));
    }

    #[test]
    fn test_conservation_check() {
        let members = vec![
            member(vec![1.0, 0.0], "Ops", &[]),
            member(vec![1.0, 0.0], "Ops", &[]),
            member(vec![1.0, 0.0], "Ops", &[]),
        ];
        let stray = member(vec![0.0, 1.0], "IT", &[]);
        let validation = ValidationOutcome {
            clusters: vec![cluster(members)],
            outliers: vec![stray.clone()],
            ..Default::default()
        };
        let drafts = build_drafts(&validation, &ClusteringParameters::default());

        assert_eq!(ensure_conserved(&drafts, &validation.outliers, 4).unwrap(), 3);
        // A lost signal
        assert!(ensure_conserved(&drafts, &[], 4).is_err());
        // A signal counted twice
        let twice = vec![stray.clone(), stray];
        assert!(ensure_conserved(&drafts, &twice, 5).is_err());
        let doubled = vec![drafts[0].clone(), drafts[0].clone()];
        assert!(ensure_conserved(&doubled, &validation.outliers, 7).is_err());
    }

    #[test]
    fn test_draft_fields() {
        let validation = ValidationOutcome {
            clusters: vec![cluster(vec![
                member(vec![1.0, 0.0], "Ops", &["ERP"]),
                member(vec![1.0, 0.0], "ops", &["ERP"]),
                member(vec![1.0, 0.0], "Finance", &[]),
            ])],
            ..Default::default()
        };
        let drafts = build_drafts(&validation, &ClusteringParameters::default());
        assert_eq!(drafts.len(), 1);
        let draft = &drafts[0];
        assert!(draft.title.starts_with("Technology: "));
        assert_eq!(draft.departments.len(), 2);
        assert!(draft.summary.contains("ERP"));
        assert!((draft.rank_score - draft.actionability * draft.confidence).abs() < 1e-12);

        let result = final_cluster(Uuid::nil(), draft);
        assert_eq!(result.signal_count, 3);
        assert_eq!(result.signal_ids.len(), 3);
    }
}
