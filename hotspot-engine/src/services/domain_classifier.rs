//! Domain Classifier Service
//!
//! Maps a signal onto the root-cause taxonomy with declarative rules.
//!
//! # Scoring
//! - Each matched predicate contributes its weight; a rule fires when at
//!   least one evidence predicate matches
//! - Specificity = distinct signal fields matched by the rule
//! - Confidence = 0.35 + 0.6 × min(strength, 1) − ambiguity penalty,
//!   clamped to [0, 0.95]
//! - No rule fired → `Unknown` with confidence 0.2
//!
//! Pure and synchronous.

use crate::models::{BusinessContext, DomainClassification, FeatureBundle, RootCause, Severity, Signal};
use crate::services::embedding::tokenize;
use crate::services::taxonomy::{contains_term, default_rules, DomainRule, Predicate, SignalField};
use std::collections::BTreeSet;

/// Base confidence of any fired rule
const BASE_CONFIDENCE: f64 = 0.35;
/// Confidence gained at full strength
const STRENGTH_GAIN: f64 = 0.6;
/// Upper bound on rule-based confidence
const MAX_CONFIDENCE: f64 = 0.95;
/// Confidence reported when nothing matched
const UNKNOWN_CONFIDENCE: f64 = 0.2;
/// Below this confidence the classification is flagged for enhancement
const ENHANCEMENT_THRESHOLD: f64 = 0.6;
/// Runner-up/winner strength ratio from which the penalty applies
const AMBIGUITY_RATIO: f64 = 0.6;
/// Penalty when the runner-up ties the winner
const MAX_AMBIGUITY_PENALTY: f64 = 0.25;

/// Evaluation of one rule against one signal
#[derive(Debug, Clone)]
struct RuleMatch<'a> {
    rule: &'a DomainRule,
    order: usize,
    strength: f64,
    specificity: usize,
}

/// Domain Classifier
pub struct DomainClassifier {
    rules: Vec<DomainRule>,
}

impl Default for DomainClassifier {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl DomainClassifier {
    pub fn new(rules: Vec<DomainRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[DomainRule] {
        &self.rules
    }

    /// Classify a signal, using its features when available
    pub fn classify(&self, signal: &Signal, features: Option<&FeatureBundle>) -> DomainClassification {
        let tokens = tokenize(&signal.text());

        let mut matches: Vec<RuleMatch<'_>> = self
            .rules
            .iter()
            .enumerate()
            .filter_map(|(order, rule)| evaluate_rule(rule, order, signal, features, &tokens))
            .collect();

        // Strongest first; ties prefer specificity, then rule order
        matches.sort_by(|a, b| {
            b.strength
                .total_cmp(&a.strength)
                .then(b.specificity.cmp(&a.specificity))
                .then(a.order.cmp(&b.order))
        });

        let Some(winner) = matches.first() else {
            return DomainClassification {
                root_cause: RootCause::Unknown,
                confidence: UNKNOWN_CONFIDENCE,
                business_context: business_context(signal, RootCause::Unknown),
                ai_enhancement_needed: true,
                matched_rule: None,
            };
        };

        let runner_up = matches
            .iter()
            .find(|m| m.rule.root_cause != winner.rule.root_cause)
            .map(|m| m.strength)
            .unwrap_or(0.0);

        let confidence = rule_confidence(winner.strength, runner_up);
        let root_cause = winner.rule.root_cause;

        DomainClassification {
            root_cause,
            confidence,
            business_context: business_context(signal, root_cause),
            ai_enhancement_needed: confidence < ENHANCEMENT_THRESHOLD,
            matched_rule: Some(winner.rule.name.clone()),
        }
    }
}

/// Confidence from winner strength, penalized by a close runner-up
pub fn rule_confidence(strength: f64, runner_up_strength: f64) -> f64 {
    let mut confidence = BASE_CONFIDENCE + STRENGTH_GAIN * strength.min(1.0);
    if strength > 0.0 {
        let ratio = (runner_up_strength / strength).min(1.0);
        if ratio >= AMBIGUITY_RATIO {
            confidence -= MAX_AMBIGUITY_PENALTY * ratio;
        }
    }
    confidence.clamp(0.0, MAX_CONFIDENCE)
}

fn evaluate_rule<'a>(
    rule: &'a DomainRule,
    order: usize,
    signal: &Signal,
    features: Option<&FeatureBundle>,
    tokens: &[String],
) -> Option<RuleMatch<'a>> {
    let mut strength = 0.0;
    let mut fields: BTreeSet<SignalField> = BTreeSet::new();
    let mut evidence = false;

    for predicate in &rule.predicates {
        let contribution = evaluate_predicate(predicate, signal, features, tokens);
        if contribution > 0.0 {
            strength += contribution;
            fields.insert(predicate.field());
            evidence |= predicate.is_evidence();
        }
    }

    evidence.then_some(RuleMatch {
        rule,
        order,
        strength,
        specificity: fields.len(),
    })
}

/// Weight a predicate contributes for this signal (0.0 when unmatched)
fn evaluate_predicate(
    predicate: &Predicate,
    signal: &Signal,
    features: Option<&FeatureBundle>,
    tokens: &[String],
) -> f64 {
    match predicate {
        Predicate::Keywords { terms, weight } => {
            let hits = terms
                .iter()
                .filter(|term| contains_term(tokens, &tokenize(term)))
                .count();
            weight * (hits as f64 / 2.0).min(1.0)
        }
        Predicate::DomainTag { tag, weight } => match features {
            Some(bundle) if bundle.domain_tags.contains(tag) => *weight,
            _ => 0.0,
        },
        Predicate::Department { names, weight } => field_weight(signal.department.as_deref(), names, *weight),
        Predicate::Category { names, weight } => field_weight(signal.category.as_deref(), names, *weight),
        Predicate::SeverityAtLeast { severity, weight } => {
            if signal.severity >= *severity {
                *weight
            } else {
                0.0
            }
        }
    }
}

fn field_weight(value: Option<&str>, names: &[String], weight: f64) -> f64 {
    match value {
        Some(v) if names.iter().any(|n| n.eq_ignore_ascii_case(v.trim())) => weight,
        _ => 0.0,
    }
}

fn impact(severity: Severity) -> &'static str {
    match severity {
        Severity::Low => "low",
        Severity::Medium => "moderate",
        Severity::High => "high",
        Severity::Critical => "critical",
    }
}

fn business_context(signal: &Signal, root_cause: RootCause) -> BusinessContext {
    let summary = format!(
        "{} issue ({} impact) reported by {}: {}",
        root_cause.label(),
        impact(signal.severity),
        signal.department.as_deref().unwrap_or("an unassigned team"),
        signal.title
    );
    BusinessContext {
        impact: impact(signal.severity).to_string(),
        department: signal.department.clone(),
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::taxonomy::domain_tags;

    fn signal(title: &str, description: &str) -> Signal {
        Signal::new("default", title, description, Severity::Medium)
    }

    fn bundle_for(signal: &Signal) -> FeatureBundle {
        FeatureBundle {
            embedding: vec![1.0],
            entities: vec![],
            domain_tags: domain_tags(&tokenize(&signal.text())),
            quality_score: 1.0,
            model_version: "test".into(),
            input_hash: "x".into(),
        }
    }

    #[test]
    fn test_no_match_is_unknown() {
        let classifier = DomainClassifier::default();
        let result = classifier.classify(&signal("Quarterly picnic", "Lovely weather"), None);
        assert_eq!(result.root_cause, RootCause::Unknown);
        assert_eq!(result.confidence, 0.2);
        assert!(result.ai_enhancement_needed);
        assert!(result.matched_rule.is_none());
    }

    #[test]
    fn test_keywords_and_tags_classify_technology() {
        let classifier = DomainClassifier::default();
        let mut s = signal("Login server outage", "The database went down during the release");
        s.department = Some("Engineering".into());
        let bundle = bundle_for(&s);
        let result = classifier.classify(&s, Some(&bundle));
        assert_eq!(result.root_cause, RootCause::Technology);
        assert!(result.confidence >= 0.6, "confidence {}", result.confidence);
        assert!(result.confidence <= 0.95);
        assert!(!result.ai_enhancement_needed);
        assert_eq!(result.business_context.department.as_deref(), Some("Engineering"));
    }

    #[test]
    fn test_critical_outage_prefers_specific_rule() {
        let classifier = DomainClassifier::default();
        let mut s = signal("Outage and crash in payments", "");
        s.severity = Severity::Critical;
        s.category = Some("IT".into());
        let result = classifier.classify(&s, None);
        assert_eq!(result.root_cause, RootCause::Technology);
        assert_eq!(result.matched_rule.as_deref(), Some("technology-critical-outage"));
    }

    #[test]
    fn test_severity_alone_never_fires() {
        let rules = vec![DomainRule {
            name: "severity-only".into(),
            root_cause: RootCause::Quality,
            predicates: vec![Predicate::SeverityAtLeast {
                severity: Severity::Low,
                weight: 1.0,
            }],
        }];
        let classifier = DomainClassifier::new(rules);
        let result = classifier.classify(&signal("anything", ""), None);
        assert_eq!(result.root_cause, RootCause::Unknown);
    }

    #[test]
    fn test_tie_prefers_specificity_then_order() {
        let rule = |name: &str, cause, preds| DomainRule {
            name: name.into(),
            root_cause: cause,
            predicates: preds,
        };
        let kw = |w| Predicate::Keywords {
            terms: vec!["widget".into(), "gizmo".into()],
            weight: w,
        };
        let rules = vec![
            rule("first", RootCause::Process, vec![kw(0.5)]),
            rule(
                "specific",
                RootCause::Quality,
                vec![
                    kw(0.25),
                    Predicate::Department {
                        names: vec!["ops".into()],
                        weight: 0.25,
                    },
                ],
            ),
            rule("late", RootCause::Training, vec![kw(0.5)]),
        ];
        let classifier = DomainClassifier::new(rules);
        let mut s = signal("widget gizmo broke", "");
        s.department = Some("Ops".into());
        // all three reach strength 0.5; "specific" matched two fields
        let result = classifier.classify(&s, None);
        assert_eq!(result.matched_rule.as_deref(), Some("specific"));

        s.department = None;
        let result = classifier.classify(&s, None);
        assert_eq!(result.matched_rule.as_deref(), Some("first"));
    }

    #[test]
    fn test_ambiguity_lowers_confidence() {
        let clear = rule_confidence(0.8, 0.0);
        let ambiguous = rule_confidence(0.8, 0.8);
        assert!((clear - 0.83).abs() < 1e-9);
        assert!(ambiguous < clear);
        assert!(rule_confidence(5.0, 0.0) <= 0.95);
        assert!(rule_confidence(0.0, 0.0) >= 0.0);
    }
}
