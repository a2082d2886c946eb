//! Root-cause lexicon and declarative classification rules
//!
//! Rules are data: an ordered list of predicate sets, each mapped to one
//! root cause. The classifier evaluates them uniformly; order breaks ties.

use crate::models::{RootCause, Severity};
use crate::services::embedding::tokenize;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Minimum Jaro-Winkler similarity for an inflected keyword match
const INFLECTION_SIMILARITY: f64 = 0.93;

/// Lexicon terms per root cause
pub fn lexicon(cause: RootCause) -> &'static [&'static str] {
    match cause {
        RootCause::Process => &[
            "process", "workflow", "approval", "procedure", "handoff", "bottleneck", "delay",
            "backlog", "rework", "sign-off",
        ],
        RootCause::Resource => &[
            "staffing", "understaffed", "capacity", "budget", "overtime", "shortage",
            "allocation", "bandwidth", "headcount", "equipment",
        ],
        RootCause::Communication => &[
            "miscommunication", "unclear", "meeting", "email", "stakeholder", "expectation",
            "alignment", "feedback", "escalation",
        ],
        RootCause::Technology => &[
            "system", "software", "outage", "bug", "server", "integration", "tool", "crash",
            "downtime", "network", "database", "login",
        ],
        RootCause::Training => &[
            "training", "onboarding", "skill", "knowledge", "documentation", "inexperienced",
            "certification", "mentor",
        ],
        RootCause::Quality => &[
            "defect", "quality", "error", "inspection", "compliance", "rejected", "audit",
            "nonconformance", "complaint", "inaccurate",
        ],
        RootCause::Unknown => &[],
    }
}

/// Tokenized lexicon, built once
static TOKENIZED_LEXICON: Lazy<Vec<(RootCause, Vec<Vec<String>>)>> = Lazy::new(|| {
    RootCause::KNOWN
        .iter()
        .map(|cause| {
            let terms = lexicon(*cause).iter().map(|t| tokenize(t)).collect();
            (*cause, terms)
        })
        .collect()
});

/// True when `token` is `term` or an inflection of it
pub fn token_matches(token: &str, term: &str) -> bool {
    if token == term {
        return true;
    }
    let prefix_len = 3;
    if token.len() < prefix_len || term.len() < prefix_len {
        return false;
    }
    if token.get(..prefix_len) != term.get(..prefix_len) {
        return false;
    }
    strsim::jaro_winkler(token, term) >= INFLECTION_SIMILARITY
}

/// True when the token sequence of `term` occurs in `tokens`
pub fn contains_term(tokens: &[String], term_tokens: &[String]) -> bool {
    if term_tokens.is_empty() || term_tokens.len() > tokens.len() {
        return false;
    }
    tokens
        .windows(term_tokens.len())
        .any(|window| window.iter().zip(term_tokens).all(|(t, term)| token_matches(t, term)))
}

/// Root causes whose lexicon terms appear in the tokens, sorted
pub fn domain_tags(tokens: &[String]) -> Vec<RootCause> {
    let tags: BTreeSet<RootCause> = TOKENIZED_LEXICON
        .iter()
        .filter(|(_, terms)| terms.iter().any(|term| contains_term(tokens, term)))
        .map(|(cause, _)| *cause)
        .collect();
    tags.into_iter().collect()
}

/// Signal field a predicate inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SignalField {
    Text,
    Features,
    Department,
    Category,
    Severity,
}

/// One condition of a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Predicate {
    /// Any of `terms` in title/description; full weight from two matches
    Keywords { terms: Vec<String>, weight: f64 },
    /// Feature bundle carries `tag`
    DomainTag { tag: RootCause, weight: f64 },
    /// Department equals one of `names` (case-insensitive)
    Department { names: Vec<String>, weight: f64 },
    /// Category equals one of `names` (case-insensitive)
    Category { names: Vec<String>, weight: f64 },
    /// Severity at or above the given level; never fires a rule alone
    SeverityAtLeast { severity: Severity, weight: f64 },
}

impl Predicate {
    pub fn field(&self) -> SignalField {
        match self {
            Predicate::Keywords { .. } => SignalField::Text,
            Predicate::DomainTag { .. } => SignalField::Features,
            Predicate::Department { .. } => SignalField::Department,
            Predicate::Category { .. } => SignalField::Category,
            Predicate::SeverityAtLeast { .. } => SignalField::Severity,
        }
    }

    /// Whether a match on this predicate alone is evidence for the rule
    pub fn is_evidence(&self) -> bool {
        !matches!(self, Predicate::SeverityAtLeast { .. })
    }
}

/// Declarative mapping from predicates to a root cause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainRule {
    pub name: String,
    pub root_cause: RootCause,
    pub predicates: Vec<Predicate>,
}

fn keywords(terms: &[&str], weight: f64) -> Predicate {
    Predicate::Keywords {
        terms: terms.iter().map(|t| t.to_string()).collect(),
        weight,
    }
}

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Lexicon rule for a root cause, with department and category hints
fn lexicon_rule(name: &str, cause: RootCause, departments: &[&str], categories: &[&str]) -> DomainRule {
    DomainRule {
        name: name.to_string(),
        root_cause: cause,
        predicates: vec![
            keywords(lexicon(cause), 0.6),
            Predicate::DomainTag {
                tag: cause,
                weight: 0.25,
            },
            Predicate::Department {
                names: names(departments),
                weight: 0.15,
            },
            Predicate::Category {
                names: names(categories),
                weight: 0.15,
            },
        ],
    }
}

/// Built-in rule set, most specific first
pub fn default_rules() -> Vec<DomainRule> {
    vec![
        DomainRule {
            name: "technology-critical-outage".into(),
            root_cause: RootCause::Technology,
            predicates: vec![
                keywords(&["outage", "downtime", "crash", "unavailable"], 0.7),
                Predicate::SeverityAtLeast {
                    severity: Severity::High,
                    weight: 0.2,
                },
                Predicate::Category {
                    names: names(&["it", "infrastructure", "systems"]),
                    weight: 0.15,
                },
            ],
        },
        DomainRule {
            name: "quality-compliance-finding".into(),
            root_cause: RootCause::Quality,
            predicates: vec![
                keywords(&["audit", "compliance", "nonconformance", "inspection"], 0.7),
                Predicate::Department {
                    names: names(&["quality", "qa", "compliance"]),
                    weight: 0.2,
                },
            ],
        },
        lexicon_rule(
            "process-lexicon",
            RootCause::Process,
            &["operations", "pmo", "delivery"],
            &["process", "workflow"],
        ),
        lexicon_rule(
            "resource-lexicon",
            RootCause::Resource,
            &["finance", "hr", "resourcing"],
            &["staffing", "budget", "resources"],
        ),
        lexicon_rule(
            "communication-lexicon",
            RootCause::Communication,
            &["communications", "account management"],
            &["communication", "stakeholder"],
        ),
        lexicon_rule(
            "technology-lexicon",
            RootCause::Technology,
            &["it", "engineering", "infrastructure"],
            &["it", "infrastructure", "software"],
        ),
        lexicon_rule(
            "training-lexicon",
            RootCause::Training,
            &["learning", "hr", "enablement"],
            &["training", "onboarding"],
        ),
        lexicon_rule(
            "quality-lexicon",
            RootCause::Quality,
            &["quality", "qa", "compliance"],
            &["quality", "defect"],
        ),
    ]
}
