//! Signal model
//!
//! A signal is one unstructured operational issue report. The pipeline never
//! rewrites its text; features and classification are stored beside it.

use crate::models::RootCause;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reported severity of a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Numeric weight used by actionability and dispersion scoring
    pub fn weight(&self) -> f64 {
        match self {
            Severity::Low => 1.0,
            Severity::Medium => 3.0,
            Severity::High => 4.0,
            Severity::Critical => 5.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Medium
    }
}

/// Derived features of a signal
///
/// Carries no timestamp so that regenerating an unchanged signal yields a
/// byte-identical bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureBundle {
    /// Semantic vector (empty when the provider failed)
    pub embedding: Vec<f32>,
    /// Extracted entities, sorted and deduplicated
    pub entities: Vec<String>,
    /// Root causes whose lexicon terms appear in the text
    pub domain_tags: Vec<RootCause>,
    /// Completeness-weighted quality (0.0 - 1.0)
    pub quality_score: f32,
    /// Extractor version that produced the bundle
    pub model_version: String,
    /// SHA-256 hex over the extractor inputs
    pub input_hash: String,
}

impl FeatureBundle {
    /// Bundle produced when the embedding provider failed
    pub fn degraded(
        entities: Vec<String>,
        domain_tags: Vec<RootCause>,
        model_version: String,
        input_hash: String,
    ) -> Self {
        Self {
            embedding: Vec::new(),
            entities,
            domain_tags,
            quality_score: 0.0,
            model_version,
            input_hash,
        }
    }

    /// True when the provider failed for this bundle
    pub fn is_degraded(&self) -> bool {
        self.embedding.is_empty() || self.quality_score <= 0.0
    }

    /// Usable for clustering under the given extractor version and input hash
    pub fn is_current(&self, model_version: &str, input_hash: &str) -> bool {
        !self.is_degraded() && self.model_version == model_version && self.input_hash == input_hash
    }
}

/// Business context attached to a classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessContext {
    /// "low" | "moderate" | "high" | "critical"
    pub impact: String,
    pub department: Option<String>,
    pub summary: String,
}

/// Output of the domain classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainClassification {
    pub root_cause: RootCause,
    pub confidence: f64,
    pub business_context: BusinessContext,
    pub ai_enhancement_needed: bool,
    /// Name of the winning rule, None when nothing matched
    pub matched_rule: Option<String>,
}

/// An operational issue report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: Uuid,
    /// Tenant/workspace the signal belongs to
    pub scope: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub department: Option<String>,
    pub team: Option<String>,
    pub category: Option<String>,
    pub received_at: DateTime<Utc>,
    pub features: Option<FeatureBundle>,
    pub features_generated_at: Option<DateTime<Utc>>,
    pub classification: Option<DomainClassification>,
}

impl Signal {
    /// Create a new unannotated signal
    pub fn new(scope: impl Into<String>, title: impl Into<String>, description: impl Into<String>, severity: Severity) -> Self {
        Self {
            id: Uuid::new_v4(),
            scope: scope.into(),
            title: title.into(),
            description: description.into(),
            severity,
            department: None,
            team: None,
            category: None,
            received_at: Utc::now(),
            features: None,
            features_generated_at: None,
            classification: None,
        }
    }

    /// Title and description joined for text analysis
    pub fn text(&self) -> String {
        if self.description.is_empty() {
            self.title.clone()
        } else {
            format!("{}. {}", self.title, self.description)
        }
    }
}

/// Request body for signal ingestion
#[derive(Debug, Clone, Deserialize)]
pub struct NewSignal {
    #[serde(default = "default_scope")]
    pub scope: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
}

pub(crate) fn default_scope() -> String {
    "default".to_string()
}

impl NewSignal {
    pub fn into_signal(self) -> Signal {
        let mut signal = Signal::new(self.scope, self.title, self.description, self.severity);
        signal.department = self.department;
        signal.team = self.team;
        signal.category = self.category;
        if let Some(received_at) = self.received_at {
            signal.received_at = received_at;
        }
        signal
    }
}

/// A signal that survived stage 1 with usable features and a classification
#[derive(Debug, Clone)]
pub struct ClassifiedSignal {
    pub id: Uuid,
    pub title: String,
    pub severity: Severity,
    pub department: Option<String>,
    pub embedding: Vec<f32>,
    pub entities: Vec<String>,
    pub domain_tags: Vec<RootCause>,
    pub classification: DomainClassification,
}

impl ClassifiedSignal {
    pub fn root_cause(&self) -> RootCause {
        self.classification.root_cause
    }

    pub fn domain_confidence(&self) -> f64 {
        self.classification.confidence
    }
}
