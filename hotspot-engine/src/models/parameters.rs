//! Clustering request and tuning parameters
//!
//! Every field carries a serde default so partial request bodies work.

use chrono::{DateTime, Utc};
use hotspot_common::config::ClusteringDefaults;
use serde::{Deserialize, Serialize};

/// Tuning parameters for one clustering run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringParameters {
    /// Normalized similarity two signals need to be neighbours (default: 0.85)
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Smallest cluster that can become a hotspot (default: 3)
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: usize,

    /// DBSCAN core-point neighbour count, including the point itself (default: 2)
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// Pairwise-distance variance above which a bucket is split (default: 0.004)
    #[serde(default = "default_split_variance_threshold")]
    pub split_variance_threshold: f64,

    /// Centroid similarity at which same-cause sub-groups merge (default: 0.95)
    #[serde(default = "default_merge_similarity")]
    pub merge_similarity: f64,

    /// Slack below `similarity_threshold` when absorbing weak clusters (default: 0.1)
    #[serde(default = "default_merge_margin")]
    pub merge_margin: f64,

    /// Signal count under which the run is flagged low-diversity (default: 30)
    #[serde(default = "default_min_population")]
    pub min_population: usize,

    /// Actionability a cluster needs to stand alone (default: 0.3)
    #[serde(default = "default_min_actionability")]
    pub min_actionability: f64,

    /// Domain confidence under which a signal may be reassigned (default: 0.65)
    #[serde(default = "default_borderline_confidence")]
    pub borderline_confidence: f64,

    /// Similarity margin over domain confidence a reassignment needs (default: 0.15)
    #[serde(default = "default_reassign_margin")]
    pub reassign_margin: f64,

    /// Concurrent feature extractions in stage 1 (default: 8)
    #[serde(default = "default_extraction_concurrency")]
    pub extraction_concurrency: usize,
}

fn default_similarity_threshold() -> f64 {
    0.85
}

fn default_min_cluster_size() -> usize {
    3
}

fn default_min_samples() -> usize {
    2
}

fn default_split_variance_threshold() -> f64 {
    0.004
}

fn default_merge_similarity() -> f64 {
    0.95
}

fn default_merge_margin() -> f64 {
    0.1
}

fn default_min_population() -> usize {
    30
}

fn default_min_actionability() -> f64 {
    0.3
}

fn default_borderline_confidence() -> f64 {
    0.65
}

fn default_reassign_margin() -> f64 {
    0.15
}

fn default_extraction_concurrency() -> usize {
    8
}

impl Default for ClusteringParameters {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            min_cluster_size: default_min_cluster_size(),
            min_samples: default_min_samples(),
            split_variance_threshold: default_split_variance_threshold(),
            merge_similarity: default_merge_similarity(),
            merge_margin: default_merge_margin(),
            min_population: default_min_population(),
            min_actionability: default_min_actionability(),
            borderline_confidence: default_borderline_confidence(),
            reassign_margin: default_reassign_margin(),
            extraction_concurrency: default_extraction_concurrency(),
        }
    }
}

impl ClusteringParameters {
    /// Parameters seeded from operator configuration
    pub fn from_defaults(defaults: &ClusteringDefaults) -> Self {
        let mut params = Self::default();
        if let Some(v) = defaults.similarity_threshold {
            params.similarity_threshold = v;
        }
        if let Some(v) = defaults.min_cluster_size {
            params.min_cluster_size = v;
        }
        if let Some(v) = defaults.min_samples {
            params.min_samples = v;
        }
        if let Some(v) = defaults.min_population {
            params.min_population = v;
        }
        if let Some(v) = defaults.min_actionability {
            params.min_actionability = v;
        }
        if let Some(v) = defaults.extraction_concurrency {
            params.extraction_concurrency = v;
        }
        params
    }

    /// Reject values outside their meaningful range
    pub fn validate(&self) -> Result<(), String> {
        let unit = [
            ("similarity_threshold", self.similarity_threshold),
            ("merge_similarity", self.merge_similarity),
            ("merge_margin", self.merge_margin),
            ("min_actionability", self.min_actionability),
            ("borderline_confidence", self.borderline_confidence),
            ("reassign_margin", self.reassign_margin),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{} must be within [0, 1], got {}", name, value));
            }
        }
        if self.split_variance_threshold.is_nan() || self.split_variance_threshold < 0.0 {
            return Err("split_variance_threshold must be non-negative".to_string());
        }
        if self.min_cluster_size < 2 {
            return Err("min_cluster_size must be at least 2".to_string());
        }
        if self.min_samples == 0 {
            return Err("min_samples must be at least 1".to_string());
        }
        if self.extraction_concurrency == 0 {
            return Err("extraction_concurrency must be at least 1".to_string());
        }
        Ok(())
    }

    /// DBSCAN neighbourhood radius in normalized-distance units
    pub fn eps(&self) -> f64 {
        1.0 - self.similarity_threshold
    }
}

/// Which signals a run considers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeFilter {
    #[serde(default = "crate::models::signal::default_scope")]
    pub scope: String,
    #[serde(default)]
    pub received_after: Option<DateTime<Utc>>,
}

impl Default for ScopeFilter {
    fn default() -> Self {
        Self {
            scope: crate::models::signal::default_scope(),
            received_after: None,
        }
    }
}

/// Body of `POST /clustering/start`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusteringRequest {
    /// Upper bound on signals read (newest first)
    #[serde(default)]
    pub max_signals: Option<usize>,
    /// Re-extract features even when current
    #[serde(default)]
    pub force_regenerate: bool,
    #[serde(default)]
    pub scope_filter: ScopeFilter,
    /// Overrides; missing fields fall back to configured defaults
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
}

impl ClusteringRequest {
    /// Resolve request overrides on top of configured defaults
    pub fn resolve_parameters(&self, defaults: &ClusteringParameters) -> Result<ClusteringParameters, String> {
        let params = match &self.parameters {
            None => defaults.clone(),
            Some(overrides) => {
                let mut base = serde_json::to_value(defaults).map_err(|e| e.to_string())?;
                let (Some(base_map), Some(override_map)) = (base.as_object_mut(), overrides.as_object())
                else {
                    return Err("parameters must be a JSON object".to_string());
                };
                for (key, value) in override_map {
                    base_map.insert(key.clone(), value.clone());
                }
                serde_json::from_value(base).map_err(|e| format!("Invalid parameters: {}", e))?
            }
        };
        params.validate()?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let params: ClusteringParameters = serde_json::from_str(r#"{"min_cluster_size": 4}"#).unwrap();
        assert_eq!(params.min_cluster_size, 4);
        assert_eq!(params.similarity_threshold, 0.85);
        assert!((params.eps() - 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_request_overrides_configured_defaults() {
        let configured = ClusteringParameters::from_defaults(&ClusteringDefaults {
            min_population: Some(10),
            ..Default::default()
        });
        let request: ClusteringRequest =
            serde_json::from_str(r#"{"parameters": {"similarity_threshold": 0.8}}"#).unwrap();
        let params = request.resolve_parameters(&configured).unwrap();
        assert_eq!(params.similarity_threshold, 0.8);
        assert_eq!(params.min_population, 10);
        assert_eq!(request.scope_filter.scope, "default");
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let request: ClusteringRequest =
            serde_json::from_str(r#"{"parameters": {"similarity_threshold": 1.5}}"#).unwrap();
        assert!(request.resolve_parameters(&ClusteringParameters::default()).is_err());

        let params = ClusteringParameters {
            min_cluster_size: 1,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }
}
