//! Feature Extractor Service
//!
//! Produces a `FeatureBundle` for a signal: embedding, entities, domain tags
//! and a completeness-weighted quality score.
//!
//! Extraction never fails the caller. A provider error or timeout yields a
//! degraded bundle (empty embedding, quality 0) which the caller reports as a
//! warning. Identical inputs under the same model version produce an
//! identical bundle.

use crate::models::{FeatureBundle, Signal};
use crate::services::embedding::{tokenize, EmbeddingError, EmbeddingProvider};
use crate::services::taxonomy::domain_tags;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Version of the extraction logic, combined with the provider version
const EXTRACTOR_VERSION: &str = "features-v1";

/// Result of one extraction
#[derive(Debug, Clone)]
pub struct FeatureOutcome {
    pub bundle: FeatureBundle,
    /// Why the bundle is degraded, if it is
    pub degraded_reason: Option<String>,
}

impl FeatureOutcome {
    pub fn is_degraded(&self) -> bool {
        self.degraded_reason.is_some()
    }
}

/// Feature Extractor
pub struct FeatureExtractor {
    provider: Arc<dyn EmbeddingProvider>,
    timeout: Duration,
}

impl FeatureExtractor {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Version stamped into every bundle
    pub fn model_version(&self) -> String {
        format!("{}+{}", EXTRACTOR_VERSION, self.provider.model_version())
    }

    /// SHA-256 hex over the extraction inputs and model version
    pub fn input_hash(&self, signal: &Signal) -> String {
        let model_version = self.model_version();
        let mut hasher = Sha256::new();
        for part in [
            model_version.as_str(),
            signal.title.as_str(),
            signal.description.as_str(),
            signal.severity.as_str(),
            signal.department.as_deref().unwrap_or(""),
            signal.team.as_deref().unwrap_or(""),
            signal.category.as_deref().unwrap_or(""),
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        format!("{:x}", hasher.finalize())
    }

    /// True when the stored bundle is usable as-is
    pub fn is_current(&self, signal: &Signal) -> bool {
        signal
            .features
            .as_ref()
            .map(|bundle| bundle.is_current(&self.model_version(), &self.input_hash(signal)))
            .unwrap_or(false)
    }

    /// True when the signal must be (re)extracted
    pub fn needs_extraction(&self, signal: &Signal, force_regenerate: bool) -> bool {
        force_regenerate || !self.is_current(signal)
    }

    /// Extract features; degraded on provider error or timeout
    pub async fn extract(&self, signal: &Signal) -> FeatureOutcome {
        let text = signal.text();
        let tokens = tokenize(&text);
        let entities = extract_entities(signal);
        let tags = domain_tags(&tokens);
        let model_version = self.model_version();
        let input_hash = self.input_hash(signal);

        let embedded = match tokio::time::timeout(self.timeout, self.provider.embed(&text)).await {
            Ok(result) => result,
            Err(_) => Err(EmbeddingError::Timeout(self.timeout.as_millis() as u64)),
        };

        match embedded {
            Ok(embedding) if !embedding.is_empty() => {
                let quality_score = quality_score(signal);
                FeatureOutcome {
                    bundle: FeatureBundle {
                        embedding,
                        entities,
                        domain_tags: tags,
                        quality_score,
                        model_version,
                        input_hash,
                    },
                    degraded_reason: None,
                }
            }
            Ok(_) => self.degraded(signal, entities, tags, model_version, input_hash, "empty embedding".into()),
            Err(e) => self.degraded(signal, entities, tags, model_version, input_hash, e.to_string()),
        }
    }

    fn degraded(
        &self,
        signal: &Signal,
        entities: Vec<String>,
        tags: Vec<crate::models::RootCause>,
        model_version: String,
        input_hash: String,
        reason: String,
    ) -> FeatureOutcome {
        warn!(signal_id = %signal.id, reason = %reason, "Feature extraction degraded");
        FeatureOutcome {
            bundle: FeatureBundle::degraded(entities, tags, model_version, input_hash),
            degraded_reason: Some(reason),
        }
    }
}

/// Acronyms, ticket codes and organisational metadata, sorted and unique
pub fn extract_entities(signal: &Signal) -> Vec<String> {
    let mut entities = BTreeSet::new();

    for raw in signal.text().split_whitespace() {
        let word = raw.trim_matches(|c: char| !c.is_alphanumeric());
        if is_ticket_code(word) || is_acronym(word) {
            entities.insert(word.to_string());
        }
    }

    for value in [&signal.department, &signal.team, &signal.category].into_iter().flatten() {
        let value = value.trim();
        if !value.is_empty() {
            entities.insert(value.to_string());
        }
    }

    entities.into_iter().collect()
}

/// `ABC-123` style project or ticket code
fn is_ticket_code(word: &str) -> bool {
    let Some((prefix, number)) = word.split_once('-') else {
        return false;
    };
    prefix.len() >= 2
        && prefix.chars().all(|c| c.is_ascii_uppercase())
        && !number.is_empty()
        && number.chars().all(|c| c.is_ascii_digit())
}

/// Upper-case acronym of 2 to 6 characters, at least two letters
fn is_acronym(word: &str) -> bool {
    let letters = word.chars().filter(|c| c.is_ascii_uppercase()).count();
    (2..=6).contains(&word.len())
        && letters >= 2
        && word.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

/// Weighted completeness of text and metadata (0.0 - 1.0)
pub fn quality_score(signal: &Signal) -> f32 {
    let title_words = signal.title.split_whitespace().count() as f32;
    let description_words = signal.description.split_whitespace().count() as f32;
    let present = |v: &Option<String>| v.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false);

    let mut score = 0.25 * (title_words / 3.0).min(1.0) + 0.35 * (description_words / 12.0).min(1.0);
    if present(&signal.department) {
        score += 0.15;
    }
    if present(&signal.team) {
        score += 0.1;
    }
    if present(&signal.category) {
        score += 0.15;
    }
    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RootCause, Severity};
    use crate::services::embedding::HashingEmbedder;
    use async_trait::async_trait;

    struct FailingProvider;

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        fn model_version(&self) -> String {
            "failing".into()
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Err(EmbeddingError::Request("connection refused".into()))
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl EmbeddingProvider for SlowProvider {
        fn model_version(&self) -> String {
            "slow".into()
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![1.0])
        }
    }

    fn sample_signal() -> Signal {
        let mut signal = Signal::new(
            "default",
            "ERP outage blocks PRJ-204 invoicing",
            "The ERP server crashed twice this week and invoices were delayed.",
            Severity::High,
        );
        signal.department = Some("Finance".into());
        signal.category = Some("IT".into());
        signal
    }

    #[tokio::test]
    async fn test_extract_is_deterministic() {
        let extractor = FeatureExtractor::new(Arc::new(HashingEmbedder::new(64)), Duration::from_secs(1));
        let signal = sample_signal();
        let first = extractor.extract(&signal).await;
        let second = extractor.extract(&signal).await;
        assert!(!first.is_degraded());
        assert_eq!(first.bundle, second.bundle);
        assert_eq!(
            serde_json::to_vec(&first.bundle).unwrap(),
            serde_json::to_vec(&second.bundle).unwrap()
        );
        assert!(first.bundle.domain_tags.contains(&RootCause::Technology));
        assert!(first.bundle.quality_score > 0.0);
    }

    #[tokio::test]
    async fn test_provider_failure_degrades() {
        let extractor = FeatureExtractor::new(Arc::new(FailingProvider), Duration::from_secs(1));
        let outcome = extractor.extract(&sample_signal()).await;
        assert!(outcome.is_degraded());
        assert!(outcome.bundle.embedding.is_empty());
        assert_eq!(outcome.bundle.quality_score, 0.0);
        assert!(!outcome.bundle.entities.is_empty());
    }

    #[tokio::test]
    async fn test_provider_timeout_degrades() {
        let extractor = FeatureExtractor::new(Arc::new(SlowProvider), Duration::from_millis(50));
        let outcome = extractor.extract(&sample_signal()).await;
        assert!(outcome.degraded_reason.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_currency_tracks_input_and_version() {
        let extractor = FeatureExtractor::new(Arc::new(HashingEmbedder::new(64)), Duration::from_secs(1));
        let mut signal = sample_signal();
        assert!(extractor.needs_extraction(&signal, false));

        signal.features = Some(extractor.extract(&signal).await.bundle);
        assert!(extractor.is_current(&signal));
        assert!(!extractor.needs_extraction(&signal, false));
        assert!(extractor.needs_extraction(&signal, true));

        signal.description.push_str(" Again.");
        assert!(!extractor.is_current(&signal));

        let other = FeatureExtractor::new(Arc::new(HashingEmbedder::new(128)), Duration::from_secs(1));
        assert_ne!(other.model_version(), extractor.model_version());
    }

    #[test]
    fn test_entities() {
        let entities = extract_entities(&sample_signal());
        assert_eq!(entities, vec!["ERP", "Finance", "IT", "PRJ-204"]);
    }

    #[test]
    fn test_quality_score_rewards_completeness() {
        let sparse = Signal::new("default", "Broken", "", Severity::Low);
        let full = sample_signal();
        assert!(quality_score(&full) > quality_score(&sparse));
        assert!(quality_score(&full) <= 1.0);
    }
}
