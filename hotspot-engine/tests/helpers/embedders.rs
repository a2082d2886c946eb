//! Fixture embedding providers
//!
//! `GroupEmbedder` maps each marker word to its own axis and adds a little
//! deterministic noise, so signals sharing a marker are near-duplicates and
//! signals with different markers are orthogonal.

use async_trait::async_trait;
use hotspot_engine::services::{EmbeddingError, EmbeddingProvider};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

const DIMENSIONS: usize = 16;
const NOISE: f32 = 0.03;

/// Prototype-per-marker embedder
pub struct GroupEmbedder {
    markers: Vec<String>,
}

impl GroupEmbedder {
    pub fn new(markers: &[&str]) -> Self {
        assert!(markers.len() < DIMENSIONS);
        Self {
            markers: markers.iter().map(|m| m.to_lowercase()).collect(),
        }
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let lowered = text.to_lowercase();
        // Unmarked text lands on the last axis
        let axis = self
            .markers
            .iter()
            .position(|m| lowered.contains(m.as_str()))
            .unwrap_or(DIMENSIONS - 1);

        let digest = Sha256::digest(text.as_bytes());
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&digest);
        let mut rng = StdRng::from_seed(seed);

        let mut vector: Vec<f32> = (0..DIMENSIONS).map(|_| rng.gen_range(-NOISE..NOISE)).collect();
        vector[axis] += 1.0;
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        vector.iter_mut().for_each(|x| *x /= norm);
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for GroupEmbedder {
    fn model_version(&self) -> String {
        format!("group-fixture-{}", self.markers.len())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.vector_for(text))
    }
}

/// Provider that is always down
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn model_version(&self) -> String {
        "failing-fixture".to_string()
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Request("connection refused".to_string()))
    }
}

/// Requests cancellation of a job while its features are being extracted
pub struct CancellingEmbedder {
    inner: GroupEmbedder,
    token: CancellationToken,
}

impl CancellingEmbedder {
    pub fn new(inner: GroupEmbedder, token: CancellationToken) -> Self {
        Self { inner, token }
    }
}

#[async_trait]
impl EmbeddingProvider for CancellingEmbedder {
    fn model_version(&self) -> String {
        self.inner.model_version()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.token.cancel();
        self.inner.embed(text).await
    }
}

/// Holds every embedding call until released
pub struct GatedEmbedder {
    inner: GroupEmbedder,
    release: CancellationToken,
}

impl GatedEmbedder {
    pub fn new(inner: GroupEmbedder, release: CancellationToken) -> Self {
        Self { inner, release }
    }
}

#[async_trait]
impl EmbeddingProvider for GatedEmbedder {
    fn model_version(&self) -> String {
        self.inner.model_version()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.release.cancelled().await;
        self.inner.embed(text).await
    }
}
