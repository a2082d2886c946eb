//! Embedding providers
//!
//! Turns signal text into a semantic vector. Two implementations:
//! - `HashingEmbedder`: local, deterministic feature hashing (default)
//! - `HttpEmbeddingProvider`: OpenAI-compatible `/embeddings` endpoint

use crate::services::similarity::l2_normalize;
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use hotspot_common::config::EmbeddingConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Embedding provider errors
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Text had nothing to embed
    #[error("No embeddable content")]
    EmptyInput,

    /// Provider did not answer in time
    #[error("Embedding timed out after {0} ms")]
    Timeout(u64),

    /// Transport or HTTP status failure
    #[error("Embedding request failed: {0}")]
    Request(String),

    /// Response could not be understood
    #[error("Invalid embedding response: {0}")]
    InvalidResponse(String),

    /// Provider misconfigured
    #[error("Embedding configuration error: {0}")]
    Config(String),
}

/// Source of semantic vectors
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier folded into every feature bundle's version
    fn model_version(&self) -> String;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Deterministic feature-hashing embedder
///
/// Lowercased alphanumeric tokens and adjacent-token bigrams are hashed with
/// SHA-256 into `dimensions` signed buckets, then L2-normalized.
pub struct HashingEmbedder {
    dimensions: usize,
}

/// Weight of a bigram relative to a unigram
const BIGRAM_WEIGHT: f32 = 0.5;

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(8),
        }
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut index_bytes = [0u8; 8];
        index_bytes.copy_from_slice(&digest[..8]);
        let index = (u64::from_le_bytes(index_bytes) % self.dimensions as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[index] += sign * weight;
    }

    /// Embed synchronously
    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        let mut vector = vec![0.0f32; self.dimensions];
        for token in &tokens {
            self.add_feature(&mut vector, token, 1.0);
        }
        for pair in tokens.windows(2) {
            self.add_feature(&mut vector, &format!("{} {}", pair[0], pair[1]), BIGRAM_WEIGHT);
        }
        l2_normalize(&mut vector);
        Ok(vector)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn model_version(&self) -> String {
        format!("hashing-v1-{}", self.dimensions)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_text(text)
    }
}

/// Lowercased alphanumeric tokens of at least two characters
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .map(|t| t.to_lowercase())
        .collect()
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// OpenAI-compatible remote embedding client
///
/// Requests are throttled with a token bucket; callers wait for a permit.
pub struct HttpEmbeddingProvider {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl HttpEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig, api_key: Option<String>) -> Result<Self, EmbeddingError> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| EmbeddingError::Config("embedding.endpoint is required for the http provider".into()))?;
        let model = config
            .model
            .clone()
            .ok_or_else(|| EmbeddingError::Config("embedding.model is required for the http provider".into()))?;
        let requests_per_second = NonZeroU32::new(config.requests_per_second)
            .ok_or_else(|| EmbeddingError::Config("embedding.requests_per_second must be > 0".into()))?;

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| EmbeddingError::Config(format!("HTTP client build failed: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model,
            api_key,
            rate_limiter: RateLimiter::direct(Quota::per_second(requests_per_second)),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn model_version(&self) -> String {
        format!("http-{}", self.model)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        self.rate_limiter.until_ready().await;

        let url = format!("{}/embeddings", self.endpoint);
        tracing::debug!(model = %self.model, chars = text.len(), "Requesting embedding");

        let mut request = self.client.post(&url).json(&EmbeddingRequest {
            model: &self.model,
            input: text,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EmbeddingError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Request(format!("status {}: {}", status, body)));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding in response".into()))?;
        if embedding.is_empty() {
            return Err(EmbeddingError::InvalidResponse("empty embedding".into()));
        }
        Ok(embedding)
    }
}

/// Build the provider named by configuration
pub fn provider_from_config(
    config: &EmbeddingConfig,
    api_key: Option<String>,
) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    match config.provider.as_str() {
        "hashing" => Ok(Arc::new(HashingEmbedder::new(config.dimensions))),
        "http" => Ok(Arc::new(HttpEmbeddingProvider::new(config, api_key)?)),
        other => Err(EmbeddingError::Config(format!("Unknown embedding provider: {}", other))),
    }
}
