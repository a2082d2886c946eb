//! Configuration resolution for hotspot-engine
//!
//! Embedding API key priority: ENV → TOML. The key is optional; only the
//! `http` embedding provider needs one.

use hotspot_common::config::TomlConfig;
use tracing::{info, warn};

/// Environment variable holding the embedding API key
pub const EMBEDDING_API_KEY_ENV: &str = "HOTSPOT_EMBEDDING_API_KEY";

/// Resolve the embedding API key from environment, then TOML
pub fn resolve_embedding_api_key(toml_config: &TomlConfig) -> Option<String> {
    let env_key = std::env::var(EMBEDDING_API_KEY_ENV).ok().filter(|k| is_valid_key(k));
    let toml_key = toml_config.embedding.api_key.clone().filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!("Embedding API key found in environment and TOML. Using environment (highest priority).");
    }

    if let Some(key) = env_key {
        info!("Embedding API key loaded from environment variable");
        return Some(key);
    }
    if let Some(key) = toml_key {
        info!("Embedding API key loaded from TOML config");
        return Some(key);
    }
    None
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
