//! Unit tests for configuration resolution
//!
//! Tests that manipulate HOTSPOT_EMBEDDING_API_KEY are marked with #[serial]
//! so they run sequentially, not in parallel.

use hotspot_common::config::{EmbeddingConfig, TomlConfig};
use hotspot_engine::config::{is_valid_key, resolve_embedding_api_key, EMBEDDING_API_KEY_ENV};
use hotspot_engine::models::ClusteringParameters;
use hotspot_engine::services::provider_from_config;
use serial_test::serial;

fn toml_with_key(key: Option<&str>) -> TomlConfig {
    TomlConfig {
        embedding: EmbeddingConfig {
            api_key: key.map(str::to_string),
            ..Default::default()
        },
        ..Default::default()
    }
}

// ============================================================================
// Resolution Tests
// ============================================================================

#[test]
#[serial]
fn test_env_overrides_toml() {
    std::env::set_var(EMBEDDING_API_KEY_ENV, "env-key");
    let result = resolve_embedding_api_key(&toml_with_key(Some("toml-key")));
    std::env::remove_var(EMBEDDING_API_KEY_ENV);

    assert_eq!(result.as_deref(), Some("env-key"));
}

#[test]
#[serial]
fn test_toml_fallback_when_env_missing() {
    std::env::remove_var(EMBEDDING_API_KEY_ENV);
    let result = resolve_embedding_api_key(&toml_with_key(Some("toml-key")));
    assert_eq!(result.as_deref(), Some("toml-key"));
}

#[test]
#[serial]
fn test_blank_env_is_ignored() {
    std::env::set_var(EMBEDDING_API_KEY_ENV, "   ");
    let result = resolve_embedding_api_key(&toml_with_key(Some("toml-key")));
    std::env::remove_var(EMBEDDING_API_KEY_ENV);

    assert_eq!(result.as_deref(), Some("toml-key"));
}

#[test]
#[serial]
fn test_no_key_anywhere() {
    std::env::remove_var(EMBEDDING_API_KEY_ENV);
    assert_eq!(resolve_embedding_api_key(&toml_with_key(None)), None);
    assert_eq!(resolve_embedding_api_key(&toml_with_key(Some(""))), None);
}

// ============================================================================
// Validation Tests
// ============================================================================

#[test]
fn test_key_validation() {
    assert!(is_valid_key("sk-live-123"));
    assert!(!is_valid_key(""));
    assert!(!is_valid_key(" \t\n"));
}

#[test]
fn test_default_provider_is_local_hashing() {
    let config = EmbeddingConfig::default();
    let provider = provider_from_config(&config, None).unwrap();
    assert!(provider.model_version().starts_with("hashing"));
}

#[test]
fn test_clustering_section_seeds_parameters() {
    let toml_config: TomlConfig = toml::from_str(
        r#"
        [clustering]
        similarity_threshold = 0.8
        min_population = 12
        "#,
    )
    .unwrap();
    let params = ClusteringParameters::from_defaults(&toml_config.clustering);
    assert_eq!(params.similarity_threshold, 0.8);
    assert_eq!(params.min_population, 12);
    assert_eq!(params.min_cluster_size, 3);
    assert!(params.validate().is_ok());
}
