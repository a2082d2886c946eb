//! Configuration loading and root folder resolution
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`HOTSPOT_*`)
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default HTTP bind address for the clustering engine
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5740";

/// Default retention for finished clustering jobs (seconds)
pub const DEFAULT_JOB_RETENTION_SECS: u64 = 3600;

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// "hashing" (local, deterministic) or "http" (OpenAI-compatible endpoint)
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Base URL of the remote embedding API (http provider only)
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Remote model name; also part of the feature version
    #[serde(default)]
    pub model: Option<String>,
    /// API key for the remote provider (prefer HOTSPOT_EMBEDDING_API_KEY)
    #[serde(default)]
    pub api_key: Option<String>,
    /// Vector length produced by the hashing embedder
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    /// Per-call timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Remote request budget
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            endpoint: None,
            model: None,
            api_key: None,
            dimensions: default_dimensions(),
            timeout_ms: default_timeout_ms(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

fn default_provider() -> String {
    "hashing".to_string()
}

fn default_dimensions() -> usize {
    256
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_requests_per_second() -> u32 {
    10
}

/// Operator overrides for clustering parameters
///
/// Every field is optional; unset fields keep the engine's compiled defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClusteringDefaults {
    pub similarity_threshold: Option<f64>,
    pub min_cluster_size: Option<usize>,
    pub min_samples: Option<usize>,
    pub min_population: Option<usize>,
    pub min_actionability: Option<f64>,
    pub extraction_concurrency: Option<usize>,
}

/// Contents of `config.toml`
///
/// Scalar keys precede the tables so the serialized form stays valid TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// Folder holding the SQLite database
    #[serde(default)]
    pub root_folder: Option<PathBuf>,
    #[serde(default)]
    pub bind_address: Option<String>,
    #[serde(default)]
    pub job_retention_secs: Option<u64>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub clustering: ClusteringDefaults,
}

impl TomlConfig {
    /// Retention window for finished jobs
    pub fn job_retention(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.job_retention_secs.unwrap_or(DEFAULT_JOB_RETENTION_SECS))
    }
}

/// Load TOML config from an explicit path
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load the TOML config from its default location, or defaults if absent
///
/// A present but malformed file is an error; a missing file is not.
pub fn load_default_toml_config() -> Result<TomlConfig> {
    match default_config_path() {
        Some(path) if path.exists() => load_toml_config(&path),
        _ => Ok(TomlConfig::default()),
    }
}

/// Write TOML config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Root folder resolution: CLI → ENV → TOML → OS default
pub fn resolve_root_folder(
    cli_arg: Option<&str>,
    env_var_name: &str,
    toml_config: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    get_default_root_folder()
}

/// Bind address resolution: CLI → ENV → TOML → default
pub fn resolve_bind_address(cli_arg: Option<&str>, toml_config: &TomlConfig) -> String {
    if let Some(addr) = cli_arg {
        return addr.to_string();
    }
    if let Ok(addr) = std::env::var("HOTSPOT_BIND_ADDRESS") {
        if !addr.trim().is_empty() {
            return addr;
        }
    }
    toml_config
        .bind_address
        .clone()
        .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string())
}

/// Default configuration file path for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("hotspot").join("config.toml"))
}

/// OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("hotspot"))
        .unwrap_or_else(|| PathBuf::from("./hotspot_data"))
}

/// Database file inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join("hotspot.db")
}
