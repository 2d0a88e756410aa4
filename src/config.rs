//! Configuration (§6 "Configuration"). A layered `figment` config: defaults,
//! then an optional TOML file found by searching ancestors for
//! `.codegraph/`, then `CODEGRAPH_`-prefixed environment variables.
//!
//! # Environment variables
//!
//! Double underscores separate nested levels:
//! - `CODEGRAPH_INDEXING__CONCURRENCY=8` sets `indexing.concurrency`
//! - `CODEGRAPH_SEMANTIC__ENABLED=true` sets `semantic.enabled`
//! - `CODEGRAPH_DB_PATH=/var/lib/codegraph/index.db` overrides the database
//!   file path (the one environment override named explicitly in the spec).

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, ConfigResult};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub indexing: IndexingConfig,

    #[serde(default)]
    pub slice: SliceConfig,

    #[serde(default)]
    pub semantic: SemanticConfig,

    #[serde(default)]
    pub plugins: PluginConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexingConfig {
    /// `"native" | "reference"` — see C4 "native fast-path". This crate
    /// ships no native engine, so `"native"` is accepted but always falls
    /// back, logging once.
    #[serde(default = "default_engine")]
    pub engine: String,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Explicit override of the worker-pool size; `None` derives it from
    /// `concurrency`, cpu count, and file count (spec §5).
    #[serde(default)]
    pub worker_pool_size: Option<usize>,

    #[serde(default = "default_max_watched_files")]
    pub max_watched_files: usize,

    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,

    #[serde(default)]
    pub ignore: Vec<String>,

    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EdgeWeights {
    #[serde(default = "default_weight_import")]
    pub import: f32,
    #[serde(default = "default_weight_call")]
    pub call: f32,
    #[serde(default = "default_weight_config")]
    pub config: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SliceConfig {
    #[serde(default)]
    pub edge_weights: EdgeWeights,

    #[serde(default = "default_max_cards")]
    pub default_max_cards: usize,

    #[serde(default = "default_max_tokens")]
    pub default_max_estimated_tokens: usize,

    #[serde(default = "default_semantic_alpha")]
    pub semantic_alpha: f32,

    #[serde(default = "default_slice_ttl_secs")]
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SemanticConfig {
    #[serde(default)]
    pub enabled: bool,

    /// `"mock" | "local" | "api"`.
    #[serde(default = "default_semantic_provider")]
    pub provider: String,

    #[serde(default = "default_semantic_model")]
    pub model: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PluginConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub paths: Vec<PathBuf>,

    #[serde(default = "default_true")]
    pub strict_versioning: bool,
}

/// Same shape the teacher uses: a default level plus per-module overrides,
/// consumed by `logging::init_with_config`.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub default: String,

    #[serde(default)]
    pub modules: std::collections::HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: std::collections::HashMap::new(),
        }
    }
}

fn default_version() -> u32 {
    1
}
fn default_db_path() -> PathBuf {
    PathBuf::from(".codegraph/index.db")
}
fn default_engine() -> String {
    "reference".to_string()
}
fn default_concurrency() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}
fn default_max_watched_files() -> usize {
    50_000
}
fn default_max_file_bytes() -> u64 {
    2 * 1024 * 1024
}
fn default_debounce_ms() -> u64 {
    300
}
fn default_weight_import() -> f32 {
    0.6
}
fn default_weight_call() -> f32 {
    1.0
}
fn default_weight_config() -> f32 {
    0.4
}
fn default_max_cards() -> usize {
    40
}
fn default_max_tokens() -> usize {
    6_000
}
fn default_semantic_alpha() -> f32 {
    0.35
}
fn default_slice_ttl_secs() -> u64 {
    60
}
fn default_semantic_provider() -> String {
    "mock".to_string()
}
fn default_semantic_model() -> String {
    "bge-small-en-v1.5".to_string()
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            concurrency: default_concurrency(),
            worker_pool_size: None,
            max_watched_files: default_max_watched_files(),
            max_file_bytes: default_max_file_bytes(),
            ignore: vec![
                "target/**".to_string(),
                "node_modules/**".to_string(),
                ".git/**".to_string(),
                "dist/**".to_string(),
            ],
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Default for EdgeWeights {
    fn default() -> Self {
        Self {
            import: default_weight_import(),
            call: default_weight_call(),
            config: default_weight_config(),
        }
    }
}

impl Default for SliceConfig {
    fn default() -> Self {
        Self {
            edge_weights: EdgeWeights::default(),
            default_max_cards: default_max_cards(),
            default_max_estimated_tokens: default_max_tokens(),
            semantic_alpha: default_semantic_alpha(),
            cache_ttl_secs: default_slice_ttl_secs(),
        }
    }
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_semantic_provider(),
            model: default_semantic_model(),
        }
    }
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            paths: Vec::new(),
            strict_versioning: true,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            db_path: default_db_path(),
            indexing: IndexingConfig::default(),
            slice: SliceConfig::default(),
            semantic: SemanticConfig::default(),
            plugins: PluginConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Settings {
    /// Load from defaults, an optional `.codegraph/settings.toml` found by
    /// walking up from the current directory, then `CODEGRAPH_`-prefixed
    /// environment variables.
    pub fn load() -> ConfigResult<Self> {
        let config_path =
            Self::find_workspace_config().unwrap_or_else(|| PathBuf::from(".codegraph/settings.toml"));

        // `CODEGRAPH_DB_PATH` (spec §6's single env override) needs no special
        // case: no `__` in it, so it maps straight onto the top-level `db_path` field.
        Ok(Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("CODEGRAPH_").map(|key| key.as_str().to_lowercase().replace("__", ".").into()))
            .extract()?)
    }

    pub fn load_from(path: impl AsRef<std::path::Path>) -> ConfigResult<Self> {
        Ok(Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("CODEGRAPH_").map(|key| key.as_str().to_lowercase().replace("__", ".").into()))
            .extract()?)
    }

    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(".codegraph");
            if config_dir.is_dir() {
                return Some(config_dir.join("settings.toml"));
            }
        }
        None
    }

    pub fn save(&self, path: impl AsRef<std::path::Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_string =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid { reason: e.to_string() })?;
        std::fs::write(path, toml_string)?;
        Ok(())
    }

    /// Resolved database path, with parent directory created per spec §6
    /// ("parent directory auto-created").
    pub fn resolved_db_path(&self) -> std::io::Result<PathBuf> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(self.db_path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_settings_are_sane() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert!(settings.indexing.concurrency >= 1);
        assert_eq!(settings.slice.edge_weights.call, 1.0);
        assert!(!settings.semantic.enabled);
    }

    #[test]
    fn load_from_toml_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let toml_content = r#"
version = 2

[indexing]
concurrency = 4
max_watched_files = 1000

[semantic]
enabled = true
provider = "local"
"#;
        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.version, 2);
        assert_eq!(settings.indexing.concurrency, 4);
        assert_eq!(settings.indexing.max_watched_files, 1000);
        assert!(settings.semantic.enabled);
        assert_eq!(settings.semantic.provider, "local");
        // untouched defaults survive layering
        assert_eq!(settings.slice.edge_weights.call, 1.0);
    }

    #[test]
    fn save_then_load_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let mut settings = Settings::default();
        settings.indexing.concurrency = 2;
        settings.slice.default_max_cards = 10;
        settings.save(&config_path).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded.indexing.concurrency, 2);
        assert_eq!(loaded.slice.default_max_cards, 10);
    }

    #[test]
    fn resolved_db_path_creates_parent_dir() {
        let temp_dir = TempDir::new().unwrap();
        let mut settings = Settings::default();
        settings.db_path = temp_dir.path().join("nested/dir/index.db");
        let resolved = settings.resolved_db_path().unwrap();
        assert!(resolved.parent().unwrap().is_dir());
    }
}
