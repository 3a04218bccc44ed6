//! Configuration for the recollect memory system.
//!
//! Maps directly to `recollect.toml`. Every field carries a serde default,
//! so a partial file (or an empty string) yields a usable configuration.
//! Configuration is always passed explicitly at construction time; no
//! component reads ambient global state.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RecollectError, Result};

/// Top-level recollect configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecollectConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Working, episodic and semantic memory settings.
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Embedding cache settings.
    #[serde(default)]
    pub embedding_cache: EmbeddingCacheConfig,
    /// Conversation thread tracking settings.
    #[serde(default)]
    pub threads: ThreadConfig,
    /// Persistence settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl RecollectConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `RecollectError::Config` if the TOML is invalid or fails
    /// [`validate`](Self::validate).
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| RecollectError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Reject configurations that would make a capacity invariant
    /// meaningless.
    ///
    /// # Errors
    /// Returns `RecollectError::Config` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.memory.max_episodic == 0 {
            return Err(RecollectError::Config(
                "memory.max_episodic must be at least 1".to_string(),
            ));
        }
        if self.embedding_cache.max_size == 0 {
            return Err(RecollectError::Config(
                "embedding_cache.max_size must be at least 1".to_string(),
            ));
        }
        if self.threads.timeout_secs == 0 {
            return Err(RecollectError::Config(
                "threads.timeout_secs must be at least 1".to_string(),
            ));
        }
        let representable = i64::try_from(self.threads.timeout_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .is_some();
        if !representable {
            return Err(RecollectError::Config(
                "threads.timeout_secs is too large".to_string(),
            ));
        }
        Ok(())
    }

    /// Serialize back to TOML (used to write a starter config file).
    ///
    /// # Errors
    /// Returns `RecollectError::Serialization` if encoding fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| RecollectError::Serialization(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Working, episodic and semantic memory configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Directory holding `episodic.json` and `semantic.json`.
    #[serde(default = "default_memory_dir")]
    pub data_dir: PathBuf,
    /// Working memory capacity (entries, not turns).
    #[serde(default = "default_10")]
    pub working_size: usize,
    /// Hard cap on stored episodes.
    #[serde(default = "default_1000")]
    pub max_episodic: usize,
    /// Keywords kept on each stored episode.
    #[serde(default = "default_10")]
    pub max_keywords: usize,
    /// Characters of user input returned in a relevance preview.
    #[serde(default = "default_80")]
    pub preview_chars: usize,
    /// File name of the episodic log inside `data_dir`.
    #[serde(default = "default_episodic_file")]
    pub episodic_file: String,
    /// File name of the semantic table inside `data_dir`.
    #[serde(default = "default_semantic_file")]
    pub semantic_file: String,
}

impl MemoryConfig {
    /// Full path of the episodic log.
    #[must_use]
    pub fn episodic_path(&self) -> PathBuf {
        self.data_dir.join(&self.episodic_file)
    }

    /// Full path of the semantic table.
    #[must_use]
    pub fn semantic_path(&self) -> PathBuf {
        self.data_dir.join(&self.semantic_file)
    }

    /// Convenience constructor used by tests and embedders.
    #[must_use]
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: dir.into(),
            ..Self::default()
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            data_dir: default_memory_dir(),
            working_size: 10,
            max_episodic: 1000,
            max_keywords: 10,
            preview_chars: 80,
            episodic_file: default_episodic_file(),
            semantic_file: default_semantic_file(),
        }
    }
}

/// Embedding cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingCacheConfig {
    /// Directory holding the cache file.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Maximum number of cached vectors.
    #[serde(default = "default_10000")]
    pub max_size: usize,
    /// File name of the cache inside `cache_dir`.
    #[serde(default = "default_cache_file")]
    pub file_name: String,
}

impl EmbeddingCacheConfig {
    /// Full path of the cache file.
    #[must_use]
    pub fn cache_path(&self) -> PathBuf {
        self.cache_dir.join(&self.file_name)
    }

    /// Convenience constructor used by tests and embedders.
    #[must_use]
    pub fn in_dir(dir: impl Into<PathBuf>, max_size: usize) -> Self {
        Self {
            cache_dir: dir.into(),
            max_size,
            ..Self::default()
        }
    }
}

impl Default for EmbeddingCacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            max_size: 10_000,
            file_name: default_cache_file(),
        }
    }
}

/// Conversation thread tracking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadConfig {
    /// Inactivity (seconds) after which the active thread is closed.
    #[serde(default = "default_600")]
    pub timeout_secs: u64,
    /// Completed threads kept in history.
    #[serde(default = "default_20")]
    pub history_limit: usize,
    /// Characters of the first user input used as the topic.
    #[serde(default = "default_50")]
    pub topic_chars: usize,
    /// Entities listed in the rendered context.
    #[serde(default = "default_5")]
    pub context_entities: usize,
    /// Recent messages previewed in the rendered context.
    #[serde(default = "default_3")]
    pub context_messages: usize,
    /// Characters of each previewed message.
    #[serde(default = "default_60")]
    pub message_preview_chars: usize,
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 600,
            history_limit: 20,
            topic_chars: 50,
            context_entities: 5,
            context_messages: 3,
            message_preview_chars: 60,
        }
    }
}

/// Persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Pretty-print the episodic and semantic JSON files.
    #[serde(default = "default_true")]
    pub pretty: bool,
    /// Period of the background auto-save task.
    #[serde(default = "default_300")]
    pub auto_save_interval_seconds: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            pretty: true,
            auto_save_interval_seconds: 300,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_memory_dir() -> PathBuf { PathBuf::from("memory") }
fn default_cache_dir() -> PathBuf { PathBuf::from("cache") }
fn default_episodic_file() -> String { "episodic.json".to_string() }
fn default_semantic_file() -> String { "semantic.json".to_string() }
fn default_cache_file() -> String { "embedding_cache.json".to_string() }
fn default_3() -> usize { 3 }
fn default_5() -> usize { 5 }
fn default_10() -> usize { 10 }
fn default_20() -> usize { 20 }
fn default_50() -> usize { 50 }
fn default_60() -> usize { 60 }
fn default_80() -> usize { 80 }
fn default_300() -> u64 { 300 }
fn default_600() -> u64 { 600 }
fn default_1000() -> usize { 1000 }
fn default_10000() -> usize { 10_000 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = RecollectConfig::from_toml("").expect("parse");
        assert_eq!(config.memory.working_size, 10);
        assert_eq!(config.memory.max_episodic, 1000);
        assert_eq!(config.embedding_cache.max_size, 10_000);
        assert_eq!(config.threads.timeout_secs, 600);
        assert_eq!(config.threads.history_limit, 20);
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let config = RecollectConfig::from_toml(
            r#"
            [memory]
            data_dir = "/tmp/agent"
            max_episodic = 50

            [threads]
            timeout_secs = 30
            "#,
        )
        .expect("parse");
        assert_eq!(config.memory.max_episodic, 50);
        assert_eq!(config.memory.working_size, 10);
        assert_eq!(
            config.memory.episodic_path(),
            PathBuf::from("/tmp/agent/episodic.json")
        );
        assert_eq!(config.threads.timeout_secs, 30);
        assert_eq!(config.threads.topic_chars, 50);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = RecollectConfig::from_toml("[memory]\nmax_episodic = 0").expect_err("should be rejected");
        assert!(matches!(err, RecollectError::Config(_)));

        let err = RecollectConfig::from_toml("[embedding_cache]\nmax_size = 0").expect_err("should be rejected");
        assert!(matches!(err, RecollectError::Config(_)));
    }

    #[test]
    fn out_of_range_timeout_is_rejected() {
        for secs in ["9223372036854775807", "18446744073709551615", "10000000000000000"] {
            let toml = format!("[threads]\ntimeout_secs = {secs}");
            let err = RecollectConfig::from_toml(&toml).expect_err("should be rejected");
            assert!(matches!(err, RecollectError::Config(_)));
        }

        let config = RecollectConfig::from_toml("[threads]\ntimeout_secs = 31536000").expect("one year is fine");
        assert_eq!(config.threads.timeout_secs, 31_536_000);
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = RecollectConfig::from_toml("[memory\nmax_episodic = ").expect_err("should be rejected");
        assert!(matches!(err, RecollectError::Config(_)));
    }

    #[test]
    fn toml_roundtrip() {
        let config = RecollectConfig::default();
        let text = config.to_toml().expect("encode");
        let back = RecollectConfig::from_toml(&text).expect("decode");
        assert_eq!(back.memory.max_keywords, config.memory.max_keywords);
        assert_eq!(back.embedding_cache.file_name, "embedding_cache.json");
    }
}
