//! Configuration for the indexer and search front end.
//!
//! Loaded from a TOML file; every section except `[store]` may be omitted.

use crate::utils::errors::{IndexerError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub indexer: IndexerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the key-value store, without trailing slash
    pub url: String,

    /// Access credential (sent as `x-apikey`)
    pub api_key: String,

    /// Tenant identifier (sent as `x-idkey`)
    pub tenant: String,

    /// Outbound proxy for all store traffic
    #[serde(default)]
    pub proxy: Option<String>,
}

/// Where backup-set manifests come from. Exactly one of `url` / `dir`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Host whose backup sets are indexed; defaults to this machine's hostname
    #[serde(default)]
    pub host: Option<String>,

    /// Number of index workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default)]
    pub databases: DatabaseNames,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseNames {
    #[serde(default = "default_file_index")]
    pub file_index: String,

    #[serde(default = "default_checksum_index")]
    pub checksum_index: String,

    #[serde(default = "default_progress_log")]
    pub progress_log: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts for idempotent reads (1 = no retry)
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    /// First backoff delay; doubles per attempt
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_workers() -> usize {
    4
}

fn default_file_index() -> String {
    "absfilename_checksums".to_string()
}

fn default_checksum_index() -> String {
    "checksum_backupset".to_string()
}

fn default_progress_log() -> String {
    "backupsets_log".to_string()
}

fn default_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    200
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            host: None,
            workers: default_workers(),
            databases: DatabaseNames::default(),
        }
    }
}

impl Default for DatabaseNames {
    fn default() -> Self {
        Self {
            file_index: default_file_index(),
            checksum_index: default_checksum_index(),
            progress_log: default_progress_log(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            base_delay_ms: default_base_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl IndexerConfig {
    /// Configured host, else the local hostname.
    pub fn host(&self) -> String {
        self.host.clone().unwrap_or_else(|| {
            hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "localhost".to_string())
        })
    }
}

impl Config {
    /// `~/.config/dedup-indexer/config.toml`
    pub fn default_path() -> PathBuf {
        let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_default();
        home.join(".config").join("dedup-indexer").join("config.toml")
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            IndexerError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| IndexerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.store.url.is_empty() {
            return Err(IndexerError::Config("store.url must not be empty".into()));
        }
        if self.indexer.workers == 0 {
            return Err(IndexerError::Config("indexer.workers must be at least 1".into()));
        }
        if self.source.url.is_some() && self.source.dir.is_some() {
            return Err(IndexerError::Config(
                "set only one of source.url and source.dir".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml(
            r#"
            [store]
            url = "http://localhost:8080"
            api_key = "secret"
            tenant = "acme"
            "#,
        )
        .unwrap();

        assert_eq!(config.indexer.workers, 4);
        assert_eq!(config.indexer.databases, DatabaseNames::default());
        assert_eq!(config.retry.attempts, 3);
        assert_eq!(config.log.level, "info");
        assert!(config.store.proxy.is_none());
    }

    #[test]
    fn test_rejects_zero_workers_and_two_sources() {
        let base = r#"
            [store]
            url = "http://localhost:8080"
            api_key = "secret"
            tenant = "acme"
        "#;
        let zero = format!("{base}\n[indexer]\nworkers = 0\n");
        assert!(matches!(Config::from_toml(&zero), Err(IndexerError::Config(_))));

        let both = format!("{base}\n[source]\nurl = \"http://x\"\ndir = \"/tmp\"\n");
        assert!(matches!(Config::from_toml(&both), Err(IndexerError::Config(_))));
    }

    #[test]
    fn test_missing_store_section_fails() {
        assert!(Config::from_toml("[log]\nlevel = \"debug\"\n").is_err());
    }
}
