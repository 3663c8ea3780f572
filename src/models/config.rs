//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::RecordKind;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP and upstream settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Per-kind stopping thresholds
    #[serde(default)]
    pub sync: SyncConfig,

    /// Where snapshots and the database live
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration, or the defaults if the file does not exist.
    ///
    /// A file that exists but cannot be read or parsed is an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::warn!("Config file {:?} not found. Using defaults.", path);
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::config("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::config("crawler.timeout_secs must be > 0"));
        }
        url::Url::parse(&self.crawler.base_url)
            .map_err(|e| AppError::config(format!("crawler.base_url is invalid: {e}")))?;
        for kind in RecordKind::ALL {
            if self.sync.max_consecutive_failures(kind) == 0 {
                return Err(AppError::config(format!(
                    "sync.{}.max_consecutive_failures must be > 0",
                    kind.endpoint()
                )));
            }
        }
        self.logging
            .level
            .parse::<log::LevelFilter>()
            .map_err(|_| AppError::config(format!("logging.level '{}' is not a log level", self.logging.level)))?;
        if self.cache.max_capacity == 0 {
            return Err(AppError::config("cache.max_capacity must be > 0"));
        }
        Ok(())
    }

    /// Resolve relative paths against `base`.
    pub fn snapshot_dir(&self, base: &Path) -> PathBuf {
        base.join(&self.paths.snapshot_dir)
    }

    pub fn database_path(&self, base: &Path) -> PathBuf {
        base.join(&self.paths.database)
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Root of the BASE REST API
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Delay between sequential fetches in milliseconds
    #[serde(default)]
    pub request_delay_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            base_url: defaults::base_url(),
            request_delay_ms: 0,
        }
    }
}

/// Consecutive-failure thresholds, calibrated per kind.
///
/// Entity ids are dense upstream, contract ids have gaps of thousands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "defaults::entity_failures")]
    pub entity_max_failures: u32,

    #[serde(default = "defaults::contract_failures")]
    pub contract_max_failures: u32,

    #[serde(default = "defaults::tender_failures")]
    pub tender_max_failures: u32,

    /// How far below the cursor an `--offset` run starts by default
    #[serde(default = "defaults::resume_offset")]
    pub resume_offset: i64,
}

impl SyncConfig {
    pub fn max_consecutive_failures(&self, kind: RecordKind) -> u32 {
        match kind {
            RecordKind::Entity => self.entity_max_failures,
            RecordKind::Contract => self.contract_max_failures,
            RecordKind::Tender => self.tender_max_failures,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            entity_max_failures: defaults::entity_failures(),
            contract_max_failures: defaults::contract_failures(),
            tender_max_failures: defaults::tender_failures(),
            resume_offset: defaults::resume_offset(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "defaults::snapshot_dir")]
    pub snapshot_dir: String,

    #[serde(default = "defaults::database")]
    pub database: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: defaults::snapshot_dir(),
            database: defaults::database(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached values
    #[serde(default = "defaults::cache_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: defaults::cache_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; base-crawler/0.1)".into()
    }
    pub fn timeout() -> u64 {
        10
    }
    pub fn base_url() -> String {
        "http://www.base.gov.pt/base2/rest/".into()
    }

    pub fn entity_failures() -> u32 {
        20
    }
    pub fn contract_failures() -> u32 {
        2000
    }
    pub fn tender_failures() -> u32 {
        200
    }
    pub fn resume_offset() -> i64 {
        2000
    }

    pub fn snapshot_dir() -> String {
        "data/snapshots".into()
    }
    pub fn database() -> String {
        "data/base.sqlite3".into()
    }

    pub fn cache_capacity() -> u64 {
        100_000
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
