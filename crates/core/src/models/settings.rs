use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::CoreError;

use super::price::DEFAULT_CACHE_TTL_MINUTES;

/// Runtime configuration for the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding the portfolio, backup and cache files.
    pub data_dir: PathBuf,

    pub portfolio_file: String,
    pub backup_file: String,
    pub cache_file: String,

    /// How long a fetched price stays fresh.
    pub cache_ttl_minutes: i64,

    /// Maximum concurrent outbound price lookups.
    pub max_workers: usize,

    /// Per-lookup timeout. A timed-out lookup counts as a failed one.
    pub fetch_timeout_secs: u64,

    /// Trailing window requested from the provider (Yahoo range syntax).
    pub history_range: String,

    /// Optional API keys for providers that require them.
    /// Keys: provider name (e.g., "alphavantage").
    pub api_keys: HashMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            portfolio_file: "portfolios.json".to_string(),
            backup_file: "portfolios_backup.json".to_string(),
            cache_file: "price_cache.json".to_string(),
            cache_ttl_minutes: DEFAULT_CACHE_TTL_MINUTES,
            max_workers: 5,
            fetch_timeout_secs: 10,
            history_range: "5d".to_string(),
            api_keys: HashMap::new(),
        }
    }
}

impl Settings {
    /// Defaults overlaid with `STOCK_TRACKER_*` environment variables.
    /// Values that fail to parse keep their default.
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Ok(dir) = std::env::var("STOCK_TRACKER_DATA_DIR") {
            settings.data_dir = PathBuf::from(dir);
        }
        if let Some(ttl) = env_parse("STOCK_TRACKER_CACHE_TTL_MINUTES") {
            settings.cache_ttl_minutes = ttl;
        }
        if let Some(workers) = env_parse("STOCK_TRACKER_MAX_WORKERS") {
            settings.max_workers = workers;
        }
        if let Some(timeout) = env_parse("STOCK_TRACKER_FETCH_TIMEOUT_SECS") {
            settings.fetch_timeout_secs = timeout;
        }
        if let Ok(key) = std::env::var("ALPHAVANTAGE_API_KEY") {
            settings.api_keys.insert("alphavantage".to_string(), key);
        }

        settings
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.max_workers == 0 {
            return Err(CoreError::ValidationError(
                "max_workers must be at least 1".into(),
            ));
        }
        if self.cache_ttl_minutes <= 0 {
            return Err(CoreError::ValidationError(
                "cache_ttl_minutes must be positive".into(),
            ));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(CoreError::ValidationError(
                "fetch_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn portfolio_path(&self) -> PathBuf {
        self.data_dir.join(&self.portfolio_file)
    }

    pub fn backup_path(&self) -> PathBuf {
        self.data_dir.join(&self.backup_file)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join(&self.cache_file)
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.cache_ttl_minutes)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
