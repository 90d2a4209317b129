//! Dashboard configuration
//!
//! Per-resource TTLs, quotas and timeouts are fixed at startup. They come from
//! built-in defaults, optionally overridden by a JSON file (`--config`, or
//! `config.json` in the platform config directory), then by CLI flags.

use directories::ProjectDirs;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::cache::DEFAULT_CAPACITY;
use crate::fetch::ResourceConfig;
use crate::rate_limit::RateLimit;

pub const NEWS: &str = "news";
pub const MARKET_TICKER: &str = "market-ticker";
pub const WEATHER: &str = "weather";
pub const TRANSLATION: &str = "translation";

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("could not read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON of the expected shape
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A value is out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Fixed policy for one resource
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSettings {
    pub volatile_ttl: Duration,
    pub durable_ttl: Duration,
    pub rate_limit: RateLimit,
    pub timeout: Duration,
    pub coalesce: bool,
}

const fn minutes(n: u64) -> Duration {
    Duration::from_secs(n * 60)
}

impl ResourceSettings {
    /// 15 min in memory, 60 min on disk, 10 calls per minute
    pub fn news() -> Self {
        Self {
            volatile_ttl: minutes(15),
            durable_ttl: minutes(60),
            rate_limit: RateLimit::per_minute(10),
            timeout: Duration::from_secs(10),
            coalesce: false,
        }
    }

    /// Short-lived quotes with a tight quota
    pub fn market() -> Self {
        Self {
            volatile_ttl: minutes(5),
            durable_ttl: minutes(30),
            rate_limit: RateLimit::per_minute(6),
            timeout: Duration::from_secs(8),
            coalesce: false,
        }
    }

    pub fn weather() -> Self {
        Self {
            volatile_ttl: minutes(10),
            durable_ttl: minutes(60),
            rate_limit: RateLimit::per_minute(10),
            timeout: Duration::from_secs(5),
            coalesce: false,
        }
    }

    /// Translations rarely change, so they are kept for a day
    pub fn translation() -> Self {
        Self {
            volatile_ttl: minutes(60),
            durable_ttl: minutes(24 * 60),
            rate_limit: RateLimit::per_minute(20),
            timeout: Duration::from_secs(5),
            coalesce: false,
        }
    }

    /// Builds the orchestrator-facing config for a named resource
    pub fn to_resource_config(&self, name: &str, rate_limit_key: &str) -> ResourceConfig {
        ResourceConfig::new(name, rate_limit_key)
            .with_ttls(self.volatile_ttl, self.durable_ttl)
            .with_rate_limit(self.rate_limit)
            .with_timeout(self.timeout)
            .with_coalescing(self.coalesce)
    }

    fn apply(&mut self, overrides: &ResourceOverrides) {
        if let Some(ms) = overrides.volatile_ttl_ms {
            self.volatile_ttl = Duration::from_millis(ms);
        }
        if let Some(ms) = overrides.durable_ttl_ms {
            self.durable_ttl = Duration::from_millis(ms);
        }
        if let Some(max) = overrides.max_requests {
            self.rate_limit.max_requests = max;
        }
        if let Some(ms) = overrides.window_ms {
            self.rate_limit.window = Duration::from_millis(ms);
        }
        if let Some(ms) = overrides.timeout_ms {
            self.timeout = Duration::from_millis(ms);
        }
        if let Some(coalesce) = overrides.coalesce {
            self.coalesce = coalesce;
        }
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.volatile_ttl.is_zero() || self.durable_ttl.is_zero() {
            return Err(ConfigError::Invalid(format!("{name}: TTLs must be positive")));
        }
        if self.rate_limit.window.is_zero() {
            return Err(ConfigError::Invalid(format!(
                "{name}: rate limit window must be positive"
            )));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid(format!("{name}: timeout must be positive")));
        }
        Ok(())
    }
}

/// Geographic location for the weather resource
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// Complete runtime configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    /// Maximum entries in the volatile cache
    pub volatile_capacity: usize,
    /// Namespace for durable cache records
    pub cache_namespace: String,
    /// Directory for durable cache files; `None` means the platform cache dir
    pub cache_dir: Option<PathBuf>,
    pub news: ResourceSettings,
    pub market: ResourceSettings,
    pub weather: ResourceSettings,
    pub translation: ResourceSettings,
    /// Symbols batched into one market-ticker fetch
    pub market_symbols: Vec<String>,
    pub location: Location,
    /// Section filter for news, e.g. "world"
    pub news_section: Option<String>,
    pub translation_target: String,
    pub guardian_api_key: Option<String>,
    pub finnhub_api_key: Option<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            volatile_capacity: DEFAULT_CAPACITY,
            cache_namespace: "briefing".to_string(),
            cache_dir: None,
            news: ResourceSettings::news(),
            market: ResourceSettings::market(),
            weather: ResourceSettings::weather(),
            translation: ResourceSettings::translation(),
            market_symbols: ["SPY", "QQQ", "DIA", "AAPL", "MSFT", "NVDA"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            location: Location {
                latitude: 40.7128,
                longitude: -74.0060,
            },
            news_section: None,
            translation_target: "es".to_string(),
            guardian_api_key: None,
            finnhub_api_key: None,
        }
    }
}

/// Optional overrides for a single resource, as written in the config file
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ResourceOverrides {
    volatile_ttl_ms: Option<u64>,
    durable_ttl_ms: Option<u64>,
    max_requests: Option<u32>,
    window_ms: Option<u64>,
    timeout_ms: Option<u64>,
    coalesce: Option<bool>,
}

/// On-disk configuration file shape; every field is optional
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    volatile_capacity: Option<usize>,
    cache_namespace: Option<String>,
    cache_dir: Option<PathBuf>,
    news: ResourceOverrides,
    market: ResourceOverrides,
    weather: ResourceOverrides,
    translation: ResourceOverrides,
    market_symbols: Option<Vec<String>>,
    location: Option<Location>,
    news_section: Option<String>,
    translation_target: Option<String>,
    guardian_api_key: Option<String>,
    finnhub_api_key: Option<String>,
}

impl DashboardConfig {
    /// Loads defaults plus an optional config file
    ///
    /// An explicit `path` must exist. Without one, `config.json` in the
    /// platform config directory is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let file = match path {
            Some(path) => Some(path.to_path_buf()),
            None => default_config_path().filter(|p| p.exists()),
        };
        if let Some(path) = file {
            config.apply_file(&path)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parses a JSON config document on top of the current values
    pub fn apply_json(&mut self, json: &str) -> Result<(), serde_json::Error> {
        let file: ConfigFile = serde_json::from_str(json)?;
        self.apply(file);
        Ok(())
    }

    fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.apply_json(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply(&mut self, file: ConfigFile) {
        if let Some(capacity) = file.volatile_capacity {
            self.volatile_capacity = capacity;
        }
        if let Some(namespace) = file.cache_namespace {
            self.cache_namespace = namespace;
        }
        if file.cache_dir.is_some() {
            self.cache_dir = file.cache_dir;
        }
        self.news.apply(&file.news);
        self.market.apply(&file.market);
        self.weather.apply(&file.weather);
        self.translation.apply(&file.translation);
        if let Some(symbols) = file.market_symbols {
            self.market_symbols = symbols;
        }
        if let Some(location) = file.location {
            self.location = location;
        }
        if file.news_section.is_some() {
            self.news_section = file.news_section;
        }
        if let Some(target) = file.translation_target {
            self.translation_target = target;
        }
        if file.guardian_api_key.is_some() {
            self.guardian_api_key = file.guardian_api_key;
        }
        if file.finnhub_api_key.is_some() {
            self.finnhub_api_key = file.finnhub_api_key;
        }
    }

    /// Checks ranges that would otherwise break cache or quota invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.volatile_capacity == 0 {
            return Err(ConfigError::Invalid(
                "volatile_capacity must be at least 1".to_string(),
            ));
        }
        if self.cache_namespace.is_empty() {
            return Err(ConfigError::Invalid("cache_namespace must not be empty".to_string()));
        }
        self.news.validate(NEWS)?;
        self.market.validate(MARKET_TICKER)?;
        self.weather.validate(WEATHER)?;
        self.translation.validate(TRANSLATION)?;
        Ok(())
    }
}

/// `config.json` in the platform config directory (`~/.config/briefing/` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "briefing").map(|dirs| dirs.config_dir().join("config.json"))
}
