//! Application context
//!
//! Owns the process-wide volatile cache, durable cache, rate limiter and clock,
//! and builds the statically configured resources on top of them. Components
//! receive shared handles from here instead of reaching for global state.

use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::{DurableCache, FileStorage, MemoryStorage, Storage, VolatileCache};
use crate::clock::{Clock, SystemClock};
use crate::config::{DashboardConfig, Location, MARKET_TICKER, NEWS, TRANSLATION, WEATHER};
use crate::data::{
    http_client, MarketClient, NewsClient, TickerRemote, TranslationClient, WeatherClient,
};
use crate::fetch::{Orchestrator, Resource};
use crate::rate_limit::RateLimiter;

/// Rate-limit key for the Guardian API
pub const GUARDIAN_RATE_KEY: &str = "guardian-api";
/// Rate-limit key for the Finnhub API
pub const FINNHUB_RATE_KEY: &str = "finnhub-api";
/// Rate-limit key for the Open-Meteo API
pub const OPEN_METEO_RATE_KEY: &str = "open-meteo-api";
/// Rate-limit key for the MyMemory API
pub const MYMEMORY_RATE_KEY: &str = "mymemory-api";

/// Long-lived owner of the fetch pipeline
#[derive(Debug, Clone)]
pub struct AppContext {
    config: DashboardConfig,
    orchestrator: Orchestrator,
    http: Client,
}

impl AppContext {
    /// Creates a context on the system clock with file-backed durable storage
    ///
    /// Falls back to in-memory storage when no cache directory can be determined.
    pub fn new(config: DashboardConfig) -> Self {
        let storage: Arc<dyn Storage> = match config.cache_dir.clone() {
            Some(dir) => Arc::new(FileStorage::with_dir(dir)),
            None => match FileStorage::new() {
                Some(storage) => Arc::new(storage),
                None => {
                    warn!("no cache directory available, durable cache will not persist");
                    Arc::new(MemoryStorage::new())
                }
            },
        };
        Self::with_parts(config, storage, Arc::new(SystemClock))
    }

    /// Creates a context from explicit parts (for testing)
    pub fn with_parts(
        config: DashboardConfig,
        storage: Arc<dyn Storage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let volatile = Arc::new(VolatileCache::new(config.volatile_capacity, clock.clone()));
        let durable = DurableCache::new(storage, config.cache_namespace.clone(), clock.clone());
        let limiter = Arc::new(RateLimiter::new(clock.clone()));
        debug!(
            capacity = config.volatile_capacity,
            namespace = %config.cache_namespace,
            "fetch pipeline ready"
        );

        Self {
            orchestrator: Orchestrator::new(volatile, durable, limiter, clock),
            config,
            http: http_client(),
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Latest headlines
    pub fn news_resource(&self) -> Resource<NewsClient> {
        let mut config = self.config.news.to_resource_config(NEWS, GUARDIAN_RATE_KEY);
        if let Some(section) = &self.config.news_section {
            config = config.with_cache_key(format!("{NEWS}-{section}"));
        }
        let client = NewsClient::new(self.http.clone(), self.config.guardian_api_key.clone())
            .with_section(self.config.news_section.clone());
        Resource::new(config, client)
    }

    /// Ticker for the configured symbols, or an ad-hoc symbol list
    pub fn market_resource(&self, symbols: Option<Vec<String>>) -> Resource<TickerRemote> {
        let mut config = self.config.market.to_resource_config(MARKET_TICKER, FINNHUB_RATE_KEY);
        let symbols = match symbols {
            Some(symbols) if symbols != self.config.market_symbols => {
                config = config.with_cache_key(format!("{MARKET_TICKER}-{}", symbols.join("_")));
                symbols
            }
            _ => self.config.market_symbols.clone(),
        };
        let client = MarketClient::new(self.http.clone(), self.config.finnhub_api_key.clone());
        Resource::new(config, TickerRemote::new(client, symbols))
    }

    /// Current weather at the configured location, or at `location`
    pub fn weather_resource(&self, location: Option<Location>) -> Resource<WeatherClient> {
        let location = location.unwrap_or(self.config.location);
        let config = self
            .config
            .weather
            .to_resource_config(WEATHER, OPEN_METEO_RATE_KEY)
            .with_cache_key(format!(
                "{WEATHER}-{:.2}_{:.2}",
                location.latitude, location.longitude
            ));
        Resource::new(config, WeatherClient::new(self.http.clone(), location))
    }

    /// Translation of `text` into `target` (or the configured default language)
    pub fn translation_resource(
        &self,
        text: &str,
        target: Option<&str>,
    ) -> Resource<TranslationClient> {
        let target = target.unwrap_or(&self.config.translation_target);
        let client = TranslationClient::new(self.http.clone(), text, target);
        let config = self
            .config
            .translation
            .to_resource_config(TRANSLATION, MYMEMORY_RATE_KEY)
            .with_cache_key(client.cache_key());
        Resource::new(config, client)
    }

    /// The user's "clear cache" action
    pub fn clear_caches(&self) {
        self.orchestrator.clear_caches();
    }

    /// Removes expired durable records; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        self.orchestrator.durable().purge_expired()
    }
}
