//! Named resources and the remote calls behind them

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::RemoteError;
use crate::rate_limit::RateLimit;

/// An asynchronous operation that fetches one resource from a third-party API
///
/// Implementations perform the HTTP request and parse the body. Any
/// non-success condition is reported as a [`RemoteError`]; the orchestrator
/// treats the call as opaque otherwise.
#[async_trait]
pub trait RemoteCall: Send + Sync {
    /// Parsed payload type; cached as JSON in both tiers
    type Output: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;

    async fn call(&self) -> Result<Self::Output, RemoteError>;
}

/// Fixed per-resource policy
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceConfig {
    /// Resource name used in logs and errors (e.g., "news")
    pub name: String,
    /// Key under which both cache tiers store the payload
    pub cache_key: String,
    /// Key the rate limiter accounts requests against
    pub rate_limit_key: String,
    pub volatile_ttl: Duration,
    pub durable_ttl: Duration,
    pub rate_limit: RateLimit,
    /// Upper bound on a single remote call
    pub timeout: Duration,
    /// Share one in-flight remote call between concurrent callers
    pub coalesce: bool,
}

impl ResourceConfig {
    /// Creates a config whose cache key equals its name
    pub fn new(name: impl Into<String>, rate_limit_key: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            cache_key: name.clone(),
            name,
            rate_limit_key: rate_limit_key.into(),
            volatile_ttl: Duration::from_secs(5 * 60),
            durable_ttl: Duration::from_secs(60 * 60),
            rate_limit: RateLimit::per_minute(10),
            timeout: Duration::from_secs(10),
            coalesce: false,
        }
    }

    pub fn with_cache_key(mut self, cache_key: impl Into<String>) -> Self {
        self.cache_key = cache_key.into();
        self
    }

    pub fn with_ttls(mut self, volatile_ttl: Duration, durable_ttl: Duration) -> Self {
        self.volatile_ttl = volatile_ttl;
        self.durable_ttl = durable_ttl;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_coalescing(mut self, coalesce: bool) -> Self {
        self.coalesce = coalesce;
        self
    }
}

/// A resource: its policy plus the remote call that produces it
pub struct Resource<R> {
    config: ResourceConfig,
    remote: Arc<R>,
}

impl<R> Clone for Resource<R> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            remote: Arc::clone(&self.remote),
        }
    }
}

impl<R: RemoteCall> Resource<R> {
    pub fn new(config: ResourceConfig, remote: R) -> Self {
        Self {
            config,
            remote: Arc::new(remote),
        }
    }

    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }
}

/// Where a fetched payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    /// Live entry in the volatile cache
    Memory,
    /// Live entry in the durable cache
    Durable,
    /// Fresh result of a remote call
    Remote,
    /// Expired durable entry served because no fresher path was available
    Stale,
}

/// Payload returned by the orchestrator, with provenance
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub data: T,
    pub source: FetchSource,
    /// When the payload was obtained from the remote
    pub cached_at: DateTime<Utc>,
}

impl<T> Fetched<T> {
    /// Whether the data may be out of date and should be flagged to the user
    pub fn is_stale(&self) -> bool {
        self.source == FetchSource::Stale
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        Fetched {
            data: f(self.data),
            source: self.source,
            cached_at: self.cached_at,
        }
    }
}
