//! Fetch orchestration across the cache tiers, the rate limiter and the network
//!
//! For every request the orchestrator walks the same ladder:
//!
//! 1. live volatile entry → return it
//! 2. live durable entry → promote it into the volatile tier and return it
//! 3. rate limiter denies → fall back to any durable entry, stale or not
//! 4. remote call (bounded by the resource timeout) → write through both tiers;
//!    on failure fall back to any durable entry
//!
//! Only when no durable entry exists does a [`FetchError`] reach the caller.

use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

use super::{FetchError, FetchSource, Fetched, RemoteCall, RemoteError, Resource, ResourceConfig};
use crate::cache::{DurableCache, VolatileCache};
use crate::clock::Clock;
use crate::rate_limit::RateLimiter;

type RemoteFuture = BoxFuture<'static, Result<Value, FetchError>>;

/// The shared state a remote fetch reads and writes
#[derive(Clone)]
struct Tiers {
    volatile: Arc<VolatileCache<Value>>,
    durable: DurableCache,
    limiter: Arc<RateLimiter>,
}

/// Remote calls currently in flight, by cache key
///
/// Entries are weak: a call is dropped once no caller is waiting on it.
#[derive(Default)]
struct InFlight {
    next_id: u64,
    calls: HashMap<String, (u64, WeakShared<RemoteFuture>)>,
}

/// Removes its registry entry when the call completes or is dropped
struct InFlightGuard {
    registry: Weak<Mutex<InFlight>>,
    key: String,
    id: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut registry = registry.lock();
        // A newer call may already own the key
        if registry.calls.get(&self.key).is_some_and(|(id, _)| *id == self.id) {
            registry.calls.remove(&self.key);
        }
    }
}

/// Serves resources from cache, network or stale fallback
///
/// Cheap to clone; clones share the same caches, limiter and in-flight registry.
#[derive(Clone)]
pub struct Orchestrator {
    tiers: Tiers,
    clock: Arc<dyn Clock>,
    in_flight: Arc<Mutex<InFlight>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("volatile_entries", &self.tiers.volatile.len())
            .field("durable", &self.tiers.durable)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(
        volatile: Arc<VolatileCache<Value>>,
        durable: DurableCache,
        limiter: Arc<RateLimiter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tiers: Tiers {
                volatile,
                durable,
                limiter,
            },
            clock,
            in_flight: Arc::new(Mutex::new(InFlight::default())),
        }
    }

    /// Fetches `resource`, preferring cached data and degrading to stale data
    ///
    /// Never panics on remote or storage failure: every path resolves to data
    /// or a typed error.
    pub async fn fetch<R>(&self, resource: &Resource<R>) -> Result<Fetched<R::Output>, FetchError>
    where
        R: RemoteCall + 'static,
    {
        let config = resource.config();

        if let Some(hit) = self.volatile_hit::<R::Output>(config) {
            return Ok(hit);
        }
        if let Some(hit) = self.durable_hit::<R::Output>(config) {
            return Ok(hit);
        }

        let result = if config.coalesce {
            self.fetch_coalesced(resource).await
        } else {
            self.tiers.fetch_remote(resource).await
        };

        match result {
            Ok(data) => Ok(Fetched {
                data,
                source: FetchSource::Remote,
                cached_at: self.clock.now(),
            }),
            Err(err) => self.stale_fallback(config, err),
        }
    }

    fn volatile_hit<T: DeserializeOwned>(&self, config: &ResourceConfig) -> Option<Fetched<T>> {
        let entry = self.tiers.volatile.get_entry(&config.cache_key)?;
        match serde_json::from_value(entry.data) {
            Ok(data) => {
                debug!(resource = %config.name, "volatile cache hit");
                Some(Fetched {
                    data,
                    source: FetchSource::Memory,
                    cached_at: entry.cached_at,
                })
            }
            Err(e) => {
                warn!(
                    resource = %config.name,
                    error = %e,
                    "volatile entry has unexpected shape, dropping"
                );
                self.tiers.volatile.remove(&config.cache_key);
                None
            }
        }
    }

    fn durable_hit<T: DeserializeOwned + Serialize>(
        &self,
        config: &ResourceConfig,
    ) -> Option<Fetched<T>> {
        let cached = self.tiers.durable.read::<T>(&config.cache_key)?;
        if cached.is_expired {
            debug!(resource = %config.name, "durable entry expired");
            return None;
        }

        // Promote, but never past the durable entry's own expiry
        let remaining = (cached.expires_at - self.clock.now())
            .to_std()
            .unwrap_or_default();
        let promotion_ttl = config.volatile_ttl.min(remaining);
        match serde_json::to_value(&cached.data) {
            Ok(value) => self
                .tiers
                .volatile
                .set(&config.cache_key, value, promotion_ttl),
            Err(e) => warn!(resource = %config.name, error = %e, "could not promote durable entry"),
        }

        debug!(resource = %config.name, ttl = ?promotion_ttl, "durable cache hit, promoted");
        Some(Fetched {
            data: cached.data,
            source: FetchSource::Durable,
            cached_at: cached.cached_at,
        })
    }

    /// Joins an in-flight call for the same cache key, or starts one
    ///
    /// Only the caller that starts the call consults the rate limiter. The
    /// call runs as long as at least one caller is still waiting on it.
    async fn fetch_coalesced<R>(&self, resource: &Resource<R>) -> Result<R::Output, FetchError>
    where
        R: RemoteCall + 'static,
    {
        let config = resource.config();
        let key = config.cache_key.clone();

        let shared = {
            let mut in_flight = self.in_flight.lock();
            let existing = in_flight
                .calls
                .get(&key)
                .and_then(|(_, call)| call.upgrade());
            match existing {
                Some(call) => {
                    debug!(resource = %config.name, "joining in-flight request");
                    call
                }
                None => {
                    in_flight.next_id += 1;
                    let id = in_flight.next_id;
                    let guard = InFlightGuard {
                        registry: Arc::downgrade(&self.in_flight),
                        key: key.clone(),
                        id,
                    };
                    let call = remote_value(self.tiers.clone(), resource.clone(), guard)
                        .boxed()
                        .shared();
                    if let Some(weak) = call.downgrade() {
                        in_flight.calls.insert(key, (id, weak));
                    }
                    call
                }
            }
        };

        let value = shared.await?;
        serde_json::from_value(value).map_err(|e| FetchError::MalformedResponse {
            resource: config.name.clone(),
            reason: e.to_string(),
        })
    }

    /// Serves any durable entry, ignoring liveness, or surfaces `err`
    fn stale_fallback<T: DeserializeOwned>(
        &self,
        config: &ResourceConfig,
        err: FetchError,
    ) -> Result<Fetched<T>, FetchError> {
        match self.tiers.durable.read::<T>(&config.cache_key) {
            Some(cached) => {
                warn!(resource = %config.name, error = %err, "serving cached data after failure");
                Ok(Fetched {
                    data: cached.data,
                    source: if cached.is_expired {
                        FetchSource::Stale
                    } else {
                        FetchSource::Durable
                    },
                    cached_at: cached.cached_at,
                })
            }
            None => Err(err),
        }
    }

    /// Number of distinct keys with a remote call currently in flight
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().calls.len()
    }

    /// Drops both cache tiers' data (the user's "clear cache" action)
    pub fn clear_caches(&self) {
        self.tiers.volatile.clear();
        self.tiers.durable.clear();
    }

    pub fn volatile(&self) -> &VolatileCache<Value> {
        &self.tiers.volatile
    }

    pub fn durable(&self) -> &DurableCache {
        &self.tiers.durable
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.tiers.limiter
    }
}

impl Tiers {
    /// Quota check, remote call and write-through
    async fn fetch_remote<R>(&self, resource: &Resource<R>) -> Result<R::Output, FetchError>
    where
        R: RemoteCall,
    {
        let config = resource.config();

        if !self.limiter.try_acquire(&config.rate_limit_key, config.rate_limit) {
            warn!(resource = %config.name, key = %config.rate_limit_key, "quota exhausted");
            return Err(FetchError::QuotaExceeded {
                resource: config.name.clone(),
            });
        }

        info!(resource = %config.name, timeout = ?config.timeout, "calling remote");
        let data = match tokio::time::timeout(config.timeout, resource.remote().call()).await {
            Ok(Ok(data)) => data,
            Ok(Err(e)) => return Err(FetchError::from_remote(&config.name, e)),
            Err(_) => {
                return Err(FetchError::from_remote(
                    &config.name,
                    RemoteError::Timeout(config.timeout),
                ))
            }
        };

        self.write_through(config, &data);
        Ok(data)
    }

    fn write_through<T: Serialize>(&self, config: &ResourceConfig, data: &T) {
        match serde_json::to_value(data) {
            Ok(value) => self
                .volatile
                .set(&config.cache_key, value, config.volatile_ttl),
            Err(e) => {
                warn!(resource = %config.name, error = %e, "could not cache payload in memory")
            }
        }
        self.durable.set(&config.cache_key, data, config.durable_ttl);
    }
}

/// The shareable body of a coalesced call
///
/// Owns the tiers and a guard, never the orchestrator or its registry.
async fn remote_value<R>(
    tiers: Tiers,
    resource: Resource<R>,
    _guard: InFlightGuard,
) -> Result<Value, FetchError>
where
    R: RemoteCall + 'static,
{
    let data = tiers.fetch_remote(&resource).await?;
    serde_json::to_value(&data).map_err(|e| FetchError::MalformedResponse {
        resource: resource.name().to_string(),
        reason: e.to_string(),
    })
}
