//! Namespaced cache persisted across restarts
//!
//! Entries are serialized as JSON into a [`Storage`] under `{namespace}-{key}`.
//! The durable tier is best-effort: storage and (de)serialization failures are
//! logged and treated as misses, never returned to the caller.

use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{CacheEntry, Storage};
use crate::clock::Clock;

/// Result of a non-destructive read, including freshness metadata
#[derive(Debug, Clone)]
pub struct CachedData<T> {
    /// The cached data
    pub data: T,
    /// When the data was originally cached
    pub cached_at: chrono::DateTime<chrono::Utc>,
    /// When the entry expires (or expired)
    pub expires_at: chrono::DateTime<chrono::Utc>,
    /// Whether the cache entry has expired
    pub is_expired: bool,
}

/// TTL-expiring cache over a persistence medium
#[derive(Clone)]
pub struct DurableCache {
    storage: Arc<dyn Storage>,
    namespace: String,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for DurableCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableCache")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl DurableCache {
    pub fn new(
        storage: Arc<dyn Storage>,
        namespace: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            namespace: namespace.into(),
            clock,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}-{}", self.namespace, key)
    }

    fn prefix(&self) -> String {
        format!("{}-", self.namespace)
    }

    /// Writes `data` with the given TTL, swallowing any failure
    pub fn set<T: Serialize>(&self, key: &str, data: &T, ttl: Duration) {
        let entry = CacheEntry::new(data, self.clock.now(), ttl);
        let json = match serde_json::to_string(&entry) {
            Ok(json) => json,
            Err(e) => {
                warn!(key, error = %e, "durable cache could not serialize entry");
                return;
            }
        };

        if let Err(e) = self.storage.set_item(&self.storage_key(key), &json) {
            warn!(key, error = %e, "durable cache write failed");
        }
    }

    /// Returns the data for `key` if present and live
    ///
    /// An expired record is removed from storage before returning `None`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let cached = self.read::<T>(key)?;
        if cached.is_expired {
            debug!(key, "durable entry expired, removing");
            self.remove(key);
            return None;
        }
        Some(cached.data)
    }

    /// Reads `key` without regard to liveness and without removing anything
    ///
    /// Returns `Some(CachedData)` with `is_expired = true` for expired entries,
    /// which lets callers degrade to stale data. Corrupt records are removed.
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Option<CachedData<T>> {
        let storage_key = self.storage_key(key);
        let content = match self.storage.get_item(&storage_key) {
            Ok(content) => content?,
            Err(e) => {
                warn!(key, error = %e, "durable cache read failed");
                return None;
            }
        };

        let entry: CacheEntry<T> = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "durable cache record is corrupt, discarding");
                self.remove(key);
                return None;
            }
        };

        let is_expired = !entry.is_live(self.clock.now());
        Some(CachedData {
            data: entry.data,
            cached_at: entry.cached_at,
            expires_at: entry.expires_at,
            is_expired,
        })
    }

    /// Removes a single record
    pub fn remove(&self, key: &str) {
        if let Err(e) = self.storage.remove_item(&self.storage_key(key)) {
            warn!(key, error = %e, "durable cache remove failed");
        }
    }

    /// Removes every record in this namespace and nothing else
    pub fn clear(&self) {
        let prefix = self.prefix();
        for key in self.namespaced_keys() {
            if let Err(e) = self.storage.remove_item(&key) {
                warn!(key = %key, error = %e, "durable cache clear could not remove record");
            }
        }
        debug!(namespace = %self.namespace, prefix = %prefix, "durable cache cleared");
    }

    /// Removes expired and unreadable records in this namespace
    ///
    /// Returns the number of records removed. Note that this also discards the
    /// stale data the orchestrator would otherwise fall back to.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        for key in self.namespaced_keys() {
            let live = match self.storage.get_item(&key) {
                Ok(Some(content)) => {
                    serde_json::from_str::<CacheEntry<serde::de::IgnoredAny>>(&content)
                        .map(|entry| entry.is_live(now))
                        .unwrap_or(false)
                }
                Ok(None) => continue,
                Err(e) => {
                    warn!(key = %key, error = %e, "durable cache purge could not read record");
                    continue;
                }
            };
            if !live && self.storage.remove_item(&key).is_ok() {
                removed += 1;
            }
        }
        removed
    }

    fn namespaced_keys(&self) -> Vec<String> {
        let prefix = self.prefix();
        match self.storage.keys() {
            Ok(keys) => keys.into_iter().filter(|k| k.starts_with(&prefix)).collect(),
            Err(e) => {
                warn!(
                    namespace = %self.namespace,
                    error = %e,
                    "durable cache could not list records"
                );
                Vec::new()
            }
        }
    }
}
