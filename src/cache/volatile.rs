//! In-memory, capacity-bounded cache with lazy expiry
//!
//! Entries live for the lifetime of the process. When the cache is full the
//! earliest-inserted entry is evicted (FIFO by insertion, not by access).

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::CacheEntry;
use crate::clock::Clock;

/// Default maximum number of entries
pub const DEFAULT_CAPACITY: usize = 100;

#[derive(Debug)]
struct Inner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    /// Keys in insertion order, oldest first
    order: VecDeque<String>,
}

impl<V> Inner<V> {
    fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        Some(entry)
    }
}

/// Process-lifetime cache keyed by string
///
/// All state sits behind a single mutex; callers share it through an `Arc`.
#[derive(Debug)]
pub struct VolatileCache<V> {
    inner: Mutex<Inner<V>>,
    capacity: usize,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> VolatileCache<V> {
    /// Creates an empty cache holding at most `capacity` entries
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
            clock,
        }
    }

    /// Stores `value` under `key` for `ttl`
    ///
    /// Overwriting a key moves it to the newest position. Inserting a new key
    /// while full drops expired entries first, then evicts the oldest one.
    pub fn set(&self, key: &str, value: V, ttl: Duration) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        if inner.remove(key).is_none() && inner.entries.len() >= self.capacity {
            let expired: Vec<String> = inner
                .entries
                .iter()
                .filter(|(_, entry)| !entry.is_live(now))
                .map(|(k, _)| k.clone())
                .collect();
            for k in &expired {
                inner.remove(k);
            }

            if inner.entries.len() >= self.capacity {
                if let Some(oldest) = inner.order.pop_front() {
                    inner.entries.remove(&oldest);
                    debug!(key = %oldest, "evicted oldest volatile entry");
                }
            }
        }

        inner
            .entries
            .insert(key.to_string(), CacheEntry::new(value, now, ttl));
        inner.order.push_back(key.to_string());
    }

    /// Returns the value for `key` if present and live
    ///
    /// An expired entry is removed on the way out.
    pub fn get(&self, key: &str) -> Option<V> {
        self.get_entry(key).map(|entry| entry.data)
    }

    /// Returns the full entry for `key` if present and live
    pub fn get_entry(&self, key: &str) -> Option<CacheEntry<V>> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        match inner.entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.clone()),
            Some(_) => {
                inner.remove(key);
                None
            }
            None => None,
        }
    }

    /// Same liveness check as [`get`](Self::get) without cloning the value
    pub fn has(&self, key: &str) -> bool {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        match inner.entries.get(key) {
            Some(entry) if entry.is_live(now) => true,
            Some(_) => {
                inner.remove(key);
                false
            }
            None => false,
        }
    }

    /// Removes a single entry
    pub fn remove(&self, key: &str) {
        self.inner.lock().remove(key);
    }

    /// Removes every entry
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    /// Number of stored entries, including expired ones not yet read
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
