//! Cache entry shared by both cache tiers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::clock::to_chrono;

/// Smallest TTL an entry may carry, so that `expires_at > cached_at` always holds
const MIN_TTL: Duration = Duration::from_millis(1);

/// A cached value with its creation and expiry timestamps
///
/// Each tier owns its own copy; write-through from the orchestrator clones the
/// value rather than sharing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// The cached data
    pub data: T,
    /// When the data was cached
    pub cached_at: DateTime<Utc>,
    /// When the cache entry expires
    pub expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    /// Creates an entry cached at `now` that lives for `ttl`
    pub fn new(data: T, now: DateTime<Utc>, ttl: Duration) -> Self {
        let ttl = to_chrono(ttl.max(MIN_TTL));
        let expires_at = now
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            data,
            cached_at: now,
            expires_at,
        }
    }

    /// An entry is live while `now < expires_at`
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Time left before expiry, zero once expired
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }
}
