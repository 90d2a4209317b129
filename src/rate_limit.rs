//! Per-key request quota over a rolling time window
//!
//! The limiter remembers the instants of granted requests for each key and
//! only grants a new one while fewer than `max_requests` fall inside the
//! trailing window. Denied attempts are not recorded. State is in-memory only,
//! so a fresh process starts every key at zero usage.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::clock::{to_chrono, Clock};

/// Quota parameters for one rate-limit key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Maximum requests granted inside one window
    pub max_requests: u32,
    /// Length of the trailing window
    pub window: Duration,
}

impl RateLimit {
    pub const fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    /// `max_requests` per minute
    pub const fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }
}

/// Sliding-window request gate keyed by string
#[derive(Debug)]
pub struct RateLimiter {
    windows: Mutex<HashMap<String, VecDeque<DateTime<Utc>>>>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Grants one request for `key` if the quota allows it
    ///
    /// Returns `true` and records the request when fewer than `max_requests`
    /// were granted inside the trailing `window`; returns `false` otherwise
    /// without consuming anything. Never blocks.
    pub fn can_make_request(&self, key: &str, max_requests: u32, window: Duration) -> bool {
        let now = self.clock.now();
        let mut windows = self.windows.lock();
        let timestamps = windows.entry(key.to_string()).or_default();
        prune(timestamps, now, window);

        if timestamps.len() < max_requests as usize {
            timestamps.push_back(now);
            true
        } else {
            debug!(key, max_requests, "rate limit reached");
            false
        }
    }

    /// Convenience wrapper taking a [`RateLimit`]
    pub fn try_acquire(&self, key: &str, limit: RateLimit) -> bool {
        self.can_make_request(key, limit.max_requests, limit.window)
    }

    /// Requests still available for `key` in the current window, without consuming any
    pub fn remaining(&self, key: &str, max_requests: u32, window: Duration) -> u32 {
        let now = self.clock.now();
        let mut windows = self.windows.lock();
        let used = match windows.get_mut(key) {
            Some(timestamps) => {
                prune(timestamps, now, window);
                timestamps.len()
            }
            None => 0,
        };
        (max_requests as usize).saturating_sub(used) as u32
    }

    /// Forgets all recorded requests for `key`
    pub fn reset(&self, key: &str) {
        self.windows.lock().remove(key);
    }
}

/// Drops timestamps that fell out of the trailing window ending at `now`
fn prune(timestamps: &mut VecDeque<DateTime<Utc>>, now: DateTime<Utc>, window: Duration) {
    let window = to_chrono(window);
    while let Some(oldest) = timestamps.front() {
        if now.signed_duration_since(*oldest) >= window {
            timestamps.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const WINDOW: Duration = Duration::from_secs(60);

    fn create_test_limiter() -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        (RateLimiter::new(clock.clone()), clock)
    }

    #[test]
    fn test_sixth_call_in_window_is_denied() {
        let (limiter, _clock) = create_test_limiter();

        for i in 0..5 {
            assert!(
                limiter.can_make_request("guardian-api", 5, WINDOW),
                "call {} should be allowed",
                i + 1
            );
        }

        assert!(!limiter.can_make_request("guardian-api", 5, WINDOW));
    }

    #[test]
    fn test_denied_calls_do_not_consume_quota() {
        let (limiter, clock) = create_test_limiter();

        assert!(limiter.can_make_request("k", 1, WINDOW));
        clock.advance(Duration::from_secs(30));
        for _ in 0..10 {
            assert!(!limiter.can_make_request("k", 1, WINDOW));
        }

        // Only the first grant counts; it leaves the window at t+60s
        clock.advance(Duration::from_secs(30));
        assert!(limiter.can_make_request("k", 1, WINDOW));
    }

    #[test]
    fn test_window_slides() {
        let (limiter, clock) = create_test_limiter();

        assert!(limiter.can_make_request("k", 2, WINDOW));
        clock.advance(Duration::from_secs(40));
        assert!(limiter.can_make_request("k", 2, WINDOW));
        assert!(!limiter.can_make_request("k", 2, WINDOW));

        // First grant drops out, second is still inside
        clock.advance(Duration::from_secs(20));
        assert!(limiter.can_make_request("k", 2, WINDOW));
        assert!(!limiter.can_make_request("k", 2, WINDOW));
    }

    #[test]
    fn test_keys_are_independent() {
        let (limiter, _clock) = create_test_limiter();

        assert!(limiter.can_make_request("news", 1, WINDOW));
        assert!(!limiter.can_make_request("news", 1, WINDOW));
        assert!(limiter.can_make_request("market", 1, WINDOW));
    }

    #[test]
    fn test_grants_never_exceed_quota_in_any_window() {
        let (limiter, clock) = create_test_limiter();
        let mut granted = Vec::new();

        for step in 0..200u64 {
            if limiter.can_make_request("k", 4, WINDOW) {
                granted.push(clock.now());
            }
            clock.advance(Duration::from_secs(1 + step % 7));
        }

        for (i, start) in granted.iter().enumerate() {
            let in_window = granted[i..]
                .iter()
                .take_while(|t| t.signed_duration_since(*start) < to_chrono(WINDOW))
                .count();
            assert!(in_window <= 4);
        }
    }

    #[test]
    fn test_remaining_does_not_consume() {
        let (limiter, _clock) = create_test_limiter();

        assert_eq!(limiter.remaining("k", 3, WINDOW), 3);
        assert!(limiter.can_make_request("k", 3, WINDOW));
        assert_eq!(limiter.remaining("k", 3, WINDOW), 2);
        assert_eq!(limiter.remaining("k", 3, WINDOW), 2);
    }

    #[test]
    fn test_reset_clears_usage() {
        let (limiter, _clock) = create_test_limiter();

        assert!(limiter.try_acquire("k", RateLimit::per_minute(1)));
        assert!(!limiter.try_acquire("k", RateLimit::per_minute(1)));

        limiter.reset("k");

        assert!(limiter.try_acquire("k", RateLimit::per_minute(1)));
    }

    #[test]
    fn test_zero_quota_always_denies() {
        let (limiter, _clock) = create_test_limiter();

        assert!(!limiter.can_make_request("k", 0, WINDOW));
    }
}
