//! Briefing library
//!
//! A resilient fetch pipeline for dashboard data: a volatile in-memory cache,
//! a durable on-disk cache, per-key rate limiting and an orchestrator that
//! degrades to stale data when the network or the quota fails.

pub mod cache;
pub mod cli;
pub mod clock;
pub mod config;
pub mod context;
pub mod data;
pub mod fetch;
pub mod logging;
pub mod rate_limit;
pub mod refresh;

pub use context::AppContext;
pub use fetch::{FetchError, FetchSource, Fetched, Orchestrator, Resource, ResourceConfig};
