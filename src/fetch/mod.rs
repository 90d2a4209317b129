//! Resilient fetch pipeline
//!
//! Consumers only ever call [`Orchestrator::fetch`] with a [`Resource`]; the
//! cache tiers and the rate limiter stay behind it.

pub mod batch;
mod error;
mod orchestrator;
mod resource;

pub use batch::{join_batch, BatchItem};
pub use error::{FetchError, RemoteError};
pub use orchestrator::Orchestrator;
pub use resource::{FetchSource, Fetched, RemoteCall, Resource, ResourceConfig};
