//! Partial-failure tolerant batches of independent sub-calls
//!
//! A resource such as the market ticker bundles several logical items into a
//! single orchestrated fetch. Each item is fetched independently; an item that
//! fails becomes a placeholder instead of failing the whole batch.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use tracing::warn;

use super::RemoteError;

/// Outcome of one item in a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchItem<T> {
    /// The sub-call succeeded
    Ready { value: T },
    /// The sub-call failed; `reason` says why
    Placeholder { key: String, reason: String },
}

impl<T> BatchItem<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            BatchItem::Ready { value } => Some(value),
            BatchItem::Placeholder { .. } => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, BatchItem::Placeholder { .. })
    }
}

/// Runs `call` for every key concurrently, keeping input order
///
/// Individual failures become [`BatchItem::Placeholder`]s. If every sub-call
/// fails the batch fails with the first error, so the caller can fall back
/// to older data instead of caching a batch of placeholders.
pub async fn join_batch<K, T, F, Fut>(keys: &[K], call: F) -> Result<Vec<BatchItem<T>>, RemoteError>
where
    K: Display,
    F: Fn(&K) -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    let results = join_all(keys.iter().map(|key| call(key))).await;

    if results.iter().all(Result::is_err) {
        return match results.into_iter().next() {
            Some(Err(first)) => Err(first),
            _ => Ok(Vec::new()),
        };
    }

    Ok(keys
        .iter()
        .zip(results)
        .map(|(key, result)| match result {
            Ok(value) => BatchItem::Ready { value },
            Err(e) => {
                warn!(item = %key, error = %e, "batch item failed, using placeholder");
                BatchItem::Placeholder {
                    key: key.to_string(),
                    reason: e.to_string(),
                }
            }
        })
        .collect())
}
