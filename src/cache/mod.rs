//! Two-tier cache for API responses
//!
//! The volatile tier is a bounded in-memory map that lives as long as the
//! process. The durable tier persists JSON-serialized entries through a
//! [`Storage`] medium so they survive restarts, and can hand back expired
//! entries (flagged `is_expired`) for graceful degradation when APIs are
//! unavailable. Both tiers expire lazily on read; there is no background sweep.

mod durable;
mod entry;
mod storage;
mod volatile;

pub use durable::{CachedData, DurableCache};
pub use entry::CacheEntry;
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};
pub use volatile::{VolatileCache, DEFAULT_CAPACITY};
