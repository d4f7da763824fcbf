//! File-based blob cache with a byte capacity and LRU eviction
//!
//! Stores binary blobs on disk, one file per key, with an in-memory index
//! tracking size and recency. The index is rebuilt from the directory on
//! startup so entries survive restarts.

mod cache;
mod error;
mod types;

pub use cache::BlobCache;
pub use error::{BlobCacheError, Result};
pub use types::{CacheEntry, CacheStats};
