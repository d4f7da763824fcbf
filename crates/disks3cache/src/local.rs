//! Local tier: the capacity-bounded disk store, keyed by raw cache key

use crate::error::Result;
use crate::events::{CacheEvent, CacheEvents};
use crate::tier::{Tier, TierOp, TierStore};
use async_trait::async_trait;
use bytes::Bytes;
use file_blob_cache::{BlobCache, CacheStats};
use std::path::PathBuf;
use std::sync::Arc;

pub struct LocalTier {
    store: Arc<BlobCache>,
    events: Arc<dyn CacheEvents>,
}

impl LocalTier {
    pub fn new(store: Arc<BlobCache>, events: Arc<dyn CacheEvents>) -> Self {
        Self { store, events }
    }

    /// Open (or create) a disk store at `dir` bounded to `capacity_bytes`
    pub async fn open(
        dir: PathBuf,
        capacity_bytes: u64,
        events: Arc<dyn CacheEvents>,
    ) -> Result<Self> {
        let store = BlobCache::new(dir, capacity_bytes);
        store.init().await?;
        Ok(Self::new(Arc::new(store), events))
    }

    pub fn store(&self) -> &Arc<BlobCache> {
        &self.store
    }

    pub async fn stats(&self) -> CacheStats {
        self.store.stats().await
    }

    fn failed(&self, op: TierOp, key: &str, error: impl ToString) {
        self.events.record(CacheEvent::TierFailed {
            tier: Tier::Local,
            op,
            key: key.to_string(),
            error: error.to_string(),
        });
    }
}

#[async_trait]
impl TierStore for LocalTier {
    fn tier(&self) -> Tier {
        Tier::Local
    }

    async fn get(&self, key: &str) -> Option<Bytes> {
        self.store.get(key).await
    }

    async fn set(&self, key: &str, value: Bytes) {
        if let Err(e) = self.store.put(key, &value).await {
            self.failed(TierOp::Set, key, e);
        }
    }

    async fn delete(&self, key: &str) {
        if let Err(e) = self.store.remove(key).await {
            self.failed(TierOp::Delete, key, e);
        }
    }
}
