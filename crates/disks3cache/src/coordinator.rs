//! Tier coordinator: local-first reads with background repopulation, and
//! fire-and-forget writes and deletes to both tiers

use crate::config::CacheConfig;
use crate::dispatch::TaskDispatcher;
use crate::error::Result;
use crate::events::{CacheEvent, CacheEvents, TracingEvents};
use crate::local::LocalTier;
use crate::location::BucketLocation;
use crate::remote::RemoteTier;
use crate::tier::{Tier, TierOp, TierStore};
use bytes::Bytes;
use file_blob_cache::{BlobCache, CacheStats};
use std::sync::Arc;

/// Background work for one tier
enum Job {
    Set(Bytes),
    Delete,
}

impl Job {
    fn op(&self) -> TierOp {
        match self {
            Job::Set(_) => TierOp::Set,
            Job::Delete => TierOp::Delete,
        }
    }
}

pub struct TieredCache {
    local: Arc<dyn TierStore>,
    remote: Arc<dyn TierStore>,
    dispatcher: TaskDispatcher,
    events: Arc<dyn CacheEvents>,
    local_store: Option<Arc<BlobCache>>,
    location: Option<BucketLocation>,
}

impl TieredCache {
    /// Build a disk + S3 cache, logging through `tracing`
    pub async fn new(config: CacheConfig) -> Result<Self> {
        Self::with_events(config, Arc::new(TracingEvents)).await
    }

    /// Build a disk + S3 cache reporting to `events`.
    ///
    /// Fails if the bucket URL cannot be parsed, the local directory cannot be
    /// created or indexed, or the S3 client cannot be built.
    pub async fn with_events(config: CacheConfig, events: Arc<dyn CacheEvents>) -> Result<Self> {
        let location = BucketLocation::parse(&config.bucket_url)?;

        let local_dir = match config.local_dir {
            Some(dir) => dir,
            // Left in place on exit, like any other cache directory
            None => tempfile::Builder::new()
                .prefix("disks3cache")
                .tempdir()?
                .keep(),
        };

        let local = LocalTier::open(
            local_dir.clone(),
            config.local_capacity_bytes,
            Arc::clone(&events),
        )
        .await?;
        let remote = RemoteTier::from_location(&location, &config.s3, Arc::clone(&events))?;

        events.record(CacheEvent::Opened {
            local_dir,
            region: location.region.clone(),
            bucket: location.bucket.clone(),
        });

        let dispatcher = TaskDispatcher::new(
            config.max_outstanding_tasks,
            config.overflow,
            Arc::clone(&events),
        );
        let local_store = Arc::clone(local.store());

        let mut cache = Self::from_parts(Arc::new(local), Arc::new(remote), dispatcher, events)
            .with_local_store(local_store);
        cache.location = Some(location);
        Ok(cache)
    }

    /// Wire arbitrary tier implementations together
    pub fn from_parts(
        local: Arc<dyn TierStore>,
        remote: Arc<dyn TierStore>,
        dispatcher: TaskDispatcher,
        events: Arc<dyn CacheEvents>,
    ) -> Self {
        Self {
            local,
            remote,
            dispatcher,
            events,
            local_store: None,
            location: None,
        }
    }

    /// Report statistics from `store` through [`TieredCache::local_stats`]
    pub fn with_local_store(mut self, store: Arc<BlobCache>) -> Self {
        self.local_store = Some(store);
        self
    }

    /// Look up `key`, local tier first.
    ///
    /// A local hit returns without touching the remote tier. A remote hit is
    /// copied back to the local tier in the background.
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        if let Some(value) = self.local.get(key).await {
            self.events.record(CacheEvent::Hit {
                tier: Tier::Local,
                key: key.to_string(),
            });
            return Some(value);
        }

        let Some(value) = self.remote.get(key).await else {
            self.events.record(CacheEvent::Miss {
                key: key.to_string(),
            });
            return None;
        };

        self.events.record(CacheEvent::Hit {
            tier: Tier::Remote,
            key: key.to_string(),
        });
        self.dispatch(&self.local, key, Job::Set(value.clone())).await;
        Some(value)
    }

    /// Store `value` in both tiers in the background
    pub async fn set(&self, key: &str, value: impl Into<Bytes>) {
        let value = value.into();
        self.dispatch(&self.local, key, Job::Set(value.clone())).await;
        self.dispatch(&self.remote, key, Job::Set(value)).await;
    }

    /// Remove `key` from both tiers in the background
    pub async fn delete(&self, key: &str) {
        self.dispatch(&self.local, key, Job::Delete).await;
        self.dispatch(&self.remote, key, Job::Delete).await;
    }

    /// Wait for every background tier operation dispatched so far
    pub async fn flush(&self) {
        self.dispatcher.wait_idle().await;
    }

    pub fn outstanding_tasks(&self) -> usize {
        self.dispatcher.outstanding()
    }

    /// Local store statistics, when the cache knows its disk store
    pub async fn local_stats(&self) -> Option<CacheStats> {
        match &self.local_store {
            Some(store) => Some(store.stats().await),
            None => None,
        }
    }

    pub fn location(&self) -> Option<&BucketLocation> {
        self.location.as_ref()
    }

    async fn dispatch(&self, store: &Arc<dyn TierStore>, key: &str, job: Job) {
        let store = Arc::clone(store);
        let owned_key = key.to_string();

        self.dispatcher
            .spawn(store.tier(), job.op(), key, async move {
                match job {
                    Job::Set(value) => store.set(&owned_key, value).await,
                    Job::Delete => store.delete(&owned_key).await,
                }
            })
            .await;
    }
}
