//! Remote tier: S3 objects named by a hash of the cache key

use crate::config::S3Settings;
use crate::error::Result;
use crate::events::{CacheEvent, CacheEvents};
use crate::location::BucketLocation;
use crate::tier::{Tier, TierOp, TierStore};
use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{ClientOptions, Error as ObjectStoreError, ObjectStore, PutPayload, RetryConfig};
use std::fmt;
use std::sync::Arc;

/// Name of the remote object holding a cache key: lowercase hex MD5 of the
/// key. Any key maps to a valid object name, and the mapping is stable
/// across processes and releases.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectName(String);

impl ObjectName {
    pub fn from_key(key: &str) -> Self {
        Self(format!("{:x}", md5::compute(key.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Location of the object within the bucket
    pub fn path(&self) -> ObjectPath {
        ObjectPath::from(self.0.as_str())
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub struct RemoteTier {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    events: Arc<dyn CacheEvents>,
}

impl RemoteTier {
    /// Wrap a store already scoped to `bucket`
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        events: Arc<dyn CacheEvents>,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            events,
        }
    }

    /// Connect to the bucket named by `location` over S3.
    ///
    /// Static credentials from `settings` take precedence; without them the
    /// client uses web identity, container or instance credentials.
    pub fn from_location(
        location: &BucketLocation,
        settings: &S3Settings,
        events: Arc<dyn CacheEvents>,
    ) -> Result<Self> {
        let retry = RetryConfig {
            max_retries: settings.max_retries as usize,
            ..RetryConfig::default()
        };

        let mut builder = AmazonS3Builder::from_env()
            .with_region(location.region.as_str())
            .with_bucket_name(location.bucket.as_str())
            .with_retry(retry)
            .with_client_options(ClientOptions::new().with_timeout(settings.timeout));

        if let Some(endpoint) = &settings.endpoint {
            builder = builder
                .with_endpoint(endpoint.as_str())
                .with_allow_http(endpoint.starts_with("http://"));
        }

        if settings.anonymous {
            builder = builder.with_skip_signature(true);
        } else if let Some(credentials) = &settings.credentials {
            builder = builder
                .with_access_key_id(credentials.access_key_id.as_str())
                .with_secret_access_key(credentials.secret_access_key.as_str());
            if let Some(token) = &credentials.session_token {
                builder = builder.with_token(token.as_str());
            }
        }

        let store = builder.build()?;
        Ok(Self::new(Arc::new(store), location.bucket.clone(), events))
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn failed(&self, op: TierOp, key: &str, error: impl ToString) {
        self.events.record(CacheEvent::TierFailed {
            tier: Tier::Remote,
            op,
            key: key.to_string(),
            error: error.to_string(),
        });
    }
}

#[async_trait]
impl TierStore for RemoteTier {
    fn tier(&self) -> Tier {
        Tier::Remote
    }

    async fn get(&self, key: &str) -> Option<Bytes> {
        let path = ObjectName::from_key(key).path();
        let fetched = match self.store.get(&path).await {
            Ok(result) => result.bytes().await,
            Err(e) => Err(e),
        };
        match fetched {
            Ok(bytes) => Some(bytes),
            Err(ObjectStoreError::NotFound { .. }) => None,
            Err(e) => {
                self.failed(TierOp::Get, key, e);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: Bytes) {
        let path = ObjectName::from_key(key).path();
        if let Err(e) = self.store.put(&path, PutPayload::from(value)).await {
            self.failed(TierOp::Set, key, e);
        }
    }

    async fn delete(&self, key: &str) {
        let path = ObjectName::from_key(key).path();
        match self.store.delete(&path).await {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {}
            Err(e) => self.failed(TierOp::Delete, key, e),
        }
    }
}
