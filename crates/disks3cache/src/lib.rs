//! Two-tier blob cache
//!
//! A read-through, write-through cache for opaque byte blobs addressed by an
//! opaque string key. A capacity-bounded local disk store sits in front of a
//! durable S3 bucket:
//!
//! - `get` checks local disk first, then S3; an S3 hit is copied back to
//!   local disk in the background.
//! - `set` and `delete` are dispatched to both tiers in the background and
//!   return without waiting.
//!
//! The cache is best-effort. Tier failures never reach the caller; they are
//! reported to the [`CacheEvents`] sink supplied at construction.
//!
//! # Example
//!
//! ```no_run
//! use disks3cache::{CacheConfig, TieredCache};
//!
//! # async fn example() -> disks3cache::Result<()> {
//! let config = CacheConfig::new(None, 512 * 1024 * 1024, "https://s3-us-west-2.amazonaws.com/my-bucket");
//! let cache = TieredCache::new(config).await?;
//!
//! cache.set("http://example.com/", b"HTTP/1.1 200 OK\r\n\r\n".to_vec()).await;
//! if let Some(body) = cache.get("http://example.com/").await {
//!     println!("{} bytes", body.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coordinator;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod local;
pub mod location;
pub mod remote;
pub mod tier;

pub use config::{CacheConfig, S3Settings};
pub use coordinator::TieredCache;
pub use credentials::Credentials;
pub use dispatch::{OverflowPolicy, TaskDispatcher};
pub use error::{CacheError, Result};
pub use events::{CacheEvent, CacheEvents, RecordingEvents, TracingEvents};
pub use local::LocalTier;
pub use location::BucketLocation;
pub use remote::{ObjectName, RemoteTier};
pub use tier::{Tier, TierOp, TierStore};
