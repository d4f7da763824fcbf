//! The capability each cache tier offers the coordinator

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Local,
    Remote,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Local => write!(f, "local"),
            Tier::Remote => write!(f, "remote"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierOp {
    Get,
    Set,
    Delete,
}

impl fmt::Display for TierOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierOp::Get => write!(f, "get"),
            TierOp::Set => write!(f, "set"),
            TierOp::Delete => write!(f, "delete"),
        }
    }
}

/// A single storage tier addressed by cache key.
///
/// Implementations absorb their own failures: a failed `get` is a miss and a
/// failed `set` or `delete` is dropped. Handles are shared between many
/// in-flight tasks and must be safe for concurrent use.
#[async_trait]
pub trait TierStore: Send + Sync {
    fn tier(&self) -> Tier;

    async fn get(&self, key: &str) -> Option<Bytes>;

    async fn set(&self, key: &str, value: Bytes);

    async fn delete(&self, key: &str);
}
