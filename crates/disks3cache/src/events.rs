//! Observability sink for cache activity
//!
//! The coordinator and both tier adapters report what happens to an
//! injected [`CacheEvents`] implementation instead of logging directly.
//! [`TracingEvents`] forwards to `tracing`; [`RecordingEvents`] keeps events
//! in memory so tests can assert on them.

use crate::tier::{Tier, TierOp};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// The cache was constructed
    Opened {
        local_dir: PathBuf,
        region: String,
        bucket: String,
    },
    Hit {
        tier: Tier,
        key: String,
    },
    /// Neither tier had the key
    Miss {
        key: String,
    },
    /// A tier operation failed and was absorbed
    TierFailed {
        tier: Tier,
        op: TierOp,
        key: String,
        error: String,
    },
    /// A background task was discarded because the dispatcher was full
    TaskDropped {
        tier: Tier,
        op: TierOp,
        key: String,
    },
}

pub trait CacheEvents: Send + Sync {
    fn record(&self, event: CacheEvent);
}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEvents;

impl CacheEvents for TracingEvents {
    fn record(&self, event: CacheEvent) {
        match event {
            CacheEvent::Opened {
                local_dir,
                region,
                bucket,
            } => info!(local_dir = ?local_dir, region = %region, bucket = %bucket, "Tiered cache opened"),
            CacheEvent::Hit { tier, key } => debug!(tier = %tier, key = %key, "Cache hit"),
            CacheEvent::Miss { key } => debug!(key = %key, "Cache miss"),
            CacheEvent::TierFailed {
                tier,
                op,
                key,
                error,
            } => warn!(tier = %tier, op = %op, key = %key, error = %error, "Tier operation failed"),
            CacheEvent::TaskDropped { tier, op, key } => {
                warn!(tier = %tier, op = %op, key = %key, "Dispatcher full, dropped task")
            }
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<CacheEvent>>,
}

impl RecordingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far
    pub fn events(&self) -> Vec<CacheEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn failures(&self) -> Vec<CacheEvent> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, CacheEvent::TierFailed { .. }))
            .collect()
    }
}

impl CacheEvents for RecordingEvents {
    fn record(&self, event: CacheEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
