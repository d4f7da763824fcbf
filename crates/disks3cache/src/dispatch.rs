//! Bounded fire-and-forget task dispatch
//!
//! Every background tier operation holds one permit from a shared semaphore
//! for as long as it runs, capping the number of outstanding tasks. When the
//! cap is reached the [`OverflowPolicy`] decides whether the dispatching call
//! waits for a permit or the task is discarded.
//!
//! Running tasks are counted separately from the permits, so waiting for idle
//! never holds permits and never starves new dispatches.

use crate::error::CacheError;
use crate::events::{CacheEvent, CacheEvents};
use crate::tier::{Tier, TierOp};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};

pub const DEFAULT_MAX_OUTSTANDING: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Wait for a running task to finish
    #[default]
    Block,
    /// Discard the new task and report it
    Drop,
}

impl FromStr for OverflowPolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "block" => Ok(OverflowPolicy::Block),
            "drop" => Ok(OverflowPolicy::Drop),
            other => Err(CacheError::Config(format!(
                "unknown overflow policy {:?} (expected \"block\" or \"drop\")",
                other
            ))),
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::Block => write!(f, "block"),
            OverflowPolicy::Drop => write!(f, "drop"),
        }
    }
}

#[derive(Default)]
struct Tracker {
    outstanding: AtomicUsize,
    idle: Notify,
}

/// Held by a running task; the last one out wakes idle waiters
struct Running(Arc<Tracker>);

impl Running {
    fn start(tracker: &Arc<Tracker>) -> Self {
        tracker.outstanding.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(tracker))
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        if self.0.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

pub struct TaskDispatcher {
    permits: Arc<Semaphore>,
    capacity: u32,
    policy: OverflowPolicy,
    tracker: Arc<Tracker>,
    events: Arc<dyn CacheEvents>,
}

impl TaskDispatcher {
    pub fn new(max_outstanding: usize, policy: OverflowPolicy, events: Arc<dyn CacheEvents>) -> Self {
        let capacity = max_outstanding.clamp(1, Semaphore::MAX_PERMITS.min(u32::MAX as usize)) as u32;
        Self {
            permits: Arc::new(Semaphore::new(capacity as usize)),
            capacity,
            policy,
            tracker: Arc::new(Tracker::default()),
            events,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Number of tasks currently running
    pub fn outstanding(&self) -> usize {
        self.tracker.outstanding.load(Ordering::SeqCst)
    }

    /// Run `task` in the background. Returns once the task is spawned (or
    /// dropped), never waiting for it to finish.
    pub async fn spawn<F>(&self, tier: Tier, op: TierOp, key: &str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permit = match self.policy {
            OverflowPolicy::Block => match Arc::clone(&self.permits).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            },
            OverflowPolicy::Drop => match Arc::clone(&self.permits).try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    self.events.record(CacheEvent::TaskDropped {
                        tier,
                        op,
                        key: key.to_string(),
                    });
                    return;
                }
            },
        };

        // Counted before spawning so a flush right after dispatch sees it
        let running = Running::start(&self.tracker);
        tokio::spawn(async move {
            task.await;
            drop(permit);
            drop(running);
        });
    }

    /// Wait until no task is running. Tasks dispatched while waiting are
    /// waited for too.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.tracker.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.tracker.outstanding.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingEvents;
    use tokio::sync::oneshot;

    #[test]
    fn test_overflow_policy_parse() {
        assert_eq!("block".parse::<OverflowPolicy>().unwrap(), OverflowPolicy::Block);
        assert_eq!(" DROP ".parse::<OverflowPolicy>().unwrap(), OverflowPolicy::Drop);
        assert!(matches!(
            "sometimes".parse::<OverflowPolicy>(),
            Err(CacheError::Config(_))
        ));
        assert_eq!(OverflowPolicy::Drop.to_string(), "drop");
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let dispatcher = TaskDispatcher::new(0, OverflowPolicy::Block, Arc::new(RecordingEvents::new()));
        assert_eq!(dispatcher.capacity(), 1);
        assert_eq!(dispatcher.policy(), OverflowPolicy::Block);
    }

    #[tokio::test]
    async fn test_spawned_tasks_run() {
        let dispatcher =
            TaskDispatcher::new(4, OverflowPolicy::Block, Arc::new(RecordingEvents::new()));
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            dispatcher
                .spawn(Tier::Local, TierOp::Set, "k", async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .await;
        }
        dispatcher.wait_idle().await;

        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert_eq!(dispatcher.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_drop_policy_discards_when_full() {
        let events = Arc::new(RecordingEvents::new());
        let dispatcher = TaskDispatcher::new(1, OverflowPolicy::Drop, events.clone());

        let (release_tx, release_rx) = oneshot::channel::<()>();
        dispatcher
            .spawn(Tier::Remote, TierOp::Set, "first", async move {
                let _ = release_rx.await;
            })
            .await;
        assert_eq!(dispatcher.outstanding(), 1);

        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = Arc::clone(&ran);
        dispatcher
            .spawn(Tier::Remote, TierOp::Delete, "second", async move {
                ran_clone.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        release_tx.send(()).unwrap();
        dispatcher.wait_idle().await;

        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(
            events.events(),
            vec![CacheEvent::TaskDropped {
                tier: Tier::Remote,
                op: TierOp::Delete,
                key: "second".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_block_policy_waits_for_capacity() {
        let dispatcher = Arc::new(TaskDispatcher::new(
            1,
            OverflowPolicy::Block,
            Arc::new(RecordingEvents::new()),
        ));

        let (release_tx, release_rx) = oneshot::channel::<()>();
        dispatcher
            .spawn(Tier::Local, TierOp::Set, "first", async move {
                let _ = release_rx.await;
            })
            .await;

        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = Arc::clone(&ran);
        let blocked = {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move {
                dispatcher
                    .spawn(Tier::Local, TierOp::Set, "second", async move {
                        ran_clone.fetch_add(1, Ordering::SeqCst);
                    })
                    .await;
            })
        };

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());

        release_tx.send(()).unwrap();
        blocked.await.unwrap();
        dispatcher.wait_idle().await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_flush_does_not_starve_dispatch() {
        let events = Arc::new(RecordingEvents::new());
        let dispatcher = Arc::new(TaskDispatcher::new(2, OverflowPolicy::Drop, events.clone()));

        let (release_tx, release_rx) = oneshot::channel::<()>();
        dispatcher
            .spawn(Tier::Remote, TierOp::Set, "slow", async move {
                let _ = release_rx.await;
            })
            .await;

        let flush = {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move { dispatcher.wait_idle().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!flush.is_finished());
        assert_eq!(dispatcher.outstanding(), 1);

        // One permit is still free and must go to the new task, not the flush
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = Arc::clone(&ran);
        dispatcher
            .spawn(Tier::Local, TierOp::Set, "during-flush", async move {
                ran_clone.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        assert!(events.events().is_empty());

        release_tx.send(()).unwrap();
        flush.await.unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_wait_idle_with_nothing_running() {
        let dispatcher = TaskDispatcher::new(4, OverflowPolicy::Block, Arc::new(RecordingEvents::new()));
        dispatcher.wait_idle().await;
        assert_eq!(dispatcher.outstanding(), 0);
    }
}
