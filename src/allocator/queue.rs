//! Rate-limited, deduplicating work queue of node names
//!
//! Semantics follow the classic controller work queue contract:
//!
//! - `add` is idempotent per pending item,
//! - `get` blocks until an item is available and marks it in-flight,
//! - a second `add` of an in-flight name coalesces into a single re-enqueue
//!   once `done` is called,
//! - at most one worker holds a given name at any instant,
//! - `add_rate_limited` re-enqueues with per-item exponential backoff and
//!   `forget` resets it.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::trace;

/// Default per-item backoff floor
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(5);

/// Default per-item backoff ceiling
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(1000);

#[derive(Default)]
struct State {
    pending: VecDeque<String>,
    dirty: HashSet<String>,
    processing: HashSet<String>,
    failures: HashMap<String, u32>,
    shutting_down: bool,
}

struct Inner {
    state: Mutex<State>,
    notify: Notify,
    base_delay: Duration,
    max_delay: Duration,
}

/// Deduplicating work queue with per-item rate limiting.
///
/// Cloning is cheap; clones share the same queue.
#[derive(Clone)]
pub struct WorkQueue {
    inner: Arc<Inner>,
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkQueue {
    /// Create a queue with the default backoff limits
    pub fn new() -> Self {
        Self::with_rate_limits(DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY)
    }

    /// Create a queue with explicit backoff limits
    pub fn with_rate_limits(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                notify: Notify::new(),
                base_delay,
                max_delay,
            }),
        }
    }

    /// Enqueue a name unless it is already pending.
    ///
    /// A name currently in-flight is marked dirty instead and re-enqueued
    /// when its worker calls [`done`](Self::done).
    pub fn add(&self, name: impl Into<String>) {
        let name = name.into();
        {
            let mut st = self.lock();
            if st.shutting_down || !st.dirty.insert(name.clone()) {
                return;
            }
            if st.processing.contains(&name) {
                trace!(%name, "coalescing add of in-flight item");
                return;
            }
            st.pending.push_back(name);
        }
        self.inner.notify.notify_one();
    }

    /// Block until an item is available, mark it in-flight, and return it.
    ///
    /// Returns `None` once the queue is shut down and drained.
    pub async fn get(&self) -> Option<String> {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // register before checking state so a notify_waiters between the
            // check and the await cannot be lost
            notified.as_mut().enable();
            {
                let mut st = self.lock();
                if let Some(name) = st.pending.pop_front() {
                    st.dirty.remove(&name);
                    st.processing.insert(name.clone());
                    if !st.pending.is_empty() {
                        // keep other idle workers moving
                        self.inner.notify.notify_one();
                    }
                    return Some(name);
                }
                if st.shutting_down {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Clear the in-flight mark and re-enqueue if the name went dirty while
    /// being processed.
    pub fn done(&self, name: &str) {
        let requeued = {
            let mut st = self.lock();
            st.processing.remove(name);
            if st.dirty.contains(name) && !st.shutting_down {
                st.pending.push_back(name.to_string());
                true
            } else {
                false
            }
        };
        if requeued {
            self.inner.notify.notify_one();
        }
    }

    /// Re-enqueue after the item's exponential backoff delay.
    ///
    /// Each call bumps the per-item failure count; the delay doubles from
    /// the base up to the configured ceiling.
    pub fn add_rate_limited(&self, name: impl Into<String>) {
        let name = name.into();
        let delay = {
            let mut st = self.lock();
            if st.shutting_down {
                return;
            }
            let failures = st.failures.entry(name.clone()).or_insert(0);
            let exp = (*failures).min(20);
            *failures += 1;
            std::cmp::min(
                self.inner.base_delay.saturating_mul(1u32 << exp),
                self.inner.max_delay,
            )
        };
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(name);
        });
    }

    /// Reset the item's backoff history
    pub fn forget(&self, name: &str) {
        self.lock().failures.remove(name);
    }

    /// Number of rate-limited requeues recorded for the item
    pub fn num_requeues(&self, name: &str) -> u32 {
        self.lock().failures.get(name).copied().unwrap_or(0)
    }

    /// Number of pending (not in-flight) items
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    /// True when no items are pending
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop accepting new items and wake blocked getters.
    ///
    /// Pending items are still handed out so workers can drain.
    pub fn shut_down(&self) {
        self.lock().shutting_down = true;
        self.inner.notify.notify_waiters();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    const TICK: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn add_deduplicates_pending_items() {
        let queue = WorkQueue::new();
        queue.add("node-a");
        queue.add("node-a");
        queue.add("node-a");
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn get_marks_in_flight_and_drains_len() {
        let queue = WorkQueue::new();
        queue.add("node-a");
        assert_eq!(queue.len(), 1);
        let name = queue.get().await.unwrap();
        assert_eq!(name, "node-a");
        assert_eq!(queue.len(), 0);
        queue.done(&name);
        assert_eq!(queue.len(), 0);
    }

    #[tokio::test]
    async fn in_flight_add_coalesces_until_done() {
        let queue = WorkQueue::new();
        queue.add("node-a");
        let name = queue.get().await.unwrap();

        // adds while in flight do not surface a second copy
        queue.add("node-a");
        queue.add("node-a");
        assert_eq!(queue.len(), 0);

        // a second getter must not observe the same name concurrently
        assert!(timeout(TICK, queue.get()).await.is_err());

        queue.done(&name);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.get().await.unwrap(), "node-a");
    }

    #[tokio::test]
    async fn rate_limited_requeue_backs_off_and_forget_resets() {
        let queue =
            WorkQueue::with_rate_limits(Duration::from_millis(1), Duration::from_millis(8));
        queue.add_rate_limited("node-a");
        assert_eq!(queue.num_requeues("node-a"), 1);

        let name = timeout(Duration::from_secs(1), queue.get())
            .await
            .expect("rate-limited item arrives")
            .unwrap();
        assert_eq!(name, "node-a");
        queue.done(&name);

        queue.add_rate_limited("node-a");
        queue.done(queue.get().await.unwrap().as_str());
        assert_eq!(queue.num_requeues("node-a"), 2);

        queue.forget("node-a");
        assert_eq!(queue.num_requeues("node-a"), 0);
    }

    #[tokio::test]
    async fn shutdown_wakes_blocked_getters() {
        let queue = WorkQueue::new();
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.get().await })
        };
        tokio::time::sleep(TICK).await;
        queue.shut_down();
        assert_eq!(waiter.await.unwrap(), None);
        // adds after shutdown are ignored
        queue.add("node-a");
        assert_eq!(queue.len(), 0);
    }

    #[tokio::test]
    async fn shutdown_drains_pending_items_first() {
        let queue = WorkQueue::new();
        queue.add("node-a");
        queue.shut_down();
        assert_eq!(queue.get().await.unwrap(), "node-a");
        assert_eq!(queue.get().await, None);
    }
}
