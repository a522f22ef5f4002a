//! Single-slot serialization of multi-step async sequences.
//!
//! Attaching to a freshly created target takes two round trips. Two callers
//! racing through that sequence could each observe the other's half-built
//! session, so the browser funnels it through a [`TaskQueue`].
//!
//! # Reentrancy
//!
//! A flow already holding the slot may need to enqueue again (an init step
//! calling back into itself). Ownership is tracked per logical flow with a
//! tokio task-local: nested calls from inside the holder's body see their
//! own queue id and run directly. Work spawned onto other tasks does not
//! inherit the marker and waits like any other caller.

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::Mutex;
use tracing::trace;

use crate::error::{Error, Result};

// ============================================================================
// Task-local State
// ============================================================================

tokio::task_local! {
    /// Ids of the queues held by the current logical flow.
    static HELD_QUEUES: Vec<u64>;
}

/// Source of queue ids.
static NEXT_QUEUE_ID: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// TaskQueue
// ============================================================================

/// Mutual exclusion for sequences of async steps.
#[derive(Debug)]
pub struct TaskQueue {
    /// Identity used by the reentrancy marker.
    id: u64,
    /// The single slot.
    slot: Mutex<()>,
    /// Allow nested `enqueue` from the holding flow.
    reentrant: bool,
    /// Set by `dispose`.
    disposed: AtomicBool,
}

impl TaskQueue {
    /// Creates a non-reentrant queue.
    ///
    /// A nested [`enqueue`](Self::enqueue) from the holding flow fails with
    /// [`Error::InvalidState`] instead of deadlocking.
    #[must_use]
    pub fn new() -> Self {
        Self::with_reentrancy(false)
    }

    /// Creates a queue whose holder may nest further `enqueue` calls.
    #[must_use]
    pub fn reentrant() -> Self {
        Self::with_reentrancy(true)
    }

    fn with_reentrancy(reentrant: bool) -> Self {
        Self {
            id: NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed),
            slot: Mutex::new(()),
            reentrant,
            disposed: AtomicBool::new(false),
        }
    }

    /// Runs `body` while holding the slot.
    ///
    /// The slot is released when `body` finishes, whether it succeeds or
    /// fails, and also if the returned future is dropped.
    ///
    /// # Errors
    ///
    /// - [`Error::Disposed`] after [`dispose`](Self::dispose)
    /// - [`Error::InvalidState`] on nested use of a non-reentrant queue
    /// - whatever `body` returns
    pub async fn enqueue<F, Fut, T>(&self, body: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.ensure_open()?;

        if self.is_held_by_current_flow() {
            if !self.reentrant {
                return Err(Error::invalid_state(
                    "task queue re-entered by the flow already holding it",
                ));
            }
            trace!(queue = self.id, "Nested enqueue from holder");
            return body().await;
        }

        let _guard = self.slot.lock().await;
        self.ensure_open()?;

        let mut held = HELD_QUEUES.try_with(Clone::clone).unwrap_or_default();
        held.push(self.id);

        HELD_QUEUES.scope(held, body()).await
    }

    /// Waits for the in-flight holder, then rejects all later work.
    ///
    /// Called from inside a holder's body it only marks the queue disposed.
    pub async fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);

        if self.is_held_by_current_flow() {
            return;
        }

        let _guard = self.slot.lock().await;
        trace!(queue = self.id, "Task queue disposed");
    }

    /// Returns `true` once [`dispose`](Self::dispose) has been called.
    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_disposed() {
            Err(Error::Disposed { what: "task queue" })
        } else {
            Ok(())
        }
    }

    fn is_held_by_current_flow(&self) -> bool {
        HELD_QUEUES
            .try_with(|held| held.contains(&self.id))
            .unwrap_or(false)
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use tokio::time::{sleep, timeout};

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_bodies_never_interleave() {
        let queue = Arc::new(TaskQueue::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let queue = Arc::clone(&queue);
            let inside = Arc::clone(&inside);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                queue
                    .enqueue(|| async {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        sleep(Duration::from_millis(2)).await;
                        inside.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .await
            }));
        }

        for handle in handles {
            handle.await.expect("join").expect("enqueue");
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_released_after_failure() {
        let queue = TaskQueue::new();

        let failed: Result<()> = queue
            .enqueue(|| async { Err(Error::invalid_state("step failed")) })
            .await;
        assert!(failed.is_err());

        let value = timeout(Duration::from_secs(1), queue.enqueue(|| async { Ok(5) }))
            .await
            .expect("slot released")
            .expect("ok");
        assert_eq!(value, 5);
    }

    #[tokio::test]
    async fn test_reentrant_nesting() {
        let queue = TaskQueue::reentrant();

        let value = timeout(
            Duration::from_secs(1),
            queue.enqueue(|| async { queue.enqueue(|| async { Ok(42) }).await }),
        )
        .await
        .expect("no self-deadlock")
        .expect("ok");

        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_non_reentrant_nesting_fails_fast() {
        let queue = TaskQueue::new();

        let result = timeout(
            Duration::from_secs(1),
            queue.enqueue(|| async { queue.enqueue(|| async { Ok(1) }).await }),
        )
        .await
        .expect("no deadlock");

        assert!(matches!(result, Err(Error::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_other_flow_waits_for_holder() {
        let queue = Arc::new(TaskQueue::reentrant());

        let inner_queue = Arc::clone(&queue);
        let result = queue
            .enqueue(|| async move {
                // A spawned task is a different logical flow.
                let waiter = tokio::spawn(async move {
                    inner_queue.enqueue(|| async { Ok(()) }).await
                });
                let blocked = timeout(Duration::from_millis(50), async {
                    while !waiter.is_finished() {
                        sleep(Duration::from_millis(5)).await;
                    }
                })
                .await
                .is_err();
                Ok((blocked, waiter))
            })
            .await
            .expect("ok");

        let (blocked, waiter) = result;
        assert!(blocked);
        waiter.await.expect("join").expect("enqueue after release");
    }

    #[tokio::test]
    async fn test_dispose_waits_then_rejects() {
        let queue = Arc::new(TaskQueue::new());
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let finished = Arc::new(AtomicBool::new(false));

        let holder = {
            let queue = Arc::clone(&queue);
            let finished = Arc::clone(&finished);
            tokio::spawn(async move {
                queue
                    .enqueue(|| async move {
                        let _ = started_tx.send(());
                        sleep(Duration::from_millis(30)).await;
                        finished.store(true, Ordering::SeqCst);
                        Ok(())
                    })
                    .await
            })
        };

        started_rx.await.expect("holder started");
        queue.dispose().await;
        assert!(finished.load(Ordering::SeqCst));

        let rejected = queue.enqueue(|| async { Ok(()) }).await;
        assert!(matches!(rejected, Err(Error::Disposed { .. })));
        holder.await.expect("join").expect("holder ok");
    }
}
