//! Deferred resolution of pending calls.
//!
//! The dispatch loop reads frames off the wire and must never run caller
//! work on its own task. [`AsyncMessageQueue`] hands each resolution to an
//! independent task (or runs it inline when decoupling is disabled) and
//! tracks what is still in flight. A closing connection first lets
//! scheduled resolutions deliver ([`drain`](AsyncMessageQueue::drain)), then
//! cancels whatever is left.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tracing::{debug, trace};

use crate::error::Result;

// ============================================================================
// AsyncMessageQueue
// ============================================================================

/// Schedules pending-call resolutions away from the dispatch loop.
///
/// Each resolution owns its completion sender, so it can be delivered at
/// most once. When a scheduled resolution is cancelled by [`dispose`],
/// the sender is dropped and the waiting caller observes a closed channel.
///
/// [`dispose`]: AsyncMessageQueue::dispose
pub struct AsyncMessageQueue {
    /// Run resolutions on their own tasks.
    decoupled: bool,
    /// Resolutions scheduled but not finished.
    tasks: Mutex<JoinSet<()>>,
    /// Set once by `dispose`.
    disposed: AtomicBool,
}

impl fmt::Debug for AsyncMessageQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncMessageQueue")
            .field("decoupled", &self.decoupled)
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

impl AsyncMessageQueue {
    /// Creates a queue.
    ///
    /// With `decoupled = false` every resolution runs inline on the caller
    /// of [`enqueue`](Self::enqueue).
    #[must_use]
    pub fn new(decoupled: bool) -> Self {
        Self {
            decoupled,
            tasks: Mutex::new(JoinSet::new()),
            disposed: AtomicBool::new(false),
        }
    }

    /// Returns `true` if resolutions run on independent tasks.
    #[inline]
    #[must_use]
    pub fn is_decoupled(&self) -> bool {
        self.decoupled
    }

    /// Resolves `completion` with the outcome of `resolve`.
    ///
    /// An `Err` returned by `resolve` is delivered to the waiting caller like
    /// any other outcome. After disposal the completion is dropped unresolved.
    pub fn enqueue<T, F>(&self, completion: oneshot::Sender<Result<T>>, resolve: F)
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        if self.disposed.load(Ordering::Acquire) {
            trace!("Message queue disposed, dropping resolution");
            return;
        }

        if !self.decoupled {
            let _ = completion.send(resolve());
            return;
        }

        let mut tasks = self.tasks.lock();
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            let _ = completion.send(resolve());
        });
    }

    /// Returns the number of scheduled resolutions still running.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        let mut tasks = self.tasks.lock();
        while tasks.try_join_next().is_some() {}
        tasks.len()
    }

    /// Waits up to `limit` for scheduled resolutions to deliver, then
    /// disposes the queue.
    ///
    /// Resolutions are pure, so the wait only covers scheduling latency.
    /// Anything still running at the deadline is cancelled.
    pub async fn drain(&self, limit: Duration) {
        let mut tasks = std::mem::replace(&mut *self.tasks.lock(), JoinSet::new());

        let finished = tokio::time::timeout(limit, async {
            while tasks.join_next().await.is_some() {}
        })
        .await
        .is_ok();

        if !finished {
            debug!(count = tasks.len(), "Cancelled resolutions at drain deadline");
            tasks.abort_all();
        }

        self.dispose();
    }

    /// Cancels every resolution still pending. Idempotent, never blocks.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut tasks = self.tasks.lock();
        let count = tasks.len();
        tasks.abort_all();

        if count > 0 {
            debug!(count, "Cancelled pending resolutions");
        }
    }

    /// Returns `true` once [`dispose`](Self::dispose) has run.
    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

// ============================================================================
// Tests
// ============================================================================
