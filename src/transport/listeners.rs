//! Event fan-out to subscribers.
//!
//! The connection root and every session own an [`EventListeners`] set.
//! Subscribers receive clones of each event through an unbounded channel,
//! so a slow subscriber never stalls the dispatch loop.

// ============================================================================
// Imports
// ============================================================================

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::protocol::Event;

// ============================================================================
// EventListeners
// ============================================================================

/// Set of live subscriptions for one event source.
#[derive(Debug, Default)]
pub(crate) struct EventListeners {
    state: Mutex<ListenerState>,
}

#[derive(Debug, Default)]
struct ListenerState {
    senders: Vec<mpsc::UnboundedSender<Event>>,
    closed: bool,
}

impl EventListeners {
    /// Adds a subscriber. After [`close`](Self::close) the stream is already ended.
    pub(crate) fn subscribe(&self) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        if !state.closed {
            state.senders.push(tx);
        }
        EventStream { rx }
    }

    /// Delivers `event` to every live subscriber, pruning dropped ones.
    ///
    /// Returns the number of subscribers reached.
    pub(crate) fn emit(&self, event: &Event) -> usize {
        let mut state = self.state.lock();
        state.senders.retain(|tx| tx.send(event.clone()).is_ok());
        state.senders.len()
    }

    /// Ends every stream and rejects later subscriptions.
    pub(crate) fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.senders.clear();
    }

    /// Returns the number of live subscribers.
    pub(crate) fn len(&self) -> usize {
        let mut state = self.state.lock();
        state.senders.retain(|tx| !tx.is_closed());
        state.senders.len()
    }
}

// ============================================================================
// EventStream
// ============================================================================

/// Stream of events from one source.
///
/// Ends when the source (session or connection) goes away.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventStream {
    /// Waits for the next event, `None` once the source is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Returns a buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    /// Waits for the next event whose method equals `method`.
    ///
    /// Events with other methods are discarded.
    pub async fn wait_for(&mut self, method: &str) -> Option<Event> {
        while let Some(event) = self.rx.recv().await {
            if event.method == method {
                return Some(event);
            }
        }
        None
    }
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

// ============================================================================
// Tests
// ============================================================================
