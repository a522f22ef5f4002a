//! Logical per-target channel over the shared connection.
//!
//! Sessions are created by the connection when the browser announces
//! `Target.attachedToTarget`; they are never constructed by callers.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::{SessionId, TargetId};
use crate::protocol::{Command, Event, TargetCommand};

use super::connection::ConnectionInner;
use super::listeners::{EventListeners, EventStream};

// ============================================================================
// Session
// ============================================================================

/// Channel to one attached target.
///
/// Commands sent through a session carry its `sessionId`; events tagged with
/// that id are delivered to its subscribers. Cloning is cheap and every clone
/// observes the same detached state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: SessionId,
    target_id: TargetId,
    parent_id: Option<SessionId>,
    /// Weak: the connection owns its sessions, not the reverse.
    connection: Weak<ConnectionInner>,
    detached: AtomicBool,
    listeners: EventListeners,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("target_id", &self.inner.target_id)
            .field("parent_id", &self.inner.parent_id)
            .field("detached", &self.is_detached())
            .finish()
    }
}

impl Session {
    pub(crate) fn new(
        id: SessionId,
        target_id: TargetId,
        parent_id: Option<SessionId>,
        connection: Weak<ConnectionInner>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id,
                target_id,
                parent_id,
                connection,
                detached: AtomicBool::new(false),
                listeners: EventListeners::default(),
            }),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Returns the session id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.inner.id
    }

    /// Returns the attached target's id.
    #[inline]
    #[must_use]
    pub fn target_id(&self) -> &TargetId {
        &self.inner.target_id
    }

    /// Returns the session that announced this one, `None` for the root.
    #[inline]
    #[must_use]
    pub fn parent_id(&self) -> Option<&SessionId> {
        self.inner.parent_id.as_ref()
    }

    /// Returns `true` once the session is detached. Never reverts.
    #[inline]
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.inner.detached.load(Ordering::Acquire)
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Sends a command to the target and waits for its result.
    ///
    /// # Errors
    ///
    /// - [`Error::SessionDetached`] if the session is detached
    /// - [`Error::ConnectionClosed`] if the connection is gone
    /// - [`Error::Protocol`] if the browser answers with an error
    /// - [`Error::Timeout`] if no answer arrives within the protocol timeout
    pub async fn send(&self, method: &str, params: Value) -> Result<Value> {
        let connection = self.connection()?;
        let timeout = connection.config().protocol_timeout;
        connection.call(method, params, Some(self), timeout).await
    }

    /// Like [`send`](Self::send) with an explicit timeout.
    pub async fn send_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value> {
        let connection = self.connection()?;
        connection.call(method, params, Some(self), Some(timeout)).await
    }

    /// Sends a typed command.
    pub async fn execute(&self, command: Command) -> Result<Value> {
        let (method, params) = command.into_parts()?;
        self.send(&method, params).await
    }

    /// Detaches from the target.
    ///
    /// The session (and any session it announced) is dead afterwards even if
    /// the browser rejects the request.
    pub async fn detach(&self) -> Result<()> {
        let connection = self.connection()?;

        let (method, params) = Command::Target(TargetCommand::DetachFromTarget {
            session_id: self.inner.id.clone(),
        })
        .into_parts()?;
        let timeout = connection.config().protocol_timeout;
        let result = connection.call(&method, params, None, timeout).await;

        connection.remove_session(&self.inner.id);
        result.map(|_| ())
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Subscribes to events from this session.
    ///
    /// The stream ends when the session detaches.
    #[must_use]
    pub fn subscribe(&self) -> EventStream {
        self.inner.listeners.subscribe()
    }

    // ========================================================================
    // Internal
    // ========================================================================

    pub(crate) fn emit(&self, event: &Event) {
        self.inner.listeners.emit(event);
    }

    /// Marks the session dead and ends its event streams.
    ///
    /// Returns `true` on the first call only.
    pub(crate) fn mark_detached(&self) -> bool {
        if self.inner.detached.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.inner.listeners.close();
        debug!(session_id = %self.inner.id, "Session detached");
        true
    }

    pub(crate) fn ensure_attached(&self) -> Result<()> {
        if self.is_detached() {
            Err(Error::session_detached(self.inner.id.clone()))
        } else {
            Ok(())
        }
    }

    fn connection(&self) -> Result<Arc<ConnectionInner>> {
        self.ensure_attached()?;
        self.inner
            .connection
            .upgrade()
            .ok_or(Error::ConnectionClosed)
    }
}
