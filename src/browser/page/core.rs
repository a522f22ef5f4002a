//! Core Page struct and accessors.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::identifiers::{SessionId, TargetId};
use crate::protocol::Command;
use crate::transport::{EventStream, Session};

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for a page.
pub(crate) struct PageInner {
    /// Session attached to the page target.
    pub session: Session,
}

// ============================================================================
// Page
// ============================================================================

/// A handle to one page target.
///
/// Every operation is a single command on the page's session. Once the
/// target detaches, operations fail with
/// [`Error::SessionDetached`](crate::Error::SessionDetached).
#[derive(Clone)]
pub struct Page {
    pub(crate) inner: Arc<PageInner>,
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("target_id", self.target_id())
            .field("session_id", self.session_id())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Page {
    /// Creates a page handle over an attached session.
    pub(crate) fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(PageInner { session }),
        }
    }
}

// ============================================================================
// Page - Accessors
// ============================================================================

impl Page {
    /// Returns the target id.
    #[inline]
    #[must_use]
    pub fn target_id(&self) -> &TargetId {
        self.inner.session.target_id()
    }

    /// Returns the session id.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        self.inner.session.id()
    }

    /// Returns the underlying session.
    #[inline]
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// Returns `true` once the page's session has detached.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.session.is_detached()
    }

    /// Subscribes to events from this page.
    ///
    /// Domains emit events only after being enabled, e.g.
    /// `page.session().send("Page.enable", json!({}))`.
    #[must_use]
    pub fn events(&self) -> EventStream {
        self.inner.session.subscribe()
    }
}

// ============================================================================
// Page - Internal
// ============================================================================

impl Page {
    /// Sends a command on the page's session.
    pub(crate) async fn send_command(&self, command: Command) -> Result<Value> {
        self.inner.session.execute(command).await
    }
}
