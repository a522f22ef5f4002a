//! Error types for headless-remote.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use headless_remote::{Result, Error};
//!
//! async fn example(page: &Page) -> Result<()> {
//!     page.navigate("https://example.com").await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::BrowserNotFound`] |
//! | Launch | [`Error::ProcessLaunchFailed`], [`Error::LaunchTimeout`], [`Error::ProcessExited`] |
//! | Connection | [`Error::Connection`], [`Error::Transport`], [`Error::ConnectionClosed`], [`Error::SessionDetached`] |
//! | Protocol | [`Error::Protocol`], [`Error::InvalidMessage`], [`Error::Timeout`] |
//! | Page | [`Error::Navigation`], [`Error::ScriptError`] |
//! | Concurrency | [`Error::InvalidState`], [`Error::Disposed`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::path::PathBuf;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::SessionId;

// ============================================================================
// Constants
// ============================================================================

/// Stable message used for every "execution context destroyed" variant.
pub const CONTEXT_DESTROYED_MESSAGE: &str =
    "Execution context was destroyed, most likely because of a navigation.";

/// Remote messages that all mean the page's execution context went away.
const CONTEXT_DESTROYED_VARIANTS: &[&str] = &[
    "Execution context was destroyed",
    "Cannot find context with specified id",
    "Inspected target navigated or closed",
];

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when launch or connection configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Browser executable not found at path.
    #[error("Browser executable not found at: {path}")]
    BrowserNotFound {
        /// Path where the executable was expected.
        path: PathBuf,
    },

    // ========================================================================
    // Launch Errors
    // ========================================================================
    /// Failed to spawn the browser process.
    #[error("Failed to launch browser: {message}")]
    ProcessLaunchFailed {
        /// Description of the launch failure.
        message: String,
    },

    /// Readiness announcement not observed within the launch window.
    ///
    /// The partially started process has been force-killed.
    #[error("Timed out after {timeout_ms}ms waiting for the browser to start\n{output}")]
    LaunchTimeout {
        /// Milliseconds waited before giving up.
        timeout_ms: u64,
        /// Diagnostic output captured so far.
        output: String,
    },

    /// The process closed its diagnostic stream before announcing readiness.
    #[error("Browser process exited before announcing its endpoint (code {code:?})\n{output}")]
    ProcessExited {
        /// Exit code, if the process already reported one.
        code: Option<i32>,
        /// Diagnostic output captured before exit.
        output: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Establishing the transport failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// The underlying byte stream failed; the connection is dead.
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },

    /// The connection is closed, or closed before the call resolved.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The session was detached from its target.
    #[error("Session detached: {session_id}")]
    SessionDetached {
        /// The detached session.
        session_id: SessionId,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// The remote end answered a command with an error envelope.
    #[error("{message}")]
    Protocol {
        /// Method of the failed command.
        method: String,
        /// Remote error code, if any.
        code: Option<i64>,
        /// Error message (normalized for known transient failures).
        message: String,
        /// Additional error data, if any.
        data: Option<String>,
    },

    /// An inbound message could not be decoded or had an unexpected shape.
    #[error("Invalid message: {message}")]
    InvalidMessage {
        /// Description of the violation.
        message: String,
    },

    /// No response within the protocol timeout.
    ///
    /// Only the affected call fails; the connection stays usable.
    #[error("{method} timed out after {timeout_ms}ms")]
    Timeout {
        /// Method of the command that timed out.
        method: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Page Errors
    // ========================================================================
    /// Navigation was rejected by the browser.
    #[error("{message} at {url}")]
    Navigation {
        /// URL that failed to load.
        url: String,
        /// Browser-provided error text.
        message: String,
    },

    /// JavaScript evaluation threw.
    #[error("Script error: {message}")]
    ScriptError {
        /// Exception text from the page.
        message: String,
    },

    // ========================================================================
    // Concurrency Errors
    // ========================================================================
    /// An operation was attempted in a state that does not allow it.
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Description of the violated precondition.
        message: String,
    },

    /// The primitive has been disposed.
    #[error("{what} has been disposed")]
    Disposed {
        /// Name of the disposed primitive.
        what: &'static str,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a browser not found error.
    #[inline]
    pub fn browser_not_found(path: impl Into<PathBuf>) -> Self {
        Self::BrowserNotFound { path: path.into() }
    }

    /// Creates a process launch failed error.
    #[inline]
    pub fn process_launch_failed(err: IoError) -> Self {
        Self::ProcessLaunchFailed {
            message: err.to_string(),
        }
    }

    /// Creates a launch timeout error.
    #[inline]
    pub fn launch_timeout(timeout_ms: u64, output: impl Into<String>) -> Self {
        Self::LaunchTimeout {
            timeout_ms,
            output: output.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a transport error.
    #[inline]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a protocol error from a remote error envelope.
    ///
    /// Known "execution context destroyed" messages are normalized to
    /// [`CONTEXT_DESTROYED_MESSAGE`]; everything else is kept verbatim.
    pub fn protocol(
        method: impl Into<String>,
        code: Option<i64>,
        message: impl Into<String>,
        data: Option<String>,
    ) -> Self {
        Self::Protocol {
            method: method.into(),
            code,
            message: normalize_protocol_message(message.into()),
            data,
        }
    }

    /// Creates an invalid message error.
    #[inline]
    pub fn invalid_message(message: impl Into<String>) -> Self {
        Self::InvalidMessage {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(method: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            method: method.into(),
            timeout_ms,
        }
    }

    /// Creates a session detached error.
    #[inline]
    pub fn session_detached(session_id: SessionId) -> Self {
        Self::SessionDetached { session_id }
    }

    /// Creates a navigation error.
    #[inline]
    pub fn navigation(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Navigation {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a script error.
    #[inline]
    pub fn script_error(message: impl Into<String>) -> Self {
        Self::ScriptError {
            message: message.into(),
        }
    }

    /// Creates an invalid state error.
    #[inline]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::LaunchTimeout { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::Transport { .. }
                | Self::ConnectionClosed
                | Self::SessionDetached { .. }
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if the remote end rejected the command.
    #[inline]
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Maps known transient context-destroyed messages to one stable message.
fn normalize_protocol_message(message: String) -> String {
    if CONTEXT_DESTROYED_VARIANTS
        .iter()
        .any(|variant| message.contains(variant))
    {
        CONTEXT_DESTROYED_MESSAGE.to_string()
    } else {
        message
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_protocol_message_preserved() {
        let err = Error::protocol("Page.navigate", Some(-32000), "Boom", None);
        assert_eq!(err.to_string(), "Boom");
        assert!(err.is_protocol_error());
    }

    #[test]
    fn test_context_destroyed_normalized() {
        for raw in [
            "Execution context was destroyed.",
            "Cannot find context with specified id",
            "Inspected target navigated or closed",
        ] {
            let err = Error::protocol("Runtime.evaluate", None, raw, None);
            assert_eq!(err.to_string(), CONTEXT_DESTROYED_MESSAGE);
        }
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("missing executable");
        assert_eq!(err.to_string(), "Configuration error: missing executable");
    }

    #[test]
    fn test_is_timeout() {
        assert!(Error::timeout("Page.navigate", 1000).is_timeout());
        assert!(Error::launch_timeout(500, "").is_timeout());
        assert!(!Error::ConnectionClosed.is_timeout());
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::transport("reset").is_connection_error());
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(Error::session_detached(SessionId::from("abc")).is_connection_error());
        assert!(!Error::config("test").is_connection_error());
    }

    #[test]
    fn test_timeout_display() {
        let err = Error::timeout("Runtime.evaluate", 250);
        assert_eq!(err.to_string(), "Runtime.evaluate timed out after 250ms");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
