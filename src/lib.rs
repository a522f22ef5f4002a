//! Headless Remote - JSON remote-control protocol client for headless browsers.
//!
//! Launches a browser process, connects to its debugging WebSocket, and
//! drives pages over the multiplexed command/response/event protocol.
//!
//! # Architecture
//!
//! - **Launcher**: spawns the browser, scans stderr for the readiness line,
//!   owns the temporary profile, and guarantees the process is reaped
//! - **Connection**: one transport, many sessions. Correlates responses to
//!   calls by id and routes events by `sessionId`
//! - **Handles**: [`Browser`] and [`Page`] turn protocol commands into
//!   typed operations
//!
//! Every frame leaves through a single writer task, and every response is
//! resolved exactly once: by its answer, a timeout, a detach, or a close.
//!
//! # Quick Start
//!
//! ```no_run
//! use headless_remote::{Browser, CaptureOptions, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let browser = Browser::builder()
//!         .executable("/usr/bin/chromium")
//!         .launch()
//!         .await?;
//!
//!     let page = browser.new_page().await?;
//!     page.navigate("https://example.com").await?;
//!
//!     let title = page.evaluate("() => document.title", &[]).await?;
//!     println!("Page title: {title}");
//!
//!     let pdf = page.capture(CaptureOptions::pdf()).await?;
//!     std::fs::write("example.pdf", pdf)?;
//!
//!     browser.close().await
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`browser`] | [`Browser`], [`BrowserBuilder`], [`Page`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`launcher`] | Process spawning, readiness, profile, teardown |
//! | [`protocol`] | Message envelopes and typed commands |
//! | [`sync`] | Resolution queue and task serialization |
//! | [`transport`] | Transports, connection, sessions |

// ============================================================================
// Modules
// ============================================================================

/// Browser and page handles.
pub mod browser;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Browser process launching and supervision.
pub mod launcher;

/// Protocol message types.
pub mod protocol;

/// Concurrency primitives shared by the connection and browser.
pub mod sync;

/// Transports and the multiplexed connection.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Browser types
pub use browser::{
    Browser, BrowserBuilder, BrowserVersion, CaptureKind, CaptureOptions, NavigationResult, Page,
};

// Launcher types
pub use launcher::{BrowserProcess, ExitOutcome, LaunchOptions, ProcessLauncher, UserDataDir};

// Transport types
pub use transport::{
    Connection, ConnectionConfig, EventStream, MemoryPeer, MemoryTransport, Session, Transport,
    WebSocketTransport,
};

// Protocol types
pub use protocol::{Command, Event, ImageFormat, PdfParams, ScreenshotParams, Viewport};

// Sync types
pub use sync::{AsyncMessageQueue, TaskQueue};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{CommandId, SessionId, TargetId};
