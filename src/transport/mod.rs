//! Transport layer: byte streams, the connection, and sessions.
//!
//! This module carries protocol messages between the local end (Rust) and
//! the browser's remote-control endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐                         ┌─────────────────┐
//! │  Connection              │       WebSocket         │  Browser        │
//! │   pending calls by id    │◄───────────────────────►│  (remote end)   │
//! │   sessions by sessionId  │  ws://127.0.0.1:PORT    │                 │
//! │   dispatch loop (task)   │                         │  targets        │
//! └──────────────────────────┘                         └─────────────────┘
//!        ▲            ▲
//!     Session      Session      (one per attached target, same socket)
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. A [`Transport`] is opened (`WebSocketTransport::connect`)
//! 2. [`Connection::new`] spawns the dispatch loop that owns it
//! 3. `Target.attachedToTarget` events register [`Session`]s
//! 4. Commands are correlated with responses by id
//! 5. [`Connection::close`] rejects outstanding calls and releases the transport
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Correlation, routing, dispatch loop |
//! | `session` | Per-target logical channel |
//! | `listeners` | Event fan-out to subscribers |
//! | `websocket` | WebSocket transport |
//! | `memory` | In-process transport pair |

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// Command correlation, event routing and the dispatch loop.
pub mod connection;

/// Event fan-out to subscribers.
pub mod listeners;

/// In-process transport pair.
pub mod memory;

/// Logical per-target channels.
pub mod session;

/// WebSocket transport.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, ConnectionConfig};
pub use listeners::EventStream;
pub use memory::{MemoryPeer, MemoryTransport};
pub use session::Session;
pub use websocket::WebSocketTransport;

// ============================================================================
// Transport
// ============================================================================

/// Bidirectional message stream beneath the protocol.
///
/// A transport knows nothing about ids, sessions, or JSON shape; it moves
/// whole text messages. Exactly one dispatch loop owns it.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Writes one message.
    async fn send(&mut self, message: String) -> Result<()>;

    /// Reads the next message.
    ///
    /// Returns `None` once the peer has closed the stream and `Some(Err)` if
    /// the stream failed. Must be cancel-safe: the dispatch loop drops a
    /// pending `recv` whenever it has a message to write.
    async fn recv(&mut self) -> Option<Result<String>>;

    /// Closes the stream. Closing an already closed stream is not an error.
    async fn close(&mut self) -> Result<()>;
}
