//! In-process transport pair.
//!
//! [`MemoryTransport`] plugs into a [`Connection`](super::Connection) like
//! any other transport; the matching [`MemoryPeer`] plays the remote end.
//! Used to drive the protocol without a browser.
//!
//! # Example
//!
//! ```ignore
//! let (transport, mut peer) = MemoryTransport::pair();
//! let connection = Connection::new(transport, ConnectionConfig::default());
//!
//! let call = tokio::spawn(async move { connection.send("Browser.getVersion", json!({}), None).await });
//! let request = peer.recv_json().await.unwrap();
//! peer.send_json(&json!({ "id": request["id"], "result": { "product": "Test/1.0" } }));
//! ```

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

use super::Transport;

// ============================================================================
// Types
// ============================================================================

/// Inbound item: a message or a simulated stream failure.
type Inbound = std::result::Result<String, String>;

// ============================================================================
// MemoryTransport
// ============================================================================

/// Local half of an in-process transport.
#[derive(Debug)]
pub struct MemoryTransport {
    outbound: Option<mpsc::UnboundedSender<String>>,
    inbound: mpsc::UnboundedReceiver<Inbound>,
}

impl MemoryTransport {
    /// Creates a connected transport and peer.
    #[must_use]
    pub fn pair() -> (Self, MemoryPeer) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let transport = Self {
            outbound: Some(outbound_tx),
            inbound: inbound_rx,
        };
        let peer = MemoryPeer {
            sent: outbound_rx,
            inject: Some(inbound_tx),
        };

        (transport, peer)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&mut self, message: String) -> Result<()> {
        let outbound = self
            .outbound
            .as_ref()
            .ok_or_else(|| Error::transport("memory transport closed"))?;

        outbound
            .send(message)
            .map_err(|_| Error::transport("memory peer hung up"))
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        match self.inbound.recv().await? {
            Ok(message) => Some(Ok(message)),
            Err(reason) => Some(Err(Error::transport(reason))),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.outbound = None;
        self.inbound.close();
        Ok(())
    }
}

// ============================================================================
// MemoryPeer
// ============================================================================

/// Remote half of an in-process transport.
#[derive(Debug)]
pub struct MemoryPeer {
    sent: mpsc::UnboundedReceiver<String>,
    inject: Option<mpsc::UnboundedSender<Inbound>>,
}

impl MemoryPeer {
    /// Waits for the next message written by the local end.
    ///
    /// Returns `None` once the local end has closed.
    pub async fn recv(&mut self) -> Option<String> {
        self.sent.recv().await
    }

    /// Waits for the next message and parses it as JSON.
    pub async fn recv_json(&mut self) -> Option<Value> {
        let text = self.sent.recv().await?;
        serde_json::from_str(&text).ok()
    }

    /// Delivers a message to the local end.
    ///
    /// Returns `false` if the local end is gone.
    pub fn send(&self, message: impl Into<String>) -> bool {
        self.inject
            .as_ref()
            .is_some_and(|tx| tx.send(Ok(message.into())).is_ok())
    }

    /// Delivers a JSON value to the local end.
    pub fn send_json(&self, value: &Value) -> bool {
        self.send(value.to_string())
    }

    /// Makes the local end's next read fail with a transport error.
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.inject
            .as_ref()
            .is_some_and(|tx| tx.send(Err(reason.into())).is_ok())
    }

    /// Ends the stream: once buffered messages are read, the local end sees EOF.
    pub fn hang_up(&mut self) {
        self.inject = None;
    }
}

// ============================================================================
// Tests
// ============================================================================
