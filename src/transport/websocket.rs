//! WebSocket transport to a browser's remote-control endpoint.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_with_config};
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, Result};

use super::Transport;

// ============================================================================
// Constants
// ============================================================================

/// Largest accepted message (screenshots and PDFs arrive base64 encoded).
const MAX_MESSAGE_SIZE: usize = 256 * 1024 * 1024;

// ============================================================================
// WebSocketTransport
// ============================================================================

/// Client-side WebSocket connection carrying protocol text frames.
pub struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WebSocketTransport {
    /// Connects to a `ws://` endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the handshake fails.
    pub async fn connect(endpoint: &Url) -> Result<Self> {
        let config = WebSocketConfig::default()
            .max_message_size(Some(MAX_MESSAGE_SIZE))
            .max_frame_size(Some(MAX_MESSAGE_SIZE));

        let (stream, _response) = connect_async_with_config(endpoint.as_str(), Some(config), true)
            .await
            .map_err(|e| Error::connection(format!("WebSocket handshake with {endpoint} failed: {e}")))?;

        debug!(endpoint = %endpoint, "WebSocket transport connected");
        Ok(Self { stream })
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, message: String) -> Result<()> {
        self.stream.send(Message::Text(message.into())).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Binary(bytes)) => {
                    return Some(
                        String::from_utf8(bytes.to_vec())
                            .map_err(|e| Error::invalid_message(format!("non UTF-8 frame: {e}"))),
                    );
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "WebSocket closed by remote");
                    return None;
                }
                // Ping, Pong, raw frames
                Ok(other) => trace!(?other, "Ignoring control frame"),
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return None,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self.stream.close(None).await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
