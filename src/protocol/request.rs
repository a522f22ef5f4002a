//! Request, Response and inbound message classification.
//!
//! Every inbound frame is decoded exactly once into a [`Message`], which is
//! either a [`Response`] (has an `id`) or an [`Event`] (has a `method` and
//! no `id`). The connection routes on that variant instead of probing the
//! raw JSON repeatedly.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::{CommandId, SessionId};

use super::Event;

// ============================================================================
// Request
// ============================================================================

/// A command request from local end to remote end.
///
/// # Format
///
/// ```json
/// {
///   "id": 1,
///   "method": "Domain.method",
///   "params": { ... },
///   "sessionId": "optional"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Unique identifier for request/response correlation.
    pub id: CommandId,

    /// Method in `Domain.method` format.
    pub method: String,

    /// Method parameters (always an object on the wire).
    pub params: Value,

    /// Session the command is addressed to (`None` = browser root).
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

impl Request {
    /// Creates a new request.
    ///
    /// `null` params are sent as an empty object.
    #[must_use]
    pub fn new(
        id: CommandId,
        method: impl Into<String>,
        params: Value,
        session_id: Option<SessionId>,
    ) -> Self {
        let params = if params.is_null() {
            Value::Object(serde_json::Map::new())
        } else {
            params
        };

        Self {
            id,
            method: method.into(),
            params,
            session_id,
        }
    }
}

// ============================================================================
// Response
// ============================================================================

/// A response from remote end to local end.
///
/// # Format
///
/// Success:
/// ```json
/// { "id": 1, "result": { ... } }
/// ```
///
/// Error:
/// ```json
/// { "id": 1, "error": { "code": -32000, "message": "...", "data": "..." } }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    /// Matches the command `id`.
    pub id: CommandId,

    /// Result data (if success).
    #[serde(default)]
    pub result: Option<Value>,

    /// Error envelope (if error).
    #[serde(default)]
    pub error: Option<ResponseError>,

    /// Session the response belongs to, if any.
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<SessionId>,
}

impl Response {
    /// Returns `true` if this is an error response.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Extracts the result value, returning error if response was error.
    ///
    /// `method` is the method of the originating command, kept on the error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the response carries an error envelope.
    pub fn into_result(self, method: &str) -> Result<Value> {
        match self.error {
            Some(error) => Err(error.into_error(method)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

// ============================================================================
// ResponseError
// ============================================================================

/// Error envelope carried by a failed response.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseError {
    /// Numeric error code, if provided.
    #[serde(default)]
    pub code: Option<i64>,

    /// Human-readable message.
    #[serde(default)]
    pub message: String,

    /// Additional details (usually a string).
    #[serde(default)]
    pub data: Option<Value>,
}

impl ResponseError {
    /// Converts the envelope into a crate error.
    #[must_use]
    pub fn into_error(self, method: &str) -> Error {
        let data = self.data.map(|data| match data {
            Value::String(text) => text,
            other => other.to_string(),
        });
        Error::protocol(method, self.code, self.message, data)
    }
}

// ============================================================================
// Message
// ============================================================================

/// A decoded inbound message.
#[derive(Debug, Clone)]
pub enum Message {
    /// Reply to a command, correlated by id.
    Response(Response),
    /// Unsolicited notification.
    Event(Event),
}

/// Wire shape shared by responses and events.
#[derive(Deserialize)]
struct RawMessage {
    #[serde(default)]
    id: Option<CommandId>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ResponseError>,
    #[serde(rename = "sessionId", default)]
    session_id: Option<SessionId>,
}

impl Message {
    /// Decodes one inbound frame.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the frame is not valid JSON
    /// - [`Error::InvalidMessage`] if it has neither `id` nor `method`
    pub fn decode(text: &str) -> Result<Self> {
        let raw: RawMessage = serde_json::from_str(text)?;

        match (raw.id, raw.method) {
            (Some(id), _) => Ok(Self::Response(Response {
                id,
                result: raw.result,
                error: raw.error,
                session_id: raw.session_id,
            })),
            (None, Some(method)) => Ok(Self::Event(Event {
                method,
                params: raw.params.unwrap_or(Value::Null),
                session_id: raw.session_id,
            })),
            (None, None) => Err(Error::invalid_message(
                "message has neither an id nor a method",
            )),
        }
    }

    /// Returns the session id the message is tagged with, if any.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::Response(response) => response.session_id.as_ref(),
            Self::Event(event) => event.session_id.as_ref(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let request = Request::new(CommandId::new(1), "X", Value::Null, None);
        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(json, json!({"id": 1, "method": "X", "params": {}}));
    }

    #[test]
    fn test_request_with_session() {
        let request = Request::new(
            CommandId::new(3),
            "Page.navigate",
            json!({"url": "about:blank"}),
            Some(SessionId::from("abc")),
        );
        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(json["sessionId"], "abc");
        assert_eq!(json["params"]["url"], "about:blank");
    }

    #[test]
    fn test_decode_success_response() {
        let message = Message::decode(r#"{"id":1,"result":{"ok":true}}"#).expect("decode");
        let Message::Response(response) = message else {
            panic!("expected response");
        };
        assert_eq!(response.id, CommandId::new(1));
        assert_eq!(response.into_result("X").expect("ok"), json!({"ok": true}));
    }

    #[test]
    fn test_decode_error_response() {
        let message = Message::decode(r#"{"id":2,"error":{"message":"Boom"}}"#).expect("decode");
        let Message::Response(response) = message else {
            panic!("expected response");
        };
        assert!(response.is_error());
        let err = response.into_result("Y").unwrap_err();
        match err {
            Error::Protocol {
                method, message, ..
            } => {
                assert_eq!(method, "Y");
                assert_eq!(message, "Boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_error_data_kept() {
        let text = r#"{"id":4,"error":{"code":-32602,"message":"Invalid params","data":"url: string value expected"}}"#;
        let Message::Response(response) = Message::decode(text).expect("decode") else {
            panic!("expected response");
        };
        match response.into_result("Page.navigate").unwrap_err() {
            Error::Protocol { code, data, .. } => {
                assert_eq!(code, Some(-32602));
                assert_eq!(data.as_deref(), Some("url: string value expected"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_decode_event_with_session() {
        let message =
            Message::decode(r#"{"method":"Z","params":{},"sessionId":"abc"}"#).expect("decode");
        assert_eq!(message.session_id(), Some(&SessionId::from("abc")));
        assert!(matches!(message, Message::Event(ref e) if e.method == "Z"));
    }

    #[test]
    fn test_decode_event_without_params() {
        let Message::Event(event) = Message::decode(r#"{"method":"Z"}"#).expect("decode") else {
            panic!("expected event");
        };
        assert!(event.params.is_null());
        assert!(event.session_id.is_none());
    }

    #[test]
    fn test_decode_rejects_shapeless() {
        let err = Message::decode(r#"{"params":{}}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidMessage { .. }));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(Message::decode("not json"), Err(Error::Json(_))));
    }
}
