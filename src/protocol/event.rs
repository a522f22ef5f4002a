//! Event message types.
//!
//! Events are unsolicited notifications sent from the remote end. They carry
//! a `sessionId` when they belong to an attached target.
//!
//! # Event Types
//!
//! | Domain | Events |
//! |--------|--------|
//! | `Target` | `attachedToTarget`, `detachedFromTarget`, `targetCreated`, `targetDestroyed`, `targetInfoChanged` |
//! | `Page` | `loadEventFired`, `domContentEventFired`, `frameNavigated` |
//! | `Runtime` | `consoleAPICalled`, `exceptionThrown` |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::{SessionId, TargetId};

// ============================================================================
// Constants
// ============================================================================

/// Event announcing a new session attached to a target.
pub const TARGET_ATTACHED: &str = "Target.attachedToTarget";

/// Event announcing a session detached from its target.
pub const TARGET_DETACHED: &str = "Target.detachedFromTarget";

// ============================================================================
// Event
// ============================================================================

/// An event notification from remote end to local end.
///
/// # Format
///
/// ```json
/// {
///   "method": "Domain.eventName",
///   "params": { ... },
///   "sessionId": "optional"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event name in `Domain.eventName` format.
    pub method: String,

    /// Event-specific data.
    #[serde(default)]
    pub params: Value,

    /// Session that emitted the event (`None` = browser root).
    #[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

impl Event {
    /// Returns the domain name from the method.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let event = Event { method: "Page.loadEventFired".into(), .. };
    /// assert_eq!(event.domain(), "Page");
    /// ```
    #[inline]
    #[must_use]
    pub fn domain(&self) -> &str {
        self.method.split('.').next().unwrap_or_default()
    }

    /// Returns the event name from the method.
    #[inline]
    #[must_use]
    pub fn event_name(&self) -> &str {
        self.method.split('.').nth(1).unwrap_or_default()
    }

    /// Parses the event into a typed variant.
    #[must_use]
    pub fn parse(&self) -> ParsedEvent {
        match self.method.as_str() {
            TARGET_ATTACHED => self.parse_attached(),
            TARGET_DETACHED => ParsedEvent::TargetDetached {
                session_id: self.str_param("sessionId").map(SessionId::from),
                target_id: self.str_param("targetId").map(TargetId::from),
            },
            "Target.targetCreated" => self
                .target_info()
                .map(|target_info| ParsedEvent::TargetCreated { target_info })
                .unwrap_or(ParsedEvent::Other),
            "Target.targetInfoChanged" => self
                .target_info()
                .map(|target_info| ParsedEvent::TargetInfoChanged { target_info })
                .unwrap_or(ParsedEvent::Other),
            "Target.targetDestroyed" => self
                .str_param("targetId")
                .map(|id| ParsedEvent::TargetDestroyed {
                    target_id: TargetId::from(id),
                })
                .unwrap_or(ParsedEvent::Other),
            "Page.loadEventFired" => ParsedEvent::PageLoaded {
                timestamp: self.f64_param("timestamp"),
            },
            "Page.domContentEventFired" => ParsedEvent::DomContentLoaded {
                timestamp: self.f64_param("timestamp"),
            },
            "Page.frameNavigated" => {
                let frame = self.params.get("frame");
                ParsedEvent::FrameNavigated {
                    frame_id: frame
                        .and_then(|f| f.get("id"))
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    url: frame
                        .and_then(|f| f.get("url"))
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                }
            }
            "Runtime.consoleAPICalled" => ParsedEvent::ConsoleApiCalled {
                kind: self.str_param("type").unwrap_or("log").to_string(),
                args: self
                    .params
                    .get("args")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default(),
            },
            "Runtime.exceptionThrown" => ParsedEvent::ExceptionThrown {
                text: exception_text(&self.params["exceptionDetails"]),
            },
            _ => ParsedEvent::Other,
        }
    }

    fn parse_attached(&self) -> ParsedEvent {
        let (Some(session_id), Some(target_info)) = (self.str_param("sessionId"), self.target_info())
        else {
            return ParsedEvent::Other;
        };

        ParsedEvent::TargetAttached {
            session_id: SessionId::from(session_id),
            target_info,
            waiting_for_debugger: self
                .params
                .get("waitingForDebugger")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }
    }

    fn target_info(&self) -> Option<TargetInfo> {
        self.params
            .get("targetInfo")
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
    }

    fn str_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    fn f64_param(&self, key: &str) -> f64 {
        self.params.get(key).and_then(Value::as_f64).unwrap_or_default()
    }
}

// ============================================================================
// TargetInfo
// ============================================================================

/// Description of a target as reported by the `Target` domain.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    /// Target identifier.
    pub target_id: TargetId,
    /// Target type (`page`, `iframe`, `service_worker`, ...).
    #[serde(rename = "type")]
    pub target_type: String,
    /// Current title.
    #[serde(default)]
    pub title: String,
    /// Current URL.
    #[serde(default)]
    pub url: String,
    /// Whether a client is attached.
    #[serde(default)]
    pub attached: bool,
    /// Target that opened this one, if any.
    #[serde(default)]
    pub opener_id: Option<TargetId>,
}

// ============================================================================
// ParsedEvent
// ============================================================================

/// Parsed event types for type-safe handling.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedEvent {
    /// A session was attached to a target.
    TargetAttached {
        /// New session id.
        session_id: SessionId,
        /// Attached target.
        target_info: TargetInfo,
        /// Whether the target is paused until resumed.
        waiting_for_debugger: bool,
    },

    /// A session was detached.
    TargetDetached {
        /// Detached session id.
        session_id: Option<SessionId>,
        /// Target id, when reported.
        target_id: Option<TargetId>,
    },

    /// A target was created.
    TargetCreated {
        /// New target.
        target_info: TargetInfo,
    },

    /// A target changed (URL, title, ...).
    TargetInfoChanged {
        /// Updated target.
        target_info: TargetInfo,
    },

    /// A target was destroyed.
    TargetDestroyed {
        /// Destroyed target id.
        target_id: TargetId,
    },

    /// Page `load` fired.
    PageLoaded {
        /// Monotonic timestamp.
        timestamp: f64,
    },

    /// Page `DOMContentLoaded` fired.
    DomContentLoaded {
        /// Monotonic timestamp.
        timestamp: f64,
    },

    /// A frame committed a navigation.
    FrameNavigated {
        /// Frame id.
        frame_id: String,
        /// New URL.
        url: String,
    },

    /// `console.*` was called in the page.
    ConsoleApiCalled {
        /// Console method (`log`, `error`, ...).
        kind: String,
        /// Remote objects passed to the call.
        args: Vec<Value>,
    },

    /// An uncaught exception was thrown in the page.
    ExceptionThrown {
        /// Exception description.
        text: String,
    },

    /// Any other event.
    Other,
}

// ============================================================================
// Helpers
// ============================================================================

/// Extracts the most descriptive text from `exceptionDetails`.
pub(crate) fn exception_text(details: &Value) -> String {
    details
        .get("exception")
        .and_then(|e| e.get("description"))
        .and_then(Value::as_str)
        .or_else(|| details.get("text").and_then(Value::as_str))
        .unwrap_or("Uncaught exception")
        .to_string()
}

// ============================================================================
// Tests
// ============================================================================
