//! Type-safe identifiers for protocol entities.
//!
//! Newtype wrappers keep command ids, session ids, and target ids from
//! being mixed up at compile time. All of them serialize transparently,
//! so they appear on the wire as a bare number or string.
//!
//! | Type | Wire form | Assigned by |
//! |------|-----------|-------------|
//! | [`CommandId`] | integer | local end (per connection, monotonic) |
//! | [`SessionId`] | string | remote end (`Target.attachedToTarget`) |
//! | [`TargetId`] | string | remote end (`Target.createTarget`) |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

// ============================================================================
// CommandId
// ============================================================================

/// Identifier correlating a command with its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(u64);

impl CommandId {
    /// Creates a command id from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// CommandIdGenerator
// ============================================================================

/// Monotonic id source owned by one connection.
///
/// Ids start at 1 and are never reused for the generator's lifetime.
#[derive(Debug)]
pub struct CommandIdGenerator {
    next: AtomicU64,
}

impl CommandIdGenerator {
    /// Creates a generator whose first id is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocates the next id.
    #[inline]
    pub fn next_id(&self) -> CommandId {
        CommandId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for CommandIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SessionId
// ============================================================================

/// Identifier of a session attached to a target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ============================================================================
// TargetId
// ============================================================================

/// Identifier of a controllable target (page, worker, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TargetId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_is_monotonic() {
        let generator = CommandIdGenerator::new();
        let first = generator.next_id();
        let second = generator.next_id();
        assert_eq!(first.as_u64(), 1);
        assert!(second > first);
    }

    #[test]
    fn test_session_id_serializes_as_string() {
        let id = SessionId::from("ABC123");
        assert_eq!(serde_json::to_string(&id).expect("serialize"), "\"ABC123\"");
    }

    #[test]
    fn test_command_id_serializes_as_number() {
        let id = CommandId::new(7);
        assert_eq!(serde_json::to_string(&id).expect("serialize"), "7");
    }
}
