//! Concurrency primitives used by the connection and browser.
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`AsyncMessageQueue`] | Resolve pending calls off the dispatch loop |
//! | [`TaskQueue`] | Serialize multi-step sequences (target attach) |

// ============================================================================
// Submodules
// ============================================================================

/// Deferred resolution of pending calls.
pub mod message_queue;

/// Single-slot serialization with a reentrancy guard.
pub mod task_queue;

// ============================================================================
// Re-exports
// ============================================================================

pub use message_queue::AsyncMessageQueue;
pub use task_queue::TaskQueue;
