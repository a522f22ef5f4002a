//! Page handle: one attached page target.
//!
//! A [`Page`] wraps the [`Session`](crate::transport::Session) attached to a
//! page target. Each operation is a single protocol command on that session.
//!
//! # Operations
//!
//! | Operation | Command |
//! |-----------|---------|
//! | [`Page::navigate`] | `Page.navigate` |
//! | [`Page::evaluate`] | `Runtime.evaluate` |
//! | [`Page::capture`] | `Page.captureScreenshot` / `Page.printToPDF` |
//! | [`Page::set_viewport`] | `Emulation.setDeviceMetricsOverride` |
//! | [`Page::close`] | `Page.close` |

// ============================================================================
// Submodules
// ============================================================================

mod capture;
mod core;
mod navigation;
mod script;
mod viewport;

// ============================================================================
// Re-exports
// ============================================================================

pub use capture::{CaptureKind, CaptureOptions};
pub use core::Page;
pub use navigation::NavigationResult;

// ============================================================================
// Tests
// ============================================================================
