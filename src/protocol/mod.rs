//! Remote-control protocol message types.
//!
//! This module defines the JSON messages exchanged with the browser.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Local → Remote | Command request |
//! | `Response` | Remote → Local | Command response |
//! | `Event` | Remote → Local | Unsolicited notification |
//!
//! # Command Naming
//!
//! Commands follow `Domain.method` format:
//!
//! - `Target.createTarget`
//! - `Page.navigate`
//! - `Runtime.evaluate`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Typed command definitions by domain |
//! | `event` | Event and typed event views |
//! | `request` | Request, Response and inbound classification |

// ============================================================================
// Submodules
// ============================================================================

/// Command definitions organized by domain.
pub mod command;

/// Event message types.
pub mod event;

/// Request and Response message types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{
    BrowserCommand, Clip, Command, EmulationCommand, ImageFormat, PageCommand, PdfParams,
    RuntimeCommand, ScreenshotParams, TargetCommand, Viewport,
};
pub use event::{Event, ParsedEvent, TargetInfo};
pub use request::{Message, Request, Response, ResponseError};
