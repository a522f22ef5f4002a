//! Browser and page handles.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Browser`] | Browser handle (owns process + connection) |
//! | [`BrowserBuilder`] | Fluent launch configuration |
//! | [`Page`] | Page handle (one attached session) |
//!
//! # Example
//!
//! ```no_run
//! use headless_remote::{Browser, Result};
//!
//! # async fn example() -> Result<()> {
//! let browser = Browser::builder()
//!     .executable("/usr/bin/chromium")
//!     .launch()
//!     .await?;
//!
//! let page = browser.new_page().await?;
//! page.navigate("https://example.com").await?;
//! let title = page.evaluate("() => document.title", &[]).await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Launch configuration builder.
pub mod builder;

/// Browser lifecycle and page creation.
pub mod instance;

/// Page operations.
pub mod page;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::BrowserBuilder;
pub use instance::{Browser, BrowserVersion};
pub use page::{CaptureKind, CaptureOptions, NavigationResult, Page};
