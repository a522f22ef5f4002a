//! Command definitions organized by domain.
//!
//! Commands follow `Domain.method` format. Each domain enum is adjacently
//! tagged so it serializes straight into the `method`/`params` pair of a
//! [`Request`](super::Request).
//!
//! # Command Domains
//!
//! | Domain | Commands |
//! |--------|----------|
//! | `Target` | Create, attach, detach, close targets |
//! | `Page` | Navigation, capture, close |
//! | `Runtime` | Script evaluation |
//! | `Emulation` | Viewport metrics |
//! | `Browser` | Version, shutdown |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::{SessionId, TargetId};

// ============================================================================
// Command Wrapper
// ============================================================================

/// All typed protocol commands organized by domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Command {
    /// Target domain commands.
    Target(TargetCommand),
    /// Page domain commands.
    Page(PageCommand),
    /// Runtime domain commands.
    Runtime(RuntimeCommand),
    /// Emulation domain commands.
    Emulation(EmulationCommand),
    /// Browser domain commands.
    Browser(BrowserCommand),
}

impl Command {
    /// Splits the command into its wire `method` and `params`.
    ///
    /// Commands without parameters yield an empty object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails, or
    /// [`Error::InvalidMessage`] if the serialized form has no method.
    pub fn into_parts(self) -> Result<(String, Value)> {
        let mut value = serde_json::to_value(&self)?;

        let method = match value.get_mut("method").map(Value::take) {
            Some(Value::String(method)) => method,
            _ => return Err(Error::invalid_message("command serialized without a method")),
        };

        let params = value
            .get_mut("params")
            .map(Value::take)
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));

        Ok((method, params))
    }
}

// ============================================================================
// Target Commands
// ============================================================================

/// Target domain commands for creating and attaching to targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum TargetCommand {
    /// Create a new page target.
    #[serde(rename = "Target.createTarget")]
    CreateTarget {
        /// Initial URL.
        url: String,
    },

    /// Attach to a target, creating a session.
    #[serde(rename = "Target.attachToTarget", rename_all = "camelCase")]
    AttachToTarget {
        /// Target to attach to.
        target_id: TargetId,
        /// Multiplex the session over the browser connection.
        flatten: bool,
    },

    /// Detach a session.
    #[serde(rename = "Target.detachFromTarget", rename_all = "camelCase")]
    DetachFromTarget {
        /// Session to detach.
        session_id: SessionId,
    },

    /// Close a target.
    #[serde(rename = "Target.closeTarget", rename_all = "camelCase")]
    CloseTarget {
        /// Target to close.
        target_id: TargetId,
    },

    /// Toggle `targetCreated`/`targetDestroyed` notifications.
    #[serde(rename = "Target.setDiscoverTargets")]
    SetDiscoverTargets {
        /// Whether to discover targets.
        discover: bool,
    },
}

// ============================================================================
// Page Commands
// ============================================================================

/// Page domain commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum PageCommand {
    /// Enable page events.
    #[serde(rename = "Page.enable")]
    Enable,

    /// Navigate the main frame.
    #[serde(rename = "Page.navigate")]
    Navigate {
        /// URL to navigate to.
        url: String,
    },

    /// Capture a screenshot.
    #[serde(rename = "Page.captureScreenshot")]
    CaptureScreenshot(ScreenshotParams),

    /// Print the page to PDF.
    #[serde(rename = "Page.printToPDF")]
    PrintToPdf(PdfParams),

    /// Close the page.
    #[serde(rename = "Page.close")]
    Close,
}

// ============================================================================
// Runtime Commands
// ============================================================================

/// Runtime domain commands for script evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum RuntimeCommand {
    /// Enable runtime events.
    #[serde(rename = "Runtime.enable")]
    Enable,

    /// Evaluate an expression in the page's main world.
    #[serde(rename = "Runtime.evaluate", rename_all = "camelCase")]
    Evaluate {
        /// Expression source.
        expression: String,
        /// Return a JSON value instead of a remote object reference.
        return_by_value: bool,
        /// Await a returned promise.
        await_promise: bool,
    },
}

// ============================================================================
// Emulation Commands
// ============================================================================

/// Emulation domain commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum EmulationCommand {
    /// Override the device metrics (viewport).
    #[serde(rename = "Emulation.setDeviceMetricsOverride")]
    SetDeviceMetricsOverride(Viewport),
}

// ============================================================================
// Browser Commands
// ============================================================================

/// Browser domain commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum BrowserCommand {
    /// Query product and protocol versions.
    #[serde(rename = "Browser.getVersion")]
    GetVersion,

    /// Close the browser gracefully.
    #[serde(rename = "Browser.close")]
    Close,
}

// ============================================================================
// Parameter Types
// ============================================================================

/// Viewport metrics applied through device emulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    /// Width in CSS pixels.
    pub width: u32,
    /// Height in CSS pixels.
    pub height: u32,
    /// Device pixel ratio.
    pub device_scale_factor: f64,
    /// Emulate a mobile device.
    pub mobile: bool,
}

impl Viewport {
    /// Creates a desktop viewport with a scale factor of 1.
    #[inline]
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            device_scale_factor: 1.0,
            mobile: false,
        }
    }

    /// Sets the device pixel ratio.
    #[inline]
    #[must_use]
    pub fn with_scale_factor(mut self, scale: f64) -> Self {
        self.device_scale_factor = scale;
        self
    }

    /// Enables mobile emulation.
    #[inline]
    #[must_use]
    pub fn with_mobile(mut self) -> Self {
        self.mobile = true;
        self
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

/// Encoding of a captured screenshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Lossless PNG.
    #[default]
    Png,
    /// JPEG (honours `quality`).
    Jpeg,
    /// WebP (honours `quality`).
    Webp,
}

/// Rectangle to capture, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
    /// Scale applied to the capture.
    pub scale: f64,
}

/// Parameters of `Page.captureScreenshot`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotParams {
    /// Image encoding.
    pub format: ImageFormat,
    /// Compression quality (0-100), JPEG/WebP only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
    /// Region to capture.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clip: Option<Clip>,
    /// Capture content outside the viewport.
    pub capture_beyond_viewport: bool,
    /// Capture from the compositor surface.
    pub from_surface: bool,
}

impl Default for ScreenshotParams {
    fn default() -> Self {
        Self {
            format: ImageFormat::Png,
            quality: None,
            clip: None,
            capture_beyond_viewport: false,
            from_surface: true,
        }
    }
}

/// Parameters of `Page.printToPDF`.
///
/// Sizes are in inches, matching the protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfParams {
    /// Landscape orientation.
    pub landscape: bool,
    /// Print background graphics.
    pub print_background: bool,
    /// Rendering scale.
    pub scale: f64,
    /// Paper width.
    pub paper_width: f64,
    /// Paper height.
    pub paper_height: f64,
    /// Top margin.
    pub margin_top: f64,
    /// Bottom margin.
    pub margin_bottom: f64,
    /// Left margin.
    pub margin_left: f64,
    /// Right margin.
    pub margin_right: f64,
    /// Page ranges such as `1-5, 8`; empty prints everything.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub page_ranges: String,
    /// Prefer the page's CSS `@page` size.
    #[serde(rename = "preferCSSPageSize")]
    pub prefer_css_page_size: bool,
}

impl Default for PdfParams {
    fn default() -> Self {
        Self {
            landscape: false,
            print_background: false,
            scale: 1.0,
            paper_width: 8.5,
            paper_height: 11.0,
            margin_top: 0.4,
            margin_bottom: 0.4,
            margin_left: 0.4,
            margin_right: 0.4,
            page_ranges: String::new(),
            prefer_css_page_size: false,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
