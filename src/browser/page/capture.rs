//! Screenshot and PDF capture.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::{Command, ImageFormat, PageCommand, PdfParams, ScreenshotParams};

use super::Page;

// ============================================================================
// Types
// ============================================================================

/// What to capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    /// Raster image of the viewport (or clip).
    Screenshot,
    /// Printed document.
    Pdf,
}

/// Capture request: kind plus its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOptions {
    /// `Page.captureScreenshot`.
    Screenshot(ScreenshotParams),
    /// `Page.printToPDF`.
    Pdf(PdfParams),
}

impl CaptureOptions {
    /// PNG screenshot with default settings.
    #[must_use]
    pub fn png() -> Self {
        Self::Screenshot(ScreenshotParams::default())
    }

    /// JPEG screenshot with `quality` (0-100).
    #[must_use]
    pub fn jpeg(quality: u8) -> Self {
        Self::Screenshot(ScreenshotParams {
            format: ImageFormat::Jpeg,
            quality: Some(quality.min(100)),
            ..ScreenshotParams::default()
        })
    }

    /// Letter-size PDF with default margins.
    #[must_use]
    pub fn pdf() -> Self {
        Self::Pdf(PdfParams::default())
    }

    /// Returns the capture kind.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> CaptureKind {
        match self {
            Self::Screenshot(_) => CaptureKind::Screenshot,
            Self::Pdf(_) => CaptureKind::Pdf,
        }
    }

    fn into_command(self) -> Command {
        match self {
            Self::Screenshot(params) => Command::Page(PageCommand::CaptureScreenshot(params)),
            Self::Pdf(params) => Command::Page(PageCommand::PrintToPdf(params)),
        }
    }
}

// ============================================================================
// Page - Capture
// ============================================================================

impl Page {
    /// Captures the page and returns the raw bytes (image or PDF).
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidMessage`] if the result lacks decodable `data`
    /// - any session or protocol error
    pub async fn capture(&self, options: CaptureOptions) -> Result<Vec<u8>> {
        let kind = options.kind();
        debug!(target_id = %self.target_id(), ?kind, "Capturing");

        let result = self.send_command(options.into_command()).await?;

        let data = result
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::invalid_message(format!("{kind:?} result missing data field")))?;

        Base64Standard
            .decode(data)
            .map_err(|e| Error::invalid_message(format!("Failed to decode {kind:?} data: {e}")))
    }

    /// Captures a PNG screenshot.
    ///
    /// Shorthand for `page.capture(CaptureOptions::png())`.
    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        self.capture(CaptureOptions::png()).await
    }

    /// Prints the page to PDF with default settings.
    pub async fn pdf(&self) -> Result<Vec<u8>> {
        self.capture(CaptureOptions::pdf()).await
    }
}

// ============================================================================
// Tests
// ============================================================================
