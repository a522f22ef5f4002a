//! Readiness detection on the browser's diagnostic output.
//!
//! The browser announces its endpoint on stderr:
//!
//! ```text
//! DevTools listening on ws://127.0.0.1:41235/devtools/browser/5c1f...
//! ```
//!
//! A pump task reads stderr line by line, keeps a bounded tail for error
//! reports, and fires once when the announcement appears.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Pattern of the endpoint announcement.
const READINESS_PATTERN: &str = r"^DevTools listening on (ws://.*)$";

/// Lines of output kept for error reports.
const OUTPUT_TAIL_LINES: usize = 100;

// ============================================================================
// ReadinessScanner
// ============================================================================

/// Matches the endpoint announcement.
#[derive(Debug, Clone)]
pub struct ReadinessScanner {
    pattern: Regex,
}

impl ReadinessScanner {
    /// Creates a scanner for the standard announcement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the pattern fails to compile.
    pub fn new() -> Result<Self> {
        Self::with_pattern(READINESS_PATTERN)
    }

    /// Creates a scanner for a custom pattern whose first group is the URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the pattern is invalid.
    pub fn with_pattern(pattern: &str) -> Result<Self> {
        let pattern =
            Regex::new(pattern).map_err(|e| Error::config(format!("Invalid readiness pattern: {e}")))?;
        Ok(Self { pattern })
    }

    /// Returns the endpoint if `line` is the announcement.
    #[must_use]
    pub fn scan(&self, line: &str) -> Option<Url> {
        let captured = self.pattern.captures(line.trim_end())?.get(1)?.as_str();
        match Url::parse(captured) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(line, error = %e, "Readiness line carries an invalid URL");
                None
            }
        }
    }
}

// ============================================================================
// OutputLog
// ============================================================================

/// Bounded tail of the browser's diagnostic output.
#[derive(Debug, Default)]
pub(crate) struct OutputLog {
    lines: VecDeque<String>,
}

impl OutputLog {
    pub(crate) fn push(&mut self, line: String) {
        if self.lines.len() == OUTPUT_TAIL_LINES {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub(crate) fn joined(&self) -> String {
        self.lines.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
    }
}

// ============================================================================
// Output Pump
// ============================================================================

/// Reads `stream` to EOF, capturing lines and reporting the endpoint once.
///
/// `ready` is dropped unfired if EOF comes first, which the waiter reads as
/// "exited before ready".
pub(crate) fn spawn_output_pump<R>(
    stream: R,
    scanner: ReadinessScanner,
    output: Arc<Mutex<OutputLog>>,
    ready: oneshot::Sender<Url>,
    echo: bool,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        let mut ready = Some(ready);

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if echo {
                        debug!(target: "headless_remote::browser_stderr", "{line}");
                    }
                    if let Some(url) = scanner.scan(&line)
                        && let Some(tx) = ready.take()
                    {
                        debug!(endpoint = %url, "Browser announced endpoint");
                        let _ = tx.send(url);
                    }
                    output.lock().push(line);
                }
                Ok(None) => break,
                Err(e) => {
                    debug!(error = %e, "Browser output read failed");
                    break;
                }
            }
        }
    })
}

// ============================================================================
// Tests
// ============================================================================
