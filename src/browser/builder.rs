//! Builder pattern for browser configuration.
//!
//! Provides a fluent API over [`LaunchOptions`] for launching a [`Browser`].
//!
//! # Example
//!
//! ```no_run
//! use headless_remote::Browser;
//!
//! # async fn example() -> headless_remote::Result<()> {
//! let browser = Browser::builder()
//!     .executable("/usr/bin/chromium")
//!     .arg("--no-sandbox")
//!     .launch()
//!     .await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::launcher::LaunchOptions;
use crate::protocol::Viewport;

use super::instance::Browser;

// ============================================================================
// Constants
// ============================================================================

/// Environment variables consulted, in order, when no executable is set.
pub const EXECUTABLE_ENV_VARS: [&str; 2] = ["CHROME_PATH", "PUPPETEER_EXECUTABLE_PATH"];

// ============================================================================
// BrowserBuilder
// ============================================================================

/// Builder for launching a [`Browser`].
///
/// Use [`Browser::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct BrowserBuilder {
    options: LaunchOptions,
}

impl BrowserBuilder {
    /// Creates a builder with default launch options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder starting from `options`.
    #[inline]
    #[must_use]
    pub fn from_options(options: LaunchOptions) -> Self {
        Self { options }
    }

    /// Sets the browser executable.
    #[inline]
    #[must_use]
    pub fn executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.options = self.options.with_executable(path);
        self
    }

    /// Shows the browser window.
    #[inline]
    #[must_use]
    pub fn headful(mut self) -> Self {
        self.options = self.options.with_headful();
        self
    }

    /// Appends a command-line argument.
    #[inline]
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.options = self.options.with_arg(arg);
        self
    }

    /// Appends several command-line arguments.
    #[must_use]
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.options = self.options.with_args(args);
        self
    }

    /// Uses an existing profile directory, kept after close.
    #[inline]
    #[must_use]
    pub fn user_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.options = self.options.with_user_data_dir(path);
        self
    }

    /// Sets an environment variable for the process.
    #[inline]
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options = self.options.with_env(key, value);
        self
    }

    /// Bounds the wait for the readiness line.
    #[inline]
    #[must_use]
    pub fn launch_timeout(mut self, timeout: Duration) -> Self {
        self.options = self.options.with_launch_timeout(timeout);
        self
    }

    /// Sets the default per-command timeout; `None` waits forever.
    #[inline]
    #[must_use]
    pub fn protocol_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.options = self.options.with_protocol_timeout(timeout);
        self
    }

    /// Echoes browser output into the log.
    #[inline]
    #[must_use]
    pub fn dumpio(mut self) -> Self {
        self.options = self.options.with_dumpio();
        self
    }

    /// Sets the viewport applied to new pages; `None` keeps the browser's.
    #[inline]
    #[must_use]
    pub fn default_viewport(mut self, viewport: Option<Viewport>) -> Self {
        self.options = self.options.with_default_viewport(viewport);
        self
    }

    /// Resolves and validates the launch options.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no executable is set and none of
    ///   [`EXECUTABLE_ENV_VARS`] is present, or options are inconsistent
    /// - [`Error::BrowserNotFound`] if the executable does not exist
    pub fn build(self) -> Result<LaunchOptions> {
        let executable = self.resolve_executable()?;
        let options = self.options.with_executable(executable);
        options.validate()?;
        Ok(options)
    }

    /// Builds the options and launches the browser.
    pub async fn launch(self) -> Result<Browser> {
        Browser::launch(self.build()?).await
    }
}

// ============================================================================
// Validation
// ============================================================================

impl BrowserBuilder {
    fn resolve_executable(&self) -> Result<PathBuf> {
        let executable = self
            .options
            .executable
            .clone()
            .or_else(|| {
                EXECUTABLE_ENV_VARS
                    .iter()
                    .find_map(|var| std::env::var_os(var).filter(|v| !v.is_empty()))
                    .map(PathBuf::from)
            })
            .ok_or_else(|| {
                Error::config(
                    "Browser executable is required. Use .executable() or set CHROME_PATH.\n\
                     Example: Browser::builder().executable(\"/usr/bin/chromium\")",
                )
            })?;

        if !executable.exists() {
            return Err(Error::browser_not_found(&executable));
        }

        Ok(executable)
    }
}

// ============================================================================
// Tests
// ============================================================================
