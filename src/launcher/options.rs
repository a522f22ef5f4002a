//! Browser process options.
//!
//! Provides a type-safe interface for configuring how the browser is
//! spawned: executable, flags, profile directory, environment, timeouts.
//!
//! # Example
//!
//! ```ignore
//! use headless_remote::LaunchOptions;
//!
//! let options = LaunchOptions::new()
//!     .with_executable("/usr/bin/chromium")
//!     .with_arg("--lang=en-US")
//!     .with_dumpio();
//!
//! let args = options.to_args(Path::new("/tmp/profile"));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::protocol::Viewport;
use crate::transport::connection::DEFAULT_PROTOCOL_TIMEOUT;

// ============================================================================
// Constants
// ============================================================================

/// Default time to wait for the readiness line.
pub const DEFAULT_LAUNCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Flags that make an automation browser quiet and deterministic.
const DEFAULT_ARGS: &[&str] = &[
    "--allow-pre-commit-input",
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-breakpad",
    "--disable-client-side-phishing-detection",
    "--disable-component-extensions-with-background-pages",
    "--disable-component-update",
    "--disable-default-apps",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--disable-features=Translate,BackForwardCache,AcceptCHFrame,MediaRouter,OptimizationHints",
    "--disable-hang-monitor",
    "--disable-ipc-flooding-protection",
    "--disable-popup-blocking",
    "--disable-prompt-on-repost",
    "--disable-renderer-backgrounding",
    "--disable-sync",
    "--enable-automation",
    "--export-tagged-pdf",
    "--force-color-profile=srgb",
    "--metrics-recording-only",
    "--no-first-run",
    "--password-store=basic",
    "--use-mock-keychain",
];

/// Extra flags for headless runs.
const HEADLESS_ARGS: &[&str] = &["--headless=new", "--hide-scrollbars", "--mute-audio"];

// ============================================================================
// LaunchOptions
// ============================================================================

/// Browser process configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchOptions {
    /// Browser executable. Required before launch.
    pub executable: Option<PathBuf>,

    /// Run without a visible window.
    pub headless: bool,

    /// Additional command-line arguments, appended after the defaults.
    pub args: Vec<String>,

    /// Skip the built-in default flags (including the headless ones).
    pub ignore_default_args: bool,

    /// Profile directory. A temporary one is created (and removed) when `None`.
    pub user_data_dir: Option<PathBuf>,

    /// Working directory of the process.
    pub working_dir: Option<PathBuf>,

    /// Extra environment variables.
    pub env: Vec<(String, String)>,

    /// Time allowed for the browser to print its endpoint.
    pub launch_timeout: Duration,

    /// Per-command protocol timeout. `None` waits forever.
    pub protocol_timeout: Option<Duration>,

    /// Echo the browser's stdout/stderr.
    pub dumpio: bool,

    /// Viewport applied to every new page. `None` keeps the browser's own.
    pub default_viewport: Option<Viewport>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl LaunchOptions {
    /// Creates headless options with default timeouts.
    #[must_use]
    pub fn new() -> Self {
        Self {
            executable: None,
            headless: true,
            args: Vec::new(),
            ignore_default_args: false,
            user_data_dir: None,
            working_dir: None,
            env: Vec::new(),
            launch_timeout: DEFAULT_LAUNCH_TIMEOUT,
            protocol_timeout: Some(DEFAULT_PROTOCOL_TIMEOUT),
            dumpio: false,
            default_viewport: Some(Viewport::default()),
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl LaunchOptions {
    /// Sets the browser executable.
    #[inline]
    #[must_use]
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    /// Shows the browser window.
    #[inline]
    #[must_use]
    pub fn with_headful(mut self) -> Self {
        self.headless = false;
        self
    }

    /// Adds a command-line argument.
    #[inline]
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds multiple command-line arguments.
    #[inline]
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Launches with only the caller's arguments.
    #[inline]
    #[must_use]
    pub fn with_ignore_default_args(mut self) -> Self {
        self.ignore_default_args = true;
        self
    }

    /// Uses a caller-owned profile directory. It is never deleted.
    #[inline]
    #[must_use]
    pub fn with_user_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.user_data_dir = Some(path.into());
        self
    }

    /// Sets the process working directory.
    #[inline]
    #[must_use]
    pub fn with_working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(path.into());
        self
    }

    /// Adds an environment variable.
    #[inline]
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Sets the readiness timeout.
    #[inline]
    #[must_use]
    pub fn with_launch_timeout(mut self, timeout: Duration) -> Self {
        self.launch_timeout = timeout;
        self
    }

    /// Sets the per-command timeout.
    #[inline]
    #[must_use]
    pub fn with_protocol_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.protocol_timeout = timeout;
        self
    }

    /// Echoes browser output.
    #[inline]
    #[must_use]
    pub fn with_dumpio(mut self) -> Self {
        self.dumpio = true;
        self
    }

    /// Sets the viewport applied to new pages.
    #[inline]
    #[must_use]
    pub fn with_default_viewport(mut self, viewport: Option<Viewport>) -> Self {
        self.default_viewport = viewport;
        self
    }
}

// ============================================================================
// Conversion Methods
// ============================================================================

impl LaunchOptions {
    /// Builds the full argument list for a given profile directory.
    ///
    /// The debugging port is always 0 so the browser picks a free one and
    /// announces it on stderr.
    #[must_use]
    pub fn to_args(&self, user_data_dir: &Path) -> Vec<String> {
        let mut args = Vec::with_capacity(DEFAULT_ARGS.len() + HEADLESS_ARGS.len() + self.args.len() + 3);

        if !self.ignore_default_args {
            args.extend(DEFAULT_ARGS.iter().map(ToString::to_string));
            if self.headless {
                args.extend(HEADLESS_ARGS.iter().map(ToString::to_string));
            }
        }

        args.extend(self.args.iter().cloned());

        if !self.args.iter().any(|arg| arg.starts_with("--user-data-dir")) {
            args.push(format!("--user-data-dir={}", user_data_dir.display()));
        }
        if !self.args.iter().any(|arg| arg.starts_with("--remote-debugging-")) {
            args.push("--remote-debugging-port=0".to_string());
        }
        if !self.ignore_default_args && self.args.iter().all(|arg| arg.starts_with('-')) {
            args.push("about:blank".to_string());
        }

        args
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.launch_timeout.is_zero() {
            return Err(Error::config("Launch timeout must be greater than zero"));
        }
        if let Some(timeout) = self.protocol_timeout
            && timeout.is_zero()
        {
            return Err(Error::config("Protocol timeout must be greater than zero"));
        }
        if let Some(viewport) = &self.default_viewport
            && (viewport.width == 0 || viewport.height == 0)
        {
            return Err(Error::config("Viewport dimensions must be greater than zero"));
        }
        Ok(())
    }

    /// Returns `true` if headless mode is enabled.
    #[inline]
    #[must_use]
    pub const fn is_headless(&self) -> bool {
        self.headless
    }
}

// ============================================================================
// Tests
// ============================================================================
