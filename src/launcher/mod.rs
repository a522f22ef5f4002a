//! Browser process management.
//!
//! Spawns the browser with a remote-debugging port, waits for it to
//! announce its WebSocket endpoint, and guarantees it is gone afterwards.
//!
//! # Example
//!
//! ```no_run
//! use headless_remote::launcher::{LaunchOptions, ProcessLauncher};
//!
//! # async fn example() -> headless_remote::Result<()> {
//! let options = LaunchOptions::new().with_executable("/usr/bin/chromium");
//! let mut process = ProcessLauncher::new(options).launch().await?;
//! println!("endpoint: {:?}", process.endpoint());
//! process.ensure_exit(std::time::Duration::from_secs(5)).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `options` | [`LaunchOptions`] and argument building |
//! | `process` | [`BrowserProcess`] lifecycle |
//! | `profile` | Temporary and caller-owned profile directories |
//! | `readiness` | Endpoint announcement detection |

// ============================================================================
// Imports
// ============================================================================

use std::process::Stdio;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::error::{Error, Result};

// ============================================================================
// Submodules
// ============================================================================

/// Launch options.
pub mod options;

/// Spawned process handle.
pub mod process;

/// Profile directories.
pub mod profile;

/// Endpoint announcement detection.
pub mod readiness;

// ============================================================================
// Re-exports
// ============================================================================

pub use options::{DEFAULT_LAUNCH_TIMEOUT, LaunchOptions};
pub use process::{BrowserProcess, ExitOutcome};
pub use profile::UserDataDir;
pub use readiness::ReadinessScanner;

use readiness::{OutputLog, spawn_output_pump};

// ============================================================================
// ProcessLauncher
// ============================================================================

/// Spawns browser processes from [`LaunchOptions`].
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    options: LaunchOptions,
}

impl ProcessLauncher {
    /// Creates a launcher.
    #[must_use]
    pub fn new(options: LaunchOptions) -> Self {
        Self { options }
    }

    /// Returns the options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &LaunchOptions {
        &self.options
    }

    /// Spawns the process without waiting for readiness.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if options are invalid or no executable is set
    /// - [`Error::ProcessLaunchFailed`] if the process cannot be spawned
    pub fn spawn(&self) -> Result<BrowserProcess> {
        self.options.validate()?;

        let executable = self
            .options
            .executable
            .as_ref()
            .ok_or_else(|| Error::config("No browser executable configured"))?;

        let user_data_dir = match &self.options.user_data_dir {
            Some(path) => UserDataDir::from_path(path)?,
            None => UserDataDir::temporary()?,
        };

        let mut command = Command::new(executable);
        command
            .args(self.options.to_args(user_data_dir.path()))
            .envs(self.options.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(if self.options.dumpio {
                Stdio::inherit()
            } else {
                Stdio::null()
            })
            .stderr(Stdio::piped());

        if let Some(dir) = &self.options.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(Error::process_launch_failed)?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::config("Browser stderr was not captured"))?;

        let output = Arc::new(Mutex::new(OutputLog::default()));
        let (ready_tx, ready_rx) = oneshot::channel();
        let pump = spawn_output_pump(
            stderr,
            ReadinessScanner::new()?,
            Arc::clone(&output),
            ready_tx,
            self.options.dumpio,
        );

        let process = BrowserProcess::new(child, output, ready_rx, pump, user_data_dir);
        info!(
            pid = process.pid(),
            executable = %executable.display(),
            "Browser process spawned"
        );

        Ok(process)
    }

    /// Spawns the process and waits for its endpoint.
    ///
    /// On failure the process is gone and a temporary profile removed.
    ///
    /// # Errors
    ///
    /// Everything [`spawn`](Self::spawn) returns, plus [`Error::LaunchTimeout`]
    /// and [`Error::ProcessExited`].
    pub async fn launch(&self) -> Result<BrowserProcess> {
        let mut process = self.spawn()?;

        match process.wait_for_endpoint(self.options.launch_timeout).await {
            Ok(_) => Ok(process),
            Err(e) => {
                debug!(error = %e, "Launch failed, cleaning up");
                process.cleanup().await;
                Err(e)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
