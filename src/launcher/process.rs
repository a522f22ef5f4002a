//! Spawned browser process.

// ============================================================================
// Imports
// ============================================================================

use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::process::Child;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};

use super::profile::UserDataDir;
use super::readiness::OutputLog;

// ============================================================================
// Constants
// ============================================================================

/// Grace period for collecting the exit status once stderr has closed.
const EXIT_STATUS_GRACE: Duration = Duration::from_millis(500);

// ============================================================================
// ExitOutcome
// ============================================================================

/// How [`BrowserProcess::ensure_exit`] ended the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// It had exited before the call.
    AlreadyExited(Option<i32>),
    /// It exited on its own within the timeout.
    Exited(Option<i32>),
    /// It was force-killed after the timeout.
    Killed,
}

// ============================================================================
// BrowserProcess
// ============================================================================

/// A running (or exited) browser process.
///
/// Killed on drop if still running. The temporary profile, if any, is
/// removed by [`cleanup`](Self::cleanup) or, as a fallback, on drop.
pub struct BrowserProcess {
    child: Child,
    pid: u32,
    output: Arc<Mutex<OutputLog>>,
    ready: Option<oneshot::Receiver<Url>>,
    endpoint: Option<Url>,
    status: Option<ExitStatus>,
    kills: u32,
    pump: JoinHandle<()>,
    user_data_dir: Option<UserDataDir>,
}

impl std::fmt::Debug for BrowserProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserProcess")
            .field("pid", &self.pid)
            .field("endpoint", &self.endpoint)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl BrowserProcess {
    pub(crate) fn new(
        child: Child,
        output: Arc<Mutex<OutputLog>>,
        ready: oneshot::Receiver<Url>,
        pump: JoinHandle<()>,
        user_data_dir: UserDataDir,
    ) -> Self {
        let pid = child.id().unwrap_or(0);
        debug!(pid, "Browser process tracked");

        Self {
            child,
            pid,
            output,
            ready: Some(ready),
            endpoint: None,
            status: None,
            kills: 0,
            pump,
            user_data_dir: Some(user_data_dir),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Returns the process id.
    #[inline]
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Returns the announced endpoint, once known.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> Option<&Url> {
        self.endpoint.as_ref()
    }

    /// Returns the exit code, if the process exited normally.
    #[inline]
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        self.status.and_then(|status| status.code())
    }

    /// Returns `true` once the exit status has been collected.
    #[inline]
    #[must_use]
    pub fn has_exited(&self) -> bool {
        self.status.is_some()
    }

    /// Returns how many times the process was force-killed.
    #[inline]
    #[must_use]
    pub fn kill_count(&self) -> u32 {
        self.kills
    }

    /// Returns the captured tail of the diagnostic output.
    #[must_use]
    pub fn output(&self) -> String {
        self.output.lock().joined()
    }

    /// Returns the profile directory in use.
    #[must_use]
    pub fn user_data_dir(&self) -> Option<&UserDataDir> {
        self.user_data_dir.as_ref()
    }

    // ========================================================================
    // Readiness
    // ========================================================================

    /// Waits for the endpoint announcement.
    ///
    /// # Errors
    ///
    /// - [`Error::LaunchTimeout`] if nothing is announced in time; the
    ///   process is killed and its output attached
    /// - [`Error::ProcessExited`] if output ends before the announcement
    pub async fn wait_for_endpoint(&mut self, limit: Duration) -> Result<Url> {
        if let Some(url) = &self.endpoint {
            return Ok(url.clone());
        }

        let ready = self
            .ready
            .take()
            .ok_or_else(|| Error::invalid_state("readiness already failed"))?;

        match timeout(limit, ready).await {
            Ok(Ok(url)) => {
                info!(pid = self.pid, endpoint = %url, "Browser ready");
                self.endpoint = Some(url.clone());
                Ok(url)
            }

            Ok(Err(_)) => {
                // Output closed: collect the status, kill if it lingers.
                let code = match timeout(EXIT_STATUS_GRACE, self.child.wait()).await {
                    Ok(Ok(status)) => {
                        self.status = Some(status);
                        status.code()
                    }
                    _ => {
                        self.kill().await?;
                        None
                    }
                };
                self.drain_pump().await;
                warn!(pid = self.pid, ?code, "Browser exited before announcing endpoint");

                Err(Error::ProcessExited {
                    code,
                    output: self.output(),
                })
            }

            Err(_) => {
                let timeout_ms = limit.as_millis() as u64;
                warn!(pid = self.pid, timeout_ms, "Browser did not announce endpoint");
                self.kill().await?;
                Err(Error::launch_timeout(timeout_ms, self.output()))
            }
        }
    }

    // ========================================================================
    // Termination
    // ========================================================================

    /// Waits up to `limit` for the process to exit on its own, then kills it.
    ///
    /// The kill happens at most once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if waiting on or signalling the process fails.
    pub async fn ensure_exit(&mut self, limit: Duration) -> Result<ExitOutcome> {
        if let Some(status) = self.status {
            return Ok(ExitOutcome::AlreadyExited(status.code()));
        }
        if let Some(status) = self.child.try_wait()? {
            self.status = Some(status);
            return Ok(ExitOutcome::AlreadyExited(status.code()));
        }

        match timeout(limit, self.child.wait()).await {
            Ok(status) => {
                let status = status?;
                self.status = Some(status);
                debug!(pid = self.pid, code = ?status.code(), "Browser exited");
                Ok(ExitOutcome::Exited(status.code()))
            }
            Err(_) => {
                warn!(pid = self.pid, timeout_ms = limit.as_millis() as u64, "Browser did not exit, killing");
                self.kill().await?;
                Ok(ExitOutcome::Killed)
            }
        }
    }

    /// Force-kills the process and reaps it. No-op once it has exited.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the signal or the wait fails.
    pub async fn kill(&mut self) -> Result<()> {
        if self.status.is_some() {
            return Ok(());
        }

        self.kills += 1;
        self.child.kill().await?;
        self.status = self.child.try_wait()?;
        info!(pid = self.pid, "Browser process killed");
        Ok(())
    }

    /// Removes the temporary profile after making sure the process is gone.
    pub async fn cleanup(mut self) {
        if self.status.is_none()
            && let Err(e) = self.kill().await
        {
            debug!(pid = self.pid, error = %e, "Kill during cleanup failed");
        }
        self.drain_pump().await;

        if let Some(dir) = self.user_data_dir.take() {
            dir.remove().await;
        }
    }

    /// Lets the output pump reach EOF so captured output is complete.
    async fn drain_pump(&mut self) {
        if self.pump.is_finished() {
            return;
        }
        if timeout(EXIT_STATUS_GRACE, &mut self.pump).await.is_err() {
            self.pump.abort();
        }
    }
}

impl Drop for BrowserProcess {
    fn drop(&mut self) {
        if self.status.is_none()
            && let Err(e) = self.child.start_kill()
        {
            debug!(pid = self.pid, error = %e, "Failed to send kill signal in Drop");
        }
        self.pump.abort();
    }
}
