//! Browser profile (user data) directories.
//!
//! A launch either borrows a caller-supplied directory, which is left
//! untouched, or creates a temporary one that is removed after the browser
//! exits. The browser may still be flushing files when it exits, so removal
//! retries with backoff instead of failing on the first `ENOTEMPTY`.

// ============================================================================
// Imports
// ============================================================================

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Prefix of temporary profile directories.
const TEMP_PREFIX: &str = "headless-remote-profile-";

/// Removal attempts before giving up.
const REMOVE_ATTEMPTS: u32 = 5;

/// Delay before the second attempt; doubles after each failure.
const REMOVE_INITIAL_DELAY: Duration = Duration::from_millis(100);

// ============================================================================
// UserDataDir
// ============================================================================

/// A browser profile directory.
#[derive(Debug)]
pub struct UserDataDir {
    path: PathBuf,
    /// Created by us and removed by [`remove`](Self::remove).
    owned: bool,
    removed: bool,
}

impl UserDataDir {
    /// Creates a fresh temporary directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the directory cannot be created.
    pub fn temporary() -> Result<Self> {
        let temp_dir = TempDir::with_prefix(TEMP_PREFIX)
            .map_err(|e| Error::config(format!("Failed to create temp profile: {e}")))?;

        // Removal is ours to do (with retries), not TempDir's.
        let path = temp_dir.keep();
        debug!(path = %path.display(), "Created temporary profile");

        Ok(Self {
            path,
            owned: true,
            removed: false,
        })
    }

    /// Uses a caller-supplied directory, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the directory cannot be created.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if !path.exists() {
            fs::create_dir_all(&path).map_err(|e| {
                Error::config(format!(
                    "Failed to create profile directory at {}: {e}",
                    path.display()
                ))
            })?;
            debug!(path = %path.display(), "Created profile directory");
        }

        Ok(Self {
            path,
            owned: false,
            removed: false,
        })
    }

    /// Returns the directory path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` if the directory is temporary.
    #[inline]
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.owned
    }

    /// Removes a temporary directory, retrying while files are in use.
    ///
    /// Caller-supplied directories are kept. Failure after the last attempt
    /// is logged, not returned: cleanup never masks the caller's outcome.
    pub async fn remove(mut self) {
        if !self.owned {
            return;
        }

        let mut delay = REMOVE_INITIAL_DELAY;
        for attempt in 1..=REMOVE_ATTEMPTS {
            match tokio::fs::remove_dir_all(&self.path).await {
                Ok(()) => {
                    debug!(path = %self.path.display(), attempt, "Removed temporary profile");
                    self.removed = true;
                    return;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    self.removed = true;
                    return;
                }
                Err(e) if attempt == REMOVE_ATTEMPTS => {
                    warn!(path = %self.path.display(), error = %e, "Giving up on temporary profile");
                }
                Err(e) => {
                    debug!(path = %self.path.display(), attempt, error = %e, "Profile removal failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }

        // Already warned; don't retry from Drop.
        self.removed = true;
    }
}

impl Drop for UserDataDir {
    fn drop(&mut self) {
        if self.owned
            && !self.removed
            && let Err(e) = fs::remove_dir_all(&self.path)
            && e.kind() != ErrorKind::NotFound
        {
            debug!(path = %self.path.display(), error = %e, "Failed to remove profile in Drop");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
