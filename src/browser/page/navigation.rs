//! Navigation and page lifecycle.

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::{Command, PageCommand};

use super::Page;

// ============================================================================
// Types
// ============================================================================

/// Outcome of a committed navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationResult {
    /// Frame that navigated.
    pub frame_id: String,
    /// Loader of the new document; absent for same-document navigations.
    pub loader_id: Option<String>,
}

// ============================================================================
// Page - Navigation
// ============================================================================

impl Page {
    /// Navigates the page to `url`.
    ///
    /// Resolves when the browser commits the navigation, not when the page
    /// has finished loading.
    ///
    /// # Errors
    ///
    /// - [`Error::Navigation`] if the browser reports `errorText`
    ///   (e.g. `net::ERR_NAME_NOT_RESOLVED`)
    /// - any session or protocol error
    pub async fn navigate(&self, url: &str) -> Result<NavigationResult> {
        debug!(target_id = %self.target_id(), url, "Navigating");

        let result = self
            .send_command(Command::Page(PageCommand::Navigate {
                url: url.to_string(),
            }))
            .await?;

        if let Some(error_text) = result.get("errorText").and_then(Value::as_str)
            && !error_text.is_empty()
        {
            return Err(Error::navigation(url, error_text));
        }

        Ok(NavigationResult {
            frame_id: result
                .get("frameId")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            loader_id: result
                .get("loaderId")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    /// Closes the page.
    ///
    /// The session detaches once the browser reports the target gone.
    pub async fn close(&self) -> Result<()> {
        debug!(target_id = %self.target_id(), "Closing page");
        self.send_command(Command::Page(PageCommand::Close)).await?;
        Ok(())
    }
}
