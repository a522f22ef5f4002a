//! Browser handle: one process, one connection, many pages.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::{SessionId, TargetId};
use crate::launcher::{BrowserProcess, LaunchOptions, ProcessLauncher};
use crate::protocol::{BrowserCommand, Command, TargetCommand, Viewport};
use crate::sync::TaskQueue;
use crate::transport::{Connection, ConnectionConfig};

use super::builder::BrowserBuilder;
use super::page::Page;

// ============================================================================
// Constants
// ============================================================================

/// Time allowed for `Browser.close` to be acknowledged.
const CLOSE_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Time allowed for the process to exit after `Browser.close`.
const EXIT_TIMEOUT: Duration = Duration::from_secs(5);

/// URL every new page starts at.
const BLANK_PAGE: &str = "about:blank";

// ============================================================================
// Types
// ============================================================================

/// Product and protocol versions reported by the browser.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserVersion {
    /// Protocol version, e.g. `1.3`.
    pub protocol_version: String,
    /// Product name and version, e.g. `HeadlessChrome/120.0.6099.0`.
    pub product: String,
    /// Source revision.
    #[serde(default)]
    pub revision: String,
    /// Default user agent.
    #[serde(default)]
    pub user_agent: String,
    /// JavaScript engine version.
    #[serde(default)]
    pub js_version: String,
}

/// Internal shared state for a browser.
pub(crate) struct BrowserInner {
    connection: Connection,
    /// Owned process; `None` when attached to an external browser.
    process: tokio::sync::Mutex<Option<BrowserProcess>>,
    pid: Option<u32>,
    ws_endpoint: Url,
    default_viewport: Option<Viewport>,
    /// Serializes the create-then-attach sequence of `new_page`.
    task_queue: TaskQueue,
    pages: Mutex<Vec<Page>>,
    closed: AtomicBool,
}

// ============================================================================
// Browser
// ============================================================================

/// A handle to a browser.
///
/// Owns the browser process (when launched), the protocol connection, and
/// the profile directory. Dropping the last handle of a launched browser
/// kills the process; [`close`](Self::close) shuts it down gracefully.
///
/// # Example
///
/// ```no_run
/// use headless_remote::Browser;
///
/// # async fn example() -> headless_remote::Result<()> {
/// let browser = Browser::builder()
///     .executable("/usr/bin/chromium")
///     .launch()
///     .await?;
///
/// let page = browser.new_page().await?;
/// page.navigate("https://example.com").await?;
/// let png = page.screenshot().await?;
///
/// browser.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Browser {
    pub(crate) inner: Arc<BrowserInner>,
}

impl fmt::Debug for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Browser")
            .field("ws_endpoint", &self.inner.ws_endpoint.as_str())
            .field("pid", &self.inner.pid)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Browser - Constructors
// ============================================================================

impl Browser {
    /// Creates a builder for launching a browser.
    #[inline]
    #[must_use]
    pub fn builder() -> BrowserBuilder {
        BrowserBuilder::new()
    }

    /// Launches a browser process and connects to it.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `options` are invalid
    /// - [`Error::ProcessLaunchFailed`], [`Error::LaunchTimeout`],
    ///   [`Error::ProcessExited`] from the launcher
    /// - [`Error::Connection`] if the WebSocket handshake fails
    pub async fn launch(options: LaunchOptions) -> Result<Self> {
        let mut process = ProcessLauncher::new(options.clone()).launch().await?;

        let Some(endpoint) = process.endpoint().cloned() else {
            process.cleanup().await;
            return Err(Error::invalid_state("Browser launched without an endpoint"));
        };

        let config = ConnectionConfig::default().with_protocol_timeout(options.protocol_timeout);
        let connection = match Connection::connect(&endpoint, config).await {
            Ok(connection) => connection,
            Err(e) => {
                warn!(error = %e, "Connecting to launched browser failed");
                process.cleanup().await;
                return Err(e);
            }
        };

        let pid = process.pid();
        info!(pid, endpoint = %endpoint, "Browser launched");

        Ok(Self::from_parts(
            connection,
            Some(process),
            endpoint,
            options.default_viewport,
        ))
    }

    /// Connects to an already running browser.
    ///
    /// The process is not owned: [`close`](Self::close) only disconnects.
    pub async fn connect(endpoint: &Url) -> Result<Self> {
        let connection = Connection::connect(endpoint, ConnectionConfig::default()).await?;
        info!(endpoint = %endpoint, "Connected to browser");
        Ok(Self::from_connection(connection, endpoint.clone()))
    }

    /// Wraps an established connection to a browser not owned by us.
    pub(crate) fn from_connection(connection: Connection, endpoint: Url) -> Self {
        Self::from_parts(connection, None, endpoint, Some(Viewport::default()))
    }

    fn from_parts(
        connection: Connection,
        process: Option<BrowserProcess>,
        ws_endpoint: Url,
        default_viewport: Option<Viewport>,
    ) -> Self {
        Self {
            inner: Arc::new(BrowserInner {
                connection,
                pid: process.as_ref().map(BrowserProcess::pid),
                process: tokio::sync::Mutex::new(process),
                ws_endpoint,
                default_viewport,
                task_queue: TaskQueue::reentrant(),
                pages: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }
}

// ============================================================================
// Browser - Accessors
// ============================================================================

impl Browser {
    /// Returns the WebSocket endpoint.
    #[inline]
    #[must_use]
    pub fn ws_endpoint(&self) -> &Url {
        &self.inner.ws_endpoint
    }

    /// Returns the process id of a launched browser.
    #[inline]
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.inner.pid
    }

    /// Returns the protocol connection.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.inner.connection
    }

    /// Returns `true` once closed or disconnected.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire) || self.inner.connection.is_closed()
    }

    /// Returns the open pages created through this handle.
    #[must_use]
    pub fn pages(&self) -> Vec<Page> {
        let mut pages = self.inner.pages.lock();
        pages.retain(|page| !page.is_closed());
        pages.clone()
    }

    /// Returns the number of open pages.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages().len()
    }

    /// Queries product and protocol versions.
    pub async fn version(&self) -> Result<BrowserVersion> {
        let result = self
            .inner
            .connection
            .execute(Command::Browser(BrowserCommand::GetVersion), None)
            .await?;
        Ok(serde_json::from_value(result)?)
    }
}

// ============================================================================
// Browser - Pages
// ============================================================================

impl Browser {
    /// Opens a new blank page.
    ///
    /// Creation and attachment run as one unit: concurrent callers are
    /// served one at a time.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the browser is closed
    /// - [`Error::InvalidMessage`] if the browser's answers lack ids
    /// - any protocol error from `Target.createTarget` / `Target.attachToTarget`
    pub async fn new_page(&self) -> Result<Page> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        let page = self
            .inner
            .task_queue
            .enqueue(|| self.create_and_attach())
            .await?;

        if let Some(viewport) = self.inner.default_viewport
            && let Err(e) = page.set_viewport(viewport).await
        {
            self.discard_page(&page).await;
            return Err(e);
        }

        self.inner.pages.lock().push(page.clone());
        Ok(page)
    }

    /// Closes the target of a page that failed setup and drops its session.
    async fn discard_page(&self, page: &Page) {
        debug!(target_id = %page.target_id(), "Discarding page after failed setup");

        let close = Command::Target(TargetCommand::CloseTarget {
            target_id: page.target_id().clone(),
        });
        if let Err(e) = self.inner.connection.execute(close, None).await {
            debug!(error = %e, "Closing discarded target failed");
        }
        if let Err(e) = page.session().detach().await {
            debug!(error = %e, "Detaching discarded session failed");
        }
    }

    async fn create_and_attach(&self) -> Result<Page> {
        let connection = &self.inner.connection;

        let created = connection
            .execute(
                Command::Target(TargetCommand::CreateTarget {
                    url: BLANK_PAGE.to_string(),
                }),
                None,
            )
            .await?;
        let target_id = created
            .get("targetId")
            .and_then(Value::as_str)
            .map(TargetId::from)
            .ok_or_else(|| Error::invalid_message("createTarget result missing targetId"))?;

        let attached = connection
            .execute(
                Command::Target(TargetCommand::AttachToTarget {
                    target_id: target_id.clone(),
                    flatten: true,
                }),
                None,
            )
            .await?;
        let session_id = attached
            .get("sessionId")
            .and_then(Value::as_str)
            .map(SessionId::from)
            .ok_or_else(|| Error::invalid_message("attachToTarget result missing sessionId"))?;

        // Normally registered by the attach event, which precedes the response.
        let session = match connection.session(&session_id) {
            Some(session) => session,
            None => connection.attach_session(session_id, target_id.clone(), None)?,
        };

        debug!(target_id = %target_id, session_id = %session.id(), "Page attached");
        Ok(Page::new(session))
    }
}

// ============================================================================
// Browser - Lifecycle
// ============================================================================

impl Browser {
    /// Closes the browser.
    ///
    /// Asks the browser to exit, waits for the process, and kills it if it
    /// lingers. The connection is always closed and the temporary profile
    /// removed. Idempotent.
    pub async fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        debug!(endpoint = %self.inner.ws_endpoint, "Closing browser");
        let mut process = self.inner.process.lock().await;

        if let Some(process) = process.as_mut() {
            if let Err(e) = self.request_close().await {
                debug!(error = %e, "Browser.close not acknowledged");
            }

            match process.ensure_exit(EXIT_TIMEOUT).await {
                Ok(outcome) => debug!(?outcome, "Browser process ended"),
                Err(e) => {
                    warn!(error = %e, "Waiting for browser exit failed, killing");
                    if let Err(e) = process.kill().await {
                        warn!(error = %e, "Force kill failed");
                    }
                }
            }
        }

        self.inner.connection.close().await;
        self.inner.task_queue.dispose().await;
        self.inner.pages.lock().clear();

        if let Some(process) = process.take() {
            process.cleanup().await;
        }

        info!(endpoint = %self.inner.ws_endpoint, "Browser closed");
        Ok(())
    }

    async fn request_close(&self) -> Result<()> {
        let (method, params) = Command::Browser(BrowserCommand::Close).into_parts()?;
        self.inner
            .connection
            .send_with_timeout(&method, params, None, CLOSE_COMMAND_TIMEOUT)
            .await?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
