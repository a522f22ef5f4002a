//! Connection and dispatch loop.
//!
//! This module multiplexes one transport into commands, responses, and
//! per-session event streams.
//!
//! # Dispatch Loop
//!
//! The connection spawns a tokio task that owns the transport and handles:
//!
//! - Incoming messages (responses, events), each decoded exactly once
//! - Outgoing commands from the Rust API
//! - Command/response correlation by id
//! - Session bookkeeping for `Target.attachedToTarget` / `Target.detachedFromTarget`
//!
//! Response resolution is handed to an [`AsyncMessageQueue`], so caller
//! work never runs on the dispatch task.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::{CommandId, CommandIdGenerator, SessionId, TargetId};
use crate::protocol::event::{TARGET_ATTACHED, TARGET_DETACHED};
use crate::protocol::{Command, Event, Message, ParsedEvent, Request, Response};
use crate::sync::AsyncMessageQueue;

use super::listeners::{EventListeners, EventStream};
use super::session::Session;
use super::websocket::WebSocketTransport;
use super::Transport;

// ============================================================================
// Constants
// ============================================================================

/// Default time to wait for a response.
pub const DEFAULT_PROTOCOL_TIMEOUT: Duration = Duration::from_secs(180);

/// Default cap on in-flight commands.
pub const DEFAULT_MAX_PENDING: usize = 1024;

/// Time scheduled resolutions get to deliver once the connection closes.
const RESOLUTION_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

// ============================================================================
// ConnectionConfig
// ============================================================================

/// Tunables for a [`Connection`].
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Time to wait for each response. `None` waits forever.
    pub protocol_timeout: Option<Duration>,

    /// Resolve responses on independent tasks instead of the dispatch loop.
    pub decoupled_resolution: bool,

    /// Maximum in-flight commands before new ones are rejected.
    pub max_pending: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            protocol_timeout: Some(DEFAULT_PROTOCOL_TIMEOUT),
            decoupled_resolution: true,
            max_pending: DEFAULT_MAX_PENDING,
        }
    }
}

impl ConnectionConfig {
    /// Sets the per-command timeout.
    #[must_use]
    pub fn with_protocol_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.protocol_timeout = timeout;
        self
    }

    /// Resolves responses inline on the dispatch loop.
    #[must_use]
    pub fn with_inline_resolution(mut self) -> Self {
        self.decoupled_resolution = false;
        self
    }

    /// Sets the in-flight command cap.
    #[must_use]
    pub fn with_max_pending(mut self, max: usize) -> Self {
        self.max_pending = max;
        self
    }
}

// ============================================================================
// Types
// ============================================================================

/// Completion handle for one in-flight command.
type Completion = oneshot::Sender<Result<Value>>;

/// One in-flight command.
struct PendingCall {
    method: String,
    session_id: Option<SessionId>,
    completion: Completion,
    sent_at: Instant,
}

/// Pending table. `closed` lives under the same lock so a call can never be
/// registered after the close drain.
#[derive(Default)]
struct PendingCalls {
    calls: FxHashMap<CommandId, PendingCall>,
    closed: bool,
}

/// Messages for the dispatch loop.
enum Outbound {
    /// Serialized request to write.
    Frame(String),
    /// Stop the loop and release the transport.
    Shutdown,
}

/// Why the connection closed.
#[derive(Debug, Clone)]
enum CloseReason {
    Local,
    RemoteClosed,
    Transport(String),
}

impl CloseReason {
    fn to_error(&self) -> Error {
        match self {
            Self::Transport(message) => Error::transport(message.clone()),
            Self::Local | Self::RemoteClosed => Error::ConnectionClosed,
        }
    }
}

// ============================================================================
// Connection
// ============================================================================

/// Multiplexed protocol connection.
///
/// Correlates commands with responses, routes events to sessions, and keeps
/// the session registry in sync with target attach/detach events.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync` and cheap to clone; all clones share one
/// dispatch loop. Closing any clone closes all of them, and dropping the
/// last clone closes the connection as well.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
    _owner: Arc<OwnerGuard>,
}

/// Shared by user-facing clones only; the dispatch loop and sessions never
/// hold one.
struct OwnerGuard {
    inner: Weak<ConnectionInner>,
}

impl Drop for OwnerGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade()
            && !inner.closed.load(Ordering::Acquire)
        {
            debug!("Last connection handle dropped, shutting down");
            inner.shutdown(CloseReason::Local);
        }
    }
}

/// State shared by every clone and the dispatch loop.
pub(crate) struct ConnectionInner {
    config: ConnectionConfig,
    ids: CommandIdGenerator,
    pending: Mutex<PendingCalls>,
    sessions: RwLock<FxHashMap<SessionId, Session>>,
    listeners: EventListeners,
    queue: AsyncMessageQueue,
    outbound_tx: mpsc::UnboundedSender<Outbound>,
    dispatch: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("closed", &self.is_closed())
            .field("pending", &self.pending_count())
            .field("sessions", &self.session_count())
            .finish()
    }
}

impl Connection {
    /// Takes ownership of `transport` and spawns the dispatch loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<T: Transport>(transport: T, config: ConnectionConfig) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(ConnectionInner {
            queue: AsyncMessageQueue::new(config.decoupled_resolution),
            config,
            ids: CommandIdGenerator::new(),
            pending: Mutex::new(PendingCalls::default()),
            sessions: RwLock::new(FxHashMap::default()),
            listeners: EventListeners::default(),
            outbound_tx,
            dispatch: Mutex::new(None),
            closed: AtomicBool::new(false),
        });

        let handle = tokio::spawn(run_dispatch_loop(
            Arc::clone(&inner),
            transport,
            outbound_rx,
        ));
        *inner.dispatch.lock() = Some(handle);

        Self {
            _owner: Arc::new(OwnerGuard {
                inner: Arc::downgrade(&inner),
            }),
            inner,
        }
    }

    /// Connects to a WebSocket endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the handshake fails.
    pub async fn connect(endpoint: &Url, config: ConnectionConfig) -> Result<Self> {
        let transport = WebSocketTransport::connect(endpoint).await?;
        Ok(Self::new(transport, config))
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    /// Returns `true` once the connection has closed. Never reverts.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Returns the number of commands awaiting a response.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().calls.len()
    }

    /// Returns the attached session with `id`.
    #[must_use]
    pub fn session(&self, id: &SessionId) -> Option<Session> {
        self.inner.sessions.read().get(id).cloned()
    }

    /// Returns all attached sessions.
    #[must_use]
    pub fn sessions(&self) -> Vec<Session> {
        self.inner.sessions.read().values().cloned().collect()
    }

    /// Returns the number of attached sessions.
    #[inline]
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.inner.sessions.read().len()
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Sends a command and waits for its result.
    ///
    /// With `session_id`, the command is addressed to that attached session.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the connection is closed or closes first
    /// - [`Error::Transport`] if the transport fails before the response
    /// - [`Error::SessionDetached`] if `session_id` is not attached
    /// - [`Error::Protocol`] if the browser answers with an error
    /// - [`Error::Timeout`] if no answer arrives within the protocol timeout
    pub async fn send(
        &self,
        method: &str,
        params: Value,
        session_id: Option<&SessionId>,
    ) -> Result<Value> {
        self.send_inner(method, params, session_id, self.inner.config.protocol_timeout)
            .await
    }

    /// Like [`send`](Self::send) with an explicit timeout.
    pub async fn send_with_timeout(
        &self,
        method: &str,
        params: Value,
        session_id: Option<&SessionId>,
        timeout: Duration,
    ) -> Result<Value> {
        self.send_inner(method, params, session_id, Some(timeout))
            .await
    }

    /// Sends a typed command.
    pub async fn execute(&self, command: Command, session_id: Option<&SessionId>) -> Result<Value> {
        let (method, params) = command.into_parts()?;
        self.send(&method, params, session_id).await
    }

    async fn send_inner(
        &self,
        method: &str,
        params: Value,
        session_id: Option<&SessionId>,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        match session_id {
            None => self.inner.call(method, params, None, timeout).await,
            Some(id) => {
                let session = self
                    .session(id)
                    .ok_or_else(|| Error::session_detached(id.clone()))?;
                self.inner.call(method, params, Some(&session), timeout).await
            }
        }
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Subscribes to events that carry no session id.
    ///
    /// The stream ends when the connection closes.
    #[must_use]
    pub fn subscribe(&self) -> EventStream {
        self.inner.listeners.subscribe()
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Returns the session for `session_id`, registering it if the attach
    /// event has not been processed yet.
    pub(crate) fn attach_session(
        &self,
        session_id: SessionId,
        target_id: TargetId,
        parent_id: Option<SessionId>,
    ) -> Result<Session> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        Ok(self.inner.register_session(session_id, target_id, parent_id))
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Closes the connection.
    ///
    /// Every pending command is rejected with [`Error::ConnectionClosed`]
    /// exactly once, all sessions are detached, and the transport is
    /// released. Idempotent.
    pub async fn close(&self) {
        self.inner.shutdown(CloseReason::Local);

        let handle = self.inner.dispatch.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            warn!(error = %e, "Dispatch loop ended abnormally");
        }
    }
}

// ============================================================================
// PendingGuard
// ============================================================================

/// Drops a pending entry when the waiting call goes away.
struct PendingGuard<'a> {
    inner: &'a ConnectionInner,
    id: CommandId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.inner.pending.lock().calls.remove(&self.id).is_some() {
            trace!(id = %self.id, "Removed abandoned pending call");
        }
    }
}

// ============================================================================
// ConnectionInner
// ============================================================================

impl ConnectionInner {
    pub(crate) fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Registers, writes, and awaits one command.
    pub(crate) async fn call(
        &self,
        method: &str,
        params: Value,
        session: Option<&Session>,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        let id = self.ids.next_id();
        let request = Request::new(id, method, params, session.map(|s| s.id().clone()));
        let frame = serde_json::to_string(&request)?;

        let (completion, response_rx) = oneshot::channel();
        self.register(id, method, session, completion)?;

        // Removes the entry however this future ends: resolved, timed out, or dropped.
        let _guard = PendingGuard { inner: self, id };

        self.outbound_tx
            .send(Outbound::Frame(frame))
            .map_err(|_| Error::ConnectionClosed)?;

        trace!(%id, method, session_id = ?request.session_id, "Command sent");

        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, response_rx).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(%id, method, timeout_ms = limit.as_millis() as u64, "Command timed out");
                    return Err(Error::timeout(method, limit.as_millis() as u64));
                }
            },
            None => response_rx.await,
        };

        match outcome {
            Ok(result) => result,
            // Completion dropped unresolved: the connection closed underneath.
            Err(_) => Err(Error::ConnectionClosed),
        }
    }


    fn register(
        &self,
        id: CommandId,
        method: &str,
        session: Option<&Session>,
        completion: Completion,
    ) -> Result<()> {
        let mut pending = self.pending.lock();

        if pending.closed {
            return Err(Error::ConnectionClosed);
        }
        // Checked under the pending lock: detach marks first, then drains.
        if let Some(session) = session {
            session.ensure_attached()?;
        }
        if pending.calls.len() >= self.config.max_pending {
            warn!(
                pending = pending.calls.len(),
                max = self.config.max_pending,
                "Too many pending commands"
            );
            return Err(Error::invalid_state(format!(
                "too many pending commands: {}/{}",
                pending.calls.len(),
                self.config.max_pending
            )));
        }

        pending.calls.insert(
            id,
            PendingCall {
                method: method.to_string(),
                session_id: session.map(|s| s.id().clone()),
                completion,
                sent_at: Instant::now(),
            },
        );
        Ok(())
    }

    /// Handles one inbound message.
    fn handle_message(self: &Arc<Self>, text: &str) {
        let message = match Message::decode(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Discarding undecodable message");
                return;
            }
        };

        match message {
            Message::Response(response) => self.resolve(response),
            Message::Event(event) => self.route_event(event),
        }
    }

    fn resolve(&self, response: Response) {
        let call = self.pending.lock().calls.remove(&response.id);

        let Some(call) = call else {
            debug!(id = %response.id, "Response for unknown or abandoned command");
            return;
        };

        trace!(
            id = %response.id,
            method = %call.method,
            elapsed_ms = call.sent_at.elapsed().as_millis() as u64,
            "Response received"
        );

        let method = call.method;
        self.queue
            .enqueue(call.completion, move || response.into_result(&method));
    }

    fn route_event(self: &Arc<Self>, event: Event) {
        match event.method.as_str() {
            TARGET_ATTACHED => self.on_target_attached(&event),
            TARGET_DETACHED => self.on_target_detached(&event),
            _ => {}
        }

        match &event.session_id {
            None => {
                self.listeners.emit(&event);
            }
            Some(session_id) => {
                let session = self.sessions.read().get(session_id).cloned();
                match session {
                    Some(session) => session.emit(&event),
                    None => warn!(
                        session_id = %session_id,
                        method = %event.method,
                        "Dropping event for unknown session"
                    ),
                }
            }
        }
    }

    /// Registers the announced session before the event reaches its parent.
    fn on_target_attached(self: &Arc<Self>, event: &Event) {
        let ParsedEvent::TargetAttached {
            session_id,
            target_info,
            ..
        } = event.parse()
        else {
            warn!(params = %event.params, "Malformed attachedToTarget");
            return;
        };

        if self.closed.load(Ordering::Acquire) {
            return;
        }

        self.register_session(session_id, target_info.target_id, event.session_id.clone());
    }

    fn on_target_detached(&self, event: &Event) {
        match event.parse() {
            ParsedEvent::TargetDetached {
                session_id: Some(session_id),
                ..
            } => self.remove_session(&session_id),
            _ => warn!(params = %event.params, "Malformed detachedFromTarget"),
        }
    }

    fn register_session(
        self: &Arc<Self>,
        session_id: SessionId,
        target_id: TargetId,
        parent_id: Option<SessionId>,
    ) -> Session {
        let mut sessions = self.sessions.write();
        sessions
            .entry(session_id.clone())
            .or_insert_with(|| {
                debug!(
                    session_id = %session_id,
                    target_id = %target_id,
                    parent_id = ?parent_id,
                    "Session attached"
                );
                Session::new(session_id, target_id, parent_id, Arc::downgrade(self))
            })
            .clone()
    }

    /// Removes a session and, transitively, the sessions it announced.
    pub(crate) fn remove_session(&self, session_id: &SessionId) {
        let removed: Vec<Session> = {
            let mut sessions = self.sessions.write();
            let mut removed = Vec::new();
            let mut frontier = vec![session_id.clone()];

            while let Some(id) = frontier.pop() {
                if let Some(session) = sessions.remove(&id) {
                    removed.push(session);
                }
                frontier.extend(
                    sessions
                        .values()
                        .filter(|s| s.parent_id() == Some(&id))
                        .map(|s| s.id().clone()),
                );
            }
            removed
        };

        for session in &removed {
            session.mark_detached();
            self.reject_session_calls(session.id());
        }
    }

    /// Rejects in-flight commands addressed to a detached session.
    fn reject_session_calls(&self, session_id: &SessionId) {
        let rejected: Vec<PendingCall> = {
            let mut pending = self.pending.lock();
            let ids: Vec<CommandId> = pending
                .calls
                .iter()
                .filter(|(_, call)| call.session_id.as_ref() == Some(session_id))
                .map(|(id, _)| *id)
                .collect();
            ids.iter()
                .filter_map(|id| pending.calls.remove(id))
                .collect()
        };

        for call in rejected {
            let _ = call
                .completion
                .send(Err(Error::session_detached(session_id.clone())));
        }
    }

    /// Closes exactly once: rejects pending calls, detaches sessions, stops the loop.
    fn shutdown(&self, reason: CloseReason) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let calls: Vec<PendingCall> = {
            let mut pending = self.pending.lock();
            pending.closed = true;
            pending.calls.drain().map(|(_, call)| call).collect()
        };
        let rejected = calls.len();
        for call in calls {
            let _ = call.completion.send(Err(reason.to_error()));
        }

        let sessions: Vec<Session> = self.sessions.write().drain().map(|(_, s)| s).collect();
        for session in &sessions {
            session.mark_detached();
        }

        self.listeners.close();
        let _ = self.outbound_tx.send(Outbound::Shutdown);

        debug!(?reason, rejected, sessions = sessions.len(), "Connection closed");
    }
}

// ============================================================================
// Dispatch Loop
// ============================================================================

/// Owns the transport until the connection closes.
async fn run_dispatch_loop<T: Transport>(
    inner: Arc<ConnectionInner>,
    mut transport: T,
    mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
) {
    let reason = loop {
        tokio::select! {
            inbound = transport.recv() => {
                match inbound {
                    Some(Ok(text)) => inner.handle_message(&text),
                    Some(Err(e)) => {
                        error!(error = %e, "Transport read failed");
                        break CloseReason::Transport(e.to_string());
                    }
                    None => {
                        debug!("Transport closed by remote");
                        break CloseReason::RemoteClosed;
                    }
                }
            }

            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(Outbound::Frame(frame)) => {
                        if let Err(e) = transport.send(frame).await {
                            error!(error = %e, "Transport write failed");
                            break CloseReason::Transport(e.to_string());
                        }
                    }
                    Some(Outbound::Shutdown) | None => break CloseReason::Local,
                }
            }
        }
    };

    inner.shutdown(reason);

    // Responses already taken off the pending table still reach their callers.
    inner.queue.drain(RESOLUTION_DRAIN_TIMEOUT).await;

    if let Err(e) = transport.close().await {
        debug!(error = %e, "Transport close failed");
    }

    debug!("Dispatch loop terminated");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use serde_json::json;

    use crate::transport::{MemoryPeer, MemoryTransport};

    fn connect_with(config: ConnectionConfig) -> (Connection, MemoryPeer) {
        let (transport, peer) = MemoryTransport::pair();
        (Connection::new(transport, config), peer)
    }

    fn connect() -> (Connection, MemoryPeer) {
        connect_with(ConnectionConfig::default())
    }

    fn attached(session_id: &str, target_id: &str, parent: Option<&str>) -> Value {
        let mut event = json!({
            "method": TARGET_ATTACHED,
            "params": {
                "sessionId": session_id,
                "targetInfo": { "targetId": target_id, "type": "page", "title": "", "url": "about:blank", "attached": true },
                "waitingForDebugger": false
            }
        });
        if let Some(parent) = parent {
            event["sessionId"] = json!(parent);
        }
        event
    }

    /// Sends `S1` attach at root and waits until it is registered.
    async fn attach_root_session(connection: &Connection, peer: &MemoryPeer) -> Session {
        let mut root = connection.subscribe();
        peer.send_json(&attached("S1", "T1", None));
        root.wait_for(TARGET_ATTACHED).await.expect("attach event");
        connection.session(&SessionId::from("S1")).expect("registered")
    }

    #[tokio::test]
    async fn test_response_resolves_call() {
        let (connection, mut peer) = connect();

        let call = tokio::spawn({
            let connection = connection.clone();
            async move { connection.send("Browser.getVersion", json!({}), None).await }
        });

        let request = peer.recv_json().await.expect("request");
        assert_eq!(request["id"], 1);
        assert_eq!(request["method"], "Browser.getVersion");
        assert_eq!(request["params"], json!({}));
        assert!(request.get("sessionId").is_none());

        peer.send_json(&json!({ "id": 1, "result": { "ok": true } }));

        let result = call.await.expect("join").expect("ok");
        assert_eq!(result, json!({ "ok": true }));
        assert_eq!(connection.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_error_response_rejects_call() {
        let (connection, mut peer) = connect();

        let call = tokio::spawn({
            let connection = connection.clone();
            async move { connection.send("Page.navigate", json!({ "url": "x" }), None).await }
        });

        let request = peer.recv_json().await.expect("request");
        peer.send_json(&json!({
            "id": request["id"],
            "error": { "code": -32000, "message": "Boom" }
        }));

        match call.await.expect("join") {
            Err(Error::Protocol { method, message, .. }) => {
                assert_eq!(method, "Page.navigate");
                assert_eq!(message, "Boom");
            }
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn test_out_of_order_responses_reach_their_callers(
            order in (1usize..24).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle())
        ) {
            let runtime = tokio::runtime::Runtime::new().expect("runtime");
            runtime.block_on(async move {
                let (connection, mut peer) = connect();
                let count = order.len();

                let calls: Vec<_> = (0..count)
                    .map(|n| {
                        let connection = connection.clone();
                        tokio::spawn(async move {
                            let result = connection.send("Test.echo", json!({ "n": n }), None).await;
                            (n, result)
                        })
                    })
                    .collect();

                let mut requests = Vec::with_capacity(count);
                for _ in 0..count {
                    requests.push(peer.recv_json().await.expect("request"));
                }

                for &index in &order {
                    let request = &requests[index];
                    peer.send_json(&json!({
                        "id": request["id"],
                        "result": { "n": request["params"]["n"] }
                    }));
                }

                for call in calls {
                    let (n, result) = call.await.expect("join");
                    prop_assert_eq!(result.expect("ok"), json!({ "n": n }));
                }
                prop_assert_eq!(connection.pending_count(), 0);
                Ok(())
            })?;
        }
    }

    #[tokio::test]
    async fn test_close_rejects_each_pending_call_once() {
        let (connection, mut peer) = connect();

        let calls: Vec<_> = (0..5)
            .map(|_| {
                let connection = connection.clone();
                tokio::spawn(async move { connection.send("Test.hang", json!({}), None).await })
            })
            .collect();

        for _ in 0..5 {
            peer.recv_json().await.expect("request");
        }
        assert_eq!(connection.pending_count(), 5);

        connection.close().await;
        connection.close().await;

        for call in calls {
            assert!(matches!(call.await.expect("join"), Err(Error::ConnectionClosed)));
        }
        assert_eq!(connection.pending_count(), 0);
        assert!(connection.is_closed());

        let late = connection.send("Test.late", json!({}), None).await;
        assert!(matches!(late, Err(Error::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_events_routed_by_session() {
        let (connection, peer) = connect();
        let session = attach_root_session(&connection, &peer).await;
        assert_eq!(session.target_id().as_str(), "T1");
        assert!(session.parent_id().is_none());

        let mut root = connection.subscribe();
        let mut page = session.subscribe();

        peer.send_json(&json!({ "method": "Page.loadEventFired", "params": {}, "sessionId": "S1" }));
        peer.send_json(&json!({ "method": "Target.targetCreated", "params": {} }));

        let event = page.recv().await.expect("session event");
        assert_eq!(event.method, "Page.loadEventFired");

        let event = root.recv().await.expect("root event");
        assert_eq!(event.method, "Target.targetCreated");
        assert!(page.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_event_for_unknown_session_dropped() {
        let (connection, peer) = connect();
        let mut root = connection.subscribe();

        peer.send_json(&json!({ "method": "Page.loadEventFired", "params": {}, "sessionId": "ghost" }));
        peer.send_json(&json!({ "method": "Test.marker", "params": {} }));

        let event = root.recv().await.expect("marker");
        assert_eq!(event.method, "Test.marker");
        assert_eq!(connection.session_count(), 0);
    }

    #[tokio::test]
    async fn test_session_send_carries_session_id() {
        let (connection, mut peer) = connect();
        let session = attach_root_session(&connection, &peer).await;

        let call = tokio::spawn({
            let session = session.clone();
            async move { session.send("Runtime.enable", json!({})).await }
        });

        let request = peer.recv_json().await.expect("request");
        assert_eq!(request["sessionId"], "S1");
        assert_eq!(request["method"], "Runtime.enable");

        peer.send_json(&json!({ "id": request["id"], "result": {}, "sessionId": "S1" }));
        call.await.expect("join").expect("ok");
    }

    #[tokio::test]
    async fn test_detach_event_detaches_session_and_children() {
        let (connection, peer) = connect();
        let parent = attach_root_session(&connection, &peer).await;
        let mut parent_events = parent.subscribe();

        peer.send_json(&attached("S2", "T2", Some("S1")));
        let forwarded = parent_events.wait_for(TARGET_ATTACHED).await.expect("forwarded");
        assert_eq!(forwarded.params["sessionId"], "S2");

        let child = connection.session(&SessionId::from("S2")).expect("child");
        assert_eq!(child.parent_id().map(SessionId::as_str), Some("S1"));
        let mut child_events = child.subscribe();

        let mut root = connection.subscribe();
        peer.send_json(&json!({ "method": TARGET_DETACHED, "params": { "sessionId": "S1" } }));
        root.wait_for(TARGET_DETACHED).await.expect("detach event");

        assert!(parent.is_detached());
        assert!(child.is_detached());
        assert_eq!(connection.session_count(), 0);
        assert!(child_events.recv().await.is_none());

        let result = child.send("Runtime.enable", json!({})).await;
        assert!(matches!(result, Err(Error::SessionDetached { .. })));

        let result = connection.send("Runtime.enable", json!({}), Some(parent.id())).await;
        assert!(matches!(result, Err(Error::SessionDetached { .. })));
    }

    #[tokio::test]
    async fn test_detach_rejects_in_flight_session_call() {
        let (connection, mut peer) = connect();
        let session = attach_root_session(&connection, &peer).await;

        let call = tokio::spawn({
            let session = session.clone();
            async move { session.send("Page.navigate", json!({ "url": "about:blank" })).await }
        });
        peer.recv_json().await.expect("request");

        peer.send_json(&json!({ "method": TARGET_DETACHED, "params": { "sessionId": "S1" } }));

        let result = call.await.expect("join");
        assert!(matches!(result, Err(Error::SessionDetached { .. })));
        assert_eq!(connection.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_timeout_fails_only_that_call() {
        let config = ConnectionConfig::default().with_protocol_timeout(Some(Duration::from_millis(50)));
        let (connection, mut peer) = connect_with(config);

        let slow = tokio::spawn({
            let connection = connection.clone();
            async move { connection.send("Test.slow", json!({}), None).await }
        });
        let fast = tokio::spawn({
            let connection = connection.clone();
            async move { connection.send("Test.fast", json!({}), None).await }
        });

        let first = peer.recv_json().await.expect("request");
        let second = peer.recv_json().await.expect("request");
        let (slow_request, fast_request) = if first["method"] == "Test.slow" {
            (first, second)
        } else {
            (second, first)
        };

        peer.send_json(&json!({ "id": fast_request["id"], "result": { "fast": true } }));
        assert_eq!(fast.await.expect("join").expect("ok"), json!({ "fast": true }));

        match slow.await.expect("join") {
            Err(Error::Timeout { method, timeout_ms }) => {
                assert_eq!(method, "Test.slow");
                assert_eq!(timeout_ms, 50);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(connection.pending_count(), 0);

        // Late answer is discarded; the connection stays usable.
        peer.send_json(&json!({ "id": slow_request["id"], "result": {} }));
        let next = tokio::spawn({
            let connection = connection.clone();
            async move { connection.send("Test.next", json!({}), None).await }
        });
        let request = peer.recv_json().await.expect("request");
        peer.send_json(&json!({ "id": request["id"], "result": { "next": 1 } }));
        assert_eq!(next.await.expect("join").expect("ok"), json!({ "next": 1 }));
        assert!(!connection.is_closed());
    }

    #[tokio::test]
    async fn test_dropped_call_cleans_up() {
        let (connection, mut peer) = connect();

        let abandoned = tokio::time::timeout(
            Duration::from_millis(20),
            connection.send("Test.hang", json!({}), None),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(connection.pending_count(), 0);

        let request = peer.recv_json().await.expect("frame was written");
        peer.send_json(&json!({ "id": request["id"], "result": {} }));
        assert!(!connection.is_closed());
    }

    #[tokio::test]
    async fn test_transport_failure_rejects_with_transport_error() {
        let (connection, mut peer) = connect();

        let call = tokio::spawn({
            let connection = connection.clone();
            async move { connection.send("Test.hang", json!({}), None).await }
        });
        peer.recv_json().await.expect("request");

        peer.fail("connection reset");

        let result = call.await.expect("join");
        assert!(matches!(result, Err(Error::Transport { .. })));
        assert!(connection.is_closed());
    }

    #[tokio::test]
    async fn test_remote_hang_up_closes() {
        let (connection, mut peer) = connect();
        let session = attach_root_session(&connection, &peer).await;

        let call = tokio::spawn({
            let connection = connection.clone();
            async move { connection.send("Test.hang", json!({}), None).await }
        });
        peer.recv_json().await.expect("request");

        peer.hang_up();

        assert!(matches!(call.await.expect("join"), Err(Error::ConnectionClosed)));
        assert!(session.is_detached());
        assert!(connection.is_closed());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_answer_before_hang_up_still_resolves() {
        let (connection, mut peer) = connect();

        let call = tokio::spawn({
            let connection = connection.clone();
            async move { connection.send("Browser.close", json!({}), None).await }
        });
        let request = peer.recv_json().await.expect("request");

        peer.send_json(&json!({ "id": request["id"], "result": { "ok": true } }));
        peer.hang_up();

        assert_eq!(call.await.expect("join").expect("ok"), json!({ "ok": true }));
        connection.close().await;
        assert!(connection.is_closed());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_every_answer_before_hang_up_is_delivered() {
        let (connection, mut peer) = connect();

        let calls: Vec<_> = (0..200)
            .map(|n| {
                let connection = connection.clone();
                tokio::spawn(async move { connection.send("Test.tail", json!({ "n": n }), None).await })
            })
            .collect();

        for _ in 0..200 {
            let request = peer.recv_json().await.expect("request");
            peer.send_json(&json!({ "id": request["id"], "result": { "n": request["params"]["n"] } }));
        }
        peer.hang_up();

        for (n, call) in calls.into_iter().enumerate() {
            assert_eq!(call.await.expect("join").expect("ok"), json!({ "n": n }));
        }
    }

    #[tokio::test]
    async fn test_dropping_last_handle_releases_transport() {
        let (connection, mut peer) = connect();
        let session = attach_root_session(&connection, &peer).await;

        let clone = connection.clone();
        drop(connection);
        assert!(!clone.is_closed());
        assert!(!session.is_detached());

        drop(clone);
        assert!(session.is_detached());

        let released = tokio::time::timeout(Duration::from_secs(1), peer.recv())
            .await
            .expect("transport released");
        assert!(released.is_none());

        let result = session.send("Runtime.enable", json!({})).await;
        assert!(matches!(result, Err(Error::SessionDetached { .. })));
    }

    #[tokio::test]
    async fn test_inline_resolution() {
        let (connection, mut peer) = connect_with(ConnectionConfig::default().with_inline_resolution());

        let call = tokio::spawn({
            let connection = connection.clone();
            async move { connection.send("Test.inline", json!({}), None).await }
        });
        let request = peer.recv_json().await.expect("request");
        peer.send_json(&json!({ "id": request["id"], "result": { "inline": true } }));

        assert_eq!(call.await.expect("join").expect("ok"), json!({ "inline": true }));
    }

    #[tokio::test]
    async fn test_pending_cap() {
        let (connection, mut peer) = connect_with(ConnectionConfig::default().with_max_pending(1));

        let first = tokio::spawn({
            let connection = connection.clone();
            async move { connection.send("Test.first", json!({}), None).await }
        });
        peer.recv_json().await.expect("request");

        let second = connection.send("Test.second", json!({}), None).await;
        assert!(matches!(second, Err(Error::InvalidState { .. })));

        connection.close().await;
        assert!(first.await.expect("join").is_err());
    }

    #[tokio::test]
    async fn test_attach_session_is_idempotent() {
        let (connection, peer) = connect();

        let early = connection
            .attach_session(SessionId::from("S1"), TargetId::from("T1"), None)
            .expect("attach");
        let registered = attach_root_session(&connection, &peer).await;

        assert_eq!(connection.session_count(), 1);
        assert_eq!(early.id(), registered.id());

        connection.close().await;
        assert!(early.is_detached());
        assert!(registered.is_detached());
        assert!(connection
            .attach_session(SessionId::from("S9"), TargetId::from("T9"), None)
            .is_err());
    }

    #[tokio::test]
    async fn test_undecodable_message_ignored() {
        let (connection, mut peer) = connect();

        let call = tokio::spawn({
            let connection = connection.clone();
            async move { connection.send("Test.after", json!({}), None).await }
        });
        let request = peer.recv_json().await.expect("request");

        peer.send("not json");
        peer.send_json(&json!({ "neither": true }));
        peer.send_json(&json!({ "id": request["id"], "result": {} }));

        call.await.expect("join").expect("ok");
        assert!(!connection.is_closed());
    }
}
