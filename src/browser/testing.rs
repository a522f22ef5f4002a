//! Scripted remote end for browser and page tests.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use url::Url;

use crate::protocol::event::{TARGET_ATTACHED, TARGET_DETACHED};
use crate::transport::{Connection, ConnectionConfig, MemoryPeer, MemoryTransport};

use super::Browser;

/// Answer to one request.
pub(crate) enum Reply {
    /// `{"id", "result"}`.
    Result(Value),
    /// `{"id", "error": {"code": -32000, "message"}}`.
    Error(&'static str),
    /// No answer at all.
    Silent,
}

type Handler = Box<dyn Fn(&Value) -> Option<Reply> + Send + Sync>;

/// Fake browser answering over a [`MemoryPeer`].
///
/// Requests are answered by the test's handler first, then by defaults:
/// targets `T1, T2, ...` with sessions `S1, S2, ...`, attach announced by
/// event before the response, `Page.close` followed by a detach event.
pub(crate) struct FakeBrowser {
    pub requests: Arc<Mutex<Vec<Value>>>,
    task: JoinHandle<()>,
}

impl FakeBrowser {
    /// Methods of all requests seen so far.
    pub(crate) fn methods(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .filter_map(|r| r["method"].as_str().map(str::to_string))
            .collect()
    }

    /// Last request with `method`.
    pub(crate) fn last(&self, method: &str) -> Option<Value> {
        self.requests
            .lock()
            .iter()
            .rev()
            .find(|r| r["method"] == method)
            .cloned()
    }
}

impl Drop for FakeBrowser {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Browser connected to a fake remote end with default answers.
pub(crate) fn fake_browser() -> (Browser, FakeBrowser) {
    fake_browser_with(|_| None, true)
}

/// Browser connected to a fake remote end.
///
/// `announce_attach = false` skips the attach event so only the response
/// registers the session.
pub(crate) fn fake_browser_with<F>(handler: F, announce_attach: bool) -> (Browser, FakeBrowser)
where
    F: Fn(&Value) -> Option<Reply> + Send + Sync + 'static,
{
    let (transport, peer) = MemoryTransport::pair();
    let connection = Connection::new(transport, ConnectionConfig::default());
    let fake = spawn_responder(peer, Box::new(handler), announce_attach);

    let endpoint = Url::parse("ws://127.0.0.1:9222/devtools/browser/fake").expect("url");
    (Browser::from_connection(connection, endpoint), fake)
}

/// Default responder on an existing peer.
pub(crate) fn spawn_for(peer: MemoryPeer) -> FakeBrowser {
    spawn_responder(peer, Box::new(|_| None), true)
}

fn spawn_responder(mut peer: MemoryPeer, handler: Handler, announce_attach: bool) -> FakeBrowser {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&requests);

    let task = tokio::spawn(async move {
        let mut targets = 0u32;

        while let Some(request) = peer.recv_json().await {
            seen.lock().push(request.clone());

            let reply = handler(&request).unwrap_or_else(|| {
                default_reply(&request, &peer, &mut targets, announce_attach)
            });

            let mut envelope = match reply {
                Reply::Result(result) => json!({ "id": request["id"], "result": result }),
                Reply::Error(message) => json!({
                    "id": request["id"],
                    "error": { "code": -32000, "message": message }
                }),
                Reply::Silent => continue,
            };
            if let Some(session_id) = request.get("sessionId") {
                envelope["sessionId"] = session_id.clone();
            }
            peer.send_json(&envelope);

            if request["method"] == "Page.close"
                && let Some(session_id) = request.get("sessionId")
            {
                peer.send_json(&json!({
                    "method": TARGET_DETACHED,
                    "params": { "sessionId": session_id }
                }));
            }
        }
    });

    FakeBrowser { requests, task }
}

fn default_reply(request: &Value, peer: &MemoryPeer, targets: &mut u32, announce_attach: bool) -> Reply {
    match request["method"].as_str().unwrap_or_default() {
        "Target.createTarget" => {
            *targets += 1;
            Reply::Result(json!({ "targetId": format!("T{targets}") }))
        }
        "Target.attachToTarget" => {
            let target_id = request["params"]["targetId"].as_str().unwrap_or_default();
            let session_id = target_id.replacen('T', "S", 1);
            if announce_attach {
                peer.send_json(&json!({
                    "method": TARGET_ATTACHED,
                    "params": {
                        "sessionId": session_id,
                        "targetInfo": {
                            "targetId": target_id,
                            "type": "page",
                            "title": "",
                            "url": "about:blank",
                            "attached": true
                        },
                        "waitingForDebugger": false
                    }
                }));
            }
            Reply::Result(json!({ "sessionId": session_id }))
        }
        "Browser.getVersion" => Reply::Result(json!({
            "protocolVersion": "1.3",
            "product": "HeadlessChrome/120.0.6099.0",
            "revision": "@abc",
            "userAgent": "Mozilla/5.0 HeadlessChrome/120.0.6099.0",
            "jsVersion": "12.0"
        })),
        _ => Reply::Result(json!({})),
    }
}
