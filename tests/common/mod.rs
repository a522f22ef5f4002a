//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Once;

use headless_remote::MemoryPeer;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

static LOGGING: Once = Once::new();

/// Initialize tracing once per test binary; `RUST_LOG` overrides the filter.
pub fn init_logging() {
    LOGGING.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("headless_remote=debug"));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_test_writer()
            .try_init();
    });
}

/// Builds a `Target.attachedToTarget` event for a page target.
pub fn attached_event(session_id: &str, target_id: &str, parent: Option<&str>) -> Value {
    let mut event = json!({
        "method": "Target.attachedToTarget",
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
    });
    if let Some(parent) = parent {
        event["sessionId"] = json!(parent);
    }
    event
}

/// Builds a `Target.detachedFromTarget` event.
pub fn detached_event(session_id: &str) -> Value {
    json!({
        "method": "Target.detachedFromTarget",
        "params": { "sessionId": session_id }
    })
}

/// Answers the next request with `result`, echoing its id and session.
pub async fn answer_next(peer: &mut MemoryPeer, result: Value) -> anyhow::Result<Value> {
    let request = peer
        .recv_json()
        .await
        .ok_or_else(|| anyhow::anyhow!("connection sent nothing"))?;

    let mut response = json!({ "id": request["id"], "result": result });
    if let Some(session_id) = request.get("sessionId") {
        response["sessionId"] = session_id.clone();
    }
    anyhow::ensure!(peer.send_json(&response), "connection end dropped");

    Ok(request)
}
