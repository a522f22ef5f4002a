//! End-to-end protocol flows over the in-memory transport.

mod common;

use std::time::Duration;

use anyhow::Result;
use headless_remote::{Connection, ConnectionConfig, Error, MemoryTransport, SessionId};
use serde_json::json;
use tokio::time::timeout;

use common::{answer_next, attached_event, detached_event, init_logging};

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn session_lifecycle() -> Result<()> {
    init_logging();
    let (transport, mut peer) = MemoryTransport::pair();
    let connection = Connection::new(transport, ConnectionConfig::default());
    let mut root_events = connection.subscribe();

    peer.send_json(&attached_event("S1", "T1", None));
    let attached = timeout(WAIT, root_events.wait_for("Target.attachedToTarget"))
        .await?
        .ok_or_else(|| anyhow::anyhow!("no attach event"))?;
    assert_eq!(attached.params["sessionId"], "S1");

    let session = connection
        .session(&SessionId::from("S1"))
        .ok_or_else(|| anyhow::anyhow!("session not registered"))?;
    assert_eq!(session.target_id().as_str(), "T1");
    let mut page_events = session.subscribe();

    let call = tokio::spawn({
        let session = session.clone();
        async move { session.send("Runtime.evaluate", json!({ "expression": "1 + 1" })).await }
    });
    let request = answer_next(&mut peer, json!({ "result": { "value": 2 } })).await?;
    assert_eq!(request["sessionId"], "S1");
    assert_eq!(call.await??["result"]["value"], 2);

    peer.send_json(&json!({
        "method": "Page.loadEventFired",
        "params": { "timestamp": 1.0 },
        "sessionId": "S1"
    }));
    let loaded = timeout(WAIT, page_events.recv()).await?;
    assert_eq!(loaded.map(|e| e.method).as_deref(), Some("Page.loadEventFired"));

    peer.send_json(&detached_event("S1"));
    assert!(timeout(WAIT, page_events.recv()).await?.is_none());
    assert!(session.is_detached());
    assert_eq!(connection.session_count(), 0);

    let err = session.send("Page.enable", json!({})).await.unwrap_err();
    assert!(matches!(err, Error::SessionDetached { .. }));

    connection.close().await;
    Ok(())
}

#[tokio::test]
async fn parent_detach_cascades() -> Result<()> {
    init_logging();
    let (transport, peer) = MemoryTransport::pair();
    let connection = Connection::new(transport, ConnectionConfig::default());
    let mut root_events = connection.subscribe();

    peer.send_json(&attached_event("S1", "T1", None));
    peer.send_json(&attached_event("S2", "W1", Some("S1")));
    peer.send_json(&json!({ "method": "Target.targetCreated", "params": {} }));
    timeout(WAIT, root_events.wait_for("Target.targetCreated")).await?;

    let child = connection
        .session(&SessionId::from("S2"))
        .ok_or_else(|| anyhow::anyhow!("child not registered"))?;
    assert_eq!(child.parent_id().map(SessionId::as_str), Some("S1"));

    peer.send_json(&detached_event("S1"));
    peer.send_json(&json!({ "method": "Target.targetDestroyed", "params": {} }));
    timeout(WAIT, root_events.wait_for("Target.targetDestroyed")).await?;

    assert!(child.is_detached());
    assert_eq!(connection.session_count(), 0);

    connection.close().await;
    Ok(())
}

#[tokio::test]
async fn close_settles_everything() -> Result<()> {
    init_logging();
    let (transport, mut peer) = MemoryTransport::pair();
    let connection = Connection::new(transport, ConnectionConfig::default());

    let calls: Vec<_> = (0..3)
        .map(|_| {
            let connection = connection.clone();
            tokio::spawn(async move { connection.send("Page.enable", json!({}), None).await })
        })
        .collect();
    for _ in 0..3 {
        timeout(WAIT, peer.recv()).await?;
    }

    connection.close().await;

    for call in calls {
        assert!(matches!(call.await?, Err(Error::ConnectionClosed)));
    }
    assert!(connection.is_closed());
    assert_eq!(connection.pending_count(), 0);

    let err = connection.send("Page.enable", json!({}), None).await.unwrap_err();
    assert!(err.is_connection_error());
    Ok(())
}

#[tokio::test]
async fn protocol_timeout_is_per_call() -> Result<()> {
    init_logging();
    let (transport, mut peer) = MemoryTransport::pair();
    let config = ConnectionConfig::default().with_protocol_timeout(Some(Duration::from_millis(50)));
    let connection = Connection::new(transport, config);

    let err = connection
        .send("Page.navigate", json!({ "url": "about:blank" }), None)
        .await
        .unwrap_err();
    assert!(err.is_timeout());
    timeout(WAIT, peer.recv()).await?;

    let call = tokio::spawn({
        let connection = connection.clone();
        async move { connection.send("Browser.getVersion", json!({}), None).await }
    });
    answer_next(&mut peer, json!({ "product": "HeadlessChrome" })).await?;
    assert_eq!(call.await??["product"], "HeadlessChrome");

    connection.close().await;
    Ok(())
}
