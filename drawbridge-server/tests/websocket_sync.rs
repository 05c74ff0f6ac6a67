//! WebSocket round-trip integration tests.

mod common;

use common::{recv_json, recv_until_type, TestServer};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::{connect_async, tungstenite::Message};

async fn send_json<S>(sink: &mut S, value: &Value)
where
    S: SinkExt<Message> + Unpin,
{
    let text = serde_json::to_string(value).expect("serialize");
    assert!(sink.send(Message::Text(text.into())).await.is_ok());
}

#[tokio::test]
async fn connect_receives_initial_frames_in_order() {
    let server = TestServer::start().await;

    let (ws, _) = connect_async(&server.ws_url()).await.expect("connect");
    let (_, mut read) = ws.split();

    let first = recv_json(&mut read).await.expect("initial_elements");
    assert_eq!(first["type"], "initial_elements");
    assert!(first["elements"].is_array());

    let second = recv_json(&mut read).await.expect("sync_status");
    assert_eq!(second["type"], "sync_status");
    assert_eq!(second["connectedClients"], 1);

    let third = recv_json(&mut read).await.expect("canvas_sync");
    assert_eq!(third["type"], "canvas_sync");
    assert!(third["data"]["elements"].is_array());

    server.shutdown().await;
}

#[tokio::test]
async fn rest_mutation_broadcasts_canvas_sync() {
    let server = TestServer::start().await;

    let (ws, _) = connect_async(&server.ws_url()).await.expect("connect");
    let (_, mut read) = ws.split();
    for _ in 0..3 {
        recv_json(&mut read).await;
    }

    let response = reqwest::Client::new()
        .post(server.http_url("/api/elements"))
        .json(&json!({"type": "rectangle", "x": 5.0}))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 200);

    let (created, _) = recv_until_type(&mut read, "element_created", 5).await;
    assert!(created.is_some());

    let (sync, _) = recv_until_type(&mut read, "canvas_sync", 5).await;
    let sync = sync.expect("canvas_sync after mutation");
    assert_eq!(sync["data"]["elements"].as_array().unwrap().len(), 1);

    server.shutdown().await;
}

#[tokio::test]
async fn inbound_mutation_excludes_the_sender() {
    let server = TestServer::start().await;

    let (ws_a, _) = connect_async(&server.ws_url()).await.expect("connect a");
    let (mut write_a, mut read_a) = ws_a.split();
    for _ in 0..3 {
        recv_json(&mut read_a).await;
    }

    let (ws_b, _) = connect_async(&server.ws_url()).await.expect("connect b");
    let (_, mut read_b) = ws_b.split();
    for _ in 0..3 {
        recv_json(&mut read_b).await;
    }

    send_json(
        &mut write_a,
        &json!({
            "type": "element_created",
            "element": {"id": "from-editor-000000000", "type": "rectangle", "x": 1.0, "y": 2.0}
        }),
    )
    .await;

    // Peer B sees the mutation.
    let (created, _) = recv_until_type(&mut read_b, "element_created", 5).await;
    let created = created.expect("element_created on other peer");
    assert_eq!(created["element"]["id"], "from-editor-000000000");

    // The store applied it.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(server.state().store.get("from-editor-000000000").is_some());

    // The sender got no echo.
    let echo = tokio::time::timeout(std::time::Duration::from_millis(200), read_a.next()).await;
    assert!(echo.is_err(), "sender must not receive its own mutation");

    server.shutdown().await;
}

#[tokio::test]
async fn inbound_update_patches_the_store() {
    let server = TestServer::start().await;

    let response = reqwest::Client::new()
        .post(server.http_url("/api/elements"))
        .json(&json!({"type": "rectangle", "x": 0.0}))
        .send()
        .await
        .expect("request");
    let body: Value = response.json().await.expect("json");
    let id = body["element"]["id"].as_str().unwrap().to_string();

    let (ws, _) = connect_async(&server.ws_url()).await.expect("connect");
    let (mut write, mut read) = ws.split();
    for _ in 0..3 {
        recv_json(&mut read).await;
    }

    send_json(
        &mut write,
        &json!({"type": "element_updated", "id": id, "updates": {"x": 321.0}}),
    )
    .await;

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let element = server.state().store.get(&id).expect("element");
    assert!((element.x - 321.0).abs() < f64::EPSILON);
    assert_eq!(element.version, 2);

    server.shutdown().await;
}

#[tokio::test]
async fn inbound_canvas_sync_replaces_scene_and_drops_tombstones() {
    let server = TestServer::start().await;

    let (ws, _) = connect_async(&server.ws_url()).await.expect("connect");
    let (mut write, mut read) = ws.split();
    for _ in 0..3 {
        recv_json(&mut read).await;
    }

    send_json(
        &mut write,
        &json!({
            "type": "canvas_sync",
            "data": {
                "elements": [
                    {"id": "live-0000000000000000", "type": "rectangle", "x": 0.0, "y": 0.0},
                    {"id": "gone-0000000000000000", "type": "ellipse", "isDeleted": true},
                ],
                "appState": {"viewBackgroundColor": "#fafafa"},
            }
        }),
    )
    .await;

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let state = server.state();
    assert_eq!(state.store.count(), 1);
    assert!(state.store.get("live-0000000000000000").is_some());
    assert!(state.store.get("gone-0000000000000000").is_none());
    assert_eq!(
        state.store.scene_data().app_state["viewBackgroundColor"],
        "#fafafa"
    );

    server.shutdown().await;
}

#[tokio::test]
async fn unknown_inbound_tags_are_ignored() {
    let server = TestServer::start().await;

    let (ws, _) = connect_async(&server.ws_url()).await.expect("connect");
    let (mut write, mut read) = ws.split();
    for _ in 0..3 {
        recv_json(&mut read).await;
    }

    send_json(&mut write, &json!({"type": "start_call", "peer": "x"})).await;
    // Connection stays healthy: a real mutation still works.
    send_json(
        &mut write,
        &json!({
            "type": "element_created",
            "element": {"id": "after-unknown-0000000", "type": "text", "text": "hi"}
        }),
    )
    .await;

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(server.state().store.get("after-unknown-0000000").is_some());

    server.shutdown().await;
}

#[tokio::test]
async fn disconnect_detaches_the_peer() {
    let server = TestServer::start().await;

    let (ws, _) = connect_async(&server.ws_url()).await.expect("connect");
    drop(ws);

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(server.state().bus.count(), 0);

    server.shutdown().await;
}
