//! Tool gateway integration tests over the `/mcp` endpoint.

mod common;

use common::{recv_json, recv_until_type, TestServer};
use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio_tungstenite::connect_async;

async fn rpc(server: &TestServer, method: &str, params: Value) -> Value {
    let response = reqwest::Client::new()
        .post(server.http_url("/mcp"))
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 200);
    response.json().await.expect("json")
}

async fn call_tool(server: &TestServer, name: &str, arguments: Value) -> Value {
    rpc(
        server,
        "tools/call",
        json!({"name": name, "arguments": arguments}),
    )
    .await
}

#[tokio::test]
async fn initialize_handshake() {
    let server = TestServer::start().await;
    let response = rpc(&server, "initialize", json!({})).await;
    assert_eq!(response["jsonrpc"], "2.0");
    assert_eq!(response["result"]["serverInfo"]["name"], "drawbridge");
    server.shutdown().await;
}

#[tokio::test]
async fn tools_list_returns_catalogue() {
    let server = TestServer::start().await;
    let response = rpc(&server, "tools/list", json!({})).await;
    let tools = response["result"]["tools"].as_array().expect("tools");
    assert_eq!(tools.len(), 26);
    assert!(tools.iter().any(|t| t["name"] == "create_element"));
    assert!(tools.iter().any(|t| t["name"] == "export_to_excalidraw_url"));
    server.shutdown().await;
}

#[tokio::test]
async fn unknown_method_is_a_jsonrpc_error() {
    let server = TestServer::start().await;
    let response = rpc(&server, "prompts/list", json!({})).await;
    assert_eq!(response["error"]["code"], -32601);
    server.shutdown().await;
}

#[tokio::test]
async fn tool_call_mutates_shared_store() {
    let server = TestServer::start().await;
    let response = call_tool(
        &server,
        "create_element",
        json!({"type": "rectangle", "x": 11.0, "y": 12.0}),
    )
    .await;
    let text = response["result"]["content"][0]["text"]
        .as_str()
        .expect("text content");
    let payload: Value = serde_json::from_str(text).expect("payload json");
    let id = payload["id"].as_str().expect("id");

    // The same element is visible through the REST surface.
    let listed: Value = reqwest::get(server.http_url("/api/elements"))
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(listed["count"], 1);
    assert_eq!(listed["elements"][0]["id"], id);
    server.shutdown().await;
}

#[tokio::test]
async fn tool_mutations_broadcast_to_peers() {
    let server = TestServer::start().await;

    let (ws, _) = connect_async(&server.ws_url()).await.expect("connect");
    let (_, mut read) = ws.split();
    for _ in 0..3 {
        recv_json(&mut read).await;
    }

    call_tool(&server, "create_element", json!({"type": "ellipse"})).await;

    let (created, _) = recv_until_type(&mut read, "element_created", 5).await;
    assert!(created.is_some());
    let (sync, _) = recv_until_type(&mut read, "canvas_sync", 5).await;
    assert_eq!(sync.expect("sync")["data"]["elements"].as_array().unwrap().len(), 1);

    server.shutdown().await;
}

#[tokio::test]
async fn correlated_tool_without_peer_fails() {
    let server = TestServer::start().await;
    let response = call_tool(&server, "get_canvas_screenshot", json!({})).await;
    assert_eq!(response["error"]["code"], -32000);
    assert!(response["error"]["message"]
        .as_str()
        .unwrap()
        .contains("No frontend client connected"));
    server.shutdown().await;
}

#[tokio::test]
async fn screenshot_returns_image_content() {
    let server = TestServer::start().await;

    let (ws, _) = connect_async(&server.ws_url()).await.expect("connect");
    let (_, mut read) = ws.split();
    for _ in 0..3 {
        recv_json(&mut read).await;
    }

    let result_url = server.http_url("/api/export/image/result");
    let responder = tokio::spawn(async move {
        let (frame, _) = recv_until_type(&mut read, "export_image_request", 10).await;
        let request_id = frame.expect("frame")["requestId"]
            .as_str()
            .expect("requestId")
            .to_string();
        reqwest::Client::new()
            .post(&result_url)
            .json(&json!({"requestId": request_id, "format": "png", "data": "aGVsbG8="}))
            .send()
            .await
            .expect("result post");
    });

    let response = call_tool(&server, "get_canvas_screenshot", json!({})).await;
    let content = &response["result"]["content"][0];
    assert_eq!(content["type"], "image");
    assert_eq!(content["data"], "aGVsbG8=");
    assert_eq!(content["mimeType"], "image/png");

    responder.await.expect("responder");
    server.shutdown().await;
}

#[tokio::test]
async fn read_diagram_guide_is_text() {
    let server = TestServer::start().await;
    let response = call_tool(&server, "read_diagram_guide", json!({})).await;
    let text = response["result"]["content"][0]["text"]
        .as_str()
        .expect("text");
    assert!(text.contains("Diagram design guide"));
    server.shutdown().await;
}
