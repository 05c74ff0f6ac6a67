//! REST facade: legacy surface, `/api` surface, correlated endpoints, and
//! the `/mcp` JSON-RPC endpoint.
//!
//! Every mutation endpoint broadcasts its specific event frame followed by a
//! full `canvas_sync` before acknowledging, so attached peers converge
//! before the caller observes success.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::Json;
use drawbridge_core::element::{now_iso, now_ms};
use drawbridge_core::{
    normalize_value, resolve_batch, Element, ElementFilter, RequestKind, SceneData, ServerFrame,
    ViewportCommand,
};
use drawbridge_mcp::{JsonRpcRequest, JsonRpcResponse};
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

// ============================================================================
// Shared helpers
// ============================================================================

/// Normalize one payload, resolve bindings against the store, insert, and
/// broadcast.
fn create_one(state: &AppState, payload: Value) -> ApiResult<Element> {
    let normalized = normalize_value(payload)?;
    let mut batch = vec![normalized];
    resolve_batch(&mut batch, &state.store.list());
    let element = batch.remove(0).element;
    state.store.put(element.clone());
    state.broadcast_mutation(ServerFrame::ElementCreated {
        element: element.clone(),
    });
    Ok(element)
}

/// Merge a partial update onto a stored element and broadcast.
fn patch_one(state: &AppState, id: &str, payload: &Value) -> ApiResult<Element> {
    let updates = payload
        .as_object()
        .ok_or_else(|| ApiError::InvalidArgument("Request body must be a JSON object".into()))?;
    let element = state.store.patch(id, updates)?;
    state.broadcast_mutation(ServerFrame::ElementUpdated {
        element: element.clone(),
    });
    Ok(element)
}

/// Normalize a `{elements: [...]}` body into stored form, resolving
/// intra-batch bindings.
fn normalize_body_elements(state: &AppState, body: &Value) -> ApiResult<Vec<Element>> {
    let payloads = body
        .get("elements")
        .and_then(Value::as_array)
        .ok_or_else(|| ApiError::InvalidArgument("Missing required field: elements".into()))?;
    let mut batch = Vec::with_capacity(payloads.len());
    for payload in payloads {
        batch.push(normalize_value(payload.clone())?);
    }
    resolve_batch(&mut batch, &state.store.list());
    Ok(batch
        .into_iter()
        .map(|n| n.element)
        .filter(|e| !e.is_deleted)
        .collect())
}

fn require_body_str<'a>(body: &'a Value, key: &str) -> ApiResult<&'a str> {
    body.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::InvalidArgument(format!("Missing required field: {key}")))
}

// ============================================================================
// Health & legacy surface
// ============================================================================

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "ok", "clients": state.bus.count() }))
}

/// `GET /canvas` - the full scene in the legacy shape.
pub async fn legacy_get_canvas(State(state): State<AppState>) -> Json<SceneData> {
    Json(state.store.scene_data())
}

/// `POST /canvas` - replace the scene.
pub async fn legacy_post_canvas(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let elements = normalize_body_elements(&state, &body)?;
    let app_state = body
        .get("appState")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let files = body
        .get("files")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let (_, after) = state.store.replace_scene(SceneData {
        elements,
        app_state,
        files,
    });
    state.broadcast_mutation(ServerFrame::ElementsSynced {
        count: after,
        synced_at: now_iso(),
    });
    Ok(Json(json!({ "status": "ok", "count": after })))
}

/// `GET /elements`
pub async fn legacy_list_elements(State(state): State<AppState>) -> Json<Vec<Element>> {
    Json(state.store.list())
}

/// `POST /elements`
pub async fn legacy_create_element(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Element>> {
    Ok(Json(create_one(&state, body)?))
}

/// `GET /elements/{id}`
pub async fn legacy_get_element(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Element>> {
    state
        .store
        .get(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Element not found: {id}")))
}

/// `PUT /elements/{id}`
pub async fn legacy_put_element(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Element>> {
    Ok(Json(patch_one(&state, &id, &body)?))
}

/// `DELETE /elements/{id}`
pub async fn legacy_delete_element(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    if !state.store.delete(&id) {
        return Err(ApiError::NotFound(format!("Element not found: {id}")));
    }
    state.broadcast_mutation(ServerFrame::ElementDeleted { id: id.clone() });
    Ok(Json(json!({ "deleted": true, "id": id })))
}

/// `POST /clear`
pub async fn legacy_clear(State(state): State<AppState>) -> Json<Value> {
    let count = state.store.clear();
    state.broadcast_mutation(ServerFrame::CanvasCleared { count });
    Json(json!({ "cleared": true, "count": count }))
}

/// `GET /snapshot` - a dump of the current scene.
pub async fn legacy_snapshot(State(state): State<AppState>) -> Json<Value> {
    let data = state.store.scene_data();
    Json(json!({
        "elements": data.elements,
        "appState": data.app_state,
        "files": data.files,
        "timestamp": now_ms(),
    }))
}

// ============================================================================
// Primary surface: elements
// ============================================================================

/// `GET /api/elements`
pub async fn api_list(State(state): State<AppState>) -> Json<Value> {
    let elements = state.store.list();
    Json(json!({ "success": true, "elements": elements, "count": elements.len() }))
}

/// `POST /api/elements`
pub async fn api_create(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let element = create_one(&state, body)?;
    Ok(Json(json!({ "success": true, "element": element })))
}

/// `GET /api/elements/search`
pub async fn api_search(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let filter = ElementFilter::from_params(&params)?;
    let elements = state.store.search(&filter);
    Ok(Json(json!({ "success": true, "elements": elements, "count": elements.len() })))
}

/// `POST /api/elements/batch`
pub async fn api_batch(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let elements = normalize_body_elements(&state, &body)?;
    state.store.put_many(elements.clone());
    state.broadcast_mutation(ServerFrame::ElementsBatchCreated {
        elements: elements.clone(),
    });
    Ok(Json(json!({ "success": true, "elements": elements, "count": elements.len() })))
}

/// `POST /api/elements/sync` - atomic replace of the live store.
pub async fn api_sync_elements(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let elements = normalize_body_elements(&state, &body)?;
    let (before, after) = state.store.replace(elements);
    let synced_at = now_iso();
    state.broadcast_mutation(ServerFrame::ElementsSynced {
        count: after,
        synced_at: synced_at.clone(),
    });
    Ok(Json(json!({
        "success": true,
        "beforeCount": before,
        "afterCount": after,
        "syncedAt": synced_at,
    })))
}

/// `GET /api/elements/{id}`
pub async fn api_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let element = state
        .store
        .get(&id)
        .ok_or_else(|| ApiError::NotFound(format!("Element not found: {id}")))?;
    Ok(Json(json!({ "success": true, "element": element })))
}

/// `PUT /api/elements/{id}`
pub async fn api_put(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let element = patch_one(&state, &id, &body)?;
    Ok(Json(json!({ "success": true, "element": element })))
}

/// `DELETE /api/elements/{id}`
pub async fn api_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    if !state.store.delete(&id) {
        return Err(ApiError::NotFound(format!("Element not found: {id}")));
    }
    state.broadcast_mutation(ServerFrame::ElementDeleted { id: id.clone() });
    Ok(Json(json!({ "success": true, "deleted": id })))
}

/// `DELETE /api/elements/clear`
pub async fn api_clear(State(state): State<AppState>) -> Json<Value> {
    let count = state.store.clear();
    state.broadcast_mutation(ServerFrame::CanvasCleared { count });
    Json(json!({ "success": true, "cleared": count }))
}

// ============================================================================
// Correlated endpoints
// ============================================================================

async fn correlated<F>(state: &AppState, kind: RequestKind, build: F) -> ApiResult<Value>
where
    F: FnOnce(String) -> ServerFrame,
{
    let peers = state.bus.count();
    if peers == 0 {
        return Err(ApiError::no_peer());
    }
    let (request_id, waiter) = state.correlator.issue(kind, peers);
    state.bus.broadcast(&build(request_id), None);
    Ok(waiter.wait().await?)
}

/// `POST /api/elements/from-mermaid`
pub async fn api_from_mermaid(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let diagram = require_body_str(&body, "mermaidDiagram")?.to_string();
    let config = body.get("config").cloned();
    let payload = correlated(&state, RequestKind::Mermaid, |request_id| {
        ServerFrame::MermaidConvert {
            request_id,
            mermaid_diagram: diagram,
            config,
        }
    })
    .await?;
    let elements = payload.get("elements").cloned().unwrap_or_else(|| json!([]));
    let count = elements.as_array().map_or(0, Vec::len);
    Ok(Json(json!({ "success": true, "elements": elements, "count": count })))
}

/// `POST /api/elements/from-mermaid/result` - called by the editor peer.
pub async fn api_from_mermaid_result(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let request_id = require_body_str(&body, "requestId")?;
    if let Some(error) = body.get("error").and_then(Value::as_str) {
        state.correlator.fail(request_id, error);
    } else {
        let elements = body.get("elements").cloned().unwrap_or_else(|| json!([]));
        state
            .correlator
            .resolve(request_id, json!({ "elements": elements }));
    }
    // Unknown ids fall through to success: the pending call already timed
    // out or was superseded, and that is a protocol contract.
    Ok(Json(json!({ "success": true })))
}

/// `POST /api/export/image`
pub async fn api_export_image(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let format = body
        .get("format")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::InvalidArgument("Missing required field: format".into()))?;
    if !matches!(format, "png" | "svg") {
        return Err(ApiError::InvalidArgument(format!(
            "Unsupported format: {format}"
        )));
    }
    let format = format.to_string();
    let background = body.get("background").cloned();
    let payload = correlated(&state, RequestKind::ExportImage, |request_id| {
        ServerFrame::ExportImageRequest {
            request_id,
            format: format.clone(),
            background,
        }
    })
    .await?;
    Ok(Json(json!({
        "success": true,
        "format": payload.get("format").cloned().unwrap_or_else(|| json!(format)),
        "data": payload.get("data").cloned().unwrap_or(Value::Null),
    })))
}

/// `POST /api/export/image/result` - called by the editor peer.
pub async fn api_export_image_result(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let request_id = require_body_str(&body, "requestId")?;
    if let Some(error) = body.get("error").and_then(Value::as_str) {
        state.correlator.fail(request_id, error);
    } else {
        state.correlator.resolve(
            request_id,
            json!({
                "format": body.get("format").cloned().unwrap_or(Value::Null),
                "data": body.get("data").cloned().unwrap_or(Value::Null),
            }),
        );
    }
    Ok(Json(json!({ "success": true })))
}

/// `POST /api/viewport`
pub async fn api_viewport(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let command: ViewportCommand = serde_json::from_value(body)
        .map_err(|e| ApiError::InvalidArgument(format!("Invalid viewport request: {e}")))?;
    let payload = correlated(&state, RequestKind::Viewport, |request_id| {
        ServerFrame::SetViewport {
            request_id,
            command,
        }
    })
    .await?;
    let message = payload
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("Viewport updated");
    Ok(Json(json!({ "success": true, "message": message })))
}

/// `POST /api/viewport/result` - called by the editor peer.
pub async fn api_viewport_result(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let request_id = require_body_str(&body, "requestId")?;
    if let Some(error) = body.get("error").and_then(Value::as_str) {
        state.correlator.fail(request_id, error);
    } else {
        let message = body
            .get("message")
            .cloned()
            .unwrap_or_else(|| json!("Viewport updated"));
        state
            .correlator
            .resolve(request_id, json!({ "message": message }));
    }
    Ok(Json(json!({ "success": true })))
}

// ============================================================================
// Snapshots & status
// ============================================================================

/// `POST /api/snapshots`
pub async fn api_snapshot_create(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let name = require_body_str(&body, "name")?;
    let meta = state.store.snapshot_create(name);
    state.bus.broadcast(
        &ServerFrame::Snapshot {
            name: meta.name.clone(),
            element_count: meta.element_count,
            created_at: meta.created_at.clone(),
        },
        None,
    );
    Ok(Json(json!({ "success": true, "snapshot": meta })))
}

/// `GET /api/snapshots`
pub async fn api_snapshot_list(State(state): State<AppState>) -> Json<Value> {
    let snapshots = state.store.snapshot_list();
    Json(json!({ "success": true, "snapshots": snapshots, "count": snapshots.len() }))
}

/// `GET /api/snapshots/{name}`
pub async fn api_snapshot_get(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Value>> {
    let snapshot = state
        .store
        .snapshot_get(&name)
        .ok_or_else(|| ApiError::NotFound(format!("Snapshot not found: {name}")))?;
    Ok(Json(json!({ "success": true, "snapshot": snapshot })))
}

/// `GET /api/sync/status`
pub async fn api_sync_status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "connectedClients": state.bus.count(),
        "pendingRequests": state.correlator.pending_count(),
        "elementCount": state.store.count(),
        "timestamp": now_ms(),
    }))
}

// ============================================================================
// Tool gateway
// ============================================================================

/// `POST /mcp` - stateless JSON-RPC 2.0.
pub async fn mcp(
    State(state): State<AppState>,
    Json(request): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    Json(state.gateway.handle_request(request).await)
}
