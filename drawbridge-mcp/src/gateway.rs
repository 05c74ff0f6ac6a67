//! Tool gateway: JSON-RPC 2.0 dispatch over the closed tool catalogue.
//!
//! Every handler is a function over the shared scene store, broadcast bus,
//! and correlator. Mutations broadcast their specific event frame followed
//! by a full `canvas_sync`, exactly like the REST facade, so WebSocket peers
//! converge no matter which surface mutated the scene.

use std::collections::{BTreeMap, HashMap};

use drawbridge_core::element::{new_element_id, now_iso, now_ms};
use drawbridge_core::{
    normalize_value, resolve_batch, BroadcastBus, Correlator, Element, ElementFilter, RequestKind,
    SceneData, SceneStore, ServerFrame, ViewportCommand,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::tools::catalogue;
use crate::{resources, ToolError, ToolOutput, ToolResult};

// ============================================================================
// JSON-RPC Types
// ============================================================================

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request ID.
    #[serde(default)]
    pub id: Value,
    /// Method name.
    pub method: String,
    /// Method parameters.
    #[serde(default)]
    pub params: Value,
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Request ID (matches request).
    pub id: Value,
    /// Result (on success).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error (on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i32,
    /// Error message.
    pub message: String,
    /// Additional data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    /// Create a success response.
    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    #[must_use]
    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

// ============================================================================
// Argument helpers
// ============================================================================

fn require_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing required field: {key}")))
}

fn ids_arg(args: &Value) -> Result<Vec<String>, ToolError> {
    let ids: Vec<String> = args
        .get("ids")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    if ids.is_empty() {
        return Err(ToolError::InvalidArguments(
            "Missing required field: ids".into(),
        ));
    }
    Ok(ids)
}

/// Render an argument value the way a query parameter would spell it.
fn param_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// Tool Gateway
// ============================================================================

/// The JSON-RPC tool-call front end.
pub struct ToolGateway {
    store: SceneStore,
    bus: BroadcastBus,
    correlator: Correlator,
}

impl ToolGateway {
    /// Create a gateway over the shared state.
    #[must_use]
    pub fn new(store: SceneStore, bus: BroadcastBus, correlator: Correlator) -> Self {
        Self {
            store,
            bus,
            correlator,
        }
    }

    /// Handle a JSON-RPC request.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        tracing::debug!(method = %request.method, "mcp request");

        match request.method.as_str() {
            "initialize" => Self::handle_initialize(request.id),
            "tools/list" => {
                JsonRpcResponse::success(request.id, json!({ "tools": catalogue() }))
            }
            "tools/call" => self.handle_tools_call(request.id, request.params).await,
            _ => JsonRpcResponse::error(
                request.id,
                -32601,
                format!("Method not found: {}", request.method),
            ),
        }
    }

    fn handle_initialize(id: Value) -> JsonRpcResponse {
        JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": "2024-11-05",
                "serverInfo": {
                    "name": "drawbridge",
                    "version": env!("CARGO_PKG_VERSION"),
                },
                "capabilities": { "tools": {} },
            }),
        )
    }

    async fn handle_tools_call(&self, id: Value, params: Value) -> JsonRpcResponse {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let args = params.get("arguments").cloned().unwrap_or(json!({}));

        let result = match name {
            "create_element" => self.call_create_element(&args),
            "batch_create_elements" => self.call_batch_create(&args),
            "update_element" => self.call_update_element(&args),
            "delete_element" => self.call_delete_element(&args),
            "clear_canvas" => self.call_clear_canvas(),
            "duplicate_elements" => self.call_duplicate_elements(&args),
            "query_elements" => self.call_query_elements(&args),
            "get_element" => self.call_get_element(&args),
            "describe_scene" => self.call_describe_scene(),
            "group_elements" => self.call_group_elements(&args),
            "ungroup_elements" => self.call_ungroup_elements(&args),
            "lock_elements" => self.call_set_locked(&args, true),
            "unlock_elements" => self.call_set_locked(&args, false),
            "align_elements" => self.call_align_elements(&args),
            "distribute_elements" => self.call_distribute_elements(&args),
            "snapshot_scene" => self.call_snapshot_scene(&args),
            "restore_snapshot" => self.call_restore_snapshot(&args),
            "import_scene" => self.call_import_scene(&args),
            "export_scene" => self.call_export_scene(&args),
            "create_from_mermaid" => self.call_create_from_mermaid(&args).await,
            "set_viewport" => self.call_set_viewport(&args).await,
            "export_to_image" => self.call_export_to_image(&args).await,
            "get_canvas_screenshot" => self.call_get_canvas_screenshot().await,
            "get_resource" => self.call_get_resource(&args),
            "read_diagram_guide" => Ok(ToolOutput::Text(resources::DIAGRAM_GUIDE.to_string())),
            "export_to_excalidraw_url" => self.call_export_url(),
            _ => Err(ToolError::InvalidArguments(format!("Unknown tool: {name}"))),
        };

        match result {
            Ok(output) => JsonRpcResponse::success(id, output.into_content()),
            Err(ToolError::InvalidArguments(message)) => {
                JsonRpcResponse::error(id, -32602, message)
            }
            Err(error) => JsonRpcResponse::error(id, -32000, error.to_string()),
        }
    }

    // ------------------------------------------------------------------
    // Broadcasting
    // ------------------------------------------------------------------

    fn broadcast_sync(&self) {
        self.bus.broadcast(
            &ServerFrame::CanvasSync {
                data: self.store.scene_data(),
            },
            None,
        );
    }

    fn broadcast_mutation(&self, frame: ServerFrame) {
        self.bus.broadcast(&frame, None);
        self.broadcast_sync();
    }

    async fn correlated<F>(&self, kind: RequestKind, build: F) -> Result<Value, ToolError>
    where
        F: FnOnce(String) -> ServerFrame,
    {
        let peers = self.bus.count();
        if peers == 0 {
            return Err(ToolError::NoPeer);
        }
        let (request_id, waiter) = self.correlator.issue(kind, peers);
        self.bus.broadcast(&build(request_id), None);
        waiter
            .wait()
            .await
            .map_err(|e| ToolError::Failed(e.to_string()))
    }

    // ------------------------------------------------------------------
    // Element CRUD
    // ------------------------------------------------------------------

    fn call_create_element(&self, args: &Value) -> ToolResult {
        let normalized =
            normalize_value(args.clone()).map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let mut batch = vec![normalized];
        resolve_batch(&mut batch, &self.store.list());
        let element = batch.remove(0).element;
        let id = element.id.clone();
        self.store.put(element.clone());
        self.broadcast_mutation(ServerFrame::ElementCreated { element: element.clone() });
        Ok(ToolOutput::Json(json!({ "id": id, "element": element })))
    }

    fn call_batch_create(&self, args: &Value) -> ToolResult {
        let payloads = args
            .get("elements")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ToolError::InvalidArguments("Missing required field: elements".into())
            })?;

        let mut batch = Vec::with_capacity(payloads.len());
        for payload in payloads {
            batch.push(
                normalize_value(payload.clone())
                    .map_err(|e| ToolError::InvalidArguments(e.to_string()))?,
            );
        }
        resolve_batch(&mut batch, &self.store.list());

        let elements: Vec<Element> = batch.into_iter().map(|n| n.element).collect();
        let ids: Vec<String> = elements.iter().map(|e| e.id.clone()).collect();
        self.store.put_many(elements.clone());
        self.broadcast_mutation(ServerFrame::ElementsBatchCreated { elements });
        Ok(ToolOutput::Json(json!({ "ids": ids, "count": ids.len() })))
    }

    fn call_update_element(&self, args: &Value) -> ToolResult {
        let id = require_str(args, "id")?.to_string();
        let mut updates = args
            .as_object()
            .cloned()
            .ok_or_else(|| ToolError::InvalidArguments("Arguments must be an object".into()))?;
        updates.remove("id");
        if updates.is_empty() {
            return Err(ToolError::InvalidArguments("No fields to update".into()));
        }
        let element = self.patch_element(&id, &updates)?;
        self.broadcast_mutation(ServerFrame::ElementUpdated { element: element.clone() });
        Ok(ToolOutput::Json(json!({ "element": element })))
    }

    fn call_delete_element(&self, args: &Value) -> ToolResult {
        let id = require_str(args, "id")?;
        if !self.store.delete(id) {
            return Err(ToolError::NotFound(format!("Element not found: {id}")));
        }
        self.broadcast_mutation(ServerFrame::ElementDeleted { id: id.to_string() });
        Ok(ToolOutput::Json(json!({ "deleted": true, "id": id })))
    }

    fn call_clear_canvas(&self) -> ToolResult {
        let count = self.store.clear();
        self.broadcast_mutation(ServerFrame::CanvasCleared { count });
        Ok(ToolOutput::Text(format!(
            "Cleared {count} elements from the canvas"
        )))
    }

    fn call_duplicate_elements(&self, args: &Value) -> ToolResult {
        let ids = ids_arg(args)?;
        let offset_x = args.get("offsetX").and_then(Value::as_f64).unwrap_or(10.0);
        let offset_y = args.get("offsetY").and_then(Value::as_f64).unwrap_or(10.0);

        let mut copies = Vec::with_capacity(ids.len());
        for id in &ids {
            let Some(mut element) = self.store.get(id) else {
                return Err(ToolError::NotFound(format!("Element not found: {id}")));
            };
            element.id = new_element_id();
            element.x += offset_x;
            element.y += offset_y;
            element.version = 1;
            element.version_nonce = rand_nonce();
            element.updated = now_ms();
            element.created_at = now_iso();
            element.updated_at = element.created_at.clone();
            // Bindings point at the originals; the copies stand alone.
            element.start_binding = None;
            element.end_binding = None;
            element.group_ids.clear();
            copies.push(element);
        }

        let new_ids: Vec<String> = copies.iter().map(|e| e.id.clone()).collect();
        self.store.put_many(copies.clone());
        self.broadcast_mutation(ServerFrame::ElementsBatchCreated { elements: copies });
        Ok(ToolOutput::Json(
            json!({ "ids": new_ids, "count": new_ids.len() }),
        ))
    }

    // ------------------------------------------------------------------
    // Read-only
    // ------------------------------------------------------------------

    fn call_query_elements(&self, args: &Value) -> ToolResult {
        let mut params = HashMap::new();
        if let Some(filter) = args.get("filter").and_then(Value::as_object) {
            for (key, value) in filter {
                params.insert(key.clone(), param_string(value));
            }
        }
        let filter = ElementFilter::from_params(&params)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let elements = self.store.search(&filter);
        Ok(ToolOutput::Json(json!({
            "elements": elements,
            "count": elements.len(),
        })))
    }

    fn call_get_element(&self, args: &Value) -> ToolResult {
        let id = require_str(args, "id")?;
        match self.store.get(id) {
            Some(element) => Ok(ToolOutput::Json(json!({ "element": element }))),
            None => Err(ToolError::NotFound(format!("Element not found: {id}"))),
        }
    }

    fn call_describe_scene(&self) -> ToolResult {
        let elements = self.store.list();
        if elements.is_empty() {
            return Ok(ToolOutput::Text("The canvas is empty.".to_string()));
        }

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for element in &elements {
            *counts.entry(element.element_type.as_str()).or_default() += 1;
        }
        let breakdown = counts
            .iter()
            .map(|(tag, n)| format!("{n} {tag}"))
            .collect::<Vec<_>>()
            .join(", ");

        let min_x = elements.iter().map(|e| e.x).fold(f64::INFINITY, f64::min);
        let min_y = elements.iter().map(|e| e.y).fold(f64::INFINITY, f64::min);
        let max_x = elements
            .iter()
            .map(|e| e.x + e.width)
            .fold(f64::NEG_INFINITY, f64::max);
        let max_y = elements
            .iter()
            .map(|e| e.y + e.height)
            .fold(f64::NEG_INFINITY, f64::max);

        let mut summary = format!(
            "The canvas has {} elements ({breakdown}), spanning ({:.0}, {:.0}) to ({:.0}, {:.0}).",
            elements.len(),
            min_x,
            min_y,
            max_x,
            max_y
        );

        let texts: Vec<&str> = elements
            .iter()
            .filter_map(|e| e.text.as_deref())
            .filter(|t| !t.is_empty())
            .collect();
        if !texts.is_empty() {
            summary.push_str("\nText content: ");
            summary.push_str(&texts.join("; "));
        }

        Ok(ToolOutput::Text(summary))
    }

    // ------------------------------------------------------------------
    // Bulk patches
    // ------------------------------------------------------------------

    fn patch_element(&self, id: &str, updates: &Map<String, Value>) -> Result<Element, ToolError> {
        self.store.patch(id, updates).map_err(|e| match e {
            drawbridge_core::CoreError::NotFound(..) => ToolError::NotFound(e.to_string()),
            other => ToolError::InvalidArguments(other.to_string()),
        })
    }

    fn call_group_elements(&self, args: &Value) -> ToolResult {
        let ids = ids_arg(args)?;
        let group_id = Uuid::new_v4().simple().to_string();
        for id in &ids {
            let Some(element) = self.store.get(id) else {
                return Err(ToolError::NotFound(format!("Element not found: {id}")));
            };
            let mut group_ids = element.group_ids;
            group_ids.push(group_id.clone());
            let mut updates = Map::new();
            updates.insert("groupIds".into(), json!(group_ids));
            self.patch_element(id, &updates)?;
        }
        self.broadcast_sync();
        Ok(ToolOutput::Json(
            json!({ "groupId": group_id, "ids": ids, "count": ids.len() }),
        ))
    }

    fn call_ungroup_elements(&self, args: &Value) -> ToolResult {
        let mut touched = 0usize;
        if let Some(group_id) = args.get("groupId").and_then(Value::as_str) {
            for element in self.store.list() {
                if element.group_ids.iter().any(|g| g == group_id) {
                    let remaining: Vec<&String> = element
                        .group_ids
                        .iter()
                        .filter(|g| g.as_str() != group_id)
                        .collect();
                    let mut updates = Map::new();
                    updates.insert("groupIds".into(), json!(remaining));
                    self.patch_element(&element.id, &updates)?;
                    touched += 1;
                }
            }
        } else {
            for id in ids_arg(args)? {
                let mut updates = Map::new();
                updates.insert("groupIds".into(), json!([]));
                self.patch_element(&id, &updates)?;
                touched += 1;
            }
        }
        self.broadcast_sync();
        Ok(ToolOutput::Json(json!({ "count": touched })))
    }

    fn call_set_locked(&self, args: &Value, locked: bool) -> ToolResult {
        let ids = ids_arg(args)?;
        for id in &ids {
            let mut updates = Map::new();
            updates.insert("locked".into(), json!(locked));
            self.patch_element(id, &updates)?;
        }
        self.broadcast_sync();
        Ok(ToolOutput::Json(json!({ "ids": ids, "locked": locked })))
    }

    // ------------------------------------------------------------------
    // Layout
    // ------------------------------------------------------------------

    fn call_align_elements(&self, args: &Value) -> ToolResult {
        let ids = ids_arg(args)?;
        let alignment = require_str(args, "alignment")?;

        let mut selected = Vec::with_capacity(ids.len());
        for id in &ids {
            let Some(element) = self.store.get(id) else {
                return Err(ToolError::NotFound(format!("Element not found: {id}")));
            };
            selected.push(element);
        }

        let min_x = selected.iter().map(|e| e.x).fold(f64::INFINITY, f64::min);
        let min_y = selected.iter().map(|e| e.y).fold(f64::INFINITY, f64::min);
        let max_right = selected
            .iter()
            .map(|e| e.x + e.width)
            .fold(f64::NEG_INFINITY, f64::max);
        let max_bottom = selected
            .iter()
            .map(|e| e.y + e.height)
            .fold(f64::NEG_INFINITY, f64::max);
        let center_x = (min_x + max_right) / 2.0;
        let middle_y = (min_y + max_bottom) / 2.0;

        for element in &selected {
            let (key, value) = match alignment {
                "left" => ("x", min_x),
                "right" => ("x", max_right - element.width),
                "top" => ("y", min_y),
                "bottom" => ("y", max_bottom - element.height),
                "center" => ("x", center_x - element.width / 2.0),
                "middle" => ("y", middle_y - element.height / 2.0),
                other => {
                    return Err(ToolError::InvalidArguments(format!(
                        "Unknown alignment: {other}"
                    )))
                }
            };
            let mut updates = Map::new();
            updates.insert(key.into(), json!(value));
            self.patch_element(&element.id, &updates)?;
        }
        self.broadcast_sync();
        Ok(ToolOutput::Json(
            json!({ "alignment": alignment, "count": ids.len() }),
        ))
    }

    fn call_distribute_elements(&self, args: &Value) -> ToolResult {
        let ids = ids_arg(args)?;
        let direction = require_str(args, "direction")?;
        if !matches!(direction, "horizontal" | "vertical") {
            return Err(ToolError::InvalidArguments(format!(
                "Unknown direction: {direction}"
            )));
        }

        let mut selected = Vec::with_capacity(ids.len());
        for id in &ids {
            let Some(element) = self.store.get(id) else {
                return Err(ToolError::NotFound(format!("Element not found: {id}")));
            };
            selected.push(element);
        }
        if selected.len() < 3 {
            return Ok(ToolOutput::Json(
                json!({ "direction": direction, "count": selected.len(), "moved": 0 }),
            ));
        }

        let horizontal = direction == "horizontal";
        selected.sort_by(|a, b| {
            let (ka, kb) = if horizontal { (a.x, b.x) } else { (a.y, b.y) };
            ka.partial_cmp(&kb).unwrap_or(std::cmp::Ordering::Equal)
        });

        let first = &selected[0];
        let last = &selected[selected.len() - 1];
        let span = if horizontal {
            (last.x + last.width) - first.x
        } else {
            (last.y + last.height) - first.y
        };
        let total: f64 = selected
            .iter()
            .map(|e| if horizontal { e.width } else { e.height })
            .sum();
        let gap = (span - total) / (selected.len() - 1) as f64;

        let mut cursor = if horizontal { first.x } else { first.y };
        for element in &selected {
            let mut updates = Map::new();
            if horizontal {
                updates.insert("x".into(), json!(cursor));
                cursor += element.width + gap;
            } else {
                updates.insert("y".into(), json!(cursor));
                cursor += element.height + gap;
            }
            self.patch_element(&element.id, &updates)?;
        }
        self.broadcast_sync();
        Ok(ToolOutput::Json(
            json!({ "direction": direction, "count": selected.len() }),
        ))
    }

    // ------------------------------------------------------------------
    // Snapshots & scene transfer
    // ------------------------------------------------------------------

    fn call_snapshot_scene(&self, args: &Value) -> ToolResult {
        let name = require_str(args, "name")?;
        let meta = self.store.snapshot_create(name);
        self.bus.broadcast(
            &ServerFrame::Snapshot {
                name: meta.name.clone(),
                element_count: meta.element_count,
                created_at: meta.created_at.clone(),
            },
            None,
        );
        Ok(ToolOutput::Json(json!({ "snapshot": meta })))
    }

    fn call_restore_snapshot(&self, args: &Value) -> ToolResult {
        let name = require_str(args, "name")?;
        let count = self
            .store
            .snapshot_restore(name)
            .map_err(|e| ToolError::NotFound(e.to_string()))?;
        self.broadcast_sync();
        Ok(ToolOutput::Json(
            json!({ "restored": name, "count": count }),
        ))
    }

    fn call_import_scene(&self, args: &Value) -> ToolResult {
        let scene = args
            .get("scene")
            .ok_or_else(|| ToolError::InvalidArguments("Missing required field: scene".into()))?;
        let mode = args
            .get("mode")
            .and_then(Value::as_str)
            .unwrap_or("merge");
        if !matches!(mode, "merge" | "replace") {
            return Err(ToolError::InvalidArguments(format!("Unknown mode: {mode}")));
        }

        let payloads = scene
            .get("elements")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ToolError::InvalidArguments("Scene must carry an elements array".into())
            })?;
        let mut batch = Vec::with_capacity(payloads.len());
        for payload in payloads {
            batch.push(
                normalize_value(payload.clone())
                    .map_err(|e| ToolError::InvalidArguments(e.to_string()))?,
            );
        }
        resolve_batch(&mut batch, &self.store.list());
        let elements: Vec<Element> = batch
            .into_iter()
            .map(|n| n.element)
            .filter(|e| !e.is_deleted)
            .collect();
        let count = elements.len();

        if mode == "replace" {
            let app_state = scene
                .get("appState")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            let files = scene
                .get("files")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            self.store.replace_scene(SceneData {
                elements,
                app_state,
                files,
            });
            self.broadcast_mutation(ServerFrame::ElementsSynced {
                count,
                synced_at: now_iso(),
            });
        } else {
            self.store.put_many(elements.clone());
            self.broadcast_mutation(ServerFrame::ElementsBatchCreated { elements });
        }

        Ok(ToolOutput::Json(json!({ "mode": mode, "count": count })))
    }

    fn call_export_scene(&self, args: &Value) -> ToolResult {
        let document = resources::scene_document(&self.store);
        if let Some(path) = args.get("filePath").and_then(Value::as_str) {
            let pretty = serde_json::to_string_pretty(&document)
                .map_err(|e| ToolError::Failed(e.to_string()))?;
            std::fs::write(path, pretty)
                .map_err(|e| ToolError::Failed(format!("Failed to write {path}: {e}")))?;
            return Ok(ToolOutput::Text(format!("Scene exported to {path}")));
        }
        Ok(ToolOutput::Json(document))
    }

    fn call_export_url(&self) -> ToolResult {
        let document = resources::scene_document(&self.store);
        Ok(ToolOutput::Json(json!({
            "url": resources::excalidraw_url(&document),
        })))
    }

    fn call_get_resource(&self, args: &Value) -> ToolResult {
        match require_str(args, "resource")? {
            "scene" => Ok(ToolOutput::Json(resources::scene_document(&self.store))),
            "elements" => Ok(ToolOutput::Json(json!({
                "elements": self.store.list(),
            }))),
            "theme" => Ok(ToolOutput::Json(resources::theme())),
            "library" => Ok(ToolOutput::Json(resources::library())),
            other => Err(ToolError::InvalidArguments(format!(
                "Unknown resource: {other}"
            ))),
        }
    }

    // ------------------------------------------------------------------
    // Correlated tools
    // ------------------------------------------------------------------

    async fn call_create_from_mermaid(&self, args: &Value) -> ToolResult {
        let diagram = require_str(args, "mermaidDiagram")?.to_string();
        let config = args.get("config").cloned();
        let payload = self
            .correlated(RequestKind::Mermaid, |request_id| {
                ServerFrame::MermaidConvert {
                    request_id,
                    mermaid_diagram: diagram,
                    config,
                }
            })
            .await?;
        let count = payload
            .get("elements")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        Ok(ToolOutput::Json(json!({
            "elements": payload.get("elements").cloned().unwrap_or(json!([])),
            "count": count,
        })))
    }

    async fn call_set_viewport(&self, args: &Value) -> ToolResult {
        let command: ViewportCommand = serde_json::from_value(args.clone())
            .map_err(|e| ToolError::InvalidArguments(format!("Invalid viewport: {e}")))?;
        let payload = self
            .correlated(RequestKind::Viewport, |request_id| ServerFrame::SetViewport {
                request_id,
                command,
            })
            .await?;
        let message = payload
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Viewport updated");
        Ok(ToolOutput::Text(message.to_string()))
    }

    async fn call_export_to_image(&self, args: &Value) -> ToolResult {
        let format = args
            .get("format")
            .and_then(Value::as_str)
            .unwrap_or("png")
            .to_string();
        if !matches!(format.as_str(), "png" | "svg") {
            return Err(ToolError::InvalidArguments(format!(
                "Unsupported format: {format}"
            )));
        }
        let background = args.get("background").cloned();
        let payload = self
            .correlated(RequestKind::ExportImage, |request_id| {
                ServerFrame::ExportImageRequest {
                    request_id,
                    format,
                    background,
                }
            })
            .await?;
        Ok(ToolOutput::Json(payload))
    }

    async fn call_get_canvas_screenshot(&self) -> ToolResult {
        let payload = self
            .correlated(RequestKind::ExportImage, |request_id| {
                ServerFrame::ExportImageRequest {
                    request_id,
                    format: "png".to_string(),
                    background: None,
                }
            })
            .await?;
        let data = payload
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::Failed("Peer returned no image data".into()))?;
        Ok(ToolOutput::Image {
            data: data.to_string(),
            mime_type: "image/png".to_string(),
        })
    }
}

fn rand_nonce() -> u32 {
    rand::random()
}

#[cfg(test)]
mod tests {
    use super::*;
    use drawbridge_core::{BroadcastBus, Correlator, SceneStore};

    fn gateway() -> ToolGateway {
        ToolGateway::new(SceneStore::new(), BroadcastBus::new(), Correlator::new())
    }

    fn request(method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: json!(1),
            method: method.to_string(),
            params,
        }
    }

    fn call(name: &str, arguments: Value) -> JsonRpcRequest {
        request("tools/call", json!({"name": name, "arguments": arguments}))
    }

    async fn call_ok(gateway: &ToolGateway, name: &str, arguments: Value) -> Value {
        let response = gateway.handle_request(call(name, arguments)).await;
        assert!(response.error.is_none(), "tool {name} failed: {response:?}");
        let text = response.result.unwrap()["content"][0]["text"]
            .as_str()
            .unwrap()
            .to_string();
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    }

    #[tokio::test]
    async fn tools_list_is_the_closed_catalogue() {
        let response = gateway().handle_request(request("tools/list", json!({}))).await;
        let tools = response.result.unwrap()["tools"].as_array().unwrap().len();
        assert_eq!(tools, 26);
    }

    #[tokio::test]
    async fn unknown_method_is_rejected() {
        let response = gateway()
            .handle_request(request("resources/subscribe", json!({})))
            .await;
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected() {
        let response = gateway().handle_request(call("paint_house", json!({}))).await;
        assert_eq!(response.error.unwrap().code, -32602);
    }

    #[tokio::test]
    async fn create_and_get_element() {
        let gateway = gateway();
        let created = call_ok(
            &gateway,
            "create_element",
            json!({"type": "rectangle", "x": 5.0, "y": 6.0}),
        )
        .await;
        let id = created["id"].as_str().unwrap().to_string();

        let fetched = call_ok(&gateway, "get_element", json!({"id": id})).await;
        assert_eq!(fetched["element"]["x"], 5.0);
    }

    #[tokio::test]
    async fn batch_create_binds_arrows() {
        let gateway = gateway();
        let result = call_ok(
            &gateway,
            "batch_create_elements",
            json!({"elements": [
                {"id": "n1-0000000000000000", "type": "rectangle", "x": 0.0, "y": 0.0, "width": 100.0, "height": 50.0},
                {"id": "n2-0000000000000000", "type": "rectangle", "x": 300.0, "y": 0.0, "width": 100.0, "height": 50.0},
                {"type": "arrow", "start": {"id": "n1-0000000000000000"}, "end": {"id": "n2-0000000000000000"}},
            ]}),
        )
        .await;
        assert_eq!(result["count"], 3);

        let arrow_id = result["ids"][2].as_str().unwrap();
        let arrow = gateway.store.get(arrow_id).unwrap();
        assert_eq!(
            arrow.start_binding.unwrap().element_id,
            "n1-0000000000000000"
        );
        assert_eq!(arrow.points.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn update_element_merges_fields() {
        let gateway = gateway();
        let created = call_ok(&gateway, "create_element", json!({"type": "rectangle"})).await;
        let id = created["id"].as_str().unwrap();

        let updated = call_ok(
            &gateway,
            "update_element",
            json!({"id": id, "x": 77.0, "strokeColor": "#e03131"}),
        )
        .await;
        assert_eq!(updated["element"]["x"], 77.0);
        assert_eq!(updated["element"]["strokeColor"], "#e03131");
        assert_eq!(updated["element"]["version"], 2);
    }

    #[tokio::test]
    async fn update_unknown_element_is_an_error() {
        let response = gateway()
            .handle_request(call("update_element", json!({"id": "ghost", "x": 1.0})))
            .await;
        assert_eq!(response.error.unwrap().code, -32000);
    }

    #[tokio::test]
    async fn duplicate_gets_fresh_ids_and_offset() {
        let gateway = gateway();
        let created = call_ok(
            &gateway,
            "create_element",
            json!({"type": "rectangle", "x": 10.0, "y": 10.0}),
        )
        .await;
        let id = created["id"].as_str().unwrap().to_string();

        let result = call_ok(&gateway, "duplicate_elements", json!({"ids": [id]})).await;
        let copy_id = result["ids"][0].as_str().unwrap();
        assert_ne!(copy_id, id);

        let copy = gateway.store.get(copy_id).unwrap();
        assert!((copy.x - 20.0).abs() < f64::EPSILON);
        assert_eq!(copy.version, 1);
    }

    #[tokio::test]
    async fn align_center_uses_bounding_box_midpoint() {
        let gateway = gateway();
        call_ok(
            &gateway,
            "batch_create_elements",
            json!({"elements": [
                {"id": "a0-0000000000000000", "type": "rectangle", "x": 0.0, "y": 0.0, "width": 100.0, "height": 50.0},
                {"id": "b0-0000000000000000", "type": "rectangle", "x": 200.0, "y": 100.0, "width": 200.0, "height": 50.0},
            ]}),
        )
        .await;
        call_ok(
            &gateway,
            "align_elements",
            json!({"ids": ["a0-0000000000000000", "b0-0000000000000000"], "alignment": "center"}),
        )
        .await;

        // Bounds span x 0..400, midpoint 200.
        let a = gateway.store.get("a0-0000000000000000").unwrap();
        let b = gateway.store.get("b0-0000000000000000").unwrap();
        assert!((a.x - 150.0).abs() < f64::EPSILON);
        assert!((b.x - 100.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn distribute_horizontal_spreads_evenly() {
        let gateway = gateway();
        call_ok(
            &gateway,
            "batch_create_elements",
            json!({"elements": [
                {"id": "d1-0000000000000000", "type": "rectangle", "x": 0.0, "y": 0.0, "width": 50.0, "height": 50.0},
                {"id": "d2-0000000000000000", "type": "rectangle", "x": 60.0, "y": 0.0, "width": 50.0, "height": 50.0},
                {"id": "d3-0000000000000000", "type": "rectangle", "x": 350.0, "y": 0.0, "width": 50.0, "height": 50.0},
            ]}),
        )
        .await;
        call_ok(
            &gateway,
            "distribute_elements",
            json!({
                "ids": ["d1-0000000000000000", "d2-0000000000000000", "d3-0000000000000000"],
                "direction": "horizontal"
            }),
        )
        .await;

        // Span 0..400, widths sum 150, two gaps of 125 each.
        let d2 = gateway.store.get("d2-0000000000000000").unwrap();
        assert!((d2.x - 175.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn snapshot_and_restore_round_trip() {
        let gateway = gateway();
        call_ok(&gateway, "create_element", json!({"type": "rectangle"})).await;
        call_ok(&gateway, "snapshot_scene", json!({"name": "v1"})).await;
        call_ok(&gateway, "clear_canvas", json!({})).await;
        assert_eq!(gateway.store.count(), 0);

        let restored = call_ok(&gateway, "restore_snapshot", json!({"name": "v1"})).await;
        assert_eq!(restored["count"], 1);
        assert_eq!(gateway.store.count(), 1);
    }

    #[tokio::test]
    async fn import_export_round_trips_element_set() {
        let gateway = gateway();
        call_ok(
            &gateway,
            "create_element",
            json!({"type": "rectangle", "x": 3.0}),
        )
        .await;
        let exported = call_ok(&gateway, "export_scene", json!({})).await;

        call_ok(&gateway, "clear_canvas", json!({})).await;
        let imported = call_ok(
            &gateway,
            "import_scene",
            json!({"scene": exported, "mode": "replace"}),
        )
        .await;
        assert_eq!(imported["count"], 1);
        assert_eq!(gateway.store.count(), 1);
        assert!((gateway.store.list()[0].x - 3.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn correlated_tools_require_a_peer() {
        let response = gateway()
            .handle_request(call(
                "create_from_mermaid",
                json!({"mermaidDiagram": "graph TD; A-->B;"}),
            ))
            .await;
        let error = response.error.unwrap();
        assert_eq!(error.code, -32000);
        assert!(error.message.contains("No frontend client connected"));
    }

    #[tokio::test]
    async fn describe_scene_summarizes_content() {
        let gateway = gateway();
        call_ok(
            &gateway,
            "create_element",
            json!({"type": "text", "text": "Login flow"}),
        )
        .await;
        let response = gateway.handle_request(call("describe_scene", json!({}))).await;
        let text = response.result.unwrap()["content"][0]["text"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(text.contains("1 text"));
        assert!(text.contains("Login flow"));
    }

    #[tokio::test]
    async fn group_then_ungroup() {
        let gateway = gateway();
        call_ok(
            &gateway,
            "batch_create_elements",
            json!({"elements": [
                {"id": "g1-0000000000000000", "type": "rectangle"},
                {"id": "g2-0000000000000000", "type": "rectangle"},
            ]}),
        )
        .await;
        let grouped = call_ok(
            &gateway,
            "group_elements",
            json!({"ids": ["g1-0000000000000000", "g2-0000000000000000"]}),
        )
        .await;
        let group_id = grouped["groupId"].as_str().unwrap().to_string();
        assert_eq!(
            gateway.store.get("g1-0000000000000000").unwrap().group_ids,
            vec![group_id.clone()]
        );

        call_ok(&gateway, "ungroup_elements", json!({"groupId": group_id})).await;
        assert!(gateway
            .store
            .get("g1-0000000000000000")
            .unwrap()
            .group_ids
            .is_empty());
    }

    #[tokio::test]
    async fn export_url_is_shareable() {
        let result = call_ok(&gateway(), "export_to_excalidraw_url", json!({})).await;
        assert!(result["url"]
            .as_str()
            .unwrap()
            .starts_with("https://excalidraw.com/#json="));
    }
}
