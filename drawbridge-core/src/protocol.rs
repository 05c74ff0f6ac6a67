//! WebSocket wire protocol.
//!
//! ## Server -> peer
//!
//! - `{"type": "initial_elements", "elements": [...]}`
//! - `{"type": "sync_status", "connectedClients": 1, "timestamp": ...}`
//! - `{"type": "canvas_sync", "data": {"elements": [...], "appState": {...}, "files": {...}}}`
//! - `{"type": "element_created" | "element_updated", "element": {...}}`
//! - `{"type": "element_deleted", "id": "..."}`
//! - `{"type": "elements_batch_created", "elements": [...]}`
//! - `{"type": "elements_synced", "count": n, "syncedAt": "..."}`
//! - `{"type": "canvas_cleared", "count": n}`
//! - `{"type": "mermaid_convert", "requestId": "...", "mermaidDiagram": "..."}`
//! - `{"type": "export_image_request", "requestId": "...", "format": "png"}`
//! - `{"type": "set_viewport", "requestId": "...", ...}`
//! - `{"type": "snapshot", "name": "...", "elementCount": n, "createdAt": "..."}`
//!
//! ## Peer -> server
//!
//! - `{"type": "canvas_sync", "data": {...}}`
//! - `{"type": "element_created", "element": {...}}`
//! - `{"type": "element_updated", "id": "...", "updates": {...}}`
//! - `{"type": "element_deleted", "id": "..."}`
//!
//! Unknown inbound tags are ignored.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Element;

/// The full canonical scene: ordered elements plus app state and files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneData {
    /// Elements in Z-order, back-most first.
    pub elements: Vec<Element>,
    /// Editor app state (`viewBackgroundColor`, `gridSize`, ...).
    #[serde(default)]
    pub app_state: Map<String, Value>,
    /// Binary asset references.
    #[serde(default)]
    pub files: Map<String, Value>,
}

/// A viewport instruction relayed to the editor peer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportCommand {
    /// Scroll so the whole scene is visible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_to_content: Option<bool>,
    /// Scroll to a specific element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_to_element_id: Option<String>,
    /// Absolute zoom level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom: Option<f64>,
    /// Absolute horizontal scroll offset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_x: Option<f64>,
    /// Absolute vertical scroll offset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_y: Option<f64>,
}

/// Frames the server sends to WebSocket peers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerFrame {
    /// First frame after attach: the current element list.
    InitialElements {
        /// Elements in Z-order.
        elements: Vec<Element>,
    },
    /// Connection bookkeeping, sent after `initial_elements`.
    SyncStatus {
        /// Number of attached peers.
        connected_clients: usize,
        /// Server time, epoch milliseconds.
        timestamp: u64,
    },
    /// The full canonical scene; follows every accepted mutation.
    CanvasSync {
        /// Scene payload.
        data: SceneData,
    },
    /// One element was created.
    ElementCreated {
        /// The stored element.
        element: Element,
    },
    /// One element was updated.
    ElementUpdated {
        /// The post-mutation element.
        element: Element,
    },
    /// One element was removed.
    ElementDeleted {
        /// Removed element id.
        id: String,
    },
    /// A batch insert completed.
    ElementsBatchCreated {
        /// The stored elements, in insertion order.
        elements: Vec<Element>,
    },
    /// The scene was atomically replaced.
    ElementsSynced {
        /// Element count after the replace.
        count: usize,
        /// Replace time, ISO-8601.
        synced_at: String,
    },
    /// The scene was cleared.
    CanvasCleared {
        /// Number of elements removed.
        count: usize,
    },
    /// Ask the editor peer to convert a mermaid diagram.
    MermaidConvert {
        /// Correlation id for the result endpoint.
        request_id: String,
        /// Mermaid source text.
        mermaid_diagram: String,
        /// Optional conversion config, passed through verbatim.
        #[serde(skip_serializing_if = "Option::is_none")]
        config: Option<Value>,
    },
    /// Ask the editor peer to export the canvas as an image.
    ExportImageRequest {
        /// Correlation id for the result endpoint.
        request_id: String,
        /// `png` or `svg`.
        format: String,
        /// Whether/how to render the background, passed through verbatim.
        #[serde(skip_serializing_if = "Option::is_none")]
        background: Option<Value>,
    },
    /// Ask the editor peer to move its viewport.
    SetViewport {
        /// Correlation id for the result endpoint.
        request_id: String,
        /// The viewport instruction.
        #[serde(flatten)]
        command: ViewportCommand,
    },
    /// A snapshot was captured.
    Snapshot {
        /// Snapshot name.
        name: String,
        /// Number of elements captured.
        element_count: usize,
        /// Capture time, ISO-8601.
        created_at: String,
    },
}

/// Frames peers send to the server. Anything else is ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Full scene push from the editor.
    CanvasSync {
        /// Raw scene payload; elements pass through the normalizer.
        data: Value,
    },
    /// The editor created one element.
    ElementCreated {
        /// Raw element payload.
        element: Value,
    },
    /// The editor updated one element.
    ElementUpdated {
        /// Target element id.
        id: String,
        /// Partial update to merge.
        updates: Map<String, Value>,
    },
    /// The editor removed one element.
    ElementDeleted {
        /// Target element id.
        id: String,
    },
}
