//! The closed tool catalogue and its JSON schemas.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One tool definition advertised by `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Input schema (JSON Schema).
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl Tool {
    fn new(name: &str, description: &str, input_schema: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
        }
    }
}

/// The closed catalogue, in display order.
#[must_use]
pub fn catalogue() -> Vec<Tool> {
    vec![
        Tool::new(
            "create_element",
            "Create a single element on the canvas. Arrows and lines may reference their endpoints with start/end {id} and will be bound to those elements.",
            element_schema(),
        ),
        Tool::new(
            "batch_create_elements",
            "Create multiple elements at once. Arrow start/end references resolve against the whole batch, so diagrams can be created in one call.",
            json!({
                "type": "object",
                "properties": {
                    "elements": {
                        "type": "array",
                        "description": "Elements to create, in Z-order",
                        "items": element_schema(),
                    }
                },
                "required": ["elements"],
            }),
        ),
        Tool::new(
            "update_element",
            "Update an existing element. Any field besides id and type can be changed; omitted fields keep their value.",
            json!({
                "type": "object",
                "properties": {
                    "id": id_property(),
                },
                "required": ["id"],
                "additionalProperties": true,
            }),
        ),
        Tool::new(
            "delete_element",
            "Delete an element by id.",
            json!({
                "type": "object",
                "properties": { "id": id_property() },
                "required": ["id"],
            }),
        ),
        Tool::new(
            "clear_canvas",
            "Remove every element from the canvas.",
            json!({"type": "object", "properties": {}}),
        ),
        Tool::new(
            "duplicate_elements",
            "Deep-copy elements with fresh ids, shifted by an offset.",
            json!({
                "type": "object",
                "properties": {
                    "ids": ids_property(),
                    "offsetX": { "type": "number", "description": "Horizontal shift (default 10)" },
                    "offsetY": { "type": "number", "description": "Vertical shift (default 10)" },
                },
                "required": ["ids"],
            }),
        ),
        Tool::new(
            "query_elements",
            "Find elements matching a conjunctive filter (type, styling fields, size ranges, text substring).",
            json!({
                "type": "object",
                "properties": {
                    "filter": {
                        "type": "object",
                        "description": "Field filters: type, strokeColor, minWidth/maxWidth, minHeight/maxHeight, textContains, or any element field",
                        "additionalProperties": true,
                    }
                },
            }),
        ),
        Tool::new(
            "get_element",
            "Fetch one element by id.",
            json!({
                "type": "object",
                "properties": { "id": id_property() },
                "required": ["id"],
            }),
        ),
        Tool::new(
            "describe_scene",
            "Summarize the canvas in plain language: element counts, bounds, and text content.",
            json!({"type": "object", "properties": {}}),
        ),
        Tool::new(
            "group_elements",
            "Group elements together under a fresh group id.",
            json!({
                "type": "object",
                "properties": { "ids": ids_property() },
                "required": ["ids"],
            }),
        ),
        Tool::new(
            "ungroup_elements",
            "Dissolve a group by id, or clear the grouping of specific elements.",
            json!({
                "type": "object",
                "properties": {
                    "groupId": { "type": "string", "description": "Group to dissolve" },
                    "ids": ids_property(),
                },
            }),
        ),
        Tool::new(
            "lock_elements",
            "Lock elements against editing.",
            json!({
                "type": "object",
                "properties": { "ids": ids_property() },
                "required": ["ids"],
            }),
        ),
        Tool::new(
            "unlock_elements",
            "Unlock previously locked elements.",
            json!({
                "type": "object",
                "properties": { "ids": ids_property() },
                "required": ["ids"],
            }),
        ),
        Tool::new(
            "align_elements",
            "Align elements against their collective bounding box.",
            json!({
                "type": "object",
                "properties": {
                    "ids": ids_property(),
                    "alignment": {
                        "type": "string",
                        "enum": ["left", "right", "top", "bottom", "center", "middle"],
                        "description": "center aligns horizontal centers, middle aligns vertical centers",
                    },
                },
                "required": ["ids", "alignment"],
            }),
        ),
        Tool::new(
            "distribute_elements",
            "Distribute elements with even gaps between the outermost pair.",
            json!({
                "type": "object",
                "properties": {
                    "ids": ids_property(),
                    "direction": { "type": "string", "enum": ["horizontal", "vertical"] },
                },
                "required": ["ids", "direction"],
            }),
        ),
        Tool::new(
            "snapshot_scene",
            "Capture a named snapshot of the current scene. Re-using a name overwrites.",
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Snapshot name" },
                },
                "required": ["name"],
            }),
        ),
        Tool::new(
            "restore_snapshot",
            "Replace the live scene with a snapshot's elements.",
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Snapshot name" },
                },
                "required": ["name"],
            }),
        ),
        Tool::new(
            "import_scene",
            "Adopt a supplied scene document, merging with or replacing the current canvas.",
            json!({
                "type": "object",
                "properties": {
                    "scene": {
                        "type": "object",
                        "description": "Scene document with an elements array, optional appState and files",
                    },
                    "mode": {
                        "type": "string",
                        "enum": ["merge", "replace"],
                        "default": "merge",
                    },
                },
                "required": ["scene"],
            }),
        ),
        Tool::new(
            "export_scene",
            "Dump the canonical scene document, optionally writing it to a file.",
            json!({
                "type": "object",
                "properties": {
                    "filePath": { "type": "string", "description": "Write the document here instead of returning it" },
                },
            }),
        ),
        Tool::new(
            "create_from_mermaid",
            "Convert a mermaid diagram to canvas elements via the connected editor. Requires the editor to be open.",
            json!({
                "type": "object",
                "properties": {
                    "mermaidDiagram": { "type": "string", "description": "Mermaid source text" },
                    "config": { "type": "object", "description": "Optional mermaid config" },
                },
                "required": ["mermaidDiagram"],
            }),
        ),
        Tool::new(
            "set_viewport",
            "Control the editor viewport: scroll to content or an element, set zoom/offsets. Requires the editor to be open.",
            json!({
                "type": "object",
                "properties": {
                    "scrollToContent": { "type": "boolean" },
                    "scrollToElementId": { "type": "string" },
                    "zoom": { "type": "number" },
                    "offsetX": { "type": "number" },
                    "offsetY": { "type": "number" },
                },
            }),
        ),
        Tool::new(
            "export_to_image",
            "Export the canvas as png or svg via the connected editor. Requires the editor to be open.",
            json!({
                "type": "object",
                "properties": {
                    "format": { "type": "string", "enum": ["png", "svg"], "default": "png" },
                    "background": { "description": "Whether to render the background" },
                },
            }),
        ),
        Tool::new(
            "get_canvas_screenshot",
            "Capture the canvas as a png image, returned as image content. Requires the editor to be open.",
            json!({"type": "object", "properties": {}}),
        ),
        Tool::new(
            "get_resource",
            "Read-only projections of server state.",
            json!({
                "type": "object",
                "properties": {
                    "resource": {
                        "type": "string",
                        "enum": ["scene", "elements", "theme", "library"],
                    },
                },
                "required": ["resource"],
            }),
        ),
        Tool::new(
            "read_diagram_guide",
            "Design guidance for building readable diagrams with this tool set.",
            json!({"type": "object", "properties": {}}),
        ),
        Tool::new(
            "export_to_excalidraw_url",
            "Encode the scene into a shareable excalidraw.com URL fragment.",
            json!({"type": "object", "properties": {}}),
        ),
    ]
}

/// Common `id` property schema.
fn id_property() -> Value {
    json!({ "type": "string", "description": "Element identifier" })
}

/// Common `ids` list property schema.
fn ids_property() -> Value {
    json!({
        "type": "array",
        "items": { "type": "string" },
        "description": "Element identifiers",
    })
}

/// Schema shared by single and batch element creation.
fn element_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "type": {
                "type": "string",
                "enum": ["rectangle", "ellipse", "diamond", "text", "line", "arrow", "freedraw", "image", "frame"],
            },
            "x": { "type": "number" },
            "y": { "type": "number" },
            "width": { "type": "number" },
            "height": { "type": "number" },
            "angle": { "type": "number", "description": "Rotation in radians" },
            "text": { "type": "string", "description": "Text content (text elements and labels)" },
            "fontSize": { "type": "number" },
            "strokeColor": { "type": "string" },
            "backgroundColor": { "type": "string" },
            "fillStyle": { "type": "string", "enum": ["hachure", "cross-hatch", "solid"] },
            "strokeWidth": { "type": "number" },
            "strokeStyle": { "type": "string", "enum": ["solid", "dashed", "dotted"] },
            "roughness": { "type": "number" },
            "opacity": { "type": "number" },
            "points": {
                "type": "array",
                "items": { "type": "array", "items": { "type": "number" } },
                "description": "Polyline vertices for line/arrow/freedraw",
            },
            "start": {
                "type": "object",
                "properties": { "id": { "type": "string" } },
                "description": "Bind the start point to another element",
            },
            "end": {
                "type": "object",
                "properties": { "id": { "type": "string" } },
                "description": "Bind the end point to another element",
            },
        },
        "required": ["type"],
        "additionalProperties": true,
    })
}
