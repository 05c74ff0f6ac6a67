//! Static resources and scene projections for the tool gateway.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use drawbridge_core::SceneStore;
use serde_json::{json, Value};

/// Design guidance returned by the `read_diagram_guide` tool.
pub const DIAGRAM_GUIDE: &str = r"# Diagram design guide

## Layout
- Flow direction: left-to-right or top-to-bottom, never mixed.
- Leave at least 60px between sibling shapes and 100px between ranks so
  arrows have room to route.
- Size shapes to their label: roughly 10px per character plus 40px padding,
  minimum 120x60 for process boxes.

## Shapes
- rectangle: process steps, services, components.
- diamond: decisions. Keep the label short (one question).
- ellipse: start/end states and external actors.
- frame: group a subsystem; name it.

## Connections
- Create arrows with start/end references ({id}) instead of raw
  coordinates - the server anchors them on the shape silhouettes and keeps
  an 8px gap so arrowheads stay visible.
- Label an arrow by giving it a text field.
- Avoid crossing arrows; reorder shapes instead.

## Text
- Standalone text elements for titles; labels belong to their shape.
- Font sizes: 28 for titles, 20 for shape labels, 16 for annotations.

## Color
- Default palette is intentionally muted. Reserve saturated strokeColor
  values (e.g. #e03131) for the one thing the reader must see first.
- backgroundColor 'transparent' unless the fill carries meaning.

## Workflow
- batch_create_elements for a whole diagram in one call, so intra-batch
  arrow references resolve.
- snapshot_scene before a sweeping change; restore_snapshot undoes it.
- describe_scene or get_canvas_screenshot to verify the result.
";

/// The editor theme projection served by `get_resource theme`.
#[must_use]
pub fn theme() -> Value {
    json!({
        "theme": {
            "background": "#ffffff",
            "defaultStrokeColor": "#1e1e2e",
            "defaultBackgroundColor": "transparent",
            "defaultFontFamily": 1,
            "defaultFontSize": 20,
            "palette": [
                "#1e1e2e", "#e03131", "#2f9e44", "#1971c2", "#f08c00",
            ],
        }
    })
}

/// The shape-library projection served by `get_resource library`.
#[must_use]
pub fn library() -> Value {
    json!({
        "libraryItems": [],
        "version": 2,
    })
}

/// The canonical scene document: elements plus app state and files, in the
/// editor's file format.
#[must_use]
pub fn scene_document(store: &SceneStore) -> Value {
    let data = store.scene_data();
    json!({
        "type": "excalidraw",
        "version": 2,
        "source": "drawbridge",
        "elements": data.elements,
        "appState": data.app_state,
        "files": data.files,
    })
}

/// Encode a scene document into a shareable excalidraw.com URL fragment.
#[must_use]
pub fn excalidraw_url(document: &Value) -> String {
    let payload = URL_SAFE_NO_PAD.encode(document.to_string());
    format!("https://excalidraw.com/#json={payload}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_document_carries_editor_format() {
        let store = SceneStore::new();
        let doc = scene_document(&store);
        assert_eq!(doc["type"], "excalidraw");
        assert_eq!(doc["version"], 2);
        assert!(doc["elements"].as_array().is_some());
        assert_eq!(doc["appState"]["viewBackgroundColor"], "#ffffff");
    }

    #[test]
    fn url_is_base64_fragment() {
        let doc = json!({"type": "excalidraw", "elements": []});
        let url = excalidraw_url(&doc);
        assert!(url.starts_with("https://excalidraw.com/#json="));
        let payload = url.rsplit('=').next().unwrap();
        let decoded = URL_SAFE_NO_PAD.decode(payload).expect("valid base64");
        let round: Value = serde_json::from_slice(&decoded).expect("json");
        assert_eq!(round["type"], "excalidraw");
    }

    #[test]
    fn guide_mentions_binding_workflow() {
        assert!(DIAGRAM_GUIDE.contains("batch_create_elements"));
        assert!(DIAGRAM_GUIDE.contains("start/end"));
    }
}
