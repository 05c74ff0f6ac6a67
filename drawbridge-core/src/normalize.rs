//! Element normalization - the single place defaults are materialized.
//!
//! Every inbound element passes through [`normalize`] before it reaches the
//! store, regardless of which facade accepted it. Supplied version
//! bookkeeping survives (editor-synced scenes round-trip), absent fields are
//! filled fresh.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::element::{new_element_id, now_iso, now_ms};
use crate::{Binding, CoreError, CoreResult, Element, ElementType, EndpointRef};

/// Default horizontal position when geometry is missing.
const DEFAULT_X: f64 = 100.0;
/// Default vertical position when geometry is missing.
const DEFAULT_Y: f64 = 100.0;
/// Default width when geometry is missing.
const DEFAULT_WIDTH: f64 = 200.0;
/// Default height when geometry is missing.
const DEFAULT_HEIGHT: f64 = 100.0;

/// An inbound element payload before normalization.
///
/// All fields are optional; `start`/`end` are the raw endpoint references
/// that the binding resolver consumes. Unknown fields collect in `extra`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElementDraft {
    /// Supplied id, kept verbatim when non-empty.
    pub id: Option<String>,
    /// Type tag, validated against the closed set.
    #[serde(rename = "type")]
    pub element_type: Option<String>,
    /// Left edge.
    pub x: Option<f64>,
    /// Top edge.
    pub y: Option<f64>,
    /// Bounding-box width.
    pub width: Option<f64>,
    /// Bounding-box height.
    pub height: Option<f64>,
    /// Rotation in radians.
    pub angle: Option<f64>,
    /// Stroke color.
    pub stroke_color: Option<String>,
    /// Fill color.
    pub background_color: Option<String>,
    /// Fill pattern.
    pub fill_style: Option<String>,
    /// Stroke width.
    pub stroke_width: Option<f64>,
    /// Stroke pattern.
    pub stroke_style: Option<String>,
    /// Sketchiness.
    pub roughness: Option<f64>,
    /// Opacity.
    pub opacity: Option<f64>,
    /// Text content.
    pub text: Option<String>,
    /// Font size.
    pub font_size: Option<f64>,
    /// Font family.
    pub font_family: Option<f64>,
    /// Polyline vertices.
    pub points: Option<Vec<[f64; 2]>>,
    /// Already-resolved start binding (editor round-trips).
    pub start_binding: Option<Binding>,
    /// Already-resolved end binding.
    pub end_binding: Option<Binding>,
    /// Raw start endpoint reference, `{"id": "..."}`.
    pub start: Option<Value>,
    /// Raw end endpoint reference.
    pub end: Option<Value>,
    /// Group membership.
    pub group_ids: Option<Vec<String>>,
    /// Lock flag.
    pub locked: Option<bool>,
    /// Deletion marker.
    pub is_deleted: Option<bool>,
    /// Bound-arrow back references.
    pub bound_elements: Option<Vec<Value>>,
    /// Supplied version counter.
    pub version: Option<u64>,
    /// Supplied version nonce.
    pub version_nonce: Option<u32>,
    /// Supplied mutation timestamp (ms).
    pub updated: Option<u64>,
    /// Supplied creation timestamp (ISO-8601).
    pub created_at: Option<String>,
    /// Supplied mutation timestamp (ISO-8601).
    pub updated_at: Option<String>,
    /// Fields outside the closed schema.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A normalized element together with its extracted raw endpoint
/// references, ready for the binding resolver.
#[derive(Debug, Clone)]
pub struct NormalizedElement {
    /// The stored-form element.
    pub element: Element,
    /// Raw start reference, if the payload carried one.
    pub start: Option<EndpointRef>,
    /// Raw end reference, if the payload carried one.
    pub end: Option<EndpointRef>,
}

/// Normalize an inbound draft into stored form.
///
/// # Errors
///
/// Returns [`CoreError::InvalidArgument`] when the type tag is missing or
/// outside the closed set, or when an endpoint reference id is not a string.
pub fn normalize(draft: ElementDraft) -> CoreResult<NormalizedElement> {
    let tag = draft
        .element_type
        .as_deref()
        .ok_or_else(|| CoreError::InvalidArgument("Missing required field: type".into()))?;
    let element_type = ElementType::parse(tag)
        .ok_or_else(|| CoreError::InvalidArgument(format!("Unknown element type: {tag}")))?;

    let start = parse_endpoint(draft.start.as_ref())?;
    let end = parse_endpoint(draft.end.as_ref())?;

    let width = draft.width.unwrap_or(DEFAULT_WIDTH);
    let height = draft.height.unwrap_or(DEFAULT_HEIGHT);

    let points = if element_type.is_linear() {
        match draft.points {
            Some(p) if p.len() >= 2 => Some(p),
            _ => Some(vec![[0.0, 0.0], [width, 0.0]]),
        }
    } else {
        draft.points
    };

    let (font_size, font_family) = if element_type == ElementType::Text {
        (
            draft.font_size.or(Some(20.0)),
            draft.font_family.or(Some(1.0)),
        )
    } else {
        (draft.font_size, draft.font_family)
    };

    let created_at = draft.created_at.unwrap_or_else(now_iso);
    let updated_at = draft.updated_at.unwrap_or_else(|| created_at.clone());

    let element = Element {
        id: match draft.id {
            Some(id) if !id.is_empty() => id,
            _ => new_element_id(),
        },
        element_type,
        x: draft.x.unwrap_or(DEFAULT_X),
        y: draft.y.unwrap_or(DEFAULT_Y),
        width,
        height,
        angle: draft.angle.unwrap_or(0.0),
        stroke_color: draft.stroke_color.unwrap_or_else(|| "#1e1e2e".into()),
        background_color: draft.background_color.unwrap_or_else(|| "transparent".into()),
        fill_style: draft.fill_style.unwrap_or_else(|| "hachure".into()),
        stroke_width: draft.stroke_width.unwrap_or(2.0),
        stroke_style: draft.stroke_style.unwrap_or_else(|| "solid".into()),
        roughness: draft.roughness.unwrap_or(1.0),
        opacity: draft.opacity.unwrap_or(100.0),
        text: draft.text,
        font_size,
        font_family,
        points,
        start_binding: draft.start_binding,
        end_binding: draft.end_binding,
        group_ids: draft.group_ids.unwrap_or_default(),
        locked: draft.locked.unwrap_or(false),
        is_deleted: draft.is_deleted.unwrap_or(false),
        bound_elements: draft.bound_elements,
        version: draft.version.unwrap_or(1).max(1),
        version_nonce: draft.version_nonce.unwrap_or_else(rand::random),
        updated: draft.updated.unwrap_or_else(now_ms),
        created_at,
        updated_at,
        extra: draft.extra,
    };

    Ok(NormalizedElement {
        element,
        start,
        end,
    })
}

/// Normalize a raw JSON value.
///
/// # Errors
///
/// Returns [`CoreError::InvalidArgument`] when the value is not an object or
/// fails draft deserialization, plus everything [`normalize`] rejects.
pub fn normalize_value(value: Value) -> CoreResult<NormalizedElement> {
    let draft: ElementDraft = serde_json::from_value(value)
        .map_err(|e| CoreError::InvalidArgument(format!("Invalid element: {e}")))?;
    normalize(draft)
}

fn parse_endpoint(raw: Option<&Value>) -> CoreResult<Option<EndpointRef>> {
    let Some(value) = raw else {
        return Ok(None);
    };
    if value.is_null() {
        return Ok(None);
    }
    let id = value
        .get("id")
        .ok_or_else(|| CoreError::InvalidArgument("Endpoint reference missing id".into()))?;
    let Some(id) = id.as_str() else {
        return Err(CoreError::InvalidArgument(
            "Endpoint reference id must be a string".into(),
        ));
    };
    Ok(Some(EndpointRef { id: id.to_string() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft(value: Value) -> ElementDraft {
        serde_json::from_value(value).expect("draft")
    }

    #[test]
    fn fills_defaults() {
        let normalized = normalize(draft(json!({"type": "rectangle"}))).expect("normalize");
        let e = normalized.element;
        assert_eq!(e.id.len(), 20);
        assert!((e.x - 100.0).abs() < f64::EPSILON);
        assert!((e.width - 200.0).abs() < f64::EPSILON);
        assert_eq!(e.stroke_color, "#1e1e2e");
        assert_eq!(e.background_color, "transparent");
        assert_eq!(e.fill_style, "hachure");
        assert_eq!(e.version, 1);
        assert!(!e.is_deleted);
        assert!(e.group_ids.is_empty());
        assert!(e.bound_elements.is_none());
    }

    #[test]
    fn rejects_unknown_type() {
        let err = normalize(draft(json!({"type": "hexagon"}))).unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }

    #[test]
    fn rejects_missing_type() {
        let err = normalize(draft(json!({"x": 1.0}))).unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }

    #[test]
    fn arrow_gets_default_points() {
        let normalized =
            normalize(draft(json!({"type": "arrow", "width": 120.0}))).expect("normalize");
        let points = normalized.element.points.expect("points");
        assert_eq!(points.len(), 2);
        assert!((points[1][0] - 120.0).abs() < f64::EPSILON);
    }

    #[test]
    fn extracts_endpoint_refs() {
        let normalized = normalize(draft(json!({
            "type": "arrow",
            "start": {"id": "A"},
            "end": {"id": "B"}
        })))
        .expect("normalize");
        assert_eq!(normalized.start.unwrap().id, "A");
        assert_eq!(normalized.end.unwrap().id, "B");
    }

    #[test]
    fn rejects_non_string_endpoint_id() {
        let err = normalize(draft(json!({
            "type": "arrow",
            "start": {"id": 7}
        })))
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }

    #[test]
    fn preserves_supplied_versioning() {
        let normalized = normalize(draft(json!({
            "type": "rectangle",
            "id": "stable-id-0123456789",
            "version": 4,
            "versionNonce": 42,
            "createdAt": "2026-01-01T00:00:00.000Z"
        })))
        .expect("normalize");
        let e = normalized.element;
        assert_eq!(e.id, "stable-id-0123456789");
        assert_eq!(e.version, 4);
        assert_eq!(e.version_nonce, 42);
        assert_eq!(e.created_at, "2026-01-01T00:00:00.000Z");
    }

    #[test]
    fn keeps_unknown_fields_in_extra() {
        let normalized = normalize(draft(json!({
            "type": "rectangle",
            "link": "https://example.com"
        })))
        .expect("normalize");
        assert_eq!(
            normalized.element.extra.get("link"),
            Some(&json!("https://example.com"))
        );
    }

    #[test]
    fn text_defaults_font() {
        let normalized =
            normalize(draft(json!({"type": "text", "text": "hi"}))).expect("normalize");
        assert_eq!(normalized.element.font_size, Some(20.0));
        assert_eq!(normalized.element.font_family, Some(1.0));
    }
}
