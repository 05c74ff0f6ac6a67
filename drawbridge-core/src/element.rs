//! Canvas elements - the building blocks of scenes.
//!
//! An [`Element`] is the stored form of one drawable shape. Inbound payloads
//! arrive as drafts (see [`crate::normalize`]) and only reach the store after
//! normalization, so a stored element always carries a non-empty id, complete
//! styling, and version bookkeeping.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{CoreError, CoreResult};

/// The closed set of element type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    /// Axis-aligned rectangle.
    Rectangle,
    /// Ellipse inscribed in the bounding box.
    Ellipse,
    /// Diamond (rhombus) inscribed in the bounding box.
    Diamond,
    /// Free-standing text.
    Text,
    /// Polyline.
    Line,
    /// Polyline with an arrowhead; may bind to other elements.
    Arrow,
    /// Freehand stroke.
    Freedraw,
    /// Embedded raster/vector image.
    Image,
    /// Named container frame.
    Frame,
}

impl ElementType {
    /// Parse a type tag, rejecting anything outside the closed set.
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "rectangle" => Some(Self::Rectangle),
            "ellipse" => Some(Self::Ellipse),
            "diamond" => Some(Self::Diamond),
            "text" => Some(Self::Text),
            "line" => Some(Self::Line),
            "arrow" => Some(Self::Arrow),
            "freedraw" => Some(Self::Freedraw),
            "image" => Some(Self::Image),
            "frame" => Some(Self::Frame),
            _ => None,
        }
    }

    /// The wire representation of the tag.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rectangle => "rectangle",
            Self::Ellipse => "ellipse",
            Self::Diamond => "diamond",
            Self::Text => "text",
            Self::Line => "line",
            Self::Arrow => "arrow",
            Self::Freedraw => "freedraw",
            Self::Image => "image",
            Self::Frame => "frame",
        }
    }

    /// Whether this element type carries a `points` polyline.
    #[must_use]
    pub fn is_linear(self) -> bool {
        matches!(self, Self::Line | Self::Arrow | Self::Freedraw)
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved endpoint binding on an arrow or line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    /// Id of the bound element.
    pub element_id: String,
    /// Focus offset along the bound edge.
    pub focus: f64,
    /// Gap between the arrow endpoint and the bound edge.
    pub gap: f64,
}

/// A raw endpoint reference on an inbound arrow/line payload.
///
/// This is the input form; the binding resolver rewrites it into a
/// [`Binding`] and it never reaches the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointRef {
    /// Id of the referenced element (may live in the same batch).
    pub id: String,
}

/// One stored drawable element.
///
/// Fields outside the closed schema are preserved verbatim in `extra`, so
/// patch and search operate uniformly over the merged record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    /// Unique identifier, assigned on first acceptance and never rewritten.
    pub id: String,
    /// Immutable type tag.
    #[serde(rename = "type")]
    pub element_type: ElementType,
    /// Left edge of the bounding box.
    pub x: f64,
    /// Top edge of the bounding box.
    pub y: f64,
    /// Bounding-box width.
    pub width: f64,
    /// Bounding-box height.
    pub height: f64,
    /// Rotation in radians.
    #[serde(default)]
    pub angle: f64,
    /// Stroke color as hex.
    pub stroke_color: String,
    /// Fill color as hex, or `"transparent"`.
    pub background_color: String,
    /// Fill pattern (`hachure`, `cross-hatch`, `solid`, ...).
    pub fill_style: String,
    /// Stroke width in pixels.
    pub stroke_width: f64,
    /// Stroke pattern (`solid`, `dashed`, `dotted`).
    pub stroke_style: String,
    /// Sketchiness, 0 (architect) to 2 (cartoonist).
    pub roughness: f64,
    /// Opacity, 0 to 100.
    pub opacity: f64,
    /// Text content for text elements and labels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Font size in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    /// Font family identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<f64>,
    /// Polyline vertices relative to `(x, y)`; at least two entries for
    /// linear elements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<[f64; 2]>>,
    /// Resolved start binding for arrows/lines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_binding: Option<Binding>,
    /// Resolved end binding for arrows/lines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_binding: Option<Binding>,
    /// Ordered group membership, innermost first.
    #[serde(default)]
    pub group_ids: Vec<String>,
    /// Whether the element is locked in the editor.
    #[serde(default)]
    pub locked: bool,
    /// Deletion marker. Tombstones are never stored; carriers are removed.
    #[serde(default)]
    pub is_deleted: bool,
    /// Back-references from bound arrows, or `null`.
    #[serde(default)]
    pub bound_elements: Option<Vec<Value>>,
    /// Monotonically non-decreasing mutation counter, starts at 1.
    pub version: u64,
    /// Random nonce refreshed on every mutation.
    pub version_nonce: u32,
    /// Last mutation time, epoch milliseconds.
    pub updated: u64,
    /// Creation time, ISO-8601.
    pub created_at: String,
    /// Last mutation time, ISO-8601.
    pub updated_at: String,
    /// Fields outside the closed schema, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Patch keys that merging never overwrites.
const PROTECTED_KEYS: &[&str] = &["id", "type", "version", "versionNonce", "updated", "createdAt"];

impl Element {
    /// Center of the bounding box.
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Bump version bookkeeping after a mutation: increment `version`,
    /// refresh `versionNonce`, `updated`, and `updatedAt`.
    pub fn bump_version(&mut self) {
        self.version += 1;
        self.version_nonce = rand::random();
        self.updated = now_ms();
        self.updated_at = now_iso();
    }

    /// Merge a partial update onto this element.
    ///
    /// Fields absent from the patch keep their current value (notably
    /// `angle`, which is never silently zeroed); identity and version
    /// bookkeeping keys in the patch are ignored. Version fields are NOT
    /// bumped here - the store does that once per accepted mutation.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if the merged record no longer
    /// deserializes as a valid element (e.g. a string field set to null).
    pub fn apply_patch(&mut self, patch: &Map<String, Value>) -> CoreResult<()> {
        let mut doc = serde_json::to_value(&*self)?;
        let Some(obj) = doc.as_object_mut() else {
            return Err(CoreError::InvalidArgument("element is not an object".into()));
        };
        for (key, value) in patch {
            if PROTECTED_KEYS.contains(&key.as_str()) {
                continue;
            }
            obj.insert(key.clone(), value.clone());
        }
        *self = serde_json::from_value(doc)
            .map_err(|e| CoreError::InvalidArgument(format!("invalid patch: {e}")))?;
        Ok(())
    }
}

/// Generate a fresh element id: 20 hex chars from a dash-stripped UUIDv4.
#[must_use]
pub fn new_element_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(20);
    id
}

/// Current time in epoch milliseconds.
#[must_use]
pub fn now_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Current time as an ISO-8601 string with millisecond precision.
#[must_use]
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Element {
        crate::normalize(
            serde_json::from_value(json!({"type": "rectangle", "x": 0, "y": 0})).unwrap(),
        )
        .unwrap()
        .element
    }

    #[test]
    fn id_is_twenty_hex_chars() {
        let id = new_element_id();
        assert_eq!(id.len(), 20);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn patch_preserves_absent_fields() {
        let mut element = sample();
        element.angle = 1.25;
        element
            .apply_patch(&json!({"x": 200.0}).as_object().unwrap().clone())
            .expect("patch");
        assert!((element.x - 200.0).abs() < f64::EPSILON);
        assert!((element.angle - 1.25).abs() < f64::EPSILON);
    }

    #[test]
    fn patch_cannot_rewrite_identity() {
        let mut element = sample();
        let id = element.id.clone();
        element
            .apply_patch(
                &json!({"id": "hijacked", "type": "ellipse", "version": 99})
                    .as_object()
                    .unwrap()
                    .clone(),
            )
            .expect("patch");
        assert_eq!(element.id, id);
        assert_eq!(element.element_type, ElementType::Rectangle);
        assert_eq!(element.version, 1);
    }

    #[test]
    fn patch_keeps_unknown_fields() {
        let mut element = sample();
        element
            .apply_patch(&json!({"customTag": "flow"}).as_object().unwrap().clone())
            .expect("patch");
        assert_eq!(element.extra.get("customTag"), Some(&json!("flow")));
    }

    #[test]
    fn bump_version_is_monotonic() {
        let mut element = sample();
        let before = element.version;
        element.bump_version();
        assert_eq!(element.version, before + 1);
    }

    #[test]
    fn wire_format_is_camel_case() {
        let element = sample();
        let value = serde_json::to_value(&element).expect("serialize");
        assert!(value.get("strokeColor").is_some());
        assert!(value.get("isDeleted").is_some());
        assert!(value.get("versionNonce").is_some());
        assert_eq!(value.get("type"), Some(&json!("rectangle")));
    }
}
