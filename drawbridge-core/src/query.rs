//! Conjunctive element search filters.
//!
//! Filters are built from loosely-typed key/value parameters (HTTP query
//! strings, tool arguments) and evaluated against the serialized element
//! record, so fields outside the closed schema participate like any other.

use std::collections::HashMap;

use serde_json::Value;

use crate::{CoreError, CoreResult, Element};

/// A conjunctive filter over elements. Every populated clause must match.
#[derive(Debug, Clone, Default)]
pub struct ElementFilter {
    /// Accepted type tags; empty means unconstrained.
    types: Vec<String>,
    min_width: Option<f64>,
    max_width: Option<f64>,
    min_height: Option<f64>,
    max_height: Option<f64>,
    /// Lowercased substring required in the `text` field.
    text_contains: Option<String>,
    /// Arbitrary field equality, compared against the stringified field.
    equals: Vec<(String, String)>,
}

impl ElementFilter {
    /// Build a filter from raw key/value parameters.
    ///
    /// `type` and `types` (comma list) constrain the tag; `minWidth`,
    /// `maxWidth`, `minHeight`, `maxHeight` are inclusive numeric bounds;
    /// `textContains` is case-insensitive; every other key is an equality
    /// clause on the named field.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] when a numeric bound does not
    /// parse.
    pub fn from_params(params: &HashMap<String, String>) -> CoreResult<Self> {
        let mut filter = Self::default();
        for (key, value) in params {
            match key.as_str() {
                "type" => filter.types.push(value.clone()),
                "types" => filter
                    .types
                    .extend(value.split(',').map(|t| t.trim().to_string())),
                "minWidth" => filter.min_width = Some(parse_bound(key, value)?),
                "maxWidth" => filter.max_width = Some(parse_bound(key, value)?),
                "minHeight" => filter.min_height = Some(parse_bound(key, value)?),
                "maxHeight" => filter.max_height = Some(parse_bound(key, value)?),
                "textContains" => filter.text_contains = Some(value.to_lowercase()),
                _ => filter.equals.push((key.clone(), value.clone())),
            }
        }
        Ok(filter)
    }

    /// Evaluate the filter against one element.
    #[must_use]
    pub fn matches(&self, element: &Element) -> bool {
        match serde_json::to_value(element) {
            Ok(value) => self.matches_value(&value),
            Err(_) => false,
        }
    }

    /// Evaluate the filter against an already-serialized element record.
    #[must_use]
    pub fn matches_value(&self, record: &Value) -> bool {
        if !self.types.is_empty() {
            let tag = record.get("type").and_then(Value::as_str).unwrap_or("");
            if !self.types.iter().any(|t| t == tag) {
                return false;
            }
        }

        // Missing dimensions count as 0.
        let width = record.get("width").and_then(Value::as_f64).unwrap_or(0.0);
        let height = record.get("height").and_then(Value::as_f64).unwrap_or(0.0);
        if self.min_width.is_some_and(|b| width < b)
            || self.max_width.is_some_and(|b| width > b)
            || self.min_height.is_some_and(|b| height < b)
            || self.max_height.is_some_and(|b| height > b)
        {
            return false;
        }

        if let Some(needle) = &self.text_contains {
            let Some(text) = record.get("text").and_then(Value::as_str) else {
                return false;
            };
            if !text.to_lowercase().contains(needle) {
                return false;
            }
        }

        for (key, expected) in &self.equals {
            let Some(field) = record.get(key) else {
                return false;
            };
            if !field_equals(field, expected) {
                return false;
            }
        }

        true
    }
}

fn parse_bound(key: &str, value: &str) -> CoreResult<f64> {
    value
        .parse()
        .map_err(|_| CoreError::InvalidArgument(format!("Invalid numeric bound {key}={value}")))
}

/// Equality between a JSON field and a query string: numeric when both sides
/// are numbers (so `100` matches `100.0`), stringified otherwise.
fn field_equals(field: &Value, expected: &str) -> bool {
    if let (Some(lhs), Ok(rhs)) = (field.as_f64(), expected.parse::<f64>()) {
        return (lhs - rhs).abs() < f64::EPSILON;
    }
    field_string(field) == expected
}

/// Render a JSON field the way a query parameter would spell it.
fn field_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
