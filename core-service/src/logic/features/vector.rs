//! Feature Vector Assembler - Attribute map → schema-ordered row
//!
//! Uses the schema from `layout.rs` for:
//! - Consistent feature ordering
//! - Explicit missing markers (imputation happens later, never here)
//! - Dropping keys the model was not trained on

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::layout::FeatureSchema;

// ============================================================================
// ATTRIBUTE MAP (request input)
// ============================================================================

/// Scalar attribute as supplied by the caller.
///
/// JSON `null` deserializes to [`AttributeValue::Null`] and is assembled as
/// missing, same as an absent key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Flag(bool),
    Number(f64),
    Text(String),
}

impl AttributeValue {
    /// Numeric view; text is parsed, flags map to 0/1
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(v) => Some(*v),
            AttributeValue::Flag(b) => Some(if *b { 1.0 } else { 0.0 }),
            AttributeValue::Text(s) => s.trim().parse().ok(),
            AttributeValue::Null => None,
        }
    }

    /// Category code used for one-hot matching (`1.0` → `"1"`, `true` → `"1"`)
    pub fn as_category(&self) -> Option<String> {
        match self {
            AttributeValue::Number(v) if v.is_finite() && v.fract() == 0.0 => {
                // `+ 0.0` folds -0 into 0
                Some(format!("{:.0}", v + 0.0))
            }
            AttributeValue::Number(v) => Some(v.to_string()),
            // flags share the 0/1 codes of their numeric view
            AttributeValue::Flag(b) => Some(if *b { "1" } else { "0" }.to_string()),
            AttributeValue::Text(s) => Some(s.clone()),
            AttributeValue::Null => None,
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Number(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        AttributeValue::Number(f64::from(v))
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Number(v as f64)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::Text(v.to_string())
    }
}

/// Unordered per-request mapping from feature identifier to scalar
pub type AttributeMap = HashMap<String, AttributeValue>;

// ============================================================================
// ASSEMBLED ROW
// ============================================================================

/// One schema slot: the supplied value or an explicit missing marker
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Present(AttributeValue),
    Missing,
}

impl Slot {
    pub fn is_missing(&self) -> bool {
        matches!(self, Slot::Missing)
    }

    pub fn value(&self) -> Option<&AttributeValue> {
        match self {
            Slot::Present(v) => Some(v),
            Slot::Missing => None,
        }
    }
}

/// Row of exactly `schema.len()` slots in schema order
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledRow {
    slots: Vec<Slot>,
}

impl AssembledRow {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn get(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    pub fn missing_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_missing()).count()
    }

    /// Convert to JSON-serializable format for logging
    pub fn to_log_entry(&self, schema: &FeatureSchema) -> serde_json::Value {
        let named: serde_json::Map<String, serde_json::Value> = schema
            .iter()
            .zip(self.slots.iter())
            .map(|(name, slot)| {
                let value = match slot {
                    Slot::Present(v) => serde_json::to_value(v).unwrap_or(serde_json::Value::Null),
                    Slot::Missing => serde_json::Value::String("<missing>".to_string()),
                };
                (name.to_string(), value)
            })
            .collect();
        serde_json::Value::Object(named)
    }
}

/// Map an attribute dictionary onto the schema.
///
/// Never fails: absent keys (and explicit nulls) become [`Slot::Missing`],
/// keys outside the schema are dropped.
pub fn assemble(schema: &FeatureSchema, attributes: &AttributeMap) -> AssembledRow {
    let slots = schema
        .iter()
        .map(|name| match attributes.get(name) {
            Some(AttributeValue::Null) | None => Slot::Missing,
            Some(value) => Slot::Present(value.clone()),
        })
        .collect();

    AssembledRow { slots }
}

/// Keys of the map that the schema does not know (reported, never used)
pub fn unknown_keys<'a>(schema: &FeatureSchema, attributes: &'a AttributeMap) -> Vec<&'a str> {
    let mut unknown: Vec<&str> = attributes
        .keys()
        .filter(|k| schema.feature_index(k).is_none())
        .map(String::as_str)
        .collect();
    unknown.sort_unstable();
    unknown
}
