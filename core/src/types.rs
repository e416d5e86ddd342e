//! Shared primitive types used across the encoder, classifier and service.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One encoded row. Length always equals the fitted column count.
pub type FeatureVector = Vec<f64>;

/// Row-major numeric matrix handed to the classifier.
pub type Matrix = Vec<FeatureVector>;

/// Binary class code produced by the target encoder (0 = legitimate, 1 = fraud).
pub type ClassLabel = u8;

/// A raw claim as it arrives from a CSV row or the inference boundary.
/// Keys are dataset column names.
pub type RawRecord = BTreeMap<String, FieldValue>;

/// A single untyped cell of a raw claim record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
    /// Present in the record but empty (blank CSV cell, JSON null).
    Missing,
}

impl FieldValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, FieldValue::Missing)
    }

    /// Numeric view of the value. Text is parsed; `None` means unparseable.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            FieldValue::Text(s) => s.trim().parse().ok(),
            FieldValue::Missing => None,
        }
    }

    /// Categorical view of the value. Numbers are coerced to their
    /// string form so `1` and `"1"` land on the same category.
    pub fn as_category(&self) -> Option<String> {
        match self {
            FieldValue::Integer(v) => Some(v.to_string()),
            FieldValue::Float(v) => Some(v.to_string()),
            FieldValue::Text(s) => Some(s.clone()),
            FieldValue::Missing => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Text(s) => write!(f, "{s}"),
            FieldValue::Missing => write!(f, "<missing>"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}
