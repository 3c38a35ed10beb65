//! Attribute values and the layers that hold them.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::CellId;

/// Numeric values keyed by cell, the working shape of every analytic.
pub type CellValues = hashbrown::HashMap<CellId, f64>;

/// A cell attribute value: numeric for analytics, text for categorical
/// layers (mode aggregation, flow-target encoding).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Numeric(f64),
    Text(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Numeric(v) => Some(*v),
            Value::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Numeric(_) => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Numeric(_) => "NUMERIC",
            Value::Text(_) => "TEXT",
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self { Value::Numeric(v) }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self { Value::Numeric(v as f64) }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self { Value::Text(s.to_string()) }
}

impl From<String> for Value {
    fn from(s: String) -> Self { Value::Text(s) }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Numeric(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// Names one value layer: a dataset's attribute, optionally at a single
/// temporal index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerRef {
    pub dataset_id: String,
    pub attribute_key: String,
    pub temporal_index: Option<i64>,
}

impl LayerRef {
    pub fn new(dataset_id: impl Into<String>, attribute_key: impl Into<String>) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            attribute_key: attribute_key.into(),
            temporal_index: None,
        }
    }

    pub fn at(mut self, temporal_index: i64) -> Self {
        self.temporal_index = Some(temporal_index);
        self
    }
}

impl fmt::Display for LayerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.dataset_id, self.attribute_key)?;
        if let Some(t) = self.temporal_index {
            write!(f, "@{t}")?;
        }
        Ok(())
    }
}

/// One stored value row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeValue {
    pub cell: CellId,
    pub attribute_key: String,
    pub value: Value,
    pub temporal_index: Option<i64>,
}

/// Keep the numeric rows of a layer, dropping text and non-finite values.
pub fn numeric_values<'a>(rows: impl IntoIterator<Item = &'a AttributeValue>) -> CellValues {
    rows.into_iter()
        .filter_map(|row| match row.value {
            Value::Numeric(v) if v.is_finite() => Some((row.cell.clone(), v)),
            _ => None,
        })
        .collect()
}
