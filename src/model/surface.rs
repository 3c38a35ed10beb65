//! Derived surfaces: new value layers produced by analytics.

use serde::{Deserialize, Serialize};

use super::{CellId, LayerRef, Value};

/// A computed value layer, owned by the caller.
///
/// `values` is sorted by cell ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedSurface {
    pub attribute_key: String,
    pub values: Vec<(CellId, Value)>,
    pub truncated: bool,
}

impl DerivedSurface {
    pub fn new(attribute_key: impl Into<String>, mut values: Vec<(CellId, Value)>, truncated: bool) -> Self {
        values.sort_by(|a, b| a.0.cmp(&b.0));
        Self { attribute_key: attribute_key.into(), values, truncated }
    }

    /// Build from numeric values.
    pub fn numeric(
        attribute_key: impl Into<String>,
        values: impl IntoIterator<Item = (CellId, f64)>,
        truncated: bool,
    ) -> Self {
        Self::new(
            attribute_key,
            values.into_iter().map(|(c, v)| (c, Value::Numeric(v))).collect(),
            truncated,
        )
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, cell: &CellId) -> Option<&Value> {
        self.values
            .binary_search_by(|(c, _)| c.cmp(cell))
            .ok()
            .map(|i| &self.values[i].1)
    }

    pub fn get_f64(&self, cell: &CellId) -> Option<f64> {
        self.get(cell).and_then(Value::as_f64)
    }
}

/// What a surface-producing engine call hands back once the layer has been
/// written: where it went and how big it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceDescriptor {
    pub dataset_id: String,
    pub attribute_key: String,
    pub cell_count: usize,
    pub truncated: bool,
}

impl SurfaceDescriptor {
    pub fn for_layer(layer: &LayerRef, cell_count: usize, truncated: bool) -> Self {
        Self {
            dataset_id: layer.dataset_id.clone(),
            attribute_key: layer.attribute_key.clone(),
            cell_count,
            truncated,
        }
    }
}
