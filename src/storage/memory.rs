//! In-memory grid backend.
//!
//! This is the reference implementation of `GridGeometry`, `ValueStore` and
//! `TopologyStore`. It keeps everything in HashMaps behind `RwLock`s and is
//! cheap to clone (clones share state), so one instance can be handed to an
//! `Engine` as all three collaborators.
//!
//! ## Limitations
//!
//! - **Geometry is whatever you build**: cells, neighbor lists, parents and
//!   centroids are inserted by hand. Nothing is derived from cell IDs.
//! - **Adjacency rows are separate from geometry**: `get_adjacency` only
//!   returns rows written through `upsert_adjacency` (normally by the bulk
//!   loader), exactly like a real topology table.
//! - **Failure injection** (`set_offline`, `fail_upserts_after`) exists so
//!   upstream-error paths can be tested.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::model::*;
use crate::{Error, Result};
use super::{GridGeometry, TopologyStore, ValueStore};

// ============================================================================
// MemoryGrid
// ============================================================================

/// In-memory grid, values and topology.
#[derive(Clone, Default)]
pub struct MemoryGrid {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    cells: RwLock<HashMap<CellId, CellRecord>>,
    values: RwLock<HashMap<LayerRef, HashMap<CellId, Value>>>,
    /// (cell, level) → rows in upsert order
    adjacency: RwLock<HashMap<(CellId, Level), Vec<AdjacencyEdge>>>,
    offline: AtomicBool,
    /// Remaining upsert batches before injected failure; `None` = unlimited.
    upsert_budget: Mutex<Option<usize>>,
    /// Layers whose writes are refused.
    rejected_layers: Mutex<Vec<LayerRef>>,
}

#[derive(Debug, Clone, Default)]
struct CellRecord {
    level: Level,
    centroid: Option<LatLon>,
    neighbors: Vec<CellId>,
    parent: Option<CellId>,
    children: Vec<CellId>,
}

impl MemoryGrid {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Building the grid
    // ========================================================================

    /// Register a cell. Re-adding an existing cell updates level/centroid
    /// and keeps its links.
    pub fn add_cell(&self, cell: CellId, level: Level, centroid: Option<LatLon>) {
        let mut cells = self.inner.cells.write();
        let rec = cells.entry(cell).or_default();
        rec.level = level;
        rec.centroid = centroid;
    }

    /// Link two registered cells as neighbors (both directions).
    pub fn connect(&self, a: &CellId, b: &CellId) -> Result<()> {
        self.link(a, b)?;
        self.link(b, a)
    }

    /// Link `a → b` only, for simulating partially populated topology.
    pub fn link(&self, a: &CellId, b: &CellId) -> Result<()> {
        let mut cells = self.inner.cells.write();
        if !cells.contains_key(b) {
            return Err(Error::NotFound(format!("cell {b}")));
        }
        let rec = cells.get_mut(a).ok_or_else(|| Error::NotFound(format!("cell {a}")))?;
        if a != b && !rec.neighbors.contains(b) {
            rec.neighbors.push(b.clone());
        }
        Ok(())
    }

    /// Set `parent` as the ancestor of `child`, registering the parent one
    /// level up if it is unknown.
    pub fn set_parent(&self, child: &CellId, parent: &CellId) -> Result<()> {
        let mut cells = self.inner.cells.write();
        let child_level = cells
            .get(child)
            .map(|r| r.level)
            .ok_or_else(|| Error::NotFound(format!("cell {child}")))?;

        let previous = cells.get_mut(child).and_then(|r| r.parent.replace(parent.clone()));
        if let Some(old) = previous.filter(|old| old != parent) {
            if let Some(old_rec) = cells.get_mut(&old) {
                old_rec.children.retain(|c| c != child);
            }
        }

        let parent_rec = cells.entry(parent.clone()).or_insert_with(|| CellRecord {
            level: child_level.saturating_sub(1),
            ..CellRecord::default()
        });
        if !parent_rec.children.contains(child) {
            parent_rec.children.push(child.clone());
        }
        Ok(())
    }

    /// Seed a value layer directly (ingestion is out of scope).
    pub fn insert_values(&self, layer: &LayerRef, rows: impl IntoIterator<Item = (CellId, Value)>) {
        let mut values = self.inner.values.write();
        values.entry(layer.clone()).or_default().extend(rows);
    }

    pub fn cell_count(&self) -> usize {
        self.inner.cells.read().len()
    }

    pub fn adjacency_row_count(&self) -> usize {
        self.inner.adjacency.read().values().map(Vec::len).sum()
    }

    pub fn layer_len(&self, layer: &LayerRef) -> usize {
        self.inner.values.read().get(layer).map_or(0, HashMap::len)
    }

    // ========================================================================
    // Failure injection
    // ========================================================================

    /// While offline every collaborator call fails with `UpstreamFailure`.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Let `batches` more upserts succeed, then fail the rest.
    pub fn fail_upserts_after(&self, batches: usize) {
        *self.inner.upsert_budget.lock() = Some(batches);
    }

    /// Refuse any value write that includes `layer`.
    pub fn reject_writes_to(&self, layer: &LayerRef) {
        self.inner.rejected_layers.lock().push(layer.clone());
    }

    pub fn clear_failures(&self) {
        self.set_offline(false);
        *self.inner.upsert_budget.lock() = None;
        self.inner.rejected_layers.lock().clear();
    }

    fn check_online(&self) -> Result<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(Error::UpstreamFailure("memory grid is offline".into()));
        }
        Ok(())
    }
}

// ============================================================================
// GridGeometry impl
// ============================================================================

#[async_trait]
impl GridGeometry for MemoryGrid {
    async fn neighbors(&self, cell: &CellId) -> Result<Vec<CellId>> {
        self.check_online()?;
        Ok(self.inner.cells.read().get(cell).map(|r| r.neighbors.clone()).unwrap_or_default())
    }

    async fn parent(&self, cell: &CellId) -> Result<Option<CellId>> {
        self.check_online()?;
        Ok(self.inner.cells.read().get(cell).and_then(|r| r.parent.clone()))
    }

    async fn children(&self, cell: &CellId) -> Result<Vec<CellId>> {
        self.check_online()?;
        Ok(self.inner.cells.read().get(cell).map(|r| r.children.clone()).unwrap_or_default())
    }

    async fn cells_in_region(&self, level: Level, bbox: &BoundingBox) -> Result<Vec<CellId>> {
        self.check_online()?;
        let cells = self.inner.cells.read();
        let mut found: Vec<CellId> = cells
            .iter()
            .filter(|(_, r)| r.level == level && r.centroid.is_some_and(|c| bbox.contains(&c)))
            .map(|(id, _)| id.clone())
            .collect();
        found.sort();
        Ok(found)
    }

    async fn centroid(&self, cell: &CellId) -> Result<Option<LatLon>> {
        self.check_online()?;
        Ok(self.inner.cells.read().get(cell).and_then(|r| r.centroid))
    }
}

// ============================================================================
// ValueStore impl
// ============================================================================

#[async_trait]
impl ValueStore for MemoryGrid {
    async fn get_values(&self, layer: &LayerRef, filter: Option<&CellSet>) -> Result<Vec<AttributeValue>> {
        self.check_online()?;
        let values = self.inner.values.read();
        let Some(rows) = values.get(layer) else {
            return Ok(Vec::new());
        };
        let mut out: Vec<AttributeValue> = rows
            .iter()
            .filter(|(cell, _)| filter.is_none_or(|f| f.contains(cell)))
            .map(|(cell, value)| AttributeValue {
                cell: cell.clone(),
                attribute_key: layer.attribute_key.clone(),
                value: value.clone(),
                temporal_index: layer.temporal_index,
            })
            .collect();
        out.sort_by(|a, b| a.cell.cmp(&b.cell));
        Ok(out)
    }

    async fn put_layers(&self, layers: Vec<(LayerRef, Vec<(CellId, Value)>)>) -> Result<()> {
        self.check_online()?;
        {
            let rejected = self.inner.rejected_layers.lock();
            if let Some((layer, _)) = layers.iter().find(|(layer, _)| rejected.contains(layer)) {
                return Err(Error::UpstreamFailure(format!("injected write failure for layer {layer}")));
            }
        }
        // Single write-lock scope: every layer lands or none does.
        let mut store = self.inner.values.write();
        for (layer, rows) in layers {
            store.insert(layer, rows.into_iter().collect());
        }
        Ok(())
    }
}

// ============================================================================
// TopologyStore impl
// ============================================================================

#[async_trait]
impl TopologyStore for MemoryGrid {
    async fn get_adjacency(&self, cells: &[CellId], level: Level) -> Result<Vec<AdjacencyEdge>> {
        self.check_online()?;
        let adj = self.inner.adjacency.read();
        let mut out = Vec::new();
        for cell in cells {
            if let Some(rows) = adj.get(&(cell.clone(), level)) {
                out.extend(rows.iter().cloned());
            }
        }
        Ok(out)
    }

    async fn upsert_adjacency(&self, rows: Vec<AdjacencyEdge>) -> Result<usize> {
        self.check_online()?;
        {
            let mut budget = self.inner.upsert_budget.lock();
            if let Some(remaining) = budget.as_mut() {
                if *remaining == 0 {
                    return Err(Error::UpstreamFailure("injected upsert failure".into()));
                }
                *remaining -= 1;
            }
        }

        let mut adj = self.inner.adjacency.write();
        let mut changed = 0;
        for row in rows {
            let slot = adj.entry((row.cell.clone(), row.level)).or_default();
            match slot.iter_mut().find(|r| r.neighbor == row.neighbor) {
                Some(existing) if *existing == row => {}
                Some(existing) => {
                    *existing = row;
                    changed += 1;
                }
                None => {
                    slot.push(row);
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn c(s: &str) -> CellId {
        CellId::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_connect_is_symmetric() {
        let grid = MemoryGrid::new();
        grid.add_cell(c("a"), 1, None);
        grid.add_cell(c("b"), 1, None);
        grid.connect(&c("a"), &c("b")).unwrap();

        assert_eq!(grid.neighbors(&c("a")).await.unwrap(), vec![c("b")]);
        assert_eq!(grid.neighbors(&c("b")).await.unwrap(), vec![c("a")]);
        assert!(grid.neighbors(&c("zz")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_connect_unknown_cell_fails() {
        let grid = MemoryGrid::new();
        grid.add_cell(c("a"), 1, None);
        assert!(matches!(grid.connect(&c("a"), &c("b")), Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_parent_and_children() {
        let grid = MemoryGrid::new();
        grid.add_cell(c("x1"), 2, None);
        grid.add_cell(c("x2"), 2, None);
        grid.set_parent(&c("x1"), &c("p")).unwrap();
        grid.set_parent(&c("x2"), &c("p")).unwrap();

        assert_eq!(grid.parent(&c("x1")).await.unwrap(), Some(c("p")));
        assert_eq!(grid.children(&c("p")).await.unwrap(), vec![c("x1"), c("x2")]);
        assert_eq!(grid.parent(&c("p")).await.unwrap(), None);
        assert_eq!(grid.cell_count(), 3);
    }

    #[tokio::test]
    async fn test_cells_in_region_filters_level_and_box() {
        let grid = MemoryGrid::new();
        grid.add_cell(c("in"), 3, Some(LatLon::new(1.0, 1.0).unwrap()));
        grid.add_cell(c("out"), 3, Some(LatLon::new(50.0, 1.0).unwrap()));
        grid.add_cell(c("other_level"), 4, Some(LatLon::new(1.0, 1.0).unwrap()));
        grid.add_cell(c("no_centroid"), 3, None);

        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0).unwrap();
        assert_eq!(grid.cells_in_region(3, &bbox).await.unwrap(), vec![c("in")]);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let grid = MemoryGrid::new();
        let rows = vec![
            AdjacencyEdge::new(c("a"), c("b"), 1).with_parent(Some(c("p"))),
            AdjacencyEdge::new(c("b"), c("a"), 1).with_parent(Some(c("p"))),
        ];
        assert_eq!(grid.upsert_adjacency(rows.clone()).await.unwrap(), 2);
        assert_eq!(grid.upsert_adjacency(rows).await.unwrap(), 0);
        assert_eq!(grid.adjacency_row_count(), 2);

        let fetched = grid.get_adjacency(&[c("a")], 1).await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert!(grid.get_adjacency(&[c("a")], 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_values_roundtrip_with_filter() {
        let grid = MemoryGrid::new();
        let layer = LayerRef::new("ds", "temp");
        grid.insert_values(&layer, vec![(c("a"), Value::from(1.0)), (c("b"), Value::from(2.0))]);

        let all = grid.get_values(&layer, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].cell, c("a"));

        let filter: CellSet = [c("b")].into_iter().collect();
        let some = grid.get_values(&layer, Some(&filter)).await.unwrap();
        assert_eq!(some.len(), 1);
        assert_eq!(some[0].value, Value::Numeric(2.0));

        assert!(grid.get_values(&LayerRef::new("ds", "missing"), None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_values_replaces_layer() {
        let grid = MemoryGrid::new();
        let layer = LayerRef::new("ds", "out");
        grid.put_values(&layer, vec![(c("a"), Value::from(1.0)), (c("b"), Value::from(2.0))])
            .await
            .unwrap();
        grid.put_values(&layer, vec![(c("b"), Value::from(5.0))]).await.unwrap();

        let rows = grid.get_values(&layer, None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cell, c("b"));
        assert_eq!(rows[0].value, Value::Numeric(5.0));
    }

    #[tokio::test]
    async fn test_put_layers_is_all_or_nothing() {
        let grid = MemoryGrid::new();
        let first = LayerRef::new("ds", "first");
        let second = LayerRef::new("ds", "second");
        grid.reject_writes_to(&second);

        let err = grid
            .put_layers(vec![
                (first.clone(), vec![(c("a"), Value::from(1.0))]),
                (second.clone(), vec![(c("a"), Value::from("x"))]),
            ])
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(grid.layer_len(&first), 0);
        assert_eq!(grid.layer_len(&second), 0);

        grid.clear_failures();
        grid.put_layers(vec![
            (first.clone(), vec![(c("a"), Value::from(1.0))]),
            (second.clone(), vec![(c("a"), Value::from("x"))]),
        ])
        .await
        .unwrap();
        assert_eq!((grid.layer_len(&first), grid.layer_len(&second)), (1, 1));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let grid = MemoryGrid::new();
        grid.set_offline(true);
        let err = grid.neighbors(&c("a")).await.unwrap_err();
        assert!(err.is_retryable());
        grid.clear_failures();

        grid.fail_upserts_after(1);
        assert!(grid.upsert_adjacency(vec![]).await.is_ok());
        assert!(matches!(
            grid.upsert_adjacency(vec![]).await,
            Err(Error::UpstreamFailure(_))
        ));
    }
}
