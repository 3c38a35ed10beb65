//! # Collaborator Contracts
//!
//! The engine never owns grid geometry or persistence. It talks to three
//! collaborators through these traits, all injected by the caller:
//!
//! | Trait | Role |
//! |-------|------|
//! | `GridGeometry` | cell neighbors/parent/children, region enumeration, centroids |
//! | `ValueStore` | per-cell attribute values by layer |
//! | `TopologyStore` | persisted adjacency rows per level |
//!
//! `MemoryGrid` implements all three and is the reference backend for
//! tests and embedding.
//!
//! Backends report their own failures (unreachable, timed out, rejected) as
//! `Error::UpstreamFailure`. Unknown cells are not failures: lookups return
//! an empty list or `None`.

pub mod memory;

use async_trait::async_trait;

use crate::model::*;
use crate::Result;

pub use memory::MemoryGrid;

// ============================================================================
// Grid geometry
// ============================================================================

/// Hierarchy and geometry of the discrete global grid.
#[async_trait]
pub trait GridGeometry: Send + Sync {
    /// Cells sharing an edge with `cell`, in the provider's enumeration
    /// order. That order is the tie-break for BFS, so it must be stable.
    async fn neighbors(&self, cell: &CellId) -> Result<Vec<CellId>>;

    /// Coarser-level ancestor, `None` at the grid root.
    async fn parent(&self, cell: &CellId) -> Result<Option<CellId>>;

    /// Finer-level descendants one level down.
    async fn children(&self, cell: &CellId) -> Result<Vec<CellId>>;

    /// All cells at `level` whose centroid lies in `bbox`.
    async fn cells_in_region(&self, level: Level, bbox: &BoundingBox) -> Result<Vec<CellId>>;

    /// Cell centroid, `None` for cells the provider does not know.
    async fn centroid(&self, cell: &CellId) -> Result<Option<LatLon>>;
}

// ============================================================================
// Value store
// ============================================================================

/// Per-cell attribute values, addressed by `LayerRef`.
#[async_trait]
pub trait ValueStore: Send + Sync {
    /// Rows of one layer, optionally restricted to `filter`. A layer with no
    /// data yields an empty list.
    async fn get_values(&self, layer: &LayerRef, filter: Option<&CellSet>) -> Result<Vec<AttributeValue>>;

    /// Write several whole layers in one call. Either every layer is stored
    /// or none is. Each written layer replaces the previous contents of that
    /// layer entirely.
    async fn put_layers(&self, layers: Vec<(LayerRef, Vec<(CellId, Value)>)>) -> Result<()>;

    /// Write a single whole layer. Same contract as [`put_layers`](Self::put_layers).
    async fn put_values(&self, layer: &LayerRef, values: Vec<(CellId, Value)>) -> Result<()> {
        self.put_layers(vec![(layer.clone(), values)]).await
    }
}

// ============================================================================
// Topology store
// ============================================================================

/// Persisted adjacency rows, written only by the bulk loader.
#[async_trait]
pub trait TopologyStore: Send + Sync {
    /// Adjacency rows whose `cell` is in `cells`, at `level`. Row order
    /// follows the order of `cells`, then storage order per cell.
    async fn get_adjacency(&self, cells: &[CellId], level: Level) -> Result<Vec<AdjacencyEdge>>;

    /// Upsert a batch keyed by `(cell, neighbor, level)`.
    ///
    /// Contract: the batch is applied atomically, and applying the same
    /// batch twice leaves the store unchanged. Returns the number of rows
    /// that were inserted or changed.
    async fn upsert_adjacency(&self, rows: Vec<AdjacencyEdge>) -> Result<usize>;
}
