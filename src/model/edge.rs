//! Adjacency rows as stored by the topology store.

use serde::{Deserialize, Serialize};

use super::CellId;

/// Resolution level of a grid. Level 0 is the coarsest.
pub type Level = u8;

/// One stored adjacency relation: `cell` touches `neighbor` at `level`.
///
/// Edges are undirected in meaning but stored directionally; a partially
/// populated store may hold `(a, b)` without `(b, a)`. `parent` is the
/// coarser ancestor of `cell` and is single-valued per `(cell, level)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdjacencyEdge {
    pub cell: CellId,
    pub neighbor: CellId,
    pub level: Level,
    pub parent: Option<CellId>,
}

impl AdjacencyEdge {
    pub fn new(cell: CellId, neighbor: CellId, level: Level) -> Self {
        Self { cell, neighbor, level, parent: None }
    }

    pub fn with_parent(mut self, parent: Option<CellId>) -> Self {
        self.parent = parent;
        self
    }

    /// Upsert key. Two rows with the same key describe the same relation.
    pub fn key(&self) -> (&CellId, &CellId, Level) {
        (&self.cell, &self.neighbor, self.level)
    }
}
