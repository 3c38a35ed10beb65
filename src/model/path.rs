//! PathResult: outcome of a shortest-path search.

use serde::{Deserialize, Serialize};

use super::CellId;

/// A shortest path from start to end (both inclusive).
///
/// "No path" is a normal outcome: `found` is false and `cells` is empty.
/// `truncated` tells the caller the search graph hit its cell cap, so a
/// missing path may exist beyond what was loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathResult {
    pub found: bool,
    pub cells: Vec<CellId>,
    pub cost: f64,
    pub hops: usize,
    pub truncated: bool,
}

impl PathResult {
    pub fn single(cell: CellId) -> Self {
        Self { found: true, cells: vec![cell], cost: 0.0, hops: 0, truncated: false }
    }

    pub fn not_found(truncated: bool) -> Self {
        Self { found: false, cells: Vec::new(), cost: 0.0, hops: 0, truncated }
    }

    pub fn start(&self) -> Option<&CellId> {
        self.cells.first()
    }

    pub fn end(&self) -> Option<&CellId> {
        self.cells.last()
    }
}
