//! # Grid Traversal Kernel
//!
//! Bounded set-to-set operations over the grid hierarchy:
//!
//! | Operation | Meaning |
//! |-----------|---------|
//! | `buffer` | grow a set by k rings of neighbors |
//! | `aggregate` | replace cells by their ancestors, k levels up |
//! | `expand` | replace cells by their descendants, k levels down |
//! | `union_all` / `intersect_all` / `difference` / `mask` | set algebra, no I/O |
//!
//! Lookups go straight to the `GridGeometry` collaborator with a bounded
//! fan-out. Results merge through `CellSet`, so completion order never
//! shows in the output.

pub mod fanout;

use crate::model::*;
use crate::storage::GridGeometry;
use crate::Result;

// ============================================================================
// Buffer
// ============================================================================

/// Union each cell's neighbors into the set, `iterations` times.
///
/// Only the newest ring is re-expanded each round. When the set already
/// exceeds `max_cells` with iterations left, growth stops and the result is
/// flagged `truncated`.
pub async fn buffer<G>(
    geometry: &G,
    cells: &CellSet,
    iterations: usize,
    max_cells: usize,
    concurrency: usize,
) -> Result<TraversalResult>
where
    G: GridGeometry + ?Sized,
{
    let mut result = cells.clone();
    let mut frontier = cells.to_vec();
    let mut completed = 0;
    let mut truncated = false;

    while completed < iterations {
        if frontier.is_empty() {
            completed = iterations;
            break;
        }
        if result.len() > max_cells {
            truncated = true;
            break;
        }
        let rings = fanout::unordered(&frontier, concurrency, |c| geometry.neighbors(c)).await?;
        let mut next = Vec::new();
        for n in rings.into_iter().flatten() {
            if !result.contains(&n) {
                result.insert(n.clone());
                next.push(n);
            }
        }
        frontier = next;
        completed += 1;
    }

    if truncated {
        tracing::warn!(cells = result.len(), max_cells, completed, iterations, "buffer truncated");
    } else {
        tracing::debug!(input = cells.len(), cells = result.len(), iterations, "buffer done");
    }
    Ok(TraversalResult { cells: result, truncated, iterations_completed: completed })
}

// ============================================================================
// Aggregate / expand
// ============================================================================

/// Replace every cell by its parent, `levels` times. Cells at the grid root
/// have no parent and drop out.
pub async fn aggregate<G>(
    geometry: &G,
    cells: &CellSet,
    levels: usize,
    concurrency: usize,
) -> Result<TraversalResult>
where
    G: GridGeometry + ?Sized,
{
    let mut current = cells.clone();
    let mut completed = 0;
    while completed < levels && !current.is_empty() {
        let batch = current.to_vec();
        let parents = fanout::unordered(&batch, concurrency, |c| geometry.parent(c)).await?;
        let before = batch.len();
        current = parents.into_iter().flatten().collect();
        completed += 1;
        tracing::debug!(level_step = completed, from = before, to = current.len(), "aggregate step");
    }
    Ok(TraversalResult { cells: current, truncated: false, iterations_completed: completed })
}

/// Replace every cell by its children, `iterations` times. A cell without
/// children contributes nothing. Capped by `max_cells` like `buffer`.
pub async fn expand<G>(
    geometry: &G,
    cells: &CellSet,
    iterations: usize,
    max_cells: usize,
    concurrency: usize,
) -> Result<TraversalResult>
where
    G: GridGeometry + ?Sized,
{
    let mut current = cells.clone();
    let mut completed = 0;
    let mut truncated = false;
    while completed < iterations && !current.is_empty() {
        if current.len() > max_cells {
            truncated = true;
            tracing::warn!(cells = current.len(), max_cells, completed, iterations, "expand truncated");
            break;
        }
        let batch = current.to_vec();
        let children = fanout::unordered(&batch, concurrency, |c| geometry.children(c)).await?;
        current = children.into_iter().flatten().collect();
        completed += 1;
    }
    Ok(TraversalResult { cells: current, truncated, iterations_completed: completed })
}

// ============================================================================
// Set algebra
// ============================================================================

pub fn union_all<'a>(sets: impl IntoIterator<Item = &'a CellSet>) -> CellSet {
    let mut out = CellSet::new();
    for s in sets {
        out.extend(s.iter().cloned());
    }
    out
}

/// Cells present in every set; empty for no sets.
pub fn intersect_all<'a>(sets: impl IntoIterator<Item = &'a CellSet>) -> CellSet {
    let mut iter = sets.into_iter();
    let Some(first) = iter.next() else {
        return CellSet::new();
    };
    iter.fold(first.clone(), |acc, s| acc.intersection(s))
}

pub fn difference(a: &CellSet, b: &CellSet) -> CellSet {
    a.difference(b)
}

pub fn mask(cells: &CellSet, mask: &CellSet, mode: MaskMode) -> CellSet {
    cells.mask(mask, mode)
}
