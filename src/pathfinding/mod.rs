//! # Pathfinding
//!
//! Shortest paths over a loaded `GridGraph`:
//!
//! - **BFS**: unweighted, cost = hop count. The first time the goal is
//!   reached is the shortest; ties fall to neighbor enumeration order.
//! - **Dijkstra**: edge cost = cost value of the cell being entered,
//!   1.0 where the cost layer has no value. Search states are
//!   `(cell, hops)`; a finalized state is never revisited, and a cell is
//!   only expanded again when reached with fewer hops than before.
//!
//! Both stop expanding at `max_hops`. Running out of graph or hops is a
//! normal `found = false` result.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::graph::{CellIdx, GridGraph};
use crate::model::*;
use crate::{Error, Result};

/// Edge cost used when a cell has no value in the cost layer.
pub const DEFAULT_STEP_COST: f64 = 1.0;

const UNSEEN: CellIdx = CellIdx::MAX;

/// A shortest-path request as the engine receives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathQuery {
    pub start: CellId,
    pub end: CellId,
    pub level: Level,
    pub max_hops: usize,
    /// Cost layer for Dijkstra; `None` runs BFS.
    pub cost: Option<LayerRef>,
}

impl PathQuery {
    pub fn unweighted(start: CellId, end: CellId, level: Level, max_hops: usize) -> Self {
        Self { start, end, level, max_hops, cost: None }
    }

    pub fn weighted(start: CellId, end: CellId, level: Level, max_hops: usize, cost: LayerRef) -> Self {
        Self { start, end, level, max_hops, cost: Some(cost) }
    }
}

// ============================================================================
// BFS
// ============================================================================

pub fn bfs_path(graph: &GridGraph, start: &CellId, end: &CellId, max_hops: usize) -> PathResult {
    if start == end {
        return PathResult::single(start.clone());
    }
    let (Some(s), Some(goal)) = (graph.index_of(start), graph.index_of(end)) else {
        return PathResult::not_found(graph.is_truncated());
    };

    let mut prev = vec![UNSEEN; graph.len()];
    prev[s as usize] = s;
    let mut queue = VecDeque::from([(s, 0usize)]);

    while let Some((idx, hops)) = queue.pop_front() {
        if hops >= max_hops {
            continue;
        }
        for &n in graph.neighbors(idx) {
            if prev[n as usize] != UNSEEN {
                continue;
            }
            prev[n as usize] = idx;
            if n == goal {
                let cells = reconstruct(graph, &prev, s, goal);
                let hops = cells.len() - 1;
                return PathResult { found: true, cells, cost: hops as f64, hops, truncated: graph.is_truncated() };
            }
            queue.push_back((n, hops + 1));
        }
    }
    PathResult::not_found(graph.is_truncated())
}

// ============================================================================
// Dijkstra
// ============================================================================

#[derive(Debug)]
struct Frontier {
    cost: f64,
    seq: u64,
    /// Index into the search trail.
    state: usize,
}

/// One reached `(cell, hops)` state and the state it was reached from.
#[derive(Debug, Clone, Copy)]
struct Step {
    idx: CellIdx,
    hops: usize,
    from: usize,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool { self.cmp(other) == Ordering::Equal }
}
impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}
impl Ord for Frontier {
    // Min-heap on (cost, insertion order).
    fn cmp(&self, other: &Self) -> Ordering {
        other.cost.total_cmp(&self.cost).then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Reject cost layers Dijkstra cannot use.
pub fn validate_costs(costs: &CellValues) -> Result<()> {
    if let Some((cell, v)) = costs.iter().find(|(_, v)| !v.is_finite() || **v < 0.0) {
        return Err(Error::InvalidInput(format!("cost for cell {cell} must be finite and >= 0, got {v}")));
    }
    Ok(())
}

/// Cheapest path where entering a cell costs its value in `costs`, using
/// at most `max_hops` steps.
///
/// A cheap route that spends the whole hop budget does not hide a costlier
/// route with hops to spare: each cell keeps one finalized state per hop
/// count that beats its earlier ones.
pub fn dijkstra_path(
    graph: &GridGraph,
    start: &CellId,
    end: &CellId,
    costs: &CellValues,
    max_hops: usize,
) -> Result<PathResult> {
    validate_costs(costs)?;
    if start == end {
        return Ok(PathResult::single(start.clone()));
    }
    let (Some(s), Some(goal)) = (graph.index_of(start), graph.index_of(end)) else {
        return Ok(PathResult::not_found(graph.is_truncated()));
    };

    let step: Vec<f64> = graph
        .values_by_index(costs)
        .into_iter()
        .map(|v| v.unwrap_or(DEFAULT_STEP_COST))
        .collect();
    // Fewest hops at which each cell has been finalized.
    let mut settled = vec![usize::MAX; graph.len()];
    let mut best: HashMap<(CellIdx, usize), f64> = HashMap::new();
    let mut trail = vec![Step { idx: s, hops: 0, from: 0 }];
    let mut heap = BinaryHeap::from([Frontier { cost: 0.0, seq: 0, state: 0 }]);
    let mut seq = 0u64;

    while let Some(Frontier { cost, state, .. }) = heap.pop() {
        let Step { idx, hops, .. } = trail[state];
        if settled[idx as usize] <= hops {
            continue;
        }
        settled[idx as usize] = hops;
        if idx == goal {
            let cells = retrace(graph, &trail, state);
            return Ok(PathResult { found: true, cells, cost, hops, truncated: graph.is_truncated() });
        }
        if hops >= max_hops {
            continue;
        }
        let next = hops + 1;
        for &nb in graph.neighbors(idx) {
            if settled[nb as usize] <= next {
                continue;
            }
            let candidate = cost + step[nb as usize];
            let slot = best.entry((nb, next)).or_insert(f64::INFINITY);
            if candidate < *slot {
                *slot = candidate;
                trail.push(Step { idx: nb, hops: next, from: state });
                seq += 1;
                heap.push(Frontier { cost: candidate, seq, state: trail.len() - 1 });
            }
        }
    }
    Ok(PathResult::not_found(graph.is_truncated()))
}

fn retrace(graph: &GridGraph, trail: &[Step], mut state: usize) -> Vec<CellId> {
    let mut path = vec![graph.cell(trail[state].idx).clone()];
    while state != 0 {
        state = trail[state].from;
        path.push(graph.cell(trail[state].idx).clone());
    }
    path.reverse();
    path
}

fn reconstruct(graph: &GridGraph, prev: &[CellIdx], start: CellIdx, goal: CellIdx) -> Vec<CellId> {
    let mut path = vec![graph.cell(goal).clone()];
    let mut cur = goal;
    while cur != start {
        cur = prev[cur as usize];
        path.push(graph.cell(cur).clone());
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(s: &str) -> CellId {
        CellId::new(s).unwrap()
    }

    /// Diamond: s - a - t and s - b - t, plus an isolated cell x.
    fn diamond() -> GridGraph {
        let rows: Vec<AdjacencyEdge> = [("s", "a"), ("a", "t"), ("s", "b"), ("b", "t"), ("x", "x")]
            .iter()
            .map(|(u, v)| AdjacencyEdge::new(c(u), c(v), 4))
            .collect();
        GridGraph::from_edges(4, &rows).unwrap()
    }

    #[test]
    fn test_self_path() {
        let g = diamond();
        let r = bfs_path(&g, &c("s"), &c("s"), 0);
        assert_eq!(r, PathResult::single(c("s")));
        let r = dijkstra_path(&g, &c("s"), &c("s"), &CellValues::new(), 0).unwrap();
        assert_eq!((r.cost, r.hops, r.cells.len()), (0.0, 0, 1));
    }

    #[test]
    fn test_bfs_tie_breaks_by_enumeration_order() {
        let g = diamond();
        let r = bfs_path(&g, &c("s"), &c("t"), 5);
        assert!(r.found);
        assert_eq!(r.cells, vec![c("s"), c("a"), c("t")]);
        assert_eq!(r.hops, 2);
        assert_eq!(r.cost, 2.0);
    }

    #[test]
    fn test_hop_limit_and_disconnected() {
        let g = diamond();
        assert!(!bfs_path(&g, &c("s"), &c("t"), 1).found);
        assert!(!bfs_path(&g, &c("s"), &c("x"), 10).found);
        assert!(!bfs_path(&g, &c("s"), &c("nowhere"), 10).found);
    }

    #[test]
    fn test_dijkstra_avoids_expensive_cell() {
        let g = diamond();
        let costs: CellValues = [(c("a"), 10.0), (c("b"), 2.0)].into_iter().collect();
        let r = dijkstra_path(&g, &c("s"), &c("t"), &costs, 5).unwrap();
        assert!(r.found);
        assert_eq!(r.cells, vec![c("s"), c("b"), c("t")]);
        assert_eq!(r.cost, 3.0);
        assert_eq!(r.hops, 2);
    }

    #[test]
    fn test_dijkstra_equal_costs_deterministic() {
        let g = diamond();
        let r1 = dijkstra_path(&g, &c("s"), &c("t"), &CellValues::new(), 5).unwrap();
        let r2 = dijkstra_path(&g, &c("s"), &c("t"), &CellValues::new(), 5).unwrap();
        assert_eq!(r1, r2);
        assert_eq!(r1.cells[1], c("a"));
    }

    #[test]
    fn test_dijkstra_trades_cost_for_hops_under_limit() {
        // s - a - b - m - t is cheap but four hops; s - x - m - t fits in three.
        let rows: Vec<AdjacencyEdge> =
            [("s", "a"), ("a", "b"), ("b", "m"), ("s", "x"), ("x", "m"), ("m", "t")]
                .iter()
                .map(|(u, v)| AdjacencyEdge::new(c(u), c(v), 4))
                .collect();
        let g = GridGraph::from_edges(4, &rows).unwrap();
        let costs: CellValues =
            [(c("a"), 0.1), (c("b"), 0.1), (c("m"), 0.1), (c("t"), 0.1), (c("x"), 5.0)].into_iter().collect();

        assert!(bfs_path(&g, &c("s"), &c("t"), 3).found);
        let r = dijkstra_path(&g, &c("s"), &c("t"), &costs, 3).unwrap();
        assert!(r.found);
        assert_eq!(r.cells, vec![c("s"), c("x"), c("m"), c("t")]);
        assert_eq!(r.hops, 3);
        assert!((r.cost - 5.2).abs() < 1e-9);

        let r = dijkstra_path(&g, &c("s"), &c("t"), &costs, 4).unwrap();
        assert_eq!(r.cells, vec![c("s"), c("a"), c("b"), c("m"), c("t")]);
        assert!((r.cost - 0.4).abs() < 1e-9);
        assert!(!dijkstra_path(&g, &c("s"), &c("t"), &costs, 2).unwrap().found);
    }

    #[test]
    fn test_negative_cost_rejected() {
        let g = diamond();
        let costs: CellValues = [(c("a"), -1.0)].into_iter().collect();
        assert!(matches!(
            dijkstra_path(&g, &c("s"), &c("t"), &costs, 5),
            Err(Error::InvalidInput(_))
        ));
    }
}
