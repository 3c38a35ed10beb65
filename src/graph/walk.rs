//! Bounded ring walks over a `GridGraph`.

use std::collections::VecDeque;

use super::{CellIdx, GridGraph};

/// Reusable breadth-first walker.
///
/// Visited marks are generation-stamped, so walking from thousands of
/// sources (kernel density, hotspot neighborhoods) costs no per-walk
/// allocation.
pub struct RingWalker {
    stamp: Vec<u32>,
    generation: u32,
    parent: Vec<CellIdx>,
    queue: VecDeque<(CellIdx, u32)>,
    visited: Vec<(CellIdx, u32)>,
}

impl RingWalker {
    pub fn new(graph: &GridGraph) -> Self {
        Self {
            stamp: vec![0; graph.len()],
            generation: 0,
            parent: vec![0; graph.len()],
            queue: VecDeque::new(),
            visited: Vec::new(),
        }
    }

    /// Cells within `max_rings` hops of `source` with their hop distance, in
    /// discovery order (source first, ring by ring, neighbor order within a
    /// ring).
    pub fn walk(&mut self, graph: &GridGraph, source: CellIdx, max_rings: u32) -> &[(CellIdx, u32)] {
        self.next_generation(graph.len());
        self.queue.clear();
        self.visited.clear();

        self.mark(source, source);
        self.queue.push_back((source, 0));
        while let Some((idx, dist)) = self.queue.pop_front() {
            self.visited.push((idx, dist));
            if dist >= max_rings {
                continue;
            }
            for &n in graph.neighbors(idx) {
                if self.stamp[n as usize] != self.generation {
                    self.mark(n, idx);
                    self.queue.push_back((n, dist + 1));
                }
            }
        }
        &self.visited
    }

    /// BFS-tree predecessor of `idx` in the last walk; `None` for the
    /// source and for cells the walk did not reach.
    pub fn parent(&self, idx: CellIdx) -> Option<CellIdx> {
        let i = idx as usize;
        if self.stamp.get(i) != Some(&self.generation) || self.parent[i] == idx {
            return None;
        }
        Some(self.parent[i])
    }

    fn mark(&mut self, idx: CellIdx, parent: CellIdx) {
        self.stamp[idx as usize] = self.generation;
        self.parent[idx as usize] = parent;
    }

    fn next_generation(&mut self, len: usize) {
        if self.stamp.len() < len {
            self.stamp.resize(len, 0);
            self.parent.resize(len, 0);
        }
        self.generation = self.generation.wrapping_add(1);
        if self.generation == 0 {
            self.stamp.fill(0);
            self.generation = 1;
        }
    }
}
