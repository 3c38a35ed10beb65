//! Valued cells laid out against a `GridGraph`.

use crate::model::{CellId, CellValues};

use super::{CellIdx, GridGraph};

/// The cells of a value layer, sorted by cell ID, with their position in
/// the graph and a reverse map from graph index to observation.
///
/// Sorting fixes the summation order of every statistic, so results do not
/// depend on hash-map iteration order.
#[derive(Debug, Clone)]
pub struct Observations {
    pub cells: Vec<CellId>,
    pub x: Vec<f64>,
    pub node: Vec<Option<CellIdx>>,
    by_node: Vec<Option<usize>>,
}

impl Observations {
    pub fn new(graph: &GridGraph, values: &CellValues) -> Self {
        let mut pairs: Vec<(&CellId, f64)> = values
            .iter()
            .filter(|(_, v)| v.is_finite())
            .map(|(c, v)| (c, *v))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));

        let mut by_node = vec![None; graph.len()];
        let mut cells = Vec::with_capacity(pairs.len());
        let mut x = Vec::with_capacity(pairs.len());
        let mut node = Vec::with_capacity(pairs.len());
        for (i, (cell, v)) in pairs.into_iter().enumerate() {
            let idx = graph.index_of(cell);
            if let Some(idx) = idx {
                by_node[idx as usize] = Some(i);
            }
            cells.push(cell.clone());
            x.push(v);
            node.push(idx);
        }
        Self { cells, x, node, by_node }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Observation index of a graph cell, if it carries a value.
    pub fn at_node(&self, idx: CellIdx) -> Option<usize> {
        self.by_node.get(idx as usize).copied().flatten()
    }

    /// Observation indices of the valued direct neighbors of observation `i`.
    pub fn valued_neighbors<'a>(&'a self, graph: &'a GridGraph, i: usize) -> impl Iterator<Item = usize> + 'a {
        self.node[i]
            .map(|idx| graph.neighbors(idx))
            .unwrap_or(&[])
            .iter()
            .filter_map(move |&n| self.at_node(n))
    }

    pub fn mean(&self) -> f64 {
        if self.x.is_empty() {
            return 0.0;
        }
        self.x.iter().sum::<f64>() / self.x.len() as f64
    }

    /// Population standard deviation.
    pub fn std_dev(&self) -> f64 {
        if self.x.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let var = self.x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / self.x.len() as f64;
        var.sqrt()
    }

    /// True when fewer than two observations exist or all values are equal.
    pub fn is_degenerate(&self) -> bool {
        self.x.len() < 2 || self.x.iter().all(|v| *v == self.x[0])
    }
}
