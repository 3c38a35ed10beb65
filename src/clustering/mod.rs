//! # Graph-Ring DBSCAN
//!
//! Density clustering where "near" means within `eps_rings` hops on the
//! adjacency graph and "similar" means a value difference of at most
//! `value_threshold` population standard deviations.
//!
//! A cell's ε-neighborhood is every other valued cell that is both near and
//! similar. `eps_rings = 1` is direct adjacency; larger values use the full
//! multi-hop ball. Cells are visited in cell-ID order, so cluster ids are
//! reproducible.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::graph::{GridGraph, Observations, RingWalker};
use crate::model::{CellId, CellValues};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DbscanParams {
    pub eps_rings: u32,
    /// Minimum ε-neighborhood size (the cell itself not counted) for a core
    /// cell.
    pub min_pts: usize,
    /// Similarity tolerance in population standard deviations.
    pub value_threshold: f64,
}

impl Default for DbscanParams {
    fn default() -> Self {
        Self { eps_rings: 1, min_pts: 3, value_threshold: 0.5 }
    }
}

impl DbscanParams {
    pub fn validate(&self) -> Result<()> {
        if self.eps_rings == 0 {
            return Err(Error::InvalidInput("eps_rings must be at least 1".into()));
        }
        if self.min_pts == 0 {
            return Err(Error::InvalidInput("min_pts must be at least 1".into()));
        }
        if !self.value_threshold.is_finite() || self.value_threshold < 0.0 {
            return Err(Error::InvalidInput(format!(
                "value_threshold must be finite and >= 0, got {}",
                self.value_threshold
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClusterLabel {
    Cluster(u32),
    Noise,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub cell: CellId,
    pub label: ClusterLabel,
    pub core: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub id: u32,
    /// Member cells sorted by cell ID.
    pub cells: Vec<CellId>,
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

impl ClusterSummary {
    pub fn size(&self) -> usize {
        self.cells.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringResult {
    /// One entry per valued cell, sorted by cell ID.
    pub assignments: Vec<ClusterAssignment>,
    pub clusters: Vec<ClusterSummary>,
    pub noise_count: usize,
    pub truncated: bool,
}

pub fn dbscan(graph: &GridGraph, values: &CellValues, params: &DbscanParams) -> Result<ClusteringResult> {
    params.validate()?;
    let obs = Observations::new(graph, values);
    let n = obs.len();
    let tolerance = params.value_threshold * obs.std_dev();

    let mut walker = RingWalker::new(graph);
    let neighborhoods: Vec<Vec<usize>> = (0..n)
        .map(|i| match obs.node[i] {
            Some(idx) => walker
                .walk(graph, idx, params.eps_rings)
                .iter()
                .filter_map(|&(nb, _)| obs.at_node(nb))
                .filter(|&j| j != i && (obs.x[j] - obs.x[i]).abs() <= tolerance)
                .collect(),
            None => Vec::new(),
        })
        .collect();
    let core: Vec<bool> = neighborhoods.iter().map(|nb| nb.len() >= params.min_pts).collect();

    let mut labels: Vec<Option<ClusterLabel>> = vec![None; n];
    let mut next_id = 0u32;
    let mut queue = VecDeque::new();

    for i in 0..n {
        if labels[i].is_some() {
            continue;
        }
        if !core[i] {
            labels[i] = Some(ClusterLabel::Noise);
            continue;
        }
        let id = next_id;
        next_id += 1;
        labels[i] = Some(ClusterLabel::Cluster(id));
        queue.extend(neighborhoods[i].iter().copied());

        while let Some(q) = queue.pop_front() {
            match labels[q] {
                Some(ClusterLabel::Cluster(_)) => {}
                // Border cell: claimed, never expanded.
                Some(ClusterLabel::Noise) => labels[q] = Some(ClusterLabel::Cluster(id)),
                None => {
                    labels[q] = Some(ClusterLabel::Cluster(id));
                    if core[q] {
                        queue.extend(neighborhoods[q].iter().copied());
                    }
                }
            }
        }
    }

    let mut members: Vec<Vec<usize>> = vec![Vec::new(); next_id as usize];
    let mut assignments = Vec::with_capacity(n);
    let mut noise_count = 0;
    for i in 0..n {
        let label = labels[i].unwrap_or(ClusterLabel::Noise);
        match label {
            ClusterLabel::Cluster(id) => members[id as usize].push(i),
            ClusterLabel::Noise => noise_count += 1,
        }
        assignments.push(ClusterAssignment { cell: obs.cells[i].clone(), label, core: core[i] });
    }

    let clusters: Vec<ClusterSummary> = members
        .into_iter()
        .enumerate()
        .map(|(id, idxs)| {
            let vals: Vec<f64> = idxs.iter().map(|&i| obs.x[i]).collect();
            let min = vals.iter().copied().fold(f64::INFINITY, f64::min);
            let max = vals.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let mean = vals.iter().sum::<f64>() / vals.len() as f64;
            ClusterSummary {
                id: id as u32,
                cells: idxs.iter().map(|&i| obs.cells[i].clone()).collect(),
                min,
                mean,
                max,
            }
        })
        .collect();

    tracing::debug!(
        n,
        clusters = clusters.len(),
        noise = noise_count,
        eps_rings = params.eps_rings,
        "dbscan"
    );
    Ok(ClusteringResult { assignments, clusters, noise_count, truncated: graph.is_truncated() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AdjacencyEdge;

    fn c(s: &str) -> CellId {
        CellId::new(s).unwrap()
    }

    fn path(n: usize) -> GridGraph {
        let rows: Vec<AdjacencyEdge> = (0..n - 1)
            .map(|k| AdjacencyEdge::new(c(&format!("p{k:02}")), c(&format!("p{:02}", k + 1)), 0))
            .collect();
        GridGraph::from_edges(0, &rows).unwrap()
    }

    fn values(vals: &[f64]) -> CellValues {
        vals.iter().enumerate().map(|(k, v)| (c(&format!("p{k:02}")), *v)).collect()
    }

    #[test]
    fn test_two_plateaus_two_clusters() {
        let g = path(10);
        let v = values(&[1.0, 1.0, 1.0, 1.0, 1.0, 9.0, 9.0, 9.0, 9.0, 9.0]);
        let params = DbscanParams { eps_rings: 1, min_pts: 2, value_threshold: 0.1 };
        let res = dbscan(&g, &v, &params).unwrap();
        assert_eq!(res.clusters.len(), 2);
        assert_eq!(res.clusters[0].cells.len(), 5);
        assert_eq!(res.clusters[0].mean, 1.0);
        assert_eq!(res.clusters[1].min, 9.0);
        assert_eq!(res.noise_count, 0);
        // Endpoints of each plateau have one similar neighbor: borders.
        assert!(!res.assignments[0].core);
        assert_eq!(res.assignments[0].label, ClusterLabel::Cluster(0));
    }

    #[test]
    fn test_every_cell_labelled_once() {
        let g = path(12);
        let v = values(&[1.0, 5.0, 1.2, 1.1, 8.0, 8.1, 7.9, 3.0, 3.0, 3.1, 0.0, 20.0]);
        let res = dbscan(&g, &v, &DbscanParams { eps_rings: 2, min_pts: 2, value_threshold: 0.2 }).unwrap();
        assert_eq!(res.assignments.len(), 12);
        let in_clusters: usize = res.clusters.iter().map(ClusterSummary::size).sum();
        assert_eq!(in_clusters + res.noise_count, 12);
        let mut seen = std::collections::HashSet::new();
        for cl in &res.clusters {
            for cell in &cl.cells {
                assert!(seen.insert(cell.clone()), "{cell} in two clusters");
            }
        }
    }

    #[test]
    fn test_multi_hop_rings_bridge_gaps() {
        // Similar cells two hops apart with a dissimilar cell between them.
        let g = path(5);
        let v = values(&[1.0, 50.0, 1.0, 50.0, 1.0]);
        let direct = dbscan(&g, &v, &DbscanParams { eps_rings: 1, min_pts: 1, value_threshold: 0.01 }).unwrap();
        assert!(direct.clusters.is_empty());
        let ring2 = dbscan(&g, &v, &DbscanParams { eps_rings: 2, min_pts: 1, value_threshold: 0.01 }).unwrap();
        assert_eq!(ring2.clusters.len(), 2);
    }

    #[test]
    fn test_invalid_params() {
        let g = path(3);
        let v = values(&[1.0, 2.0, 3.0]);
        for p in [
            DbscanParams { eps_rings: 0, ..Default::default() },
            DbscanParams { min_pts: 0, ..Default::default() },
            DbscanParams { value_threshold: -1.0, ..Default::default() },
        ] {
            assert!(matches!(dbscan(&g, &v, &p), Err(Error::InvalidInput(_))));
        }
    }
}
