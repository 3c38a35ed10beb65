//! Kernel density over hop distance.

use serde::{Deserialize, Serialize};

use crate::graph::{GridGraph, Observations, RingWalker};
use crate::model::{CellValues, DerivedSurface};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kernel {
    #[default]
    Gaussian,
    Linear,
    Uniform,
}

impl Kernel {
    /// Weight at `distance` hops for bandwidth `bandwidth`.
    pub fn weight(self, distance: u32, bandwidth: u32) -> f64 {
        let r = f64::from(distance) / f64::from(bandwidth);
        match self {
            Kernel::Gaussian => (-0.5 * r * r).exp(),
            Kernel::Linear => (1.0 - r).max(0.0),
            Kernel::Uniform => 1.0,
        }
    }
}

/// Smooth `values` by spreading every valued cell to the cells within
/// `bandwidth` hops. A cell's density is the kernel-weighted mean of the
/// sources that reach it; cells no source reaches with positive weight are
/// left out.
///
/// Valued cells outside the graph only reach themselves.
pub fn kernel_density(
    graph: &GridGraph,
    values: &CellValues,
    bandwidth: u32,
    kernel: Kernel,
    attribute_key: &str,
) -> Result<DerivedSurface> {
    if bandwidth == 0 {
        return Err(Error::InvalidInput("kde bandwidth must be at least 1".into()));
    }
    let obs = Observations::new(graph, values);
    let mut weighted = vec![0.0; graph.len()];
    let mut total = vec![0.0; graph.len()];
    let mut out = Vec::new();

    let mut walker = RingWalker::new(graph);
    for i in 0..obs.len() {
        let Some(source) = obs.node[i] else {
            out.push((obs.cells[i].clone(), obs.x[i]));
            continue;
        };
        for &(idx, d) in walker.walk(graph, source, bandwidth) {
            let w = kernel.weight(d, bandwidth);
            weighted[idx as usize] += w * obs.x[i];
            total[idx as usize] += w;
        }
    }

    for (idx, (&sum, &w)) in weighted.iter().zip(&total).enumerate() {
        if w > 0.0 {
            out.push((graph.cell(idx as u32).clone(), sum / w));
        }
    }

    tracing::debug!(sources = obs.len(), cells = out.len(), bandwidth, ?kernel, "kernel density");
    Ok(DerivedSurface::numeric(attribute_key, out, graph.is_truncated()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AdjacencyEdge, CellId};

    fn c(s: &str) -> CellId {
        CellId::new(s).unwrap()
    }

    fn line(n: usize) -> GridGraph {
        let rows: Vec<AdjacencyEdge> = (0..n - 1)
            .map(|k| AdjacencyEdge::new(c(&format!("c{k}")), c(&format!("c{}", k + 1)), 0))
            .collect();
        GridGraph::from_edges(0, &rows).unwrap()
    }

    #[test]
    fn test_kernel_weights() {
        assert_eq!(Kernel::Gaussian.weight(0, 2), 1.0);
        assert!((Kernel::Gaussian.weight(2, 2) - (-0.5f64).exp()).abs() < 1e-12);
        assert_eq!(Kernel::Linear.weight(1, 2), 0.5);
        assert_eq!(Kernel::Linear.weight(2, 2), 0.0);
        assert_eq!(Kernel::Uniform.weight(3, 3), 1.0);
    }

    #[test]
    fn test_single_source_spreads_its_value() {
        let g = line(5);
        let values: CellValues = [(c("c2"), 10.0)].into_iter().collect();
        let s = kernel_density(&g, &values, 2, Kernel::Gaussian, "kde").unwrap();
        assert_eq!(s.len(), 5);
        assert!(s.values.iter().all(|(_, v)| v.as_f64() == Some(10.0)));
    }

    #[test]
    fn test_uniform_kernel_is_ring_mean() {
        let g = line(3);
        let values: CellValues = [(c("c0"), 0.0), (c("c2"), 6.0)].into_iter().collect();
        let s = kernel_density(&g, &values, 1, Kernel::Uniform, "kde").unwrap();
        assert_eq!(s.get_f64(&c("c1")), Some(3.0));
        assert_eq!(s.get_f64(&c("c0")), Some(0.0));
        assert_eq!(s.get_f64(&c("c2")), Some(6.0));
    }

    #[test]
    fn test_linear_edge_weight_is_zero() {
        let g = line(4);
        let values: CellValues = [(c("c0"), 4.0)].into_iter().collect();
        let s = kernel_density(&g, &values, 2, Kernel::Linear, "kde").unwrap();
        assert_eq!(s.get_f64(&c("c1")), Some(4.0));
        assert_eq!(s.get(&c("c2")), None);
    }

    #[test]
    fn test_zero_bandwidth_rejected() {
        let g = line(2);
        let err = kernel_density(&g, &CellValues::new(), 0, Kernel::Uniform, "kde").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
