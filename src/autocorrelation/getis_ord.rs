//! Getis-Ord Gi* hotspot scoring.

use serde::{Deserialize, Serialize};

use crate::graph::{GridGraph, Observations, RingWalker};
use crate::model::{CellId, CellValues};

use super::Significance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HotspotClass {
    Hot99,
    Hot95,
    Hot90,
    Cold99,
    Cold95,
    Cold90,
    NotSignificant,
}

impl HotspotClass {
    fn from_z(z: f64) -> Self {
        match (Significance::from_z(z), z > 0.0) {
            (Significance::P01, true) => HotspotClass::Hot99,
            (Significance::P05, true) => HotspotClass::Hot95,
            (Significance::P10, true) => HotspotClass::Hot90,
            (Significance::P01, false) => HotspotClass::Cold99,
            (Significance::P05, false) => HotspotClass::Cold95,
            (Significance::P10, false) => HotspotClass::Cold90,
            (Significance::NotSignificant, _) => HotspotClass::NotSignificant,
        }
    }

    pub fn is_hot(self) -> bool {
        matches!(self, HotspotClass::Hot99 | HotspotClass::Hot95 | HotspotClass::Hot90)
    }

    pub fn is_cold(self) -> bool {
        matches!(self, HotspotClass::Cold99 | HotspotClass::Cold95 | HotspotClass::Cold90)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotCell {
    pub cell: CellId,
    pub value: f64,
    pub gi_star: f64,
    /// Valued cells within the radius, the cell itself included.
    pub neighborhood_size: usize,
    pub class: HotspotClass,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotResult {
    pub cells: Vec<HotspotCell>,
    pub radius: u32,
    pub hot_count: usize,
    pub cold_count: usize,
    pub truncated: bool,
}

/// Gi* z-score per valued cell over the `radius`-ring neighborhood
/// (binary weights, self included):
///
/// `Gi* = (Σ x_j − x̄·W) / (S · sqrt((n·W − W²) / (n − 1)))`
///
/// where `W` is the neighborhood size and `S` the population standard
/// deviation. A hexagonal neighborhood holds about `1 + 3r(r+1)` cells.
pub fn getis_ord(graph: &GridGraph, values: &CellValues, radius: u32) -> HotspotResult {
    let obs = Observations::new(graph, values);
    let n = obs.len();
    let mean = obs.mean();
    let sd = obs.std_dev();
    let flat = obs.is_degenerate() || sd == 0.0;

    let mut walker = RingWalker::new(graph);
    let mut cells = Vec::with_capacity(n);
    let (mut hot_count, mut cold_count) = (0, 0);

    for i in 0..n {
        let (sum, w) = match obs.node[i] {
            Some(idx) => walker
                .walk(graph, idx, radius)
                .iter()
                .filter_map(|&(nb, _)| obs.at_node(nb))
                .fold((0.0, 0usize), |(s, k), j| (s + obs.x[j], k + 1)),
            None => (obs.x[i], 1),
        };

        let gi_star = if flat { 0.0 } else { gi_star_z(sum, w as f64, n as f64, mean, sd) };
        let class = HotspotClass::from_z(gi_star);
        if class.is_hot() {
            hot_count += 1;
        } else if class.is_cold() {
            cold_count += 1;
        }
        cells.push(HotspotCell {
            cell: obs.cells[i].clone(),
            value: obs.x[i],
            gi_star,
            neighborhood_size: w,
            class,
        });
    }

    tracing::debug!(n, radius, hot_count, cold_count, "getis-ord gi*");
    HotspotResult { cells, radius, hot_count, cold_count, truncated: graph.is_truncated() }
}

fn gi_star_z(sum: f64, w: f64, n: f64, mean: f64, sd: f64) -> f64 {
    let spread = (n * w - w * w) / (n - 1.0);
    if spread <= 0.0 {
        return 0.0;
    }
    let z = (sum - mean * w) / (sd * spread.sqrt());
    if z.is_finite() { z } else { 0.0 }
}
