//! Local Indicators of Spatial Association (Local Moran's I).

use serde::{Deserialize, Serialize};

use crate::graph::{GridGraph, Observations};
use crate::model::{CellId, CellValues};

/// `|local I|` at or below this is not significant.
pub const LISA_THRESHOLD: f64 = 1.96;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LisaCluster {
    HighHigh,
    LowLow,
    HighLow,
    LowHigh,
    NotSignificant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LisaCell {
    pub cell: CellId,
    pub value: f64,
    pub z: f64,
    /// Mean z-score of valued neighbors, 0 without any.
    pub spatial_lag: f64,
    pub local_i: f64,
    pub cluster: LisaCluster,
    pub neighbor_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LisaCounts {
    pub high_high: usize,
    pub low_low: usize,
    pub high_low: usize,
    pub low_high: usize,
    pub not_significant: usize,
}

impl LisaCounts {
    fn add(&mut self, cluster: LisaCluster) {
        match cluster {
            LisaCluster::HighHigh => self.high_high += 1,
            LisaCluster::LowLow => self.low_low += 1,
            LisaCluster::HighLow => self.high_low += 1,
            LisaCluster::LowHigh => self.low_high += 1,
            LisaCluster::NotSignificant => self.not_significant += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.high_high + self.low_low + self.high_low + self.low_high + self.not_significant
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LisaResult {
    /// One entry per valued cell, sorted by cell ID.
    pub cells: Vec<LisaCell>,
    pub counts: LisaCounts,
    pub truncated: bool,
}

/// Local Moran's I per cell: `z_i · mean(z_j)` over valued neighbors `j`,
/// with z-scores from the global mean and population standard deviation.
pub fn lisa(graph: &GridGraph, values: &CellValues) -> LisaResult {
    let obs = Observations::new(graph, values);
    let mean = obs.mean();
    let sd = obs.std_dev();
    let flat = obs.is_degenerate() || sd == 0.0;

    let z: Vec<f64> = obs
        .x
        .iter()
        .map(|v| if flat { 0.0 } else { (v - mean) / sd })
        .collect();

    let mut counts = LisaCounts::default();
    let mut cells = Vec::with_capacity(obs.len());
    for i in 0..obs.len() {
        let (sum, count) = obs
            .valued_neighbors(graph, i)
            .fold((0.0, 0usize), |(s, k), j| (s + z[j], k + 1));
        let spatial_lag = if count == 0 { 0.0 } else { sum / count as f64 };
        let local_i = z[i] * spatial_lag;
        let cluster = classify(z[i], spatial_lag, local_i);
        counts.add(cluster);
        cells.push(LisaCell {
            cell: obs.cells[i].clone(),
            value: obs.x[i],
            z: z[i],
            spatial_lag,
            local_i,
            cluster,
            neighbor_count: count,
        });
    }

    tracing::debug!(
        n = cells.len(),
        high_high = counts.high_high,
        low_low = counts.low_low,
        "lisa"
    );
    LisaResult { cells, counts, truncated: graph.is_truncated() }
}

fn classify(z: f64, lag: f64, local_i: f64) -> LisaCluster {
    if local_i.abs() <= LISA_THRESHOLD {
        return LisaCluster::NotSignificant;
    }
    match (z > 0.0, lag > 0.0) {
        (true, true) => LisaCluster::HighHigh,
        (false, false) => LisaCluster::LowLow,
        (true, false) => LisaCluster::HighLow,
        (false, true) => LisaCluster::LowHigh,
    }
}
