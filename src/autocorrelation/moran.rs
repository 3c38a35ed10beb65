//! Global Moran's I.

use serde::{Deserialize, Serialize};

use crate::graph::{GridGraph, Observations};
use crate::model::CellValues;

use super::Significance;

/// Distance from `E[I]` beyond which a pattern is labelled non-random.
const PATTERN_MARGIN: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pattern {
    Clustered,
    Dispersed,
    Random,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoranResult {
    pub i: f64,
    pub expected: f64,
    /// `(I − E[I]) / sqrt(1/N)`. This is a simplified variance estimate,
    /// not the full randomization variance.
    pub z_score: f64,
    pub significance: Significance,
    pub pattern: Pattern,
    pub n: usize,
    /// Number of ordered neighbor pairs with values on both ends.
    pub weight_sum: usize,
    pub truncated: bool,
}

/// Global Moran's I with binary weights: `w_ij = 1` iff `j` is an adjacency
/// neighbor of `i` and both carry a value.
pub fn morans_i(graph: &GridGraph, values: &CellValues) -> MoranResult {
    let obs = Observations::new(graph, values);
    let n = obs.len();
    let expected = if n > 1 { -1.0 / (n as f64 - 1.0) } else { 0.0 };

    let degenerate = |weight_sum| MoranResult {
        i: 0.0,
        expected,
        z_score: 0.0,
        significance: Significance::NotSignificant,
        pattern: Pattern::Random,
        n,
        weight_sum,
        truncated: graph.is_truncated(),
    };

    if obs.is_degenerate() {
        return degenerate(0);
    }

    let mean = obs.mean();
    let dev: Vec<f64> = obs.x.iter().map(|v| v - mean).collect();
    let denom: f64 = dev.iter().map(|d| d * d).sum();

    let mut weight_sum = 0usize;
    let mut cross = 0.0;
    for i in 0..n {
        for j in obs.valued_neighbors(graph, i) {
            weight_sum += 1;
            cross += dev[i] * dev[j];
        }
    }
    if weight_sum == 0 || denom == 0.0 {
        return degenerate(weight_sum);
    }

    let i = (n as f64 / weight_sum as f64) * cross / denom;
    let z_score = (i - expected) / (1.0 / n as f64).sqrt();
    let pattern = if i > expected + PATTERN_MARGIN {
        Pattern::Clustered
    } else if i < expected - PATTERN_MARGIN {
        Pattern::Dispersed
    } else {
        Pattern::Random
    };

    tracing::debug!(n, weight_sum, i, z_score, "moran's i");
    MoranResult {
        i,
        expected,
        z_score,
        significance: Significance::from_z(z_score),
        pattern,
        n,
        weight_sum,
        truncated: graph.is_truncated(),
    }
}
