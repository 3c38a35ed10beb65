//! # Spatial Autocorrelation
//!
//! Global Moran's I, Local Moran's I (LISA) and Getis-Ord Gi* over binary
//! adjacency weights.
//!
//! Degenerate inputs (fewer than two cells, identical values, no neighbor
//! pairs) return zero statistics and `NotSignificant`, never NaN.

pub mod getis_ord;
pub mod lisa;
pub mod moran;

use serde::{Deserialize, Serialize};

pub use getis_ord::{getis_ord, HotspotCell, HotspotClass, HotspotResult};
pub use lisa::{lisa, LisaCell, LisaCluster, LisaCounts, LisaResult, LISA_THRESHOLD};
pub use moran::{morans_i, MoranResult, Pattern};

/// Two-sided z-score significance bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Significance {
    /// |z| ≥ 2.58
    P01,
    /// |z| ≥ 1.96
    P05,
    /// |z| ≥ 1.65
    P10,
    NotSignificant,
}

impl Significance {
    pub fn from_z(z: f64) -> Self {
        let a = z.abs();
        if !a.is_finite() {
            Significance::NotSignificant
        } else if a >= 2.58 {
            Significance::P01
        } else if a >= 1.96 {
            Significance::P05
        } else if a >= 1.65 {
            Significance::P10
        } else {
            Significance::NotSignificant
        }
    }

    /// Upper bound on the p-value, `None` when not significant.
    pub fn p_bound(self) -> Option<f64> {
        match self {
            Significance::P01 => Some(0.01),
            Significance::P05 => Some(0.05),
            Significance::P10 => Some(0.10),
            Significance::NotSignificant => None,
        }
    }

    pub fn is_significant(self) -> bool {
        self != Significance::NotSignificant
    }
}
