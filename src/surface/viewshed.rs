//! Line-of-sight from an observer cell.
//!
//! Sight lines follow the breadth-first tree rooted at the observer: a cell
//! is visible when its elevation angle is at least the steepest angle seen
//! on the ring path leading to it. Horizontal distance is the great-circle
//! distance between cell centroids.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::graph::{GridGraph, RingWalker};
use crate::model::{CellId, CellValues, DerivedSurface, LatLon};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewshedParams {
    pub observer: CellId,
    /// Meters above the observer cell's elevation.
    pub eye_height: f64,
    pub max_radius: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewshedResult {
    pub observer: CellId,
    /// Sorted by cell ID; the observer is included.
    pub visible: Vec<CellId>,
    /// Sorted by cell ID.
    pub hidden: Vec<CellId>,
    pub truncated: bool,
}

impl ViewshedResult {
    pub fn is_visible(&self, cell: &CellId) -> bool {
        self.visible.binary_search(cell).is_ok()
    }

    /// 1 for visible cells, 0 for hidden ones.
    pub fn surface(&self, attribute_key: &str) -> DerivedSurface {
        let ones = self.visible.iter().map(|c| (c.clone(), 1.0));
        let zeros = self.hidden.iter().map(|c| (c.clone(), 0.0));
        DerivedSurface::numeric(attribute_key, ones.chain(zeros), self.truncated)
    }
}

/// Cells lacking an elevation or a centroid are neither classified nor
/// counted as occluders, but sight lines still pass through them.
pub fn viewshed(
    graph: &GridGraph,
    elevation: &CellValues,
    centroids: &HashMap<CellId, LatLon>,
    params: &ViewshedParams,
) -> Result<ViewshedResult> {
    if !params.eye_height.is_finite() || params.eye_height < 0.0 {
        return Err(Error::InvalidInput(format!(
            "eye_height must be finite and >= 0, got {}",
            params.eye_height
        )));
    }
    let observer = graph
        .index_of(&params.observer)
        .ok_or_else(|| Error::NotFound(format!("observer cell {} is not in the grid", params.observer)))?;
    let ground = elevation
        .get(&params.observer)
        .copied()
        .filter(|v| v.is_finite())
        .ok_or_else(|| Error::InvalidInput(format!("observer cell {} has no elevation", params.observer)))?;
    let origin = *centroids
        .get(&params.observer)
        .ok_or_else(|| Error::InvalidInput(format!("observer cell {} has no centroid", params.observer)))?;
    let eye = ground + params.eye_height;

    let angle_of = |cell: &CellId| -> Option<f64> {
        let z = elevation.get(cell).copied().filter(|v| v.is_finite())?;
        let p = centroids.get(cell)?;
        Some((z - eye).atan2(origin.distance_m(p)))
    };

    // Steepest angle strictly before each cell on its ring path.
    let mut horizon = vec![f64::NEG_INFINITY; graph.len()];
    let mut visible = vec![params.observer.clone()];
    let mut hidden = Vec::new();

    let mut walker = RingWalker::new(graph);
    let order: Vec<u32> = walker.walk(graph, observer, params.max_radius).iter().map(|&(i, _)| i).collect();
    for idx in order.into_iter().skip(1) {
        let Some(prev) = walker.parent(idx) else { continue };
        let mut before = horizon[prev as usize];
        if prev != observer {
            if let Some(a) = angle_of(graph.cell(prev)) {
                before = before.max(a);
            }
        }
        horizon[idx as usize] = before;

        let cell = graph.cell(idx);
        if let Some(angle) = angle_of(cell) {
            if angle >= before {
                visible.push(cell.clone());
            } else {
                hidden.push(cell.clone());
            }
        }
    }

    visible.sort();
    hidden.sort();
    tracing::debug!(
        observer = %params.observer,
        visible = visible.len(),
        hidden = hidden.len(),
        max_radius = params.max_radius,
        "viewshed"
    );
    Ok(ViewshedResult { observer: params.observer.clone(), visible, hidden, truncated: graph.is_truncated() })
}
