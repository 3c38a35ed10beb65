//! Steepest-descent flow direction and accumulation.

use serde::{Deserialize, Serialize};

use crate::graph::{GridGraph, Observations};
use crate::model::{CellId, CellValues, DerivedSurface, Value};

/// What a cell's accumulation counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccumulationMode {
    /// Cells draining straight into this one.
    #[default]
    Direct,
    /// Every cell whose flow path passes through this one.
    Transitive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowCell {
    pub cell: CellId,
    pub elevation: f64,
    /// Downhill target, `None` for a sink.
    pub target: Option<CellId>,
    pub accumulation: u64,
}

impl FlowCell {
    pub fn is_sink(&self) -> bool {
        self.target.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowResult {
    /// One entry per cell with an elevation, sorted by cell ID.
    pub cells: Vec<FlowCell>,
    pub mode: AccumulationMode,
    pub truncated: bool,
}

impl FlowResult {
    pub fn sinks(&self) -> impl Iterator<Item = &CellId> {
        self.cells.iter().filter(|f| f.is_sink()).map(|f| &f.cell)
    }

    pub fn get(&self, cell: &CellId) -> Option<&FlowCell> {
        self.cells
            .binary_search_by(|f| f.cell.cmp(cell))
            .ok()
            .map(|i| &self.cells[i])
    }

    pub fn accumulation_surface(&self, attribute_key: &str) -> DerivedSurface {
        DerivedSurface::numeric(
            attribute_key,
            self.cells.iter().map(|f| (f.cell.clone(), f.accumulation as f64)),
            self.truncated,
        )
    }

    /// Target cell IDs as text. Sinks are left out.
    pub fn direction_surface(&self, attribute_key: &str) -> DerivedSurface {
        DerivedSurface::new(
            attribute_key,
            self.cells
                .iter()
                .filter_map(|f| Some((f.cell.clone(), Value::Text(f.target.as_ref()?.to_string()))))
                .collect(),
            self.truncated,
        )
    }
}

/// Route every cell with an elevation to its strictly lower neighbor with
/// the largest drop, first seen winning ties. Neighbors without an elevation
/// are ignored. A cell with no lower neighbor is a sink.
pub fn flow(graph: &GridGraph, elevation: &CellValues, mode: AccumulationMode) -> FlowResult {
    let obs = Observations::new(graph, elevation);
    let n = obs.len();

    let target: Vec<Option<usize>> = (0..n)
        .map(|i| {
            let mut best: Option<usize> = None;
            let mut best_elev = obs.x[i];
            for j in obs.valued_neighbors(graph, i) {
                if obs.x[j] < best_elev {
                    best_elev = obs.x[j];
                    best = Some(j);
                }
            }
            best
        })
        .collect();

    let accumulation = match mode {
        AccumulationMode::Direct => {
            let mut acc = vec![0u64; n];
            for t in target.iter().flatten() {
                acc[*t] += 1;
            }
            acc
        }
        AccumulationMode::Transitive => transitive_accumulation(&target),
    };

    let cells: Vec<FlowCell> = (0..n)
        .map(|i| FlowCell {
            cell: obs.cells[i].clone(),
            elevation: obs.x[i],
            target: target[i].map(|t| obs.cells[t].clone()),
            accumulation: accumulation[i],
        })
        .collect();

    tracing::debug!(
        cells = n,
        sinks = target.iter().filter(|t| t.is_none()).count(),
        ?mode,
        "flow routed"
    );
    FlowResult { cells, mode, truncated: graph.is_truncated() }
}

/// Upstream cell counts, pushed downstream in dependency order. Targets are
/// strictly lower, so the drainage graph is acyclic.
fn transitive_accumulation(target: &[Option<usize>]) -> Vec<u64> {
    let n = target.len();
    let mut remaining = vec![0usize; n];
    for t in target.iter().flatten() {
        remaining[*t] += 1;
    }

    let mut acc = vec![0u64; n];
    let mut ready: Vec<usize> = (0..n).filter(|&i| remaining[i] == 0).collect();
    while let Some(i) = ready.pop() {
        if let Some(t) = target[i] {
            acc[t] += acc[i] + 1;
            remaining[t] -= 1;
            if remaining[t] == 0 {
                ready.push(t);
            }
        }
    }
    acc
}
