//! Proximity zones: each cell belongs to the seed it is fewest hops from.

use std::collections::VecDeque;

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::graph::{CellIdx, GridGraph};
use crate::model::{CellId, CellSet, DerivedSurface, Value};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneAssignment {
    pub cell: CellId,
    /// Position of the winning seed in the seed list.
    pub zone: u32,
    pub seed: CellId,
    pub distance: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoronoiResult {
    pub seeds: Vec<CellId>,
    /// Sorted by cell ID.
    pub assignments: Vec<ZoneAssignment>,
    /// Domain cells no seed reached within the radius.
    pub unassigned: Vec<CellId>,
    pub truncated: bool,
}

impl VoronoiResult {
    pub fn zone_of(&self, cell: &CellId) -> Option<&ZoneAssignment> {
        self.assignments
            .binary_search_by(|a| a.cell.cmp(cell))
            .ok()
            .map(|i| &self.assignments[i])
    }

    /// Cells of one zone, sorted.
    pub fn zone_cells(&self, zone: u32) -> Vec<CellId> {
        self.assignments.iter().filter(|a| a.zone == zone).map(|a| a.cell.clone()).collect()
    }

    pub fn zone_surface(&self, attribute_key: &str) -> DerivedSurface {
        DerivedSurface::numeric(
            attribute_key,
            self.assignments.iter().map(|a| (a.cell.clone(), f64::from(a.zone))),
            self.truncated,
        )
    }

    pub fn seed_surface(&self, attribute_key: &str) -> DerivedSurface {
        DerivedSurface::new(
            attribute_key,
            self.assignments
                .iter()
                .map(|a| (a.cell.clone(), Value::Text(a.seed.to_string())))
                .collect(),
            self.truncated,
        )
    }
}

/// Multi-source breadth-first partition. All seeds start in one FIFO queue
/// in list order, so a cell equidistant from several seeds goes to the one
/// listed first.
///
/// Without a `domain`, every graph cell is a candidate. With one, only
/// domain cells are reported (assigned or unassigned), while the search
/// still crosses cells outside it.
pub fn voronoi(
    graph: &GridGraph,
    seeds: &[CellId],
    max_radius: u32,
    domain: Option<&CellSet>,
) -> Result<VoronoiResult> {
    if seeds.is_empty() {
        return Err(Error::InvalidInput("voronoi needs at least one seed".into()));
    }
    let mut unique = HashSet::new();
    if let Some(dup) = seeds.iter().find(|s| !unique.insert(*s)) {
        return Err(Error::InvalidInput(format!("duplicate voronoi seed {dup}")));
    }

    let mut owner: Vec<Option<(u32, u32)>> = vec![None; graph.len()];
    let mut queue: VecDeque<CellIdx> = VecDeque::new();
    let mut orphans = Vec::new();
    for (zone, seed) in seeds.iter().enumerate() {
        match graph.index_of(seed) {
            Some(idx) => {
                owner[idx as usize] = Some((zone as u32, 0));
                queue.push_back(idx);
            }
            None => orphans.push((seed.clone(), zone as u32)),
        }
    }

    while let Some(idx) = queue.pop_front() {
        let Some((zone, dist)) = owner[idx as usize] else { continue };
        if dist >= max_radius {
            continue;
        }
        for &n in graph.neighbors(idx) {
            if owner[n as usize].is_none() {
                owner[n as usize] = Some((zone, dist + 1));
                queue.push_back(n);
            }
        }
    }

    let in_domain = |cell: &CellId| domain.is_none_or(|d| d.contains(cell));
    let mut assignments: Vec<ZoneAssignment> = owner
        .iter()
        .enumerate()
        .filter_map(|(idx, o)| {
            let (zone, distance) = (*o)?;
            let cell = graph.cell(idx as CellIdx);
            in_domain(cell).then(|| ZoneAssignment {
                cell: cell.clone(),
                zone,
                seed: seeds[zone as usize].clone(),
                distance,
            })
        })
        .collect();
    for (seed, zone) in orphans {
        if in_domain(&seed) {
            assignments.push(ZoneAssignment { cell: seed.clone(), zone, seed, distance: 0 });
        }
    }
    assignments.sort_by(|a, b| a.cell.cmp(&b.cell));

    let unassigned: Vec<CellId> = match domain {
        Some(d) => d
            .iter()
            .filter(|c| assignments.binary_search_by(|a| a.cell.cmp(c)).is_err())
            .cloned()
            .collect(),
        None => {
            let mut cells: Vec<CellId> = owner
                .iter()
                .enumerate()
                .filter(|(_, o)| o.is_none())
                .map(|(idx, _)| graph.cell(idx as CellIdx).clone())
                .collect();
            cells.sort();
            cells
        }
    };

    tracing::debug!(
        seeds = seeds.len(),
        assigned = assignments.len(),
        unassigned = unassigned.len(),
        max_radius,
        "voronoi zones"
    );
    Ok(VoronoiResult { seeds: seeds.to_vec(), assignments, unassigned, truncated: graph.is_truncated() })
}
