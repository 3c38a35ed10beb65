//! # Grid Graph Arena
//!
//! The in-memory adjacency slice every graph algorithm runs on. Cell IDs are
//! interned once into dense `CellIdx` values so hot loops index vectors
//! instead of hashing strings.
//!
//! A graph is built for exactly one resolution level. Rows for any other
//! level are rejected, as is a cell reporting two different parents.

pub mod observations;
pub mod walk;

use futures_util::{stream, StreamExt, TryStreamExt};
use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::config::EngineConfig;
use crate::model::*;
use crate::storage::TopologyStore;
use crate::{Error, Result};

pub use observations::Observations;
pub use walk::RingWalker;

/// Dense index of a cell inside one `GridGraph`.
pub type CellIdx = u32;

/// Neighbor list; hexagonal grids have six neighbors (pentagons five).
pub type NeighborList = SmallVec<[CellIdx; 6]>;

#[derive(Debug, Clone)]
pub struct GridGraph {
    level: Level,
    ids: Vec<CellId>,
    index: HashMap<CellId, CellIdx>,
    neighbors: Vec<NeighborList>,
    parents: Vec<Option<CellId>>,
    /// Whether the cell's own adjacency rows were fetched.
    expanded: Vec<bool>,
    truncated: bool,
}

impl GridGraph {
    pub fn new(level: Level) -> Self {
        Self {
            level,
            ids: Vec::new(),
            index: HashMap::new(),
            neighbors: Vec::new(),
            parents: Vec::new(),
            expanded: Vec::new(),
            truncated: false,
        }
    }

    /// Build from a complete edge list. Every `cell` endpoint counts as
    /// expanded.
    pub fn from_edges<'a>(level: Level, edges: impl IntoIterator<Item = &'a AdjacencyEdge>) -> Result<Self> {
        let mut graph = Self::new(level);
        for edge in edges {
            graph.add_edge(edge)?;
            let idx = graph.intern(&edge.cell);
            graph.expanded[idx as usize] = true;
        }
        Ok(graph)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn level(&self) -> Level { self.level }
    pub fn len(&self) -> usize { self.ids.len() }
    pub fn is_empty(&self) -> bool { self.ids.is_empty() }

    /// True when a cell cap stopped loading before all rings were fetched.
    pub fn is_truncated(&self) -> bool { self.truncated }

    pub fn index_of(&self, cell: &CellId) -> Option<CellIdx> {
        self.index.get(cell).copied()
    }

    pub fn cell(&self, idx: CellIdx) -> &CellId {
        &self.ids[idx as usize]
    }

    pub fn cells(&self) -> &[CellId] {
        &self.ids
    }

    pub fn neighbors(&self, idx: CellIdx) -> &[CellIdx] {
        &self.neighbors[idx as usize]
    }

    pub fn parent(&self, idx: CellIdx) -> Option<&CellId> {
        self.parents[idx as usize].as_ref()
    }

    pub fn is_expanded(&self, idx: CellIdx) -> bool {
        self.expanded[idx as usize]
    }

    /// Numeric values laid out by `CellIdx`.
    pub fn values_by_index(&self, values: &CellValues) -> Vec<Option<f64>> {
        self.ids.iter().map(|id| values.get(id).copied()).collect()
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    pub fn intern(&mut self, cell: &CellId) -> CellIdx {
        if let Some(&idx) = self.index.get(cell) {
            return idx;
        }
        let idx = self.ids.len() as CellIdx;
        self.ids.push(cell.clone());
        self.index.insert(cell.clone(), idx);
        self.neighbors.push(NeighborList::new());
        self.parents.push(None);
        self.expanded.push(false);
        idx
    }

    /// Add one stored row. The reverse direction is added too, so a store
    /// holding `(a, b)` without `(b, a)` still yields a usable graph.
    pub fn add_edge(&mut self, edge: &AdjacencyEdge) -> Result<()> {
        if edge.level != self.level {
            return Err(Error::InvalidInput(format!(
                "adjacency row {} -> {} is at level {}, traversal is at level {}",
                edge.cell, edge.neighbor, edge.level, self.level
            )));
        }
        let a = self.intern(&edge.cell);
        let b = self.intern(&edge.neighbor);

        if let Some(parent) = &edge.parent {
            match &self.parents[a as usize] {
                Some(existing) if existing != parent => {
                    return Err(Error::InvalidInput(format!(
                        "cell {} has conflicting parents {existing} and {parent} at level {}",
                        edge.cell, self.level
                    )));
                }
                Some(_) => {}
                None => self.parents[a as usize] = Some(parent.clone()),
            }
        }

        if a != b {
            if !self.neighbors[a as usize].contains(&b) {
                self.neighbors[a as usize].push(b);
            }
            if !self.neighbors[b as usize].contains(&a) {
                self.neighbors[b as usize].push(a);
            }
        }
        Ok(())
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Materialize the `rings`-hop neighborhood of `seeds` from the topology
    /// store, one batched query per ring.
    ///
    /// Seeds are always present. Once the graph holds more than
    /// `config.max_cells` cells with rings still to fetch, loading stops and
    /// the graph is marked truncated.
    pub async fn load<T>(
        store: &T,
        seeds: &[CellId],
        level: Level,
        rings: usize,
        config: &EngineConfig,
    ) -> Result<Self>
    where
        T: TopologyStore + ?Sized,
    {
        let mut graph = Self::new(level);
        let mut frontier: Vec<CellIdx> = Vec::with_capacity(seeds.len());
        for seed in seeds {
            let before = graph.len();
            let idx = graph.intern(seed);
            if graph.len() > before {
                frontier.push(idx);
            }
        }

        for ring in 0..rings {
            if frontier.is_empty() {
                break;
            }
            if graph.len() > config.max_cells {
                graph.truncated = true;
                tracing::warn!(
                    level,
                    ring,
                    cells = graph.len(),
                    max_cells = config.max_cells,
                    "graph load truncated"
                );
                break;
            }

            let cells: Vec<CellId> = frontier.iter().map(|&i| graph.cell(i).clone()).collect();
            let batches: Vec<Vec<AdjacencyEdge>> = stream::iter(cells.chunks(config.batch_size.max(1)))
                .map(|chunk| store.get_adjacency(chunk, level))
                .buffered(config.max_concurrency.max(1))
                .try_collect()
                .await?;

            for &idx in &frontier {
                graph.expanded[idx as usize] = true;
            }
            let before = graph.len();
            for edge in batches.iter().flatten() {
                graph.add_edge(edge)?;
            }
            frontier = (before..graph.len()).map(|i| i as CellIdx).collect();
            tracing::debug!(level, ring, cells = graph.len(), frontier = frontier.len(), "graph ring loaded");
        }

        Ok(graph)
    }
}
