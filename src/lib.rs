//! # dggs-rs: Grid Topology & Spatial Analytics Engine
//!
//! Spatial analytics over a discrete global grid, treating cells and their
//! neighbor/parent links as a graph instead of recomputing geometry per
//! query.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `GridGeometry`, `ValueStore` and `TopologyStore` are the
//!    contracts between the engine and the outside world
//! 2. **Clean DTOs**: `CellId`, `CellSet`, `Value`, `LayerRef` cross all boundaries
//! 3. **Arena graphs**: algorithms run on an interned `GridGraph`, not on strings
//! 4. **Bounded everything**: every traversal has a cap and reports hitting it
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dggs_rs::{CellId, CellSet, Engine, MemoryGrid};
//!
//! # async fn example() -> dggs_rs::Result<()> {
//! let grid = MemoryGrid::new();
//! let hub = CellId::new("8928308280fffff")?;
//! grid.add_cell(hub.clone(), 9, None);
//!
//! let engine = Engine::open_memory(grid);
//! let seeds: CellSet = [hub].into_iter().collect();
//! let ring = engine.buffer(&seeds, 1).await?;
//! println!("{} cells, truncated: {}", ring.cells.len(), ring.truncated);
//! # Ok(())
//! # }
//! ```
//!
//! ## Operations
//!
//! | Family | Engine methods |
//! |--------|----------------|
//! | Traversal | `buffer`, `aggregate`, `expand` (+ set algebra in [`traversal`]) |
//! | Paths | `shortest_path` |
//! | Autocorrelation | `morans_i`, `lisa`, `hotspots` |
//! | Clustering | `dbscan` |
//! | Surfaces | `kernel_density`, `flow`, `viewshed`, `proximity_zones` |
//! | Resampling | `aggregate_values`, `refine_values` |
//! | Topology | `load_topology` |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod config;
pub mod storage;
pub mod graph;
pub mod traversal;
pub mod pathfinding;
pub mod autocorrelation;
pub mod clustering;
pub mod surface;
pub mod resample;
pub mod loader;

use std::fmt;
use std::ops::RangeInclusive;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    AdjacencyEdge, AttributeValue, BoundingBox, CellId, CellSet, CellValues,
    DerivedSurface, LatLon, LayerRef, Level, MaskMode, PathResult,
    SurfaceDescriptor, TraversalResult, Value,
};

// ============================================================================
// Re-exports: Storage, config, graph
// ============================================================================

pub use config::EngineConfig;
pub use graph::GridGraph;
pub use storage::{GridGeometry, MemoryGrid, TopologyStore, ValueStore};

// ============================================================================
// Re-exports: Algorithms
// ============================================================================

pub use autocorrelation::{HotspotResult, LisaResult, MoranResult, Significance};
pub use clustering::{ClusterLabel, ClusteringResult, DbscanParams};
pub use loader::LoadReport;
pub use pathfinding::PathQuery;
pub use resample::{Refinement, Statistic};
pub use surface::{AccumulationMode, Kernel, ViewshedParams};

// ============================================================================
// Top-level Engine handle
// ============================================================================

/// The primary entry point. An `Engine` wraps the three collaborators and
/// runs every analytic against them.
///
/// It holds no per-request state: each call loads what it needs, computes in
/// memory and returns (or writes) the result.
pub struct Engine<G: GridGeometry, V: ValueStore, T: TopologyStore> {
    geometry: G,
    values: V,
    topology: T,
    config: EngineConfig,
}

impl<G: GridGeometry, V: ValueStore, T: TopologyStore> Engine<G, V, T> {
    /// Create an Engine with the default configuration.
    pub fn new(geometry: G, values: V, topology: T) -> Self {
        Self { geometry, values, topology, config: EngineConfig::default() }
    }

    /// Create an Engine with a validated configuration.
    pub fn with_config(geometry: G, values: V, topology: T, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { geometry, values, topology, config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn geometry(&self) -> &G {
        &self.geometry
    }

    pub fn value_store(&self) -> &V {
        &self.values
    }

    pub fn topology(&self) -> &T {
        &self.topology
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Numeric values of a layer. Text and non-finite rows are dropped.
    pub async fn load_layer(&self, layer: &LayerRef, filter: Option<&CellSet>) -> Result<CellValues> {
        let rows = self.values.get_values(layer, filter).await?;
        Ok(model::numeric_values(&rows))
    }

    /// The `rings`-hop adjacency slice around `seeds` at `level`.
    pub async fn load_graph(&self, seeds: &[CellId], level: Level, rings: usize) -> Result<GridGraph> {
        self.config.check_level(level)?;
        GridGraph::load(&self.topology, seeds, level, rings, &self.config).await
    }

    /// A layer's numeric values and the graph around its cells.
    async fn layer_graph(&self, layer: &LayerRef, level: Level, rings: usize) -> Result<(GridGraph, CellValues)> {
        self.config.check_level(level)?;
        let values = self.load_layer(layer, None).await?;
        if values.len() > self.config.max_cells {
            return Err(Error::ResourceExhausted(format!(
                "layer {layer} has {} cells, limit is {}",
                values.len(),
                self.config.max_cells
            )));
        }
        let mut seeds: Vec<CellId> = values.keys().cloned().collect();
        seeds.sort();
        let graph = self.load_graph(&seeds, level, rings).await?;
        Ok((graph, values))
    }

    /// Like [`layer_graph`](Self::layer_graph), for surfaces: an empty source is an error.
    async fn surface_source(&self, layer: &LayerRef, level: Level, rings: usize) -> Result<(GridGraph, CellValues)> {
        let (graph, values) = self.layer_graph(layer, level, rings).await?;
        if values.is_empty() {
            return Err(Error::NotFound(format!("layer {layer} has no numeric values")));
        }
        Ok((graph, values))
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    pub async fn buffer(&self, cells: &CellSet, iterations: usize) -> Result<TraversalResult> {
        traversal::buffer(&self.geometry, cells, iterations, self.config.max_cells, self.config.max_concurrency).await
    }

    pub async fn aggregate(&self, cells: &CellSet, levels: usize) -> Result<TraversalResult> {
        traversal::aggregate(&self.geometry, cells, levels, self.config.max_concurrency).await
    }

    pub async fn expand(&self, cells: &CellSet, iterations: usize) -> Result<TraversalResult> {
        traversal::expand(&self.geometry, cells, iterations, self.config.max_cells, self.config.max_concurrency)
            .await
    }

    // ========================================================================
    // Paths
    // ========================================================================

    /// BFS when the query has no cost layer, Dijkstra otherwise.
    pub async fn shortest_path(&self, query: &PathQuery) -> Result<PathResult> {
        self.config.check_level(query.level)?;
        if query.start == query.end {
            return Ok(PathResult::single(query.start.clone()));
        }
        let graph = self.load_graph(std::slice::from_ref(&query.start), query.level, query.max_hops).await?;
        let result = match &query.cost {
            None => pathfinding::bfs_path(&graph, &query.start, &query.end, query.max_hops),
            Some(layer) => {
                let scope: CellSet = graph.cells().iter().cloned().collect();
                let costs = self.load_layer(layer, Some(&scope)).await?;
                pathfinding::dijkstra_path(&graph, &query.start, &query.end, &costs, query.max_hops)?
            }
        };
        tracing::debug!(
            start = %query.start,
            end = %query.end,
            found = result.found,
            hops = result.hops,
            weighted = query.cost.is_some(),
            "shortest path"
        );
        Ok(result)
    }

    // ========================================================================
    // Autocorrelation & clustering
    // ========================================================================

    pub async fn morans_i(&self, layer: &LayerRef, level: Level) -> Result<MoranResult> {
        let (graph, values) = self.layer_graph(layer, level, 1).await?;
        Ok(autocorrelation::morans_i(&graph, &values))
    }

    pub async fn lisa(&self, layer: &LayerRef, level: Level) -> Result<LisaResult> {
        let (graph, values) = self.layer_graph(layer, level, 1).await?;
        Ok(autocorrelation::lisa(&graph, &values))
    }

    /// Getis-Ord Gi* over `radius`-ring neighborhoods.
    pub async fn hotspots(&self, layer: &LayerRef, level: Level, radius: u32) -> Result<HotspotResult> {
        let (graph, values) = self.layer_graph(layer, level, radius as usize).await?;
        Ok(autocorrelation::getis_ord(&graph, &values, radius))
    }

    pub async fn dbscan(&self, layer: &LayerRef, level: Level, params: &DbscanParams) -> Result<ClusteringResult> {
        params.validate()?;
        let (graph, values) = self.layer_graph(layer, level, params.eps_rings as usize).await?;
        clustering::dbscan(&graph, &values, params)
    }

    // ========================================================================
    // Surfaces
    // ========================================================================

    pub async fn kernel_density(
        &self,
        source: &LayerRef,
        target: &LayerRef,
        level: Level,
        bandwidth: u32,
        kernel: Kernel,
    ) -> Result<SurfaceDescriptor> {
        check_target(source, target)?;
        if bandwidth == 0 {
            return Err(Error::InvalidInput("kde bandwidth must be at least 1".into()));
        }
        let (graph, values) = self.surface_source(source, level, bandwidth as usize).await?;
        let surface = surface::kernel_density(&graph, &values, bandwidth, kernel, &target.attribute_key)?;
        self.write_surface(target, surface).await
    }

    /// Route flow over an elevation layer. Accumulation goes to
    /// `accumulation_target`; target cell IDs go to `direction_target` when
    /// given. Both layers are written together or not at all.
    pub async fn flow(
        &self,
        elevation: &LayerRef,
        level: Level,
        mode: AccumulationMode,
        accumulation_target: &LayerRef,
        direction_target: Option<&LayerRef>,
    ) -> Result<Vec<SurfaceDescriptor>> {
        check_target(elevation, accumulation_target)?;
        if let Some(direction) = direction_target {
            check_target(elevation, direction)?;
            check_target(accumulation_target, direction)?;
        }
        let (graph, values) = self.surface_source(elevation, level, 1).await?;
        let routed = surface::flow(&graph, &values, mode);

        let mut surfaces =
            vec![(accumulation_target, routed.accumulation_surface(&accumulation_target.attribute_key))];
        if let Some(direction) = direction_target {
            surfaces.push((direction, routed.direction_surface(&direction.attribute_key)));
        }
        self.write_surfaces(surfaces).await
    }

    pub async fn viewshed(
        &self,
        elevation: &LayerRef,
        target: &LayerRef,
        level: Level,
        params: &ViewshedParams,
    ) -> Result<SurfaceDescriptor> {
        check_target(elevation, target)?;
        // Graph loading interns seeds unconditionally; a cell the geometry
        // cannot place is treated as unknown.
        if self.geometry.centroid(&params.observer).await?.is_none() {
            return Err(Error::NotFound(format!("observer cell {} is not in the grid", params.observer)));
        }
        let graph = self
            .load_graph(std::slice::from_ref(&params.observer), level, params.max_radius as usize)
            .await?;
        let scope: CellSet = graph.cells().iter().cloned().collect();
        let heights = self.load_layer(elevation, Some(&scope)).await?;

        let cells = graph.cells();
        let points = traversal::fanout::ordered(cells, self.config.max_concurrency, |c| self.geometry.centroid(c)).await?;
        let centroids: HashMap<CellId, LatLon> = cells
            .iter()
            .zip(points)
            .filter_map(|(c, p)| Some((c.clone(), p?)))
            .collect();

        let result = surface::viewshed(&graph, &heights, &centroids, params)?;
        self.write_surface(target, result.surface(&target.attribute_key)).await
    }

    /// Partition cells around `seeds` by hop distance. Zone indices go to
    /// `zone_target`; seed IDs go to `seed_target` when given. Both layers
    /// are written together or not at all.
    pub async fn proximity_zones(
        &self,
        seeds: &[CellId],
        level: Level,
        max_radius: u32,
        domain: Option<&CellSet>,
        zone_target: &LayerRef,
        seed_target: Option<&LayerRef>,
    ) -> Result<Vec<SurfaceDescriptor>> {
        if let Some(seed_target) = seed_target {
            check_target(zone_target, seed_target)?;
        }
        if seeds.is_empty() {
            return Err(Error::InvalidInput("voronoi needs at least one seed".into()));
        }
        let graph = self.load_graph(seeds, level, max_radius as usize).await?;
        let zones = surface::voronoi(&graph, seeds, max_radius, domain)?;

        let mut surfaces = vec![(zone_target, zones.zone_surface(&zone_target.attribute_key))];
        if let Some(seed_target) = seed_target {
            surfaces.push((seed_target, zones.seed_surface(&seed_target.attribute_key)));
        }
        self.write_surfaces(surfaces).await
    }

    // ========================================================================
    // Resampling
    // ========================================================================

    pub async fn aggregate_values(
        &self,
        source: &LayerRef,
        target: &LayerRef,
        levels: usize,
        statistic: Statistic,
    ) -> Result<SurfaceDescriptor> {
        check_target(source, target)?;
        let rows = self.source_rows(source).await?;
        let out = resample::aggregate_values(&self.geometry, &rows, levels, statistic, self.config.max_concurrency)
            .await?;
        self.write_surface(target, DerivedSurface::new(target.attribute_key.clone(), out, false)).await
    }

    pub async fn refine_values(
        &self,
        source: &LayerRef,
        target: &LayerRef,
        levels: usize,
        refinement: Refinement,
    ) -> Result<SurfaceDescriptor> {
        check_target(source, target)?;
        let rows = self.source_rows(source).await?;
        let out = resample::refine_values(
            &self.geometry,
            &rows,
            levels,
            refinement,
            self.config.max_cells,
            self.config.max_concurrency,
        )
        .await?;
        self.write_surface(target, DerivedSurface::new(target.attribute_key.clone(), out, false)).await
    }

    async fn source_rows(&self, layer: &LayerRef) -> Result<Vec<(CellId, Value)>> {
        let rows = self.values.get_values(layer, None).await?;
        if rows.is_empty() {
            return Err(Error::NotFound(format!("layer {layer} has no values")));
        }
        Ok(rows.into_iter().map(|r| (r.cell, r.value)).collect())
    }

    // ========================================================================
    // Topology
    // ========================================================================

    /// Populate the topology store for `bbox` at every level in `levels`.
    pub async fn load_topology(&self, bbox: &BoundingBox, levels: RangeInclusive<Level>) -> Result<LoadReport> {
        loader::load_topology(&self.geometry, &self.topology, bbox, levels, &self.config).await
    }

    // ========================================================================
    // Surface writes
    // ========================================================================

    /// Write a computed surface in one `put_values` call.
    async fn write_surface(&self, target: &LayerRef, surface: DerivedSurface) -> Result<SurfaceDescriptor> {
        let descriptor = SurfaceDescriptor::for_layer(target, surface.len(), surface.truncated);
        self.values.put_values(target, surface.values).await?;
        log_written(target, &descriptor);
        Ok(descriptor)
    }

    /// Write every surface of one call in a single `put_layers` call.
    async fn write_surfaces(&self, surfaces: Vec<(&LayerRef, DerivedSurface)>) -> Result<Vec<SurfaceDescriptor>> {
        let targets: Vec<&LayerRef> = surfaces.iter().map(|(target, _)| *target).collect();
        let descriptors: Vec<SurfaceDescriptor> = surfaces
            .iter()
            .map(|(target, surface)| SurfaceDescriptor::for_layer(target, surface.len(), surface.truncated))
            .collect();
        let layers = surfaces.into_iter().map(|(target, surface)| (target.clone(), surface.values)).collect();
        self.values.put_layers(layers).await?;
        for (target, descriptor) in targets.into_iter().zip(&descriptors) {
            log_written(target, descriptor);
        }
        Ok(descriptors)
    }
}

/// In-memory engine for testing and embedding. One `MemoryGrid` serves as
/// all three collaborators.
impl Engine<MemoryGrid, MemoryGrid, MemoryGrid> {
    pub fn open_memory(grid: MemoryGrid) -> Self {
        Self::new(grid.clone(), grid.clone(), grid)
    }
}

fn log_written(target: &LayerRef, descriptor: &SurfaceDescriptor) {
    tracing::info!(
        layer = %target,
        cells = descriptor.cell_count,
        truncated = descriptor.truncated,
        "surface written"
    );
}

fn check_target(source: &LayerRef, target: &LayerRef) -> Result<()> {
    if source == target {
        tracing::warn!(layer = %target, "surface target equals its source");
        return Err(Error::InvalidInput(format!("target layer {target} must differ from source layer")));
    }
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Upstream failure: {0}")]
    UpstreamFailure(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Machine-readable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    ResourceExhausted,
    UpstreamFailure,
    Config,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::NotFound => "not_found",
            ErrorKind::ResourceExhausted => "resource_exhausted",
            ErrorKind::UpstreamFailure => "upstream_failure",
            ErrorKind::Config => "config",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
            Error::UpstreamFailure(_) => ErrorKind::UpstreamFailure,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    /// Only collaborator failures may succeed on a retry. The engine itself
    /// never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::UpstreamFailure(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
