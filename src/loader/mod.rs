//! # Topology Bulk Loader
//!
//! Populates the topology store from the grid geometry for a region and a
//! range of levels.
//!
//! ```text
//! cells_in_region ─► neighbors + parent (bounded fan-out) ─► rows ─► upsert in batches
//! ```
//!
//! Every batch is an idempotent upsert keyed by `(cell, neighbor, level)`,
//! so a load that failed halfway can simply be run again: committed batches
//! are rewritten as no-ops and the rest are filled in.

use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::model::*;
use crate::storage::{GridGeometry, TopologyStore};
use crate::traversal::fanout;
use crate::{Error, Result};

/// Per-level outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelReport {
    pub level: Level,
    pub cells: usize,
    /// Rows emitted for this level (not all of them need to have changed).
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadReport {
    pub levels: Vec<LevelReport>,
    pub batches_committed: usize,
    /// Rows the store reported as inserted or changed. Zero on a rerun.
    pub rows_written: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl LoadReport {
    pub fn total_cells(&self) -> usize {
        self.levels.iter().map(|l| l.cells).sum()
    }

    pub fn total_rows(&self) -> usize {
        self.levels.iter().map(|l| l.rows).sum()
    }
}

/// Load adjacency for every cell of `bbox` at each level in `levels`.
///
/// All levels are enumerated and checked against `config.max_cells` before
/// the first write. An upstream failure aborts the load; its message says
/// how many batches were already committed.
pub async fn load_topology<G, T>(
    geometry: &G,
    topology: &T,
    bbox: &BoundingBox,
    levels: RangeInclusive<Level>,
    config: &EngineConfig,
) -> Result<LoadReport>
where
    G: GridGeometry + ?Sized,
    T: TopologyStore + ?Sized,
{
    bbox.validate()?;
    if levels.is_empty() {
        return Err(Error::InvalidInput(format!(
            "empty level range {}..={}",
            levels.start(),
            levels.end()
        )));
    }
    config.check_level(*levels.end())?;

    let started_at = Utc::now();
    let mut plan = Vec::new();
    for level in levels {
        let cells = geometry.cells_in_region(level, bbox).await?;
        if cells.len() > config.max_cells {
            tracing::warn!(level, cells = cells.len(), max_cells = config.max_cells, "region too large to load");
            return Err(Error::ResourceExhausted(format!(
                "level {level} has {} cells in region, limit is {}",
                cells.len(),
                config.max_cells
            )));
        }
        plan.push((level, cells));
    }

    let mut report = LoadReport {
        levels: Vec::with_capacity(plan.len()),
        batches_committed: 0,
        rows_written: 0,
        started_at,
        finished_at: started_at,
    };

    for (level, cells) in plan {
        let rows = level_rows(geometry, &cells, level, config).await?;
        for batch in rows.chunks(config.batch_size.max(1)) {
            let written = topology
                .upsert_adjacency(batch.to_vec())
                .await
                .map_err(|e| with_progress(e, report.batches_committed))?;
            report.batches_committed += 1;
            report.rows_written += written;
        }
        tracing::info!(
            level,
            cells = cells.len(),
            rows = rows.len(),
            batches = report.batches_committed,
            "topology level loaded"
        );
        report.levels.push(LevelReport { level, cells: cells.len(), rows: rows.len() });
    }

    report.finished_at = Utc::now();
    Ok(report)
}

/// Adjacency rows for one level, in cell order then neighbor order.
async fn level_rows<G>(geometry: &G, cells: &[CellId], level: Level, config: &EngineConfig) -> Result<Vec<AdjacencyEdge>>
where
    G: GridGeometry + ?Sized,
{
    let lookups = fanout::ordered(cells, config.max_concurrency, |cell| async move {
        let neighbors = geometry.neighbors(cell).await?;
        let parent = geometry.parent(cell).await?;
        Ok((neighbors, parent))
    })
    .await?;

    let mut rows = Vec::new();
    for (cell, (neighbors, parent)) in cells.iter().zip(lookups) {
        for neighbor in neighbors {
            if &neighbor != cell {
                rows.push(AdjacencyEdge::new(cell.clone(), neighbor, level).with_parent(parent.clone()));
            }
        }
    }
    Ok(rows)
}

fn with_progress(err: Error, committed: usize) -> Error {
    match err {
        Error::UpstreamFailure(msg) => {
            tracing::warn!(committed, error = %msg, "topology load aborted");
            Error::UpstreamFailure(format!("{msg} ({committed} batches committed before failure)"))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryGrid;

    fn c(s: &str) -> CellId {
        CellId::new(s).unwrap()
    }

    /// Three cells in a row at level 2, all under one level-1 parent.
    fn grid() -> MemoryGrid {
        let g = MemoryGrid::new();
        for (k, id) in ["a", "b", "c"].iter().enumerate() {
            g.add_cell(c(id), 2, Some(LatLon::new(0.0, k as f64).unwrap()));
        }
        g.connect(&c("a"), &c("b")).unwrap();
        g.connect(&c("b"), &c("c")).unwrap();
        for id in ["a", "b", "c"] {
            g.set_parent(&c(id), &c("p")).unwrap();
        }
        g
    }

    #[tokio::test]
    async fn test_load_writes_rows_with_parent() {
        let g = grid();
        let cfg = EngineConfig::default().with_batch_size(3);
        let report = load_topology(&g, &g, &BoundingBox::WORLD, 2..=2, &cfg).await.unwrap();
        assert_eq!(report.total_cells(), 3);
        assert_eq!(report.total_rows(), 4);
        assert_eq!(report.batches_committed, 2);
        assert_eq!(report.rows_written, 4);
        assert!(report.finished_at >= report.started_at);

        let rows = g.get_adjacency(&[c("b")], 2).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.parent == Some(c("p"))));
    }

    #[tokio::test]
    async fn test_rerun_is_noop() {
        let g = grid();
        let cfg = EngineConfig::default();
        load_topology(&g, &g, &BoundingBox::WORLD, 2..=2, &cfg).await.unwrap();
        let again = load_topology(&g, &g, &BoundingBox::WORLD, 2..=2, &cfg).await.unwrap();
        assert_eq!(again.rows_written, 0);
        assert_eq!(g.adjacency_row_count(), 4);
    }

    #[tokio::test]
    async fn test_too_many_cells_writes_nothing() {
        let g = grid();
        let cfg = EngineConfig::default().with_max_cells(2);
        let err = load_topology(&g, &g, &BoundingBox::WORLD, 2..=2, &cfg).await.unwrap_err();
        assert!(matches!(err, Error::ResourceExhausted(_)));
        assert_eq!(g.adjacency_row_count(), 0);
    }

    #[tokio::test]
    async fn test_bad_inputs() {
        let g = grid();
        let cfg = EngineConfig::default();
        let bad_box = BoundingBox { min_lat: 10.0, min_lon: 0.0, max_lat: 0.0, max_lon: 1.0 };
        assert!(load_topology(&g, &g, &bad_box, 2..=2, &cfg).await.is_err());
        #[allow(clippy::reversed_empty_ranges)]
        let empty = 3..=2;
        assert!(load_topology(&g, &g, &BoundingBox::WORLD, empty, &cfg).await.is_err());
        assert!(load_topology(&g, &g, &BoundingBox::WORLD, 2..=31, &cfg).await.is_err());
    }
}
