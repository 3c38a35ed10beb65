//! Shared fixtures for the end-to-end tests.

#![allow(dead_code)]

use dggs_rs::{BoundingBox, CellId, Engine, LatLon, LayerRef, Level, MemoryGrid, Value};

pub type MemoryEngine = Engine<MemoryGrid, MemoryGrid, MemoryGrid>;

/// Level of the square test grids.
pub const LEVEL: Level = 5;

pub fn c(s: &str) -> CellId {
    CellId::new(s).unwrap()
}

pub fn cell(row: usize, col: usize) -> CellId {
    c(&format!("r{row}c{col}"))
}

/// `n × n` grid at `LEVEL` with rook adjacency. Centroids sit 0.01° apart
/// and every 2×2 block shares a parent `p{row/2}_{col/2}` one level up.
pub fn square_grid(n: usize) -> MemoryGrid {
    let grid = MemoryGrid::new();
    for row in 0..n {
        for col in 0..n {
            let centroid = LatLon::new(row as f64 * 0.01, col as f64 * 0.01).unwrap();
            grid.add_cell(cell(row, col), LEVEL, Some(centroid));
        }
    }
    for row in 0..n {
        for col in 0..n {
            if col + 1 < n {
                grid.connect(&cell(row, col), &cell(row, col + 1)).unwrap();
            }
            if row + 1 < n {
                grid.connect(&cell(row, col), &cell(row + 1, col)).unwrap();
            }
            grid.set_parent(&cell(row, col), &c(&format!("p{}_{}", row / 2, col / 2))).unwrap();
        }
    }
    grid
}

/// A square grid whose topology store has already been populated.
pub async fn loaded_grid(n: usize) -> (MemoryGrid, MemoryEngine) {
    let grid = square_grid(n);
    let engine = Engine::open_memory(grid.clone());
    engine.load_topology(&BoundingBox::WORLD, LEVEL..=LEVEL).await.unwrap();
    (grid, engine)
}

/// Fill `layer` with `f(row, col)` for every cell of an `n × n` grid.
pub fn fill(grid: &MemoryGrid, layer: &LayerRef, n: usize, f: impl Fn(usize, usize) -> f64) {
    let rows = (0..n).flat_map(|row| (0..n).map(move |col| (row, col)));
    let values: Vec<(CellId, Value)> = rows.map(|(row, col)| (cell(row, col), Value::Numeric(f(row, col)))).collect();
    grid.insert_values(layer, values);
}

/// Hub cell H with six neighbors N1..N6 joined in a ring, all under parent
/// P, which sits under root R.
pub fn hub() -> MemoryGrid {
    let grid = MemoryGrid::new();
    grid.add_cell(c("H"), 9, None);
    for k in 1..=6 {
        grid.add_cell(c(&format!("N{k}")), 9, None);
    }
    for k in 1..=6 {
        let n = c(&format!("N{k}"));
        grid.connect(&c("H"), &n).unwrap();
        grid.connect(&n, &c(&format!("N{}", k % 6 + 1))).unwrap();
        grid.set_parent(&n, &c("P")).unwrap();
    }
    grid.set_parent(&c("H"), &c("P")).unwrap();
    grid.set_parent(&c("P"), &c("R")).unwrap();
    grid
}
