//! End-to-end tests for surface generators and resampling.
//!
//! Every surface is computed through the Engine and read back from the
//! value store it was written to.

mod common;

use common::*;
use dggs_rs::{
    AccumulationMode, CellId, Error, Kernel, LayerRef, MemoryGrid, Refinement, Statistic, Value,
    ValueStore, ViewshedParams,
};
use pretty_assertions::assert_eq;

async fn read(grid: &MemoryGrid, layer: &LayerRef) -> Vec<(CellId, Value)> {
    grid.get_values(layer, None)
        .await
        .unwrap()
        .into_iter()
        .map(|row| (row.cell, row.value))
        .collect()
}

async fn read_f64(grid: &MemoryGrid, layer: &LayerRef, cell: &CellId) -> Option<f64> {
    read(grid, layer).await.into_iter().find(|(c, _)| c == cell).and_then(|(_, v)| v.as_f64())
}

// ============================================================================
// 1. Kernel density
// ============================================================================

#[tokio::test]
async fn test_kde_spreads_within_bandwidth() {
    let (grid, engine) = loaded_grid(5).await;
    let source = LayerRef::new("obs", "count");
    let target = LayerRef::new("obs", "density");
    grid.insert_values(&source, [(cell(2, 2), Value::Numeric(10.0))]);

    let written = engine.kernel_density(&source, &target, LEVEL, 2, Kernel::Uniform).await.unwrap();
    assert_eq!(written.cell_count, 13);
    assert_eq!(written.attribute_key, "density");
    assert_eq!(grid.layer_len(&target), 13);
    assert_eq!(read_f64(&grid, &target, &cell(0, 2)).await, Some(10.0));
    assert_eq!(read_f64(&grid, &target, &cell(0, 0)).await, None);
}

#[tokio::test]
async fn test_kde_gaussian_smooths_between_sources() {
    let (grid, engine) = loaded_grid(3).await;
    let source = LayerRef::new("obs", "count");
    let target = LayerRef::new("obs", "density");
    grid.insert_values(&source, [(cell(1, 0), Value::Numeric(0.0)), (cell(1, 2), Value::Numeric(8.0))]);

    engine.kernel_density(&source, &target, LEVEL, 1, Kernel::Gaussian).await.unwrap();
    assert_eq!(read_f64(&grid, &target, &cell(1, 1)).await, Some(4.0));
}

#[tokio::test]
async fn test_rerun_replaces_previous_surface() {
    let (grid, engine) = loaded_grid(5).await;
    let source = LayerRef::new("obs", "count");
    let target = LayerRef::new("obs", "density");
    grid.insert_values(&source, [(cell(2, 2), Value::Numeric(10.0))]);

    let wide = engine.kernel_density(&source, &target, LEVEL, 2, Kernel::Uniform).await.unwrap();
    assert_eq!(grid.layer_len(&target), wide.cell_count);

    let narrow = engine.kernel_density(&source, &target, LEVEL, 1, Kernel::Uniform).await.unwrap();
    assert_eq!(narrow.cell_count, 5);
    assert_eq!(grid.layer_len(&target), 5);
    assert_eq!(read_f64(&grid, &target, &cell(0, 2)).await, None);
}

#[tokio::test]
async fn test_kde_rejects_zero_bandwidth_and_same_layer() {
    let (grid, engine) = loaded_grid(3).await;
    let source = LayerRef::new("obs", "count");
    fill(&grid, &source, 3, |_, _| 1.0);

    let err = engine.kernel_density(&source, &source, LEVEL, 1, Kernel::Linear).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    let err = engine
        .kernel_density(&source, &LayerRef::new("obs", "d"), LEVEL, 0, Kernel::Linear)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

// ============================================================================
// 2. Flow
// ============================================================================

#[tokio::test]
async fn test_flow_drains_to_single_sink() {
    let (grid, engine) = loaded_grid(4).await;
    let elevation = LayerRef::new("dem", "elevation");
    let acc = LayerRef::new("dem", "accumulation");
    let dir = LayerRef::new("dem", "direction");
    fill(&grid, &elevation, 4, |r, c| (r + c) as f64);

    let written = engine
        .flow(&elevation, LEVEL, AccumulationMode::Transitive, &acc, Some(&dir))
        .await
        .unwrap();
    assert_eq!(written.len(), 2);
    assert_eq!(written[0].cell_count, 16);
    assert_eq!(written[1].cell_count, 15);

    assert_eq!(read_f64(&grid, &acc, &cell(0, 0)).await, Some(15.0));
    assert_eq!(read_f64(&grid, &acc, &cell(3, 3)).await, Some(0.0));
    let dirs = read(&grid, &dir).await;
    assert!(dirs.iter().all(|(c, _)| *c != cell(0, 0)));
    let from_edge = dirs.iter().find(|(c, _)| *c == cell(0, 1)).map(|(_, v)| v.clone());
    assert_eq!(from_edge, Some(Value::Text("r0c0".into())));
}

#[tokio::test]
async fn test_flow_direct_counts_immediate_upstream() {
    let (grid, engine) = loaded_grid(4).await;
    let elevation = LayerRef::new("dem", "elevation");
    let acc = LayerRef::new("dem", "accumulation");
    fill(&grid, &elevation, 4, |r, c| (r + c) as f64);

    engine.flow(&elevation, LEVEL, AccumulationMode::Direct, &acc, None).await.unwrap();
    assert_eq!(read_f64(&grid, &acc, &cell(0, 0)).await, Some(2.0));
}

// ============================================================================
// 3. Viewshed
// ============================================================================

#[tokio::test]
async fn test_viewshed_ridge_blocks_line_of_sight() {
    let (grid, engine) = loaded_grid(5).await;
    let elevation = LayerRef::new("dem", "elevation");
    let target = LayerRef::new("dem", "visible");
    fill(&grid, &elevation, 5, |r, c| if (r, c) == (0, 2) { 1000.0 } else { 0.0 });

    let params = ViewshedParams { observer: cell(0, 0), eye_height: 2.0, max_radius: 4 };
    let written = engine.viewshed(&elevation, &target, LEVEL, &params).await.unwrap();
    assert!(written.cell_count > 1);

    assert_eq!(read_f64(&grid, &target, &cell(0, 0)).await, Some(1.0));
    assert_eq!(read_f64(&grid, &target, &cell(1, 0)).await, Some(1.0));
    assert_eq!(read_f64(&grid, &target, &cell(0, 2)).await, Some(1.0));
    assert_eq!(read_f64(&grid, &target, &cell(0, 3)).await, Some(0.0));
    // Beyond the radius nothing is written.
    assert_eq!(read_f64(&grid, &target, &cell(4, 4)).await, None);
}

#[tokio::test]
async fn test_viewshed_unknown_observer() {
    let (grid, engine) = loaded_grid(3).await;
    let elevation = LayerRef::new("dem", "elevation");
    fill(&grid, &elevation, 3, |_, _| 0.0);
    let params = ViewshedParams { observer: c("nowhere"), eye_height: 1.0, max_radius: 2 };
    let err = engine
        .viewshed(&elevation, &LayerRef::new("dem", "v"), LEVEL, &params)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

// ============================================================================
// 4. Proximity zones
// ============================================================================

#[tokio::test]
async fn test_zones_split_grid_between_seeds() {
    let (grid, engine) = loaded_grid(5).await;
    let zone = LayerRef::new("svc", "zone");
    let seed = LayerRef::new("svc", "seed");
    let seeds = [cell(0, 0), cell(4, 4)];

    let written = engine.proximity_zones(&seeds, LEVEL, 10, None, &zone, Some(&seed)).await.unwrap();
    assert_eq!(written[0].cell_count, 25);
    assert_eq!(read_f64(&grid, &zone, &cell(0, 1)).await, Some(0.0));
    assert_eq!(read_f64(&grid, &zone, &cell(4, 3)).await, Some(1.0));
    // Equidistant: the first seed wins.
    assert_eq!(read_f64(&grid, &zone, &cell(0, 4)).await, Some(0.0));

    let seeds_layer = read(&grid, &seed).await;
    let owner = seeds_layer.iter().find(|(c, _)| *c == cell(3, 4)).map(|(_, v)| v.clone());
    assert_eq!(owner, Some(Value::Text("r4c4".into())));
}

#[tokio::test]
async fn test_zones_radius_bounds_assignment() {
    let (grid, engine) = loaded_grid(5).await;
    let zone = LayerRef::new("svc", "zone");
    let written = engine.proximity_zones(&[cell(0, 0)], LEVEL, 1, None, &zone, None).await.unwrap();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].cell_count, 3);
    assert_eq!(grid.layer_len(&zone), 3);
}

// ============================================================================
// 5. Resampling
// ============================================================================

#[tokio::test]
async fn test_aggregate_values_to_parents() {
    let (grid, engine) = loaded_grid(4).await;
    let source = LayerRef::new("census", "pop");
    let target = LayerRef::new("census", "pop_coarse");
    fill(&grid, &source, 4, |_, c| c as f64);

    let written = engine.aggregate_values(&source, &target, 1, Statistic::Mean).await.unwrap();
    assert_eq!(written.cell_count, 4);
    assert_eq!(read_f64(&grid, &target, &c("p0_0")).await, Some(0.5));
    assert_eq!(read_f64(&grid, &target, &c("p1_1")).await, Some(2.5));

    let total = LayerRef::new("census", "pop_total");
    engine.aggregate_values(&source, &total, 1, Statistic::Sum).await.unwrap();
    assert_eq!(read_f64(&grid, &total, &c("p0_1")).await, Some(10.0));
}

#[tokio::test]
async fn test_categorical_mode() {
    let (grid, engine) = loaded_grid(2).await;
    let source = LayerRef::new("landcover", "class");
    let target = LayerRef::new("landcover", "class_coarse");
    grid.insert_values(
        &source,
        [
            (cell(0, 0), Value::from("forest")),
            (cell(0, 1), Value::from("water")),
            (cell(1, 0), Value::from("forest")),
            (cell(1, 1), Value::from("urban")),
        ],
    );
    engine.aggregate_values(&source, &target, 1, Statistic::Mode).await.unwrap();
    let rows = read(&grid, &target).await;
    assert_eq!(rows, vec![(c("p0_0"), Value::from("forest"))]);
}

#[tokio::test]
async fn test_refine_values_split() {
    let (grid, engine) = loaded_grid(2).await;
    let source = LayerRef::new("census", "pop_coarse");
    let target = LayerRef::new("census", "pop_fine");
    grid.insert_values(&source, [(c("p0_0"), Value::Numeric(100.0))]);

    let written = engine.refine_values(&source, &target, 1, Refinement::Split).await.unwrap();
    assert_eq!(written.cell_count, 4);
    assert_eq!(read_f64(&grid, &target, &cell(1, 1)).await, Some(25.0));
}

#[tokio::test]
async fn test_resample_missing_source() {
    let (_grid, engine) = loaded_grid(2).await;
    let err = engine
        .aggregate_values(&LayerRef::new("x", "y"), &LayerRef::new("x", "z"), 1, Statistic::Mean)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}
