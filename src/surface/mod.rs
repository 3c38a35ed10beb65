//! # Surface Generators
//!
//! Algorithms that turn one value layer into a new one:
//!
//! - [`kde`]: graph-hop kernel density smoothing
//! - [`flow`]: steepest-descent flow direction and accumulation
//! - [`viewshed`]: line-of-sight from an observer cell
//! - [`voronoi`]: nearest-seed proximity zones
//!
//! Everything here is synchronous and works on an already loaded
//! [`GridGraph`](crate::graph::GridGraph). Results carry the loader's
//! `truncated` flag and convert into [`DerivedSurface`](crate::model::DerivedSurface)
//! values sorted by cell ID.

pub mod flow;
pub mod kde;
pub mod viewshed;
pub mod voronoi;

pub use flow::{flow, AccumulationMode, FlowCell, FlowResult};
pub use kde::{kernel_density, Kernel};
pub use viewshed::{viewshed, ViewshedParams, ViewshedResult};
pub use voronoi::{voronoi, VoronoiResult, ZoneAssignment};
