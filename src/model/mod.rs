//! # Grid Data Model
//!
//! Plain DTOs shared by storage, the graph arena, every analytic module and
//! the caller. No I/O, no state, no async.

pub mod cell;
pub mod cell_set;
pub mod edge;
pub mod path;
pub mod region;
pub mod surface;
pub mod value;

pub use cell::{CellId, MAX_CELL_ID_LEN};
pub use cell_set::{CellSet, MaskMode, TraversalResult};
pub use edge::{AdjacencyEdge, Level};
pub use path::PathResult;
pub use region::{BoundingBox, LatLon, EARTH_RADIUS_M};
pub use surface::{DerivedSurface, SurfaceDescriptor};
pub use value::{AttributeValue, CellValues, LayerRef, Value, numeric_values};
