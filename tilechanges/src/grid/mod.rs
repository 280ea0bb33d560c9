//! Multi-resolution tile grids.
//!
//! A [`GridMatrixSet`] is the static description of a tiling scheme: an
//! ordered list of [`GridLevel`]s, each with its own scale denominator, tile
//! size and matrix dimensions. Its queries are pure:
//!
//! - [`GridMatrixSet::tile_coverage`] projects an envelope onto the tile
//!   indices of one zoom, producing a [`GridSubset`]
//! - [`GridMatrixSet::zoom_range_for_scale`] selects the zoom levels that
//!   apply to a scale denominator range
//!
//! The [`GridSetRegistry`] resolves tile matrix set ids to shared sets.

mod matrix;
mod registry;
mod types;

pub use matrix::{
    GridError, GridMatrixSet, SharedGridMatrixSet, STANDARD_PIXEL_SIZE,
    WEB_MERCATOR_QUAD_Z0_SCALE, WORLD_CRS84_QUAD_Z0_SCALE,
};
pub use registry::GridSetRegistry;
pub use types::{GridLevel, GridSubset, TileCoordinate, ZoomRange};
