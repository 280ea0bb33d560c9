//! Multi-resolution tile matrix sets.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{GridLevel, GridSubset, TileCoordinate, ZoomRange};
use crate::geometry::{Crs, Envelope, WEB_MERCATOR_HALF_WORLD};

/// Size of the standardized rendering pixel in meters (0.28 mm).
pub const STANDARD_PIXEL_SIZE: f64 = 0.00028;

/// Scale denominator of WebMercatorQuad zoom level 0.
pub const WEB_MERCATOR_QUAD_Z0_SCALE: f64 = 559_082_264.028_717_8;

/// Scale denominator of WorldCRS84Quad zoom level 0.
pub const WORLD_CRS84_QUAD_Z0_SCALE: f64 = 279_541_132.014_358_9;

/// Relative tolerance when matching scale denominators against a range.
///
/// Configured scale denominators are usually rounded decimal literals, so a
/// requested bound equal to a level's advertised scale must still select it.
const SCALE_TOLERANCE: f64 = 1e-9;

/// Slack, in tiles, when snapping envelope edges to tile boundaries.
const EDGE_EPSILON: f64 = 1e-9;

/// Errors in a tile matrix set definition.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    #[error("tile matrix set '{0}' has no levels")]
    NoLevels(String),

    #[error("tile matrix set '{id}': level at index {index} declares zoom {zoom}")]
    ZoomMismatch { id: String, index: usize, zoom: u32 },

    #[error("tile matrix set '{id}': zoom {zoom} has a zero tile or matrix dimension")]
    ZeroDimension { id: String, zoom: u32 },

    #[error(
        "tile matrix set '{id}': scale denominator at zoom {zoom} must be finite, positive \
         and smaller than the previous level"
    )]
    ScaleNotDecreasing { id: String, zoom: u32 },
}

/// Static description of a multi-resolution tile grid.
///
/// Level `z` sits at index `z`. Tile rows count down from the top-left
/// `origin`, so row 0 is the northernmost row. Instances are immutable and
/// shared behind an [`Arc`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridMatrixSet {
    id: String,
    crs: Crs,
    /// Top-left corner `(x, y)` in CRS units.
    origin: (f64, f64),
    levels: Vec<GridLevel>,
}

impl GridMatrixSet {
    /// Create a matrix set, validating its levels.
    ///
    /// # Errors
    ///
    /// Returns [`GridError`] if there are no levels, zooms are not `0..n` in
    /// order, a dimension is zero, or scale denominators do not strictly
    /// decrease.
    pub fn new(
        id: impl Into<String>,
        crs: Crs,
        origin: (f64, f64),
        levels: Vec<GridLevel>,
    ) -> Result<Self, GridError> {
        let id = id.into();
        if levels.is_empty() {
            return Err(GridError::NoLevels(id));
        }

        let mut previous_scale = f64::INFINITY;
        for (index, level) in levels.iter().enumerate() {
            if level.zoom as usize != index {
                return Err(GridError::ZoomMismatch {
                    id,
                    index,
                    zoom: level.zoom,
                });
            }
            if level.tile_width == 0
                || level.tile_height == 0
                || level.matrix_width == 0
                || level.matrix_height == 0
            {
                return Err(GridError::ZeroDimension {
                    id,
                    zoom: level.zoom,
                });
            }
            let scale = level.scale_denominator;
            if !(scale.is_finite() && scale > 0.0 && scale < previous_scale) {
                return Err(GridError::ScaleNotDecreasing {
                    id,
                    zoom: level.zoom,
                });
            }
            previous_scale = scale;
        }

        Ok(Self {
            id,
            crs,
            origin,
            levels,
        })
    }

    /// The OGC `WebMercatorQuad` set (EPSG:3857, levels 0..=24).
    pub fn web_mercator_quad() -> Self {
        let levels = (0..=24u32)
            .map(|z| {
                GridLevel::new(
                    z,
                    WEB_MERCATOR_QUAD_Z0_SCALE / 2f64.powi(z as i32),
                    256,
                    256,
                    1 << z,
                    1 << z,
                )
            })
            .collect();
        Self {
            id: "WebMercatorQuad".to_string(),
            crs: Crs::WEB_MERCATOR,
            origin: (-WEB_MERCATOR_HALF_WORLD, WEB_MERCATOR_HALF_WORLD),
            levels,
        }
    }

    /// The OGC `WorldCRS84Quad` set (CRS84, two tiles at level 0, levels 0..=21).
    pub fn world_crs84_quad() -> Self {
        let levels = (0..=21u32)
            .map(|z| {
                GridLevel::new(
                    z,
                    WORLD_CRS84_QUAD_Z0_SCALE / 2f64.powi(z as i32),
                    256,
                    256,
                    2 << z,
                    1 << z,
                )
            })
            .collect();
        Self {
            id: "WorldCRS84Quad".to_string(),
            crs: Crs::WGS84,
            origin: (-180.0, 90.0),
            levels,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn crs(&self) -> Crs {
        self.crs
    }

    pub fn origin(&self) -> (f64, f64) {
        self.origin
    }

    pub fn levels(&self) -> &[GridLevel] {
        &self.levels
    }

    pub fn level(&self, zoom: u32) -> Option<&GridLevel> {
        self.levels.get(zoom as usize)
    }

    /// The complete zoom range of this set.
    pub fn full_zoom_range(&self) -> ZoomRange {
        ZoomRange::new(0, self.levels.len() as u32 - 1)
    }

    /// Width and height of one tile at `zoom`, in CRS units.
    pub fn tile_span(&self, zoom: u32) -> Option<(f64, f64)> {
        let level = self.level(zoom)?;
        let resolution =
            level.scale_denominator * STANDARD_PIXEL_SIZE / self.crs.meters_per_unit();
        Some((
            level.tile_width as f64 * resolution,
            level.tile_height as f64 * resolution,
        ))
    }

    /// Area covered by the matrix at zoom 0.
    pub fn extent(&self) -> Envelope {
        match (self.level(0), self.tile_span(0)) {
            (Some(level), Some((span_x, span_y))) => Envelope::new(
                self.origin.0,
                self.origin.1 - level.matrix_height as f64 * span_y,
                self.origin.0 + level.matrix_width as f64 * span_x,
                self.origin.1,
            ),
            _ => Envelope::empty(),
        }
    }

    /// CRS-space envelope of a single tile. `None` if its zoom is undefined.
    pub fn tile_envelope(&self, tile: &TileCoordinate) -> Option<Envelope> {
        let (span_x, span_y) = self.tile_span(tile.zoom)?;
        let min_x = self.origin.0 + tile.col as f64 * span_x;
        let max_y = self.origin.1 - tile.row as f64 * span_y;
        Some(Envelope::new(min_x, max_y - span_y, min_x + span_x, max_y))
    }

    /// Project `envelope` onto the tile indices of `zoom`.
    ///
    /// Every tile the envelope touches is included and the result is clamped
    /// to the matrix. An envelope outside the matrix extent, an empty
    /// envelope, or an undefined zoom yields an empty subset.
    pub fn tile_coverage(&self, envelope: &Envelope, zoom: u32) -> GridSubset {
        let (Some(level), Some((span_x, span_y))) = (self.level(zoom), self.tile_span(zoom))
        else {
            return GridSubset::empty(zoom);
        };
        if envelope.is_empty() {
            return GridSubset::empty(zoom);
        }

        let (min_col, max_col) = axis_range(
            (envelope.min_x - self.origin.0) / span_x,
            (envelope.max_x - self.origin.0) / span_x,
            level.matrix_width,
        );
        let (min_row, max_row) = axis_range(
            (self.origin.1 - envelope.max_y) / span_y,
            (self.origin.1 - envelope.min_y) / span_y,
            level.matrix_height,
        );

        match (min_col, max_col, min_row, max_row) {
            (Some(min_col), Some(max_col), Some(min_row), Some(max_row)) => {
                GridSubset::new(zoom, min_col, max_col, min_row, max_row)
            }
            _ => GridSubset::empty(zoom),
        }
    }

    /// Widest contiguous zoom range whose scale denominators fall within
    /// `[scale_min, scale_max]`.
    ///
    /// `scale_min <= 0` imposes no lower bound and an infinite `scale_max`
    /// imposes no upper bound, so `(0, inf)` selects every level. When no
    /// level matches the result is [`ZoomRange::empty`]; callers treat that
    /// as "no applicable zoom levels", not as an error.
    pub fn zoom_range_for_scale(&self, scale_min: f64, scale_max: f64) -> ZoomRange {
        let lower = scale_min * (1.0 - SCALE_TOLERANCE);
        let upper = scale_max * (1.0 + SCALE_TOLERANCE);

        // Scales strictly decrease with zoom, so matches are contiguous
        let mut matching = self
            .levels
            .iter()
            .filter(|l| l.scale_denominator >= lower && l.scale_denominator <= upper)
            .map(|l| l.zoom);

        match matching.next() {
            Some(start) => ZoomRange::new(start, matching.last().unwrap_or(start)),
            None => ZoomRange::empty(),
        }
    }
}

/// Inclusive tile index range along one axis for fractional tile offsets
/// `lo..hi`, clamped to `[0, size)`. Each side is `None` when the range
/// misses the matrix entirely.
fn axis_range(lo: f64, hi: f64, size: u32) -> (Option<u32>, Option<u32>) {
    let first = (lo + EDGE_EPSILON).floor();
    // A degenerate envelope on a tile edge still touches the tile after it
    let last = ((hi - EDGE_EPSILON).ceil() - 1.0).max(first);

    if !first.is_finite() || !last.is_finite() || last < 0.0 || first >= size as f64 {
        return (None, None);
    }

    let max_index = (size - 1) as f64;
    (
        Some(first.clamp(0.0, max_index) as u32),
        Some(last.clamp(0.0, max_index) as u32),
    )
}

/// Shared handle to a matrix set.
pub type SharedGridMatrixSet = Arc<GridMatrixSet>;
