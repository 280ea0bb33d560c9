//! Value types describing tile grids and tile index ranges.

use std::cmp::Ordering;
use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// One resolution tier of a [`GridMatrixSet`](super::GridMatrixSet).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridLevel {
    /// Zoom level; equal to the level's index in its matrix set.
    pub zoom: u32,
    /// Map scale denominator (1:N) at the standard 0.28 mm pixel.
    pub scale_denominator: f64,
    /// Tile width in pixels.
    pub tile_width: u32,
    /// Tile height in pixels.
    pub tile_height: u32,
    /// Number of tile columns.
    pub matrix_width: u32,
    /// Number of tile rows.
    pub matrix_height: u32,
}

impl GridLevel {
    pub fn new(
        zoom: u32,
        scale_denominator: f64,
        tile_width: u32,
        tile_height: u32,
        matrix_width: u32,
        matrix_height: u32,
    ) -> Self {
        Self {
            zoom,
            scale_denominator,
            tile_width,
            tile_height,
            matrix_width,
            matrix_height,
        }
    }

    /// Total number of tiles at this level.
    pub fn tile_count(&self) -> u64 {
        self.matrix_width as u64 * self.matrix_height as u64
    }
}

/// A rectangle of tile indices at one zoom level, bounds inclusive.
///
/// A subset with `min_col > max_col` or `min_row > max_row` is empty and
/// covers nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridSubset {
    pub zoom: u32,
    pub min_col: u32,
    pub max_col: u32,
    pub min_row: u32,
    pub max_row: u32,
}

impl GridSubset {
    pub fn new(zoom: u32, min_col: u32, max_col: u32, min_row: u32, max_row: u32) -> Self {
        Self {
            zoom,
            min_col,
            max_col,
            min_row,
            max_row,
        }
    }

    /// The canonical empty subset for a zoom level.
    pub fn empty(zoom: u32) -> Self {
        Self {
            zoom,
            min_col: 1,
            max_col: 0,
            min_row: 1,
            max_row: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_col > self.max_col || self.min_row > self.max_row
    }

    /// Whether the tile at `(col, row)` on this subset's zoom is covered.
    #[inline]
    pub fn covers(&self, col: u32, row: u32) -> bool {
        self.covers_row(row) && (self.min_col..=self.max_col).contains(&col)
    }

    #[inline]
    pub fn covers_row(&self, row: u32) -> bool {
        (self.min_row..=self.max_row).contains(&row)
    }

    /// Number of tiles covered.
    pub fn tile_count(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }
        let cols = (self.max_col - self.min_col) as u64 + 1;
        let rows = (self.max_row - self.min_row) as u64 + 1;
        cols * rows
    }
}

impl fmt::Display for GridSubset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "ZL{}[empty]", self.zoom)
        } else {
            write!(
                f,
                "ZL{}[cols {}..={}, rows {}..={}]",
                self.zoom, self.min_col, self.max_col, self.min_row, self.max_row
            )
        }
    }
}

/// Address of a single tile.
///
/// Tiles order by `(zoom, row, col)`, which is the order the
/// [`TileEnumerator`](crate::enumerate::TileEnumerator) emits them in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoordinate {
    /// Column (X, 0 = west)
    pub col: u32,
    /// Row (Y, 0 = north)
    pub row: u32,
    /// Zoom level
    pub zoom: u32,
}

impl TileCoordinate {
    pub fn new(col: u32, row: u32, zoom: u32) -> Self {
        Self { col, row, zoom }
    }
}

impl Ord for TileCoordinate {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.zoom, self.row, self.col).cmp(&(other.zoom, other.row, other.col))
    }
}

impl PartialOrd for TileCoordinate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<(u32, u32, u32)> for TileCoordinate {
    /// Builds from a `(col, row, zoom)` triple.
    fn from((col, row, zoom): (u32, u32, u32)) -> Self {
        Self { col, row, zoom }
    }
}

impl fmt::Display for TileCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.row, self.col)
    }
}

/// A contiguous, inclusive range of zoom levels.
///
/// `start > end` is the explicit empty range: no applicable zoom levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZoomRange {
    pub start: u32,
    pub end: u32,
}

impl ZoomRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn empty() -> Self {
        Self { start: 1, end: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn contains(&self, zoom: u32) -> bool {
        self.start <= zoom && zoom <= self.end
    }

    /// Number of zoom levels in the range.
    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.end - self.start) as usize + 1
        }
    }

    pub fn iter(&self) -> RangeInclusive<u32> {
        self.start..=self.end
    }
}

impl fmt::Display for ZoomRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "ZL[]")
        } else {
            write!(f, "ZL{}..=ZL{}", self.start, self.end)
        }
    }
}
