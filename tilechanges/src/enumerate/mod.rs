//! Lazy enumeration of the tiles covered by a set of grid subsets.
//!
//! [`TileEnumerator`] walks the union of possibly overlapping, possibly
//! disjoint [`GridSubset`]s and yields every covered [`TileCoordinate`]
//! exactly once, in ascending `(zoom, row, col)` order. It never materializes
//! the tile space: empty rows and columns are skipped in one step rather than
//! scanned, so cost follows the covered tiles, not the bounding box.
//!
//! # State
//!
//! ```text
//!   Idle ──first covered tile──► Positioned(zoom, row, col) ──► Exhausted
//!     │                               │  ▲                          ▲
//!     │                               └──┘ next covered tile        │
//!     └──────────── no non-empty subset in the zoom range ──────────┘
//! ```
//!
//! The enumerator holds no locks and does no I/O. Dropping it mid-way is the
//! only cancellation needed.
//!
//! # Example
//!
//! ```
//! use tilechanges::enumerate::TileEnumerator;
//! use tilechanges::grid::{GridSubset, TileCoordinate, ZoomRange};
//!
//! let subsets = vec![
//!     GridSubset::new(0, 0, 1, 0, 0),
//!     GridSubset::new(1, 1, 2, 0, 1),
//! ];
//! let tiles: Vec<TileCoordinate> =
//!     TileEnumerator::new(subsets, ZoomRange::new(0, 1)).collect();
//! assert_eq!(tiles.len(), 6);
//! assert_eq!(tiles[0], TileCoordinate::new(0, 0, 0));
//! ```

mod cursor;

pub use cursor::{next_covering_col, next_nonempty_row};

use std::collections::BTreeMap;
use std::iter::FusedIterator;

use rayon::prelude::*;

use crate::grid::{GridSubset, TileCoordinate, ZoomRange};
use cursor::ZoomCursor;

/// Non-empty subsets of one zoom level.
#[derive(Debug, Clone)]
struct ZoomGroup {
    zoom: u32,
    subsets: Vec<GridSubset>,
}

#[derive(Debug, Clone)]
enum CursorState {
    Idle,
    Positioned {
        group: usize,
        cursor: ZoomCursor,
        /// Next column to emit on the cursor's row.
        col: u64,
        /// Last column of the run being emitted.
        run_end: u32,
    },
    Exhausted,
}

/// Pull-based iterator over the union of a list of grid subsets.
///
/// Only subsets whose zoom lies in the requested [`ZoomRange`] contribute.
/// Empty or inverted subsets contribute nothing and never cause an error; an
/// empty subset list or an empty zoom range simply yields no tiles.
#[derive(Debug, Clone)]
pub struct TileEnumerator {
    groups: Vec<ZoomGroup>,
    state: CursorState,
}

impl TileEnumerator {
    /// Build an enumerator over `subsets`, restricted to `zoom_range`.
    pub fn new(subsets: impl IntoIterator<Item = GridSubset>, zoom_range: ZoomRange) -> Self {
        let mut by_zoom: BTreeMap<u32, Vec<GridSubset>> = BTreeMap::new();
        if !zoom_range.is_empty() {
            for subset in subsets {
                if !subset.is_empty() && zoom_range.contains(subset.zoom) {
                    by_zoom.entry(subset.zoom).or_default().push(subset);
                }
            }
        }

        let groups = by_zoom
            .into_iter()
            .map(|(zoom, subsets)| ZoomGroup { zoom, subsets })
            .collect();

        Self {
            groups,
            state: CursorState::Idle,
        }
    }

    /// Zoom levels that contribute at least one tile, ascending.
    pub fn zoom_levels(&self) -> Vec<u32> {
        self.groups.iter().map(|g| g.zoom).collect()
    }

    /// Whether the enumeration will yield nothing at all.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of distinct tiles per zoom level, counted in parallel.
    ///
    /// Zoom levels are independent, so each is walked on its own rayon task.
    /// Counting adds whole column runs at a time and does not consume this
    /// enumerator.
    pub fn count_by_zoom(&self) -> BTreeMap<u32, u64> {
        self.groups
            .par_iter()
            .map(|group| (group.zoom, count_group(group)))
            .collect()
    }

    /// Total number of distinct tiles across all zoom levels.
    pub fn total_count(&self) -> u64 {
        self.count_by_zoom().values().sum()
    }

    /// Cursor state positioned on the first covered tile at or after group
    /// `first`.
    fn position_from(&self, first: usize) -> CursorState {
        for (index, group) in self.groups.iter().enumerate().skip(first) {
            let Some(mut cursor) = ZoomCursor::start(group.zoom, &group.subsets) else {
                continue;
            };
            if let Some((_, start, end)) = cursor.next_run(&group.subsets) {
                return CursorState::Positioned {
                    group: index,
                    cursor,
                    col: start as u64,
                    run_end: end,
                };
            }
        }
        CursorState::Exhausted
    }
}

fn count_group(group: &ZoomGroup) -> u64 {
    let Some(mut cursor) = ZoomCursor::start(group.zoom, &group.subsets) else {
        return 0;
    };
    let mut total = 0u64;
    while let Some((_, start, end)) = cursor.next_run(&group.subsets) {
        total += (end - start) as u64 + 1;
    }
    total
}

impl Iterator for TileEnumerator {
    type Item = TileCoordinate;

    fn next(&mut self) -> Option<TileCoordinate> {
        loop {
            let next_group = match &mut self.state {
                CursorState::Exhausted => return None,
                CursorState::Idle => 0,
                CursorState::Positioned {
                    group,
                    cursor,
                    col,
                    run_end,
                } => {
                    if *col <= *run_end as u64 {
                        let tile = TileCoordinate::new(*col as u32, cursor.row(), cursor.zoom());
                        *col += 1;
                        return Some(tile);
                    }
                    match cursor.next_run(&self.groups[*group].subsets) {
                        Some((_, start, end)) => {
                            *col = start as u64;
                            *run_end = end;
                            continue;
                        }
                        None => *group + 1,
                    }
                }
            };
            self.state = self.position_from(next_group);
        }
    }
}

impl FusedIterator for TileEnumerator {}
