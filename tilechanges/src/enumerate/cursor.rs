//! Row and column skip logic for walking a union of grid subsets.
//!
//! The functions here are pure: given the subsets relevant to a zoom (or to
//! one row of it) and a position, they return the next position that is
//! actually covered. Gaps between subsets are crossed in a single step, so a
//! walk costs the number of covered runs plus the number of gaps, never the
//! bounding-box area.

use crate::grid::GridSubset;

/// Smallest row `>= row` covered by at least one candidate.
///
/// `None` means the zoom level has no covered row at or after `row`.
pub fn next_nonempty_row(candidates: &[GridSubset], row: u64) -> Option<u32> {
    candidates
        .iter()
        .filter(|s| !s.is_empty() && s.max_row as u64 >= row)
        .map(|s| (s.min_row as u64).max(row) as u32)
        .min()
}

/// Next covered run of columns at or after `col`.
///
/// Returns `(start, end)`: `start` is the smallest column `>= col` covered by
/// an active subset, `end` the last column of the widest subset covering
/// `start`. Overlapping subsets may extend the run further; the caller picks
/// that up on its next call at `end + 1`. `None` means the row is exhausted.
pub fn next_covering_col(active: &[GridSubset], col: u64) -> Option<(u32, u32)> {
    let start = active
        .iter()
        .filter(|s| !s.is_empty() && s.max_col as u64 >= col)
        .map(|s| (s.min_col as u64).max(col))
        .min()? as u32;

    let end = active
        .iter()
        .filter(|s| !s.is_empty() && s.min_col <= start && start <= s.max_col)
        .map(|s| s.max_col)
        .max()?;

    Some((start, end))
}

/// Cursor over the covered column runs of a single zoom level.
///
/// Holds the current row, the subsets active on it, and the next column to
/// examine. The active set is rebuilt on every row change; it is never
/// assumed to carry over.
#[derive(Debug, Clone)]
pub(crate) struct ZoomCursor {
    zoom: u32,
    row: u32,
    next_col: u64,
    row_max_col: u32,
    active: Vec<GridSubset>,
}

impl ZoomCursor {
    /// Position on the first covered row of `candidates`.
    pub(crate) fn start(zoom: u32, candidates: &[GridSubset]) -> Option<Self> {
        let row = next_nonempty_row(candidates, 0)?;
        let mut cursor = Self {
            zoom,
            row,
            next_col: 0,
            row_max_col: 0,
            active: Vec::new(),
        };
        cursor.enter_row(candidates, row);
        Some(cursor)
    }

    pub(crate) fn zoom(&self) -> u32 {
        self.zoom
    }

    pub(crate) fn row(&self) -> u32 {
        self.row
    }

    /// Next covered `(row, start_col, end_col)` run, moving to later rows as
    /// rows run out. `None` once the zoom level is exhausted.
    pub(crate) fn next_run(&mut self, candidates: &[GridSubset]) -> Option<(u32, u32, u32)> {
        loop {
            if self.next_col <= self.row_max_col as u64 {
                if let Some((start, end)) = next_covering_col(&self.active, self.next_col) {
                    self.next_col = end as u64 + 1;
                    return Some((self.row, start, end));
                }
            }

            let row = next_nonempty_row(candidates, self.row as u64 + 1)?;
            self.enter_row(candidates, row);
        }
    }

    fn enter_row(&mut self, candidates: &[GridSubset], row: u32) {
        self.row = row;
        self.active.clear();
        self.active.extend(
            candidates
                .iter()
                .filter(|s| !s.is_empty() && s.covers_row(row))
                .copied(),
        );
        self.row_max_col = self.active.iter().map(|s| s.max_col).max().unwrap_or(0);
        self.next_col = self
            .active
            .iter()
            .map(|s| s.min_col as u64)
            .min()
            .unwrap_or(u64::MAX);
    }
}
