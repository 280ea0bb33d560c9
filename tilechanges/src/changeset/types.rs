//! Request and result types of a change query.

use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::enumerate::TileEnumerator;
use crate::error::ChangesError;
use crate::geometry::Envelope;
use crate::grid::{GridSubset, SharedGridMatrixSet, ZoomRange};
use crate::store::{CheckpointRef, SpatialFilter};

/// Inclusive range of map scale denominators.
///
/// The default `(0, inf)` selects every zoom level of a tile matrix set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleRange {
    pub min: f64,
    pub max: f64,
}

impl ScaleRange {
    /// Create a validated range.
    pub fn new(min: f64, max: f64) -> Result<Self, ChangesError> {
        let range = Self { min, max };
        range.validate()?;
        Ok(range)
    }

    /// No lower or upper bound.
    pub fn unbounded() -> Self {
        Self {
            min: 0.0,
            max: f64::INFINITY,
        }
    }

    /// Check bounds are non-negative numbers with `min <= max`.
    pub fn validate(&self) -> Result<(), ChangesError> {
        if self.min.is_nan() || self.max.is_nan() {
            return Err(ChangesError::Validation(
                "scale denominators must be numbers".to_string(),
            ));
        }
        if self.min < 0.0 || self.max < 0.0 {
            return Err(ChangesError::Validation(format!(
                "scale denominators must be non-negative, got {}",
                self
            )));
        }
        if self.min > self.max {
            return Err(ChangesError::Validation(format!(
                "scale range minimum {} exceeds maximum {}",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

impl Default for ScaleRange {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl fmt::Display for ScaleRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.max.is_infinite() {
            write!(f, "{},", self.min)
        } else {
            write!(f, "{},{}", self.min, self.max)
        }
    }
}

impl FromStr for ScaleRange {
    type Err = ChangesError;

    /// Parse `"min,max"`. Either side may be blank: a blank minimum means 0,
    /// a blank maximum means unbounded.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (min, max) = s.split_once(',').ok_or_else(|| {
            ChangesError::Validation(format!(
                "invalid scale range '{}': expected min,max",
                s
            ))
        })?;
        let min = parse_bound(min, 0.0)?;
        let max = parse_bound(max, f64::INFINITY)?;
        Self::new(min, max)
    }
}

fn parse_bound(text: &str, default: f64) -> Result<f64, ChangesError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(default);
    }
    text.parse::<f64>().map_err(|_| {
        ChangesError::Validation(format!("invalid scale denominator '{}'", text))
    })
}

impl Serialize for ScaleRange {
    /// `{"min": .., "max": ..}`; an unbounded maximum is `null`.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ScaleRange", 2)?;
        state.serialize_field("min", &self.min)?;
        let max = if self.max.is_finite() {
            Some(self.max)
        } else {
            None
        };
        state.serialize_field("max", &max)?;
        state.end()
    }
}

/// Parameters of a change query.
#[derive(Debug, Clone)]
pub struct ChangesRequest {
    pub collection_id: String,
    /// Changes strictly after this checkpoint are reported.
    pub checkpoint: CheckpointRef,
    pub scale_range: ScaleRange,
    pub tile_matrix_set_id: String,
    /// Restricts which stored changes are considered.
    pub spatial_filter: Option<SpatialFilter>,
    /// Clip boxes in the tile matrix set's frame.
    pub clip_boxes: Option<Vec<Envelope>>,
}

impl ChangesRequest {
    /// Every change of `collection_id` since `INITIAL`, at all scales.
    pub fn new(collection_id: impl Into<String>, tile_matrix_set_id: impl Into<String>) -> Self {
        Self {
            collection_id: collection_id.into(),
            checkpoint: CheckpointRef::Initial,
            scale_range: ScaleRange::unbounded(),
            tile_matrix_set_id: tile_matrix_set_id.into(),
            spatial_filter: None,
            clip_boxes: None,
        }
    }

    pub fn with_checkpoint(mut self, checkpoint: CheckpointRef) -> Self {
        self.checkpoint = checkpoint;
        self
    }

    pub fn with_scale_range(mut self, scale_range: ScaleRange) -> Self {
        self.scale_range = scale_range;
        self
    }

    pub fn with_spatial_filter(mut self, filter: SpatialFilter) -> Self {
        self.spatial_filter = Some(filter);
        self
    }

    pub fn with_clip_boxes(mut self, clip_boxes: Vec<Envelope>) -> Self {
        self.clip_boxes = Some(clip_boxes);
        self
    }
}

/// Bounding box of one modified area.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtentEntry {
    /// `[min_x, min_y, max_x, max_y]`
    pub bbox: [f64; 4],
    /// `OGC:1.3:CRS84` or `EPSG:<code>`.
    pub crs: String,
}

/// Machine-readable description of a changeset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeSummary {
    /// Latest checkpoint of the collection; the reference for the next query.
    pub checkpoint_id: String,
    /// Number of distinct affected tiles.
    pub change_count: u64,
    pub extent: Vec<ExtentEntry>,
    pub scale_range: ScaleRange,
}

/// Tiles affected by a change query.
#[derive(Debug, Clone)]
pub struct Changeset {
    pub(crate) summary: ChangeSummary,
    pub(crate) gridset: SharedGridMatrixSet,
    pub(crate) subsets: Vec<GridSubset>,
    pub(crate) zoom_range: ZoomRange,
}

impl Changeset {
    pub fn summary(&self) -> &ChangeSummary {
        &self.summary
    }

    pub fn gridset(&self) -> &SharedGridMatrixSet {
        &self.gridset
    }

    /// Grid subsets before deduplication.
    pub fn subsets(&self) -> &[GridSubset] {
        &self.subsets
    }

    pub fn zoom_range(&self) -> ZoomRange {
        self.zoom_range
    }

    /// A fresh pass over the affected tiles, in `(zoom, row, col)` order.
    pub fn tiles(&self) -> TileEnumerator {
        TileEnumerator::new(self.subsets.iter().copied(), self.zoom_range)
    }
}

/// Result of a change query.
#[derive(Debug, Clone)]
pub enum ChangesetOutcome {
    Modified(Changeset),
    /// Nothing to report since the reference checkpoint.
    NotModified {
        /// Latest checkpoint of the collection, or `INITIAL`.
        checkpoint_id: String,
    },
}

impl ChangesetOutcome {
    pub fn is_modified(&self) -> bool {
        matches!(self, ChangesetOutcome::Modified(_))
    }

    /// The changeset, if any tile changed.
    pub fn changeset(&self) -> Option<&Changeset> {
        match self {
            ChangesetOutcome::Modified(changeset) => Some(changeset),
            ChangesetOutcome::NotModified { .. } => None,
        }
    }

    pub fn into_changeset(self) -> Option<Changeset> {
        match self {
            ChangesetOutcome::Modified(changeset) => Some(changeset),
            ChangesetOutcome::NotModified { .. } => None,
        }
    }

    /// Latest checkpoint of the queried collection.
    pub fn checkpoint_id(&self) -> &str {
        match self {
            ChangesetOutcome::Modified(changeset) => &changeset.summary.checkpoint_id,
            ChangesetOutcome::NotModified { checkpoint_id } => checkpoint_id,
        }
    }
}
