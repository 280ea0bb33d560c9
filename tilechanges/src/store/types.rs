//! Records kept by the checkpoint store.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use geo::{Geometry, MultiPolygon};
use serde::{Deserialize, Serialize};

use crate::geometry::Crs;

/// Sentinel text for "before the first checkpoint".
pub const INITIAL: &str = "INITIAL";

/// One recorded change: a timestamped footprint in a collection.
///
/// Checkpoints are immutable once written. Within a collection they are
/// totally ordered by `(timestamp, sequence)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Opaque, unique identifier.
    pub id: String,
    pub collection_id: String,
    pub timestamp: DateTime<Utc>,
    /// Insertion ordinal within the collection, starting at 1.
    pub sequence: u64,
    /// Changed area in the store's native reference frame.
    pub footprint: MultiPolygon<f64>,
}

impl Checkpoint {
    /// Compare positions in the collection's checkpoint order.
    pub fn order(&self, other: &Checkpoint) -> Ordering {
        (self.timestamp, self.sequence).cmp(&(other.timestamp, other.sequence))
    }

    /// Whether this checkpoint was recorded strictly after `position`.
    pub fn is_after(&self, position: (DateTime<Utc>, u64)) -> bool {
        (self.timestamp, self.sequence) > position
    }
}

/// Reference point for a change query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CheckpointRef {
    /// Before any checkpoint: every recorded change is "new".
    Initial,
    /// A specific checkpoint id.
    Id(String),
}

impl CheckpointRef {
    pub fn is_initial(&self) -> bool {
        matches!(self, CheckpointRef::Initial)
    }

    /// The checkpoint id, or `INITIAL`.
    pub fn as_str(&self) -> &str {
        match self {
            CheckpointRef::Initial => INITIAL,
            CheckpointRef::Id(id) => id,
        }
    }
}

impl fmt::Display for CheckpointRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckpointRef {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(CheckpointRef::from(s))
    }
}

impl From<&str> for CheckpointRef {
    /// Blank text and `INITIAL` mean [`CheckpointRef::Initial`].
    fn from(s: &str) -> Self {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed == INITIAL {
            CheckpointRef::Initial
        } else {
            CheckpointRef::Id(trimmed.to_string())
        }
    }
}

impl From<String> for CheckpointRef {
    fn from(id: String) -> Self {
        CheckpointRef::from(id.as_str())
    }
}

/// A changed footprint returned by a modified-areas query.
#[derive(Debug, Clone, PartialEq)]
pub struct ModifiedArea {
    pub checkpoint_id: String,
    pub timestamp: DateTime<Utc>,
    pub footprint: MultiPolygon<f64>,
}

/// Restricts a query to changes intersecting an area.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialFilter {
    pub geometry: Geometry<f64>,
    pub crs: Crs,
}

impl SpatialFilter {
    pub fn new(geometry: impl Into<Geometry<f64>>, crs: Crs) -> Self {
        Self {
            geometry: geometry.into(),
            crs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn checkpoint(secs: i64, sequence: u64) -> Checkpoint {
        Checkpoint {
            id: format!("c{}", sequence),
            collection_id: "roads".to_string(),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            sequence,
            footprint: MultiPolygon::new(vec![]),
        }
    }

    #[test]
    fn test_checkpoint_ref_parse() {
        assert_eq!("INITIAL".parse::<CheckpointRef>().unwrap(), CheckpointRef::Initial);
        assert_eq!("".parse::<CheckpointRef>().unwrap(), CheckpointRef::Initial);
        assert_eq!(
            " abc123 ".parse::<CheckpointRef>().unwrap(),
            CheckpointRef::Id("abc123".to_string())
        );
    }

    #[test]
    fn test_checkpoint_ref_from_owned_and_borrowed_agree() {
        for text in ["INITIAL", "", "  ", "abc123", " abc123 "] {
            assert_eq!(
                CheckpointRef::from(text.to_string()),
                CheckpointRef::from(text),
                "{:?}",
                text
            );
        }
        assert_eq!(CheckpointRef::from("INITIAL".to_string()), CheckpointRef::Initial);
    }

    #[test]
    fn test_checkpoint_ref_display() {
        assert_eq!(CheckpointRef::Initial.to_string(), "INITIAL");
        assert_eq!(CheckpointRef::Id("x".into()).to_string(), "x");
    }

    #[test]
    fn test_order_breaks_ties_by_sequence() {
        let a = checkpoint(100, 1);
        let b = checkpoint(100, 2);
        let c = checkpoint(99, 3);
        assert_eq!(a.order(&b), Ordering::Less);
        assert_eq!(c.order(&a), Ordering::Less);
        assert!(b.is_after((a.timestamp, a.sequence)));
        assert!(!a.is_after((a.timestamp, a.sequence)));
    }

    #[test]
    fn test_checkpoint_serde_roundtrip() {
        let cp = checkpoint(1_700_000_000, 7);
        let json = serde_json::to_string(&cp).unwrap();
        let back: Checkpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cp);
    }
}
