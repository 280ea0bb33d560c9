//! Top-level error type for change queries.

use thiserror::Error;

use crate::geometry::{GeometryError, ReprojectError};
use crate::grid::GridError;
use crate::store::StorageError;

/// How a failure should be surfaced to a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input; the caller can fix the request.
    Validation,
    /// A referenced collection, checkpoint or tile matrix set does not exist.
    NotFound,
    /// Reprojection or storage failure; not the caller's fault.
    Internal,
}

/// Errors raised while recording or querying changes.
#[derive(Debug, Error)]
pub enum ChangesError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Unknown checkpoint '{checkpoint}' for collection {collection}")]
    UnknownCheckpoint {
        collection: String,
        checkpoint: String,
    },

    #[error("Unknown tile matrix set: {0}")]
    UnknownTileMatrixSet(String),

    #[error("Invalid geometry: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Invalid tile matrix set: {0}")]
    Grid(#[from] GridError),

    #[error("Reprojection failed: {0}")]
    Reproject(#[from] ReprojectError),

    #[error("Checkpoint storage failed: {0}")]
    Storage(#[from] StorageError),
}

impl ChangesError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChangesError::Validation(_) | ChangesError::Geometry(_) | ChangesError::Grid(_) => {
                ErrorKind::Validation
            }
            ChangesError::UnknownCollection(_)
            | ChangesError::UnknownCheckpoint { .. }
            | ChangesError::UnknownTileMatrixSet(_) => ErrorKind::NotFound,
            ChangesError::Reproject(_) | ChangesError::Storage(_) => ErrorKind::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

pub type ChangesResult<T> = Result<T, ChangesError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Crs;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            ChangesError::Validation("min > max".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            ChangesError::UnknownCheckpoint {
                collection: "roads".into(),
                checkpoint: "abc".into()
            }
            .kind(),
            ErrorKind::NotFound
        );
        assert!(ChangesError::UnknownTileMatrixSet("Foo".into()).is_not_found());
        assert_eq!(
            ChangesError::from(ReprojectError::Unsupported {
                from: Crs::epsg(4326),
                to: Crs::epsg(2154),
            })
            .kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_display() {
        let err = ChangesError::UnknownCheckpoint {
            collection: "roads".into(),
            checkpoint: "abc".into(),
        };
        assert_eq!(
            err.to_string(),
            "Unknown checkpoint 'abc' for collection roads"
        );
    }
}
