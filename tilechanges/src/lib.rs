//! TileChanges - find the cached tiles made stale by data edits
//!
//! This library records the footprints of changes to tiled collections as
//! checkpoints, and answers "which tiles of this tile matrix set changed since
//! checkpoint X?" as a deduplicated, ordered stream of tile coordinates plus a
//! summary suitable for a tile cache or a packaging layer.

pub mod changeset;
pub mod config;
pub mod enumerate;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod logging;
pub mod resolver;
pub mod store;

pub use changeset::{
    ChangeSummary, Changeset, ChangesRequest, ChangesetOutcome, ChangesetService, ExtentEntry,
    ScaleRange,
};
pub use enumerate::TileEnumerator;
pub use error::{ChangesError, ChangesResult, ErrorKind};
pub use geometry::{BuiltinReprojector, Crs, Envelope, Reprojector};
pub use grid::{GridMatrixSet, GridSetRegistry, GridSubset, TileCoordinate, ZoomRange};
pub use resolver::ModifiedRegionResolver;
pub use store::{CheckpointRef, CheckpointStore, FileBackend, MemoryBackend, SpatialFilter};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
