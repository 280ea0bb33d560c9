//! Change queries: which tiles of a tile matrix set changed since a checkpoint.
//!
//! [`ChangesetService`] ties the pieces together:
//!
//! ```text
//! ChangesRequest
//!     │ validate, look up collection and tile matrix set
//!     ▼
//! CheckpointStore::modified_areas_snapshot ──► footprints (native CRS)
//!     │
//!     ▼
//! GridMatrixSet::zoom_range_for_scale ──► zoom levels
//!     │
//!     ▼
//! ModifiedRegionResolver ──► grid subsets (gridset CRS)
//!     │
//!     ▼
//! TileEnumerator ──► distinct tile count, tile stream
//! ```
//!
//! A query that finds nothing to report returns
//! [`ChangesetOutcome::NotModified`] rather than an error.

mod types;

pub use types::{
    ChangeSummary, Changeset, ChangesRequest, ChangesetOutcome, ExtentEntry, ScaleRange,
};

use std::collections::BTreeSet;
use std::sync::Arc;

use geo::{Geometry, MultiPolygon};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::enumerate::TileEnumerator;
use crate::error::{ChangesError, ChangesResult};
use crate::geometry::{normalize_footprint, Crs, Envelope, GeometryError, Reprojector};
use crate::grid::GridSetRegistry;
use crate::resolver::ModifiedRegionResolver;
use crate::store::{CheckpointRef, CheckpointStore};

/// Records changes and answers change queries for a set of collections.
pub struct ChangesetService {
    store: Arc<CheckpointStore>,
    resolver: ModifiedRegionResolver,
    gridsets: Arc<GridSetRegistry>,
    reprojector: Arc<dyn Reprojector>,
    collections: RwLock<BTreeSet<String>>,
}

impl ChangesetService {
    /// Create a service over `store`.
    ///
    /// Collections that already have stored checkpoints are registered.
    pub fn new(
        store: Arc<CheckpointStore>,
        gridsets: Arc<GridSetRegistry>,
        reprojector: Arc<dyn Reprojector>,
    ) -> ChangesResult<Self> {
        let known: BTreeSet<String> = store.collections()?.into_iter().collect();
        debug!(
            collections = known.len(),
            backend = store.backend_name(),
            "Changeset service ready"
        );
        Ok(Self {
            store,
            resolver: ModifiedRegionResolver::new(Arc::clone(&reprojector)),
            gridsets,
            reprojector,
            collections: RwLock::new(known),
        })
    }

    pub fn store(&self) -> &Arc<CheckpointStore> {
        &self.store
    }

    pub fn gridsets(&self) -> &Arc<GridSetRegistry> {
        &self.gridsets
    }

    /// Make a collection known. Returns `false` if it already was.
    pub fn register_collection(&self, collection_id: &str) -> bool {
        let added = self.collections.write().insert(collection_id.to_string());
        if added {
            info!(collection = collection_id, "Registered collection");
        }
        added
    }

    /// Forget a collection and drop its stored checkpoints.
    ///
    /// Returns whether the collection was known. If the store fails the
    /// collection stays registered.
    pub fn remove_collection(&self, collection_id: &str) -> ChangesResult<bool> {
        self.store.remove_collection(collection_id)?;
        let known = self.collections.write().remove(collection_id);
        if known {
            info!(collection = collection_id, "Removed collection");
        }
        Ok(known)
    }

    pub fn is_registered(&self, collection_id: &str) -> bool {
        self.collections.read().contains(collection_id)
    }

    /// Registered collection ids, sorted.
    pub fn collections(&self) -> Vec<String> {
        self.collections.read().iter().cloned().collect()
    }

    /// Record a change to a registered collection.
    ///
    /// `geometry` is given in `crs` and stored in the store's native frame.
    pub fn record_change(
        &self,
        collection_id: &str,
        geometry: Geometry<f64>,
        crs: Crs,
    ) -> ChangesResult<String> {
        self.require_collection(collection_id)?;
        let footprint = normalize_footprint(geometry)?;
        if footprint.0.is_empty() {
            return Err(GeometryError::EmptyFootprint.into());
        }
        let native = self
            .reprojector
            .reproject(&footprint, crs, self.store.native_crs())?;
        self.store.add_checkpoint(collection_id, native.into())
    }

    /// Latest checkpoint of a registered collection, or `INITIAL`.
    pub fn latest_checkpoint(&self, collection_id: &str) -> ChangesResult<CheckpointRef> {
        self.require_collection(collection_id)?;
        self.store.get_latest_checkpoint(collection_id)
    }

    /// Run a change query.
    ///
    /// Unknown collections, checkpoints and tile matrix sets are `NotFound`
    /// errors. No modified area, no zoom level in the scale range, or no
    /// covered tile all yield [`ChangesetOutcome::NotModified`].
    pub fn changes(&self, request: &ChangesRequest) -> ChangesResult<ChangesetOutcome> {
        request.scale_range.validate()?;
        let collection_id = request.collection_id.as_str();
        self.require_collection(collection_id)?;

        let gridset = self.gridsets.get(&request.tile_matrix_set_id).ok_or_else(|| {
            ChangesError::UnknownTileMatrixSet(request.tile_matrix_set_id.clone())
        })?;

        let (areas, latest) = self.store.modified_areas_snapshot(
            collection_id,
            &request.checkpoint,
            request.spatial_filter.as_ref(),
        )?;
        let latest = latest.to_string();

        if areas.is_empty() {
            debug!(collection = collection_id, since = %request.checkpoint, "No modified areas");
            return Ok(ChangesetOutcome::NotModified {
                checkpoint_id: latest,
            });
        }

        let zoom_range = gridset
            .zoom_range_for_scale(request.scale_range.min, request.scale_range.max);
        if zoom_range.is_empty() {
            debug!(
                gridset = gridset.id(),
                scale_range = %request.scale_range,
                "No zoom level within scale range"
            );
            return Ok(ChangesetOutcome::NotModified {
                checkpoint_id: latest,
            });
        }

        let footprints: Vec<MultiPolygon<f64>> =
            areas.into_iter().map(|area| area.footprint).collect();
        let projected = self
            .resolver
            .reproject_all(&footprints, self.store.native_crs(), gridset.crs())
            .inspect_err(|e| warn!(error = %e, gridset = gridset.id(), "Reprojection failed"))?;

        let subsets = self.resolver.resolve(
            &projected,
            &gridset,
            request.clip_boxes.as_deref(),
            zoom_range,
        );
        let change_count = TileEnumerator::new(subsets.iter().copied(), zoom_range).total_count();
        if change_count == 0 {
            debug!(collection = collection_id, "Modified areas cover no tiles");
            return Ok(ChangesetOutcome::NotModified {
                checkpoint_id: latest,
            });
        }

        let crs = gridset.crs().identifier();
        let extent = projected
            .iter()
            .map(Envelope::from_multi_polygon)
            .filter(|envelope| !envelope.is_empty())
            .map(|envelope| ExtentEntry {
                bbox: envelope.to_bbox(),
                crs: crs.clone(),
            })
            .collect();

        info!(
            collection = collection_id,
            since = %request.checkpoint,
            gridset = gridset.id(),
            zoom_range = %zoom_range,
            tiles = change_count,
            "Computed changeset"
        );

        Ok(ChangesetOutcome::Modified(Changeset {
            summary: ChangeSummary {
                checkpoint_id: latest,
                change_count,
                extent,
                scale_range: request.scale_range,
            },
            gridset,
            subsets,
            zoom_range,
        }))
    }

    fn require_collection(&self, collection_id: &str) -> ChangesResult<()> {
        if self.is_registered(collection_id) {
            Ok(())
        } else {
            Err(ChangesError::UnknownCollection(collection_id.to_string()))
        }
    }
}

impl std::fmt::Debug for ChangesetService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangesetService")
            .field("store", &self.store)
            .field("collections", &self.collections.read().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::geometry::BuiltinReprojector;
    use crate::grid::{GridMatrixSet, TileCoordinate};
    use crate::store::{Checkpoint, CheckpointBackend, MemoryBackend, SpatialFilter, StorageError};
    use chrono::Utc;
    use geo::{polygon, Polygon};
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Backend that commits one extra record right after the first snapshot
    /// is taken, as a concurrent writer would.
    struct LateWriterBackend {
        inner: MemoryBackend,
        fired: AtomicBool,
    }

    impl CheckpointBackend for LateWriterBackend {
        fn name(&self) -> &'static str {
            "late-writer"
        }

        fn append(&self, record: &Checkpoint) -> Result<(), StorageError> {
            self.inner.append(record)
        }

        fn records(&self, collection_id: &str) -> Result<Vec<Checkpoint>, StorageError> {
            let snapshot = self.inner.records(collection_id)?;
            if let Some(last) = snapshot.last() {
                if !self.fired.swap(true, Ordering::SeqCst) {
                    self.inner.append(&Checkpoint {
                        id: "late".to_string(),
                        collection_id: collection_id.to_string(),
                        timestamp: Utc::now().max(last.timestamp),
                        sequence: last.sequence + 1,
                        footprint: MultiPolygon::new(vec![square(20.0, 20.0, 1.0)]),
                    })?;
                }
            }
            Ok(snapshot)
        }

        fn latest(&self, collection_id: &str) -> Result<Option<Checkpoint>, StorageError> {
            self.inner.latest(collection_id)
        }

        fn remove(&self, collection_id: &str) -> Result<bool, StorageError> {
            self.inner.remove(collection_id)
        }

        fn collections(&self) -> Result<Vec<String>, StorageError> {
            self.inner.collections()
        }
    }

    /// Backend whose deletes always fail.
    struct ReadOnlyBackend {
        inner: MemoryBackend,
    }

    impl CheckpointBackend for ReadOnlyBackend {
        fn name(&self) -> &'static str {
            "read-only"
        }

        fn append(&self, record: &Checkpoint) -> Result<(), StorageError> {
            self.inner.append(record)
        }

        fn records(&self, collection_id: &str) -> Result<Vec<Checkpoint>, StorageError> {
            self.inner.records(collection_id)
        }

        fn remove(&self, collection_id: &str) -> Result<bool, StorageError> {
            Err(StorageError::io(
                format!("{}.jsonl", collection_id),
                io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
            ))
        }

        fn collections(&self) -> Result<Vec<String>, StorageError> {
            self.inner.collections()
        }
    }

    fn service_over(backend: Arc<dyn CheckpointBackend>) -> ChangesetService {
        let service = ChangesetService::new(
            Arc::new(CheckpointStore::new(backend)),
            Arc::new(GridSetRegistry::with_builtins()),
            Arc::new(BuiltinReprojector::new()),
        )
        .unwrap();
        service.register_collection("roads");
        service
    }

    fn square(x: f64, y: f64, size: f64) -> Polygon<f64> {
        polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
        ]
    }

    fn service() -> ChangesetService {
        let store = Arc::new(CheckpointStore::new(Arc::new(MemoryBackend::new())));
        let service = ChangesetService::new(
            store,
            Arc::new(GridSetRegistry::with_builtins()),
            Arc::new(BuiltinReprojector::new()),
        )
        .unwrap();
        service.register_collection("roads");
        service
    }

    #[test]
    fn test_unknown_collection() {
        let service = service();
        let err = service
            .changes(&ChangesRequest::new("rivers", "WebMercatorQuad"))
            .unwrap_err();
        assert!(matches!(err, ChangesError::UnknownCollection(_)));
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = service
            .record_change("rivers", square(0.0, 0.0, 1.0).into(), Crs::WGS84)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_unknown_tile_matrix_set() {
        let service = service();
        let err = service
            .changes(&ChangesRequest::new("roads", "NoSuchGrid"))
            .unwrap_err();
        assert!(matches!(err, ChangesError::UnknownTileMatrixSet(_)));
    }

    #[test]
    fn test_unknown_checkpoint() {
        let service = service();
        service
            .record_change("roads", square(0.0, 0.0, 1.0).into(), Crs::WGS84)
            .unwrap();
        let request = ChangesRequest::new("roads", "WebMercatorQuad")
            .with_checkpoint(CheckpointRef::Id("missing".into()));
        let err = service.changes(&request).unwrap_err();
        assert!(matches!(err, ChangesError::UnknownCheckpoint { .. }));
    }

    #[test]
    fn test_invalid_scale_range_is_validation() {
        let service = service();
        let request = ChangesRequest::new("roads", "WebMercatorQuad")
            .with_scale_range(ScaleRange { min: 10.0, max: 1.0 });
        let err = service.changes(&request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_empty_collection_is_not_modified() {
        let service = service();
        let outcome = service
            .changes(&ChangesRequest::new("roads", "WebMercatorQuad"))
            .unwrap();
        assert!(!outcome.is_modified());
        assert_eq!(outcome.checkpoint_id(), "INITIAL");
    }

    #[test]
    fn test_no_changes_after_latest_is_not_modified() {
        let service = service();
        let id = service
            .record_change("roads", square(0.0, 0.0, 1.0).into(), Crs::WGS84)
            .unwrap();
        let request = ChangesRequest::new("roads", "WebMercatorQuad")
            .with_checkpoint(CheckpointRef::Id(id.clone()));
        let outcome = service.changes(&request).unwrap();
        assert!(!outcome.is_modified());
        assert_eq!(outcome.checkpoint_id(), id);
    }

    #[test]
    fn test_scale_range_outside_levels_is_not_modified() {
        let service = service();
        service
            .record_change("roads", square(0.0, 0.0, 1.0).into(), Crs::WGS84)
            .unwrap();
        let request = ChangesRequest::new("roads", "WebMercatorQuad")
            .with_scale_range(ScaleRange::new(1e12, 1e13).unwrap());
        assert!(!service.changes(&request).unwrap().is_modified());
    }

    #[test]
    fn test_clip_outside_changes_is_not_modified() {
        let service = service();
        service
            .record_change("roads", square(10.0, 10.0, 1.0).into(), Crs::WGS84)
            .unwrap();
        let request = ChangesRequest::new("roads", "WorldCRS84Quad")
            .with_clip_boxes(vec![Envelope::new(-50.0, -50.0, -40.0, -40.0)]);
        assert!(!service.changes(&request).unwrap().is_modified());
    }

    #[test]
    fn test_changes_at_coarse_levels() {
        let service = service();
        service
            .record_change("roads", square(10.0, 10.0, 1.0).into(), Crs::WGS84)
            .unwrap();
        let latest = service.latest_checkpoint("roads").unwrap();

        let z1_scale = GridMatrixSet::web_mercator_quad().levels()[1].scale_denominator;
        let request = ChangesRequest::new("roads", "WebMercatorQuad")
            .with_scale_range(ScaleRange::new(z1_scale, f64::INFINITY).unwrap());
        let changeset = service.changes(&request).unwrap().into_changeset().unwrap();

        assert_eq!(changeset.zoom_range().start, 0);
        assert_eq!(changeset.zoom_range().end, 1);
        let tiles: Vec<TileCoordinate> = changeset.tiles().collect();
        assert_eq!(
            tiles,
            vec![TileCoordinate::new(0, 0, 0), TileCoordinate::new(1, 0, 1)]
        );

        let summary = changeset.summary();
        assert_eq!(summary.change_count, 2);
        assert_eq!(summary.checkpoint_id, latest.to_string());
        assert_eq!(summary.extent.len(), 1);
        assert_eq!(summary.extent[0].crs, "EPSG:3857");
        assert!(summary.extent[0].bbox[0] > 1_000_000.0);
    }

    #[test]
    fn test_changes_in_geographic_gridset() {
        let service = service();
        service
            .record_change("roads", square(10.0, 10.0, 1.0).into(), Crs::WGS84)
            .unwrap();
        let z0_scale = GridMatrixSet::world_crs84_quad().levels()[0].scale_denominator;
        let request = ChangesRequest::new("roads", "WorldCRS84Quad")
            .with_scale_range(ScaleRange::new(z0_scale, z0_scale).unwrap());
        let changeset = service.changes(&request).unwrap().into_changeset().unwrap();

        // z0 is two 180 degree tiles; the eastern one changed
        assert_eq!(
            changeset.tiles().collect::<Vec<_>>(),
            vec![TileCoordinate::new(1, 0, 0)]
        );
        assert_eq!(changeset.summary().extent[0].crs, "OGC:1.3:CRS84");
        assert_eq!(changeset.summary().extent[0].bbox, [10.0, 10.0, 11.0, 11.0]);
    }

    #[test]
    fn test_spatial_filter_limits_changes() {
        let service = service();
        service
            .record_change("roads", square(10.0, 10.0, 1.0).into(), Crs::WGS84)
            .unwrap();
        service
            .record_change("roads", square(-100.0, -10.0, 1.0).into(), Crs::WGS84)
            .unwrap();

        let z0_scale = GridMatrixSet::world_crs84_quad().levels()[0].scale_denominator;
        let request = ChangesRequest::new("roads", "WorldCRS84Quad")
            .with_scale_range(ScaleRange::new(z0_scale, f64::INFINITY).unwrap())
            .with_spatial_filter(SpatialFilter::new(square(0.0, 0.0, 50.0), Crs::WGS84));
        let changeset = service.changes(&request).unwrap().into_changeset().unwrap();
        assert_eq!(changeset.summary().extent.len(), 1);
        assert_eq!(changeset.summary().change_count, 1);
    }

    #[test]
    fn test_record_change_reprojects_into_native_frame() {
        let service = service();
        // About 1 degree square around the origin, in Web Mercator meters
        service
            .record_change(
                "roads",
                square(0.0, 0.0, 111_319.49).into(),
                Crs::WEB_MERCATOR,
            )
            .unwrap();
        let records = service.store().list_checkpoints("roads").unwrap();
        let envelope = Envelope::from_multi_polygon(&records[0].footprint);
        assert!((envelope.max_x - 1.0).abs() < 1e-6);
        assert!((envelope.max_y - 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_remove_collection_drops_history() {
        let service = service();
        service
            .record_change("roads", square(0.0, 0.0, 1.0).into(), Crs::WGS84)
            .unwrap();
        assert!(service.remove_collection("roads").unwrap());
        assert!(!service.is_registered("roads"));
        assert!(service.store().list_checkpoints("roads").unwrap().is_empty());
        assert!(!service.remove_collection("roads").unwrap());
    }

    #[test]
    fn test_write_after_snapshot_is_reported_next_time() {
        let service = service_over(Arc::new(LateWriterBackend {
            inner: MemoryBackend::new(),
            fired: AtomicBool::new(false),
        }));
        let first = service
            .record_change("roads", square(10.0, 10.0, 1.0).into(), Crs::WGS84)
            .unwrap();

        let outcome = service
            .changes(&ChangesRequest::new("roads", "WorldCRS84Quad"))
            .unwrap();
        assert!(outcome.is_modified());
        assert_eq!(outcome.checkpoint_id(), first);

        let request = ChangesRequest::new("roads", "WorldCRS84Quad")
            .with_checkpoint(CheckpointRef::Id(first));
        let outcome = service.changes(&request).unwrap();
        assert!(outcome.is_modified());
        assert_eq!(outcome.checkpoint_id(), "late");
        assert_eq!(
            outcome.changeset().map(|c| c.summary().extent[0].bbox),
            Some([20.0, 20.0, 21.0, 21.0])
        );
    }

    #[test]
    fn test_failed_remove_keeps_collection_registered() {
        let service = service_over(Arc::new(ReadOnlyBackend {
            inner: MemoryBackend::new(),
        }));
        service
            .record_change("roads", square(0.0, 0.0, 1.0).into(), Crs::WGS84)
            .unwrap();

        let err = service.remove_collection("roads").unwrap_err();
        assert!(matches!(err, ChangesError::Storage(_)));
        assert!(service.is_registered("roads"));
        assert!(service
            .changes(&ChangesRequest::new("roads", "WebMercatorQuad"))
            .unwrap()
            .is_modified());
    }

    #[test]
    fn test_new_registers_stored_collections() {
        let store = Arc::new(CheckpointStore::new(Arc::new(MemoryBackend::new())));
        store
            .add_checkpoint("water", square(0.0, 0.0, 1.0).into())
            .unwrap();
        let service = ChangesetService::new(
            store,
            Arc::new(GridSetRegistry::with_builtins()),
            Arc::new(BuiltinReprojector::new()),
        )
        .unwrap();
        assert_eq!(service.collections(), vec!["water"]);
    }
}
