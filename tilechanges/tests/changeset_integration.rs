//! Integration tests for the change tracking pipeline.
//!
//! These tests drive the public API end to end:
//! - checkpoint store → modified areas → resolver → tile enumeration
//! - file-backed persistence across service instances
//! - concurrent writers on one collection
//!
//! Run with: `cargo test --test changeset_integration`

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use geo::{polygon, Geometry, MultiPolygon, Polygon};

use tilechanges::grid::GridLevel;
use tilechanges::{
    BuiltinReprojector, ChangesRequest, ChangesetService, CheckpointRef, CheckpointStore, Crs,
    Envelope, FileBackend, GridMatrixSet, GridSetRegistry, GridSubset, MemoryBackend,
    ScaleRange, SpatialFilter, TileCoordinate, TileEnumerator, ZoomRange,
};

// ============================================================================
// Helper Functions
// ============================================================================

fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Polygon<f64> {
    polygon![
        (x: min_x, y: min_y),
        (x: max_x, y: min_y),
        (x: max_x, y: max_y),
        (x: min_x, y: max_y),
    ]
}

/// Geographic set with two levels: 2×1 tiles of 180° at z0, 4×2 tiles of 90° at z1.
fn two_level_set() -> GridMatrixSet {
    let crs84 = GridMatrixSet::world_crs84_quad();
    let levels: Vec<GridLevel> = crs84.levels()[..2].to_vec();
    GridMatrixSet::new("TwoLevelQuad", Crs::WGS84, crs84.origin(), levels).unwrap()
}

fn service_with(store: CheckpointStore) -> ChangesetService {
    let gridsets = GridSetRegistry::with_builtins();
    gridsets.register(two_level_set());
    ChangesetService::new(
        Arc::new(store),
        Arc::new(gridsets),
        Arc::new(BuiltinReprojector::new()),
    )
    .unwrap()
}

fn memory_service() -> ChangesetService {
    let service = service_with(CheckpointStore::new(Arc::new(MemoryBackend::new())));
    service.register_collection("roads");
    service
}

/// The six tiles covered by `{z0, cols 0..=1, row 0}` and `{z1, cols 1..=2, rows 0..=1}`.
fn two_level_tiles() -> Vec<TileCoordinate> {
    vec![
        TileCoordinate::new(0, 0, 0),
        TileCoordinate::new(1, 0, 0),
        TileCoordinate::new(1, 0, 1),
        TileCoordinate::new(2, 0, 1),
        TileCoordinate::new(1, 1, 1),
        TileCoordinate::new(2, 1, 1),
    ]
}

// ============================================================================
// Enumeration
// ============================================================================

#[test]
fn test_two_level_enumeration_order() {
    let subsets = vec![GridSubset::new(0, 0, 1, 0, 0), GridSubset::new(1, 1, 2, 0, 1)];
    let tiles: Vec<TileCoordinate> = TileEnumerator::new(subsets, ZoomRange::new(0, 1)).collect();
    assert_eq!(tiles, two_level_tiles());
}

#[test]
fn test_two_level_changeset_through_service() {
    let service = memory_service();
    service
        .record_change("roads", rect(-90.0, -90.0, 90.0, 90.0).into(), Crs::WGS84)
        .unwrap();

    let outcome = service
        .changes(&ChangesRequest::new("roads", "TwoLevelQuad"))
        .unwrap();
    let changeset = outcome.into_changeset().unwrap();

    assert_eq!(changeset.zoom_range(), ZoomRange::new(0, 1));
    assert_eq!(changeset.tiles().collect::<Vec<_>>(), two_level_tiles());
    assert_eq!(changeset.summary().change_count, 6);
    assert_eq!(changeset.tiles().count_by_zoom().get(&0), Some(&2));
    assert_eq!(changeset.tiles().count_by_zoom().get(&1), Some(&4));
}

#[test]
fn test_overlapping_changes_are_reported_once() {
    let service = memory_service();
    service
        .record_change("roads", rect(-90.0, -90.0, 0.0, 90.0).into(), Crs::WGS84)
        .unwrap();
    service
        .record_change("roads", rect(-10.0, -90.0, 90.0, 90.0).into(), Crs::WGS84)
        .unwrap();

    let changeset = service
        .changes(&ChangesRequest::new("roads", "TwoLevelQuad"))
        .unwrap()
        .into_changeset()
        .unwrap();

    let tiles: Vec<TileCoordinate> = changeset.tiles().collect();
    assert_eq!(tiles, two_level_tiles());
    assert_eq!(changeset.summary().extent.len(), 2);
}

#[test]
fn test_clip_box_and_scale_range_narrow_the_changeset() {
    let service = memory_service();
    service
        .record_change("roads", rect(-90.0, -90.0, 90.0, 90.0).into(), Crs::WGS84)
        .unwrap();

    let z1_scale = two_level_set().levels()[1].scale_denominator;
    let request = ChangesRequest::new("roads", "TwoLevelQuad")
        .with_scale_range(ScaleRange::new(0.0, z1_scale).unwrap())
        .with_clip_boxes(vec![Envelope::new(0.0, 0.0, 90.0, 90.0)]);
    let changeset = service.changes(&request).unwrap().into_changeset().unwrap();

    assert_eq!(changeset.zoom_range(), ZoomRange::new(1, 1));
    assert_eq!(
        changeset.tiles().collect::<Vec<_>>(),
        vec![TileCoordinate::new(2, 0, 1)]
    );
}

// ============================================================================
// Checkpoints
// ============================================================================

#[test]
fn test_initial_query_returns_recorded_footprint() {
    let store = CheckpointStore::new(Arc::new(MemoryBackend::new()));
    let footprint = MultiPolygon::new(vec![rect(1.0, 2.0, 3.0, 4.0)]);
    let id = store
        .add_checkpoint("roads", Geometry::MultiPolygon(footprint.clone()))
        .unwrap();

    let areas = store
        .get_modified_areas("roads", &CheckpointRef::Initial, None)
        .unwrap();
    assert_eq!(areas.len(), 1);
    assert_eq!(areas[0].checkpoint_id, id);
    assert_eq!(areas[0].footprint, footprint);
}

#[test]
fn test_latest_follows_every_add() {
    let store = CheckpointStore::new(Arc::new(MemoryBackend::new()));
    assert_eq!(
        store.get_latest_checkpoint("roads").unwrap(),
        CheckpointRef::Initial
    );

    for i in 0..5 {
        let x = i as f64;
        let id = store
            .add_checkpoint("roads", rect(x, 0.0, x + 1.0, 1.0).into())
            .unwrap();
        assert_eq!(
            store.get_latest_checkpoint("roads").unwrap(),
            CheckpointRef::Id(id.clone())
        );
        assert!(store
            .get_modified_areas("roads", &CheckpointRef::Id(id), None)
            .unwrap()
            .is_empty());
    }
}

#[test]
fn test_spatial_filter_through_service() {
    let service = memory_service();
    let since = service
        .record_change("roads", rect(-170.0, -80.0, -160.0, -70.0).into(), Crs::WGS84)
        .unwrap();
    service
        .record_change("roads", rect(100.0, 10.0, 110.0, 20.0).into(), Crs::WGS84)
        .unwrap();
    service
        .record_change("roads", rect(-170.0, 10.0, -160.0, 20.0).into(), Crs::WGS84)
        .unwrap();

    let request = ChangesRequest::new("roads", "TwoLevelQuad")
        .with_checkpoint(CheckpointRef::Id(since))
        .with_spatial_filter(SpatialFilter::new(
            rect(90.0, 0.0, 180.0, 90.0),
            Crs::WGS84,
        ));
    let changeset = service.changes(&request).unwrap().into_changeset().unwrap();

    assert_eq!(
        changeset.tiles().collect::<Vec<_>>(),
        vec![TileCoordinate::new(1, 0, 0), TileCoordinate::new(3, 0, 1)]
    );
}

#[test]
fn test_concurrent_writers() {
    let service = Arc::new(memory_service());
    let writers = 4;
    let per_writer = 20;

    thread::scope(|scope| {
        for w in 0..writers {
            let service = Arc::clone(&service);
            scope.spawn(move || {
                for i in 0..per_writer {
                    let x = ((w * per_writer + i) % 170) as f64;
                    service
                        .record_change("roads", rect(x, 0.0, x + 1.0, 1.0).into(), Crs::WGS84)
                        .unwrap();
                }
            });
        }
    });

    let records = service.store().list_checkpoints("roads").unwrap();
    assert_eq!(records.len(), writers * per_writer);
    let ids: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids.len(), records.len());
    for pair in records.windows(2) {
        assert!((pair[0].timestamp, pair[0].sequence) < (pair[1].timestamp, pair[1].sequence));
    }

    let latest = service.latest_checkpoint("roads").unwrap();
    assert_eq!(latest.as_str(), records[records.len() - 1].id);
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_file_backed_service_survives_restart() {
    let temp = tempfile::TempDir::new().unwrap();

    let first = {
        let backend = FileBackend::open(temp.path()).unwrap();
        let service = service_with(CheckpointStore::new(Arc::new(backend)));
        service.register_collection("roads");
        let first = service
            .record_change("roads", rect(-90.0, -90.0, 0.0, 0.0).into(), Crs::WGS84)
            .unwrap();
        service
            .record_change("roads", rect(0.0, 0.0, 90.0, 90.0).into(), Crs::WGS84)
            .unwrap();
        first
    };

    let backend = FileBackend::open(temp.path()).unwrap();
    let service = service_with(CheckpointStore::new(Arc::new(backend)));
    assert!(service.is_registered("roads"));

    let request = ChangesRequest::new("roads", "TwoLevelQuad")
        .with_checkpoint(CheckpointRef::Id(first));
    let changeset = service.changes(&request).unwrap().into_changeset().unwrap();
    assert_eq!(
        changeset.tiles().collect::<Vec<_>>(),
        vec![TileCoordinate::new(1, 0, 0), TileCoordinate::new(2, 0, 1)]
    );

    assert!(service.remove_collection("roads").unwrap());
    assert!(service.store().collections().unwrap().is_empty());
}
