//! Checkpoint store: an append-only, per-collection log of changed footprints.
//!
//! Every recorded change becomes a [`Checkpoint`] carrying a timestamp, a
//! per-collection sequence number and the footprint in the store's native
//! reference frame. Queries return the footprints recorded strictly after a
//! reference checkpoint, optionally clipped to a spatial filter.
//!
//! # Concurrency
//!
//! Writers to the same collection are serialized by a per-collection lock, so
//! sequence numbers and timestamps stay strictly ordered under concurrent
//! callers. Writers to different collections never contend. Readers take no
//! store lock and see whatever snapshot the backend hands them.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use geo::{polygon, Geometry};
//! use tilechanges::store::{CheckpointRef, CheckpointStore, MemoryBackend};
//!
//! let store = CheckpointStore::new(Arc::new(MemoryBackend::new()));
//! let footprint = Geometry::Polygon(polygon![
//!     (x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0),
//! ]);
//! let first = store.add_checkpoint("roads", footprint.clone()).unwrap();
//! store.add_checkpoint("roads", footprint).unwrap();
//!
//! let newer = store
//!     .get_modified_areas("roads", &CheckpointRef::Id(first), None)
//!     .unwrap();
//! assert_eq!(newer.len(), 1);
//! ```

mod backend;
mod file;
mod types;

pub use backend::{CheckpointBackend, MemoryBackend, StorageError};
pub use file::FileBackend;
pub use types::{Checkpoint, CheckpointRef, ModifiedArea, SpatialFilter, INITIAL};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use geo::{Area, BooleanOps, Geometry, Intersects, MultiPolygon};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{ChangesError, ChangesResult};
use crate::geometry::{normalize_footprint, BuiltinReprojector, Crs, GeometryError, Reprojector};

/// Bytes of the SHA-256 digest kept in a checkpoint id.
const CHECKPOINT_ID_BYTES: usize = 16;

static ID_NONCE: AtomicU64 = AtomicU64::new(0);

/// Records and queries change checkpoints.
pub struct CheckpointStore {
    backend: Arc<dyn CheckpointBackend>,
    native_crs: Crs,
    reprojector: Arc<dyn Reprojector>,
    write_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CheckpointStore {
    /// Store over `backend` with WGS84 as the native frame.
    pub fn new(backend: Arc<dyn CheckpointBackend>) -> Self {
        Self {
            backend,
            native_crs: Crs::WGS84,
            reprojector: Arc::new(BuiltinReprojector::new()),
            write_locks: DashMap::new(),
        }
    }

    /// Set the reference frame footprints are stored in.
    pub fn with_native_crs(mut self, crs: Crs) -> Self {
        self.native_crs = crs;
        self
    }

    /// Set the reprojector used for spatial filters.
    pub fn with_reprojector(mut self, reprojector: Arc<dyn Reprojector>) -> Self {
        self.reprojector = reprojector;
        self
    }

    pub fn native_crs(&self) -> Crs {
        self.native_crs
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Record a change to `collection_id` and return the new checkpoint id.
    ///
    /// `footprint` must already be in the store's native frame. Polygonal
    /// geometries are normalized to a multipolygon; anything else is rejected.
    pub fn add_checkpoint(
        &self,
        collection_id: &str,
        footprint: Geometry<f64>,
    ) -> ChangesResult<String> {
        let footprint = normalize_footprint(footprint)?;
        if footprint.0.is_empty() {
            return Err(GeometryError::EmptyFootprint.into());
        }

        let lock = self.write_lock(collection_id);
        let _guard = lock.lock();

        let previous = self.backend.latest(collection_id)?;
        let now = Utc::now();
        let (timestamp, sequence) = match &previous {
            // Never step behind the previous record, even if the clock does
            Some(prev) => (now.max(prev.timestamp), prev.sequence + 1),
            None => (now, 1),
        };

        let record = Checkpoint {
            id: checkpoint_id(collection_id, &timestamp, sequence),
            collection_id: collection_id.to_string(),
            timestamp,
            sequence,
            footprint,
        };
        self.backend.append(&record)?;

        info!(
            collection = collection_id,
            checkpoint = %record.id,
            sequence,
            backend = self.backend.name(),
            "Recorded checkpoint"
        );
        Ok(record.id)
    }

    /// Footprints recorded strictly after `reference`, oldest first.
    ///
    /// With a spatial filter, records not intersecting it are dropped and the
    /// rest are clipped to it. An unknown checkpoint id is an error; a
    /// collection with no newer records yields an empty list.
    pub fn get_modified_areas(
        &self,
        collection_id: &str,
        reference: &CheckpointRef,
        spatial_filter: Option<&SpatialFilter>,
    ) -> ChangesResult<Vec<ModifiedArea>> {
        self.modified_areas_snapshot(collection_id, reference, spatial_filter)
            .map(|(areas, _)| areas)
    }

    /// Like [`get_modified_areas`](Self::get_modified_areas), plus the latest
    /// checkpoint of the same read.
    ///
    /// The latest checkpoint is taken before the spatial filter, so it is the
    /// reference under which every returned area has been seen. A writer
    /// committing after the read is never covered by it.
    pub fn modified_areas_snapshot(
        &self,
        collection_id: &str,
        reference: &CheckpointRef,
        spatial_filter: Option<&SpatialFilter>,
    ) -> ChangesResult<(Vec<ModifiedArea>, CheckpointRef)> {
        let mut records = self.backend.records(collection_id)?;
        records.sort_by(|a, b| a.order(b));
        let latest = records
            .last()
            .map_or(CheckpointRef::Initial, |r| CheckpointRef::Id(r.id.clone()));

        let after = match reference {
            CheckpointRef::Initial => None,
            CheckpointRef::Id(id) => {
                let anchor = records.iter().find(|r| &r.id == id).ok_or_else(|| {
                    ChangesError::UnknownCheckpoint {
                        collection: collection_id.to_string(),
                        checkpoint: id.clone(),
                    }
                })?;
                Some((anchor.timestamp, anchor.sequence))
            }
        };

        let filter = spatial_filter
            .map(|f| self.filter_in_native_crs(f))
            .transpose()?;

        let mut areas = Vec::new();
        for record in records {
            if let Some(position) = after {
                if !record.is_after(position) {
                    continue;
                }
            }

            let footprint = match &filter {
                None => record.footprint,
                Some(filter) => {
                    if !record.footprint.intersects(filter) {
                        continue;
                    }
                    let clipped = record.footprint.intersection(filter);
                    if clipped.unsigned_area() <= 0.0 {
                        continue;
                    }
                    clipped
                }
            };

            areas.push(ModifiedArea {
                checkpoint_id: record.id,
                timestamp: record.timestamp,
                footprint,
            });
        }

        debug!(
            collection = collection_id,
            reference = %reference,
            filtered = filter.is_some(),
            count = areas.len(),
            "Collected modified areas"
        );
        Ok((areas, latest))
    }

    /// Id of the most recent checkpoint, or `Initial` when there is none.
    pub fn get_latest_checkpoint(&self, collection_id: &str) -> ChangesResult<CheckpointRef> {
        Ok(match self.backend.latest(collection_id)? {
            Some(record) => CheckpointRef::Id(record.id),
            None => CheckpointRef::Initial,
        })
    }

    /// Every checkpoint of a collection, oldest first.
    pub fn list_checkpoints(&self, collection_id: &str) -> ChangesResult<Vec<Checkpoint>> {
        let mut records = self.backend.records(collection_id)?;
        records.sort_by(|a, b| a.order(b));
        Ok(records)
    }

    /// Collections with stored checkpoints.
    pub fn collections(&self) -> ChangesResult<Vec<String>> {
        Ok(self.backend.collections()?)
    }

    /// Drop every checkpoint of a collection. Returns whether any existed.
    pub fn remove_collection(&self, collection_id: &str) -> ChangesResult<bool> {
        let lock = self.write_lock(collection_id);
        let _guard = lock.lock();
        let removed = self.backend.remove(collection_id)?;
        // Keep the lock while another writer still holds or waits on it
        self.write_locks
            .remove_if(collection_id, |_, held| Arc::strong_count(held) <= 2);
        if removed {
            info!(collection = collection_id, "Removed collection checkpoints");
        }
        Ok(removed)
    }

    fn write_lock(&self, collection_id: &str) -> Arc<Mutex<()>> {
        self.write_locks
            .entry(collection_id.to_string())
            .or_default()
            .value()
            .clone()
    }

    fn filter_in_native_crs(&self, filter: &SpatialFilter) -> ChangesResult<MultiPolygon<f64>> {
        let geometry = normalize_footprint(filter.geometry.clone())?;
        Ok(self
            .reprojector
            .reproject(&geometry, filter.crs, self.native_crs)?)
    }
}

impl std::fmt::Debug for CheckpointStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointStore")
            .field("backend", &self.backend.name())
            .field("native_crs", &self.native_crs)
            .finish()
    }
}

fn checkpoint_id(collection_id: &str, timestamp: &DateTime<Utc>, sequence: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(collection_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(timestamp.timestamp().to_be_bytes());
    hasher.update(timestamp.timestamp_subsec_nanos().to_be_bytes());
    hasher.update(sequence.to_be_bytes());
    hasher.update(std::process::id().to_be_bytes());
    hasher.update(ID_NONCE.fetch_add(1, Ordering::Relaxed).to_be_bytes());
    let digest = hasher.finalize();
    digest[..CHECKPOINT_ID_BYTES]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
