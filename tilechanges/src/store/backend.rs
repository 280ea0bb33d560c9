//! Storage backends for checkpoint records.
//!
//! A backend holds one append-only log of [`Checkpoint`]s per collection.
//! It knows nothing about ordering rules or spatial filtering; the
//! [`CheckpointStore`](super::CheckpointStore) layers those on top and
//! serializes writers per collection, so backends only need to make a single
//! `append` atomic with respect to concurrent readers.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

use parking_lot::RwLock;
use thiserror::Error;

use super::types::Checkpoint;

/// Errors raised by a checkpoint backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem failure.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A record could not be encoded.
    #[error("Failed to encode checkpoint: {0}")]
    Encode(#[from] serde_json::Error),

    /// A persisted record is unreadable and is not a torn trailing write.
    #[error("Corrupt checkpoint log {} at line {line}: {reason}", path.display())]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Append-only per-collection checkpoint log.
pub trait CheckpointBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Append a record to its collection's log, creating the log if needed.
    fn append(&self, record: &Checkpoint) -> Result<(), StorageError>;

    /// Snapshot of every record in a collection, in append order.
    ///
    /// An unknown collection yields an empty list.
    fn records(&self, collection_id: &str) -> Result<Vec<Checkpoint>, StorageError>;

    /// The most recently appended record.
    fn latest(&self, collection_id: &str) -> Result<Option<Checkpoint>, StorageError> {
        Ok(self.records(collection_id)?.pop())
    }

    /// Delete a collection's log. Returns whether anything was removed.
    fn remove(&self, collection_id: &str) -> Result<bool, StorageError>;

    /// Ids of collections that have at least one record.
    fn collections(&self) -> Result<Vec<String>, StorageError>;
}

/// Backend keeping every log in process memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    logs: RwLock<HashMap<String, Vec<Checkpoint>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn append(&self, record: &Checkpoint) -> Result<(), StorageError> {
        self.logs
            .write()
            .entry(record.collection_id.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    fn records(&self, collection_id: &str) -> Result<Vec<Checkpoint>, StorageError> {
        Ok(self
            .logs
            .read()
            .get(collection_id)
            .cloned()
            .unwrap_or_default())
    }

    fn latest(&self, collection_id: &str) -> Result<Option<Checkpoint>, StorageError> {
        Ok(self
            .logs
            .read()
            .get(collection_id)
            .and_then(|log| log.last().cloned()))
    }

    fn remove(&self, collection_id: &str) -> Result<bool, StorageError> {
        Ok(self.logs.write().remove(collection_id).is_some())
    }

    fn collections(&self) -> Result<Vec<String>, StorageError> {
        let mut ids: Vec<String> = self.logs.read().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use geo::MultiPolygon;

    fn record(collection: &str, sequence: u64) -> Checkpoint {
        Checkpoint {
            id: format!("{}-{}", collection, sequence),
            collection_id: collection.to_string(),
            timestamp: Utc::now(),
            sequence,
            footprint: MultiPolygon::new(vec![]),
        }
    }

    #[test]
    fn test_memory_append_and_read() {
        let backend = MemoryBackend::new();
        backend.append(&record("a", 1)).unwrap();
        backend.append(&record("a", 2)).unwrap();
        backend.append(&record("b", 1)).unwrap();

        let a = backend.records("a").unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(a[1].sequence, 2);
        assert_eq!(backend.latest("a").unwrap().unwrap().sequence, 2);
        assert_eq!(backend.collections().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_memory_unknown_collection_is_empty() {
        let backend = MemoryBackend::new();
        assert!(backend.records("missing").unwrap().is_empty());
        assert!(backend.latest("missing").unwrap().is_none());
    }

    #[test]
    fn test_memory_remove() {
        let backend = MemoryBackend::new();
        backend.append(&record("a", 1)).unwrap();
        assert!(backend.remove("a").unwrap());
        assert!(!backend.remove("a").unwrap());
        assert!(backend.records("a").unwrap().is_empty());
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::io("/tmp/x.jsonl", io::Error::new(io::ErrorKind::Other, "boom"));
        assert_eq!(err.to_string(), "I/O error on /tmp/x.jsonl: boom");
    }
}
