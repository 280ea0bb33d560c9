//! Checkpoint logs persisted as JSON lines on disk.
//!
//! Each collection gets one file, `<root>/<collection>.jsonl`, holding one
//! serialized [`Checkpoint`] per line. Files are created on the first append
//! and deleted when the collection is removed.
//!
//! A record is written with a single `write_all` of the encoded line plus its
//! newline. A crash mid-write can therefore only leave an incomplete final
//! line; readers skip it, and the first append after opening cuts it off so
//! later records are not glued onto it.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::backend::{CheckpointBackend, StorageError};
use super::types::Checkpoint;

const LOG_EXTENSION: &str = "jsonl";

/// File-per-collection checkpoint backend.
#[derive(Debug)]
pub struct FileBackend {
    root: PathBuf,
    /// Last record per collection appended by this process. Presence also
    /// means the log's tail has been checked.
    tails: Mutex<HashMap<String, Checkpoint>>,
}

impl FileBackend {
    /// Open (creating if needed) a backend rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| StorageError::io(&root, e))?;
        debug!(root = %root.display(), "Opened checkpoint directory");
        Ok(Self {
            root,
            tails: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a collection's log file.
    pub fn log_path(&self, collection_id: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", encode_file_stem(collection_id), LOG_EXTENSION))
    }

    fn read_log(&self, collection_id: &str) -> Result<Vec<Checkpoint>, StorageError> {
        let path = self.log_path(collection_id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&path, e)),
        };
        parse_log(&path, &content)
    }

    /// Truncate an incomplete final line left by an interrupted write.
    fn repair_tail(&self, path: &Path) -> Result<(), StorageError> {
        let content = match fs::read(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(StorageError::io(path, e)),
        };
        if content.is_empty() || content.ends_with(b"\n") {
            return Ok(());
        }

        let keep = content
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |pos| pos + 1);
        warn!(
            path = %path.display(),
            dropped_bytes = content.len() - keep,
            "Discarding incomplete trailing checkpoint record"
        );
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| StorageError::io(path, e))?;
        file.set_len(keep as u64)
            .map_err(|e| StorageError::io(path, e))
    }
}

impl CheckpointBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    fn append(&self, record: &Checkpoint) -> Result<(), StorageError> {
        let path = self.log_path(&record.collection_id);

        let mut tails = self.tails.lock();
        if !tails.contains_key(&record.collection_id) {
            self.repair_tail(&path)?;
        }

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StorageError::io(&path, e))?;
        file.write_all(&line)
            .and_then(|_| file.flush())
            .map_err(|e| StorageError::io(&path, e))?;

        tails.insert(record.collection_id.clone(), record.clone());
        Ok(())
    }

    fn records(&self, collection_id: &str) -> Result<Vec<Checkpoint>, StorageError> {
        self.read_log(collection_id)
    }

    fn latest(&self, collection_id: &str) -> Result<Option<Checkpoint>, StorageError> {
        if let Some(tail) = self.tails.lock().get(collection_id) {
            return Ok(Some(tail.clone()));
        }
        Ok(self.read_log(collection_id)?.pop())
    }

    fn remove(&self, collection_id: &str) -> Result<bool, StorageError> {
        let path = self.log_path(collection_id);
        let mut tails = self.tails.lock();
        tails.remove(collection_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::io(&path, e)),
        }
    }

    fn collections(&self) -> Result<Vec<String>, StorageError> {
        let entries = fs::read_dir(&self.root).map_err(|e| StorageError::io(&self.root, e))?;
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::io(&self.root, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(LOG_EXTENSION) {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(decode_file_stem)
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

fn parse_log(path: &Path, content: &str) -> Result<Vec<Checkpoint>, StorageError> {
    let mut records = Vec::new();
    for (index, segment) in content.split_inclusive('\n').enumerate() {
        let complete = segment.ends_with('\n');
        let line = segment.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Checkpoint>(line) {
            Ok(record) => records.push(record),
            Err(e) if !complete => {
                warn!(
                    path = %path.display(),
                    line = index + 1,
                    error = %e,
                    "Ignoring incomplete trailing checkpoint record"
                );
            }
            Err(e) => {
                return Err(StorageError::Corrupt {
                    path: path.to_path_buf(),
                    line: index + 1,
                    reason: e.to_string(),
                })
            }
        }
    }
    Ok(records)
}

/// Map a collection id to a portable file stem.
///
/// ASCII letters, digits, `-` and `_` pass through; every other byte becomes
/// `%XX`.
fn encode_file_stem(collection_id: &str) -> String {
    let mut out = String::with_capacity(collection_id.len());
    for byte in collection_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

fn decode_file_stem(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = stem.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
