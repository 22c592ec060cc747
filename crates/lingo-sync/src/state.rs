//! Durable sync state (`cache/crowdin-state.json`).
//!
//! Tracks, per namespace: the remote file id, the source hashes recorded at
//! the last successful upload (the upload pipeline's change-detection
//! baseline for file-loaded entries), run timestamps, and manual-conflict
//! records awaiting review. State is plain JSON, rewritten atomically via a
//! temp file.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to write state file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize state: {message}")]
    Serialize { message: String },
}

/// A manual-policy conflict awaiting operator review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub key: String,
    pub language: String,
    pub local: String,
    pub remote: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamespaceState {
    pub file_id: Option<i64>,
    /// Source-language `key → md5(text)` at the last successful upload.
    #[serde(default)]
    pub hashes: BTreeMap<String, String>,
    pub last_upload: Option<DateTime<Utc>>,
    pub last_download: Option<DateTime<Utc>>,
    #[serde(default)]
    pub conflicts: Vec<ConflictRecord>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateData {
    namespaces: BTreeMap<String, NamespaceState>,
}

/// The on-disk sync state with an in-memory working copy.
#[derive(Debug)]
pub struct SyncStateFile {
    path: PathBuf,
    data: RwLock<StateData>,
}

impl SyncStateFile {
    /// Load existing state; a missing file starts empty, a corrupt file is
    /// logged and replaced on the next save.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(data) => data,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "corrupt sync state, starting fresh");
                    StateData::default()
                }
            },
            Err(_) => StateData::default(),
        };
        Self {
            path,
            data: RwLock::new(data),
        }
    }

    /// Persist the working copy atomically (temp file + rename).
    pub fn save(&self) -> Result<(), StateError> {
        let json = {
            let data = self.data.read();
            serde_json::to_string_pretty(&*data).map_err(|e| StateError::Serialize {
                message: e.to_string(),
            })?
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StateError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| StateError::Io {
            path: tmp.clone(),
            source: e,
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| StateError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_id(&self, namespace: &str) -> Option<i64> {
        self.data
            .read()
            .namespaces
            .get(namespace)
            .and_then(|ns| ns.file_id)
    }

    pub fn set_file_id(&self, namespace: &str, file_id: i64) {
        self.data
            .write()
            .namespaces
            .entry(namespace.to_string())
            .or_default()
            .file_id = Some(file_id);
    }

    /// The upload-hash baseline for a namespace.
    pub fn hashes(&self, namespace: &str) -> BTreeMap<String, String> {
        self.data
            .read()
            .namespaces
            .get(namespace)
            .map(|ns| ns.hashes.clone())
            .unwrap_or_default()
    }

    /// Replace the baseline after a successful upload.
    pub fn set_hashes(&self, namespace: &str, hashes: BTreeMap<String, String>) {
        let mut data = self.data.write();
        let ns = data.namespaces.entry(namespace.to_string()).or_default();
        ns.hashes = hashes;
        ns.last_upload = Some(Utc::now());
    }

    pub fn record_download(&self, namespace: &str) {
        self.data
            .write()
            .namespaces
            .entry(namespace.to_string())
            .or_default()
            .last_download = Some(Utc::now());
    }

    pub fn push_conflicts(&self, namespace: &str, mut records: Vec<ConflictRecord>) {
        self.data
            .write()
            .namespaces
            .entry(namespace.to_string())
            .or_default()
            .conflicts
            .append(&mut records);
    }

    pub fn conflicts(&self, namespace: &str) -> Vec<ConflictRecord> {
        self.data
            .read()
            .namespaces
            .get(namespace)
            .map(|ns| ns.conflicts.clone())
            .unwrap_or_default()
    }

    pub fn namespace_state(&self, namespace: &str) -> Option<NamespaceState> {
        self.data.read().namespaces.get(namespace).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache").join("crowdin-state.json");

        let state = SyncStateFile::load(&path);
        state.set_file_id("app", 77);
        let mut hashes = BTreeMap::new();
        hashes.insert("hello".to_string(), "abc".to_string());
        state.set_hashes("app", hashes);
        state.save().unwrap();

        let reloaded = SyncStateFile::load(&path);
        assert_eq!(reloaded.file_id("app"), Some(77));
        assert_eq!(reloaded.hashes("app")["hello"], "abc");
        assert!(reloaded.namespace_state("app").unwrap().last_upload.is_some());
    }

    #[test]
    fn corrupt_state_starts_fresh() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("crowdin-state.json");
        fs::write(&path, "{not json").unwrap();

        let state = SyncStateFile::load(&path);
        assert_eq!(state.file_id("app"), None);
        state.save().unwrap();
        let reloaded = SyncStateFile::load(&path);
        assert_eq!(reloaded.file_id("app"), None);
    }
}
