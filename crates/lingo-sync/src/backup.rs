//! Pre-sync backups.
//!
//! Before a download mutates a namespace, its current translations are
//! snapshotted to `cache/backups/<ns>-<timestamp>.json`. A failed download
//! restores the pre-sync values (the merge tracks what it wrote); the
//! snapshot stays behind as the durable record for audits and manual
//! recovery.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::state::StateError;

/// One backed-up translation value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupEntry {
    pub key: String,
    pub language: String,
    pub text: String,
}

/// A namespace snapshot taken before a sync mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceBackup {
    pub namespace: String,
    pub created_at: DateTime<Utc>,
    pub entries: Vec<BackupEntry>,
}

/// Creates and restores namespace snapshots under a backups directory.
#[derive(Debug, Clone)]
pub struct BackupManager {
    dir: PathBuf,
}

impl BackupManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write a snapshot; returns its path.
    pub async fn create(
        &self,
        namespace: &str,
        entries: Vec<BackupEntry>,
    ) -> Result<PathBuf, StateError> {
        let backup = NamespaceBackup {
            namespace: namespace.to_string(),
            created_at: Utc::now(),
            entries,
        };
        let json = serde_json::to_string_pretty(&backup).map_err(|e| StateError::Serialize {
            message: e.to_string(),
        })?;

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StateError::Io {
                path: self.dir.clone(),
                source: e,
            })?;
        let file = self.dir.join(format!(
            "{namespace}-{}.json",
            backup.created_at.format("%Y%m%d-%H%M%S%3f")
        ));
        fs::write(&file, json)
            .await
            .map_err(|e| StateError::Io {
                path: file.clone(),
                source: e,
            })?;
        debug!(namespace, file = %file.display(), "pre-sync backup written");
        Ok(file)
    }

    /// Read a snapshot back.
    pub async fn load(&self, path: &Path) -> Result<NamespaceBackup, StateError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| StateError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
        serde_json::from_str(&content).map_err(|e| StateError::Serialize {
            message: e.to_string(),
        })
    }
}
