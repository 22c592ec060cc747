//! Shared fakes for the sync integration tests.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lingo_sync::client::model::{
    BuildInfo, BuildState, DirectoryInfo, FileInfo, ProjectInfo,
};
use lingo_sync::client::{ClientError, CrowdinApi};
use lingo_sync::engine::SyncTrigger;
use parking_lot::Mutex;

/// An in-memory Crowdin double tracking uploads, files, and directories.
#[derive(Default)]
pub struct FakeCrowdin {
    next_id: AtomicI64,
    pub storages: Mutex<BTreeMap<i64, (String, Vec<u8>)>>,
    pub files: Mutex<Vec<FileInfo>>,
    pub directories: Mutex<Vec<DirectoryInfo>>,
    pub translation_uploads: Mutex<Vec<(i64, String, i64)>>,
    /// Bytes served for build downloads.
    pub archive: Mutex<Vec<u8>>,
    /// When set, builds never finish.
    pub build_never_finishes: AtomicBool,
    /// Artificial latency injected into build status checks.
    pub build_status_delay: Mutex<Duration>,
    pub update_file_calls: AtomicU64,
    pub add_file_calls: AtomicU64,
}

impl FakeCrowdin {
    pub fn new() -> Self {
        let fake = Self::default();
        fake.next_id.store(100, Ordering::SeqCst);
        fake
    }

    fn id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn set_archive(&self, bytes: Vec<u8>) {
        *self.archive.lock() = bytes;
    }

    /// The YAML last uploaded to storage for `file_name`, if any.
    pub fn storage_body(&self, file_name: &str) -> Option<String> {
        self.storages
            .lock()
            .values()
            .rev()
            .find(|(name, _)| name == file_name)
            .map(|(_, bytes)| String::from_utf8_lossy(bytes).into_owned())
    }
}

#[async_trait]
impl CrowdinApi for FakeCrowdin {
    async fn project_info(&self) -> Result<ProjectInfo, ClientError> {
        Ok(ProjectInfo {
            id: 42,
            name: "fake".to_string(),
            source_language_id: Some("pt-BR".to_string()),
            target_language_ids: vec!["en".to_string()],
        })
    }

    async fn upload_storage(&self, file_name: &str, bytes: Vec<u8>) -> Result<i64, ClientError> {
        let id = self.id();
        self.storages
            .lock()
            .insert(id, (file_name.to_string(), bytes));
        Ok(id)
    }

    async fn file_by_path(&self, path: &str) -> Result<Option<FileInfo>, ClientError> {
        Ok(self
            .files
            .lock()
            .iter()
            .find(|file| file.path.as_deref() == Some(path))
            .cloned())
    }

    async fn add_file(
        &self,
        _storage_id: i64,
        name: &str,
        directory_id: Option<i64>,
    ) -> Result<FileInfo, ClientError> {
        self.add_file_calls.fetch_add(1, Ordering::SeqCst);
        let file = FileInfo {
            id: self.id(),
            name: name.to_string(),
            path: None,
            directory_id,
        };
        self.files.lock().push(file.clone());
        Ok(file)
    }

    async fn update_file(&self, file_id: i64, _storage_id: i64) -> Result<FileInfo, ClientError> {
        self.update_file_calls.fetch_add(1, Ordering::SeqCst);
        Ok(FileInfo {
            id: file_id,
            name: String::new(),
            path: None,
            directory_id: None,
        })
    }

    async fn list_directories(&self) -> Result<Vec<DirectoryInfo>, ClientError> {
        Ok(self.directories.lock().clone())
    }

    async fn create_directory(
        &self,
        name: &str,
        parent_id: Option<i64>,
    ) -> Result<DirectoryInfo, ClientError> {
        let directory = DirectoryInfo {
            id: self.id(),
            name: name.to_string(),
            directory_id: parent_id,
        };
        self.directories.lock().push(directory.clone());
        Ok(directory)
    }

    async fn upload_translation(
        &self,
        file_id: i64,
        language_id: &str,
        storage_id: i64,
    ) -> Result<(), ClientError> {
        self.translation_uploads
            .lock()
            .push((file_id, language_id.to_string(), storage_id));
        Ok(())
    }

    async fn start_build(
        &self,
        _export_approved_only: bool,
        _skip_untranslated: bool,
    ) -> Result<i64, ClientError> {
        Ok(9000)
    }

    async fn build_status(&self, build_id: i64) -> Result<BuildInfo, ClientError> {
        let delay = *self.build_status_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let status = if self.build_never_finishes.load(Ordering::SeqCst) {
            BuildState::InProgress
        } else {
            BuildState::Finished
        };
        Ok(BuildInfo {
            id: build_id,
            status,
            progress: 100,
        })
    }

    async fn download_build(&self, _build_id: i64) -> Result<Vec<u8>, ClientError> {
        Ok(self.archive.lock().clone())
    }
}

/// Build a zip archive shaped like a Crowdin export:
/// `<remote-lang>/<ns>/<ns>.yml` entries.
pub fn build_archive(entries: &[(&str, &str, &str)]) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        let options = zip::write::SimpleFileOptions::default();
        for (remote_lang, namespace, yaml) in entries {
            writer
                .start_file(format!("{remote_lang}/{namespace}/{namespace}.yml"), options)
                .unwrap();
            writer.write_all(yaml.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

/// Records trigger invocations for webhook and scheduler tests.
#[derive(Default)]
pub struct RecordingTrigger {
    pub downloads: Mutex<Vec<Option<String>>>,
    pub full_syncs: AtomicU64,
    pub busy: AtomicBool,
}

impl RecordingTrigger {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn full_sync_count(&self) -> u64 {
        self.full_syncs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SyncTrigger for RecordingTrigger {
    async fn trigger_download(&self, namespace: Option<&str>) {
        self.downloads.lock().push(namespace.map(str::to_string));
    }

    async fn trigger_full_sync(&self) {
        self.full_syncs.fetch_add(1, Ordering::SeqCst);
    }

    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }
}
