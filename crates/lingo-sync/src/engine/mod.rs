//! Sync orchestration.
//!
//! One engine instance owns the "sync in progress" flag; every public
//! operation acquires it with a compare-and-swap and releases it on drop,
//! so concurrent requests get [`SyncError::Busy`] instead of interleaving.
//! Upload, download, and full sync are staged pipelines over the worker
//! pool; results land in a per-namespace history.

mod download;
mod merge;
mod upload;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use lingo::dynamic::{DynamicStore, StoreError};
use lingo::registry::TranslationRegistry;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

pub use merge::{MergeAction, classify};

use crate::backup::BackupManager;
use crate::client::model::{BuildState, ProjectInfo};
use crate::client::{ClientError, CrowdinApi};
use crate::config::{ConflictResolution, CrowdinConfig};
use crate::state::{StateError, SyncStateFile};

/// Which pipeline a result describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOperation {
    Upload,
    Download,
    Full,
    Webhook,
}

/// Terminal (or running) state of one sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncRunStatus {
    Running,
    Success,
    Partial,
    Failed,
}

/// The outcome record of one pipeline run.
#[derive(Debug, Clone)]
pub struct SyncResult {
    pub id: Uuid,
    pub operation: SyncOperation,
    pub namespace: Option<String>,
    pub status: SyncRunStatus,
    pub uploaded: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub conflicts: usize,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SyncResult {
    fn begin(operation: SyncOperation, namespace: Option<&str>) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation,
            namespace: namespace.map(str::to_string),
            status: SyncRunStatus::Running,
            uploaded: 0,
            downloaded: 0,
            skipped: 0,
            conflicts: 0,
            errors: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    fn finish(mut self, status: SyncRunStatus) -> Self {
        self.status = status;
        self.completed_at = Some(Utc::now());
        self
    }

    fn fail(mut self, error: &SyncError) -> Self {
        self.errors.push(error.to_string());
        self.finish(SyncRunStatus::Failed)
    }
}

/// Errors from the sync pipelines.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("a sync operation is already in progress")]
    Busy,

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("remote build did not finish within {seconds}s")]
    BuildTimeout { seconds: u64 },

    #[error("remote build ended in state {state:?}")]
    BuildFailed { state: BuildState },

    #[error("bad build archive: {message}")]
    Archive { message: String },
}

/// RAII release of the in-progress flag.
struct SyncGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// The reconciliation engine.
pub struct SyncEngine {
    config: CrowdinConfig,
    client: Arc<dyn CrowdinApi>,
    registry: Arc<TranslationRegistry>,
    dynamic: Arc<DynamicStore>,
    state: SyncStateFile,
    backups: BackupManager,
    in_progress: AtomicBool,
    last_results: DashMap<String, SyncResult>,
}

impl SyncEngine {
    /// Build an engine rooted at the host data directory
    /// (`<root>/cache/crowdin-state.json`, `<root>/cache/backups/`).
    pub fn new(
        config: CrowdinConfig,
        client: Arc<dyn CrowdinApi>,
        registry: Arc<TranslationRegistry>,
        dynamic: Arc<DynamicStore>,
        data_root: &Path,
    ) -> Self {
        let cache_dir = data_root.join("cache");
        Self {
            config,
            client,
            registry,
            dynamic,
            state: SyncStateFile::load(cache_dir.join("crowdin-state.json")),
            backups: BackupManager::new(cache_dir.join("backups")),
            in_progress: AtomicBool::new(false),
            last_results: DashMap::new(),
        }
    }

    pub fn config(&self) -> &CrowdinConfig {
        &self.config
    }

    pub fn state(&self) -> &SyncStateFile {
        &self.state
    }

    pub fn is_sync_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// The most recent result for a namespace.
    pub fn last_result(&self, namespace: &str) -> Option<SyncResult> {
        self.last_results
            .get(namespace)
            .map(|entry| entry.clone())
    }

    /// Reachability check against the remote project.
    pub async fn test_connection(&self) -> Result<ProjectInfo, ClientError> {
        self.client.project_info().await
    }

    fn try_begin(&self) -> Result<SyncGuard<'_>, SyncError> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SyncError::Busy);
        }
        Ok(SyncGuard {
            flag: &self.in_progress,
        })
    }

    fn record(&self, result: &SyncResult) {
        if let Some(namespace) = &result.namespace {
            self.last_results.insert(namespace.clone(), result.clone());
        }
    }

    /// Upload the source strings of one namespace.
    pub async fn upload_namespace(&self, namespace: &str) -> Result<SyncResult, SyncError> {
        let _guard = self.try_begin()?;
        let result = self.run_upload(namespace).await;
        self.record(&result);
        Ok(result)
    }

    /// Download and merge approved translations for one namespace.
    pub async fn download_namespace(&self, namespace: &str) -> Result<SyncResult, SyncError> {
        self.download_as(namespace, SyncOperation::Download).await
    }

    async fn download_as(
        &self,
        namespace: &str,
        operation: SyncOperation,
    ) -> Result<SyncResult, SyncError> {
        let _guard = self.try_begin()?;
        let result = self.run_download(namespace, operation).await;
        self.record(&result);
        Ok(result)
    }

    /// Full sync for one namespace: upload, then download.
    pub async fn sync_namespace(&self, namespace: &str) -> Result<SyncResult, SyncError> {
        let _guard = self.try_begin()?;
        let result = self.run_full(namespace).await;
        self.record(&result);
        Ok(result)
    }

    /// Full sync for every configured namespace, sequentially.
    pub async fn sync_all(&self) -> Result<Vec<SyncResult>, SyncError> {
        let _guard = self.try_begin()?;
        let namespaces = self.sync_namespaces();
        let mut results = Vec::with_capacity(namespaces.len());
        for namespace in namespaces {
            let result = self.run_full(&namespace).await;
            self.record(&result);
            results.push(result);
        }
        Ok(results)
    }

    /// The namespaces this engine reconciles: the configured list, or every
    /// namespace with registry entries when none is configured.
    fn sync_namespaces(&self) -> Vec<String> {
        if self.config.sync_namespaces.is_empty() {
            self.registry.namespaces()
        } else {
            self.config.sync_namespaces.clone()
        }
    }

    async fn run_upload(&self, namespace: &str) -> SyncResult {
        let mut result = SyncResult::begin(SyncOperation::Upload, Some(namespace));
        match upload::run(self, namespace, &mut result).await {
            Ok(()) => {
                info!(
                    namespace,
                    uploaded = result.uploaded,
                    skipped = result.skipped,
                    "upload finished"
                );
                result.finish(SyncRunStatus::Success)
            }
            Err(e) => {
                error!(namespace, error = %e, "upload failed");
                result.fail(&e)
            }
        }
    }

    async fn run_download(&self, namespace: &str, operation: SyncOperation) -> SyncResult {
        let mut result = SyncResult::begin(operation, Some(namespace));
        match download::run(self, namespace, &mut result).await {
            Ok(()) => {
                info!(
                    namespace,
                    downloaded = result.downloaded,
                    skipped = result.skipped,
                    conflicts = result.conflicts,
                    "download finished"
                );
                let status = if result.conflicts > 0
                    && self.config.conflict_resolution
                        == ConflictResolution::Manual
                {
                    SyncRunStatus::Partial
                } else {
                    SyncRunStatus::Success
                };
                result.finish(status)
            }
            Err(e) => {
                error!(namespace, error = %e, "download failed");
                result.fail(&e)
            }
        }
    }

    async fn run_full(&self, namespace: &str) -> SyncResult {
        let mut result = SyncResult::begin(SyncOperation::Full, Some(namespace));
        if self.config.upload.auto_upload {
            if let Err(e) = upload::run(self, namespace, &mut result).await {
                error!(namespace, error = %e, "full sync failed during upload");
                return result.fail(&e);
            }
        }
        match download::run(self, namespace, &mut result).await {
            Ok(()) => {
                let status = if result.conflicts > 0
                    && self.config.conflict_resolution
                        == ConflictResolution::Manual
                {
                    SyncRunStatus::Partial
                } else {
                    SyncRunStatus::Success
                };
                info!(
                    namespace,
                    uploaded = result.uploaded,
                    downloaded = result.downloaded,
                    "full sync finished"
                );
                result.finish(status)
            }
            Err(e) => {
                error!(namespace, error = %e, "full sync failed during download");
                result.fail(&e)
            }
        }
    }

    // Shared accessors for the stage modules.

    pub(crate) fn client_ref(&self) -> &Arc<dyn CrowdinApi> {
        &self.client
    }

    pub(crate) fn registry_ref(&self) -> &Arc<TranslationRegistry> {
        &self.registry
    }

    pub(crate) fn dynamic_ref(&self) -> &Arc<DynamicStore> {
        &self.dynamic
    }

    pub(crate) fn backups_ref(&self) -> &BackupManager {
        &self.backups
    }
}

/// The trigger surface the webhook receiver and scheduler depend on.
///
/// Busy engines acknowledge and skip; callers never block on a running
/// sync.
#[async_trait::async_trait]
pub trait SyncTrigger: Send + Sync {
    /// Download one namespace, or run a full sync when none is known.
    async fn trigger_download(&self, namespace: Option<&str>);

    /// Run a full sync of every configured namespace.
    async fn trigger_full_sync(&self);

    fn is_busy(&self) -> bool;
}

#[async_trait::async_trait]
impl SyncTrigger for SyncEngine {
    async fn trigger_download(&self, namespace: Option<&str>) {
        let outcome = match namespace {
            Some(ns) => self
                .download_as(ns, SyncOperation::Webhook)
                .await
                .map(|_| ()),
            None => self.sync_all().await.map(|_| ()),
        };
        match outcome {
            Ok(()) => {}
            Err(SyncError::Busy) => warn!(namespace = ?namespace, "sync busy, download request skipped"),
            Err(e) => error!(namespace = ?namespace, error = %e, "triggered download failed"),
        }
    }

    async fn trigger_full_sync(&self) {
        match self.sync_all().await {
            Ok(_) => {}
            Err(SyncError::Busy) => warn!("sync busy, full sync request skipped"),
            Err(e) => error!(error = %e, "triggered full sync failed"),
        }
    }

    fn is_busy(&self) -> bool {
        self.is_sync_in_progress()
    }
}

/// Lowercase hex md5, the change-detection hash used on both sides.
pub(crate) fn md5_hex(text: &str) -> String {
    format!("{:x}", md5::compute(text.as_bytes()))
}
