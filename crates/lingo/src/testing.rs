//! In-memory capability fakes.
//!
//! These back integration tests (here and in `lingo-sync`) and host-less
//! demos. They implement the repository and chat seams directly, so no SQL
//! executor is needed.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::dynamic::{DynamicTranslation, DynamicTranslationRepository, SyncStatus};
use crate::host::{AdminNotifier, ChatSink, DbError};
use crate::player::{PlayerLanguagePref, PlayerLanguageRepository};
use crate::types::LanguageCode;

/// In-memory [`PlayerLanguageRepository`].
#[derive(Debug, Default)]
pub struct MemoryPlayerLanguageRepository {
    rows: Mutex<HashMap<Uuid, PlayerLanguagePref>>,
    failing: AtomicBool,
}

impl MemoryPlayerLanguageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail, to exercise degraded paths.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().len()
    }

    fn check(&self) -> Result<(), DbError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(DbError::new("simulated failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PlayerLanguageRepository for MemoryPlayerLanguageRepository {
    async fn find(&self, player: Uuid) -> Result<Option<PlayerLanguagePref>, DbError> {
        self.check()?;
        Ok(self.rows.lock().get(&player).cloned())
    }

    async fn upsert(&self, pref: &PlayerLanguagePref) -> Result<(), DbError> {
        self.check()?;
        self.rows.lock().insert(pref.player, pref.clone());
        Ok(())
    }

    async fn delete(&self, player: Uuid) -> Result<bool, DbError> {
        self.check()?;
        Ok(self.rows.lock().remove(&player).is_some())
    }

    async fn find_by_language(&self, language: &LanguageCode) -> Result<Vec<Uuid>, DbError> {
        self.check()?;
        Ok(self
            .rows
            .lock()
            .values()
            .filter(|pref| &pref.language == language)
            .map(|pref| pref.player)
            .collect())
    }

    async fn histogram(&self) -> Result<BTreeMap<String, u64>, DbError> {
        self.check()?;
        let mut histogram = BTreeMap::new();
        for pref in self.rows.lock().values() {
            *histogram
                .entry(pref.language.as_str().to_string())
                .or_insert(0) += 1;
        }
        Ok(histogram)
    }
}

type DynamicKey = (String, String, String);

/// In-memory [`DynamicTranslationRepository`].
#[derive(Debug, Default)]
pub struct MemoryDynamicTranslationRepository {
    rows: Mutex<BTreeMap<DynamicKey, DynamicTranslation>>,
}

impl MemoryDynamicTranslationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().len()
    }

    fn key(namespace: &str, key: &str, language: &LanguageCode) -> DynamicKey {
        (
            namespace.to_string(),
            key.to_string(),
            language.as_str().to_string(),
        )
    }
}

#[async_trait]
impl DynamicTranslationRepository for MemoryDynamicTranslationRepository {
    async fn find(
        &self,
        namespace: &str,
        key: &str,
        language: &LanguageCode,
    ) -> Result<Option<DynamicTranslation>, DbError> {
        Ok(self
            .rows
            .lock()
            .get(&Self::key(namespace, key, language))
            .cloned())
    }

    async fn upsert(&self, row: &DynamicTranslation) -> Result<(), DbError> {
        self.rows.lock().insert(
            Self::key(&row.namespace, &row.key, &row.language),
            row.clone(),
        );
        Ok(())
    }

    async fn delete(
        &self,
        namespace: &str,
        key: &str,
        language: &LanguageCode,
    ) -> Result<bool, DbError> {
        Ok(self
            .rows
            .lock()
            .remove(&Self::key(namespace, key, language))
            .is_some())
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<u64, DbError> {
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|(ns, _, _), _| ns != namespace);
        Ok((before - rows.len()) as u64)
    }

    async fn list_namespace(&self, namespace: &str) -> Result<Vec<DynamicTranslation>, DbError> {
        Ok(self
            .rows
            .lock()
            .values()
            .filter(|row| row.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<DynamicTranslation>, DbError> {
        Ok(self.rows.lock().values().cloned().collect())
    }

    async fn count(&self, namespace: &str) -> Result<u64, DbError> {
        Ok(self
            .rows
            .lock()
            .values()
            .filter(|row| row.namespace == namespace)
            .count() as u64)
    }

    async fn exists(
        &self,
        namespace: &str,
        key: &str,
        language: &LanguageCode,
    ) -> Result<bool, DbError> {
        Ok(self
            .rows
            .lock()
            .contains_key(&Self::key(namespace, key, language)))
    }

    async fn update_sync_status(
        &self,
        namespace: &str,
        key: &str,
        language: &LanguageCode,
        status: SyncStatus,
        synced_at: Option<DateTime<Utc>>,
    ) -> Result<(), DbError> {
        if let Some(row) = self.rows.lock().get_mut(&Self::key(namespace, key, language)) {
            row.sync_status = status;
            if synced_at.is_some() {
                row.last_synced_at = synced_at;
            }
        }
        Ok(())
    }

    async fn update_crowdin_hash(
        &self,
        namespace: &str,
        key: &str,
        language: &LanguageCode,
        hash: &str,
    ) -> Result<(), DbError> {
        if let Some(row) = self.rows.lock().get_mut(&Self::key(namespace, key, language)) {
            row.crowdin_hash = Some(hash.to_string());
        }
        Ok(())
    }

    async fn find_by_status(
        &self,
        namespace: &str,
        status: SyncStatus,
    ) -> Result<Vec<DynamicTranslation>, DbError> {
        Ok(self
            .rows
            .lock()
            .values()
            .filter(|row| row.namespace == namespace && row.sync_status == status)
            .cloned()
            .collect())
    }

    async fn crowdin_hashes(&self, namespace: &str) -> Result<BTreeMap<String, String>, DbError> {
        let mut hashes = BTreeMap::new();
        for row in self.rows.lock().values() {
            if row.namespace == namespace
                && let Some(hash) = &row.crowdin_hash
            {
                hashes.insert(row.full_key(), hash.clone());
            }
        }
        Ok(hashes)
    }

    async fn batch_update_sync_status(
        &self,
        namespace: &str,
        keys: &[(String, LanguageCode)],
        status: SyncStatus,
        synced_at: Option<DateTime<Utc>>,
    ) -> Result<(), DbError> {
        let mut rows = self.rows.lock();
        for (key, language) in keys {
            if let Some(row) = rows.get_mut(&Self::key(namespace, key, language)) {
                row.sync_status = status;
                if synced_at.is_some() {
                    row.last_synced_at = synced_at;
                }
            }
        }
        Ok(())
    }
}

/// A [`ChatSink`] that records what it was asked to deliver.
#[derive(Debug, Default)]
pub struct RecordingChatSink {
    /// `(recipient, message)`; `None` recipient means broadcast.
    messages: Mutex<Vec<(Option<Uuid>, String)>>,
}

impl RecordingChatSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(Option<Uuid>, String)> {
        self.messages.lock().clone()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl ChatSink for RecordingChatSink {
    async fn send_to(&self, player: Uuid, message: &str) {
        self.messages.lock().push((Some(player), message.to_string()));
    }

    async fn broadcast(&self, message: &str, _permission: Option<&str>) {
        self.messages.lock().push((None, message.to_string()));
    }
}

/// An [`AdminNotifier`] that records notifications.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notes: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notes(&self) -> Vec<String> {
        self.notes.lock().clone()
    }
}

#[async_trait]
impl AdminNotifier for RecordingNotifier {
    async fn notify(&self, message: &str) {
        self.notes.lock().push(message.to_string());
    }
}
