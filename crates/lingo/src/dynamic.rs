//! Runtime-created translations with persistence and sync metadata.
//!
//! Every mutating operation follows the same sequence: persist, register in
//! the registry, invalidate the namespace's cache slice, emit a lifecycle
//! event. The registry upsert also makes dynamic entries win over
//! file-loaded entries for reads, since they register after (and over) the
//! file set.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};

use crate::cache::TieredCache;
use crate::events::{EventBus, TranslationEvent};
use crate::host::{DbError, Row, SqlExecutor, SqlValue};
use crate::registry::TranslationRegistry;
use crate::types::{LanguageCode, PluralForms, Translation, TranslationOrigin};

/// Synchronization state of one dynamic translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Local edits not yet uploaded.
    Pending,
    /// In sync with the remote service.
    Synced,
    /// Download found diverging local and remote edits.
    Conflict,
    /// Last sync attempt failed for this entry.
    Error,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
            SyncStatus::Conflict => "conflict",
            SyncStatus::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(SyncStatus::Pending),
            "synced" => Some(SyncStatus::Synced),
            "conflict" => Some(SyncStatus::Conflict),
            "error" => Some(SyncStatus::Error),
            _ => None,
        }
    }
}

/// One persisted dynamic translation row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicTranslation {
    pub namespace: String,
    pub key: String,
    pub language: LanguageCode,
    pub text: String,
    pub plural_forms: Option<PluralForms>,
    pub origin: TranslationOrigin,
    pub sync_status: SyncStatus,
    pub crowdin_hash: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DynamicTranslation {
    /// The `key:language` form used by hash maps and batch operations.
    pub fn full_key(&self) -> String {
        format!("{}:{}", self.key, self.language)
    }

    /// Project the row into the registry's owned form.
    fn to_translation(&self) -> Translation {
        Translation::builder()
            .namespace(self.namespace.clone())
            .key(self.key.clone())
            .language(self.language.clone())
            .text(self.text.clone())
            .maybe_plural_forms(self.plural_forms.clone())
            .origin(self.origin)
            .updated_at(self.updated_at)
            .maybe_source_hash(self.crowdin_hash.clone())
            .build()
    }
}

/// Errors from the dynamic CRUD surface.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error("translation already exists: {namespace}/{key} [{language}]")]
    AlreadyExists {
        namespace: String,
        key: String,
        language: LanguageCode,
    },

    #[error("translation not found: {namespace}/{key} [{language}]")]
    NotFound {
        namespace: String,
        key: String,
        language: LanguageCode,
    },
}

/// Persistence seam for dynamic translations.
#[async_trait]
pub trait DynamicTranslationRepository: Send + Sync {
    async fn find(
        &self,
        namespace: &str,
        key: &str,
        language: &LanguageCode,
    ) -> Result<Option<DynamicTranslation>, DbError>;
    async fn upsert(&self, row: &DynamicTranslation) -> Result<(), DbError>;
    async fn delete(
        &self,
        namespace: &str,
        key: &str,
        language: &LanguageCode,
    ) -> Result<bool, DbError>;
    async fn delete_namespace(&self, namespace: &str) -> Result<u64, DbError>;
    async fn list_namespace(&self, namespace: &str) -> Result<Vec<DynamicTranslation>, DbError>;
    async fn list_all(&self) -> Result<Vec<DynamicTranslation>, DbError>;
    async fn count(&self, namespace: &str) -> Result<u64, DbError>;
    async fn exists(
        &self,
        namespace: &str,
        key: &str,
        language: &LanguageCode,
    ) -> Result<bool, DbError>;

    async fn update_sync_status(
        &self,
        namespace: &str,
        key: &str,
        language: &LanguageCode,
        status: SyncStatus,
        synced_at: Option<DateTime<Utc>>,
    ) -> Result<(), DbError>;
    async fn update_crowdin_hash(
        &self,
        namespace: &str,
        key: &str,
        language: &LanguageCode,
        hash: &str,
    ) -> Result<(), DbError>;
    async fn find_by_status(
        &self,
        namespace: &str,
        status: SyncStatus,
    ) -> Result<Vec<DynamicTranslation>, DbError>;
    /// `key:language` → stored remote hash, for entries that have one.
    async fn crowdin_hashes(&self, namespace: &str) -> Result<BTreeMap<String, String>, DbError>;
    async fn batch_update_sync_status(
        &self,
        namespace: &str,
        keys: &[(String, LanguageCode)],
        status: SyncStatus,
        synced_at: Option<DateTime<Utc>>,
    ) -> Result<(), DbError>;
}

/// SQL-backed repository over the host executor.
///
/// Table name comes from `database.tables.dynamic-translations`; the plural
/// categories live in dedicated columns per the schema.
pub struct SqlDynamicTranslationRepository {
    db: Arc<dyn SqlExecutor>,
    table: String,
}

const COLUMNS: &str = "namespace, translation_key, language, text, \
     plural_zero, plural_one, plural_two, plural_few, plural_many, plural_other, \
     source, status, sync_status, crowdin_hash, last_synced_at, created_at, updated_at";

impl SqlDynamicTranslationRepository {
    pub fn new(db: Arc<dyn SqlExecutor>, table: impl Into<String>) -> Self {
        Self {
            db,
            table: table.into(),
        }
    }

    fn row_to_translation(row: &Row) -> Result<DynamicTranslation, DbError> {
        let namespace = row
            .text("namespace")
            .ok_or_else(|| DbError::new("missing namespace column"))?
            .to_string();
        let key = row
            .text("translation_key")
            .ok_or_else(|| DbError::new("missing translation_key column"))?
            .to_string();
        let language = LanguageCode::parse(
            row.text("language")
                .ok_or_else(|| DbError::new("missing language column"))?,
        )
        .map_err(|e| DbError::new(format!("corrupt language column: {e}")))?;
        let text = row
            .text("text")
            .ok_or_else(|| DbError::new("missing text column"))?
            .to_string();

        // Any non-null plural column triggers map assembly; `other` is
        // backfilled from `text` when the column is null.
        let zero = row.text("plural_zero").map(str::to_string);
        let one = row.text("plural_one").map(str::to_string);
        let two = row.text("plural_two").map(str::to_string);
        let few = row.text("plural_few").map(str::to_string);
        let many = row.text("plural_many").map(str::to_string);
        let other = row.text("plural_other").map(str::to_string);
        let has_plurals = zero.is_some()
            || one.is_some()
            || two.is_some()
            || few.is_some()
            || many.is_some()
            || other.is_some();
        let plural_forms = has_plurals.then(|| {
            PluralForms::builder()
                .maybe_zero(zero)
                .maybe_one(one)
                .maybe_two(two)
                .maybe_few(few)
                .maybe_many(many)
                .other(other.unwrap_or_else(|| text.clone()))
                .build()
        });

        let origin = match row.text("source") {
            Some("file") => TranslationOrigin::File,
            Some("sync") => TranslationOrigin::Sync,
            Some("import") => TranslationOrigin::Import,
            _ => TranslationOrigin::Api,
        };
        let sync_status = row
            .text("sync_status")
            .and_then(SyncStatus::parse)
            .unwrap_or(SyncStatus::Pending);

        Ok(DynamicTranslation {
            namespace,
            key,
            language,
            text,
            plural_forms,
            origin,
            sync_status,
            crowdin_hash: row.text("crowdin_hash").map(str::to_string),
            last_synced_at: row.timestamp("last_synced_at"),
            created_at: row.timestamp("created_at").unwrap_or_else(Utc::now),
            updated_at: row.timestamp("updated_at").unwrap_or_else(Utc::now),
        })
    }

    fn origin_str(origin: TranslationOrigin) -> &'static str {
        match origin {
            TranslationOrigin::File => "file",
            TranslationOrigin::Api => "api",
            TranslationOrigin::Sync => "sync",
            TranslationOrigin::Import => "import",
        }
    }
}

#[async_trait]
impl DynamicTranslationRepository for SqlDynamicTranslationRepository {
    async fn find(
        &self,
        namespace: &str,
        key: &str,
        language: &LanguageCode,
    ) -> Result<Option<DynamicTranslation>, DbError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM {} WHERE namespace = ? AND translation_key = ? AND language = ?",
            self.table
        );
        let rows = self
            .db
            .query(
                &sql,
                &[
                    SqlValue::text(namespace),
                    SqlValue::text(key),
                    SqlValue::text(language.as_str()),
                ],
            )
            .await?;
        rows.first().map(Self::row_to_translation).transpose()
    }

    async fn upsert(&self, row: &DynamicTranslation) -> Result<(), DbError> {
        let forms = row.plural_forms.as_ref();
        let sql = format!(
            "INSERT INTO {} ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON DUPLICATE KEY UPDATE text = ?, plural_zero = ?, plural_one = ?, plural_two = ?, \
             plural_few = ?, plural_many = ?, plural_other = ?, source = ?, sync_status = ?, \
             crowdin_hash = ?, last_synced_at = ?, updated_at = ?",
            self.table
        );
        let params = vec![
            SqlValue::text(&row.namespace),
            SqlValue::text(&row.key),
            SqlValue::text(row.language.as_str()),
            SqlValue::text(&row.text),
            SqlValue::opt_text(forms.and_then(|f| f.zero.as_deref())),
            SqlValue::opt_text(forms.and_then(|f| f.one.as_deref())),
            SqlValue::opt_text(forms.and_then(|f| f.two.as_deref())),
            SqlValue::opt_text(forms.and_then(|f| f.few.as_deref())),
            SqlValue::opt_text(forms.and_then(|f| f.many.as_deref())),
            SqlValue::opt_text(forms.map(|f| f.other.as_str())),
            SqlValue::text(Self::origin_str(row.origin)),
            SqlValue::text("active"),
            SqlValue::text(row.sync_status.as_str()),
            SqlValue::opt_text(row.crowdin_hash.as_deref()),
            SqlValue::opt_timestamp(row.last_synced_at),
            SqlValue::Timestamp(row.created_at),
            SqlValue::Timestamp(row.updated_at),
            // update clause
            SqlValue::text(&row.text),
            SqlValue::opt_text(forms.and_then(|f| f.zero.as_deref())),
            SqlValue::opt_text(forms.and_then(|f| f.one.as_deref())),
            SqlValue::opt_text(forms.and_then(|f| f.two.as_deref())),
            SqlValue::opt_text(forms.and_then(|f| f.few.as_deref())),
            SqlValue::opt_text(forms.and_then(|f| f.many.as_deref())),
            SqlValue::opt_text(forms.map(|f| f.other.as_str())),
            SqlValue::text(Self::origin_str(row.origin)),
            SqlValue::text(row.sync_status.as_str()),
            SqlValue::opt_text(row.crowdin_hash.as_deref()),
            SqlValue::opt_timestamp(row.last_synced_at),
            SqlValue::Timestamp(row.updated_at),
        ];
        self.db.execute(&sql, &params).await?;
        Ok(())
    }

    async fn delete(
        &self,
        namespace: &str,
        key: &str,
        language: &LanguageCode,
    ) -> Result<bool, DbError> {
        let sql = format!(
            "DELETE FROM {} WHERE namespace = ? AND translation_key = ? AND language = ?",
            self.table
        );
        let affected = self
            .db
            .execute(
                &sql,
                &[
                    SqlValue::text(namespace),
                    SqlValue::text(key),
                    SqlValue::text(language.as_str()),
                ],
            )
            .await?;
        Ok(affected > 0)
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<u64, DbError> {
        let sql = format!("DELETE FROM {} WHERE namespace = ?", self.table);
        self.db.execute(&sql, &[SqlValue::text(namespace)]).await
    }

    async fn list_namespace(&self, namespace: &str) -> Result<Vec<DynamicTranslation>, DbError> {
        let sql = format!("SELECT {COLUMNS} FROM {} WHERE namespace = ?", self.table);
        let rows = self.db.query(&sql, &[SqlValue::text(namespace)]).await?;
        rows.iter().map(Self::row_to_translation).collect()
    }

    async fn list_all(&self) -> Result<Vec<DynamicTranslation>, DbError> {
        let sql = format!("SELECT {COLUMNS} FROM {}", self.table);
        let rows = self.db.query(&sql, &[]).await?;
        rows.iter().map(Self::row_to_translation).collect()
    }

    async fn count(&self, namespace: &str) -> Result<u64, DbError> {
        let sql = format!(
            "SELECT COUNT(*) AS total FROM {} WHERE namespace = ?",
            self.table
        );
        let rows = self.db.query(&sql, &[SqlValue::text(namespace)]).await?;
        Ok(rows
            .first()
            .and_then(|row| row.integer("total"))
            .unwrap_or(0)
            .max(0) as u64)
    }

    async fn exists(
        &self,
        namespace: &str,
        key: &str,
        language: &LanguageCode,
    ) -> Result<bool, DbError> {
        Ok(self.find(namespace, key, language).await?.is_some())
    }

    async fn update_sync_status(
        &self,
        namespace: &str,
        key: &str,
        language: &LanguageCode,
        status: SyncStatus,
        synced_at: Option<DateTime<Utc>>,
    ) -> Result<(), DbError> {
        let sql = format!(
            "UPDATE {} SET sync_status = ?, last_synced_at = ? \
             WHERE namespace = ? AND translation_key = ? AND language = ?",
            self.table
        );
        self.db
            .execute(
                &sql,
                &[
                    SqlValue::text(status.as_str()),
                    SqlValue::opt_timestamp(synced_at),
                    SqlValue::text(namespace),
                    SqlValue::text(key),
                    SqlValue::text(language.as_str()),
                ],
            )
            .await?;
        Ok(())
    }

    async fn update_crowdin_hash(
        &self,
        namespace: &str,
        key: &str,
        language: &LanguageCode,
        hash: &str,
    ) -> Result<(), DbError> {
        let sql = format!(
            "UPDATE {} SET crowdin_hash = ? \
             WHERE namespace = ? AND translation_key = ? AND language = ?",
            self.table
        );
        self.db
            .execute(
                &sql,
                &[
                    SqlValue::text(hash),
                    SqlValue::text(namespace),
                    SqlValue::text(key),
                    SqlValue::text(language.as_str()),
                ],
            )
            .await?;
        Ok(())
    }

    async fn find_by_status(
        &self,
        namespace: &str,
        status: SyncStatus,
    ) -> Result<Vec<DynamicTranslation>, DbError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM {} WHERE namespace = ? AND sync_status = ?",
            self.table
        );
        let rows = self
            .db
            .query(
                &sql,
                &[SqlValue::text(namespace), SqlValue::text(status.as_str())],
            )
            .await?;
        rows.iter().map(Self::row_to_translation).collect()
    }

    async fn crowdin_hashes(&self, namespace: &str) -> Result<BTreeMap<String, String>, DbError> {
        let sql = format!(
            "SELECT translation_key, language, crowdin_hash FROM {} \
             WHERE namespace = ? AND crowdin_hash IS NOT NULL",
            self.table
        );
        let rows = self.db.query(&sql, &[SqlValue::text(namespace)]).await?;
        let mut hashes = BTreeMap::new();
        for row in rows {
            if let (Some(key), Some(language), Some(hash)) = (
                row.text("translation_key"),
                row.text("language"),
                row.text("crowdin_hash"),
            ) {
                hashes.insert(format!("{key}:{language}"), hash.to_string());
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
        for (key, language) in keys {
            self.update_sync_status(namespace, key, language, status, synced_at)
                .await?;
        }
        Ok(())
    }
}

/// Runtime translation store: persistence + registry + cache + events.
pub struct DynamicStore {
    repo: Arc<dyn DynamicTranslationRepository>,
    registry: Arc<TranslationRegistry>,
    cache: Arc<TieredCache>,
    events: EventBus,
}

impl DynamicStore {
    pub fn new(
        repo: Arc<dyn DynamicTranslationRepository>,
        registry: Arc<TranslationRegistry>,
        cache: Arc<TieredCache>,
        events: EventBus,
    ) -> Self {
        Self {
            repo,
            registry,
            cache,
            events,
        }
    }

    /// Access to the underlying repository (sync engine metadata queries).
    pub fn repository(&self) -> &Arc<dyn DynamicTranslationRepository> {
        &self.repo
    }

    /// Create a new translation. Fails if the triple already exists.
    pub async fn create(
        &self,
        namespace: &str,
        key: &str,
        language: &LanguageCode,
        text: &str,
    ) -> Result<(), StoreError> {
        self.create_inner(namespace, key, language, text, None, TranslationOrigin::Api)
            .await
    }

    /// Create a new plural-aware translation.
    pub async fn create_with_plurals(
        &self,
        namespace: &str,
        key: &str,
        language: &LanguageCode,
        text: &str,
        forms: PluralForms,
    ) -> Result<(), StoreError> {
        self.create_inner(
            namespace,
            key,
            language,
            text,
            Some(forms),
            TranslationOrigin::Api,
        )
        .await
    }

    async fn create_inner(
        &self,
        namespace: &str,
        key: &str,
        language: &LanguageCode,
        text: &str,
        forms: Option<PluralForms>,
        origin: TranslationOrigin,
    ) -> Result<(), StoreError> {
        if self.repo.exists(namespace, key, language).await? {
            return Err(StoreError::AlreadyExists {
                namespace: namespace.to_string(),
                key: key.to_string(),
                language: language.clone(),
            });
        }
        let now = Utc::now();
        let row = DynamicTranslation {
            namespace: namespace.to_string(),
            key: key.to_string(),
            language: language.clone(),
            text: text.to_string(),
            plural_forms: forms,
            origin,
            sync_status: SyncStatus::Pending,
            crowdin_hash: None,
            last_synced_at: None,
            created_at: now,
            updated_at: now,
        };
        self.commit(&row).await?;
        self.events.emit(TranslationEvent::Created {
            namespace: row.namespace,
            key: row.key,
            language: row.language,
        });
        Ok(())
    }

    /// Update the scalar text of an existing translation.
    pub async fn update(
        &self,
        namespace: &str,
        key: &str,
        language: &LanguageCode,
        text: &str,
    ) -> Result<(), StoreError> {
        let mut row = self.require(namespace, key, language).await?;
        let old = row.text.clone();
        row.text = text.to_string();
        row.sync_status = SyncStatus::Pending;
        row.updated_at = Utc::now();
        self.commit(&row).await?;
        self.events.emit(TranslationEvent::Updated {
            namespace: row.namespace,
            key: row.key,
            language: row.language,
            old: Some(old),
            new: text.to_string(),
        });
        Ok(())
    }

    /// Replace the plural forms of an existing translation.
    pub async fn update_plurals(
        &self,
        namespace: &str,
        key: &str,
        language: &LanguageCode,
        forms: PluralForms,
    ) -> Result<(), StoreError> {
        let mut row = self.require(namespace, key, language).await?;
        let old = row.text.clone();
        row.text = forms.other.clone();
        row.plural_forms = Some(forms);
        row.sync_status = SyncStatus::Pending;
        row.updated_at = Utc::now();
        let new = row.text.clone();
        self.commit(&row).await?;
        self.events.emit(TranslationEvent::Updated {
            namespace: row.namespace,
            key: row.key,
            language: row.language,
            old: Some(old),
            new,
        });
        Ok(())
    }

    /// Delete one translation. Returns false when it did not exist.
    pub async fn delete(
        &self,
        namespace: &str,
        key: &str,
        language: &LanguageCode,
    ) -> Result<bool, StoreError> {
        if !self.repo.delete(namespace, key, language).await? {
            return Ok(false);
        }
        self.registry.unregister(language, namespace, key);
        self.cache.invalidate_namespace(namespace);
        self.events.emit(TranslationEvent::Deleted {
            namespace: namespace.to_string(),
            key: key.to_string(),
            language: language.clone(),
        });
        Ok(true)
    }

    /// Delete every dynamic translation of a namespace.
    ///
    /// File-loaded entries of the same namespace are untouched. Returns the
    /// number of deleted rows. Missing-key tracking is left alone here; the
    /// facade exposes the opt-in reset since it owns the resolver too.
    pub async fn delete_namespace(&self, namespace: &str) -> Result<u64, StoreError> {
        let rows = self.repo.list_namespace(namespace).await?;
        let deleted = self.repo.delete_namespace(namespace).await?;
        for row in &rows {
            self.registry
                .unregister(&row.language, namespace, &row.key);
        }
        self.cache.invalidate_namespace(namespace);
        for row in rows {
            self.events.emit(TranslationEvent::Deleted {
                namespace: row.namespace,
                key: row.key,
                language: row.language,
            });
        }
        info!(namespace, deleted, "dynamic namespace deleted");
        Ok(deleted)
    }

    pub async fn get(
        &self,
        namespace: &str,
        key: &str,
        language: &LanguageCode,
    ) -> Result<Option<DynamicTranslation>, StoreError> {
        Ok(self.repo.find(namespace, key, language).await?)
    }

    pub async fn count(&self, namespace: &str) -> Result<u64, StoreError> {
        Ok(self.repo.count(namespace).await?)
    }

    pub async fn exists(
        &self,
        namespace: &str,
        key: &str,
        language: &LanguageCode,
    ) -> Result<bool, StoreError> {
        Ok(self.repo.exists(namespace, key, language).await?)
    }

    /// Write from the download/merge pipeline: upsert with sync metadata in
    /// one step. Returns true when the entry was newly created.
    pub async fn upsert_from_sync(
        &self,
        namespace: &str,
        key: &str,
        language: &LanguageCode,
        text: &str,
        remote_hash: &str,
    ) -> Result<bool, StoreError> {
        let now = Utc::now();
        let existing = self.repo.find(namespace, key, language).await?;
        let created = existing.is_none();
        let row = match existing {
            Some(mut row) => {
                row.text = text.to_string();
                row.sync_status = SyncStatus::Synced;
                row.crowdin_hash = Some(remote_hash.to_string());
                row.last_synced_at = Some(now);
                row.updated_at = now;
                row
            }
            None => DynamicTranslation {
                namespace: namespace.to_string(),
                key: key.to_string(),
                language: language.clone(),
                text: text.to_string(),
                plural_forms: None,
                origin: TranslationOrigin::Sync,
                sync_status: SyncStatus::Synced,
                crowdin_hash: Some(remote_hash.to_string()),
                last_synced_at: Some(now),
                created_at: now,
                updated_at: now,
            },
        };
        self.commit(&row).await?;
        if created {
            self.events.emit(TranslationEvent::Created {
                namespace: row.namespace,
                key: row.key,
                language: row.language,
            });
        } else {
            self.events.emit(TranslationEvent::Updated {
                namespace: row.namespace,
                key: row.key,
                language: row.language,
                old: None,
                new: text.to_string(),
            });
        }
        Ok(created)
    }

    /// Import one entry from a user-supplied file.
    ///
    /// Returns true when the entry was written; an existing entry is only
    /// replaced when `overwrite` is set.
    pub async fn import(
        &self,
        namespace: &str,
        key: &str,
        language: &LanguageCode,
        text: &str,
        overwrite: bool,
    ) -> Result<bool, StoreError> {
        let now = Utc::now();
        match self.repo.find(namespace, key, language).await? {
            Some(_) if !overwrite => Ok(false),
            Some(mut row) => {
                let old = row.text.clone();
                row.text = text.to_string();
                row.origin = TranslationOrigin::Import;
                row.sync_status = SyncStatus::Pending;
                row.updated_at = now;
                self.commit(&row).await?;
                self.events.emit(TranslationEvent::Updated {
                    namespace: row.namespace,
                    key: row.key,
                    language: row.language,
                    old: Some(old),
                    new: text.to_string(),
                });
                Ok(true)
            }
            None => {
                let row = DynamicTranslation {
                    namespace: namespace.to_string(),
                    key: key.to_string(),
                    language: language.clone(),
                    text: text.to_string(),
                    plural_forms: None,
                    origin: TranslationOrigin::Import,
                    sync_status: SyncStatus::Pending,
                    crowdin_hash: None,
                    last_synced_at: None,
                    created_at: now,
                    updated_at: now,
                };
                self.commit(&row).await?;
                self.events.emit(TranslationEvent::Created {
                    namespace: row.namespace,
                    key: row.key,
                    language: row.language,
                });
                Ok(true)
            }
        }
    }

    /// Mark an entry as conflicted without touching its text.
    pub async fn mark_conflict(
        &self,
        namespace: &str,
        key: &str,
        language: &LanguageCode,
    ) -> Result<(), StoreError> {
        self.repo
            .update_sync_status(namespace, key, language, SyncStatus::Conflict, None)
            .await?;
        Ok(())
    }

    /// Re-register every persisted row into the registry.
    ///
    /// Called at startup, and after a file reload of a namespace so that
    /// dynamic entries keep winning over file-loaded ones.
    pub async fn reapply(&self, namespace: Option<&str>) -> Result<usize, StoreError> {
        let rows = match namespace {
            Some(ns) => self.repo.list_namespace(ns).await?,
            None => self.repo.list_all().await?,
        };
        let count = rows.len();
        for row in &rows {
            self.registry.register(row.to_translation());
        }
        if let Some(ns) = namespace {
            self.cache.invalidate_namespace(ns);
        }
        debug!(count, namespace = ?namespace, "dynamic translations re-registered");
        Ok(count)
    }

    async fn require(
        &self,
        namespace: &str,
        key: &str,
        language: &LanguageCode,
    ) -> Result<DynamicTranslation, StoreError> {
        self.repo
            .find(namespace, key, language)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                namespace: namespace.to_string(),
                key: key.to_string(),
                language: language.clone(),
            })
    }

    /// Persist, register, invalidate: the shared tail of every mutation.
    async fn commit(&self, row: &DynamicTranslation) -> Result<(), StoreError> {
        self.repo.upsert(row).await?;
        self.registry.register(row.to_translation());
        self.cache.invalidate_namespace(&row.namespace);
        Ok(())
    }
}
