//! Per-player language preferences.
//!
//! The in-memory map is the fast path; the database is the durable truth.
//! Writes update the cache synchronously and dispatch persistence to the
//! worker pool, so a failed write never degrades the player's session —
//! the preference is re-read from the database on next startup.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::host::{DbError, SqlExecutor, SqlValue};
use crate::types::{LanguageCode, normalize_locale};

/// A player's stored language preference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerLanguagePref {
    pub player: Uuid,
    pub language: LanguageCode,
    /// True when the language came from locale auto-detection rather than an
    /// explicit choice.
    pub auto_detected: bool,
    pub first_seen_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persistence seam for player language preferences.
#[async_trait]
pub trait PlayerLanguageRepository: Send + Sync {
    async fn find(&self, player: Uuid) -> Result<Option<PlayerLanguagePref>, DbError>;
    async fn upsert(&self, pref: &PlayerLanguagePref) -> Result<(), DbError>;
    async fn delete(&self, player: Uuid) -> Result<bool, DbError>;
    async fn find_by_language(&self, language: &LanguageCode) -> Result<Vec<Uuid>, DbError>;
    /// Language code → player count.
    async fn histogram(&self) -> Result<BTreeMap<String, u64>, DbError>;
}

/// SQL-backed repository composing statements against the host executor.
///
/// The statement dialect (upsert form) follows the host's configured
/// datasource; the table name comes from `database.tables.player-language`.
pub struct SqlPlayerLanguageRepository {
    db: Arc<dyn SqlExecutor>,
    table: String,
}

impl SqlPlayerLanguageRepository {
    pub fn new(db: Arc<dyn SqlExecutor>, table: impl Into<String>) -> Self {
        Self {
            db,
            table: table.into(),
        }
    }
}

#[async_trait]
impl PlayerLanguageRepository for SqlPlayerLanguageRepository {
    async fn find(&self, player: Uuid) -> Result<Option<PlayerLanguagePref>, DbError> {
        let sql = format!(
            "SELECT language, auto_detected, first_join, updated_at FROM {} WHERE uuid = ?",
            self.table
        );
        let rows = self
            .db
            .query(&sql, &[SqlValue::text(player.to_string())])
            .await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let code = row
            .text("language")
            .ok_or_else(|| DbError::new("missing language column"))?;
        let language = LanguageCode::parse(code)
            .map_err(|e| DbError::new(format!("corrupt language column: {e}")))?;
        Ok(Some(PlayerLanguagePref {
            player,
            language,
            auto_detected: row.boolean("auto_detected").unwrap_or(false),
            first_seen_at: row.timestamp("first_join").unwrap_or_else(Utc::now),
            updated_at: row.timestamp("updated_at").unwrap_or_else(Utc::now),
        }))
    }

    async fn upsert(&self, pref: &PlayerLanguagePref) -> Result<(), DbError> {
        let sql = format!(
            "INSERT INTO {} (uuid, language, auto_detected, first_join, updated_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON DUPLICATE KEY UPDATE language = ?, auto_detected = ?, updated_at = ?",
            self.table
        );
        self.db
            .execute(
                &sql,
                &[
                    SqlValue::text(pref.player.to_string()),
                    SqlValue::text(pref.language.as_str()),
                    SqlValue::Bool(pref.auto_detected),
                    SqlValue::Timestamp(pref.first_seen_at),
                    SqlValue::Timestamp(pref.updated_at),
                    SqlValue::text(pref.language.as_str()),
                    SqlValue::Bool(pref.auto_detected),
                    SqlValue::Timestamp(pref.updated_at),
                ],
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, player: Uuid) -> Result<bool, DbError> {
        let sql = format!("DELETE FROM {} WHERE uuid = ?", self.table);
        let affected = self
            .db
            .execute(&sql, &[SqlValue::text(player.to_string())])
            .await?;
        Ok(affected > 0)
    }

    async fn find_by_language(&self, language: &LanguageCode) -> Result<Vec<Uuid>, DbError> {
        let sql = format!("SELECT uuid FROM {} WHERE language = ?", self.table);
        let rows = self
            .db
            .query(&sql, &[SqlValue::text(language.as_str())])
            .await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.text("uuid"))
            .filter_map(|raw| Uuid::parse_str(raw).ok())
            .collect())
    }

    async fn histogram(&self) -> Result<BTreeMap<String, u64>, DbError> {
        let sql = format!(
            "SELECT language, COUNT(*) AS total FROM {} GROUP BY language",
            self.table
        );
        let rows = self.db.query(&sql, &[]).await?;
        let mut histogram = BTreeMap::new();
        for row in rows {
            if let Some(language) = row.text("language") {
                let total = row.integer("total").unwrap_or(0).max(0) as u64;
                histogram.insert(language.to_string(), total);
            }
        }
        Ok(histogram)
    }
}

/// Write-through cached store over a [`PlayerLanguageRepository`].
pub struct PlayerLanguageStore {
    cache: DashMap<Uuid, PlayerLanguagePref>,
    repo: Arc<dyn PlayerLanguageRepository>,
}

impl PlayerLanguageStore {
    pub fn new(repo: Arc<dyn PlayerLanguageRepository>) -> Self {
        Self {
            cache: DashMap::new(),
            repo,
        }
    }

    /// The preference, from cache or one database read.
    ///
    /// A player never queried and absent from the database is `None`;
    /// callers fall back to the default language.
    pub async fn get(&self, player: Uuid) -> Result<Option<PlayerLanguagePref>, DbError> {
        if let Some(cached) = self.cache.get(&player) {
            return Ok(Some(cached.clone()));
        }
        let loaded = self.repo.find(player).await?;
        if let Some(pref) = &loaded {
            self.cache.insert(player, pref.clone());
        }
        Ok(loaded)
    }

    /// Non-blocking cache-only lookup.
    pub fn get_cached(&self, player: Uuid) -> Option<PlayerLanguagePref> {
        self.cache.get(&player).map(|entry| entry.clone())
    }

    /// Set a preference: the cache is updated before this returns and the
    /// database write is dispatched to the worker pool. A persistence
    /// failure is logged; the cache already reflects the desired value.
    pub async fn set(&self, player: Uuid, language: LanguageCode, auto_detected: bool) {
        let now = Utc::now();
        let first_seen_at = self
            .cache
            .get(&player)
            .map(|existing| existing.first_seen_at)
            .unwrap_or(now);
        let pref = PlayerLanguagePref {
            player,
            language,
            auto_detected,
            first_seen_at,
            updated_at: now,
        };
        self.cache.insert(player, pref.clone());

        let repo = Arc::clone(&self.repo);
        tokio::spawn(async move {
            if let Err(e) = repo.upsert(&pref).await {
                warn!(player = %pref.player, error = %e, "failed to persist player language");
            }
        });
    }

    /// Remove the preference from cache and database.
    pub async fn remove(&self, player: Uuid) -> Result<bool, DbError> {
        let cached = self.cache.remove(&player).is_some();
        let persisted = self.repo.delete(player).await?;
        Ok(cached || persisted)
    }

    /// Auto-detect on first appearance: normalize the host locale and store
    /// it with `auto_detected = true`. An existing preference (explicit or
    /// detected) is never overwritten.
    pub async fn detect(&self, player: Uuid, raw_locale: &str) -> Result<Option<LanguageCode>, DbError> {
        if self.get(player).await?.is_some() {
            return Ok(None);
        }
        let Some(language) = normalize_locale(raw_locale) else {
            debug!(player = %player, raw_locale, "unrecognized locale, keeping default");
            return Ok(None);
        };
        self.set(player, language.clone(), true).await;
        Ok(Some(language))
    }

    pub async fn list_by_language(&self, language: &LanguageCode) -> Result<Vec<Uuid>, DbError> {
        self.repo.find_by_language(language).await
    }

    pub async fn histogram(&self) -> Result<BTreeMap<String, u64>, DbError> {
        self.repo.histogram().await
    }

    /// Flush every cached preference to the database.
    pub async fn save_all(&self) -> Result<(), DbError> {
        let prefs: Vec<PlayerLanguagePref> =
            self.cache.iter().map(|entry| entry.clone()).collect();
        for pref in prefs {
            self.repo.upsert(&pref).await?;
        }
        Ok(())
    }

    /// Shutdown flush with a 10 second deadline.
    pub async fn shutdown(&self) {
        match timeout(Duration::from_secs(10), self.save_all()).await {
            Ok(Ok(())) => debug!("player language cache flushed"),
            Ok(Err(e)) => warn!(error = %e, "player language flush failed"),
            Err(_) => warn!("player language flush timed out after 10s"),
        }
    }

    /// Number of cached preferences.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}
