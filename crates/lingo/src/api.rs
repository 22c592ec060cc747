//! The host-facing facade.
//!
//! `Translator` wires every subsystem together behind the conceptual API:
//! per-player message delivery, namespace registration with automatic
//! extraction, dynamic CRUD, and import/export. Construction is plain
//! injection: the host hands over its SQL and chat capabilities and a data
//! root, and gets a ready engine back.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_yaml::Value;
use thiserror::Error;
use tokio::fs as tokio_fs;
use tokio::task;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::TieredCache;
use crate::config::{ConfigError, DataPaths, Settings};
use crate::dynamic::{
    DynamicStore, DynamicTranslationRepository, SqlDynamicTranslationRepository, StoreError,
};
use crate::events::EventBus;
use crate::extract::{
    ExtractError, InventoryExtractor, MessagesExtractor, read_document, write_namespace_files,
};
use crate::host::{ChatSink, SqlExecutor};
use crate::loader::{self, LoaderError};
use crate::namespace::{NamespaceError, NamespaceManager, NamespaceStats};
use crate::player::{PlayerLanguageRepository, PlayerLanguageStore, SqlPlayerLanguageRepository};
use crate::plural::PluralSelector;
use crate::registry::TranslationRegistry;
use crate::resolver::{Resolver, ResolverOptions};
use crate::types::{Language, LanguageCode, LanguageError};

/// Namespace used when a message key carries no `ns:` qualifier.
const DEFAULT_NAMESPACE: &str = "messages";

/// Errors surfaced by the facade's compound operations.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Namespace(#[from] NamespaceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error(transparent)]
    Language(#[from] LanguageError),

    #[error("language '{code}' is not enabled")]
    LanguageNotEnabled { code: String },

    #[error("failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The engine facade handed to the host and to other plugins.
pub struct Translator {
    settings: Settings,
    paths: DataPaths,
    registry: Arc<TranslationRegistry>,
    cache: Arc<TieredCache>,
    resolver: Arc<Resolver>,
    namespaces: Arc<NamespaceManager>,
    players: Arc<PlayerLanguageStore>,
    dynamic: Arc<DynamicStore>,
    events: EventBus,
    chat: Arc<dyn ChatSink>,
}

impl Translator {
    /// Assemble the engine from validated settings and host capabilities.
    pub fn new(
        settings: Settings,
        data_root: impl Into<PathBuf>,
        db: Arc<dyn SqlExecutor>,
        chat: Arc<dyn ChatSink>,
    ) -> Result<Self, ConfigError> {
        let player_repo = Arc::new(SqlPlayerLanguageRepository::new(
            Arc::clone(&db),
            settings.database.tables.player_language.clone(),
        ));
        let dynamic_repo = Arc::new(SqlDynamicTranslationRepository::new(
            db,
            settings.database.tables.dynamic_translations.clone(),
        ));
        Self::with_repositories(settings, data_root, player_repo, dynamic_repo, chat)
    }

    /// Assemble the engine with explicit repository implementations.
    ///
    /// This is the full injection point; [`Translator::new`] is the
    /// SQL-backed convenience over it.
    pub fn with_repositories(
        settings: Settings,
        data_root: impl Into<PathBuf>,
        player_repo: Arc<dyn PlayerLanguageRepository>,
        dynamic_repo: Arc<dyn DynamicTranslationRepository>,
        chat: Arc<dyn ChatSink>,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;

        let paths = DataPaths::new(data_root);
        let registry = Arc::new(TranslationRegistry::new());
        let cache = Arc::new(TieredCache::new(&settings.cache));
        let events = EventBus::default();
        let default_language = settings.language.default.clone();

        let resolver = Arc::new(Resolver::new(
            Arc::clone(&registry),
            Arc::clone(&cache),
            PluralSelector::new(),
            ResolverOptions {
                default_language: default_language.clone(),
                missing: settings.missing.clone(),
                cache_substituted: settings.cache.l1.cache_substituted,
            },
        ));

        let namespaces = Arc::new(NamespaceManager::new(
            paths.clone(),
            settings.enabled_languages(),
            default_language,
            Arc::clone(&registry),
            Arc::clone(&cache),
            events.clone(),
        ));

        let players = Arc::new(PlayerLanguageStore::new(player_repo));

        let dynamic = Arc::new(DynamicStore::new(
            dynamic_repo,
            Arc::clone(&registry),
            Arc::clone(&cache),
            events.clone(),
        ));

        Ok(Self {
            settings,
            paths,
            registry,
            cache,
            resolver,
            namespaces,
            players,
            dynamic,
            events,
            chat,
        })
    }

    /// Startup recovery: re-register persisted dynamic translations.
    pub async fn initialize(&self) -> Result<usize, ApiError> {
        let count = self.dynamic.reapply(None).await?;
        info!(dynamic_entries = count, "translation engine initialized");
        Ok(count)
    }

    // =========================================================================
    // Resolution and delivery
    // =========================================================================

    /// The player's language, falling back to the default on unknown
    /// players or a failed preference read.
    pub async fn language_of(&self, player: Uuid) -> LanguageCode {
        match self.players.get(player).await {
            Ok(Some(pref)) => pref.language,
            Ok(None) => self.settings.language.default.clone(),
            Err(e) => {
                warn!(player = %player, error = %e, "preference read failed, using default");
                self.settings.language.default.clone()
            }
        }
    }

    /// Resolve a message for a player.
    pub async fn get(
        &self,
        player: Uuid,
        message_key: &str,
        placeholders: &HashMap<String, String>,
    ) -> String {
        let language = self.language_of(player).await;
        let (namespace, key) = split_message_key(message_key);
        self.resolver
            .resolve(&language, namespace, key, placeholders, None)
    }

    /// Resolve a plural-aware message for a player.
    pub async fn get_count(
        &self,
        player: Uuid,
        message_key: &str,
        count: i64,
        placeholders: &HashMap<String, String>,
    ) -> String {
        let language = self.language_of(player).await;
        let (namespace, key) = split_message_key(message_key);
        self.resolver
            .resolve(&language, namespace, key, placeholders, Some(count))
    }

    /// Resolve a message, or return the caller's default when the key is
    /// unknown in both the player's and the default language.
    pub async fn get_or_default(
        &self,
        player: Uuid,
        message_key: &str,
        default_text: &str,
        placeholders: &HashMap<String, String>,
    ) -> String {
        let language = self.language_of(player).await;
        let (namespace, key) = split_message_key(message_key);
        if !self.has_key(&language, namespace, key) {
            return default_text.to_string();
        }
        self.resolver
            .resolve(&language, namespace, key, placeholders, None)
    }

    /// Resolve and deliver a message to one player.
    pub async fn send(
        &self,
        player: Uuid,
        message_key: &str,
        placeholders: &HashMap<String, String>,
    ) {
        let message = self.get(player, message_key, placeholders).await;
        self.chat.send_to(player, &message).await;
    }

    /// Resolve and deliver a plural-aware message to one player.
    pub async fn send_count(
        &self,
        player: Uuid,
        message_key: &str,
        count: i64,
        placeholders: &HashMap<String, String>,
    ) {
        let message = self.get_count(player, message_key, count, placeholders).await;
        self.chat.send_to(player, &message).await;
    }

    /// Resolve several messages once and deliver them in order.
    pub async fn send_batch(
        &self,
        player: Uuid,
        message_keys: &[&str],
        shared_placeholders: &HashMap<String, String>,
    ) {
        let language = self.language_of(player).await;
        for message_key in message_keys {
            let (namespace, key) = split_message_key(message_key);
            let message = self
                .resolver
                .resolve(&language, namespace, key, shared_placeholders, None);
            self.chat.send_to(player, &message).await;
        }
    }

    /// Broadcast a message, resolved in the default language, optionally
    /// gated by a permission node.
    pub async fn broadcast(
        &self,
        message_key: &str,
        permission: Option<&str>,
        placeholders: &HashMap<String, String>,
    ) {
        let (namespace, key) = split_message_key(message_key);
        let message = self.resolver.resolve(
            &self.settings.language.default,
            namespace,
            key,
            placeholders,
            None,
        );
        self.chat.broadcast(&message, permission).await;
    }

    fn has_key(&self, language: &LanguageCode, namespace: &str, key: &str) -> bool {
        self.registry.get(language, namespace, key).is_some()
            || self
                .registry
                .get(&self.settings.language.default, namespace, key)
                .is_some()
    }

    // =========================================================================
    // Languages and players
    // =========================================================================

    pub fn available_languages(&self) -> Vec<Language> {
        self.settings.enabled_languages()
    }

    pub fn default_language(&self) -> &LanguageCode {
        &self.settings.language.default
    }

    /// Set a player's language explicitly. The code must parse and belong
    /// to an enabled language.
    pub async fn set_player_language(&self, player: Uuid, code: &str) -> Result<(), ApiError> {
        let language = LanguageCode::parse(code)?;
        let enabled = self
            .settings
            .enabled_languages()
            .iter()
            .any(|l| l.code == language);
        if !enabled {
            return Err(ApiError::LanguageNotEnabled {
                code: code.to_string(),
            });
        }
        self.players.set(player, language, false).await;
        Ok(())
    }

    // =========================================================================
    // Namespaces
    // =========================================================================

    /// Register a namespace, running extractors for any translatable files
    /// the owner ships.
    ///
    /// Idempotent. When `owner_dir` contains `messages.yml` or
    /// `inventories.yml`, the matching extractor rebuilds the
    /// source-language files before loading; an optional `lang/` directory
    /// under the owner is used as the shipped-defaults source.
    pub async fn register_namespace(
        &self,
        namespace: &str,
        owner_dir: Option<&Path>,
    ) -> Result<usize, ApiError> {
        if let Some(owner) = owner_dir {
            let paths = self.paths.clone();
            let namespace = namespace.to_string();
            let owner = owner.to_path_buf();
            let languages = self.settings.enabled_languages();
            let source = self.settings.language.default.clone();
            task::spawn_blocking(move || {
                run_extractors(&paths, &namespace, &owner, &languages, &source)
            })
            .await
            .map_err(|e| NamespaceError::TaskFailed {
                message: e.to_string(),
            })??;
        }
        let defaults = owner_dir.map(|d| d.join("lang")).filter(|d| d.is_dir());
        let count = self
            .namespaces
            .register(namespace, defaults.as_deref())
            .await?;
        // Dynamic entries win over freshly loaded file entries.
        self.dynamic.reapply(Some(namespace)).await?;
        Ok(count)
    }

    /// Reload a namespace from disk, then re-apply dynamic entries on top.
    pub async fn reload_namespace(&self, namespace: &str) -> Result<usize, ApiError> {
        let count = self.namespaces.reload(namespace).await?;
        self.dynamic.reapply(Some(namespace)).await?;
        Ok(count)
    }

    /// Drop a namespace's cache slice without touching the registry.
    pub fn invalidate_cache(&self, namespace: &str) {
        self.cache.invalidate_namespace(namespace);
    }

    pub fn namespace_stats(&self, namespace: &str) -> Option<NamespaceStats> {
        self.namespaces.stats(namespace)
    }

    // =========================================================================
    // Dynamic translations
    // =========================================================================

    /// Delete every dynamic translation of a namespace, optionally clearing
    /// the resolver's missing-key tracking for it.
    pub async fn delete_all_translations(
        &self,
        namespace: &str,
        reset_missing_tracking: bool,
    ) -> Result<u64, ApiError> {
        let deleted = self.dynamic.delete_namespace(namespace).await?;
        if reset_missing_tracking {
            self.resolver.reset_missing_tracking(namespace);
        }
        Ok(deleted)
    }

    // =========================================================================
    // Import / export
    // =========================================================================

    /// Export a namespace's entries for one language to
    /// `exports/<ns>/<lang>.yml`. Returns the written path.
    pub async fn export_namespace(
        &self,
        namespace: &str,
        language: &LanguageCode,
    ) -> Result<PathBuf, ApiError> {
        let entries = self
            .registry
            .snapshot_namespace_language(language, namespace);
        let mut flat = BTreeMap::new();
        for entry in entries {
            flat.insert(entry.key.clone(), entry.text.clone());
        }
        let yaml = serde_yaml::to_string(&Value::Mapping(loader::nest(&flat)))
            .map_err(|e| ExtractError::Serialize {
                message: e.to_string(),
            })?;

        let dir = self.paths.exports_dir(namespace);
        tokio_fs::create_dir_all(&dir)
            .await
            .map_err(|e| ApiError::Io {
                path: dir.clone(),
                source: e,
            })?;
        let file = dir.join(format!("{language}.yml"));
        tokio_fs::write(&file, yaml)
            .await
            .map_err(|e| ApiError::Io {
                path: file.clone(),
                source: e,
            })?;
        info!(namespace, language = %language, file = %file.display(), "namespace exported");
        Ok(file)
    }

    /// Import a flat or nested YAML file as dynamic translations.
    ///
    /// Returns the number of written entries; existing entries are only
    /// replaced when `overwrite` is set.
    pub async fn import_translations(
        &self,
        file: &Path,
        namespace: &str,
        language: &LanguageCode,
        overwrite: bool,
    ) -> Result<usize, ApiError> {
        let file = file.to_path_buf();
        let flat = task::spawn_blocking(move || loader::load_file(&file))
            .await
            .map_err(|e| NamespaceError::TaskFailed {
                message: e.to_string(),
            })??;

        let mut written = 0;
        for (key, text) in flat {
            if self
                .dynamic
                .import(namespace, &key, language, &text, overwrite)
                .await?
            {
                written += 1;
            }
        }
        info!(namespace, language = %language, written, "translations imported");
        Ok(written)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Flush caches with a deadline; called by the host on shutdown.
    pub async fn shutdown(&self) {
        self.players.shutdown().await;
        info!("translation engine shut down");
    }

    // =========================================================================
    // Subsystem access
    // =========================================================================

    pub fn registry(&self) -> &Arc<TranslationRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    pub fn namespaces(&self) -> &Arc<NamespaceManager> {
        &self.namespaces
    }

    pub fn players(&self) -> &Arc<PlayerLanguageStore> {
        &self.players
    }

    pub fn dynamic(&self) -> &Arc<DynamicStore> {
        &self.dynamic
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn paths(&self) -> &DataPaths {
        &self.paths
    }
}

/// Extract any `messages.yml` / `inventories.yml` the owner ships into the
/// namespace's translation files. Blocking; runs on the worker pool.
fn run_extractors(
    paths: &DataPaths,
    namespace: &str,
    owner_dir: &Path,
    languages: &[Language],
    source: &LanguageCode,
) -> Result<(), ApiError> {
    let messages = owner_dir.join("messages.yml");
    if messages.is_file() {
        let doc = read_document(&messages)?;
        let extracted = MessagesExtractor::new().extract(&doc);
        write_namespace_files(paths, namespace, "messages.yml", languages, source, &extracted)?;
    }

    let inventories = owner_dir.join("inventories.yml");
    if inventories.is_file() {
        let doc = read_document(&inventories)?;
        let extracted = InventoryExtractor::new().extract(&doc);
        write_namespace_files(
            paths,
            namespace,
            "inventories.yml",
            languages,
            source,
            &extracted,
        )?;
    }
    Ok(())
}

/// Split `ns:key` message keys; unqualified keys live in the default
/// namespace.
fn split_message_key(message_key: &str) -> (&str, &str) {
    match message_key.split_once(':') {
        Some((namespace, key)) if !namespace.is_empty() => (namespace, key),
        _ => (DEFAULT_NAMESPACE, message_key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_keys_split_on_first_colon() {
        assert_eq!(split_message_key("shop:items.buy"), ("shop", "items.buy"));
        assert_eq!(split_message_key("welcome"), ("messages", "welcome"));
        assert_eq!(split_message_key(":odd"), ("messages", ":odd"));
    }
}
