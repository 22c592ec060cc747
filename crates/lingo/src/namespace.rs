//! Namespace registration and hot reload.
//!
//! A namespace maps to `<root>/<lang>/<ns>/*.yml` per enabled language.
//! Reload is atomic from the resolver's perspective: files are loaded into
//! a staging set first, and only once every language loaded successfully is
//! the registry slice cleared and replaced, followed by cache invalidation
//! and a reload event. A failed load therefore leaves the previous snapshot
//! fully intact.
//!
//! Reloads of the same namespace are serialized by a per-namespace mutex;
//! reloads of different namespaces do not block each other.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task;
use tracing::{debug, info, warn};

use crate::cache::TieredCache;
use crate::config::DataPaths;
use crate::events::{EventBus, TranslationEvent};
use crate::loader::{self, LoaderError};
use crate::registry::TranslationRegistry;
use crate::types::{Language, LanguageCode, Translation, TranslationOrigin};

/// Errors from namespace registration and reload.
#[derive(Debug, Error)]
pub enum NamespaceError {
    #[error("namespace '{namespace}' is not registered")]
    NotRegistered { namespace: String },

    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error("failed to copy default file '{path}': {source}")]
    CopyDefaults {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("background load task failed: {message}")]
    TaskFailed { message: String },
}

/// Per-namespace bookkeeping.
#[derive(Debug)]
struct NamespaceInfo {
    default_source_dir: Option<PathBuf>,
}

/// Counts reported by [`NamespaceManager::stats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceStats {
    pub namespace: String,
    /// Entries currently registered across all languages.
    pub entries: usize,
}

/// Coordinates loader, registry, and caches for file-backed namespaces.
pub struct NamespaceManager {
    paths: DataPaths,
    languages: Vec<Language>,
    source_language: LanguageCode,
    registry: Arc<TranslationRegistry>,
    cache: Arc<TieredCache>,
    events: EventBus,
    registered: DashMap<String, NamespaceInfo>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl NamespaceManager {
    pub fn new(
        paths: DataPaths,
        languages: Vec<Language>,
        source_language: LanguageCode,
        registry: Arc<TranslationRegistry>,
        cache: Arc<TieredCache>,
        events: EventBus,
    ) -> Self {
        Self {
            paths,
            languages,
            source_language,
            registry,
            cache,
            events,
            registered: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    /// Register a namespace and load it.
    ///
    /// Idempotent: re-registering an existing namespace reloads it. When the
    /// source-language directory contains no files and `default_source_dir`
    /// is given, its `*.yml` files are copied there first so fresh installs
    /// start from the shipped defaults.
    pub async fn register(
        &self,
        namespace: &str,
        default_source_dir: Option<&Path>,
    ) -> Result<usize, NamespaceError> {
        self.registered.insert(
            namespace.to_string(),
            NamespaceInfo {
                default_source_dir: default_source_dir.map(Path::to_path_buf),
            },
        );
        self.reload(namespace).await
    }

    /// Reload a registered namespace from disk.
    ///
    /// Returns the number of entries registered after the reload.
    pub async fn reload(&self, namespace: &str) -> Result<usize, NamespaceError> {
        let info_defaults = match self.registered.get(namespace) {
            Some(info) => info.default_source_dir.clone(),
            None => {
                return Err(NamespaceError::NotRegistered {
                    namespace: namespace.to_string(),
                });
            }
        };

        let lock = self.lock_for(namespace);
        let _guard = lock.lock().await;

        // Stage everything off the primary thread; nothing below touches
        // the registry until the whole load succeeded.
        let staged = self.load_namespace_files(namespace, info_defaults).await?;

        let count: usize = staged.iter().map(|(_, entries)| entries.len()).sum();
        self.registry.clear_namespace(namespace);
        for (language, entries) in staged {
            for (key, text) in entries {
                self.registry.register(
                    Translation::builder()
                        .namespace(namespace)
                        .key(key)
                        .language(language.clone())
                        .text(text)
                        .origin(TranslationOrigin::File)
                        .build(),
                );
            }
        }

        let (l1, l3) = self.cache.invalidate_namespace(namespace);
        debug!(namespace, l1_invalidated = l1, l3_invalidated = l3, "cache slice invalidated");

        self.events.emit(TranslationEvent::NamespaceReloaded {
            namespace: namespace.to_string(),
            count,
        });
        info!(namespace, entries = count, "namespace reloaded");
        Ok(count)
    }

    /// Reload every registered namespace concurrently.
    ///
    /// Failures are logged per namespace; the first error is returned after
    /// all reloads finished.
    pub async fn reload_all(&self) -> Result<(), NamespaceError> {
        let names: Vec<String> = self
            .registered
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        let reloads = names.iter().map(|ns| self.reload(ns));
        let results = join_all(reloads).await;

        let mut first_error = None;
        for (ns, result) in names.iter().zip(results) {
            if let Err(e) = result {
                warn!(namespace = %ns, error = %e, "namespace reload failed");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Drop a namespace: registry slice cleared, caches invalidated.
    ///
    /// Returns false if the namespace was not registered.
    pub fn unregister(&self, namespace: &str) -> bool {
        if self.registered.remove(namespace).is_none() {
            return false;
        }
        self.registry.clear_namespace(namespace);
        self.cache.invalidate_namespace(namespace);
        self.locks.remove(namespace);
        info!(namespace, "namespace unregistered");
        true
    }

    pub fn is_registered(&self, namespace: &str) -> bool {
        self.registered.contains_key(namespace)
    }

    /// The registered namespace names, sorted.
    pub fn registered(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .registered
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    pub fn stats(&self, namespace: &str) -> Option<NamespaceStats> {
        if !self.is_registered(namespace) {
            return None;
        }
        Some(NamespaceStats {
            namespace: namespace.to_string(),
            entries: self.registry.count_for(namespace),
        })
    }

    fn lock_for(&self, namespace: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(namespace.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Scan and parse every language directory on the blocking pool.
    async fn load_namespace_files(
        &self,
        namespace: &str,
        default_source_dir: Option<PathBuf>,
    ) -> Result<Vec<(LanguageCode, BTreeMap<String, String>)>, NamespaceError>
    {
        let namespace = namespace.to_string();
        let paths = self.paths.clone();
        let languages: Vec<LanguageCode> = self
            .languages
            .iter()
            .filter(|l| l.enabled)
            .map(|l| l.code.clone())
            .collect();
        let source_language = self.source_language.clone();

        task::spawn_blocking(move || {
            if let Some(defaults) = default_source_dir {
                copy_defaults_if_empty(
                    &defaults,
                    &paths.namespace_dir(&source_language, &namespace),
                )?;
            }
            let mut staged = Vec::with_capacity(languages.len());
            for language in languages {
                let dir = paths.namespace_dir(&language, &namespace);
                let entries = loader::load_dir(&dir)?;
                staged.push((language, entries));
            }
            Ok(staged)
        })
        .await
        .map_err(|e| NamespaceError::TaskFailed {
            message: e.to_string(),
        })?
    }
}

/// Copy `*.yml` defaults into the source-language directory when it holds
/// no translation files yet. Existing files are never overwritten.
fn copy_defaults_if_empty(defaults: &Path, target: &Path) -> Result<(), NamespaceError> {
    let has_files = fs::read_dir(target)
        .map(|entries| {
            entries.filter_map(Result::ok).any(|entry| {
                entry
                    .path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("yml"))
            })
        })
        .unwrap_or(false);
    if has_files {
        return Ok(());
    }

    let sources = match fs::read_dir(defaults) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(NamespaceError::CopyDefaults {
                path: defaults.to_path_buf(),
                source: e,
            });
        }
    };

    fs::create_dir_all(target).map_err(|e| NamespaceError::CopyDefaults {
        path: target.to_path_buf(),
        source: e,
    })?;

    for entry in sources.filter_map(Result::ok) {
        let path = entry.path();
        let is_yml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yml"));
        if !is_yml {
            continue;
        }
        if let Some(name) = path.file_name() {
            let dest = target.join(name);
            fs::copy(&path, &dest).map_err(|e| NamespaceError::CopyDefaults {
                path: path.clone(),
                source: e,
            })?;
            debug!(from = %path.display(), to = %dest.display(), "copied default translation file");
        }
    }
    Ok(())
}
