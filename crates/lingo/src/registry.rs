//! Canonical in-memory translation store.
//!
//! The registry is the single owner of [`Translation`] values. Readers far
//! outnumber writers, so storage is a nested concurrent map: language →
//! namespace → key → entry. Writers are serialized per-namespace by the
//! namespace manager; the registry itself only guarantees per-entry
//! atomicity.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;

use crate::types::{LanguageCode, Translation};

type KeyMap = DashMap<String, Arc<Translation>>;
type NamespaceMap = DashMap<String, KeyMap>;

/// Concurrent `(language, namespace, key) → Translation` store.
///
/// # Example
///
/// ```
/// use lingo::registry::TranslationRegistry;
/// use lingo::types::{LanguageCode, Translation, TranslationOrigin};
///
/// let registry = TranslationRegistry::new();
/// let lang = LanguageCode::parse("pt_br").unwrap();
/// registry.register(
///     Translation::builder()
///         .namespace("app")
///         .key("hello")
///         .language(lang.clone())
///         .text("Olá!")
///         .origin(TranslationOrigin::File)
///         .build(),
/// );
///
/// assert_eq!(registry.size(), 1);
/// assert_eq!(registry.get(&lang, "app", "hello").unwrap().text, "Olá!");
/// ```
#[derive(Debug, Default)]
pub struct TranslationRegistry {
    languages: DashMap<LanguageCode, NamespaceMap>,
    size: AtomicUsize,
}

impl TranslationRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry, returning the previous one if present.
    pub fn register(&self, translation: Translation) -> Option<Arc<Translation>> {
        let by_lang = self
            .languages
            .entry(translation.language.clone())
            .or_default();
        let by_ns = by_lang.entry(translation.namespace.clone()).or_default();
        let previous = by_ns.insert(translation.key.clone(), Arc::new(translation));
        if previous.is_none() {
            self.size.fetch_add(1, Ordering::Relaxed);
        }
        previous
    }

    /// Remove a single entry.
    pub fn unregister(
        &self,
        language: &LanguageCode,
        namespace: &str,
        key: &str,
    ) -> Option<Arc<Translation>> {
        let by_lang = self.languages.get(language)?;
        let by_ns = by_lang.get(namespace)?;
        let removed = by_ns.remove(key).map(|(_, entry)| entry);
        if removed.is_some() {
            self.size.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }

    /// Look up an entry.
    pub fn get(
        &self,
        language: &LanguageCode,
        namespace: &str,
        key: &str,
    ) -> Option<Arc<Translation>> {
        let by_lang = self.languages.get(language)?;
        let by_ns = by_lang.get(namespace)?;
        let entry = by_ns.get(key)?;
        Some(Arc::clone(entry.value()))
    }

    /// Remove every entry of a namespace across all languages.
    ///
    /// Returns the number of removed entries.
    pub fn clear_namespace(&self, namespace: &str) -> usize {
        let mut removed = 0;
        for by_lang in self.languages.iter() {
            if let Some((_, keys)) = by_lang.value().remove(namespace) {
                removed += keys.len();
            }
        }
        self.size.fetch_sub(removed, Ordering::Relaxed);
        removed
    }

    /// Total number of entries across all languages and namespaces.
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// All namespaces that currently have at least one entry, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for by_lang in self.languages.iter() {
            for by_ns in by_lang.value().iter() {
                if !by_ns.value().is_empty() && !names.contains(by_ns.key()) {
                    names.push(by_ns.key().clone());
                }
            }
        }
        names.sort();
        names
    }

    /// Number of entries in a namespace across all languages.
    pub fn count_for(&self, namespace: &str) -> usize {
        let mut count = 0;
        for by_lang in self.languages.iter() {
            if let Some(keys) = by_lang.value().get(namespace) {
                count += keys.len();
            }
        }
        count
    }

    /// The keys present for `(language, namespace)`, unsorted.
    ///
    /// Used by the resolver's missing-key suggestions.
    pub fn keys_for(&self, language: &LanguageCode, namespace: &str) -> Vec<String> {
        let Some(by_lang) = self.languages.get(language) else {
            return Vec::new();
        };
        let Some(by_ns) = by_lang.get(namespace) else {
            return Vec::new();
        };
        by_ns.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Snapshot every entry of a namespace across all languages.
    ///
    /// The sync pipelines work from snapshots so they never hold registry
    /// references across await points.
    pub fn snapshot_namespace(&self, namespace: &str) -> Vec<Arc<Translation>> {
        let mut entries = Vec::new();
        for by_lang in self.languages.iter() {
            if let Some(keys) = by_lang.value().get(namespace) {
                entries.extend(keys.iter().map(|e| Arc::clone(e.value())));
            }
        }
        entries
    }

    /// Snapshot the entries of a namespace for one language.
    pub fn snapshot_namespace_language(
        &self,
        language: &LanguageCode,
        namespace: &str,
    ) -> Vec<Arc<Translation>> {
        let Some(by_lang) = self.languages.get(language) else {
            return Vec::new();
        };
        let Some(by_ns) = by_lang.get(namespace) else {
            return Vec::new();
        };
        by_ns.iter().map(|e| Arc::clone(e.value())).collect()
    }
}
