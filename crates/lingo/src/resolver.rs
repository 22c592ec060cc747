//! Text resolution: fallback chain, plural dispatch, caching.
//!
//! The resolver never fails visibly. Every uncovered case — unknown key,
//! unknown language, negative count — degrades to the configured
//! missing-format or a sane category, with at most a log line.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashSet;
use strsim::levenshtein;
use tracing::warn;

use crate::cache::{TieredCache, cache_key, key_namespace};
use crate::config::MissingSettings;
use crate::plural::{PluralCategory, PluralSelector};
use crate::registry::TranslationRegistry;
use crate::template::{CompiledTemplate, compile};
use crate::types::LanguageCode;

/// Upper bound on the once-per-key missing log set. Beyond this the
/// resolver stops logging new distinct keys rather than growing without
/// bound.
const MISSING_LOG_CAP: usize = 1_024;

/// Maximum `{lang:...}` expansion depth before the reference is left as-is.
const MAX_LANG_REF_DEPTH: usize = 3;

/// Resolution behavior knobs.
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub default_language: LanguageCode,
    pub missing: MissingSettings,
    /// Also cache placeholder-substituted resolutions in L1 under an
    /// argument-hash key. Off by default.
    pub cache_substituted: bool,
}

/// The read-path engine over registry, caches, and plural rules.
pub struct Resolver {
    registry: Arc<TranslationRegistry>,
    cache: Arc<TieredCache>,
    plurals: PluralSelector,
    options: ResolverOptions,
    missing_logged: DashSet<String>,
}

impl Resolver {
    pub fn new(
        registry: Arc<TranslationRegistry>,
        cache: Arc<TieredCache>,
        plurals: PluralSelector,
        options: ResolverOptions,
    ) -> Self {
        Self {
            registry,
            cache,
            plurals,
            options,
            missing_logged: DashSet::new(),
        }
    }

    /// Resolve text for `(language, namespace, key)` with placeholders and
    /// an optional count for plural selection.
    ///
    /// # Example
    ///
    /// ```
    /// use std::collections::HashMap;
    /// use std::sync::Arc;
    /// use lingo::cache::TieredCache;
    /// use lingo::config::{CacheSettings, MissingSettings};
    /// use lingo::plural::PluralSelector;
    /// use lingo::registry::TranslationRegistry;
    /// use lingo::resolver::{Resolver, ResolverOptions};
    /// use lingo::types::{LanguageCode, Translation, TranslationOrigin};
    ///
    /// let registry = Arc::new(TranslationRegistry::new());
    /// let pt = LanguageCode::parse("pt_br").unwrap();
    /// registry.register(
    ///     Translation::builder()
    ///         .namespace("app")
    ///         .key("hello")
    ///         .language(pt.clone())
    ///         .text("Olá, {name}!")
    ///         .origin(TranslationOrigin::File)
    ///         .build(),
    /// );
    /// let resolver = Resolver::new(
    ///     registry,
    ///     Arc::new(TieredCache::new(&CacheSettings::default())),
    ///     PluralSelector::new(),
    ///     ResolverOptions {
    ///         default_language: pt.clone(),
    ///         missing: MissingSettings::default(),
    ///         cache_substituted: false,
    ///     },
    /// );
    ///
    /// let args = HashMap::from([("name".to_string(), "Ana".to_string())]);
    /// assert_eq!(resolver.resolve(&pt, "app", "hello", &args, None), "Olá, Ana!");
    /// ```
    pub fn resolve(
        &self,
        language: &LanguageCode,
        namespace: &str,
        key: &str,
        placeholders: &HashMap<String, String>,
        count: Option<i64>,
    ) -> String {
        let simple = placeholders.is_empty() && count.is_none();

        let l1_key = if simple {
            Some(cache_key(language.as_str(), namespace, key))
        } else if self.options.cache_substituted {
            Some(substituted_key(language, namespace, key, placeholders, count))
        } else {
            None
        };
        if let Some(l1_key) = &l1_key
            && let Some(hit) = self.cache.l1.get(l1_key)
        {
            return hit;
        }

        let category = count.map(|n| self.category_for(language, n));
        let resolved = match self.find_template(language, namespace, key, category) {
            Some((effective_key, text)) => {
                let compiled = self.compiled(language, namespace, &effective_key, &text);
                let values = merged_values(placeholders, count);
                compiled.apply(&values)
            }
            None => self.missing_text(language, namespace, key),
        };

        if let Some(l1_key) = l1_key {
            self.cache.l1.put(l1_key, resolved.clone());
        }
        resolved
    }

    /// Plural category for a count, degrading negatives to OTHER with a log
    /// line instead of failing the resolution.
    fn category_for(&self, language: &LanguageCode, count: i64) -> PluralCategory {
        match self.plurals.select(language, count) {
            Ok(category) => category,
            Err(e) => {
                warn!(language = %language, count, error = %e, "negative count in resolve, using OTHER");
                PluralCategory::Other
            }
        }
    }

    /// Find the effective key and raw template, applying the fixed fallback
    /// chain: requested language → default language → none.
    fn find_template(
        &self,
        language: &LanguageCode,
        namespace: &str,
        key: &str,
        category: Option<PluralCategory>,
    ) -> Option<(String, String)> {
        if let Some(found) = self.find_in_language(language, namespace, key, category) {
            return Some(found);
        }
        if language != &self.options.default_language {
            return self.find_in_language(&self.options.default_language, namespace, key, category);
        }
        None
    }

    /// Lookup within one language, with plural key rewriting when a count
    /// was supplied: base entry with plural forms, then `key.<category>`,
    /// then `key.other`, then `key`.
    fn find_in_language(
        &self,
        language: &LanguageCode,
        namespace: &str,
        key: &str,
        category: Option<PluralCategory>,
    ) -> Option<(String, String)> {
        if let Some(category) = category {
            if let Some(entry) = self.registry.get(language, namespace, key)
                && let Some(forms) = &entry.plural_forms
            {
                let effective = format!("{key}.{}", category.suffix());
                return Some((effective, forms.select(category).to_string()));
            }
            let suffixed = format!("{key}.{}", category.suffix());
            if let Some(entry) = self.registry.get(language, namespace, &suffixed) {
                return Some((suffixed, entry.text.clone()));
            }
            let other = format!("{key}.other");
            if let Some(entry) = self.registry.get(language, namespace, &other) {
                return Some((other, entry.text.clone()));
            }
        }
        let entry = self.registry.get(language, namespace, key)?;
        Some((key.to_string(), entry.text.clone()))
    }

    /// Fetch or build the compiled template for an effective key.
    ///
    /// `{lang:...}` references are expanded before compilation, so the L3
    /// entry is the fully inlined form.
    fn compiled(
        &self,
        language: &LanguageCode,
        namespace: &str,
        effective_key: &str,
        text: &str,
    ) -> Arc<CompiledTemplate> {
        let l3_key = cache_key(language.as_str(), namespace, effective_key);
        if let Some(hit) = self.cache.l3.get(&l3_key) {
            return hit;
        }
        let started = Instant::now();
        let expanded = self.expand_lang_refs(language, namespace, text, 0);
        let compiled = Arc::new(compile(&expanded));
        self.cache.l3.record_load(started.elapsed());
        self.cache.l3.put(l3_key, Arc::clone(&compiled));
        compiled
    }

    /// Expand reserved `{lang:key}` (same namespace) and `{lang:ns:key}`
    /// references, bounded in depth. An unresolvable or too-deep reference
    /// stays in the text verbatim.
    fn expand_lang_refs(
        &self,
        language: &LanguageCode,
        namespace: &str,
        text: &str,
        depth: usize,
    ) -> String {
        if depth >= MAX_LANG_REF_DEPTH || !text.contains("{lang:") {
            return text.to_string();
        }
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("{lang:") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 6..];
            match after.find('}') {
                Some(end) => {
                    let reference = &after[..end];
                    let (ref_ns, ref_key) = match reference.split_once(':') {
                        Some((ns, key)) => (ns, key),
                        None => (namespace, reference),
                    };
                    match self.find_template(language, ref_ns, ref_key, None) {
                        Some((_, ref_text)) => {
                            let inlined =
                                self.expand_lang_refs(language, ref_ns, &ref_text, depth + 1);
                            out.push_str(&inlined);
                        }
                        None => {
                            out.push_str("{lang:");
                            out.push_str(reference);
                            out.push('}');
                        }
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    out.push_str("{lang:");
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }

    /// The missing-key result, with the once-per-key log.
    fn missing_text(&self, language: &LanguageCode, namespace: &str, key: &str) -> String {
        if self.options.missing.log {
            self.log_missing_once(language, namespace, key);
        }
        if !self.options.missing.show_key {
            return String::new();
        }
        let marker = compile(&self.options.missing.format);
        let values = HashMap::from([("key".to_string(), key.to_string())]);
        marker.apply(&values)
    }

    fn log_missing_once(&self, language: &LanguageCode, namespace: &str, key: &str) {
        let tracked = cache_key(language.as_str(), namespace, key);
        if self.missing_logged.contains(&tracked) || self.missing_logged.len() >= MISSING_LOG_CAP {
            return;
        }
        self.missing_logged.insert(tracked);

        let mut available = self.registry.keys_for(language, namespace);
        if language != &self.options.default_language {
            available.extend(
                self.registry
                    .keys_for(&self.options.default_language, namespace),
            );
        }
        let suggestions = compute_suggestions(key, &available);
        if suggestions.is_empty() {
            warn!(language = %language, namespace, key, "missing translation");
        } else {
            warn!(
                language = %language,
                namespace,
                key,
                suggestions = %suggestions.join(", "),
                "missing translation"
            );
        }
    }

    /// Forget tracked missing keys for one namespace.
    ///
    /// Exposed for the dynamic store's namespace deletion, which can opt in
    /// to resetting the tracking.
    pub fn reset_missing_tracking(&self, namespace: &str) {
        self.missing_logged
            .retain(|tracked| key_namespace(tracked) != Some(namespace));
    }
}

/// Merge caller placeholders with the implicit `count` value.
///
/// A caller-supplied `count` placeholder wins over the implicit one.
fn merged_values(placeholders: &HashMap<String, String>, count: Option<i64>) -> HashMap<String, String> {
    let mut values = placeholders.clone();
    if let Some(n) = count {
        values
            .entry("count".to_string())
            .or_insert_with(|| n.to_string());
    }
    values
}

/// L1 key for a substituted resolution: the canonical `lang:ns:key` plus a
/// stable hash of the arguments. The middle segment stays the namespace so
/// slice invalidation still removes these entries.
fn substituted_key(
    language: &LanguageCode,
    namespace: &str,
    key: &str,
    placeholders: &HashMap<String, String>,
    count: Option<i64>,
) -> String {
    let mut pairs: Vec<(&String, &String)> = placeholders.iter().collect();
    pairs.sort();
    let mut canonical = String::new();
    for (k, v) in pairs {
        canonical.push_str(k);
        canonical.push('\u{1}');
        canonical.push_str(v);
        canonical.push('\u{2}');
    }
    if let Some(n) = count {
        canonical.push_str(&n.to_string());
    }
    let hash = const_fnv1a_hash::fnv1a_hash_str_64(&canonical);
    format!("{}#{hash:016x}", cache_key(language.as_str(), namespace, key))
}

/// Compute "did you mean" suggestions for a key using Levenshtein distance.
///
/// Returns up to 3 suggestions with edit distance <= 2 (or <= 1 for short
/// keys).
pub fn compute_suggestions(target: &str, available: &[String]) -> Vec<String> {
    let max_distance = if target.len() <= 3 { 1 } else { 2 };

    let mut scored: Vec<_> = available
        .iter()
        .filter_map(|candidate| {
            let dist = levenshtein(target, candidate);
            if dist <= max_distance && dist > 0 {
                Some((candidate.clone(), dist))
            } else {
                None
            }
        })
        .collect();

    scored.sort_by_key(|(_, dist)| *dist);
    scored.truncate(3);
    scored.into_iter().map(|(s, _)| s).collect()
}
