//! Resolver tests: fallback chain, plural dispatch, cache interaction.

use std::collections::HashMap;
use std::sync::Arc;

use lingo::cache::{TieredCache, cache_key};
use lingo::config::{CacheSettings, MissingSettings};
use lingo::plural::PluralSelector;
use lingo::registry::TranslationRegistry;
use lingo::resolver::{Resolver, ResolverOptions};
use lingo::types::{LanguageCode, PluralForms, Translation, TranslationOrigin};

fn lang(code: &str) -> LanguageCode {
    LanguageCode::parse(code).unwrap()
}

fn entry(language: &str, ns: &str, key: &str, text: &str) -> Translation {
    Translation::builder()
        .namespace(ns)
        .key(key)
        .language(lang(language))
        .text(text)
        .origin(TranslationOrigin::File)
        .build()
}

struct Fixture {
    registry: Arc<TranslationRegistry>,
    cache: Arc<TieredCache>,
    resolver: Resolver,
}

fn fixture(cache_substituted: bool) -> Fixture {
    let registry = Arc::new(TranslationRegistry::new());
    let cache = Arc::new(TieredCache::new(&CacheSettings::default()));
    let resolver = Resolver::new(
        Arc::clone(&registry),
        Arc::clone(&cache),
        PluralSelector::new(),
        ResolverOptions {
            default_language: lang("pt_br"),
            missing: MissingSettings::default(),
            cache_substituted,
        },
    );
    Fixture {
        registry,
        cache,
        resolver,
    }
}

fn no_args() -> HashMap<String, String> {
    HashMap::new()
}

// === Fallback chain ===

#[test]
fn per_user_resolution_with_fallback() {
    // Registry has only the default-language (pt_br) entry; an en_us player
    // still gets the pt_br text with placeholders applied.
    let f = fixture(false);
    f.registry
        .register(entry("pt_br", "app", "hello", "Olá, {name}!"));

    let args = HashMap::from([("name".to_string(), "Ana".to_string())]);
    assert_eq!(
        f.resolver.resolve(&lang("en_us"), "app", "hello", &args, None),
        "Olá, Ana!"
    );
}

#[test]
fn requested_language_wins_over_default() {
    let f = fixture(false);
    f.registry.register(entry("pt_br", "app", "hello", "Olá!"));
    f.registry.register(entry("en_us", "app", "hello", "Hello!"));

    assert_eq!(
        f.resolver
            .resolve(&lang("en_us"), "app", "hello", &no_args(), None),
        "Hello!"
    );
    assert_eq!(
        f.resolver
            .resolve(&lang("pt_br"), "app", "hello", &no_args(), None),
        "Olá!"
    );
}

#[test]
fn missing_key_formats_marker() {
    let f = fixture(false);
    assert_eq!(
        f.resolver
            .resolve(&lang("en_us"), "app", "bye", &no_args(), None),
        "[Missing: bye]"
    );
}

#[test]
fn missing_with_show_key_disabled_is_empty() {
    let registry = Arc::new(TranslationRegistry::new());
    let cache = Arc::new(TieredCache::new(&CacheSettings::default()));
    let resolver = Resolver::new(
        Arc::clone(&registry),
        cache,
        PluralSelector::new(),
        ResolverOptions {
            default_language: lang("pt_br"),
            missing: MissingSettings {
                show_key: false,
                ..MissingSettings::default()
            },
            cache_substituted: false,
        },
    );
    assert_eq!(
        resolver.resolve(&lang("en_us"), "app", "bye", &no_args(), None),
        ""
    );
}

// === Plural selection ===

#[test]
fn plural_selects_suffixed_keys() {
    let f = fixture(false);
    f.registry
        .register(entry("en_us", "shop", "items.one", "1 item"));
    f.registry
        .register(entry("en_us", "shop", "items.other", "{count} items"));

    assert_eq!(
        f.resolver
            .resolve(&lang("en_us"), "shop", "items", &no_args(), Some(1)),
        "1 item"
    );
    assert_eq!(
        f.resolver
            .resolve(&lang("en_us"), "shop", "items", &no_args(), Some(5)),
        "5 items"
    );
}

#[test]
fn plural_falls_back_to_other_then_base() {
    let f = fixture(false);
    f.registry
        .register(entry("en_us", "shop", "coins.other", "{count} coins"));
    f.registry.register(entry("en_us", "shop", "gems", "gems"));

    // `coins.one` is absent; OTHER catches count=1.
    assert_eq!(
        f.resolver
            .resolve(&lang("en_us"), "shop", "coins", &no_args(), Some(1)),
        "1 coins"
    );
    // No plural keys at all; the base key serves every count.
    assert_eq!(
        f.resolver
            .resolve(&lang("en_us"), "shop", "gems", &no_args(), Some(3)),
        "gems"
    );
}

#[test]
fn plural_forms_on_base_entry_win() {
    let f = fixture(false);
    let forms = PluralForms::builder()
        .one("one fish".to_string())
        .other("{count} fishes".to_string())
        .build();
    f.registry.register(
        Translation::builder()
            .namespace("shop")
            .key("fish")
            .language(lang("en_us"))
            .text("{count} fishes")
            .plural_forms(forms)
            .origin(TranslationOrigin::Api)
            .build(),
    );

    assert_eq!(
        f.resolver
            .resolve(&lang("en_us"), "shop", "fish", &no_args(), Some(1)),
        "one fish"
    );
    assert_eq!(
        f.resolver
            .resolve(&lang("en_us"), "shop", "fish", &no_args(), Some(4)),
        "4 fishes"
    );
}

#[test]
fn explicit_count_placeholder_wins_over_implicit() {
    let f = fixture(false);
    f.registry
        .register(entry("en_us", "shop", "items.other", "{count} items"));
    let args = HashMap::from([("count".to_string(), "many".to_string())]);
    assert_eq!(
        f.resolver
            .resolve(&lang("en_us"), "shop", "items", &args, Some(5)),
        "many items"
    );
}

#[test]
fn negative_count_degrades_to_other() {
    let f = fixture(false);
    f.registry
        .register(entry("en_us", "shop", "items.one", "1 item"));
    f.registry
        .register(entry("en_us", "shop", "items.other", "{count} items"));
    assert_eq!(
        f.resolver
            .resolve(&lang("en_us"), "shop", "items", &no_args(), Some(-2)),
        "-2 items"
    );
}

// === Pass-through and placeholders ===

#[test]
fn unfilled_placeholder_passes_through() {
    let f = fixture(false);
    f.registry.register(entry("en_us", "app", "hi", "Hi {name}"));
    assert_eq!(
        f.resolver
            .resolve(&lang("en_us"), "app", "hi", &no_args(), None),
        "Hi {name}"
    );
}

#[test]
fn percent_tokens_untouched() {
    let f = fixture(false);
    f.registry
        .register(entry("en_us", "app", "hi", "Hi %player_name%"));
    assert_eq!(
        f.resolver
            .resolve(&lang("en_us"), "app", "hi", &no_args(), None),
        "Hi %player_name%"
    );
}

// === Reserved lang references ===

#[test]
fn lang_refs_expand_before_compilation() {
    let f = fixture(false);
    f.registry
        .register(entry("en_us", "common", "prefix", "[Server]"));
    f.registry.register(entry(
        "en_us",
        "app",
        "welcome",
        "{lang:common:prefix} Welcome {name}",
    ));

    let args = HashMap::from([("name".to_string(), "Ana".to_string())]);
    assert_eq!(
        f.resolver
            .resolve(&lang("en_us"), "app", "welcome", &args, None),
        "[Server] Welcome Ana"
    );
}

#[test]
fn same_namespace_lang_ref() {
    let f = fixture(false);
    f.registry.register(entry("en_us", "app", "brand", "Lingo"));
    f.registry
        .register(entry("en_us", "app", "about", "Powered by {lang:brand}"));
    assert_eq!(
        f.resolver
            .resolve(&lang("en_us"), "app", "about", &no_args(), None),
        "Powered by Lingo"
    );
}

#[test]
fn unresolvable_lang_ref_stays_verbatim() {
    let f = fixture(false);
    f.registry
        .register(entry("en_us", "app", "about", "See {lang:nope}"));
    assert_eq!(
        f.resolver
            .resolve(&lang("en_us"), "app", "about", &no_args(), None),
        "See {lang:nope}"
    );
}

// === L1 policy ===

#[test]
fn placeholder_free_resolutions_populate_l1() {
    let f = fixture(false);
    f.registry.register(entry("en_us", "app", "plain", "Plain"));

    assert_eq!(
        f.resolver
            .resolve(&lang("en_us"), "app", "plain", &no_args(), None),
        "Plain"
    );
    assert_eq!(
        f.cache.l1.get(&cache_key("en_us", "app", "plain")),
        Some("Plain".to_string())
    );
}

#[test]
fn substituted_resolutions_skip_l1_by_default() {
    let f = fixture(false);
    f.registry.register(entry("en_us", "app", "hi", "Hi {name}"));

    let args = HashMap::from([("name".to_string(), "Ana".to_string())]);
    f.resolver.resolve(&lang("en_us"), "app", "hi", &args, None);
    // Only the compiled template landed in a cache, not the result.
    assert_eq!(f.cache.l1.len(), 0);
    assert_eq!(f.cache.l3.len(), 1);
}

#[test]
fn substituted_caching_can_be_enabled() {
    let f = fixture(true);
    f.registry.register(entry("en_us", "app", "hi", "Hi {name}"));

    let args = HashMap::from([("name".to_string(), "Ana".to_string())]);
    let first = f.resolver.resolve(&lang("en_us"), "app", "hi", &args, None);
    let second = f.resolver.resolve(&lang("en_us"), "app", "hi", &args, None);
    assert_eq!(first, "Hi Ana");
    assert_eq!(second, "Hi Ana");
    assert_eq!(f.cache.l1.len(), 1);
    assert!(f.cache.l1.stats().hits >= 1);

    // Namespace invalidation still reaches the hashed keys.
    f.cache.invalidate_namespace("app");
    assert_eq!(f.cache.l1.len(), 0);
}

// === Cache consistency ===

#[test]
fn stale_l1_is_gone_after_slice_invalidation() {
    let f = fixture(false);
    f.registry.register(entry("en_us", "app", "motd", "old"));
    assert_eq!(
        f.resolver
            .resolve(&lang("en_us"), "app", "motd", &no_args(), None),
        "old"
    );

    // Mutation path: registry first, then slice invalidation.
    f.registry.register(entry("en_us", "app", "motd", "new"));
    f.cache.invalidate_namespace("app");

    assert_eq!(
        f.resolver
            .resolve(&lang("en_us"), "app", "motd", &no_args(), None),
        "new"
    );
}
