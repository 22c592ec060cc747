//! Namespace manager tests: registration, atomic reload, defaults copy.

use std::sync::Arc;

use lingo::cache::{TieredCache, cache_key};
use lingo::config::{CacheSettings, DataPaths};
use lingo::events::{EventBus, TranslationEvent};
use lingo::namespace::{NamespaceError, NamespaceManager};
use lingo::registry::TranslationRegistry;
use lingo::types::{Language, LanguageCode};
use tempfile::TempDir;

fn lang(code: &str) -> LanguageCode {
    LanguageCode::parse(code).unwrap()
}

fn languages() -> Vec<Language> {
    vec![
        Language {
            code: lang("pt_br"),
            name: "Português".to_string(),
            enabled: true,
        },
        Language {
            code: lang("en_us"),
            name: "English".to_string(),
            enabled: true,
        },
        Language {
            code: lang("fr_fr"),
            name: "Français".to_string(),
            enabled: false,
        },
    ]
}

struct Fixture {
    _root: TempDir,
    paths: DataPaths,
    registry: Arc<TranslationRegistry>,
    cache: Arc<TieredCache>,
    events: EventBus,
    manager: NamespaceManager,
}

fn fixture() -> Fixture {
    let root = TempDir::new().unwrap();
    let paths = DataPaths::new(root.path());
    let registry = Arc::new(TranslationRegistry::new());
    let cache = Arc::new(TieredCache::new(&CacheSettings::default()));
    let events = EventBus::default();
    let manager = NamespaceManager::new(
        paths.clone(),
        languages(),
        lang("pt_br"),
        Arc::clone(&registry),
        Arc::clone(&cache),
        events.clone(),
    );
    Fixture {
        _root: root,
        paths,
        registry,
        cache,
        events,
        manager,
    }
}

fn write_file(f: &Fixture, language: &str, ns: &str, name: &str, content: &str) {
    let dir = f.paths.namespace_dir(&lang(language), ns);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(name), content).unwrap();
}

// === Registration ===

#[tokio::test]
async fn register_loads_all_enabled_languages() {
    let f = fixture();
    write_file(&f, "pt_br", "app", "messages.yml", "hello: Olá\n");
    write_file(&f, "en_us", "app", "messages.yml", "hello: Hello\n");
    write_file(&f, "fr_fr", "app", "messages.yml", "hello: Bonjour\n");

    let count = f.manager.register("app", None).await.unwrap();
    assert_eq!(count, 2); // fr_fr is disabled

    assert_eq!(
        f.registry.get(&lang("pt_br"), "app", "hello").unwrap().text,
        "Olá"
    );
    assert_eq!(
        f.registry.get(&lang("en_us"), "app", "hello").unwrap().text,
        "Hello"
    );
    assert!(f.registry.get(&lang("fr_fr"), "app", "hello").is_none());
    assert!(f.manager.is_registered("app"));
}

#[tokio::test]
async fn reload_of_unregistered_namespace_fails() {
    let f = fixture();
    let err = f.manager.reload("ghost").await.unwrap_err();
    assert!(matches!(err, NamespaceError::NotRegistered { .. }));
}

#[tokio::test]
async fn register_copies_defaults_into_empty_source_dir() {
    let f = fixture();
    let defaults = TempDir::new().unwrap();
    std::fs::write(defaults.path().join("messages.yml"), "hello: Oi\n").unwrap();

    f.manager
        .register("fresh", Some(defaults.path()))
        .await
        .unwrap();

    let copied = f
        .paths
        .namespace_dir(&lang("pt_br"), "fresh")
        .join("messages.yml");
    assert!(copied.exists());
    assert_eq!(
        f.registry.get(&lang("pt_br"), "fresh", "hello").unwrap().text,
        "Oi"
    );
}

#[tokio::test]
async fn defaults_do_not_overwrite_existing_files() {
    let f = fixture();
    write_file(&f, "pt_br", "app", "messages.yml", "hello: Existing\n");
    let defaults = TempDir::new().unwrap();
    std::fs::write(defaults.path().join("messages.yml"), "hello: Default\n").unwrap();

    f.manager
        .register("app", Some(defaults.path()))
        .await
        .unwrap();
    assert_eq!(
        f.registry.get(&lang("pt_br"), "app", "hello").unwrap().text,
        "Existing"
    );
}

// === Reload semantics ===

#[tokio::test]
async fn reload_replaces_previous_snapshot() {
    let f = fixture();
    write_file(&f, "pt_br", "app", "messages.yml", "welcome: A\nstale: yes\n");
    f.manager.register("app", None).await.unwrap();

    // Edit the file: one key changes, one disappears.
    write_file(&f, "pt_br", "app", "messages.yml", "welcome: B\n");
    f.manager.reload("app").await.unwrap();

    assert_eq!(
        f.registry.get(&lang("pt_br"), "app", "welcome").unwrap().text,
        "B"
    );
    assert!(f.registry.get(&lang("pt_br"), "app", "stale").is_none());
}

#[tokio::test]
async fn reload_invalidates_cache_slice_and_emits_event() {
    let f = fixture();
    write_file(&f, "pt_br", "app", "messages.yml", "welcome: A\n");
    f.manager.register("app", None).await.unwrap();

    let mut rx = f.events.subscribe();
    f.cache
        .l1
        .put(cache_key("pt_br", "app", "welcome"), "A".to_string());
    f.cache
        .l1
        .put(cache_key("pt_br", "other", "x"), "keep".to_string());

    write_file(&f, "pt_br", "app", "messages.yml", "welcome: B\n");
    f.manager.reload("app").await.unwrap();

    assert_eq!(f.cache.l1.get(&cache_key("pt_br", "app", "welcome")), None);
    assert_eq!(
        f.cache.l1.get(&cache_key("pt_br", "other", "x")),
        Some("keep".to_string())
    );

    // Two reload events: registration and the explicit reload.
    let mut saw_reload = false;
    while let Ok(event) = rx.try_recv() {
        if let TranslationEvent::NamespaceReloaded { namespace, .. } = event {
            assert_eq!(namespace, "app");
            saw_reload = true;
        }
    }
    assert!(saw_reload);
}

#[tokio::test]
async fn bad_file_is_skipped_not_fatal() {
    let f = fixture();
    write_file(&f, "pt_br", "app", "good.yml", "hello: Olá\n");
    write_file(&f, "pt_br", "app", "bad.yml", "hello: [unclosed\n");

    let count = f.manager.register("app", None).await.unwrap();
    assert_eq!(count, 1);
    assert_eq!(
        f.registry.get(&lang("pt_br"), "app", "hello").unwrap().text,
        "Olá"
    );
}

#[tokio::test]
async fn concurrent_readers_see_old_or_new_snapshot() {
    let f = fixture();
    write_file(&f, "pt_br", "app", "messages.yml", "welcome: A\n");
    f.manager.register("app", None).await.unwrap();

    write_file(&f, "pt_br", "app", "messages.yml", "welcome: B\n");

    let registry = Arc::clone(&f.registry);
    let reader = tokio::spawn(async move {
        let language = lang("pt_br");
        for _ in 0..200 {
            if let Some(entry) = registry.get(&language, "app", "welcome") {
                assert!(entry.text == "A" || entry.text == "B");
            }
            tokio::task::yield_now().await;
        }
    });

    f.manager.reload("app").await.unwrap();
    reader.await.unwrap();

    // After the reload future completed, only the new value is visible.
    assert_eq!(
        f.registry.get(&lang("pt_br"), "app", "welcome").unwrap().text,
        "B"
    );
}

// === Unregister ===

#[tokio::test]
async fn unregister_clears_registry_and_reports() {
    let f = fixture();
    write_file(&f, "pt_br", "app", "messages.yml", "hello: Olá\n");
    f.manager.register("app", None).await.unwrap();
    assert_eq!(f.manager.registered(), vec!["app".to_string()]);
    assert_eq!(f.manager.stats("app").unwrap().entries, 1);

    assert!(f.manager.unregister("app"));
    assert!(!f.manager.is_registered("app"));
    assert_eq!(f.registry.count_for("app"), 0);
    assert!(!f.manager.unregister("app"));
    assert!(f.manager.stats("app").is_none());
}
