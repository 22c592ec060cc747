//! Dynamic store tests: CRUD, plural columns, sync metadata, registry
//! integration.

use std::sync::Arc;

use lingo::cache::{TieredCache, cache_key};
use lingo::config::CacheSettings;
use lingo::dynamic::{DynamicStore, DynamicTranslationRepository, StoreError, SyncStatus};
use lingo::events::{EventBus, TranslationEvent};
use lingo::registry::TranslationRegistry;
use lingo::testing::MemoryDynamicTranslationRepository;
use lingo::types::{LanguageCode, PluralForms, Translation, TranslationOrigin};

fn lang(code: &str) -> LanguageCode {
    LanguageCode::parse(code).unwrap()
}

struct Fixture {
    repo: Arc<MemoryDynamicTranslationRepository>,
    registry: Arc<TranslationRegistry>,
    cache: Arc<TieredCache>,
    events: EventBus,
    store: DynamicStore,
}

fn fixture() -> Fixture {
    let repo = Arc::new(MemoryDynamicTranslationRepository::new());
    let registry = Arc::new(TranslationRegistry::new());
    let cache = Arc::new(TieredCache::new(&CacheSettings::default()));
    let events = EventBus::default();
    let store = DynamicStore::new(
        Arc::clone(&repo) as _,
        Arc::clone(&registry),
        Arc::clone(&cache),
        events.clone(),
    );
    Fixture {
        repo,
        registry,
        cache,
        events,
        store,
    }
}

// === Create / update / delete ===

#[tokio::test]
async fn create_persists_registers_and_emits() {
    let f = fixture();
    let mut rx = f.events.subscribe();

    f.store
        .create("app", "greeting", &lang("en_us"), "Hello")
        .await
        .unwrap();

    assert_eq!(f.repo.row_count(), 1);
    assert_eq!(
        f.registry.get(&lang("en_us"), "app", "greeting").unwrap().text,
        "Hello"
    );
    assert!(matches!(
        rx.try_recv().unwrap(),
        TranslationEvent::Created { .. }
    ));

    let row = f
        .store
        .get("app", "greeting", &lang("en_us"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.sync_status, SyncStatus::Pending);
    assert_eq!(row.origin, TranslationOrigin::Api);
}

#[tokio::test]
async fn create_twice_fails() {
    let f = fixture();
    f.store
        .create("app", "greeting", &lang("en_us"), "Hello")
        .await
        .unwrap();
    let err = f
        .store
        .create("app", "greeting", &lang("en_us"), "Hello again")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists { .. }));
}

#[tokio::test]
async fn update_requires_existing_entry() {
    let f = fixture();
    let err = f
        .store
        .update("app", "ghost", &lang("en_us"), "boo")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[tokio::test]
async fn update_invalidates_cache_slice() {
    let f = fixture();
    f.store
        .create("app", "motd", &lang("en_us"), "old")
        .await
        .unwrap();
    f.cache
        .l1
        .put(cache_key("en_us", "app", "motd"), "old".to_string());

    f.store
        .update("app", "motd", &lang("en_us"), "new")
        .await
        .unwrap();

    assert_eq!(f.cache.l1.get(&cache_key("en_us", "app", "motd")), None);
    assert_eq!(
        f.registry.get(&lang("en_us"), "app", "motd").unwrap().text,
        "new"
    );
    // Local edit resets the sync state.
    let row = f
        .store
        .get("app", "motd", &lang("en_us"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.sync_status, SyncStatus::Pending);
}

#[tokio::test]
async fn delete_unregisters_single_entry() {
    let f = fixture();
    f.store
        .create("app", "bye", &lang("en_us"), "Bye")
        .await
        .unwrap();

    assert!(f.store.delete("app", "bye", &lang("en_us")).await.unwrap());
    assert!(f.registry.get(&lang("en_us"), "app", "bye").is_none());
    assert!(!f.store.delete("app", "bye", &lang("en_us")).await.unwrap());
}

#[tokio::test]
async fn delete_namespace_spares_file_entries() {
    let f = fixture();
    // One file-loaded entry shares the namespace.
    f.registry.register(
        Translation::builder()
            .namespace("app")
            .key("from-file")
            .language(lang("en_us"))
            .text("file text")
            .origin(TranslationOrigin::File)
            .build(),
    );
    f.store
        .create("app", "dynamic-a", &lang("en_us"), "A")
        .await
        .unwrap();
    f.store
        .create("app", "dynamic-b", &lang("pt_br"), "B")
        .await
        .unwrap();

    let deleted = f.store.delete_namespace("app").await.unwrap();
    assert_eq!(deleted, 2);
    assert_eq!(f.store.count("app").await.unwrap(), 0);
    assert!(f.registry.get(&lang("en_us"), "app", "dynamic-a").is_none());
    assert!(f.registry.get(&lang("pt_br"), "app", "dynamic-b").is_none());
    assert!(f.registry.get(&lang("en_us"), "app", "from-file").is_some());
}

// === Plural forms ===

#[tokio::test]
async fn plural_forms_round_trip() {
    let f = fixture();
    let forms = PluralForms::builder()
        .one("1 item".to_string())
        .other("{count} items".to_string())
        .build();
    f.store
        .create_with_plurals("shop", "items", &lang("en_us"), "{count} items", forms)
        .await
        .unwrap();

    let row = f
        .store
        .get("shop", "items", &lang("en_us"))
        .await
        .unwrap()
        .unwrap();
    let forms = row.plural_forms.unwrap();
    assert_eq!(forms.one.as_deref(), Some("1 item"));
    assert_eq!(forms.other, "{count} items");

    // The registry entry carries the forms for the resolver's plural path.
    let registered = f.registry.get(&lang("en_us"), "shop", "items").unwrap();
    assert!(registered.plural_forms.is_some());
}

#[tokio::test]
async fn update_plurals_keeps_other_as_text() {
    let f = fixture();
    f.store
        .create("shop", "items", &lang("en_us"), "items")
        .await
        .unwrap();
    let forms = PluralForms::builder()
        .one("1 item".to_string())
        .other("{count} items".to_string())
        .build();
    f.store
        .update_plurals("shop", "items", &lang("en_us"), forms)
        .await
        .unwrap();

    let row = f
        .store
        .get("shop", "items", &lang("en_us"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.text, "{count} items");
}

// === Dynamic wins over file ===

#[tokio::test]
async fn dynamic_overrides_file_entry_for_reads() {
    let f = fixture();
    f.registry.register(
        Translation::builder()
            .namespace("app")
            .key("motd")
            .language(lang("en_us"))
            .text("from file")
            .origin(TranslationOrigin::File)
            .build(),
    );

    f.store
        .create("app", "motd", &lang("en_us"), "from api")
        .await
        .unwrap();
    assert_eq!(
        f.registry.get(&lang("en_us"), "app", "motd").unwrap().text,
        "from api"
    );
}

#[tokio::test]
async fn reapply_restores_dynamic_after_file_reload() {
    let f = fixture();
    f.store
        .create("app", "motd", &lang("en_us"), "from api")
        .await
        .unwrap();

    // A file reload wipes the namespace slice and loads file entries.
    f.registry.clear_namespace("app");
    f.registry.register(
        Translation::builder()
            .namespace("app")
            .key("motd")
            .language(lang("en_us"))
            .text("from file")
            .origin(TranslationOrigin::File)
            .build(),
    );

    let count = f.store.reapply(Some("app")).await.unwrap();
    assert_eq!(count, 1);
    assert_eq!(
        f.registry.get(&lang("en_us"), "app", "motd").unwrap().text,
        "from api"
    );
}

// === Sync metadata ===

#[tokio::test]
async fn upsert_from_sync_sets_metadata() {
    let f = fixture();
    let created = f
        .store
        .upsert_from_sync("app", "hello", &lang("en_us"), "Hi", "abc123")
        .await
        .unwrap();
    assert!(created);

    let row = f
        .store
        .get("app", "hello", &lang("en_us"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.sync_status, SyncStatus::Synced);
    assert_eq!(row.crowdin_hash.as_deref(), Some("abc123"));
    assert!(row.last_synced_at.is_some());
    assert_eq!(row.origin, TranslationOrigin::Sync);

    let updated = f
        .store
        .upsert_from_sync("app", "hello", &lang("en_us"), "Hi!", "def456")
        .await
        .unwrap();
    assert!(!updated);
}

#[tokio::test]
async fn status_queries_and_batches() {
    let f = fixture();
    f.store
        .create("app", "a", &lang("en_us"), "A")
        .await
        .unwrap();
    f.store
        .create("app", "b", &lang("en_us"), "B")
        .await
        .unwrap();

    let pending = f
        .repo
        .find_by_status("app", SyncStatus::Pending)
        .await
        .unwrap();
    assert_eq!(pending.len(), 2);

    let keys: Vec<(String, LanguageCode)> = pending
        .iter()
        .map(|row| (row.key.clone(), row.language.clone()))
        .collect();
    f.repo
        .batch_update_sync_status("app", &keys, SyncStatus::Synced, Some(chrono::Utc::now()))
        .await
        .unwrap();

    assert!(f
        .repo
        .find_by_status("app", SyncStatus::Pending)
        .await
        .unwrap()
        .is_empty());

    f.repo
        .update_crowdin_hash("app", "a", &lang("en_us"), "h1")
        .await
        .unwrap();
    let hashes = f.repo.crowdin_hashes("app").await.unwrap();
    assert_eq!(hashes.get("a:en_us").map(String::as_str), Some("h1"));
}

#[tokio::test]
async fn mark_conflict_flags_entry() {
    let f = fixture();
    f.store
        .create("app", "a", &lang("en_us"), "A")
        .await
        .unwrap();
    f.store
        .mark_conflict("app", "a", &lang("en_us"))
        .await
        .unwrap();
    let row = f
        .store
        .get("app", "a", &lang("en_us"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.sync_status, SyncStatus::Conflict);
}
