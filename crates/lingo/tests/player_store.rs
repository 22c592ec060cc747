//! Player language store tests over the in-memory repository.

use std::sync::Arc;
use std::time::Duration;

use lingo::player::PlayerLanguageStore;
use lingo::testing::MemoryPlayerLanguageRepository;
use lingo::types::LanguageCode;
use uuid::Uuid;

fn lang(code: &str) -> LanguageCode {
    LanguageCode::parse(code).unwrap()
}

fn store() -> (Arc<MemoryPlayerLanguageRepository>, PlayerLanguageStore) {
    let repo = Arc::new(MemoryPlayerLanguageRepository::new());
    let store = PlayerLanguageStore::new(Arc::clone(&repo) as _);
    (repo, store)
}

/// Wait for the dispatched persistence task to land.
async fn settle(repo: &MemoryPlayerLanguageRepository, expected_rows: usize) {
    for _ in 0..100 {
        if repo.row_count() == expected_rows {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("persistence never reached {expected_rows} rows");
}

#[tokio::test]
async fn set_is_write_through_and_persists_async() {
    let (repo, store) = store();
    let player = Uuid::new_v4();

    store.set(player, lang("en_us"), false).await;

    // Cache reflects the value immediately.
    let cached = store.get_cached(player).unwrap();
    assert_eq!(cached.language, lang("en_us"));
    assert!(!cached.auto_detected);

    settle(&repo, 1).await;
}

#[tokio::test]
async fn unknown_player_is_none() {
    let (_repo, store) = store();
    assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn get_caches_database_reads() {
    let (repo, store) = store();
    let player = Uuid::new_v4();
    store.set(player, lang("pt_br"), false).await;
    settle(&repo, 1).await;

    // A second store over the same repository starts cold and warms up.
    let second = PlayerLanguageStore::new(Arc::clone(&repo) as _);
    assert!(second.get_cached(player).is_none());
    assert_eq!(
        second.get(player).await.unwrap().unwrap().language,
        lang("pt_br")
    );
    assert!(second.get_cached(player).is_some());
}

#[tokio::test]
async fn persistence_failure_keeps_cache_value() {
    let (repo, store) = store();
    let player = Uuid::new_v4();
    repo.set_failing(true);

    store.set(player, lang("en_us"), false).await;
    // The session keeps working from cache even though the write failed.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(store.get(player).await.unwrap().unwrap().language, lang("en_us"));
    assert_eq!(repo.row_count(), 0);
}

#[tokio::test]
async fn detect_normalizes_and_marks_auto() {
    let (repo, store) = store();
    let player = Uuid::new_v4();

    let detected = store.detect(player, "pt-BR").await.unwrap();
    assert_eq!(detected, Some(lang("pt_br")));
    let pref = store.get_cached(player).unwrap();
    assert!(pref.auto_detected);
    settle(&repo, 1).await;
}

#[tokio::test]
async fn detect_never_overwrites_existing_choice() {
    let (_repo, store) = store();
    let player = Uuid::new_v4();
    store.set(player, lang("en_us"), false).await;

    assert_eq!(store.detect(player, "pt-BR").await.unwrap(), None);
    assert_eq!(store.get_cached(player).unwrap().language, lang("en_us"));
}

#[tokio::test]
async fn detect_ignores_unknown_locales() {
    let (_repo, store) = store();
    let player = Uuid::new_v4();
    assert_eq!(store.detect(player, "gibberish").await.unwrap(), None);
    assert!(store.get_cached(player).is_none());
}

#[tokio::test]
async fn remove_clears_cache_and_database() {
    let (repo, store) = store();
    let player = Uuid::new_v4();
    store.set(player, lang("en_us"), false).await;
    settle(&repo, 1).await;

    assert!(store.remove(player).await.unwrap());
    assert!(store.get_cached(player).is_none());
    assert_eq!(repo.row_count(), 0);
    assert!(!store.remove(player).await.unwrap());
}

#[tokio::test]
async fn histogram_and_list_by_language() {
    let (repo, store) = store();
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let c = Uuid::new_v4();
    store.set(a, lang("en_us"), false).await;
    store.set(b, lang("en_us"), false).await;
    store.set(c, lang("pt_br"), false).await;
    settle(&repo, 3).await;

    let histogram = store.histogram().await.unwrap();
    assert_eq!(histogram["en_us"], 2);
    assert_eq!(histogram["pt_br"], 1);

    let mut en_players = store.list_by_language(&lang("en_us")).await.unwrap();
    en_players.sort();
    let mut expected = vec![a, b];
    expected.sort();
    assert_eq!(en_players, expected);
}

#[tokio::test]
async fn save_all_flushes_cache() {
    let (repo, store) = store();
    let player = Uuid::new_v4();
    repo.set_failing(true);
    store.set(player, lang("en_us"), false).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(repo.row_count(), 0);

    repo.set_failing(false);
    store.save_all().await.unwrap();
    assert_eq!(repo.row_count(), 1);
}
