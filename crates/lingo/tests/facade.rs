//! Facade tests: extraction-driven registration, delivery, import/export.

use std::collections::HashMap;
use std::sync::Arc;

use lingo::Translator;
use lingo::config::Settings;
use lingo::testing::{
    MemoryDynamicTranslationRepository, MemoryPlayerLanguageRepository, RecordingChatSink,
};
use lingo::types::LanguageCode;
use tempfile::TempDir;
use uuid::Uuid;

fn lang(code: &str) -> LanguageCode {
    LanguageCode::parse(code).unwrap()
}

struct Fixture {
    _root: TempDir,
    chat: Arc<RecordingChatSink>,
    translator: Translator,
}

fn fixture() -> Fixture {
    let root = TempDir::new().unwrap();
    let chat = RecordingChatSink::shared();
    let translator = Translator::with_repositories(
        Settings::default(),
        root.path(),
        Arc::new(MemoryPlayerLanguageRepository::new()),
        Arc::new(MemoryDynamicTranslationRepository::new()),
        Arc::clone(&chat) as _,
    )
    .unwrap();
    Fixture {
        _root: root,
        chat,
        translator,
    }
}

fn write_namespace_file(f: &Fixture, language: &str, ns: &str, content: &str) {
    let dir = f.translator.paths().namespace_dir(&lang(language), ns);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("messages.yml"), content).unwrap();
}

// === Delivery ===

#[tokio::test]
async fn send_resolves_in_player_language_with_fallback() {
    let f = fixture();
    write_namespace_file(&f, "pt_br", "app", "hello: \"Olá, {name}!\"\n");
    f.translator.register_namespace("app", None).await.unwrap();

    let player = Uuid::new_v4();
    f.translator
        .set_player_language(player, "en_us")
        .await
        .unwrap();

    let args = HashMap::from([("name".to_string(), "Ana".to_string())]);
    f.translator.send(player, "app:hello", &args).await;

    let messages = f.chat.messages();
    assert_eq!(messages.len(), 1);
    // en_us has no entry; the default (pt_br) text is used.
    assert_eq!(messages[0], (Some(player), "Olá, Ana!".to_string()));
}

#[tokio::test]
async fn get_or_default_covers_unknown_keys() {
    let f = fixture();
    write_namespace_file(&f, "pt_br", "app", "hello: Olá\n");
    f.translator.register_namespace("app", None).await.unwrap();

    let player = Uuid::new_v4();
    assert_eq!(
        f.translator
            .get_or_default(player, "app:hello", "fallback", &HashMap::new())
            .await,
        "Olá"
    );
    assert_eq!(
        f.translator
            .get_or_default(player, "app:nope", "fallback", &HashMap::new())
            .await,
        "fallback"
    );
}

#[tokio::test]
async fn broadcast_uses_default_language() {
    let f = fixture();
    write_namespace_file(&f, "pt_br", "app", "announce: Atenção\n");
    f.translator.register_namespace("app", None).await.unwrap();

    f.translator
        .broadcast("app:announce", Some("server.alerts"), &HashMap::new())
        .await;
    assert_eq!(f.chat.messages(), vec![(None, "Atenção".to_string())]);
}

#[tokio::test]
async fn send_batch_delivers_in_order() {
    let f = fixture();
    write_namespace_file(&f, "pt_br", "app", "one: Um\ntwo: Dois\n");
    f.translator.register_namespace("app", None).await.unwrap();

    let player = Uuid::new_v4();
    f.translator
        .send_batch(player, &["app:one", "app:two"], &HashMap::new())
        .await;
    let texts: Vec<String> = f.chat.messages().into_iter().map(|(_, m)| m).collect();
    assert_eq!(texts, vec!["Um".to_string(), "Dois".to_string()]);
}

#[tokio::test]
async fn set_player_language_validates() {
    let f = fixture();
    let player = Uuid::new_v4();
    assert!(f.translator.set_player_language(player, "en_us").await.is_ok());
    assert!(f.translator.set_player_language(player, "EN-US").await.is_err());
    assert!(f.translator.set_player_language(player, "fr_fr").await.is_err());
}

// === Extraction-driven registration ===

#[tokio::test]
async fn register_namespace_extracts_owner_files() {
    let f = fixture();
    let owner = TempDir::new().unwrap();
    std::fs::write(
        owner.path().join("messages.yml"),
        "welcome: \"Bem-vindo\"\n",
    )
    .unwrap();
    std::fs::write(
        owner.path().join("inventories.yml"),
        "shop:\n  title: Loja\n  items:\n    \"0\":\n      type: sword\n      name: Espada\n",
    )
    .unwrap();

    f.translator
        .register_namespace("myplugin", Some(owner.path()))
        .await
        .unwrap();

    // Source-language files were produced and loaded.
    let source_dir = f
        .translator
        .paths()
        .namespace_dir(&lang("pt_br"), "myplugin");
    assert!(source_dir.join("messages.yml").exists());
    assert!(source_dir.join("inventories.yml").exists());

    let player = Uuid::new_v4();
    assert_eq!(
        f.translator
            .get(player, "myplugin:welcome", &HashMap::new())
            .await,
        "Bem-vindo"
    );
    assert_eq!(
        f.translator
            .get(player, "myplugin:shop.items.sword.name", &HashMap::new())
            .await,
        "Espada"
    );

    // Other-language files were created once and are preserved afterwards.
    let en_file = f
        .translator
        .paths()
        .namespace_dir(&lang("en_us"), "myplugin")
        .join("messages.yml");
    assert!(en_file.exists());
    std::fs::write(&en_file, "welcome: Welcome\n").unwrap();

    f.translator
        .register_namespace("myplugin", Some(owner.path()))
        .await
        .unwrap();
    let preserved = std::fs::read_to_string(&en_file).unwrap();
    assert_eq!(preserved, "welcome: Welcome\n");
}

// === Import / export ===

#[tokio::test]
async fn export_then_import_round_trips() {
    let f = fixture();
    write_namespace_file(&f, "pt_br", "app", "a: Um\nnested:\n  b: Dois\n");
    f.translator.register_namespace("app", None).await.unwrap();

    let exported = f
        .translator
        .export_namespace("app", &lang("pt_br"))
        .await
        .unwrap();
    assert!(exported.exists());

    let imported = f
        .translator
        .import_translations(&exported, "imported", &lang("pt_br"), false)
        .await
        .unwrap();
    assert_eq!(imported, 2);

    let player = Uuid::new_v4();
    assert_eq!(
        f.translator
            .get(player, "imported:nested.b", &HashMap::new())
            .await,
        "Dois"
    );
}

#[tokio::test]
async fn import_respects_overwrite_flag() {
    let f = fixture();
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("in.yml");
    std::fs::write(&file, "greet: First\n").unwrap();
    f.translator
        .import_translations(&file, "app", &lang("pt_br"), false)
        .await
        .unwrap();

    std::fs::write(&file, "greet: Second\n").unwrap();
    let skipped = f
        .translator
        .import_translations(&file, "app", &lang("pt_br"), false)
        .await
        .unwrap();
    assert_eq!(skipped, 0);

    let overwritten = f
        .translator
        .import_translations(&file, "app", &lang("pt_br"), true)
        .await
        .unwrap();
    assert_eq!(overwritten, 1);

    let player = Uuid::new_v4();
    assert_eq!(
        f.translator.get(player, "app:greet", &HashMap::new()).await,
        "Second"
    );
}

// === Dynamic lifecycle through the facade ===

#[tokio::test]
async fn delete_all_translations_with_tracking_reset() {
    let f = fixture();
    f.translator
        .dynamic()
        .create("app", "a", &lang("pt_br"), "A")
        .await
        .unwrap();
    assert_eq!(f.translator.dynamic().count("app").await.unwrap(), 1);

    let deleted = f
        .translator
        .delete_all_translations("app", true)
        .await
        .unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(f.translator.dynamic().count("app").await.unwrap(), 0);
}

#[tokio::test]
async fn initialize_recovers_dynamic_entries() {
    let root = TempDir::new().unwrap();
    let dynamic_repo = Arc::new(MemoryDynamicTranslationRepository::new());

    // First engine writes a dynamic translation.
    {
        let translator = Translator::with_repositories(
            Settings::default(),
            root.path(),
            Arc::new(MemoryPlayerLanguageRepository::new()),
            Arc::clone(&dynamic_repo) as _,
            RecordingChatSink::shared() as _,
        )
        .unwrap();
        translator
            .dynamic()
            .create("app", "persisted", &lang("pt_br"), "Sobrevivi")
            .await
            .unwrap();
    }

    // Second engine starts cold and recovers it from the repository.
    let translator = Translator::with_repositories(
        Settings::default(),
        root.path(),
        Arc::new(MemoryPlayerLanguageRepository::new()),
        dynamic_repo as _,
        RecordingChatSink::shared() as _,
    )
    .unwrap();
    assert_eq!(translator.initialize().await.unwrap(), 1);

    let player = Uuid::new_v4();
    assert_eq!(
        translator
            .get(player, "app:persisted", &HashMap::new())
            .await,
        "Sobrevivi"
    );
}
