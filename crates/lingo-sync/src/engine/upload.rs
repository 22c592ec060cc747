//! Upload pipeline.
//!
//! Uploads the whole source file whenever anything changed: the remote
//! replaces files wholesale, so a delta upload would delete every
//! unchanged string. Change detection compares md5 hashes against the
//! stored baseline (state file for file-loaded entries, repository
//! metadata for dynamic ones); an unchanged namespace never touches the
//! remote.

use std::collections::BTreeMap;

use chrono::Utc;
use lingo::dynamic::{StoreError, SyncStatus};
use lingo::loader;
use lingo::types::LanguageCode;
use serde_yaml::Value;
use tracing::{debug, info};

use super::{SyncEngine, SyncError, SyncResult, md5_hex};

pub(super) async fn run(
    engine: &SyncEngine,
    namespace: &str,
    result: &mut SyncResult,
) -> Result<(), SyncError> {
    let source_language = engine.config().source_language.clone();

    // 1. Snapshot the source-language view of the namespace.
    let snapshot = engine
        .registry_ref()
        .snapshot_namespace_language(&source_language, namespace);
    if snapshot.is_empty() {
        debug!(namespace, "nothing to upload");
        return Ok(());
    }
    let mut texts: BTreeMap<String, String> = BTreeMap::new();
    for entry in &snapshot {
        texts.insert(entry.key.clone(), entry.text.clone());
    }

    // 2-4. Hash and classify against the stored baseline.
    let current_hashes: BTreeMap<String, String> = texts
        .iter()
        .map(|(key, text)| (key.clone(), md5_hex(text)))
        .collect();
    let stored = stored_hashes(engine, namespace, &source_language).await?;
    let changed: Vec<&String> = current_hashes
        .iter()
        .filter(|(key, hash)| stored.get(*key) != Some(*hash))
        .map(|(key, _)| key)
        .collect();

    // 5. Unchanged namespace: complete without touching the remote.
    if changed.is_empty() {
        result.skipped += texts.len();
        info!(namespace, entries = texts.len(), "source unchanged, upload skipped");
        return Ok(());
    }

    // Existing remote files are only rewritten when the policy allows it.
    let existing_file = known_file_id(engine, namespace).await?;
    if existing_file.is_some() && !engine.config().upload.update_strings {
        result.skipped += texts.len();
        info!(namespace, "update-strings disabled, upload skipped");
        return Ok(());
    }

    // 6. Serialize ALL entries; the remote replaces the file wholesale.
    let yaml = serde_yaml::to_string(&Value::Mapping(loader::nest(&texts)))
        .map_err(|e| SyncError::Archive {
            message: e.to_string(),
        })?;
    let file_name = format!("{namespace}.yml");

    // 7. Raw bytes to storage.
    let storage_id = engine
        .client_ref()
        .upload_storage(&file_name, yaml.into_bytes())
        .await?;

    // 8. Resolve (or create) the remote directory chain.
    let directory_id = ensure_directories(engine, namespace).await?;

    // 9. Update the existing file or add a new one.
    let file_id = match existing_file {
        Some(file_id) => {
            engine.client_ref().update_file(file_id, storage_id).await?;
            file_id
        }
        None => {
            let file = engine
                .client_ref()
                .add_file(storage_id, &file_name, directory_id)
                .await?;
            file.id
        }
    };
    engine.state().set_file_id(namespace, file_id);

    // 10. Persist the new baseline and flip dynamic rows to synced.
    engine.state().set_hashes(namespace, current_hashes.clone());
    engine.state().save()?;
    mark_dynamic_synced(engine, namespace, &source_language, &current_hashes).await?;

    // Optionally push local non-source translations as suggestions.
    if engine.config().upload_translations {
        upload_translations(engine, namespace, &source_language, file_id).await?;
    }

    result.uploaded += changed.len();
    result.skipped += texts.len() - changed.len();
    Ok(())
}

/// The hash baseline: state-file hashes overlaid with per-row repository
/// hashes (dynamic rows may have synced independently).
async fn stored_hashes(
    engine: &SyncEngine,
    namespace: &str,
    source_language: &LanguageCode,
) -> Result<BTreeMap<String, String>, SyncError> {
    let mut stored = engine.state().hashes(namespace);
    let suffix = format!(":{source_language}");
    let dynamic = engine
        .dynamic_ref()
        .repository()
        .crowdin_hashes(namespace)
        .await
        .map_err(StoreError::from)?;
    for (full_key, hash) in dynamic {
        if let Some(key) = full_key.strip_suffix(&suffix) {
            stored.insert(key.to_string(), hash);
        }
    }
    Ok(stored)
}

/// Walk the directory segments, creating any that are missing, and return
/// the id of the innermost one (the file's parent).
async fn ensure_directories(
    engine: &SyncEngine,
    namespace: &str,
) -> Result<Option<i64>, SyncError> {
    let segments = engine.config().directory_segments(namespace);
    let mut existing = engine.client_ref().list_directories().await?;
    let mut parent: Option<i64> = None;
    for segment in segments {
        let found = existing
            .iter()
            .find(|dir| dir.name == segment && dir.directory_id == parent)
            .map(|dir| dir.id);
        let id = match found {
            Some(id) => id,
            None => {
                let created = engine
                    .client_ref()
                    .create_directory(&segment, parent)
                    .await?;
                debug!(directory = %segment, id = created.id, "created remote directory");
                let id = created.id;
                existing.push(created);
                id
            }
        };
        parent = Some(id);
    }
    Ok(parent)
}

/// The remote file id, from state or by path lookup.
async fn known_file_id(engine: &SyncEngine, namespace: &str) -> Result<Option<i64>, SyncError> {
    if let Some(file_id) = engine.state().file_id(namespace) {
        return Ok(Some(file_id));
    }
    let path = engine.config().remote_file_path(namespace);
    Ok(engine
        .client_ref()
        .file_by_path(&path)
        .await?
        .map(|file| file.id))
}

/// Flip the namespace's source-language dynamic rows to synced with the
/// freshly uploaded hashes. Status flips go through the batch operation in
/// `batch-size` chunks.
async fn mark_dynamic_synced(
    engine: &SyncEngine,
    namespace: &str,
    source_language: &LanguageCode,
    hashes: &BTreeMap<String, String>,
) -> Result<(), SyncError> {
    let repo = engine.dynamic_ref().repository();
    let rows = repo
        .list_namespace(namespace)
        .await
        .map_err(StoreError::from)?;

    let mut synced_keys: Vec<(String, LanguageCode)> = Vec::new();
    for row in rows.iter().filter(|row| &row.language == source_language) {
        if let Some(hash) = hashes.get(&row.key) {
            repo.update_crowdin_hash(namespace, &row.key, source_language, hash)
                .await
                .map_err(StoreError::from)?;
            synced_keys.push((row.key.clone(), source_language.clone()));
        }
    }

    let now = Utc::now();
    let batch_size = engine.config().advanced.batch_size.max(1);
    for chunk in synced_keys.chunks(batch_size) {
        repo.batch_update_sync_status(namespace, chunk, SyncStatus::Synced, Some(now))
            .await
            .map_err(StoreError::from)?;
    }
    Ok(())
}

/// Upload local non-source translations for languages the remote knows.
async fn upload_translations(
    engine: &SyncEngine,
    namespace: &str,
    source_language: &LanguageCode,
    file_id: i64,
) -> Result<(), SyncError> {
    let snapshot = engine.registry_ref().snapshot_namespace(namespace);
    let mut by_language: BTreeMap<LanguageCode, BTreeMap<String, String>> = BTreeMap::new();
    for entry in snapshot {
        if &entry.language == source_language {
            continue;
        }
        by_language
            .entry(entry.language.clone())
            .or_default()
            .insert(entry.key.clone(), entry.text.clone());
    }

    for (language, texts) in by_language {
        let Some(remote_code) = engine.config().remote_code(&language) else {
            debug!(language = %language, "no remote mapping, translation upload skipped");
            continue;
        };
        let yaml = serde_yaml::to_string(&Value::Mapping(loader::nest(&texts)))
            .map_err(|e| SyncError::Archive {
                message: e.to_string(),
            })?;
        let storage_id = engine
            .client_ref()
            .upload_storage(&format!("{namespace}.{language}.yml"), yaml.into_bytes())
            .await?;
        engine
            .client_ref()
            .upload_translation(file_id, remote_code, storage_id)
            .await?;
        info!(namespace, language = %language, "local translations uploaded");
    }
    Ok(())
}
