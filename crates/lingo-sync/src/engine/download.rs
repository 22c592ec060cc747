//! Download pipeline.
//!
//! Backup, build, poll, unpack, classify, apply, and — on any failure after
//! mutation started — roll the namespace back to the pre-sync snapshot.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::time::Duration;

use chrono::Utc;
use lingo::dynamic::StoreError;
use lingo::loader;
use lingo::types::LanguageCode;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use super::merge::{MergeAction, classify};
use super::{SyncEngine, SyncError, SyncResult, md5_hex};
use crate::backup::BackupEntry;
use crate::client::model::BuildState;
use crate::config::ConflictResolution;
use crate::state::ConflictRecord;

const BUILD_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// One translation value the merge wrote, with what it replaced.
struct AppliedChange {
    key: String,
    language: LanguageCode,
    previous: Option<String>,
}

pub(super) async fn run(
    engine: &SyncEngine,
    namespace: &str,
    result: &mut SyncResult,
) -> Result<(), SyncError> {
    // 1. Pre-sync backup of the namespace's current view.
    if engine.config().backup_before_sync {
        let entries: Vec<BackupEntry> = engine
            .registry_ref()
            .snapshot_namespace(namespace)
            .iter()
            .map(|entry| BackupEntry {
                key: entry.key.clone(),
                language: entry.language.as_str().to_string(),
                text: entry.text.clone(),
            })
            .collect();
        engine.backups_ref().create(namespace, entries).await?;
    }

    // 2. Request a build and poll it to completion, bounded.
    let build_id = engine
        .client_ref()
        .start_build(
            engine.config().download.export_approved_only,
            engine.config().download.skip_untranslated,
        )
        .await?;
    wait_for_build(engine, build_id).await?;

    // 3. Download and unpack the archive into per-language flat maps.
    let archive = engine.client_ref().download_build(build_id).await?;
    let incoming = unpack_archive(engine, namespace, &archive)?;

    // 4-6. Classify and apply; roll back on the first failure.
    let mut applied: Vec<AppliedChange> = Vec::new();
    match apply_incoming(engine, namespace, incoming, result, &mut applied).await {
        Ok(()) => {
            engine.state().record_download(namespace);
            engine.state().save()?;
            Ok(())
        }
        Err(e) => {
            warn!(namespace, error = %e, changes = applied.len(), "merge failed, rolling back");
            rollback(engine, namespace, applied).await;
            Err(e)
        }
    }
}

/// Poll the build until finished, bounded by the configured ceiling.
async fn wait_for_build(engine: &SyncEngine, build_id: i64) -> Result<(), SyncError> {
    let ceiling = Duration::from_secs(engine.config().advanced.build_timeout_seconds);
    let started = Instant::now();
    loop {
        let status = engine.client_ref().build_status(build_id).await?;
        match status.status {
            BuildState::Finished => return Ok(()),
            BuildState::Created | BuildState::InProgress => {
                debug!(build_id, progress = status.progress, "build in progress");
            }
            state @ (BuildState::Canceled | BuildState::Failed) => {
                return Err(SyncError::BuildFailed { state });
            }
        }
        if started.elapsed() >= ceiling {
            return Err(SyncError::BuildTimeout {
                seconds: ceiling.as_secs(),
            });
        }
        sleep(BUILD_POLL_INTERVAL).await;
    }
}

/// Extract this namespace's YAML entries from the build archive.
///
/// Archive layout is `<remote-language>/<dir...>/<ns>.yml`; the first path
/// segment maps to an internal code through the locale table, unmapped
/// languages and foreign namespaces are skipped.
fn unpack_archive(
    engine: &SyncEngine,
    namespace: &str,
    archive: &[u8],
) -> Result<Vec<(LanguageCode, BTreeMap<String, String>)>, SyncError> {
    let reader = Cursor::new(archive);
    let mut zip = zip::ZipArchive::new(reader).map_err(|e| SyncError::Archive {
        message: e.to_string(),
    })?;

    let expected_file = format!("{namespace}.yml");
    let mut extracted = Vec::new();
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(|e| SyncError::Archive {
            message: e.to_string(),
        })?;
        if entry.is_dir() {
            continue;
        }
        let path = entry.name().trim_start_matches('/').to_string();
        let mut segments = path.split('/');
        let Some(remote_language) = segments.next() else {
            continue;
        };
        let Some(file_name) = path.split('/').next_back() else {
            continue;
        };
        if file_name != expected_file {
            continue;
        }
        let Some(language) = engine.config().internal_code(remote_language) else {
            debug!(remote_language, "unmapped remote language skipped");
            continue;
        };

        let mut content = String::new();
        entry
            .read_to_string(&mut content)
            .map_err(|e| SyncError::Archive {
                message: e.to_string(),
            })?;
        match loader::load_str(&content) {
            Ok(flat) => extracted.push((language, flat)),
            Err(e) => {
                warn!(path = %path, error = %e, "unparseable archive entry skipped");
            }
        }
    }
    Ok(extracted)
}

/// Classify and apply every incoming value under the configured policy.
async fn apply_incoming(
    engine: &SyncEngine,
    namespace: &str,
    incoming: Vec<(LanguageCode, BTreeMap<String, String>)>,
    result: &mut SyncResult,
    applied: &mut Vec<AppliedChange>,
) -> Result<(), SyncError> {
    let policy = engine.config().conflict_resolution;
    let skip_untranslated = engine.config().download.skip_untranslated;
    let repo = engine.dynamic_ref().repository();

    let mut manual_conflicts: Vec<ConflictRecord> = Vec::new();
    for (language, texts) in incoming {
        for (key, text) in texts {
            if skip_untranslated && text.trim().is_empty() {
                result.skipped += 1;
                continue;
            }

            let current = engine
                .registry_ref()
                .get(&language, namespace, &key)
                .map(|entry| entry.text.clone());
            let stored_hash = repo
                .find(namespace, &key, &language)
                .await
                .map_err(StoreError::from)?
                .and_then(|row| row.crowdin_hash);

            match classify(current.as_deref(), stored_hash.as_deref(), &text) {
                MergeAction::Skip => {
                    result.skipped += 1;
                }
                MergeAction::Insert | MergeAction::Update => {
                    write_value(engine, namespace, &key, &language, &text, applied, current)
                        .await?;
                    result.downloaded += 1;
                }
                MergeAction::Conflict => {
                    result.conflicts += 1;
                    match policy {
                        ConflictResolution::RemoteWins => {
                            write_value(
                                engine, namespace, &key, &language, &text, applied, current,
                            )
                            .await?;
                            result.downloaded += 1;
                        }
                        ConflictResolution::LocalWins => {
                            result.skipped += 1;
                        }
                        ConflictResolution::Manual => {
                            engine
                                .dynamic_ref()
                                .mark_conflict(namespace, &key, &language)
                                .await?;
                            manual_conflicts.push(ConflictRecord {
                                key: key.clone(),
                                language: language.as_str().to_string(),
                                local: current.unwrap_or_default(),
                                remote: text.clone(),
                                recorded_at: Utc::now(),
                            });
                        }
                    }
                }
            }
        }
    }

    if !manual_conflicts.is_empty() {
        info!(
            namespace,
            conflicts = manual_conflicts.len(),
            "manual conflicts recorded for review"
        );
        engine.state().push_conflicts(namespace, manual_conflicts);
    }
    Ok(())
}

async fn write_value(
    engine: &SyncEngine,
    namespace: &str,
    key: &str,
    language: &LanguageCode,
    text: &str,
    applied: &mut Vec<AppliedChange>,
    previous: Option<String>,
) -> Result<(), SyncError> {
    engine
        .dynamic_ref()
        .upsert_from_sync(namespace, key, language, text, &md5_hex(text))
        .await?;
    applied.push(AppliedChange {
        key: key.to_string(),
        language: language.clone(),
        previous,
    });
    Ok(())
}

/// Undo the merge's writes: restore replaced values, delete inserted ones.
///
/// Best effort; individual restore failures are logged and the rest
/// continues, leaving the engine healthy either way.
async fn rollback(engine: &SyncEngine, namespace: &str, applied: Vec<AppliedChange>) {
    for change in applied.into_iter().rev() {
        let outcome = match &change.previous {
            Some(previous) => engine
                .dynamic_ref()
                .upsert_from_sync(
                    namespace,
                    &change.key,
                    &change.language,
                    previous,
                    &md5_hex(previous),
                )
                .await
                .map(|_| ()),
            None => engine
                .dynamic_ref()
                .delete(namespace, &change.key, &change.language)
                .await
                .map(|_| ()),
        };
        if let Err(e) = outcome {
            warn!(
                namespace,
                key = %change.key,
                language = %change.language,
                error = %e,
                "rollback step failed"
            );
        }
    }
}
