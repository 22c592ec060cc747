//! Translatable-content extraction from foreign YAML files.
//!
//! Components that own configuration files (menus, message lists) do not
//! write translation files themselves. The extractors walk those foreign
//! files, pull out the human-visible fields, and emit source-language YAML
//! under the namespace directory. The source-language file is always
//! overwritten — it mirrors the owner's file — while other-language files
//! are only created when absent, never overwritten, so human translations
//! survive re-extraction.

mod inventory;
mod messages;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use thiserror::Error;
use tracing::debug;

pub use inventory::InventoryExtractor;
pub use messages::MessagesExtractor;

use crate::config::DataPaths;
use crate::types::{Language, LanguageCode};

/// Errors from extraction and template emission.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("failed to serialize extracted content: {message}")]
    Serialize { message: String },
}

/// Read and parse a foreign YAML file into a document value.
pub fn read_document(path: &Path) -> Result<Value, ExtractError> {
    let content = fs::read_to_string(path).map_err(|e| ExtractError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_yaml::from_str(&content).map_err(|e| ExtractError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Copy the entire tree. Used by the messages extractor, where every field
/// is translatable.
pub fn extract_all(doc: &Value) -> Mapping {
    match doc {
        Value::Mapping(mapping) => mapping.clone(),
        _ => Mapping::new(),
    }
}

/// Walk the tree and keep values whose key name is whitelisted.
///
/// A whitelisted key keeps its value at its full path (scalar or string
/// list). Sub-maps are recursed into regardless of their key, so nested
/// translatable fields are found wherever they sit; empty branches are
/// dropped.
pub fn extract_fields(doc: &Value, whitelist: &[&str]) -> Mapping {
    let mut out = Mapping::new();
    let Value::Mapping(mapping) = doc else {
        return out;
    };
    for (k, v) in mapping {
        let Value::String(key) = k else { continue };
        if whitelist.contains(&key.as_str()) && is_translatable_value(v) {
            out.insert(k.clone(), v.clone());
        } else if v.is_mapping() {
            let nested = extract_fields(v, whitelist);
            if !nested.is_empty() {
                out.insert(k.clone(), Value::Mapping(nested));
            }
        }
    }
    out
}

/// Scalars and lists of scalars are translatable payloads.
fn is_translatable_value(value: &Value) -> bool {
    match value {
        Value::String(_) => true,
        Value::Sequence(items) => items.iter().all(|item| matches!(item, Value::String(_))),
        _ => false,
    }
}

/// Emit an extracted mapping as namespace translation files.
///
/// The source language file is overwritten; every other enabled language
/// gets the file only if it does not exist yet. Returns the written paths.
pub fn write_namespace_files(
    paths: &DataPaths,
    namespace: &str,
    file_name: &str,
    languages: &[Language],
    source_language: &LanguageCode,
    extracted: &Mapping,
) -> Result<Vec<PathBuf>, ExtractError> {
    let yaml = serde_yaml::to_string(&Value::Mapping(extracted.clone())).map_err(|e| {
        ExtractError::Serialize {
            message: e.to_string(),
        }
    })?;

    let mut written = Vec::new();
    for language in languages.iter().filter(|l| l.enabled) {
        let dir = paths.namespace_dir(&language.code, namespace);
        let file = dir.join(file_name);
        let is_source = &language.code == source_language;
        if !is_source && file.exists() {
            continue;
        }
        fs::create_dir_all(&dir).map_err(|e| ExtractError::Io {
            path: dir.clone(),
            source: e,
        })?;
        fs::write(&file, &yaml).map_err(|e| ExtractError::Io {
            path: file.clone(),
            source: e,
        })?;
        debug!(file = %file.display(), source = is_source, "wrote extracted translation file");
        written.push(file);
    }
    Ok(written)
}
