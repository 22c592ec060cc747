//! YAML translation file loading.
//!
//! Translation files are plain YAML. Nested maps flatten to dotted keys,
//! scalars are used as-is, and lists of strings collapse into a single
//! newline-joined value. The inverse (dot-path insertion into a nested
//! mapping) lives here too so exports and uploads share one shape.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use thiserror::Error;
use tracing::warn;

use crate::plural::PluralCategory;

/// Errors surfaced by the loader.
///
/// Parse failures inside a directory load are not fatal there; the file is
/// logged and skipped so a namespace reload survives one bad file.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("expected a mapping at the document root of '{path}'")]
    NotAMapping { path: PathBuf },
}

/// Load one YAML file into a flat `dotted-key → text` map.
pub fn load_file(path: &Path) -> Result<BTreeMap<String, String>, LoaderError> {
    let content = fs::read_to_string(path).map_err(|e| LoaderError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    load_str(&content).map_err(|message| match message {
        StrError::Parse(message) => LoaderError::Parse {
            path: path.to_path_buf(),
            message,
        },
        StrError::NotAMapping => LoaderError::NotAMapping {
            path: path.to_path_buf(),
        },
    })
}

/// Error shape for [`load_str`]; file-path context is added by callers.
#[derive(Debug, Error)]
pub enum StrError {
    #[error("{0}")]
    Parse(String),
    #[error("expected a mapping at the document root")]
    NotAMapping,
}

/// Load YAML content into a flat `dotted-key → text` map.
///
/// # Example
///
/// ```
/// use lingo::loader::load_str;
///
/// let flat = load_str("menu:\n  title: Shop\n  lore:\n    - line one\n    - line two\n").unwrap();
/// assert_eq!(flat["menu.title"], "Shop");
/// assert_eq!(flat["menu.lore"], "line one\nline two");
/// ```
pub fn load_str(content: &str) -> Result<BTreeMap<String, String>, StrError> {
    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    let doc: Value =
        serde_yaml::from_str(content).map_err(|e| StrError::Parse(e.to_string()))?;
    let Value::Mapping(mapping) = doc else {
        return Err(StrError::NotAMapping);
    };
    let mut flat = BTreeMap::new();
    flatten_into(&Value::Mapping(mapping), "", &mut flat);
    Ok(flat)
}

/// Recursively flatten a YAML value under a dotted prefix.
fn flatten_into(value: &Value, prefix: &str, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Mapping(mapping) => {
            for (k, v) in mapping {
                let Some(key) = scalar_key(k) else {
                    continue;
                };
                let path = if prefix.is_empty() {
                    key
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(v, &path, out);
            }
        }
        Value::Sequence(items) => {
            let lines: Vec<String> = items.iter().filter_map(scalar_text).collect();
            if !lines.is_empty() {
                out.insert(prefix.to_string(), lines.join("\n"));
            }
        }
        other => {
            if let Some(text) = scalar_text(other)
                && !prefix.is_empty()
            {
                out.insert(prefix.to_string(), text);
            }
        }
    }
}

/// Mapping keys can be strings or numbers (inventory slots).
fn scalar_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Stringify a scalar YAML value; nulls and nested structures yield None.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Load and merge every `*.yml` file in a directory.
///
/// Files are visited in name order so later files win deterministically on
/// key collisions. A file that fails to parse is logged and skipped; the
/// rest of the directory still loads. A missing directory is an empty map.
pub fn load_dir(dir: &Path) -> Result<BTreeMap<String, String>, LoaderError> {
    let mut merged = BTreeMap::new();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(merged),
        Err(e) => {
            return Err(LoaderError::Io {
                path: dir.to_path_buf(),
                source: e,
            });
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml"))
        })
        .collect();
    files.sort();

    for file in files {
        match load_file(&file) {
            Ok(flat) => merged.extend(flat),
            Err(LoaderError::Io { path, source }) => {
                return Err(LoaderError::Io { path, source });
            }
            Err(e) => {
                warn!(file = %file.display(), error = %e, "skipping unparseable translation file");
            }
        }
    }
    Ok(merged)
}

/// Split a dotted key into its plural base and category, if it has one.
///
/// `shop.items.one` → `("shop.items", One)`; `shop.items` → `None`.
pub fn split_plural_suffix(key: &str) -> Option<(&str, PluralCategory)> {
    let (base, suffix) = key.rsplit_once('.')?;
    let category = PluralCategory::from_suffix(suffix)?;
    Some((base, category))
}

/// Insert a flat `dotted-key → text` pair into a nested YAML mapping.
///
/// The inverse of flattening; exports and sync uploads build whole files
/// with it.
pub fn insert_dotted(root: &mut Mapping, dotted_key: &str, text: &str) {
    let mut segments = dotted_key.split('.').peekable();
    let mut current = root;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(
                Value::String(segment.to_string()),
                Value::String(text.to_string()),
            );
            return;
        }
        let entry = current
            .entry(Value::String(segment.to_string()))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        // A scalar in the way is replaced by a mapping; the flat form is
        // authoritative here.
        if !entry.is_mapping() {
            *entry = Value::Mapping(Mapping::new());
        }
        let Value::Mapping(next) = entry else {
            unreachable!("entry was just made a mapping");
        };
        current = next;
    }
}

/// Build a nested YAML mapping from a flat map.
pub fn nest(flat: &BTreeMap<String, String>) -> Mapping {
    let mut root = Mapping::new();
    for (key, text) in flat {
        insert_dotted(&mut root, key, text);
    }
    root
}
