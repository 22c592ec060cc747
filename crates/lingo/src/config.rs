//! Engine configuration.
//!
//! The settings tree mirrors the host's config file (kebab-case keys).
//! Validation runs once at startup and is fatal: a config that names an
//! invalid language code or disables its own default language never brings
//! the engine up.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Language, LanguageCode, LanguageError};

/// Fatal configuration problems detected at load.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {message}")]
    Parse { message: String },

    #[error(transparent)]
    InvalidLanguageCode(#[from] LanguageError),

    #[error("default language '{code}' is not declared under language.languages")]
    UnknownDefaultLanguage { code: String },

    #[error("default language '{code}' is declared but disabled")]
    DefaultLanguageDisabled { code: String },

    #[error("no enabled languages configured")]
    NoLanguagesEnabled,
}

/// One declared language under `language.languages.<code>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LanguageEntry {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// `language.*` settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LanguageSettings {
    /// Fallback language for the resolver chain.
    pub default: LanguageCode,
    /// Declared languages keyed by code.
    pub languages: BTreeMap<String, LanguageEntry>,
}

impl Default for LanguageSettings {
    fn default() -> Self {
        let mut languages = BTreeMap::new();
        languages.insert(
            "pt_br".to_string(),
            LanguageEntry {
                name: "Português (Brasil)".to_string(),
                enabled: true,
            },
        );
        languages.insert(
            "en_us".to_string(),
            LanguageEntry {
                name: "English (US)".to_string(),
                enabled: true,
            },
        );
        Self {
            default: LanguageCode::parse("pt_br").expect("static code"),
            languages,
        }
    }
}

/// One cache tier's knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TierSettings {
    pub max_size: usize,
    pub ttl_seconds: u64,
    /// L1 only: also cache placeholder-substituted resolutions, keyed with
    /// an argument hash suffix. Off by default.
    #[serde(default)]
    pub cache_substituted: bool,
}

/// `cache.*` settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CacheSettings {
    pub l1: TierSettings,
    pub l3: TierSettings,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            l1: TierSettings {
                max_size: 10_000,
                ttl_seconds: 300,
                cache_substituted: false,
            },
            l3: TierSettings {
                max_size: 5_000,
                ttl_seconds: 1_800,
                cache_substituted: false,
            },
        }
    }
}

/// `missing.*` settings: what the resolver does for absent keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MissingSettings {
    /// When false, missing keys resolve to an empty string instead of the
    /// formatted marker.
    #[serde(default = "default_true")]
    pub show_key: bool,
    /// Marker template; `{key}` is substituted with the requested key.
    #[serde(default = "default_missing_format")]
    pub format: String,
    /// Log each distinct missing key once.
    #[serde(default = "default_true")]
    pub log: bool,
}

impl Default for MissingSettings {
    fn default() -> Self {
        Self {
            show_key: true,
            format: default_missing_format(),
            log: true,
        }
    }
}

/// `database.*` settings: datasource name and table names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DatabaseSettings {
    #[serde(default = "default_datasource")]
    pub datasource: String,
    #[serde(default)]
    pub tables: TableSettings,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            datasource: default_datasource(),
            tables: TableSettings::default(),
        }
    }
}

/// Table names, overridable per deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TableSettings {
    pub player_language: String,
    pub dynamic_translations: String,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            player_language: "player_language".to_string(),
            dynamic_translations: "dynamic_translations".to_string(),
        }
    }
}

/// The full core settings tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Settings {
    pub language: LanguageSettings,
    pub cache: CacheSettings,
    pub missing: MissingSettings,
    pub database: DatabaseSettings,
}

impl Settings {
    /// Parse settings from YAML and validate them.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate cross-field constraints. Fatal at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for code in self.language.languages.keys() {
            LanguageCode::parse(code)?;
        }
        let default = self.language.default.as_str();
        match self.language.languages.get(default) {
            None => {
                return Err(ConfigError::UnknownDefaultLanguage {
                    code: default.to_string(),
                });
            }
            Some(entry) if !entry.enabled => {
                return Err(ConfigError::DefaultLanguageDisabled {
                    code: default.to_string(),
                });
            }
            Some(_) => {}
        }
        if self.enabled_languages().is_empty() {
            return Err(ConfigError::NoLanguagesEnabled);
        }
        Ok(())
    }

    /// The enabled languages, sorted by code.
    pub fn enabled_languages(&self) -> Vec<Language> {
        self.language
            .languages
            .iter()
            .filter(|(_, entry)| entry.enabled)
            .filter_map(|(code, entry)| {
                Some(Language {
                    code: LanguageCode::parse(code).ok()?,
                    name: entry.name.clone(),
                    enabled: true,
                })
            })
            .collect()
    }
}

/// Well-known locations under the host data root.
#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<root>/languages` — namespace translation files.
    pub fn languages_dir(&self) -> PathBuf {
        self.root.join("languages")
    }

    /// `<root>/languages/<lang>/<ns>`.
    pub fn namespace_dir(&self, language: &LanguageCode, namespace: &str) -> PathBuf {
        self.languages_dir().join(language.as_str()).join(namespace)
    }

    /// `<root>/cache` — sync state and backups.
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    /// `<root>/imports`.
    pub fn imports_dir(&self) -> PathBuf {
        self.root.join("imports")
    }

    /// `<root>/exports/<ns>`.
    pub fn exports_dir(&self, namespace: &str) -> PathBuf {
        self.root.join("exports").join(namespace)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn default_true() -> bool {
    true
}

fn default_missing_format() -> String {
    "[Missing: {key}]".to_string()
}

fn default_datasource() -> String {
    "default".to_string()
}
