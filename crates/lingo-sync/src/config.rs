//! Crowdin reconciliation configuration.
//!
//! Merges the host's `crowdin.*` options with the standalone `crowdin.yml`
//! surface (locale mapping, sync namespaces, policy knobs). Validation is
//! fatal at startup, matching the core settings.

use std::collections::BTreeMap;

use lingo::types::LanguageCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal sync configuration problems.
#[derive(Debug, Error)]
pub enum SyncConfigError {
    #[error("failed to parse crowdin configuration: {message}")]
    Parse { message: String },

    #[error("crowdin is enabled but no api token is configured")]
    MissingToken,

    #[error("crowdin is enabled but project-id is not set")]
    MissingProjectId,

    #[error("webhook is enabled but no secret is configured")]
    MissingWebhookSecret,

    #[error("locale mapping target '{code}' is not a valid language code")]
    InvalidLocaleTarget { code: String },
}

/// What to do when a downloaded value collides with local edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictResolution {
    RemoteWins,
    LocalWins,
    Manual,
}

/// `crowdin.webhook.*`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WebhookSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_webhook_port")]
    pub port: u16,
    #[serde(default)]
    pub secret: String,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_webhook_port(),
            secret: String::new(),
        }
    }
}

/// `crowdin.yml` `advanced.*` knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AdvancedSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Ceiling on waiting for a remote build before the download fails.
    #[serde(default = "default_build_timeout_seconds")]
    pub build_timeout_seconds: u64,
}

impl Default for AdvancedSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            timeout_seconds: default_timeout_seconds(),
            max_retries: default_max_retries(),
            build_timeout_seconds: default_build_timeout_seconds(),
        }
    }
}

/// `crowdin.yml` `upload.*` policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UploadSettings {
    #[serde(default = "default_true")]
    pub auto_upload: bool,
    #[serde(default = "default_true")]
    pub update_strings: bool,
    #[serde(default)]
    pub cleanup_mode: bool,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            auto_upload: true,
            update_strings: true,
            cleanup_mode: false,
        }
    }
}

/// `crowdin.yml` `download.*` policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DownloadSettings {
    #[serde(default = "default_true")]
    pub skip_untranslated: bool,
    #[serde(default)]
    pub export_approved_only: bool,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            skip_untranslated: true,
            export_approved_only: false,
        }
    }
}

/// The full reconciliation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrowdinConfig {
    pub enabled: bool,
    pub project_id: u64,
    pub api_token: String,
    /// Override for self-hosted or test endpoints.
    pub base_url: Option<String>,
    /// Server identity for the server-isolated directory policy.
    pub server_id: Option<String>,
    /// Per-namespace remote directory policy overrides.
    pub namespace_directories: BTreeMap<String, String>,
    pub auto_sync_interval_minutes: u64,
    pub conflict_resolution: ConflictResolution,
    pub webhook: WebhookSettings,
    /// Upload local non-source translations after uploading sources.
    pub upload_translations: bool,
    /// Reload registered namespaces after a merge touched their files.
    pub hot_reload: bool,
    pub backup_before_sync: bool,
    pub source_language: LanguageCode,
    /// Remote language id → internal code.
    pub locale_mapping: BTreeMap<String, String>,
    pub sync_namespaces: Vec<String>,
    pub advanced: AdvancedSettings,
    pub upload: UploadSettings,
    pub download: DownloadSettings,
}

impl Default for CrowdinConfig {
    fn default() -> Self {
        let mut locale_mapping = BTreeMap::new();
        locale_mapping.insert("pt-BR".to_string(), "pt_br".to_string());
        locale_mapping.insert("en".to_string(), "en_us".to_string());
        locale_mapping.insert("es-ES".to_string(), "es_es".to_string());
        Self {
            enabled: false,
            project_id: 0,
            api_token: String::new(),
            base_url: None,
            server_id: None,
            namespace_directories: BTreeMap::new(),
            auto_sync_interval_minutes: 30,
            conflict_resolution: ConflictResolution::RemoteWins,
            webhook: WebhookSettings::default(),
            upload_translations: false,
            hot_reload: true,
            backup_before_sync: true,
            source_language: LanguageCode::parse("pt_br").expect("static code"),
            locale_mapping,
            sync_namespaces: Vec::new(),
            advanced: AdvancedSettings::default(),
            upload: UploadSettings::default(),
            download: DownloadSettings::default(),
        }
    }
}

impl CrowdinConfig {
    /// Parse from YAML and validate.
    pub fn from_yaml(content: &str) -> Result<Self, SyncConfigError> {
        let config: CrowdinConfig =
            serde_yaml::from_str(content).map_err(|e| SyncConfigError::Parse {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SyncConfigError> {
        if self.enabled {
            if self.api_token.is_empty() {
                return Err(SyncConfigError::MissingToken);
            }
            if self.project_id == 0 {
                return Err(SyncConfigError::MissingProjectId);
            }
        }
        if self.webhook.enabled && self.webhook.secret.is_empty() {
            return Err(SyncConfigError::MissingWebhookSecret);
        }
        for internal in self.locale_mapping.values() {
            LanguageCode::parse(internal).map_err(|_| SyncConfigError::InvalidLocaleTarget {
                code: internal.clone(),
            })?;
        }
        Ok(())
    }

    /// The remote directory segments for a namespace.
    ///
    /// This is the single place directory policy lives; nothing else infers
    /// remote paths. The free plan forbids branches, hence directories:
    /// - override `""` → `/<ns>/` (global)
    /// - override `"group"` → `/group/<ns>/` (shared group)
    /// - otherwise, with a server id → `/<server-id>/<ns>/`
    /// - otherwise → `/<ns>/`
    pub fn directory_segments(&self, namespace: &str) -> Vec<String> {
        match self.namespace_directories.get(namespace).map(String::as_str) {
            Some("") => vec![namespace.to_string()],
            Some("group") => vec!["group".to_string(), namespace.to_string()],
            _ => match &self.server_id {
                Some(server_id) => vec![server_id.clone(), namespace.to_string()],
                None => vec![namespace.to_string()],
            },
        }
    }

    /// The remote file path for a namespace: `/<segments...>/<ns>.yml`.
    pub fn remote_file_path(&self, namespace: &str) -> String {
        let mut path = String::new();
        for segment in self.directory_segments(namespace) {
            path.push('/');
            path.push_str(&segment);
        }
        path.push('/');
        path.push_str(namespace);
        path.push_str(".yml");
        path
    }

    /// Map a remote language id onto an internal code.
    pub fn internal_code(&self, remote: &str) -> Option<LanguageCode> {
        let mapped = self.locale_mapping.get(remote)?;
        LanguageCode::parse(mapped).ok()
    }

    /// Reverse lookup: the remote id used for an internal code.
    pub fn remote_code(&self, internal: &LanguageCode) -> Option<&str> {
        self.locale_mapping
            .iter()
            .find(|(_, mapped)| mapped.as_str() == internal.as_str())
            .map(|(remote, _)| remote.as_str())
    }
}

fn default_true() -> bool {
    true
}

fn default_webhook_port() -> u16 {
    8090
}

fn default_batch_size() -> usize {
    50
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_build_timeout_seconds() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_policy_matrix() {
        let mut config = CrowdinConfig::default();
        config
            .namespace_directories
            .insert("global-ns".to_string(), String::new());
        config
            .namespace_directories
            .insert("shared".to_string(), "group".to_string());
        config.server_id = Some("lobby-1".to_string());

        assert_eq!(config.remote_file_path("global-ns"), "/global-ns/global-ns.yml");
        assert_eq!(config.remote_file_path("shared"), "/group/shared/shared.yml");
        assert_eq!(config.remote_file_path("app"), "/lobby-1/app/app.yml");

        config.server_id = None;
        assert_eq!(config.remote_file_path("app"), "/app/app.yml");
    }

    #[test]
    fn locale_mapping_round_trip() {
        let config = CrowdinConfig::default();
        let internal = config.internal_code("pt-BR").unwrap();
        assert_eq!(internal.as_str(), "pt_br");
        assert_eq!(config.remote_code(&internal), Some("pt-BR"));
        assert!(config.internal_code("xx-XX").is_none());
    }

    #[test]
    fn enabled_requires_credentials() {
        let config = CrowdinConfig {
            enabled: true,
            ..CrowdinConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SyncConfigError::MissingToken)
        ));

        let config = CrowdinConfig {
            enabled: true,
            api_token: "tok".to_string(),
            ..CrowdinConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SyncConfigError::MissingProjectId)
        ));
    }

    #[test]
    fn webhook_requires_secret() {
        let config = CrowdinConfig {
            webhook: WebhookSettings {
                enabled: true,
                port: 9000,
                secret: String::new(),
            },
            ..CrowdinConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SyncConfigError::MissingWebhookSecret)
        ));
    }

    #[test]
    fn yaml_surface_parses() {
        let config = CrowdinConfig::from_yaml(
            r#"
enabled: true
project-id: 42
api-token: secret-token
source-language: pt_br
locale-mapping:
  pt-BR: pt_br
  en: en_us
sync-namespaces: [app, shop]
advanced:
  batch-size: 10
  timeout-seconds: 5
  max-retries: 2
upload:
  auto-upload: true
  update-strings: true
  cleanup-mode: false
download:
  skip-untranslated: true
  export-approved-only: true
"#,
        )
        .unwrap();
        assert_eq!(config.project_id, 42);
        assert_eq!(config.sync_namespaces, vec!["app", "shop"]);
        assert!(config.download.export_approved_only);
        assert_eq!(config.advanced.max_retries, 2);
    }
}
