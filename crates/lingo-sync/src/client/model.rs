//! Crowdin v2 wire types.
//!
//! Every response body wraps its payload in a `data` envelope; lists nest a
//! second envelope per element. The structs here mirror only the fields the
//! engine reads.

use serde::{Deserialize, Serialize};

/// Single-object envelope: `{ "data": { ... } }`.
#[derive(Debug, Deserialize)]
pub struct Data<T> {
    pub data: T,
}

/// List envelope: `{ "data": [ { "data": { ... } }, ... ] }`.
#[derive(Debug, Deserialize)]
pub struct ListData<T> {
    pub data: Vec<Data<T>>,
}

impl<T> ListData<T> {
    pub fn into_items(self) -> Vec<T> {
        self.data.into_iter().map(|entry| entry.data).collect()
    }
}

/// Error body: `{ "error": { "code": ..., "message": ... } }`.
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub source_language_id: Option<String>,
    #[serde(default)]
    pub target_language_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageInfo {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub directory_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryInfo {
    pub id: i64,
    pub name: String,
    /// Parent directory, absent at the project root.
    #[serde(default)]
    pub directory_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub id: i64,
    pub status: BuildState,
    #[serde(default)]
    pub progress: u8,
}

/// Remote build lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildState {
    Created,
    InProgress,
    Finished,
    Canceled,
    Failed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadUrl {
    pub url: String,
}

// === Request bodies ===

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddFileRequest {
    pub storage_id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory_id: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFileRequest {
    pub storage_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDirectoryRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory_id: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTranslationRequest {
    pub storage_id: i64,
    pub file_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRequest {
    pub skip_untranslated_strings: bool,
    pub export_approved_only: bool,
}
