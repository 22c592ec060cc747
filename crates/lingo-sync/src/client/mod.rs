//! Typed Crowdin v2 client.
//!
//! A thin trait (`CrowdinApi`) fronts the concrete reqwest client so the
//! sync engine, webhook, and scheduler can be exercised against fakes.
//! Transient failures (408, 429, 5xx, transport errors) are retried with
//! exponential backoff up to the configured attempt count; 4xx responses
//! surface immediately with the API's message.

pub mod model;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::CrowdinConfig;
use model::{
    AddFileRequest, BuildInfo, BuildRequest, CreateDirectoryRequest, Data, DirectoryInfo,
    DownloadUrl, ErrorEnvelope, FileInfo, ListData, ProjectInfo, StorageInfo, UpdateFileRequest,
    UploadTranslationRequest,
};

const DEFAULT_BASE_URL: &str = "https://api.crowdin.com/api/v2";
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Errors from the remote service or the transport.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Permanent API failure (4xx other than auth).
    #[error("crowdin api error ({status}): {message}")]
    Api { status: u16, message: String },

    /// 401/403: bad token or insufficient permissions. Never retried.
    #[error("crowdin auth error ({status}): {message}")]
    Auth { status: u16, message: String },

    #[error("failed to decode crowdin response: {message}")]
    Decode { message: String },

    /// A transient failure survived every retry.
    #[error("crowdin request failed after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },
}

impl ClientError {
    /// Transient errors are worth retrying; auth and other 4xx are not.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Http(e) => e.is_timeout() || e.is_connect(),
            ClientError::Api { status, .. } => {
                matches!(*status, 408 | 429) || (500..=599).contains(status)
            }
            _ => false,
        }
    }
}

/// The remote operations the sync engine needs.
#[async_trait]
pub trait CrowdinApi: Send + Sync {
    /// Project metadata; doubles as the connectivity check.
    async fn project_info(&self) -> Result<ProjectInfo, ClientError>;

    /// Upload raw bytes to storage; returns the storage id.
    async fn upload_storage(&self, file_name: &str, bytes: Vec<u8>) -> Result<i64, ClientError>;

    /// Find a file by its full remote path.
    async fn file_by_path(&self, path: &str) -> Result<Option<FileInfo>, ClientError>;

    async fn add_file(
        &self,
        storage_id: i64,
        name: &str,
        directory_id: Option<i64>,
    ) -> Result<FileInfo, ClientError>;

    async fn update_file(&self, file_id: i64, storage_id: i64) -> Result<FileInfo, ClientError>;

    async fn list_directories(&self) -> Result<Vec<DirectoryInfo>, ClientError>;

    async fn create_directory(
        &self,
        name: &str,
        parent_id: Option<i64>,
    ) -> Result<DirectoryInfo, ClientError>;

    /// Upload a translation file for one target language.
    async fn upload_translation(
        &self,
        file_id: i64,
        language_id: &str,
        storage_id: i64,
    ) -> Result<(), ClientError>;

    /// Request a project build; returns the build id.
    async fn start_build(
        &self,
        export_approved_only: bool,
        skip_untranslated: bool,
    ) -> Result<i64, ClientError>;

    async fn build_status(&self, build_id: i64) -> Result<BuildInfo, ClientError>;

    /// Download the completed build archive bytes.
    async fn download_build(&self, build_id: i64) -> Result<Vec<u8>, ClientError>;
}

/// Production client over reqwest.
pub struct CrowdinClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    project_id: u64,
    max_retries: u32,
}

impl CrowdinClient {
    pub fn new(config: &CrowdinConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.advanced.timeout_seconds))
            .build()?;
        Ok(Self {
            http,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            token: config.api_token.clone(),
            project_id: config.project_id,
            max_retries: config.advanced.max_retries,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn project_url(&self, path: &str) -> String {
        format!("{}/projects/{}{path}", self.base_url, self.project_id)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    /// Run a request with retry on transient failures.
    ///
    /// The builder closure re-creates the request each attempt; reqwest
    /// bodies are not reusable across sends.
    async fn send_with_retry<B>(&self, build: B) -> Result<Response, ClientError>
    where
        B: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = match build().send().await {
                Ok(response) => check_status(response).await,
                Err(e) => Err(ClientError::Http(e)),
            };
            match outcome {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt <= self.max_retries => {
                    let delay = RETRY_BASE_DELAY * 2_u32.saturating_pow(attempt - 1);
                    warn!(attempt, error = %e, delay_ms = delay.as_millis() as u64, "transient crowdin failure, retrying");
                    sleep(delay).await;
                }
                Err(e) if e.is_transient() => {
                    return Err(ClientError::RetriesExhausted {
                        attempts: attempt,
                        message: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, ClientError> {
        let response = self
            .send_with_retry(|| self.request(Method::GET, &url))
            .await?;
        decode(response).await
    }

    async fn post_json<T: DeserializeOwned, R: serde::Serialize>(
        &self,
        url: String,
        body: &R,
    ) -> Result<T, ClientError> {
        let response = self
            .send_with_retry(|| self.request(Method::POST, &url).json(body))
            .await?;
        decode(response).await
    }
}

/// Map error statuses onto the taxonomy, extracting the API message.
async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = match response.json::<ErrorEnvelope>().await {
        Ok(envelope) => envelope.error.message,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    };
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ClientError::Auth {
            status: status.as_u16(),
            message,
        });
    }
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    response
        .json::<T>()
        .await
        .map_err(|e| ClientError::Decode {
            message: e.to_string(),
        })
}

#[async_trait]
impl CrowdinApi for CrowdinClient {
    async fn project_info(&self) -> Result<ProjectInfo, ClientError> {
        let info: Data<ProjectInfo> = self
            .get_json(format!("{}/projects/{}", self.base_url, self.project_id))
            .await?;
        Ok(info.data)
    }

    async fn upload_storage(&self, file_name: &str, bytes: Vec<u8>) -> Result<i64, ClientError> {
        let url = self.url("/storages");
        let response = self
            .send_with_retry(|| {
                self.request(Method::POST, &url)
                    .header("Crowdin-API-FileName", file_name)
                    .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                    .body(bytes.clone())
            })
            .await?;
        let storage: Data<StorageInfo> = decode(response).await?;
        debug!(storage_id = storage.data.id, file_name, "uploaded to storage");
        Ok(storage.data.id)
    }

    async fn file_by_path(&self, path: &str) -> Result<Option<FileInfo>, ClientError> {
        let files: ListData<FileInfo> = self
            .get_json(self.project_url("/files?limit=500"))
            .await?;
        Ok(files
            .into_items()
            .into_iter()
            .find(|file| file.path.as_deref() == Some(path)))
    }

    async fn add_file(
        &self,
        storage_id: i64,
        name: &str,
        directory_id: Option<i64>,
    ) -> Result<FileInfo, ClientError> {
        let file: Data<FileInfo> = self
            .post_json(
                self.project_url("/files"),
                &AddFileRequest {
                    storage_id,
                    name: name.to_string(),
                    directory_id,
                },
            )
            .await?;
        Ok(file.data)
    }

    async fn update_file(&self, file_id: i64, storage_id: i64) -> Result<FileInfo, ClientError> {
        let url = self.project_url(&format!("/files/{file_id}"));
        let response = self
            .send_with_retry(|| {
                self.request(Method::PUT, &url)
                    .json(&UpdateFileRequest { storage_id })
            })
            .await?;
        let file: Data<FileInfo> = decode(response).await?;
        Ok(file.data)
    }

    async fn list_directories(&self) -> Result<Vec<DirectoryInfo>, ClientError> {
        let directories: ListData<DirectoryInfo> = self
            .get_json(self.project_url("/directories?limit=500"))
            .await?;
        Ok(directories.into_items())
    }

    async fn create_directory(
        &self,
        name: &str,
        parent_id: Option<i64>,
    ) -> Result<DirectoryInfo, ClientError> {
        let directory: Data<DirectoryInfo> = self
            .post_json(
                self.project_url("/directories"),
                &CreateDirectoryRequest {
                    name: name.to_string(),
                    directory_id: parent_id,
                },
            )
            .await?;
        Ok(directory.data)
    }

    async fn upload_translation(
        &self,
        file_id: i64,
        language_id: &str,
        storage_id: i64,
    ) -> Result<(), ClientError> {
        let url = self.project_url(&format!("/translations/{language_id}"));
        self.send_with_retry(|| {
            self.request(Method::POST, &url).json(&UploadTranslationRequest {
                storage_id,
                file_id,
            })
        })
        .await?;
        Ok(())
    }

    async fn start_build(
        &self,
        export_approved_only: bool,
        skip_untranslated: bool,
    ) -> Result<i64, ClientError> {
        let build: Data<BuildInfo> = self
            .post_json(
                self.project_url("/translations/builds"),
                &BuildRequest {
                    skip_untranslated_strings: skip_untranslated,
                    export_approved_only,
                },
            )
            .await?;
        Ok(build.data.id)
    }

    async fn build_status(&self, build_id: i64) -> Result<BuildInfo, ClientError> {
        let build: Data<BuildInfo> = self
            .get_json(self.project_url(&format!("/translations/builds/{build_id}")))
            .await?;
        Ok(build.data)
    }

    async fn download_build(&self, build_id: i64) -> Result<Vec<u8>, ClientError> {
        let link: Data<DownloadUrl> = self
            .get_json(self.project_url(&format!("/translations/builds/{build_id}/download")))
            .await?;
        // The download URL is pre-signed; no auth header.
        let response = self
            .send_with_retry(|| self.http.get(&link.data.url))
            .await?;
        Ok(response.bytes().await?.to_vec())
    }
}
