//! HTTP client for the local companion server endpoints.

use fitbooth_core::EncodedImage;
use serde::{Deserialize, Serialize};

use crate::config::LocalServerConfig;

/// HTTP client for the kiosk's local companion server.
#[derive(Debug, Clone)]
pub struct LocalServerClient {
    client: reqwest::Client,
    base_url: String,
}

/// Response of `POST /api/upload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResponse {
    pub success: bool,
    pub filename: String,
    /// Server-relative path, e.g. `/Images_input/capture-123.jpg`.
    pub path: String,
}

#[derive(Debug, Deserialize)]
struct RawUpload {
    #[serde(default)]
    success: bool,
    filename: Option<String>,
    path: Option<String>,
}

/// Result of `POST /api/save-result`. Failures are folded into the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SaveResultOutcome {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl SaveResultOutcome {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// One saved result as listed by `GET /api/results`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub filename: String,
    pub path: String,
    pub status: String,
    /// ISO-8601 modification time.
    pub timestamp: String,
    pub size: u64,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResultsEnvelope {
    results: Vec<ResultEntry>,
}

/// Body of `POST /api/track-failure`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    pub filename: String,
    pub error: String,
    pub original_image: String,
    pub selected_costume: String,
}

/// Errors from the local server client.
#[derive(Debug, thiserror::Error)]
pub enum LocalServerError {
    /// The HTTP request itself failed (connection refused, DNS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("Local server error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A 2xx response that does not describe a stored file.
    #[error("Local server returned no file path")]
    MissingPath,
}

impl LocalServerClient {
    pub fn new(config: &LocalServerConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(client: reqwest::Client, config: &LocalServerConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Store a captured photo. Sends multipart field `image`.
    ///
    /// Any non-2xx status, or a response without a `path`, is an error: the
    /// caller must not treat the capture as persisted.
    pub async fn upload_image(&self, image: EncodedImage) -> Result<UploadResponse, LocalServerError> {
        let size = image.len();
        let part = file_part(image)?;
        let form = reqwest::multipart::Form::new().part("image", part);

        let response = self
            .client
            .post(self.resolve_url("/api/upload"))
            .multipart(form)
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;

        let raw: RawUpload = response.json().await?;
        let path = raw.path.ok_or(LocalServerError::MissingPath)?;
        let uploaded = UploadResponse {
            success: raw.success,
            filename: raw.filename.unwrap_or_default(),
            path,
        };
        tracing::info!(filename = %uploaded.filename, size, "Captured photo uploaded");
        Ok(uploaded)
    }

    /// Save a copy of a result image. Sends multipart field `result`.
    ///
    /// Never fails; errors are logged and returned as `success: false`.
    pub async fn save_result(&self, bytes: Vec<u8>, filename: &str) -> SaveResultOutcome {
        match self.try_save_result(bytes, filename).await {
            Ok(outcome) => {
                tracing::info!(filename, path = ?outcome.path, "Result saved on local server");
                outcome
            }
            Err(e) => {
                tracing::warn!(filename, error = %e, "Local result save failed");
                match e {
                    LocalServerError::ApiError { status, .. } => {
                        SaveResultOutcome::failed(format!("Local save failed: {status}"))
                    }
                    other => SaveResultOutcome::failed(other.to_string()),
                }
            }
        }
    }

    async fn try_save_result(
        &self,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<SaveResultOutcome, LocalServerError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("image/jpeg")?;
        let form = reqwest::multipart::Form::new().part("result", part);

        let response = self
            .client
            .post(self.resolve_url("/api/save-result"))
            .multipart(form)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// List saved results (`GET /api/results`).
    pub async fn list_results(&self) -> Result<Vec<ResultEntry>, LocalServerError> {
        let response = self
            .client
            .get(self.resolve_url("/api/results"))
            .send()
            .await?;
        let envelope: ResultsEnvelope = Self::parse_response(response).await?;
        Ok(envelope.results)
    }

    /// Record a failed attempt. Errors are logged and swallowed.
    pub async fn track_failure(&self, report: &FailureReport) {
        let result: Result<(), LocalServerError> = async {
            let response = self
                .client
                .post(self.resolve_url("/api/track-failure"))
                .json(report)
                .send()
                .await?;
            Self::ensure_success(response).await.map(|_| ())
        }
        .await;

        if let Err(e) = result {
            tracing::warn!(filename = %report.filename, error = %e, "Failed to track failure");
        }
    }

    /// Fetch an image stored on the server (or any absolute URL).
    pub async fn fetch_image(&self, path: &str) -> Result<Vec<u8>, LocalServerError> {
        let response = self.client.get(self.resolve_url(path)).send().await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Turn a server-relative path into a full URL. Absolute `http(s)` URLs
    /// pass through unchanged.
    pub fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    // ---- private helpers ----

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, LocalServerError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(LocalServerError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, LocalServerError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

fn file_part(image: EncodedImage) -> Result<reqwest::multipart::Part, LocalServerError> {
    let mime = if image.mime.is_empty() {
        "application/octet-stream".to_string()
    } else {
        image.mime
    };
    Ok(reqwest::multipart::Part::bytes(image.bytes)
        .file_name(image.file_name)
        .mime_str(&mime)?)
}
