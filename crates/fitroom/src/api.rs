//! REST client for the FitRoom try-on endpoints.
//!
//! Every request carries the static `X-API-KEY` header. Payloads are
//! multipart forms; responses are JSON except for the result download.

use fitbooth_core::{ClothType, EncodedImage};
use serde::Deserialize;

use crate::config::FitRoomConfig;

const API_KEY_HEADER: &str = "X-API-KEY";

/// HTTP client for the FitRoom service.
#[derive(Debug, Clone)]
pub struct FitRoomApi {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

/// Response of `POST /tryon/v2/tasks`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubmitResponse {
    pub task_id: String,
}

/// Remote task lifecycle. Unrecognised values deserialize as `Unknown` and
/// are treated as still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Created,
    Processing,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Response of `GET /tryon/v2/tasks/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskStatusResponse {
    pub status: TaskStatus,
    /// Present once the task has completed.
    #[serde(default)]
    pub download_signed_url: Option<String>,
    /// Remote failure reason for `FAILED` tasks.
    #[serde(default)]
    pub error: Option<String>,
}

/// Errors from the FitRoom REST layer.
#[derive(Debug, thiserror::Error)]
pub enum FitRoomApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// FitRoom returned a non-2xx status code.
    #[error("FitRoom API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl FitRoomApiError {
    /// HTTP status of a rejected request, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ApiError { status, .. } => Some(*status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Request(e) if e.is_timeout())
    }

    /// Connection-level failure (refused, reset, DNS).
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Request(e) if e.is_connect() || e.is_request())
    }

    /// `message` field of a JSON error body, when the service sent one.
    pub fn remote_message(&self) -> Option<String> {
        match self {
            Self::ApiError { body, .. } => serde_json::from_str::<serde_json::Value>(body)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string)),
            Self::Request(_) => None,
        }
    }
}

impl FitRoomApi {
    /// Build a client with the configured request timeout.
    pub fn new(config: &FitRoomConfig) -> Result<Self, FitRoomApiError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self::with_client(client, config))
    }

    /// Reuse an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: &FitRoomConfig) -> Self {
        Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        }
    }

    /// Create a try-on task.
    ///
    /// Sends `POST /tryon/v2/tasks` with multipart fields `model_image`,
    /// `cloth_image` and `cloth_type`.
    pub async fn create_task(
        &self,
        model: &EncodedImage,
        cloth: &EncodedImage,
        cloth_type: ClothType,
    ) -> Result<SubmitResponse, FitRoomApiError> {
        tracing::debug!(
            model_size = model.len(),
            model_type = %model.mime,
            cloth_size = cloth.len(),
            cloth_type_mime = %cloth.mime,
            %cloth_type,
            "Submitting try-on task"
        );
        let form = reqwest::multipart::Form::new()
            .part("model_image", image_part(model)?)
            .part("cloth_image", image_part(cloth)?)
            .text("cloth_type", cloth_type.as_str());

        let response = self
            .client
            .post(format!("{}/tryon/v2/tasks", self.api_url))
            .header(API_KEY_HEADER, &self.api_key)
            .multipart(form)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Sends `GET /tryon/v2/tasks/{task_id}`.
    pub async fn get_task_status(&self, task_id: &str) -> Result<TaskStatusResponse, FitRoomApiError> {
        let response = self
            .client
            .get(format!("{}/tryon/v2/tasks/{}", self.api_url, task_id))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Download a finished image. The signed URL carries its own
    /// authorisation, so no API key is sent.
    pub async fn download_result(&self, signed_url: &str) -> Result<Vec<u8>, FitRoomApiError> {
        let response = self.client.get(signed_url).send().await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Ask the service whether a photo is usable as a model image.
    ///
    /// Sends `POST /tryon/input_check/v1/model` with field `input_image`.
    pub async fn check_model_image(&self, image: &EncodedImage) -> Result<serde_json::Value, FitRoomApiError> {
        self.input_check("model", image).await
    }

    /// Ask the service whether a photo is usable as a garment image.
    pub async fn check_clothes_image(&self, image: &EncodedImage) -> Result<serde_json::Value, FitRoomApiError> {
        self.input_check("clothes", image).await
    }

    async fn input_check(&self, kind: &str, image: &EncodedImage) -> Result<serde_json::Value, FitRoomApiError> {
        let form = reqwest::multipart::Form::new().part("input_image", image_part(image)?);
        let response = self
            .client
            .post(format!("{}/tryon/input_check/v1/{}", self.api_url, kind))
            .header(API_KEY_HEADER, &self.api_key)
            .multipart(form)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, FitRoomApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(FitRoomApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, FitRoomApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

fn image_part(image: &EncodedImage) -> Result<reqwest::multipart::Part, FitRoomApiError> {
    Ok(reqwest::multipart::Part::bytes(image.bytes.clone())
        .file_name(image.file_name.clone())
        .mime_str(&image.mime)?)
}
