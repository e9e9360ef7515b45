//! Object storage over the Supabase Storage REST API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::SupabaseConfig;

/// Upper bound on names returned by one folder listing.
const LIST_LIMIT: u32 = 10_000;

/// Errors from the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// An object already exists at the path and upserts are disabled.
    #[error("The resource already exists: {0}")]
    AlreadyExists(String),

    /// Storage returned a non-2xx status code.
    #[error("Storage API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// Every upload attempt failed; carries the last error's text.
    #[error("Failed to upload image after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

/// A flat, path-addressed object store with public read URLs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Names of the objects directly inside `folder`.
    async fn list_names(&self, folder: &str) -> Result<Vec<String>, StorageError>;

    /// Create an object. Fails with [`StorageError::AlreadyExists`] when
    /// `path` is taken; existing objects are never overwritten.
    async fn put_object(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<(), StorageError>;

    /// Public URL of `path`. Pure; does not check that the object exists.
    fn public_url(&self, path: &str) -> String;
}

/// Supabase Storage client bound to one bucket.
#[derive(Debug, Clone)]
pub struct SupabaseStorage {
    client: reqwest::Client,
    base_url: String,
    key: String,
    bucket: String,
}

#[derive(Serialize)]
struct ListRequest<'a> {
    prefix: &'a str,
    limit: u32,
    offset: u32,
    #[serde(rename = "sortBy")]
    sort_by: SortBy,
}

#[derive(Serialize)]
struct SortBy {
    column: &'static str,
    order: &'static str,
}

#[derive(Deserialize)]
struct ListedObject {
    #[serde(default)]
    name: Option<String>,
}

impl SupabaseStorage {
    pub fn new(config: &SupabaseConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: &SupabaseConfig) -> Self {
        Self {
            client,
            base_url: config.url.clone(),
            key: config.anon_key.clone(),
            bucket: config.bucket.clone(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    // ---- private helpers ----

    async fn ensure_success(response: reqwest::Response, path: &str) -> Result<reqwest::Response, StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        if is_duplicate(status.as_u16(), &body) {
            return Err(StorageError::AlreadyExists(path.to_string()));
        }
        Err(StorageError::ApiError {
            status: status.as_u16(),
            body,
        })
    }
}

/// Storage reports duplicates as 409, or as 400 with a `Duplicate` body
/// depending on the server version.
fn is_duplicate(status: u16, body: &str) -> bool {
    status == 409 || body.contains("already exists") || body.contains("Duplicate")
}

#[async_trait]
impl ObjectStore for SupabaseStorage {
    async fn list_names(&self, folder: &str) -> Result<Vec<String>, StorageError> {
        let request = ListRequest {
            prefix: folder,
            limit: LIST_LIMIT,
            offset: 0,
            sort_by: SortBy {
                column: "name",
                order: "asc",
            },
        };
        let response = crate::authorize(
            self.client
                .post(format!("{}/storage/v1/object/list/{}", self.base_url, self.bucket)),
            &self.key,
        )
        .json(&request)
        .send()
        .await?;

        let response = Self::ensure_success(response, folder).await?;
        let objects: Vec<ListedObject> = response.json().await?;
        Ok(objects.into_iter().filter_map(|o| o.name).collect())
    }

    async fn put_object(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<(), StorageError> {
        tracing::debug!(bucket = %self.bucket, path, size = bytes.len(), "Uploading object");
        let response = crate::authorize(
            self.client
                .post(format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, path)),
            &self.key,
        )
        .header(reqwest::header::CONTENT_TYPE, content_type)
        .header(reqwest::header::CACHE_CONTROL, "max-age=3600")
        .header("x-upsert", "false")
        .body(bytes.to_vec())
        .send()
        .await?;

        Self::ensure_success(response, path).await?;
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, self.bucket, path)
    }
}
