//! Try-on result rows in the Supabase results table (PostgREST).

use async_trait::async_trait;
use fitbooth_core::types::{DbId, Timestamp};
use fitbooth_core::ClothType;
use serde::{Deserialize, Serialize};

use crate::config::SupabaseConfig;

/// Status written on every inserted row; only completed try-ons are recorded.
pub const STATUS_COMPLETED: &str = "COMPLETED";

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// PostgREST returned a non-2xx status code.
    #[error("Database API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    #[error("Result {0} not found")]
    NotFound(DbId),

    /// The insert succeeded but returned no row to read the id from.
    #[error("Insert returned no rows")]
    EmptyInsert,
}

/// Row contents supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewResultRecord {
    pub task_id: String,
    pub original_image_url: String,
    pub result_image_url: String,
    pub outfit_name: String,
    pub model_name: String,
    pub cloth_type: ClothType,
    /// Signed URL from the try-on service; expires.
    pub fitroom_url: String,
}

/// A stored row. Older rows may predate some columns, hence the options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: DbId,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub original_image_url: Option<String>,
    #[serde(default)]
    pub result_image_url: Option<String>,
    #[serde(default)]
    pub outfit_name: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub cloth_type: Option<String>,
    #[serde(default)]
    pub fitroom_url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

#[derive(Serialize)]
struct InsertRow<'a> {
    #[serde(flatten)]
    record: &'a NewResultRecord,
    status: &'static str,
    created_at: Timestamp,
}

/// Metadata sink for completed try-ons.
#[async_trait]
pub trait ResultRecorder: Send + Sync {
    /// Insert a row and return its id.
    async fn insert(&self, record: &NewResultRecord) -> Result<DbId, RecordError>;

    async fn get_by_id(&self, id: DbId) -> Result<ResultRecord, RecordError>;

    /// Newest first.
    async fn list_recent(&self, limit: Option<u32>) -> Result<Vec<ResultRecord>, RecordError>;
}

/// PostgREST client for the results table.
#[derive(Debug, Clone)]
pub struct SupabaseRecords {
    client: reqwest::Client,
    table_url: String,
    key: String,
}

impl SupabaseRecords {
    pub fn new(config: &SupabaseConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: &SupabaseConfig) -> Self {
        Self {
            client,
            table_url: format!("{}/rest/v1/{}", config.url, config.results_table),
            key: config.anon_key.clone(),
        }
    }

    // ---- private helpers ----

    async fn parse_rows(response: reqwest::Response) -> Result<Vec<ResultRecord>, RecordError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(RecordError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ResultRecorder for SupabaseRecords {
    async fn insert(&self, record: &NewResultRecord) -> Result<DbId, RecordError> {
        let row = InsertRow {
            record,
            status: STATUS_COMPLETED,
            created_at: chrono::Utc::now(),
        };
        let response = crate::authorize(self.client.post(&self.table_url), &self.key)
            .header("Prefer", "return=representation")
            .json(&[row])
            .send()
            .await?;

        let rows = Self::parse_rows(response).await?;
        let id = rows.first().map(|r| r.id).ok_or(RecordError::EmptyInsert)?;
        tracing::info!(result_id = id, task_id = %record.task_id, "Result recorded");
        Ok(id)
    }

    async fn get_by_id(&self, id: DbId) -> Result<ResultRecord, RecordError> {
        let response = crate::authorize(self.client.get(&self.table_url), &self.key)
            .query(&[("select", "*".to_string()), ("id", format!("eq.{id}"))])
            .send()
            .await?;

        Self::parse_rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or(RecordError::NotFound(id))
    }

    async fn list_recent(&self, limit: Option<u32>) -> Result<Vec<ResultRecord>, RecordError> {
        let mut query = vec![("select", "*".to_string()), ("order", "created_at.desc".to_string())];
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        let response = crate::authorize(self.client.get(&self.table_url), &self.key)
            .query(&query)
            .send()
            .await?;

        Self::parse_rows(response).await
    }
}
