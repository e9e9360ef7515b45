//! Daily-folder result uploads with sequencing, collision fallback and
//! linear-backoff retry.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use fitbooth_core::naming::{self, RESULT_PREFIX};

use crate::storage::{ObjectStore, StorageError};

const JPEG: &str = "image/jpeg";

/// How many times to attempt an upload and how long to wait in between.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// The wait after attempt `n` is `backoff_step * n`.
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }
}

/// Where a result landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// `{folder}/{file}` inside the bucket.
    pub path: String,
    pub public_url: String,
}

/// Uploads try-on results as `{Event_day_dd_mm_yy}/result_NNN.jpg`.
#[derive(Clone)]
pub struct ResultStorage {
    store: Arc<dyn ObjectStore>,
    retry: RetryPolicy,
    /// Pinned event day; `None` uses today's local date.
    date: Option<NaiveDate>,
}

impl ResultStorage {
    pub fn new(store: Arc<dyn ObjectStore>, retry: RetryPolicy) -> Self {
        Self {
            store,
            retry,
            date: None,
        }
    }

    /// File everything under the folder of `date` instead of today.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn folder(&self) -> String {
        match self.date {
            Some(date) => naming::daily_folder_name(date),
            None => naming::today_folder_name(),
        }
    }

    /// Upload with retry. The folder and sequence are recomputed on every
    /// attempt so a retry after midnight or after a concurrent upload still
    /// gets a fresh name.
    pub async fn upload(&self, bytes: &[u8]) -> Result<StoredObject, StorageError> {
        let attempts = self.retry.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.upload_once(bytes).await {
                Ok(stored) => {
                    tracing::info!(path = %stored.path, attempt, "Result stored");
                    return Ok(stored);
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Result upload attempt failed");
                    last_error = Some(e);
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.retry.delay_after(attempt)).await;
            }
        }

        let last = last_error.map_or_else(|| "Unknown error".to_string(), |e| e.to_string());
        tracing::error!(attempts, error = %last, "All result upload attempts failed");
        Err(StorageError::RetriesExhausted { attempts, last })
    }

    /// A single attempt: pick the next sequence number, upload, and retry
    /// once under a timestamped name if the path was taken meanwhile.
    pub async fn upload_once(&self, bytes: &[u8]) -> Result<StoredObject, StorageError> {
        let folder = self.folder();
        let sequence = self.next_sequence(&folder).await;
        let path = naming::object_path(&folder, &naming::sequenced_filename(RESULT_PREFIX, sequence));

        let path = match self.store.put_object(&path, bytes, JPEG).await {
            Ok(()) => path,
            Err(StorageError::AlreadyExists(_)) => {
                let millis = chrono::Utc::now().timestamp_millis();
                let retry_path = naming::object_path(
                    &folder,
                    &naming::collision_filename(RESULT_PREFIX, sequence, millis),
                );
                tracing::info!(taken = %path, retry = %retry_path, "Result path taken, retrying with timestamp");
                self.store.put_object(&retry_path, bytes, JPEG).await?;
                retry_path
            }
            Err(e) => return Err(e),
        };

        Ok(StoredObject {
            public_url: self.store.public_url(&path),
            path,
        })
    }

    /// A failed listing falls back to `1` rather than failing the upload.
    async fn next_sequence(&self, folder: &str) -> u32 {
        match self.store.list_names(folder).await {
            Ok(names) => naming::next_sequence(names.iter().map(String::as_str), RESULT_PREFIX),
            Err(e) => {
                tracing::warn!(folder, error = %e, "Folder listing failed, starting at 001");
                1
            }
        }
    }
}
