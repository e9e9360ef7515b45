//! Fixed-interval polling of a remote task.
//!
//! The loop stops on the first terminal status, after `max_attempts` polls,
//! or as soon as the [`CancellationToken`] fires. Once cancelled, no further
//! progress callbacks are made.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::api::{FitRoomApiError, TaskStatus, TaskStatusResponse};
use crate::TryOnService;

/// Tunable polling parameters.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between consecutive status requests.
    pub interval: Duration,
    /// Maximum number of status requests before giving up.
    pub max_attempts: u32,
}

impl Default for PollConfig {
    /// 60 polls at 5 s: a five-minute ceiling.
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 60,
        }
    }
}

/// Why polling stopped without a completed task.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// A status request failed. Not retried.
    #[error(transparent)]
    Api(#[from] FitRoomApiError),

    /// The service reported `FAILED`.
    #[error("{0}")]
    TaskFailed(String),

    #[error("Task polling timeout after {attempts} attempts")]
    Timeout { attempts: u32 },

    #[error("Task polling cancelled")]
    Cancelled,
}

/// Poll `task_id` until it completes.
///
/// `on_progress` sees every status received, including the terminal one.
pub async fn poll_task<F>(
    service: &dyn TryOnService,
    task_id: &str,
    config: &PollConfig,
    cancel: &CancellationToken,
    mut on_progress: F,
) -> Result<TaskStatusResponse, PollError>
where
    F: FnMut(&TaskStatusResponse) + Send,
{
    for attempt in 1..=config.max_attempts {
        let status = tokio::select! {
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            result = service.task_status(task_id) => result?,
        };
        if cancel.is_cancelled() {
            return Err(PollError::Cancelled);
        }

        tracing::debug!(task_id, attempt, status = ?status.status, "Polled task status");
        on_progress(&status);

        match status.status {
            TaskStatus::Completed => {
                tracing::info!(task_id, attempt, "Task completed");
                return Ok(status);
            }
            TaskStatus::Failed => {
                let message = status.error.unwrap_or_else(|| "Task failed".to_string());
                tracing::warn!(task_id, attempt, error = %message, "Task failed");
                return Err(PollError::TaskFailed(message));
            }
            _ => {}
        }

        if attempt < config.max_attempts {
            tokio::select! {
                _ = cancel.cancelled() => return Err(PollError::Cancelled),
                _ = tokio::time::sleep(config.interval) => {}
            }
        }
    }

    tracing::warn!(task_id, attempts = config.max_attempts, "Task polling timed out");
    Err(PollError::Timeout {
        attempts: config.max_attempts,
    })
}
