use fitbooth_cloud::StorageError;
use fitbooth_core::notice::UserNotice;
use fitbooth_core::ValidationError;
use fitbooth_fitroom::{FitRoomApiError, PollError};

/// A fatal try-on failure.
///
/// `Display` renders the message shown to the user; the wrapped error keeps
/// the technical detail for logs.
#[derive(Debug, thiserror::Error)]
pub enum TryOnError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Task creation was rejected or never reached the service.
    #[error("{}", remote_message(.0))]
    Submit(FitRoomApiError),

    /// Polling failed, the task failed remotely, or polling timed out.
    #[error("{}", poll_message(.0))]
    Poll(PollError),

    /// The task completed without a download URL.
    #[error("Try-on failed: FitRoom API did not return a download URL")]
    MissingDownloadUrl,

    #[error("{}", remote_message(.0))]
    Download(FitRoomApiError),

    /// Every durable-storage attempt failed. The message keeps the attempt
    /// count.
    #[error("Try-on failed: {0}")]
    Storage(StorageError),

    #[error("Try-on cancelled")]
    Cancelled,
}

impl TryOnError {
    /// Short notice for the kiosk screen.
    pub fn notice(&self) -> UserNotice {
        UserNotice::classify(&self.to_string())
    }

    /// Which errors are worth reporting to the failure log.
    pub fn is_reportable(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

fn remote_message(err: &FitRoomApiError) -> String {
    match err.status() {
        Some(401) => "Invalid API key. Please check your FitRoom API configuration.".to_string(),
        Some(400) => format!(
            "Invalid request: {}",
            err.remote_message()
                .unwrap_or_else(|| "Please check your image files.".to_string())
        ),
        Some(429) => "API rate limit exceeded. Please try again later.".to_string(),
        Some(status) if status >= 500 => "FitRoom API server error. Please try again later.".to_string(),
        _ if err.is_timeout() => timed_out(),
        _ if err.is_network() => network(),
        _ => describe(&err.to_string()),
    }
}

fn poll_message(err: &PollError) -> String {
    match err {
        PollError::Api(e) => remote_message(e),
        other => describe(&other.to_string()),
    }
}

/// Keyword fallback for errors without an HTTP status.
fn describe(message: &str) -> String {
    if message.contains("timeout") {
        timed_out()
    } else if message.contains("network") {
        network()
    } else {
        format!("Try-on failed: {message}")
    }
}

fn timed_out() -> String {
    "Request timed out. Please check your internet connection and try again.".to_string()
}

fn network() -> String {
    "Network error. Please check your internet connection and try again.".to_string()
}
