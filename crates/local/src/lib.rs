//! Client for the kiosk's local companion server.
//!
//! The local server stores captured photos (`/Images_input/...`) and a copy
//! of every try-on result (`/result_s/...`), lists saved results for the
//! admin view, and records failed attempts.

pub mod client;
pub mod config;

use async_trait::async_trait;

pub use client::{
    FailureReport, LocalServerClient, LocalServerError, ResultEntry, SaveResultOutcome,
    UploadResponse,
};
pub use config::LocalServerConfig;

/// Best-effort copy of a result image on the kiosk.
///
/// Implementations never fail: problems are reported through
/// [`SaveResultOutcome::success`] and [`SaveResultOutcome::error`].
#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn save_result(&self, bytes: Vec<u8>, filename: &str) -> SaveResultOutcome;
}

/// Fire-and-forget sink for failed try-on attempts.
#[async_trait]
pub trait FailureTracker: Send + Sync {
    async fn track_failure(&self, report: &FailureReport);
}

#[async_trait]
impl ResultCache for LocalServerClient {
    async fn save_result(&self, bytes: Vec<u8>, filename: &str) -> SaveResultOutcome {
        LocalServerClient::save_result(self, bytes, filename).await
    }
}

#[async_trait]
impl FailureTracker for LocalServerClient {
    async fn track_failure(&self, report: &FailureReport) {
        LocalServerClient::track_failure(self, report).await
    }
}
