use std::time::Duration;

use fitbooth_core::ValidationError;
use fitbooth_imaging::ImagingError;
use fitbooth_local::LocalServerError;

use crate::backend::BackendError;

/// Errors surfaced by the capture flow.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// Camera access was denied by the user or the platform.
    #[error("Camera permission denied: {0}")]
    Permission(String),

    /// No usable camera, or the device failed to open.
    #[error("Camera unavailable: {0}")]
    Device(String),

    /// The stream produced no decodable frame in time.
    #[error("Camera did not produce a frame within {}s", .0.as_secs_f32())]
    Timeout(Duration),

    /// Capture requested without a live, ready stream.
    #[error("Camera is not ready")]
    NotReady,

    /// Another capture or upload is already running.
    #[error("A capture is already in progress")]
    InProgress,

    /// The captured photo could not be stored on the local server.
    #[error("Upload failed: {0}")]
    Upload(#[from] LocalServerError),

    #[error(transparent)]
    Imaging(#[from] ImagingError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The session was torn down while the operation was pending.
    #[error("Capture session was closed")]
    TornDown,

    /// A retake or teardown discarded the photo while its upload was pending.
    #[error("Capture was discarded")]
    Superseded,

    /// The blocking encode task panicked or was cancelled.
    #[error("Capture worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl From<BackendError> for CaptureError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::PermissionDenied(msg) => Self::Permission(msg),
            BackendError::NotFound(msg) | BackendError::Other(msg) => Self::Device(msg),
        }
    }
}
