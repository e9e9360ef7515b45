//! Camera acquisition and the capture flow of the kiosk.
//!
//! ```text
//! CaptureSession      state machine: loading -> ready -> capturing -> uploaded
//!       |
//!       v
//! CaptureDeviceManager  enumerate, acquire, release, switch
//!       |
//!       v
//! CameraBackend trait   hardware (or the still-image virtual camera)
//! ```
//!
//! The session owns at most one open [`CaptureStream`] at a time. Every
//! transition that gives up the camera releases the stream before a new
//! acquisition starts.

pub mod backend;
pub mod cache;
pub mod error;
pub mod manager;
pub mod session;
pub mod still;

pub use backend::{
    BackendError, CameraBackend, CaptureDevice, CaptureStream, DeviceSelector, StreamConstraints,
    VideoTrack,
};
pub use cache::RemountCache;
pub use error::CaptureError;
pub use manager::{
    AcquireOutcome, AcquisitionGuard, CaptureDeviceManager, ManagerConfig, ManagerState,
};
pub use session::{
    CaptureSession, CaptureSource, PhotoUploader, SessionConfig, SessionMode, SessionState,
    StoredPhoto, UploadedCapture,
};
pub use still::StillImageBackend;
