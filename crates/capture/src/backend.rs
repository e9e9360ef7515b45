//! Camera backend abstraction.
//!
//! A [`CameraBackend`] enumerates video inputs and opens a [`VideoTrack`]
//! for a set of [`StreamConstraints`]. The manager wraps each open track in
//! a [`CaptureStream`] handle whose `stop` is idempotent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use image::RgbaImage;

/// A camera-class input device. Ordering is enumeration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureDevice {
    pub id: String,
    pub label: String,
}

/// Errors reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("device not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

/// Which device to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelector {
    /// Exact device id from a previous enumeration.
    Exact(String),
    /// Any front-facing camera; used when no device list is known.
    FacingUser,
}

/// Request passed to [`CameraBackend::open`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConstraints {
    pub device: DeviceSelector,
    /// Preferred, not required.
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl StreamConstraints {
    pub const IDEAL_WIDTH: u32 = 1280;
    pub const IDEAL_HEIGHT: u32 = 720;

    /// Exact-match constraint when a device is known, front-facing
    /// otherwise.
    pub fn for_device(device: Option<&CaptureDevice>) -> Self {
        let device = match device {
            Some(d) if !d.id.is_empty() => DeviceSelector::Exact(d.id.clone()),
            _ => DeviceSelector::FacingUser,
        };
        Self {
            device,
            ideal_width: Self::IDEAL_WIDTH,
            ideal_height: Self::IDEAL_HEIGHT,
        }
    }
}

/// Source of camera hardware.
#[async_trait]
pub trait CameraBackend: Send + Sync {
    /// List camera-class inputs. An empty list is valid.
    async fn enumerate_video_inputs(&self) -> Result<Vec<CaptureDevice>, BackendError>;

    /// Request access to a camera. The returned track is live until
    /// [`VideoTrack::stop`] is called.
    async fn open(&self, constraints: &StreamConstraints) -> Result<Box<dyn VideoTrack>, BackendError>;
}

/// One live video track.
#[async_trait]
pub trait VideoTrack: Send + Sync {
    /// Resolves once the track has produced a decodable frame.
    async fn wait_for_frame(&self) -> Result<(), BackendError>;

    /// Most recent frame, if any. `None` after stop.
    fn latest_frame(&self) -> Option<RgbaImage>;

    /// Stop the underlying hardware track.
    fn stop(&self);
}

struct StreamInner {
    track: Box<dyn VideoTrack>,
    device: Option<CaptureDevice>,
    stopped: AtomicBool,
}

/// Shared handle to an open track.
///
/// Clones refer to the same track. [`stop`](Self::stop) stops the track
/// exactly once no matter how many times or from which clone it is called.
#[derive(Clone)]
pub struct CaptureStream {
    inner: Arc<StreamInner>,
}

impl std::fmt::Debug for CaptureStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureStream")
            .field("device", &self.inner.device)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl CaptureStream {
    pub fn new(track: Box<dyn VideoTrack>, device: Option<CaptureDevice>) -> Self {
        Self {
            inner: Arc::new(StreamInner {
                track,
                device,
                stopped: AtomicBool::new(false),
            }),
        }
    }

    pub fn device(&self) -> Option<&CaptureDevice> {
        self.inner.device.as_ref()
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// Current frame, or `None` once stopped.
    pub fn latest_frame(&self) -> Option<RgbaImage> {
        if self.is_stopped() {
            return None;
        }
        self.inner.track.latest_frame()
    }

    pub(crate) async fn wait_for_frame(&self) -> Result<(), BackendError> {
        self.inner.track.wait_for_frame().await
    }

    /// Whether both handles refer to the same open track.
    pub fn same_track(&self, other: &CaptureStream) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Stop the track. Safe to call repeatedly.
    pub fn stop(&self) {
        if !self.inner.stopped.swap(true, Ordering::AcqRel) {
            self.inner.track.stop();
            tracing::debug!(device = ?self.inner.device.as_ref().map(|d| &d.id), "Camera track stopped");
        }
    }
}
