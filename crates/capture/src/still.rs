//! Virtual camera backed by still images.
//!
//! Each image file becomes one "device" whose track repeats the same frame.
//! Used by the CLI to drive a full capture session without hardware, and by
//! tests.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use image::RgbaImage;

use crate::backend::{
    BackendError, CameraBackend, CaptureDevice, DeviceSelector, StreamConstraints, VideoTrack,
};

/// A [`CameraBackend`] that serves fixed frames.
pub struct StillImageBackend {
    sources: Vec<(CaptureDevice, RgbaImage)>,
}

impl StillImageBackend {
    pub fn new(sources: Vec<(CaptureDevice, RgbaImage)>) -> Self {
        Self { sources }
    }

    /// One device per image file, labelled with the file name.
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self, BackendError> {
        let mut sources = Vec::with_capacity(paths.len());
        for (i, path) in paths.iter().enumerate() {
            let path = path.as_ref();
            let frame = image::open(path)
                .map_err(|e| BackendError::Other(format!("Failed to load {}: {e}", path.display())))?
                .to_rgba8();
            let label = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("still-{i}"));
            tracing::debug!(path = %path.display(), width = frame.width(), height = frame.height(), "Loaded still frame");
            sources.push((
                CaptureDevice {
                    id: format!("still-{i}"),
                    label,
                },
                frame,
            ));
        }
        Ok(Self { sources })
    }
}

#[async_trait]
impl CameraBackend for StillImageBackend {
    async fn enumerate_video_inputs(&self) -> Result<Vec<CaptureDevice>, BackendError> {
        Ok(self.sources.iter().map(|(d, _)| d.clone()).collect())
    }

    async fn open(&self, constraints: &StreamConstraints) -> Result<Box<dyn VideoTrack>, BackendError> {
        let source = match &constraints.device {
            DeviceSelector::Exact(id) => self.sources.iter().find(|(d, _)| &d.id == id),
            DeviceSelector::FacingUser => self.sources.first(),
        };
        let (_, frame) = source.ok_or_else(|| BackendError::NotFound("No camera found".to_string()))?;
        Ok(Box::new(StillTrack {
            frame: frame.clone(),
            stopped: AtomicBool::new(false),
        }))
    }
}

struct StillTrack {
    frame: RgbaImage,
    stopped: AtomicBool,
}

#[async_trait]
impl VideoTrack for StillTrack {
    async fn wait_for_frame(&self) -> Result<(), BackendError> {
        Ok(())
    }

    fn latest_frame(&self) -> Option<RgbaImage> {
        (!self.stopped.load(Ordering::Acquire)).then(|| self.frame.clone())
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }
}
