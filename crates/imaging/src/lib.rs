//! Raster operations for the try-on kiosk.
//!
//! - [`compositor`]: fit a photo into a photo-frame template and encode the
//!   result.
//! - [`capture`]: turn a raw camera frame into the fixed 1150x1840 mirrored
//!   portrait that is uploaded after a capture.
//!
//! Everything here is synchronous and CPU-bound; async callers should run
//! it on a blocking thread.

pub mod capture;
pub mod compositor;
pub mod encode;
pub mod error;
pub mod geometry;

pub use capture::{capture_frame, CapturedImage, CAPTURE_HEIGHT, CAPTURE_WIDTH};
pub use compositor::{
    compose, place, CompositeParameters, FitMode, FramePreset, FrameTemplate, Placement,
    PlacementArea,
};
pub use encode::OutputFormat;
pub use error::ImagingError;
pub use geometry::Rect;
