//! Turn a live camera frame into the fixed portrait uploaded after a
//! capture.

use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::encode::{self, OutputFormat};
use crate::error::ImagingError;
use crate::geometry::{crop_to_aspect, Rect};

/// Output width of every capture, regardless of camera resolution.
pub const CAPTURE_WIDTH: u32 = 1150;
/// Output height of every capture.
pub const CAPTURE_HEIGHT: u32 = 1840;
/// JPEG quality used for captures.
pub const CAPTURE_QUALITY: f32 = 0.92;

/// 575:920, i.e. `CAPTURE_WIDTH / CAPTURE_HEIGHT`.
pub fn capture_aspect() -> f64 {
    CAPTURE_WIDTH as f64 / CAPTURE_HEIGHT as f64
}

/// A captured, encoded portrait. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    /// JPEG bytes.
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Source rectangle cropped out of a `width` x `height` frame.
pub fn capture_crop(width: u32, height: u32) -> Rect {
    crop_to_aspect(width as f64, height as f64, capture_aspect())
}

/// Crop `frame` to 575:920 about its centre, mirror it horizontally, scale
/// to 1150x1840 and encode as JPEG.
pub fn capture_frame(frame: &RgbaImage) -> Result<CapturedImage, ImagingError> {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return Err(ImagingError::Empty { width, height });
    }

    let crop = capture_crop(width, height);
    let sx = (crop.x.round() as u32).min(width - 1);
    let sy = (crop.y.round() as u32).min(height - 1);
    let sw = (crop.width.round() as u32).clamp(1, width - sx);
    let sh = (crop.height.round() as u32).clamp(1, height - sy);

    let cropped = imageops::crop_imm(frame, sx, sy, sw, sh).to_image();
    let mut canvas = imageops::resize(&cropped, CAPTURE_WIDTH, CAPTURE_HEIGHT, FilterType::Triangle);
    imageops::flip_horizontal_in_place(&mut canvas);

    tracing::debug!(
        source_width = width,
        source_height = height,
        crop_x = sx,
        crop_y = sy,
        crop_width = sw,
        crop_height = sh,
        "Captured frame"
    );

    let bytes = encode::encode(&canvas, OutputFormat::Jpeg, CAPTURE_QUALITY)?;
    Ok(CapturedImage {
        bytes,
        width: CAPTURE_WIDTH,
        height: CAPTURE_HEIGHT,
    })
}
