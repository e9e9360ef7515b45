use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{Rgb, RgbImage, RgbaImage};

use crate::error::ImagingError;

/// Output container for encoded canvases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Lossy; keeps composites well under the remote 10 MB ceiling.
    #[default]
    Jpeg,
    Png,
}

impl OutputFormat {
    pub fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }
}

/// Map a `[0.1, 1.0]` quality factor onto the JPEG encoder's 1..=100 scale.
/// Out-of-range values are clamped.
pub fn jpeg_quality(quality: f32) -> u8 {
    let q = if quality.is_nan() { 0.85 } else { quality };
    (q.clamp(0.1, 1.0) * 100.0).round() as u8
}

/// Encode an RGBA canvas.
///
/// JPEG has no alpha channel: transparent pixels are composited onto black,
/// matching what a browser canvas export does.
pub fn encode(canvas: &RgbaImage, format: OutputFormat, quality: f32) -> Result<Vec<u8>, ImagingError> {
    let mut out = Cursor::new(Vec::new());
    match format {
        OutputFormat::Jpeg => {
            let rgb = flatten_on_black(canvas);
            let encoder = JpegEncoder::new_with_quality(&mut out, jpeg_quality(quality));
            rgb.write_with_encoder(encoder).map_err(ImagingError::Encode)?;
        }
        OutputFormat::Png => {
            let encoder = PngEncoder::new(&mut out);
            canvas
                .write_with_encoder(encoder)
                .map_err(ImagingError::Encode)?;
        }
    }
    Ok(out.into_inner())
}

fn flatten_on_black(canvas: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(canvas.width(), canvas.height(), |x, y| {
        let [r, g, b, a] = canvas.get_pixel(x, y).0;
        let scale = |c: u8| ((c as u16 * a as u16 + 127) / 255) as u8;
        Rgb([scale(r), scale(g), scale(b)])
    })
}
