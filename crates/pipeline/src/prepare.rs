//! Turning a selected model photo into the upload payload.

use fitbooth_core::EncodedImage;
use fitbooth_imaging::{compose, FramePreset, FrameTemplate};

/// Where the model photo came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// Taken at the kiosk; gets the try-on frame.
    Captured,
    /// One of the bundled model photos, by id.
    Preset(String),
}

/// Frame a captured photo with the try-on preset.
///
/// Falls back to the unframed bytes as `captured.jpg` when there is no
/// template or compositing fails. Preset photos pass through as `{id}.jpg`.
pub fn frame_model_image(bytes: Vec<u8>, source: &ModelSource, template: Option<&FrameTemplate>) -> EncodedImage {
    let template = match (source, template) {
        (ModelSource::Preset(id), _) => return EncodedImage::jpeg(bytes, format!("{id}.jpg")),
        (ModelSource::Captured, None) => return EncodedImage::jpeg(bytes, "captured.jpg"),
        (ModelSource::Captured, Some(template)) => template,
    };

    let preset = FramePreset::TryOnCapture;
    match compose(&template.with_area(preset.area()), &bytes, &preset.parameters()) {
        Ok(framed) => {
            tracing::debug!(size = framed.len(), "Captured photo framed");
            EncodedImage::jpeg(framed, "captured_with_frame.jpg")
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to add photo frame, using original image");
            EncodedImage::jpeg(bytes, "captured.jpg")
        }
    }
}

/// [`frame_model_image`] on the blocking pool.
pub async fn prepare_model_image(
    bytes: Vec<u8>,
    source: ModelSource,
    template: Option<FrameTemplate>,
) -> EncodedImage {
    let fallback = bytes.clone();
    let task = tokio::task::spawn_blocking(move || frame_model_image(bytes, &source, template.as_ref()));
    match task.await {
        Ok(image) => image,
        Err(e) => {
            tracing::error!(error = %e, "Framing task failed, using original image");
            EncodedImage::jpeg(fallback, "captured.jpg")
        }
    }
}
