//! Input checks that run before any network call.
//!
//! The remote try-on service rejects anything other than a small set of
//! raster formats and anything over 10 MiB; catching that locally gives the
//! user a precise message instead of an opaque 400.

use crate::error::ValidationError;
use crate::types::{EncodedImage, MAX_IMAGE_BYTES};

/// MIME types accepted by the remote service.
pub const SUPPORTED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/webp"];

/// Validate a single image destined for the remote service.
///
/// Checks, in order: presence, a usable MIME type, a supported MIME type,
/// non-empty payload, and the size ceiling.
pub fn validate_image_for_api(
    image: Option<&EncodedImage>,
    label: &str,
) -> Result<(), ValidationError> {
    let image = image.ok_or_else(|| ValidationError::new(label, "is required"))?;

    if image.mime.is_empty() || image.mime == "text/plain" {
        let shown = if image.mime.is_empty() {
            "undefined"
        } else {
            image.mime.as_str()
        };
        return Err(ValidationError::new(
            label,
            format!("has invalid MIME type: {shown}"),
        ));
    }

    if !SUPPORTED_IMAGE_TYPES.contains(&image.mime.as_str()) {
        return Err(ValidationError::new(
            label,
            format!(
                "has unsupported MIME type: {}. Supported: {}",
                image.mime,
                SUPPORTED_IMAGE_TYPES.join(", ")
            ),
        ));
    }

    if image.is_empty() {
        return Err(ValidationError::new(label, "is empty"));
    }

    if image.len() > MAX_IMAGE_BYTES {
        return Err(ValidationError::new(
            label,
            "is too large. Maximum size is 10MB",
        ));
    }

    Ok(())
}

/// Validate both try-on inputs. The model image is checked first.
pub fn validate_inputs(
    model: Option<&EncodedImage>,
    cloth: Option<&EncodedImage>,
) -> Result<(), ValidationError> {
    validate_image_for_api(model, "Model image")?;
    validate_image_for_api(cloth, "Cloth image")
}

/// Looser check used by the kiosk upload endpoint: any `image/*` type,
/// non-empty, within the size ceiling.
pub fn validate_upload(image: &EncodedImage) -> Result<(), ValidationError> {
    if !image.mime.starts_with("image/") {
        return Err(ValidationError::new(
            "Selected file",
            "is not an image. Please select an image file",
        ));
    }
    if image.is_empty() {
        return Err(ValidationError::new("Selected file", "is empty"));
    }
    if image.len() > MAX_IMAGE_BYTES {
        return Err(ValidationError::new(
            "Selected file",
            "is too large. Maximum size is 10MB",
        ));
    }
    Ok(())
}
