/// Errors from decoding, compositing, or encoding images.
#[derive(Debug, thiserror::Error)]
pub enum ImagingError {
    /// An input asset could not be decoded. Terminal for the call.
    #[error("Failed to load {what}: {source}")]
    Load {
        /// Which input failed, e.g. `"photo frame"`.
        what: &'static str,
        #[source]
        source: image::ImageError,
    },

    /// The output canvas could not be encoded.
    #[error("Failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    /// A frame or image with zero width or height.
    #[error("Image has no pixels ({width}x{height})")]
    Empty { width: u32, height: u32 },
}
