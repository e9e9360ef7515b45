use serde::{Deserialize, Serialize};

/// Metadata table primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Maximum payload accepted by the remote try-on service and the local
/// upload endpoint (10 MiB).
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

// ---------------------------------------------------------------------------
// EncodedImage
// ---------------------------------------------------------------------------

/// An encoded image file held in memory together with the metadata a
/// multipart upload needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    /// MIME type, e.g. `image/jpeg`. May be empty when unknown.
    pub mime: String,
    pub file_name: String,
}

impl EncodedImage {
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
            file_name: file_name.into(),
        }
    }

    /// Convenience constructor for JPEG payloads.
    pub fn jpeg(bytes: Vec<u8>, file_name: impl Into<String>) -> Self {
        Self::new(bytes, "image/jpeg", file_name)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Guess the MIME type from a file extension. Unknown extensions map to
    /// an empty string, which validation rejects.
    pub fn mime_for_path(path: &str) -> &'static str {
        let ext = path
            .rsplit('.')
            .next()
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "webp" => "image/webp",
            "gif" => "image/gif",
            "bmp" => "image/bmp",
            _ => "",
        }
    }
}

// ---------------------------------------------------------------------------
// ClothType
// ---------------------------------------------------------------------------

/// Garment region replaced by the remote service.
///
/// The kiosk always submits [`ClothType::FullSet`] so the whole costume
/// changes; the other values are accepted by the service and kept for
/// completeness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClothType {
    Upper,
    Lower,
    #[default]
    FullSet,
}

impl ClothType {
    /// Wire value sent in the `cloth_type` multipart field.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upper => "upper",
            Self::Lower => "lower",
            Self::FullSet => "full_set",
        }
    }
}

impl std::fmt::Display for ClothType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TryOnResult
// ---------------------------------------------------------------------------

/// Outcome of a completed try-on, handed to the display layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TryOnResult {
    /// Remote task identifier.
    pub task_id: String,
    /// Public URL of the durable copy. Authoritative for sharing.
    pub result_image_url: String,
    /// Metadata row id; `None` when the record insert failed.
    pub result_id: Option<DbId>,
    /// Signed (time-limited) URL returned by the remote service.
    pub fitroom_url: String,
    /// Path on the local kiosk server when the local save succeeded.
    pub local_path: Option<String>,
    pub local_save_success: bool,
}

impl TryOnResult {
    /// The string encoded into the result QR code.
    pub fn share_url(&self) -> &str {
        &self.result_image_url
    }
}
