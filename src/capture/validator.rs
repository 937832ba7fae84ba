/// Content sniffing for downloaded snapshots
///
/// Camera endpoints sometimes answer with an HTML error page and a 200
/// status, so the status code alone says nothing. A payload is accepted
/// only when its leading bytes carry a known raster image signature.

use image::ImageFormat;

use super::fetcher::FetchedImage;
use crate::error::ValidationError;

/// Smallest payload accepted as a real snapshot; placeholders are tiny
pub const MIN_IMAGE_BYTES: usize = 1024;

/// Raster formats accepted from cameras
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl ImageKind {
    /// File extension used for stored frames
    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpeg",
            ImageKind::Png => "png",
            ImageKind::Gif => "gif",
            ImageKind::WebP => "webp",
        }
    }

    /// Inverse of `extension`, also accepting "jpg"
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Some(ImageKind::Jpeg),
            "png" => Some(ImageKind::Png),
            "gif" => Some(ImageKind::Gif),
            "webp" => Some(ImageKind::WebP),
            _ => None,
        }
    }
}

/// Check that `bytes` look like a real image
pub fn validate(bytes: &[u8]) -> Result<ImageKind, ValidationError> {
    if bytes.is_empty() {
        return Err(ValidationError::Empty);
    }

    // HTML error pages and JSON error bodies
    let first = bytes.iter().find(|b| !b.is_ascii_whitespace());
    if matches!(first, Some(b'<') | Some(b'{')) {
        return Err(ValidationError::LooksLikeText);
    }

    if bytes.len() < MIN_IMAGE_BYTES {
        return Err(ValidationError::TooSmall {
            size: bytes.len(),
            min: MIN_IMAGE_BYTES,
        });
    }

    match image::guess_format(bytes) {
        Ok(ImageFormat::Jpeg) => Ok(ImageKind::Jpeg),
        Ok(ImageFormat::Png) => Ok(ImageKind::Png),
        Ok(ImageFormat::Gif) => Ok(ImageKind::Gif),
        Ok(ImageFormat::WebP) => Ok(ImageKind::WebP),
        _ => Err(ValidationError::UnknownSignature(
            bytes[..bytes.len().min(8)].to_vec(),
        )),
    }
}

/// Validate a full HTTP response, including its declared content type
pub fn validate_response(response: &FetchedImage) -> Result<ImageKind, ValidationError> {
    if let Some(content_type) = &response.content_type {
        if content_type.to_ascii_lowercase().contains("text/html") {
            return Err(ValidationError::HtmlContentType(content_type.clone()));
        }
    }
    validate(&response.bytes)
}
