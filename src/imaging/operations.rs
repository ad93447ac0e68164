//! High-level image operations.
//!
//! These functions combine parameters with backend execution. The backend
//! does pixels; this layer decides what a caller gets back when it fails.

use super::backend::{BackendError, EncodedVariant, ImageBackend};
use super::params::{PlaceholderParams, VariantParams};
use base64::{Engine, engine::general_purpose::STANDARD};
use image::DynamicImage;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// MIME type of the placeholder encoding produced by every backend.
pub const PLACEHOLDER_MEDIA_TYPE: &str = "image/jpeg";

/// Create one resized variant in both encodings.
pub fn create_variant(
    backend: &impl ImageBackend,
    image: &DynamicImage,
    params: &VariantParams,
) -> Result<EncodedVariant> {
    backend.encode_variant(image, params)
}

/// Create an inline placeholder as a `data:` URL.
///
/// Best effort: any backend failure yields an empty string, never an error.
pub fn create_placeholder(
    backend: &impl ImageBackend,
    image: &DynamicImage,
    params: &PlaceholderParams,
) -> String {
    match backend.encode_placeholder(image, params) {
        Ok(bytes) => placeholder_data_url(&bytes),
        Err(e) => {
            tracing::warn!("Placeholder generation failed: {}", e);
            String::new()
        }
    }
}

/// Wrap encoded placeholder bytes as a base64 `data:` URL.
pub fn placeholder_data_url(bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        PLACEHOLDER_MEDIA_TYPE,
        STANDARD.encode(bytes)
    )
}

/// Decode the payload of a `data:` URL produced by [`placeholder_data_url`].
///
/// Returns `None` for an empty or foreign string.
pub fn placeholder_bytes(data_url: &str) -> Option<Vec<u8>> {
    let prefix = format!("data:{};base64,", PLACEHOLDER_MEDIA_TYPE);
    let payload = data_url.strip_prefix(&prefix)?;
    STANDARD.decode(payload).ok()
}
