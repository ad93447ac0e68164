//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations every backend must
//! support: decode, encode_variant, and encode_placeholder.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), pure Rust and statically
//! linked. Tests swap in a recording mock so the dispatcher and pipeline can
//! be exercised without paying for AVIF encodes.

use super::params::{PlaceholderParams, VariantParams};
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("{format} encode failed: {message}")]
    Encode {
        format: &'static str,
        message: String,
    },
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// One resized image, encoded twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedVariant {
    pub avif: Vec<u8>,
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// Implementations must be shareable across worker threads: a decoded image
/// is encoded at several sizes concurrently through the same backend.
pub trait ImageBackend: Send + Sync {
    /// Decode an in-memory buffer into pixels.
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError>;

    /// Resize to fit inside `params.target` and encode as AVIF and JPEG.
    fn encode_variant(
        &self,
        image: &DynamicImage,
        params: &VariantParams,
    ) -> Result<EncodedVariant, BackendError>;

    /// Resize to the placeholder box and encode at low quality.
    fn encode_placeholder(
        &self,
        image: &DynamicImage,
        params: &PlaceholderParams,
    ) -> Result<Vec<u8>, BackendError>;
}
