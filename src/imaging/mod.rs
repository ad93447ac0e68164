//! Image processing — pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (format sniffed from bytes) |
//! | **Resize** | Lanczos3, fit inside a box, never upscale |
//! | **Encode → AVIF** | rav1e via `image::codecs::avif` |
//! | **Encode → JPEG** | `jpeg-encoder`, progressive |
//! | **Placeholder** | 20×20 JPEG, base64 `data:` URL |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining parameters + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, EncodedVariant, ImageBackend};
pub use calculations::fit_inside;
pub use operations::{create_placeholder, create_variant, placeholder_bytes};
pub use params::{BoundingBox, PlaceholderParams, Quality, VariantParams};
pub use rust_backend::RustBackend;
