//! Parameter types for image operations.
//!
//! These structs describe *what* to produce, not *how*. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which decides what to encode) and the [`backend`](super::backend) (which
//! does the pixel work). Keeping them plain data lets the scheduler tests run
//! against a recording mock instead of real encoders.
//!
//! ## Types
//!
//! - [`Quality`] — Lossy encoding quality (1–100). Clamped on construction.
//! - [`BoundingBox`] — A `width × height` box an image must fit inside.
//! - [`VariantParams`] — Target box plus AVIF and JPEG settings for one variant.
//! - [`PlaceholderParams`] — Box edge and quality for the inline placeholder.

use serde::{Deserialize, Serialize};

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

/// A box the output must fit inside, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoundingBox {
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn square(edge: u32) -> Self {
        Self::new(edge, edge)
    }
}

/// Everything needed to produce one resized variant in both encodings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariantParams {
    pub target: BoundingBox,
    pub avif_quality: Quality,
    /// rav1e speed preset, 1 (slowest) to 10 (fastest).
    pub avif_speed: u8,
    pub jpeg_quality: Quality,
}

/// Parameters for the tiny inline preview.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaceholderParams {
    pub target: BoundingBox,
    pub quality: Quality,
}

impl Default for PlaceholderParams {
    fn default() -> Self {
        Self {
            target: BoundingBox::square(20),
            quality: Quality::new(20),
        }
    }
}
