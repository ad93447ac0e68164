//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::BoundingBox;

/// Calculate output dimensions that fit entirely inside `bounds`.
///
/// Aspect ratio is preserved and the image is never enlarged: a source that
/// already fits is returned unchanged. Both output edges are at least 1px.
///
/// # Examples
/// ```
/// # use variant_pool::imaging::{BoundingBox, fit_inside};
/// // 3000x2000 landscape into 600x600 → width constrained
/// assert_eq!(fit_inside((3000, 2000), BoundingBox::square(600)), (600, 400));
///
/// // 100x80 into 1200x1200 → unchanged, never upscaled
/// assert_eq!(fit_inside((100, 80), BoundingBox::square(1200)), (100, 80));
/// ```
pub fn fit_inside(source: (u32, u32), bounds: BoundingBox) -> (u32, u32) {
    let (src_w, src_h) = source;

    if src_w <= bounds.width && src_h <= bounds.height {
        return (src_w, src_h);
    }

    let scale_w = bounds.width as f64 / src_w as f64;
    let scale_h = bounds.height as f64 / src_h as f64;

    if scale_w <= scale_h {
        // Width is the constrained axis
        let h = (src_h as f64 * scale_w).round() as u32;
        (bounds.width, h.clamp(1, bounds.height))
    } else {
        // Height is the constrained axis
        let w = (src_w as f64 * scale_h).round() as u32;
        (w.clamp(1, bounds.width), bounds.height)
    }
}
