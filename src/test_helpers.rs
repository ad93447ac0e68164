//! Shared test utilities for the variant-pool test suite.
//!
//! Synthetic images are generated in memory so no fixture files are needed:
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let png = encode_test_png(300, 200);
//! let job = job_with(1, png, JobOptions::default());
//! let result = run_job(&RustBackend::new(), &ProcessConfig::default(), job);
//! ```

use image::{DynamicImage, ImageEncoder, RgbImage};
use std::sync::mpsc;
use std::time::Duration;

use crate::dispatcher::DispatchEvent;
use crate::pipeline::Job;
use crate::types::{JobId, JobOptions, SourceMetadata};

// =========================================================================
// Synthetic images
// =========================================================================

/// A gradient image with enough detail that encoders cannot collapse it.
pub fn synthetic_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }))
}

/// PNG-encoded bytes of [`synthetic_image`].
pub fn encode_test_png(width: u32, height: u32) -> Vec<u8> {
    let img = synthetic_image(width, height).to_rgb8();
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

/// JPEG-encoded bytes of [`synthetic_image`].
pub fn encode_test_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = synthetic_image(width, height).to_rgb8();
    let mut buf = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

// =========================================================================
// Jobs
// =========================================================================

/// Build a job without metadata.
pub fn job_with(id: u64, bytes: Vec<u8>, options: JobOptions) -> Job {
    Job {
        id: JobId(id),
        bytes,
        metadata: SourceMetadata::default(),
        options,
    }
}

// =========================================================================
// Dispatcher event helpers
// =========================================================================

/// Drain every event currently buffered on the channel.
///
/// Call after the dispatcher has shut down so the stream is complete.
pub fn collect_events(rx: &mpsc::Receiver<DispatchEvent>) -> Vec<DispatchEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.recv_timeout(Duration::from_millis(50)) {
        events.push(event);
    }
    events
}

/// Job ids in the order they were admitted.
pub fn admission_order(events: &[DispatchEvent]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|e| match e {
            DispatchEvent::Admitted { id, .. } => Some(id.0),
            _ => None,
        })
        .collect()
}

/// Highest active-job count observed in any event.
pub fn peak_active(events: &[DispatchEvent]) -> usize {
    events
        .iter()
        .map(DispatchEvent::active_jobs)
        .max()
        .unwrap_or(0)
}
