//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Dispatch progress
//!
//! ```text
//! job-1 queued (normal, 1 waiting)
//! job-1 started (1/2 active, 0 waiting)
//! job-1 done (0/2 active, 0 waiting)
//! ```
//!
//! ## Job summary
//!
//! ```text
//! 001 dawn.jpg (412ms)
//!     small: 150x100 (avif 3.1 KB, jpeg 6.4 KB)
//!     medium: 600x400 (avif 21.7 KB, jpeg 58.0 KB)
//!     large: skipped
//!     placeholder: 912 B data URL
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::config::PipelineConfig;
use crate::dispatcher::{DispatchEvent, PoolStatus};
use crate::pipeline::JobError;
use crate::types::{ProcessedImage, SizeLabel};

/// Format a 1-based position as a zero-padded index.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn format_bytes(len: usize) -> String {
    if len < 1024 {
        format!("{} B", len)
    } else {
        format!("{:.1} KB", len as f64 / 1024.0)
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Format a single dispatcher event as display lines.
///
/// `limit` is the ceiling the caller configured; events carry only counts.
pub fn format_dispatch_event(event: &DispatchEvent, limit: usize) -> Vec<String> {
    let line = match event {
        DispatchEvent::Queued {
            id,
            priority,
            queue_length,
            ..
        } => format!("{} queued ({}, {} waiting)", id, priority, queue_length),
        DispatchEvent::Admitted {
            id,
            queue_length,
            active_jobs,
        } => format!(
            "{} started ({}/{} active, {} waiting)",
            id, active_jobs, limit, queue_length
        ),
        DispatchEvent::Finished {
            id,
            succeeded,
            queue_length,
            active_jobs,
        } => format!(
            "{} {} ({}/{} active, {} waiting)",
            id,
            if *succeeded { "done" } else { "failed" },
            active_jobs,
            limit,
            queue_length
        ),
    };
    vec![line]
}

pub fn format_status(status: &PoolStatus) -> Vec<String> {
    vec![format!(
        "Pool: {}/{} active, {} waiting",
        status.active_jobs, status.concurrency_limit, status.queue_length
    )]
}

// ============================================================================
// Job results
// ============================================================================

/// Format the outcome of one job.
///
/// Every predefined size gets a line; sizes the job did not produce show as
/// `skipped`, which covers both unrequested and failed encodes.
pub fn format_job_summary(position: usize, source: &str, result: &ProcessedImage) -> Vec<String> {
    let mut lines = vec![format!(
        "{} {} ({}ms)",
        format_index(position),
        source,
        result.processing_ms()
    )];

    for label in SizeLabel::ALL {
        match result.variant(label) {
            Some(v) => lines.push(format!(
                "    {}: {}x{} (avif {}, jpeg {})",
                label,
                v.width,
                v.height,
                format_bytes(v.avif.len()),
                format_bytes(v.jpeg.len())
            )),
            None => lines.push(format!("    {}: skipped", label)),
        }
    }

    match result.placeholder.as_deref() {
        Some("") => lines.push("    placeholder: failed".to_string()),
        Some(url) => lines.push(format!(
            "    placeholder: {} data URL",
            format_bytes(url.len())
        )),
        None => {}
    }
    lines
}

pub fn format_job_failure(position: usize, source: &str, error: &JobError) -> Vec<String> {
    vec![
        format!("{} {}", format_index(position), source),
        format!("    error: {}", error),
    ]
}

pub fn format_run_summary(succeeded: usize, failed: usize) -> Vec<String> {
    let noun = if succeeded == 1 { "image" } else { "images" };
    if failed == 0 {
        vec![format!("Processed {} {}", succeeded, noun)]
    } else {
        vec![format!("Processed {} {}, {} failed", succeeded, noun, failed)]
    }
}

// ============================================================================
// Config
// ============================================================================

pub fn format_config_summary(config: &PipelineConfig) -> Vec<String> {
    let mut lines = vec![
        "Pool".to_string(),
        format!("    concurrency: {}", config.pool.concurrency),
        format!("    max queue depth: {}", config.pool.max_queue_depth),
        "Sizes".to_string(),
    ];
    for label in SizeLabel::ALL {
        let bounds = config.sizes.get(label);
        lines.push(format!("    {}: {}x{}", label, bounds.width, bounds.height));
    }
    lines.push("Encoding".to_string());
    lines.push(format!(
        "    avif: quality {}, speed {}",
        config.encoding.avif_quality, config.encoding.avif_speed
    ));
    lines.push(format!(
        "    jpeg: quality {}, progressive",
        config.encoding.jpeg_quality
    ));
    lines.push(format!(
        "    placeholder: {}x{}, quality {}",
        config.placeholder.size, config.placeholder.size, config.placeholder.quality
    ));
    lines
}

// ============================================================================
// Print wrappers
// ============================================================================

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

pub fn print_dispatch_event(event: &DispatchEvent, limit: usize) {
    print_lines(format_dispatch_event(event, limit));
}

pub fn print_job_summary(position: usize, source: &str, result: &ProcessedImage) {
    print_lines(format_job_summary(position, source, result));
}

pub fn print_job_failure(position: usize, source: &str, error: &JobError) {
    print_lines(format_job_failure(position, source, error));
}

pub fn print_run_summary(succeeded: usize, failed: usize) {
    print_lines(format_run_summary(succeeded, failed));
}

pub fn print_config_summary(config: &PipelineConfig) {
    print_lines(format_config_summary(config));
}
