//! Per-job transcoding pipeline.
//!
//! A job is decoded once, then each requested size is resized and encoded
//! independently. Sizes run concurrently on the current rayon pool; in full
//! mode the placeholder runs alongside them.
//!
//! ## Failure policy
//!
//! | Failure | Full mode (`All`) | Partial mode (`Only`) |
//! |---|---|---|
//! | Decode | job fails ([`JobError::Decode`]) | logged, empty result |
//! | One size | logged, size omitted | logged, size omitted |
//! | Placeholder | logged, empty string | not run |
//!
//! Nothing here panics on bad input; errors are downgraded or returned,
//! never propagated into the dispatcher.

use crate::config::PipelineConfig;
use crate::imaging::{
    BackendError, BoundingBox, ImageBackend, PlaceholderParams, Quality, VariantParams,
    create_placeholder, create_variant,
};
use crate::types::{
    JobId, JobOptions, ProcessedImage, SizeLabel, SizeSelection, SourceMetadata, Variant,
};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Source image could not be decoded: {0}")]
    Decode(#[source] BackendError),
    #[error("Pipeline panicked: {0}")]
    Panicked(String),
    #[error("Job was dropped before it completed")]
    Abandoned,
}

/// A unit of work: the image buffer plus what to do with it.
///
/// The buffer is owned by the job and released once it has been decoded.
#[derive(Debug)]
pub struct Job {
    pub id: JobId,
    pub bytes: Vec<u8>,
    pub metadata: SourceMetadata,
    pub options: JobOptions,
}

/// Encoding settings resolved from [`PipelineConfig`].
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub boxes: BTreeMap<SizeLabel, BoundingBox>,
    pub avif_quality: Quality,
    pub avif_speed: u8,
    pub jpeg_quality: Quality,
    pub placeholder: PlaceholderParams,
}

impl ProcessConfig {
    /// Build a ProcessConfig from PipelineConfig values.
    pub fn from_pipeline_config(config: &PipelineConfig) -> Self {
        Self {
            boxes: SizeLabel::ALL
                .iter()
                .map(|&label| (label, config.sizes.get(label)))
                .collect(),
            avif_quality: Quality::new(config.encoding.avif_quality),
            avif_speed: config.encoding.avif_speed,
            jpeg_quality: Quality::new(config.encoding.jpeg_quality),
            placeholder: PlaceholderParams {
                target: BoundingBox::square(config.placeholder.size),
                quality: Quality::new(config.placeholder.quality),
            },
        }
    }

    /// Encoder parameters for one size.
    pub fn variant_params(&self, label: SizeLabel) -> VariantParams {
        VariantParams {
            target: self.boxes[&label],
            avif_quality: self.avif_quality,
            avif_speed: self.avif_speed,
            jpeg_quality: self.jpeg_quality,
        }
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self::from_pipeline_config(&PipelineConfig::default())
    }
}

/// Run one job to completion.
///
/// Returns `Err` only when the job as a whole cannot produce anything in
/// full mode; see the module docs for the complete policy.
pub fn run_job(
    backend: &impl ImageBackend,
    config: &ProcessConfig,
    job: Job,
) -> Result<ProcessedImage, JobError> {
    let started = Instant::now();
    let Job {
        id,
        bytes,
        metadata,
        options,
    } = job;

    tracing::debug!(
        "Processing {} ({}, {} bytes)",
        id,
        metadata.filename.as_deref().unwrap_or("unnamed"),
        bytes.len()
    );

    let decoded = backend.decode(&bytes);
    drop(bytes);

    let image = match (decoded, &options.sizes) {
        (Ok(image), _) => image,
        (Err(e), SizeSelection::All) => return Err(JobError::Decode(e)),
        (Err(e), SizeSelection::Only(_)) => {
            tracing::warn!("{}: decode failed, no sizes produced: {}", id, e);
            return Ok(ProcessedImage {
                job_id: id,
                variants: BTreeMap::new(),
                placeholder: None,
                duration: started.elapsed(),
            });
        }
    };

    let labels = options.sizes.labels();
    let encode_sizes = || -> BTreeMap<SizeLabel, Variant> {
        labels
            .par_iter()
            .filter_map(|&label| {
                match create_variant(backend, &image, &config.variant_params(label)) {
                    Ok(encoded) => Some((
                        label,
                        Variant {
                            label,
                            avif: encoded.avif,
                            jpeg: encoded.jpeg,
                            width: encoded.width,
                            height: encoded.height,
                        },
                    )),
                    Err(e) => {
                        tracing::warn!("{}: {} variant omitted: {}", id, label, e);
                        None
                    }
                }
            })
            .collect()
    };

    let (variants, placeholder) = if options.sizes.is_all() {
        let (variants, placeholder) = rayon::join(encode_sizes, || {
            create_placeholder(backend, &image, &config.placeholder)
        });
        (variants, Some(placeholder))
    } else {
        (encode_sizes(), None)
    };

    let duration = started.elapsed();
    tracing::debug!(
        "{} produced {} of {} sizes in {}ms",
        id,
        variants.len(),
        labels.len(),
        duration.as_millis()
    );

    Ok(ProcessedImage {
        job_id: id,
        variants,
        placeholder,
        duration,
    })
}
