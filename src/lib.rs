//! # Variant Pool
//!
//! A bounded, priority-aware worker pool that turns uploaded images into
//! responsive variants. Every accepted image is decoded once and re-encoded at
//! up to three sizes, each in AVIF and progressive JPEG, plus a tiny inline
//! placeholder for blur-up loading.
//!
//! # Architecture: Queue → Dispatcher → Pipeline
//!
//! ```text
//! submit(bytes, options)
//!     │
//!     ▼
//! PriorityQueue      high jumps ahead of waiting normal/low; FIFO otherwise
//!     │
//!     ▼
//! Dispatcher         admits while active < limit (1-5); one scheduler thread
//!     │
//!     ▼
//! run_job            decode once → sizes in parallel → placeholder
//!     │
//!     ▼
//! JobTicket          one-shot result: ProcessedImage or JobError
//! ```
//!
//! The scheduler thread is the only owner of the queue and the active count.
//! Everything else talks to it through messages, so there are no locks on
//! the admission path.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`dispatcher`] | Scheduler thread, concurrency ceiling, tickets, progress events |
//! | [`queue`] | Bounded two-tier priority queue |
//! | [`pipeline`] | Per-job decode/resize/encode with the failure policy |
//! | [`imaging`] | Pure-Rust image operations: fit, AVIF, progressive JPEG, placeholder |
//! | [`config`] | `variant-pool.toml` loading, merging over stock defaults, validation |
//! | [`types`] | Shared request/result types (`JobOptions`, `ProcessedImage`, ...) |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Two Encodings Per Size
//!
//! AVIF is the primary output; progressive JPEG is the universally decodable
//! fallback. Both come from the same resized pixels so a `<picture>` element
//! can offer them interchangeably.
//!
//! ## Partial Results Over Failed Jobs
//!
//! Once a source has decoded, nothing short of a panic fails the job. A size
//! that fails to encode is left out of the result and logged; a placeholder
//! that fails becomes an empty string. Callers check which sizes they got.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding and resizing use the `image` crate, AVIF goes through `rav1e`, and
//! progressive JPEG through `jpeg-encoder`. No system libraries are needed.

pub mod config;
pub mod dispatcher;
pub mod imaging;
pub mod output;
pub mod pipeline;
pub mod queue;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use dispatcher::{Dispatcher, DispatcherConfig, JobTicket, PoolStatus, SubmitError};
pub use pipeline::JobError;
pub use types::{JobOptions, Priority, ProcessedImage, SizeLabel, SourceMetadata, Variant};
