//! Render pipeline for narrate.
//!
//! Turns a submitted script into mastered audio:
//!
//! - [`RetryableFetcher`]: storage reads with backoff for eventual consistency
//! - [`ChunkCache`]: content-addressed chunk audio shared across jobs
//! - [`SynthesisClient`]: sequential voice engine calls with continuity context
//! - [`AudioAssembler`]: crossfade stitch, mastering chain, encode
//! - [`DiagnosticsCollector`]: post-render analysis
//! - [`StatusTracker`]: persisted job state machine
//! - [`RenderPipeline`]: orchestrates one job
//! - [`RenderService`]: submission, queue and background runner
#![deny(unused_crate_dependencies)]

mod assembler;
mod cache;
mod diagnostics;
mod error;
mod fetcher;
mod pipeline;
mod service;
mod status;
mod synthesis;

pub use assembler::{AudioAssembler, Encoded, Mastered, StitchMode, Stitched};
pub use cache::ChunkCache;
pub use diagnostics::{DiagnosticsCollector, join_spikes};
pub use error::{AssembleError, RenderError};
pub use fetcher::{FetchError, RetryableFetcher};
pub use pipeline::{RenderPipeline, RenderReport, RunOutcome, build_manifest};
pub use service::RenderService;
pub use status::StatusTracker;
pub use synthesis::{AudioSource, ChunkAudio, SynthesisClient, SynthesisSession};

// Used by integration tests only
#[cfg(test)]
use mockall as _;
