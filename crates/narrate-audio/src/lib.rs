//! Audio handling for narrate: PCM buffers, mastering DSP, loudness
//! measurement and the two [`MediaEngine`](narrate_core::MediaEngine)
//! adapters.
//!
//! | Adapter | Crossfade | Filters | Encode |
//! |---|---|---|---|
//! | [`NativeMediaEngine`] | yes | yes | WAV only |
//! | [`FfmpegEngine`] | yes | yes | WAV, MP3, FLAC |
#![deny(unused_crate_dependencies)]

pub mod dsp;
mod error;
mod ffmpeg;
mod native;
mod pcm;

pub use error::AudioError;
pub use ffmpeg::{FfmpegEngine, crossfade_graph, filter_expression};
pub use native::NativeMediaEngine;
pub use pcm::PcmBuffer;
