//! HTTP adapter for the [`SynthesisEngine`](narrate_core::SynthesisEngine) port.
//!
//! Talks to an ElevenLabs-compatible text-to-speech API and returns each
//! chunk as WAV. Retries and pacing are handled by the render pipeline.
#![deny(unused_crate_dependencies)]

mod client;
mod config;

pub use client::{HttpSynthesisEngine, REQUEST_ID_HEADER, error_message};
pub use config::{ENV_ENGINE_API_KEY, ENV_ENGINE_URL, SynthConfig};
