//! Voice engine port.

use async_trait::async_trait;
use thiserror::Error;

use crate::settings::VoiceSettings;

/// One engine call.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    /// Engine-facing chunk text (break tags included).
    pub text: String,
    pub voice: VoiceSettings,
    /// Desired PCM sample rate of the returned audio.
    pub sample_rate: u32,
    /// Trailing slice of the previous chunk, for prosody continuity.
    pub previous_text: Option<String>,
    /// Leading slice of the next chunk.
    pub next_text: Option<String>,
    /// Request ids of the most recent prior calls, oldest first.
    pub previous_request_ids: Vec<String>,
}

/// Engine output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisResponse {
    /// WAV-encoded audio.
    pub audio: Vec<u8>,
    /// Engine-assigned id, fed back as continuity context.
    pub request_id: Option<String>,
}

/// Errors from the voice engine. Never retried within a chunk call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("Voice engine error{}: {message}", status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    #[error("Voice engine unreachable: {0}")]
    Transport(String),

    #[error("Invalid voice engine response: {0}")]
    InvalidResponse(String),
}

impl SynthesisError {
    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }
}

/// External text-to-speech engine.
#[async_trait]
pub trait SynthesisEngine: Send + Sync {
    /// Synthesize one chunk.
    async fn synthesize(
        &self,
        request: &SynthesisRequest,
    ) -> Result<SynthesisResponse, SynthesisError>;

    /// Short engine name for logs.
    fn name(&self) -> &str;
}
