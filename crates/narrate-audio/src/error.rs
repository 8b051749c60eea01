//! Audio processing error types.

use narrate_core::MediaError;

/// Errors from PCM handling and DSP.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// Input bytes are not a readable WAV file.
    #[error("Failed to decode WAV: {0}")]
    Decode(String),

    /// Writing WAV output failed.
    #[error("Failed to encode WAV: {0}")]
    Encode(String),

    /// Buffer shape is inconsistent (channels, rate, sample count).
    #[error("Invalid audio format: {0}")]
    InvalidFormat(String),

    /// Buffers with different formats were combined.
    #[error("Format mismatch: {0}")]
    FormatMismatch(String),

    /// Audio resampling error.
    #[error("Audio resampling failed: {0}")]
    Resample(String),
}

impl From<hound::Error> for AudioError {
    fn from(err: hound::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<AudioError> for MediaError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::Decode(_) | AudioError::InvalidFormat(_) | AudioError::FormatMismatch(_) => {
                Self::InvalidInput(err.to_string())
            }
            AudioError::Encode(_) | AudioError::Resample(_) => Self::Failed(err.to_string()),
        }
    }
}
