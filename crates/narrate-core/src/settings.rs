//! Render settings domain types and validation.
//!
//! `RenderSettings` is the per-job settings object submitted alongside the
//! script. It is persisted in `request.json` and hashed, so every field has
//! a serde default and the defaults must stay stable.

use serde::{Deserialize, Serialize};

/// Default output sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Default crossfade between adjacent chunks, in milliseconds.
pub const DEFAULT_CROSSFADE_MS: u32 = 80;

/// Default maximum characters per synthesized chunk.
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 800;

/// Complete settings for one render job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderSettings {
    /// Voice engine parameters.
    pub voice: VoiceSettings,
    /// Final artifact format.
    pub output: OutputSettings,
    /// Mastering filter chain.
    pub mastering: MasteringSettings,
    /// Chunking limits.
    pub chunking: ChunkingSettings,
    /// Crossfade applied at each chunk join.
    pub crossfade: CrossfadeSettings,
}

/// Parameters sent to the voice engine. Part of every chunk cache key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct VoiceSettings {
    /// Engine voice identifier.
    pub voice_id: String,
    /// Engine model identifier.
    pub model_id: String,
    /// Stability (0.0–1.0). Lower is more expressive.
    pub stability: f32,
    /// Similarity boost (0.0–1.0).
    pub similarity_boost: f32,
    /// Style exaggeration (0.0–1.0).
    pub style: f32,
    /// Speaking rate multiplier (0.7–1.2).
    pub speed: f32,
    /// Whether the engine should apply its speaker boost.
    pub use_speaker_boost: bool,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            voice_id: "narrator".to_string(),
            model_id: "multilingual-v2".to_string(),
            stability: 0.5,
            similarity_boost: 0.75,
            style: 0.0,
            speed: 1.0,
            use_speaker_boost: true,
        }
    }
}

/// Container/codec of the final artifact.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// 16-bit PCM WAV.
    #[default]
    Wav,
    /// MPEG-1 Layer III at the configured bitrate.
    Mp3,
    /// Lossless FLAC.
    Flac,
}

impl OutputFormat {
    /// File extension used for artifacts of this format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::Flac => "flac",
        }
    }

    /// MIME type used when storing artifacts of this format.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Mp3 => "audio/mpeg",
            Self::Flac => "audio/flac",
        }
    }

    /// Whether the codec discards information.
    #[must_use]
    pub const fn is_lossy(self) -> bool {
        matches!(self, Self::Mp3)
    }
}

/// Output encoding parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct OutputSettings {
    pub format: OutputFormat,
    pub sample_rate: u32,
    /// 1 = mono, 2 = stereo.
    pub channels: u16,
    /// Only used by lossy formats.
    pub bitrate_kbps: u32,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            format: OutputFormat::Wav,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: 1,
            bitrate_kbps: 192,
        }
    }
}

/// Dynamic range compressor parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CompressorSettings {
    pub threshold_db: f32,
    pub ratio: f32,
    pub attack_ms: f32,
    pub release_ms: f32,
    pub makeup_db: f32,
}

impl Default for CompressorSettings {
    fn default() -> Self {
        Self {
            threshold_db: -18.0,
            ratio: 3.0,
            attack_ms: 10.0,
            release_ms: 120.0,
            makeup_db: 2.0,
        }
    }
}

/// Mastering chain parameters, applied in fixed order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct MasteringSettings {
    /// When false the filter chain is skipped but encoding still happens.
    pub enabled: bool,
    /// High-pass cutoff in Hz. 0 disables the filter.
    pub highpass_hz: f32,
    /// De-esser notch centre frequency in Hz.
    pub deess_frequency_hz: f32,
    /// De-esser cut depth in dB. 0 disables the filter.
    pub deess_amount_db: f32,
    pub compressor: CompressorSettings,
    /// Integrated loudness target.
    pub target_lufs: f32,
    /// True-peak ceiling in dBTP.
    pub true_peak_db: f32,
}

impl Default for MasteringSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            highpass_hz: 80.0,
            deess_frequency_hz: 6_500.0,
            deess_amount_db: 3.0,
            compressor: CompressorSettings::default(),
            target_lufs: -16.0,
            true_peak_db: -1.5,
        }
    }
}

/// Chunking limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ChunkingSettings {
    pub max_chunk_chars: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
        }
    }
}

/// Shape of the gain curves used at a join.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FadeCurve {
    /// sin/cos gains; constant power across the overlap.
    #[default]
    EqualPower,
    /// Linear gains; constant amplitude across the overlap.
    Triangular,
}

/// Crossfade parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct CrossfadeSettings {
    pub duration_ms: u32,
    pub curve: FadeCurve,
}

impl Default for CrossfadeSettings {
    fn default() -> Self {
        Self {
            duration_ms: DEFAULT_CROSSFADE_MS,
            curve: FadeCurve::EqualPower,
        }
    }
}

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("Voice id cannot be empty")]
    EmptyVoiceId,

    #[error("{field} must be between 0.0 and 1.0, got {value}")]
    OutOfUnitRange { field: &'static str, value: f32 },

    #[error("Speed must be between 0.5 and 2.0, got {0}")]
    InvalidSpeed(f32),

    #[error("Sample rate must be between 8000 and 192000 Hz, got {0}")]
    InvalidSampleRate(u32),

    #[error("Channel count must be 1 or 2, got {0}")]
    InvalidChannels(u16),

    #[error("Bitrate must be between 32 and 320 kbps, got {0}")]
    InvalidBitrate(u32),

    #[error("Max chunk size must be between 50 and 5000 characters, got {0}")]
    InvalidChunkSize(usize),

    #[error("Crossfade must be at most 2000 ms, got {0}")]
    InvalidCrossfade(u32),

    #[error("Compressor ratio must be at least 1.0, got {0}")]
    InvalidRatio(f32),

    #[error("{field} must be a non-negative finite number, got {value}")]
    InvalidFilterValue { field: &'static str, value: f32 },

    #[error("High-pass cutoff must be below Nyquist ({nyquist} Hz), got {cutoff_hz}")]
    HighPassAboveNyquist { cutoff_hz: f32, nyquist: f32 },

    #[error("Loudness target must be between -40 and -5 LUFS, got {0}")]
    InvalidLoudnessTarget(f32),

    #[error("True-peak ceiling must be between -9 and 0 dBTP, got {0}")]
    InvalidTruePeak(f32),
}

fn check_unit(field: &'static str, value: f32) -> Result<(), SettingsError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SettingsError::OutOfUnitRange { field, value })
    }
}

fn check_non_negative(field: &'static str, value: f32) -> Result<(), SettingsError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SettingsError::InvalidFilterValue { field, value })
    }
}

/// Validate settings values.
pub fn validate_settings(settings: &RenderSettings) -> Result<(), SettingsError> {
    let voice = &settings.voice;
    if voice.voice_id.trim().is_empty() {
        return Err(SettingsError::EmptyVoiceId);
    }
    check_unit("stability", voice.stability)?;
    check_unit("similarityBoost", voice.similarity_boost)?;
    check_unit("style", voice.style)?;
    if !(0.5..=2.0).contains(&voice.speed) {
        return Err(SettingsError::InvalidSpeed(voice.speed));
    }

    let output = &settings.output;
    if !(8_000..=192_000).contains(&output.sample_rate) {
        return Err(SettingsError::InvalidSampleRate(output.sample_rate));
    }
    if !(1..=2).contains(&output.channels) {
        return Err(SettingsError::InvalidChannels(output.channels));
    }
    if output.format.is_lossy() && !(32..=320).contains(&output.bitrate_kbps) {
        return Err(SettingsError::InvalidBitrate(output.bitrate_kbps));
    }

    if !(50..=5_000).contains(&settings.chunking.max_chunk_chars) {
        return Err(SettingsError::InvalidChunkSize(
            settings.chunking.max_chunk_chars,
        ));
    }
    if settings.crossfade.duration_ms > 2_000 {
        return Err(SettingsError::InvalidCrossfade(
            settings.crossfade.duration_ms,
        ));
    }

    let mastering = &settings.mastering;
    check_non_negative("highpassHz", mastering.highpass_hz)?;
    let nyquist = output.sample_rate as f32 / 2.0;
    if mastering.highpass_hz >= nyquist {
        return Err(SettingsError::HighPassAboveNyquist {
            cutoff_hz: mastering.highpass_hz,
            nyquist,
        });
    }
    check_non_negative("deessFrequencyHz", mastering.deess_frequency_hz)?;
    check_non_negative("deessAmountDb", mastering.deess_amount_db)?;
    check_non_negative("attackMs", mastering.compressor.attack_ms)?;
    check_non_negative("releaseMs", mastering.compressor.release_ms)?;
    if mastering.compressor.ratio < 1.0 || !mastering.compressor.ratio.is_finite() {
        return Err(SettingsError::InvalidRatio(mastering.compressor.ratio));
    }
    if !(-40.0..=-5.0).contains(&mastering.target_lufs) {
        return Err(SettingsError::InvalidLoudnessTarget(mastering.target_lufs));
    }
    if !(-9.0..=0.0).contains(&mastering.true_peak_db) {
        return Err(SettingsError::InvalidTruePeak(mastering.true_peak_db));
    }

    Ok(())
}
