//! Media engine port: stitching, filtering and encoding.
//!
//! All inputs and intermediates are WAV bytes. Filters are engine-neutral
//! descriptions; each adapter renders them its own way.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::settings::{FadeCurve, MasteringSettings, OutputFormat, OutputSettings};

/// Q of the de-esser notch.
pub const DEESS_Q: f32 = 2.0;

/// One stage of the mastering chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Filter {
    /// Second-order high-pass removing rumble.
    HighPass { cutoff_hz: f32 },
    /// Peaking cut over the sibilance band.
    DeEss {
        frequency_hz: f32,
        cut_db: f32,
        q: f32,
    },
    /// Feed-forward downward compressor.
    Compressor {
        threshold_db: f32,
        ratio: f32,
        attack_ms: f32,
        release_ms: f32,
        makeup_db: f32,
    },
    /// Integrated loudness normalisation with a true-peak ceiling.
    LoudNorm { target_lufs: f32, true_peak_db: f32 },
}

impl Filter {
    /// Short label for logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::HighPass { .. } => "highpass",
            Self::DeEss { .. } => "deess",
            Self::Compressor { .. } => "compressor",
            Self::LoudNorm { .. } => "loudnorm",
        }
    }
}

/// Build the mastering chain in its fixed order: high-pass, de-ess,
/// compression, loudness normalisation.
///
/// Returns an empty chain when mastering is disabled. A zero de-ess amount
/// skips that stage.
#[must_use]
pub fn mastering_chain(settings: &MasteringSettings) -> Vec<Filter> {
    if !settings.enabled {
        return Vec::new();
    }

    let mut chain = vec![Filter::HighPass {
        cutoff_hz: settings.highpass_hz,
    }];
    if settings.deess_amount_db > 0.0 {
        chain.push(Filter::DeEss {
            frequency_hz: settings.deess_frequency_hz,
            cut_db: settings.deess_amount_db,
            q: DEESS_Q,
        });
    }
    let c = &settings.compressor;
    chain.push(Filter::Compressor {
        threshold_db: c.threshold_db,
        ratio: c.ratio,
        attack_ms: c.attack_ms,
        release_ms: c.release_ms,
        makeup_db: c.makeup_db,
    });
    chain.push(Filter::LoudNorm {
        target_lufs: settings.target_lufs,
        true_peak_db: settings.true_peak_db,
    });
    chain
}

/// How to stitch chunk audio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StitchSpec {
    /// Overlap at each join.
    pub crossfade: Duration,
    pub curve: FadeCurve,
    /// Every input is conformed to this rate before stitching.
    pub sample_rate: u32,
    pub channels: u16,
}

/// Target of the final encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeSpec {
    pub format: OutputFormat,
    pub sample_rate: u32,
    pub channels: u16,
    pub bitrate_kbps: u32,
}

impl From<&OutputSettings> for EncodeSpec {
    fn from(output: &OutputSettings) -> Self {
        Self {
            format: output.format,
            sample_rate: output.sample_rate,
            channels: output.channels,
            bitrate_kbps: output.bitrate_kbps,
        }
    }
}

/// Errors from a media engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MediaError {
    /// The engine cannot run at all (e.g. missing binary).
    #[error("Media engine unavailable: {0}")]
    Unavailable(String),

    #[error("Unsupported output format: {0:?}")]
    UnsupportedFormat(OutputFormat),

    #[error("Invalid media input: {0}")]
    InvalidInput(String),

    #[error("Media processing failed: {0}")]
    Failed(String),
}

impl MediaError {
    /// Whether the caller should take its lossy fallback path.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Audio processing backend.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    /// Whether the engine can currently run.
    async fn is_available(&self) -> bool;

    /// Crossfade-concatenate the inputs in order.
    ///
    /// Output duration is `sum(d_i) - (n - 1) * crossfade` with the
    /// crossfade clamped to the shorter side of each join.
    async fn crossfade(&self, inputs: &[Vec<u8>], spec: &StitchSpec) -> Result<Vec<u8>, MediaError>;

    /// Run the filters in order.
    async fn apply_filters(&self, input: &[u8], filters: &[Filter]) -> Result<Vec<u8>, MediaError>;

    /// Encode WAV input into the target format.
    async fn encode(&self, input: &[u8], spec: &EncodeSpec) -> Result<Vec<u8>, MediaError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn _assert_object_safe(_: Arc<dyn MediaEngine>) {}

    #[test]
    fn test_chain_order() {
        let chain = mastering_chain(&MasteringSettings::default());
        let labels: Vec<&str> = chain.iter().map(Filter::label).collect();
        assert_eq!(labels, vec!["highpass", "deess", "compressor", "loudnorm"]);
    }

    #[test]
    fn test_disabled_mastering_is_empty() {
        let settings = MasteringSettings {
            enabled: false,
            ..MasteringSettings::default()
        };
        assert!(mastering_chain(&settings).is_empty());
    }

    #[test]
    fn test_zero_deess_is_skipped() {
        let settings = MasteringSettings {
            deess_amount_db: 0.0,
            ..MasteringSettings::default()
        };
        assert_eq!(mastering_chain(&settings).len(), 3);
    }
}
