//! Audio assembly: crossfade stitching, mastering and encoding.
//!
//! Each stage delegates to a [`MediaEngine`]. When the engine reports
//! itself unavailable the stage falls back to a lossy in-process path
//! (raw concatenation, unmastered audio, WAV output) instead of failing
//! the job. Any other engine error is returned.

use std::sync::Arc;
use std::time::Duration;

use narrate_audio::PcmBuffer;
use narrate_core::{
    EncodeSpec, MasteringSettings, MediaEngine, MediaError, OutputFormat, OutputSettings,
    StitchSpec, mastering_chain,
};
use tracing::{debug, warn};

use crate::error::AssembleError;

/// How chunk audio was joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StitchMode {
    /// A single chunk; nothing to join.
    Single,
    Crossfaded,
    /// Fallback: butt-joined with no overlap.
    Concatenated,
}

/// Stitched audio (float WAV).
#[derive(Debug, Clone)]
pub struct Stitched {
    pub audio: Vec<u8>,
    pub mode: StitchMode,
}

impl Stitched {
    /// Overlap actually applied at each join.
    pub const fn effective_crossfade(&self, requested: Duration) -> Duration {
        match self.mode {
            StitchMode::Crossfaded => requested,
            StitchMode::Single | StitchMode::Concatenated => Duration::ZERO,
        }
    }
}

/// Mastered audio (WAV).
#[derive(Debug, Clone)]
pub struct Mastered {
    pub audio: Vec<u8>,
    /// Whether the filter chain actually ran.
    pub applied: bool,
}

/// Final encoded artifact.
#[derive(Debug, Clone)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    /// Format of `bytes`; WAV when the requested encoder was unavailable.
    pub format: OutputFormat,
}

/// Stitches, masters and encodes chunk audio through a media engine.
#[derive(Clone)]
pub struct AudioAssembler {
    media: Arc<dyn MediaEngine>,
}

impl AudioAssembler {
    pub fn new(media: Arc<dyn MediaEngine>) -> Self {
        Self { media }
    }

    pub fn engine_name(&self) -> &str {
        self.media.name()
    }

    /// Join chunk audio in order.
    ///
    /// One input is only conformed to the target rate and channel count.
    pub async fn stitch(&self, inputs: &[Vec<u8>], spec: &StitchSpec) -> Result<Stitched, AssembleError> {
        match inputs {
            [] => Err(AssembleError::NoInput),
            [single] => {
                let audio = conform_float(single, spec.sample_rate, spec.channels)?;
                Ok(Stitched {
                    audio,
                    mode: StitchMode::Single,
                })
            }
            _ => match self.media.crossfade(inputs, spec).await {
                Ok(audio) => Ok(Stitched {
                    audio,
                    mode: StitchMode::Crossfaded,
                }),
                Err(MediaError::Unavailable(reason)) => {
                    warn!(
                        target: "narrate.audio",
                        engine = self.media.name(),
                        %reason,
                        "Media engine unavailable, concatenating chunks without crossfade"
                    );
                    Ok(Stitched {
                        audio: concatenate(inputs, spec.sample_rate, spec.channels)?,
                        mode: StitchMode::Concatenated,
                    })
                }
                Err(e) => Err(e.into()),
            },
        }
    }

    /// Run the mastering chain. Disabled mastering passes audio through.
    pub async fn master(&self, audio: Vec<u8>, settings: &MasteringSettings) -> Result<Mastered, AssembleError> {
        let chain = mastering_chain(settings);
        if chain.is_empty() {
            debug!(target: "narrate.audio", "Mastering disabled");
            return Ok(Mastered {
                audio,
                applied: false,
            });
        }

        match self.media.apply_filters(&audio, &chain).await {
            Ok(mastered) => Ok(Mastered {
                audio: mastered,
                applied: true,
            }),
            Err(MediaError::Unavailable(reason)) => {
                warn!(
                    target: "narrate.audio",
                    engine = self.media.name(),
                    %reason,
                    "Media engine unavailable, leaving audio unmastered"
                );
                Ok(Mastered {
                    audio,
                    applied: false,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Encode to the requested output.
    ///
    /// Falls back to 16-bit WAV when the engine is unavailable or cannot
    /// produce the requested format.
    pub async fn encode(&self, audio: &[u8], output: &OutputSettings) -> Result<Encoded, AssembleError> {
        let spec = EncodeSpec::from(output);
        match self.media.encode(audio, &spec).await {
            Ok(bytes) => Ok(Encoded {
                bytes,
                format: output.format,
            }),
            Err(e @ (MediaError::Unavailable(_) | MediaError::UnsupportedFormat(_))) => {
                warn!(
                    target: "narrate.audio",
                    engine = self.media.name(),
                    requested = output.format.extension(),
                    error = %e,
                    "Encoder unavailable, writing WAV instead"
                );
                let pcm = PcmBuffer::from_wav(audio)?.conform(output.sample_rate, output.channels)?;
                Ok(Encoded {
                    bytes: pcm.to_wav()?,
                    format: OutputFormat::Wav,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn conform_float(wav: &[u8], sample_rate: u32, channels: u16) -> Result<Vec<u8>, AssembleError> {
    let pcm = PcmBuffer::from_wav(wav)?;
    if pcm.sample_rate() == sample_rate && pcm.channels() == channels {
        return Ok(wav.to_vec());
    }
    Ok(pcm.conform(sample_rate, channels)?.to_wav_float()?)
}

fn concatenate(inputs: &[Vec<u8>], sample_rate: u32, channels: u16) -> Result<Vec<u8>, AssembleError> {
    let buffers = inputs
        .iter()
        .map(|wav| PcmBuffer::from_wav(wav)?.conform(sample_rate, channels))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(PcmBuffer::concat(&buffers)?.to_wav_float()?)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use narrate_audio::NativeMediaEngine;
    use narrate_core::{FadeCurve, Filter};

    use super::*;

    /// Engine that can never run.
    struct OfflineEngine;

    #[async_trait]
    impl MediaEngine for OfflineEngine {
        fn name(&self) -> &str {
            "offline"
        }

        async fn is_available(&self) -> bool {
            false
        }

        async fn crossfade(&self, _: &[Vec<u8>], _: &StitchSpec) -> Result<Vec<u8>, MediaError> {
            Err(MediaError::Unavailable("no binary".into()))
        }

        async fn apply_filters(&self, _: &[u8], _: &[Filter]) -> Result<Vec<u8>, MediaError> {
            Err(MediaError::Unavailable("no binary".into()))
        }

        async fn encode(&self, _: &[u8], _: &EncodeSpec) -> Result<Vec<u8>, MediaError> {
            Err(MediaError::Unavailable("no binary".into()))
        }
    }

    fn tone(seconds: f64, rate: u32) -> Vec<u8> {
        let frames = (seconds * f64::from(rate)) as usize;
        let samples = (0..frames)
            .map(|i| (i as f32 * 440.0 * std::f32::consts::TAU / rate as f32).sin() * 0.3)
            .collect();
        PcmBuffer::new(samples, rate, 1).unwrap().to_wav().unwrap()
    }

    fn spec(rate: u32) -> StitchSpec {
        StitchSpec {
            crossfade: Duration::from_millis(100),
            curve: FadeCurve::EqualPower,
            sample_rate: rate,
            channels: 1,
        }
    }

    fn duration(wav: &[u8]) -> f64 {
        PcmBuffer::from_wav(wav).unwrap().duration_seconds()
    }

    #[tokio::test]
    async fn test_empty_input_is_an_error() {
        let assembler = AudioAssembler::new(Arc::new(NativeMediaEngine::new()));
        let err = assembler.stitch(&[], &spec(16_000)).await.unwrap_err();
        assert!(matches!(err, AssembleError::NoInput));
    }

    #[tokio::test]
    async fn test_single_input_is_passed_through() {
        let assembler = AudioAssembler::new(Arc::new(NativeMediaEngine::new()));
        let input = tone(0.5, 16_000);
        let out = assembler.stitch(&[input.clone()], &spec(16_000)).await.unwrap();
        assert_eq!(out.mode, StitchMode::Single);
        assert_eq!(out.audio, input);
    }

    #[tokio::test]
    async fn test_two_inputs_lose_one_crossfade() {
        let assembler = AudioAssembler::new(Arc::new(NativeMediaEngine::new()));
        let inputs = vec![tone(1.0, 16_000), tone(0.5, 16_000)];
        let out = assembler.stitch(&inputs, &spec(16_000)).await.unwrap();
        assert_eq!(out.mode, StitchMode::Crossfaded);
        assert!((duration(&out.audio) - 1.4).abs() < 0.005);
    }

    #[tokio::test]
    async fn test_unavailable_engine_falls_back_to_concatenation() {
        let assembler = AudioAssembler::new(Arc::new(OfflineEngine));
        let inputs = vec![tone(1.0, 16_000), tone(0.5, 16_000)];
        let out = assembler.stitch(&inputs, &spec(16_000)).await.unwrap();
        assert_eq!(out.mode, StitchMode::Concatenated);
        assert_eq!(out.effective_crossfade(Duration::from_millis(100)), Duration::ZERO);
        assert!((duration(&out.audio) - 1.5).abs() < 0.005);
    }

    #[tokio::test]
    async fn test_unavailable_engine_leaves_audio_unmastered() {
        let assembler = AudioAssembler::new(Arc::new(OfflineEngine));
        let input = tone(0.5, 16_000);
        let out = assembler
            .master(input.clone(), &MasteringSettings::default())
            .await
            .unwrap();
        assert!(!out.applied);
        assert_eq!(out.audio, input);
    }

    #[tokio::test]
    async fn test_disabled_mastering_skips_chain() {
        let assembler = AudioAssembler::new(Arc::new(NativeMediaEngine::new()));
        let input = tone(0.5, 16_000);
        let settings = MasteringSettings {
            enabled: false,
            ..MasteringSettings::default()
        };
        let out = assembler.master(input.clone(), &settings).await.unwrap();
        assert!(!out.applied);
        assert_eq!(out.audio, input);
    }

    #[tokio::test]
    async fn test_native_encoder_falls_back_to_wav_for_mp3() {
        let assembler = AudioAssembler::new(Arc::new(NativeMediaEngine::new()));
        let output = OutputSettings {
            format: OutputFormat::Mp3,
            sample_rate: 16_000,
            ..OutputSettings::default()
        };
        let encoded = assembler.encode(&tone(0.5, 16_000), &output).await.unwrap();
        assert_eq!(encoded.format, OutputFormat::Wav);
        assert!((duration(&encoded.bytes) - 0.5).abs() < 0.005);
    }
}
