//! In-process media engine built on the [`dsp`](crate::dsp) module.

use async_trait::async_trait;
use narrate_core::{EncodeSpec, Filter, MediaEngine, MediaError, OutputFormat, StitchSpec};
use tracing::debug;

use crate::dsp;
use crate::error::AudioError;
use crate::pcm::PcmBuffer;

/// Media engine with no external dependencies.
///
/// Always available. Encodes WAV only; any other target format yields
/// [`MediaError::UnsupportedFormat`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeMediaEngine;

impl NativeMediaEngine {
    pub const fn new() -> Self {
        Self
    }
}

/// Run CPU-bound DSP off the async executor.
async fn blocking<T, F>(work: F) -> Result<T, MediaError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AudioError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| MediaError::Failed(format!("DSP task panicked: {e}")))?
        .map_err(MediaError::from)
}

#[async_trait]
impl MediaEngine for NativeMediaEngine {
    fn name(&self) -> &str {
        "native"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn crossfade(&self, inputs: &[Vec<u8>], spec: &StitchSpec) -> Result<Vec<u8>, MediaError> {
        if inputs.is_empty() {
            return Err(MediaError::InvalidInput("no inputs to crossfade".to_string()));
        }
        let inputs = inputs.to_vec();
        let spec = *spec;
        blocking(move || {
            let buffers = inputs
                .iter()
                .map(|bytes| PcmBuffer::from_wav(bytes)?.conform(spec.sample_rate, spec.channels))
                .collect::<Result<Vec<_>, _>>()?;
            debug!(
                target: "narrate.audio",
                inputs = buffers.len(),
                crossfade_ms = spec.crossfade.as_millis(),
                "Native crossfade"
            );
            dsp::stitch(&buffers, spec.crossfade, spec.curve)?.to_wav_float()
        })
        .await
    }

    async fn apply_filters(&self, input: &[u8], filters: &[Filter]) -> Result<Vec<u8>, MediaError> {
        let input = input.to_vec();
        let filters = filters.to_vec();
        blocking(move || {
            let mut buffer = PcmBuffer::from_wav(&input)?;
            for filter in &filters {
                debug!(target: "narrate.audio", filter = filter.label(), "Applying filter");
                buffer = dsp::apply_filter(&buffer, filter);
            }
            buffer.to_wav_float()
        })
        .await
    }

    async fn encode(&self, input: &[u8], spec: &EncodeSpec) -> Result<Vec<u8>, MediaError> {
        if spec.format != OutputFormat::Wav {
            return Err(MediaError::UnsupportedFormat(spec.format));
        }
        let input = input.to_vec();
        let spec = *spec;
        blocking(move || {
            PcmBuffer::from_wav(&input)?
                .conform(spec.sample_rate, spec.channels)?
                .to_wav()
        })
        .await
    }
}
