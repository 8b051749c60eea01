//! Interleaved PCM buffers and WAV conversion.

use std::io::Cursor;
use std::time::Duration;

use rubato::{FftFixedIn, Resampler as _};

use crate::error::AudioError;

/// Input block size for FFT resampling.
const RESAMPLE_CHUNK: usize = 1024;

/// Interleaved `f32` samples in `[-1.0, 1.0]` plus their format.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl PcmBuffer {
    /// Wrap interleaved samples, validating the shape.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self, AudioError> {
        if sample_rate == 0 {
            return Err(AudioError::InvalidFormat("sample rate is zero".to_string()));
        }
        if channels == 0 {
            return Err(AudioError::InvalidFormat("channel count is zero".to_string()));
        }
        if samples.len() % usize::from(channels) != 0 {
            return Err(AudioError::InvalidFormat(format!(
                "{} samples is not a whole number of {channels}-channel frames",
                samples.len()
            )));
        }
        Ok(Self {
            samples,
            sample_rate,
            channels,
        })
    }

    /// Digital silence of the given length.
    pub fn silence(duration: Duration, sample_rate: u32, channels: u16) -> Result<Self, AudioError> {
        let frames = (duration.as_secs_f64() * f64::from(sample_rate)).round() as usize;
        Self::new(
            vec![0.0; frames * usize::from(channels)],
            sample_rate,
            channels,
        )
    }

    /// Build from one sample vector per channel.
    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self, AudioError> {
        let count = u16::try_from(channels.len())
            .map_err(|_| AudioError::InvalidFormat("too many channels".to_string()))?;
        let frames = channels.first().map_or(0, Vec::len);
        if channels.iter().any(|c| c.len() != frames) {
            return Err(AudioError::InvalidFormat(
                "channels have different lengths".to_string(),
            ));
        }
        let mut samples = Vec::with_capacity(frames * channels.len());
        for i in 0..frames {
            samples.extend(channels.iter().map(|c| c[i]));
        }
        Self::new(samples, sample_rate, count)
    }

    /// Decode a WAV file (integer or float samples).
    pub fn from_wav(bytes: &[u8]) -> Result<Self, AudioError> {
        let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
        let spec = reader.spec();

        let samples = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => {
                let scale = f64::from(1u32 << (spec.bits_per_sample.saturating_sub(1)).min(31));
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| (f64::from(v) / scale) as f32))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        Self::new(samples, spec.sample_rate, spec.channels)
    }

    /// Decode raw little-endian signed 16-bit PCM.
    pub fn from_pcm16_le(bytes: &[u8], sample_rate: u32, channels: u16) -> Result<Self, AudioError> {
        if bytes.len() % 2 != 0 {
            return Err(AudioError::InvalidFormat(format!(
                "odd byte count {} for 16-bit PCM",
                bytes.len()
            )));
        }
        let samples = bytes
            .chunks_exact(2)
            .map(|b| f32::from(i16::from_le_bytes([b[0], b[1]])) / 32_768.0)
            .collect();
        Self::new(samples, sample_rate, channels)
    }

    /// Encode as 16-bit PCM WAV, clipping out-of-range samples.
    pub fn to_wav(&self) -> Result<Vec<u8>, AudioError> {
        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        self.write_wav(spec, |writer, s| {
            writer.write_sample((s.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16)
        })
    }

    /// Encode as 32-bit float WAV. Used for intermediates so that headroom
    /// survives until loudness normalisation.
    pub fn to_wav_float(&self) -> Result<Vec<u8>, AudioError> {
        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        self.write_wav(spec, |writer, s| writer.write_sample(s))
    }

    fn write_wav<F>(&self, spec: hound::WavSpec, mut write: F) -> Result<Vec<u8>, AudioError>
    where
        F: FnMut(&mut hound::WavWriter<Cursor<&mut Vec<u8>>>, f32) -> Result<(), hound::Error>,
    {
        let mut bytes = Vec::with_capacity(44 + self.samples.len() * 4);
        {
            let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec)
                .map_err(|e| AudioError::Encode(e.to_string()))?;
            for &s in &self.samples {
                write(&mut writer, s).map_err(|e| AudioError::Encode(e.to_string()))?;
            }
            writer
                .finalize()
                .map_err(|e| AudioError::Encode(e.to_string()))?;
        }
        Ok(bytes)
    }

    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub const fn channels(&self) -> u16 {
        self.channels
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Number of sample frames.
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    /// Split into one vector per channel.
    pub fn deinterleave(&self) -> Vec<Vec<f32>> {
        let ch = usize::from(self.channels);
        (0..ch)
            .map(|c| self.samples.iter().skip(c).step_by(ch).copied().collect())
            .collect()
    }

    /// Largest absolute sample value.
    pub fn sample_peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }

    /// Scale every sample by a gain in decibels.
    pub fn apply_gain_db(&mut self, gain_db: f64) {
        let gain = 10f64.powf(gain_db / 20.0) as f32;
        for s in &mut self.samples {
            *s *= gain;
        }
    }

    /// Mix or duplicate channels to reach `target`.
    ///
    /// Down-mixing averages all channels; up-mixing copies the mono mix to
    /// every output channel.
    pub fn to_channels(&self, target: u16) -> Result<Self, AudioError> {
        if target == self.channels {
            return Ok(self.clone());
        }
        if target == 0 {
            return Err(AudioError::InvalidFormat("channel count is zero".to_string()));
        }
        let ch = usize::from(self.channels);
        let mut samples = Vec::with_capacity(self.frames() * usize::from(target));
        for frame in self.samples.chunks_exact(ch) {
            let mono = frame.iter().sum::<f32>() / ch as f32;
            samples.extend(std::iter::repeat_n(mono, usize::from(target)));
        }
        Self::new(samples, self.sample_rate, target)
    }

    /// FFT-resample to `target_rate`, compensating for resampler delay.
    pub fn resample(&self, target_rate: u32) -> Result<Self, AudioError> {
        if target_rate == self.sample_rate {
            return Ok(self.clone());
        }
        if target_rate == 0 {
            return Err(AudioError::InvalidFormat("sample rate is zero".to_string()));
        }
        let channels = resample_channels(&self.deinterleave(), self.sample_rate, target_rate)?;
        Self::from_channels(channels, target_rate)
    }

    /// Convert to the given rate and channel count.
    pub fn conform(&self, sample_rate: u32, channels: u16) -> Result<Self, AudioError> {
        self.to_channels(channels)?.resample(sample_rate)
    }

    /// Append buffers with identical formats end to end.
    pub fn concat(buffers: &[Self]) -> Result<Self, AudioError> {
        let Some(first) = buffers.first() else {
            return Err(AudioError::InvalidFormat("nothing to concatenate".to_string()));
        };
        let mut samples = Vec::with_capacity(buffers.iter().map(|b| b.samples.len()).sum());
        for b in buffers {
            if b.sample_rate != first.sample_rate || b.channels != first.channels {
                return Err(AudioError::FormatMismatch(format!(
                    "{} Hz/{} ch vs {} Hz/{} ch",
                    b.sample_rate, b.channels, first.sample_rate, first.channels
                )));
            }
            samples.extend_from_slice(&b.samples);
        }
        Self::new(samples, first.sample_rate, first.channels)
    }
}

/// Resample each channel with an FFT resampler.
///
/// Input is fed in fixed blocks, the tail is zero-padded and the output is
/// trimmed by the resampler's reported delay so timing is preserved.
pub(crate) fn resample_channels(
    channels: &[Vec<f32>],
    from_rate: u32,
    to_rate: u32,
) -> Result<Vec<Vec<f32>>, AudioError> {
    let n_channels = channels.len();
    let frames = channels.first().map_or(0, Vec::len);
    if frames == 0 || n_channels == 0 {
        return Ok(vec![Vec::new(); n_channels]);
    }

    let mut resampler = FftFixedIn::<f32>::new(
        from_rate as usize,
        to_rate as usize,
        RESAMPLE_CHUNK,
        2, // sub-chunks for quality
        n_channels,
    )
    .map_err(|e| AudioError::Resample(e.to_string()))?;

    let delay = resampler.output_delay();
    let expected = (frames as f64 * f64::from(to_rate) / f64::from(from_rate)).ceil() as usize;
    let needed = delay + expected;
    // Hard stop well past the padded tail in case the resampler stalls.
    let max_input = frames + RESAMPLE_CHUNK * 8 + delay * 2;

    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(needed + RESAMPLE_CHUNK); n_channels];
    let mut block: Vec<Vec<f32>> = vec![vec![0.0; RESAMPLE_CHUNK]; n_channels];
    let mut pos = 0;

    while output[0].len() < needed && pos < max_input {
        for (dst, src) in block.iter_mut().zip(channels) {
            dst.fill(0.0);
            if pos < src.len() {
                let end = (pos + RESAMPLE_CHUNK).min(src.len());
                dst[..end - pos].copy_from_slice(&src[pos..end]);
            }
        }
        pos += RESAMPLE_CHUNK;

        let result = resampler
            .process(block.as_slice(), None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        for (dst, src) in output.iter_mut().zip(result) {
            dst.extend_from_slice(&src);
        }
    }

    for channel in &mut output {
        channel.drain(..delay.min(channel.len()));
        channel.resize(expected, 0.0);
    }
    Ok(output)
}
