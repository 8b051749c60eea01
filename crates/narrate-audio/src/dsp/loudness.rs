//! ITU-R BS.1770 loudness and true-peak measurement.

use crate::dsp::biquad::Biquad;
use crate::pcm::{PcmBuffer, resample_channels};

/// Gating block length.
const BLOCK_SECONDS: f64 = 0.4;
/// Block hop (75% overlap).
const HOP_SECONDS: f64 = 0.1;
const ABSOLUTE_GATE_LUFS: f64 = -70.0;
const RELATIVE_GATE_LU: f64 = -10.0;
/// Oversampling factor for true-peak estimation.
const TRUE_PEAK_OVERSAMPLING: u32 = 4;

fn loudness_of(mean_square: f64) -> f64 {
    -0.691 + 10.0 * mean_square.log10()
}

/// Gated integrated loudness in LUFS.
///
/// Returns `None` for empty audio or when every block falls under the
/// absolute gate (e.g. silence). Audio shorter than one block is measured
/// as a single block.
#[must_use]
pub fn integrated_loudness(buffer: &PcmBuffer) -> Option<f64> {
    if buffer.is_empty() {
        return None;
    }
    let rate = buffer.sample_rate();
    let shelf = Biquad::k_weighting_shelf(rate);
    let highpass = Biquad::k_weighting_highpass(rate);

    let weighted: Vec<Vec<f32>> = buffer
        .deinterleave()
        .into_iter()
        .map(|mut channel| {
            shelf.process(&mut channel);
            highpass.process(&mut channel);
            channel
        })
        .collect();

    let frames = buffer.frames();
    let block = ((BLOCK_SECONDS * f64::from(rate)).round() as usize).min(frames);
    let hop = ((HOP_SECONDS * f64::from(rate)).round() as usize).max(1);

    let mut blocks = Vec::new();
    let mut start = 0;
    while start + block <= frames {
        let power: f64 = weighted
            .iter()
            .map(|ch| {
                ch[start..start + block]
                    .iter()
                    .map(|&s| f64::from(s) * f64::from(s))
                    .sum::<f64>()
                    / block as f64
            })
            .sum();
        blocks.push(power);
        start += hop;
    }

    let above_absolute: Vec<f64> = blocks
        .into_iter()
        .filter(|&z| z > 0.0 && loudness_of(z) > ABSOLUTE_GATE_LUFS)
        .collect();
    if above_absolute.is_empty() {
        return None;
    }

    let mean = |zs: &[f64]| zs.iter().sum::<f64>() / zs.len() as f64;
    let relative_gate = loudness_of(mean(&above_absolute)) + RELATIVE_GATE_LU;
    let gated: Vec<f64> = above_absolute
        .iter()
        .copied()
        .filter(|&z| loudness_of(z) > relative_gate)
        .collect();
    if gated.is_empty() {
        return None;
    }
    Some(loudness_of(mean(&gated)))
}

/// Largest absolute sample value after 4x oversampling, per channel.
///
/// Falls back to the plain sample peak if oversampling fails.
#[must_use]
pub fn true_peak(buffer: &PcmBuffer) -> f32 {
    let sample_peak = buffer.sample_peak();
    let rate = buffer.sample_rate();
    match resample_channels(&buffer.deinterleave(), rate, rate * TRUE_PEAK_OVERSAMPLING) {
        Ok(channels) => channels
            .iter()
            .flatten()
            .fold(sample_peak, |m, s| m.max(s.abs())),
        Err(e) => {
            tracing::debug!(target: "narrate.audio", error = %e, "true-peak oversampling failed");
            sample_peak
        }
    }
}

/// True peak in dBTP, or `None` for digital silence.
#[must_use]
pub fn true_peak_dbtp(buffer: &PcmBuffer) -> Option<f64> {
    let peak = true_peak(buffer);
    (peak > 0.0).then(|| 20.0 * f64::from(peak).log10())
}

/// Normalise to `target_lufs`, then pull the gain down if the true peak
/// would exceed `ceiling_dbtp`.
///
/// Unmeasurable audio (silence) is returned unchanged.
#[must_use]
pub fn normalize(buffer: &PcmBuffer, target_lufs: f64, ceiling_dbtp: f64) -> PcmBuffer {
    let Some(measured) = integrated_loudness(buffer) else {
        return buffer.clone();
    };
    let mut out = buffer.clone();
    out.apply_gain_db(target_lufs - measured);

    if let Some(peak_db) = true_peak_dbtp(&out) {
        if peak_db > ceiling_dbtp {
            out.apply_gain_db(ceiling_dbtp - peak_db);
        }
    }
    out
}
