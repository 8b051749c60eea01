//! Crossfade stitching.
//!
//! Each join overlaps the tail of the running output with the head of the
//! next buffer. The overlap is clamped to the shorter of the two buffers on
//! either side of the join, so a very short chunk is never swallowed.

use std::f32::consts::FRAC_PI_2;
use std::time::Duration;

use narrate_core::FadeCurve;

use crate::error::AudioError;
use crate::pcm::PcmBuffer;

/// Fade-out and fade-in gains at position `t` in `[0, 1]`.
#[must_use]
pub fn fade_gains(curve: FadeCurve, t: f32) -> (f32, f32) {
    let t = t.clamp(0.0, 1.0);
    match curve {
        FadeCurve::EqualPower => ((t * FRAC_PI_2).cos(), (t * FRAC_PI_2).sin()),
        FadeCurve::Triangular => (1.0 - t, t),
    }
}

/// Overlap (in frames) used at every join, given each input's length.
#[must_use]
pub fn join_overlaps(frame_counts: &[usize], crossfade_frames: usize) -> Vec<usize> {
    frame_counts
        .windows(2)
        .map(|pair| crossfade_frames.min(pair[0]).min(pair[1]))
        .collect()
}

/// Output positions (in seconds) of the midpoint of every join.
///
/// With `n` inputs of durations `d_i` and crossfade `c`, the `k`-th join
/// sits at `sum(d_0..d_k) - k*c - c/2` when no clamping applies.
#[must_use]
pub fn join_offsets_seconds(frame_counts: &[usize], crossfade_frames: usize, sample_rate: u32) -> Vec<f64> {
    let overlaps = join_overlaps(frame_counts, crossfade_frames);
    let mut offsets = Vec::with_capacity(overlaps.len());
    let mut end = frame_counts.first().copied().unwrap_or(0) as f64;
    for (k, overlap) in overlaps.iter().enumerate() {
        let overlap = *overlap as f64;
        offsets.push((end - overlap / 2.0) / f64::from(sample_rate));
        end += frame_counts[k + 1] as f64 - overlap;
    }
    offsets
}

/// Stitch buffers with the same format into one.
///
/// Output length is `sum(frames) - sum(overlaps)`.
pub fn stitch(buffers: &[PcmBuffer], crossfade: Duration, curve: FadeCurve) -> Result<PcmBuffer, AudioError> {
    let Some(first) = buffers.first() else {
        return Err(AudioError::InvalidFormat("nothing to stitch".to_string()));
    };
    let rate = first.sample_rate();
    let channels = usize::from(first.channels());
    for b in buffers {
        if b.sample_rate() != rate || usize::from(b.channels()) != channels {
            return Err(AudioError::FormatMismatch(format!(
                "{} Hz/{} ch in a {rate} Hz/{channels} ch stitch",
                b.sample_rate(),
                b.channels()
            )));
        }
    }

    let crossfade_frames = (crossfade.as_secs_f64() * f64::from(rate)).round() as usize;
    let frame_counts: Vec<usize> = buffers.iter().map(PcmBuffer::frames).collect();
    let overlaps = join_overlaps(&frame_counts, crossfade_frames);

    let total: usize = frame_counts.iter().sum::<usize>() - overlaps.iter().sum::<usize>();
    let mut out: Vec<f32> = Vec::with_capacity(total * channels);
    out.extend_from_slice(first.samples());

    for (next, overlap) in buffers[1..].iter().zip(overlaps) {
        let start = out.len() - overlap * channels;
        let head = &next.samples()[..overlap * channels];
        for frame in 0..overlap {
            let t = (frame as f32 + 0.5) / overlap as f32;
            let (g_out, g_in) = fade_gains(curve, t);
            for c in 0..channels {
                let i = frame * channels + c;
                out[start + i] = out[start + i] * g_out + head[i] * g_in;
            }
        }
        out.extend_from_slice(&next.samples()[overlap * channels..]);
    }

    PcmBuffer::new(out, rate, first.channels())
}
