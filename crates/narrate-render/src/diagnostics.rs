//! Post-render analysis written to `diagnostics.json`.
//!
//! Everything here is informational. Nothing fails: unmeasurable values
//! are left as `None` or empty.

use std::time::Duration;

use narrate_audio::PcmBuffer;
use narrate_audio::dsp::{integrated_loudness, join_offsets_seconds, true_peak_dbtp};
use narrate_core::script::{break_durations, count_tags, count_words};
use narrate_core::{BreakHistogram, Diagnostics, JoinSpike, Manifest};

/// Short analysis window centred on a join.
const SPIKE_WINDOW: Duration = Duration::from_millis(20);
/// Surrounding context window centred on a join.
const CONTEXT_WINDOW: Duration = Duration::from_millis(200);
/// Short/context RMS ratio above which a join is reported.
const SPIKE_RATIO: f64 = 2.0;

/// Derives [`Diagnostics`] from a manifest and the final audio.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagnosticsCollector;

impl DiagnosticsCollector {
    /// Analyse a finished render.
    ///
    /// `chunk_frames` are chunk lengths at the sample rate of `audio` and
    /// `crossfade` is the overlap that was actually applied at each join.
    /// Without `audio`, duration falls back to the manifest estimate.
    pub fn collect(
        manifest: &Manifest,
        audio: Option<&PcmBuffer>,
        chunk_frames: &[usize],
        crossfade: Duration,
    ) -> Diagnostics {
        let mut word_count = 0usize;
        let mut tag_count = 0usize;
        let mut breaks = Vec::new();
        for chunk in &manifest.chunks {
            word_count += count_words(&chunk.text);
            tag_count += count_tags(&chunk.text);
            breaks.extend(break_durations(&chunk.text));
        }

        let duration_seconds = audio.map_or_else(
            || manifest.estimated_duration_seconds(),
            PcmBuffer::duration_seconds,
        );
        let words_per_minute = if duration_seconds > 0.0 {
            word_count as f64 / duration_seconds * 60.0
        } else {
            0.0
        };
        let tag_density = if word_count > 0 {
            tag_count as f64 / word_count as f64 * 10.0
        } else {
            0.0
        };

        Diagnostics {
            words_per_minute,
            tag_density,
            break_histogram: BreakHistogram::from_durations(&breaks),
            loudness_lufs: audio.and_then(integrated_loudness),
            true_peak_dbtp: audio.and_then(true_peak_dbtp),
            duration_seconds,
            word_count: word_count as u32,
            tag_count: tag_count as u32,
            chunk_count: manifest.chunks.len() as u32,
            join_spikes: audio
                .map(|a| join_spikes(a, chunk_frames, crossfade))
                .unwrap_or_default(),
        }
    }
}

/// Joins whose short-term energy stands out from their surroundings.
pub fn join_spikes(audio: &PcmBuffer, chunk_frames: &[usize], crossfade: Duration) -> Vec<JoinSpike> {
    let rate = audio.sample_rate();
    let crossfade_frames = (crossfade.as_secs_f64() * f64::from(rate)).round() as usize;

    join_offsets_seconds(chunk_frames, crossfade_frames, rate)
        .into_iter()
        .enumerate()
        .filter_map(|(k, at_seconds)| {
            let short = window_rms(audio, at_seconds, SPIKE_WINDOW)?;
            let context = window_rms(audio, at_seconds, CONTEXT_WINDOW)?;
            if context <= f64::EPSILON {
                return None;
            }
            let ratio = short / context;
            (ratio > SPIKE_RATIO).then_some(JoinSpike {
                index: k as u32 + 1,
                at_seconds,
                ratio,
            })
        })
        .collect()
}

/// RMS over all channels of a window centred at `center_seconds`.
fn window_rms(audio: &PcmBuffer, center_seconds: f64, width: Duration) -> Option<f64> {
    let rate = f64::from(audio.sample_rate());
    let channels = usize::from(audio.channels());
    let frames = audio.frames();
    if frames == 0 {
        return None;
    }

    let half = width.as_secs_f64() * rate / 2.0;
    let center = center_seconds * rate;
    let start = (center - half).max(0.0) as usize;
    let end = ((center + half).max(0.0) as usize).min(frames);
    if start >= end {
        return None;
    }

    let window = &audio.samples()[start * channels..end * channels];
    let sum: f64 = window.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    Some((sum / window.len() as f64).sqrt())
}
