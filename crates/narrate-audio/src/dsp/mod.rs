//! Pure-Rust signal processing used by the native media engine and by
//! diagnostics.

pub mod biquad;
pub mod crossfade;
pub mod dynamics;
pub mod loudness;

pub use biquad::Biquad;
pub use crossfade::{fade_gains, join_offsets_seconds, join_overlaps, stitch};
pub use dynamics::Compressor;
pub use loudness::{integrated_loudness, normalize, true_peak, true_peak_dbtp};

use std::f64::consts::FRAC_1_SQRT_2;

use narrate_core::Filter;

use crate::pcm::PcmBuffer;

/// Run one engine-neutral filter over a buffer.
#[must_use]
pub fn apply_filter(buffer: &PcmBuffer, filter: &Filter) -> PcmBuffer {
    let rate = buffer.sample_rate();
    match *filter {
        Filter::HighPass { cutoff_hz } => {
            // At or above Nyquist the high-pass coefficients go unstable.
            let nyquist = f64::from(rate) / 2.0;
            let cutoff = f64::from(cutoff_hz).min(nyquist * 0.9);
            Biquad::high_pass(rate, cutoff, FRAC_1_SQRT_2).apply(buffer)
        }
        Filter::DeEss {
            frequency_hz,
            cut_db,
            q,
        } => {
            // Keep the band centre below Nyquist for low sample rates.
            let nyquist = f64::from(rate) / 2.0;
            let center = f64::from(frequency_hz).min(nyquist * 0.9);
            Biquad::peaking(rate, center, f64::from(q), -f64::from(cut_db.abs())).apply(buffer)
        }
        Filter::Compressor {
            threshold_db,
            ratio,
            attack_ms,
            release_ms,
            makeup_db,
        } => {
            let mut out = buffer.clone();
            Compressor {
                threshold_db,
                ratio,
                attack_ms,
                release_ms,
                makeup_db,
            }
            .process(&mut out);
            out
        }
        Filter::LoudNorm {
            target_lufs,
            true_peak_db,
        } => normalize(buffer, f64::from(target_lufs), f64::from(true_peak_db)),
    }
}
