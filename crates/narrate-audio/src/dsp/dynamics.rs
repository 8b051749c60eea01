//! Feed-forward downward compressor with linked channels.

use crate::pcm::PcmBuffer;

/// Compressor parameters in engine-neutral units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Compressor {
    pub threshold_db: f32,
    pub ratio: f32,
    pub attack_ms: f32,
    pub release_ms: f32,
    pub makeup_db: f32,
}

impl Compressor {
    /// Static gain reduction (dB, <= 0) for an input level.
    #[must_use]
    pub fn gain_reduction_db(&self, level_db: f32) -> f32 {
        let over = level_db - self.threshold_db;
        if over <= 0.0 || self.ratio <= 1.0 {
            0.0
        } else {
            -over * (1.0 - 1.0 / self.ratio)
        }
    }

    /// Compress an interleaved buffer in place.
    ///
    /// The detector follows the per-frame peak across channels so stereo
    /// images do not shift.
    pub fn process(&self, buffer: &mut PcmBuffer) {
        let rate = buffer.sample_rate() as f32;
        let channels = usize::from(buffer.channels());
        let attack = smoothing_coefficient(self.attack_ms, rate);
        let release = smoothing_coefficient(self.release_ms, rate);
        let makeup = 10f32.powf(self.makeup_db / 20.0);

        let mut envelope_db = -120.0f32;
        for frame in buffer.samples_mut().chunks_exact_mut(channels) {
            let peak = frame.iter().fold(0.0f32, |m, s| m.max(s.abs()));
            let level_db = 20.0 * peak.max(1e-6).log10();
            let coeff = if level_db > envelope_db { attack } else { release };
            envelope_db = coeff.mul_add(envelope_db - level_db, level_db);

            let gain = 10f32.powf(self.gain_reduction_db(envelope_db) / 20.0) * makeup;
            for s in frame {
                *s *= gain;
            }
        }
    }
}

/// One-pole smoothing coefficient for a time constant in milliseconds.
fn smoothing_coefficient(time_ms: f32, sample_rate: f32) -> f32 {
    if time_ms <= 0.0 {
        0.0
    } else {
        (-1.0 / (time_ms / 1000.0 * sample_rate)).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comp(makeup_db: f32) -> Compressor {
        Compressor {
            threshold_db: -18.0,
            ratio: 3.0,
            attack_ms: 1.0,
            release_ms: 50.0,
            makeup_db,
        }
    }

    #[test]
    fn test_static_curve() {
        let c = comp(0.0);
        assert_eq!(c.gain_reduction_db(-30.0), 0.0);
        // 12 dB over at 3:1 leaves 4 dB over: 8 dB of reduction.
        assert!((c.gain_reduction_db(-6.0) + 8.0).abs() < 1e-5);
    }

    #[test]
    fn test_loud_signal_is_reduced() {
        let mut buf = PcmBuffer::new(vec![0.5; 8_000], 8_000, 1).unwrap();
        comp(0.0).process(&mut buf);
        let tail = buf.samples()[7_999];
        // -6 dBFS is 12 dB over; 8 dB of reduction leaves about 0.2.
        assert!((tail - 0.199).abs() < 0.01, "tail {tail}");
    }

    #[test]
    fn test_quiet_signal_gets_only_makeup() {
        let mut buf = PcmBuffer::new(vec![0.01; 1_000], 8_000, 1).unwrap();
        comp(6.0).process(&mut buf);
        let expected = 0.01 * 10f32.powf(6.0 / 20.0);
        assert!((buf.samples()[999] - expected).abs() < 1e-4);
    }
}
