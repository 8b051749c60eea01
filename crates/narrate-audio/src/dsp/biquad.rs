//! Second-order IIR sections (RBJ audio-EQ cookbook forms).

use std::f64::consts::PI;

use crate::pcm::PcmBuffer;

/// Normalised biquad coefficients (`a0 == 1`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Biquad {
    fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Butterworth-style high-pass at `cutoff_hz`.
    #[must_use]
    pub fn high_pass(sample_rate: u32, cutoff_hz: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * cutoff_hz / f64::from(sample_rate);
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * q);
        Self::normalized(
            (1.0 + cos) / 2.0,
            -(1.0 + cos),
            (1.0 + cos) / 2.0,
            1.0 + alpha,
            -2.0 * cos,
            1.0 - alpha,
        )
    }

    /// Peaking EQ; negative `gain_db` cuts.
    #[must_use]
    pub fn peaking(sample_rate: u32, center_hz: f64, q: f64, gain_db: f64) -> Self {
        let a = 10f64.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * center_hz / f64::from(sample_rate);
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * q);
        Self::normalized(
            1.0 + alpha * a,
            -2.0 * cos,
            1.0 - alpha * a,
            1.0 + alpha / a,
            -2.0 * cos,
            1.0 - alpha / a,
        )
    }

    /// First stage of the BS.1770 K-weighting: a high shelf modelling the
    /// acoustic effect of the head.
    #[must_use]
    pub fn k_weighting_shelf(sample_rate: u32) -> Self {
        const GAIN_DB: f64 = 3.999_843_853_973_347;
        const CENTER_HZ: f64 = 1_681.974_450_955_533;
        const Q: f64 = 0.707_175_236_955_419_6;

        let k = (PI * CENTER_HZ / f64::from(sample_rate)).tan();
        let vh = 10f64.powf(GAIN_DB / 20.0);
        let vb = vh.powf(0.499_666_774_154_541_6);
        Self::normalized(
            vh + vb * k / Q + k * k,
            2.0 * (k * k - vh),
            vh - vb * k / Q + k * k,
            1.0 + k / Q + k * k,
            2.0 * (k * k - 1.0),
            1.0 - k / Q + k * k,
        )
    }

    /// Second stage of the BS.1770 K-weighting: the RLB high-pass.
    #[must_use]
    pub fn k_weighting_highpass(sample_rate: u32) -> Self {
        const CENTER_HZ: f64 = 38.135_470_876_139_82;
        const Q: f64 = 0.500_327_037_325_395_3;

        let k = (PI * CENTER_HZ / f64::from(sample_rate)).tan();
        let a0 = 1.0 + k / Q + k * k;
        Self {
            b0: 1.0,
            b1: -2.0,
            b2: 1.0,
            a1: 2.0 * (k * k - 1.0) / a0,
            a2: (1.0 - k / Q + k * k) / a0,
        }
    }

    /// Filter one channel in place.
    pub fn process(&self, samples: &mut [f32]) {
        let (mut x1, mut x2, mut y1, mut y2) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
        for s in samples {
            let x0 = f64::from(*s);
            let y0 = self.b0 * x0 + self.b1 * x1 + self.b2 * x2 - self.a1 * y1 - self.a2 * y2;
            x2 = x1;
            x1 = x0;
            y2 = y1;
            y1 = y0;
            *s = y0 as f32;
        }
    }

    /// Filter every channel of an interleaved buffer independently.
    pub fn apply(&self, buffer: &PcmBuffer) -> PcmBuffer {
        let mut channels = buffer.deinterleave();
        for channel in &mut channels {
            self.process(channel);
        }
        // Shape is unchanged, so rebuilding cannot fail.
        PcmBuffer::from_channels(channels, buffer.sample_rate()).unwrap_or_else(|_| buffer.clone())
    }

    /// Magnitude response in dB at `freq_hz`.
    #[must_use]
    pub fn gain_db_at(&self, sample_rate: u32, freq_hz: f64) -> f64 {
        let w = 2.0 * PI * freq_hz / f64::from(sample_rate);
        let (re_z1, im_z1) = (w.cos(), -w.sin());
        let (re_z2, im_z2) = ((2.0 * w).cos(), -(2.0 * w).sin());
        let num_re = self.b0 + self.b1 * re_z1 + self.b2 * re_z2;
        let num_im = self.b1 * im_z1 + self.b2 * im_z2;
        let den_re = 1.0 + self.a1 * re_z1 + self.a2 * re_z2;
        let den_im = self.a1 * im_z1 + self.a2 * im_z2;
        let num = num_re.hypot(num_im);
        let den = den_re.hypot(den_im);
        20.0 * (num / den).log10()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_high_pass_response() {
        let hp = Biquad::high_pass(48_000, 80.0, std::f64::consts::FRAC_1_SQRT_2);
        assert!(hp.gain_db_at(48_000, 20.0) < -20.0);
        assert!((hp.gain_db_at(48_000, 80.0) + 3.0).abs() < 0.2);
        assert!(hp.gain_db_at(48_000, 1_000.0).abs() < 0.1);
    }

    #[test]
    fn test_peaking_cut() {
        let eq = Biquad::peaking(48_000, 6_500.0, 2.0, -3.0);
        assert!((eq.gain_db_at(48_000, 6_500.0) + 3.0).abs() < 0.05);
        assert!(eq.gain_db_at(48_000, 500.0).abs() < 0.1);
    }

    #[test]
    fn test_k_weighting_reference_coefficients() {
        // Published 48 kHz coefficients from ITU-R BS.1770.
        let shelf = Biquad::k_weighting_shelf(48_000);
        assert!((shelf.b0 - 1.535_124_859_586_97).abs() < 1e-5);
        assert!((shelf.a1 + 1.690_659_293_182_41).abs() < 1e-5);
        assert!((shelf.a2 - 0.732_480_774_215_85).abs() < 1e-5);

        let hp = Biquad::k_weighting_highpass(48_000);
        assert!((hp.a1 + 1.990_047_454_833_98).abs() < 1e-5);
        assert!((hp.a2 - 0.990_072_250_366_21).abs() < 1e-5);
    }

    #[test]
    fn test_process_removes_dc() {
        let hp = Biquad::high_pass(16_000, 100.0, std::f64::consts::FRAC_1_SQRT_2);
        let mut dc = vec![0.5f32; 16_000];
        hp.process(&mut dc);
        assert!(dc[15_999].abs() < 1e-3);
    }
}
