//! Biquad coefficient designer
//!
//! Pure functions mapping (sample rate, frequency, Q, gain) to normalized
//! biquad taps, using the RBJ Audio EQ Cookbook bilinear-transform formulas.
//! Design runs in `f64` and is narrowed to `f32` taps. Frequency and Q are
//! clamped into a domain where every shape is stable, so no call produces
//! NaN or infinite taps.

use std::f64::consts::PI;

use crate::math::{clamp_frequency, clamp_q, MAX_FILTER_GAIN_DB};

/// Normalized biquad taps (`a0 == 1`)
///
/// `y = b0*x + b1*x[-1] + b2*x[-2] - a1*y[-1] - a2*y[-2]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterCoefficients {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl Default for FilterCoefficients {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl FilterCoefficients {
    /// Unity passthrough
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Normalize raw taps by `a0`
    fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        let inv = 1.0 / a0;
        Self {
            b0: (b0 * inv) as f32,
            b1: (b1 * inv) as f32,
            b2: (b2 * inv) as f32,
            a1: (a1 * inv) as f32,
            a2: (a2 * inv) as f32,
        }
    }

    /// True when both poles lie inside the unit circle (stability triangle)
    pub fn is_stable(&self) -> bool {
        self.a2.abs() < 1.0 && self.a1.abs() < 1.0 + self.a2
    }

    /// All taps finite
    pub fn is_finite(&self) -> bool {
        self.b0.is_finite()
            && self.b1.is_finite()
            && self.b2.is_finite()
            && self.a1.is_finite()
            && self.a2.is_finite()
    }

    /// Magnitude response at `freq` Hz (linear)
    pub fn magnitude_at(&self, freq: f32, sample_rate: f32) -> f32 {
        let w = 2.0 * PI * freq as f64 / sample_rate as f64;
        let (c1, s1) = (w.cos(), -w.sin());
        let (c2, s2) = ((2.0 * w).cos(), -(2.0 * w).sin());

        let num_re = self.b0 as f64 + self.b1 as f64 * c1 + self.b2 as f64 * c2;
        let num_im = self.b1 as f64 * s1 + self.b2 as f64 * s2;
        let den_re = 1.0 + self.a1 as f64 * c1 + self.a2 as f64 * c2;
        let den_im = self.a1 as f64 * s1 + self.a2 as f64 * s2;

        ((num_re * num_re + num_im * num_im) / (den_re * den_re + den_im * den_im)).sqrt() as f32
    }
}

/// Filter archetype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum FilterShape {
    #[default]
    LowPass,
    HighPass,
    /// Constant 0 dB peak gain
    BandPass,
    Notch,
    /// Peaking EQ bell
    Peak,
    LowShelf,
    HighShelf,
    AllPass,
    /// First-order low-pass (6 dB/oct)
    LowPass1,
    /// First-order high-pass (6 dB/oct)
    HighPass1,
    /// First-order all-pass
    AllPass1,
}

impl FilterShape {
    /// Whether the gain argument affects this shape
    pub fn uses_gain(self) -> bool {
        matches!(
            self,
            FilterShape::Peak | FilterShape::LowShelf | FilterShape::HighShelf
        )
    }

    /// Display name
    pub fn name(self) -> &'static str {
        match self {
            FilterShape::LowPass => "Low Pass",
            FilterShape::HighPass => "High Pass",
            FilterShape::BandPass => "Band Pass",
            FilterShape::Notch => "Notch",
            FilterShape::Peak => "Peak",
            FilterShape::LowShelf => "Low Shelf",
            FilterShape::HighShelf => "High Shelf",
            FilterShape::AllPass => "All Pass",
            FilterShape::LowPass1 => "Low Pass 6dB",
            FilterShape::HighPass1 => "High Pass 6dB",
            FilterShape::AllPass1 => "All Pass 1st",
        }
    }
}

/// Shared angular terms for the second-order designs
struct Prototype {
    cos_w: f64,
    alpha: f64,
}

impl Prototype {
    fn new(sample_rate: f32, freq: f32, q: f32) -> Self {
        let freq = clamp_frequency(freq, sample_rate) as f64;
        let q = clamp_q(q) as f64;
        let w0 = 2.0 * PI * freq / sample_rate as f64;
        Self {
            cos_w: w0.cos(),
            alpha: w0.sin() / (2.0 * q),
        }
    }
}

/// Bilinear prewarp term `tan(pi * f / fs)` for first-order sections
fn prewarp(sample_rate: f32, freq: f32) -> f64 {
    let freq = clamp_frequency(freq, sample_rate) as f64;
    (PI * freq / sample_rate as f64).tan()
}

/// Shelf/peak amplitude `A = 10^(dB/40)`
fn shelf_amplitude(gain_db: f32) -> f64 {
    let db = if gain_db.is_finite() {
        gain_db.clamp(-MAX_FILTER_GAIN_DB, MAX_FILTER_GAIN_DB)
    } else {
        0.0
    };
    10.0f64.powf(db as f64 / 40.0)
}

/// Design coefficients for any shape
///
/// `gain_db` is ignored by shapes that have no gain parameter.
pub fn design(
    shape: FilterShape,
    sample_rate: f32,
    freq: f32,
    q: f32,
    gain_db: f32,
) -> FilterCoefficients {
    match shape {
        FilterShape::LowPass => low_pass(sample_rate, freq, q),
        FilterShape::HighPass => high_pass(sample_rate, freq, q),
        FilterShape::BandPass => band_pass(sample_rate, freq, q),
        FilterShape::Notch => notch(sample_rate, freq, q),
        FilterShape::Peak => peak(sample_rate, freq, q, gain_db),
        FilterShape::LowShelf => low_shelf(sample_rate, freq, q, gain_db),
        FilterShape::HighShelf => high_shelf(sample_rate, freq, q, gain_db),
        FilterShape::AllPass => all_pass(sample_rate, freq, q),
        FilterShape::LowPass1 => low_pass_1(sample_rate, freq),
        FilterShape::HighPass1 => high_pass_1(sample_rate, freq),
        FilterShape::AllPass1 => all_pass_1(sample_rate, freq),
    }
}

pub fn low_pass(sample_rate: f32, freq: f32, q: f32) -> FilterCoefficients {
    let p = Prototype::new(sample_rate, freq, q);
    let b = (1.0 - p.cos_w) / 2.0;
    FilterCoefficients::normalized(
        b,
        1.0 - p.cos_w,
        b,
        1.0 + p.alpha,
        -2.0 * p.cos_w,
        1.0 - p.alpha,
    )
}

pub fn high_pass(sample_rate: f32, freq: f32, q: f32) -> FilterCoefficients {
    let p = Prototype::new(sample_rate, freq, q);
    let b = (1.0 + p.cos_w) / 2.0;
    FilterCoefficients::normalized(
        b,
        -(1.0 + p.cos_w),
        b,
        1.0 + p.alpha,
        -2.0 * p.cos_w,
        1.0 - p.alpha,
    )
}

pub fn band_pass(sample_rate: f32, freq: f32, q: f32) -> FilterCoefficients {
    let p = Prototype::new(sample_rate, freq, q);
    FilterCoefficients::normalized(
        p.alpha,
        0.0,
        -p.alpha,
        1.0 + p.alpha,
        -2.0 * p.cos_w,
        1.0 - p.alpha,
    )
}

pub fn notch(sample_rate: f32, freq: f32, q: f32) -> FilterCoefficients {
    let p = Prototype::new(sample_rate, freq, q);
    FilterCoefficients::normalized(
        1.0,
        -2.0 * p.cos_w,
        1.0,
        1.0 + p.alpha,
        -2.0 * p.cos_w,
        1.0 - p.alpha,
    )
}

pub fn all_pass(sample_rate: f32, freq: f32, q: f32) -> FilterCoefficients {
    let p = Prototype::new(sample_rate, freq, q);
    FilterCoefficients::normalized(
        1.0 - p.alpha,
        -2.0 * p.cos_w,
        1.0 + p.alpha,
        1.0 + p.alpha,
        -2.0 * p.cos_w,
        1.0 - p.alpha,
    )
}

pub fn peak(sample_rate: f32, freq: f32, q: f32, gain_db: f32) -> FilterCoefficients {
    let p = Prototype::new(sample_rate, freq, q);
    let a = shelf_amplitude(gain_db);
    FilterCoefficients::normalized(
        1.0 + p.alpha * a,
        -2.0 * p.cos_w,
        1.0 - p.alpha * a,
        1.0 + p.alpha / a,
        -2.0 * p.cos_w,
        1.0 - p.alpha / a,
    )
}

pub fn low_shelf(sample_rate: f32, freq: f32, q: f32, gain_db: f32) -> FilterCoefficients {
    let p = Prototype::new(sample_rate, freq, q);
    let a = shelf_amplitude(gain_db);
    let two_sqrt_a_alpha = 2.0 * a.sqrt() * p.alpha;
    let c = p.cos_w;

    FilterCoefficients::normalized(
        a * ((a + 1.0) - (a - 1.0) * c + two_sqrt_a_alpha),
        2.0 * a * ((a - 1.0) - (a + 1.0) * c),
        a * ((a + 1.0) - (a - 1.0) * c - two_sqrt_a_alpha),
        (a + 1.0) + (a - 1.0) * c + two_sqrt_a_alpha,
        -2.0 * ((a - 1.0) + (a + 1.0) * c),
        (a + 1.0) + (a - 1.0) * c - two_sqrt_a_alpha,
    )
}

pub fn high_shelf(sample_rate: f32, freq: f32, q: f32, gain_db: f32) -> FilterCoefficients {
    let p = Prototype::new(sample_rate, freq, q);
    let a = shelf_amplitude(gain_db);
    let two_sqrt_a_alpha = 2.0 * a.sqrt() * p.alpha;
    let c = p.cos_w;

    FilterCoefficients::normalized(
        a * ((a + 1.0) + (a - 1.0) * c + two_sqrt_a_alpha),
        -2.0 * a * ((a - 1.0) + (a + 1.0) * c),
        a * ((a + 1.0) + (a - 1.0) * c - two_sqrt_a_alpha),
        (a + 1.0) - (a - 1.0) * c + two_sqrt_a_alpha,
        2.0 * ((a - 1.0) - (a + 1.0) * c),
        (a + 1.0) - (a - 1.0) * c - two_sqrt_a_alpha,
    )
}

pub fn low_pass_1(sample_rate: f32, freq: f32) -> FilterCoefficients {
    let k = prewarp(sample_rate, freq);
    FilterCoefficients::normalized(k, k, 0.0, k + 1.0, k - 1.0, 0.0)
}

pub fn high_pass_1(sample_rate: f32, freq: f32) -> FilterCoefficients {
    let k = prewarp(sample_rate, freq);
    FilterCoefficients::normalized(1.0, -1.0, 0.0, k + 1.0, k - 1.0, 0.0)
}

pub fn all_pass_1(sample_rate: f32, freq: f32) -> FilterCoefficients {
    let k = prewarp(sample_rate, freq);
    FilterCoefficients::normalized(k - 1.0, k + 1.0, 0.0, k + 1.0, k - 1.0, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATES: [f32; 3] = [44100.0, 48000.0, 96000.0];

    const ALL_SHAPES: [FilterShape; 11] = [
        FilterShape::LowPass,
        FilterShape::HighPass,
        FilterShape::BandPass,
        FilterShape::Notch,
        FilterShape::Peak,
        FilterShape::LowShelf,
        FilterShape::HighShelf,
        FilterShape::AllPass,
        FilterShape::LowPass1,
        FilterShape::HighPass1,
        FilterShape::AllPass1,
    ];

    fn db(x: f32) -> f32 {
        20.0 * x.log10()
    }

    #[test]
    fn test_lowpass_response() {
        let c = low_pass(48000.0, 1000.0, std::f32::consts::FRAC_1_SQRT_2);
        assert!((c.magnitude_at(10.0, 48000.0) - 1.0).abs() < 1e-3);
        // Butterworth is -3 dB at cutoff
        assert!((db(c.magnitude_at(1000.0, 48000.0)) + 3.01).abs() < 0.05);
        assert!(c.magnitude_at(20000.0, 48000.0) < 0.01);
    }

    #[test]
    fn test_highpass_response() {
        let c = high_pass(48000.0, 1000.0, std::f32::consts::FRAC_1_SQRT_2);
        assert!(c.magnitude_at(10.0, 48000.0) < 1e-3);
        assert!((c.magnitude_at(15000.0, 48000.0) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_bandpass_unity_peak() {
        let c = band_pass(48000.0, 2000.0, 2.0);
        assert!((c.magnitude_at(2000.0, 48000.0) - 1.0).abs() < 1e-3);
        assert!(c.magnitude_at(200.0, 48000.0) < 0.1);
    }

    #[test]
    fn test_notch_rejects_center() {
        let c = notch(48000.0, 1000.0, 4.0);
        assert!(c.magnitude_at(1000.0, 48000.0) < 1e-3);
        assert!((c.magnitude_at(100.0, 48000.0) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_peak_gain_at_center() {
        let c = peak(48000.0, 3000.0, 1.0, 6.0);
        assert!((db(c.magnitude_at(3000.0, 48000.0)) - 6.0).abs() < 0.05);
        assert!(db(c.magnitude_at(20.0, 48000.0)).abs() < 0.1);
    }

    #[test]
    fn test_shelves() {
        let low = low_shelf(48000.0, 100.0, std::f32::consts::FRAC_1_SQRT_2, 6.0);
        assert!((db(low.magnitude_at(10.0, 48000.0)) - 6.0).abs() < 0.1);
        assert!(db(low.magnitude_at(10000.0, 48000.0)).abs() < 0.1);

        let high = high_shelf(48000.0, 8000.0, std::f32::consts::FRAC_1_SQRT_2, -6.0);
        assert!((db(high.magnitude_at(22000.0, 48000.0)) + 6.0).abs() < 0.2);
        assert!(db(high.magnitude_at(100.0, 48000.0)).abs() < 0.1);
    }

    #[test]
    fn test_allpass_flat_magnitude() {
        let second = all_pass(48000.0, 1000.0, 0.7);
        let first = all_pass_1(48000.0, 1000.0);
        for f in [50.0, 500.0, 1000.0, 5000.0, 20000.0] {
            assert!((second.magnitude_at(f, 48000.0) - 1.0).abs() < 1e-4);
            assert!((first.magnitude_at(f, 48000.0) - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_first_order_sections() {
        let lp = low_pass_1(48000.0, 1000.0);
        let hp = high_pass_1(48000.0, 1000.0);
        assert!((lp.magnitude_at(1.0, 48000.0) - 1.0).abs() < 1e-3);
        assert!(hp.magnitude_at(1.0, 48000.0) < 1e-2);
        assert!((db(lp.magnitude_at(1000.0, 48000.0)) + 3.01).abs() < 0.05);
        assert!((db(hp.magnitude_at(1000.0, 48000.0)) + 3.01).abs() < 0.05);
    }

    #[test]
    fn test_all_shapes_finite_and_stable_across_domain() {
        let freqs = [0.0, 1.0, 20.0, 440.0, 5000.0, 20000.0, 1.0e6, -5.0];
        let qs = [0.0, 0.05, 0.5, 0.707, 4.0, 40.0, 1000.0];
        let gains = [-48.0, -12.0, 0.0, 12.0, 48.0];

        for &sr in &SAMPLE_RATES {
            for &shape in &ALL_SHAPES {
                for &f in &freqs {
                    for &q in &qs {
                        for &g in &gains {
                            let c = design(shape, sr, f, q, g);
                            assert!(c.is_finite(), "{:?} sr={} f={} q={} g={}", shape, sr, f, q, g);
                            // Poles may sit on the circle only at the
                            // extreme low-frequency clamp where f32 rounding
                            // collapses cos(w) to 1.0
                            assert!(
                                c.a2.abs() <= 1.0 && c.a1.abs() <= 1.0 + c.a2 + 1e-6,
                                "{:?} unstable sr={} f={} q={} g={}: {:?}",
                                shape,
                                sr,
                                f,
                                q,
                                g,
                                c
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_gain_ignored_by_non_gain_shapes() {
        let a = design(FilterShape::LowPass, 48000.0, 1000.0, 0.7, 0.0);
        let b = design(FilterShape::LowPass, 48000.0, 1000.0, 0.7, 12.0);
        assert_eq!(a, b);
        assert!(!FilterShape::LowPass.uses_gain());
        assert!(FilterShape::Peak.uses_gain());
    }
}
