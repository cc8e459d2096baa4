//! Shared math helpers: dB conversion, denormal flushing, parameter domains

/// Sample rate substituted for invalid (zero, negative, non-finite) rates
pub const DEFAULT_SAMPLE_RATE: f32 = 44100.0;

/// Lowest frequency accepted by the coefficient designer (Hz)
pub const MIN_FREQUENCY_HZ: f32 = 1.0;

/// Fraction of the sample rate the designer never exceeds (just below Nyquist)
pub const NYQUIST_GUARD: f32 = 0.49;

/// Q domain accepted by the coefficient designer
pub const MIN_Q: f32 = 0.05;
pub const MAX_Q: f32 = 40.0;

/// Shelf/peak gain domain (dB)
pub const MAX_FILTER_GAIN_DB: f32 = 36.0;

/// Floor used when converting silence to dB
pub const SILENCE_DB: f32 = -200.0;

/// Magnitude below which a value is treated as denormal and flushed
const DENORMAL_THRESHOLD: f32 = 1.0e-15;

/// Convert dB to linear gain
#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

/// Convert linear gain to dB
#[inline]
pub fn gain_to_db(gain: f32) -> f32 {
    if gain > 1e-10 {
        20.0 * gain.log10()
    } else {
        SILENCE_DB
    }
}

/// Convert a mean-square (power) value to dB
#[inline]
pub fn power_to_db(power: f32) -> f32 {
    if power > 1e-20 {
        10.0 * power.log10()
    } else {
        SILENCE_DB
    }
}

/// Flush a near-zero value to exactly zero
#[inline(always)]
pub fn flush_denormal(x: f32) -> f32 {
    if x.abs() < DENORMAL_THRESHOLD {
        0.0
    } else {
        x
    }
}

/// Flush every near-zero value in a buffer to exactly zero
pub fn flush_denormals(buffer: &mut [f32]) {
    for s in buffer.iter_mut() {
        *s = flush_denormal(*s);
    }
}

/// Replace an invalid sample rate with [`DEFAULT_SAMPLE_RATE`]
pub fn sanitize_sample_rate(sample_rate: f32) -> f32 {
    if sample_rate.is_finite() && sample_rate > 0.0 {
        sample_rate
    } else {
        tracing::warn!(
            sample_rate,
            fallback = DEFAULT_SAMPLE_RATE,
            "invalid sample rate, using default"
        );
        DEFAULT_SAMPLE_RATE
    }
}

/// Clamp a frequency into the designer's domain for a given sample rate
#[inline]
pub fn clamp_frequency(freq: f32, sample_rate: f32) -> f32 {
    let max = sample_rate * NYQUIST_GUARD;
    if freq.is_nan() {
        return MIN_FREQUENCY_HZ.min(max);
    }
    freq.clamp(MIN_FREQUENCY_HZ.min(max), max)
}

/// Clamp a Q value into the designer's domain
#[inline]
pub fn clamp_q(q: f32) -> f32 {
    if q.is_nan() {
        return std::f32::consts::FRAC_1_SQRT_2;
    }
    q.clamp(MIN_Q, MAX_Q)
}

/// Milliseconds to samples
#[inline]
pub fn ms_to_samples(ms: f32, sample_rate: f32) -> f32 {
    ms * 0.001 * sample_rate
}

/// Linear interpolation
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
