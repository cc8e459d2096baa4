//! Noise synthesis
//!
//! - White: uniform in `[-1, 1]`
//! - Pink: one-pole leaky integration `pink' = 0.997·pink + 0.003·white`.
//!   A cheap approximation, not a true -3 dB/oct slope.
//! - Brown: bounded random walk `brown' = clamp(brown + 0.02·white, -1, 1)`
//!
//! `BurstEnvelope` is a per-channel target-and-hold amplitude generator
//! used to gate noise into randomized bursts.

use crate::envelope::time_constant;
use crate::math::lerp;

const DEFAULT_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

/// Pink integrator pole
pub const PINK_POLE: f32 = 0.997;

/// Brown walk step
pub const BROWN_STEP: f32 = 0.02;

/// xorshift64 PRNG (no allocation, deterministic)
#[derive(Debug, Clone, Copy)]
pub struct Xorshift {
    state: u64,
}

impl Default for Xorshift {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl Xorshift {
    /// Zero seeds are replaced (xorshift would stay at zero forever)
    pub fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { DEFAULT_SEED } else { seed },
        }
    }

    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    /// Uniform in `[0, 1)`
    #[inline]
    pub fn next_f32(&mut self) -> f32 {
        // Top 24 bits fit the f32 mantissa exactly
        (self.next_u64() >> 40) as f32 * (1.0 / 16_777_216.0)
    }

    /// Uniform in `[-1, 1)`
    #[inline]
    pub fn next_bipolar(&mut self) -> f32 {
        self.next_f32() * 2.0 - 1.0
    }
}

/// Noise spectrum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum NoiseColor {
    #[default]
    White,
    Pink,
    Brown,
}

impl NoiseColor {
    pub const NAMES: &'static [&'static str] = &["White", "Pink", "Brown"];

    pub fn from_index(index: usize) -> Self {
        match index {
            0 => Self::White,
            1 => Self::Pink,
            _ => Self::Brown,
        }
    }
}

/// Single-channel noise generator
#[derive(Debug, Clone)]
pub struct NoiseSource {
    rng: Xorshift,
    color: NoiseColor,
    pink: f32,
    brown: f32,
}

impl NoiseSource {
    pub fn new(seed: u64, color: NoiseColor) -> Self {
        Self {
            rng: Xorshift::new(seed),
            color,
            pink: 0.0,
            brown: 0.0,
        }
    }

    pub fn set_color(&mut self, color: NoiseColor) {
        self.color = color;
    }

    pub fn color(&self) -> NoiseColor {
        self.color
    }

    /// Next sample in `[-1, 1]`
    #[inline]
    pub fn next(&mut self) -> f32 {
        let white = self.rng.next_bipolar();
        match self.color {
            NoiseColor::White => white,
            NoiseColor::Pink => {
                self.pink = PINK_POLE * self.pink + (1.0 - PINK_POLE) * white;
                self.pink
            }
            NoiseColor::Brown => {
                self.brown = (self.brown + BROWN_STEP * white).clamp(-1.0, 1.0);
                self.brown
            }
        }
    }

    pub fn fill(&mut self, out: &mut [f32]) {
        for s in out.iter_mut() {
            *s = self.next();
        }
    }

    pub fn reset(&mut self) {
        self.pink = 0.0;
        self.brown = 0.0;
    }
}

#[derive(Debug, Clone, Copy)]
struct BurstChannel {
    /// Identical seed on every channel
    rng: Xorshift,
    /// Per-channel seed, scaled by variance
    jitter: Xorshift,
    countdown: u32,
    target: f32,
    level: f32,
}

impl BurstChannel {
    fn new(seed: u64, channel: usize) -> Self {
        Self {
            rng: Xorshift::new(seed),
            jitter: Xorshift::new(seed ^ (0xA5A5_5A5A_0000_0001u64.wrapping_mul(channel as u64 + 1))),
            countdown: 0,
            target: 0.0,
            level: 0.0,
        }
    }
}

/// Randomized target-and-hold envelope, one state per channel
///
/// On countdown expiry a channel draws a new hold length (`base·(0.5 + u)`)
/// and target level (`u^lerp(4, 0.25, density)`), then glides toward the
/// target with a short time constant. Variance jitters both draws per
/// channel; at zero variance every channel is identical.
#[derive(Debug, Clone)]
pub struct BurstEnvelope {
    seed: u64,
    sample_rate: f32,
    hold_ms: f32,
    hold_samples: f32,
    density: f32,
    variance: f32,
    smoothing_ms: f32,
    glide: f32,
    channels: Vec<BurstChannel>,
}

impl BurstEnvelope {
    pub const DEFAULT_HOLD_MS: f32 = 120.0;
    pub const DEFAULT_SMOOTHING_MS: f32 = 5.0;

    pub fn new(sample_rate: f32, channels: usize, seed: u64) -> Self {
        let mut env = Self {
            seed,
            sample_rate,
            hold_ms: Self::DEFAULT_HOLD_MS,
            hold_samples: 0.0,
            density: 0.5,
            variance: 0.0,
            smoothing_ms: Self::DEFAULT_SMOOTHING_MS,
            glide: 0.0,
            channels: Vec::new(),
        };
        env.prepare(sample_rate, channels);
        env
    }

    /// Reallocate per-channel state and restart every channel from its seed
    pub fn prepare(&mut self, sample_rate: f32, channels: usize) {
        self.sample_rate = sample_rate;
        self.channels.clear();
        self.channels
            .extend((0..channels).map(|c| BurstChannel::new(self.seed, c)));
        self.update_times();
    }

    fn update_times(&mut self) {
        self.hold_samples = crate::math::ms_to_samples(self.hold_ms, self.sample_rate).max(1.0);
        self.glide = time_constant(self.smoothing_ms, self.sample_rate);
    }

    pub fn channels(&self) -> usize {
        self.channels.len()
    }

    /// 0 = sparse, quiet bursts; 1 = dense, loud bursts
    pub fn set_density(&mut self, density: f32) {
        self.density = density.clamp(0.0, 1.0);
    }

    /// Mean hold duration
    pub fn set_hold_ms(&mut self, ms: f32) {
        self.hold_ms = ms.clamp(1.0, 10_000.0);
        self.update_times();
    }

    /// Per-channel decorrelation, 0..1
    pub fn set_variance(&mut self, variance: f32) {
        self.variance = variance.clamp(0.0, 1.0);
    }

    pub fn set_smoothing_ms(&mut self, ms: f32) {
        self.smoothing_ms = ms.max(0.0);
        self.update_times();
    }

    /// Envelope value in `[0, 1]` for one channel, then advance
    #[inline]
    pub fn next(&mut self, channel: usize) -> f32 {
        let (hold_samples, density, variance, glide) =
            (self.hold_samples, self.density, self.variance, self.glide);
        let Some(ch) = self.channels.get_mut(channel) else {
            return 0.0;
        };

        if ch.countdown == 0 {
            let hold_jitter = 1.0 + 0.5 * variance * ch.jitter.next_bipolar();
            let target_jitter = 1.0 + 0.5 * variance * ch.jitter.next_bipolar();

            let hold = hold_samples * (0.5 + ch.rng.next_f32()) * hold_jitter;
            ch.countdown = hold.max(1.0) as u32;

            let curve = lerp(4.0, 0.25, density);
            ch.target = (ch.rng.next_f32().powf(curve) * target_jitter).clamp(0.0, 1.0);
        }
        ch.countdown -= 1;

        ch.level = glide * ch.level + (1.0 - glide) * ch.target;
        ch.level
    }

    pub fn reset(&mut self) {
        let seed = self.seed;
        for (c, ch) in self.channels.iter_mut().enumerate() {
            *ch = BurstChannel::new(seed, c);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xorshift_range_and_determinism() {
        let mut a = Xorshift::new(7);
        let mut b = Xorshift::new(7);
        for _ in 0..10_000 {
            let x = a.next_f32();
            assert!((0.0..1.0).contains(&x));
            assert_eq!(x, b.next_f32());
        }
        // Zero seed still produces output
        let mut z = Xorshift::new(0);
        assert_ne!(z.next_u64(), 0);
    }

    #[test]
    fn test_noise_bounds_every_color() {
        for color in [NoiseColor::White, NoiseColor::Pink, NoiseColor::Brown] {
            let mut source = NoiseSource::new(1234, color);
            for _ in 0..1_000_000 {
                let x = source.next();
                assert!((-1.0..=1.0).contains(&x), "{:?} out of range: {}", color, x);
            }
        }
    }

    #[test]
    fn test_pink_is_quieter_than_white() {
        let mut white = NoiseSource::new(99, NoiseColor::White);
        let mut pink = NoiseSource::new(99, NoiseColor::Pink);
        let energy = |s: &mut NoiseSource| (0..48000).map(|_| s.next().powi(2)).sum::<f32>();
        let (w, p) = (energy(&mut white), energy(&mut pink));
        assert!(p < w * 0.1, "white={} pink={}", w, p);
    }

    #[test]
    fn test_brown_walk_step() {
        let mut brown = NoiseSource::new(5, NoiseColor::Brown);
        let mut prev = 0.0f32;
        for _ in 0..10_000 {
            let x = brown.next();
            assert!((x - prev).abs() <= BROWN_STEP + 1e-6);
            prev = x;
        }
    }

    #[test]
    fn test_burst_envelope_bounded() {
        let mut env = BurstEnvelope::new(48000.0, 2, 11);
        env.set_density(0.8);
        env.set_variance(1.0);
        env.set_hold_ms(10.0);
        for _ in 0..96000 {
            for ch in 0..2 {
                let v = env.next(ch);
                assert!((0.0..=1.0).contains(&v), "envelope {}", v);
            }
        }
    }

    #[test]
    fn test_zero_variance_channels_identical() {
        let mut env = BurstEnvelope::new(48000.0, 2, 3);
        env.set_hold_ms(5.0);
        env.set_variance(0.0);
        for _ in 0..48000 {
            assert_eq!(env.next(0), env.next(1));
        }
    }

    #[test]
    fn test_variance_decorrelates_channels() {
        let mut env = BurstEnvelope::new(48000.0, 2, 3);
        env.set_hold_ms(5.0);
        env.set_variance(1.0);
        let differs = (0..48000).any(|_| env.next(0) != env.next(1));
        assert!(differs);
    }

    #[test]
    fn test_density_raises_level() {
        let mean = |density: f32| {
            let mut env = BurstEnvelope::new(48000.0, 1, 17);
            env.set_hold_ms(2.0);
            env.set_density(density);
            (0..96000).map(|_| env.next(0)).sum::<f32>() / 96000.0
        };
        let (sparse, dense) = (mean(0.0), mean(1.0));
        assert!(dense > sparse * 2.0, "sparse={} dense={}", sparse, dense);
    }

    #[test]
    fn test_out_of_range_channel_is_silent() {
        let mut env = BurstEnvelope::new(48000.0, 1, 1);
        assert_eq!(env.next(5), 0.0);
    }
}
