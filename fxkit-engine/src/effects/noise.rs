//! Noise generator

use fxkit_dsp::math::{db_to_gain, DEFAULT_SAMPLE_RATE};
use fxkit_dsp::{BurstEnvelope, NoiseColor, NoiseSource};

use crate::config::ProcessSpec;
use crate::params::{ParamSpec, ParamValues};
use crate::processor::{AudioBlock, Processor};
use crate::transport::TransportInfo;

/// Base seed; channel `c` uses `SEED + c`
const SEED: u64 = 0x00F0_15E5;

/// Colored noise added to the input, optionally gated by random bursts
///
/// Each channel owns its own generator so stereo noise is decorrelated.
/// The burst envelope is shared; its variance decides how far the channels'
/// burst patterns drift apart.
#[derive(Debug, Clone)]
pub struct NoiseGenerator {
    sources: Vec<NoiseSource>,
    bursts: BurstEnvelope,
}

impl Default for NoiseGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl NoiseGenerator {
    pub const COLOR: usize = 0;
    pub const LEVEL_DB: usize = 1;
    pub const BURST: usize = 2;
    pub const DENSITY: usize = 3;
    pub const HOLD_MS: usize = 4;
    pub const VARIANCE: usize = 5;

    pub const PARAMS: &'static [ParamSpec] = &[
        ParamSpec::choice("color", "Color", NoiseColor::NAMES, 0),
        ParamSpec::float("level_db", "Level", -80.0, 0.0, -24.0),
        ParamSpec::toggle("burst", "Burst", false),
        ParamSpec::float("density", "Density", 0.0, 1.0, 0.5),
        ParamSpec::float("hold_ms", "Hold", 10.0, 2000.0, BurstEnvelope::DEFAULT_HOLD_MS),
        ParamSpec::float("variance", "Variance", 0.0, 1.0, 0.0),
    ];

    /// Pink output is far quieter than white at the same setting
    const PINK_MAKEUP: f32 = 8.0;

    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            bursts: BurstEnvelope::new(DEFAULT_SAMPLE_RATE, 0, SEED),
        }
    }
}

impl Processor for NoiseGenerator {
    fn name(&self) -> &'static str {
        "Noise Generator"
    }

    fn params(&self) -> &'static [ParamSpec] {
        Self::PARAMS
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.sources = (0..spec.channels)
            .map(|c| NoiseSource::new(SEED + c as u64, NoiseColor::White))
            .collect();
        self.bursts.prepare(spec.sample_rate, spec.channels);
    }

    fn reset(&mut self) {
        self.sources.iter_mut().for_each(NoiseSource::reset);
        self.bursts.reset();
    }

    fn process(&mut self, block: &mut AudioBlock<'_>, params: &ParamValues<'_>, _: &TransportInfo) {
        let color = NoiseColor::from_index(params.choice(Self::COLOR));
        let makeup = if color == NoiseColor::Pink {
            Self::PINK_MAKEUP
        } else {
            1.0
        };
        let level = db_to_gain(params.get(Self::LEVEL_DB));
        let burst = params.flag(Self::BURST);

        self.bursts.set_density(params.get(Self::DENSITY));
        self.bursts.set_hold_ms(params.get(Self::HOLD_MS));
        self.bursts.set_variance(params.get(Self::VARIANCE));

        let channels = block.channels().min(self.sources.len());
        for c in 0..channels {
            let source = &mut self.sources[c];
            source.set_color(color);
            for x in block.channel_mut(c).iter_mut() {
                let envelope = if burst { self.bursts.next(c) } else { 1.0 };
                let noise = (source.next() * makeup).clamp(-1.0, 1.0);
                *x += level * envelope * noise;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::test_util::{prepared, rms, run, set};
    use crate::effects::EffectKind;

    fn render(values: &[(&str, f32)], channels: usize, frames: usize) -> Vec<f32> {
        let (mut fx, mut defaults) = prepared(EffectKind::NoiseGenerator, 48000.0, channels);
        for &(id, value) in values {
            set(&mut defaults, &fx, id, value);
        }
        let mut data = vec![0.0f32; channels * frames];
        run(&mut fx, &defaults, &mut data, channels, &TransportInfo::default());
        data
    }

    #[test]
    fn test_noise_respects_level() {
        let data = render(&[("level_db", -12.0)], 1, 48000);
        let ceiling = db_to_gain(-12.0) + 1e-6;
        assert!(data.iter().all(|s| s.abs() <= ceiling));
        // Uniform white noise has RMS 1/sqrt(3)
        let expected = db_to_gain(-12.0) / 3f32.sqrt();
        let measured = rms(&data);
        assert!((measured - expected).abs() < expected * 0.05, "rms {} vs {}", measured, expected);
    }

    #[test]
    fn test_noise_channels_decorrelated() {
        let data = render(&[], 2, 4096);
        let (left, right) = data.split_at(4096);
        assert!(left != right, "channels should use distinct seeds");
    }

    #[test]
    fn test_noise_added_to_input() {
        let (mut fx, mut values) = prepared(EffectKind::NoiseGenerator, 48000.0, 1);
        set(&mut values, &fx, "level_db", -80.0);
        let mut data = vec![0.5f32; 2048];
        run(&mut fx, &values, &mut data, 1, &TransportInfo::default());
        assert!(data.iter().all(|s| (s - 0.5).abs() <= 2e-4));
    }

    #[test]
    fn test_colors_stay_bounded() {
        for color in 0..NoiseColor::NAMES.len() {
            let data = render(&[("color", color as f32), ("level_db", 0.0)], 1, 96000);
            assert!(
                data.iter().all(|s| s.is_finite() && s.abs() <= 1.0),
                "{} out of range",
                NoiseColor::NAMES[color]
            );
        }
    }

    #[test]
    fn test_sparse_bursts_are_quieter() {
        let steady = rms(&render(&[], 1, 96000));
        let sparse = rms(&render(&[("burst", 1.0), ("density", 0.0)], 1, 96000));
        assert!(sparse < steady * 0.7, "bursts {} vs steady {}", sparse, steady);
    }
}
