//! Filter and parametric EQ

use std::f32::consts::FRAC_1_SQRT_2;

use fxkit_dsp::coefficients::{self, design};
use fxkit_dsp::{FilterBank, FilterShape};
use fxkit_dsp::math::DEFAULT_SAMPLE_RATE;

use crate::config::ProcessSpec;
use crate::params::{ParamSpec, ParamValues, ParamWatch};
use crate::processor::{AudioBlock, BypassMode, Processor};
use crate::transport::TransportInfo;

const SHAPES: [FilterShape; 8] = [
    FilterShape::LowPass,
    FilterShape::HighPass,
    FilterShape::BandPass,
    FilterShape::Notch,
    FilterShape::Peak,
    FilterShape::LowShelf,
    FilterShape::HighShelf,
    FilterShape::AllPass,
];

const SHAPE_NAMES: &[&str] = &[
    "Low Pass",
    "High Pass",
    "Band Pass",
    "Notch",
    "Peak",
    "Low Shelf",
    "High Shelf",
    "All Pass",
];

const SLOPE_NAMES: &[&str] = &["12 dB", "24 dB", "36 dB", "48 dB"];

const MAX_STAGES: usize = 4;

/// One filter shape cascaded 1-4 times
#[derive(Debug, Clone)]
pub struct Filter {
    sample_rate: f32,
    bank: FilterBank,
    watch: ParamWatch<4>,
}

impl Default for Filter {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter {
    pub const SHAPE: usize = 0;
    pub const FREQ_HZ: usize = 1;
    pub const Q: usize = 2;
    pub const GAIN_DB: usize = 3;
    pub const SLOPE: usize = 4;

    pub const PARAMS: &'static [ParamSpec] = &[
        ParamSpec::choice("shape", "Shape", SHAPE_NAMES, 0),
        ParamSpec::float("freq_hz", "Frequency", 20.0, 20000.0, 1000.0),
        ParamSpec::float("q", "Q", 0.1, 18.0, FRAC_1_SQRT_2),
        ParamSpec::float("gain_db", "Gain", -24.0, 24.0, 0.0),
        ParamSpec::choice("slope", "Slope", SLOPE_NAMES, 0),
    ];

    pub fn new() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            bank: FilterBank::new(0, MAX_STAGES),
            watch: ParamWatch::new(),
        }
    }
}

impl Processor for Filter {
    fn name(&self) -> &'static str {
        "Filter"
    }

    fn params(&self) -> &'static [ParamSpec] {
        Self::PARAMS
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate;
        self.bank.resize(spec.channels);
        self.watch.invalidate();
    }

    fn reset(&mut self) {
        self.bank.reset();
    }

    fn process(&mut self, block: &mut AudioBlock<'_>, params: &ParamValues<'_>, _: &TransportInfo) {
        let shape = params.choice(Self::SHAPE);
        let freq = params.get(Self::FREQ_HZ);
        let q = params.get(Self::Q);
        let gain_db = params.get(Self::GAIN_DB);
        if self.watch.changed([shape as f32, freq, q, gain_db]) {
            let shape = SHAPES.get(shape).copied().unwrap_or_default();
            let coeffs = design(shape, self.sample_rate, freq, q, gain_db);
            for stage in 0..MAX_STAGES {
                self.bank.set_role(stage, coeffs);
            }
        }

        let stages = params.choice(Self::SLOPE) + 1;
        for stage in 0..MAX_STAGES {
            self.bank.set_bypassed(stage, stage >= stages);
        }

        for c in 0..block.channels().min(self.bank.channels()) {
            self.bank.process_block(c, block.channel_mut(c));
        }
    }

    fn flush_denormals(&mut self) {
        self.bank.flush_denormals();
    }
}

mod role {
    pub const HIGH_PASS: usize = 0;
    pub const LOW_SHELF: usize = 1;
    pub const PEAK_1: usize = 2;
    pub const HIGH_SHELF: usize = 5;
    pub const LOW_PASS: usize = 6;
    pub const COUNT: usize = 7;
}

const EQ_PARAM_COUNT: usize = 17;

/// Seven-band EQ: high-pass, low shelf, three bells, high shelf, low-pass
///
/// Bands at 0 dB and disabled pass filters are skipped, so the EQ is an
/// exact passthrough at its defaults.
#[derive(Debug, Clone)]
pub struct ParametricEq {
    sample_rate: f32,
    bank: FilterBank,
    watch: ParamWatch<EQ_PARAM_COUNT>,
}

impl Default for ParametricEq {
    fn default() -> Self {
        Self::new()
    }
}

impl ParametricEq {
    pub const HP_ENABLED: usize = 0;
    pub const HP_FREQ_HZ: usize = 1;
    pub const LOW_SHELF_FREQ_HZ: usize = 2;
    pub const LOW_SHELF_GAIN_DB: usize = 3;
    /// First of three (freq, q, gain) triples
    pub const PEAK_1_FREQ_HZ: usize = 4;
    pub const HIGH_SHELF_FREQ_HZ: usize = 13;
    pub const HIGH_SHELF_GAIN_DB: usize = 14;
    pub const LP_ENABLED: usize = 15;
    pub const LP_FREQ_HZ: usize = 16;

    pub const PARAMS: &'static [ParamSpec] = &[
        ParamSpec::toggle("hp_enabled", "High Pass", false),
        ParamSpec::float("hp_freq_hz", "High Pass Freq", 20.0, 1000.0, 30.0),
        ParamSpec::float("low_shelf_freq_hz", "Low Shelf Freq", 20.0, 1000.0, 100.0),
        ParamSpec::float("low_shelf_gain_db", "Low Shelf Gain", -18.0, 18.0, 0.0),
        ParamSpec::float("peak1_freq_hz", "Bell 1 Freq", 20.0, 20000.0, 250.0),
        ParamSpec::float("peak1_q", "Bell 1 Q", 0.1, 10.0, 1.0),
        ParamSpec::float("peak1_gain_db", "Bell 1 Gain", -18.0, 18.0, 0.0),
        ParamSpec::float("peak2_freq_hz", "Bell 2 Freq", 20.0, 20000.0, 1000.0),
        ParamSpec::float("peak2_q", "Bell 2 Q", 0.1, 10.0, 1.0),
        ParamSpec::float("peak2_gain_db", "Bell 2 Gain", -18.0, 18.0, 0.0),
        ParamSpec::float("peak3_freq_hz", "Bell 3 Freq", 20.0, 20000.0, 4000.0),
        ParamSpec::float("peak3_q", "Bell 3 Q", 0.1, 10.0, 1.0),
        ParamSpec::float("peak3_gain_db", "Bell 3 Gain", -18.0, 18.0, 0.0),
        ParamSpec::float("high_shelf_freq_hz", "High Shelf Freq", 1000.0, 20000.0, 8000.0),
        ParamSpec::float("high_shelf_gain_db", "High Shelf Gain", -18.0, 18.0, 0.0),
        ParamSpec::toggle("lp_enabled", "Low Pass", false),
        ParamSpec::float("lp_freq_hz", "Low Pass Freq", 1000.0, 20000.0, 18000.0),
    ];

    pub fn new() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            bank: FilterBank::new(0, role::COUNT),
            watch: ParamWatch::new(),
        }
    }

    fn redesign(&mut self, params: &ParamValues<'_>) {
        let sr = self.sample_rate;
        let bank = &mut self.bank;

        bank.set_role(
            role::HIGH_PASS,
            coefficients::high_pass(sr, params.get(Self::HP_FREQ_HZ), FRAC_1_SQRT_2),
        );
        bank.set_bypassed(role::HIGH_PASS, !params.flag(Self::HP_ENABLED));

        let gain = params.get(Self::LOW_SHELF_GAIN_DB);
        bank.set_role(
            role::LOW_SHELF,
            coefficients::low_shelf(sr, params.get(Self::LOW_SHELF_FREQ_HZ), FRAC_1_SQRT_2, gain),
        );
        bank.set_bypassed(role::LOW_SHELF, gain == 0.0);

        for band in 0..3 {
            let base = Self::PEAK_1_FREQ_HZ + 3 * band;
            let gain = params.get(base + 2);
            bank.set_role(
                role::PEAK_1 + band,
                coefficients::peak(sr, params.get(base), params.get(base + 1), gain),
            );
            bank.set_bypassed(role::PEAK_1 + band, gain == 0.0);
        }

        let gain = params.get(Self::HIGH_SHELF_GAIN_DB);
        bank.set_role(
            role::HIGH_SHELF,
            coefficients::high_shelf(sr, params.get(Self::HIGH_SHELF_FREQ_HZ), FRAC_1_SQRT_2, gain),
        );
        bank.set_bypassed(role::HIGH_SHELF, gain == 0.0);

        bank.set_role(
            role::LOW_PASS,
            coefficients::low_pass(sr, params.get(Self::LP_FREQ_HZ), FRAC_1_SQRT_2),
        );
        bank.set_bypassed(role::LOW_PASS, !params.flag(Self::LP_ENABLED));
    }
}

impl Processor for ParametricEq {
    fn name(&self) -> &'static str {
        "Parametric EQ"
    }

    fn params(&self) -> &'static [ParamSpec] {
        Self::PARAMS
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate;
        self.bank.resize(spec.channels);
        self.watch.invalidate();
    }

    fn reset(&mut self) {
        self.bank.reset();
    }

    fn process(&mut self, block: &mut AudioBlock<'_>, params: &ParamValues<'_>, _: &TransportInfo) {
        if self.watch.changed(std::array::from_fn(|i| params.get(i))) {
            self.redesign(params);
        }
        for c in 0..block.channels().min(self.bank.channels()) {
            self.bank.process_block(c, block.channel_mut(c));
        }
    }

    fn flush_denormals(&mut self) {
        self.bank.flush_denormals();
    }

    fn bypass_mode(&self) -> BypassMode {
        BypassMode::TrimOnly
    }
}
