//! Dynamics processors: compressor, limiter, gate, transient shaper and
//! a three-band compressor

use std::f32::consts::FRAC_1_SQRT_2;

use fxkit_dsp::coefficients::high_pass;
use fxkit_dsp::dynamics::level_db;
use fxkit_dsp::math::{db_to_gain, gain_to_db, ms_to_samples, DEFAULT_SAMPLE_RATE};
use fxkit_dsp::{
    Crossover, CrossoverOrder, Detection, EnvelopeFollower, FilterBank, GainComputer,
    GainSmoother, SplitTopology, TransientDetector,
};

use crate::config::ProcessSpec;
use crate::events::ProcessorEvent;
use crate::params::{ParamSpec, ParamValues, ParamWatch};
use crate::processor::{AudioBlock, BypassMode, Processor};
use crate::transport::TransportInfo;

const DETECTION_NAMES: &[&str] = &["Peak", "RMS"];

fn detection_from_index(index: usize) -> Detection {
    if index == 0 {
        Detection::Peak
    } else {
        Detection::Rms
    }
}

/// Largest reduction held by a set of smoothers, positive dB
fn max_reduction_db(smoothers: &[GainSmoother]) -> f32 {
    smoothers
        .iter()
        .map(|s| -gain_to_db(s.current()))
        .fold(0.0, f32::max)
}

/// Feed-forward compressor with optional sidechain high-pass
///
/// Per channel: sidechain HPF → envelope → hard-knee curve → gain smoother.
/// With stereo link on, every channel follows the loudest detector.
#[derive(Debug, Clone)]
pub struct Compressor {
    sample_rate: f32,
    sidechain: FilterBank,
    detectors: Vec<EnvelopeFollower>,
    smoothers: Vec<GainSmoother>,
    timing: ParamWatch<3>,
    sidechain_freq: ParamWatch<1>,
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor {
    pub const THRESHOLD_DB: usize = 0;
    pub const RATIO: usize = 1;
    pub const ATTACK_MS: usize = 2;
    pub const RELEASE_MS: usize = 3;
    pub const MAKEUP_DB: usize = 4;
    pub const AUTO_MAKEUP: usize = 5;
    pub const DETECTION: usize = 6;
    pub const SIDECHAIN_HPF: usize = 7;
    pub const SIDECHAIN_FREQ: usize = 8;
    pub const STEREO_LINK: usize = 9;

    pub const PARAMS: &'static [ParamSpec] = &[
        ParamSpec::float("threshold_db", "Threshold", -60.0, 0.0, -18.0),
        ParamSpec::float("ratio", "Ratio", 1.0, 20.0, 4.0),
        ParamSpec::float("attack_ms", "Attack", 0.1, 200.0, 10.0),
        ParamSpec::float("release_ms", "Release", 5.0, 2000.0, 120.0),
        ParamSpec::float("makeup_db", "Makeup", 0.0, 24.0, 0.0),
        ParamSpec::toggle("auto_makeup", "Auto Makeup", false),
        ParamSpec::choice("detection", "Detection", DETECTION_NAMES, 1),
        ParamSpec::toggle("sidechain_hpf", "Sidechain HPF", false),
        ParamSpec::float("sidechain_freq", "Sidechain Freq", 20.0, 300.0, 80.0),
        ParamSpec::toggle("stereo_link", "Stereo Link", true),
    ];

    pub fn new() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            sidechain: FilterBank::new(0, 1),
            detectors: Vec::new(),
            smoothers: Vec::new(),
            timing: ParamWatch::new(),
            sidechain_freq: ParamWatch::new(),
        }
    }

    /// Auto makeup estimate: a quarter of the full-scale reduction, at most 6 dB
    fn auto_makeup_db(threshold_db: f32, ratio: f32) -> f32 {
        (threshold_db.abs() * (1.0 - 1.0 / ratio.max(1.0)) / 4.0).min(6.0)
    }
}

impl Processor for Compressor {
    fn name(&self) -> &'static str {
        "Compressor"
    }

    fn params(&self) -> &'static [ParamSpec] {
        Self::PARAMS
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate;
        self.sidechain.resize(spec.channels);
        self.detectors = (0..spec.channels)
            .map(|_| EnvelopeFollower::new(spec.sample_rate, 10.0, 120.0))
            .collect();
        self.smoothers = vec![GainSmoother::new(); spec.channels];
        self.timing.invalidate();
        self.sidechain_freq.invalidate();
    }

    fn reset(&mut self) {
        self.sidechain.reset();
        self.detectors.iter_mut().for_each(EnvelopeFollower::reset);
        self.smoothers.iter_mut().for_each(GainSmoother::reset);
    }

    fn process(&mut self, block: &mut AudioBlock<'_>, params: &ParamValues<'_>, _: &TransportInfo) {
        let threshold = params.get(Self::THRESHOLD_DB);
        let ratio = params.get(Self::RATIO);
        let curve = GainComputer::compressor(threshold, ratio);

        let mut makeup_db = params.get(Self::MAKEUP_DB);
        if params.flag(Self::AUTO_MAKEUP) {
            makeup_db += Self::auto_makeup_db(threshold, ratio);
        }
        let makeup = db_to_gain(makeup_db);

        let attack = params.get(Self::ATTACK_MS);
        let release = params.get(Self::RELEASE_MS);
        let detection = params.choice(Self::DETECTION);
        if self.timing.changed([attack, release, detection as f32]) {
            for d in &mut self.detectors {
                d.set_attack_ms(attack);
                d.set_release_ms(release);
                d.set_detection(detection_from_index(detection));
            }
        }

        let freq = params.get(Self::SIDECHAIN_FREQ);
        if self.sidechain_freq.changed([freq]) {
            self.sidechain
                .set_role(0, high_pass(self.sample_rate, freq, FRAC_1_SQRT_2));
        }
        self.sidechain
            .set_bypassed(0, !params.flag(Self::SIDECHAIN_HPF));

        let link = params.flag(Self::STEREO_LINK);
        let channels = block.channels().min(self.detectors.len());

        for i in 0..block.frames() {
            let mut linked = 0.0f32;
            for c in 0..channels {
                let key = self.sidechain.process_chain(c, block.get(c, i));
                linked = linked.max(self.detectors[c].process(key));
            }
            for c in 0..channels {
                let level = if link {
                    linked
                } else {
                    self.detectors[c].level()
                };
                let gain = self.smoothers[c].process(curve.gain(level_db(level)));
                block.set(c, i, block.get(c, i) * gain * makeup);
            }
        }
    }

    fn flush_denormals(&mut self) {
        self.sidechain.flush_denormals();
        self.detectors
            .iter_mut()
            .for_each(EnvelopeFollower::flush_denormals);
    }

    fn bypass_mode(&self) -> BypassMode {
        BypassMode::TrimOnly
    }

    fn meter(&mut self) -> Option<ProcessorEvent> {
        Some(ProcessorEvent::GainReduction {
            db: max_reduction_db(&self.smoothers),
        })
    }
}

/// Peak limiter with instant attack and a hard ceiling
#[derive(Debug, Clone)]
pub struct Limiter {
    detector: EnvelopeFollower,
    smoother: GainSmoother,
}

impl Default for Limiter {
    fn default() -> Self {
        Self::new()
    }
}

impl Limiter {
    pub const CEILING_DB: usize = 0;
    pub const RELEASE_MS: usize = 1;

    pub const PARAMS: &'static [ParamSpec] = &[
        ParamSpec::float("ceiling_db", "Ceiling", -24.0, 0.0, -1.0),
        ParamSpec::float("release_ms", "Release", 1.0, 1000.0, 50.0),
    ];

    pub fn new() -> Self {
        Self {
            detector: EnvelopeFollower::new(DEFAULT_SAMPLE_RATE, 0.0, 50.0),
            smoother: GainSmoother::with_coefficient(GainSmoother::MAX_COEFF),
        }
    }
}

impl Processor for Limiter {
    fn name(&self) -> &'static str {
        "Limiter"
    }

    fn params(&self) -> &'static [ParamSpec] {
        Self::PARAMS
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.detector.set_sample_rate(spec.sample_rate);
        self.reset();
    }

    fn reset(&mut self) {
        self.detector.reset();
        self.smoother.reset();
    }

    fn process(&mut self, block: &mut AudioBlock<'_>, params: &ParamValues<'_>, _: &TransportInfo) {
        let ceiling_db = params.get(Self::CEILING_DB);
        let ceiling = db_to_gain(ceiling_db);
        let curve = GainComputer::limiter(ceiling_db);
        self.detector.set_release_ms(params.get(Self::RELEASE_MS));

        let channels = block.channels();
        for i in 0..block.frames() {
            let peak = (0..channels).fold(0.0f32, |m, c| m.max(block.get(c, i).abs()));
            let env = self.detector.process(peak);
            let gain = self.smoother.process(curve.gain(level_db(env)));
            for c in 0..channels {
                let y = (block.get(c, i) * gain).clamp(-ceiling, ceiling);
                block.set(c, i, y);
            }
        }
    }

    fn flush_denormals(&mut self) {
        self.detector.flush_denormals();
    }

    fn bypass_mode(&self) -> BypassMode {
        BypassMode::TrimOnly
    }

    fn meter(&mut self) -> Option<ProcessorEvent> {
        Some(ProcessorEvent::GainReduction {
            db: -gain_to_db(self.smoother.current()),
        })
    }
}

/// Stereo-linked noise gate with hold
///
/// The gate opens while the detected peak sits at or above threshold and
/// stays open for `hold` after it drops. The applied gain glides between
/// unity and the floor with attack (opening) and release (closing) times,
/// then through a [`GainSmoother`] so even a 0.1 ms attack cannot step.
#[derive(Debug, Clone)]
pub struct Gate {
    sample_rate: f32,
    detector: EnvelopeFollower,
    gain: EnvelopeFollower,
    smoother: GainSmoother,
    hold_remaining: u32,
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

impl Gate {
    pub const THRESHOLD_DB: usize = 0;
    pub const FLOOR_DB: usize = 1;
    pub const ATTACK_MS: usize = 2;
    pub const HOLD_MS: usize = 3;
    pub const RELEASE_MS: usize = 4;

    pub const PARAMS: &'static [ParamSpec] = &[
        ParamSpec::float("threshold_db", "Threshold", -80.0, 0.0, -40.0),
        ParamSpec::float("floor_db", "Range", -80.0, 0.0, -80.0),
        ParamSpec::float("attack_ms", "Attack", 0.1, 50.0, 1.0),
        ParamSpec::float("hold_ms", "Hold", 0.0, 500.0, 50.0),
        ParamSpec::float("release_ms", "Release", 5.0, 2000.0, 100.0),
    ];

    const DETECTOR_ATTACK_MS: f32 = 0.1;
    const DETECTOR_RELEASE_MS: f32 = 20.0;

    pub fn new() -> Self {
        let mut gate = Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            detector: EnvelopeFollower::new(
                DEFAULT_SAMPLE_RATE,
                Self::DETECTOR_ATTACK_MS,
                Self::DETECTOR_RELEASE_MS,
            ),
            gain: EnvelopeFollower::new(DEFAULT_SAMPLE_RATE, 1.0, 100.0),
            smoother: GainSmoother::new(),
            hold_remaining: 0,
        };
        gate.reset();
        gate
    }
}

impl Processor for Gate {
    fn name(&self) -> &'static str {
        "Gate"
    }

    fn params(&self) -> &'static [ParamSpec] {
        Self::PARAMS
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate;
        self.detector.set_sample_rate(spec.sample_rate);
        self.gain.set_sample_rate(spec.sample_rate);
        self.reset();
    }

    fn reset(&mut self) {
        self.detector.reset();
        // Open until the detector has seen the signal
        self.gain.reset_to(1.0);
        self.smoother.reset();
        self.hold_remaining = 0;
    }

    fn process(&mut self, block: &mut AudioBlock<'_>, params: &ParamValues<'_>, _: &TransportInfo) {
        let curve = GainComputer::gate(params.get(Self::THRESHOLD_DB), params.get(Self::FLOOR_DB));
        let floor = curve.gain(f32::NEG_INFINITY);
        self.gain.set_attack_ms(params.get(Self::ATTACK_MS));
        self.gain.set_release_ms(params.get(Self::RELEASE_MS));
        let hold_samples = ms_to_samples(params.get(Self::HOLD_MS), self.sample_rate) as u32;

        let channels = block.channels();
        for i in 0..block.frames() {
            let peak = (0..channels).fold(0.0f32, |m, c| m.max(block.get(c, i).abs()));
            let env = self.detector.process(peak);

            let target = if curve.gain_db(level_db(env)) == 0.0 {
                self.hold_remaining = hold_samples;
                1.0
            } else if self.hold_remaining > 0 {
                self.hold_remaining -= 1;
                1.0
            } else {
                floor
            };

            let gain = self.smoother.process(self.gain.track(target));
            for c in 0..channels {
                block.set(c, i, block.get(c, i) * gain);
            }
        }
    }

    fn flush_denormals(&mut self) {
        self.detector.flush_denormals();
        self.gain.flush_denormals();
    }

    fn meter(&mut self) -> Option<ProcessorEvent> {
        Some(ProcessorEvent::GainReduction {
            db: max_reduction_db(std::slice::from_ref(&self.smoother)),
        })
    }
}

/// Attack/sustain shaper driven by a fast/slow envelope difference
///
/// The normalised difference `(fast - slow) / fast` is positive on attacks
/// and negative in the decay tail; it scales the attack or sustain gain.
#[derive(Debug, Clone)]
pub struct TransientShaper {
    detectors: Vec<TransientDetector>,
    smoothers: Vec<GainSmoother>,
}

impl Default for TransientShaper {
    fn default() -> Self {
        Self::new()
    }
}

impl TransientShaper {
    pub const ATTACK_DB: usize = 0;
    pub const SUSTAIN_DB: usize = 1;

    pub const PARAMS: &'static [ParamSpec] = &[
        ParamSpec::float("attack_db", "Attack", -12.0, 12.0, 0.0),
        ParamSpec::float("sustain_db", "Sustain", -12.0, 12.0, 0.0),
    ];

    pub fn new() -> Self {
        Self {
            detectors: Vec::new(),
            smoothers: Vec::new(),
        }
    }
}

impl Processor for TransientShaper {
    fn name(&self) -> &'static str {
        "Transient Shaper"
    }

    fn params(&self) -> &'static [ParamSpec] {
        Self::PARAMS
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.detectors = vec![TransientDetector::new(spec.sample_rate); spec.channels];
        self.smoothers = vec![GainSmoother::new(); spec.channels];
    }

    fn reset(&mut self) {
        self.detectors.iter_mut().for_each(TransientDetector::reset);
        self.smoothers.iter_mut().for_each(GainSmoother::reset);
    }

    fn process(&mut self, block: &mut AudioBlock<'_>, params: &ParamValues<'_>, _: &TransportInfo) {
        let attack_db = params.get(Self::ATTACK_DB);
        let sustain_db = params.get(Self::SUSTAIN_DB);

        let channels = block.channels().min(self.detectors.len());
        for c in 0..channels {
            let detector = &mut self.detectors[c];
            let smoother = &mut self.smoothers[c];
            for x in block.channel_mut(c).iter_mut() {
                let shape = detector.shape(*x);
                let gain_db = if shape > 0.0 {
                    attack_db * shape
                } else {
                    -sustain_db * shape
                };
                *x *= smoother.process(db_to_gain(gain_db));
            }
        }
    }

    fn flush_denormals(&mut self) {
        self.detectors
            .iter_mut()
            .for_each(TransientDetector::flush_denormals);
    }
}

const MB_BANDS: usize = 3;

/// Three-band compressor over a complementary crossover
///
/// Bands are compressed independently per channel and summed; with every
/// ratio at 1 the output reconstructs the input.
#[derive(Debug, Clone)]
pub struct MultibandCompressor {
    crossover: Crossover,
    /// `channel * MB_BANDS + band`
    detectors: Vec<EnvelopeFollower>,
    smoothers: Vec<GainSmoother>,
    timing: ParamWatch<2>,
}

impl Default for MultibandCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl MultibandCompressor {
    pub const LOW_SPLIT_HZ: usize = 0;
    pub const HIGH_SPLIT_HZ: usize = 1;
    pub const LOW_THRESHOLD_DB: usize = 2;
    pub const LOW_RATIO: usize = 3;
    pub const MID_THRESHOLD_DB: usize = 4;
    pub const MID_RATIO: usize = 5;
    pub const HIGH_THRESHOLD_DB: usize = 6;
    pub const HIGH_RATIO: usize = 7;
    pub const ATTACK_MS: usize = 8;
    pub const RELEASE_MS: usize = 9;
    pub const MAKEUP_DB: usize = 10;

    pub const PARAMS: &'static [ParamSpec] = &[
        ParamSpec::float("low_split_hz", "Low Split", 40.0, 1000.0, 200.0),
        ParamSpec::float("high_split_hz", "High Split", 1000.0, 12000.0, 3000.0),
        ParamSpec::float("low_threshold_db", "Low Threshold", -60.0, 0.0, -18.0),
        ParamSpec::float("low_ratio", "Low Ratio", 1.0, 20.0, 3.0),
        ParamSpec::float("mid_threshold_db", "Mid Threshold", -60.0, 0.0, -18.0),
        ParamSpec::float("mid_ratio", "Mid Ratio", 1.0, 20.0, 3.0),
        ParamSpec::float("high_threshold_db", "High Threshold", -60.0, 0.0, -18.0),
        ParamSpec::float("high_ratio", "High Ratio", 1.0, 20.0, 3.0),
        ParamSpec::float("attack_ms", "Attack", 0.1, 200.0, 10.0),
        ParamSpec::float("release_ms", "Release", 5.0, 2000.0, 150.0),
        ParamSpec::float("makeup_db", "Makeup", 0.0, 24.0, 0.0),
    ];

    pub fn new() -> Self {
        Self {
            crossover: Crossover::new(
                DEFAULT_SAMPLE_RATE,
                CrossoverOrder::Lr24,
                SplitTopology::Complementary,
                &[200.0, 3000.0],
                0,
            ),
            detectors: Vec::new(),
            smoothers: Vec::new(),
            timing: ParamWatch::new(),
        }
    }
}

impl Processor for MultibandCompressor {
    fn name(&self) -> &'static str {
        "Multiband Compressor"
    }

    fn params(&self) -> &'static [ParamSpec] {
        Self::PARAMS
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.crossover.prepare(spec.sample_rate, spec.channels);
        let slots = spec.channels * MB_BANDS;
        self.detectors = (0..slots)
            .map(|_| EnvelopeFollower::new(spec.sample_rate, 10.0, 150.0))
            .collect();
        self.smoothers = vec![GainSmoother::new(); slots];
        self.timing.invalidate();
    }

    fn reset(&mut self) {
        self.crossover.reset();
        self.detectors.iter_mut().for_each(EnvelopeFollower::reset);
        self.smoothers.iter_mut().for_each(GainSmoother::reset);
    }

    fn process(&mut self, block: &mut AudioBlock<'_>, params: &ParamValues<'_>, _: &TransportInfo) {
        self.crossover.set_frequency(0, params.get(Self::LOW_SPLIT_HZ));
        self.crossover.set_frequency(1, params.get(Self::HIGH_SPLIT_HZ));

        let curves = [
            GainComputer::compressor(params.get(Self::LOW_THRESHOLD_DB), params.get(Self::LOW_RATIO)),
            GainComputer::compressor(params.get(Self::MID_THRESHOLD_DB), params.get(Self::MID_RATIO)),
            GainComputer::compressor(params.get(Self::HIGH_THRESHOLD_DB), params.get(Self::HIGH_RATIO)),
        ];
        let makeup = db_to_gain(params.get(Self::MAKEUP_DB));

        let attack = params.get(Self::ATTACK_MS);
        let release = params.get(Self::RELEASE_MS);
        if self.timing.changed([attack, release]) {
            for d in &mut self.detectors {
                d.set_attack_ms(attack);
                d.set_release_ms(release);
            }
        }

        let channels = block.channels().min(self.crossover.channels());
        let mut bands = [0.0f32; MB_BANDS];
        for c in 0..channels {
            let base = c * MB_BANDS;
            for x in block.channel_mut(c).iter_mut() {
                self.crossover.process(c, *x, &mut bands);
                let mut sum = 0.0;
                for (b, (&band, curve)) in bands.iter().zip(&curves).enumerate() {
                    let env = self.detectors[base + b].process(band);
                    sum += band * self.smoothers[base + b].process(curve.gain(level_db(env)));
                }
                *x = sum * makeup;
            }
        }
    }

    fn flush_denormals(&mut self) {
        self.crossover.flush_denormals();
        self.detectors
            .iter_mut()
            .for_each(EnvelopeFollower::flush_denormals);
    }

    fn bypass_mode(&self) -> BypassMode {
        BypassMode::TrimOnly
    }

    fn meter(&mut self) -> Option<ProcessorEvent> {
        Some(ProcessorEvent::GainReduction {
            db: max_reduction_db(&self.smoothers),
        })
    }
}
