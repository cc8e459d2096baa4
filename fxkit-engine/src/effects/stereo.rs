//! Stereo imaging and band splitting

use fxkit_dsp::crossover::MAX_BANDS;
use fxkit_dsp::math::{db_to_gain, ms_to_samples, DEFAULT_SAMPLE_RATE};
use fxkit_dsp::{Crossover, CrossoverOrder, SplitTopology, StereoMatrix};

use crate::config::ProcessSpec;
use crate::params::{ParamSpec, ParamValues, ParamWatch};
use crate::processor::{AudioBlock, BypassMode, Processor};
use crate::transport::TransportInfo;

const ORDER_NAMES: &[&str] = &["12 dB/oct", "24 dB/oct", "48 dB/oct"];
const TOPOLOGY_NAMES: &[&str] = &["Complementary", "Linkwitz-Riley"];

/// Mid/side width, polarity and mono control with optional bass mono
///
/// With bass mono on, content below the split is folded to mono and only
/// the high band passes through the matrix. Mono input is left untouched.
#[derive(Debug, Clone)]
pub struct StereoImager {
    matrix: StereoMatrix,
    bass: Crossover,
    bass_watch: ParamWatch<1>,
}

impl Default for StereoImager {
    fn default() -> Self {
        Self::new()
    }
}

impl StereoImager {
    pub const WIDTH: usize = 0;
    pub const MONO_SAFE: usize = 1;
    pub const INVERT_MID: usize = 2;
    pub const INVERT_SIDE: usize = 3;
    pub const MONO: usize = 4;
    pub const BASS_MONO: usize = 5;
    pub const BASS_MONO_HZ: usize = 6;

    pub const PARAMS: &'static [ParamSpec] = &[
        ParamSpec::float("width", "Width", 0.0, 4.0, 1.0),
        ParamSpec::toggle("mono_safe", "Mono Safe", false),
        ParamSpec::toggle("invert_mid", "Invert Mid", false),
        ParamSpec::toggle("invert_side", "Invert Side", false),
        ParamSpec::toggle("mono", "Mono", false),
        ParamSpec::toggle("bass_mono", "Bass Mono", false),
        ParamSpec::float("bass_mono_hz", "Bass Mono Freq", 40.0, 400.0, 120.0),
    ];

    pub fn new() -> Self {
        Self {
            matrix: StereoMatrix::default(),
            bass: Crossover::new(
                DEFAULT_SAMPLE_RATE,
                CrossoverOrder::Lr24,
                SplitTopology::LinkwitzRiley,
                &[Self::PARAMS[Self::BASS_MONO_HZ].default],
                2,
            ),
            bass_watch: ParamWatch::new(),
        }
    }

    fn update_matrix(&mut self, params: &ParamValues<'_>) {
        self.matrix.set_width(params.get(Self::WIDTH));
        self.matrix.mono_safe = params.flag(Self::MONO_SAFE);
        self.matrix.invert_mid = params.flag(Self::INVERT_MID);
        self.matrix.invert_side = params.flag(Self::INVERT_SIDE);
        self.matrix.mono = params.flag(Self::MONO);
    }
}

impl Processor for StereoImager {
    fn name(&self) -> &'static str {
        "Stereo Imager"
    }

    fn params(&self) -> &'static [ParamSpec] {
        Self::PARAMS
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.bass.prepare(spec.sample_rate, 2);
        self.bass_watch.invalidate();
    }

    fn reset(&mut self) {
        self.bass.reset();
    }

    fn process(&mut self, block: &mut AudioBlock<'_>, params: &ParamValues<'_>, _: &TransportInfo) {
        self.update_matrix(params);
        let bass_mono = params.flag(Self::BASS_MONO);
        if self.matrix.is_identity() && !bass_mono {
            return;
        }
        let Some((left, right)) = block.stereo_mut() else {
            return;
        };

        if !bass_mono {
            self.matrix.process_block(left, right);
            return;
        }

        let split = params.get(Self::BASS_MONO_HZ);
        if self.bass_watch.changed([split]) {
            self.bass.set_frequency(0, split);
        }

        let mut bands_l = [0.0f32; 2];
        let mut bands_r = [0.0f32; 2];
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            self.bass.process(0, *l, &mut bands_l);
            self.bass.process(1, *r, &mut bands_r);
            let low = 0.5 * (bands_l[0] + bands_r[0]);
            let (hl, hr) = self.matrix.process(bands_l[1], bands_r[1]);
            *l = low + hl;
            *r = low + hr;
        }
    }

    fn flush_denormals(&mut self) {
        self.bass.flush_denormals();
    }

    fn bypass_mode(&self) -> BypassMode {
        BypassMode::TrimOnly
    }
}

/// Number of bands selectable on a [`BandSplitter`]
const MAX_SPLITTER_BANDS: usize = 4;

/// Multi-band crossover with per-band gain, solo and mute
///
/// One crossover per band count is built at prepare so switching between
/// two, three and four bands never allocates. Split frequencies are kept
/// ascending: a split set below its predecessor is raised to match.
///
/// Changing band count, slope or topology restarts the filters, so the
/// previous setup keeps running from a snapshot and is crossfaded out.
#[derive(Debug, Clone)]
pub struct BandSplitter {
    crossovers: [Crossover; MAX_SPLITTER_BANDS - 1],
    snapshots: [Crossover; MAX_SPLITTER_BANDS - 1],
    active: usize,
    layout: (usize, usize),
    settings: ParamWatch<6>,
    primed: bool,
    fade_from: usize,
    fade_len: usize,
    fade_remaining: usize,
}

impl Default for BandSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl BandSplitter {
    pub const BANDS: usize = 0;
    pub const ORDER: usize = 1;
    pub const TOPOLOGY: usize = 2;
    pub const SPLIT_1_HZ: usize = 3;
    pub const SPLIT_2_HZ: usize = 4;
    pub const SPLIT_3_HZ: usize = 5;
    /// First per-band parameter; each band has gain, solo and mute
    pub const BAND_PARAMS: usize = 6;

    pub const PARAMS: &'static [ParamSpec] = &[
        ParamSpec::choice("bands", "Bands", &["2", "3", "4"], 1),
        ParamSpec::choice("order", "Slope", ORDER_NAMES, 1),
        ParamSpec::choice("topology", "Topology", TOPOLOGY_NAMES, 0),
        ParamSpec::float("split1_hz", "Split 1", 20.0, 20000.0, 200.0),
        ParamSpec::float("split2_hz", "Split 2", 20.0, 20000.0, 2000.0),
        ParamSpec::float("split3_hz", "Split 3", 20.0, 20000.0, 8000.0),
        ParamSpec::float("band1_gain_db", "Band 1 Gain", -24.0, 24.0, 0.0),
        ParamSpec::toggle("band1_solo", "Band 1 Solo", false),
        ParamSpec::toggle("band1_mute", "Band 1 Mute", false),
        ParamSpec::float("band2_gain_db", "Band 2 Gain", -24.0, 24.0, 0.0),
        ParamSpec::toggle("band2_solo", "Band 2 Solo", false),
        ParamSpec::toggle("band2_mute", "Band 2 Mute", false),
        ParamSpec::float("band3_gain_db", "Band 3 Gain", -24.0, 24.0, 0.0),
        ParamSpec::toggle("band3_solo", "Band 3 Solo", false),
        ParamSpec::toggle("band3_mute", "Band 3 Mute", false),
        ParamSpec::float("band4_gain_db", "Band 4 Gain", -24.0, 24.0, 0.0),
        ParamSpec::toggle("band4_solo", "Band 4 Solo", false),
        ParamSpec::toggle("band4_mute", "Band 4 Mute", false),
    ];

    const DEFAULT_SPLITS: [f32; MAX_SPLITTER_BANDS - 1] = [200.0, 2000.0, 8000.0];

    pub fn new() -> Self {
        let build = |splits: usize| {
            Crossover::new(
                DEFAULT_SAMPLE_RATE,
                CrossoverOrder::Lr24,
                SplitTopology::Complementary,
                &Self::DEFAULT_SPLITS[..splits],
                2,
            )
        };
        Self {
            crossovers: [build(1), build(2), build(3)],
            snapshots: [build(1), build(2), build(3)],
            active: 1,
            layout: (1, 0),
            settings: ParamWatch::new(),
            primed: false,
            fade_from: 1,
            fade_len: 1,
            fade_remaining: 0,
        }
    }

    const FADE_MS: f32 = 10.0;

    fn sum_bands(bands: &[f32], gains: &[f32]) -> f32 {
        bands.iter().zip(gains).map(|(band, gain)| band * gain).sum()
    }

    /// Split frequencies from parameters, forced ascending
    fn split_frequencies(params: &ParamValues<'_>) -> [f32; MAX_SPLITTER_BANDS - 1] {
        let mut splits = [
            params.get(Self::SPLIT_1_HZ),
            params.get(Self::SPLIT_2_HZ),
            params.get(Self::SPLIT_3_HZ),
        ];
        for k in 1..splits.len() {
            splits[k] = splits[k].max(splits[k - 1]);
        }
        splits
    }

    /// Linear gain per band after solo and mute
    fn band_gains(params: &ParamValues<'_>, bands: usize) -> [f32; MAX_BANDS] {
        let band = |b: usize, field: usize| Self::BAND_PARAMS + 3 * b + field;
        let any_solo = (0..bands).any(|b| params.flag(band(b, 1)));
        let mut gains = [0.0f32; MAX_BANDS];
        for (b, gain) in gains.iter_mut().enumerate().take(bands) {
            let audible = !params.flag(band(b, 2)) && (!any_solo || params.flag(band(b, 1)));
            if audible {
                *gain = db_to_gain(params.get(band(b, 0)));
            }
        }
        gains
    }
}

impl Processor for BandSplitter {
    fn name(&self) -> &'static str {
        "Band Splitter"
    }

    fn params(&self) -> &'static [ParamSpec] {
        Self::PARAMS
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        for xo in self.crossovers.iter_mut().chain(self.snapshots.iter_mut()) {
            xo.prepare(spec.sample_rate, spec.channels);
        }
        self.fade_len = (ms_to_samples(Self::FADE_MS, spec.sample_rate) as usize).max(1);
        self.fade_remaining = 0;
        self.primed = false;
        self.settings.invalidate();
    }

    fn reset(&mut self) {
        self.crossovers.iter_mut().for_each(Crossover::reset);
        self.fade_remaining = 0;
    }

    fn process(&mut self, block: &mut AudioBlock<'_>, params: &ParamValues<'_>, _: &TransportInfo) {
        let active = params.choice(Self::BANDS).min(self.crossovers.len() - 1);
        let order = params.choice(Self::ORDER);
        let topology = params.choice(Self::TOPOLOGY);
        let splits = Self::split_frequencies(params);

        if self.settings.changed([
            active as f32,
            order as f32,
            topology as f32,
            splits[0],
            splits[1],
            splits[2],
        ]) || active != self.active
        {
            let restart = active != self.active || (order, topology) != self.layout;
            if restart && self.primed {
                self.snapshots[self.active].copy_from(&self.crossovers[self.active]);
                self.fade_from = self.active;
                self.fade_remaining = self.fade_len;
            }
            self.layout = (order, topology);

            let xo = &mut self.crossovers[active];
            xo.set_order(CrossoverOrder::from_index(order));
            xo.set_topology(if topology == 1 {
                SplitTopology::LinkwitzRiley
            } else {
                SplitTopology::Complementary
            });
            for (s, &f) in splits.iter().enumerate().take(xo.bands() - 1) {
                xo.set_frequency(s, f);
            }
            if active != self.active {
                xo.reset();
                self.active = active;
            }
        }

        self.primed = true;

        let xo = &mut self.crossovers[self.active];
        let bands = xo.bands();
        let gains = Self::band_gains(params, bands);
        let channels = block.channels().min(xo.channels());

        let old = &mut self.snapshots[self.fade_from];
        let old_bands = old.bands();
        let old_gains = Self::band_gains(params, old_bands);
        let (fade, fade_len) = (self.fade_remaining, self.fade_len as f32);

        let mut out = [0.0f32; MAX_BANDS];
        let mut old_out = [0.0f32; MAX_BANDS];
        for c in 0..channels {
            for (i, x) in block.channel_mut(c).iter_mut().enumerate() {
                xo.process(c, *x, &mut out);
                let mut y = Self::sum_bands(&out[..bands], &gains);
                let left = fade.saturating_sub(i);
                if left > 0 {
                    old.process(c, *x, &mut old_out);
                    let from = Self::sum_bands(&old_out[..old_bands], &old_gains);
                    let t = left as f32 / fade_len;
                    y = from * t + y * (1.0 - t);
                }
                *x = y;
            }
        }
        self.fade_remaining = fade.saturating_sub(block.frames());
    }

    fn flush_denormals(&mut self) {
        self.crossovers[self.active].flush_denormals();
        if self.fade_remaining > 0 {
            self.snapshots[self.fade_from].flush_denormals();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::test_util::{prepared, rms, run, set};
    use crate::effects::EffectKind;
    use std::f32::consts::TAU;

    const SR: f32 = 48000.0;

    fn sine(freq: f32, len: usize, sign: f32) -> Vec<f32> {
        (0..len)
            .map(|i| sign * 0.5 * (TAU * freq * i as f32 / SR).sin())
            .collect()
    }

    /// Channel-major stereo buffer
    fn stereo(left: &[f32], right: &[f32]) -> Vec<f32> {
        left.iter().chain(right.iter()).copied().collect()
    }

    #[test]
    fn test_imager_defaults_are_transparent() {
        let (mut fx, values) = prepared(EffectKind::StereoImager, SR, 2);
        let mut data = stereo(&sine(440.0, 2048, 1.0), &sine(660.0, 2048, 1.0));
        let original = data.clone();
        run(&mut fx, &values, &mut data, 2, &TransportInfo::default());
        assert_eq!(data, original);
    }

    #[test]
    fn test_imager_zero_width_folds_to_mono() {
        let (mut fx, mut values) = prepared(EffectKind::StereoImager, SR, 2);
        set(&mut values, &fx, "width", 0.0);
        let mut data = stereo(&sine(440.0, 1024, 1.0), &sine(660.0, 1024, 1.0));
        run(&mut fx, &values, &mut data, 2, &TransportInfo::default());
        let (left, right) = data.split_at(1024);
        for (l, r) in left.iter().zip(right) {
            assert!((l - r).abs() < 1e-6, "{} vs {}", l, r);
        }
    }

    #[test]
    fn test_imager_mono_safe_caps_width() {
        let (mut fx, mut values) = prepared(EffectKind::StereoImager, SR, 2);
        set(&mut values, &fx, "width", 3.0);
        set(&mut values, &fx, "mono_safe", 1.0);
        let mut data = stereo(&sine(440.0, 1024, 1.0), &sine(660.0, 1024, 1.0));
        let original = data.clone();
        run(&mut fx, &values, &mut data, 2, &TransportInfo::default());
        assert_eq!(data, original);
    }

    #[test]
    fn test_imager_bass_mono_cancels_anti_phase_lows() {
        let len = 48000;
        let tail = len / 2..len;

        let (mut fx, mut values) = prepared(EffectKind::StereoImager, SR, 2);
        set(&mut values, &fx, "bass_mono", 1.0);
        let mut low = stereo(&sine(50.0, len, 1.0), &sine(50.0, len, -1.0));
        run(&mut fx, &values, &mut low, 2, &TransportInfo::default());
        let low_rms = rms(&low[tail.clone()]);
        assert!(low_rms < 0.05, "anti-phase bass should fold away, rms {}", low_rms);

        let (mut fx, _) = prepared(EffectKind::StereoImager, SR, 2);
        let mut high = stereo(&sine(5000.0, len, 1.0), &sine(5000.0, len, -1.0));
        run(&mut fx, &values, &mut high, 2, &TransportInfo::default());
        let high_rms = rms(&high[tail]);
        assert!(high_rms > 0.3, "highs keep their width, rms {}", high_rms);
    }

    #[test]
    fn test_imager_ignores_mono_input() {
        let (mut fx, mut values) = prepared(EffectKind::StereoImager, SR, 1);
        set(&mut values, &fx, "width", 0.0);
        set(&mut values, &fx, "invert_mid", 1.0);
        let mut data = sine(440.0, 512, 1.0);
        let original = data.clone();
        run(&mut fx, &values, &mut data, 1, &TransportInfo::default());
        assert_eq!(data, original);
    }

    #[test]
    fn test_splitter_defaults_reconstruct() {
        let (mut fx, values) = prepared(EffectKind::BandSplitter, SR, 1);
        let input: Vec<f32> = (0..8192)
            .map(|i| 0.3 * (i as f32 * 0.01).sin() + 0.2 * (i as f32 * 0.7).sin())
            .collect();
        let mut data = input.clone();
        run(&mut fx, &values, &mut data, 1, &TransportInfo::default());
        for (i, (a, b)) in input.iter().zip(&data).enumerate() {
            assert!((a - b).abs() < 1e-4, "sample {}: {} vs {}", i, a, b);
        }
    }

    #[test]
    fn test_splitter_mute_and_solo() {
        let len = 48000;
        let tail = len / 2..len;
        let reference = rms(&sine(50.0, len, 1.0)[tail.clone()]);

        let (mut fx, mut values) = prepared(EffectKind::BandSplitter, SR, 1);
        set(&mut values, &fx, "topology", 1.0);
        set(&mut values, &fx, "band1_mute", 1.0);
        let mut data = sine(50.0, len, 1.0);
        run(&mut fx, &values, &mut data, 1, &TransportInfo::default());
        let muted = rms(&data[tail.clone()]);
        assert!(muted < reference * 0.05, "muted low band leaked: {}", muted);

        let (mut fx, mut values) = prepared(EffectKind::BandSplitter, SR, 1);
        set(&mut values, &fx, "topology", 1.0);
        set(&mut values, &fx, "band1_solo", 1.0);
        set(&mut values, &fx, "band3_mute", 1.0);
        let mut data = sine(50.0, len, 1.0);
        run(&mut fx, &values, &mut data, 1, &TransportInfo::default());
        let soloed = rms(&data[tail]);
        assert!(soloed > reference * 0.9, "soloed low band lost level: {}", soloed);
    }

    #[test]
    fn test_splitter_band_gain() {
        let len = 48000;
        let tail = len / 2..len;
        let (mut fx, mut values) = prepared(EffectKind::BandSplitter, SR, 1);
        set(&mut values, &fx, "bands", 0.0);
        set(&mut values, &fx, "topology", 1.0);
        set(&mut values, &fx, "split1_hz", 1000.0);
        set(&mut values, &fx, "band2_gain_db", -12.0);
        let mut data = sine(10000.0, len, 1.0);
        run(&mut fx, &values, &mut data, 1, &TransportInfo::default());
        let ratio = rms(&data[tail.clone()]) / rms(&sine(10000.0, len, 1.0)[tail]);
        assert!((ratio - db_to_gain(-12.0)).abs() < 0.02, "ratio {}", ratio);
    }

    #[test]
    fn test_splitter_slope_change_is_crossfaded() {
        let (mut fx, mut values) = prepared(EffectKind::BandSplitter, SR, 1);
        set(&mut values, &fx, "bands", 0.0);
        set(&mut values, &fx, "topology", 1.0);
        set(&mut values, &fx, "band2_mute", 1.0);

        let input = sine(100.0, 19200, 1.0);
        let (mut first, mut second) = (input[..9600].to_vec(), input[9600..].to_vec());
        run(&mut fx, &values, &mut first, 1, &TransportInfo::default());
        set(&mut values, &fx, "order", 2.0);
        run(&mut fx, &values, &mut second, 1, &TransportInfo::default());

        let output = [first, second].concat();
        let max_jump = output[9000..11000]
            .windows(2)
            .map(|w| (w[1] - w[0]).abs())
            .fold(0.0f32, f32::max);
        // A 100 Hz, 0.5 sine moves at most ~0.0065 per sample
        assert!(max_jump < 0.03, "slope change clicked: {}", max_jump);
        assert!(rms(&output[16800..]) > 0.25, "low band lost after change");
    }

    #[test]
    fn test_splitter_keeps_splits_ascending() {
        let mut values = crate::params::defaults(BandSplitter::PARAMS);
        values[BandSplitter::SPLIT_1_HZ] = 5000.0;
        values[BandSplitter::SPLIT_2_HZ] = 1000.0;
        let splits = BandSplitter::split_frequencies(&ParamValues::new(&values));
        assert_eq!(splits, [5000.0, 5000.0, 8000.0]);
    }
}
