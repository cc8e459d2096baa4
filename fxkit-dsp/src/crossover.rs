//! Linkwitz-Riley crossover network
//!
//! Each split point owns a low-pass and a high-pass cascade at one cutoff.
//! Splits chain: the high output of split k feeds split k+1, so N splits
//! yield N+1 bands ordered low to high.
//!
//! Two recombination topologies:
//! - [`SplitTopology::Complementary`]: the high band is the remainder
//!   `x - low`, so the bands always sum back to the input.
//! - [`SplitTopology::LinkwitzRiley`]: both bands come from their own
//!   cascades. Their sum is an all-pass of the input; every lower band is
//!   run through the all-pass of each later split so all bands share phase.
//!
//! Filter state lives in flat vectors indexed by (channel, split, stage).

use crate::biquad::BiquadState;
use crate::coefficients::{self, FilterCoefficients};
use crate::math::{clamp_frequency, sanitize_sample_rate};

/// Maximum number of bands a crossover can produce
pub const MAX_BANDS: usize = 8;

/// Maximum biquads per cascade side (LR8)
const MAX_STAGES: usize = 4;

/// Maximum all-pass sections compensating one split (LR8)
const MAX_ALL_PASS: usize = 2;

const BUTTERWORTH_Q: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// 4th-order Butterworth section Qs
const BUTTERWORTH4_Q1: f32 = 0.541_196_1;
const BUTTERWORTH4_Q2: f32 = 1.306_563;

/// Crossover slope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum CrossoverOrder {
    /// 12 dB/oct (LR2)
    Lr12,
    /// 24 dB/oct (LR4)
    #[default]
    Lr24,
    /// 48 dB/oct (LR8)
    Lr48,
}

impl CrossoverOrder {
    /// Nearest supported order for a slope in dB/oct
    pub fn from_db_per_octave(db: u32) -> Self {
        match db {
            0..=18 => Self::Lr12,
            19..=36 => Self::Lr24,
            _ => Self::Lr48,
        }
    }

    /// Selection index as used by choice parameters
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => Self::Lr12,
            1 => Self::Lr24,
            _ => Self::Lr48,
        }
    }

    pub fn db_per_octave(self) -> u32 {
        match self {
            Self::Lr12 => 12,
            Self::Lr24 => 24,
            Self::Lr48 => 48,
        }
    }

    /// Biquads in each of the low and high cascades
    pub fn stages_per_side(self) -> usize {
        match self {
            Self::Lr12 => 1,
            Self::Lr24 => 2,
            Self::Lr48 => 4,
        }
    }

    /// Biquads per split point across both cascades (`order / 6`)
    pub fn total_stages(self) -> usize {
        self.stages_per_side() * 2
    }

    fn all_pass_stages(self) -> usize {
        match self {
            Self::Lr12 | Self::Lr24 => 1,
            Self::Lr48 => 2,
        }
    }

    fn stage_q(self, stage: usize) -> f32 {
        match self {
            Self::Lr12 => 0.5,
            Self::Lr24 => BUTTERWORTH_Q,
            Self::Lr48 => {
                if stage % 2 == 0 {
                    BUTTERWORTH4_Q1
                } else {
                    BUTTERWORTH4_Q2
                }
            }
        }
    }
}

/// How the bands of a split are derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum SplitTopology {
    /// high = input - low; bands sum exactly to the input
    #[default]
    Complementary,
    /// Independent LR cascades with all-pass phase compensation
    LinkwitzRiley,
}

/// Coefficients of one split point
#[derive(Debug, Clone, Copy)]
pub struct SplitPoint {
    frequency: f32,
    order: CrossoverOrder,
    low: [FilterCoefficients; MAX_STAGES],
    high: [FilterCoefficients; MAX_STAGES],
    all_pass: [FilterCoefficients; MAX_ALL_PASS],
}

impl SplitPoint {
    pub fn design(sample_rate: f32, frequency: f32, order: CrossoverOrder) -> Self {
        let frequency = clamp_frequency(frequency, sample_rate);
        let mut low = [FilterCoefficients::IDENTITY; MAX_STAGES];
        let mut high = [FilterCoefficients::IDENTITY; MAX_STAGES];
        for stage in 0..order.stages_per_side() {
            let q = order.stage_q(stage);
            low[stage] = coefficients::low_pass(sample_rate, frequency, q);
            high[stage] = coefficients::high_pass(sample_rate, frequency, q);
        }

        let mut all_pass = [FilterCoefficients::IDENTITY; MAX_ALL_PASS];
        match order {
            CrossoverOrder::Lr12 => all_pass[0] = coefficients::all_pass_1(sample_rate, frequency),
            CrossoverOrder::Lr24 => {
                all_pass[0] = coefficients::all_pass(sample_rate, frequency, BUTTERWORTH_Q)
            }
            CrossoverOrder::Lr48 => {
                all_pass[0] = coefficients::all_pass(sample_rate, frequency, BUTTERWORTH4_Q1);
                all_pass[1] = coefficients::all_pass(sample_rate, frequency, BUTTERWORTH4_Q2);
            }
        }

        Self {
            frequency,
            order,
            low,
            high,
            all_pass,
        }
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn order(&self) -> CrossoverOrder {
        self.order
    }

    pub fn low_stages(&self) -> &[FilterCoefficients] {
        &self.low[..self.order.stages_per_side()]
    }

    pub fn high_stages(&self) -> &[FilterCoefficients] {
        &self.high[..self.order.stages_per_side()]
    }

    /// All-pass equivalent of `low + high` for this split
    pub fn all_pass_stages(&self) -> &[FilterCoefficients] {
        &self.all_pass[..self.order.all_pass_stages()]
    }

    /// LR2 sums to an all-pass only with the high band inverted
    fn high_sign(&self) -> f32 {
        if self.order == CrossoverOrder::Lr12 {
            -1.0
        } else {
            1.0
        }
    }
}

#[inline]
fn run_cascade(states: &mut [BiquadState], coeffs: &[FilterCoefficients], input: f32) -> f32 {
    let mut x = input;
    for (state, c) in states.iter_mut().zip(coeffs.iter()) {
        x = state.process(x, c);
    }
    x
}

/// N-band crossover for a fixed channel count
#[derive(Debug, Clone)]
pub struct Crossover {
    sample_rate: f32,
    order: CrossoverOrder,
    topology: SplitTopology,
    channels: usize,
    splits: Vec<SplitPoint>,
    low_states: Vec<BiquadState>,
    high_states: Vec<BiquadState>,
    /// [channel][band][later split][section]
    comp_states: Vec<BiquadState>,
}

impl Crossover {
    /// Build a crossover; frequencies are sorted and capped at `MAX_BANDS - 1`
    pub fn new(
        sample_rate: f32,
        order: CrossoverOrder,
        topology: SplitTopology,
        frequencies: &[f32],
        channels: usize,
    ) -> Self {
        let sample_rate = sanitize_sample_rate(sample_rate);
        let mut sorted: Vec<f32> = frequencies
            .iter()
            .copied()
            .take(MAX_BANDS - 1)
            .map(|f| clamp_frequency(f, sample_rate))
            .collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let splits = sorted
            .iter()
            .map(|&f| SplitPoint::design(sample_rate, f, order))
            .collect();

        let mut crossover = Self {
            sample_rate,
            order,
            topology,
            channels,
            splits,
            low_states: Vec::new(),
            high_states: Vec::new(),
            comp_states: Vec::new(),
        };
        crossover.allocate();
        crossover
    }

    fn allocate(&mut self) {
        let n = self.splits.len();
        let per_side = self.channels * n * MAX_STAGES;
        self.low_states.clear();
        self.low_states.resize(per_side, BiquadState::default());
        self.high_states.clear();
        self.high_states.resize(per_side, BiquadState::default());
        self.comp_states.clear();
        self.comp_states
            .resize(self.channels * n * n * MAX_ALL_PASS, BiquadState::default());
    }

    /// Re-derive every split for a new sample rate and channel count, clearing state
    pub fn prepare(&mut self, sample_rate: f32, channels: usize) {
        self.sample_rate = sanitize_sample_rate(sample_rate);
        self.channels = channels;
        self.redesign();
        self.allocate();
    }

    /// Change slope; clears all band state
    ///
    /// Does not allocate, but the cleared filters restart from silence.
    /// Mid-stream callers should crossfade from a [`Crossover::copy_from`]
    /// snapshot of the previous setup.
    pub fn set_order(&mut self, order: CrossoverOrder) {
        if order != self.order {
            self.order = order;
            self.redesign();
            self.allocate();
        }
    }

    pub fn set_topology(&mut self, topology: SplitTopology) {
        if topology != self.topology {
            self.topology = topology;
            self.reset();
        }
    }

    /// Move one split; coefficients only, state is kept
    pub fn set_frequency(&mut self, split: usize, frequency: f32) {
        let (sample_rate, order) = (self.sample_rate, self.order);
        if let Some(point) = self.splits.get_mut(split) {
            let frequency = clamp_frequency(frequency, sample_rate);
            if frequency != point.frequency {
                *point = SplitPoint::design(sample_rate, frequency, order);
            }
        }
    }

    fn redesign(&mut self) {
        for point in &mut self.splits {
            *point = SplitPoint::design(self.sample_rate, point.frequency, self.order);
        }
    }

    pub fn order(&self) -> CrossoverOrder {
        self.order
    }

    pub fn topology(&self) -> SplitTopology {
        self.topology
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn bands(&self) -> usize {
        self.splits.len() + 1
    }

    pub fn splits(&self) -> &[SplitPoint] {
        &self.splits
    }

    /// Split one sample of one channel into `bands()` outputs
    ///
    /// `out` must hold at least `bands()` values; extra slots are left
    /// untouched. Out-of-range channels pass the input through as band 0.
    #[inline]
    pub fn process(&mut self, channel: usize, input: f32, out: &mut [f32]) {
        let n = self.splits.len();
        if out.len() <= n {
            return;
        }
        if channel >= self.channels {
            out[0] = input;
            for band in out.iter_mut().take(n + 1).skip(1) {
                *band = 0.0;
            }
            return;
        }

        let mut rest = input;
        for (s, point) in self.splits.iter().enumerate() {
            let base = (channel * n + s) * MAX_STAGES;
            let low = run_cascade(
                &mut self.low_states[base..base + MAX_STAGES],
                point.low_stages(),
                rest,
            );
            rest = match self.topology {
                SplitTopology::Complementary => rest - low,
                SplitTopology::LinkwitzRiley => {
                    point.high_sign()
                        * run_cascade(
                            &mut self.high_states[base..base + MAX_STAGES],
                            point.high_stages(),
                            rest,
                        )
                }
            };
            out[s] = low;
        }
        out[n] = rest;

        if self.topology == SplitTopology::LinkwitzRiley {
            for band in 0..n {
                for later in band + 1..n {
                    let base = ((channel * n + band) * n + later) * MAX_ALL_PASS;
                    out[band] = run_cascade(
                        &mut self.comp_states[base..base + MAX_ALL_PASS],
                        self.splits[later].all_pass_stages(),
                        out[band],
                    );
                }
            }
        }
    }

    /// Take over another crossover's design and filter state
    ///
    /// Reuses this crossover's buffers, so it does not allocate when both
    /// were built with the same split and channel counts.
    pub fn copy_from(&mut self, other: &Crossover) {
        self.sample_rate = other.sample_rate;
        self.order = other.order;
        self.topology = other.topology;
        self.channels = other.channels;
        self.splits.clone_from(&other.splits);
        self.low_states.clone_from(&other.low_states);
        self.high_states.clone_from(&other.high_states);
        self.comp_states.clone_from(&other.comp_states);
    }

    pub fn reset(&mut self) {
        for s in self
            .low_states
            .iter_mut()
            .chain(self.high_states.iter_mut())
            .chain(self.comp_states.iter_mut())
        {
            s.reset();
        }
    }

    pub fn flush_denormals(&mut self) {
        for s in self
            .low_states
            .iter_mut()
            .chain(self.high_states.iter_mut())
            .chain(self.comp_states.iter_mut())
        {
            s.flush_denormals();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biquad::Biquad;
    use crate::noise::Xorshift;

    fn white_noise(len: usize) -> Vec<f32> {
        let mut rng = Xorshift::new(0x5eed);
        (0..len).map(|_| rng.next_bipolar()).collect()
    }

    fn rms(x: &[f32]) -> f32 {
        (x.iter().map(|v| v * v).sum::<f32>() / x.len() as f32).sqrt()
    }

    #[test]
    fn test_stage_counts() {
        assert_eq!(CrossoverOrder::Lr12.total_stages(), 2);
        assert_eq!(CrossoverOrder::Lr24.total_stages(), 4);
        assert_eq!(CrossoverOrder::Lr48.total_stages(), 8);
        for order in [CrossoverOrder::Lr12, CrossoverOrder::Lr24, CrossoverOrder::Lr48] {
            assert_eq!(order.total_stages() as u32, order.db_per_octave() / 6);
            assert_eq!(CrossoverOrder::from_db_per_octave(order.db_per_octave()), order);
        }
    }

    #[test]
    fn test_two_band_reconstruction() {
        let input = white_noise(48000);
        let mut xo = Crossover::new(
            48000.0,
            CrossoverOrder::Lr24,
            SplitTopology::Complementary,
            &[1000.0],
            1,
        );
        let mut bands = [0.0f32; 2];
        let residual: Vec<f32> = input
            .iter()
            .map(|&x| {
                xo.process(0, x, &mut bands);
                bands[0] + bands[1] - x
            })
            .collect();

        let residual_db = 20.0 * rms(&residual).max(1e-12).log10();
        assert!(residual_db < -60.0, "residual {} dBFS", residual_db);
    }

    #[test]
    fn test_reconstruction_many_bands_all_orders() {
        let input = white_noise(8192);
        for order in [CrossoverOrder::Lr12, CrossoverOrder::Lr24, CrossoverOrder::Lr48] {
            for sr in [44100.0, 96000.0] {
                let mut xo = Crossover::new(
                    sr,
                    order,
                    SplitTopology::Complementary,
                    &[8000.0, 120.0, 900.0, 3000.0],
                    2,
                );
                assert_eq!(xo.bands(), 5);
                let mut bands = [0.0f32; MAX_BANDS];
                for &x in &input {
                    for ch in 0..2 {
                        xo.process(ch, x, &mut bands);
                        let sum: f32 = bands[..5].iter().sum();
                        assert!((sum - x).abs() < 1e-4, "{:?} sr={}: {} vs {}", order, sr, sum, x);
                    }
                }
            }
        }
    }

    #[test]
    fn test_low_band_attenuates_highs() {
        let sr = 48000.0;
        let mut xo = Crossover::new(sr, CrossoverOrder::Lr24, SplitTopology::Complementary, &[500.0], 1);
        let mut bands = [0.0f32; 2];
        let mut low_energy = 0.0f32;
        let mut high_energy = 0.0f32;
        for i in 0..48000 {
            let x = (2.0 * std::f32::consts::PI * 8000.0 * i as f32 / sr).sin();
            xo.process(0, x, &mut bands);
            if i > 4800 {
                low_energy += bands[0] * bands[0];
                high_energy += bands[1] * bands[1];
            }
        }
        assert!(low_energy < high_energy * 1e-3, "low={} high={}", low_energy, high_energy);
    }

    #[test]
    fn test_linkwitz_riley_sums_to_all_pass_chain() {
        let input = white_noise(16384);
        let sr = 48000.0;
        let freqs = [250.0, 2500.0];
        for order in [CrossoverOrder::Lr12, CrossoverOrder::Lr24, CrossoverOrder::Lr48] {
            let mut xo = Crossover::new(sr, order, SplitTopology::LinkwitzRiley, &freqs, 1);

            let mut reference: Vec<Biquad> = freqs
                .iter()
                .flat_map(|&f| {
                    SplitPoint::design(sr, f, order)
                        .all_pass_stages()
                        .iter()
                        .map(|&c| Biquad::new(c))
                        .collect::<Vec<_>>()
                })
                .collect();

            let mut bands = [0.0f32; 3];
            let mut err = 0.0f32;
            for &x in &input {
                xo.process(0, x, &mut bands);
                let sum: f32 = bands.iter().sum();
                let expected = reference.iter_mut().fold(x, |acc, bq| bq.process(acc));
                err = err.max((sum - expected).abs());
            }
            assert!(err < 1e-3, "{:?}: max error {}", order, err);
        }
    }

    #[test]
    fn test_copy_from_continues_identically() {
        let input = white_noise(2048);
        let mut a = Crossover::new(
            48000.0,
            CrossoverOrder::Lr24,
            SplitTopology::LinkwitzRiley,
            &[500.0, 4000.0],
            1,
        );
        let mut b = Crossover::new(
            48000.0,
            CrossoverOrder::Lr12,
            SplitTopology::Complementary,
            &[100.0, 200.0],
            1,
        );
        let mut out_a = [0.0f32; MAX_BANDS];
        let mut out_b = [0.0f32; MAX_BANDS];
        for &x in &input[..1024] {
            a.process(0, x, &mut out_a);
        }
        b.copy_from(&a);
        assert_eq!(b.order(), CrossoverOrder::Lr24);
        assert_eq!(b.topology(), SplitTopology::LinkwitzRiley);
        for &x in &input[1024..] {
            a.process(0, x, &mut out_a);
            b.process(0, x, &mut out_b);
            assert_eq!(out_a[..3], out_b[..3]);
        }
    }

    #[test]
    fn test_set_frequency_keeps_band_count() {
        let mut xo = Crossover::new(48000.0, CrossoverOrder::Lr24, SplitTopology::Complementary, &[200.0, 2000.0], 1);
        xo.set_frequency(1, 4000.0);
        assert_eq!(xo.splits()[1].frequency(), 4000.0);
        xo.set_frequency(7, 100.0);
        assert_eq!(xo.bands(), 3);
    }

    #[test]
    fn test_out_of_range_channel_passthrough() {
        let mut xo = Crossover::new(48000.0, CrossoverOrder::Lr24, SplitTopology::Complementary, &[1000.0], 1);
        let mut bands = [9.0f32; 2];
        xo.process(4, 0.5, &mut bands);
        assert_eq!(bands, [0.5, 0.0]);
    }

    #[test]
    fn test_band_count_capped() {
        let freqs: Vec<f32> = (1..20).map(|i| i as f32 * 500.0).collect();
        let xo = Crossover::new(48000.0, CrossoverOrder::Lr12, SplitTopology::Complementary, &freqs, 1);
        assert_eq!(xo.bands(), MAX_BANDS);
    }
}
