//! Biquad filter stages
//!
//! `BiquadState` holds the two DF-II-transposed delay registers of one
//! (channel, role) slot. Coefficients live apart from state so one set of
//! taps can drive every channel of a role. `FilterBank` stores all slots of
//! a multi-role filter in a flat arena indexed `channel * roles + role`.

use crate::coefficients::FilterCoefficients;
use crate::math::flush_denormal;

/// Per-channel biquad registers
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct BiquadState {
    z1: f32,
    z2: f32,
}

impl BiquadState {
    /// Process one sample (direct form II transposed)
    #[inline]
    pub fn process(&mut self, input: f32, c: &FilterCoefficients) -> f32 {
        let output = c.b0 * input + self.z1;
        self.z1 = c.b1 * input - c.a1 * output + self.z2;
        self.z2 = c.b2 * input - c.a2 * output;
        output
    }

    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }

    /// Zero registers that decayed into the denormal range
    #[inline]
    pub fn flush_denormals(&mut self) {
        self.z1 = flush_denormal(self.z1);
        self.z2 = flush_denormal(self.z2);
    }

    /// True when both registers are zero
    pub fn is_cleared(&self) -> bool {
        self.z1 == 0.0 && self.z2 == 0.0
    }
}

/// A single biquad: coefficients plus one state
#[derive(Debug, Default, Clone, Copy)]
pub struct Biquad {
    coeffs: FilterCoefficients,
    state: BiquadState,
}

impl Biquad {
    pub fn new(coeffs: FilterCoefficients) -> Self {
        Self {
            coeffs,
            state: BiquadState::default(),
        }
    }

    /// Swap coefficients, keeping state
    pub fn set_coefficients(&mut self, coeffs: FilterCoefficients) {
        self.coeffs = coeffs;
    }

    pub fn coefficients(&self) -> &FilterCoefficients {
        &self.coeffs
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.state.process(input, &self.coeffs)
    }

    pub fn reset(&mut self) {
        self.state.reset();
    }

    pub fn flush_denormals(&mut self) {
        self.state.flush_denormals();
    }
}

/// Multi-role, multi-channel biquad storage
///
/// Roles run in index order in [`FilterBank::process_chain`]; that order is
/// fixed for the lifetime of the bank.
#[derive(Debug, Clone)]
pub struct FilterBank {
    roles: usize,
    channels: usize,
    coeffs: Vec<FilterCoefficients>,
    bypassed: Vec<bool>,
    states: Vec<BiquadState>,
}

impl FilterBank {
    /// Create a bank with every role set to identity
    pub fn new(channels: usize, roles: usize) -> Self {
        Self {
            roles,
            channels,
            coeffs: vec![FilterCoefficients::IDENTITY; roles],
            bypassed: vec![false; roles],
            states: vec![BiquadState::default(); channels * roles],
        }
    }

    /// Resize for a new channel count (prepare-time only), clearing state
    pub fn resize(&mut self, channels: usize) {
        self.channels = channels;
        self.states.clear();
        self.states
            .resize(channels * self.roles, BiquadState::default());
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn roles(&self) -> usize {
        self.roles
    }

    /// Set the taps shared by every channel of a role
    pub fn set_role(&mut self, role: usize, coeffs: FilterCoefficients) {
        if let Some(slot) = self.coeffs.get_mut(role) {
            *slot = coeffs;
        }
    }

    /// Skip a role in `process_chain` (state is held, not advanced)
    pub fn set_bypassed(&mut self, role: usize, bypassed: bool) {
        if let Some(slot) = self.bypassed.get_mut(role) {
            *slot = bypassed;
        }
    }

    pub fn coefficients(&self, role: usize) -> Option<&FilterCoefficients> {
        self.coeffs.get(role)
    }

    #[inline]
    fn index(&self, channel: usize, role: usize) -> usize {
        channel * self.roles + role
    }

    /// Run one role on one channel
    #[inline]
    pub fn process(&mut self, channel: usize, role: usize, input: f32) -> f32 {
        if channel >= self.channels || role >= self.roles {
            return input;
        }
        let idx = self.index(channel, role);
        self.states[idx].process(input, &self.coeffs[role])
    }

    /// Run every non-bypassed role on one channel in role order
    #[inline]
    pub fn process_chain(&mut self, channel: usize, input: f32) -> f32 {
        if channel >= self.channels {
            return input;
        }
        let base = channel * self.roles;
        let states = &mut self.states[base..base + self.roles];
        let mut x = input;
        for ((state, coeffs), &bypassed) in states
            .iter_mut()
            .zip(self.coeffs.iter())
            .zip(self.bypassed.iter())
        {
            if !bypassed {
                x = state.process(x, coeffs);
            }
        }
        x
    }

    /// Run the full chain over a buffer of one channel
    pub fn process_block(&mut self, channel: usize, samples: &mut [f32]) {
        for s in samples.iter_mut() {
            *s = self.process_chain(channel, *s);
        }
    }

    pub fn reset(&mut self) {
        for s in &mut self.states {
            s.reset();
        }
    }

    pub fn flush_denormals(&mut self) {
        for s in &mut self.states {
            s.flush_denormals();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coefficients::{self, FilterShape};

    fn impulse_response(coeffs: FilterCoefficients, len: usize) -> Vec<f32> {
        let mut biquad = Biquad::new(coeffs);
        (0..len)
            .map(|i| biquad.process(if i == 0 { 1.0 } else { 0.0 }))
            .collect()
    }

    #[test]
    fn test_identity_passthrough() {
        let mut biquad = Biquad::default();
        for x in [0.5, -0.25, 1.0, 0.0] {
            assert_eq!(biquad.process(x), x);
        }
    }

    #[test]
    fn test_matches_direct_form_one() {
        let c = coefficients::peak(48000.0, 1000.0, 1.4, 6.0);
        let input: Vec<f32> = (0..256).map(|i| (i as f32 * 0.37).sin()).collect();

        let mut state = BiquadState::default();
        let (mut x1, mut x2, mut y1, mut y2) = (0.0f32, 0.0f32, 0.0f32, 0.0f32);

        for &x in &input {
            let df2t = state.process(x, &c);
            let df1 = c.b0 * x + c.b1 * x1 + c.b2 * x2 - c.a1 * y1 - c.a2 * y2;
            x2 = x1;
            x1 = x;
            y2 = y1;
            y1 = df1;
            assert!((df2t - df1).abs() < 1e-4, "df2t={} df1={}", df2t, df1);
        }
    }

    #[test]
    fn test_lowpass_dc_gain() {
        let c = coefficients::low_pass(48000.0, 500.0, 0.707);
        let mut biquad = Biquad::new(c);
        let mut y = 0.0;
        for _ in 0..48000 {
            y = biquad.process(1.0);
        }
        assert!((y - 1.0).abs() < 1e-3, "DC gain {}", y);
    }

    #[test]
    fn test_impulse_stability_sweep() {
        let shapes = [
            FilterShape::LowPass,
            FilterShape::HighPass,
            FilterShape::BandPass,
            FilterShape::Notch,
            FilterShape::Peak,
            FilterShape::LowShelf,
            FilterShape::HighShelf,
            FilterShape::AllPass,
        ];
        let freqs = [1.0, 20.0, 200.0, 1000.0, 5000.0, 15000.0, 21000.0, 1.0e5];
        let qs = [0.05, 0.5, 0.707, 2.0, 10.0, 40.0];

        for sr in [44100.0f32, 48000.0, 96000.0] {
            for &shape in &shapes {
                for &f in &freqs {
                    for &q in &qs {
                        let c = coefficients::design(shape, sr, f, q, 12.0);
                        let response = impulse_response(c, 10_000);
                        for &y in &response {
                            assert!(y.is_finite(), "{:?} sr={} f={} q={}", shape, sr, f, q);
                            assert!(
                                y.abs() < 1.0e3,
                                "{:?} unbounded sr={} f={} q={}: {}",
                                shape,
                                sr,
                                f,
                                q,
                                y
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_reset_clears_state() {
        let mut biquad = Biquad::new(coefficients::low_pass(48000.0, 1000.0, 0.707));
        biquad.process(1.0);
        biquad.reset();
        assert_eq!(biquad.process(0.0), 0.0);
    }

    #[test]
    fn test_bank_channels_are_independent() {
        let mut bank = FilterBank::new(2, 1);
        bank.set_role(0, coefficients::low_pass(48000.0, 1000.0, 0.707));

        // Excite channel 0 only
        bank.process(0, 0, 1.0);
        for _ in 0..10 {
            assert_eq!(bank.process(1, 0, 0.0), 0.0);
        }
    }

    #[test]
    fn test_bank_chain_order_and_bypass() {
        let mut bank = FilterBank::new(1, 2);
        bank.set_role(0, FilterCoefficients { b0: 2.0, ..FilterCoefficients::IDENTITY });
        bank.set_role(1, FilterCoefficients { b0: 0.25, ..FilterCoefficients::IDENTITY });
        assert_eq!(bank.process_chain(0, 1.0), 0.5);

        bank.set_bypassed(1, true);
        assert_eq!(bank.process_chain(0, 1.0), 2.0);
    }

    #[test]
    fn test_bank_out_of_range_channel_passthrough() {
        let mut bank = FilterBank::new(1, 1);
        bank.set_role(0, FilterCoefficients { b0: 0.5, ..FilterCoefficients::IDENTITY });
        assert_eq!(bank.process_chain(3, 1.0), 1.0);
        assert_eq!(bank.process(3, 0, 1.0), 1.0);
    }

    #[test]
    fn test_flush_denormals() {
        let mut bank = FilterBank::new(1, 1);
        bank.set_role(0, coefficients::low_pass(48000.0, 100.0, 0.707));
        bank.process(0, 0, 1e-30);
        bank.flush_denormals();
        assert!(bank.states[0].is_cleared());
    }
}
