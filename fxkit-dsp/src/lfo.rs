//! Low-frequency oscillators
//!
//! `PhaseAccumulator` advances by `2π·rate/sample_rate` per sample and wraps
//! into `[0, 2π)`. `Lfo` shapes that phase into a bipolar waveform.

use std::f32::consts::{PI, TAU};

/// Wrapping phase in radians
#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseAccumulator {
    phase: f32,
    increment: f32,
}

impl PhaseAccumulator {
    pub fn new(rate_hz: f32, sample_rate: f32) -> Self {
        let mut acc = Self::default();
        acc.set_rate(rate_hz, sample_rate);
        acc
    }

    /// Set the rate; negative and non-finite rates stop the accumulator
    pub fn set_rate(&mut self, rate_hz: f32, sample_rate: f32) {
        let inc = TAU * rate_hz / sample_rate;
        self.increment = if inc.is_finite() && inc > 0.0 {
            inc.min(TAU)
        } else {
            0.0
        };
    }

    pub fn increment(&self) -> f32 {
        self.increment
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    pub fn set_phase(&mut self, phase: f32) {
        self.phase = wrap_phase(phase);
    }

    /// Advance one sample, returning the phase before the step
    #[inline]
    pub fn advance(&mut self) -> f32 {
        let current = self.phase;
        self.phase += self.increment;
        if self.phase >= TAU {
            self.phase -= TAU;
        }
        current
    }

    /// Advance by `samples` steps at once
    pub fn skip(&mut self, samples: usize) {
        self.phase = wrap_phase(self.phase + self.increment * samples as f32);
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}

/// Wrap any finite phase into `[0, 2π)`
#[inline]
pub fn wrap_phase(phase: f32) -> f32 {
    if !phase.is_finite() {
        return 0.0;
    }
    let wrapped = phase.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// LFO shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Waveform {
    #[default]
    Sine,
    Triangle,
    Square,
    /// Rising ramp
    Saw,
}

impl Waveform {
    pub const NAMES: &'static [&'static str] = &["Sine", "Triangle", "Square", "Saw"];

    pub fn from_index(index: usize) -> Self {
        match index {
            0 => Self::Sine,
            1 => Self::Triangle,
            2 => Self::Square,
            _ => Self::Saw,
        }
    }

    /// Bipolar value in `[-1, 1]` at a phase in radians
    #[inline]
    pub fn evaluate(self, phase: f32) -> f32 {
        match self {
            Self::Sine => phase.sin(),
            Self::Triangle => {
                // 0 at phase 0, peaks at π/2, troughs at 3π/2
                let u = phase / TAU + 0.25;
                let tri = 1.0 - 4.0 * (u - u.floor() - 0.5).abs();
                tri.clamp(-1.0, 1.0)
            }
            Self::Square => {
                if phase < PI {
                    1.0
                } else {
                    -1.0
                }
            }
            Self::Saw => (phase / PI - 1.0).clamp(-1.0, 1.0),
        }
    }
}

/// Oscillator with a fixed phase offset
#[derive(Debug, Clone, Copy, Default)]
pub struct Lfo {
    phase: PhaseAccumulator,
    waveform: Waveform,
    offset: f32,
}

impl Lfo {
    pub fn new(rate_hz: f32, sample_rate: f32, waveform: Waveform) -> Self {
        Self {
            phase: PhaseAccumulator::new(rate_hz, sample_rate),
            waveform,
            offset: 0.0,
        }
    }

    pub fn set_rate(&mut self, rate_hz: f32, sample_rate: f32) {
        self.phase.set_rate(rate_hz, sample_rate);
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    /// Constant offset added to the accumulated phase (stereo spread)
    pub fn set_phase_offset(&mut self, offset: f32) {
        self.offset = wrap_phase(offset);
    }

    /// Bipolar sample, then advance
    #[inline]
    pub fn next(&mut self) -> f32 {
        let phase = self.phase.advance();
        self.waveform.evaluate(wrap_fast(phase + self.offset))
    }

    /// Unipolar `[0, 1]` sample, then advance
    #[inline]
    pub fn next_unipolar(&mut self) -> f32 {
        0.5 * (self.next() + 1.0)
    }

    pub fn phase(&self) -> f32 {
        self.phase.phase()
    }

    pub fn reset(&mut self) {
        self.phase.reset();
    }
}

/// Wrap a phase known to lie in `[0, 4π)`
#[inline]
fn wrap_fast(phase: f32) -> f32 {
    if phase >= TAU {
        phase - TAU
    } else {
        phase
    }
}

/// Tempo-synced note length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum NoteDivision {
    Whole,
    Half,
    #[default]
    Quarter,
    Eighth,
    Sixteenth,
    ThirtySecond,
    DottedHalf,
    DottedQuarter,
    DottedEighth,
    TripletQuarter,
    TripletEighth,
    TripletSixteenth,
}

impl NoteDivision {
    pub const ALL: [NoteDivision; 12] = [
        Self::Whole,
        Self::Half,
        Self::Quarter,
        Self::Eighth,
        Self::Sixteenth,
        Self::ThirtySecond,
        Self::DottedHalf,
        Self::DottedQuarter,
        Self::DottedEighth,
        Self::TripletQuarter,
        Self::TripletEighth,
        Self::TripletSixteenth,
    ];

    pub const NAMES: &'static [&'static str] = &[
        "1/1", "1/2", "1/4", "1/8", "1/16", "1/32", "1/2.", "1/4.", "1/8.", "1/4T", "1/8T",
        "1/16T",
    ];

    pub fn from_index(index: usize) -> Self {
        Self::ALL
            .get(index)
            .copied()
            .unwrap_or(Self::ThirtySecond)
    }

    /// Length in quarter-note beats
    pub fn beats(self) -> f32 {
        match self {
            Self::Whole => 4.0,
            Self::Half => 2.0,
            Self::Quarter => 1.0,
            Self::Eighth => 0.5,
            Self::Sixteenth => 0.25,
            Self::ThirtySecond => 0.125,
            Self::DottedHalf => 3.0,
            Self::DottedQuarter => 1.5,
            Self::DottedEighth => 0.75,
            Self::TripletQuarter => 2.0 / 3.0,
            Self::TripletEighth => 1.0 / 3.0,
            Self::TripletSixteenth => 1.0 / 6.0,
        }
    }

    /// Duration in seconds at a tempo
    pub fn seconds(self, bpm: f32) -> f32 {
        self.beats() * 60.0 / bpm.max(1.0)
    }

    /// Repetition rate in Hz at a tempo
    pub fn hz(self, bpm: f32) -> f32 {
        1.0 / self.seconds(bpm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulator_wraps() {
        let mut acc = PhaseAccumulator::new(1000.0, 48000.0);
        for _ in 0..100_000 {
            let p = acc.advance();
            assert!((0.0..TAU).contains(&p), "phase {} out of range", p);
        }
    }

    #[test]
    fn test_accumulator_period() {
        let mut acc = PhaseAccumulator::new(100.0, 48000.0);
        acc.skip(480);
        let p = acc.phase();
        assert!(p < 1e-3 || (TAU - p) < 1e-3, "one period should return to 0: {}", p);
    }

    #[test]
    fn test_invalid_rates_stop() {
        let mut acc = PhaseAccumulator::new(-5.0, 48000.0);
        acc.advance();
        assert_eq!(acc.phase(), 0.0);
        acc.set_rate(5.0, 0.0);
        assert_eq!(acc.increment(), 0.0);
    }

    #[test]
    fn test_waveform_shapes() {
        let quarter = TAU / 4.0;
        assert!((Waveform::Sine.evaluate(quarter) - 1.0).abs() < 1e-6);
        assert!(Waveform::Triangle.evaluate(0.0).abs() < 1e-6);
        assert!((Waveform::Triangle.evaluate(quarter) - 1.0).abs() < 1e-5);
        assert!((Waveform::Triangle.evaluate(3.0 * quarter) + 1.0).abs() < 1e-5);
        assert_eq!(Waveform::Square.evaluate(0.1), 1.0);
        assert_eq!(Waveform::Square.evaluate(PI + 0.1), -1.0);
        assert_eq!(Waveform::Saw.evaluate(0.0), -1.0);
        assert!(Waveform::Saw.evaluate(PI).abs() < 1e-6);
    }

    #[test]
    fn test_waveforms_bounded() {
        for w in [Waveform::Sine, Waveform::Triangle, Waveform::Square, Waveform::Saw] {
            let mut lfo = Lfo::new(3.7, 44100.0, w);
            lfo.set_phase_offset(5.0);
            for _ in 0..44100 {
                let v = lfo.next();
                assert!((-1.0..=1.0).contains(&v), "{:?}: {}", w, v);
            }
        }
    }

    #[test]
    fn test_phase_offset() {
        let mut a = Lfo::new(1.0, 1000.0, Waveform::Sine);
        let mut b = Lfo::new(1.0, 1000.0, Waveform::Sine);
        b.set_phase_offset(PI);
        for _ in 0..100 {
            assert!((a.next() + b.next()).abs() < 1e-5);
        }
    }

    #[test]
    fn test_note_division_hz() {
        assert!((NoteDivision::Quarter.hz(120.0) - 2.0).abs() < 1e-6);
        assert!((NoteDivision::Eighth.hz(120.0) - 4.0).abs() < 1e-6);
        assert!((NoteDivision::DottedEighth.seconds(120.0) - 0.375).abs() < 1e-6);
        assert!((NoteDivision::TripletQuarter.hz(90.0) - 2.25).abs() < 1e-5);
        assert_eq!(NoteDivision::NAMES.len(), NoteDivision::ALL.len());
    }
}
