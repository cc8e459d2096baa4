//! Modulated delay building blocks
//!
//! `ChorusVoices` runs N read heads over one delay line, each swept by the
//! same LFO at a phase offset of `2π·v/N`. `FeedbackDelay` recirculates its
//! output into its input with a clamped feedback gain.

use std::f32::consts::TAU;

use crate::delay_line::DelayLine;
use crate::lfo::{wrap_phase, PhaseAccumulator};

/// Feedback gain bound for every recirculating path
///
/// The bound itself is reachable: loop gain 0.95 still decays, so the clamp
/// is inclusive.
pub const MAX_FEEDBACK: f32 = 0.95;

/// Upper bound on chorus voices
pub const MAX_VOICES: usize = 8;

/// Clamp a feedback amount to `[-MAX_FEEDBACK, MAX_FEEDBACK]`
#[inline]
pub fn clamp_feedback(feedback: f32) -> f32 {
    if feedback.is_nan() {
        0.0
    } else {
        feedback.clamp(-MAX_FEEDBACK, MAX_FEEDBACK)
    }
}

/// Multi-voice modulated delay
#[derive(Debug, Clone)]
pub struct ChorusVoices {
    line: DelayLine,
    lfo: PhaseAccumulator,
    voices: usize,
    base_delay: f32,
    depth: f32,
    /// Added to every voice's phase (per-channel stereo spread)
    spread: f32,
}

impl ChorusVoices {
    pub fn new(max_delay_samples: usize, voices: usize) -> Self {
        Self {
            line: DelayLine::new(max_delay_samples),
            lfo: PhaseAccumulator::default(),
            voices: voices.clamp(1, MAX_VOICES),
            base_delay: 1.0,
            depth: 0.0,
            spread: 0.0,
        }
    }

    /// Reallocate for a new maximum delay (prepare-time only)
    pub fn resize(&mut self, max_delay_samples: usize) {
        self.line.resize(max_delay_samples);
        self.lfo.reset();
    }

    pub fn set_voices(&mut self, voices: usize) {
        self.voices = voices.clamp(1, MAX_VOICES);
    }

    pub fn voices(&self) -> usize {
        self.voices
    }

    /// Centre delay in samples
    pub fn set_base_delay(&mut self, samples: f32) {
        self.base_delay = samples.clamp(1.0, self.line.max_delay() as f32);
    }

    /// Sweep depth in samples either side of the base delay
    pub fn set_depth(&mut self, samples: f32) {
        self.depth = samples.max(0.0);
    }

    pub fn set_rate(&mut self, rate_hz: f32, sample_rate: f32) {
        self.lfo.set_rate(rate_hz, sample_rate);
    }

    pub fn set_spread(&mut self, phase: f32) {
        self.spread = wrap_phase(phase);
    }

    /// Delay of one voice at the current LFO phase
    #[inline]
    fn voice_delay(&self, voice: usize) -> f32 {
        let phase = self.lfo.phase() + self.spread + TAU * voice as f32 / self.voices as f32;
        (self.base_delay + self.depth * phase.sin()).clamp(1.0, self.line.max_delay() as f32)
    }

    /// Push one sample and return the averaged wet output
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.line.push_sample(input);
        let mut sum = 0.0;
        for v in 0..self.voices {
            sum += self.line.read_at(self.voice_delay(v));
        }
        self.lfo.advance();
        sum / self.voices as f32
    }

    pub fn reset(&mut self) {
        self.line.clear();
        self.lfo.reset();
    }
}

/// Delay with a clamped feedback path
#[derive(Debug, Clone)]
pub struct FeedbackDelay {
    line: DelayLine,
    delay: f32,
    feedback: f32,
}

impl FeedbackDelay {
    pub fn new(max_delay_samples: usize) -> Self {
        Self {
            line: DelayLine::new(max_delay_samples),
            delay: 1.0,
            feedback: 0.0,
        }
    }

    pub fn resize(&mut self, max_delay_samples: usize) {
        self.line.resize(max_delay_samples);
        self.delay = self.delay.clamp(1.0, self.line.max_delay() as f32);
    }

    pub fn max_delay(&self) -> usize {
        self.line.max_delay()
    }

    /// Delay in samples, clamped to `[1, max_delay]`
    #[inline]
    pub fn set_delay(&mut self, samples: f32) {
        self.delay = if samples.is_nan() {
            1.0
        } else {
            samples.clamp(1.0, self.line.max_delay() as f32)
        };
    }

    pub fn delay(&self) -> f32 {
        self.delay
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = clamp_feedback(feedback);
    }

    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    /// Delayed output for the sample about to be written
    #[inline]
    pub fn read(&self) -> f32 {
        self.line.read_ahead_of_push(self.delay)
    }

    /// Write a sample into the line without applying feedback
    #[inline]
    pub fn write(&mut self, input: f32) {
        self.line.push_sample(input);
    }

    /// `input_to_delay = dry + feedback·delayed`; returns `delayed`
    #[inline]
    pub fn process(&mut self, dry: f32) -> f32 {
        let delayed = self.read();
        self.write(dry + self.feedback * delayed);
        delayed
    }

    /// As [`FeedbackDelay::process`], shaping the recirculated signal first
    #[inline]
    pub fn process_with<F>(&mut self, dry: f32, mut shape: F) -> f32
    where
        F: FnMut(f32) -> f32,
    {
        let delayed = self.read();
        self.write(dry + self.feedback * shape(delayed));
        delayed
    }

    pub fn reset(&mut self) {
        self.line.clear();
    }
}
