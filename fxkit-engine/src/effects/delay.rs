//! Echo effects: tape echo and tempo-synced delay

use std::f32::consts::FRAC_1_SQRT_2;

use fxkit_dsp::coefficients::low_pass;
use fxkit_dsp::math::{flush_denormal, ms_to_samples, DEFAULT_SAMPLE_RATE};
use fxkit_dsp::{Biquad, FeedbackDelay, Lfo, NoteDivision, SmoothedValue, Waveform, Xorshift};

use crate::config::ProcessSpec;
use crate::params::{ParamSpec, ParamValues, ParamWatch};
use crate::processor::{AudioBlock, Processor};
use crate::transport::TransportInfo;

/// Glide time for delay-time changes
const TIME_GLIDE_MS: f32 = 50.0;

#[derive(Debug, Clone)]
struct TapeChannel {
    line: FeedbackDelay,
    wow: Lfo,
    flutter: Lfo,
    rng: Xorshift,
    drift: f32,
    tone: Biquad,
    time: SmoothedValue,
}

/// Tape-style echo
///
/// The delay time wobbles with a slow wow LFO, a faster flutter LFO and a
/// leaky random walk. Repeats darken through a low-pass in the feedback path.
#[derive(Debug, Clone)]
pub struct TapeEcho {
    sample_rate: f32,
    channels: Vec<TapeChannel>,
    tone_watch: ParamWatch<1>,
}

impl Default for TapeEcho {
    fn default() -> Self {
        Self::new()
    }
}

impl TapeEcho {
    pub const TIME_MS: usize = 0;
    pub const FEEDBACK: usize = 1;
    pub const WOW: usize = 2;
    pub const FLUTTER: usize = 3;
    pub const DRIFT: usize = 4;
    pub const TONE_HZ: usize = 5;

    pub const PARAMS: &'static [ParamSpec] = &[
        ParamSpec::float("time_ms", "Time", 20.0, 1000.0, 350.0),
        ParamSpec::float("feedback", "Feedback", 0.0, 0.95, 0.45),
        ParamSpec::float("wow", "Wow", 0.0, 1.0, 0.3),
        ParamSpec::float("flutter", "Flutter", 0.0, 1.0, 0.2),
        ParamSpec::float("drift", "Drift", 0.0, 1.0, 0.2),
        ParamSpec::float("tone_hz", "Tone", 500.0, 12000.0, 3500.0),
    ];

    const WOW_HZ: f32 = 0.8;
    const FLUTTER_HZ: f32 = 8.0;
    /// Full-scale modulation depths, milliseconds
    const WOW_MS: f32 = 2.5;
    const FLUTTER_MS: f32 = 0.3;
    const DRIFT_MS: f32 = 2.0;
    const DRIFT_STEP: f32 = 0.0005;
    const DRIFT_LEAK: f32 = 0.9999;
    const MAX_DELAY_MS: f32 = 1000.0 + Self::WOW_MS + Self::FLUTTER_MS + Self::DRIFT_MS + 1.0;

    pub fn new() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: Vec::new(),
            tone_watch: ParamWatch::new(),
        }
    }
}

impl Processor for TapeEcho {
    fn name(&self) -> &'static str {
        "Tape Echo"
    }

    fn params(&self) -> &'static [ParamSpec] {
        Self::PARAMS
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        let sr = spec.sample_rate;
        self.sample_rate = sr;
        let max = ms_to_samples(Self::MAX_DELAY_MS, sr).ceil() as usize;
        let initial = ms_to_samples(Self::PARAMS[Self::TIME_MS].default, sr);

        self.channels = (0..spec.channels)
            .map(|c| {
                let mut flutter = Lfo::new(Self::FLUTTER_HZ, sr, Waveform::Sine);
                // Channels wobble out of step
                flutter.set_phase_offset(1.3 * c as f32);
                let mut time = SmoothedValue::new(initial);
                time.reset(sr, TIME_GLIDE_MS);
                TapeChannel {
                    line: FeedbackDelay::new(max),
                    wow: Lfo::new(Self::WOW_HZ, sr, Waveform::Sine),
                    flutter,
                    rng: Xorshift::new(0x7A9E_0000 + c as u64),
                    drift: 0.0,
                    tone: Biquad::default(),
                    time,
                }
            })
            .collect();
        self.tone_watch.invalidate();
    }

    fn reset(&mut self) {
        for ch in &mut self.channels {
            ch.line.reset();
            ch.wow.reset();
            ch.flutter.reset();
            ch.drift = 0.0;
            ch.tone.reset();
        }
    }

    fn process(&mut self, block: &mut AudioBlock<'_>, params: &ParamValues<'_>, _: &TransportInfo) {
        let sr = self.sample_rate;
        let time = ms_to_samples(params.get(Self::TIME_MS), sr);
        let feedback = params.get(Self::FEEDBACK);
        let wow_depth = ms_to_samples(params.get(Self::WOW) * Self::WOW_MS, sr);
        let flutter_depth = ms_to_samples(params.get(Self::FLUTTER) * Self::FLUTTER_MS, sr);
        let drift_depth = ms_to_samples(params.get(Self::DRIFT) * Self::DRIFT_MS, sr);

        let tone = params.get(Self::TONE_HZ);
        let retune = self.tone_watch.changed([tone]);
        let tone_coeffs = low_pass(sr, tone, FRAC_1_SQRT_2);

        let channels = block.channels().min(self.channels.len());
        for c in 0..channels {
            let ch = &mut self.channels[c];
            if retune {
                ch.tone.set_coefficients(tone_coeffs);
            }
            ch.line.set_feedback(feedback);
            ch.time.set_target(time);

            for x in block.channel_mut(c).iter_mut() {
                ch.drift = (ch.drift * Self::DRIFT_LEAK
                    + Self::DRIFT_STEP * ch.rng.next_bipolar())
                .clamp(-1.0, 1.0);
                let delay = ch.time.next()
                    + wow_depth * ch.wow.next()
                    + flutter_depth * ch.flutter.next()
                    + drift_depth * ch.drift;
                ch.line.set_delay(delay);

                let tone = &mut ch.tone;
                *x = ch.line.process_with(*x, |s| tone.process(s));
            }
        }
    }

    fn flush_denormals(&mut self) {
        for ch in &mut self.channels {
            ch.tone.flush_denormals();
            ch.drift = flush_denormal(ch.drift);
        }
    }

    fn default_mix(&self) -> f32 {
        0.35
    }
}

/// Index of dotted eighth in [`NoteDivision::ALL`]
const DOTTED_EIGHTH: usize = 8;

/// Tempo-synced feedback delay with optional ping-pong
///
/// In ping-pong mode the first two channels cross-feed: the mono sum enters
/// the left line, the left repeat feeds the right line and the right repeat
/// feeds back into the left.
#[derive(Debug, Clone)]
pub struct TempoDelay {
    sample_rate: f32,
    lines: Vec<FeedbackDelay>,
    time: SmoothedValue,
}

impl Default for TempoDelay {
    fn default() -> Self {
        Self::new()
    }
}

impl TempoDelay {
    pub const DIVISION: usize = 0;
    pub const SYNC: usize = 1;
    pub const TIME_MS: usize = 2;
    pub const FEEDBACK: usize = 3;
    pub const PING_PONG: usize = 4;

    pub const PARAMS: &'static [ParamSpec] = &[
        ParamSpec::choice("division", "Division", NoteDivision::NAMES, DOTTED_EIGHTH),
        ParamSpec::toggle("sync", "Tempo Sync", true),
        ParamSpec::float("time_ms", "Time", 1.0, 2000.0, 375.0),
        ParamSpec::float("feedback", "Feedback", 0.0, 0.95, 0.4),
        ParamSpec::toggle("ping_pong", "Ping Pong", false),
    ];

    const MAX_DELAY_SECONDS: f32 = 4.0;

    pub fn new() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            lines: Vec::new(),
            time: SmoothedValue::new(1.0),
        }
    }

    fn delay_samples(&self, params: &ParamValues<'_>, transport: &TransportInfo) -> f32 {
        let seconds = if params.flag(Self::SYNC) {
            NoteDivision::from_index(params.choice(Self::DIVISION)).seconds(transport.bpm)
        } else {
            params.get(Self::TIME_MS) * 0.001
        };
        (seconds * self.sample_rate).min(Self::MAX_DELAY_SECONDS * self.sample_rate)
    }
}

impl Processor for TempoDelay {
    fn name(&self) -> &'static str {
        "Tempo Delay"
    }

    fn params(&self) -> &'static [ParamSpec] {
        Self::PARAMS
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate;
        let max = (Self::MAX_DELAY_SECONDS * spec.sample_rate).ceil() as usize + 1;
        self.lines = vec![FeedbackDelay::new(max); spec.channels];
        self.time = SmoothedValue::new(0.0);
        self.time.reset(spec.sample_rate, TIME_GLIDE_MS);
    }

    fn reset(&mut self) {
        self.lines.iter_mut().for_each(FeedbackDelay::reset);
    }

    fn process(
        &mut self,
        block: &mut AudioBlock<'_>,
        params: &ParamValues<'_>,
        transport: &TransportInfo,
    ) {
        let target = self.delay_samples(params, transport);
        // First block after prepare starts at the target instead of gliding from zero
        if self.time.target() == 0.0 {
            self.time.set_immediate(target);
        } else {
            self.time.set_target(target);
        }

        let feedback = params.get(Self::FEEDBACK);
        for line in &mut self.lines {
            line.set_feedback(feedback);
        }

        let channels = block.channels().min(self.lines.len());
        let ping_pong = params.flag(Self::PING_PONG) && channels >= 2;

        for i in 0..block.frames() {
            let delay = self.time.next();
            for line in &mut self.lines[..channels] {
                line.set_delay(delay);
            }

            if ping_pong {
                let (left, right) = self.lines.split_at_mut(1);
                let (left, right) = (&mut left[0], &mut right[0]);
                let wet_l = left.read();
                let wet_r = right.read();
                let mono = 0.5 * (block.get(0, i) + block.get(1, i));
                left.write(mono + feedback * wet_r);
                right.write(feedback * wet_l);
                block.set(0, i, wet_l);
                block.set(1, i, wet_r);
                for c in 2..channels {
                    let y = self.lines[c].process(block.get(c, i));
                    block.set(c, i, y);
                }
            } else {
                for c in 0..channels {
                    let y = self.lines[c].process(block.get(c, i));
                    block.set(c, i, y);
                }
            }
        }
    }

    fn default_mix(&self) -> f32 {
        0.35
    }
}
