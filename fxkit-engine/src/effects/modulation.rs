//! LFO-driven effects: chorus, flanger, doubler, tremolo

use std::f32::consts::PI;

use fxkit_dsp::math::{ms_to_samples, DEFAULT_SAMPLE_RATE};
use fxkit_dsp::{ChorusVoices, DelayLine, FeedbackDelay, Lfo, NoteDivision, Waveform};

use crate::config::ProcessSpec;
use crate::params::{ParamSpec, ParamValues};
use crate::processor::{AudioBlock, Processor};
use crate::transport::TransportInfo;

const VOICE_NAMES: &[&str] = &["1", "2", "3", "4", "5", "6", "7", "8"];

/// Delay-line length for a maximum modulated delay, with interpolation headroom
fn max_delay_samples(max_ms: f32, sample_rate: f32) -> usize {
    ms_to_samples(max_ms, sample_rate).ceil() as usize + 2
}

/// Stereo pan of channel `c`: +1 left, -1 right, 0 beyond stereo
fn pan_sign(channel: usize, channels: usize) -> f32 {
    match (channel, channels) {
        (_, 1) => 0.0,
        (0, _) => 1.0,
        (1, _) => -1.0,
        _ => 0.0,
    }
}

/// Multi-voice chorus, one voice set per channel
#[derive(Debug, Clone)]
pub struct Chorus {
    sample_rate: f32,
    voices: Vec<ChorusVoices>,
}

impl Default for Chorus {
    fn default() -> Self {
        Self::new()
    }
}

impl Chorus {
    pub const RATE_HZ: usize = 0;
    pub const DEPTH_MS: usize = 1;
    pub const DELAY_MS: usize = 2;
    pub const VOICES: usize = 3;
    pub const SPREAD: usize = 4;

    pub const PARAMS: &'static [ParamSpec] = &[
        ParamSpec::float("rate_hz", "Rate", 0.05, 5.0, 0.8),
        ParamSpec::float("depth_ms", "Depth", 0.0, 10.0, 3.0),
        ParamSpec::float("delay_ms", "Delay", 5.0, 40.0, 15.0),
        ParamSpec::choice("voices", "Voices", VOICE_NAMES, 2),
        ParamSpec::float("spread", "Spread", 0.0, 1.0, 0.5),
    ];

    const MAX_DELAY_MS: f32 = 50.0;

    pub fn new() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            voices: Vec::new(),
        }
    }
}

impl Processor for Chorus {
    fn name(&self) -> &'static str {
        "Chorus"
    }

    fn params(&self) -> &'static [ParamSpec] {
        Self::PARAMS
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate;
        let max = max_delay_samples(Self::MAX_DELAY_MS, spec.sample_rate);
        self.voices = (0..spec.channels).map(|_| ChorusVoices::new(max, 3)).collect();
    }

    fn reset(&mut self) {
        self.voices.iter_mut().for_each(ChorusVoices::reset);
    }

    fn process(&mut self, block: &mut AudioBlock<'_>, params: &ParamValues<'_>, _: &TransportInfo) {
        let sr = self.sample_rate;
        let base = ms_to_samples(params.get(Self::DELAY_MS), sr);
        let depth = ms_to_samples(params.get(Self::DEPTH_MS), sr);
        let rate = params.get(Self::RATE_HZ);
        let count = params.choice(Self::VOICES) + 1;
        let spread = params.get(Self::SPREAD);

        let channels = block.channels().min(self.voices.len());
        for c in 0..channels {
            let voices = &mut self.voices[c];
            voices.set_voices(count);
            voices.set_base_delay(base);
            voices.set_depth(depth);
            voices.set_rate(rate, sr);
            voices.set_spread(PI * spread * c as f32);
            for x in block.channel_mut(c).iter_mut() {
                *x = voices.process(*x);
            }
        }
    }

    fn default_mix(&self) -> f32 {
        0.5
    }
}

/// Short feedback delay swept by a unipolar LFO
#[derive(Debug, Clone)]
pub struct Flanger {
    sample_rate: f32,
    lines: Vec<FeedbackDelay>,
    lfos: Vec<Lfo>,
}

impl Default for Flanger {
    fn default() -> Self {
        Self::new()
    }
}

impl Flanger {
    pub const RATE_HZ: usize = 0;
    pub const DEPTH_MS: usize = 1;
    pub const DELAY_MS: usize = 2;
    pub const FEEDBACK: usize = 3;
    pub const SPREAD: usize = 4;

    pub const PARAMS: &'static [ParamSpec] = &[
        ParamSpec::float("rate_hz", "Rate", 0.05, 5.0, 0.25),
        ParamSpec::float("depth_ms", "Depth", 0.0, 5.0, 2.0),
        ParamSpec::float("delay_ms", "Delay", 0.5, 10.0, 1.0),
        ParamSpec::float("feedback", "Feedback", -0.95, 0.95, 0.5),
        ParamSpec::float("spread", "Spread", 0.0, 1.0, 0.25),
    ];

    const MAX_DELAY_MS: f32 = 15.0;

    pub fn new() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            lines: Vec::new(),
            lfos: Vec::new(),
        }
    }
}

impl Processor for Flanger {
    fn name(&self) -> &'static str {
        "Flanger"
    }

    fn params(&self) -> &'static [ParamSpec] {
        Self::PARAMS
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate;
        let max = max_delay_samples(Self::MAX_DELAY_MS, spec.sample_rate);
        self.lines = vec![FeedbackDelay::new(max); spec.channels];
        self.lfos = vec![Lfo::new(0.25, spec.sample_rate, Waveform::Triangle); spec.channels];
    }

    fn reset(&mut self) {
        self.lines.iter_mut().for_each(FeedbackDelay::reset);
        self.lfos.iter_mut().for_each(Lfo::reset);
    }

    fn process(&mut self, block: &mut AudioBlock<'_>, params: &ParamValues<'_>, _: &TransportInfo) {
        let sr = self.sample_rate;
        let base = ms_to_samples(params.get(Self::DELAY_MS), sr);
        let depth = ms_to_samples(params.get(Self::DEPTH_MS), sr);
        let rate = params.get(Self::RATE_HZ);
        let feedback = params.get(Self::FEEDBACK);
        let spread = params.get(Self::SPREAD);

        let channels = block.channels().min(self.lines.len());
        for c in 0..channels {
            let (line, lfo) = (&mut self.lines[c], &mut self.lfos[c]);
            line.set_feedback(feedback);
            lfo.set_rate(rate, sr);
            lfo.set_phase_offset(PI * spread * c as f32);
            for x in block.channel_mut(c).iter_mut() {
                line.set_delay(base + depth * lfo.next_unipolar());
                *x = line.process(*x);
            }
        }
    }

    fn default_mix(&self) -> f32 {
        0.5
    }
}

#[derive(Debug, Clone)]
struct DoublerVoice {
    line: DelayLine,
    lfo_a: Lfo,
    lfo_b: Lfo,
}

impl DoublerVoice {
    fn new(max_delay: usize, sample_rate: f32) -> Self {
        let lfo_a = Lfo::new(0.6, sample_rate, Waveform::Sine);
        let mut lfo_b = lfo_a;
        lfo_b.set_phase_offset(PI);
        Self {
            line: DelayLine::new(max_delay),
            lfo_a,
            lfo_b,
        }
    }

    fn reset(&mut self) {
        self.line.clear();
        self.lfo_a.reset();
        self.lfo_b.reset();
    }
}

/// Two slowly detuned copies of each channel, panned apart by `spread`
///
/// Voice B sits at 1.5× the delay of voice A and its LFO runs in opposite
/// phase. At full spread the left channel hears only voice A and the right
/// only voice B.
#[derive(Debug, Clone)]
pub struct Doubler {
    sample_rate: f32,
    voices: Vec<DoublerVoice>,
}

impl Default for Doubler {
    fn default() -> Self {
        Self::new()
    }
}

impl Doubler {
    pub const DELAY_MS: usize = 0;
    pub const DEPTH_MS: usize = 1;
    pub const RATE_HZ: usize = 2;
    pub const SPREAD: usize = 3;

    pub const PARAMS: &'static [ParamSpec] = &[
        ParamSpec::float("delay_ms", "Delay", 5.0, 40.0, 18.0),
        ParamSpec::float("depth_ms", "Detune", 0.0, 3.0, 0.8),
        ParamSpec::float("rate_hz", "Rate", 0.1, 3.0, 0.6),
        ParamSpec::float("spread", "Spread", 0.0, 1.0, 0.7),
    ];

    const VOICE_B_RATIO: f32 = 1.5;
    const MAX_DELAY_MS: f32 = 40.0 * Self::VOICE_B_RATIO + 3.0;

    pub fn new() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            voices: Vec::new(),
        }
    }
}

impl Processor for Doubler {
    fn name(&self) -> &'static str {
        "Doubler"
    }

    fn params(&self) -> &'static [ParamSpec] {
        Self::PARAMS
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate;
        let max = max_delay_samples(Self::MAX_DELAY_MS, spec.sample_rate);
        self.voices = vec![DoublerVoice::new(max, spec.sample_rate); spec.channels];
    }

    fn reset(&mut self) {
        self.voices.iter_mut().for_each(DoublerVoice::reset);
    }

    fn process(&mut self, block: &mut AudioBlock<'_>, params: &ParamValues<'_>, _: &TransportInfo) {
        let sr = self.sample_rate;
        let delay_a = ms_to_samples(params.get(Self::DELAY_MS), sr);
        let delay_b = delay_a * Self::VOICE_B_RATIO;
        let depth = ms_to_samples(params.get(Self::DEPTH_MS), sr);
        let rate = params.get(Self::RATE_HZ);
        let spread = params.get(Self::SPREAD);

        let channels = block.channels().min(self.voices.len());
        let total = block.channels();
        for c in 0..channels {
            let weight_a = 0.5 + 0.5 * spread * pan_sign(c, total);
            let voice = &mut self.voices[c];
            voice.lfo_a.set_rate(rate, sr);
            voice.lfo_b.set_rate(rate, sr);
            for x in block.channel_mut(c).iter_mut() {
                voice.line.push_sample(*x);
                let a = voice.line.read_at(delay_a + depth * voice.lfo_a.next());
                let b = voice.line.read_at(delay_b + depth * voice.lfo_b.next());
                *x = weight_a * a + (1.0 - weight_a) * b;
            }
        }
    }

    fn default_mix(&self) -> f32 {
        0.5
    }
}

const DEFAULT_DIVISION: usize = 3;

/// Amplitude modulation, free-running or locked to host tempo
#[derive(Debug, Clone)]
pub struct Tremolo {
    sample_rate: f32,
    lfos: Vec<Lfo>,
}

impl Default for Tremolo {
    fn default() -> Self {
        Self::new()
    }
}

impl Tremolo {
    pub const DIVISION: usize = 0;
    pub const SYNC: usize = 1;
    pub const RATE_HZ: usize = 2;
    pub const DEPTH: usize = 3;
    pub const WAVEFORM: usize = 4;
    pub const STEREO_PHASE_DEG: usize = 5;

    pub const PARAMS: &'static [ParamSpec] = &[
        ParamSpec::choice("division", "Division", NoteDivision::NAMES, DEFAULT_DIVISION),
        ParamSpec::toggle("sync", "Tempo Sync", true),
        ParamSpec::float("rate_hz", "Rate", 0.1, 20.0, 4.0),
        ParamSpec::float("depth", "Depth", 0.0, 1.0, 0.5),
        ParamSpec::choice("waveform", "Waveform", Waveform::NAMES, 0),
        ParamSpec::float("stereo_phase_deg", "Stereo Phase", 0.0, 180.0, 0.0),
    ];

    pub fn new() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            lfos: Vec::new(),
        }
    }
}

impl Processor for Tremolo {
    fn name(&self) -> &'static str {
        "Tremolo"
    }

    fn params(&self) -> &'static [ParamSpec] {
        Self::PARAMS
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate;
        self.lfos = vec![Lfo::new(4.0, spec.sample_rate, Waveform::Sine); spec.channels];
    }

    fn reset(&mut self) {
        self.lfos.iter_mut().for_each(Lfo::reset);
    }

    fn process(
        &mut self,
        block: &mut AudioBlock<'_>,
        params: &ParamValues<'_>,
        transport: &TransportInfo,
    ) {
        let rate = if params.flag(Self::SYNC) {
            NoteDivision::from_index(params.choice(Self::DIVISION)).hz(transport.bpm)
        } else {
            params.get(Self::RATE_HZ)
        };
        let depth = params.get(Self::DEPTH);
        let waveform = Waveform::from_index(params.choice(Self::WAVEFORM));
        let offset = params.get(Self::STEREO_PHASE_DEG).to_radians();

        let channels = block.channels().min(self.lfos.len());
        for c in 0..channels {
            let lfo = &mut self.lfos[c];
            lfo.set_rate(rate, self.sample_rate);
            lfo.set_waveform(waveform);
            lfo.set_phase_offset(offset * c as f32);
            for x in block.channel_mut(c).iter_mut() {
                *x *= 1.0 - depth * lfo.next_unipolar();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::test_util::{prepared, run, set};
    use crate::effects::EffectKind;

    fn impulse(len: usize, channels: usize) -> Vec<f32> {
        let mut data = vec![0.0f32; len * channels];
        for c in 0..channels {
            data[c * len] = 1.0;
        }
        data
    }

    #[test]
    fn test_chorus_single_voice_without_depth_is_pure_delay() {
        let (mut fx, mut values) = prepared(EffectKind::Chorus, 48000.0, 1);
        set(&mut values, &fx, "voices", 0.0);
        set(&mut values, &fx, "depth_ms", 0.0);
        set(&mut values, &fx, "delay_ms", 10.0);
        let mut data = impulse(1024, 1);
        run(&mut fx, &values, &mut data, 1, &TransportInfo::default());

        let peak = data
            .iter()
            .enumerate()
            .fold((0, 0.0f32), |best, (i, &s)| if s > best.1 { (i, s) } else { best });
        assert_eq!(peak.0, 480, "echo at {}", peak.0);
        assert!(peak.1 > 0.99);
    }

    #[test]
    fn test_chorus_defaults_to_half_mix() {
        let fx = Chorus::new();
        assert_eq!(fx.default_mix(), 0.5);
    }

    #[test]
    fn test_flanger_feedback_echoes_decay() {
        let (mut fx, mut values) = prepared(EffectKind::Flanger, 48000.0, 1);
        set(&mut values, &fx, "depth_ms", 0.0);
        set(&mut values, &fx, "feedback", 0.9);
        let mut data = impulse(512, 1);
        run(&mut fx, &values, &mut data, 1, &TransportInfo::default());

        let first = data[47].max(data[48]).max(data[49]);
        let second = data[95].max(data[96]).max(data[97]);
        assert!(first > 0.95, "first echo {}", first);
        assert!((second / first - 0.9).abs() < 0.05, "second echo {}", second);
    }

    #[test]
    fn test_flanger_feedback_param_clamped() {
        let spec = Flanger::PARAMS[Flanger::FEEDBACK];
        assert_eq!(spec.clamp(2.0), 0.95);
        assert_eq!(spec.clamp(-2.0), -0.95);
    }

    #[test]
    fn test_doubler_full_spread_separates_voices() {
        let (mut fx, mut values) = prepared(EffectKind::Doubler, 48000.0, 2);
        set(&mut values, &fx, "spread", 1.0);
        set(&mut values, &fx, "depth_ms", 0.0);
        let len = 2048;
        let mut data = impulse(len, 2);
        run(&mut fx, &values, &mut data, 2, &TransportInfo::default());

        let argmax = |s: &[f32]| {
            s.iter()
                .enumerate()
                .fold((0, 0.0f32), |b, (i, &v)| if v > b.1 { (i, v) } else { b })
                .0
        };
        let left = argmax(&data[..len]);
        let right = argmax(&data[len..]);
        assert!((left as i32 - 864).abs() <= 1, "left voice at {}", left);
        assert!((right as i32 - 1296).abs() <= 1, "right voice at {}", right);
    }

    #[test]
    fn test_tremolo_follows_tempo() {
        let (mut fx, mut values) = prepared(EffectKind::Tremolo, 48000.0, 1);
        // Quarter notes at 120 BPM: 2 Hz
        set(&mut values, &fx, "division", 2.0);
        set(&mut values, &fx, "depth", 1.0);
        let mut data = vec![1.0f32; 24000];
        run(&mut fx, &values, &mut data, 1, &TransportInfo::with_bpm(120.0));

        assert!((data[0] - 0.5).abs() < 1e-3, "start {}", data[0]);
        assert!(data[6000] < 0.01, "quarter period {}", data[6000]);
        assert!(data[18000] > 0.99, "three quarters {}", data[18000]);
    }

    #[test]
    fn test_tremolo_free_rate() {
        let (mut fx, mut values) = prepared(EffectKind::Tremolo, 48000.0, 1);
        set(&mut values, &fx, "sync", 0.0);
        set(&mut values, &fx, "rate_hz", 4.0);
        set(&mut values, &fx, "depth", 1.0);
        let mut data = vec![1.0f32; 12000];
        run(&mut fx, &values, &mut data, 1, &TransportInfo::with_bpm(60.0));
        // 4 Hz: a quarter period is 3000 samples
        assert!(data[3000] < 0.01, "{}", data[3000]);
    }
}
