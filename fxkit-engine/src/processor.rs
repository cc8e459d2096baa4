//! Block processing contract and the per-plugin block processor
//!
//! Pipeline for one block:
//!
//! ```text
//! gateway.refresh → input trim → effect → dry/wet mix → output trim
//! ```
//!
//! The host hands `&mut [&mut [f32]]` per block. Samples are copied into a
//! flat work arena in prepared-size chunks, so blocks larger than the
//! prepared maximum never allocate.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use fxkit_dsp::math::{db_to_gain, flush_denormal};
use fxkit_dsp::SmoothedValue;
use ringbuf::HeapCons;

use crate::config::{ConfigError, EngineConfig, ProcessSpec};
use crate::effects::{Effect, EffectKind};
use crate::events::{event_channel, MeterThrottle, ProcessorEvent};
use crate::params::{ParamSpec, ParamStore, ParamValues, ParameterGateway};
use crate::transport::{TransportInfo, TransportProvider};

/// What a bypassed processor outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BypassMode {
    /// Output equals input
    #[default]
    Passthrough,
    /// Input scaled by input and output trims
    TrimOnly,
}

/// Channel-major view over a flat sample arena
///
/// Channel `c` occupies `data[c * stride..c * stride + frames]`.
#[derive(Debug)]
pub struct AudioBlock<'a> {
    data: &'a mut [f32],
    channels: usize,
    stride: usize,
    frames: usize,
}

impl<'a> AudioBlock<'a> {
    /// Frames and channels are clamped to what `data` can hold
    pub fn new(data: &'a mut [f32], channels: usize, stride: usize, frames: usize) -> Self {
        let stride = stride.max(1);
        Self {
            channels: channels.min(data.len() / stride),
            frames: frames.min(stride),
            stride,
            data,
        }
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn channel(&self, channel: usize) -> &[f32] {
        if channel >= self.channels {
            return &[];
        }
        let start = channel * self.stride;
        &self.data[start..start + self.frames]
    }

    pub fn channel_mut(&mut self, channel: usize) -> &mut [f32] {
        if channel >= self.channels {
            return &mut [];
        }
        let start = channel * self.stride;
        &mut self.data[start..start + self.frames]
    }

    /// Sample at (channel, frame); 0.0 outside the block
    #[inline]
    pub fn get(&self, channel: usize, frame: usize) -> f32 {
        if channel < self.channels && frame < self.frames {
            self.data[channel * self.stride + frame]
        } else {
            0.0
        }
    }

    #[inline]
    pub fn set(&mut self, channel: usize, frame: usize, value: f32) {
        if channel < self.channels && frame < self.frames {
            self.data[channel * self.stride + frame] = value;
        }
    }

    /// First two channels, when present
    pub fn stereo_mut(&mut self) -> Option<(&mut [f32], &mut [f32])> {
        if self.channels < 2 {
            return None;
        }
        let (left, right) = self.data.split_at_mut(self.stride);
        Some((&mut left[..self.frames], &mut right[..self.frames]))
    }

    pub fn iter_channels_mut(&mut self) -> impl Iterator<Item = &mut [f32]> + '_ {
        let frames = self.frames;
        self.data
            .chunks_mut(self.stride)
            .take(self.channels)
            .map(move |ch| &mut ch[..frames])
    }
}

/// A stateful effect running inside the audio callback
///
/// `prepare` may allocate; `process`, `reset` and `meter` must not.
pub trait Processor: Send {
    fn name(&self) -> &'static str;

    /// Effect-specific parameters, indexed from 0 in `process`
    fn params(&self) -> &'static [ParamSpec];

    /// Size and clear all state for a sample rate, block size and channel count
    fn prepare(&mut self, spec: &ProcessSpec);

    /// Return to the post-prepare neutral state
    fn reset(&mut self);

    /// Process one block in place
    fn process(
        &mut self,
        block: &mut AudioBlock<'_>,
        params: &ParamValues<'_>,
        transport: &TransportInfo,
    );

    /// Zero sub-normal state; called once per block
    fn flush_denormals(&mut self) {}

    fn bypass_mode(&self) -> BypassMode {
        BypassMode::Passthrough
    }

    /// Latest meter reading, if this processor meters
    fn meter(&mut self) -> Option<ProcessorEvent> {
        None
    }

    /// Mix value a fresh parameter store starts at
    fn default_mix(&self) -> f32 {
        1.0
    }
}

/// One effect wired into the trim/mix pipeline
pub struct BlockProcessor {
    effect: Effect,
    gateway: ParameterGateway,
    config: EngineConfig,
    spec: ProcessSpec,
    /// Wet path, `channels × max_block_size`
    work: Vec<f32>,
    /// Dry copy after input trim
    dry: Vec<f32>,
    /// Per-frame mix and output gains for one chunk
    ramp: Vec<f32>,
    input_trim: SmoothedValue,
    output_trim: SmoothedValue,
    mix: SmoothedValue,
    transport: Option<Arc<dyn TransportProvider>>,
    events: Option<Sender<ProcessorEvent>>,
    meter_throttle: MeterThrottle,
}

impl std::fmt::Debug for BlockProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockProcessor")
            .field("effect", &self.effect.name())
            .field("spec", &self.spec)
            .finish()
    }
}

impl BlockProcessor {
    /// Build and prepare with the configuration's defaults (stereo)
    pub fn new(kind: EffectKind, config: EngineConfig) -> Result<Self, ConfigError> {
        config
            .validate()
            .inspect_err(|e| tracing::warn!(error = %e, "Invalid engine configuration"))?;
        let effect = Effect::new(kind, &config);
        let store = ParamStore::for_effect(effect.params(), effect.default_mix());
        let spec = ProcessSpec::new(config.default_sample_rate, config.default_block_size, 2);

        let mut processor = Self {
            effect,
            gateway: ParameterGateway::new(store),
            meter_throttle: MeterThrottle::new(config.meter_interval_samples(spec.sample_rate)),
            config,
            spec,
            work: Vec::new(),
            dry: Vec::new(),
            ramp: Vec::new(),
            input_trim: SmoothedValue::new(1.0),
            output_trim: SmoothedValue::new(1.0),
            mix: SmoothedValue::new(1.0),
            transport: None,
            events: None,
        };
        processor.allocate(spec);
        Ok(processor)
    }

    /// Read tempo from a host transport instead of the configured default
    pub fn with_transport(mut self, provider: Arc<dyn TransportProvider>) -> Self {
        self.transport = Some(provider);
        self
    }

    /// Deliver meter events into an existing channel
    pub fn with_events(mut self, sender: Sender<ProcessorEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Create the event channel and return its receiving end
    pub fn subscribe(&mut self) -> Receiver<ProcessorEvent> {
        let (tx, rx) = event_channel(self.config.event_capacity);
        self.events = Some(tx);
        rx
    }

    pub fn kind(&self) -> EffectKind {
        self.effect.kind()
    }

    pub fn name(&self) -> &'static str {
        self.effect.name()
    }

    /// Control-thread handle to this processor's parameters
    pub fn param_store(&self) -> ParamStore {
        self.gateway.store().clone()
    }

    pub fn spec(&self) -> ProcessSpec {
        self.spec
    }

    pub fn bypass_mode(&self) -> BypassMode {
        self.effect.bypass_mode()
    }

    /// Ring consumer of a spectrum tap; `None` for other effects or once taken
    pub fn take_spectrum_consumer(&mut self) -> Option<HeapCons<f32>> {
        self.effect.take_spectrum_consumer()
    }

    /// Host prepare event: resize every buffer and clear all state
    pub fn prepare(&mut self, spec: ProcessSpec) {
        let sanitized = spec.sanitized();
        tracing::debug!(
            effect = self.effect.name(),
            sample_rate = sanitized.sample_rate,
            max_block_size = sanitized.max_block_size,
            channels = sanitized.channels,
            "Preparing processor"
        );
        self.allocate(sanitized);
    }

    fn allocate(&mut self, spec: ProcessSpec) {
        self.spec = spec;
        let len = spec.channels * spec.max_block_size;
        self.work.clear();
        self.work.resize(len, 0.0);
        self.dry.clear();
        self.dry.resize(len, 0.0);
        self.ramp.clear();
        self.ramp.resize(2 * spec.max_block_size, 0.0);

        self.effect.prepare(&spec);
        self.meter_throttle = MeterThrottle::new(self.config.meter_interval_samples(spec.sample_rate));

        self.gateway.refresh();
        let common = self.gateway.common();
        for (smoother, value) in [
            (&mut self.input_trim, db_to_gain(common.input_trim_db)),
            (&mut self.output_trim, db_to_gain(common.output_trim_db)),
            (&mut self.mix, common.mix),
        ] {
            smoother.set_immediate(value);
            smoother.reset(spec.sample_rate, self.config.smoothing_ms);
        }
    }

    /// Clear effect state without resizing
    pub fn reset(&mut self) {
        self.effect.reset();
        self.meter_throttle.reset();
    }

    /// Process one block, tempo from the attached transport
    pub fn process(&mut self, channels: &mut [&mut [f32]]) {
        let transport = TransportInfo::resolve(self.transport.as_deref(), self.config.default_bpm);
        self.process_with_transport(channels, &transport);
    }

    /// Process one block in place with explicit tempo state
    pub fn process_with_transport(
        &mut self,
        channels: &mut [&mut [f32]],
        transport: &TransportInfo,
    ) {
        let num_channels = channels.len();
        if num_channels == 0 {
            return;
        }
        self.gateway.refresh();

        if num_channels > self.spec.channels {
            let grown = ProcessSpec {
                channels: num_channels,
                ..self.spec
            };
            self.allocate(grown);
        }

        let frames = channels.iter().map(|c| c.len()).min().unwrap_or(0);
        let common = self.gateway.common();
        let in_gain = db_to_gain(common.input_trim_db);
        let out_gain = db_to_gain(common.output_trim_db);

        if common.bypass {
            self.input_trim.set_immediate(in_gain);
            self.output_trim.set_immediate(out_gain);
            self.mix.set_immediate(common.mix);
            if self.effect.bypass_mode() == BypassMode::TrimOnly {
                let gain = in_gain * out_gain;
                for ch in channels.iter_mut() {
                    for s in ch[..frames].iter_mut() {
                        *s *= gain;
                    }
                }
            }
            return;
        }

        self.input_trim.set_target(in_gain);
        self.output_trim.set_target(out_gain);
        self.mix.set_target(common.mix);

        let stride = self.spec.max_block_size;
        let mut start = 0;
        while start < frames {
            let len = stride.min(frames - start);
            self.process_chunk(channels, start, len, transport);
            start += len;
        }

        self.effect.flush_denormals();

        if self.meter_throttle.tick(frames) {
            if let (Some(tx), Some(event)) = (&self.events, self.effect.meter()) {
                let _ = tx.try_send(event);
            }
        }
    }

    fn process_chunk(
        &mut self,
        channels: &mut [&mut [f32]],
        start: usize,
        len: usize,
        transport: &TransportInfo,
    ) {
        let stride = self.spec.max_block_size;
        let num_channels = channels.len();

        // Input trim ramp, shared by every channel
        let (mix_ramp, out_ramp) = self.ramp.split_at_mut(stride);
        for g in mix_ramp[..len].iter_mut() {
            *g = self.input_trim.next();
        }
        for (c, ch) in channels.iter().enumerate() {
            let base = c * stride;
            let src = &ch[start..start + len];
            let work = &mut self.work[base..base + len];
            for ((w, &x), &g) in work.iter_mut().zip(src).zip(mix_ramp.iter()) {
                *w = x * g;
            }
            self.dry[base..base + len].copy_from_slice(work);
        }

        {
            let mut block = AudioBlock::new(&mut self.work, num_channels, stride, len);
            let params = self.gateway.effect_values();
            self.effect.process(&mut block, &params, transport);
        }

        for i in 0..len {
            mix_ramp[i] = self.mix.next();
            out_ramp[i] = self.output_trim.next();
        }
        for (c, ch) in channels.iter_mut().enumerate() {
            let base = c * stride;
            let dst = &mut ch[start..start + len];
            let wet = &self.work[base..base + len];
            let dry = &self.dry[base..base + len];
            for i in 0..len {
                let m = mix_ramp[i];
                dst[i] = flush_denormal((dry[i] * (1.0 - m) + wet[i] * m) * out_ramp[i]);
            }
        }
    }
}
