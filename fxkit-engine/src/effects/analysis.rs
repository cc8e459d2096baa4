//! Analysis-only processors: they observe audio and never change it

use ringbuf::traits::{Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use fxkit_dsp::math::SILENCE_DB;
use fxkit_dsp::{Detection, EnvelopeFollower};

use crate::config::ProcessSpec;
use crate::events::{ProcessorEvent, MAX_METER_CHANNELS};
use crate::params::{ParamSpec, ParamValues};
use crate::processor::{AudioBlock, Processor};
use crate::transport::TransportInfo;

/// Peak and RMS meter per channel
///
/// Peaks attack instantly and fall with the release time; RMS averages over
/// the window. Levels are reported through [`Processor::meter`].
#[derive(Debug, Clone)]
pub struct LevelMeter {
    max_channels: usize,
    peak: Vec<EnvelopeFollower>,
    rms: Vec<EnvelopeFollower>,
}

impl LevelMeter {
    pub const PEAK_RELEASE_MS: usize = 0;
    pub const RMS_WINDOW_MS: usize = 1;

    pub const PARAMS: &'static [ParamSpec] = &[
        ParamSpec::float("peak_release_ms", "Peak Release", 10.0, 3000.0, 300.0),
        ParamSpec::float("rms_window_ms", "RMS Window", 10.0, 1000.0, 300.0),
    ];

    /// Meter at most `max_channels` channels (capped at [`MAX_METER_CHANNELS`])
    pub fn new(max_channels: usize) -> Self {
        Self {
            max_channels: max_channels.clamp(1, MAX_METER_CHANNELS),
            peak: Vec::new(),
            rms: Vec::new(),
        }
    }

    pub fn channels(&self) -> usize {
        self.peak.len()
    }
}

impl Processor for LevelMeter {
    fn name(&self) -> &'static str {
        "Level Meter"
    }

    fn params(&self) -> &'static [ParamSpec] {
        Self::PARAMS
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        let metered = spec.channels.min(self.max_channels);
        let sr = spec.sample_rate;
        let [release, window] = [Self::PEAK_RELEASE_MS, Self::RMS_WINDOW_MS]
            .map(|i| Self::PARAMS[i].default);
        self.peak = vec![EnvelopeFollower::new(sr, 0.0, release); metered];
        self.rms = vec![
            EnvelopeFollower::new(sr, window, window).with_detection(Detection::Rms);
            metered
        ];
    }

    fn reset(&mut self) {
        self.peak
            .iter_mut()
            .chain(self.rms.iter_mut())
            .for_each(EnvelopeFollower::reset);
    }

    fn process(&mut self, block: &mut AudioBlock<'_>, params: &ParamValues<'_>, _: &TransportInfo) {
        let release = params.get(Self::PEAK_RELEASE_MS);
        let window = params.get(Self::RMS_WINDOW_MS);
        let channels = block.channels().min(self.peak.len());
        for c in 0..channels {
            let (peak, rms) = (&mut self.peak[c], &mut self.rms[c]);
            peak.set_release_ms(release);
            rms.set_attack_ms(window);
            rms.set_release_ms(window);
            for &x in block.channel(c) {
                peak.process(x);
                rms.process(x);
            }
        }
    }

    fn flush_denormals(&mut self) {
        self.peak
            .iter_mut()
            .chain(self.rms.iter_mut())
            .for_each(EnvelopeFollower::flush_denormals);
    }

    fn meter(&mut self) -> Option<ProcessorEvent> {
        let mut peak_db = [SILENCE_DB; MAX_METER_CHANNELS];
        let mut rms_db = [SILENCE_DB; MAX_METER_CHANNELS];
        for (c, (peak, rms)) in self.peak.iter().zip(&self.rms).enumerate() {
            peak_db[c] = peak.level_db();
            rms_db[c] = rms.level_db();
        }
        Some(ProcessorEvent::Levels {
            channels: self.peak.len(),
            peak_db,
            rms_db,
        })
    }
}

/// Feeds a mono mixdown of the block into a lock-free ring
///
/// The mixdown is the channel average. When the reader falls behind the
/// ring fills and newer samples are dropped; the audio thread never waits.
pub struct SpectrumTap {
    producer: HeapProd<f32>,
    consumer: Option<HeapCons<f32>>,
    scratch: Vec<f32>,
}

impl SpectrumTap {
    pub fn new(capacity: usize) -> Self {
        let (producer, consumer) = HeapRb::<f32>::new(capacity.max(1)).split();
        Self {
            producer,
            consumer: Some(consumer),
            scratch: Vec::new(),
        }
    }

    /// Reader end of the ring; handed out once
    pub fn take_consumer(&mut self) -> Option<HeapCons<f32>> {
        self.consumer.take()
    }
}

impl std::fmt::Debug for SpectrumTap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumTap")
            .field("consumer_taken", &self.consumer.is_none())
            .finish()
    }
}

impl Processor for SpectrumTap {
    fn name(&self) -> &'static str {
        "Spectrum Tap"
    }

    fn params(&self) -> &'static [ParamSpec] {
        &[]
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.scratch.resize(spec.max_block_size, 0.0);
    }

    fn reset(&mut self) {}

    fn process(&mut self, block: &mut AudioBlock<'_>, _: &ParamValues<'_>, _: &TransportInfo) {
        let frames = block.frames().min(self.scratch.len());
        let channels = block.channels();
        if channels == 0 || frames == 0 {
            return;
        }
        let scale = 1.0 / channels as f32;
        let mono = &mut self.scratch[..frames];
        mono.copy_from_slice(&block.channel(0)[..frames]);
        for c in 1..channels {
            for (m, &x) in mono.iter_mut().zip(block.channel(c)) {
                *m += x;
            }
        }
        for m in mono.iter_mut() {
            *m *= scale;
        }
        self.producer.push_slice(mono);
    }
}
