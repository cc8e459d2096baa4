//! Effect modules
//!
//! Each effect is a thin composition of `fxkit-dsp` primitives. [`Effect`]
//! is the tagged variant the block processor holds; dispatch is a `match`,
//! not a vtable.

mod analysis;
mod delay;
mod dynamics;
mod filter;
mod modulation;
mod noise;
mod stereo;

pub use analysis::{LevelMeter, SpectrumTap};
pub use delay::{TapeEcho, TempoDelay};
pub use dynamics::{Compressor, Gate, Limiter, MultibandCompressor, TransientShaper};
pub use filter::{Filter, ParametricEq};
pub use modulation::{Chorus, Doubler, Flanger, Tremolo};
pub use noise::NoiseGenerator;
pub use stereo::{BandSplitter, StereoImager};

use ringbuf::HeapCons;

use crate::config::{EngineConfig, ProcessSpec};
use crate::events::ProcessorEvent;
use crate::params::{ParamSpec, ParamValues};
use crate::processor::{AudioBlock, BypassMode, Processor};
use crate::transport::TransportInfo;

/// Effect selector used at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    Compressor,
    Limiter,
    Gate,
    TransientShaper,
    MultibandCompressor,
    Filter,
    ParametricEq,
    Chorus,
    Flanger,
    Doubler,
    TapeEcho,
    TempoDelay,
    Tremolo,
    StereoImager,
    BandSplitter,
    NoiseGenerator,
    LevelMeter,
    SpectrumTap,
}

impl EffectKind {
    pub const ALL: [EffectKind; 18] = [
        Self::Compressor,
        Self::Limiter,
        Self::Gate,
        Self::TransientShaper,
        Self::MultibandCompressor,
        Self::Filter,
        Self::ParametricEq,
        Self::Chorus,
        Self::Flanger,
        Self::Doubler,
        Self::TapeEcho,
        Self::TempoDelay,
        Self::Tremolo,
        Self::StereoImager,
        Self::BandSplitter,
        Self::NoiseGenerator,
        Self::LevelMeter,
        Self::SpectrumTap,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Compressor => "Compressor",
            Self::Limiter => "Limiter",
            Self::Gate => "Gate",
            Self::TransientShaper => "Transient Shaper",
            Self::MultibandCompressor => "Multiband Compressor",
            Self::Filter => "Filter",
            Self::ParametricEq => "Parametric EQ",
            Self::Chorus => "Chorus",
            Self::Flanger => "Flanger",
            Self::Doubler => "Doubler",
            Self::TapeEcho => "Tape Echo",
            Self::TempoDelay => "Tempo Delay",
            Self::Tremolo => "Tremolo",
            Self::StereoImager => "Stereo Imager",
            Self::BandSplitter => "Band Splitter",
            Self::NoiseGenerator => "Noise Generator",
            Self::LevelMeter => "Level Meter",
            Self::SpectrumTap => "Spectrum Tap",
        }
    }

    /// Case-insensitive lookup by display name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(name.trim()))
    }
}

/// Every effect, selected by variant
#[allow(clippy::large_enum_variant)]
pub enum Effect {
    Compressor(Compressor),
    Limiter(Limiter),
    Gate(Gate),
    TransientShaper(TransientShaper),
    MultibandCompressor(MultibandCompressor),
    Filter(Filter),
    ParametricEq(ParametricEq),
    Chorus(Chorus),
    Flanger(Flanger),
    Doubler(Doubler),
    TapeEcho(TapeEcho),
    TempoDelay(TempoDelay),
    Tremolo(Tremolo),
    StereoImager(StereoImager),
    BandSplitter(BandSplitter),
    NoiseGenerator(NoiseGenerator),
    LevelMeter(LevelMeter),
    SpectrumTap(SpectrumTap),
}

macro_rules! dispatch {
    ($effect:expr, $fx:ident => $body:expr) => {
        match $effect {
            Effect::Compressor($fx) => $body,
            Effect::Limiter($fx) => $body,
            Effect::Gate($fx) => $body,
            Effect::TransientShaper($fx) => $body,
            Effect::MultibandCompressor($fx) => $body,
            Effect::Filter($fx) => $body,
            Effect::ParametricEq($fx) => $body,
            Effect::Chorus($fx) => $body,
            Effect::Flanger($fx) => $body,
            Effect::Doubler($fx) => $body,
            Effect::TapeEcho($fx) => $body,
            Effect::TempoDelay($fx) => $body,
            Effect::Tremolo($fx) => $body,
            Effect::StereoImager($fx) => $body,
            Effect::BandSplitter($fx) => $body,
            Effect::NoiseGenerator($fx) => $body,
            Effect::LevelMeter($fx) => $body,
            Effect::SpectrumTap($fx) => $body,
        }
    };
}

impl Effect {
    /// Construct with neutral state; call `prepare` before processing
    pub fn new(kind: EffectKind, config: &EngineConfig) -> Self {
        match kind {
            EffectKind::Compressor => Self::Compressor(Compressor::new()),
            EffectKind::Limiter => Self::Limiter(Limiter::new()),
            EffectKind::Gate => Self::Gate(Gate::new()),
            EffectKind::TransientShaper => Self::TransientShaper(TransientShaper::new()),
            EffectKind::MultibandCompressor => {
                Self::MultibandCompressor(MultibandCompressor::new())
            }
            EffectKind::Filter => Self::Filter(Filter::new()),
            EffectKind::ParametricEq => Self::ParametricEq(ParametricEq::new()),
            EffectKind::Chorus => Self::Chorus(Chorus::new()),
            EffectKind::Flanger => Self::Flanger(Flanger::new()),
            EffectKind::Doubler => Self::Doubler(Doubler::new()),
            EffectKind::TapeEcho => Self::TapeEcho(TapeEcho::new()),
            EffectKind::TempoDelay => Self::TempoDelay(TempoDelay::new()),
            EffectKind::Tremolo => Self::Tremolo(Tremolo::new()),
            EffectKind::StereoImager => Self::StereoImager(StereoImager::new()),
            EffectKind::BandSplitter => Self::BandSplitter(BandSplitter::new()),
            EffectKind::NoiseGenerator => Self::NoiseGenerator(NoiseGenerator::new()),
            EffectKind::LevelMeter => Self::LevelMeter(LevelMeter::new(config.max_meter_channels)),
            EffectKind::SpectrumTap => Self::SpectrumTap(SpectrumTap::new(config.spectrum_capacity)),
        }
    }

    pub fn kind(&self) -> EffectKind {
        match self {
            Self::Compressor(_) => EffectKind::Compressor,
            Self::Limiter(_) => EffectKind::Limiter,
            Self::Gate(_) => EffectKind::Gate,
            Self::TransientShaper(_) => EffectKind::TransientShaper,
            Self::MultibandCompressor(_) => EffectKind::MultibandCompressor,
            Self::Filter(_) => EffectKind::Filter,
            Self::ParametricEq(_) => EffectKind::ParametricEq,
            Self::Chorus(_) => EffectKind::Chorus,
            Self::Flanger(_) => EffectKind::Flanger,
            Self::Doubler(_) => EffectKind::Doubler,
            Self::TapeEcho(_) => EffectKind::TapeEcho,
            Self::TempoDelay(_) => EffectKind::TempoDelay,
            Self::Tremolo(_) => EffectKind::Tremolo,
            Self::StereoImager(_) => EffectKind::StereoImager,
            Self::BandSplitter(_) => EffectKind::BandSplitter,
            Self::NoiseGenerator(_) => EffectKind::NoiseGenerator,
            Self::LevelMeter(_) => EffectKind::LevelMeter,
            Self::SpectrumTap(_) => EffectKind::SpectrumTap,
        }
    }

    /// Hand out the spectrum ring consumer (spectrum taps only, once)
    pub fn take_spectrum_consumer(&mut self) -> Option<HeapCons<f32>> {
        match self {
            Self::SpectrumTap(tap) => tap.take_consumer(),
            _ => None,
        }
    }
}

impl Processor for Effect {
    fn name(&self) -> &'static str {
        self.kind().name()
    }

    fn params(&self) -> &'static [ParamSpec] {
        dispatch!(self, fx => fx.params())
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        dispatch!(self, fx => fx.prepare(spec))
    }

    fn reset(&mut self) {
        dispatch!(self, fx => fx.reset())
    }

    #[inline]
    fn process(
        &mut self,
        block: &mut AudioBlock<'_>,
        params: &ParamValues<'_>,
        transport: &TransportInfo,
    ) {
        dispatch!(self, fx => fx.process(block, params, transport))
    }

    fn flush_denormals(&mut self) {
        dispatch!(self, fx => fx.flush_denormals())
    }

    fn bypass_mode(&self) -> BypassMode {
        dispatch!(self, fx => fx.bypass_mode())
    }

    fn meter(&mut self) -> Option<ProcessorEvent> {
        dispatch!(self, fx => fx.meter())
    }

    fn default_mix(&self) -> f32 {
        dispatch!(self, fx => fx.default_mix())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::COMMON_PARAMS;
    use std::collections::HashSet;

    #[test]
    fn test_kind_round_trip() {
        let config = EngineConfig::default();
        for kind in EffectKind::ALL {
            let effect = Effect::new(kind, &config);
            assert_eq!(effect.kind(), kind);
            assert_eq!(EffectKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(EffectKind::from_name(" tape echo "), Some(EffectKind::TapeEcho));
        assert_eq!(EffectKind::from_name("reverb"), None);
    }

    #[test]
    fn test_param_ids_unique_and_defaults_in_range() {
        let config = EngineConfig::default();
        for kind in EffectKind::ALL {
            let effect = Effect::new(kind, &config);
            let mut ids: HashSet<&str> = COMMON_PARAMS.iter().map(|s| s.id).collect();
            for spec in effect.params() {
                assert!(ids.insert(spec.id), "{}: duplicate id {}", kind.name(), spec.id);
                assert!(
                    spec.min <= spec.default && spec.default <= spec.max,
                    "{}: default of {} out of range",
                    kind.name(),
                    spec.id
                );
                assert_eq!(spec.clamp(spec.default), spec.default);
            }
        }
    }

    #[test]
    fn test_every_effect_survives_silence_and_full_scale() {
        let transport = TransportInfo::default();
        for kind in EffectKind::ALL {
            let (mut effect, values) = test_util::prepared(kind, 48000.0, 2);
            let mut data: Vec<f32> = (0..4096)
                .map(|i| if i % 2048 < 1024 { 0.0 } else { 1.0 })
                .collect();
            test_util::run(&mut effect, &values, &mut data, 2, &transport);
            assert!(
                data.iter().all(|s| s.is_finite() && s.abs() < 8.0),
                "{} produced unbounded output",
                kind.name()
            );
        }
    }
}
