//! Effect engine for fxkit - parameters, block processing, and effects
//!
//! This crate composes the `fxkit-dsp` primitives into host-facing processors:
//! - Params: lock-free parameter store and per-block snapshots
//! - Transport: tempo source for synced effects
//! - Processor: block driver with trims, dry/wet mix, soft bypass and chunking
//! - Effects: dynamics, filters, modulation, echo, stereo, noise and analysis
//! - Events: meter output over a bounded channel

mod config;
pub mod effects;
mod events;
mod params;
mod processor;
mod transport;

pub use config::{ConfigError, EngineConfig, ProcessSpec};
pub use effects::{Effect, EffectKind};
pub use events::{event_channel, MeterThrottle, ProcessorEvent, MAX_METER_CHANNELS};
pub use params::{
    defaults, CommonParams, ParamError, ParamKind, ParamSpec, ParamStore, ParamValues,
    ParamWatch, ParameterGateway, BYPASS, COMMON_COUNT, COMMON_PARAMS, INPUT_TRIM_DB, MIX,
    OUTPUT_TRIM_DB,
};
pub use processor::{AudioBlock, BlockProcessor, BypassMode, Processor};
pub use transport::{AtomicTempo, TransportInfo, TransportProvider, DEFAULT_BPM, MAX_BPM, MIN_BPM};
