//! Engine configuration and the per-prepare process spec

use fxkit_dsp::math::{sanitize_sample_rate, DEFAULT_SAMPLE_RATE};
use thiserror::Error;

use crate::events::MAX_METER_CHANNELS;
use crate::transport::{DEFAULT_BPM, MAX_BPM, MIN_BPM};

/// Errors found when validating an [`EngineConfig`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid default sample rate: {0}")]
    InvalidSampleRate(f32),
    #[error("Default tempo {0} BPM outside the supported range")]
    InvalidTempo(f32),
    #[error("Meter interval must be positive, got {0} ms")]
    InvalidMeterInterval(f32),
    #[error("Capacity for {0} must be non-zero")]
    ZeroCapacity(&'static str),
    #[error("Meter channels {requested} exceeds maximum {max}")]
    TooManyMeterChannels { requested: usize, max: usize },
    #[error("Block size must be non-zero")]
    ZeroBlockSize,
}

/// Engine-wide settings fixed at construction
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Used when a processor runs before `prepare`
    pub default_sample_rate: f32,
    /// Used when the host provides no tempo
    pub default_bpm: f32,
    /// Block size used before the first `prepare`
    pub default_block_size: usize,
    /// Minimum time between meter events
    pub meter_interval_ms: f32,
    /// Bounded event channel capacity
    pub event_capacity: usize,
    /// Spectrum tap ring capacity (samples)
    pub spectrum_capacity: usize,
    /// Channels reported in level events
    pub max_meter_channels: usize,
    /// Ramp length for trims and mix
    pub smoothing_ms: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_sample_rate: DEFAULT_SAMPLE_RATE,
            default_bpm: DEFAULT_BPM,
            default_block_size: 512,
            meter_interval_ms: 33.0,
            event_capacity: 256,
            spectrum_capacity: 16384,
            max_meter_channels: 2,
            smoothing_ms: 20.0,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.default_sample_rate.is_finite() && self.default_sample_rate > 0.0) {
            return Err(ConfigError::InvalidSampleRate(self.default_sample_rate));
        }
        if !(MIN_BPM..=MAX_BPM).contains(&self.default_bpm) {
            return Err(ConfigError::InvalidTempo(self.default_bpm));
        }
        if !(self.meter_interval_ms.is_finite() && self.meter_interval_ms > 0.0) {
            return Err(ConfigError::InvalidMeterInterval(self.meter_interval_ms));
        }
        if self.default_block_size == 0 {
            return Err(ConfigError::ZeroBlockSize);
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("events"));
        }
        if self.spectrum_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("spectrum"));
        }
        if self.max_meter_channels > MAX_METER_CHANNELS {
            return Err(ConfigError::TooManyMeterChannels {
                requested: self.max_meter_channels,
                max: MAX_METER_CHANNELS,
            });
        }
        Ok(())
    }

    /// Meter interval in samples at a sample rate (at least 1)
    pub fn meter_interval_samples(&self, sample_rate: f32) -> usize {
        ((self.meter_interval_ms * 0.001 * sample_rate) as usize).max(1)
    }
}

/// Host-provided processing setup, delivered on prepare
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessSpec {
    pub sample_rate: f32,
    pub max_block_size: usize,
    pub channels: usize,
}

impl ProcessSpec {
    pub fn new(sample_rate: f32, max_block_size: usize, channels: usize) -> Self {
        Self {
            sample_rate,
            max_block_size,
            channels,
        }
    }

    /// Replace invalid fields: bad sample rates fall back to 44100 Hz,
    /// zero block sizes and channel counts become 1
    pub fn sanitized(self) -> Self {
        Self {
            sample_rate: sanitize_sample_rate(self.sample_rate),
            max_block_size: self.max_block_size.max(1),
            channels: self.channels.max(1),
        }
    }

    /// Samples for a duration in milliseconds, rounded up
    pub fn samples_for_ms(&self, ms: f32) -> usize {
        (ms * 0.001 * self.sample_rate).ceil().max(0.0) as usize
    }
}

impl Default for ProcessSpec {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE, 512, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(EngineConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_invalid_configs() {
        let bad_rate = EngineConfig {
            default_sample_rate: 0.0,
            ..Default::default()
        };
        assert_eq!(bad_rate.validate(), Err(ConfigError::InvalidSampleRate(0.0)));

        let bad_tempo = EngineConfig {
            default_bpm: 5000.0,
            ..Default::default()
        };
        assert_eq!(bad_tempo.validate(), Err(ConfigError::InvalidTempo(5000.0)));

        let no_events = EngineConfig {
            event_capacity: 0,
            ..Default::default()
        };
        assert_eq!(no_events.validate(), Err(ConfigError::ZeroCapacity("events")));

        let too_many = EngineConfig {
            max_meter_channels: MAX_METER_CHANNELS + 1,
            ..Default::default()
        };
        assert!(matches!(
            too_many.validate(),
            Err(ConfigError::TooManyMeterChannels { .. })
        ));
    }

    #[test]
    fn test_spec_sanitized() {
        let spec = ProcessSpec::new(-1.0, 0, 0).sanitized();
        assert_eq!(spec.sample_rate, DEFAULT_SAMPLE_RATE);
        assert_eq!(spec.max_block_size, 1);
        assert_eq!(spec.channels, 1);

        let ok = ProcessSpec::new(96000.0, 256, 2);
        assert_eq!(ok.sanitized(), ok);
    }

    #[test]
    fn test_meter_interval_samples() {
        let config = EngineConfig::default();
        assert_eq!(config.meter_interval_samples(48000.0), 1584);
    }
}
