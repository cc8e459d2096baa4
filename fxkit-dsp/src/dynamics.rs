//! Static dynamics curves and transient detection
//!
//! Hard-knee curves map a detected level (dB) to a gain change (dB).
//! Attack/release behaviour lives in the envelope followers feeding them.

use crate::envelope::EnvelopeFollower;
use crate::math::{db_to_gain, SILENCE_DB};

/// Hard-knee gain curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GainComputer {
    /// Downward compression above `threshold_db` by `ratio`
    Compressor { threshold_db: f32, ratio: f32 },
    /// Infinite-ratio compression above `threshold_db`
    Limiter { threshold_db: f32 },
    /// Unity above `threshold_db`, `floor_db` attenuation below
    Gate { threshold_db: f32, floor_db: f32 },
}

impl GainComputer {
    pub fn compressor(threshold_db: f32, ratio: f32) -> Self {
        Self::Compressor {
            threshold_db,
            ratio,
        }
    }

    pub fn limiter(threshold_db: f32) -> Self {
        Self::Limiter { threshold_db }
    }

    pub fn gate(threshold_db: f32, floor_db: f32) -> Self {
        Self::Gate {
            threshold_db,
            floor_db: floor_db.min(0.0),
        }
    }

    pub fn threshold_db(&self) -> f32 {
        match *self {
            Self::Compressor { threshold_db, .. }
            | Self::Limiter { threshold_db }
            | Self::Gate { threshold_db, .. } => threshold_db,
        }
    }

    /// Gain change in dB (≤ 0) for a detected level in dB
    #[inline]
    pub fn gain_db(&self, level_db: f32) -> f32 {
        match *self {
            Self::Compressor {
                threshold_db,
                ratio,
            } => {
                // Ratios at or below 1 (and NaN) leave the signal alone
                if !(ratio > 1.0) || level_db <= threshold_db {
                    0.0
                } else {
                    threshold_db + (level_db - threshold_db) / ratio - level_db
                }
            }
            Self::Limiter { threshold_db } => {
                if level_db <= threshold_db {
                    0.0
                } else {
                    threshold_db - level_db
                }
            }
            Self::Gate {
                threshold_db,
                floor_db,
            } => {
                if level_db >= threshold_db {
                    0.0
                } else {
                    floor_db
                }
            }
        }
    }

    /// Linear gain for a detected level in dB
    #[inline]
    pub fn gain(&self, level_db: f32) -> f32 {
        db_to_gain(self.gain_db(level_db))
    }

    /// Steady-state gain reduction for a level, used for auto makeup
    pub fn reduction_at(&self, level_db: f32) -> f32 {
        -self.gain_db(level_db)
    }
}

/// Fast/slow envelope differencer
///
/// Reports `max(fast - slow, 0)`: positive while the signal rises faster
/// than the slow follower can track (attack transients).
#[derive(Debug, Clone)]
pub struct TransientDetector {
    fast: EnvelopeFollower,
    slow: EnvelopeFollower,
}

impl TransientDetector {
    pub const FAST_ATTACK_MS: f32 = 0.5;
    pub const FAST_RELEASE_MS: f32 = 20.0;
    pub const SLOW_ATTACK_MS: f32 = 20.0;
    pub const SLOW_RELEASE_MS: f32 = 200.0;

    pub fn new(sample_rate: f32) -> Self {
        Self {
            fast: EnvelopeFollower::new(sample_rate, Self::FAST_ATTACK_MS, Self::FAST_RELEASE_MS),
            slow: EnvelopeFollower::new(sample_rate, Self::SLOW_ATTACK_MS, Self::SLOW_RELEASE_MS),
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.fast.set_sample_rate(sample_rate);
        self.slow.set_sample_rate(sample_rate);
    }

    /// Transient amount (linear) for one sample
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let fast = self.fast.process(input);
        let slow = self.slow.process(input);
        (fast - slow).max(0.0)
    }

    /// Signed transient shape for one sample
    ///
    /// `(fast - slow) / fast` clamped to `[-1, 1]`: positive on attacks,
    /// negative in the decay tail, zero below -120 dBFS.
    #[inline]
    pub fn shape(&mut self, input: f32) -> f32 {
        let fast = self.fast.process(input);
        let slow = self.slow.process(input);
        if fast > 1e-6 {
            ((fast - slow) / fast).clamp(-1.0, 1.0)
        } else {
            0.0
        }
    }

    /// Sustain amount: how far the slow follower sits above the fast one
    pub fn sustain(&self) -> f32 {
        (self.slow.level() - self.fast.level()).max(0.0)
    }

    /// Both envelopes, linear `(fast, slow)`
    pub fn levels(&self) -> (f32, f32) {
        (self.fast.level(), self.slow.level())
    }

    /// Both envelopes in dB, `(fast, slow)`
    pub fn levels_db(&self) -> (f32, f32) {
        (self.fast.level_db(), self.slow.level_db())
    }

    pub fn reset(&mut self) {
        self.fast.reset();
        self.slow.reset();
    }

    pub fn flush_denormals(&mut self) {
        self.fast.flush_denormals();
        self.slow.flush_denormals();
    }
}

/// Silence-safe level in dB from a linear envelope
#[inline]
pub fn level_db(envelope: f32) -> f32 {
    if envelope > 0.0 {
        crate::math::gain_to_db(envelope)
    } else {
        SILENCE_DB
    }
}
