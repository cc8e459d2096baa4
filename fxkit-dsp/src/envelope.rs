//! Envelope followers and smoothers
//!
//! - `EnvelopeFollower`: one-pole tracker with separate attack/release
//!   coefficients `exp(-1 / (time_ms * 0.001 * sample_rate))`
//! - `GainSmoother`: fixed per-sample one-pole toward a gain target, applied
//!   after the gain computer to avoid audible stepping
//! - `SmoothedValue`: linear ramp for trims and mix amounts

/// One-pole coefficient for a time constant in milliseconds
///
/// Zero or negative times yield `0.0` (instant response).
#[inline]
pub fn time_constant(time_ms: f32, sample_rate: f32) -> f32 {
    let samples = time_ms * 0.001 * sample_rate;
    if samples > 0.0 && samples.is_finite() {
        (-1.0 / samples).exp()
    } else {
        0.0
    }
}

/// Which direction of movement is the attack phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Polarity {
    /// Rising values attack (signal level detection)
    #[default]
    Level,
    /// Falling values attack (gain-reduction tracking)
    Gain,
}

/// Detector applied to the input before tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Detection {
    /// Rectified sample magnitude
    #[default]
    Peak,
    /// Mean square, reported as its square root
    Rms,
}

/// Attack/release envelope follower
#[derive(Debug, Clone)]
pub struct EnvelopeFollower {
    level: f32,
    attack_coeff: f32,
    release_coeff: f32,
    attack_ms: f32,
    release_ms: f32,
    sample_rate: f32,
    polarity: Polarity,
    detection: Detection,
}

impl EnvelopeFollower {
    /// Peak follower in level polarity
    pub fn new(sample_rate: f32, attack_ms: f32, release_ms: f32) -> Self {
        let mut env = Self {
            level: 0.0,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            attack_ms,
            release_ms,
            sample_rate,
            polarity: Polarity::Level,
            detection: Detection::Peak,
        };
        env.update_coefficients();
        env
    }

    pub fn with_polarity(mut self, polarity: Polarity) -> Self {
        self.polarity = polarity;
        self
    }

    pub fn with_detection(mut self, detection: Detection) -> Self {
        self.detection = detection;
        self
    }

    pub fn set_detection(&mut self, detection: Detection) {
        if self.detection != detection {
            self.detection = detection;
            self.level = 0.0;
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.update_coefficients();
    }

    pub fn set_attack_ms(&mut self, ms: f32) {
        self.attack_ms = ms.max(0.0);
        self.attack_coeff = time_constant(self.attack_ms, self.sample_rate);
    }

    pub fn set_release_ms(&mut self, ms: f32) {
        self.release_ms = ms.max(0.0);
        self.release_coeff = time_constant(self.release_ms, self.sample_rate);
    }

    pub fn attack_ms(&self) -> f32 {
        self.attack_ms
    }

    pub fn release_ms(&self) -> f32 {
        self.release_ms
    }

    fn update_coefficients(&mut self) {
        self.attack_coeff = time_constant(self.attack_ms, self.sample_rate);
        self.release_coeff = time_constant(self.release_ms, self.sample_rate);
    }

    /// Move the tracked value toward `target`
    ///
    /// Gain polarity: `level > target` uses the attack coefficient.
    /// Level polarity: `level < target` uses the attack coefficient.
    #[inline]
    pub fn track(&mut self, target: f32) -> f32 {
        let attacking = match self.polarity {
            Polarity::Gain => self.level > target,
            Polarity::Level => self.level < target,
        };
        let coeff = if attacking {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.level = coeff * self.level + (1.0 - coeff) * target;
        self.level
    }

    /// Detect and track one input sample, returning the envelope (linear)
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        match self.detection {
            Detection::Peak => self.track(input.abs()),
            Detection::Rms => self.track(input * input).sqrt(),
        }
    }

    /// Current envelope value (linear amplitude)
    pub fn level(&self) -> f32 {
        match self.detection {
            Detection::Peak => self.level,
            Detection::Rms => self.level.sqrt(),
        }
    }

    /// Current envelope value in dB
    pub fn level_db(&self) -> f32 {
        match self.detection {
            Detection::Peak => crate::math::gain_to_db(self.level),
            Detection::Rms => crate::math::power_to_db(self.level),
        }
    }

    pub fn reset(&mut self) {
        self.level = 0.0;
    }

    /// Force the tracked value (raw domain: amplitude or mean square)
    pub fn reset_to(&mut self, value: f32) {
        self.level = value;
    }

    pub fn flush_denormals(&mut self) {
        self.level = crate::math::flush_denormal(self.level);
    }
}

/// Per-sample one-pole gain smoother
#[derive(Debug, Clone, Copy)]
pub struct GainSmoother {
    current: f32,
    coeff: f32,
}

impl Default for GainSmoother {
    fn default() -> Self {
        Self::new()
    }
}

impl GainSmoother {
    pub const DEFAULT_COEFF: f32 = 0.015;
    pub const MIN_COEFF: f32 = 0.01;
    pub const MAX_COEFF: f32 = 0.02;

    /// Unity gain, default coefficient
    pub fn new() -> Self {
        Self {
            current: 1.0,
            coeff: Self::DEFAULT_COEFF,
        }
    }

    /// Coefficient clamped to the 0.01-0.02 per-sample band
    pub fn with_coefficient(coeff: f32) -> Self {
        Self {
            current: 1.0,
            coeff: coeff.clamp(Self::MIN_COEFF, Self::MAX_COEFF),
        }
    }

    #[inline]
    pub fn process(&mut self, target: f32) -> f32 {
        self.current += self.coeff * (target - self.current);
        self.current
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn reset(&mut self) {
        self.current = 1.0;
    }

    pub fn reset_to(&mut self, value: f32) {
        self.current = value;
    }
}

/// Linear ramp toward a target over a fixed time
#[derive(Debug, Clone, Copy)]
pub struct SmoothedValue {
    current: f32,
    target: f32,
    step: f32,
    remaining: u32,
    ramp_samples: u32,
}

impl SmoothedValue {
    pub fn new(initial: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            step: 0.0,
            remaining: 0,
            ramp_samples: 0,
        }
    }

    /// Set ramp length; snaps to the target
    pub fn reset(&mut self, sample_rate: f32, ramp_ms: f32) {
        self.ramp_samples = (ramp_ms.max(0.0) * 0.001 * sample_rate) as u32;
        self.current = self.target;
        self.remaining = 0;
    }

    pub fn set_target(&mut self, target: f32) {
        if target == self.target {
            return;
        }
        self.target = target;
        if self.ramp_samples == 0 {
            self.current = target;
            self.remaining = 0;
        } else {
            self.remaining = self.ramp_samples;
            self.step = (target - self.current) / self.ramp_samples as f32;
        }
    }

    /// Jump to a value without ramping
    pub fn set_immediate(&mut self, value: f32) {
        self.target = value;
        self.current = value;
        self.remaining = 0;
    }

    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.remaining > 0 {
            self.remaining -= 1;
            self.current = if self.remaining == 0 {
                self.target
            } else {
                self.current + self.step
            };
        }
        self.current
    }

    pub fn is_smoothing(&self) -> bool {
        self.remaining > 0
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }
}
