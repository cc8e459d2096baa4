//! DSP primitives for fxkit
//!
//! The shared component library every effect is built from:
//! - Coefficients: RBJ cookbook biquad design (pure functions)
//! - Biquad: DF-II-transposed stages and flat multi-role filter banks
//! - Envelope: attack/release followers and gain smoothers
//! - Dynamics: static gain curves (compressor, limiter, gate) and transient detection
//! - Crossover: Linkwitz-Riley band splitting with phase-coherent recombination
//! - Delay line / LFO / modulated voices: chorus, flanger and echo building blocks
//! - Stereo: mid/side matrix
//! - Noise: white/pink/brown synthesis with burst envelopes
//!
//! Everything here is allocation-free after construction and never panics on
//! the per-sample path. Invalid parameters are clamped, not reported.

pub mod biquad;
pub mod coefficients;
pub mod crossover;
pub mod delay_line;
pub mod dynamics;
pub mod envelope;
pub mod lfo;
pub mod math;
pub mod modulated;
pub mod noise;
pub mod stereo;

pub use biquad::{Biquad, BiquadState, FilterBank};
pub use coefficients::{FilterCoefficients, FilterShape};
pub use crossover::{Crossover, CrossoverOrder, SplitPoint, SplitTopology};
pub use delay_line::DelayLine;
pub use dynamics::{GainComputer, TransientDetector};
pub use envelope::{Detection, EnvelopeFollower, GainSmoother, Polarity, SmoothedValue};
pub use lfo::{Lfo, NoteDivision, PhaseAccumulator, Waveform};
pub use modulated::{ChorusVoices, FeedbackDelay};
pub use noise::{BurstEnvelope, NoiseColor, NoiseSource, Xorshift};
pub use stereo::StereoMatrix;
