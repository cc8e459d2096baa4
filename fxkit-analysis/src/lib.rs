//! Audio analysis for fxkit
//!
//! Consumers that run off the audio thread:
//! - Spectrum: windowed FFT reduced to log-spaced bands
//! - Reader: drains a spectrum tap's ring and analyzes hop by hop

mod reader;
mod spectrum;

use thiserror::Error;

pub use reader::SpectrumReader;
pub use spectrum::{SpectrumAnalyzer, SpectrumData, DEFAULT_FFT_SIZE, SPECTRUM_BANDS};

/// Invalid analyzer setup
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum AnalysisError {
    #[error("FFT size {0} must be a power of two between 64 and 16384")]
    InvalidFftSize(usize),
    #[error("sample rate {0} must be positive and finite")]
    InvalidSampleRate(f32),
    #[error("hop size {hop} must be between 1 and the FFT size {fft_size}")]
    InvalidHopSize { hop: usize, fft_size: usize },
}
