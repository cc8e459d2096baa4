//! FFT-based spectrum analyzer for real-time visualization

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

use crate::AnalysisError;

/// Number of frequency bands in the spectrum display
pub const SPECTRUM_BANDS: usize = 32;

pub const DEFAULT_FFT_SIZE: usize = 2048;

const MIN_FFT_SIZE: usize = 64;
const MAX_FFT_SIZE: usize = 16384;

/// Spectrum data for visualization
#[derive(Clone, Copy, Debug, Default)]
pub struct SpectrumData {
    /// Estimated sine amplitude per band (0.0 - 1.0)
    pub bands: [f32; SPECTRUM_BANDS],
    /// Peak sample level of the analyzed window (0.0 - 1.0)
    pub peak: f32,
}

impl SpectrumData {
    /// Band level in dBFS, floored at -120
    pub fn band_db(&self, band: usize) -> f32 {
        let level = self.bands.get(band).copied().unwrap_or(0.0);
        20.0 * level.max(1e-6).log10()
    }

    /// Index of the strongest band
    pub fn loudest_band(&self) -> usize {
        self.bands
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }
}

/// Real-time FFT spectrum analyzer
pub struct SpectrumAnalyzer {
    sample_rate: f32,
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    frequency_bands: [(f32, f32); SPECTRUM_BANDS],
    smoothing: f32,
    previous_magnitudes: [f32; SPECTRUM_BANDS],
    fft_buffer: Vec<Complex<f32>>,
    fft_scratch: Vec<Complex<f32>>,
}

impl std::fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("sample_rate", &self.sample_rate)
            .field("fft_size", &self.fft_size)
            .field("smoothing", &self.smoothing)
            .finish()
    }
}

impl SpectrumAnalyzer {
    /// Create an analyzer; `fft_size` must be a power of two in 64..=16384
    pub fn new(sample_rate: f32, fft_size: usize) -> Result<Self, AnalysisError> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(AnalysisError::InvalidSampleRate(sample_rate));
        }
        if !fft_size.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&fft_size) {
            return Err(AnalysisError::InvalidFftSize(fft_size));
        }

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch_len = fft.get_inplace_scratch_len();

        // Hann window
        let window: Vec<f32> = (0..fft_size)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / fft_size as f32).cos()))
            .collect();

        // Logarithmically spaced bands, 20 Hz up to 20 kHz or Nyquist
        let mut bands = [(0.0f32, 0.0f32); SPECTRUM_BANDS];
        let min_freq = 20.0f32;
        let max_freq = 20000.0f32.min(sample_rate / 2.0);
        let log_min = min_freq.ln();
        let log_max = max_freq.ln();

        for (i, band) in bands.iter_mut().enumerate() {
            let t0 = i as f32 / SPECTRUM_BANDS as f32;
            let t1 = (i + 1) as f32 / SPECTRUM_BANDS as f32;
            *band = (
                (log_min + t0 * (log_max - log_min)).exp(),
                (log_min + t1 * (log_max - log_min)).exp(),
            );
        }

        Ok(Self {
            sample_rate,
            fft_size,
            fft,
            window,
            frequency_bands: bands,
            smoothing: 0.7,
            previous_magnitudes: [0.0; SPECTRUM_BANDS],
            fft_buffer: vec![Complex::new(0.0, 0.0); fft_size],
            fft_scratch: vec![Complex::new(0.0, 0.0); scratch_len],
        })
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Lower and upper edge of each band in Hz
    pub fn band_edges(&self) -> &[(f32, f32); SPECTRUM_BANDS] {
        &self.frequency_bands
    }

    /// Weight of the previous frame, 0 (none) to 0.99
    pub fn set_smoothing(&mut self, smoothing: f32) {
        self.smoothing = smoothing.clamp(0.0, 0.99);
    }

    pub fn smoothing(&self) -> f32 {
        self.smoothing
    }

    pub fn reset(&mut self) {
        self.previous_magnitudes = [0.0; SPECTRUM_BANDS];
    }

    /// Analyze mono samples (the first `fft_size`, zero-padded) into band levels
    pub fn analyze(&mut self, samples: &[f32]) -> [f32; SPECTRUM_BANDS] {
        let sample_count = samples.len().min(self.fft_size);
        for ((buf, &sample), &w) in self
            .fft_buffer
            .iter_mut()
            .zip(samples.iter().take(sample_count))
            .zip(self.window.iter())
        {
            *buf = Complex::new(sample * w, 0.0);
        }
        for buf in self.fft_buffer.iter_mut().skip(sample_count) {
            *buf = Complex::new(0.0, 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.fft_buffer, &mut self.fft_scratch);

        // A Hann-windowed sine of amplitude A peaks at A·N/4
        let scale = 4.0 / self.fft_size as f32;
        let bin_width = self.sample_rate / self.fft_size as f32;
        let nyquist_bin = self.fft_size / 2;

        let mut magnitudes = [0.0f32; SPECTRUM_BANDS];
        for (mag, &(low, high)) in magnitudes.iter_mut().zip(self.frequency_bands.iter()) {
            let start_bin = ((low / bin_width) as usize).min(nyquist_bin);
            let end_bin = ((high / bin_width).ceil() as usize)
                .max(start_bin + 1)
                .min(nyquist_bin + 1);
            if start_bin < end_bin {
                let strongest = self.fft_buffer[start_bin..end_bin]
                    .iter()
                    .map(|c| c.norm())
                    .fold(0.0f32, f32::max);
                *mag = (strongest * scale).clamp(0.0, 1.0);
            }
        }

        for (mag, prev) in magnitudes
            .iter_mut()
            .zip(self.previous_magnitudes.iter_mut())
        {
            *mag = *prev * self.smoothing + *mag * (1.0 - self.smoothing);
            *prev = *mag;
        }

        magnitudes
    }

    /// Get the peak level from samples (0.0 - 1.0)
    pub fn peak_level(samples: &[f32]) -> f32 {
        samples
            .iter()
            .map(|s| s.abs())
            .fold(0.0f32, f32::max)
            .min(1.0)
    }

    /// Process samples and return SpectrumData
    pub fn process(&mut self, samples: &[f32]) -> SpectrumData {
        let bands = self.analyze(samples);
        let peak = Self::peak_level(&samples[..samples.len().min(self.fft_size)]);
        SpectrumData { bands, peak }
    }
}
