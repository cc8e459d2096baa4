//! Drains a spectrum tap and analyzes it hop by hop

use ringbuf::traits::{Consumer, Observer};
use ringbuf::HeapCons;

use crate::spectrum::{SpectrumAnalyzer, SpectrumData, DEFAULT_FFT_SIZE};
use crate::AnalysisError;

/// Reader end of a spectrum tap
///
/// Keeps the last `fft_size` samples and re-analyzes after every `hop` new
/// ones. Call [`SpectrumReader::poll`] from a UI or worker thread.
pub struct SpectrumReader {
    consumer: HeapCons<f32>,
    analyzer: SpectrumAnalyzer,
    history: Vec<f32>,
    chunk: Vec<f32>,
    hop: usize,
    pending: usize,
}

impl std::fmt::Debug for SpectrumReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumReader")
            .field("analyzer", &self.analyzer)
            .field("hop", &self.hop)
            .field("pending", &self.pending)
            .finish()
    }
}

impl SpectrumReader {
    pub fn new(
        consumer: HeapCons<f32>,
        sample_rate: f32,
        fft_size: usize,
        hop: usize,
    ) -> Result<Self, AnalysisError> {
        let analyzer = SpectrumAnalyzer::new(sample_rate, fft_size)?;
        if hop == 0 || hop > fft_size {
            return Err(AnalysisError::InvalidHopSize { hop, fft_size });
        }
        tracing::debug!(sample_rate, fft_size, hop, "spectrum reader ready");
        Ok(Self {
            consumer,
            analyzer,
            history: vec![0.0; fft_size],
            chunk: vec![0.0; hop],
            hop,
            pending: 0,
        })
    }

    /// 2048-point FFT with 75% overlap
    pub fn with_defaults(consumer: HeapCons<f32>, sample_rate: f32) -> Result<Self, AnalysisError> {
        Self::new(consumer, sample_rate, DEFAULT_FFT_SIZE, DEFAULT_FFT_SIZE / 4)
    }

    pub fn analyzer_mut(&mut self) -> &mut SpectrumAnalyzer {
        &mut self.analyzer
    }

    /// Samples waiting in the ring
    pub fn available(&self) -> usize {
        self.consumer.occupied_len()
    }

    /// Drain the ring; returns the newest spectrum if at least one hop completed
    pub fn poll(&mut self) -> Option<SpectrumData> {
        let mut latest = None;
        loop {
            let wanted = self.hop - self.pending;
            let got = self.consumer.pop_slice(&mut self.chunk[..wanted]);
            if got == 0 {
                break;
            }

            let len = self.history.len();
            self.history.copy_within(got.., 0);
            self.history[len - got..].copy_from_slice(&self.chunk[..got]);

            self.pending += got;
            if self.pending == self.hop {
                self.pending = 0;
                latest = Some(self.analyzer.process(&self.history));
            }
        }
        latest
    }

    /// Forget buffered history and smoothing
    pub fn reset(&mut self) {
        self.consumer.clear();
        self.history.fill(0.0);
        self.pending = 0;
        self.analyzer.reset();
    }
}
