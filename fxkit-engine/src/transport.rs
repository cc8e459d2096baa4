//! Host tempo consumption
//!
//! The host (or a test) publishes tempo through a [`TransportProvider`];
//! the block processor resolves it once per block into a [`TransportInfo`].

use std::sync::atomic::{AtomicU32, Ordering};

pub const DEFAULT_BPM: f32 = 120.0;
pub const MIN_BPM: f32 = 20.0;
pub const MAX_BPM: f32 = 999.0;

/// Source of host tempo
pub trait TransportProvider: Send + Sync {
    /// Current tempo, or `None` when the host does not report one
    fn bpm(&self) -> Option<f32>;
}

/// Lock-free tempo cell; NaN bits mean "no tempo"
#[derive(Debug)]
pub struct AtomicTempo {
    bits: AtomicU32,
}

impl Default for AtomicTempo {
    fn default() -> Self {
        Self::new(DEFAULT_BPM)
    }
}

impl AtomicTempo {
    pub fn new(bpm: f32) -> Self {
        Self {
            bits: AtomicU32::new(bpm.to_bits()),
        }
    }

    /// Tempo cell that reports no tempo until set
    pub fn unset() -> Self {
        Self {
            bits: AtomicU32::new(f32::NAN.to_bits()),
        }
    }

    pub fn set_bpm(&self, bpm: f32) {
        self.bits.store(bpm.to_bits(), Ordering::Relaxed);
    }

    pub fn clear(&self) {
        self.bits.store(f32::NAN.to_bits(), Ordering::Relaxed);
    }
}

impl TransportProvider for AtomicTempo {
    fn bpm(&self) -> Option<f32> {
        let bpm = f32::from_bits(self.bits.load(Ordering::Relaxed));
        if bpm.is_nan() {
            None
        } else {
            Some(bpm)
        }
    }
}

/// Tempo state for one block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportInfo {
    pub bpm: f32,
    /// False when `bpm` is the fallback rather than host tempo
    pub host_tempo: bool,
}

impl Default for TransportInfo {
    fn default() -> Self {
        Self::with_bpm(DEFAULT_BPM)
    }
}

impl TransportInfo {
    pub fn with_bpm(bpm: f32) -> Self {
        Self {
            bpm: clamp_bpm(bpm).unwrap_or(DEFAULT_BPM),
            host_tempo: false,
        }
    }

    /// Host tempo if valid, otherwise `fallback_bpm`
    pub fn resolve(provider: Option<&dyn TransportProvider>, fallback_bpm: f32) -> Self {
        match provider.and_then(|p| p.bpm()).and_then(clamp_bpm) {
            Some(bpm) => Self {
                bpm,
                host_tempo: true,
            },
            None => Self::with_bpm(fallback_bpm),
        }
    }
}

/// Finite tempos are clamped into range; non-finite ones rejected
fn clamp_bpm(bpm: f32) -> Option<f32> {
    if bpm.is_finite() && bpm > 0.0 {
        Some(bpm.clamp(MIN_BPM, MAX_BPM))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_atomic_tempo() {
        let tempo = AtomicTempo::new(128.0);
        assert_eq!(tempo.bpm(), Some(128.0));
        tempo.clear();
        assert_eq!(tempo.bpm(), None);
        assert_eq!(AtomicTempo::unset().bpm(), None);
    }

    #[test]
    fn test_resolve_falls_back() {
        assert_eq!(TransportInfo::resolve(None, 120.0).bpm, 120.0);

        let tempo = AtomicTempo::unset();
        let info = TransportInfo::resolve(Some(&tempo), 90.0);
        assert_eq!(info.bpm, 90.0);
        assert!(!info.host_tempo);

        tempo.set_bpm(f32::INFINITY);
        assert_eq!(TransportInfo::resolve(Some(&tempo), 90.0).bpm, 90.0);
    }

    #[test]
    fn test_resolve_clamps_host_tempo() {
        let tempo = AtomicTempo::new(5000.0);
        let info = TransportInfo::resolve(Some(&tempo), 120.0);
        assert_eq!(info.bpm, MAX_BPM);
        assert!(info.host_tempo);
    }

    #[test]
    fn test_tempo_shared_across_threads() {
        let tempo = Arc::new(AtomicTempo::default());
        let writer = Arc::clone(&tempo);
        std::thread::spawn(move || writer.set_bpm(174.0))
            .join()
            .unwrap();
        assert_eq!(tempo.bpm(), Some(174.0));
    }
}
