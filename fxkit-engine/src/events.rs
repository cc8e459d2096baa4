//! Events sent from the audio thread
//!
//! Events are `Copy` and fixed-size so sending never allocates. The sender
//! uses `try_send`; a full channel drops the event.

use crossbeam_channel::{bounded, Receiver, Sender};

/// Channels carried in one level event
pub const MAX_METER_CHANNELS: usize = 8;

/// Metering output of a processor
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProcessorEvent {
    /// Current gain reduction in dB (positive = attenuating)
    GainReduction { db: f32 },
    /// Per-channel peak and RMS levels in dBFS
    Levels {
        channels: usize,
        peak_db: [f32; MAX_METER_CHANNELS],
        rms_db: [f32; MAX_METER_CHANNELS],
    },
}

/// Create the bounded event channel
pub fn event_channel(capacity: usize) -> (Sender<ProcessorEvent>, Receiver<ProcessorEvent>) {
    bounded(capacity.max(1))
}

/// Rate limiter for meter events, counted in samples
#[derive(Debug, Clone, Copy)]
pub struct MeterThrottle {
    interval: usize,
    elapsed: usize,
}

impl MeterThrottle {
    pub fn new(interval_samples: usize) -> Self {
        Self {
            interval: interval_samples.max(1),
            elapsed: 0,
        }
    }

    /// Count processed samples; true when an event is due
    #[inline]
    pub fn tick(&mut self, samples: usize) -> bool {
        self.elapsed += samples;
        if self.elapsed >= self.interval {
            self.elapsed %= self.interval;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.elapsed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle() {
        let mut throttle = MeterThrottle::new(1000);
        assert!(!throttle.tick(512));
        assert!(throttle.tick(512));
        assert!(!throttle.tick(512));
        assert!(throttle.tick(4096));
    }

    #[test]
    fn test_full_channel_drops() {
        let (tx, rx) = event_channel(1);
        assert!(tx.try_send(ProcessorEvent::GainReduction { db: 1.0 }).is_ok());
        assert!(tx.try_send(ProcessorEvent::GainReduction { db: 2.0 }).is_err());
        assert_eq!(rx.try_recv(), Ok(ProcessorEvent::GainReduction { db: 1.0 }));
    }
}
