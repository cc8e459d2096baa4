//! Fractional circular delay line
//!
//! Read convention: after `push_sample(x[n])`, a read at delay `d` returns
//! `x[n - d]`, linearly interpolated between the two neighbouring slots.
//! Integer delays are exact passthrough.

/// Circular buffer with a fractional read head
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
    delay: f32,
    max_delay: usize,
}

impl DelayLine {
    /// Allocate for delays up to `max_delay_samples` (at least 1)
    pub fn new(max_delay_samples: usize) -> Self {
        let max_delay = max_delay_samples.max(1);
        Self {
            // One slot for the newest sample plus one for the interpolation partner
            buffer: vec![0.0; max_delay + 2],
            write_pos: 0,
            delay: 1.0,
            max_delay,
        }
    }

    /// Allocate from a time in milliseconds
    pub fn with_max_ms(max_ms: f32, sample_rate: f32) -> Self {
        let samples = crate::math::ms_to_samples(max_ms, sample_rate).ceil();
        Self::new(if samples.is_finite() && samples > 0.0 {
            samples as usize
        } else {
            1
        })
    }

    /// Change the maximum delay (prepare-time only), clearing contents
    pub fn resize(&mut self, max_delay_samples: usize) {
        self.max_delay = max_delay_samples.max(1);
        self.buffer.clear();
        self.buffer.resize(self.max_delay + 2, 0.0);
        self.write_pos = 0;
        self.delay = self.delay.clamp(1.0, self.max_delay as f32);
    }

    pub fn max_delay(&self) -> usize {
        self.max_delay
    }

    /// Set the read delay, clamped to `[1, max_delay]`
    #[inline]
    pub fn set_delay(&mut self, samples: f32) {
        self.delay = if samples.is_nan() {
            1.0
        } else {
            samples.clamp(1.0, self.max_delay as f32)
        };
    }

    pub fn delay(&self) -> f32 {
        self.delay
    }

    /// Write one sample and advance
    #[inline]
    pub fn push_sample(&mut self, input: f32) {
        self.buffer[self.write_pos] = input;
        self.write_pos += 1;
        if self.write_pos == self.buffer.len() {
            self.write_pos = 0;
        }
    }

    /// Read at the current delay
    #[inline]
    pub fn pop_sample(&self) -> f32 {
        self.read_at(self.delay)
    }

    /// Read an arbitrary tap, clamped to `[0, max_delay]`
    ///
    /// Delay 0 is the most recently pushed sample.
    #[inline]
    pub fn read_at(&self, delay: f32) -> f32 {
        let delay = if delay.is_nan() {
            0.0
        } else {
            delay.clamp(0.0, self.max_delay as f32)
        };
        let whole = delay as usize;
        let frac = delay - whole as f32;

        let len = self.buffer.len();
        // write_pos - 1 - whole, wrapped; whole <= max_delay < len
        let newer = (self.write_pos + 2 * len - 1 - whole) % len;
        let older = if newer == 0 { len - 1 } else { newer - 1 };

        let a = self.buffer[newer];
        if frac == 0.0 {
            return a;
        }
        a + (self.buffer[older] - a) * frac
    }

    /// Read a tap before the next push: returns `x[n - delay]` for the
    /// sample `n` about to be written
    #[inline]
    pub fn read_ahead_of_push(&self, delay: f32) -> f32 {
        self.read_at(delay - 1.0)
    }

    /// Push then pop
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.push_sample(input);
        self.pop_sample()
    }

    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_impulse_round_trip_integer_delays() {
        for d in [1usize, 2, 7, 100, 480] {
            let mut line = DelayLine::new(480);
            line.set_delay(d as f32);
            for n in 0..1000 {
                let x = if n == 0 { 1.0 } else { 0.0 };
                let y = line.process(x);
                let expected = if n == d { 1.0 } else { 0.0 };
                assert_eq!(y, expected, "d={} n={}", d, n);
            }
        }
    }

    #[test]
    fn test_fractional_delay_interpolates() {
        let mut line = DelayLine::new(16);
        line.set_delay(2.5);
        let outputs: Vec<f32> = (0..6).map(|n| line.process(n as f32)).collect();
        // x[n] = n, so y[n] = n - 2.5 once the line is primed
        assert!((outputs[4] - 1.5).abs() < 1e-6, "{:?}", outputs);
        assert!((outputs[5] - 2.5).abs() < 1e-6, "{:?}", outputs);
    }

    #[test]
    fn test_delay_clamped() {
        let mut line = DelayLine::new(64);
        line.set_delay(1000.0);
        assert_eq!(line.delay(), 64.0);
        line.set_delay(0.0);
        assert_eq!(line.delay(), 1.0);
        line.set_delay(f32::NAN);
        assert_eq!(line.delay(), 1.0);
    }

    #[test]
    fn test_max_delay_reads_oldest() {
        let mut line = DelayLine::new(8);
        line.set_delay(8.0);
        let mut out = Vec::new();
        for n in 0..20 {
            out.push(line.process(if n == 3 { 1.0 } else { 0.0 }));
        }
        assert_eq!(out[11], 1.0);
        assert_eq!(out.iter().filter(|&&y| y != 0.0).count(), 1);
    }

    #[test]
    fn test_read_ahead_of_push_addresses_same_sample() {
        let mut line = DelayLine::new(32);
        for n in 0..64 {
            line.push_sample((n as f32 * 0.3).sin());
        }
        for d in [1.0f32, 4.0, 5.25, 31.5] {
            let mut ahead = line.clone();
            let pre = ahead.read_ahead_of_push(d);
            ahead.push_sample(0.0);
            assert!((pre - ahead.read_at(d)).abs() < 1e-6, "d={}", d);
        }
    }

    #[test]
    fn test_resize_clears() {
        let mut line = DelayLine::new(4);
        line.push_sample(1.0);
        line.resize(16);
        assert_eq!(line.max_delay(), 16);
        for d in 0..=16 {
            assert_eq!(line.read_at(d as f32), 0.0);
        }
    }
}
