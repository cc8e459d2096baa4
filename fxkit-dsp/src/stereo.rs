//! Mid/side stereo matrix
//!
//! Encode: `mid = 0.5(L+R)`, `side = 0.5(L-R)`.
//! Decode: `L = mid + side`, `R = mid - side`.

/// Widest supported side gain
pub const MAX_WIDTH: f32 = 4.0;

/// L/R to M/S
#[inline]
pub fn encode(left: f32, right: f32) -> (f32, f32) {
    (0.5 * (left + right), 0.5 * (left - right))
}

/// M/S to L/R
#[inline]
pub fn decode(mid: f32, side: f32) -> (f32, f32) {
    (mid + side, mid - side)
}

/// Width, mono fold and polarity control in the M/S domain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoMatrix {
    width: f32,
    pub mono_safe: bool,
    pub invert_mid: bool,
    pub invert_side: bool,
    pub mono: bool,
}

impl Default for StereoMatrix {
    fn default() -> Self {
        Self {
            width: 1.0,
            mono_safe: false,
            invert_mid: false,
            invert_side: false,
            mono: false,
        }
    }
}

impl StereoMatrix {
    pub fn new(width: f32) -> Self {
        let mut matrix = Self::default();
        matrix.set_width(width);
        matrix
    }

    /// Side gain: 0 mono, 1 unity, above 1 exaggerated (max [`MAX_WIDTH`])
    pub fn set_width(&mut self, width: f32) {
        self.width = if width.is_nan() {
            1.0
        } else {
            width.clamp(0.0, MAX_WIDTH)
        };
    }

    /// Requested width
    pub fn width(&self) -> f32 {
        self.width
    }

    /// Width actually applied (mono-safe caps at unity)
    #[inline]
    pub fn effective_width(&self) -> f32 {
        if self.mono {
            0.0
        } else if self.mono_safe {
            self.width.min(1.0)
        } else {
            self.width
        }
    }

    /// True when `process` returns its input unchanged
    pub fn is_identity(&self) -> bool {
        self.effective_width() == 1.0 && !self.invert_mid && !self.invert_side
    }

    /// Transform one stereo frame
    #[inline]
    pub fn process(&self, left: f32, right: f32) -> (f32, f32) {
        let (mut mid, mut side) = encode(left, right);
        side *= self.effective_width();
        if self.invert_mid {
            mid = -mid;
        }
        if self.invert_side {
            side = -side;
        }
        decode(mid, side)
    }

    /// Transform two channel buffers in place
    pub fn process_block(&self, left: &mut [f32], right: &mut [f32]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let (nl, nr) = self.process(*l, *r);
            *l = nl;
            *r = nr;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::Xorshift;

    #[test]
    fn test_encode_decode_invertible() {
        let mut rng = Xorshift::new(42);
        for _ in 0..10_000 {
            let l = rng.next_bipolar();
            let r = rng.next_bipolar();
            let (m, s) = encode(l, r);
            let (l2, r2) = decode(m, s);
            assert!((l - l2).abs() < 1e-6 && (r - r2).abs() < 1e-6, "({}, {}) -> ({}, {})", l, r, l2, r2);
        }
    }

    #[test]
    fn test_unity_matrix_is_identity() {
        let matrix = StereoMatrix::default();
        assert!(matrix.is_identity());
        let (l, r) = matrix.process(0.3, -0.7);
        assert!((l - 0.3).abs() < 1e-6);
        assert!((r + 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_zero_width_is_mono() {
        let matrix = StereoMatrix::new(0.0);
        let (l, r) = matrix.process(1.0, 0.0);
        assert_eq!(l, r);
        assert_eq!(l, 0.5);
    }

    #[test]
    fn test_mono_fold() {
        let matrix = StereoMatrix {
            mono: true,
            ..StereoMatrix::new(2.0)
        };
        let (l, r) = matrix.process(0.8, 0.2);
        assert_eq!(l, r);
        assert!((l - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_mono_safe_clamps_width() {
        let mut matrix = StereoMatrix::new(3.0);
        assert_eq!(matrix.effective_width(), 3.0);
        matrix.mono_safe = true;
        assert_eq!(matrix.effective_width(), 1.0);
        assert_eq!(matrix.width(), 3.0);

        matrix.set_width(0.5);
        assert_eq!(matrix.effective_width(), 0.5);
    }

    #[test]
    fn test_width_clamped() {
        assert_eq!(StereoMatrix::new(100.0).width(), MAX_WIDTH);
        assert_eq!(StereoMatrix::new(-1.0).width(), 0.0);
        assert_eq!(StereoMatrix::new(f32::NAN).width(), 1.0);
    }

    #[test]
    fn test_invert_flags() {
        let side_inverted = StereoMatrix {
            invert_side: true,
            ..StereoMatrix::default()
        };
        let (l, r) = side_inverted.process(1.0, 0.0);
        assert!((l - 0.0).abs() < 1e-6 && (r - 1.0).abs() < 1e-6, "swap expected: {} {}", l, r);

        let mid_inverted = StereoMatrix {
            invert_mid: true,
            ..StereoMatrix::default()
        };
        let (l, r) = mid_inverted.process(1.0, 1.0);
        assert_eq!((l, r), (-1.0, -1.0));
    }

    #[test]
    fn test_process_block() {
        let matrix = StereoMatrix::new(0.0);
        let mut left = [1.0, 0.0, 0.5];
        let mut right = [0.0, 1.0, 0.5];
        matrix.process_block(&mut left, &mut right);
        assert_eq!(left, right);
    }
}
