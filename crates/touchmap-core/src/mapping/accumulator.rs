//! Sub-pixel accumulator for relative mouse motion.
//!
//! Scaled touch deltas are fractional, but the host driver only accepts whole
//! pixels.  Dropping the fraction on every sample would make slow drags stall
//! completely, so the remainder is carried into the next sample instead.
//!
//! The integer part is taken with truncation toward zero.  Rounding (or
//! flooring toward negative infinity) would make left and right drags of the
//! same speed produce different cursor speeds.

/// Carries the fractional part of scaled deltas between samples.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SubPixelAccumulator {
    rem_x: f64,
    rem_y: f64,
}

impl SubPixelAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a scaled delta and returns the whole pixels ready to emit.
    pub fn push(&mut self, dx: f64, dy: f64) -> (i32, i32) {
        let total_x = self.rem_x + dx;
        let total_y = self.rem_y + dy;
        let whole_x = total_x.trunc();
        let whole_y = total_y.trunc();
        self.rem_x = total_x - whole_x;
        self.rem_y = total_y - whole_y;
        (whole_x as i32, whole_y as i32)
    }

    pub fn remainder(&self) -> (f64, f64) {
        (self.rem_x, self.rem_y)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slow_drag_emits_after_enough_samples() {
        // Arrange: 0.3 px per sample.
        let mut acc = SubPixelAccumulator::new();

        // Act
        let outputs: Vec<_> = (0..4).map(|_| acc.push(0.3, 0.3)).collect();

        // Assert
        assert_eq!(outputs, vec![(0, 0), (0, 0), (0, 0), (1, 1)]);
        let (rx, ry) = acc.remainder();
        assert!((rx - 0.2).abs() < 1e-9 && (ry - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_truncation_is_symmetric_around_zero() {
        let mut right = SubPixelAccumulator::new();
        let mut left = SubPixelAccumulator::new();

        for _ in 0..10 {
            let (r, _) = right.push(0.7, 0.0);
            let (l, _) = left.push(-0.7, 0.0);
            assert_eq!(r, -l);
        }
    }

    #[test]
    fn test_conservation_over_pseudo_random_sequence() {
        // Arrange: a small LCG keeps the test deterministic.
        let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
        let mut next = move || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((seed >> 33) as f64 / (1u64 << 31) as f64) * 6.0 - 3.0
        };
        let mut acc = SubPixelAccumulator::new();
        let (mut in_x, mut in_y) = (0.0f64, 0.0f64);
        let (mut out_x, mut out_y) = (0i64, 0i64);

        // Act
        for _ in 0..10_000 {
            let (dx, dy) = (next(), next());
            in_x += dx;
            in_y += dy;
            let (ox, oy) = acc.push(dx, dy);
            out_x += ox as i64;
            out_y += oy as i64;
            let (rx, ry) = acc.remainder();
            assert!(rx.abs() < 1.0 && ry.abs() < 1.0);
        }

        // Assert
        let (rx, ry) = acc.remainder();
        assert!((out_x as f64 + rx - in_x).abs() < 1e-6);
        assert!((out_y as f64 + ry - in_y).abs() < 1e-6);
    }

    #[test]
    fn test_reset_clears_remainder() {
        let mut acc = SubPixelAccumulator::new();
        acc.push(0.9, -0.9);
        acc.reset();
        assert_eq!(acc.remainder(), (0.0, 0.0));
    }
}
