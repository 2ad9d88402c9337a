//! Table-based fixed-point arctangent for 16-bit quadrature samples.
//!
//! The tables are built once (the only place floating point is used);
//! `angle()` itself is pure integer arithmetic and table lookups, which
//! keeps the per-pixel decode loop free of libm calls.

/// Table index width. 14 bits is enough for +/- 1 accuracy in the
/// scaled output domain.
const ATAN_BITS: u32 = 14;
const ATAN_SIZE: usize = 1 << ATAN_BITS;

/// Scale factor mapping radians into the signed 16-bit phase domain.
/// Negative by convention of the device's phase encoding; the magnitude
/// leaves headroom below i16::MAX for the full +/- pi range.
const ATAN_SCALE: f64 = -5215.2;

pub struct FastAtan2 {
    /// inv[i] = round(32768 * 65536 / i); index 0 unused.
    inv: Vec<u32>,
    /// atan_low[i] = atan2(i, 2^14) * scale, for ratios <= 1.
    atan_low: Vec<i32>,
    /// atan_high[i] = atan2(2^14, i) * scale, for ratios > 1.
    atan_high: Vec<i32>,
    /// Quadrant offset constants and the exact-diagonal value.
    full_turn: i16,
    quarter_pos: i16,
    quarter_neg: i16,
    eighth: i16,
}

impl FastAtan2 {
    pub fn new() -> Self {
        let mut inv = vec![0u32; 32769];
        for (i, slot) in inv.iter_mut().enumerate().skip(1) {
            *slot = (32768.0 * 65536.0 / i as f64).round() as u32;
        }

        let mut atan_low = vec![0i32; ATAN_SIZE + 1];
        let mut atan_high = vec![0i32; ATAN_SIZE + 1];
        for i in 0..=ATAN_SIZE {
            atan_low[i] = ((i as f64).atan2(ATAN_SIZE as f64) * ATAN_SCALE) as i32;
            atan_high[i] = ((ATAN_SIZE as f64).atan2(i as f64) * ATAN_SCALE) as i32;
        }

        use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};
        FastAtan2 {
            inv,
            atan_low,
            atan_high,
            full_turn: (-PI * ATAN_SCALE + 0.5) as i16,
            quarter_pos: (-FRAC_PI_2 * ATAN_SCALE + 0.5) as i16,
            quarter_neg: (FRAC_PI_2 * ATAN_SCALE + 0.5) as i16,
            eighth: (FRAC_PI_4 * ATAN_SCALE + 0.5) as i16,
        }
    }

    /// Scaled arctangent of y/x over all four quadrants.
    ///
    /// The pair is reduced to the first octant by sign/swap analysis and
    /// the quadrant offset added back at the end. `(0, 0)` has no defined
    /// angle; it returns 0.
    pub fn angle(&self, y: i16, x: i16) -> i16 {
        if y == 0 && x == 0 {
            return 0;
        }

        let (yy, xx, add): (u32, u32, i16) = if y < 0 {
            if x < 0 {
                /* quadrant 3 */
                (-(y as i32) as u32, -(x as i32) as u32, self.full_turn)
            } else {
                /* quadrant 4 */
                (x as u32, -(y as i32) as u32, self.quarter_pos)
            }
        } else if x < 0 {
            /* quadrant 2 */
            (-(x as i32) as u32, y as u32, self.quarter_neg)
        } else {
            /* quadrant 1 */
            (y as u32, x as u32, 0)
        };

        /* yy, xx <= 32768 and not both zero */
        let ret = if yy == xx {
            self.eighth
        } else if yy > xx {
            let idx = ((xx as u64 * self.inv[yy as usize] as u64) >> (31 - ATAN_BITS)) as usize;
            self.atan_high[idx] as i16
        } else {
            let idx = ((yy as u64 * self.inv[xx as usize] as u64) >> (31 - ATAN_BITS)) as usize;
            self.atan_low[idx] as i16
        };

        ret.wrapping_add(add)
    }
}

impl Default for FastAtan2 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(y: i16, x: i16) -> i16 {
        ((y as f64).atan2(x as f64) * ATAN_SCALE).round() as i16
    }

    #[test]
    fn test_axes() {
        let at = FastAtan2::new();
        assert_eq!(at.angle(0, 100), 0);
        // pi/2 scaled ~ -8192, pi scaled ~ -16384 (wrapped sign per table build)
        assert!((at.angle(100, 0) as i32 - reference(100, 0) as i32).abs() <= 1);
        assert!((at.angle(-100, 0) as i32 - reference(-100, 0) as i32).abs() <= 1);
    }

    #[test]
    fn test_matches_float_reference() {
        let at = FastAtan2::new();
        for &(y, x) in &[
            (1i16, 1000i16),
            (1000, 1),
            (123, 456),
            (-123, 456),
            (123, -456),
            (-123, -456),
            (32767, 1),
            (1, 32767),
            (-32768, -32768),
            (700, 700),
        ] {
            let got = at.angle(y, x) as i32;
            let want = reference(y, x) as i32;
            assert!(
                (got - want).abs() <= 2,
                "angle({y}, {x}) = {got}, reference {want}"
            );
        }
    }

    #[test]
    fn test_scale_invariance() {
        let at = FastAtan2::new();
        let base = at.angle(300, 400);
        for k in [2i16, 5, 10, 50] {
            let scaled = at.angle(300 * k, 400 * k);
            assert!(
                (scaled as i32 - base as i32).abs() <= 1,
                "scaling by {k} moved angle from {base} to {scaled}"
            );
        }
    }

    #[test]
    fn test_quadrant_symmetry() {
        let at = FastAtan2::new();
        for &(y, x) in &[(100i16, 300i16), (37, 991), (2500, 311)] {
            let a = at.angle(y, x) as i32;
            let b = at.angle(-y, x) as i32;
            assert!((a + b).abs() <= 2, "angle({y},{x})={a} angle(-{y},{x})={b}");

            // Complementary angles sum to a quarter turn.
            let c = at.angle(x, y) as i32;
            let quarter = (std::f64::consts::FRAC_PI_2 * ATAN_SCALE) as i32;
            assert!(
                (a + c - quarter).abs() <= 2,
                "angle({y},{x}) + angle({x},{y}) = {} != {quarter}",
                a + c
            );
        }
    }

    #[test]
    fn test_diagonal_and_origin() {
        let at = FastAtan2::new();
        // Exact diagonal takes the fixed pi/4 constant.
        assert_eq!(at.angle(500, 500), at.angle(7, 7));
        assert_eq!(at.angle(0, 0), 0);
    }
}
