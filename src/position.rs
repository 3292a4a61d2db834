// Position - generalized 2-coordinate pair
//
// Used uniformly throughout the pipeline: band powers, calibration values,
// and pose deltas are all (q1, q2) pairs. The coordinates could be Cartesian
// (x and y) or polar (r and theta); no interpretation is imposed here and no
// operation clamps. Callers clamp explicitly where required.

use serde::{Deserialize, Serialize};

/// A pair of generalized f32 coordinates (q1, q2).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub q1: f32,
    pub q2: f32,
}

impl Position {
    /// Create a position with the given coordinates.
    pub fn new(q1: f32, q2: f32) -> Self {
        Self { q1, q2 }
    }

    /// The origin, (0, 0).
    pub fn zero() -> Self {
        Self { q1: 0.0, q2: 0.0 }
    }

    /// Scale the position by dividing each coordinate by the corresponding
    /// argument. No zero check - a zero divisor produces inf/NaN, which the
    /// numeric pipeline must remain defined for.
    pub fn scale(&mut self, a1: f32, a2: f32) {
        self.q1 /= a1;
        self.q2 /= a2;
    }

    /// Translate the position by adding the corresponding argument to each
    /// coordinate.
    pub fn translate(&mut self, a1: f32, a2: f32) {
        self.q1 += a1;
        self.q2 += a2;
    }

    /// Transform the position with a 2x2 matrix, standard row-column order.
    pub fn transform(&mut self, a11: f32, a12: f32, a21: f32, a22: f32) {
        let q1 = a11 * self.q1 + a12 * self.q2;
        let q2 = a21 * self.q1 + a22 * self.q2;
        self.q1 = q1;
        self.q2 = q2;
    }
}
