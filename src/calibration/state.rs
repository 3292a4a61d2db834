// Calibration - MVC store
//
// Keeps track of per-contraction peak band-power values and their running
// mean, the maximum voluntary contraction (MVC) estimate used to normalize
// the live signal. Values can be added directly (manual calibration) or
// derived from one contraction's worth of band-power samples through the
// peak detector.

use crate::error::CalibrationError;
use crate::position::Position;
use serde::{Deserialize, Serialize};

/// Default number of contractions averaged into the MVC estimate.
pub const NUM_CONTRACTIONS: usize = 3;
/// Length of one deliberate contraction, in seconds.
pub const CONTRACTION_LENGTH_SECONDS: u32 = 3;

/// Bounded list of contraction peaks plus the derived mean.
///
/// Invariant: `mean` always equals the componentwise arithmetic mean of the
/// current list, or (0, 0) when the list is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calibration {
    values: Vec<Position>,
    mean: Position,
    max_contractions: usize,
}

impl Calibration {
    /// Create an empty calibration bounded to the default contraction count.
    pub fn new() -> Self {
        Self::with_capacity(NUM_CONTRACTIONS)
    }

    /// Create an empty calibration bounded to `max_contractions` entries.
    pub fn with_capacity(max_contractions: usize) -> Self {
        Self {
            values: Vec::with_capacity(max_contractions),
            mean: Position::zero(),
            max_contractions,
        }
    }

    /// Add a set of band-power samples spanning one contraction. The peak
    /// detector takes the componentwise maximum over the window, appends it
    /// to the list, recomputes the mean, and returns the new peak.
    ///
    /// Insertions past the configured bound are rejected; callers wanting to
    /// recalibrate should `clear()` first.
    pub fn add_contraction(&mut self, samples: &[Position]) -> Result<Position, CalibrationError> {
        let peak = Self::peak_value(samples);
        self.push(peak)?;
        Ok(peak)
    }

    /// Directly append an externally supplied calibration value (manual
    /// calibration path). The mean is recomputed identically.
    pub fn add_calibration_value(&mut self, value: Position) -> Result<(), CalibrationError> {
        self.push(value)
    }

    /// Remove all calibration values and reset the mean to (0, 0).
    pub fn clear(&mut self) {
        self.values.clear();
        self.mean = Position::zero();
    }

    /// The current MVC estimate; (0, 0) if no contractions are recorded.
    pub fn mean_calibration(&self) -> Position {
        self.mean
    }

    /// Number of contractions recorded so far.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Configured contraction bound.
    pub fn capacity(&self) -> usize {
        self.max_contractions
    }

    /// Recorded peaks, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.values.iter()
    }

    fn push(&mut self, value: Position) -> Result<(), CalibrationError> {
        if self.values.len() >= self.max_contractions {
            return Err(CalibrationError::ContractionLimitReached {
                limit: self.max_contractions,
            });
        }
        self.values.push(value);
        self.mean = Self::mean_of(&self.values);
        Ok(())
    }

    /// Componentwise maximum of the power in each band over the window,
    /// floored at zero (power samples are non-negative in practice).
    fn peak_value(samples: &[Position]) -> Position {
        let mut maxima = Position::zero();
        for sample in samples {
            if sample.q1 > maxima.q1 {
                maxima.q1 = sample.q1;
            }
            if sample.q2 > maxima.q2 {
                maxima.q2 = sample.q2;
            }
        }
        maxima
    }

    fn mean_of(values: &[Position]) -> Position {
        let n = values.len();
        if n == 0 {
            return Position::zero();
        }
        let mut mean = Position::zero();
        for v in values {
            mean.translate(v.q1, v.q2);
        }
        mean.scale(n as f32, n as f32);
        mean
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::new()
    }
}
