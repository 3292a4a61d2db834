// ContractionRecorder - sample collection for one contraction
//
// The pipeline thread feeds each frame's band-power Position into the active
// recorder (held in an Arc<Mutex<Option<...>>> slot). When the window is full
// (contraction length x update rate samples) the window is handed to the MVC
// store and the slot is cleared by the owner. Progress snapshots go out over
// a broadcast channel so the UI boundary can display collection state without
// touching pipeline-owned data.

use crate::error::CalibrationError;
use crate::position::Position;
use serde::{Deserialize, Serialize};

/// Progress snapshot for the UI boundary. Sent by value; receivers must not
/// assume it reflects anything newer than the frame that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationProgress {
    /// Samples collected so far for the current contraction
    pub samples_collected: usize,
    /// Samples required to complete the contraction window
    pub samples_required: usize,
    /// Contractions already recorded in the store
    pub contractions_recorded: usize,
    /// Contractions required in total
    pub contractions_required: usize,
}

/// Collects per-frame band-power samples for a single contraction.
#[derive(Debug)]
pub struct ContractionRecorder {
    samples: Vec<Position>,
    required: usize,
}

impl ContractionRecorder {
    /// Create a recorder for a window of `required` band-power samples
    /// (contraction length in seconds times the frame update rate).
    pub fn new(required: usize) -> Self {
        Self {
            samples: Vec::with_capacity(required),
            required,
        }
    }

    /// Add one band-power sample. Returns true when the window is complete;
    /// further samples are ignored once full.
    pub fn add_sample(&mut self, power: Position) -> bool {
        if self.samples.len() < self.required {
            self.samples.push(power);
        }
        self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.samples.len() >= self.required
    }

    pub fn samples_collected(&self) -> usize {
        self.samples.len()
    }

    pub fn samples_required(&self) -> usize {
        self.required
    }

    /// The collected window, for handing to `Calibration::add_contraction`.
    ///
    /// Errors if called before the window is complete so a short recording
    /// can never silently produce a low MVC estimate.
    pub fn window(&self) -> Result<&[Position], CalibrationError> {
        if !self.is_complete() {
            return Err(CalibrationError::IncompleteContraction {
                collected: self.samples.len(),
                required: self.required,
            });
        }
        Ok(&self.samples)
    }
}
