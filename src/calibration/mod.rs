// Calibration module - MVC estimation from deliberate contractions
//
// Two components:
// 1. Calibration: the bounded contraction list and running MVC mean
// 2. ContractionRecorder: the per-contraction sample collection workflow
//
// The workflow: the pipeline feeds band-power samples into an active
// ContractionRecorder; when the window fills, the peak goes into the
// Calibration store and the mean MVC estimate updates.

pub mod procedure;
pub mod state;

pub use procedure::{CalibrationProgress, ContractionRecorder};
pub use state::{Calibration, CONTRACTION_LENGTH_SECONDS, NUM_CONTRACTIONS};
