// Calibration error types

use log::error;
use std::fmt;

/// Calibration workflow errors.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// A contraction recording is already in progress
    AlreadyInProgress,

    /// No contraction recording is in progress
    NotInProgress,

    /// The bounded contraction list is full
    ContractionLimitReached { limit: usize },

    /// A contraction window was handed over before it was complete
    IncompleteContraction { collected: usize, required: usize },

    /// Calibration state lock was poisoned
    StatePoisoned,
}

impl CalibrationError {
    fn message(&self) -> String {
        match self {
            CalibrationError::AlreadyInProgress => {
                "Contraction recording already in progress".to_string()
            }
            CalibrationError::NotInProgress => "No contraction recording in progress".to_string(),
            CalibrationError::ContractionLimitReached { limit } => format!(
                "Calibration already holds {} contractions; clear() before adding more",
                limit
            ),
            CalibrationError::IncompleteContraction {
                collected,
                required,
            } => format!(
                "Contraction window incomplete: {} of {} samples",
                collected, required
            ),
            CalibrationError::StatePoisoned => "Calibration state lock poisoned".to_string(),
        }
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for CalibrationError {}

/// Log a calibration error with its originating context.
pub fn log_calibration_error(err: &CalibrationError, context: &str) {
    error!("Calibration error in {}: {}", context, err);
}
