// Error types for the EMG rover pipeline
//
// Sensor and calibration failures carry typed variants so callers can react
// to lifecycle misuse (double start, stop when stopped) distinctly from
// hardware faults. Transport failures are deliberately NOT errors at this
// level: a lost socket degrades the session, it never aborts the loop.

mod calibration;
mod sensor;

pub use calibration::{log_calibration_error, CalibrationError};
pub use sensor::{log_sensor_error, SensorError};
