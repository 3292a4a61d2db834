// Sensor error types

use log::error;
use std::fmt;

/// Sensor-related errors covering capture lifecycle and hardware access.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorError {
    /// Capture is already running
    AlreadyRunning,

    /// Capture is not running
    NotRunning,

    /// No usable input device, or the stream could not be opened
    StreamOpenFailed { reason: String },

    /// Hardware error while starting or stopping a stream
    HardwareError { details: String },

    /// Update rate must divide the capture sample rate into whole frames
    UpdateRateInvalid { update_rate: u32 },

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },
}

impl SensorError {
    fn message(&self) -> String {
        match self {
            SensorError::AlreadyRunning => {
                "Sensor already running. Call stop() first.".to_string()
            }
            SensorError::NotRunning => "Sensor not running. Call start() first.".to_string(),
            SensorError::StreamOpenFailed { reason } => {
                format!("Failed to open capture stream: {}", reason)
            }
            SensorError::HardwareError { details } => format!("Hardware error: {}", details),
            SensorError::UpdateRateInvalid { update_rate } => format!(
                "Update rate must be positive and divide the sample rate (got {})",
                update_rate
            ),
            SensorError::LockPoisoned { component } => format!("Lock poisoned on {}", component),
        }
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for SensorError {}

impl From<std::io::Error> for SensorError {
    fn from(err: std::io::Error) -> Self {
        SensorError::HardwareError {
            details: err.to_string(),
        }
    }
}

/// Log a sensor error with its originating context.
pub fn log_sensor_error(err: &SensorError, context: &str) {
    error!("Sensor error in {}: {}", context, err);
}
