// EMG Rover Core - muscle-signal motion control
// Real-time EMG effort extraction driving a hysteretic rover controller

// Module declarations
pub mod calibration;
pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod fixtures;
pub mod pipeline;
pub mod position;
pub mod proc;
pub mod publisher;
pub mod sensor;

// Re-exports for convenience
pub use calibration::{Calibration, CalibrationProgress, ContractionRecorder};
pub use config::AppConfig;
pub use context::AppContext;
pub use controller::{ControllerConfig, InputState, Pose, ThresholdController};
pub use pipeline::EffortUpdate;
pub use position::Position;
