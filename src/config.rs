//! Runtime configuration loaded from JSON
//!
//! Thresholds, motion shaping, and acquisition rates are the parameters most
//! often tuned per user and per electrode placement, so they load from a JSON
//! file at startup instead of being baked in. A missing or malformed file
//! falls back to the reference defaults with a logged warning.

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::controller::ControllerConfig;
use crate::sensor::SensorConfig;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub sensor: SensorConfig,
    pub pipeline: PipelineConfig,
    pub controller: ControllerSettings,
    pub output: OutputConfig,
}

/// Pipeline-thread parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Window of the moving average applied to the effort scalar
    pub effort_window: usize,
    /// Frames pre-allocated in the capture pool
    pub frame_pool_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            effort_window: 8,
            frame_pool_size: crate::sensor::DEFAULT_FRAME_COUNT,
        }
    }
}

/// Controller parameters in config-file units (milliseconds for the
/// debounce, radians for the rotation step).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerSettings {
    pub low_threshold: f32,
    pub high_threshold: f32,
    pub forward_slow: f32,
    pub forward_fast_max: f32,
    pub rotation_increment: f32,
    pub transition_delay_ms: u64,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            low_threshold: 0.15,
            high_threshold: 0.42,
            forward_slow: 0.05,
            forward_fast_max: 0.1,
            rotation_increment: PI / 16.0,
            transition_delay_ms: 150,
        }
    }
}

impl ControllerSettings {
    pub fn to_controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            low_threshold: self.low_threshold,
            high_threshold: self.high_threshold,
            forward_slow: self.forward_slow,
            forward_fast_max: self.forward_fast_max,
            rotation_increment: self.rotation_increment,
            transition_delay: Duration::from_millis(self.transition_delay_ms),
        }
    }
}

/// Output transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Attempt a publisher connection at startup
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 4775,
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file, falling back to defaults with a
    /// logged warning if the file is missing or malformed.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load from the conventional config location.
    pub fn load() -> Self {
        Self::load_from_file("assets/emg_rover.json")
    }
}
