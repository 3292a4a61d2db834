// Sensor module - EMG acquisition boundary
//
// EmgSensor owns the cpal input stream. The capture callback is real-time:
// it pops a pre-allocated frame from the pool, copies the first channel in,
// and hands it to the pipeline thread through the lock-free data queue. No
// allocation, no locks, no logging in the callback.
//
// Downsampling and fixed-length frame reassembly happen on the pipeline
// thread, which can afford to accumulate; the callback only moves raw chunks.

pub mod frame_pool;

pub use frame_pool::{
    CaptureThreadChannels, EmgFrame, FramePool, FramePoolChannels, PipelineThreadChannels,
    DEFAULT_FRAME_COUNT,
};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::error::SensorError;

/// Acquisition parameters.
///
/// The capture device runs at `sample_rate`; the pipeline decimates by
/// `downsample_factor` and cuts the result into `frame_len()` sample frames,
/// one per controller update.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct SensorConfig {
    /// Capture rate requested from the device, Hz
    pub sample_rate: u32,
    /// Keep every Nth sample (2 = halve the rate)
    pub downsample_factor: u32,
    /// Controller updates per second
    pub update_rate: u32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 8_000,
            downsample_factor: 2,
            update_rate: 4,
        }
    }
}

impl SensorConfig {
    /// Sample rate seen by the filters after decimation.
    pub fn effective_sample_rate(&self) -> u32 {
        self.sample_rate / self.downsample_factor.max(1)
    }

    /// Samples per pipeline frame. Errors on an update rate of zero or one
    /// too fast for the effective sample rate to fill a frame.
    pub fn frame_len(&self) -> Result<usize, SensorError> {
        if self.update_rate == 0 {
            return Err(SensorError::UpdateRateInvalid {
                update_rate: self.update_rate,
            });
        }
        let len = (self.effective_sample_rate() / self.update_rate) as usize;
        if len == 0 {
            return Err(SensorError::UpdateRateInvalid {
                update_rate: self.update_rate,
            });
        }
        Ok(len)
    }
}

/// EMG capture stream with pause/resume.
///
/// Pausing leaves the device stream open but makes the callback discard
/// input, so resume is instant and never renegotiates with the hardware.
pub struct EmgSensor {
    stream: Option<cpal::Stream>,
    paused: Arc<AtomicBool>,
    dropped_chunks: Arc<AtomicU64>,
    config: SensorConfig,
}

impl EmgSensor {
    pub fn new(config: SensorConfig) -> Self {
        Self {
            stream: None,
            paused: Arc::new(AtomicBool::new(false)),
            dropped_chunks: Arc::new(AtomicU64::new(0)),
            config,
        }
    }

    pub fn config(&self) -> SensorConfig {
        self.config
    }

    /// Open the input stream and start pushing raw chunks into the pool.
    ///
    /// Takes the capture half of a `FramePool`; the pipeline half goes to
    /// the worker thread.
    pub fn start(&mut self, mut channels: CaptureThreadChannels) -> Result<(), SensorError> {
        if self.stream.is_some() {
            return Err(SensorError::AlreadyRunning);
        }
        // Config sanity before touching hardware
        self.config.frame_len()?;

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| SensorError::StreamOpenFailed {
                reason: "No default input device found".to_string(),
            })?;

        let default_config =
            device
                .default_input_config()
                .map_err(|e| SensorError::StreamOpenFailed {
                    reason: format!("Failed to get default input config: {:?}", e),
                })?;

        if default_config.sample_format() != cpal::SampleFormat::F32 {
            return Err(SensorError::StreamOpenFailed {
                reason: "Only F32 sample format is supported for capture".to_string(),
            });
        }

        let stream_config = cpal::StreamConfig {
            channels: default_config.channels(),
            sample_rate: cpal::SampleRate(self.config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let channels_count = stream_config.channels as usize;

        let paused = Arc::clone(&self.paused);
        let dropped = Arc::clone(&self.dropped_chunks);
        let err_fn = |err| tracing::error!("Input stream error: {}", err);

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if paused.load(Ordering::Relaxed) {
                        return;
                    }
                    match channels.pool_consumer.pop() {
                        Ok(mut frame) => {
                            frame.clear();
                            if channels_count == 1 {
                                frame.extend_from_slice(data);
                            } else {
                                // De-interleave: electrode signal is channel 0
                                for chunk in data.chunks(channels_count) {
                                    frame.push(chunk[0]);
                                }
                            }
                            let _ = channels.data_producer.push(frame);
                        }
                        Err(_) => {
                            // Pipeline stalled; shed rather than block
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| SensorError::StreamOpenFailed {
                reason: format!("{:?}", e),
            })?;

        stream.play().map_err(|e| SensorError::HardwareError {
            details: format!("Capture start failed: {}", e),
        })?;

        self.paused.store(false, Ordering::Relaxed);
        self.stream = Some(stream);
        tracing::info!(
            "EMG capture started at {} Hz (effective {} Hz, {} sample frames)",
            self.config.sample_rate,
            self.config.effective_sample_rate(),
            self.config.frame_len().unwrap_or(0)
        );
        Ok(())
    }

    /// Discard input without closing the device stream.
    pub fn pause(&self) -> Result<(), SensorError> {
        if self.stream.is_none() {
            return Err(SensorError::NotRunning);
        }
        self.paused.store(true, Ordering::Relaxed);
        Ok(())
    }

    pub fn resume(&self) -> Result<(), SensorError> {
        if self.stream.is_none() {
            return Err(SensorError::NotRunning);
        }
        self.paused.store(false, Ordering::Relaxed);
        Ok(())
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.stream.is_some()
    }

    /// Chunks shed because the pool ran dry.
    pub fn dropped_chunks(&self) -> u64 {
        self.dropped_chunks.load(Ordering::Relaxed)
    }

    /// Close the device stream. The pipeline thread drains whatever is
    /// already queued and is shut down separately by its owner.
    pub fn stop(&mut self) -> Result<(), SensorError> {
        match self.stream.take() {
            Some(stream) => {
                drop(stream);
                self.paused.store(false, Ordering::Relaxed);
                tracing::info!("EMG capture stopped");
                Ok(())
            }
            None => Err(SensorError::NotRunning),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_reference_hardware() {
        let config = SensorConfig::default();
        assert_eq!(config.sample_rate, 8_000);
        assert_eq!(config.downsample_factor, 2);
        assert_eq!(config.update_rate, 4);
        assert_eq!(config.effective_sample_rate(), 4_000);
        assert_eq!(config.frame_len().unwrap(), 1_000);
    }

    #[test]
    fn test_zero_update_rate_rejected() {
        let config = SensorConfig {
            update_rate: 0,
            ..SensorConfig::default()
        };
        assert_eq!(
            config.frame_len().unwrap_err(),
            SensorError::UpdateRateInvalid { update_rate: 0 }
        );
    }

    #[test]
    fn test_update_rate_faster_than_samples_rejected() {
        let config = SensorConfig {
            sample_rate: 100,
            downsample_factor: 1,
            update_rate: 200,
        };
        assert!(matches!(
            config.frame_len(),
            Err(SensorError::UpdateRateInvalid { update_rate: 200 })
        ));
    }

    #[test]
    fn test_zero_downsample_treated_as_unity() {
        let config = SensorConfig {
            downsample_factor: 0,
            ..SensorConfig::default()
        };
        assert_eq!(config.effective_sample_rate(), 8_000);
    }

    #[test]
    fn test_lifecycle_errors_without_stream() {
        let mut sensor = EmgSensor::new(SensorConfig::default());
        assert!(!sensor.is_running());
        assert_eq!(sensor.pause().unwrap_err(), SensorError::NotRunning);
        assert_eq!(sensor.resume().unwrap_err(), SensorError::NotRunning);
        assert_eq!(sensor.stop().unwrap_err(), SensorError::NotRunning);
    }
}
