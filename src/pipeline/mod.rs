// Pipeline module - per-frame effort extraction and control
//
// The pipeline thread consumes raw capture chunks from the frame pool,
// decimates them, and cuts the result into fixed-length frames. Each frame
// runs synchronously through:
//
//   band power (IIR) -> FIR smoothing -> MVC normalization -> effort scalar
//   -> moving average -> threshold controller -> snapshot broadcast
//
// During calibration the raw band-power sample of every frame also feeds the
// active ContractionRecorder; a completed window is handed to the MVC store
// and the recorder slot is cleared.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rtrb::PopError;

use crate::calibration::{Calibration, CalibrationProgress, ContractionRecorder};
use crate::config::PipelineConfig;
use crate::controller::{InputState, Pose, ThresholdController};
use crate::error::{log_calibration_error, CalibrationError};
use crate::position::Position;
use crate::proc::util::rms;
use crate::proc::{BandFilter, MovingAverageFilter, PositionFilter};
use crate::sensor::{PipelineThreadChannels, SensorConfig};

/// Per-frame snapshot broadcast to the UI boundary. Receivers get copies;
/// nothing here aliases pipeline-owned state.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EffortUpdate {
    pub state: InputState,
    /// Smoothed, MVC-normalized effort scalar
    pub effort: f32,
    pub pose: Pose,
    /// Whether the output transport is still accepting writes
    pub connected: bool,
    /// Milliseconds of signal processed since the session started
    pub timestamp_ms: u64,
}

pub struct PipelineWorker {
    channels: PipelineThreadChannels,
    calibration: Arc<RwLock<Calibration>>,
    recorder: Arc<Mutex<Option<ContractionRecorder>>>,
    progress_tx: Option<tokio::sync::broadcast::Sender<CalibrationProgress>>,
    controller: Arc<Mutex<ThresholdController>>,
    update_tx: tokio::sync::broadcast::Sender<EffortUpdate>,
    shutdown: Arc<AtomicBool>,

    band_filter: BandFilter,
    smoother: PositionFilter,
    effort_filter: MovingAverageFilter,

    // Decimation state persists across chunk boundaries
    decimation: usize,
    phase: usize,
    frame_len: usize,
    effective_rate: u32,
    accumulator: Vec<f32>,
    processed_samples: u64,
}

impl PipelineWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        channels: PipelineThreadChannels,
        sensor_config: SensorConfig,
        pipeline_config: &PipelineConfig,
        calibration: Arc<RwLock<Calibration>>,
        recorder: Arc<Mutex<Option<ContractionRecorder>>>,
        progress_tx: Option<tokio::sync::broadcast::Sender<CalibrationProgress>>,
        controller: Arc<Mutex<ThresholdController>>,
        update_tx: tokio::sync::broadcast::Sender<EffortUpdate>,
        shutdown: Arc<AtomicBool>,
    ) -> Result<Self, crate::error::SensorError> {
        let frame_len = sensor_config.frame_len()?;

        Ok(Self {
            channels,
            calibration,
            recorder,
            progress_tx,
            controller,
            update_tx,
            shutdown,
            band_filter: BandFilter::new(),
            smoother: PositionFilter::new(),
            effort_filter: MovingAverageFilter::new(pipeline_config.effort_window.max(1)),
            decimation: sensor_config.downsample_factor.max(1) as usize,
            phase: 0,
            frame_len,
            effective_rate: sensor_config.effective_sample_rate(),
            accumulator: Vec::with_capacity(2 * frame_len),
            processed_samples: 0,
        })
    }

    /// Main loop. Shutdown is cooperative: the flag is checked at the top of
    /// every iteration, and an empty queue parks the thread briefly instead
    /// of spinning.
    pub fn run(mut self) {
        tracing::info!(
            "Pipeline thread started ({} sample frames at {} Hz effective)",
            self.frame_len,
            self.effective_rate
        );

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                tracing::info!("Pipeline shutdown flag set, exiting");
                break;
            }

            let chunk = match self.channels.data_consumer.pop() {
                Ok(chunk) => chunk,
                Err(PopError::Empty) => {
                    thread::sleep(Duration::from_millis(1));
                    continue;
                }
            };

            self.ingest(&chunk);

            if self.channels.pool_producer.push(chunk).is_err() {
                tracing::warn!("Frame pool full, dropping a recycled frame");
            }

            while self.accumulator.len() >= self.frame_len {
                let frame: Vec<f32> = self.accumulator.drain(..self.frame_len).collect();
                self.process_frame(&frame);
            }
        }
    }

    /// Decimate a raw chunk into the accumulator. The phase counter carries
    /// across chunks so the effective rate is exact regardless of how the
    /// driver sizes its callbacks.
    fn ingest(&mut self, chunk: &[f32]) {
        for &sample in chunk {
            if self.phase == 0 {
                self.accumulator.push(sample);
            }
            self.phase = (self.phase + 1) % self.decimation;
        }
    }

    /// One frame: extract band power, feed any active calibration recorder,
    /// normalize, reduce to an effort scalar, and run the controller.
    fn process_frame(&mut self, frame: &[f32]) {
        let power = self.band_filter.filter(frame);

        self.feed_recorder(power);

        let smoothed = self.smoother.filter(power.q1, power.q2);

        // Components of an empty or partial calibration are zero; divide by
        // 1.0 there so the pipeline stays defined before calibration.
        let mvc = match self.calibration.read() {
            Ok(cal) => cal.mean_calibration(),
            Err(_) => {
                log_calibration_error(&CalibrationError::StatePoisoned, "process_frame");
                Position::zero()
            }
        };
        let mut normalized = smoothed;
        normalized.scale(
            if mvc.q1 > 0.0 { mvc.q1 } else { 1.0 },
            if mvc.q2 > 0.0 { mvc.q2 } else { 1.0 },
        );

        let effort = self
            .effort_filter
            .update(rms(&[normalized.q1, normalized.q2]));

        self.processed_samples += frame.len() as u64;
        let timestamp_ms = self.processed_samples * 1000 / self.effective_rate.max(1) as u64;

        let (state, pose, connected) = match self.controller.lock() {
            Ok(mut controller) => {
                controller.update(effort, Instant::now());
                (controller.state(), controller.pose(), controller.is_connected())
            }
            Err(_) => {
                tracing::error!("Controller lock poisoned, skipping update");
                (InputState::Low, Pose::default(), false)
            }
        };

        let _ = self.update_tx.send(EffortUpdate {
            state,
            effort,
            pose,
            connected,
            timestamp_ms,
        });
    }

    /// Feed the raw band-power sample to an active recorder. A completed
    /// window goes straight into the MVC store and the slot is cleared.
    fn feed_recorder(&mut self, power: Position) {
        let Ok(mut slot) = self.recorder.lock() else {
            log_calibration_error(&CalibrationError::StatePoisoned, "feed_recorder");
            return;
        };
        let Some(recorder) = slot.as_mut() else {
            return;
        };

        let complete = recorder.add_sample(power);

        let (collected, required) = (recorder.samples_collected(), recorder.samples_required());

        if complete {
            let finished = match recorder.window() {
                Ok(window) => match self.calibration.write() {
                    Ok(mut cal) => match cal.add_contraction(window) {
                        Ok(peak) => {
                            tracing::info!(
                                "Contraction {} of {} recorded, peak ({:.4}, {:.4})",
                                cal.len(),
                                cal.capacity(),
                                peak.q1,
                                peak.q2
                            );
                            true
                        }
                        Err(err) => {
                            log_calibration_error(&err, "feed_recorder");
                            true
                        }
                    },
                    Err(_) => {
                        log_calibration_error(&CalibrationError::StatePoisoned, "feed_recorder");
                        true
                    }
                },
                Err(err) => {
                    log_calibration_error(&err, "feed_recorder");
                    false
                }
            };
            if finished {
                *slot = None;
            }
        }
        drop(slot);

        if let Some(ref tx) = self.progress_tx {
            let (recorded, capacity) = match self.calibration.read() {
                Ok(cal) => (cal.len(), cal.capacity()),
                Err(_) => (0, 0),
            };
            let _ = tx.send(CalibrationProgress {
                samples_collected: if complete { required } else { collected },
                samples_required: required,
                contractions_recorded: recorded,
                contractions_required: capacity,
            });
        }
    }
}

/// Spawn the pipeline worker on a dedicated thread.
#[allow(clippy::too_many_arguments)]
pub fn spawn_pipeline_thread(
    channels: PipelineThreadChannels,
    sensor_config: SensorConfig,
    pipeline_config: &PipelineConfig,
    calibration: Arc<RwLock<Calibration>>,
    recorder: Arc<Mutex<Option<ContractionRecorder>>>,
    progress_tx: Option<tokio::sync::broadcast::Sender<CalibrationProgress>>,
    controller: Arc<Mutex<ThresholdController>>,
    update_tx: tokio::sync::broadcast::Sender<EffortUpdate>,
    shutdown: Arc<AtomicBool>,
) -> Result<JoinHandle<()>, crate::error::SensorError> {
    let worker = PipelineWorker::new(
        channels,
        sensor_config,
        pipeline_config,
        calibration,
        recorder,
        progress_tx,
        controller,
        update_tx,
        shutdown,
    )?;
    Ok(thread::spawn(move || worker.run()))
}
