// AppContext: dependency injection container
// Centralizes session state so the CLI and tests share one wiring path

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::calibration::{
    Calibration, CalibrationProgress, ContractionRecorder, CONTRACTION_LENGTH_SECONDS,
};
use crate::config::AppConfig;
use crate::controller::{ControllerConfig, Pose, ThresholdController};
use crate::error::{log_calibration_error, log_sensor_error, CalibrationError, SensorError};
use crate::pipeline::{spawn_pipeline_thread, EffortUpdate};
use crate::publisher::StatePublisher;
use crate::sensor::{EmgSensor, FramePool};

/// Raw capture chunk capacity hint. Chunks grow if the driver delivers
/// larger callbacks, so this only has to be a reasonable guess.
const CHUNK_CAPACITY: usize = 2048;

/// Live capture session: the sensor plus its pipeline thread.
struct SensorSession {
    sensor: EmgSensor,
    pipeline_handle: JoinHandle<()>,
    shutdown: Arc<AtomicBool>,
}

/// Dependency container for all application state:
/// - sensor/pipeline lifecycle
/// - MVC calibration store and the active contraction recorder
/// - the threshold controller and its output transport
/// - broadcast channels for effort and calibration-progress snapshots
pub struct AppContext {
    config: AppConfig,
    session: Arc<Mutex<Option<SensorSession>>>,
    calibration: Arc<RwLock<Calibration>>,
    recorder: Arc<Mutex<Option<ContractionRecorder>>>,
    controller: Arc<Mutex<ThresholdController>>,
    update_broadcast: Arc<Mutex<Option<broadcast::Sender<EffortUpdate>>>>,
    progress_broadcast: Arc<Mutex<Option<broadcast::Sender<CalibrationProgress>>>>,
}

impl AppContext {
    pub fn new(config: AppConfig) -> Self {
        let controller = ThresholdController::new(config.controller.to_controller_config());
        Self {
            config,
            session: Arc::new(Mutex::new(None)),
            calibration: Arc::new(RwLock::new(Calibration::new())),
            recorder: Arc::new(Mutex::new(None)),
            controller: Arc::new(Mutex::new(controller)),
            update_broadcast: Arc::new(Mutex::new(None)),
            progress_broadcast: Arc::new(Mutex::new(None)),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Lock helpers: typed errors instead of unwrap on poisoned locks
    // ------------------------------------------------------------------

    fn lock_session(&self) -> Result<std::sync::MutexGuard<'_, Option<SensorSession>>, SensorError> {
        self.session.lock().map_err(|_| SensorError::LockPoisoned {
            component: "sensor_session".to_string(),
        })
    }

    fn lock_controller(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, ThresholdController>, SensorError> {
        self.controller
            .lock()
            .map_err(|_| SensorError::LockPoisoned {
                component: "controller".to_string(),
            })
    }

    fn lock_recorder(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, Option<ContractionRecorder>>, CalibrationError> {
        self.recorder
            .lock()
            .map_err(|_| CalibrationError::StatePoisoned)
    }

    fn read_calibration(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, Calibration>, CalibrationError> {
        self.calibration
            .read()
            .map_err(|_| CalibrationError::StatePoisoned)
    }

    fn write_calibration(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, Calibration>, CalibrationError> {
        self.calibration
            .write()
            .map_err(|_| CalibrationError::StatePoisoned)
    }

    // ------------------------------------------------------------------
    // Sensor lifecycle
    // ------------------------------------------------------------------

    /// Open the capture stream and spawn the pipeline thread.
    pub fn start(&self) -> Result<(), SensorError> {
        let mut session_guard = self.lock_session().map_err(|err| {
            log_sensor_error(&err, "start");
            err
        })?;
        if session_guard.is_some() {
            let err = SensorError::AlreadyRunning;
            log_sensor_error(&err, "start");
            return Err(err);
        }

        let (update_tx, _) = broadcast::channel(100);
        let (progress_tx, _) = broadcast::channel(100);
        if let Ok(mut guard) = self.update_broadcast.lock() {
            *guard = Some(update_tx.clone());
        }
        if let Ok(mut guard) = self.progress_broadcast.lock() {
            *guard = Some(progress_tx.clone());
        }

        let channels = FramePool::new(
            self.config.pipeline.frame_pool_size.max(1),
            CHUNK_CAPACITY,
        );
        let (capture_half, pipeline_half) = channels.split_for_threads();

        let shutdown = Arc::new(AtomicBool::new(false));
        let pipeline_handle = spawn_pipeline_thread(
            pipeline_half,
            self.config.sensor,
            &self.config.pipeline,
            Arc::clone(&self.calibration),
            Arc::clone(&self.recorder),
            Some(progress_tx),
            Arc::clone(&self.controller),
            update_tx,
            Arc::clone(&shutdown),
        )
        .map_err(|err| {
            log_sensor_error(&err, "start");
            err
        })?;

        let mut sensor = EmgSensor::new(self.config.sensor);
        if let Err(err) = sensor.start(capture_half) {
            // Unwind the pipeline thread before propagating
            shutdown.store(true, Ordering::SeqCst);
            if pipeline_handle.join().is_err() {
                tracing::error!("Pipeline thread panicked during unwind");
            }
            log_sensor_error(&err, "start");
            return Err(err);
        }

        *session_guard = Some(SensorSession {
            sensor,
            pipeline_handle,
            shutdown,
        });
        Ok(())
    }

    /// Stop capture, signal the pipeline thread, and join it.
    pub fn stop(&self) -> Result<(), SensorError> {
        let mut session_guard = self.lock_session().map_err(|err| {
            log_sensor_error(&err, "stop");
            err
        })?;
        let Some(mut session) = session_guard.take() else {
            let err = SensorError::NotRunning;
            log_sensor_error(&err, "stop");
            return Err(err);
        };

        let stop_result = session.sensor.stop();
        session.shutdown.store(true, Ordering::SeqCst);
        if session.pipeline_handle.join().is_err() {
            tracing::error!("Pipeline thread panicked");
        }

        // Dropping the senders ends subscriber streams
        if let Ok(mut guard) = self.update_broadcast.lock() {
            *guard = None;
        }
        if let Ok(mut guard) = self.progress_broadcast.lock() {
            *guard = None;
        }

        stop_result
    }

    /// Discard capture input without tearing the session down.
    pub fn pause(&self) -> Result<(), SensorError> {
        let session_guard = self.lock_session()?;
        match session_guard.as_ref() {
            Some(session) => session.sensor.pause(),
            None => {
                let err = SensorError::NotRunning;
                log_sensor_error(&err, "pause");
                Err(err)
            }
        }
    }

    pub fn resume(&self) -> Result<(), SensorError> {
        let session_guard = self.lock_session()?;
        match session_guard.as_ref() {
            Some(session) => session.sensor.resume(),
            None => {
                let err = SensorError::NotRunning;
                log_sensor_error(&err, "resume");
                Err(err)
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_session()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    // ------------------------------------------------------------------
    // Calibration workflow
    // ------------------------------------------------------------------

    /// Arm a contraction recording. The pipeline thread fills the window;
    /// the completed peak lands in the MVC store automatically.
    pub fn start_contraction(&self) -> Result<(), CalibrationError> {
        let mut recorder_guard = self.lock_recorder().map_err(|err| {
            log_calibration_error(&err, "start_contraction");
            err
        })?;
        if recorder_guard.is_some() {
            let err = CalibrationError::AlreadyInProgress;
            log_calibration_error(&err, "start_contraction");
            return Err(err);
        }

        {
            let cal = self.read_calibration().map_err(|err| {
                log_calibration_error(&err, "start_contraction");
                err
            })?;
            if cal.len() >= cal.capacity() {
                let err = CalibrationError::ContractionLimitReached {
                    limit: cal.capacity(),
                };
                log_calibration_error(&err, "start_contraction");
                return Err(err);
            }
        }

        let required = (CONTRACTION_LENGTH_SECONDS * self.config.sensor.update_rate) as usize;
        *recorder_guard = Some(ContractionRecorder::new(required));
        tracing::info!("Contraction recording armed ({} samples)", required);
        Ok(())
    }

    /// Abandon an in-progress contraction recording.
    pub fn cancel_contraction(&self) -> Result<(), CalibrationError> {
        let mut recorder_guard = self.lock_recorder().map_err(|err| {
            log_calibration_error(&err, "cancel_contraction");
            err
        })?;
        if recorder_guard.take().is_none() {
            let err = CalibrationError::NotInProgress;
            log_calibration_error(&err, "cancel_contraction");
            return Err(err);
        }
        Ok(())
    }

    pub fn is_contraction_active(&self) -> bool {
        self.lock_recorder()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Drop all recorded contractions and start over.
    pub fn clear_calibration(&self) -> Result<(), CalibrationError> {
        let mut cal = self.write_calibration().map_err(|err| {
            log_calibration_error(&err, "clear_calibration");
            err
        })?;
        cal.clear();
        Ok(())
    }

    /// Copy of the current MVC store, for display and persistence.
    pub fn calibration_snapshot(&self) -> Result<Calibration, CalibrationError> {
        self.read_calibration().map(|guard| guard.clone())
    }

    // ------------------------------------------------------------------
    // Controller access
    // ------------------------------------------------------------------

    /// Connect the TCP state publisher configured in `output` and attach it
    /// to the controller. Connection failure propagates as a hardware error;
    /// callers may treat it as degraded mode and continue.
    pub fn connect_output(&self) -> Result<(), SensorError> {
        let publisher = StatePublisher::connect(&self.config.output.host, self.config.output.port)
            .map_err(SensorError::from)?;
        let mut controller = self.lock_controller().map_err(|err| {
            log_sensor_error(&err, "connect_output");
            err
        })?;
        controller.attach_sink(Box::new(publisher));
        Ok(())
    }

    pub fn set_thresholds(&self, low: f32, high: f32) -> Result<(), SensorError> {
        let mut controller = self.lock_controller()?;
        controller.set_low_threshold(low);
        controller.set_high_threshold(high);
        Ok(())
    }

    pub fn set_rotation_increment(&self, increment: f32) -> Result<(), SensorError> {
        self.lock_controller()?.set_rotation_increment(increment);
        Ok(())
    }

    pub fn set_forward_speeds(&self, slow: f32, fast_max: f32) -> Result<(), SensorError> {
        let mut controller = self.lock_controller()?;
        controller.set_forward_slow(slow);
        controller.set_forward_fast_max(fast_max);
        Ok(())
    }

    pub fn set_transition_delay(&self, delay: Duration) -> Result<(), SensorError> {
        self.lock_controller()?.set_transition_delay(delay);
        Ok(())
    }

    pub fn reset_pose(&self) -> Result<(), SensorError> {
        self.lock_controller()?.reset();
        Ok(())
    }

    pub fn reset_pose_random_heading(&self) -> Result<(), SensorError> {
        self.lock_controller()?.reset_random_heading();
        Ok(())
    }

    pub fn pose(&self) -> Result<Pose, SensorError> {
        Ok(self.lock_controller()?.pose())
    }

    pub fn controller_config(&self) -> Result<ControllerConfig, SensorError> {
        Ok(self.lock_controller()?.config())
    }

    // ------------------------------------------------------------------
    // Streams
    // ------------------------------------------------------------------

    /// Stream of per-frame effort snapshots, ending when the session stops.
    pub async fn effort_stream(&self) -> impl futures::Stream<Item = EffortUpdate> {
        use futures::stream::StreamExt;

        let receiver = match self.update_broadcast.lock() {
            Ok(guard) => guard.as_ref().map(|tx| tx.subscribe()),
            Err(_) => {
                log::error!("Effort broadcast lock poisoned");
                None
            }
        };

        if let Some(rx) = receiver {
            futures::stream::unfold(rx, |mut rx| async move {
                match rx.recv().await {
                    Ok(update) => Some((update, rx)),
                    Err(_) => None,
                }
            })
            .boxed()
        } else {
            futures::stream::empty().boxed()
        }
    }

    /// Stream of calibration progress snapshots while capture is running.
    pub async fn progress_stream(&self) -> impl futures::Stream<Item = CalibrationProgress> {
        use futures::stream::StreamExt;

        let receiver = match self.progress_broadcast.lock() {
            Ok(guard) => guard.as_ref().map(|tx| tx.subscribe()),
            Err(_) => {
                log::error!("Progress broadcast lock poisoned");
                None
            }
        };

        if let Some(rx) = receiver {
            futures::stream::unfold(rx, |mut rx| async move {
                match rx.recv().await {
                    Ok(progress) => Some((progress, rx)),
                    Err(_) => None,
                }
            })
            .boxed()
        } else {
            futures::stream::empty().boxed()
        }
    }
}

impl Default for AppContext {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

#[cfg(test)]
impl AppContext {
    /// Isolated context per test, preventing state leakage between tests.
    pub fn new_test() -> Self {
        Self::new(AppConfig::default())
    }

    /// Inject a pre-built MVC store (skips the capture workflow).
    pub fn with_calibration(calibration: Calibration) -> Self {
        let ctx = Self::new_test();
        if let Ok(mut guard) = ctx.calibration.write() {
            *guard = calibration;
        }
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;

    #[test]
    fn test_new_context_is_idle() {
        let ctx = AppContext::new_test();
        assert!(!ctx.is_running());
        assert!(!ctx.is_contraction_active());
        assert!(ctx.calibration_snapshot().unwrap().is_empty());
    }

    #[test]
    fn test_lifecycle_errors_when_idle() {
        let ctx = AppContext::new_test();
        assert_eq!(ctx.stop().unwrap_err(), SensorError::NotRunning);
        assert_eq!(ctx.pause().unwrap_err(), SensorError::NotRunning);
        assert_eq!(ctx.resume().unwrap_err(), SensorError::NotRunning);
    }

    #[test]
    fn test_contraction_workflow_guards() {
        let ctx = AppContext::new_test();

        ctx.start_contraction().unwrap();
        assert!(ctx.is_contraction_active());
        assert_eq!(
            ctx.start_contraction().unwrap_err(),
            CalibrationError::AlreadyInProgress
        );

        ctx.cancel_contraction().unwrap();
        assert!(!ctx.is_contraction_active());
        assert_eq!(
            ctx.cancel_contraction().unwrap_err(),
            CalibrationError::NotInProgress
        );
    }

    #[test]
    fn test_contraction_window_sized_from_update_rate() {
        let ctx = AppContext::new_test();
        ctx.start_contraction().unwrap();
        let guard = ctx.recorder.lock().unwrap();
        // 3 seconds at 4 updates per second
        assert_eq!(guard.as_ref().unwrap().samples_required(), 12);
    }

    #[test]
    fn test_full_store_blocks_new_contractions() {
        let mut full = Calibration::new();
        for _ in 0..full.capacity() {
            full.add_calibration_value(Position::new(1.0, 1.0)).unwrap();
        }
        let ctx = AppContext::with_calibration(full);

        assert!(matches!(
            ctx.start_contraction().unwrap_err(),
            CalibrationError::ContractionLimitReached { .. }
        ));

        // clear() reopens the workflow
        ctx.clear_calibration().unwrap();
        ctx.start_contraction().unwrap();
    }

    #[test]
    fn test_controller_setters_apply() {
        let ctx = AppContext::new_test();
        ctx.set_thresholds(0.2, 0.6).unwrap();
        ctx.set_forward_speeds(0.01, 0.2).unwrap();
        ctx.set_transition_delay(Duration::from_millis(300)).unwrap();

        let config = ctx.controller_config().unwrap();
        assert_eq!(config.low_threshold, 0.2);
        assert_eq!(config.high_threshold, 0.6);
        assert_eq!(config.forward_slow, 0.01);
        assert_eq!(config.forward_fast_max, 0.2);
        assert_eq!(config.transition_delay, Duration::from_millis(300));
    }

    #[test]
    fn test_reset_pose() {
        let ctx = AppContext::new_test();
        ctx.reset_pose_random_heading().unwrap();
        let pose = ctx.pose().unwrap();
        assert_eq!(pose.x, 0.0);
        assert_eq!(pose.y, 0.0);

        ctx.reset_pose().unwrap();
        assert_eq!(ctx.pose().unwrap().theta, 0.0);
    }

    #[tokio::test]
    async fn test_streams_empty_before_start() {
        use futures::StreamExt;
        let ctx = AppContext::new_test();
        let mut stream = ctx.effort_stream().await;
        assert!(stream.next().await.is_none());
        let mut progress = ctx.progress_stream().await;
        assert!(progress.next().await.is_none());
    }

    #[test]
    fn test_contexts_are_isolated() {
        let a = AppContext::new_test();
        let b = AppContext::new_test();
        a.start_contraction().unwrap();
        assert!(a.is_contraction_active());
        assert!(!b.is_contraction_active());
    }
}
