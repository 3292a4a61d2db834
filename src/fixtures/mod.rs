//! Fixture utilities for the deterministic replay harness.
//!
//! Loads PCM WAV recordings of raw EMG, generates synthetic contraction
//! profiles, and drives the full effort pipeline offline with a synthetic
//! clock. Used by the `replay` CLI subcommand and integration tests; no
//! hardware, no threads, identical numerics to the live path.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};

use crate::calibration::Calibration;
use crate::config::AppConfig;
use crate::controller::ThresholdController;
use crate::pipeline::EffortUpdate;
use crate::position::Position;
use crate::proc::util::rms;
use crate::proc::{BandFilter, MovingAverageFilter, PositionFilter};

/// Read a mono WAV into f32 samples.
pub fn read_wav(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    if spec.channels != 1 {
        return Err(anyhow!(
            "Fixture {} must be mono (found {} channels)",
            path.display(),
            spec.channels
        ));
    }

    let sample_rate = spec.sample_rate;

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|sample| sample.map_err(|err| anyhow!(err)))
            .collect::<Result<Vec<f32>>>()?,
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) - 1;
            match spec.bits_per_sample {
                16 => reader
                    .samples::<i16>()
                    .map(|sample| {
                        sample
                            .map(|value| value as f32 / max as f32)
                            .map_err(|err| anyhow!(err))
                    })
                    .collect::<Result<Vec<f32>>>()?,
                24 | 32 => reader
                    .samples::<i32>()
                    .map(|sample| {
                        sample
                            .map(|value| value as f32 / max as f32)
                            .map_err(|err| anyhow!(err))
                    })
                    .collect::<Result<Vec<f32>>>()?,
                other => {
                    return Err(anyhow!(
                        "Unsupported bits per sample {} in {}",
                        other,
                        path.display()
                    ))
                }
            }
        }
    };

    Ok((samples, sample_rate))
}

/// Write f32 samples as a mono float WAV (fixture authoring).
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("creating {}", path.display()))?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Pure sine at `freq` Hz, the stand-in for in-band muscle activity.
pub fn tone(freq: f32, sample_rate: u32, amplitude: f32, len: usize) -> Vec<f32> {
    let step = 2.0 * std::f32::consts::PI * freq / sample_rate as f32;
    (0..len).map(|n| amplitude * (step * n as f32).sin()).collect()
}

/// Piecewise amplitude-modulated tone: one `(amplitude, seconds)` segment
/// after another, phase-continuous across segments. Models a rest /
/// contraction / rest sequence.
pub fn contraction_profile(freq: f32, sample_rate: u32, segments: &[(f32, f32)]) -> Vec<f32> {
    let step = 2.0 * std::f32::consts::PI * freq / sample_rate as f32;
    let mut samples = Vec::new();
    let mut n = 0u64;
    for &(amplitude, seconds) in segments {
        let count = (seconds * sample_rate as f32) as u64;
        for _ in 0..count {
            samples.push(amplitude * (step * n as f32).sin());
            n += 1;
        }
    }
    samples
}

/// Offline runner for the effort pipeline.
///
/// Frames are cut exactly as the live pipeline would and the controller is
/// stepped with a synthetic clock advancing one frame period per frame, so
/// the debounce behaves identically run after run.
pub struct ReplayProcessor {
    config: AppConfig,
}

impl ReplayProcessor {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Derive an MVC calibration from a recording of a maximal contraction:
    /// the whole recording is treated as one contraction window.
    pub fn calibration_from(&self, samples: &[f32], sample_rate: u32) -> Result<Calibration> {
        let frame_len = self.frame_len(sample_rate)?;
        let decimation = self.config.sensor.downsample_factor.max(1) as usize;

        let mut band_filter = BandFilter::new();
        let decimated = decimate(samples, decimation);
        let window: Vec<Position> = decimated
            .chunks_exact(frame_len)
            .map(|frame| band_filter.filter(frame))
            .collect();

        let mut calibration = Calibration::new();
        calibration
            .add_contraction(&window)
            .map_err(|err| anyhow!(err))?;
        Ok(calibration)
    }

    /// Run the recording through the pipeline, one `EffortUpdate` per frame.
    /// Trailing samples short of a full frame are dropped, as live capture
    /// would leave them unconsumed.
    pub fn run(
        &self,
        samples: &[f32],
        sample_rate: u32,
        calibration: &Calibration,
    ) -> Result<Vec<EffortUpdate>> {
        if samples.is_empty() {
            return Ok(Vec::new());
        }

        let frame_len = self.frame_len(sample_rate)?;
        let decimation = self.config.sensor.downsample_factor.max(1) as usize;
        let frame_period = Duration::from_secs_f64(1.0 / self.config.sensor.update_rate as f64);

        let mut band_filter = BandFilter::new();
        let mut smoother = PositionFilter::new();
        let mut effort_filter =
            MovingAverageFilter::new(self.config.pipeline.effort_window.max(1));
        let mut controller =
            ThresholdController::new(self.config.controller.to_controller_config());

        let mvc = calibration.mean_calibration();
        let (mvc_q1, mvc_q2) = (
            if mvc.q1 > 0.0 { mvc.q1 } else { 1.0 },
            if mvc.q2 > 0.0 { mvc.q2 } else { 1.0 },
        );

        let clock_start = Instant::now();
        let decimated = decimate(samples, decimation);
        let mut updates = Vec::with_capacity(decimated.len() / frame_len);

        for (index, frame) in decimated.chunks_exact(frame_len).enumerate() {
            let power = band_filter.filter(frame);
            let mut normalized = smoother.filter(power.q1, power.q2);
            normalized.scale(mvc_q1, mvc_q2);
            let effort = effort_filter.update(rms(&[normalized.q1, normalized.q2]));

            let now = clock_start + frame_period * (index as u32 + 1);
            controller.update(effort, now);

            updates.push(EffortUpdate {
                state: controller.state(),
                effort,
                pose: controller.pose(),
                connected: false,
                timestamp_ms: (index as u64 + 1) * 1000 / self.config.sensor.update_rate as u64,
            });
        }

        Ok(updates)
    }

    fn frame_len(&self, sample_rate: u32) -> Result<usize> {
        let mut sensor = self.config.sensor;
        sensor.sample_rate = sample_rate;
        sensor.frame_len().map_err(|err| anyhow!(err))
    }
}

fn decimate(samples: &[f32], factor: usize) -> Vec<f32> {
    samples.iter().step_by(factor.max(1)).copied().collect()
}
