// ThresholdController - hysteretic effort-to-motion state machine
//
// Classifies a normalized scalar effort value into one of four states and
// applies the corresponding motion to an integrated pose (x, y, theta). The
// ambiguous band between the two thresholds is bridged by a debounce: a fresh
// entry lands in Transitioning and is only promoted to Med once the dwell
// time reaches the configured delay, suppressing noise-driven flicker.
//
// The motion action is re-applied on every evaluated update, keyed by the
// resulting state, so the pose keeps integrating while a state is sustained.
// Time is injected through `update(value, now)` rather than read from a wall
// clock, which keeps the dwell logic deterministic under test.

pub mod cues;

use std::f32::consts::PI;
use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::proc::util::{wrap_angle, TWO_PI};

pub use cues::{CuePlayer, NullCues, ThreadedCues};

/// Controller states. Wire ordinals follow declaration order:
/// Transitioning = 0, Low = 1, Med = 2, High = 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputState {
    Transitioning,
    Low,
    Med,
    High,
}

impl InputState {
    /// Ordinal written to the output transport.
    pub fn ordinal(self) -> u8 {
        match self {
            InputState::Transitioning => 0,
            InputState::Low => 1,
            InputState::Med => 2,
            InputState::High => 3,
        }
    }
}

/// Integrated pose. x and y stay in [-1, 1]; theta stays in [0, 2*pi).
/// Owned exclusively by the controller; consumers receive copies.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f32,
    pub y: f32,
    pub theta: f32,
}

/// Motion-shaping and hysteresis parameters.
///
/// No cross-field validation is performed: inverted thresholds
/// (low >= high) are accepted as configured, matching the reference
/// behavior, and simply collapse the ambiguous band.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Below this the effort reads as rest (rotate-in-place)
    pub low_threshold: f32,
    /// At or above this the effort reads as a strong contraction
    pub high_threshold: f32,
    /// Constant forward speed component, applied in Med and High
    pub forward_slow: f32,
    /// Maximum additional forward increment at effort saturation
    pub forward_fast_max: f32,
    /// Heading change per Low update, radians
    pub rotation_increment: f32,
    /// Dwell required in the ambiguous band before promoting to Med
    pub transition_delay: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            low_threshold: 0.15,
            high_threshold: 0.42,
            forward_slow: 0.05,
            forward_fast_max: 0.1,
            rotation_increment: PI / 16.0,
            transition_delay: Duration::from_millis(150),
        }
    }
}

/// Sink for state ordinals on the output transport. A failed publish is the
/// transport's problem, not the controller's: the controller marks the
/// session disconnected and keeps running.
pub trait StateSink: Send {
    fn publish(&mut self, state: InputState) -> std::io::Result<()>;
}

pub struct ThresholdController {
    config: ControllerConfig,
    state: InputState,
    pose: Pose,
    prev_value: f32,
    band_entered_at: Option<Instant>,
    cues: Box<dyn CuePlayer>,
    sink: Option<Box<dyn StateSink>>,
    connected: bool,
}

impl ThresholdController {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            state: InputState::Low,
            pose: Pose::default(),
            prev_value: 0.0,
            band_entered_at: None,
            cues: Box::new(NullCues),
            sink: None,
            connected: false,
        }
    }

    /// Replace the cue player (rising-crossing audio feedback).
    pub fn with_cues(mut self, cues: Box<dyn CuePlayer>) -> Self {
        self.cues = cues;
        self
    }

    /// Attach an output sink. The session counts as connected until a
    /// publish fails.
    pub fn attach_sink(&mut self, sink: Box<dyn StateSink>) {
        self.sink = Some(sink);
        self.connected = true;
    }

    /// Evaluate one effort sample at time `now`: run the transition rule,
    /// apply the resulting state's motion to the pose, publish the state
    /// ordinal, and fire any rising-crossing cues.
    pub fn update(&mut self, value: f32, now: Instant) {
        let cfg = self.config;

        if value < cfg.low_threshold {
            self.state = InputState::Low;
        } else if value < cfg.high_threshold {
            // Fresh entry into the ambiguous band from either side restarts
            // the dwell clock.
            let fresh_entry = self.prev_value < cfg.low_threshold
                || self.prev_value >= cfg.high_threshold
                || self.band_entered_at.is_none();
            if fresh_entry {
                self.band_entered_at = Some(now);
                self.state = InputState::Transitioning;
            }

            if self.state != InputState::Med {
                if let Some(entered) = self.band_entered_at {
                    if now.duration_since(entered) >= cfg.transition_delay {
                        self.state = InputState::Med;
                    }
                }
            }

            if self.prev_value < cfg.low_threshold {
                self.cues.band_entry();
            }
        } else {
            if self.prev_value < cfg.high_threshold {
                self.cues.high_entry();
            }
            self.state = InputState::High;
        }

        self.apply_motion(value);
        self.publish_state();
        self.prev_value = value;
    }

    /// Apply the resulting state's motion effect. Transitioning is an
    /// explicit no-op bridging the debounce window.
    fn apply_motion(&mut self, value: f32) {
        match self.state {
            InputState::Low => self.rotate(self.config.rotation_increment),
            InputState::Transitioning => {}
            InputState::Med => self.forward(0.0),
            InputState::High => {
                let excess = (value - self.config.high_threshold)
                    / (1.0 - self.config.high_threshold);
                self.forward(excess);
            }
        }
    }

    fn publish_state(&mut self) {
        // Transitioning writes nothing, matching the reference protocol.
        if self.state == InputState::Transitioning || !self.connected {
            return;
        }
        if let Some(sink) = self.sink.as_mut() {
            if let Err(err) = sink.publish(self.state) {
                tracing::warn!("state publish failed, session degraded: {}", err);
                self.connected = false;
            }
        }
    }

    fn rotate(&mut self, increment: f32) {
        self.pose.theta = wrap_angle(self.pose.theta + increment);
    }

    /// Move along the current heading. The normalized magnitude is shaped
    /// parabolically with a constant offset: small steps dominate near the
    /// threshold, full speed only at saturation. Each axis is clamped to
    /// [-1, 1] after the update.
    fn forward(&mut self, magnitude: f32) {
        let v = magnitude.clamp(0.0, 1.0);
        let step = self.config.forward_slow + self.config.forward_fast_max * v * v;

        self.pose.x = (self.pose.x + step * self.pose.theta.cos()).clamp(-1.0, 1.0);
        self.pose.y = (self.pose.y + step * self.pose.theta.sin()).clamp(-1.0, 1.0);
    }

    /// Zero the pose.
    pub fn reset(&mut self) {
        self.pose = Pose::default();
    }

    /// Zero the pose and pick a uniformly random heading.
    pub fn reset_random_heading(&mut self) {
        self.reset();
        self.pose.theta = rand::thread_rng().gen_range(0.0..TWO_PI);
    }

    pub fn state(&self) -> InputState {
        self.state
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn config(&self) -> ControllerConfig {
        self.config
    }

    pub fn set_low_threshold(&mut self, threshold: f32) {
        self.config.low_threshold = threshold;
    }

    pub fn set_high_threshold(&mut self, threshold: f32) {
        self.config.high_threshold = threshold;
    }

    pub fn set_rotation_increment(&mut self, increment: f32) {
        self.config.rotation_increment = increment;
    }

    pub fn set_forward_slow(&mut self, speed: f32) {
        self.config.forward_slow = speed;
    }

    pub fn set_forward_fast_max(&mut self, speed: f32) {
        self.config.forward_fast_max = speed;
    }

    pub fn set_transition_delay(&mut self, delay: Duration) {
        self.config.transition_delay = delay;
    }
}
