//! End-to-end offline pipeline tests
//!
//! A synthetic session (rest, then a moderate hold, then a maximal
//! contraction) replayed against an MVC calibration must walk the controller
//! through the full state ladder with the reference thresholds. The replay
//! harness shares its numerics with the live pipeline, so these double as
//! whole-pipeline behavior checks.

use emg_rover::controller::InputState;
use emg_rover::fixtures::{contraction_profile, tone, ReplayProcessor};
use emg_rover::{AppConfig, Calibration};

const RATE: u32 = 8_000;
// In the passband of the first analysis band after decimation to 4 kHz.
const FREQ: f32 = 90.0;

fn calibrated_processor() -> (ReplayProcessor, Calibration) {
    let processor = ReplayProcessor::new(AppConfig::default());
    let mvc_recording = tone(FREQ, RATE, 1.0, 3 * RATE as usize);
    let calibration = processor
        .calibration_from(&mvc_recording, RATE)
        .expect("calibration from maximal recording");
    (processor, calibration)
}

#[test]
fn test_session_walks_the_state_ladder() {
    let (processor, calibration) = calibrated_processor();

    // 2 s rest, 4 s at 40% amplitude (16% power, inside the ambiguous
    // band after normalization), 5 s maximal.
    let session = contraction_profile(FREQ, RATE, &[(0.0, 2.0), (0.4, 4.0), (1.0, 5.0)]);
    let updates = processor.run(&session, RATE, &calibration).unwrap();
    assert_eq!(updates.len(), 44, "11 seconds at 4 updates per second");

    let states: Vec<InputState> = updates.iter().map(|u| u.state).collect();

    // Rest frames classify Low from the start.
    assert_eq!(states[0], InputState::Low);
    assert!(states[..8].iter().all(|&s| s == InputState::Low));

    // The moderate hold reaches Med, and only via Transitioning.
    let first_med = states
        .iter()
        .position(|&s| s == InputState::Med)
        .expect("moderate hold must debounce into Med");
    assert!(first_med < 24, "Med must arrive within the moderate hold");
    assert_eq!(
        states[first_med - 1],
        InputState::Transitioning,
        "promotion to Med requires a dwell in Transitioning"
    );

    // No High before the maximal segment (5 s tail = last 20 frames).
    assert!(states[..24].iter().all(|&s| s != InputState::High));
    assert_eq!(*states.last().unwrap(), InputState::High);

    // Effort ends well past the high threshold under MVC normalization.
    assert!(updates.last().unwrap().effort > 0.42);
}

#[test]
fn test_rest_rotates_and_contraction_translates() {
    let (processor, calibration) = calibrated_processor();

    let session = contraction_profile(FREQ, RATE, &[(0.0, 2.0), (1.0, 5.0)]);
    let updates = processor.run(&session, RATE, &calibration).unwrap();

    // Rest: heading moves, position holds.
    let rest_last = &updates[7];
    assert!(rest_last.pose.theta > 0.0);
    assert_eq!(rest_last.pose.x, 0.0);
    assert_eq!(rest_last.pose.y, 0.0);

    // Sustained contraction: the rover translates along its heading.
    let end = updates.last().unwrap();
    let displacement = (end.pose.x.powi(2) + end.pose.y.powi(2)).sqrt();
    assert!(
        displacement > 0.05,
        "sustained High must accumulate displacement, got {}",
        displacement
    );
    assert!(end.pose.x.abs() <= 1.0 && end.pose.y.abs() <= 1.0);
}

#[test]
fn test_brief_spike_never_reaches_med() {
    let (processor, calibration) = calibrated_processor();

    // One 250 ms frame inside the ambiguous band, then rest: the dwell
    // requirement is met, but the signal leaves the band first.
    let session = contraction_profile(FREQ, RATE, &[(0.0, 3.0), (0.4, 0.25), (0.0, 3.0)]);
    let updates = processor.run(&session, RATE, &calibration).unwrap();

    let states: Vec<InputState> = updates.iter().map(|u| u.state).collect();
    assert!(
        states.iter().all(|&s| s != InputState::Med),
        "a single-frame excursion must not debounce into Med: {:?}",
        states
    );
}

#[test]
fn test_uncalibrated_replay_stays_defined() {
    // Without calibration the MVC mean is (0, 0); the substituted divisor
    // keeps the pipeline numeric (raw band power feeds the controller).
    let processor = ReplayProcessor::new(AppConfig::default());
    let session = contraction_profile(FREQ, RATE, &[(0.0, 1.0), (1.0, 2.0)]);
    let updates = processor.run(&session, RATE, &Calibration::new()).unwrap();

    assert_eq!(updates.len(), 12);
    assert!(updates.iter().all(|u| u.effort.is_finite()));
}
