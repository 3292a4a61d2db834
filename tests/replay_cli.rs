//! CLI smoke tests for the replay subcommand
//!
//! Drives the built binary against generated WAV fixtures and checks the
//! JSON-lines contract on stdout.

use std::path::PathBuf;
use std::process::Command;

use serde_json::Value;

use emg_rover::fixtures::{contraction_profile, tone, write_wav};

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_emg_rover"))
}

fn temp_wav(name: &str, samples: &[f32]) -> PathBuf {
    let path = std::env::temp_dir().join(format!("emg-rover-{}-{}.wav", std::process::id(), name));
    write_wav(&path, samples, 8_000).expect("write fixture wav");
    path
}

#[test]
fn replay_outputs_json_lines() {
    let session = contraction_profile(90.0, 8_000, &[(0.0, 1.0), (0.5, 2.0)]);
    let wav = temp_wav("session", &session);

    let output = cli()
        .args(["replay", wav.to_str().unwrap()])
        .output()
        .expect("replay command");
    std::fs::remove_file(&wav).ok();

    assert!(
        output.status.success(),
        "replay exited with {:?}: {}",
        output.status.code(),
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8(output.stdout).expect("stdout utf8");
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 12, "3 seconds at 4 updates per second");

    for line in lines {
        let event: Value = serde_json::from_str(line).expect("each line is a JSON object");
        assert!(event.get("state").is_some());
        assert!(event.get("effort").is_some());
        assert!(event.get("pose").is_some());
        assert!(event.get("timestamp_ms").is_some());
    }
}

#[test]
fn replay_with_calibration_recording() {
    let mvc = tone(90.0, 8_000, 1.0, 3 * 8_000);
    let mvc_wav = temp_wav("mvc", &mvc);
    let session = contraction_profile(90.0, 8_000, &[(0.0, 1.0), (1.0, 3.0)]);
    let session_wav = temp_wav("calibrated-session", &session);

    let output = cli()
        .args([
            "replay",
            session_wav.to_str().unwrap(),
            "--calibrate-from",
            mvc_wav.to_str().unwrap(),
        ])
        .output()
        .expect("replay command");
    std::fs::remove_file(&mvc_wav).ok();
    std::fs::remove_file(&session_wav).ok();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout utf8");
    let last: Value = serde_json::from_str(stdout.lines().last().expect("output lines")).unwrap();
    assert_eq!(
        last["state"], "High",
        "sustained maximal contraction must end High: {}",
        last
    );
}

#[test]
fn replay_rejects_missing_file() {
    let output = cli()
        .args(["replay", "/nonexistent/recording.wav"])
        .output()
        .expect("replay command");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error"), "stderr: {}", stderr);
}
