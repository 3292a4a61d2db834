// Audio cue hooks for threshold crossings
//
// The controller runs on the pipeline thread, so cue playback must never
// block it. ThreadedCues runs each cue action on a throwaway thread, with a
// per-cue AtomicBool guard so a cue still playing is not retriggered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Playback hooks fired by the controller on rising threshold crossings.
pub trait CuePlayer: Send {
    /// Effort rose from rest into the ambiguous band
    fn band_entry(&self);
    /// Effort rose past the high threshold
    fn high_entry(&self);
}

/// Silent cue player, the default.
pub struct NullCues;

impl CuePlayer for NullCues {
    fn band_entry(&self) {}
    fn high_entry(&self) {}
}

type CueAction = Arc<dyn Fn() + Send + Sync>;

/// One cue: an action plus its in-flight guard.
struct Cue {
    playing: Arc<AtomicBool>,
    action: CueAction,
}

impl Cue {
    fn new(action: CueAction) -> Self {
        Self {
            playing: Arc::new(AtomicBool::new(false)),
            action,
        }
    }

    /// Run the action off-thread unless a previous run is still in flight.
    fn fire(&self) {
        if self
            .playing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let playing = Arc::clone(&self.playing);
            let action = Arc::clone(&self.action);
            thread::spawn(move || {
                action();
                playing.store(false, Ordering::Release);
            });
        }
    }
}

/// Fire-and-forget cue player backed by short-lived threads.
pub struct ThreadedCues {
    band: Cue,
    high: Cue,
}

impl ThreadedCues {
    pub fn new<B, H>(band_action: B, high_action: H) -> Self
    where
        B: Fn() + Send + Sync + 'static,
        H: Fn() + Send + Sync + 'static,
    {
        Self {
            band: Cue::new(Arc::new(band_action)),
            high: Cue::new(Arc::new(high_action)),
        }
    }
}

impl CuePlayer for ThreadedCues {
    fn band_entry(&self) {
        self.band.fire();
    }

    fn high_entry(&self) {
        self.high.fire();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_cue_runs_off_thread() {
        let (tx, rx) = mpsc::channel();
        let cues = ThreadedCues::new(move || tx.send("band").unwrap(), || {});

        cues.band_entry();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(1)).unwrap(),
            "band",
            "cue action should run shortly after fire"
        );
    }

    #[test]
    fn test_in_flight_cue_not_retriggered() {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = std::sync::Mutex::new(release_rx);

        let cues = ThreadedCues::new(
            move || {
                started_tx.send(()).unwrap();
                // Hold the cue "playing" until the test releases it.
                let _ = release_rx.lock().unwrap().recv();
            },
            || {},
        );

        cues.band_entry();
        started_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("first fire should start");

        // Retrigger while the first run is still in flight.
        cues.band_entry();
        assert!(
            started_rx.recv_timeout(Duration::from_millis(100)).is_err(),
            "second fire must be suppressed while playing"
        );

        release_tx.send(()).unwrap();
        // Give the worker a moment to clear the guard, then fire again.
        thread::sleep(Duration::from_millis(50));
        cues.band_entry();
        started_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("cue should fire again once the previous run finished");
        release_tx.send(()).unwrap();
    }

    #[test]
    fn test_cues_are_independent() {
        let (band_tx, band_rx) = mpsc::channel();
        let (high_tx, high_rx) = mpsc::channel();
        let cues = ThreadedCues::new(
            move || band_tx.send(()).unwrap(),
            move || high_tx.send(()).unwrap(),
        );

        cues.high_entry();
        assert!(high_rx.recv_timeout(Duration::from_secs(1)).is_ok());
        assert!(band_rx.recv_timeout(Duration::from_millis(50)).is_err());
    }
}
