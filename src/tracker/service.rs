use super::Tracker;
use crate::clock::unix_now;
use crate::config::Settings;
use crate::error::AppError;
use crate::platform::FocusProbe;
use crate::safe_lock;
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, TryLockError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[allow(
    clippy::as_conversions,
    clippy::cast_precision_loss,
    reason = "configured intervals are far below 2^53 ms"
)]
fn millis_to_secs(millis: u64) -> f64 {
    millis as f64 / 1000.0
}

/// Runs the tick loop on its own thread. The autosave and running-app refresh share the
/// loop, so nothing ever touches the tracker concurrently with a tick.
pub struct TrackerService<P: FocusProbe + 'static> {
    tracker: Arc<Mutex<Tracker<P>>>,
    running: Arc<AtomicBool>,
    tick_interval: Duration,
    autosave_interval_secs: f64,
    app_list_interval_secs: f64,
}

impl<P: FocusProbe + 'static> TrackerService<P> {
    pub fn new(tracker: Tracker<P>, settings: &Settings) -> Self {
        Self {
            tracker: Arc::new(Mutex::new(tracker)),
            running: Arc::new(AtomicBool::new(false)),
            tick_interval: Duration::from_millis(settings.ui.tick_interval_ms),
            autosave_interval_secs: settings.data_management.autosave_interval_secs,
            app_list_interval_secs: millis_to_secs(settings.ui.app_list_interval_ms),
        }
    }

    /// Shared handle for UI calls such as `select_app` between ticks.
    pub fn tracker(&self) -> Arc<Mutex<Tracker<P>>> {
        Arc::clone(&self.tracker)
    }

    pub fn start(&self) -> Result<JoinHandle<()>, AppError> {
        self.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let tracker = Arc::clone(&self.tracker);
        let tick_interval = self.tick_interval;
        let autosave_interval = self.autosave_interval_secs;
        let app_list_interval = self.app_list_interval_secs;

        let handle = thread::Builder::new()
            .name("tracker-tick".into())
            .spawn(move || {
                let mut last_autosave = unix_now();
                let mut last_app_list = f64::NEG_INFINITY;

                while running.load(Ordering::SeqCst) {
                    let now = unix_now();
                    let guard = match tracker.try_lock() {
                        Ok(guard) => Some(guard),
                        // A UI call holds the tracker; this tick is dropped, not queued.
                        Err(TryLockError::WouldBlock) => {
                            debug!("Tracker busy, skipping tick");
                            None
                        }
                        Err(TryLockError::Poisoned(poisoned)) => {
                            warn!("Tracker mutex was poisoned, recovering");
                            Some(poisoned.into_inner())
                        }
                    };
                    if let Some(mut tracker) = guard {
                        tracker.tick(now);
                        if now - last_autosave >= autosave_interval {
                            let written = tracker.autosave(now);
                            debug!("Autosave wrote {written} file(s)");
                            last_autosave = now;
                        }
                        if now - last_app_list >= app_list_interval {
                            tracker.refresh_running_apps(now);
                            last_app_list = now;
                        }
                    }
                    thread::sleep(tick_interval);
                }
            })?;
        info!("Tracker started");
        Ok(handle)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop ticking, wait for the last tick, then write everything.
    pub fn shutdown(&self, handle: JoinHandle<()>) -> usize {
        self.stop();
        if handle.join().is_err() {
            error!("Tracker thread panicked");
        }
        let mut tracker = safe_lock(&self.tracker, "tracker");
        tracker.shutdown(unix_now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::today;
    use crate::store::DatasetKind;
    use crate::test_utils::{setup_test_store, FakeProbe};
    use crate::timer::TimerState;

    #[test]
    fn test_tracker_starts_and_stops() {
        let mut settings = Settings::default();
        settings.ui.tick_interval_ms = 10;
        let (store, _dir) = setup_test_store(&settings.data_management);
        let probe = FakeProbe::new();
        probe.focus("Editor", 42);

        let mut tracker = Tracker::new(probe, store, &settings, unix_now());
        tracker.select_app("Editor", unix_now()).unwrap();
        let service = TrackerService::new(tracker, &settings);

        assert!(!service.is_running());

        let handle = service.start().unwrap();
        assert!(service.is_running());

        thread::sleep(Duration::from_millis(100));

        service.shutdown(handle);
        assert!(!service.is_running());

        let tracker = service.tracker();
        let tracker = tracker.lock().unwrap();
        assert_eq!(tracker.state(), TimerState::Stopped);
        assert!(tracker.ledger().total_on(today()) > 0.0);
        assert!(tracker.store().path_for(DatasetKind::Usage).exists());
        assert!(!tracker.store().is_dirty(DatasetKind::Timer));
    }

    #[test]
    #[allow(clippy::panic, reason = "a panicking holder poisons the tracker mutex")]
    fn test_poisoned_tracker_keeps_ticking_and_saving() {
        let mut settings = Settings::default();
        settings.ui.tick_interval_ms = 10;
        settings.data_management.autosave_interval_secs = 0.0;
        let (store, _dir) = setup_test_store(&settings.data_management);
        let probe = FakeProbe::new();
        probe.focus("Editor", 42);
        probe.set_running(&["Editor"]);

        let mut tracker = Tracker::new(probe, store, &settings, unix_now());
        tracker.select_app("Editor", unix_now()).unwrap();
        let service = TrackerService::new(tracker, &settings);

        let shared = service.tracker();
        let _ = thread::spawn(move || {
            let _guard = shared.lock().unwrap();
            panic!("poison the tracker");
        })
        .join();
        assert!(service.tracker().is_poisoned());

        let handle = service.start().unwrap();
        thread::sleep(Duration::from_millis(100));
        service.stop();
        handle.join().unwrap();

        let tracker = service.tracker();
        let tracker = safe_lock(&tracker, "tracker");
        assert!(tracker.ledger().total_on(today()) > 0.0);
        assert!(tracker.store().path_for(DatasetKind::Usage).exists());
        assert!(tracker.focus.probe().running_calls() > 0);
    }

    #[test]
    fn test_millis_to_secs() {
        assert_eq!(millis_to_secs(10_000), 10.0);
        assert_eq!(millis_to_secs(1_500), 1.5);
    }
}
