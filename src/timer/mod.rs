//! Stopwatch for the single selected application.

use crate::clock::format_hms;
use crate::constants::UNTITLED_WINDOW;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Persisted form of the timer (`timer_data.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerSnapshot {
    pub app_name: Option<String>,
    pub start_time: Option<f64>,
    /// Time accumulated over closed running segments.
    pub total_time: f64,
    pub is_active: bool,
    /// Running time per window title of the selected app.
    pub windows: BTreeMap<String, f64>,
    pub current_window: Option<String>,
    pub last_update: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// No app selected.
    Idle,
    /// App selected, not focused.
    Stopped,
    /// App selected and focused.
    Running,
}

fn finite_non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct TimerStateMachine {
    snapshot: TimerSnapshot,
}

impl TimerStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt a persisted snapshot. A snapshot saved while running is closed at its
    /// `last_update`, so time the process was not running is never counted.
    pub fn restore(mut snapshot: TimerSnapshot, now: f64) -> Self {
        snapshot.total_time = finite_non_negative(snapshot.total_time);
        snapshot.last_update = finite_non_negative(snapshot.last_update);
        snapshot
            .windows
            .retain(|_, secs| secs.is_finite() && *secs >= 0.0);

        if snapshot.app_name.is_none() {
            return Self {
                snapshot: TimerSnapshot {
                    last_update: now,
                    ..TimerSnapshot::default()
                },
            };
        }

        if snapshot.is_active {
            if let Some(start) = snapshot.start_time.filter(|s| s.is_finite()) {
                let closed = finite_non_negative(snapshot.last_update - start);
                snapshot.total_time += closed;
                debug!("Closed running timer segment of {closed:.1}s on restore");
            }
        }
        snapshot.is_active = false;
        snapshot.start_time = None;

        Self { snapshot }
    }

    pub fn state(&self) -> TimerState {
        match (&self.snapshot.app_name, self.snapshot.is_active) {
            (None, _) => TimerState::Idle,
            (Some(_), false) => TimerState::Stopped,
            (Some(_), true) => TimerState::Running,
        }
    }

    pub fn snapshot(&self) -> &TimerSnapshot {
        &self.snapshot
    }

    pub fn app_name(&self) -> Option<&str> {
        self.snapshot.app_name.as_deref()
    }

    pub fn current_window(&self) -> Option<&str> {
        self.snapshot.current_window.as_deref()
    }

    /// Start tracking `app_name` from zero. Running at once when it already has focus.
    pub fn select(&mut self, app_name: &str, focused: bool, now: f64) {
        info!("Tracking {app_name}");
        self.snapshot = TimerSnapshot {
            app_name: Some(app_name.to_string()),
            last_update: now,
            ..TimerSnapshot::default()
        };
        if focused {
            self.start(now);
        }
    }

    /// Feed the focus state observed at `now`. Returns whether the state changed.
    pub fn tick(&mut self, focused: bool, now: f64) -> bool {
        if self.state() == TimerState::Idle {
            return false;
        }
        self.credit_window(now);

        match (self.snapshot.is_active, focused) {
            (false, true) => {
                self.start(now);
                true
            }
            (true, false) => {
                self.stop(now);
                true
            }
            _ => false,
        }
    }

    /// Record the focused window of the selected app.
    pub fn observe_window(&mut self, title: &str, now: f64) {
        if self.state() == TimerState::Idle {
            return;
        }
        self.credit_window(now);
        if self.snapshot.current_window.as_deref() != Some(title) {
            self.snapshot.current_window = Some(title.to_string());
        }
    }

    /// Accumulated time, including the running segment.
    pub fn elapsed(&self, now: f64) -> f64 {
        let running = match (self.snapshot.is_active, self.snapshot.start_time) {
            (true, Some(start)) => finite_non_negative(now - start),
            _ => 0.0,
        };
        self.snapshot.total_time + running
    }

    pub fn elapsed_formatted(&self, now: f64) -> String {
        format_hms(self.elapsed(now))
    }

    /// Back to Idle with nothing selected.
    pub fn reset(&mut self, now: f64) {
        self.snapshot = TimerSnapshot {
            last_update: now,
            ..TimerSnapshot::default()
        };
    }

    fn start(&mut self, now: f64) {
        self.snapshot.is_active = true;
        self.snapshot.start_time = Some(now);
        self.snapshot.last_update = now;
    }

    fn stop(&mut self, now: f64) {
        if let Some(start) = self.snapshot.start_time.take() {
            self.snapshot.total_time += finite_non_negative(now - start);
        }
        self.snapshot.is_active = false;
    }

    /// Absorb a wall-clock step backwards. The running segment is shifted back by the same
    /// amount, so elapsed time holds steady instead of shrinking. Returns the step size.
    pub fn absorb_clock_regression(&mut self, now: f64) -> f64 {
        let step = self.snapshot.last_update - now;
        if !now.is_finite() || step <= 0.0 {
            return 0.0;
        }
        if let Some(start) = self.snapshot.start_time.as_mut() {
            *start -= step;
        }
        self.snapshot.last_update = now;
        warn!("Clock went back {step:.1}s, shifting the running segment");
        step
    }

    /// Credit the running time since the last update to the current window.
    fn credit_window(&mut self, now: f64) {
        self.absorb_clock_regression(now);
        if self.snapshot.is_active {
            let delta = finite_non_negative(now - self.snapshot.last_update);
            if delta > 0.0 {
                let window = self
                    .snapshot
                    .current_window
                    .clone()
                    .unwrap_or_else(|| UNTITLED_WINDOW.to_string());
                *self.snapshot.windows.entry(window).or_insert(0.0) += delta;
            }
        }
        if now > self.snapshot.last_update {
            self.snapshot.last_update = now;
        }
    }
}
