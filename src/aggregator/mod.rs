//! Folds the timer's running total into the usage ledger.
//!
//! The timer total is cumulative and can be reset, while the ledger only takes increments.
//! Each app's last folded total is remembered and only the difference is credited, so
//! folding from several call sites against the same timer state never double-counts.

use crate::clock::{local_date, local_midnight};
use crate::constants::UNTITLED_WINDOW;
use crate::ledger::UsageLedger;
use crate::timer::{TimerState, TimerStateMachine};
use chrono::NaiveDate;
use log::{debug, info};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FoldOutcome {
    /// Seconds credited to the ledger by this fold.
    pub credited: f64,
    /// Part of `credited` that went to the day before a midnight crossing.
    pub carried_to_previous_day: f64,
    /// Whether the ledger was modified at all, including active flags.
    pub changed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UsageAggregator {
    previous_totals: HashMap<String, f64>,
    current_date: Option<NaiveDate>,
}

impl UsageAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the snapshot for `app_name`, typically with a restored timer total that is
    /// already in the ledger.
    pub fn prime(&mut self, app_name: &str, baseline_total: f64) {
        self.previous_totals
            .insert(app_name.to_string(), baseline_total.max(0.0));
    }

    pub fn previous_total(&self, app_name: &str) -> f64 {
        self.previous_totals.get(app_name).copied().unwrap_or(0.0)
    }

    /// Increment since the last fold for `app_name`. A total below the snapshot means the
    /// timer was reset, and the whole new total counts.
    pub fn delta_for(&mut self, app_name: &str, baseline_total: f64) -> f64 {
        let baseline = if baseline_total.is_finite() {
            baseline_total.max(0.0)
        } else {
            0.0
        };
        let mut previous = self.previous_total(app_name);
        if baseline < previous {
            debug!("Timer for {app_name} went back from {previous:.1}s to {baseline:.1}s, restarting");
            previous = 0.0;
        }
        self.previous_totals.insert(app_name.to_string(), baseline);
        baseline - previous
    }

    /// Credit the timer's progress since the last fold to the ledger.
    ///
    /// When the local date changed since the previous fold, the part of the increment after
    /// midnight goes to the new day and the rest to the day before.
    pub fn fold(
        &mut self,
        ledger: &mut UsageLedger,
        timer: &TimerStateMachine,
        now: f64,
    ) -> FoldOutcome {
        let today = local_date(now);
        let previous_date = self.current_date.replace(today).unwrap_or(today);
        if previous_date != today {
            info!("Date rolled over from {previous_date} to {today}");
        }

        let Some(app_name) = timer.app_name() else {
            return FoldOutcome::default();
        };
        let running = timer.state() == TimerState::Running;
        let window = timer.current_window().unwrap_or(UNTITLED_WINDOW);

        let delta = self.delta_for(app_name, timer.elapsed(now));
        let mut outcome = FoldOutcome::default();

        if delta > 0.0 {
            let (before, after) = if previous_date < today {
                let since_midnight = (now - local_midnight(today)).max(0.0);
                let after = delta.min(since_midnight);
                (delta - after, after)
            } else {
                (0.0, delta)
            };

            if before > 0.0 {
                ledger.record(previous_date, app_name, window, before, now);
                ledger.set_active(previous_date, app_name, false, now);
            }
            if after > 0.0 {
                ledger.record(today, app_name, window, after, now);
            }
            outcome.credited = delta;
            outcome.carried_to_previous_day = before;
            outcome.changed = true;
        }

        if ledger.set_active(today, app_name, running, now) {
            outcome.changed = true;
        }
        outcome
    }
}
