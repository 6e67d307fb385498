//! The tick pipeline and the surface the UI layer drives.
//!
//! One tick runs resolve, timer tick, aggregate, persist in that order. `Tracker` is not
//! re-entrant; `TrackerService` owns it behind a mutex and never overlaps ticks.

mod service;

pub use service::TrackerService;

use crate::aggregator::{FoldOutcome, UsageAggregator};
use crate::config::{Config, Settings};
use crate::error::AppError;
use crate::focus_cache::{Focus, FocusCache};
use crate::ledger::{AppUsage, UsageLedger};
use crate::platform::FocusProbe;
use crate::store::Store;
use crate::timer::{TimerState, TimerStateMachine};
use crate::validation::validate_app_name;
use chrono::NaiveDate;
use log::{debug, info};
use std::collections::BTreeSet;

/// What one tick observed and did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub focus: Focus,
    pub transitioned: bool,
    pub fold: FoldOutcome,
}

pub struct Tracker<P: FocusProbe> {
    focus: FocusCache<P>,
    timer: TimerStateMachine,
    aggregator: UsageAggregator,
    ledger: UsageLedger,
    store: Store,
}

impl<P: FocusProbe> Tracker<P> {
    /// Restore the ledger and timer from `store`. A restored timer total is already in the
    /// ledger, so the aggregator starts from it.
    pub fn new(probe: P, mut store: Store, settings: &Settings, now: f64) -> Self {
        let ledger = store.load_usage();
        let timer = TimerStateMachine::restore(store.load_timer(), now);

        let mut aggregator = UsageAggregator::new();
        if let Some(app_name) = timer.app_name() {
            info!("Resuming {app_name} at {}", timer.elapsed_formatted(now));
            aggregator.prime(app_name, timer.elapsed(now));
        }

        Self {
            focus: FocusCache::new(probe, &settings.cache),
            timer,
            aggregator,
            ledger,
            store,
        }
    }

    pub fn tick(&mut self, now: f64) -> TickReport {
        self.timer.absorb_clock_regression(now);
        let focus = self.focus.resolve_at(now);

        // With the frontmost app unknown the timer keeps its state until the next tick.
        let focused = match (self.timer.app_name(), focus.app_name.as_deref()) {
            (Some(selected), Some(frontmost)) => Some(selected == frontmost),
            _ => None,
        };
        let transitioned = focused.is_some_and(|focused| self.timer.tick(focused, now));

        let fold = self.fold(now);

        if focused == Some(true) {
            if let Some(title) = &focus.window_title {
                self.timer.observe_window(title, now);
            }
        }
        self.store.save_timer(self.timer.snapshot(), now);
        self.store.prune_expired(&mut self.ledger, now);

        TickReport {
            focus,
            transitioned,
            fold,
        }
    }

    fn fold(&mut self, now: f64) -> FoldOutcome {
        // A timer total that shrank with the clock would read as a reset and count twice.
        self.timer.absorb_clock_regression(now);
        let outcome = self.aggregator.fold(&mut self.ledger, &self.timer, now);
        if outcome.changed {
            self.store.save_usage(&self.ledger, now);
        }
        outcome
    }

    /// Track `app_name` from zero. Time of the previously tracked app is folded first.
    pub fn select_app(&mut self, app_name: &str, now: f64) -> Result<(), AppError> {
        let app_name = validate_app_name(app_name)?;
        self.fold(now);

        let focus = self.focus.resolve_at(now);
        let focused = focus.app_name.as_deref() == Some(app_name);
        self.aggregator.prime(app_name, 0.0);
        self.timer.select(app_name, focused, now);
        if focused {
            if let Some(title) = &focus.window_title {
                self.timer.observe_window(title, now);
            }
        }
        self.store.save_timer(self.timer.snapshot(), now);
        Ok(())
    }

    pub fn reset(&mut self, now: f64) {
        self.fold(now);
        self.timer.reset(now);
        self.store.save_timer(self.timer.snapshot(), now);
        info!("Timer reset");
    }

    pub fn elapsed_formatted(&self, now: f64) -> String {
        self.timer.elapsed_formatted(now)
    }

    pub fn state(&self) -> TimerState {
        self.timer.state()
    }

    pub fn timer(&self) -> &TimerStateMachine {
        &self.timer
    }

    pub fn ledger(&self) -> &UsageLedger {
        &self.ledger
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn running_apps(&mut self, now: f64) -> BTreeSet<String> {
        self.focus.running_apps_at(now).clone()
    }

    /// Re-query the running-application list, ignoring the cache lifetime.
    pub fn refresh_running_apps(&mut self, now: f64) -> usize {
        self.focus.invalidate_running_apps();
        let count = self.focus.running_apps_at(now).len();
        debug!("{count} running app(s)");
        count
    }

    pub fn usage_on(&self, date: NaiveDate) -> Vec<AppUsage> {
        self.ledger.usage_on(date)
    }

    pub fn top_apps(&self, date: NaiveDate, limit: usize) -> Vec<(String, f64)> {
        self.ledger.top_apps(date, limit)
    }

    pub fn recorded_dates(&self) -> Vec<NaiveDate> {
        self.ledger.recorded_dates()
    }

    /// Change the retention period, persist it in the config and prune right away.
    pub fn set_retention_days(
        &mut self,
        days: u32,
        config: &mut Config,
        now: f64,
    ) -> Result<usize, AppError> {
        config.set_retention_days(days)?;
        config.save()?;
        self.store.set_retention_days(days)?;
        Ok(self.store.prune_now(&mut self.ledger, now))
    }

    /// Fold and write whatever is dirty. Returns how many files were written.
    pub fn autosave(&mut self, now: f64) -> usize {
        self.fold(now);
        self.store.save_timer(self.timer.snapshot(), now);
        self.store.force_save_all(now)
    }

    /// Stop the timer at `now` and write everything. The tracker is not ticked afterwards.
    pub fn shutdown(&mut self, now: f64) -> usize {
        self.timer.tick(false, now);
        let written = self.autosave(now);
        info!("Saved {written} file(s) on shutdown");
        written
    }
}
