//! Date-partitioned usage history (`app_usage.json`).
//!
//! Per app, the `windows` map is the source of truth; `total_time` is derived from it and
//! only written out so the file stays readable on its own.

mod window_key;

pub use window_key::canonical_window_key;

use crate::constants::UNTITLED_WINDOW;
use chrono::{Days, NaiveDate};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Seconds below this are noise from float accumulation.
const EPSILON_SECS: f64 = 1e-6;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct RawAppRecord {
    total_time: f64,
    windows: BTreeMap<String, f64>,
    is_active: bool,
    last_update: f64,
}

/// Usage of one application on one day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawAppRecord", into = "RawAppRecord")]
pub struct AppRecord {
    windows: BTreeMap<String, f64>,
    pub is_active: bool,
    pub last_update: f64,
}

impl AppRecord {
    pub fn total_time(&self) -> f64 {
        self.windows.values().sum()
    }

    pub fn windows(&self) -> &BTreeMap<String, f64> {
        &self.windows
    }

    /// Collapse legacy tuple keys naming `app_name` into plain titles.
    fn canonicalize_windows(&mut self, app_name: &str) {
        for (key, secs) in std::mem::take(&mut self.windows) {
            *self
                .windows
                .entry(canonical_window_key(app_name, &key))
                .or_insert(0.0) += secs;
        }
    }

    /// Add `secs` to `window`. Non-positive and non-finite amounts are ignored.
    pub fn add(&mut self, window: &str, secs: f64) {
        if !secs.is_finite() || secs <= 0.0 {
            return;
        }
        *self.windows.entry(window.to_string()).or_insert(0.0) += secs;
    }
}

impl From<RawAppRecord> for AppRecord {
    fn from(raw: RawAppRecord) -> Self {
        let mut record = AppRecord {
            windows: BTreeMap::new(),
            is_active: raw.is_active,
            last_update: if raw.last_update.is_finite() {
                raw.last_update
            } else {
                0.0
            },
        };
        for (key, secs) in raw.windows {
            record.add(&key, secs);
        }

        // Older files counted total_time on its own; keep the unattributed part.
        let unattributed = raw.total_time - record.total_time();
        if unattributed.is_finite() && unattributed > EPSILON_SECS {
            record.add(UNTITLED_WINDOW, unattributed);
        }
        record
    }
}

impl From<AppRecord> for RawAppRecord {
    fn from(record: AppRecord) -> Self {
        RawAppRecord {
            total_time: record.total_time(),
            windows: record.windows,
            is_active: record.is_active,
            last_update: record.last_update,
        }
    }
}

/// One app's day, ordered for display.
#[derive(Debug, Clone, PartialEq)]
pub struct AppUsage {
    pub app_name: String,
    pub total_time: f64,
    /// Largest first.
    pub windows: Vec<(String, f64)>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct RawLedger {
    dates: BTreeMap<String, BTreeMap<String, AppRecord>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawLedger", into = "RawLedger")]
pub struct UsageLedger {
    days: BTreeMap<NaiveDate, BTreeMap<String, AppRecord>>,
}

impl From<RawLedger> for UsageLedger {
    fn from(raw: RawLedger) -> Self {
        let mut days = BTreeMap::new();
        for (key, apps) in raw.dates {
            match NaiveDate::parse_from_str(&key, DATE_FORMAT) {
                Ok(date) => {
                    let apps = apps
                        .into_iter()
                        .map(|(app_name, mut record)| {
                            record.canonicalize_windows(&app_name);
                            (app_name, record)
                        })
                        .collect();
                    days.insert(date, apps);
                }
                Err(e) => warn!("Dropping usage for unparseable date {key:?}: {e}"),
            }
        }
        Self { days }
    }
}

impl From<UsageLedger> for RawLedger {
    fn from(ledger: UsageLedger) -> Self {
        RawLedger {
            dates: ledger
                .days
                .into_iter()
                .map(|(date, apps)| (date.format(DATE_FORMAT).to_string(), apps))
                .collect(),
        }
    }
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Credit `secs` of `app` in `window` to `date`, creating the day and app on first use.
    pub fn record(&mut self, date: NaiveDate, app_name: &str, window: &str, secs: f64, now: f64) {
        let record = self
            .days
            .entry(date)
            .or_default()
            .entry(app_name.to_string())
            .or_default();
        record.add(window, secs);
        record.last_update = now;
    }

    /// Update the active flag of an existing record. Returns whether anything changed.
    pub fn set_active(&mut self, date: NaiveDate, app_name: &str, active: bool, now: f64) -> bool {
        let Some(record) = self.days.get_mut(&date).and_then(|apps| apps.get_mut(app_name)) else {
            return false;
        };
        if record.is_active == active {
            return false;
        }
        record.is_active = active;
        record.last_update = now;
        true
    }

    pub fn day(&self, date: NaiveDate) -> Option<&BTreeMap<String, AppRecord>> {
        self.days.get(&date)
    }

    pub fn record_for(&self, date: NaiveDate, app_name: &str) -> Option<&AppRecord> {
        self.days.get(&date)?.get(app_name)
    }

    /// Apps used on `date`, largest total first.
    pub fn usage_on(&self, date: NaiveDate) -> Vec<AppUsage> {
        let Some(apps) = self.days.get(&date) else {
            return Vec::new();
        };
        let mut usage: Vec<AppUsage> = apps
            .iter()
            .map(|(app_name, record)| {
                let mut windows: Vec<(String, f64)> = record
                    .windows
                    .iter()
                    .map(|(title, secs)| (title.clone(), *secs))
                    .collect();
                windows.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                AppUsage {
                    app_name: app_name.clone(),
                    total_time: record.total_time(),
                    windows,
                }
            })
            .collect();
        usage.sort_by(|a, b| {
            b.total_time
                .total_cmp(&a.total_time)
                .then_with(|| a.app_name.cmp(&b.app_name))
        });
        usage
    }

    pub fn top_apps(&self, date: NaiveDate, limit: usize) -> Vec<(String, f64)> {
        self.usage_on(date)
            .into_iter()
            .take(limit)
            .map(|usage| (usage.app_name, usage.total_time))
            .collect()
    }

    /// Sum over all apps on `date`.
    pub fn total_on(&self, date: NaiveDate) -> f64 {
        self.days
            .get(&date)
            .map_or(0.0, |apps| apps.values().map(AppRecord::total_time).sum())
    }

    pub fn recorded_dates(&self) -> Vec<NaiveDate> {
        self.days.keys().copied().collect()
    }

    /// Remove every day before `cutoff`. Returns how many days were removed.
    pub fn prune_before(&mut self, cutoff: NaiveDate) -> usize {
        let kept = self.days.split_off(&cutoff);
        let removed = std::mem::replace(&mut self.days, kept).len();
        if removed > 0 {
            info!("Pruned {removed} day(s) of usage before {cutoff}");
        }
        removed
    }

    /// Keep `retention_days` days of history counted back from `today`.
    pub fn prune_expired(&mut self, today: NaiveDate, retention_days: u32) -> usize {
        match today.checked_sub_days(Days::new(u64::from(retention_days))) {
            Some(cutoff) => self.prune_before(cutoff),
            None => 0,
        }
    }
}
