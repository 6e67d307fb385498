//! In-memory datasets and their durable copies.
//!
//! `save_*` calls are cheap: they replace the cached value and mark it dirty. A file is only
//! written once the dataset's save interval has passed, or by `force_save_all`.

mod disk;

pub use disk::{LoadSource, Loaded};

use crate::clock::local_date;
use crate::config::DataManagementSettings;
use crate::constants::{TIMER_FILE, USAGE_FILE};
use crate::error::AppError;
use crate::ledger::UsageLedger;
use crate::timer::TimerSnapshot;
use crate::validation::validate_retention_days;
use disk::Disk;
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    Usage,
    Timer,
}

impl DatasetKind {
    pub fn file_name(self) -> &'static str {
        match self {
            DatasetKind::Usage => USAGE_FILE,
            DatasetKind::Timer => TIMER_FILE,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DatasetKind::Usage => "usage",
            DatasetKind::Timer => "timer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Accepted into the cache; the write waits for the save interval.
    Cached,
    /// Accepted and written.
    Flushed,
    /// Accepted, but the primary write failed. Retried after the save interval.
    WriteFailed,
    /// Over the size ceiling. Neither cached nor written.
    Rejected,
}

/// Both datasets, read off the tick thread.
#[derive(Debug, Clone)]
pub struct Preloaded {
    pub usage: Loaded<UsageLedger>,
    pub timer: Loaded<TimerSnapshot>,
}

#[derive(Debug)]
struct Dataset<T> {
    kind: DatasetKind,
    cached: Option<T>,
    /// Serialized form of `cached` not yet on disk.
    pending: Option<Vec<u8>>,
    dirty: bool,
    last_flush: f64,
    over_capacity: bool,
}

impl<T> Dataset<T>
where
    T: Serialize + DeserializeOwned + Default + Clone,
{
    fn new(kind: DatasetKind) -> Self {
        Self {
            kind,
            cached: None,
            pending: None,
            dirty: false,
            last_flush: 0.0,
            over_capacity: false,
        }
    }

    fn adopt(&mut self, loaded: Loaded<T>) {
        // Data recovered from the backup is rewritten to the primary at the next flush.
        if loaded.source == LoadSource::Backup {
            match serde_json::to_vec_pretty(&loaded.data) {
                Ok(bytes) => {
                    self.pending = Some(bytes);
                    self.dirty = true;
                }
                Err(e) => warn!("Could not re-encode recovered {} data: {e}", self.kind.label()),
            }
        }
        self.cached = Some(loaded.data);
    }

    fn load(&mut self, disk: &Disk) -> T {
        if let Some(data) = &self.cached {
            return data.clone();
        }
        let loaded = disk.read(self.kind);
        self.adopt(loaded);
        self.cached.clone().unwrap_or_default()
    }

    fn save(&mut self, data: &T, now: f64, disk: &Disk, interval_secs: f64) -> SaveOutcome {
        let bytes = match serde_json::to_vec_pretty(data) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Could not encode {} data: {e}", self.kind.label());
                return SaveOutcome::Rejected;
            }
        };

        if bytes.len() > disk.max_bytes() {
            let err = AppError::Capacity {
                dataset: self.kind.label(),
                size: bytes.len(),
                limit: disk.max_bytes(),
            };
            if self.over_capacity {
                debug!("Skipping save: {err}");
            } else {
                warn!("Skipping save: {err}");
                self.over_capacity = true;
            }
            return SaveOutcome::Rejected;
        }
        if self.over_capacity {
            info!("{} data is back under the size limit", self.kind.label());
            self.over_capacity = false;
        }

        self.cached = Some(data.clone());
        self.pending = Some(bytes);
        self.dirty = true;

        if now - self.last_flush >= interval_secs || now < self.last_flush {
            self.flush(disk, now)
        } else {
            SaveOutcome::Cached
        }
    }

    fn flush(&mut self, disk: &Disk, now: f64) -> SaveOutcome {
        let Some(bytes) = self.pending.as_deref() else {
            self.dirty = false;
            return SaveOutcome::Cached;
        };
        self.last_flush = now;

        match disk.write(self.kind, bytes) {
            Ok(()) => {
                debug!("Wrote {} bytes of {} data", bytes.len(), self.kind.label());
                self.pending = None;
                self.dirty = false;
                SaveOutcome::Flushed
            }
            Err(e) => {
                warn!(
                    "Failed to write {}: {e}",
                    disk.primary_path(self.kind).display()
                );
                if let Err(backup_err) = disk.write_backup(self.kind, bytes) {
                    error!(
                        "Failed to write {} data to {} as well, recent usage may be lost: {backup_err}",
                        self.kind.label(),
                        disk.backup_path(self.kind).display()
                    );
                }
                SaveOutcome::WriteFailed
            }
        }
    }
}

/// Owner of the usage ledger and timer snapshot on disk.
#[derive(Debug)]
pub struct Store {
    disk: Disk,
    save_interval_secs: f64,
    retention_days: u32,
    prune_interval_secs: f64,
    last_prune: Option<f64>,
    usage: Dataset<UsageLedger>,
    timer: Dataset<TimerSnapshot>,
}

impl Store {
    pub fn new(dir: &Path, settings: &DataManagementSettings) -> Self {
        Self {
            disk: Disk::new(dir, settings.max_cache_bytes),
            save_interval_secs: settings.save_interval_secs,
            retention_days: settings.retention_days,
            prune_interval_secs: settings.prune_interval_secs,
            last_prune: None,
            usage: Dataset::new(DatasetKind::Usage),
            timer: Dataset::new(DatasetKind::Timer),
        }
    }

    pub fn path_for(&self, kind: DatasetKind) -> PathBuf {
        self.disk.primary_path(kind)
    }

    pub fn is_dirty(&self, kind: DatasetKind) -> bool {
        match kind {
            DatasetKind::Usage => self.usage.dirty,
            DatasetKind::Timer => self.timer.dirty,
        }
    }

    /// The usage ledger, read from disk on first access.
    pub fn load_usage(&mut self) -> UsageLedger {
        self.usage.load(&self.disk)
    }

    /// The timer snapshot, read from disk on first access.
    pub fn load_timer(&mut self) -> TimerSnapshot {
        self.timer.load(&self.disk)
    }

    pub fn save_usage(&mut self, ledger: &UsageLedger, now: f64) -> SaveOutcome {
        self.usage
            .save(ledger, now, &self.disk, self.save_interval_secs)
    }

    pub fn save_timer(&mut self, snapshot: &TimerSnapshot, now: f64) -> SaveOutcome {
        self.timer
            .save(snapshot, now, &self.disk, self.save_interval_secs)
    }

    /// Write every dirty dataset now. Returns how many were written.
    pub fn force_save_all(&mut self, now: f64) -> usize {
        let mut written = 0;
        if self.usage.dirty && self.usage.flush(&self.disk, now) == SaveOutcome::Flushed {
            written += 1;
        }
        if self.timer.dirty && self.timer.flush(&self.disk, now) == SaveOutcome::Flushed {
            written += 1;
        }
        written
    }

    pub fn retention_days(&self) -> u32 {
        self.retention_days
    }

    pub fn set_retention_days(&mut self, days: u32) -> Result<(), AppError> {
        self.retention_days = validate_retention_days(days)?;
        info!("Keeping {days} day(s) of usage");
        Ok(())
    }

    /// Prune days past the retention window, at most once per prune interval.
    pub fn prune_expired(&mut self, ledger: &mut UsageLedger, now: f64) -> usize {
        if let Some(last) = self.last_prune {
            if (0.0..self.prune_interval_secs).contains(&(now - last)) {
                return 0;
            }
        }
        self.prune_now(ledger, now)
    }

    /// Prune days past the retention window regardless of the interval.
    pub fn prune_now(&mut self, ledger: &mut UsageLedger, now: f64) -> usize {
        self.last_prune = Some(now);
        let removed = ledger.prune_expired(local_date(now), self.retention_days);
        if removed > 0 {
            self.save_usage(ledger, now);
        }
        removed
    }

    /// Read both datasets on a worker thread. Hand the result to `install_preloaded`.
    pub fn preload_in_background(&self) -> Result<JoinHandle<Preloaded>, AppError> {
        let disk = self.disk.clone();
        let handle = thread::Builder::new()
            .name("store-preload".into())
            .spawn(move || Preloaded {
                usage: disk.read(DatasetKind::Usage),
                timer: disk.read(DatasetKind::Timer),
            })?;
        Ok(handle)
    }

    /// Adopt preloaded data for datasets that were not loaded in the meantime.
    pub fn install_preloaded(&mut self, preloaded: Preloaded) {
        if self.usage.cached.is_none() {
            self.usage.adopt(preloaded.usage);
        }
        if self.timer.cached.is_none() {
            self.timer.adopt(preloaded.timer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::setup_test_store;
    use chrono::NaiveDate;
    use std::fs;

    fn settings() -> DataManagementSettings {
        DataManagementSettings {
            save_interval_secs: 60.0,
            max_cache_bytes: 64 * 1024,
            ..DataManagementSettings::default()
        }
    }

    fn ledger_with(date: &str, secs: f64) -> UsageLedger {
        let mut ledger = UsageLedger::new();
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
        ledger.record(date, "Editor", "main.rs", secs, 1.0);
        ledger
    }

    #[test]
    fn test_missing_files_load_defaults() {
        let (mut store, _dir) = setup_test_store(&settings());
        assert!(store.load_usage().is_empty());
        assert_eq!(store.load_timer(), TimerSnapshot::default());
        assert!(!store.is_dirty(DatasetKind::Usage));
    }

    #[test]
    fn test_saves_batched_by_interval() {
        let (mut store, _dir) = setup_test_store(&settings());
        let path = store.path_for(DatasetKind::Usage);

        assert_eq!(store.save_usage(&ledger_with("2024-06-01", 1.0), 1_000.0), SaveOutcome::Flushed);
        assert!(path.exists());

        assert_eq!(store.save_usage(&ledger_with("2024-06-01", 2.0), 1_030.0), SaveOutcome::Cached);
        assert!(store.is_dirty(DatasetKind::Usage));
        let on_disk: UsageLedger = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(on_disk, ledger_with("2024-06-01", 1.0));

        assert_eq!(store.save_usage(&ledger_with("2024-06-01", 3.0), 1_061.0), SaveOutcome::Flushed);
        assert!(!store.is_dirty(DatasetKind::Usage));
    }

    #[test]
    fn test_cached_value_served_without_disk() {
        let (mut store, _dir) = setup_test_store(&settings());
        store.save_usage(&ledger_with("2024-06-01", 1.0), 1_000.0);
        store.save_usage(&ledger_with("2024-06-01", 5.0), 1_001.0);
        assert_eq!(store.load_usage(), ledger_with("2024-06-01", 5.0));
    }

    #[test]
    fn test_force_save_writes_dirty_only() {
        let (mut store, _dir) = setup_test_store(&settings());
        assert_eq!(store.force_save_all(10.0), 0);

        store.save_usage(&ledger_with("2024-06-01", 1.0), 1_000.0);
        store.save_usage(&ledger_with("2024-06-01", 2.0), 1_001.0);
        let snapshot = TimerSnapshot {
            app_name: Some("Editor".into()),
            ..TimerSnapshot::default()
        };
        store.save_timer(&snapshot, 1_000.0);
        store.save_timer(&snapshot, 1_002.0);

        assert_eq!(store.force_save_all(1_003.0), 2);
        assert_eq!(store.force_save_all(1_004.0), 0);
    }

    #[test]
    fn test_oversize_save_rejected() {
        let small = DataManagementSettings {
            max_cache_bytes: 200,
            ..settings()
        };
        let (mut store, _dir) = setup_test_store(&small);

        let mut big = UsageLedger::new();
        let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        for i in 0..20 {
            big.record(day, "Browser", &format!("tab {i}"), 1.0, 1.0);
        }

        assert_eq!(store.save_usage(&big, 1_000.0), SaveOutcome::Rejected);
        assert!(!store.is_dirty(DatasetKind::Usage));
        assert!(!store.path_for(DatasetKind::Usage).exists());
        assert!(store.load_usage().is_empty());
    }

    #[test]
    fn test_corrupt_primary_recovered_from_backup() {
        let (mut store, dir) = setup_test_store(&settings());
        let good = serde_json::to_vec(&ledger_with("2024-06-01", 9.0)).unwrap();
        fs::write(dir.path().join("app_usage.json"), b"{ truncated").unwrap();
        fs::write(dir.path().join("app_usage.json.backup"), good).unwrap();

        assert_eq!(store.load_usage(), ledger_with("2024-06-01", 9.0));
        assert!(store.is_dirty(DatasetKind::Usage));

        assert_eq!(store.force_save_all(10.0), 1);
        let repaired: UsageLedger =
            serde_json::from_slice(&fs::read(dir.path().join("app_usage.json")).unwrap()).unwrap();
        assert_eq!(repaired, ledger_with("2024-06-01", 9.0));
    }

    #[test]
    fn test_corrupt_files_fall_back_to_default() {
        let (mut store, dir) = setup_test_store(&settings());
        fs::write(dir.path().join("timer_data.json"), b"[1, 2").unwrap();
        fs::write(dir.path().join("timer_data.json.backup"), b"nope").unwrap();
        assert_eq!(store.load_timer(), TimerSnapshot::default());
    }

    #[test]
    fn test_failed_write_goes_to_backup() {
        let (mut store, dir) = setup_test_store(&settings());
        // A directory in place of the primary file makes the rename fail.
        fs::create_dir(dir.path().join("timer_data.json")).unwrap();

        let snapshot = TimerSnapshot {
            app_name: Some("Editor".into()),
            ..TimerSnapshot::default()
        };
        assert_eq!(store.save_timer(&snapshot, 1_000.0), SaveOutcome::WriteFailed);
        assert!(store.is_dirty(DatasetKind::Timer));

        let backup: TimerSnapshot =
            serde_json::from_slice(&fs::read(dir.path().join("timer_data.json.backup")).unwrap())
                .unwrap();
        assert_eq!(backup, snapshot);
    }

    #[test]
    fn test_prune_respects_interval() {
        let (mut store, _dir) = setup_test_store(&settings());
        let mut ledger = ledger_with("2000-01-01", 1.0);
        let now = 1_717_300_000.0;

        assert_eq!(store.prune_expired(&mut ledger, now), 1);
        assert!(store.path_for(DatasetKind::Usage).exists());

        let mut stale = ledger_with("2000-01-02", 1.0);
        assert_eq!(store.prune_expired(&mut stale, now + 60.0), 0);
        assert_eq!(store.prune_expired(&mut stale, now + 3_600.0), 1);
    }

    #[test]
    fn test_set_retention_days_validates() {
        let (mut store, _dir) = setup_test_store(&settings());
        assert!(store.set_retention_days(0).is_err());
        store.set_retention_days(7).unwrap();
        assert_eq!(store.retention_days(), 7);
    }

    #[test]
    fn test_preload_in_background() {
        let (mut store, dir) = setup_test_store(&settings());
        let data = serde_json::to_vec(&ledger_with("2024-06-01", 4.0)).unwrap();
        fs::write(dir.path().join("app_usage.json"), data).unwrap();

        let preloaded = store.preload_in_background().unwrap().join().unwrap();
        assert_eq!(preloaded.usage.source, LoadSource::Primary);
        assert_eq!(preloaded.timer.source, LoadSource::Default);

        store.install_preloaded(preloaded);
        assert_eq!(store.load_usage(), ledger_with("2024-06-01", 4.0));
    }
}
