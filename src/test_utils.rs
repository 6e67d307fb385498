//! Shared test utilities for AppTally.
//!
//! This module provides a scriptable focus probe and store setup used across test modules.

#![cfg(test)]

use crate::config::DataManagementSettings;
use crate::error::AppError;
use crate::platform::{FocusProbe, FrontmostApp, TitleStrategy};
use crate::store::Store;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

#[derive(Default)]
struct FakeState {
    frontmost: Option<FrontmostApp>,
    titles: HashMap<String, String>,
    running: BTreeSet<String>,
    fail_frontmost: bool,
    fail_titles: bool,
    fail_running: bool,
}

/// Focus probe whose answers are set by the test. Every method takes `&self` so the
/// probe can be steered after it has been moved into a cache.
#[derive(Default)]
pub struct FakeProbe {
    state: Mutex<FakeState>,
    title_calls: AtomicUsize,
    running_calls: AtomicUsize,
}

impl FakeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state(&self, f: impl FnOnce(&mut FakeState)) {
        let mut state = self.state.lock().expect("fake probe state poisoned");
        f(&mut state);
    }

    pub fn focus(&self, app_name: &str, pid: u32) {
        self.with_state(|s| s.frontmost = Some(FrontmostApp::new(app_name, pid)));
    }

    pub fn clear_focus(&self) {
        self.with_state(|s| s.frontmost = None);
    }

    pub fn set_title(&self, app_name: &str, title: &str) {
        self.with_state(|s| {
            s.titles.insert(app_name.to_string(), title.to_string());
        });
    }

    pub fn set_running(&self, apps: &[&str]) {
        self.with_state(|s| s.running = apps.iter().map(|a| (*a).to_string()).collect());
    }

    pub fn fail_frontmost(&self, fail: bool) {
        self.with_state(|s| s.fail_frontmost = fail);
    }

    pub fn fail_titles(&self, fail: bool) {
        self.with_state(|s| s.fail_titles = fail);
    }

    pub fn fail_running(&self, fail: bool) {
        self.with_state(|s| s.fail_running = fail);
    }

    pub fn title_calls(&self) -> usize {
        self.title_calls.load(Ordering::SeqCst)
    }

    pub fn running_calls(&self) -> usize {
        self.running_calls.load(Ordering::SeqCst)
    }
}

impl FocusProbe for FakeProbe {
    fn get_frontmost(&self) -> Result<Option<FrontmostApp>, AppError> {
        let state = self.state.lock().map_err(|_| AppError::LockPoisoned)?;
        if state.fail_frontmost {
            return Err(AppError::Probe("scripted frontmost failure".into()));
        }
        Ok(state.frontmost.clone())
    }

    fn get_window_title(
        &self,
        app: &FrontmostApp,
        _strategy: TitleStrategy,
        timeout: Duration,
    ) -> Result<String, AppError> {
        self.title_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().map_err(|_| AppError::LockPoisoned)?;
        if state.fail_titles {
            return Err(AppError::ProbeTimeout {
                timeout_ms: timeout.as_millis(),
            });
        }
        Ok(state
            .titles
            .get(&app.app_name)
            .cloned()
            .unwrap_or_else(|| app.app_name.clone()))
    }

    fn running_apps(&self) -> Result<BTreeSet<String>, AppError> {
        self.running_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().map_err(|_| AppError::LockPoisoned)?;
        if state.fail_running {
            return Err(AppError::Probe("scripted process-list failure".into()));
        }
        Ok(state.running.clone())
    }
}

/// Create a store rooted in a fresh temporary directory.
///
/// Returns a tuple of (Store, TempDir). The TempDir must be kept alive
/// for the duration of the test to prevent the data files from being deleted.
pub fn setup_test_store(settings: &DataManagementSettings) -> (Store, TempDir) {
    let dir = tempdir().expect("Failed to create temp directory for test store");
    let store = Store::new(dir.path(), settings);
    (store, dir)
}
