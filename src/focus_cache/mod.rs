//! Focus resolution with a short-lived window-title cache.
//!
//! The frontmost app is queried on every resolution; window titles are only re-probed
//! once the cached title for that `(app, pid)` pair is older than the TTL.

mod running;
mod titles;

pub use running::RunningAppsCache;
pub use titles::{normalize_title, TitleRegistry};

use crate::config::CacheSettings;
use crate::platform::{FocusProbe, FrontmostApp, TitleStrategy};
use log::{debug, warn};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

/// Result of one focus resolution. Both fields are `None` when the frontmost app is unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Focus {
    pub app_name: Option<String>,
    pub window_title: Option<String>,
}

impl Focus {
    fn unknown() -> Self {
        Self::default()
    }

    fn titled(app_name: &str, title: String) -> Self {
        Self {
            app_name: Some(app_name.to_string()),
            window_title: Some(title),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedTitle {
    title: String,
    captured_at: f64,
}

pub struct FocusCache<P: FocusProbe> {
    probe: P,
    registry: TitleRegistry,
    titles: HashMap<FrontmostApp, CachedTitle>,
    running: RunningAppsCache,
    ttl_secs: f64,
    stale_after_secs: f64,
    sweep_every: u32,
    max_entries: usize,
    probe_timeout: Duration,
    resolutions: u32,
    own_pid: u32,
}

impl<P: FocusProbe> FocusCache<P> {
    pub fn new(probe: P, settings: &CacheSettings) -> Self {
        Self {
            probe,
            registry: TitleRegistry::new(settings),
            titles: HashMap::new(),
            running: RunningAppsCache::new(settings.app_lifetime_secs),
            ttl_secs: settings.title_ttl_secs,
            stale_after_secs: settings.stale_after_secs,
            sweep_every: settings.sweep_every.max(1),
            max_entries: settings.max_entries.max(1),
            probe_timeout: settings.probe_timeout(),
            resolutions: 0,
            own_pid: std::process::id(),
        }
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    /// Resolve the focused app and window title as of `now`. Never fails: probe errors
    /// degrade to an unknown app, or to a known app with an unknown title.
    pub fn resolve_at(&mut self, now: f64) -> Focus {
        self.resolutions = self.resolutions.saturating_add(1);
        if self.resolutions >= self.sweep_every {
            self.resolutions = 0;
            self.sweep(now);
        }

        let app = match self.probe.get_frontmost() {
            Ok(Some(app)) => app,
            Ok(None) => return Focus::unknown(),
            Err(e) if e.is_probe_failure() => {
                debug!("Frontmost-app probe failed: {e}");
                return Focus::unknown();
            }
            Err(e) => {
                warn!("Frontmost-app lookup failed: {e}");
                return Focus::unknown();
            }
        };

        // Our own window and system chrome are titled by app name without a probe.
        let strategy = self.registry.strategy_for(&app.app_name);
        if app.pid == self.own_pid || strategy == TitleStrategy::SelfTitled {
            return Focus::titled(&app.app_name, app.app_name.clone());
        }

        if let Some(cached) = self.titles.get(&app) {
            // An entry captured after `now` predates a clock step back and is not trusted.
            if (0.0..self.ttl_secs).contains(&(now - cached.captured_at)) {
                return Focus::titled(&app.app_name, cached.title.clone());
            }
        }

        match self
            .probe
            .get_window_title(&app, strategy, self.probe_timeout)
        {
            Ok(raw) => {
                let title = normalize_title(&app.app_name, &raw, strategy);
                let focus = Focus::titled(&app.app_name, title.clone());
                self.insert(app, title, now);
                focus
            }
            Err(e) => {
                debug!("Title probe for {} failed: {e}", app.app_name);
                Focus {
                    app_name: Some(app.app_name),
                    window_title: None,
                }
            }
        }
    }

    fn insert(&mut self, app: FrontmostApp, title: String, now: f64) {
        if !self.titles.contains_key(&app) && self.titles.len() >= self.max_entries {
            self.evict_oldest();
        }
        self.titles.insert(
            app,
            CachedTitle {
                title,
                captured_at: now,
            },
        );
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .titles
            .iter()
            .min_by(|a, b| a.1.captured_at.total_cmp(&b.1.captured_at))
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            self.titles.remove(&key);
        }
    }

    /// Drop entries older than the staleness threshold. Returns how many were removed.
    pub fn sweep(&mut self, now: f64) -> usize {
        let before = self.titles.len();
        let stale_after = self.stale_after_secs;
        self.titles
            .retain(|_, cached| now - cached.captured_at <= stale_after);
        let removed = before - self.titles.len();
        if removed > 0 {
            debug!("Swept {removed} stale title entries");
        }
        removed
    }

    pub fn running_apps_at(&mut self, now: f64) -> &BTreeSet<String> {
        self.running.get_at(&self.probe, now)
    }

    pub fn invalidate_running_apps(&mut self) {
        self.running.invalidate();
    }
}
