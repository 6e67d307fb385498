use crate::platform::FocusProbe;
use log::debug;
use std::collections::BTreeSet;

/// Short-lived cache of the running-application list.
#[derive(Debug, Clone, Default)]
pub struct RunningAppsCache {
    apps: BTreeSet<String>,
    refreshed_at: Option<f64>,
    lifetime_secs: f64,
}

impl RunningAppsCache {
    pub fn new(lifetime_secs: f64) -> Self {
        Self {
            apps: BTreeSet::new(),
            refreshed_at: None,
            lifetime_secs,
        }
    }

    fn is_fresh(&self, now: f64) -> bool {
        match self.refreshed_at {
            Some(at) => !self.apps.is_empty() && (0.0..self.lifetime_secs).contains(&(now - at)),
            None => false,
        }
    }

    /// Running apps as of `now`. A failed refresh keeps serving the previous list.
    pub fn get_at<P: FocusProbe>(&mut self, probe: &P, now: f64) -> &BTreeSet<String> {
        if !self.is_fresh(now) {
            match probe.running_apps() {
                Ok(apps) => {
                    if apps != self.apps {
                        debug!("Running apps changed: {} -> {}", self.apps.len(), apps.len());
                    }
                    self.apps = apps;
                    self.refreshed_at = Some(now);
                }
                Err(e) => debug!("Running-app query failed, keeping stale list: {e}"),
            }
        }
        &self.apps
    }

    pub fn invalidate(&mut self) {
        self.refreshed_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeProbe;

    #[test]
    fn test_list_reused_within_lifetime() {
        let probe = FakeProbe::new();
        probe.set_running(&["Safari", "Terminal"]);
        let mut cache = RunningAppsCache::new(2.0);

        assert_eq!(cache.get_at(&probe, 100.0).len(), 2);
        probe.set_running(&["Safari"]);
        assert_eq!(cache.get_at(&probe, 101.0).len(), 2);
        assert_eq!(probe.running_calls(), 1);

        assert_eq!(cache.get_at(&probe, 102.5).len(), 1);
        assert_eq!(probe.running_calls(), 2);
    }

    #[test]
    fn test_failed_refresh_keeps_stale_list() {
        let probe = FakeProbe::new();
        probe.set_running(&["Safari"]);
        let mut cache = RunningAppsCache::new(2.0);
        cache.get_at(&probe, 100.0);

        probe.fail_running(true);
        let apps = cache.get_at(&probe, 200.0);
        assert!(apps.contains("Safari"));
    }

    #[test]
    fn test_invalidate_forces_refresh() {
        let probe = FakeProbe::new();
        probe.set_running(&["Safari"]);
        let mut cache = RunningAppsCache::new(60.0);
        cache.get_at(&probe, 100.0);
        cache.invalidate();
        cache.get_at(&probe, 100.5);
        assert_eq!(probe.running_calls(), 2);
    }
}
