//! `config.json` handling.
//!
//! The user's document is merged over the compiled-in defaults. Sections and keys this
//! version does not know about are kept in the merged document and written back on save.

use crate::constants::*;
use crate::error::AppError;
use crate::validation::{
    validate_millis, validate_nonzero, validate_probe_timeout_ms, validate_prune_interval_secs,
    validate_retention_days, validate_secs,
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub title_ttl_secs: f64,
    pub stale_after_secs: f64,
    pub sweep_every: u32,
    pub max_entries: usize,
    pub app_lifetime_secs: f64,
    pub probe_timeout_ms: u64,
    pub self_titled_apps: Vec<String>,
    pub browser_apps: Vec<String>,
    pub editor_apps: Vec<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            title_ttl_secs: DEFAULT_TITLE_TTL_SECS,
            stale_after_secs: DEFAULT_STALE_AFTER_SECS,
            sweep_every: DEFAULT_SWEEP_EVERY,
            max_entries: DEFAULT_MAX_CACHE_ENTRIES,
            app_lifetime_secs: DEFAULT_APP_LIFETIME_SECS,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            self_titled_apps: SELF_TITLED_APPS.iter().map(|s| (*s).to_string()).collect(),
            browser_apps: Vec::new(),
            editor_apps: Vec::new(),
        }
    }
}

impl CacheSettings {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms.min(MAX_PROBE_TIMEOUT_MS))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataManagementSettings {
    pub save_interval_secs: f64,
    pub autosave_interval_secs: f64,
    pub max_cache_bytes: usize,
    pub retention_days: u32,
    pub prune_interval_secs: f64,
}

impl Default for DataManagementSettings {
    fn default() -> Self {
        Self {
            save_interval_secs: DEFAULT_SAVE_INTERVAL_SECS,
            autosave_interval_secs: DEFAULT_AUTOSAVE_INTERVAL_SECS,
            max_cache_bytes: DEFAULT_MAX_CACHE_BYTES,
            retention_days: DEFAULT_RETENTION_DAYS,
            prune_interval_secs: DEFAULT_PRUNE_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    pub tick_interval_ms: u64,
    pub app_list_interval_ms: u64,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            app_list_interval_ms: DEFAULT_APP_LIST_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    /// Log file name inside the data directory; empty logs to stderr.
    pub file: String,
    pub max_file_bytes: u64,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: LOG_FILE.to_string(),
            max_file_bytes: DEFAULT_MAX_LOG_BYTES,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub cache: CacheSettings,
    pub data_management: DataManagementSettings,
    pub ui: UiSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<(), AppError> {
        let cache = &self.cache;
        validate_secs("title_ttl_secs", cache.title_ttl_secs)?;
        validate_secs("stale_after_secs", cache.stale_after_secs)?;
        validate_secs("app_lifetime_secs", cache.app_lifetime_secs)?;
        validate_nonzero("sweep_every", usize::try_from(cache.sweep_every).unwrap_or(usize::MAX))?;
        validate_nonzero("max_entries", cache.max_entries)?;
        validate_probe_timeout_ms(cache.probe_timeout_ms)?;

        let data = &self.data_management;
        validate_secs("save_interval_secs", data.save_interval_secs)?;
        validate_secs("autosave_interval_secs", data.autosave_interval_secs)?;
        validate_nonzero("max_cache_bytes", data.max_cache_bytes)?;
        validate_retention_days(data.retention_days)?;
        validate_prune_interval_secs(data.prune_interval_secs)?;

        validate_millis("tick_interval_ms", self.ui.tick_interval_ms)?;
        validate_millis("app_list_interval_ms", self.ui.app_list_interval_ms)?;
        Ok(())
    }
}

/// Loaded configuration: the typed settings plus the full merged document.
#[derive(Debug, Clone)]
pub struct Config {
    pub settings: Settings,
    document: Value,
    path: PathBuf,
    /// Settings are defaults standing in for a rejected file. `save` then only writes
    /// explicit changes into the user's document.
    fallback: bool,
}

impl Config {
    /// Defaults only, to be saved at `path`.
    pub fn defaults_at(path: &Path) -> Self {
        let settings = Settings::default();
        let document = serde_json::to_value(&settings).unwrap_or_else(|_| Value::Object(Map::new()));
        Self {
            settings,
            document,
            path: path.to_path_buf(),
            fallback: false,
        }
    }

    /// Load `path`, merged over the defaults.
    ///
    /// A missing or malformed file yields the defaults. Values of the wrong type or out of
    /// range are errors.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let document = read_document(path)?;
        let settings = typed_settings(&document)?;
        Ok(Self {
            settings,
            document,
            path: path.to_path_buf(),
            fallback: false,
        })
    }

    /// Load `path`, running on the defaults when its values are rejected. The user's
    /// document is kept so that saving never discards what they wrote.
    pub fn load_or_defaults(path: &Path) -> (Self, Option<AppError>) {
        let document = match read_document(path) {
            Ok(document) => document,
            Err(e) => {
                let mut config = Self::defaults_at(path);
                config.fallback = true;
                return (config, Some(e));
            }
        };
        match typed_settings(&document) {
            Ok(settings) => (
                Self {
                    settings,
                    document,
                    path: path.to_path_buf(),
                    fallback: false,
                },
                None,
            ),
            Err(e) => (
                Self {
                    settings: Settings::default(),
                    document,
                    path: path.to_path_buf(),
                    fallback: true,
                },
                Some(e),
            ),
        }
    }

    /// Write the merged document back, with the current typed settings folded in.
    pub fn save(&mut self) -> Result<(), AppError> {
        if !self.fallback {
            let typed = serde_json::to_value(&self.settings)?;
            merge(&mut self.document, &typed);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.document)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    pub fn set_retention_days(&mut self, days: u32) -> Result<(), AppError> {
        let days = validate_retention_days(days)?;
        self.settings.data_management.retention_days = days;
        merge(
            &mut self.document,
            &json!({ "data_management": { "retention_days": days } }),
        );
        Ok(())
    }
}

/// The user's file merged over the defaults. Unreadable JSON counts as an empty file.
fn read_document(path: &Path) -> Result<Value, AppError> {
    let mut document = serde_json::to_value(Settings::default())?;

    match fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str::<Value>(&raw) {
            Ok(user @ Value::Object(_)) => merge(&mut document, &user),
            Ok(_) => warn!("{}: top level is not an object, using defaults", path.display()),
            Err(e) => warn!("{}: malformed config ({e}), using defaults", path.display()),
        },
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("No config at {}, using defaults", path.display());
        }
        Err(e) => return Err(AppError::Io(e)),
    }
    Ok(document)
}

fn typed_settings(document: &Value) -> Result<Settings, AppError> {
    let settings: Settings = serde_json::from_value(document.clone())?;
    settings.validate()?;
    Ok(settings)
}

/// Objects merge key by key; anything else in `overlay` replaces `base`.
fn merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.settings, Settings::default());
    }

    #[test]
    fn test_malformed_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "{ not json").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.settings, Settings::default());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, r#"{"data_management": {"retention_days": 7}}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.settings.data_management.retention_days, 7);
        assert_eq!(
            config.settings.data_management.save_interval_secs,
            DEFAULT_SAVE_INTERVAL_SECS
        );
        assert_eq!(config.settings.cache, CacheSettings::default());
    }

    #[test]
    fn test_unknown_keys_survive_save() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"{"theme": {"accent": "teal"}, "ui": {"tick_interval_ms": 500, "compact": true}}"#,
        )
        .unwrap();

        let mut config = Config::load(&path).unwrap();
        assert_eq!(config.settings.ui.tick_interval_ms, 500);
        config.set_retention_days(14).unwrap();
        config.save().unwrap();

        let written: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["theme"], json!({"accent": "teal"}));
        assert_eq!(written["ui"]["compact"], json!(true));
        assert_eq!(written["ui"]["tick_interval_ms"], json!(500));
        assert_eq!(written["data_management"]["retention_days"], json!(14));
    }

    #[test]
    fn test_out_of_range_value_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, r#"{"cache": {"probe_timeout_ms": 5000}}"#).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { field: "probe_timeout_ms", .. }));
    }

    #[test]
    fn test_rejected_file_keeps_user_document_on_save() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"{"theme": {"accent": "teal"}, "cache": {"probe_timeout_ms": 5000}, "ui": {"tick_interval_ms": 500}}"#,
        )
        .unwrap();

        let (mut config, err) = Config::load_or_defaults(&path);
        assert!(matches!(err, Some(AppError::InvalidInput { field: "probe_timeout_ms", .. })));
        assert_eq!(config.settings, Settings::default());

        config.set_retention_days(7).unwrap();
        config.save().unwrap();

        let written: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["theme"], json!({"accent": "teal"}));
        assert_eq!(written["ui"]["tick_interval_ms"], json!(500));
        assert_eq!(written["cache"]["probe_timeout_ms"], json!(5000));
        assert_eq!(written["data_management"]["retention_days"], json!(7));
    }

    #[test]
    fn test_load_or_defaults_accepts_valid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, r#"{"data_management": {"retention_days": 9}}"#).unwrap();

        let (config, err) = Config::load_or_defaults(&path);
        assert!(err.is_none());
        assert_eq!(config.settings.data_management.retention_days, 9);
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, r#"{"data_management": {"retention_days": "forever"}}"#).unwrap();

        assert!(matches!(Config::load(&path), Err(AppError::Json(_))));
    }

    #[test]
    fn test_merge_replaces_arrays() {
        let mut base = json!({"cache": {"self_titled_apps": ["Finder", "Dock"]}});
        merge(&mut base, &json!({"cache": {"self_titled_apps": ["Launcher"]}}));
        assert_eq!(base["cache"]["self_titled_apps"], json!(["Launcher"]));
    }
}
