// src/constants.rs

/// Human-readable application name, also used as the project directory name.
pub const APP_NAME: &str = "AppTally";

/// Usage ledger file inside the data directory
pub const USAGE_FILE: &str = "app_usage.json";

/// Timer snapshot file inside the data directory
pub const TIMER_FILE: &str = "timer_data.json";

/// User configuration file inside the data directory
pub const CONFIG_FILE: &str = "config.json";

/// Default log file name inside the data directory
pub const LOG_FILE: &str = "app.log";

/// Extension appended to a data file's name for its recovery sibling
pub const BACKUP_EXTENSION: &str = "backup";

/// Extension appended to a data file's name while it is being replaced
pub const TEMP_EXTENSION: &str = "tmp";

/// Window key used for time with no known window title
pub const UNTITLED_WINDOW: &str = "Untitled";

/// Longest window title kept, in characters
pub const MAX_TITLE_CHARS: usize = 256;

/// Longest accepted application name, in characters
pub const MAX_APP_NAME_CHARS: usize = 256;

// ── cache ──────────────────────────────────────────────────────────

/// How long a cached window title stays valid
pub const DEFAULT_TITLE_TTL_SECS: f64 = 10.0;

/// Cache entries older than this are dropped by the periodic sweep
pub const DEFAULT_STALE_AFTER_SECS: f64 = 300.0;

/// Number of resolutions between two sweeps
pub const DEFAULT_SWEEP_EVERY: u32 = 100;

/// Title cache entry ceiling before the oldest entry is evicted
pub const DEFAULT_MAX_CACHE_ENTRIES: usize = 256;

/// How long the running-application list stays valid
pub const DEFAULT_APP_LIFETIME_SECS: f64 = 2.0;

/// Default bound on a single window-title probe
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 1000;

/// Hard ceiling on a single window-title probe
pub const MAX_PROBE_TIMEOUT_MS: u64 = 1000;

// ── data management ────────────────────────────────────────────────

/// Minimum time between two durable writes of the same dataset
pub const DEFAULT_SAVE_INTERVAL_SECS: f64 = 60.0;

/// Autosave timer period
pub const DEFAULT_AUTOSAVE_INTERVAL_SECS: f64 = 30.0;

/// Ceiling on a dataset's serialized size (1 MiB)
pub const DEFAULT_MAX_CACHE_BYTES: usize = 1024 * 1024;

/// Days of usage history kept on disk
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Longest accepted retention period (10 years)
pub const MAX_RETENTION_DAYS: u32 = 3650;

/// Minimum time between two retention prunes
pub const DEFAULT_PRUNE_INTERVAL_SECS: f64 = 3600.0;

// ── ui ─────────────────────────────────────────────────────────────

/// Tick loop period
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// Running-application list refresh period
pub const DEFAULT_APP_LIST_INTERVAL_MS: u64 = 10_000;

// ── logging ────────────────────────────────────────────────────────

/// Default log filter
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Log file is truncated at startup once it grows past this (10 MiB)
pub const DEFAULT_MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Applications whose window title is their own name; no probe is run for them.
pub const SELF_TITLED_APPS: &[&str] = &[
    "Finder",
    "SystemUIServer",
    "loginwindow",
    "Dock",
    "Control Center",
    "Notification Center",
];

/// Applications whose title is the active tab title.
pub const BROWSER_APPS: &[&str] = &[
    "Google Chrome",
    "Brave Browser",
    "Microsoft Edge",
    "Arc",
    "Chromium",
    "Safari",
    "Firefox",
    "firefox",
];

/// Applications whose title names the open file.
pub const EDITOR_APPS: &[&str] = &[
    "Code",
    "Visual Studio Code",
    "Cursor",
    "Sublime Text",
    "Zed",
    "Xcode",
    "IntelliJ IDEA",
    "PyCharm",
];
