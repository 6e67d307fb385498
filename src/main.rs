use apptally_lib::clock::{format_hms, today, unix_now};
use apptally_lib::config::{Config, LoggingSettings};
use apptally_lib::constants::{APP_NAME, CONFIG_FILE};
use apptally_lib::error::AppError;
use apptally_lib::platform::{FocusProbe, NativeProbe};
use apptally_lib::store::Store;
use apptally_lib::tracker::{Tracker, TrackerService};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use log::{error, info, warn};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

#[derive(Debug, Parser)]
#[command(name = "apptally", about = "Tracks time spent per application and window")]
struct Cli {
    /// Directory holding the usage, timer and config files.
    #[arg(long)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Track focus until interrupted.
    Run {
        /// Application to time from the start.
        #[arg(long)]
        select: Option<String>,
    },
    /// Print usage for one day.
    Report {
        /// Day to report, YYYY-MM-DD. Defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// List running applications.
    Apps,
    /// Set how many days of history to keep.
    Retention { days: u32 },
}

fn default_data_dir() -> Result<PathBuf, AppError> {
    ProjectDirs::from("com", "apptally", APP_NAME)
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or(AppError::NoProjectDirs)
}

/// Log to `<data_dir>/<file>` when a file is configured, stderr otherwise. A log file
/// over the size cap is truncated first. `RUST_LOG` overrides the configured level.
fn init_logging(data_dir: &Path, settings: &LoggingSettings) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&settings.level));

    if !settings.file.is_empty() {
        let path = data_dir.join(&settings.file);
        let oversized = fs::metadata(&path).is_ok_and(|m| m.len() > settings.max_file_bytes);
        let file = if oversized {
            File::create(&path)
        } else {
            OpenOptions::new().create(true).append(true).open(&path)
        };
        match file {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => {
                builder.init();
                warn!("Could not open log file {}: {e}, logging to stderr", path.display());
                return;
            }
        }
    }
    builder.init();
}

fn run_tracker(data_dir: &Path, config: &Config, select: Option<&str>) -> Result<(), AppError> {
    let settings = &config.settings;
    let mut store = Store::new(data_dir, &settings.data_management);

    // The X11 connection or first osascript call overlaps with reading the data files.
    let preload = store.preload_in_background()?;
    let probe = NativeProbe::new();
    match preload.join() {
        Ok(preloaded) => store.install_preloaded(preloaded),
        Err(_) => warn!("Preload thread panicked, loading data on first use"),
    }

    let mut tracker = Tracker::new(probe, store, settings, unix_now());
    if let Some(app_name) = select {
        tracker.select_app(app_name, unix_now())?;
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_signal = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        shutdown_signal.store(true, Ordering::SeqCst);
    }) {
        warn!("Could not install signal handler: {e}");
    }

    let service = TrackerService::new(tracker, settings);
    let handle = service.start()?;
    info!("{APP_NAME} tracking, data in {}", data_dir.display());

    while !shutdown.load(Ordering::SeqCst) {
        thread::sleep(SHUTDOWN_POLL);
    }

    info!("Shutting down");
    service.shutdown(handle);
    Ok(())
}

fn report(data_dir: &Path, config: &Config, date: NaiveDate, top: usize) -> Result<(), AppError> {
    let mut store = Store::new(data_dir, &config.settings.data_management);
    let ledger = store.load_usage();
    let usage = ledger.usage_on(date);

    let mut out = io::stdout().lock();
    if usage.is_empty() {
        writeln!(out, "No usage recorded on {date}")?;
        return Ok(());
    }

    writeln!(out, "{date}  total {}", format_hms(ledger.total_on(date)))?;
    for app in usage.iter().take(top) {
        writeln!(out, "  {}  {}", format_hms(app.total_time), app.app_name)?;
        for (title, secs) in app.windows.iter().take(top) {
            writeln!(out, "      {}  {title}", format_hms(*secs))?;
        }
    }
    Ok(())
}

fn list_apps() -> Result<(), AppError> {
    let apps = NativeProbe::new().running_apps()?;
    let mut out = io::stdout().lock();
    for app in apps {
        writeln!(out, "{app}")?;
    }
    Ok(())
}

fn set_retention(data_dir: &Path, config: &mut Config, days: u32) -> Result<(), AppError> {
    let now = unix_now();
    let store = Store::new(data_dir, &config.settings.data_management);
    let mut tracker = Tracker::new(NativeProbe::new(), store, &config.settings, now);

    let removed = tracker.set_retention_days(days, config, now)?;
    tracker.autosave(now);
    writeln!(
        io::stdout().lock(),
        "Keeping {days} day(s) of history, removed {removed} day(s)"
    )?;
    Ok(())
}

fn run(cli: Cli) -> Result<(), AppError> {
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    fs::create_dir_all(&data_dir)?;

    let (mut config, config_err) = Config::load_or_defaults(&data_dir.join(CONFIG_FILE));
    init_logging(&data_dir, &config.settings.logging);
    if let Some(e) = config_err {
        warn!("Invalid {CONFIG_FILE}, using defaults: {e}");
    }

    match cli.command.unwrap_or(Command::Run { select: None }) {
        Command::Run { select } => run_tracker(&data_dir, &config, select.as_deref()),
        Command::Report { date, top } => report(&data_dir, &config, date.unwrap_or_else(today), top),
        Command::Apps => list_apps(),
        Command::Retention { days } => set_retention(&data_dir, &mut config, days),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            // The logger may not be up yet, or may point at a file.
            let _ = writeln!(io::stderr(), "{APP_NAME}: {e}");
            ExitCode::FAILURE
        }
    }
}
