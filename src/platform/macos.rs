use super::command::run_with_timeout;
use super::{FocusProbe, FrontmostApp, TitleStrategy};
use crate::error::AppError;
use std::collections::BTreeSet;
use std::time::Duration;

/// Bound on the frontmost-app and process-list queries.
const QUERY_TIMEOUT: Duration = Duration::from_secs(1);

const FRONTMOST_SCRIPT: &str = r#"tell application "System Events"
    set p to first application process whose frontmost is true
    return (name of p) & "|" & (unix id of p)
end tell"#;

const RUNNING_APPS_SCRIPT: &str = r#"tell application "System Events"
    set AppleScript's text item delimiters to linefeed
    return (name of every application process whose background only is false) as text
end tell"#;

const CHROMIUM_BROWSERS: &[&str] = &[
    "Google Chrome",
    "Brave Browser",
    "Microsoft Edge",
    "Arc",
    "Chromium",
];

/// Focus probe backed by `osascript` and System Events.
pub struct MacOSProbe;

impl Default for MacOSProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MacOSProbe {
    pub fn new() -> Self {
        Self
    }

    fn osascript(script: &str, timeout: Duration) -> Result<String, AppError> {
        run_with_timeout("osascript", &["-e", script], timeout)
    }

    fn title_script(app: &FrontmostApp, strategy: TitleStrategy) -> String {
        let name = escape(&app.app_name);
        match strategy {
            TitleStrategy::Browser if CHROMIUM_BROWSERS.contains(&app.app_name.as_str()) => {
                format!(r#"tell application "{name}" to return title of active tab of front window"#)
            }
            TitleStrategy::Browser if app.app_name == "Safari" => {
                r#"tell application "Safari" to return name of current tab of front window"#.to_string()
            }
            TitleStrategy::Browser
            | TitleStrategy::Default
            | TitleStrategy::Editor
            | TitleStrategy::SelfTitled => format!(
                r#"tell application "System Events"
    tell (first application process whose unix id is {pid})
        try
            return name of front window
        on error
            return "{name}"
        end try
    end tell
end tell"#,
                pid = app.pid
            ),
        }
    }
}

fn escape(name: &str) -> String {
    name.replace('\\', "\\\\").replace('"', "\\\"")
}

fn parse_frontmost(out: &str) -> Option<FrontmostApp> {
    let (name, pid) = out.rsplit_once('|')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let pid = pid.trim().parse().ok()?;
    Some(FrontmostApp::new(name, pid))
}

impl FocusProbe for MacOSProbe {
    fn get_frontmost(&self) -> Result<Option<FrontmostApp>, AppError> {
        let out = Self::osascript(FRONTMOST_SCRIPT, QUERY_TIMEOUT)?;
        Ok(parse_frontmost(&out))
    }

    fn get_window_title(
        &self,
        app: &FrontmostApp,
        strategy: TitleStrategy,
        timeout: Duration,
    ) -> Result<String, AppError> {
        if strategy == TitleStrategy::SelfTitled {
            return Ok(app.app_name.clone());
        }
        Self::osascript(&Self::title_script(app, strategy), timeout)
    }

    fn running_apps(&self) -> Result<BTreeSet<String>, AppError> {
        let out = Self::osascript(RUNNING_APPS_SCRIPT, QUERY_TIMEOUT)?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect())
    }
}
