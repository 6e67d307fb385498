use crate::error::AppError;
use std::collections::BTreeSet;
use std::time::Duration;

/// The application that currently receives user input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrontmostApp {
    pub app_name: String,
    pub pid: u32,
}

impl FrontmostApp {
    pub fn new(app_name: &str, pid: u32) -> Self {
        Self {
            app_name: app_name.to_string(),
            pid,
        }
    }
}

/// How the window title of an application is obtained and cleaned up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TitleStrategy {
    /// System chrome with no meaningful window titles: the app name is the title, no probe.
    SelfTitled,
    /// Title of the front window.
    Default,
    /// Title of the active tab; the trailing " - <Browser>" is dropped.
    Browser,
    /// Name of the open file; unsaved markers and the trailing " - <Editor>" are dropped.
    Editor,
}

/// OS capability that reports focus. Implementations may be slow and may fail;
/// callers treat every method as fallible and latency-bearing.
pub trait FocusProbe: Send + Sync {
    fn get_frontmost(&self) -> Result<Option<FrontmostApp>, AppError>;

    /// Title of `app`'s focused window. Must give up after `timeout`.
    /// May return the app name itself when the app exposes no title.
    fn get_window_title(
        &self,
        app: &FrontmostApp,
        strategy: TitleStrategy,
        timeout: Duration,
    ) -> Result<String, AppError>;

    /// Names of running applications that show up to the user (regular activation policy).
    fn running_apps(&self) -> Result<BTreeSet<String>, AppError>;
}
