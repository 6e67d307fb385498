pub mod command;
pub mod types;

pub use types::{FocusProbe, FrontmostApp, TitleStrategy};

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "macos")]
pub use macos::MacOSProbe as NativeProbe;

#[cfg(target_os = "linux")]
pub use linux::LinuxProbe as NativeProbe;

// Platforms without a probe run with focus tracking disabled.
#[cfg(not(any(target_os = "macos", target_os = "linux")))]
pub struct NativeProbe;

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
impl FocusProbe for NativeProbe {
    fn get_frontmost(&self) -> Result<Option<FrontmostApp>, crate::error::AppError> {
        Ok(None)
    }

    fn get_window_title(
        &self,
        app: &FrontmostApp,
        _strategy: TitleStrategy,
        _timeout: std::time::Duration,
    ) -> Result<String, crate::error::AppError> {
        Ok(app.app_name.clone())
    }

    fn running_apps(
        &self,
    ) -> Result<std::collections::BTreeSet<String>, crate::error::AppError> {
        Ok(std::collections::BTreeSet::new())
    }
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
impl NativeProbe {
    pub fn new() -> Self {
        Self
    }
}
