use super::{FocusProbe, FrontmostApp, TitleStrategy};
use crate::error::AppError;
use log::warn;
use std::collections::BTreeSet;
use std::time::Duration;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{AtomEnum, ConnectionExt, Window};
use x11rb::rust_connection::RustConnection;

/// Longest property read, in 32-bit units.
const MAX_PROPERTY_LEN: u32 = 4096;

/// Focus probe backed by EWMH properties on the X11 root window.
pub struct LinuxProbe {
    conn: Option<RustConnection>,
    root: Window,
}

impl Default for LinuxProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl LinuxProbe {
    pub fn new() -> Self {
        match x11rb::connect(None) {
            Ok((conn, screen_num)) => {
                let root = conn.setup().roots.get(screen_num).map(|screen| screen.root);
                match root {
                    Some(root) => Self {
                        conn: Some(conn),
                        root,
                    },
                    None => {
                        warn!("Invalid X11 screen number {screen_num}. Focus tracking disabled.");
                        Self { conn: None, root: 0 }
                    }
                }
            }
            Err(e) => {
                // Wayland-only and headless sessions still run; every probe reports nothing.
                warn!("Failed to connect to X server: {e}. Focus tracking disabled.");
                Self { conn: None, root: 0 }
            }
        }
    }

    fn conn(&self) -> Result<&RustConnection, AppError> {
        self.conn
            .as_ref()
            .ok_or_else(|| AppError::Probe("no X11 connection".into()))
    }

    fn get_atom(&self, name: &str) -> Result<u32, AppError> {
        let conn = self.conn()?;
        let reply = conn
            .intern_atom(false, name.as_bytes())
            .map_err(x11_error)?
            .reply()
            .map_err(x11_error)?;
        Ok(reply.atom)
    }

    fn get_string_property(&self, window: Window, atom: u32) -> Result<Option<String>, AppError> {
        let reply = self
            .conn()?
            .get_property(false, window, atom, AtomEnum::ANY, 0, MAX_PROPERTY_LEN)
            .map_err(x11_error)?
            .reply()
            .map_err(x11_error)?;

        if reply.value.is_empty() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&reply.value).into_owned()))
    }

    fn get_u32_property(
        &self,
        window: Window,
        atom: u32,
        kind: AtomEnum,
        len: u32,
    ) -> Result<Vec<u32>, AppError> {
        let reply = self
            .conn()?
            .get_property(false, window, atom, kind, 0, len)
            .map_err(x11_error)?
            .reply()
            .map_err(x11_error)?;

        Ok(reply.value32().map(Iterator::collect).unwrap_or_default())
    }

    fn active_window(&self) -> Result<Option<Window>, AppError> {
        let atom = self.get_atom("_NET_ACTIVE_WINDOW")?;
        let ids = self.get_u32_property(self.root, atom, AtomEnum::WINDOW, 1)?;
        Ok(ids.into_iter().next().filter(|id| *id != 0))
    }

    /// WM_CLASS holds "instance\0class\0"; the class is the stable application name.
    fn app_name(&self, window: Window) -> Result<Option<String>, AppError> {
        let raw = self.get_string_property(window, AtomEnum::WM_CLASS.into())?;
        Ok(raw.and_then(|class| parse_wm_class(&class)))
    }

    fn window_pid(&self, window: Window) -> Result<u32, AppError> {
        let atom = self.get_atom("_NET_WM_PID")?;
        let pids = self.get_u32_property(window, atom, AtomEnum::CARDINAL, 1)?;
        Ok(pids.into_iter().next().unwrap_or(0))
    }

    fn window_title(&self, window: Window) -> Result<Option<String>, AppError> {
        let net_name = self.get_atom("_NET_WM_NAME")?;
        if let Some(title) = self.get_string_property(window, net_name)? {
            return Ok(Some(title));
        }
        self.get_string_property(window, AtomEnum::WM_NAME.into())
    }
}

fn x11_error(e: impl std::fmt::Display) -> AppError {
    AppError::Probe(format!("X11: {e}"))
}

fn parse_wm_class(raw: &str) -> Option<String> {
    let mut parts = raw.split('\0').filter(|part| !part.is_empty());
    let instance = parts.next();
    parts.next().or(instance).map(str::to_string)
}

impl FocusProbe for LinuxProbe {
    fn get_frontmost(&self) -> Result<Option<FrontmostApp>, AppError> {
        let Some(window) = self.active_window()? else {
            return Ok(None);
        };
        let Some(app_name) = self.app_name(window)? else {
            return Ok(None);
        };
        let pid = self.window_pid(window)?;
        Ok(Some(FrontmostApp { app_name, pid }))
    }

    // X11 property reads answer in microseconds; the bound only matters for script-based probes.
    fn get_window_title(
        &self,
        app: &FrontmostApp,
        strategy: TitleStrategy,
        _timeout: Duration,
    ) -> Result<String, AppError> {
        if strategy == TitleStrategy::SelfTitled {
            return Ok(app.app_name.clone());
        }
        let title = match self.active_window()? {
            Some(window) => self.window_title(window)?,
            None => None,
        };
        Ok(title.unwrap_or_else(|| app.app_name.clone()))
    }

    fn running_apps(&self) -> Result<BTreeSet<String>, AppError> {
        let atom = self.get_atom("_NET_CLIENT_LIST")?;
        let windows = self.get_u32_property(self.root, atom, AtomEnum::WINDOW, MAX_PROPERTY_LEN)?;

        let mut apps = BTreeSet::new();
        for window in windows {
            if let Some(name) = self.app_name(window)? {
                apps.insert(name);
            }
        }
        Ok(apps)
    }
}
