use crate::config::CacheSettings;
use crate::constants::{BROWSER_APPS, EDITOR_APPS, MAX_TITLE_CHARS};
use crate::platform::TitleStrategy;
use std::collections::HashMap;

/// Dashes apps put between the document part of a title and their own name.
const SUFFIX_SEPARATORS: [char; 3] = ['-', '—', '–'];

/// Product names that show up as title suffixes under a different process name.
const KNOWN_SUFFIXES: &[&str] = &[
    "Google Chrome",
    "Mozilla Firefox",
    "Brave",
    "Microsoft Edge",
    "Chromium",
    "Visual Studio Code",
    "Cursor",
    "Sublime Text",
];

/// Maps application names to the way their window titles are read.
#[derive(Debug, Clone, Default)]
pub struct TitleRegistry {
    strategies: HashMap<String, TitleStrategy>,
}

impl TitleRegistry {
    /// Built-in browsers and editors, extended and overridden by the cache settings.
    pub fn new(settings: &CacheSettings) -> Self {
        let mut registry = Self::default();
        for app in BROWSER_APPS {
            registry.register(app, TitleStrategy::Browser);
        }
        for app in EDITOR_APPS {
            registry.register(app, TitleStrategy::Editor);
        }
        for app in &settings.browser_apps {
            registry.register(app, TitleStrategy::Browser);
        }
        for app in &settings.editor_apps {
            registry.register(app, TitleStrategy::Editor);
        }
        for app in &settings.self_titled_apps {
            registry.register(app, TitleStrategy::SelfTitled);
        }
        registry
    }

    pub fn register(&mut self, app_name: &str, strategy: TitleStrategy) {
        self.strategies.insert(app_name.to_string(), strategy);
    }

    pub fn strategy_for(&self, app_name: &str) -> TitleStrategy {
        self.strategies
            .get(app_name)
            .copied()
            .unwrap_or(TitleStrategy::Default)
    }
}

/// Clean up a raw probe title. Falls back to the app name when nothing is left.
pub fn normalize_title(app_name: &str, raw: &str, strategy: TitleStrategy) -> String {
    let mut title = raw.trim();

    match strategy {
        TitleStrategy::SelfTitled => title = app_name,
        TitleStrategy::Browser => title = strip_app_suffix(title, app_name),
        TitleStrategy::Editor => {
            title = strip_app_suffix(title, app_name);
            title = strip_unsaved_marker(title);
        }
        TitleStrategy::Default => {}
    }

    if title.is_empty() {
        title = app_name;
    }
    truncate_chars(title, MAX_TITLE_CHARS)
}

fn strip_app_suffix<'a>(title: &'a str, app_name: &str) -> &'a str {
    let names = std::iter::once(app_name).chain(KNOWN_SUFFIXES.iter().copied());
    for name in names {
        let Some(rest) = title.strip_suffix(name) else {
            continue;
        };
        let Some(rest) = rest.trim_end().strip_suffix(SUFFIX_SEPARATORS) else {
            continue;
        };
        // "Re-Mozilla Firefox" is a title, not a suffix.
        if rest.is_empty() || rest.ends_with(char::is_whitespace) {
            return rest.trim_end();
        }
    }
    title
}

fn strip_unsaved_marker(title: &str) -> &str {
    let title = title
        .strip_prefix("● ")
        .or_else(|| title.strip_prefix("* "))
        .unwrap_or(title);
    title
        .strip_suffix(" •")
        .or_else(|| title.strip_suffix(" *"))
        .unwrap_or(title)
        .trim()
}

fn truncate_chars(title: &str, max: usize) -> String {
    match title.char_indices().nth(max) {
        Some((end, _)) => title.get(..end).unwrap_or(title).to_string(),
        None => title.to_string(),
    }
}
