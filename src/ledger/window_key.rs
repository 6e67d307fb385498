use crate::constants::UNTITLED_WINDOW;

/// Canonical string form of a window key recorded under `app_name`.
///
/// Older files keyed windows by a tuple repr such as `('Google Chrome', 'Docs')`; those
/// collapse to the title. Only pairs naming the owning app are rewritten, so a real title
/// that merely looks like a tuple survives a save and load unchanged.
pub fn canonical_window_key(app_name: &str, raw: &str) -> String {
    let Some(inner) = raw
        .trim()
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    else {
        return raw.to_string();
    };

    match parse_quoted_list(inner).as_deref() {
        Some([app, title]) if app == app_name => {
            let title = title.trim();
            if title.is_empty() {
                UNTITLED_WINDOW.to_string()
            } else {
                title.to_string()
            }
        }
        _ => raw.to_string(),
    }
}

/// Parse `'a', "b",` into its strings. `None` when anything else is in the way.
fn parse_quoted_list(inner: &str) -> Option<Vec<String>> {
    let mut items = Vec::new();
    let mut chars = inner.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let Some(quote) = chars.next() else {
            break;
        };
        if quote != '\'' && quote != '"' {
            return None;
        }

        let mut item = String::new();
        loop {
            match chars.next()? {
                '\\' => item.push(chars.next()?),
                c if c == quote => break,
                c => item.push(c),
            }
        }
        items.push(item);

        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        match chars.next() {
            Some(',') => {}
            None => break,
            Some(_) => return None,
        }
    }

    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}
