use std::sync::LazyLock;

use regex::Regex;

static LIST_SEP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[,\n;·•]+").unwrap());

/// Split on commas, newlines, semicolons, middle dots and bullets.
/// An input with no non-blank piece yields `None`, never an empty list.
pub fn split_list(text: Option<&str>) -> Option<Vec<String>> {
    let items: Vec<String> = LIST_SEP_RE
        .split(text?)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}
