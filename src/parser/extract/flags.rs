use std::sync::LazyLock;

use regex::Regex;

use crate::parser::normalize::normalize_str;

static DECORATION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\[\]()*]").unwrap());

const TRUE_WORDS: &[&str] = &[
    "o", "○", "0", "true", "t", "yes", "y", "가능", "가능함", "가능합니다", "가능합니다.", "가능요",
    "available",
];
const FALSE_WORDS: &[&str] = &[
    "x", "×", "false", "f", "no", "n", "불가", "불가능", "절대불가", "금지", "아니오", "unavailable",
    "impossible",
];

/// A capability flag read from free text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Flag {
    /// `None` when the text is not a recognizable yes/no mark.
    pub value: Option<bool>,
    pub notes: Option<String>,
}

/// Read a yes/no mark from the first line of `text`.
///
/// A recognized mark keeps the full text as notes only when there is more
/// than that first line. Anything unrecognized is left undecided with the
/// full text as notes.
pub fn parse_flag(text: Option<&str>) -> Flag {
    let Some(raw) = text.and_then(normalize_str) else {
        return Flag::default();
    };
    let first = raw.split('\n').next().unwrap_or_default().trim();
    let key = DECORATION_RE.replace_all(first, "").trim().to_lowercase();

    let value = if TRUE_WORDS.contains(&key.as_str()) {
        Some(true)
    } else if FALSE_WORDS.contains(&key.as_str()) {
        Some(false)
    } else {
        None
    };

    let notes = match value {
        Some(_) if raw == first => None,
        _ => Some(raw.clone()),
    };
    Flag { value, notes }
}
