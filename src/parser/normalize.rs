use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static HSPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\u{00A0}]+").unwrap());
static BLANK_LINES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// One cell value as handed over by a row source.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

/// A sheet row. Columns past the end read as `Cell::Empty`.
pub type Row = Vec<Cell>;

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Int(n) => write!(f, "{}", n),
            // 96.0 -> "96"; spreadsheets hand back whole numbers as floats
            Cell::Float(x) if x.fract() == 0.0 && x.abs() < 1e15 => write!(f, "{}", *x as i64),
            Cell::Float(x) => write!(f, "{}", x),
            Cell::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }
}

/// Column `idx` of `row`, `Cell::Empty` when the row is shorter.
pub fn cell(row: &[Cell], idx: usize) -> &Cell {
    const EMPTY: &Cell = &Cell::Empty;
    row.get(idx).unwrap_or(EMPTY)
}

/// Canonical text of a cell, `None` when it is absent or blank.
pub fn normalize(value: &Cell) -> Option<String> {
    match value {
        Cell::Empty => None,
        Cell::Text(s) => normalize_str(s),
        other => normalize_str(&other.to_string()),
    }
}

pub fn normalize_str(raw: &str) -> Option<String> {
    let s = HSPACE_RE.replace_all(raw, " ");
    let s = s.replace("\r\n", "\n").replace('\r', "\n");
    let s = BLANK_LINES_RE.replace_all(&s, "\n\n");
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Shorthand for `normalize(cell(row, idx))`.
pub fn column(row: &[Cell], idx: usize) -> Option<String> {
    normalize(cell(row, idx))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_horizontal_whitespace() {
        assert_eq!(normalize_str("a  \t b\u{00A0}\u{00A0}c").as_deref(), Some("a b c"));
    }

    #[test]
    fn unifies_line_endings() {
        assert_eq!(normalize_str("a\r\nb\rc").as_deref(), Some("a\nb\nc"));
    }

    #[test]
    fn caps_blank_lines_at_two_newlines() {
        assert_eq!(normalize_str("a\n\n\n\n\nb").as_deref(), Some("a\n\nb"));
        assert_eq!(normalize_str("a\r\n\r\n\r\nb").as_deref(), Some("a\n\nb"));
    }

    #[test]
    fn trims_and_blanks_become_absent() {
        assert_eq!(normalize_str("  hi \n").as_deref(), Some("hi"));
        assert_eq!(normalize_str(" \u{00A0}\t\n\r\n"), None);
        assert_eq!(normalize(&Cell::Empty), None);
        assert_eq!(normalize(&Cell::Text(String::new())), None);
    }

    #[test]
    fn numbers_render_without_float_noise() {
        assert_eq!(normalize(&Cell::Float(96.0)).as_deref(), Some("96"));
        assert_eq!(normalize(&Cell::Float(2.5)).as_deref(), Some("2.5"));
        assert_eq!(normalize(&Cell::Int(0)).as_deref(), Some("0"));
    }

    #[test]
    fn out_of_range_column_is_empty() {
        let row: Row = vec![Cell::from("x")];
        assert_eq!(cell(&row, 5), &Cell::Empty);
        assert_eq!(column(&row, 0).as_deref(), Some("x"));
        assert_eq!(column(&row, 1), None);
    }
}
