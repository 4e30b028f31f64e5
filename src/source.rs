use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Range, Reader};
use thiserror::Error;
use tracing::info;

use crate::parser::normalize::{Cell, Row};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("unsupported input type: {0}")]
    Unsupported(PathBuf),
    #[error("cannot open workbook {path}: {source}")]
    Workbook {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },
    #[error("sheet {sheet:?} not found in {path} (have: {available})")]
    MissingSheet {
        path: PathBuf,
        sheet: String,
        available: String,
    },
    #[error("workbook {0} has no sheets")]
    NoSheets(PathBuf),
    #[error("cannot read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Read every row of `path`. Workbooks are read from `sheet`, or their first
/// sheet; `.csv` files are read as-is.
pub fn load_rows(path: &Path, sheet: Option<&str>) -> Result<Vec<Row>, SourceError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => load_workbook(path, sheet),
        "csv" => load_csv(path),
        _ => Err(SourceError::Unsupported(path.to_path_buf())),
    }
}

fn load_workbook(path: &Path, sheet: Option<&str>) -> Result<Vec<Row>, SourceError> {
    let workbook_err = |source| SourceError::Workbook {
        path: path.to_path_buf(),
        source,
    };
    let mut workbook = open_workbook_auto(path).map_err(workbook_err)?;
    let names = workbook.sheet_names().to_owned();

    let name = match sheet {
        Some(wanted) => names
            .iter()
            .find(|n| n.as_str() == wanted)
            .cloned()
            .ok_or_else(|| SourceError::MissingSheet {
                path: path.to_path_buf(),
                sheet: wanted.to_string(),
                available: names.join(", "),
            })?,
        None => names
            .first()
            .cloned()
            .ok_or_else(|| SourceError::NoSheets(path.to_path_buf()))?,
    };

    let range = workbook.worksheet_range(&name).map_err(workbook_err)?;
    let rows = range_rows(&range);
    info!(sheet = %name, rows = rows.len(), "read workbook");
    Ok(rows)
}

/// Rows of `range` re-anchored at A1, so column 0 is always sheet column A
/// and row indices are sheet rows.
fn range_rows(range: &Range<Data>) -> Vec<Row> {
    let Some((top, left)) = range.start() else {
        return Vec::new();
    };
    let mut rows: Vec<Row> = vec![Vec::new(); top as usize];
    for cells in range.rows() {
        let mut row: Row = vec![Cell::Empty; left as usize];
        row.extend(cells.iter().map(to_cell));
        rows.push(row);
    }
    rows
}

fn to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Int(n) => Cell::Int(*n),
        Data::Float(x) => Cell::Float(*x),
        Data::Bool(b) => Cell::Bool(*b),
        other => Cell::Text(other.to_string()),
    }
}

fn load_csv(path: &Path) -> Result<Vec<Row>, SourceError> {
    let csv_err = |source| SourceError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        rows.push(record.iter().map(Cell::from).collect());
    }
    info!(rows = rows.len(), "read csv");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn csv_rows_keep_positions() {
        let mut f = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(f, "신경과,,").unwrap();
        writeln!(f, ",주치의,전문진료").unwrap();
        writeln!(f, ",\"A (남,96졸)\",\"두통,\n불면\"").unwrap();
        writeln!(f, "").unwrap();

        let rows = load_rows(f.path(), None).unwrap();
        assert_eq!(rows[0][0], Cell::Text("신경과".into()));
        assert_eq!(rows[0][1], Cell::Empty);
        assert_eq!(rows[1][1], Cell::Text("주치의".into()));
        assert_eq!(rows[2][1], Cell::Text("A (남,96졸)".into()));
        assert_eq!(rows[2][2], Cell::Text("두통,\n불면".into()));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = load_rows(Path::new("roster.pdf"), None).unwrap_err();
        assert!(matches!(err, SourceError::Unsupported(_)));
    }

    #[test]
    fn unreadable_workbook_is_fatal() {
        let mut f = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        f.write_all(b"not a zip archive").unwrap();
        let err = load_rows(f.path(), None).unwrap_err();
        assert!(matches!(err, SourceError::Workbook { .. }));
    }

    #[test]
    fn missing_csv_is_fatal() {
        let err = load_rows(Path::new("/nonexistent/roster.csv"), None).unwrap_err();
        assert!(matches!(err, SourceError::Csv { .. }));
    }

    #[test]
    fn ranges_are_anchored_at_a1() {
        let mut range: Range<Data> = Range::new((2, 1), (3, 2));
        range.set_value((2, 1), Data::String("신경과".into()));
        range.set_value((3, 2), Data::Float(96.0));
        let rows = range_rows(&range);
        assert_eq!(rows.len(), 4);
        assert!(rows[0].is_empty());
        assert_eq!(rows[2][0], Cell::Empty);
        assert_eq!(rows[2][1], Cell::Text("신경과".into()));
        assert_eq!(rows[3][2], Cell::Float(96.0));
    }
}
