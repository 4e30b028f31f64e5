use std::collections::BTreeMap;

use tracing::debug;

use super::headers::{map_headers, HeaderKey};
use super::normalize::{column, normalize, Cell};
use crate::config::{PartPolicy, Settings};

/// Column 0 phrase marking the department-wide rule row.
const DEPARTMENT_COMMON_MARKER: &str = "진료과 공통사항";
/// Column 1 markers inside a part, checked in this order.
const PART_COMMON_MARKER: &str = "공통사항";
const PART_UNRESERVABLE_MARKER: &str = "진료불가";
const PART_PREPARATION_MARKER: &str = "준비사항";
const PHYSICIAN_HEADER_MARKER: &str = "주치의";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Department {
    pub name: String,
    pub rules: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Part {
    pub name: String,
    pub common: Option<String>,
    pub unreservable: Option<String>,
    pub preparation: Option<String>,
}

/// Where the scan is in the department → part → physician-table hierarchy.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ScanState {
    #[default]
    NoDepartment,
    InDepartment(Department),
    InPart(Department, Part),
    InPhysicianTable {
        department: Department,
        part: Part,
        headers: Vec<HeaderKey>,
    },
}

/// What a single row says, independent of where the scan currently is.
#[derive(Debug, Clone, PartialEq)]
pub enum RowKind {
    DepartmentStart(String),
    DepartmentRules(Option<String>),
    PartStart(String),
    PartCommon(Option<String>),
    PartUnreservable(Option<String>),
    PartPreparation(Option<String>),
    PhysicianHeader(Vec<HeaderKey>),
    /// Column 1 holds non-marker text: a physician row if a table is open.
    PhysicianValues(Vec<Option<String>>),
    /// Column 1 is blank: closes an open physician table.
    BlankNameCell,
}

/// Column values of one physician row, keyed by header.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldMap {
    values: BTreeMap<HeaderKey, Option<String>>,
}

impl FieldMap {
    pub fn from_pairs(headers: &[HeaderKey], values: &[Option<String>]) -> Self {
        let mut map = FieldMap::default();
        for (i, key) in headers.iter().enumerate() {
            let value = values.get(i).cloned().flatten();
            // repeated labels: the rightmost column wins
            map.values.insert(key.clone(), value);
        }
        map
    }

    pub fn get(&self, key: &HeaderKey) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderKey, &Option<String>)> {
        self.values.iter()
    }

    /// Fold a later row for the same physician into this one. A value this
    /// map lacks is taken over; a different value is appended on a new line.
    pub fn absorb(&mut self, later: &FieldMap) {
        for (key, value) in &later.values {
            let Some(value) = value else {
                continue;
            };
            match self.values.get_mut(key) {
                Some(Some(existing)) => {
                    if !existing.split('\n').any(|line| line == value.as_str()) {
                        existing.push('\n');
                        existing.push_str(value);
                    }
                }
                _ => {
                    self.values.insert(key.clone(), Some(value.clone()));
                }
            }
        }
    }
}

/// One physician row plus the department/part context it was found in.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatRecord {
    pub row_index: usize,
    pub department: Department,
    pub part: Part,
    pub fields: FieldMap,
}

/// Classify one row by content alone.
///
/// A permissive part row also carries whatever its column 1 says, so it can
/// yield two kinds; everything else yields at most one.
pub fn classify(row: &[Cell], settings: &Settings) -> Vec<RowKind> {
    let c0 = column(row, 0);

    if let Some(name) = c0.as_deref() {
        if name.ends_with(settings.department_suffix.as_str()) {
            return vec![RowKind::DepartmentStart(name.to_string())];
        }
        if name.contains(DEPARTMENT_COMMON_MARKER) {
            return vec![RowKind::DepartmentRules(column(row, 2))];
        }
        match settings.part_policy {
            PartPolicy::Permissive => {
                let mut kinds = vec![RowKind::PartStart(name.to_string())];
                kinds.extend(classify_name_column(row));
                return kinds;
            }
            PartPolicy::Keyword if is_part_like(name, &settings.part_keywords) => {
                return vec![RowKind::PartStart(name.to_string())];
            }
            PartPolicy::Keyword => {}
        }
    }

    classify_name_column(row).into_iter().collect()
}

fn classify_name_column(row: &[Cell]) -> Option<RowKind> {
    let Some(c1) = column(row, 1) else {
        return Some(RowKind::BlankNameCell);
    };
    let kind = if c1.contains(PART_COMMON_MARKER) {
        RowKind::PartCommon(column(row, 2))
    } else if c1.contains(PART_UNRESERVABLE_MARKER) {
        RowKind::PartUnreservable(column(row, 2))
    } else if c1.contains(PART_PREPARATION_MARKER) {
        RowKind::PartPreparation(column(row, 2))
    } else if c1.contains(PHYSICIAN_HEADER_MARKER) {
        RowKind::PhysicianHeader(map_headers(row.get(1..).unwrap_or_default()))
    } else {
        RowKind::PhysicianValues(row.iter().skip(1).map(normalize).collect())
    };
    Some(kind)
}

fn is_part_like(name: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| !k.is_empty() && name.contains(k.as_str()))
}

impl ScanState {
    /// Apply one classified row. Rows that do not fit the current state are
    /// discarded and leave it untouched.
    pub fn transition(self, kind: RowKind, row_index: usize) -> (ScanState, Option<FlatRecord>) {
        use RowKind as K;
        use ScanState as S;

        match (self, kind) {
            (_, K::DepartmentStart(name)) => {
                debug!(row = row_index, department = %name, "department");
                (S::InDepartment(Department { name, rules: None }), None)
            }

            (S::NoDepartment, kind) => {
                debug!(row = row_index, ?kind, "discarded: no department yet");
                (S::NoDepartment, None)
            }

            (S::InDepartment(mut d), K::DepartmentRules(text)) => {
                d.rules = text;
                (S::InDepartment(d), None)
            }
            (S::InPart(mut d, p), K::DepartmentRules(text)) => {
                d.rules = text;
                (S::InPart(d, p), None)
            }
            (S::InPhysicianTable { mut department, part, headers }, K::DepartmentRules(text)) => {
                department.rules = text;
                (S::InPhysicianTable { department, part, headers }, None)
            }

            (state, K::PartStart(name)) => {
                debug!(row = row_index, part = %name, "part");
                let part = Part { name, ..Part::default() };
                (S::InPart(state.into_department(), part), None)
            }

            (S::InDepartment(d), kind) => {
                debug!(row = row_index, ?kind, "discarded: no part yet");
                (S::InDepartment(d), None)
            }

            (state @ (S::InPart(..) | S::InPhysicianTable { .. }), kind) => {
                let (department, mut part, headers) = state.into_part_context();
                match kind {
                    K::PartCommon(text) => {
                        part.common = text;
                        (S::InPart(department, part), None)
                    }
                    K::PartUnreservable(text) => {
                        part.unreservable = text;
                        (S::InPart(department, part), None)
                    }
                    K::PartPreparation(text) => {
                        part.preparation = text;
                        (S::InPart(department, part), None)
                    }
                    K::PhysicianHeader(headers) => {
                        debug!(row = row_index, columns = headers.len(), "physician table");
                        (S::InPhysicianTable { department, part, headers }, None)
                    }
                    K::PhysicianValues(values) => match headers {
                        Some(headers) => {
                            let record = FlatRecord {
                                row_index,
                                department: department.clone(),
                                part: part.clone(),
                                fields: FieldMap::from_pairs(&headers, &values),
                            };
                            (S::InPhysicianTable { department, part, headers }, Some(record))
                        }
                        None => {
                            debug!(row = row_index, "discarded: text outside a physician table");
                            (S::InPart(department, part), None)
                        }
                    },
                    K::BlankNameCell => {
                        if headers.is_some() {
                            debug!(row = row_index, "physician table closed");
                        }
                        (S::InPart(department, part), None)
                    }
                    // handled by the outer arms
                    K::DepartmentStart(_) | K::DepartmentRules(_) | K::PartStart(_) => {
                        unreachable!("department and part starts are matched earlier")
                    }
                }
            }
        }
    }

    fn into_department(self) -> Department {
        match self {
            ScanState::NoDepartment => Department::default(),
            ScanState::InDepartment(d) | ScanState::InPart(d, _) => d,
            ScanState::InPhysicianTable { department, .. } => department,
        }
    }

    fn into_part_context(self) -> (Department, Part, Option<Vec<HeaderKey>>) {
        match self {
            ScanState::InPart(d, p) => (d, p, None),
            ScanState::InPhysicianTable { department, part, headers } => {
                (department, part, Some(headers))
            }
            ScanState::NoDepartment | ScanState::InDepartment(_) => {
                unreachable!("only called on part states")
            }
        }
    }
}

/// Counters collected while scanning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanStats {
    pub rows: usize,
    pub discarded: usize,
    pub departments: usize,
    pub parts: usize,
    pub records: usize,
}

/// Scan accumulator: the current state plus everything emitted so far.
#[derive(Debug, Default)]
pub struct Scan {
    pub state: ScanState,
    pub records: Vec<FlatRecord>,
    pub stats: ScanStats,
}

impl Scan {
    /// Fold one row into the scan.
    pub fn step(mut self, row_index: usize, row: &[Cell], settings: &Settings) -> Self {
        self.stats.rows += 1;
        let mut placed = false;
        for kind in classify(row, settings) {
            let state = std::mem::take(&mut self.state);
            if !is_discarded(&kind, &state) {
                placed = true;
                match &kind {
                    RowKind::DepartmentStart(_) => self.stats.departments += 1,
                    RowKind::PartStart(_) => self.stats.parts += 1,
                    _ => {}
                }
            }
            let (next, record) = state.transition(kind, row_index);
            if let Some(record) = record {
                self.stats.records += 1;
                self.records.push(record);
            }
            self.state = next;
        }
        if !placed {
            self.stats.discarded += 1;
        }
        self
    }
}

/// True when `kind` has no effect in `state`.
fn is_discarded(kind: &RowKind, state: &ScanState) -> bool {
    match (kind, state) {
        (RowKind::DepartmentStart(_), _) => false,
        (_, ScanState::NoDepartment) => true,
        (RowKind::DepartmentRules(_) | RowKind::PartStart(_), _) => false,
        (_, ScanState::InDepartment(_)) => true,
        (RowKind::PhysicianValues(_) | RowKind::BlankNameCell, ScanState::InPart(..)) => true,
        _ => false,
    }
}

/// Scan every row once, in order.
pub fn scan_rows(rows: &[Vec<Cell>], settings: &Settings) -> Scan {
    rows.iter()
        .enumerate()
        .fold(Scan::default(), |scan, (i, row)| scan.step(i, row, settings))
}

// ── Tests ──
