use std::collections::HashSet;

use tracing::debug;

use super::normalize::{normalize, Cell};

/// Physician-table columns with a known meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalField {
    PhysicianName,
    Specialty,
    Notes,
    UnreservableConditions,
    EmergencySlots,
    InDepthTreatment,
    FastTrackDisease,
    CarbonIonTherapy,
    GuardianConsultation,
    ForeignPatientCare,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 10] = [
        CanonicalField::PhysicianName,
        CanonicalField::Specialty,
        CanonicalField::Notes,
        CanonicalField::UnreservableConditions,
        CanonicalField::EmergencySlots,
        CanonicalField::InDepthTreatment,
        CanonicalField::FastTrackDisease,
        CanonicalField::CarbonIonTherapy,
        CanonicalField::GuardianConsultation,
        CanonicalField::ForeignPatientCare,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalField::PhysicianName => "physician_name",
            CanonicalField::Specialty => "specialty",
            CanonicalField::Notes => "notes",
            CanonicalField::UnreservableConditions => "unreservable_conditions",
            CanonicalField::EmergencySlots => "emergency_slots",
            CanonicalField::InDepthTreatment => "in_depth_treatment",
            CanonicalField::FastTrackDisease => "fast_track_disease",
            CanonicalField::CarbonIonTherapy => "carbon_ion_therapy",
            CanonicalField::GuardianConsultation => "guardian_consultation",
            CanonicalField::ForeignPatientCare => "foreign_patient_care",
        }
    }
}

/// Workbook header labels, as they appear after normalization.
const HEADER_LABELS: &[(&str, CanonicalField)] = &[
    ("주치의", CanonicalField::PhysicianName),
    ("전문진료", CanonicalField::Specialty),
    ("특이사항 (회색글씨는 구버전 확인필요)", CanonicalField::Notes),
    ("특이사항", CanonicalField::Notes),
    ("예약불가", CanonicalField::UnreservableConditions),
    ("진협응급T/O", CanonicalField::EmergencySlots),
    ("심층진료", CanonicalField::InDepthTreatment),
    ("신속질환", CanonicalField::FastTrackDisease),
    ("중입자치료", CanonicalField::CarbonIonTherapy),
    ("보호자대진", CanonicalField::GuardianConsultation),
    ("외국인진료", CanonicalField::ForeignPatientCare),
];

/// Key a physician-table column is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HeaderKey {
    Known(CanonicalField),
    /// Unrecognized label, sanitized to `[A-Za-z0-9_]`.
    Extra(String),
}

pub fn map_header(raw: &Cell) -> HeaderKey {
    let label = normalize(raw).unwrap_or_default();
    if let Some((_, field)) = HEADER_LABELS.iter().find(|(l, _)| *l == label) {
        return HeaderKey::Known(*field);
    }
    // a label that already spells a canonical identifier maps onto it
    if let Some(field) = CanonicalField::ALL.iter().find(|f| f.as_str() == label) {
        return HeaderKey::Known(*field);
    }
    HeaderKey::Extra(sanitize(&label))
}

/// Map the header cells of a physician-header row; absent cells are skipped
/// so data values line up with the remaining labels left to right.
///
/// Unknown labels that sanitize to the same key get a `_2`, `_3`, ... suffix
/// in column order.
pub fn map_headers(cells: &[Cell]) -> Vec<HeaderKey> {
    let last = cells.iter().rposition(|c| normalize(c).is_some());
    let mut used: HashSet<String> = HashSet::new();
    let mut keys = Vec::new();

    for (i, c) in cells.iter().enumerate() {
        if normalize(c).is_none() {
            if last.is_some_and(|last| i < last) {
                debug!(column = i + 1, "blank header cell, later columns shift left");
            }
            continue;
        }
        let key = match map_header(c) {
            HeaderKey::Extra(base) => {
                let mut key = base.clone();
                let mut n = 1;
                while used.contains(&key) {
                    n += 1;
                    key = format!("{}_{}", base, n);
                }
                HeaderKey::Extra(key)
            }
            known => known,
        };
        if let HeaderKey::Extra(k) = &key {
            used.insert(k.clone());
        }
        keys.push(key);
    }
    keys
}

fn sanitize(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

// ── Tests ──
