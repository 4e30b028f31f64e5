pub mod flags;
pub mod lists;
pub mod person;

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use super::headers::{CanonicalField, HeaderKey};
use super::rows::FieldMap;
use flags::{parse_flag, Flag};
use lists::split_list;
use person::{parse_availability, parse_profile, Profile};

// "NM. 신경과" -> NM
static DEPT_CODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([A-Z]+)\.\s").unwrap());

pub fn department_code(name: &str) -> Option<String> {
    DEPT_CODE_RE.captures(name).map(|c| c[1].to_string())
}

/// Typed values derived from one physician row. Raw cell text stays in the
/// `FieldMap`; nothing here replaces it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Derived {
    pub profile: Profile,
    pub availability_start: Option<NaiveDate>,
    pub availability_end: Option<NaiveDate>,
    pub specialty: Option<Vec<String>>,
    pub unreservable_conditions: Option<Vec<String>>,
    pub emergency_slots: Flag,
    pub in_depth_treatment: Flag,
    pub carbon_ion_therapy: Flag,
    pub guardian_consultation: Flag,
    pub foreign_patient_care: Flag,
}

pub fn derive(fields: &FieldMap) -> Derived {
    let get = move |f: CanonicalField| fields.get(&HeaderKey::Known(f));

    let name = get(CanonicalField::PhysicianName).unwrap_or_default();
    let (availability_start, availability_end) = parse_availability(name);

    Derived {
        profile: parse_profile(name),
        availability_start,
        availability_end,
        specialty: split_list(get(CanonicalField::Specialty)),
        unreservable_conditions: split_list(get(CanonicalField::UnreservableConditions)),
        emergency_slots: parse_flag(get(CanonicalField::EmergencySlots)),
        in_depth_treatment: parse_flag(get(CanonicalField::InDepthTreatment)),
        carbon_ion_therapy: parse_flag(get(CanonicalField::CarbonIonTherapy)),
        guardian_consultation: parse_flag(get(CanonicalField::GuardianConsultation)),
        foreign_patient_care: parse_flag(get(CanonicalField::ForeignPatientCare)),
    }
}

// ── Tests ──
