use std::collections::{BTreeMap, HashMap};

use rayon::prelude::*;
use sha2::{Digest, Sha256};
use tracing::warn;

use super::extract::{department_code, derive};
use super::headers::{CanonicalField, HeaderKey};
use super::rows::FlatRecord;
use crate::docs::{DepartmentDoc, Document, PartDoc, PhysicianDoc, PHYSICIAN_KEYS};

const PART_SECTION_LABELS: [&str; 3] = ["공통사항", "진료불가", "준비사항"];

/// Content-addressed id: the same scope key always gives the same id.
/// Each part is length-prefixed, so separators inside a name cannot make two
/// different keys collide.
pub fn doc_id(scope: &str, key: &[&str]) -> String {
    let mut basis = scope.to_lowercase();
    for part in key {
        let part = part.to_lowercase();
        basis.push_str(&format!("|{}:{}", part.len(), part));
    }
    format!("{:x}", Sha256::digest(basis.as_bytes()))
}

/// Keys in first-seen order, values merged field by field.
struct Ordered<K, V> {
    index: HashMap<K, usize>,
    entries: Vec<(K, V)>,
}

impl<K: std::hash::Hash + Eq + Clone, V: Default> Ordered<K, V> {
    fn new() -> Self {
        Ordered {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    fn entry(&mut self, key: &K) -> &mut V {
        let i = match self.index.get(key) {
            Some(&i) => i,
            None => {
                self.entries.push((key.clone(), V::default()));
                self.index.insert(key.clone(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        &mut self.entries[i].1
    }
}

fn merge(slot: &mut Option<String>, value: &Option<String>) {
    if value.is_some() {
        slot.clone_from(value);
    }
}

/// Department documents, one per department with rule text.
fn department_docs(records: &[FlatRecord]) -> Vec<Document> {
    let mut rules: Ordered<String, Option<String>> = Ordered::new();
    for r in records.iter().filter(|r| r.department.rules.is_some()) {
        merge(rules.entry(&r.department.name), &r.department.rules);
    }

    rules
        .entries
        .into_iter()
        .map(|(name, rules)| {
            Document::Department(DepartmentDoc {
                id: doc_id("department", &[&name]),
                department_code: department_code(&name),
                department_name: name,
                searchable_content: rules.clone(),
                department_rules: rules,
                ingested_at: None,
            })
        })
        .collect()
}

#[derive(Default)]
struct PartRules {
    common: Option<String>,
    unreservable: Option<String>,
    preparation: Option<String>,
}

fn part_blob(rules: &PartRules) -> Option<String> {
    let sections: Vec<String> = PART_SECTION_LABELS
        .iter()
        .zip([&rules.common, &rules.unreservable, &rules.preparation])
        .filter_map(|(label, text)| text.as_ref().map(|t| format!("*{}*\n{}", label, t)))
        .collect();
    if sections.is_empty() {
        None
    } else {
        Some(sections.join("\n"))
    }
}

/// Part documents, one per (department, part) with any rule text.
fn part_docs(records: &[FlatRecord]) -> Vec<Document> {
    let mut parts: Ordered<(String, String), PartRules> = Ordered::new();
    for r in records {
        let slot = parts.entry(&(r.department.name.clone(), r.part.name.clone()));
        merge(&mut slot.common, &r.part.common);
        merge(&mut slot.unreservable, &r.part.unreservable);
        merge(&mut slot.preparation, &r.part.preparation);
    }

    parts
        .entries
        .into_iter()
        .filter_map(|((department, part), rules)| {
            let blob = part_blob(&rules)?;
            Some(Document::Part(PartDoc {
                id: doc_id("part", &[&department, &part]),
                department_code: department_code(&department),
                department_name: department,
                part_name: part,
                common_rules: rules.common,
                unreservable_rules: rules.unreservable,
                preparation: rules.preparation,
                searchable_content: Some(blob),
                ingested_at: None,
            }))
        })
        .collect()
}

fn physician_doc(record: &FlatRecord, source_file: Option<&str>) -> Option<PhysicianDoc> {
    let raw = |f: CanonicalField| record.fields.get(&HeaderKey::Known(f)).map(str::to_string);
    let name = raw(CanonicalField::PhysicianName)?;
    let d = derive(&record.fields);

    let searchable = [
        CanonicalField::Notes,
        CanonicalField::Specialty,
        CanonicalField::FastTrackDisease,
        CanonicalField::EmergencySlots,
        CanonicalField::InDepthTreatment,
        CanonicalField::CarbonIonTherapy,
    ]
    .into_iter()
    .filter_map(|f| record.fields.get(&HeaderKey::Known(f)))
    .collect::<Vec<_>>()
    .join("\n");

    let extra: BTreeMap<String, Option<String>> = record
        .fields
        .iter()
        .filter_map(|(key, value)| match key {
            HeaderKey::Extra(k) if PHYSICIAN_KEYS.contains(&k.as_str()) => {
                Some((format!("extra_{}", k), value.clone()))
            }
            HeaderKey::Extra(k) => Some((k.clone(), value.clone())),
            HeaderKey::Known(_) => None,
        })
        .collect();

    let department = &record.department.name;
    let part = &record.part.name;
    Some(PhysicianDoc {
        id: physician_id(record)?,
        department_name: department.clone(),
        department_code: department_code(department),
        part_name: part.clone(),

        gender: d.profile.gender,
        graduation_year: d.profile.graduation_year,
        birth_year: d.profile.birth_year,
        availability_start: d.availability_start,
        availability_end: d.availability_end,
        physician_name: name,

        specialty: d.specialty,
        notes: raw(CanonicalField::Notes),
        unreservable_conditions: d.unreservable_conditions,

        emergency_slots: raw(CanonicalField::EmergencySlots),
        has_emergency_slots: d.emergency_slots.value,
        emergency_slots_notes: d.emergency_slots.notes,

        in_depth_treatment: raw(CanonicalField::InDepthTreatment),
        has_in_depth_treatment: d.in_depth_treatment.value,
        in_depth_treatment_notes: d.in_depth_treatment.notes,

        fast_track_disease: raw(CanonicalField::FastTrackDisease),

        carbon_ion_therapy: raw(CanonicalField::CarbonIonTherapy),
        has_carbon_ion_therapy: d.carbon_ion_therapy.value,
        carbon_ion_therapy_notes: d.carbon_ion_therapy.notes,

        guardian_consultation: raw(CanonicalField::GuardianConsultation),
        has_guardian_consultation: d.guardian_consultation.value,
        guardian_consultation_notes: d.guardian_consultation.notes,

        foreign_patient_care: raw(CanonicalField::ForeignPatientCare),
        has_foreign_patient_care: d.foreign_patient_care.value,
        foreign_patient_care_notes: d.foreign_patient_care.notes,

        searchable_content: if searchable.is_empty() { None } else { Some(searchable) },

        source_file: source_file.map(str::to_string),
        row_index: record.row_index,
        ingested_at: None,
        extra,
    })
}

fn physician_id(record: &FlatRecord) -> Option<String> {
    let name = record.fields.get(&HeaderKey::Known(CanonicalField::PhysicianName))?;
    Some(doc_id("physician", &[&record.department.name, &record.part.name, name]))
}

/// Rows naming the same physician in the same part fold into the first one.
fn merge_repeated(records: &[FlatRecord]) -> Vec<FlatRecord> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<FlatRecord> = Vec::new();
    for r in records {
        let Some(id) = physician_id(r) else {
            continue;
        };
        match index.get(&id) {
            Some(&i) => {
                warn!(
                    row = r.row_index,
                    first_row = merged[i].row_index,
                    part = %r.part.name,
                    "repeated physician in part, merging into the first row"
                );
                merged[i].fields.absorb(&r.fields);
            }
            None => {
                index.insert(id, merged.len());
                merged.push(r.clone());
            }
        }
    }
    merged
}

/// Physician documents in row order, one per physician and part.
fn physician_docs(records: &[FlatRecord], source_file: Option<&str>) -> Vec<Document> {
    merge_repeated(records)
        .par_iter()
        .filter_map(|r| physician_doc(r, source_file))
        .map(Document::Physician)
        .collect()
}

/// Split records into department, part and physician documents, in that order.
pub fn assemble(records: &[FlatRecord], source_file: Option<&str>) -> Vec<Document> {
    let mut docs = department_docs(records);
    docs.extend(part_docs(records));
    docs.extend(physician_docs(records, source_file));
    docs
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::rows::{Department, FieldMap, Part};

    fn record(row: usize, dept: (&str, Option<&str>), part: &str, common: Option<&str>, name: Option<&str>) -> FlatRecord {
        let headers = vec![
            HeaderKey::Known(CanonicalField::PhysicianName),
            HeaderKey::Known(CanonicalField::Specialty),
            HeaderKey::Known(CanonicalField::EmergencySlots),
        ];
        let values = vec![name.map(String::from), Some("두통, 불면".into()), Some("X".into())];
        FlatRecord {
            row_index: row,
            department: Department {
                name: dept.0.into(),
                rules: dept.1.map(String::from),
            },
            part: Part {
                name: part.into(),
                common: common.map(String::from),
                ..Part::default()
            },
            fields: FieldMap::from_pairs(&headers, &values),
        }
    }

    fn count(docs: &[Document], scope: &str) -> usize {
        docs.iter().filter(|d| d.scope() == scope).count()
    }

    #[test]
    fn ids_are_deterministic_and_scoped() {
        assert_eq!(doc_id("part", &["신경과", "수면센터"]), doc_id("part", &["신경과", "수면센터"]));
        assert_eq!(doc_id("part", &["A", "b"]), doc_id("part", &["a", "B"]));
        assert_ne!(doc_id("department", &["신경과"]), doc_id("part", &["신경과"]));
        assert_eq!(doc_id("department", &["x"]).len(), 64);
    }

    #[test]
    fn departments_need_rule_text() {
        let records = vec![
            record(1, ("신경과", None), "수면센터", None, Some("A")),
            record(2, ("정형외과", Some("규칙")), "무릎", None, Some("B")),
        ];
        let docs = assemble(&records, None);
        assert_eq!(count(&docs, "department"), 1);
        match &docs[0] {
            Document::Department(d) => {
                assert_eq!(d.department_name, "정형외과");
                assert_eq!(d.department_rules.as_deref(), Some("규칙"));
                assert_eq!(d.searchable_content.as_deref(), Some("규칙"));
            }
            other => panic!("expected department first, got {:?}", other),
        }
    }

    #[test]
    fn parts_without_rule_text_are_omitted() {
        let records = vec![
            record(1, ("신경과", None), "수면센터", Some("검사 필수"), Some("A")),
            record(2, ("신경과", None), "두통클리닉", None, Some("B")),
        ];
        let docs = assemble(&records, None);
        assert_eq!(count(&docs, "part"), 1);
        let part = docs.iter().find_map(|d| match d {
            Document::Part(p) => Some(p),
            _ => None,
        });
        let part = part.unwrap();
        assert_eq!(part.part_name, "수면센터");
        assert_eq!(part.searchable_content.as_deref(), Some("*공통사항*\n검사 필수"));
    }

    #[test]
    fn part_blob_labels_each_present_section() {
        let rules = PartRules {
            common: Some("c".into()),
            unreservable: None,
            preparation: Some("p".into()),
        };
        assert_eq!(part_blob(&rules).as_deref(), Some("*공통사항*\nc\n*준비사항*\np"));
        assert_eq!(part_blob(&PartRules::default()), None);
    }

    #[test]
    fn physician_docs_carry_derived_fields() {
        let records = vec![record(7, ("NM. 신경과", None), "수면센터", None, Some("A (남,96졸)"))];
        let docs = assemble(&records, Some("roster.xlsx"));
        let Document::Physician(p) = &docs[0] else {
            panic!("expected a physician document");
        };
        assert_eq!(p.department_code.as_deref(), Some("NM"));
        assert_eq!(p.graduation_year, Some(1996));
        assert_eq!(p.specialty, Some(vec!["두통".to_string(), "불면".into()]));
        assert_eq!(p.emergency_slots.as_deref(), Some("X"));
        assert_eq!(p.has_emergency_slots, Some(false));
        assert_eq!(p.searchable_content.as_deref(), Some("두통, 불면\nX"));
        assert_eq!(p.source_file.as_deref(), Some("roster.xlsx"));
        assert_eq!(p.row_index, 7);
    }

    #[test]
    fn nameless_rows_are_not_physicians() {
        let records = vec![record(1, ("신경과", None), "수면센터", None, None)];
        assert_eq!(count(&assemble(&records, None), "physician"), 0);
    }

    #[test]
    fn separators_inside_names_do_not_collide() {
        assert_ne!(doc_id("part", &["a|b", "c"]), doc_id("part", &["a", "b|c"]));
        assert_ne!(doc_id("part", &["1:a", "b"]), doc_id("part", &["1", "a|1:b"]));
    }

    #[test]
    fn repeated_rows_add_their_differing_values() {
        let first = record(1, ("신경과", None), "수면센터", None, Some("A"));
        let mut second = record(2, ("신경과", None), "수면센터", None, Some("A"));
        let headers = vec![
            HeaderKey::Known(CanonicalField::PhysicianName),
            HeaderKey::Known(CanonicalField::Specialty),
            HeaderKey::Known(CanonicalField::Notes),
        ];
        let values = vec![Some("A".into()), Some("어지럼".into()), Some("화요일만".into())];
        second.fields = FieldMap::from_pairs(&headers, &values);

        let docs = assemble(&[first, second], None);
        assert_eq!(count(&docs, "physician"), 1);
        let Document::Physician(p) = &docs[0] else {
            panic!("expected a physician document");
        };
        assert_eq!(p.row_index, 1);
        assert_eq!(
            p.specialty,
            Some(vec!["두통".to_string(), "불면".into(), "어지럼".into()])
        );
        assert_eq!(p.notes.as_deref(), Some("화요일만"));
        assert_eq!(p.has_emergency_slots, Some(false));
    }

    #[test]
    fn duplicate_physicians_keep_the_first_row() {
        let records = vec![
            record(1, ("신경과", None), "수면센터", None, Some("A")),
            record(2, ("신경과", None), "수면센터", None, Some("A")),
        ];
        let docs = assemble(&records, None);
        assert_eq!(count(&docs, "physician"), 1);
        assert!(matches!(&docs[0], Document::Physician(p) if p.row_index == 1));
    }

    #[test]
    fn extra_columns_do_not_shadow_fixed_keys() {
        let headers = vec![
            HeaderKey::Known(CanonicalField::PhysicianName),
            HeaderKey::Extra("gender".into()),
            HeaderKey::Extra("room".into()),
        ];
        let values = vec![Some("A".into()), Some("M".into()), None];
        let mut r = record(1, ("신경과", None), "수면센터", None, Some("A"));
        r.fields = FieldMap::from_pairs(&headers, &values);
        let docs = assemble(&[r], None);
        let v = serde_json::to_value(&docs[0]).unwrap();
        assert_eq!(v["extra_gender"], "M");
        assert!(v["gender"].is_null());
        assert!(v.as_object().unwrap().contains_key("room"));
    }

    #[test]
    fn assembling_twice_is_identical() {
        let records = vec![
            record(1, ("신경과", Some("규칙")), "수면센터", Some("c"), Some("A (남,96졸)")),
            record(2, ("신경과", Some("규칙")), "수면센터", Some("c"), Some("B (여,91생)")),
        ];
        assert_eq!(assemble(&records, None), assemble(&records, None));
    }
}
