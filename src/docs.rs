use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::parser::extract::person::Gender;

/// One indexable document. `scope` is written as the tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Document {
    Department(DepartmentDoc),
    Part(PartDoc),
    Physician(PhysicianDoc),
}

impl Document {
    pub fn scope(&self) -> &'static str {
        match self {
            Document::Department(_) => "department",
            Document::Part(_) => "part",
            Document::Physician(_) => "physician",
        }
    }

    pub fn set_ingested_at(&mut self, at: DateTime<Utc>) {
        let slot = match self {
            Document::Department(d) => &mut d.ingested_at,
            Document::Part(d) => &mut d.ingested_at,
            Document::Physician(d) => &mut d.ingested_at,
        };
        *slot = Some(at);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentDoc {
    pub id: String,
    pub department_name: String,
    pub department_code: Option<String>,
    pub department_rules: Option<String>,
    pub searchable_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingested_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartDoc {
    pub id: String,
    pub department_name: String,
    pub department_code: Option<String>,
    pub part_name: String,
    pub common_rules: Option<String>,
    pub unreservable_rules: Option<String>,
    pub preparation: Option<String>,
    pub searchable_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingested_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhysicianDoc {
    pub id: String,
    pub department_name: String,
    pub department_code: Option<String>,
    pub part_name: String,

    pub physician_name: String,
    pub gender: Option<Gender>,
    pub graduation_year: Option<i32>,
    pub birth_year: Option<i32>,
    pub availability_start: Option<NaiveDate>,
    pub availability_end: Option<NaiveDate>,

    pub specialty: Option<Vec<String>>,
    pub notes: Option<String>,
    pub unreservable_conditions: Option<Vec<String>>,

    pub emergency_slots: Option<String>,
    pub has_emergency_slots: Option<bool>,
    pub emergency_slots_notes: Option<String>,

    pub in_depth_treatment: Option<String>,
    pub has_in_depth_treatment: Option<bool>,
    pub in_depth_treatment_notes: Option<String>,

    pub fast_track_disease: Option<String>,

    pub carbon_ion_therapy: Option<String>,
    pub has_carbon_ion_therapy: Option<bool>,
    pub carbon_ion_therapy_notes: Option<String>,

    pub guardian_consultation: Option<String>,
    pub has_guardian_consultation: Option<bool>,
    pub guardian_consultation_notes: Option<String>,

    pub foreign_patient_care: Option<String>,
    pub has_foreign_patient_care: Option<bool>,
    pub foreign_patient_care_notes: Option<String>,

    pub searchable_content: Option<String>,

    pub source_file: Option<String>,
    pub row_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingested_at: Option<DateTime<Utc>>,

    /// Columns under headers with no canonical meaning.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Option<String>>,
}

/// Every top-level key a physician document already uses.
pub const PHYSICIAN_KEYS: &[&str] = &[
    "id",
    "scope",
    "department_name",
    "department_code",
    "part_name",
    "physician_name",
    "gender",
    "graduation_year",
    "birth_year",
    "availability_start",
    "availability_end",
    "specialty",
    "notes",
    "unreservable_conditions",
    "emergency_slots",
    "has_emergency_slots",
    "emergency_slots_notes",
    "in_depth_treatment",
    "has_in_depth_treatment",
    "in_depth_treatment_notes",
    "fast_track_disease",
    "carbon_ion_therapy",
    "has_carbon_ion_therapy",
    "carbon_ion_therapy_notes",
    "guardian_consultation",
    "has_guardian_consultation",
    "guardian_consultation_notes",
    "foreign_patient_care",
    "has_foreign_patient_care",
    "foreign_patient_care_notes",
    "searchable_content",
    "source_file",
    "row_index",
    "ingested_at",
];

/// Write all documents as one pretty-printed JSON array.
pub fn write_json(path: &Path, docs: &[Document]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut w = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut w, docs)?;
    w.write_all(b"\n")?;
    w.flush()?;
    Ok(())
}

/// Write one document per line.
pub fn write_jsonl<W: Write>(mut w: W, docs: &[Document], mut on_doc: impl FnMut()) -> Result<()> {
    for doc in docs {
        serde_json::to_writer(&mut w, doc)?;
        w.write_all(b"\n")?;
        on_doc();
    }
    w.flush()?;
    Ok(())
}

pub fn write_jsonl_file(path: &Path, docs: &[Document], on_doc: impl FnMut()) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    write_jsonl(BufWriter::new(file), docs, on_doc)
}
