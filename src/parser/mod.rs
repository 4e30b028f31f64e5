pub mod assemble;
pub mod extract;
pub mod headers;
pub mod normalize;
pub mod rows;

use chrono::Utc;
use tracing::{debug, info};

use crate::config::Settings;
use crate::docs::Document;
use normalize::Row;
use rows::{ScanState, ScanStats};

pub struct Processed {
    pub docs: Vec<Document>,
    pub stats: ScanStats,
}

/// Two-pass pipeline: rows → flat physician records → scoped documents.
pub fn process_rows(rows: &[Row], settings: &Settings, source_file: Option<&str>) -> Processed {
    let scan = rows::scan_rows(rows, settings);
    if scan.state != ScanState::NoDepartment {
        debug!(state = ?scan.state, "input ended inside an open context");
    }

    let mut docs = assemble::assemble(&scan.records, source_file);
    if settings.stamp_ingested_at {
        let now = Utc::now();
        docs.iter_mut().for_each(|d| d.set_ingested_at(now));
    }

    info!(
        rows = scan.stats.rows,
        discarded = scan.stats.discarded,
        departments = scan.stats.departments,
        parts = scan.stats.parts,
        records = scan.stats.records,
        documents = docs.len(),
        "processed rows"
    );
    Processed {
        docs,
        stats: scan.stats,
    }
}

// ── Tests ──
