//! Loads `gene_id \t length` rows into `gene_ref_lengths`.

use crate::database::{GeneReadsDb, RefLengthRow, WriteMode};
use crate::import::{parse_column, ImportError};
use crate::io::{line_of, open_tsv};
use log::{info, warn};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefLengthSummary {
    pub rows_read: usize,
    pub duplicates: usize,
    /// Rows inserted, or inserted and updated with `force_update`.
    pub written: usize,
}

pub fn import_ref_lengths(
    db: &mut GeneReadsDb,
    path: &Path,
    force_update: bool,
) -> Result<RefLengthSummary, ImportError> {
    info!("Processing {}", path.display());
    let mut summary = RefLengthSummary::default();
    let mut seen = HashSet::new();
    let mut rows = Vec::new();

    let mut reader = open_tsv(path)?;
    for result in reader.records() {
        let record = result?;
        let line = line_of(&record);
        let malformed = |reason| ImportError::malformed(path, line, reason);
        let gene_id: i64 = parse_column(&record, 0, "gene_id").map_err(malformed)?;
        let length: u32 = parse_column(&record, 1, "length").map_err(malformed)?;
        summary.rows_read += 1;

        if !seen.insert(gene_id) {
            summary.duplicates += 1;
            continue;
        }
        rows.push(RefLengthRow { gene_id, length });
    }
    if summary.duplicates > 0 {
        warn!(
            "{} repeated gene_ids in {} ignored.",
            summary.duplicates,
            path.display()
        );
    }

    let mode = if force_update {
        WriteMode::Upsert
    } else {
        WriteMode::InsertIgnore
    };
    summary.written = db.write_ref_lengths(&rows, mode)?;
    info!("{} reference lengths written.", summary.written);
    Ok(summary)
}
