//! Loads `gene_id \t length \t ecotype` rows into `genes`, creating
//! ecotypes on first sight.

use crate::database::{GeneReadsDb, GeneRow, IdCache, NamedTable, WriteMode};
use crate::import::{parse_column, text_column, ImportError};
use crate::io::{line_of, open_tsv};
use log::{info, warn};
use std::collections::HashMap;
use std::path::Path;

const GENE_ID_COL: usize = 0;
const LENGTH_COL: usize = 1;
const ECOTYPE_COL: usize = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneImportSummary {
    pub rows_read: usize,
    pub new_ecotypes: usize,
    /// Distinct gene ids seen more than once in the file.
    pub duplicate_gene_ids: usize,
    /// Genes already in the database and left untouched.
    pub skipped_existing: usize,
    pub inserted: usize,
    pub updated: usize,
}

/// Imports genes from `path`.
///
/// The first occurrence of a gene id in the file wins. Genes already in the
/// database are skipped unless `force_update` is set.
pub fn import_genes(
    db: &mut GeneReadsDb,
    path: &Path,
    force_update: bool,
) -> Result<GeneImportSummary, ImportError> {
    let mut ecotypes = IdCache::load(db, NamedTable::Ecotypes)?;
    info!("{} ecotypes currently exist in the DB.", ecotypes.len());
    let existing = db.gene_ids()?;
    info!("{} genes currently exist in the DB.", existing.len());

    let mut summary = GeneImportSummary::default();
    let mut occurrences: HashMap<i64, usize> = HashMap::new();
    let mut inserts = Vec::new();
    let mut updates = Vec::new();

    let mut reader = open_tsv(path)?;
    for result in reader.records() {
        let record = result?;
        let line = line_of(&record);
        let malformed = |reason| ImportError::malformed(path, line, reason);

        let gene_id: i64 = parse_column(&record, GENE_ID_COL, "gene_id").map_err(malformed)?;
        let length: u32 = parse_column(&record, LENGTH_COL, "length").map_err(malformed)?;
        let ecotype = text_column(&record, ECOTYPE_COL, "ecotype").map_err(malformed)?;
        summary.rows_read += 1;

        let ecotype_id = ecotypes.get_or_insert(db, ecotype)?;

        let seen = occurrences.entry(gene_id).or_insert(0);
        *seen += 1;
        if *seen > 1 {
            continue;
        }

        let row = GeneRow {
            gene_id,
            length,
            ecotype_id,
        };
        if !existing.contains(&gene_id) {
            inserts.push(row);
        } else if force_update {
            updates.push(row);
        } else {
            summary.skipped_existing += 1;
        }
    }

    summary.new_ecotypes = ecotypes.inserted();
    summary.duplicate_gene_ids = occurrences.values().filter(|&&n| n > 1).count();
    if summary.duplicate_gene_ids > 0 {
        warn!(
            "{} duplicate gene_ids found in {}.",
            summary.duplicate_gene_ids,
            path.display()
        );
    }

    info!("{} records to be inserted in the DB.", inserts.len());
    if force_update {
        info!("{} records to be updated in the DB.", updates.len());
    }
    if inserts.is_empty() && updates.is_empty() {
        info!("Nothing to be done!");
        return Ok(summary);
    }

    summary.inserted = db.write_genes(&inserts, WriteMode::InsertIgnore)?;
    summary.updated = db.write_genes(&updates, WriteMode::Upsert)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::LengthSource;
    use std::fs;
    use tempfile::tempdir;

    fn write_input(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_import_genes_creates_ecotypes_and_dedupes() {
        let dir = tempdir().unwrap();
        let path = write_input(
            dir.path(),
            "genes.tsv",
            "1\t300\tHLI\n2\t150\tHLII\n1\t999\tHLI\n3\t90\tHLI\n",
        );
        let mut db = GeneReadsDb::open_in_memory().unwrap();

        let summary = import_genes(&mut db, &path, false).unwrap();
        assert_eq!(
            summary,
            GeneImportSummary {
                rows_read: 4,
                new_ecotypes: 2,
                duplicate_gene_ids: 1,
                skipped_existing: 0,
                inserted: 3,
                updated: 0,
            }
        );

        let hli = db.require_ecotype("HLI").unwrap();
        let lengths = db.ecotype_gene_lengths(hli, LengthSource::Genes).unwrap();
        assert_eq!(lengths.len(), 2);
        assert_eq!(lengths[&1], 300);
    }

    #[test]
    fn test_rerun_is_a_noop_without_force() {
        let dir = tempdir().unwrap();
        let path = write_input(dir.path(), "genes.tsv", "1\t300\tHLI\n");
        let mut db = GeneReadsDb::open_in_memory().unwrap();
        import_genes(&mut db, &path, false).unwrap();

        let again = import_genes(&mut db, &path, false).unwrap();
        assert_eq!(again.inserted, 0);
        assert_eq!(again.skipped_existing, 1);
        assert_eq!(again.new_ecotypes, 0);
    }

    #[test]
    fn test_force_update_moves_gene() {
        let dir = tempdir().unwrap();
        let first = write_input(dir.path(), "a.tsv", "5\t100\tHLI\n");
        let second = write_input(dir.path(), "b.tsv", "5\t120\tLLI\n6\t10\tLLI\n");
        let mut db = GeneReadsDb::open_in_memory().unwrap();
        import_genes(&mut db, &first, false).unwrap();

        let summary = import_genes(&mut db, &second, true).unwrap();
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.updated, 1);

        let lli = db.require_ecotype("LLI").unwrap();
        let lengths = db.ecotype_gene_lengths(lli, LengthSource::Genes).unwrap();
        assert_eq!(lengths[&5], 120);
        let hli = db.require_ecotype("HLI").unwrap();
        assert!(db.ecotype_gene_lengths(hli, LengthSource::Genes).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_row_reports_line() {
        let dir = tempdir().unwrap();
        let path = write_input(dir.path(), "genes.tsv", "1\t300\tHLI\nx\t1\tHLI\n");
        let mut db = GeneReadsDb::open_in_memory().unwrap();
        let err = import_genes(&mut db, &path, false).unwrap_err();
        match err {
            ImportError::Malformed { line, reason, .. } => {
                assert_eq!(line, 2);
                assert!(reason.contains("gene_id"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
