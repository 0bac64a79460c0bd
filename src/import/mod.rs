//! Streaming loaders for the tab-separated input files.
//!
//! Each loader resolves names through lazily filled id caches, drops rows
//! that would break a uniqueness invariant, and writes the rest in batches.

pub mod ecotype_map;
pub mod genes;
pub mod reads;
pub mod ref_lengths;

pub use ecotype_map::map_ecotypes;
pub use genes::import_genes;
pub use reads::{populate, PopulateOptions};
pub use ref_lengths::import_ref_lengths;

use crate::database::DbError;
use std::io;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("TSV error: {0}")]
    TsvError(#[from] csv::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DbError),

    #[error("{path}:{line}: {reason}")]
    Malformed {
        path: String,
        line: u64,
        reason: String,
    },
}

impl ImportError {
    pub fn malformed(path: &Path, line: u64, reason: impl Into<String>) -> Self {
        ImportError::Malformed {
            path: path.display().to_string(),
            line,
            reason: reason.into(),
        }
    }
}

/// Parses column `index` of `record` as `T`.
pub(crate) fn parse_column<T: FromStr>(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
) -> Result<T, String> {
    let raw = text_column(record, index, name)?;
    raw.parse()
        .map_err(|_| format!("invalid {} '{}' in column {}", name, raw, index + 1))
}

/// Column `index` of `record`, which must be present and non-empty.
pub(crate) fn text_column<'r>(
    record: &'r csv::StringRecord,
    index: usize,
    name: &str,
) -> Result<&'r str, String> {
    match record.get(index) {
        Some(value) if !value.is_empty() => Ok(value),
        Some(_) => Err(format!("empty {} in column {}", name, index + 1)),
        None => Err(format!(
            "missing {} (expected at least {} columns, found {})",
            name,
            index + 1,
            record.len()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_column() {
        let record = csv::StringRecord::from(vec!["12", "abc", ""]);
        assert_eq!(parse_column::<i64>(&record, 0, "gene_id"), Ok(12));
        assert_eq!(
            parse_column::<i64>(&record, 1, "length"),
            Err("invalid length 'abc' in column 2".to_string())
        );
        assert_eq!(
            text_column(&record, 2, "ecotype"),
            Err("empty ecotype in column 3".to_string())
        );
        assert_eq!(
            text_column(&record, 5, "contig"),
            Err("missing contig (expected at least 6 columns, found 3)".to_string())
        );
    }

    #[test]
    fn test_malformed_message() {
        let err = ImportError::malformed(Path::new("in.tsv"), 7, "bad row");
        assert_eq!(err.to_string(), "in.tsv:7: bad row");
    }
}
