//! Conversion of FASTA read files into the read table loaded by `populate`.
//!
//! Read headers carry `|`-separated fields such as
//! `12345_0001|sample_id:ST01|reverse:0|contig_name:P9313_1`. Each record
//! becomes one tab-separated row: the file-prefixed header fields, the
//! sequence length and its GC percent.

use crate::io::format_float;
use anyhow::{anyhow, Context, Result};
use log::info;
use needletail::parse_fastx_file;
use std::io::Write;
use std::path::Path;

/// Header labels removed from each row.
const STRIPPED: &[&str] = &[".fa", "sample_id:", "reverse:", "contig_name:"];

/// Writes one table row per FASTA record of `path`. Returns the number of rows.
pub fn fasta_to_table<W: Write>(path: &Path, out: &mut W) -> Result<usize> {
    let mut reader = parse_fastx_file(path)
        .map_err(|e| anyhow!("Failed to open or parse file {}: {}", path.display(), e))?;
    let label = path.to_string_lossy();

    let mut rows = 0;
    while let Some(record) = reader.next() {
        let record = record
            .map_err(|e| anyhow!("Failed to parse record in file {}: {}", path.display(), e))?;
        let description = String::from_utf8_lossy(record.id());
        let seq = record.seq();
        writeln!(out, "{}", table_row(&label, &description, &seq))
            .with_context(|| format!("Failed to write row for {}", description))?;
        rows += 1;
    }
    info!("Converted {} records from {}", rows, path.display());
    Ok(rows)
}

/// Formats one row: `<label>_<description>` with its fields split on `|`,
/// then the sequence length and GC percent.
pub fn table_row(label: &str, description: &str, seq: &[u8]) -> String {
    let mut fields = format!("{}_{}", label, description).replace('|', "\t");
    for pattern in STRIPPED {
        fields = fields.replace(pattern, "");
    }
    format!("{}\t{}\t{}", fields, seq.len(), format_float(gc_percent(seq)))
}

/// Percentage of G, C and S (strong) bases, case-insensitive.
pub fn gc_percent(seq: &[u8]) -> f64 {
    if seq.is_empty() {
        return 0.0;
    }
    let gc = seq
        .iter()
        .filter(|b| matches!(b.to_ascii_uppercase(), b'G' | b'C' | b'S'))
        .count();
    gc as f64 * 100.0 / seq.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_gc_percent() {
        assert_eq!(gc_percent(b""), 0.0);
        assert_eq!(gc_percent(b"GGCC"), 100.0);
        assert_eq!(gc_percent(b"atgc"), 50.0);
        assert_eq!(gc_percent(b"ASTN"), 25.0);
    }

    #[test]
    fn test_table_row_strips_labels() {
        let row = table_row(
            "reads/ST01.fa",
            "12345_0001|sample_id:ST01|reverse:0|contig_name:P9313_1",
            b"ACGT",
        );
        assert_eq!(row, "reads/ST01_12345_0001\tST01\t0\tP9313_1\t4\t50.0");
    }

    #[test]
    fn test_fasta_to_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ST02.fa");
        fs::write(
            &path,
            ">7_3|sample_id:ST02|reverse:1|contig_name:c9\nGGGA\n>7_4|sample_id:ST02|reverse:0|contig_name:c9\nAAAA\n",
        )
        .unwrap();

        let mut out = Vec::new();
        let rows = fasta_to_table(&path, &mut out).unwrap();
        assert_eq!(rows, 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        let first: Vec<&str> = lines[0].split('\t').collect();
        assert!(first[0].ends_with("ST02_7_3"));
        assert_eq!(&first[1..], &["ST02", "1", "c9", "4", "75.0"]);
        assert!(lines[1].ends_with("\t4\t0.0"));
    }
}
