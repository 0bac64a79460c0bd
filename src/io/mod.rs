//! Input/Output operations module.
//!
//! Handles reading the tab-separated import files and writing coverage
//! tables.

pub mod fasta;

use crate::coverage_table::CoverageTable;
use anyhow::{bail, Context};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read};
use std::path::Path;

/// Opens a headerless TSV file, transparently decompressing `.gz` input.
///
/// Fields are trimmed, rows may have any number of columns and lines
/// starting with `#` are skipped.
pub fn open_tsv(path: &Path) -> io::Result<csv::Reader<Box<dyn Read>>> {
    let file = File::open(path)?;
    let reader: Box<dyn Read> = match path.extension().and_then(|e| e.to_str()) {
        Some("gz") => Box::new(MultiGzDecoder::new(BufReader::new(file))),
        _ => Box::new(BufReader::new(file)),
    };
    Ok(csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(reader))
}

/// Fails unless `dir` is an existing directory we can create files in.
pub fn ensure_writable_dir(dir: &Path) -> anyhow::Result<()> {
    if !dir.is_dir() {
        bail!(
            "Problem with output directory {}. Ensure it exists and is writeable.",
            dir.display()
        );
    }
    tempfile::NamedTempFile::new_in(dir).with_context(|| {
        format!(
            "Problem with output directory {}. Ensure it exists and is writeable.",
            dir.display()
        )
    })?;
    Ok(())
}

/// 1-based line number of a record, 0 when unknown.
pub fn line_of(record: &csv::StringRecord) -> u64 {
    record.position().map_or(0, |p| p.line())
}

/// Writes a coverage table as TSV: `gene_id`, then one column per station.
pub fn write_coverage_table(table: &CoverageTable, output_path: &Path) -> anyhow::Result<()> {
    let file = File::create(output_path)?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(BufWriter::new(file));

    let mut header = vec!["gene_id".to_string()];
    header.extend(table.stations().iter().cloned());
    writer.write_record(&header)?;

    let coverage = table.coverage_matrix();
    for (row, gene_id) in table.gene_ids().iter().enumerate() {
        let mut record = Vec::with_capacity(table.stations().len() + 1);
        record.push(gene_id.to_string());
        record.extend(coverage.row(row).iter().map(|&v| format_float(v)));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Shortest round-trip representation of a float, always with a fractional
/// part (`0.0`, `1.25`).
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}
