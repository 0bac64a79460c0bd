//! Loads the per-read table into `gene_reads`.
//!
//! Columns: read path, station, strand flag (unused), contig, read length
//! and GC percent. The last path component of the read ends with
//! `<gene_id>_<read_number>`.

use crate::database::{GeneReadRow, GeneReadsDb, IdCache, NamedTable, ReadKey};
use crate::import::{parse_column, text_column, ImportError};
use crate::io::{line_of, open_tsv};
use log::{debug, info, warn};
use std::path::Path;
use std::time::Instant;

const READ_COL: usize = 0;
const STATION_COL: usize = 1;
const CONTIG_COL: usize = 3;
const READ_LENGTH_COL: usize = 4;
const GC_COL: usize = 5;

/// Stored in place of a GC content of exactly 100%.
pub const GC_CONTENT_CEILING: f64 = 99.9;

#[derive(Debug, Clone, Copy, Default)]
pub struct PopulateOptions {
    /// Log and skip malformed rows instead of aborting.
    pub skip_malformed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulateSummary {
    pub rows_read: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub malformed: usize,
    pub new_stations: usize,
    pub new_contigs: usize,
}

/// Gene and read number encoded in a read name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadId {
    pub gene_id: i64,
    pub read_number: u32,
}

/// Parses `.../<prefix>_<gene_id>_<read_number>`; the prefix is optional.
pub fn parse_read_id(field: &str) -> Result<ReadId, String> {
    let name = field.rsplit('/').next().unwrap_or(field);
    let mut parts = name.rsplitn(3, '_');
    let (read_number, gene_id) = match (parts.next(), parts.next()) {
        (Some(read_number), Some(gene_id)) => (read_number, gene_id),
        _ => return Err(format!("read name '{}' lacks <gene_id>_<read_number>", name)),
    };
    Ok(ReadId {
        gene_id: gene_id
            .parse()
            .map_err(|_| format!("invalid gene_id '{}' in read name '{}'", gene_id, name))?,
        read_number: read_number
            .parse()
            .map_err(|_| format!("invalid read number '{}' in read name '{}'", read_number, name))?,
    })
}

/// GC percent as stored: within `[0, 100)`, with 100 mapped to the ceiling.
pub fn stored_gc_content(gc: f64) -> Result<f64, String> {
    if !(0.0..=100.0).contains(&gc) {
        return Err(format!("gc_content {} outside [0, 100]", gc));
    }
    Ok(if gc == 100.0 { GC_CONTENT_CEILING } else { gc })
}

struct ParsedRead<'r> {
    read: ReadId,
    station: &'r str,
    contig: &'r str,
    read_length: u32,
    gc_content: f64,
}

fn parse_read(record: &csv::StringRecord) -> Result<ParsedRead<'_>, String> {
    let read = parse_read_id(text_column(record, READ_COL, "read")?)?;
    let station = text_column(record, STATION_COL, "station")?;
    let contig = text_column(record, CONTIG_COL, "contig")?;
    let read_length = parse_column(record, READ_LENGTH_COL, "read_length")?;
    let gc_content = stored_gc_content(parse_column(record, GC_COL, "gc_content")?)?;
    Ok(ParsedRead {
        read,
        station,
        contig,
        read_length,
        gc_content,
    })
}

/// Streams `path` into `gene_reads`, skipping keys that already exist in the
/// database or earlier in the file.
pub fn populate(
    db: &mut GeneReadsDb,
    path: &Path,
    options: PopulateOptions,
) -> Result<PopulateSummary, ImportError> {
    let start = Instant::now();
    let mut contigs = IdCache::load(db, NamedTable::Contigs)?;
    info!("Loading Contigs: {} initial contigs", contigs.len());
    let mut stations = IdCache::load(db, NamedTable::Stations)?;
    info!("Loading Stations: {} initial stations", stations.len());
    let mut keys = db.read_keys()?;
    info!("Loading Records: {} initial records", keys.len());

    info!("Processing {}", path.display());
    let batch_size = db.batch_size();
    let mut summary = PopulateSummary::default();
    let mut pending: Vec<GeneReadRow> = Vec::with_capacity(batch_size);

    let mut reader = open_tsv(path)?;
    for result in reader.records() {
        let record = result?;
        summary.rows_read += 1;
        let parsed = match parse_read(&record) {
            Ok(parsed) => parsed,
            Err(reason) if options.skip_malformed => {
                warn!("{}:{}: {}", path.display(), line_of(&record), reason);
                summary.malformed += 1;
                continue;
            }
            Err(reason) => return Err(ImportError::malformed(path, line_of(&record), reason)),
        };

        let station_id = stations.get_or_insert(db, parsed.station)?;
        let key = ReadKey {
            gene_id: parsed.read.gene_id,
            read_number: parsed.read.read_number,
            station_id,
        };
        if !keys.insert(key) {
            summary.duplicates += 1;
            continue;
        }
        let contig_id = contigs.get_or_insert(db, parsed.contig)?;

        pending.push(GeneReadRow {
            gene_id: key.gene_id,
            read_number: key.read_number,
            station_id,
            contig_id,
            read_length: parsed.read_length,
            gc_content: parsed.gc_content,
        });
        if pending.len() >= batch_size {
            summary.inserted += db.insert_gene_reads(&pending)?;
            pending.clear();
            debug!("{} reads inserted so far", summary.inserted);
        }
    }
    if !pending.is_empty() {
        summary.inserted += db.insert_gene_reads(&pending)?;
    }

    summary.new_stations = stations.inserted();
    summary.new_contigs = contigs.inserted();
    info!(
        "Inserted {} reads ({} duplicates skipped) in {:.2}s",
        summary.inserted,
        summary.duplicates,
        start.elapsed().as_secs_f64()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const READS: &str = "\
reads/ST01_101_0001\tST01\t0\tP9313_1\t150\t45.5
reads/ST01_101_0002\tST01\t1\tP9313_1\t120\t100
reads/ST02_101_0001\tST02\t0\tP9313_2\t90\t30
reads/ST01_101_001\tST01\t0\tP9313_1\t150\t45.5
102_7\tST01\t0\tP9313_2\t60\t0
";

    fn input(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reads.tsv");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_parse_read_id() {
        assert_eq!(
            parse_read_id("a/b/ST01_101_0007").unwrap(),
            ReadId { gene_id: 101, read_number: 7 }
        );
        assert_eq!(
            parse_read_id("101_0007").unwrap(),
            ReadId { gene_id: 101, read_number: 7 }
        );
        assert!(parse_read_id("reads/101").is_err());
        assert!(parse_read_id("x_y").is_err());
    }

    #[test]
    fn test_stored_gc_content() {
        assert_eq!(stored_gc_content(100.0), Ok(GC_CONTENT_CEILING));
        assert_eq!(stored_gc_content(42.0), Ok(42.0));
        assert!(stored_gc_content(100.5).is_err());
        assert!(stored_gc_content(-1.0).is_err());
        assert!(stored_gc_content(f64::NAN).is_err());
    }

    #[test]
    fn test_populate_dedupes_within_file() {
        let (_dir, path) = input(READS);
        let mut db = GeneReadsDb::open_in_memory()
            .unwrap()
            .with_batch_size(2)
            .unwrap();

        let summary = populate(&mut db, &path, PopulateOptions::default()).unwrap();
        assert_eq!(
            summary,
            PopulateSummary {
                rows_read: 5,
                inserted: 4,
                duplicates: 1,
                malformed: 0,
                new_stations: 2,
                new_contigs: 2,
            }
        );
        assert_eq!(db.read_keys().unwrap().len(), 4);
    }

    #[test]
    fn test_populate_rerun_inserts_nothing() {
        let (_dir, path) = input(READS);
        let mut db = GeneReadsDb::open_in_memory().unwrap();
        populate(&mut db, &path, PopulateOptions::default()).unwrap();

        let again = populate(&mut db, &path, PopulateOptions::default()).unwrap();
        assert_eq!(again.inserted, 0);
        assert_eq!(again.duplicates, 5);
        assert_eq!(again.new_stations, 0);
        assert_eq!(again.new_contigs, 0);
    }

    #[test]
    fn test_malformed_rows() {
        let (_dir, path) = input("101_1\tST01\t0\tc1\t150\t45\n101_2\tST01\t0\tc1\tlong\t45\n");
        let mut db = GeneReadsDb::open_in_memory().unwrap();

        let err = populate(&mut db, &path, PopulateOptions::default()).unwrap_err();
        assert!(err.to_string().contains(":2: invalid read_length 'long'"));

        let mut db = GeneReadsDb::open_in_memory().unwrap();
        let summary = populate(
            &mut db,
            &path,
            PopulateOptions {
                skip_malformed: true,
            },
        )
        .unwrap();
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.malformed, 1);
    }
}
