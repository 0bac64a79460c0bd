//! SQLite-backed store for ecotypes, genes, stations, contigs and gene reads.

use crate::database::records::{BatchRow, EcotypeRead, GeneReadRow, GeneRow, ReadKey, RefLengthRow};
use crate::database::schema::{NamedTable, SCHEMA, TABLES};
use indexmap::IndexMap;
use itertools::Itertools;
use log::{debug, info};
use rusqlite::{params_from_iter, Connection, OpenFlags, OptionalExtension};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    #[error("Database file not found: {0}")]
    NotFound(PathBuf),

    #[error("Ecotype {name} not found in database. Ecotypes found: {known}")]
    UnknownEcotype { name: String, known: String },

    #[error("Invalid batch size: {0} (expected 1..=5000)")]
    InvalidBatchSize(usize),
}

/// How batched writes treat rows whose key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Existing rows are left untouched.
    InsertIgnore,
    /// Existing rows get their non-key columns overwritten.
    Upsert,
}

/// Which column supplies gene lengths for coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LengthSource {
    /// `genes.length`
    #[default]
    Genes,
    /// `gene_ref_lengths.length`
    RefLengths,
}

/// A connection to the gene read database.
///
/// Writes are grouped into multi-row statements of at most `batch_size`
/// rows, one transaction per batch.
pub struct GeneReadsDb {
    connection: Connection,
    batch_size: usize,
}

impl GeneReadsDb {
    pub const DEFAULT_BATCH_SIZE: usize = 1000;
    /// Keeps the widest multi-row insert under SQLite's bound-variable limit.
    pub const MAX_BATCH_SIZE: usize = 5000;

    /// Opens (creating if needed) a writable database and applies the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let connection = Connection::open(path.as_ref())?;
        info!("Opened database {}", path.as_ref().display());
        Self::with_connection(connection)
    }

    /// Opens an existing database read-only.
    pub fn open_existing<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(DbError::NotFound(path.to_path_buf()));
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let connection = Connection::open_with_flags(path, flags)?;
        info!("Opened database {} (read-only)", path.display());
        Ok(GeneReadsDb {
            connection,
            batch_size: Self::DEFAULT_BATCH_SIZE,
        })
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(connection: Connection) -> Result<Self, DbError> {
        connection.execute_batch("PRAGMA foreign_keys = ON;")?;
        connection.execute_batch(SCHEMA)?;
        Ok(GeneReadsDb {
            connection,
            batch_size: Self::DEFAULT_BATCH_SIZE,
        })
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Result<Self, DbError> {
        if batch_size == 0 || batch_size > Self::MAX_BATCH_SIZE {
            return Err(DbError::InvalidBatchSize(batch_size));
        }
        self.batch_size = batch_size;
        Ok(self)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Path of the database file, `None` for in-memory databases.
    pub fn path(&self) -> Option<&str> {
        self.connection.path().filter(|p| !p.is_empty())
    }

    pub fn sqlite_version(&self) -> &'static str {
        rusqlite::version()
    }

    /// Row count of every table, in schema order.
    pub fn table_counts(&self) -> Result<Vec<(&'static str, i64)>, DbError> {
        let mut counts = Vec::with_capacity(TABLES.len());
        for &table in TABLES {
            let count: i64 = self.connection.query_row(
                &format!("SELECT COUNT(*) FROM {}", table),
                [],
                |row| row.get(0),
            )?;
            counts.push((table, count));
        }
        Ok(counts)
    }

    // --- Named tables (ecotypes, stations, contigs) ---

    pub fn named_ids(&self, table: NamedTable) -> Result<HashMap<String, i64>, DbError> {
        let mut statement = self
            .connection
            .prepare(&format!("SELECT id, name FROM {}", table.table_name()))?;
        let rows = statement.query_map([], |row| Ok((row.get(1)?, row.get(0)?)))?;
        Ok(rows.collect::<Result<HashMap<String, i64>, _>>()?)
    }

    pub fn find_named_id(&self, table: NamedTable, name: &str) -> Result<Option<i64>, DbError> {
        let id = self
            .connection
            .query_row(
                &format!("SELECT id FROM {} WHERE name = ?1", table.table_name()),
                (name,),
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Inserts `name` unless present. Returns its id and whether a row was added.
    pub fn insert_named(&self, table: NamedTable, name: &str) -> Result<(i64, bool), DbError> {
        let inserted = self.connection.execute(
            &format!(
                "INSERT INTO {} (name) VALUES (?1) ON CONFLICT (name) DO NOTHING",
                table.table_name()
            ),
            (name,),
        )? > 0;
        let id = if inserted {
            self.connection.last_insert_rowid()
        } else {
            self.connection.query_row(
                &format!("SELECT id FROM {} WHERE name = ?1", table.table_name()),
                (name,),
                |row| row.get(0),
            )?
        };
        Ok((id, inserted))
    }

    /// Resolves an ecotype id, listing the known ecotypes when it is missing.
    pub fn require_ecotype(&self, name: &str) -> Result<i64, DbError> {
        if let Some(id) = self.find_named_id(NamedTable::Ecotypes, name)? {
            return Ok(id);
        }
        let known = self
            .named_ids(NamedTable::Ecotypes)?
            .into_keys()
            .sorted()
            .join(", ");
        Err(DbError::UnknownEcotype {
            name: name.to_string(),
            known,
        })
    }

    /// `(id, name)` of every station, ordered by id.
    pub fn stations(&self) -> Result<Vec<(i64, String)>, DbError> {
        let mut statement = self
            .connection
            .prepare("SELECT id, name FROM stations ORDER BY id")?;
        let rows = statement.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// `(id, name)` of every contig, ordered by id.
    pub fn contigs(&self) -> Result<Vec<(i64, String)>, DbError> {
        let mut statement = self
            .connection
            .prepare("SELECT id, name FROM contigs ORDER BY id")?;
        let rows = statement.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn set_contig_ecotypes(&mut self, updates: &[(i64, i64)]) -> Result<usize, DbError> {
        let mut changed = 0;
        for chunk in updates.chunks(self.batch_size) {
            let transaction = self.connection.transaction()?;
            {
                let mut update =
                    transaction.prepare_cached("UPDATE contigs SET ecotype_id = ?1 WHERE id = ?2")?;
                for &(contig_id, ecotype_id) in chunk {
                    changed += update.execute((ecotype_id, contig_id))?;
                }
            }
            transaction.commit()?;
        }
        Ok(changed)
    }

    // --- Genes and reference lengths ---

    pub fn gene_ids(&self) -> Result<HashSet<i64>, DbError> {
        let mut statement = self.connection.prepare("SELECT gene_id FROM genes")?;
        let rows = statement.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<Result<HashSet<i64>, _>>()?)
    }

    pub fn write_genes(&mut self, rows: &[GeneRow], mode: WriteMode) -> Result<usize, DbError> {
        let conflict = match mode {
            WriteMode::InsertIgnore => "ON CONFLICT (gene_id) DO NOTHING",
            WriteMode::Upsert => {
                "ON CONFLICT (gene_id) DO UPDATE SET length = excluded.length, ecotype_id = excluded.ecotype_id"
            }
        };
        self.write_batched("genes", conflict, rows)
    }

    pub fn write_ref_lengths(&mut self, rows: &[RefLengthRow], mode: WriteMode) -> Result<usize, DbError> {
        let conflict = match mode {
            WriteMode::InsertIgnore => "ON CONFLICT (gene_id) DO NOTHING",
            WriteMode::Upsert => "ON CONFLICT (gene_id) DO UPDATE SET length = excluded.length",
        };
        self.write_batched("gene_ref_lengths", conflict, rows)
    }

    /// `gene_id -> length` for every gene of an ecotype, ordered by `gene_id`.
    pub fn ecotype_gene_lengths(
        &self,
        ecotype_id: i64,
        source: LengthSource,
    ) -> Result<IndexMap<i64, u32>, DbError> {
        let sql = match source {
            LengthSource::Genes => {
                "SELECT gene_id, length FROM genes WHERE ecotype_id = ?1 ORDER BY gene_id"
            }
            LengthSource::RefLengths => {
                "SELECT g.gene_id, r.length FROM genes g
                 JOIN gene_ref_lengths r ON r.gene_id = g.gene_id
                 WHERE g.ecotype_id = ?1 ORDER BY g.gene_id"
            }
        };
        let mut statement = self.connection.prepare(sql)?;
        let rows = statement.query_map((ecotype_id,), |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<Result<IndexMap<i64, u32>, _>>()?)
    }

    // --- Gene reads ---

    pub fn read_keys(&self) -> Result<HashSet<ReadKey>, DbError> {
        let mut statement = self
            .connection
            .prepare("SELECT gene_id, read_number, station_id FROM gene_reads")?;
        let rows = statement.query_map([], |row| {
            Ok(ReadKey {
                gene_id: row.get(0)?,
                read_number: row.get(1)?,
                station_id: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<HashSet<_>, _>>()?)
    }

    /// Inserts reads, ignoring keys already present. Returns the rows added.
    pub fn insert_gene_reads(&mut self, rows: &[GeneReadRow]) -> Result<usize, DbError> {
        self.write_batched(
            "gene_reads",
            "ON CONFLICT (gene_id, read_number, station_id) DO NOTHING",
            rows,
        )
    }

    /// Every read whose gene belongs to the ecotype.
    pub fn ecotype_reads(&self, ecotype_id: i64) -> Result<Vec<EcotypeRead>, DbError> {
        let mut statement = self.connection.prepare(
            "SELECT gr.gene_id, gr.station_id, gr.read_length FROM gene_reads gr
             JOIN genes g ON g.gene_id = gr.gene_id
             WHERE g.ecotype_id = ?1",
        )?;
        let rows = statement.query_map((ecotype_id,), |row| {
            Ok(EcotypeRead {
                gene_id: row.get(0)?,
                station_id: row.get(1)?,
                read_length: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn write_batched<R: BatchRow>(
        &mut self,
        table: &str,
        conflict: &str,
        rows: &[R],
    ) -> Result<usize, DbError> {
        let mut changed = 0;
        for chunk in rows.chunks(self.batch_size) {
            let sql = multi_row_sql(table, R::COLUMNS, chunk.len(), conflict);
            let mut values = Vec::with_capacity(chunk.len() * R::COLUMNS.len());
            for row in chunk {
                row.push_values(&mut values);
            }
            let transaction = self.connection.transaction()?;
            {
                let mut statement = transaction.prepare_cached(&sql)?;
                changed += statement.execute(params_from_iter(values))?;
            }
            transaction.commit()?;
            debug!("Wrote batch of {} rows into {}", chunk.len(), table);
        }
        Ok(changed)
    }
}

/// Builds `INSERT INTO table (cols) VALUES (?, ..), (?, ..) CONFLICT` for
/// `rows` rows. Only key conflicts are resolved by `conflict`; CHECK and
/// NOT NULL violations still fail the statement.
fn multi_row_sql(table: &str, columns: &[&str], rows: usize, conflict: &str) -> String {
    let tuple = format!("({})", vec!["?"; columns.len()].join(", "));
    let values = std::iter::repeat(tuple.as_str()).take(rows).join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES {} {}",
        table,
        columns.join(", "),
        values,
        conflict
    )
}
