//! Relational schema for the gene read store.
//!
//! Every statement is idempotent so the schema can be applied each time a
//! writable connection is opened.

/// Contig names are stored with at most this many characters.
pub const CONTIG_NAME_MAX_CHARS: usize = 191;

/// Tables in dependency order.
pub const TABLES: &[&str] = &[
    "ecotypes",
    "genes",
    "gene_ref_lengths",
    "stations",
    "contigs",
    "gene_reads",
];

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS ecotypes (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS genes (
    id INTEGER PRIMARY KEY,
    gene_id INTEGER NOT NULL UNIQUE,
    length INTEGER NOT NULL CHECK (length >= 0),
    ecotype_id INTEGER NOT NULL REFERENCES ecotypes (id)
);
CREATE INDEX IF NOT EXISTS genes_ecotype_id ON genes (ecotype_id);

CREATE TABLE IF NOT EXISTS gene_ref_lengths (
    gene_id INTEGER PRIMARY KEY,
    length INTEGER NOT NULL CHECK (length >= 0)
);

CREATE TABLE IF NOT EXISTS stations (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS contigs (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE CHECK (length(name) <= 191),
    ecotype_id INTEGER REFERENCES ecotypes (id)
);

CREATE TABLE IF NOT EXISTS gene_reads (
    id INTEGER PRIMARY KEY,
    gene_id INTEGER NOT NULL,
    read_number INTEGER NOT NULL,
    station_id INTEGER NOT NULL REFERENCES stations (id),
    contig_id INTEGER NOT NULL REFERENCES contigs (id),
    read_length INTEGER NOT NULL CHECK (read_length >= 0),
    gc_content REAL NOT NULL CHECK (gc_content >= 0 AND gc_content < 100),
    UNIQUE (gene_id, read_number, station_id)
);
CREATE INDEX IF NOT EXISTS gene_reads_gene_id ON gene_reads (gene_id);
";

/// Tables that map a unique `name` to an integer `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedTable {
    Ecotypes,
    Stations,
    Contigs,
}

impl NamedTable {
    pub fn table_name(&self) -> &'static str {
        match self {
            NamedTable::Ecotypes => "ecotypes",
            NamedTable::Stations => "stations",
            NamedTable::Contigs => "contigs",
        }
    }

    /// Maximum stored name length in characters, if the table has one.
    pub fn max_name_chars(&self) -> Option<usize> {
        match self {
            NamedTable::Contigs => Some(CONTIG_NAME_MAX_CHARS),
            _ => None,
        }
    }
}
