//! Typed rows exchanged with the database.

use rusqlite::types::Value;

/// A row that can be bound into a multi-row `INSERT ... VALUES` statement.
pub trait BatchRow {
    /// Column names, in the order `push_values` emits them.
    const COLUMNS: &'static [&'static str];

    fn push_values(&self, out: &mut Vec<Value>);
}

/// One entry of the `genes` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneRow {
    pub gene_id: i64,
    pub length: u32,
    pub ecotype_id: i64,
}

impl BatchRow for GeneRow {
    const COLUMNS: &'static [&'static str] = &["gene_id", "length", "ecotype_id"];

    fn push_values(&self, out: &mut Vec<Value>) {
        out.push(Value::from(self.gene_id));
        out.push(Value::from(self.length));
        out.push(Value::from(self.ecotype_id));
    }
}

/// One entry of the `gene_ref_lengths` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefLengthRow {
    pub gene_id: i64,
    pub length: u32,
}

impl BatchRow for RefLengthRow {
    const COLUMNS: &'static [&'static str] = &["gene_id", "length"];

    fn push_values(&self, out: &mut Vec<Value>) {
        out.push(Value::from(self.gene_id));
        out.push(Value::from(self.length));
    }
}

/// One entry of the `gene_reads` table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneReadRow {
    pub gene_id: i64,
    pub read_number: u32,
    pub station_id: i64,
    pub contig_id: i64,
    pub read_length: u32,
    pub gc_content: f64,
}

impl BatchRow for GeneReadRow {
    const COLUMNS: &'static [&'static str] = &[
        "gene_id",
        "read_number",
        "station_id",
        "contig_id",
        "read_length",
        "gc_content",
    ];

    fn push_values(&self, out: &mut Vec<Value>) {
        out.push(Value::from(self.gene_id));
        out.push(Value::from(self.read_number));
        out.push(Value::from(self.station_id));
        out.push(Value::from(self.contig_id));
        out.push(Value::from(self.read_length));
        out.push(Value::from(self.gc_content));
    }
}

/// Natural key of a `gene_reads` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReadKey {
    pub gene_id: i64,
    pub read_number: u32,
    pub station_id: i64,
}

/// A read of one ecotype's genes, as pulled for rarefaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcotypeRead {
    pub gene_id: i64,
    pub station_id: i64,
    pub read_length: u32,
}
