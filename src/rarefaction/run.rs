//! Pulls one ecotype out of the database, rarefies it and writes one TSV per
//! depth and replicate.

use crate::database::{GeneReadsDb, LengthSource};
use crate::io::{ensure_writable_dir, write_coverage_table};
use crate::rarefaction::{rarefy, RarefactionInput, RarefactionParams};
use crate::utils::parallel::with_thread_pool;
use anyhow::{Context, Result};
use log::{info, warn};
use rand::Rng;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct RarefyRequest {
    pub ecotype: String,
    /// Appended to output file names (e.g. a batch label).
    pub suffix: Option<String>,
    pub depths: Vec<usize>,
    pub replicates: usize,
    /// Drawn at random and logged when absent.
    pub seed: Option<u64>,
    pub output_dir: PathBuf,
    pub length_source: LengthSource,
    pub threads: usize,
}

#[derive(Debug, Clone)]
pub struct RarefySummary {
    pub seed: u64,
    pub genes: usize,
    pub stations: usize,
    pub reads: usize,
    pub files: Vec<PathBuf>,
}

pub fn run_rarefaction(db: &GeneReadsDb, request: &RarefyRequest) -> Result<RarefySummary> {
    let start = Instant::now();
    ensure_writable_dir(&request.output_dir)?;
    let ecotype_id = db.require_ecotype(&request.ecotype)?;

    info!("Fetching gene lengths ({:?})", request.length_source);
    let gene_lengths = db.ecotype_gene_lengths(ecotype_id, request.length_source)?;
    if gene_lengths.is_empty() {
        warn!("Ecotype {} has no genes with a length; tables will be empty", request.ecotype);
    }

    info!("Fetching stations");
    let stations = db.stations()?;

    info!("Fetching gene_reads for ecotype {}", request.ecotype);
    let reads = db.ecotype_reads(ecotype_id)?;

    let input = RarefactionInput::from_rows(gene_lengths, stations, reads);
    info!(
        "{} genes, {} stations, {} reads",
        input.gene_lengths.len(),
        input.stations.len(),
        input.total_reads()
    );

    let seed = request.seed.unwrap_or_else(|| rand::rng().random());
    info!("Sampling seed: {}", seed);
    let params = RarefactionParams {
        depths: request.depths.clone(),
        replicates: request.replicates,
        seed,
    };
    let tables = with_thread_pool(request.threads, || rarefy(&input, &params))?;

    let mut files = Vec::with_capacity(tables.len());
    for rarefied in &tables {
        for station in &rarefied.underfilled {
            info!(
                "Station {} had fewer reads than sample depth ({})",
                station, rarefied.depth
            );
        }
        let replicate = (request.replicates > 1).then_some(rarefied.replicate);
        let path = request.output_dir.join(output_file_name(
            &request.ecotype,
            rarefied.depth,
            request.suffix.as_deref(),
            replicate,
        ));
        info!(
            "Writing to file: {} ({} of {} genes covered)",
            path.display(),
            rarefied.table.covered_genes(),
            rarefied.table.dimensions().0
        );
        write_coverage_table(&rarefied.table, &path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        files.push(path);
    }

    info!(
        "Rarefaction finished in {:.2}s",
        start.elapsed().as_secs_f64()
    );
    Ok(RarefySummary {
        seed,
        genes: input.gene_lengths.len(),
        stations: input.stations.len(),
        reads: input.total_reads(),
        files,
    })
}

/// `<ECOTYPE>_<depth>[_<suffix>][_<replicate>].tsv`
pub fn output_file_name(
    ecotype: &str,
    depth: usize,
    suffix: Option<&str>,
    replicate: Option<usize>,
) -> String {
    let mut name = format!("{}_{}", ecotype, depth);
    if let Some(suffix) = suffix.filter(|s| !s.is_empty()) {
        name.push('_');
        name.push_str(suffix);
    }
    if let Some(replicate) = replicate {
        name.push('_');
        name.push_str(&replicate_label(replicate));
    }
    name.push_str(".tsv");
    name
}

/// `a`, `b`, ... `z`, then `27`, `28`, ...
pub fn replicate_label(replicate: usize) -> String {
    match u8::try_from(replicate) {
        Ok(i) if i < 26 => char::from(b'a' + i).to_string(),
        _ => (replicate + 1).to_string(),
    }
}
