//! Assigns contigs to ecotypes from a `genotype \t ecotype` table.
//!
//! A contig's genotype is its name up to the first `_`.

use crate::database::{GeneReadsDb, IdCache, NamedTable};
use crate::import::{text_column, ImportError};
use crate::io::{line_of, open_tsv};
use log::{info, warn};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EcotypeMapSummary {
    pub mappings: usize,
    pub new_ecotypes: usize,
    pub contigs_mapped: usize,
    pub contigs_unmapped: usize,
    /// Genotypes of unmapped contigs.
    pub unmapped_genotypes: BTreeSet<String>,
}

pub fn genotype_of(contig_name: &str) -> &str {
    contig_name
        .split_once('_')
        .map_or(contig_name, |(genotype, _)| genotype)
}

pub fn map_ecotypes(db: &mut GeneReadsDb, path: &Path) -> Result<EcotypeMapSummary, ImportError> {
    info!("Processing {}", path.display());
    let mut genotype_ecotype: HashMap<String, String> = HashMap::new();
    let mut reader = open_tsv(path)?;
    for result in reader.records() {
        let record = result?;
        let line = line_of(&record);
        let malformed = |reason| ImportError::malformed(path, line, reason);
        let genotype = text_column(&record, 0, "genotype").map_err(malformed)?;
        let ecotype = text_column(&record, 1, "ecotype").map_err(malformed)?;
        // later rows override earlier ones
        genotype_ecotype.insert(genotype.to_string(), ecotype.to_string());
    }

    let mut summary = EcotypeMapSummary {
        mappings: genotype_ecotype.len(),
        ..Default::default()
    };
    let mut ecotypes = IdCache::load(db, NamedTable::Ecotypes)?;
    let contigs = db.contigs()?;
    info!("Loaded {} contigs", contigs.len());

    let mut updates = Vec::new();
    for (contig_id, name) in &contigs {
        let genotype = genotype_of(name);
        match genotype_ecotype.get(genotype) {
            Some(ecotype) => {
                let ecotype_id = ecotypes.get_or_insert(db, ecotype)?;
                updates.push((*contig_id, ecotype_id));
            }
            None => {
                summary.contigs_unmapped += 1;
                if summary.unmapped_genotypes.insert(genotype.to_string()) {
                    warn!("{} not in genotype map", genotype);
                }
            }
        }
    }

    summary.contigs_mapped = db.set_contig_ecotypes(&updates)?;
    summary.new_ecotypes = ecotypes.inserted();
    Ok(summary)
}
