use crate::config::Settings;
use crate::database::{GeneReadsDb, LengthSource};
use crate::import::{
    import_genes, import_ref_lengths, map_ecotypes, populate, PopulateOptions,
};
use crate::io::fasta::fasta_to_table;
use crate::rarefaction::run::{run_rarefaction, RarefyRequest};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, info};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Load gene read tables and rarefy per-ecotype coverage", long_about = None)]
pub struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = "GENE_READS_DB")]
    pub db: Option<PathBuf>,

    /// JSON settings file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Worker threads for rarefaction (0 = all cores)
    #[arg(short = 't', long, global = true)]
    pub threads: Option<usize>,

    /// Rows per INSERT statement
    #[arg(long, global = true)]
    pub batch_size: Option<usize>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database and its tables
    Init,

    /// Report database version, path and table sizes
    Check,

    /// Load genes (gene_id, length, ecotype)
    ImportGenes {
        input: PathBuf,

        /// Overwrite length and ecotype of genes already present
        #[arg(short, long)]
        force_update: bool,
    },

    /// Load reference gene lengths (gene_id, length)
    ImportRefLengths {
        input: PathBuf,

        /// Overwrite lengths already present
        #[arg(short, long)]
        force_update: bool,
    },

    /// Assign contigs to ecotypes from a genotype to ecotype table
    MapEcotypes { input: PathBuf },

    /// Load per-read rows into gene_reads
    Populate {
        input: PathBuf,

        /// Log and skip malformed rows instead of stopping
        #[arg(long)]
        skip_malformed: bool,
    },

    /// Write rarefied coverage tables for one ecotype
    Rarefy {
        ecotype: String,

        /// Appended to every output file name
        suffix: Option<String>,

        /// Sampling depths, comma separated
        #[arg(short, long, value_delimiter = ',')]
        depths: Option<Vec<usize>>,

        /// Independent subsamples per depth
        #[arg(short, long, default_value_t = 1, value_parser = positive)]
        replicates: usize,

        /// RNG seed; drawn at random and logged when absent
        #[arg(short, long)]
        seed: Option<u64>,

        /// Directory for the output tables
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Source of gene lengths
        #[arg(long, value_enum, default_value_t = LengthSource::Genes)]
        lengths: LengthSource,
    },

    /// Convert FASTA read files into the table read by populate
    FaToTab {
        #[arg(required = true)]
        fasta: Vec<PathBuf>,

        /// Output file (stdout when absent)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn positive(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

/// Settings from the config file with the global options layered on top.
pub fn settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(db) = &cli.db {
        settings.database = Some(db.clone());
    }
    if let Some(threads) = cli.threads {
        settings.threads = threads;
    }
    if let Some(batch_size) = cli.batch_size {
        settings.batch_size = batch_size;
    }
    Ok(settings)
}

fn open_writable(settings: &Settings) -> Result<GeneReadsDb> {
    let path = settings.database_path()?;
    let db = GeneReadsDb::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    Ok(db.with_batch_size(settings.batch_size)?)
}

fn open_read_only(settings: &Settings) -> Result<GeneReadsDb> {
    let path = settings.database_path()?;
    GeneReadsDb::open_existing(path)
        .with_context(|| format!("Failed to open database {}", path.display()))
}

/// Main entry point for CLI
pub fn run_cli(cli: Cli) -> Result<()> {
    let mut settings = settings(&cli)?;
    match cli.command {
        Commands::Init => {
            let settings = settings.validate()?;
            let db = open_writable(&settings)?;
            println!("Database ready: {}", db.path().unwrap_or_default());
        }

        Commands::Check => {
            let db = open_read_only(&settings)?;
            println!("SQLite version: {}", db.sqlite_version());
            println!("Database: {}", db.path().unwrap_or_default());
            for (table, rows) in db.table_counts()? {
                println!("{:<18}{}", table, rows);
            }
        }

        Commands::ImportGenes {
            input,
            force_update,
        } => {
            let settings = settings.validate()?;
            let mut db = open_writable(&settings)?;
            let summary = import_genes(&mut db, &input, force_update)?;
            println!(
                "{} rows read, {} genes inserted, {} updated, {} already present, {} duplicate gene_ids, {} new ecotypes",
                summary.rows_read,
                summary.inserted,
                summary.updated,
                summary.skipped_existing,
                summary.duplicate_gene_ids,
                summary.new_ecotypes
            );
        }

        Commands::ImportRefLengths {
            input,
            force_update,
        } => {
            let settings = settings.validate()?;
            let mut db = open_writable(&settings)?;
            let summary = import_ref_lengths(&mut db, &input, force_update)?;
            println!(
                "{} rows read, {} reference lengths written, {} duplicates ignored",
                summary.rows_read, summary.written, summary.duplicates
            );
        }

        Commands::MapEcotypes { input } => {
            let settings = settings.validate()?;
            let mut db = open_writable(&settings)?;
            let summary = map_ecotypes(&mut db, &input)?;
            println!(
                "{} genotype mappings, {} contigs mapped, {} unmapped, {} new ecotypes",
                summary.mappings,
                summary.contigs_mapped,
                summary.contigs_unmapped,
                summary.new_ecotypes
            );
            if !summary.unmapped_genotypes.is_empty() {
                let genotypes: Vec<&str> =
                    summary.unmapped_genotypes.iter().map(String::as_str).collect();
                println!("Unmapped genotypes: {}", genotypes.join(", "));
            }
        }

        Commands::Populate {
            input,
            skip_malformed,
        } => {
            let settings = settings.validate()?;
            let mut db = open_writable(&settings)?;
            let summary = populate(&mut db, &input, PopulateOptions { skip_malformed })?;
            println!(
                "{} rows read, {} reads inserted, {} duplicates, {} malformed, {} new stations, {} new contigs",
                summary.rows_read,
                summary.inserted,
                summary.duplicates,
                summary.malformed,
                summary.new_stations,
                summary.new_contigs
            );
        }

        Commands::Rarefy {
            ecotype,
            suffix,
            depths,
            replicates,
            seed,
            output_dir,
            lengths,
        } => {
            if let Some(depths) = depths {
                settings.depths = depths;
            }
            if seed.is_some() {
                settings.seed = seed;
            }
            if let Some(output_dir) = output_dir {
                settings.output_dir = output_dir;
            }
            let settings = settings.validate()?;
            debug!("Settings: {:?}", settings);
            let db = open_read_only(&settings)?;
            let request = RarefyRequest {
                ecotype,
                suffix,
                depths: settings.depths.clone(),
                replicates,
                seed: settings.seed,
                output_dir: settings.output_dir.clone(),
                length_source: lengths,
                threads: settings.threads,
            };
            let summary = run_rarefaction(&db, &request)?;
            println!(
                "{} genes x {} stations from {} reads (seed {})",
                summary.genes, summary.stations, summary.reads, summary.seed
            );
            for file in &summary.files {
                println!("{}", file.display());
            }
        }

        Commands::FaToTab { fasta, output } => {
            let mut out: Box<dyn Write> = match &output {
                Some(path) => Box::new(BufWriter::new(File::create(path).with_context(
                    || format!("Failed to create {}", path.display()),
                )?)),
                None => Box::new(BufWriter::new(io::stdout().lock())),
            };
            let mut rows = 0;
            for path in &fasta {
                rows += fasta_to_table(path, &mut out)?;
            }
            out.flush()?;
            info!("{} rows from {} files", rows, fasta.len());
        }
    }
    Ok(())
}
