//! Run settings: defaults, an optional JSON file, then command-line overrides.

use crate::database::GeneReadsDb;
use crate::rarefaction::DEFAULT_DEPTHS;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Batch size must be between 1 and {max}, got {value}")]
    BatchSize { value: usize, max: usize },

    #[error("At least one rarefaction depth is required")]
    NoDepths,

    #[error("Rarefaction depths must be positive")]
    ZeroDepth,

    #[error("No database given; use --db, GENE_READS_DB or the config file")]
    MissingDatabase,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub database: Option<PathBuf>,
    pub batch_size: usize,
    pub depths: Vec<usize>,
    pub output_dir: PathBuf,
    /// `0` leaves the choice to rayon.
    pub threads: usize,
    pub seed: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database: None,
            batch_size: GeneReadsDb::DEFAULT_BATCH_SIZE,
            depths: DEFAULT_DEPTHS.to_vec(),
            output_dir: PathBuf::from("."),
            threads: 0,
            seed: None,
        }
    }
}

impl Settings {
    /// Defaults, overlaid with `path` when given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Settings::default());
        };
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Checks bounds and normalises the depth list (sorted, no repeats).
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        if self.batch_size == 0 || self.batch_size > GeneReadsDb::MAX_BATCH_SIZE {
            return Err(ConfigError::BatchSize {
                value: self.batch_size,
                max: GeneReadsDb::MAX_BATCH_SIZE,
            });
        }
        if self.depths.is_empty() {
            return Err(ConfigError::NoDepths);
        }
        if self.depths.contains(&0) {
            return Err(ConfigError::ZeroDepth);
        }
        self.depths.sort_unstable();
        self.depths.dedup();
        Ok(self)
    }

    pub fn database_path(&self) -> Result<&Path, ConfigError> {
        self.database.as_deref().ok_or(ConfigError::MissingDatabase)
    }
}
