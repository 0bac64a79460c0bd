//! Main entry point for gene-reads.
//!
//! Loads gene, reference length, contig and per-read tables into a SQLite
//! store and rarefies per-ecotype gene coverage across sampling stations.

mod cli;
mod config;
mod coverage_table;
mod database;
mod import;
mod io;
mod rarefaction;
mod utils;
use cli::{run_cli, Cli};

use anyhow::Result;
use clap::Parser;
use log::{debug, LevelFilter};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG takes precedence over the default level
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
    debug!("{:?}", cli);

    run_cli(cli)
}
