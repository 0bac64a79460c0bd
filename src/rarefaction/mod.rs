//! Rarefied per-gene coverage.
//!
//! For every sampling depth, replicate and station, a fixed number of reads
//! is drawn uniformly without replacement. Sampled read lengths are summed
//! per gene and divided by the gene's reference length. Stations with fewer
//! reads than the depth are zero-filled.
//!
//! The computation is a pure function of its input tables and a seed. Each
//! `(depth, replicate, station)` task gets its own RNG stream, so results do
//! not depend on the number of threads.

pub mod run;

use crate::coverage_table::CoverageTable;
use crate::database::EcotypeRead;
use indexmap::IndexMap;
use itertools::iproduct;
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::collections::HashMap;

/// Number of reads drawn per station, by default.
pub const DEFAULT_DEPTHS: &[usize] = &[10_000, 25_000, 50_000, 75_000, 100_000];

/// Coverage values are rounded to this many decimal digits.
pub const COVERAGE_DECIMALS: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadHit {
    pub gene_id: i64,
    pub read_length: u32,
}

/// All reads of one station.
#[derive(Debug, Clone)]
pub struct StationReads {
    pub station_id: i64,
    pub name: String,
    pub reads: Vec<ReadHit>,
}

/// In-memory tables for one ecotype.
#[derive(Debug, Clone, Default)]
pub struct RarefactionInput {
    /// `gene_id -> reference length`, in output row order.
    pub gene_lengths: IndexMap<i64, u32>,
    /// Stations in output column order.
    pub stations: Vec<StationReads>,
}

impl RarefactionInput {
    /// Groups reads by station. Every station is kept, including those
    /// without reads; reads of unknown stations are dropped.
    pub fn from_rows(
        gene_lengths: IndexMap<i64, u32>,
        stations: Vec<(i64, String)>,
        reads: impl IntoIterator<Item = EcotypeRead>,
    ) -> Self {
        let column: HashMap<i64, usize> = stations
            .iter()
            .enumerate()
            .map(|(i, (id, _))| (*id, i))
            .collect();
        let mut stations: Vec<StationReads> = stations
            .into_iter()
            .map(|(station_id, name)| StationReads {
                station_id,
                name,
                reads: Vec::new(),
            })
            .collect();

        let mut dropped = 0usize;
        for read in reads {
            match column.get(&read.station_id) {
                Some(&idx) => stations[idx].reads.push(ReadHit {
                    gene_id: read.gene_id,
                    read_length: read.read_length,
                }),
                None => dropped += 1,
            }
        }
        if dropped > 0 {
            warn!("Dropped {} reads of unknown stations", dropped);
        }

        RarefactionInput {
            gene_lengths,
            stations,
        }
    }

    pub fn total_reads(&self) -> usize {
        self.stations.iter().map(|s| s.reads.len()).sum()
    }
}

#[derive(Debug, Clone)]
pub struct RarefactionParams {
    pub depths: Vec<usize>,
    pub replicates: usize,
    pub seed: u64,
}

/// Coverage table for one `(depth, replicate)` pair.
#[derive(Debug, Clone)]
pub struct RarefiedTable {
    pub depth: usize,
    pub replicate: usize,
    pub table: CoverageTable,
    /// Stations zero-filled because they had fewer reads than `depth`.
    pub underfilled: Vec<String>,
}

/// Runs every `(depth, replicate, station)` task on the current rayon pool.
///
/// Tables come back ordered by depth, then replicate.
pub fn rarefy(input: &RarefactionInput, params: &RarefactionParams) -> Vec<RarefiedTable> {
    let tasks: Vec<(usize, usize, usize)> = iproduct!(
        0..params.depths.len(),
        0..params.replicates,
        0..input.stations.len()
    )
    .collect();
    debug!("Running {} rarefaction tasks", tasks.len());

    let columns: Vec<Option<Vec<f64>>> = tasks
        .par_iter()
        .map(|&(d, replicate, s)| {
            let station = &input.stations[s];
            let depth = params.depths[d];
            let mut rng =
                StdRng::seed_from_u64(task_seed(params.seed, depth, replicate, station.station_id));
            rarefy_station(&station.reads, depth, &input.gene_lengths, &mut rng)
        })
        .collect();

    let gene_ids: Vec<i64> = input.gene_lengths.keys().copied().collect();
    let names: Vec<String> = input.stations.iter().map(|s| s.name.clone()).collect();
    let mut tables: Vec<RarefiedTable> = iproduct!(params.depths.iter(), 0..params.replicates)
        .map(|(&depth, replicate)| RarefiedTable {
            depth,
            replicate,
            table: CoverageTable::zeros(gene_ids.clone(), names.clone()),
            underfilled: Vec::new(),
        })
        .collect();

    for ((d, replicate, s), column) in tasks.into_iter().zip(columns) {
        let target = &mut tables[d * params.replicates + replicate];
        match column {
            Some(values) => target.table.set_station_column(s, &values),
            None => target.underfilled.push(input.stations[s].name.clone()),
        }
    }
    tables
}

/// Coverage of every gene after drawing `depth` of `reads`.
///
/// Returns `None` when the station has fewer than `depth` reads.
pub fn rarefy_station<R: Rng + ?Sized>(
    reads: &[ReadHit],
    depth: usize,
    gene_lengths: &IndexMap<i64, u32>,
    rng: &mut R,
) -> Option<Vec<f64>> {
    if reads.len() < depth {
        return None;
    }

    let mut sums = vec![0u64; gene_lengths.len()];
    for idx in index::sample(rng, reads.len(), depth) {
        let hit = reads[idx];
        // Reads of genes without a length do not contribute.
        if let Some(row) = gene_lengths.get_index_of(&hit.gene_id) {
            sums[row] += u64::from(hit.read_length);
        }
    }

    Some(
        sums.iter()
            .zip(gene_lengths.values())
            .map(|(&sum, &length)| coverage(sum, length))
            .collect(),
    )
}

/// `sum / length` rounded to [`COVERAGE_DECIMALS`]; 0 for zero-length genes.
pub fn coverage(sum: u64, length: u32) -> f64 {
    if length == 0 {
        return 0.0;
    }
    round_decimals(sum as f64 / f64::from(length), COVERAGE_DECIMALS)
}

pub fn round_decimals(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Seed of one task's RNG stream.
pub fn task_seed(base: u64, depth: usize, replicate: usize, station_id: i64) -> u64 {
    [depth as u64, replicate as u64, station_id as u64]
        .iter()
        .fold(splitmix64(base), |acc, &v| splitmix64(acc ^ v))
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn hit(gene_id: i64, read_length: u32) -> ReadHit {
        ReadHit {
            gene_id,
            read_length,
        }
    }

    fn lengths(pairs: &[(i64, u32)]) -> IndexMap<i64, u32> {
        pairs.iter().copied().collect()
    }

    fn sample_input() -> RarefactionInput {
        let reads = vec![
            EcotypeRead { gene_id: 1, station_id: 10, read_length: 50 },
            EcotypeRead { gene_id: 1, station_id: 10, read_length: 50 },
            EcotypeRead { gene_id: 2, station_id: 10, read_length: 100 },
            EcotypeRead { gene_id: 2, station_id: 20, read_length: 30 },
        ];
        RarefactionInput::from_rows(
            lengths(&[(1, 200), (2, 300), (3, 100)]),
            vec![(10, "ST10".into()), (20, "ST20".into()), (30, "ST30".into())],
            reads,
        )
    }

    #[test]
    fn test_from_rows_groups_by_station() {
        let input = sample_input();
        assert_eq!(input.stations.len(), 3);
        assert_eq!(input.stations[0].reads.len(), 3);
        assert_eq!(input.stations[1].reads.len(), 1);
        assert!(input.stations[2].reads.is_empty());
        assert_eq!(input.total_reads(), 4);
    }

    #[test]
    fn test_full_depth_uses_every_read() {
        let input = sample_input();
        let mut rng = StdRng::seed_from_u64(1);
        let column =
            rarefy_station(&input.stations[0].reads, 3, &input.gene_lengths, &mut rng).unwrap();
        assert_relative_eq!(column[0], 0.5);
        assert_relative_eq!(column[1], 0.3333);
        assert_relative_eq!(column[2], 0.0);
    }

    #[test]
    fn test_underfilled_station_returns_none() {
        let mut rng = StdRng::seed_from_u64(1);
        let reads = vec![hit(1, 10)];
        assert!(rarefy_station(&reads, 2, &lengths(&[(1, 10)]), &mut rng).is_none());
    }

    #[test]
    fn test_sample_size_is_exact() {
        let reads: Vec<ReadHit> = (0..100).map(|_| hit(1, 1)).collect();
        let gene_lengths = lengths(&[(1, 1)]);
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let column = rarefy_station(&reads, 37, &gene_lengths, &mut rng).unwrap();
            assert_relative_eq!(column[0], 37.0);
        }
    }

    #[test]
    fn test_unknown_genes_and_zero_lengths() {
        let reads = vec![hit(1, 10), hit(99, 10), hit(2, 10)];
        let gene_lengths = lengths(&[(1, 4), (2, 0)]);
        let mut rng = StdRng::seed_from_u64(3);
        let column = rarefy_station(&reads, 3, &gene_lengths, &mut rng).unwrap();
        assert_eq!(column, vec![2.5, 0.0]);
    }

    #[test]
    fn test_rounding() {
        assert_relative_eq!(coverage(2, 3), 0.6667);
        assert_relative_eq!(coverage(1, 8), 0.125);
        assert_relative_eq!(round_decimals(1.23456, 4), 1.2346);
    }

    #[test]
    fn test_ties_round_away_from_zero() {
        // 1/32 = 0.03125 is exact, so the tie is exact at 4 decimals
        assert_eq!(coverage(1, 32), 0.0313);
        assert_eq!(round_decimals(0.125, 2), 0.13);
        assert_eq!(round_decimals(-0.125, 2), -0.13);
    }

    #[test]
    fn test_rarefy_tables_and_zero_fill() {
        let input = sample_input();
        let params = RarefactionParams {
            depths: vec![1, 3],
            replicates: 2,
            seed: 42,
        };
        let tables = rarefy(&input, &params);
        assert_eq!(tables.len(), 4);
        assert_eq!(
            tables.iter().map(|t| (t.depth, t.replicate)).collect::<Vec<_>>(),
            vec![(1, 0), (1, 1), (3, 0), (3, 1)]
        );

        // depth 1: only the empty station is zero-filled
        assert_eq!(tables[0].underfilled, vec!["ST30".to_string()]);
        // depth 3: ST20 has a single read
        assert_eq!(tables[2].underfilled, vec!["ST20".to_string(), "ST30".to_string()]);

        let st10 = tables[2].table.station_coverage("ST10").unwrap();
        assert_relative_eq!(st10[0], 0.5);
        assert_relative_eq!(st10[1], 0.3333);
        let st20 = tables[2].table.station_coverage("ST20").unwrap();
        assert!(st20.iter().all(|&v| v == 0.0));

        let st20_depth1 = tables[0].table.station_coverage("ST20").unwrap();
        assert_relative_eq!(st20_depth1[1], 0.1);
    }

    #[test]
    fn test_rarefy_is_reproducible_across_thread_counts() {
        let reads: Vec<EcotypeRead> = (0..500)
            .map(|i| EcotypeRead {
                gene_id: i % 7,
                station_id: i % 3,
                read_length: (i % 11) as u32 + 1,
            })
            .collect();
        let input = RarefactionInput::from_rows(
            (0..7).map(|g| (g, 50)).collect(),
            vec![(0, "A".into()), (1, "B".into()), (2, "C".into())],
            reads,
        );
        let params = RarefactionParams {
            depths: vec![20, 100],
            replicates: 3,
            seed: 7,
        };

        let run = |threads| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .unwrap()
                .install(|| rarefy(&input, &params))
        };
        let single = run(1);
        let many = run(4);
        for (a, b) in single.iter().zip(many.iter()) {
            assert_eq!(a.table.coverage_matrix(), b.table.coverage_matrix());
        }
        // replicates draw different samples
        assert_ne!(single[0].table.coverage_matrix(), single[1].table.coverage_matrix());
    }

    #[test]
    fn test_task_seeds_differ() {
        let a = task_seed(1, 100, 0, 5);
        assert_eq!(a, task_seed(1, 100, 0, 5));
        assert_ne!(a, task_seed(1, 100, 1, 5));
        assert_ne!(a, task_seed(1, 100, 0, 6));
        assert_ne!(a, task_seed(2, 100, 0, 5));
    }
}
