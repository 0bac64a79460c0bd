//! Per-gene coverage values for each station.
//!
//! Rows are genes, columns are stations.

use ndarray::{Array1, Array2};

/// Represents a coverage table (genes x stations).
#[derive(Debug, Clone)]
pub struct CoverageTable {
    /// Coverage matrix, one row per gene and one column per station.
    pub coverage: Array2<f64>,
    pub gene_ids: Vec<i64>,
    pub stations: Vec<String>,
}

impl CoverageTable {
    /// Creates a zero-filled table.
    pub fn zeros(gene_ids: Vec<i64>, stations: Vec<String>) -> Self {
        CoverageTable {
            coverage: Array2::zeros((gene_ids.len(), stations.len())),
            gene_ids,
            stations,
        }
    }

    /// Replaces the coverage of station column `column`.
    ///
    /// `values` must hold one value per gene, in row order.
    pub fn set_station_column(&mut self, column: usize, values: &[f64]) {
        self.coverage
            .column_mut(column)
            .assign(&Array1::from(values.to_vec()));
    }

    /// Returns the dimensions of the table (genes, stations).
    pub fn dimensions(&self) -> (usize, usize) {
        self.coverage.dim()
    }

    pub fn coverage_matrix(&self) -> &Array2<f64> {
        &self.coverage
    }

    pub fn gene_ids(&self) -> &[i64] {
        &self.gene_ids
    }

    pub fn stations(&self) -> &[String] {
        &self.stations
    }

    /// Number of genes with non-zero coverage in at least one station.
    pub fn covered_genes(&self) -> usize {
        self.coverage
            .rows()
            .into_iter()
            .filter(|row| row.iter().any(|&v| v > 0.0))
            .count()
    }
}

#[cfg(test)]
impl CoverageTable {
    /// Column of `station`, looked up by name.
    pub fn station_coverage(&self, station: &str) -> Option<ndarray::ArrayView1<'_, f64>> {
        let idx = self.stations.iter().position(|s| s == station)?;
        Some(self.coverage.column(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros() {
        let table = CoverageTable::zeros(vec![1, 2, 3], vec!["A".into(), "B".into()]);
        assert_eq!(table.dimensions(), (3, 2));
        assert_eq!(table.covered_genes(), 0);
        assert!(table.coverage_matrix().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_set_and_lookup_columns() {
        let mut table = CoverageTable::zeros(vec![10, 20], vec!["A".into(), "B".into()]);
        table.set_station_column(0, &[0.25, 0.0]);
        table.set_station_column(1, &[0.0, 0.0]);

        let a = table.station_coverage("A").unwrap();
        assert_eq!(a.to_vec(), vec![0.25, 0.0]);
        assert_eq!(table.coverage_matrix().row(0).to_vec(), vec![0.25, 0.0]);
        assert!(table.station_coverage("C").is_none());
        assert_eq!(table.covered_genes(), 1);
    }
}
