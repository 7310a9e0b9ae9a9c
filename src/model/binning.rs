//! Feature binning
//!
//! Every feature column is mapped once onto small integer bins. Integer
//! columns keep their ordering: bin `b` holds values up to `edges[b]`.
//! Categorical columns get one bin per level seen at fit time, in label
//! order. Missing values, and levels never seen at fit time, land in
//! [`MISSING_BIN`] so the trees can route them separately.

use crate::error::PipelineError;
use crate::features::{FeatureTable, FeatureValue};
use std::collections::{BTreeMap, BTreeSet};

/// Bin of a missing or unknown value
pub const MISSING_BIN: u16 = u16::MAX;

/// Upper bound on bins per column
pub const MAX_BINS: usize = MISSING_BIN as usize;

#[derive(Debug, Clone, PartialEq)]
enum ColumnBins {
    /// Inclusive upper edge of each bin, ascending
    Ordered { edges: Vec<i64> },
    Categorical { levels: BTreeMap<String, u16> },
}

impl ColumnBins {
    fn len(&self) -> usize {
        match self {
            ColumnBins::Ordered { edges } => edges.len(),
            ColumnBins::Categorical { levels } => levels.len(),
        }
    }

    fn bin(&self, value: FeatureValue<'_>) -> Result<u16, String> {
        match (self, value) {
            (_, FeatureValue::Missing) => Ok(MISSING_BIN),
            (ColumnBins::Ordered { edges }, FeatureValue::Integer(v)) => {
                if edges.is_empty() {
                    return Ok(MISSING_BIN);
                }
                // Values above the last edge share the last bin
                let idx = edges.partition_point(|edge| *edge < v).min(edges.len() - 1);
                Ok(idx as u16)
            }
            (ColumnBins::Categorical { levels }, FeatureValue::Category(label)) => {
                Ok(levels.get(label).copied().unwrap_or(MISSING_BIN))
            }
            _ => Err("unexpected value type".to_string()),
        }
    }
}

/// Per-column bin layout learned from a training table
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBinner {
    names: Vec<String>,
    columns: Vec<ColumnBins>,
}

impl FeatureBinner {
    /// Learn bin edges and categorical levels from a (training) table.
    ///
    /// Integer columns with more than `max_bins` distinct values are cut at
    /// evenly spaced ranks of their distinct values.
    pub fn fit(table: &FeatureTable, max_bins: usize) -> Result<Self, PipelineError> {
        let max_bins = max_bins.clamp(2, MAX_BINS);
        let mut names = Vec::with_capacity(table.columns().len());
        let mut columns = Vec::with_capacity(table.columns().len());

        for (column, name) in table.columns().iter().enumerate() {
            let bins = if table.categorical_columns().contains(name) {
                let labels: BTreeSet<&str> = (0..table.len())
                    .filter_map(|row| match table.value(row, column) {
                        Some(FeatureValue::Category(label)) => Some(label),
                        _ => None,
                    })
                    .collect();
                if labels.len() > MAX_BINS {
                    return Err(PipelineError::ModelError(format!(
                        "column '{}' has {} levels, at most {} are supported",
                        name,
                        labels.len(),
                        MAX_BINS
                    )));
                }
                let levels = labels
                    .into_iter()
                    .enumerate()
                    .map(|(idx, label)| (label.to_string(), idx as u16))
                    .collect();
                ColumnBins::Categorical { levels }
            } else {
                let distinct: Vec<i64> = (0..table.len())
                    .filter_map(|row| match table.value(row, column) {
                        Some(FeatureValue::Integer(v)) => Some(v),
                        _ => None,
                    })
                    .collect::<BTreeSet<i64>>()
                    .into_iter()
                    .collect();
                ColumnBins::Ordered {
                    edges: ordered_edges(&distinct, max_bins),
                }
            };

            names.push(name.to_string());
            columns.push(bins);
        }

        Ok(Self { names, columns })
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn name(&self, column: usize) -> &str {
        &self.names[column]
    }

    /// Number of regular bins of a column ([`MISSING_BIN`] excluded)
    pub fn n_bins(&self, column: usize) -> usize {
        self.columns[column].len()
    }

    pub fn is_categorical(&self, column: usize) -> bool {
        matches!(self.columns[column], ColumnBins::Categorical { .. })
    }

    /// Total regular bins over all columns
    pub fn total_bins(&self) -> usize {
        self.columns.iter().map(ColumnBins::len).sum()
    }

    /// Bin every cell of a table, column-major
    pub fn transform(&self, table: &FeatureTable) -> Result<BinnedColumns, PipelineError> {
        let mut columns = Vec::with_capacity(self.columns.len());

        for (column, bins) in self.columns.iter().enumerate() {
            let mut binned = Vec::with_capacity(table.len());
            for row in 0..table.len() {
                let value = table.value(row, column).unwrap_or(FeatureValue::Missing);
                let bin = bins.bin(value).map_err(|e| {
                    PipelineError::ModelError(format!(
                        "{} in column '{}' at row {}",
                        e, self.names[column], row
                    ))
                })?;
                binned.push(bin);
            }
            columns.push(binned);
        }

        Ok(BinnedColumns {
            rows: table.len(),
            columns,
        })
    }
}

fn ordered_edges(distinct: &[i64], max_bins: usize) -> Vec<i64> {
    if distinct.len() <= max_bins {
        return distinct.to_vec();
    }
    let mut edges: Vec<i64> = (1..=max_bins)
        .map(|i| distinct[i * distinct.len() / max_bins - 1])
        .collect();
    edges.dedup();
    edges
}

/// Binned feature table, one `Vec<u16>` per column
#[derive(Debug, Clone, PartialEq)]
pub struct BinnedColumns {
    rows: usize,
    columns: Vec<Vec<u16>>,
}

impl BinnedColumns {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn column(&self, column: usize) -> &[u16] {
        &self.columns[column]
    }

    pub fn bin(&self, row: usize, column: usize) -> u16 {
        self.columns[column][row]
    }
}
