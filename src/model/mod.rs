//! Regressor boundary
//!
//! The pipeline only relies on the [`Regressor`] contract: fit on a feature
//! table against a numeric target, then predict one value per row of another
//! table. Implementations must be deterministic for fixed inputs and
//! parameters, and must honour the table's categorical columns rather than
//! treating identifiers as numbers.

mod binning;
mod boosting;
mod tree;

pub use binning::{BinnedColumns, FeatureBinner, MAX_BINS, MISSING_BIN};
pub use boosting::GradientBoostedTrees;
pub use tree::{HistogramTree, TreeParams};

use crate::error::PipelineError;
use crate::features::FeatureTable;
use serde::{Deserialize, Serialize};

/// Contract of the external regressor.
///
/// Feature tables may contain missing weather flags for hours outside the
/// weather coverage. Implementations must accept them: the built-in
/// [`GradientBoostedTrees`] routes missing cells down a learned default
/// branch. Only a non-finite target or a table/target shape mismatch is a
/// fit error.
pub trait Regressor {
    /// Fit on a feature table and its target vector
    fn fit(&mut self, features: &FeatureTable, target: &[f64]) -> Result<(), PipelineError>;

    /// Predict one value per row, in row order
    fn predict(&self, features: &FeatureTable) -> Result<Vec<f64>, PipelineError>;
}

/// Boosted trees configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingParams {
    /// Shrinkage applied to every tree
    pub learning_rate: f64,
    /// Number of boosting rounds
    pub n_estimators: usize,
    pub max_depth: u16,
    pub min_samples_leaf: usize,
    pub min_samples_split: usize,
    /// L2 penalty on leaf values
    pub l2_regularization: f64,
    /// Bins per integer column before ranks are merged
    pub max_bins: usize,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.2,
            n_estimators: 900,
            max_depth: 6,
            min_samples_leaf: 1,
            min_samples_split: 2,
            l2_regularization: 1.0,
            max_bins: 255,
        }
    }
}

impl BoostingParams {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(PipelineError::ConfigError(format!(
                "learning_rate must be in (0, 1], got {}",
                self.learning_rate
            )));
        }
        if self.n_estimators == 0 {
            return Err(PipelineError::ConfigError(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if self.max_depth == 0 {
            return Err(PipelineError::ConfigError(
                "max_depth must be at least 1".to_string(),
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(PipelineError::ConfigError(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        if !(self.l2_regularization >= 0.0 && self.l2_regularization.is_finite()) {
            return Err(PipelineError::ConfigError(format!(
                "l2_regularization must be a non-negative number, got {}",
                self.l2_regularization
            )));
        }
        if !(2..=MAX_BINS).contains(&self.max_bins) {
            return Err(PipelineError::ConfigError(format!(
                "max_bins must be in 2..={}, got {}",
                MAX_BINS, self.max_bins
            )));
        }
        Ok(())
    }

    pub(crate) fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: usize::from(self.max_depth),
            min_samples_leaf: self.min_samples_leaf,
            min_samples_split: self.min_samples_split,
            l2_regularization: self.l2_regularization,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_are_valid() {
        assert!(BoostingParams::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_params() {
        let params = BoostingParams {
            learning_rate: 0.0,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = BoostingParams {
            n_estimators: 0,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = BoostingParams {
            l2_regularization: -1.0,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = BoostingParams {
            max_bins: 1,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }
}
