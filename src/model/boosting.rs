//! Gradient boosted regression trees
//!
//! Squared-error boosting: start from the target mean, then repeatedly grow
//! a depth-limited histogram tree on the current residuals and add its
//! shrunken prediction to the ensemble. The training table is binned once
//! and every round reuses the same bins.

use super::binning::{BinnedColumns, FeatureBinner};
use super::tree::HistogramTree;
use super::{BoostingParams, Regressor};
use crate::error::PipelineError;
use crate::features::FeatureTable;
use tracing::{debug, info};

/// Boosted trees regressor with native categorical and missing-value splits
pub struct GradientBoostedTrees {
    params: BoostingParams,
    binner: Option<FeatureBinner>,
    base_score: f64,
    trees: Vec<HistogramTree>,
}

impl Default for GradientBoostedTrees {
    fn default() -> Self {
        Self::new(BoostingParams::default())
    }
}

impl GradientBoostedTrees {
    pub fn new(params: BoostingParams) -> Self {
        Self {
            params,
            binner: None,
            base_score: 0.0,
            trees: Vec::new(),
        }
    }

    /// Number of fitted trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn is_fitted(&self) -> bool {
        self.binner.is_some()
    }

    fn ensemble_predict(&self, data: &BinnedColumns) -> Vec<f64> {
        let mut predictions = vec![self.base_score; data.rows()];
        for tree in &self.trees {
            for (row, p) in predictions.iter_mut().enumerate() {
                *p += self.params.learning_rate * tree.predict_row(data, row);
            }
        }
        predictions
    }
}

impl Regressor for GradientBoostedTrees {
    fn fit(&mut self, features: &FeatureTable, target: &[f64]) -> Result<(), PipelineError> {
        self.params.validate()?;

        if features.is_empty() {
            return Err(PipelineError::ModelError(
                "cannot fit on an empty feature table".to_string(),
            ));
        }
        if features.len() != target.len() {
            return Err(PipelineError::ModelError(format!(
                "feature and target count mismatch: {} rows, {} targets",
                features.len(),
                target.len()
            )));
        }
        if let Some(idx) = target.iter().position(|y| !y.is_finite()) {
            return Err(PipelineError::ModelError(format!(
                "non-finite target at row {}",
                idx
            )));
        }

        let binner = FeatureBinner::fit(features, self.params.max_bins)?;
        let data = binner.transform(features)?;
        let base_score = target.iter().sum::<f64>() / target.len() as f64;
        let tree_params = self.params.tree_params();
        let mut fitted = vec![base_score; target.len()];
        let mut residuals = vec![0.0; target.len()];
        let mut trees = Vec::with_capacity(self.params.n_estimators);

        info!(
            rows = features.len(),
            bins = binner.total_bins(),
            missing_weather = features.missing_weather_rows(),
            n_estimators = self.params.n_estimators,
            learning_rate = self.params.learning_rate,
            "Fitting boosted trees"
        );

        for round in 0..self.params.n_estimators {
            for ((r, y), f) in residuals.iter_mut().zip(target).zip(&fitted) {
                *r = y - f;
            }

            let tree = HistogramTree::grow(&binner, &data, &residuals, &tree_params);
            for (row, f) in fitted.iter_mut().enumerate() {
                *f += self.params.learning_rate * tree.predict_row(&data, row);
            }
            trees.push(tree);

            if (round + 1) % 100 == 0 {
                debug!(round = round + 1, "Boosting progress");
            }
        }

        self.binner = Some(binner);
        self.base_score = base_score;
        self.trees = trees;
        Ok(())
    }

    fn predict(&self, features: &FeatureTable) -> Result<Vec<f64>, PipelineError> {
        let binner = self
            .binner
            .as_ref()
            .ok_or_else(|| PipelineError::ModelError("predict called before fit".to_string()))?;

        if features.is_empty() {
            return Ok(Vec::new());
        }

        let data = binner.transform(features)?;
        Ok(self.ensemble_predict(&data))
    }
}
