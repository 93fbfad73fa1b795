//! Random forest regressor: bootstrap-sampled regression trees, averaged.

use super::boosting::normalised_gains;
use super::tree::{mean_of, RegressionTree, TreeParams};
use crate::config::ForestConfig;
use ndarray::Array2;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    pub n_features: usize,
    pub trees: Vec<RegressionTree>,
}

impl RandomForestRegressor {
    pub fn fit<R: Rng>(
        x: &Array2<f64>,
        y: &[f64],
        config: &ForestConfig,
        rng: &mut R,
    ) -> Option<Self> {
        let n = x.nrows();
        if n == 0 || n != y.len() || config.n_trees == 0 {
            return None;
        }
        let params = TreeParams {
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            min_samples_leaf: 1,
        };
        let trees = (0..config.n_trees)
            .map(|_| {
                let rows: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit(x, y, &rows, &params, |leaf_rows| mean_of(y, leaf_rows))
            })
            .collect();
        Some(Self {
            n_features: x.ncols(),
            trees,
        })
    }

    /// Mean of the tree outputs. Not constrained to be non-negative.
    pub fn predict(&self, x: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(|t| t.predict(x)).sum::<f64>() / self.trees.len() as f64
    }

    pub fn feature_importance(&self) -> Vec<f64> {
        normalised_gains(&self.trees, self.n_features)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".into());
        }
        for (i, t) in self.trees.iter().enumerate() {
            t.validate(self.n_features)
                .map_err(|e| format!("tree {i}: {e}"))?;
        }
        Ok(())
    }
}
