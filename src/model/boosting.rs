//! Gradient-boosted trees for binary classification (logistic loss).

use super::tree::{RegressionTree, TreeParams};
use crate::config::BoostingConfig;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedClassifier {
    pub n_features: usize,
    /// Log-odds of the positive class before any tree is applied
    pub base_margin: f64,
    pub learning_rate: f64,
    pub trees: Vec<RegressionTree>,
}

impl GradientBoostedClassifier {
    /// Fit on rows of `x` (already scaled) against boolean labels.
    ///
    /// Each round fits a tree to the residuals `y - p` and sets leaf weights with a
    /// Newton step `Σg / (Σh + λ)`, where `h = p(1 - p)`.
    pub fn fit(x: &Array2<f64>, y: &[bool], config: &BoostingConfig) -> Option<Self> {
        let n = x.nrows();
        if n == 0 || n != y.len() {
            return None;
        }
        let target: Vec<f64> = y.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect();
        let prior = (target.iter().sum::<f64>() / n as f64).clamp(1e-6, 1.0 - 1e-6);
        let base_margin = (prior / (1.0 - prior)).ln();
        let params = TreeParams {
            max_depth: config.max_depth,
            min_samples_split: 2,
            min_samples_leaf: 1,
        };
        let rows: Vec<usize> = (0..n).collect();
        let mut margins = vec![base_margin; n];
        let mut trees = Vec::with_capacity(config.n_rounds);

        for _ in 0..config.n_rounds {
            let probs: Vec<f64> = margins.iter().map(|&m| sigmoid(m)).collect();
            let grad: Vec<f64> = target.iter().zip(&probs).map(|(t, p)| t - p).collect();
            let hess: Vec<f64> = probs.iter().map(|p| p * (1.0 - p)).collect();
            let lambda = config.lambda;
            let tree = RegressionTree::fit(x, &grad, &rows, &params, |leaf_rows| {
                let g: f64 = leaf_rows.iter().map(|&i| grad[i]).sum();
                let h: f64 = leaf_rows.iter().map(|&i| hess[i]).sum();
                g / (h + lambda).max(1e-12)
            });
            for (i, m) in margins.iter_mut().enumerate() {
                *m += config.learning_rate * tree.predict(&x.row(i).to_vec());
            }
            trees.push(tree);
        }

        Some(Self {
            n_features: x.ncols(),
            base_margin,
            learning_rate: config.learning_rate,
            trees,
        })
    }

    pub fn margin(&self, x: &[f64]) -> f64 {
        self.base_margin
            + self.learning_rate * self.trees.iter().map(|t| t.predict(x)).sum::<f64>()
    }

    /// Probability of the positive (churned) class, in `[0, 1]`.
    pub fn predict_proba(&self, x: &[f64]) -> f64 {
        sigmoid(self.margin(x))
    }

    /// Normalised split gain per feature.
    pub fn feature_importance(&self) -> Vec<f64> {
        normalised_gains(&self.trees, self.n_features)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.base_margin.is_finite() || !self.learning_rate.is_finite() {
            return Err("non-finite base margin or learning rate".into());
        }
        for (i, t) in self.trees.iter().enumerate() {
            t.validate(self.n_features)
                .map_err(|e| format!("tree {i}: {e}"))?;
        }
        Ok(())
    }
}

pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

pub(crate) fn normalised_gains(trees: &[RegressionTree], n_features: usize) -> Vec<f64> {
    let mut total = vec![0.0; n_features];
    for t in trees {
        for (slot, g) in total.iter_mut().zip(t.feature_gains(n_features)) {
            *slot += g;
        }
    }
    let sum: f64 = total.iter().sum();
    if sum > 0.0 {
        total.iter_mut().for_each(|g| *g /= sum);
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn separable() -> (Array2<f64>, Vec<bool>) {
        let mut data = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40 {
            let v = i as f64 / 10.0 - 2.0;
            data.extend_from_slice(&[v, 0.5]);
            labels.push(v < 0.0);
        }
        (Array2::from_shape_vec((40, 2), data).unwrap(), labels)
    }

    #[test]
    fn learns_threshold() {
        let (x, y) = separable();
        let model = GradientBoostedClassifier::fit(&x, &y, &BoostingConfig::default()).unwrap();
        assert!(model.predict_proba(&[-1.5, 0.5]) > 0.9);
        assert!(model.predict_proba(&[1.5, 0.5]) < 0.1);
        assert!(model.validate().is_ok());
        let imp = model.feature_importance();
        assert!(imp[0] > 0.99);
        assert_eq!(imp[1], 0.0);
    }

    #[test]
    fn probabilities_stay_in_unit_interval() {
        let model = GradientBoostedClassifier {
            n_features: 1,
            base_margin: 500.0,
            learning_rate: 0.1,
            trees: vec![RegressionTree::leaf(1e4)],
        };
        let p = model.predict_proba(&[0.0]);
        assert!((0.0..=1.0).contains(&p));
        assert_eq!(sigmoid(-800.0), 0.0);
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn rejects_mismatched_labels() {
        let (x, _) = separable();
        assert!(GradientBoostedClassifier::fit(&x, &[true], &BoostingConfig::default()).is_none());
    }
}
