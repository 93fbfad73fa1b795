//! Per-feature standardization, fitted once at training time.

use crate::error::InferenceError;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Fitted `(mean, scale)` per feature. `transform` computes `(x - mean) / scale`.
///
/// Zero-variance features (or ones whose deviation is not finite) are stored with
/// a scale of `1.0`: they are centered but left unscaled, so no division by zero
/// can reach inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Self {
        let scale = scale.into_iter().map(guard_scale).collect();
        Self { mean, scale }
    }

    /// Population mean and standard deviation (ddof = 0) of each column.
    pub fn fit(samples: &Array2<f64>) -> Option<Self> {
        if samples.nrows() == 0 {
            return None;
        }
        let mean = samples.mean_axis(Axis(0))?;
        let std = samples.std_axis(Axis(0), 0.0);
        Some(Self::new(mean.to_vec(), std.to_vec()))
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, x: &[f64]) -> Result<Vec<f64>, InferenceError> {
        self.check_dim(x.len())?;
        Ok(x.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| (v - m) / s)
            .collect())
    }

    /// Recover raw units: `x * scale + mean`.
    pub fn inverse_transform(&self, x: &[f64]) -> Result<Vec<f64>, InferenceError> {
        self.check_dim(x.len())?;
        Ok(x.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| v * s + m)
            .collect())
    }

    pub fn transform_matrix(&self, samples: &Array2<f64>) -> Result<Array2<f64>, InferenceError> {
        self.check_dim(samples.ncols())?;
        let mut out = samples.clone();
        for mut row in out.outer_iter_mut() {
            for ((v, m), s) in row.iter_mut().zip(&self.mean).zip(&self.scale) {
                *v = (*v - m) / s;
            }
        }
        Ok(out)
    }

    /// Structural check used when loading a persisted scaler.
    pub fn validate(&self) -> Result<(), String> {
        if self.mean.len() != self.scale.len() {
            return Err(format!(
                "mean has {} entries but scale has {}",
                self.mean.len(),
                self.scale.len()
            ));
        }
        if self.mean.iter().any(|m| !m.is_finite()) {
            return Err("non-finite mean".into());
        }
        if self.scale.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err("scale entries must be finite and positive".into());
        }
        Ok(())
    }

    fn check_dim(&self, found: usize) -> Result<(), InferenceError> {
        if found != self.dim() {
            return Err(InferenceError::DimensionMismatch {
                expected: self.dim(),
                found,
            });
        }
        Ok(())
    }
}

fn guard_scale(s: f64) -> f64 {
    if s.is_finite() && s > 0.0 {
        s
    } else {
        1.0
    }
}
