//! Feature extraction: validated record → ordered vector for a given model layout.

use super::{FeatureVector, UserFeatureVector, FEATURE_NAMES};
use serde::{Deserialize, Serialize};

/// Field subset and order a model was fitted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureLayout {
    /// All ten fields in canonical order (churn, segmentation)
    Full,
    /// Canonical order without `total_events`, which is the forecasting target
    Forecast,
}

impl FeatureLayout {
    pub fn names(self) -> &'static [&'static str] {
        match self {
            FeatureLayout::Full => &FEATURE_NAMES,
            FeatureLayout::Forecast => &FEATURE_NAMES[1..],
        }
    }

    pub fn dim(self) -> usize {
        self.names().len()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FeatureExtractor {
    layout: FeatureLayout,
}

impl FeatureExtractor {
    pub fn new(layout: FeatureLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> FeatureLayout {
        self.layout
    }

    pub fn extract(&self, record: &UserFeatureVector) -> FeatureVector {
        let all = record.to_array();
        let values = match self.layout {
            FeatureLayout::Full => all.to_vec(),
            FeatureLayout::Forecast => all[1..].to_vec(),
        };
        FeatureVector {
            layout: self.layout,
            values,
        }
    }

    /// Row-major matrix of extracted vectors, one row per record.
    pub fn extract_matrix(&self, records: &[UserFeatureVector]) -> ndarray::Array2<f64> {
        let dim = self.layout.dim();
        let mut m = ndarray::Array2::zeros((records.len(), dim));
        for (mut row, rec) in m.outer_iter_mut().zip(records) {
            let fv = self.extract(rec);
            row.iter_mut()
                .zip(fv.values)
                .for_each(|(slot, v)| *slot = v);
        }
        m
    }
}
