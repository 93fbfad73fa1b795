//! Feature contract shared by all three models.

mod pipeline;
mod record;

pub use pipeline::{FeatureExtractor, FeatureLayout};
pub use record::{FieldValue, UserFeatureVector, FEATURE_NAMES};

use serde::{Deserialize, Serialize};

/// Ordered numeric vector for one model's layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub layout: FeatureLayout,
    pub values: Vec<f64>,
}

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}
