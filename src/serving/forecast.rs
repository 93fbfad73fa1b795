//! Activity forecast: random-forest regression, clamped at zero events.

use super::{check_dim, load_scaler, Predictor};
use crate::error::{ArtifactError, InferenceError};
use crate::features::{FeatureExtractor, FeatureLayout, UserFeatureVector};
use crate::model::artifact::MODEL_FILE;
use crate::model::{ArtifactReader, RandomForestRegressor, StandardScaler};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    /// Never negative
    pub predicted_events: f64,
}

/// Random-forest forecast of lifetime `total_events` from the nine recent-activity fields.
#[derive(Debug)]
pub struct ForecastModel {
    extractor: FeatureExtractor,
    scaler: StandardScaler,
    forest: RandomForestRegressor,
}

impl ForecastModel {
    pub const LAYOUT: FeatureLayout = FeatureLayout::Forecast;

    pub fn new(scaler: StandardScaler, forest: RandomForestRegressor) -> Result<Self, String> {
        forest.validate()?;
        if scaler.dim() != Self::LAYOUT.dim() || forest.n_features != Self::LAYOUT.dim() {
            return Err(format!(
                "scaler has {} features and forest {}, expected {}",
                scaler.dim(),
                forest.n_features,
                Self::LAYOUT.dim()
            ));
        }
        Ok(Self {
            extractor: FeatureExtractor::new(Self::LAYOUT),
            scaler,
            forest,
        })
    }

    pub fn load(dir: &Path) -> Result<Self, ArtifactError> {
        let reader = ArtifactReader::open(dir)?;
        let scaler = load_scaler(&reader, Self::LAYOUT)?;
        let forest: RandomForestRegressor = reader.read_json(MODEL_FILE)?;
        let path = dir.join(MODEL_FILE);
        check_dim(&path, "forest", forest.n_features, Self::LAYOUT)?;
        Self::new(scaler, forest).map_err(|reason| ArtifactError::invalid(path, reason))
    }

    /// Unclamped regression output.
    pub fn raw_prediction(&self, record: &UserFeatureVector) -> Result<f64, InferenceError> {
        let fv = self.extractor.extract(record);
        let scaled = self.scaler.transform(fv.as_slice())?;
        let y = self.forest.predict(&scaled);
        if !y.is_finite() {
            return Err(InferenceError::NonFinite("forecast forest"));
        }
        Ok(y)
    }
}

impl Predictor for ForecastModel {
    type Output = Forecast;

    fn name(&self) -> &'static str {
        "forecast"
    }

    fn predict(&self, record: &UserFeatureVector) -> Result<Forecast, InferenceError> {
        let raw = self.raw_prediction(record)?;
        let predicted_events = raw.max(0.0);
        tracing::debug!(raw, predicted_events, "forecast prediction");
        Ok(Forecast { predicted_events })
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures;
    use super::*;

    #[test]
    fn negative_regression_is_clamped() {
        let model = fixtures::forecast(-12.5);
        let record = UserFeatureVector::default();
        assert_eq!(model.raw_prediction(&record).unwrap(), -12.5);
        assert_eq!(model.predict(&record).unwrap().predicted_events, 0.0);
    }

    #[test]
    fn positive_regression_passes_through() {
        let out = fixtures::forecast(42.0).predict(&UserFeatureVector::default()).unwrap();
        assert_eq!(out.predicted_events, 42.0);
    }

    #[test]
    fn full_layout_scaler_is_rejected() {
        let forest = RandomForestRegressor {
            n_features: 9,
            trees: vec![crate::model::RegressionTree::leaf(1.0)],
        };
        assert!(ForecastModel::new(fixtures::identity(FeatureLayout::Full), forest).is_err());
    }
}
