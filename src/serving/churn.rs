//! Churn predictor: boosted-tree probability mapped onto a risk tier.

use super::{check_dim, load_scaler, Predictor};
use crate::config::ChurnConfig;
use crate::error::{ArtifactError, InferenceError};
use crate::features::{FeatureExtractor, FeatureLayout, UserFeatureVector};
use crate::model::artifact::MODEL_FILE;
use crate::model::{ArtifactReader, GradientBoostedClassifier, StandardScaler};
use crate::risk::{ChurnAssessment, RiskEngine};
use std::path::Path;

/// Boosted-tree churn classifier over the full ten-field layout.
#[derive(Debug)]
pub struct ChurnModel {
    extractor: FeatureExtractor,
    scaler: StandardScaler,
    classifier: GradientBoostedClassifier,
    engine: RiskEngine,
}

impl ChurnModel {
    pub const LAYOUT: FeatureLayout = FeatureLayout::Full;

    pub fn new(
        scaler: StandardScaler,
        classifier: GradientBoostedClassifier,
        config: ChurnConfig,
    ) -> Result<Self, String> {
        classifier.validate()?;
        if scaler.dim() != Self::LAYOUT.dim() || classifier.n_features != Self::LAYOUT.dim() {
            return Err(format!(
                "scaler has {} features and classifier {}, expected {}",
                scaler.dim(),
                classifier.n_features,
                Self::LAYOUT.dim()
            ));
        }
        Ok(Self {
            extractor: FeatureExtractor::new(Self::LAYOUT),
            scaler,
            classifier,
            engine: RiskEngine::new(config),
        })
    }

    pub fn load(dir: &Path, config: ChurnConfig) -> Result<Self, ArtifactError> {
        let reader = ArtifactReader::open(dir)?;
        let scaler = load_scaler(&reader, Self::LAYOUT)?;
        let classifier: GradientBoostedClassifier = reader.read_json(MODEL_FILE)?;
        let path = dir.join(MODEL_FILE);
        check_dim(&path, "classifier", classifier.n_features, Self::LAYOUT)?;
        Self::new(scaler, classifier, config).map_err(|reason| ArtifactError::invalid(path, reason))
    }

    /// Raw probability of churn, before thresholding.
    pub fn probability(&self, record: &UserFeatureVector) -> Result<f64, InferenceError> {
        let fv = self.extractor.extract(record);
        let scaled = self.scaler.transform(fv.as_slice())?;
        let p = self.classifier.predict_proba(&scaled);
        if !p.is_finite() {
            return Err(InferenceError::NonFinite("churn classifier"));
        }
        Ok(p.clamp(0.0, 1.0))
    }
}

impl Predictor for ChurnModel {
    type Output = ChurnAssessment;

    fn name(&self) -> &'static str {
        "churn"
    }

    fn predict(&self, record: &UserFeatureVector) -> Result<ChurnAssessment, InferenceError> {
        let assessment = self.engine.assess(self.probability(record)?);
        tracing::debug!(
            probability = assessment.churn_probability,
            risk_level = %assessment.risk_level,
            "churn prediction"
        );
        Ok(assessment)
    }
}
