//! Loaded predictors. `Models` is built once at startup and shared read-only;
//! every prediction is a pure function of the input record and the artifacts.

mod churn;
mod forecast;
mod segment;

pub use churn::ChurnModel;
pub use forecast::{Forecast, ForecastModel};
pub use segment::{SegmentAssignment, SegmentModel};

use crate::config::ServiceConfig;
use crate::error::{ArtifactError, InferenceError};
use crate::features::{FeatureLayout, UserFeatureVector};
use crate::model::artifact::SCALER_FILE;
use crate::model::{ArtifactReader, StandardScaler};
use std::path::Path;

/// Validated record in, typed result out.
pub trait Predictor: Send + Sync {
    type Output;

    fn name(&self) -> &'static str;

    fn predict(&self, record: &UserFeatureVector) -> Result<Self::Output, InferenceError>;
}

#[derive(Debug)]
pub struct Models {
    pub churn: ChurnModel,
    pub segment: SegmentModel,
    pub forecast: ForecastModel,
}

impl Models {
    /// Load all three model directories. Any failure aborts: the service never
    /// runs with only some models available.
    pub fn load(config: &ServiceConfig) -> Result<Self, ArtifactError> {
        let churn = ChurnModel::load(&config.churn_dir(), config.churn.clone())?;
        tracing::info!(dir = %config.churn_dir().display(), "churn model loaded");
        let segment = SegmentModel::load(&config.segmentation_dir())?;
        tracing::info!(
            dir = %config.segmentation_dir().display(),
            clusters = segment.n_clusters(),
            "segmentation model loaded"
        );
        let forecast = ForecastModel::load(&config.forecast_dir())?;
        tracing::info!(dir = %config.forecast_dir().display(), "forecast model loaded");
        Ok(Self {
            churn,
            segment,
            forecast,
        })
    }

    /// Model + scaler pairs held; always all three once constructed.
    pub fn loaded(&self) -> usize {
        3
    }
}

/// Reads the scaler and checks both it and the persisted feature list against `layout`.
fn load_scaler(reader: &ArtifactReader, layout: FeatureLayout) -> Result<StandardScaler, ArtifactError> {
    reader.expect_layout(layout)?;
    let scaler: StandardScaler = reader.read_json(SCALER_FILE)?;
    let path = reader.dir().join(SCALER_FILE);
    scaler
        .validate()
        .map_err(|reason| ArtifactError::invalid(&path, reason))?;
    check_dim(&path, "scaler", scaler.dim(), layout)?;
    Ok(scaler)
}

fn check_dim(path: &Path, what: &str, found: usize, layout: FeatureLayout) -> Result<(), ArtifactError> {
    if found != layout.dim() {
        return Err(ArtifactError::invalid(
            path,
            format!("{what} expects {found} features, layout has {}", layout.dim()),
        ));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Small hand-built models with known outputs.

    use super::*;
    use crate::config::ChurnConfig;
    use crate::model::{GradientBoostedClassifier, KMeans, Node, RandomForestRegressor, RegressionTree};
    use crate::risk::SegmentCatalog;

    pub fn identity(layout: FeatureLayout) -> StandardScaler {
        StandardScaler::new(vec![0.0; layout.dim()], vec![1.0; layout.dim()])
    }

    /// Margin +3 when `days_since_last_event > 30`, else -3.
    pub fn churn() -> ChurnModel {
        let tree = RegressionTree {
            nodes: vec![
                Node::Split {
                    feature: 9,
                    threshold: 30.0,
                    left: 1,
                    right: 2,
                    gain: 1.0,
                },
                Node::Leaf { value: -3.0 },
                Node::Leaf { value: 3.0 },
            ],
        };
        let classifier = GradientBoostedClassifier {
            n_features: 10,
            base_margin: 0.0,
            learning_rate: 1.0,
            trees: vec![tree],
        };
        ChurnModel::new(identity(FeatureLayout::Full), classifier, ChurnConfig::default())
            .unwrap()
    }

    pub fn segment() -> SegmentModel {
        let mut centroids = Vec::new();
        for total in [5.0, 15.0, 25.0, 100.0] {
            let mut c = vec![0.0; 10];
            c[0] = total;
            centroids.push(c);
        }
        let mut catalog = SegmentCatalog::default();
        for (id, name) in ["Low Engagement", "Casual Users", "Active Users", "Power Users"]
            .into_iter()
            .enumerate()
        {
            catalog.insert(id, name);
        }
        SegmentModel::new(identity(FeatureLayout::Full), KMeans { centroids }, catalog).unwrap()
    }

    /// Always predicts `value`.
    pub fn forecast(value: f64) -> ForecastModel {
        let forest = RandomForestRegressor {
            n_features: 9,
            trees: vec![RegressionTree::leaf(value)],
        };
        ForecastModel::new(identity(FeatureLayout::Forecast), forest).unwrap()
    }

    pub fn models() -> Models {
        Models {
            churn: churn(),
            segment: segment(),
            forecast: forecast(42.0),
        }
    }
}
