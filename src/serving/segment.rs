//! Segment predictor: nearest scaled centroid, named through the frozen catalog.

use super::{check_dim, load_scaler, Predictor};
use crate::error::{ArtifactError, InferenceError};
use crate::features::{FeatureExtractor, FeatureLayout, UserFeatureVector};
use crate::model::artifact::{MODEL_FILE, SEGMENT_NAMES_FILE};
use crate::model::{ArtifactReader, KMeans, StandardScaler};
use crate::risk::SegmentCatalog;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentAssignment {
    pub cluster_id: usize,
    pub segment_name: String,
}

/// Nearest-centroid segmentation with a frozen id → name catalog.
#[derive(Debug)]
pub struct SegmentModel {
    extractor: FeatureExtractor,
    scaler: StandardScaler,
    kmeans: KMeans,
    catalog: SegmentCatalog,
}

impl SegmentModel {
    pub const LAYOUT: FeatureLayout = FeatureLayout::Full;

    pub fn new(scaler: StandardScaler, kmeans: KMeans, catalog: SegmentCatalog) -> Result<Self, String> {
        kmeans.validate()?;
        if scaler.dim() != Self::LAYOUT.dim() || kmeans.n_features() != Self::LAYOUT.dim() {
            return Err(format!(
                "scaler has {} features and centroids {}, expected {}",
                scaler.dim(),
                kmeans.n_features(),
                Self::LAYOUT.dim()
            ));
        }
        Ok(Self {
            extractor: FeatureExtractor::new(Self::LAYOUT),
            scaler,
            kmeans,
            catalog,
        })
    }

    pub fn load(dir: &Path) -> Result<Self, ArtifactError> {
        let reader = ArtifactReader::open(dir)?;
        let scaler = load_scaler(&reader, Self::LAYOUT)?;
        let kmeans: KMeans = reader.read_json(MODEL_FILE)?;
        let path = dir.join(MODEL_FILE);
        check_dim(&path, "centroids", kmeans.n_features(), Self::LAYOUT)?;
        let catalog: SegmentCatalog = reader.read_json(SEGMENT_NAMES_FILE)?;
        if (0..kmeans.n_clusters()).any(|id| catalog.iter().all(|(k, _)| k != id)) {
            tracing::warn!(dir = %dir.display(), "segment catalog does not name every cluster");
        }
        Self::new(scaler, kmeans, catalog).map_err(|reason| ArtifactError::invalid(path, reason))
    }

    pub fn n_clusters(&self) -> usize {
        self.kmeans.n_clusters()
    }

    pub fn catalog(&self) -> &SegmentCatalog {
        &self.catalog
    }
}

impl Predictor for SegmentModel {
    type Output = SegmentAssignment;

    fn name(&self) -> &'static str {
        "segment"
    }

    fn predict(&self, record: &UserFeatureVector) -> Result<SegmentAssignment, InferenceError> {
        let fv = self.extractor.extract(record);
        let scaled = self.scaler.transform(fv.as_slice())?;
        let cluster_id = self.kmeans.predict(&scaled);
        let segment_name = self.catalog.name(cluster_id).to_string();
        tracing::debug!(cluster_id, segment = %segment_name, "segment prediction");
        Ok(SegmentAssignment {
            cluster_id,
            segment_name,
        })
    }
}
