//! Service configuration. Artifact locations are injected here, never hardcoded in handlers.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Root directory holding one subdirectory per model
    pub artifacts_dir: PathBuf,
    /// Per-model artifact subdirectories
    pub models: ModelsConfig,
    /// HTTP listener
    pub server: ServerConfig,
    /// Churn post-processing thresholds
    pub churn: ChurnConfig,
    /// Offline training pipeline
    pub training: TrainingConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub churn_dir: PathBuf,
    pub segmentation_dir: PathBuf,
    pub forecast_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Upper bound on in-flight requests
    pub max_concurrent_requests: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChurnConfig {
    /// Probability above this is flagged as churned
    pub decision_threshold: f64,
    /// Probability above this is high risk
    pub high_threshold: f64,
    /// Probability above this is medium risk
    pub medium_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// SQLite database with the feature table
    pub database_path: PathBuf,
    pub table: String,
    pub seed: u64,
    /// Share of rows held out for evaluation
    pub test_fraction: f64,
    /// Engagement-score quantile at or below which a user is labelled churned
    pub churn_quantile: f64,
    pub boosting: BoostingConfig,
    pub kmeans: KMeansConfig,
    pub forest: ForestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingConfig {
    pub n_rounds: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    /// L2 penalty on leaf weights
    pub lambda: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansConfig {
    pub n_clusters: usize,
    pub n_init: usize,
    pub max_iterations: usize,
    /// Convergence threshold on centroid movement between iterations
    pub tolerance: f64,
    /// Candidate k values scored for offline inspection, `[min, max)`
    pub k_search: (usize, usize),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("models_ml"),
            models: ModelsConfig::default(),
            server: ServerConfig::default(),
            churn: ChurnConfig::default(),
            training: TrainingConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            churn_dir: PathBuf::from("churn_prediction"),
            segmentation_dir: PathBuf::from("segmentation"),
            forecast_dir: PathBuf::from("forecasting"),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            max_concurrent_requests: 256,
        }
    }
}

impl Default for ChurnConfig {
    fn default() -> Self {
        Self {
            decision_threshold: 0.5,
            high_threshold: 0.7,
            medium_threshold: 0.4,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("dev.sqlite"),
            table: "customer_features_for_ml".to_string(),
            seed: 42,
            test_fraction: 0.2,
            churn_quantile: 0.40,
            boosting: BoostingConfig::default(),
            kmeans: KMeansConfig::default(),
            forest: ForestConfig::default(),
        }
    }
}

impl Default for BoostingConfig {
    fn default() -> Self {
        Self {
            n_rounds: 100,
            max_depth: 5,
            learning_rate: 0.1,
            lambda: 1.0,
        }
    }
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            n_clusters: 4,
            n_init: 10,
            max_iterations: 300,
            tolerance: 1e-4,
            k_search: (2, 8),
        }
    }
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 5,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl ServiceConfig {
    /// Load from JSON file if present; otherwise return default.
    /// A file that exists but cannot be read or parsed is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn churn_dir(&self) -> PathBuf {
        self.artifacts_dir.join(&self.models.churn_dir)
    }

    pub fn segmentation_dir(&self) -> PathBuf {
        self.artifacts_dir.join(&self.models.segmentation_dir)
    }

    pub fn forecast_dir(&self) -> PathBuf {
        self.artifacts_dir.join(&self.models.forecast_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"artifacts_dir": "/srv/models", "churn": {"high_threshold": 0.8}}"#)
            .unwrap();
        let c = ServiceConfig::load(&path).unwrap();
        assert_eq!(c.artifacts_dir, PathBuf::from("/srv/models"));
        assert_eq!(c.churn.high_threshold, 0.8);
        assert_eq!(c.churn.medium_threshold, 0.4);
        assert_eq!(c.training.kmeans.n_clusters, 4);
        assert_eq!(c.churn_dir(), PathBuf::from("/srv/models/churn_prediction"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ServiceConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
