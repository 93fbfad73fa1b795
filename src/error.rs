//! Error taxonomy: request validation, artifact loading, inference, config, training.

use std::path::PathBuf;
use thiserror::Error;

/// Rejected input record; raised before any scaling happens.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("missing feature field `{0}`")]
    MissingField(&'static str),
    #[error("feature field `{0}` is not numeric")]
    NotNumeric(&'static str),
    #[error("feature field `{0}` is not a finite number")]
    NotFinite(&'static str),
    #[error("feature field `{field}` must be non-negative, got {value}")]
    Negative { field: &'static str, value: f64 },
    #[error("`user_id` must be a string")]
    InvalidUserId,
    #[error("request body must be a JSON object")]
    NotAnObject,
    #[error("malformed request body: {0}")]
    MalformedBody(String),
}

/// Missing or corrupt artifact. Fatal at startup.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path}: feature list {found:?} does not match expected {expected:?}")]
    FeatureMismatch {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("{path}: sha256 digest does not match manifest")]
    DigestMismatch { path: PathBuf },
    #[error("{path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

impl ArtifactError {
    pub fn invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ArtifactError::Invalid {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Unexpected failure inside scaling or prediction for a single request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("expected {expected} features, got {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("{0} produced a non-finite value")]
    NonFinite(&'static str),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("invalid row for user {user_id}: {source}")]
    InvalidRow {
        user_id: String,
        #[source]
        source: ValidationError,
    },
    #[error("invalid table name `{0}`")]
    InvalidTable(String),
    #[error("insufficient data: {0}")]
    InsufficientData(String),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("k-means failed: {0}")]
    Clustering(#[from] linfa_clustering::KMeansError),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
