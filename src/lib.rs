//! SuperApp ML: churn, segmentation, and activity-forecast models behind a JSON API.
//!
//! Modular structure:
//! - [`features`]: Validated ten-field user record and per-model feature layouts
//! - [`model`]: Scaler, tree ensembles, k-means, and their on-disk artifacts
//! - [`risk`]: Churn risk levels and segment naming
//! - [`serving`]: Loaded predictors behind a common `Predictor` trait
//! - [`server`]: axum HTTP service
//! - [`training`]: Offline training from the SQLite feature table
//! - [`logging`]: Structured JSON logging

pub mod config;
pub mod error;
pub mod features;
pub mod logging;
pub mod model;
pub mod risk;
pub mod server;
pub mod serving;
pub mod training;

pub use config::ServiceConfig;
pub use error::{ArtifactError, ConfigError, InferenceError, TrainingError, ValidationError};
pub use features::{FeatureExtractor, FeatureLayout, FeatureVector, UserFeatureVector};
pub use logging::StructuredLogger;
pub use risk::{RiskEngine, RiskLevel};
pub use serving::{Models, Predictor};
