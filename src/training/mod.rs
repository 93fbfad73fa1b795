//! Offline training pipeline: SQLite feature table in, artifact directories out.

pub mod dataset;
pub mod labels;
pub mod metrics;
mod pipeline;
pub mod split;

pub use dataset::{FeatureStore, UserRecord};
pub use pipeline::{
    train_all, train_churn, train_forecast, train_records, train_segmentation, ChurnReport,
    ClusterProfile, FeatureImportance, ForecastReport, KSearchPoint, SegmentationReport,
    TargetRange, TrainingSummary,
};
