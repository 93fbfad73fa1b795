//! Trained model artifacts: scaler, tree ensembles, k-means, and their on-disk form.

pub mod artifact;
mod boosting;
mod forest;
mod kmeans;
mod scaler;
mod tree;

pub use artifact::{ArtifactReader, ArtifactWriter, Manifest};
pub use boosting::{sigmoid, GradientBoostedClassifier};
pub use forest::RandomForestRegressor;
pub use kmeans::{KMeans, KMeansFit};
pub use scaler::StandardScaler;
pub use tree::{Node, RegressionTree, TreeParams};

pub(crate) use kmeans::squared_distance;
