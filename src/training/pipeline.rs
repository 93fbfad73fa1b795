//! Offline training: fit the three models and write their artifact directories.

use std::collections::BTreeMap;
use std::path::Path;

use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::dataset::{FeatureStore, UserRecord};
use super::labels::churn_labels;
use super::metrics;
use super::split::{stratified_split, train_test_split};
use crate::config::{ChurnConfig, ServiceConfig, TrainingConfig};
use crate::error::TrainingError;
use crate::features::{FeatureExtractor, FeatureLayout, UserFeatureVector};
use crate::model::artifact::{METRICS_FILE, MODEL_FILE, SCALER_FILE, SEGMENT_NAMES_FILE};
use crate::model::{ArtifactWriter, GradientBoostedClassifier, KMeans, RandomForestRegressor, StandardScaler};
use crate::risk::SegmentCatalog;

const SYNTHETIC_LABEL_NOTE: &str =
    "Synthetic labels for demonstration - use real historical data in production";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Pair importances with names, most important first.
fn ranked(layout: FeatureLayout, importances: &[f64]) -> Vec<FeatureImportance> {
    let mut out: Vec<FeatureImportance> = layout
        .names()
        .iter()
        .zip(importances)
        .map(|(name, &importance)| FeatureImportance {
            feature: name.to_string(),
            importance,
        })
        .collect();
    out.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    out
}

fn rows_to_vecs(x: &Array2<f64>) -> impl Iterator<Item = Vec<f64>> + '_ {
    x.rows().into_iter().map(|r| r.to_vec())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChurnReport {
    pub train_samples: usize,
    pub test_samples: usize,
    pub churn_rate: f64,
    /// Engagement score at the churn quantile
    pub label_threshold: f64,
    /// `None` when the test split holds a single class
    pub auc_roc: Option<f64>,
    /// Probability cut used for `accuracy`, same as serving
    pub decision_threshold: f64,
    pub accuracy: f64,
    pub note: String,
    pub feature_importance: Vec<FeatureImportance>,
}

pub fn train_churn(
    records: &[UserFeatureVector],
    config: &TrainingConfig,
    thresholds: &ChurnConfig,
    dir: &Path,
) -> Result<ChurnReport, TrainingError> {
    let layout = FeatureLayout::Full;
    let x = FeatureExtractor::new(layout).extract_matrix(records);
    let labels = churn_labels(records, config.churn_quantile)
        .ok_or_else(|| TrainingError::InsufficientData("no rows to label".into()))?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let split = stratified_split(&labels.labels, config.test_fraction, &mut rng);
    let y_train: Vec<bool> = split.train.iter().map(|&i| labels.labels[i]).collect();
    let y_test: Vec<bool> = split.test.iter().map(|&i| labels.labels[i]).collect();
    if !(y_train.iter().any(|&c| c) && y_train.iter().any(|&c| !c)) {
        return Err(TrainingError::InsufficientData(
            "churn training split needs both classes".into(),
        ));
    }

    let x_train = x.select(Axis(0), &split.train);
    let x_test = x.select(Axis(0), &split.test);
    let scaler = StandardScaler::fit(&x_train)
        .ok_or_else(|| TrainingError::InsufficientData("empty churn training split".into()))?;
    let xs_train = scaler.transform_matrix(&x_train)?;
    let xs_test = scaler.transform_matrix(&x_test)?;

    let classifier = GradientBoostedClassifier::fit(&xs_train, &y_train, &config.boosting)
        .ok_or_else(|| TrainingError::InsufficientData("churn classifier could not be fitted".into()))?;

    let proba: Vec<f64> = rows_to_vecs(&xs_test).map(|r| classifier.predict_proba(&r)).collect();
    let predicted: Vec<bool> = proba
        .iter()
        .map(|&p| p > thresholds.decision_threshold)
        .collect();

    let report = ChurnReport {
        train_samples: split.train.len(),
        test_samples: split.test.len(),
        churn_rate: labels.churn_rate(),
        label_threshold: labels.threshold,
        auc_roc: metrics::roc_auc(&y_test, &proba),
        decision_threshold: thresholds.decision_threshold,
        accuracy: metrics::accuracy(&y_test, &predicted),
        note: SYNTHETIC_LABEL_NOTE.to_string(),
        feature_importance: ranked(layout, &classifier.feature_importance()),
    };
    tracing::info!(
        train = report.train_samples,
        test = report.test_samples,
        churn_rate = report.churn_rate,
        auc_roc = ?report.auc_roc,
        accuracy = report.accuracy,
        "churn model trained"
    );

    let mut writer = ArtifactWriter::create(dir)?;
    writer.write_json(SCALER_FILE, &scaler)?;
    writer.write_json(MODEL_FILE, &classifier)?;
    writer.write_feature_names(layout)?;
    writer.write_json(METRICS_FILE, &report)?;
    writer.finish("churn")?;
    Ok(report)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KSearchPoint {
    pub k: usize,
    pub inertia: f64,
    pub silhouette: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterProfile {
    pub cluster_id: usize,
    pub segment_name: String,
    pub size: usize,
    /// Mean of the cluster's members in raw units
    pub profile: UserFeatureVector,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationReport {
    pub n_clusters: usize,
    pub total_users: usize,
    pub inertia: f64,
    pub silhouette_score: Option<f64>,
    pub davies_bouldin_score: Option<f64>,
    pub cluster_sizes: BTreeMap<usize, usize>,
    pub profiles: Vec<ClusterProfile>,
    pub k_search: Vec<KSearchPoint>,
}

pub fn train_segmentation(
    records: &[UserFeatureVector],
    config: &TrainingConfig,
    dir: &Path,
) -> Result<SegmentationReport, TrainingError> {
    let layout = FeatureLayout::Full;
    let k = config.kmeans.n_clusters;
    if records.len() <= k {
        return Err(TrainingError::InsufficientData(format!(
            "{} users cannot form {k} clusters",
            records.len()
        )));
    }
    let x = FeatureExtractor::new(layout).extract_matrix(records);
    let scaler = StandardScaler::fit(&x)
        .ok_or_else(|| TrainingError::InsufficientData("no rows to cluster".into()))?;
    let xs = scaler.transform_matrix(&x)?;

    // Exploratory sweep; the configured k is used regardless.
    let (lo, hi) = config.kmeans.k_search;
    let mut k_search = Vec::new();
    for candidate in lo..hi {
        let fit = match KMeans::fit(&xs, candidate, &config.kmeans, StdRng::seed_from_u64(config.seed)) {
            Ok(fit) => fit,
            Err(e) => {
                tracing::warn!(k = candidate, error = %e, "k-means sweep candidate skipped");
                continue;
            }
        };
        let silhouette = metrics::silhouette(&xs, &fit.labels, candidate);
        tracing::info!(k = candidate, inertia = fit.inertia, silhouette = ?silhouette, "k-means sweep");
        k_search.push(KSearchPoint {
            k: candidate,
            inertia: fit.inertia,
            silhouette,
        });
    }

    let fit = KMeans::fit(&xs, k, &config.kmeans, StdRng::seed_from_u64(config.seed))?;

    let mut sums = vec![[0.0f64; 10]; k];
    let mut sizes = vec![0usize; k];
    for (record, &label) in records.iter().zip(&fit.labels) {
        for (s, v) in sums[label].iter_mut().zip(record.to_array()) {
            *s += v;
        }
        sizes[label] += 1;
    }
    let mut profiles = Vec::with_capacity(k);
    for (cluster_id, (sum, &size)) in sums.into_iter().zip(&sizes).enumerate() {
        let mean = if size > 0 {
            sum.map(|s| s / size as f64)
        } else {
            let raw = scaler.inverse_transform(&fit.model.centroids[cluster_id])?;
            let mut out = [0.0; 10];
            for (o, v) in out.iter_mut().zip(raw) {
                *o = v.max(0.0);
            }
            out
        };
        let profile = UserFeatureVector::from_array(mean).map_err(|source| TrainingError::InvalidRow {
            user_id: format!("cluster-{cluster_id}-profile"),
            source,
        })?;
        profiles.push(profile);
    }
    let catalog = SegmentCatalog::from_profiles(&profiles);

    let report = SegmentationReport {
        n_clusters: k,
        total_users: records.len(),
        inertia: fit.inertia,
        silhouette_score: metrics::silhouette(&xs, &fit.labels, k),
        davies_bouldin_score: metrics::davies_bouldin(&xs, &fit.labels, &fit.model.centroids),
        cluster_sizes: sizes.iter().copied().enumerate().collect(),
        profiles: profiles
            .iter()
            .enumerate()
            .map(|(cluster_id, p)| ClusterProfile {
                cluster_id,
                segment_name: catalog.name(cluster_id).to_string(),
                size: sizes[cluster_id],
                profile: *p,
            })
            .collect(),
        k_search,
    };
    for p in &report.profiles {
        tracing::info!(
            cluster = p.cluster_id,
            segment = %p.segment_name,
            size = p.size,
            total_events = p.profile.total_events,
            purchase_events = p.profile.purchase_events,
            "segment profile"
        );
    }
    tracing::info!(
        k,
        silhouette = ?report.silhouette_score,
        davies_bouldin = ?report.davies_bouldin_score,
        "segmentation model trained"
    );

    let mut writer = ArtifactWriter::create(dir)?;
    writer.write_json(SCALER_FILE, &scaler)?;
    writer.write_json(MODEL_FILE, &fit.model)?;
    writer.write_json(SEGMENT_NAMES_FILE, &catalog)?;
    writer.write_feature_names(layout)?;
    writer.write_json(METRICS_FILE, &report)?;
    writer.finish("segmentation")?;
    Ok(report)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TargetRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastReport {
    pub train_samples: usize,
    pub test_samples: usize,
    pub train_mae: f64,
    pub train_rmse: f64,
    pub train_r2: f64,
    pub test_mae: f64,
    pub test_rmse: f64,
    pub test_r2: f64,
    pub target_range: TargetRange,
    pub feature_importance: Vec<FeatureImportance>,
}

pub fn train_forecast(
    records: &[UserFeatureVector],
    config: &TrainingConfig,
    dir: &Path,
) -> Result<ForecastReport, TrainingError> {
    let layout = FeatureLayout::Forecast;
    if records.len() < 2 {
        return Err(TrainingError::InsufficientData(
            "forecast needs at least two users".into(),
        ));
    }
    let x = FeatureExtractor::new(layout).extract_matrix(records);
    let y: Vec<f64> = records.iter().map(|r| r.total_events).collect();

    let mut rng = StdRng::seed_from_u64(config.seed);
    let split = train_test_split(records.len(), config.test_fraction, &mut rng);
    let x_train = x.select(Axis(0), &split.train);
    let x_test = x.select(Axis(0), &split.test);
    let y_train: Vec<f64> = split.train.iter().map(|&i| y[i]).collect();
    let y_test: Vec<f64> = split.test.iter().map(|&i| y[i]).collect();

    let scaler = StandardScaler::fit(&x_train)
        .ok_or_else(|| TrainingError::InsufficientData("empty forecast training split".into()))?;
    let xs_train = scaler.transform_matrix(&x_train)?;
    let xs_test = scaler.transform_matrix(&x_test)?;

    let forest = RandomForestRegressor::fit(&xs_train, &y_train, &config.forest, &mut rng)
        .ok_or_else(|| TrainingError::InsufficientData("forest could not be fitted".into()))?;
    let pred_train: Vec<f64> = rows_to_vecs(&xs_train).map(|r| forest.predict(&r)).collect();
    let pred_test: Vec<f64> = rows_to_vecs(&xs_test).map(|r| forest.predict(&r)).collect();

    let report = ForecastReport {
        train_samples: split.train.len(),
        test_samples: split.test.len(),
        train_mae: metrics::mae(&y_train, &pred_train),
        train_rmse: metrics::rmse(&y_train, &pred_train),
        train_r2: metrics::r2(&y_train, &pred_train),
        test_mae: metrics::mae(&y_test, &pred_test),
        test_rmse: metrics::rmse(&y_test, &pred_test),
        test_r2: metrics::r2(&y_test, &pred_test),
        target_range: TargetRange {
            min: y.iter().copied().fold(f64::INFINITY, f64::min),
            max: y.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        },
        feature_importance: ranked(layout, &forest.feature_importance()),
    };
    tracing::info!(
        test_mae = report.test_mae,
        test_rmse = report.test_rmse,
        test_r2 = report.test_r2,
        "forecast model trained"
    );

    let mut writer = ArtifactWriter::create(dir)?;
    writer.write_json(SCALER_FILE, &scaler)?;
    writer.write_json(MODEL_FILE, &forest)?;
    writer.write_feature_names(layout)?;
    writer.write_json(METRICS_FILE, &report)?;
    writer.finish("forecast")?;
    Ok(report)
}

/// Everything one training run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub users: usize,
    pub churn: ChurnReport,
    pub segmentation: SegmentationReport,
    pub forecast: ForecastReport,
}

/// Train all three models on already-loaded records, writing into the
/// directories named by `config`.
///
/// Models are written to a staging directory under `artifacts_dir` and only
/// moved into place once all three succeed. A failed run leaves the previous
/// artifact set as it was.
pub fn train_records(records: &[UserRecord], config: &ServiceConfig) -> Result<TrainingSummary, TrainingError> {
    let features: Vec<UserFeatureVector> = records.iter().map(|r| r.features).collect();
    let mut staged = config.clone();
    staged.artifacts_dir = config.artifacts_dir.join(format!(".staging-{}", Uuid::new_v4()));

    let trained = train_stages(&features, &staged);
    let result = trained.and_then(|summary| {
        for (from, to) in [
            (staged.churn_dir(), config.churn_dir()),
            (staged.segmentation_dir(), config.segmentation_dir()),
            (staged.forecast_dir(), config.forecast_dir()),
        ] {
            promote(&from, &to)?;
        }
        Ok(summary)
    });
    if !staged.artifacts_dir.exists() {
        return result;
    }
    if let Err(e) = std::fs::remove_dir_all(&staged.artifacts_dir) {
        tracing::warn!(dir = %staged.artifacts_dir.display(), error = %e, "failed to remove staging directory");
    }
    result
}

fn train_stages(features: &[UserFeatureVector], config: &ServiceConfig) -> Result<TrainingSummary, TrainingError> {
    let training = &config.training;
    Ok(TrainingSummary {
        users: features.len(),
        churn: train_churn(features, training, &config.churn, &config.churn_dir())?,
        segmentation: train_segmentation(features, training, &config.segmentation_dir())?,
        forecast: train_forecast(features, training, &config.forecast_dir())?,
    })
}

/// Replace `to` with the staged directory `from`.
fn promote(from: &Path, to: &Path) -> Result<(), TrainingError> {
    let write_error = |path: &Path, source: std::io::Error| TrainingError::Write {
        path: path.to_path_buf(),
        source,
    };
    if to.exists() {
        std::fs::remove_dir_all(to).map_err(|e| write_error(to, e))?;
    }
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent).map_err(|e| write_error(parent, e))?;
    }
    std::fs::rename(from, to).map_err(|e| write_error(to, e))?;
    tracing::debug!(dir = %to.display(), "artifacts promoted");
    Ok(())
}

/// Load the feature table and train every model.
pub fn train_all(config: &ServiceConfig) -> Result<TrainingSummary, TrainingError> {
    let store = FeatureStore::open(&config.training.database_path, &config.training.table)?;
    let records = store.load_all()?;
    tracing::info!(
        users = records.len(),
        database = %config.training.database_path.display(),
        table = %config.training.table,
        "loaded feature table"
    );
    train_records(&records, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ArtifactReader;

    fn population() -> Vec<UserFeatureVector> {
        (0..60)
            .map(|i| {
                let t = i as f64;
                UserFeatureVector {
                    total_events: t * 2.0,
                    events_last_30d: t,
                    events_last_7d: t / 4.0,
                    unique_event_types: (i % 4) as f64,
                    login_events: t / 2.0,
                    view_events: t / 2.0,
                    click_events: t / 3.0,
                    purchase_events: (i % 7) as f64,
                    days_with_events: t / 3.0,
                    days_since_last_event: 60.0 - t,
                }
            })
            .collect()
    }

    fn small_config() -> TrainingConfig {
        let mut c = TrainingConfig::default();
        c.boosting.n_rounds = 10;
        c.forest.n_trees = 5;
        c.kmeans.n_init = 2;
        c.kmeans.k_search = (2, 4);
        c
    }

    #[test]
    fn churn_writes_loadable_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let report = train_churn(&population(), &small_config(), &ChurnConfig::default(), tmp.path()).unwrap();
        assert_eq!(report.train_samples + report.test_samples, 60);
        assert!((report.churn_rate - 0.4).abs() < 0.05);
        assert!(report.auc_roc.unwrap() > 0.8);
        assert_eq!(report.feature_importance.len(), 10);

        let reader = ArtifactReader::open(tmp.path()).unwrap();
        assert_eq!(reader.manifest().unwrap().model_kind, "churn");
        assert!(reader.expect_layout(FeatureLayout::Full).is_ok());
        let back: ChurnReport = reader.read_json(METRICS_FILE).unwrap();
        assert_eq!(back.train_samples, report.train_samples);
        assert_eq!(back.decision_threshold, 0.5);
    }

    #[test]
    fn churn_accuracy_follows_decision_threshold() {
        let tmp = tempfile::tempdir().unwrap();
        let at = |decision_threshold: f64| {
            let thresholds = ChurnConfig {
                decision_threshold,
                ..ChurnConfig::default()
            };
            train_churn(&population(), &small_config(), &thresholds, tmp.path()).unwrap()
        };
        // Nothing is above 1.0, everything is above 0.0.
        let none_churned = at(1.0);
        let all_churned = at(0.0);
        assert_eq!(none_churned.decision_threshold, 1.0);
        assert!((none_churned.accuracy + all_churned.accuracy - 1.0).abs() < 1e-9);
        assert!(none_churned.accuracy > all_churned.accuracy);
    }

    #[test]
    fn segmentation_names_every_cluster() {
        let tmp = tempfile::tempdir().unwrap();
        let report = train_segmentation(&population(), &small_config(), tmp.path()).unwrap();
        assert_eq!(report.n_clusters, 4);
        assert_eq!(report.cluster_sizes.values().sum::<usize>(), 60);
        assert_eq!(report.k_search.len(), 2);
        let reader = ArtifactReader::open(tmp.path()).unwrap();
        let catalog: SegmentCatalog = reader.read_json(SEGMENT_NAMES_FILE).unwrap();
        assert_eq!(catalog.len(), 4);
    }

    #[test]
    fn forecast_fits_linear_target() {
        let tmp = tempfile::tempdir().unwrap();
        let report = train_forecast(&population(), &small_config(), tmp.path()).unwrap();
        assert_eq!(report.test_samples, 12);
        assert_eq!(report.target_range.min, 0.0);
        assert_eq!(report.target_range.max, 118.0);
        assert!(report.train_r2 > 0.8);
        assert_eq!(report.feature_importance.len(), 9);
    }

    #[test]
    fn too_few_users_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let pop = population();
        let few = &pop[..3];
        assert!(matches!(
            train_segmentation(few, &small_config(), tmp.path()),
            Err(TrainingError::InsufficientData(_))
        ));
        assert!(matches!(
            train_forecast(&few[..1], &small_config(), tmp.path()),
            Err(TrainingError::InsufficientData(_))
        ));
    }

    #[test]
    fn train_all_reads_sqlite() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = ServiceConfig::default();
        config.artifacts_dir = tmp.path().join("models");
        config.training = small_config();
        config.training.database_path = tmp.path().join("features.sqlite");

        let mut store = FeatureStore::open(&config.training.database_path, &config.training.table).unwrap();
        store.create_table().unwrap();
        let records: Vec<UserRecord> = population()
            .into_iter()
            .enumerate()
            .map(|(i, features)| UserRecord {
                user_id: format!("user-{i:03}"),
                features,
            })
            .collect();
        store.insert_all(&records).unwrap();
        drop(store);

        let summary = train_all(&config).unwrap();
        assert_eq!(summary.users, 60);
        assert!(config.churn_dir().join("manifest.json").exists());
        assert!(config.segmentation_dir().join("segment_names.json").exists());
        assert!(config.forecast_dir().join("model.json").exists());
    }

    fn staging_dirs(artifacts: &Path) -> usize {
        std::fs::read_dir(artifacts)
            .unwrap()
            .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().starts_with(".staging-"))
            .count()
    }

    #[test]
    fn failed_run_keeps_previous_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = ServiceConfig::default();
        config.artifacts_dir = tmp.path().join("models");
        config.training = small_config();
        let records: Vec<UserRecord> = population()
            .into_iter()
            .enumerate()
            .map(|(i, features)| UserRecord {
                user_id: format!("user-{i:03}"),
                features,
            })
            .collect();

        train_records(&records, &config).unwrap();
        let manifest = config.churn_dir().join("manifest.json");
        let before = std::fs::read(&manifest).unwrap();

        // Churn trains fine, segmentation cannot form 100 clusters from 60 users.
        let mut failing = config.clone();
        failing.training.seed = 7;
        failing.training.kmeans.n_clusters = 100;
        assert!(matches!(
            train_records(&records, &failing),
            Err(TrainingError::InsufficientData(_))
        ));
        assert_eq!(std::fs::read(&manifest).unwrap(), before);
        assert!(config.segmentation_dir().join("model.json").exists());
        assert_eq!(staging_dirs(&config.artifacts_dir), 0);
    }

    #[test]
    fn failed_first_run_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = ServiceConfig::default();
        config.artifacts_dir = tmp.path().join("models");
        config.training = small_config();
        config.training.kmeans.n_clusters = 100;
        let records: Vec<UserRecord> = population()
            .into_iter()
            .map(|features| UserRecord {
                user_id: "u".into(),
                features,
            })
            .collect();

        assert!(train_records(&records, &config).is_err());
        assert!(!config.churn_dir().exists());
        assert_eq!(staging_dirs(&config.artifacts_dir), 0);
    }
}
