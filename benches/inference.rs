//! Inference benchmark: validated record → scaled vector → model output, per predictor.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use superapp_ml::config::{BoostingConfig, ChurnConfig, ForestConfig, KMeansConfig};
use superapp_ml::features::{FeatureExtractor, FeatureLayout, UserFeatureVector};
use superapp_ml::model::{GradientBoostedClassifier, KMeans, RandomForestRegressor, StandardScaler};
use superapp_ml::risk::SegmentCatalog;
use superapp_ml::serving::{ChurnModel, ForecastModel, Predictor, SegmentModel};

fn make_records(n: usize) -> Vec<UserFeatureVector> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..n)
        .map(|_| {
            let mut v = [0.0; 10];
            for x in v.iter_mut() {
                *x = rng.gen_range(0.0..100.0f64).round();
            }
            UserFeatureVector::from_array(v).unwrap()
        })
        .collect()
}

fn scaled(layout: FeatureLayout, records: &[UserFeatureVector]) -> (StandardScaler, Array2<f64>) {
    let x = FeatureExtractor::new(layout).extract_matrix(records);
    let scaler = StandardScaler::fit(&x).unwrap();
    let xs = scaler.transform_matrix(&x).unwrap();
    (scaler, xs)
}

fn bench_churn(c: &mut Criterion) {
    let records = make_records(500);
    let (scaler, xs) = scaled(FeatureLayout::Full, &records);
    let labels: Vec<bool> = records.iter().map(|r| r.days_since_last_event > 50.0).collect();
    let classifier = GradientBoostedClassifier::fit(&xs, &labels, &BoostingConfig::default()).unwrap();
    let model = ChurnModel::new(scaler, classifier, ChurnConfig::default()).unwrap();
    let record = records[0];

    c.bench_function("churn_predict_100_rounds", |b| {
        b.iter(|| model.predict(black_box(&record)))
    });
}

fn bench_segment(c: &mut Criterion) {
    let records = make_records(500);
    let (scaler, xs) = scaled(FeatureLayout::Full, &records);
    let fit = KMeans::fit(&xs, 4, &KMeansConfig::default(), StdRng::seed_from_u64(42)).unwrap();
    let model = SegmentModel::new(scaler, fit.model, SegmentCatalog::default()).unwrap();
    let record = records[0];

    c.bench_function("segment_predict_k4", |b| b.iter(|| model.predict(black_box(&record))));
}

fn bench_forecast(c: &mut Criterion) {
    let records = make_records(500);
    let (scaler, xs) = scaled(FeatureLayout::Forecast, &records);
    let y: Vec<f64> = records.iter().map(|r| r.total_events).collect();
    let mut rng = StdRng::seed_from_u64(42);
    let forest = RandomForestRegressor::fit(&xs, &y, &ForestConfig::default(), &mut rng).unwrap();
    let model = ForecastModel::new(scaler, forest).unwrap();
    let record = records[0];

    c.bench_function("forecast_predict_100_trees", |b| {
        b.iter(|| model.predict(black_box(&record)))
    });
}

criterion_group!(benches, bench_churn, bench_segment, bench_forecast);
criterion_main!(benches);
