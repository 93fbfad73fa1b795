//! K-Means segmentation: fitted with linfa, served as plain nearest-centroid lookup.

use linfa::prelude::*;
use linfa_clustering::{KMeans as LinfaKMeans, KMeansInit};
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::KMeansConfig;
use crate::error::TrainingError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeans {
    /// One row per cluster, in scaled feature space
    pub centroids: Vec<Vec<f64>>,
}

/// Result of fitting on a training matrix.
#[derive(Debug, Clone)]
pub struct KMeansFit {
    pub model: KMeans,
    pub labels: Vec<usize>,
    /// Within-cluster sum of squares
    pub inertia: f64,
}

impl KMeans {
    pub fn n_clusters(&self) -> usize {
        self.centroids.len()
    }

    pub fn n_features(&self) -> usize {
        self.centroids.first().map_or(0, Vec::len)
    }

    /// Index of the nearest centroid; ties resolve to the lowest index.
    pub fn predict(&self, x: &[f64]) -> usize {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (i, c) in self.centroids.iter().enumerate() {
            let d = squared_distance(x.iter().copied(), c.iter().copied());
            if d < best_dist {
                best_dist = d;
                best = i;
            }
        }
        best
    }

    /// k-means++ seeded Lloyd, best of `n_init` runs. Labels and inertia are
    /// recomputed with [`KMeans::predict`] so training and serving agree on ties.
    pub fn fit<R: Rng + Clone>(
        x: &Array2<f64>,
        k: usize,
        config: &KMeansConfig,
        rng: R,
    ) -> Result<KMeansFit, TrainingError> {
        if k == 0 || x.nrows() < k {
            return Err(TrainingError::InsufficientData(format!(
                "{} rows cannot form {k} clusters",
                x.nrows()
            )));
        }
        let dataset = Dataset::new(x.clone(), Array1::<usize>::zeros(x.nrows()));
        let fitted = LinfaKMeans::params_with(k, rng, L2Dist)
            .n_runs(config.n_init.max(1))
            .max_n_iterations(config.max_iterations.max(1) as u64)
            .tolerance(config.tolerance)
            .init_method(KMeansInit::KMeansPlusPlus)
            .fit(&dataset)?;

        let model = KMeans {
            centroids: fitted.centroids().rows().into_iter().map(|r| r.to_vec()).collect(),
        };
        let mut labels = Vec::with_capacity(x.nrows());
        let mut inertia = 0.0;
        for r in x.rows() {
            let row = r.to_vec();
            let label = model.predict(&row);
            inertia += squared_distance(row.iter().copied(), model.centroids[label].iter().copied());
            labels.push(label);
        }
        Ok(KMeansFit {
            model,
            labels,
            inertia,
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        let dim = self.n_features();
        if self.centroids.is_empty() || dim == 0 {
            return Err("no centroids".into());
        }
        if self.centroids.iter().any(|c| c.len() != dim) {
            return Err("centroids have differing dimensions".into());
        }
        if self.centroids.iter().flatten().any(|v| !v.is_finite()) {
            return Err("non-finite centroid coordinate".into());
        }
        Ok(())
    }
}

pub(crate) fn squared_distance(a: impl Iterator<Item = f64>, b: impl Iterator<Item = f64>) -> f64 {
    a.zip(b).map(|(p, q)| (p - q).powi(2)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn blobs() -> Array2<f64> {
        let mut data = Vec::new();
        for (cx, cy) in [(0.0, 0.0), (10.0, 10.0), (0.0, 10.0)] {
            for i in 0..10 {
                let jitter = i as f64 * 0.05;
                data.extend_from_slice(&[cx + jitter, cy - jitter]);
            }
        }
        Array2::from_shape_vec((30, 2), data).unwrap()
    }

    #[test]
    fn separates_blobs() {
        let x = blobs();
        let fit = KMeans::fit(&x, 3, &KMeansConfig::default(), StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(fit.model.n_clusters(), 3);
        for blob in 0..3 {
            let first = fit.labels[blob * 10];
            assert!(fit.labels[blob * 10..blob * 10 + 10].iter().all(|&l| l == first));
        }
        assert_ne!(fit.labels[0], fit.labels[10]);
        assert_ne!(fit.labels[10], fit.labels[20]);
        assert!(fit.inertia < 2.0);
        assert_eq!(fit.model.predict(&[9.5, 9.5]), fit.labels[10]);
    }

    #[test]
    fn same_seed_same_centroids() {
        let x = blobs();
        let config = KMeansConfig {
            n_init: 3,
            ..KMeansConfig::default()
        };
        let a = KMeans::fit(&x, 3, &config, StdRng::seed_from_u64(7)).unwrap();
        let b = KMeans::fit(&x, 3, &config, StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(a.model, b.model);
        assert_eq!(a.labels, b.labels);
    }

    #[test]
    fn predict_is_nearest_centroid() {
        let m = KMeans {
            centroids: vec![vec![0.0, 0.0], vec![5.0, 5.0]],
        };
        assert_eq!(m.predict(&[1.0, 1.0]), 0);
        assert_eq!(m.predict(&[4.0, 4.0]), 1);
        assert_eq!(m.predict(&[2.5, 2.5]), 0);
        assert!(m.validate().is_ok());
    }

    #[test]
    fn too_few_points() {
        let x = Array2::zeros((2, 2));
        assert!(matches!(
            KMeans::fit(&x, 3, &KMeansConfig::default(), StdRng::seed_from_u64(0)),
            Err(TrainingError::InsufficientData(_))
        ));
    }

    #[test]
    fn validate_rejects_ragged_centroids() {
        let m = KMeans {
            centroids: vec![vec![0.0, 0.0], vec![1.0]],
        };
        assert!(m.validate().is_err());
    }
}
