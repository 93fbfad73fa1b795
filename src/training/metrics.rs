//! Evaluation metrics reported in `metrics.json`.

use crate::model::squared_distance;
use ndarray::{Array2, ArrayView1};

/// Area under the ROC curve via the rank-sum statistic; tied scores share
/// their average rank. `None` when only one class is present.
pub fn roc_auc(labels: &[bool], scores: &[f64]) -> Option<f64> {
    if labels.len() != scores.len() {
        return None;
    }
    let n_pos = labels.iter().filter(|&&l| l).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut pos_rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // 1-based ranks i+1..=j+1
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        pos_rank_sum += avg_rank * order[i..=j].iter().filter(|&&k| labels[k]).count() as f64;
        i = j + 1;
    }

    let n_pos = n_pos as f64;
    Some((pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg as f64))
}

pub fn accuracy(truth: &[bool], predicted: &[bool]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let hits = truth.iter().zip(predicted).filter(|(a, b)| a == b).count();
    hits as f64 / truth.len() as f64
}

pub fn mae(truth: &[f64], predicted: &[f64]) -> f64 {
    mean(truth.iter().zip(predicted).map(|(t, p)| (t - p).abs()), truth.len())
}

pub fn rmse(truth: &[f64], predicted: &[f64]) -> f64 {
    mean(truth.iter().zip(predicted).map(|(t, p)| (t - p).powi(2)), truth.len()).sqrt()
}

/// Coefficient of determination. A constant target scores 1.0 when predicted
/// exactly and 0.0 otherwise.
pub fn r2(truth: &[f64], predicted: &[f64]) -> f64 {
    let m = mean(truth.iter().copied(), truth.len());
    let ss_tot: f64 = truth.iter().map(|t| (t - m).powi(2)).sum();
    let ss_res: f64 = truth.iter().zip(predicted).map(|(t, p)| (t - p).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

fn mean(values: impl Iterator<Item = f64>, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    values.sum::<f64>() / n as f64
}

fn distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    squared_distance(a.iter().copied(), b.iter().copied()).sqrt()
}

/// Mean silhouette coefficient over all samples. Samples in singleton clusters
/// score 0. `None` unless 2 <= k < n.
pub fn silhouette(x: &Array2<f64>, labels: &[usize], k: usize) -> Option<f64> {
    let n = x.nrows();
    if n != labels.len() || k < 2 || k >= n {
        return None;
    }
    let mut sizes = vec![0usize; k];
    for &l in labels {
        *sizes.get_mut(l)? += 1;
    }

    let mut total = 0.0;
    let mut sums = vec![0.0; k];
    for i in 0..n {
        sums.iter_mut().for_each(|s| *s = 0.0);
        for j in 0..n {
            if i != j {
                sums[labels[j]] += distance(x.row(i), x.row(j));
            }
        }
        let own = labels[i];
        if sizes[own] <= 1 {
            continue;
        }
        let a = sums[own] / (sizes[own] - 1) as f64;
        let b = (0..k)
            .filter(|&c| c != own && sizes[c] > 0)
            .map(|c| sums[c] / sizes[c] as f64)
            .fold(f64::INFINITY, f64::min);
        if b.is_finite() {
            let denom = a.max(b);
            if denom > 0.0 {
                total += (b - a) / denom;
            }
        }
    }
    Some(total / n as f64)
}

/// Davies-Bouldin index: mean over clusters of the worst
/// `(s_i + s_j) / d(c_i, c_j)` ratio. Lower is better.
pub fn davies_bouldin(x: &Array2<f64>, labels: &[usize], centroids: &[Vec<f64>]) -> Option<f64> {
    let k = centroids.len();
    if k < 2 || x.nrows() != labels.len() {
        return None;
    }
    let mut spread = vec![0.0; k];
    let mut sizes = vec![0usize; k];
    for (row, &l) in x.rows().into_iter().zip(labels) {
        let c = centroids.get(l)?;
        spread[l] += squared_distance(row.iter().copied(), c.iter().copied()).sqrt();
        sizes[l] += 1;
    }
    for (s, &n) in spread.iter_mut().zip(&sizes) {
        if n > 0 {
            *s /= n as f64;
        }
    }

    let mut total = 0.0;
    for i in 0..k {
        let worst = (0..k)
            .filter(|&j| j != i)
            .map(|j| {
                let d = squared_distance(centroids[i].iter().copied(), centroids[j].iter().copied()).sqrt();
                if d > 0.0 {
                    (spread[i] + spread[j]) / d
                } else {
                    0.0
                }
            })
            .fold(0.0, f64::max);
        total += worst;
    }
    Some(total / k as f64)
}
