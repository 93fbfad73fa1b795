//! Synthetic churn labels for the demonstration dataset.
//!
//! The feature table carries no usable churn outcome, so users are ranked by an
//! engagement score and the least engaged share is labelled churned. A production
//! retrain would use historical outcomes instead; the formula is kept fixed so the
//! shipped artifacts can be reproduced.

use crate::features::UserFeatureVector;

/// `0.3·total_events + 0.3·days_with_events + 0.4·(100 − days_since_last_event)`
pub fn engagement_score(f: &UserFeatureVector) -> f64 {
    0.3 * f.total_events + 0.3 * f.days_with_events + 0.4 * (100.0 - f.days_since_last_event)
}

/// Quantile with linear interpolation between closest ranks.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

#[derive(Debug, Clone)]
pub struct ChurnLabels {
    /// `true` = churned
    pub labels: Vec<bool>,
    pub threshold: f64,
}

impl ChurnLabels {
    pub fn churn_rate(&self) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        self.labels.iter().filter(|&&c| c).count() as f64 / self.labels.len() as f64
    }
}

/// Users scoring at or below the `q` quantile are churned.
pub fn churn_labels(records: &[UserFeatureVector], q: f64) -> Option<ChurnLabels> {
    let scores: Vec<f64> = records.iter().map(engagement_score).collect();
    let threshold = quantile(&scores, q)?;
    Some(ChurnLabels {
        labels: scores.iter().map(|&s| s <= threshold).collect(),
        threshold,
    })
}
