//! Seeded hold-out splits.

use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

fn test_count(n: usize, test_fraction: f64) -> usize {
    ((n as f64) * test_fraction).ceil() as usize
}

/// Shuffle `0..n` and hold out `ceil(n * test_fraction)` rows.
pub fn train_test_split<R: Rng>(n: usize, test_fraction: f64, rng: &mut R) -> Split {
    let mut idx: Vec<usize> = (0..n).collect();
    idx.shuffle(rng);
    let n_test = test_count(n, test_fraction).min(n);
    let train = idx.split_off(n_test);
    Split { train, test: idx }
}

/// Like [`train_test_split`] but keeps the class ratio in both halves.
pub fn stratified_split<R: Rng>(labels: &[bool], test_fraction: f64, rng: &mut R) -> Split {
    let mut split = Split {
        train: Vec::with_capacity(labels.len()),
        test: Vec::new(),
    };
    for class in [false, true] {
        let mut idx: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == class).collect();
        idx.shuffle(rng);
        let n_test = test_count(idx.len(), test_fraction).min(idx.len());
        split.train.extend_from_slice(&idx[n_test..]);
        split.test.extend_from_slice(&idx[..n_test]);
    }
    split.train.shuffle(rng);
    split.test.shuffle(rng);
    split
}
