//! CART regression tree, shared by the boosted classifier and the random forest.
//!
//! Nodes are stored flat in pre-order: every child index is strictly greater than
//! its parent's, so a validated tree cannot loop during traversal.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        /// Squared-error reduction achieved by this split
        gain: f64,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<Node>,
}

struct Split {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl RegressionTree {
    pub fn leaf(value: f64) -> Self {
        Self {
            nodes: vec![Node::Leaf { value }],
        }
    }

    /// Grow a tree on `rows` of `x`, splitting to minimise squared error against
    /// `target`. Leaf outputs come from `leaf_value`, so callers can use plain
    /// means (forest) or Newton steps (boosting).
    pub fn fit<L>(
        x: &Array2<f64>,
        target: &[f64],
        rows: &[usize],
        params: &TreeParams,
        leaf_value: L,
    ) -> Self
    where
        L: Fn(&[usize]) -> f64,
    {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(x, target, rows.to_vec(), 0, params, &leaf_value);
        tree
    }

    fn grow<L>(
        &mut self,
        x: &Array2<f64>,
        target: &[f64],
        rows: Vec<usize>,
        depth: usize,
        params: &TreeParams,
        leaf_value: &L,
    ) -> usize
    where
        L: Fn(&[usize]) -> f64,
    {
        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: leaf_value(&rows),
        });
        if depth >= params.max_depth || rows.len() < params.min_samples_split.max(2) {
            return idx;
        }
        let Some(split) = best_split(x, target, &rows, params.min_samples_leaf.max(1)) else {
            return idx;
        };
        let (l, r): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&i| x[[i, split.feature]] <= split.threshold);
        let left = self.grow(x, target, l, depth + 1, params, leaf_value);
        let right = self.grow(x, target, r, depth + 1, params, leaf_value);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
            gain: split.gain,
        };
        idx
    }

    pub fn predict(&self, x: &[f64]) -> f64 {
        let mut i = 0;
        loop {
            match self.nodes.get(i) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                }) => {
                    let v = x.get(*feature).copied().unwrap_or(f64::NAN);
                    // NaN goes right, like a failed `<=`
                    i = if v <= *threshold { *left } else { *right };
                }
                None => return f64::NAN,
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], i: usize) -> usize {
            match nodes.get(i) {
                Some(Node::Split { left, right, .. }) => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }

    /// Total split gain per feature.
    pub fn feature_gains(&self, n_features: usize) -> Vec<f64> {
        let mut out = vec![0.0; n_features];
        for node in &self.nodes {
            if let Node::Split { feature, gain, .. } = node {
                if let Some(slot) = out.get_mut(*feature) {
                    *slot += gain;
                }
            }
        }
        out
    }

    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".into());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Leaf { value } if !value.is_finite() => {
                    return Err(format!("node {i}: non-finite leaf value"));
                }
                Node::Leaf { .. } => {}
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    if *feature >= n_features {
                        return Err(format!("node {i}: feature {feature} out of range"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {i}: non-finite threshold"));
                    }
                    for child in [left, right] {
                        if *child <= i || *child >= self.nodes.len() {
                            return Err(format!("node {i}: child {child} out of order"));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Exhaustive search over sorted feature values using prefix sums.
fn best_split(x: &Array2<f64>, target: &[f64], rows: &[usize], min_leaf: usize) -> Option<Split> {
    let n = rows.len();
    let total: f64 = rows.iter().map(|&i| target[i]).sum();
    let parent = total * total / n as f64;
    let mut best: Option<Split> = None;
    let mut sorted = rows.to_vec();

    for feature in 0..x.ncols() {
        sorted.sort_by(|a, b| x[[*a, feature]].total_cmp(&x[[*b, feature]]));
        let mut left_sum = 0.0;
        for k in 0..n - 1 {
            left_sum += target[sorted[k]];
            let n_left = k + 1;
            let n_right = n - n_left;
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }
            let here = x[[sorted[k], feature]];
            let next = x[[sorted[k + 1], feature]];
            if here == next {
                continue;
            }
            let right_sum = total - left_sum;
            let gain = left_sum * left_sum / n_left as f64 + right_sum * right_sum / n_right as f64
                - parent;
            if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(Split {
                    feature,
                    threshold: (here + next) / 2.0,
                    gain,
                });
            }
        }
    }
    best
}

/// Mean of `target` over `rows`; zero for an empty set.
pub fn mean_of(target: &[f64], rows: &[usize]) -> f64 {
    if rows.is_empty() {
        0.0
    } else {
        rows.iter().map(|&i| target[i]).sum::<f64>() / rows.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn params(max_depth: usize) -> TreeParams {
        TreeParams {
            max_depth,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }

    #[test]
    fn splits_step_function() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = [0.0, 0.0, 0.0, 5.0, 5.0, 5.0];
        let rows: Vec<usize> = (0..6).collect();
        let t = RegressionTree::fit(&x, &y, &rows, &params(3), |r| mean_of(&y, r));
        assert_eq!(t.predict(&[0.0]), 0.0);
        assert_eq!(t.predict(&[20.0]), 5.0);
        assert_eq!(t.depth(), 1);
        assert!(t.validate(1).is_ok());
        match &t.nodes[0] {
            Node::Split { threshold, .. } => assert_eq!(*threshold, 6.5),
            other => panic!("expected split, got {other:?}"),
        }
    }

    #[test]
    fn respects_max_depth_and_constant_targets() {
        let x = array![[1.0, 0.0], [2.0, 1.0], [3.0, 0.0], [4.0, 1.0]];
        let y = [1.0, 2.0, 3.0, 4.0];
        let rows: Vec<usize> = (0..4).collect();
        let stump = RegressionTree::fit(&x, &y, &rows, &params(1), |r| mean_of(&y, r));
        assert!(stump.depth() <= 1);

        let flat = [7.0; 4];
        let t = RegressionTree::fit(&x, &flat, &rows, &params(5), |r| mean_of(&flat, r));
        assert_eq!(t.nodes.len(), 1);
        assert_eq!(t.predict(&[100.0, 100.0]), 7.0);
    }

    #[test]
    fn gains_attribute_to_split_feature() {
        let x = array![[0.0, 1.0], [0.0, 2.0], [0.0, 3.0], [0.0, 4.0]];
        let y = [0.0, 0.0, 1.0, 1.0];
        let rows: Vec<usize> = (0..4).collect();
        let t = RegressionTree::fit(&x, &y, &rows, &params(2), |r| mean_of(&y, r));
        let g = t.feature_gains(2);
        assert_eq!(g[0], 0.0);
        assert!(g[1] > 0.0);
    }

    #[test]
    fn validate_rejects_backward_child() {
        let t = RegressionTree {
            nodes: vec![
                Node::Split {
                    feature: 0,
                    threshold: 1.0,
                    left: 0,
                    right: 1,
                    gain: 1.0,
                },
                Node::Leaf { value: 1.0 },
            ],
        };
        assert!(t.validate(1).is_err());
        assert!(RegressionTree::leaf(1.0).validate(0).is_ok());
    }
}
