//! Isolation forest outlier detector.
//!
//! Scores follow the usual convention: `score_samples` is the negated
//! anomaly score in `[-1, 0)`, and `decision_function` shifts it by the
//! training-time offset so that negative values are outliers.

use rand::seq::{index, SliceRandom};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Error, PartialEq)]
pub enum ForestError {
    #[error("cannot fit on an empty training set")]
    EmptyTrainingSet,

    #[error("training row {row} has {got} features, expected {expected}")]
    RaggedRow { row: usize, expected: usize, got: usize },

    #[error("training row {row} contains a non-finite value")]
    NonFinite { row: usize },

    #[error("invalid hyperparameter: {0}")]
    InvalidParams(String),

    #[error("corrupt model: {0}")]
    Corrupt(String),
}

/// Hyperparameters for [`IsolationForest::fit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_samples: usize,
    /// Expected outlier fraction of the training set, in `(0, 0.5]`.
    pub contamination: f64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 300,
            max_samples: 256,
            contamination: 0.08,
        }
    }
}

impl ForestParams {
    fn check(&self) -> Result<(), ForestError> {
        if self.n_estimators == 0 {
            return Err(ForestError::InvalidParams("n_estimators must be > 0".into()));
        }
        if self.max_samples < 2 {
            return Err(ForestError::InvalidParams("max_samples must be >= 2".into()));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(ForestError::InvalidParams(format!(
                "contamination must be in (0, 0.5], got {}",
                self.contamination
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

/// One isolation tree, stored as a flat arena rooted at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationTree {
    nodes: Vec<TreeNode>,
}

impl IsolationTree {
    fn grow<R: Rng + ?Sized>(data: &[Vec<f64>], rows: Vec<usize>, max_depth: usize, rng: &mut R) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.split(data, rows, 0, max_depth, rng);
        tree
    }

    fn split<R: Rng + ?Sized>(
        &mut self,
        data: &[Vec<f64>],
        rows: Vec<usize>,
        depth: usize,
        max_depth: usize,
        rng: &mut R,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(TreeNode::Leaf { size: rows.len() });
        if depth >= max_depth || rows.len() <= 1 {
            return id;
        }

        // Only features that still vary inside this node can separate it.
        let n_features = data[rows[0]].len();
        let mut candidates = Vec::with_capacity(n_features);
        for f in 0..n_features {
            let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
                (lo.min(data[r][f]), hi.max(data[r][f]))
            });
            if hi > lo {
                candidates.push((f, lo, hi));
            }
        }
        let Some(&(feature, lo, hi)) = candidates.choose(rng) else {
            return id;
        };

        let threshold = rng.gen_range(lo..hi);
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.into_iter().partition(|&r| data[r][feature] < threshold);

        let left = self.split(data, left_rows, depth + 1, max_depth, rng);
        let right = self.split(data, right_rows, depth + 1, max_depth, rng);
        self.nodes[id] = TreeNode::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    /// Every split must name a known feature and point at children stored
    /// after it, which also rules out cycles.
    fn check(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".into());
        }
        for (id, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } = node
            {
                if *feature >= n_features {
                    return Err(format!("node {} splits on feature {} of {}", id, feature, n_features));
                }
                if !threshold.is_finite() {
                    return Err(format!("node {} has a non-finite threshold", id));
                }
                for child in [*left, *right] {
                    if child <= id || child >= self.nodes.len() {
                        return Err(format!("node {} has out-of-order child {}", id, child));
                    }
                }
            }
        }
        Ok(())
    }

    /// Depth at which `x` is isolated, corrected for unsplit leaf sizes.
    fn path_length(&self, x: &[f64]) -> f64 {
        let mut node = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[node] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if x[*feature] < *threshold { *left } else { *right };
                    depth += 1.0;
                }
                TreeNode::Leaf { size } => return depth + average_path_length(*size),
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` points.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated percentile (`q` in `[0, 100]`) of an unsorted sample.
fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// A fitted isolation forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    n_features: usize,
    sample_size: usize,
    offset: f64,
    trees: Vec<IsolationTree>,
}

impl IsolationForest {
    /// Fit on `data` (rows of equal length). The decision offset is set so
    /// that `params.contamination` of the training rows fall below zero.
    pub fn fit<R: Rng + ?Sized>(
        data: &[Vec<f64>],
        params: &ForestParams,
        rng: &mut R,
    ) -> Result<Self, ForestError> {
        params.check()?;
        let first = data.first().ok_or(ForestError::EmptyTrainingSet)?;
        let n_features = first.len();
        for (row, values) in data.iter().enumerate() {
            if values.len() != n_features {
                return Err(ForestError::RaggedRow {
                    row,
                    expected: n_features,
                    got: values.len(),
                });
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(ForestError::NonFinite { row });
            }
        }

        let sample_size = params.max_samples.min(data.len());
        let max_depth = (sample_size.max(2) as f64).log2().ceil() as usize;

        let trees = (0..params.n_estimators)
            .map(|_| {
                let rows = index::sample(rng, data.len(), sample_size).into_vec();
                IsolationTree::grow(data, rows, max_depth, rng)
            })
            .collect();

        let mut forest = Self {
            n_features,
            sample_size,
            offset: 0.0,
            trees,
        };
        let train_scores: Vec<f64> = data.iter().map(|x| forest.score_samples(x)).collect();
        forest.offset = percentile(&train_scores, params.contamination * 100.0);
        Ok(forest)
    }

    /// Structural check of a deserialized forest. A forest that passes can be
    /// scored on any `n_features`-long input without panicking.
    pub fn check(&self) -> Result<(), ForestError> {
        if self.trees.is_empty() {
            return Err(ForestError::Corrupt("forest has no trees".into()));
        }
        if self.sample_size == 0 || !self.offset.is_finite() {
            return Err(ForestError::Corrupt(format!(
                "bad sample size {} or offset {}",
                self.sample_size, self.offset
            )));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.check(self.n_features)
                .map_err(|reason| ForestError::Corrupt(format!("tree {}: {}", i, reason)))?;
        }
        Ok(())
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Negated anomaly score: closer to -1 is more anomalous.
    pub fn score_samples(&self, x: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let mean_depth =
            self.trees.iter().map(|t| t.path_length(x)).sum::<f64>() / self.trees.len() as f64;
        let norm = average_path_length(self.sample_size);
        if norm <= 0.0 {
            return -1.0;
        }
        -(2f64.powf(-mean_depth / norm))
    }

    /// Offset-shifted score; negative means outlier.
    pub fn decision_function(&self, x: &[f64]) -> f64 {
        self.score_samples(x) - self.offset
    }

    pub fn is_outlier(&self, x: &[f64]) -> bool {
        self.decision_function(x) < 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn grid() -> Vec<Vec<f64>> {
        let mut rows = Vec::new();
        for i in 0..15 {
            for j in 0..15 {
                rows.push(vec![i as f64 / 14.0, j as f64 / 14.0]);
            }
        }
        rows
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        let c256 = average_path_length(256);
        assert!(c256 > 10.0 && c256 < 10.5, "c(256) = {}", c256);
    }

    #[test]
    fn test_percentile_interpolates() {
        let v = [4.0, 1.0, 3.0, 2.0, 5.0];
        assert_eq!(percentile(&v, 0.0), 1.0);
        assert_eq!(percentile(&v, 50.0), 3.0);
        assert_eq!(percentile(&v, 100.0), 5.0);
        assert_eq!(percentile(&v, 12.5), 1.5);
    }

    #[test]
    fn test_far_point_is_outlier() {
        let mut rng = StdRng::seed_from_u64(7);
        let params = ForestParams {
            n_estimators: 100,
            ..Default::default()
        };
        let forest = IsolationForest::fit(&grid(), &params, &mut rng).unwrap();

        assert!(forest.is_outlier(&[50.0, 50.0]));
        assert!(!forest.is_outlier(&[0.5, 0.5]));
        assert!(forest.decision_function(&[50.0, 50.0]) < forest.decision_function(&[0.5, 0.5]));

        let s = forest.score_samples(&[0.5, 0.5]);
        assert!(s < 0.0 && s > -1.0);
    }

    #[test]
    fn test_contamination_fraction() {
        let mut rng = StdRng::seed_from_u64(42);
        let data = grid();
        let forest = IsolationForest::fit(&data, &ForestParams::default(), &mut rng).unwrap();
        let flagged = data.iter().filter(|x| forest.is_outlier(x)).count();
        let fraction = flagged as f64 / data.len() as f64;
        assert!(fraction <= 0.08 + 1e-9, "flagged fraction {}", fraction);
        assert!(fraction > 0.03, "flagged fraction {}", fraction);
    }

    #[test]
    fn test_fit_is_seed_deterministic() {
        let a = IsolationForest::fit(&grid(), &ForestParams::default(), &mut StdRng::seed_from_u64(1)).unwrap();
        let b = IsolationForest::fit(&grid(), &ForestParams::default(), &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_constant_data_does_not_panic() {
        let data = vec![vec![1.0, 1.0]; 20];
        let mut rng = StdRng::seed_from_u64(3);
        let forest = IsolationForest::fit(&data, &ForestParams::default(), &mut rng).unwrap();
        assert!(forest.score_samples(&[1.0, 1.0]).is_finite());
    }

    #[test]
    fn test_fitted_forest_passes_check() {
        let forest = IsolationForest::fit(&grid(), &ForestParams::default(), &mut StdRng::seed_from_u64(4)).unwrap();
        assert_eq!(forest.check(), Ok(()));
    }

    #[test]
    fn test_check_catches_corrupt_trees() {
        let forest = IsolationForest::fit(&grid(), &ForestParams::default(), &mut StdRng::seed_from_u64(4)).unwrap();
        let first_split = forest.trees[0]
            .nodes
            .iter()
            .position(|n| matches!(n, TreeNode::Split { .. }))
            .unwrap();

        let mut bad_feature = forest.clone();
        if let TreeNode::Split { feature, .. } = &mut bad_feature.trees[0].nodes[first_split] {
            *feature = 99;
        }
        assert!(matches!(bad_feature.check(), Err(ForestError::Corrupt(_))));

        let mut cycle = forest.clone();
        if let TreeNode::Split { left, .. } = &mut cycle.trees[0].nodes[first_split] {
            *left = first_split;
        }
        assert!(matches!(cycle.check(), Err(ForestError::Corrupt(_))));

        let mut dangling = forest.clone();
        let len = dangling.trees[0].nodes.len();
        if let TreeNode::Split { right, .. } = &mut dangling.trees[0].nodes[first_split] {
            *right = len;
        }
        assert!(matches!(dangling.check(), Err(ForestError::Corrupt(_))));

        let mut empty = forest;
        empty.trees[1].nodes.clear();
        assert!(matches!(empty.check(), Err(ForestError::Corrupt(_))));
    }

    #[test]
    fn test_rejects_bad_input() {
        let mut rng = StdRng::seed_from_u64(0);
        let params = ForestParams::default();
        assert_eq!(
            IsolationForest::fit(&[], &params, &mut rng),
            Err(ForestError::EmptyTrainingSet)
        );
        let ragged = vec![vec![1.0, 2.0], vec![1.0]];
        assert!(matches!(
            IsolationForest::fit(&ragged, &params, &mut rng),
            Err(ForestError::RaggedRow { row: 1, .. })
        ));
        let bad = ForestParams {
            contamination: 0.9,
            ..Default::default()
        };
        assert!(matches!(
            IsolationForest::fit(&grid(), &bad, &mut rng),
            Err(ForestError::InvalidParams(_))
        ));
    }
}
