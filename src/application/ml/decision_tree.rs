//! Weighted binary classification tree (Gini impurity), the ensemble member
//! of the direction forest.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Decision tree configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Maximum depth of tree
    pub max_depth: usize,
    /// Minimum (weighted-by-count) samples required to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf node
    pub min_samples_leaf: usize,
    /// Features considered per split (None = all)
    pub max_features: Option<usize>,
    /// Random seed for feature subsampling
    pub seed: u64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        /// Weighted fraction of class 1 among the leaf's samples.
        up_probability: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Training view shared by every node of one tree.
struct TrainingData<'a> {
    x: &'a [Vec<f64>],
    y: &'a [u8],
    weights: &'a [f64],
}

impl TrainingData<'_> {
    /// Weighted (class 0, class 1) totals over `indices`.
    fn class_weights(&self, indices: &[usize]) -> (f64, f64) {
        indices.iter().fold((0.0, 0.0), |(w0, w1), &i| {
            if self.y[i] == 1 {
                (w0, w1 + self.weights[i])
            } else {
                (w0 + self.weights[i], w1)
            }
        })
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    decrease: f64,
}

fn gini(w0: f64, w1: f64) -> f64 {
    let total = w0 + w1;
    if total <= 0.0 {
        return 0.0;
    }
    let p0 = w0 / total;
    let p1 = w1 / total;
    1.0 - p0 * p0 - p1 * p1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    config: TreeConfig,
    root: Option<TreeNode>,
    feature_importances: Vec<f64>,
}

impl DecisionTree {
    pub fn new(config: TreeConfig) -> Self {
        Self {
            config,
            root: None,
            feature_importances: Vec::new(),
        }
    }

    /// Trains on the rows named by `indices` (duplicates allowed, as produced
    /// by bootstrap sampling). `weights` are per-row sample weights.
    pub fn fit(&mut self, x: &[Vec<f64>], y: &[u8], weights: &[f64], indices: &[usize]) {
        let n_features = x.first().map(|r| r.len()).unwrap_or(0);
        self.feature_importances = vec![0.0; n_features];
        let data = TrainingData { x, y, weights };
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        let root = self.build(&data, indices.to_vec(), 0, &mut rng);
        self.root = Some(root);

        // Normalize feature importances
        let sum: f64 = self.feature_importances.iter().sum();
        if sum > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= sum;
            }
        }
    }

    fn build(
        &mut self,
        data: &TrainingData<'_>,
        indices: Vec<usize>,
        depth: usize,
        rng: &mut StdRng,
    ) -> TreeNode {
        let (w0, w1) = data.class_weights(&indices);
        let leaf = TreeNode::Leaf {
            up_probability: if w0 + w1 > 0.0 { w1 / (w0 + w1) } else { 0.5 },
        };

        if depth >= self.config.max_depth
            || indices.len() < self.config.min_samples_split
            || w0 == 0.0
            || w1 == 0.0
        {
            return leaf;
        }

        let Some(split) = self.find_best_split(data, &indices, (w0, w1), rng) else {
            return leaf;
        };

        self.feature_importances[split.feature] += split.decrease;
        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| data.x[i][split.feature] <= split.threshold);

        TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: Box::new(self.build(data, left_idx, depth + 1, rng)),
            right: Box::new(self.build(data, right_idx, depth + 1, rng)),
        }
    }

    /// Sorted sweep over candidate features; thresholds are midpoints
    /// between consecutive distinct values.
    fn find_best_split(
        &self,
        data: &TrainingData<'_>,
        indices: &[usize],
        (w0, w1): (f64, f64),
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        let n_features = self.feature_importances.len();
        let max_features = self.config.max_features.unwrap_or(n_features).clamp(1, n_features);

        let mut features: Vec<usize> = (0..n_features).collect();
        features.shuffle(rng);
        features.truncate(max_features);

        let total = w0 + w1;
        let parent = gini(w0, w1) * total;
        let min_leaf = self.config.min_samples_leaf.max(1);
        let mut best: Option<SplitCandidate> = None;

        let mut sorted = indices.to_vec();
        for &feature in &features {
            sorted.sort_by(|&a, &b| data.x[a][feature].total_cmp(&data.x[b][feature]));

            let (mut l0, mut l1) = (0.0, 0.0);
            for pos in 0..sorted.len() - 1 {
                let i = sorted[pos];
                if data.y[i] == 1 {
                    l1 += data.weights[i];
                } else {
                    l0 += data.weights[i];
                }

                let here = data.x[i][feature];
                let next = data.x[sorted[pos + 1]][feature];
                if next <= here {
                    continue;
                }
                let n_left = pos + 1;
                if n_left < min_leaf || sorted.len() - n_left < min_leaf {
                    continue;
                }

                let (r0, r1) = (w0 - l0, w1 - l1);
                let children = gini(l0, l1) * (l0 + l1) + gini(r0, r1) * (r0 + r1);
                let decrease = parent - children;
                if decrease > 1e-12 && best.as_ref().is_none_or(|b| decrease > b.decrease) {
                    let mut threshold = (here + next) / 2.0;
                    // Midpoint can round up to `next` for adjacent floats
                    if threshold >= next {
                        threshold = here;
                    }
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        decrease,
                    });
                }
            }
        }

        best
    }

    /// Up-probability for one sample.
    pub fn predict_proba_one(&self, features: &[f64]) -> f64 {
        let mut node = match &self.root {
            Some(root) => root,
            None => return 0.5,
        };
        loop {
            match node {
                TreeNode::Leaf { up_probability } => return *up_probability,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if features[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn depth(&self) -> usize {
        self.root.as_ref().map(|r| r.depth()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<Vec<f64>>, Vec<u8>) {
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let y: Vec<u8> = (0..20).map(|i| u8::from(i >= 10)).collect();
        (x, y)
    }

    #[test]
    fn test_tree_learns_threshold() {
        let (x, y) = separable();
        let weights = vec![1.0; x.len()];
        let indices: Vec<usize> = (0..x.len()).collect();
        let mut tree = DecisionTree::new(TreeConfig::default());
        tree.fit(&x, &y, &weights, &indices);

        assert_eq!(tree.predict_proba_one(&[2.0, 0.0]), 0.0);
        assert_eq!(tree.predict_proba_one(&[15.0, 1.0]), 1.0);
        assert!((tree.feature_importances()[0] - 1.0).abs() < 1e-12);
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn test_depth_is_bounded() {
        let x: Vec<Vec<f64>> = (0..64).map(|i| vec![i as f64]).collect();
        let y: Vec<u8> = (0..64).map(|i| (i % 2) as u8).collect();
        let weights = vec![1.0; 64];
        let indices: Vec<usize> = (0..64).collect();
        let mut tree = DecisionTree::new(TreeConfig {
            max_depth: 3,
            ..Default::default()
        });
        tree.fit(&x, &y, &weights, &indices);
        assert!(tree.depth() <= 3);
    }

    #[test]
    fn test_leaf_probability_is_weighted() {
        // Single feature value: no split possible, leaf holds the weighted ratio
        let x = vec![vec![1.0]; 4];
        let y = vec![1, 0, 0, 0];
        let weights = vec![3.0, 1.0, 1.0, 1.0];
        let indices: Vec<usize> = (0..4).collect();
        let mut tree = DecisionTree::new(TreeConfig::default());
        tree.fit(&x, &y, &weights, &indices);
        assert!((tree.predict_proba_one(&[1.0]) - 0.5).abs() < 1e-12);
    }
}
