//! Bagged ensemble of weighted decision trees with class-balanced weights.

use super::decision_tree::{DecisionTree, TreeConfig};
use super::predictor::DirectionClassifier;
use crate::domain::errors::AnalyticsError;
use crate::domain::ml::feature_registry::FeatureVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Smallest training set the forest accepts.
pub const MIN_TRAINING_ROWS: usize = 2;

/// Random forest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees in the forest
    pub n_trees: usize,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Minimum samples required to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features considered per split (None = floor(sqrt(n_features)))
    pub max_features: Option<usize>,
    /// Bootstrap rows for each tree
    pub bootstrap: bool,
    /// Weight classes by `n / (2 * count_c)`
    pub balanced_classes: bool,
    /// Random seed
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: 5,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            balanced_classes: true,
            seed: 42,
        }
    }
}

/// Per-class weights `n / (2 * count_c)`; an absent class gets weight 0.
pub fn balanced_class_weights(y: &[u8]) -> [f64; 2] {
    let n = y.len() as f64;
    let up = y.iter().filter(|&&label| label == 1).count();
    let down = y.len() - up;
    let weight = |count: usize| {
        if count == 0 {
            0.0
        } else {
            n / (2.0 * count as f64)
        }
    };
    [weight(down), weight(up)]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    trees: Vec<DecisionTree>,
    feature_importances: Vec<f64>,
    n_features: usize,
}

impl RandomForestClassifier {
    /// Fits the ensemble. Labels must be 0 or 1 and every row must have the
    /// same width.
    pub fn fit(
        x: &[Vec<f64>],
        y: &[u8],
        config: ForestConfig,
    ) -> Result<Self, AnalyticsError> {
        if x.len() != y.len() {
            return Err(AnalyticsError::DimensionMismatch {
                reason: format!("{} feature rows but {} targets", x.len(), y.len()),
            });
        }
        if x.len() < MIN_TRAINING_ROWS {
            return Err(AnalyticsError::InsufficientHistory {
                needed: MIN_TRAINING_ROWS,
                available: x.len(),
            });
        }
        let n_features = x[0].len();
        if n_features == 0 || x.iter().any(|row| row.len() != n_features) {
            return Err(AnalyticsError::DimensionMismatch {
                reason: "feature rows must share a non-zero width".to_string(),
            });
        }

        let class_weights = if config.balanced_classes {
            balanced_class_weights(y)
        } else {
            [1.0, 1.0]
        };
        let weights: Vec<f64> = y.iter().map(|&label| class_weights[usize::from(label == 1)]).collect();
        let max_features = config
            .max_features
            .unwrap_or_else(|| ((n_features as f64).sqrt().floor() as usize).max(1));

        let n_samples = x.len();
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut trees = Vec::with_capacity(config.n_trees);

        for i in 0..config.n_trees {
            let indices: Vec<usize> = if config.bootstrap {
                (0..n_samples).map(|_| rng.random_range(0..n_samples)).collect()
            } else {
                (0..n_samples).collect()
            };

            let mut tree = DecisionTree::new(TreeConfig {
                max_depth: config.max_depth,
                min_samples_split: config.min_samples_split,
                min_samples_leaf: config.min_samples_leaf,
                max_features: Some(max_features),
                seed: config.seed.wrapping_add(i as u64 + 1),
            });
            tree.fit(x, y, &weights, &indices);
            trees.push(tree);
        }

        // Average tree importances, then renormalize
        let mut feature_importances = vec![0.0f64; n_features];
        for tree in &trees {
            for (acc, imp) in feature_importances.iter_mut().zip(tree.feature_importances()) {
                *acc += imp;
            }
        }
        let sum: f64 = feature_importances.iter().sum();
        if sum > 0.0 {
            for imp in &mut feature_importances {
                *imp /= sum;
            }
        }

        info!(
            "Trained random forest: {} trees, max_depth={}, {} rows, class weights [{:.3}, {:.3}]",
            trees.len(),
            config.max_depth,
            n_samples,
            class_weights[0],
            class_weights[1]
        );
        debug!("Feature importances: {:?}", feature_importances);

        Ok(Self {
            trees,
            feature_importances,
            n_features,
        })
    }

    /// Mean of the per-tree up-probabilities.
    pub fn predict_proba_row(&self, features: &[f64]) -> Result<f64, AnalyticsError> {
        if features.len() != self.n_features {
            return Err(AnalyticsError::DimensionMismatch {
                reason: format!(
                    "expected {} features, got {}",
                    self.n_features,
                    features.len()
                ),
            });
        }
        if self.trees.is_empty() {
            return Err(AnalyticsError::NotFitted);
        }
        let total: f64 = self
            .trees
            .iter()
            .map(|tree| tree.predict_proba_one(features))
            .sum();
        Ok(total / self.trees.len() as f64)
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

}

impl DirectionClassifier for RandomForestClassifier {
    fn predict_proba(&self, features: &FeatureVector) -> f64 {
        // Width is fixed by the registry, so only an empty forest can fail
        self.predict_proba_row(&features.to_array()).unwrap_or(0.5)
    }

    fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    fn name(&self) -> &str {
        "Random Forest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noisy_threshold_data(n: usize) -> (Vec<Vec<f64>>, Vec<u8>) {
        let x: Vec<Vec<f64>> = (0..n)
            .map(|i| {
                let a = (i as f64 * 0.37).sin();
                let b = (i as f64 * 1.91).cos();
                vec![a, b, a * b]
            })
            .collect();
        let y = x.iter().map(|row| u8::from(row[0] > 0.2)).collect();
        (x, y)
    }

    #[test]
    fn test_balanced_weights() {
        let y = [1, 0, 0, 0];
        let w = balanced_class_weights(&y);
        assert!((w[0] - 4.0 / 6.0).abs() < 1e-12);
        assert!((w[1] - 2.0).abs() < 1e-12);
        // Weighted class totals are equal
        assert!((w[0] * 3.0 - w[1]).abs() < 1e-12);
    }

    #[test]
    fn test_forest_learns_and_probabilities_bounded() {
        let (x, y) = noisy_threshold_data(200);
        let forest = RandomForestClassifier::fit(&x, &y, ForestConfig::default()).unwrap();
        assert_eq!(forest.n_trees(), 200);

        let mut correct = 0;
        for (row, &label) in x.iter().zip(&y) {
            let p = forest.predict_proba_row(row).unwrap();
            assert!((0.0..=1.0).contains(&p));
            if u8::from(p >= 0.5) == label {
                correct += 1;
            }
        }
        assert!(correct as f64 / x.len() as f64 > 0.85);

        let importances = forest.feature_importances();
        assert!((importances.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn test_fit_is_deterministic_for_seed() {
        let (x, y) = noisy_threshold_data(80);
        let a = RandomForestClassifier::fit(&x, &y, ForestConfig::default()).unwrap();
        let b = RandomForestClassifier::fit(&x, &y, ForestConfig::default()).unwrap();
        let probe = [0.1, -0.3, 0.05];
        assert_eq!(
            a.predict_proba_row(&probe).unwrap(),
            b.predict_proba_row(&probe).unwrap()
        );
    }

    #[test]
    fn test_rejects_bad_input() {
        let x = vec![vec![1.0, 2.0]];
        assert!(matches!(
            RandomForestClassifier::fit(&x, &[1], ForestConfig::default()),
            Err(AnalyticsError::InsufficientHistory { .. })
        ));
        let x = vec![vec![1.0, 2.0], vec![1.0]];
        assert!(matches!(
            RandomForestClassifier::fit(&x, &[1, 0], ForestConfig::default()),
            Err(AnalyticsError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_single_class_predicts_that_class() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let y = vec![1; 10];
        let forest = RandomForestClassifier::fit(&x, &y, ForestConfig::default()).unwrap();
        assert_eq!(forest.predict_proba_row(&[3.0]).unwrap(), 1.0);
    }
}
