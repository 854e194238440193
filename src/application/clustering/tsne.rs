//! Exact t-SNE for small profile sets (O(n²) per iteration).

use crate::domain::clustering::distance::squared_euclidean;
use crate::domain::errors::AnalyticsError;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct TsneConfig {
    pub perplexity: f64,
    pub n_iter: usize,
    pub early_exaggeration: f64,
    /// Iterations run with exaggerated affinities and low momentum
    pub exaggeration_iter: usize,
    /// `None` uses `max(n / early_exaggeration / 4, 50)`
    pub learning_rate: Option<f64>,
    pub seed: u64,
}

impl TsneConfig {
    /// Defaults for `n` items; perplexity is `min(30, n - 1)`.
    pub fn for_items(n: usize, seed: u64) -> Self {
        Self {
            perplexity: (n.saturating_sub(1)).min(30) as f64,
            n_iter: 1000,
            early_exaggeration: 12.0,
            exaggeration_iter: 250,
            learning_rate: None,
            seed,
        }
    }
}

const ENTROPY_TOL: f64 = 1e-5;
const BINARY_SEARCH_STEPS: usize = 100;
const MIN_PROBABILITY: f64 = 1e-12;
const MIN_GAIN: f64 = 0.01;

/// Row `i` conditional affinities `p_{j|i}` with the precision tuned so the
/// row entropy matches `ln(perplexity)`.
fn conditional_row(dist_sq: &[f64], i: usize, target_entropy: f64) -> Vec<f64> {
    let n = dist_sq.len();
    let mut beta: f64 = 1.0;
    let (mut beta_min, mut beta_max) = (f64::NEG_INFINITY, f64::INFINITY);
    let mut row = vec![0.0f64; n];

    for _ in 0..BINARY_SEARCH_STEPS {
        let mut sum: f64 = 0.0;
        for j in 0..n {
            row[j] = if j == i { 0.0 } else { (-dist_sq[j] * beta).exp() };
            sum += row[j];
        }
        if sum <= 0.0 {
            sum = MIN_PROBABILITY;
        }
        let mut weighted: f64 = 0.0;
        for j in 0..n {
            weighted += dist_sq[j] * row[j];
            row[j] /= sum;
        }
        let entropy = sum.ln() + beta * weighted / sum;

        let diff = entropy - target_entropy;
        if diff.abs() < ENTROPY_TOL {
            break;
        }
        if diff > 0.0 {
            beta_min = beta;
            beta = if beta_max.is_infinite() { beta * 2.0 } else { (beta + beta_max) / 2.0 };
        } else {
            beta_max = beta;
            beta = if beta_min.is_infinite() { beta / 2.0 } else { (beta + beta_min) / 2.0 };
        }
    }
    row
}

/// Symmetrized joint affinities `P`.
fn joint_probabilities(rows: &[Vec<f64>], perplexity: f64) -> Vec<Vec<f64>> {
    let n = rows.len();
    let dist_sq: Vec<Vec<f64>> = rows
        .iter()
        .map(|a| rows.iter().map(|b| squared_euclidean(a, b)).collect())
        .collect();

    let target_entropy = perplexity.ln();
    let conditional: Vec<Vec<f64>> = (0..n)
        .map(|i| conditional_row(&dist_sq[i], i, target_entropy))
        .collect();

    let mut p = vec![vec![0.0f64; n]; n];
    for i in 0..n {
        for j in 0..n {
            if i != j {
                p[i][j] = ((conditional[i][j] + conditional[j][i]) / (2.0 * n as f64)).max(MIN_PROBABILITY);
            }
        }
    }
    p
}

/// Embeds `rows` into two dimensions.
pub fn embed(rows: &[Vec<f64>], config: &TsneConfig) -> Result<Vec<[f64; 2]>, AnalyticsError> {
    let n = rows.len();
    if n < 2 {
        return Err(AnalyticsError::ProjectionFailed {
            reason: format!("t-SNE needs at least 2 items, got {}", n),
        });
    }
    if !(config.perplexity > 0.0 && config.perplexity < n as f64) {
        return Err(AnalyticsError::ProjectionFailed {
            reason: format!("perplexity must be in (0, {}), got {}", n, config.perplexity),
        });
    }

    let p = joint_probabilities(rows, config.perplexity);
    let learning_rate = config
        .learning_rate
        .unwrap_or_else(|| (n as f64 / config.early_exaggeration / 4.0).max(50.0));

    let mut rng = StdRng::seed_from_u64(config.seed);
    let init = Normal::new(0.0, 1e-4).map_err(|e| AnalyticsError::ProjectionFailed {
        reason: format!("Invalid init distribution: {}", e),
    })?;
    let mut y: Vec<[f64; 2]> = (0..n)
        .map(|_| [init.sample(&mut rng), init.sample(&mut rng)])
        .collect();
    let mut update = vec![[0.0f64; 2]; n];
    let mut gains = vec![[1.0f64; 2]; n];
    let mut num = vec![vec![0.0f64; n]; n];

    for iter in 0..config.n_iter {
        let early = iter < config.exaggeration_iter;
        let exaggeration = if early { config.early_exaggeration } else { 1.0 };
        let momentum = if early { 0.5 } else { 0.8 };

        // Student-t kernel in the embedding
        let mut z: f64 = 0.0;
        for i in 0..n {
            for j in (i + 1)..n {
                let d = (y[i][0] - y[j][0]).powi(2) + (y[i][1] - y[j][1]).powi(2);
                let q = 1.0 / (1.0 + d);
                num[i][j] = q;
                num[j][i] = q;
                z += 2.0 * q;
            }
        }
        let z = z.max(MIN_PROBABILITY);

        for i in 0..n {
            let mut grad = [0.0f64; 2];
            for j in 0..n {
                if i == j {
                    continue;
                }
                let q = (num[i][j] / z).max(MIN_PROBABILITY);
                let coeff = 4.0 * (exaggeration * p[i][j] - q) * num[i][j];
                grad[0] += coeff * (y[i][0] - y[j][0]);
                grad[1] += coeff * (y[i][1] - y[j][1]);
            }
            for d in 0..2 {
                gains[i][d] = if (grad[d] > 0.0) != (update[i][d] > 0.0) {
                    gains[i][d] + 0.2
                } else {
                    (gains[i][d] * 0.8).max(MIN_GAIN)
                };
                update[i][d] = momentum * update[i][d] - learning_rate * gains[i][d] * grad[d];
            }
        }

        for (point, step) in y.iter_mut().zip(&update) {
            point[0] += step[0];
            point[1] += step[1];
        }

        // Keep the embedding centred
        let (mx, my) = y
            .iter()
            .fold((0.0f64, 0.0f64), |(sx, sy), p| (sx + p[0], sy + p[1]));
        for point in y.iter_mut() {
            point[0] -= mx / n as f64;
            point[1] -= my / n as f64;
        }
    }

    if y.iter().flatten().any(|v| !v.is_finite()) {
        return Err(AnalyticsError::ProjectionFailed {
            reason: "t-SNE diverged".to_string(),
        });
    }
    debug!(
        "t-SNE embedded {} items (perplexity={}, lr={:.1})",
        n, config.perplexity, learning_rate
    );
    Ok(y)
}
