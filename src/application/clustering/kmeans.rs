//! Lloyd's k-means with k-means++ seeding and best-of-n restarts.

use super::{ClusterEngine, canonicalize_labels, validate_fit_input};
use crate::domain::clustering::DistanceModel;
use crate::domain::clustering::distance::squared_euclidean;
use crate::domain::errors::AnalyticsError;
use crate::domain::market::volatility_profile::ProfileMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct KMeansConfig {
    /// Independent restarts; the lowest-inertia run wins
    pub n_init: usize,
    pub max_iter: usize,
    /// Convergence tolerance on centroid movement
    pub tol: f64,
    pub seed: u64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            n_init: 10,
            max_iter: 300,
            tol: 1e-4,
            seed: 42,
        }
    }
}

/// Result of one clustering run.
#[derive(Debug, Clone)]
pub(crate) struct RunResult {
    pub labels: Vec<usize>,
    pub centroids: Vec<Vec<f64>>,
    pub inertia: f64,
}

/// k-means++ seeding: the first centroid uniformly, each further one with
/// probability proportional to its squared distance from the nearest chosen
/// centroid.
pub(crate) fn kmeans_plus_plus<F>(
    rows: &[Vec<f64>],
    k: usize,
    rng: &mut StdRng,
    dist_sq: F,
) -> Vec<Vec<f64>>
where
    F: Fn(&[f64], &[f64]) -> f64,
{
    let n = rows.len();
    let mut centroids = Vec::with_capacity(k);
    centroids.push(rows[rng.random_range(0..n)].clone());

    let mut closest: Vec<f64> = rows.iter().map(|r| dist_sq(r, &centroids[0])).collect();
    while centroids.len() < k {
        let total: f64 = closest.iter().sum();
        let pick = if total > 0.0 && total.is_finite() {
            let target = rng.random::<f64>() * total;
            let mut cumulative: f64 = 0.0;
            let mut chosen = n - 1;
            for (i, d) in closest.iter().enumerate() {
                cumulative += d;
                if cumulative >= target && *d > 0.0 {
                    chosen = i;
                    break;
                }
            }
            chosen
        } else {
            // All points coincide with a centroid already
            rng.random_range(0..n)
        };

        let centroid = rows[pick].clone();
        for (c, row) in closest.iter_mut().zip(rows) {
            *c = c.min(dist_sq(row, &centroid));
        }
        centroids.push(centroid);
    }
    centroids
}

/// Index of and squared distance to the nearest centroid; ties go to the
/// lower index.
pub(crate) fn nearest<F>(row: &[f64], centroids: &[Vec<f64>], dist_sq: F) -> (usize, f64)
where
    F: Fn(&[f64], &[f64]) -> f64,
{
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, dist_sq(row, c)))
        .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
}

/// Assigns every row; returns labels, per-row squared distances and the
/// total inertia.
pub(crate) fn assign<F>(rows: &[Vec<f64>], centroids: &[Vec<f64>], dist_sq: F) -> (Vec<usize>, Vec<f64>, f64)
where
    F: Fn(&[f64], &[f64]) -> f64,
{
    let (labels, dists): (Vec<usize>, Vec<f64>) = rows
        .iter()
        .map(|row| nearest(row, centroids, &dist_sq))
        .unzip();
    let inertia = dists.iter().sum();
    (labels, dists, inertia)
}

/// Moves the row farthest from its centroid into each empty cluster.
pub(crate) fn reseed_empty_clusters(
    rows: &[Vec<f64>],
    labels: &mut [usize],
    dists: &mut [f64],
    centroids: &mut [Vec<f64>],
) {
    let k = centroids.len();
    for cluster in 0..k {
        if labels.contains(&cluster) {
            continue;
        }
        let donor = dists
            .iter()
            .enumerate()
            .filter(|(i, _)| labels.iter().filter(|&&l| l == labels[*i]).count() > 1)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        if let Some(i) = donor {
            centroids[cluster] = rows[i].clone();
            labels[i] = cluster;
            dists[i] = 0.0;
        }
    }
}

fn mean_feature_variance(rows: &[Vec<f64>]) -> f64 {
    let n = rows.len() as f64;
    let width = rows[0].len();
    let mut total = 0.0;
    for j in 0..width {
        let mean = rows.iter().map(|r| r[j]).sum::<f64>() / n;
        total += rows.iter().map(|r| (r[j] - mean).powi(2)).sum::<f64>() / n;
    }
    total / width as f64
}

#[derive(Debug, Clone)]
pub struct EuclideanKMeans {
    config: KMeansConfig,
    labels: Option<Vec<usize>>,
    centroids: Vec<Vec<f64>>,
    inertia: Option<f64>,
}

impl EuclideanKMeans {
    pub fn new(config: KMeansConfig) -> Self {
        Self {
            config,
            labels: None,
            centroids: Vec::new(),
            inertia: None,
        }
    }

    pub fn centroids(&self) -> &[Vec<f64>] {
        &self.centroids
    }

    fn run_once(&self, rows: &[Vec<f64>], k: usize, rng: &mut StdRng, tol: f64) -> RunResult {
        let mut centroids = kmeans_plus_plus(rows, k, rng, squared_euclidean);
        let width = rows[0].len();

        for iter in 0..self.config.max_iter {
            let (mut labels, mut dists, _) = assign(rows, &centroids, squared_euclidean);
            reseed_empty_clusters(rows, &mut labels, &mut dists, &mut centroids);

            let mut sums = vec![vec![0.0f64; width]; k];
            let mut counts = vec![0usize; k];
            for (row, &label) in rows.iter().zip(&labels) {
                counts[label] += 1;
                for (s, v) in sums[label].iter_mut().zip(row) {
                    *s += v;
                }
            }

            let mut shift = 0.0;
            for c in 0..k {
                if counts[c] == 0 {
                    continue;
                }
                let updated: Vec<f64> = sums[c].iter().map(|s| s / counts[c] as f64).collect();
                shift += squared_euclidean(&updated, &centroids[c]);
                centroids[c] = updated;
            }

            if shift <= tol {
                debug!("k-means converged after {} iterations", iter + 1);
                break;
            }
        }

        let (labels, _, inertia) = assign(rows, &centroids, squared_euclidean);
        RunResult {
            labels,
            centroids,
            inertia,
        }
    }
}

impl ClusterEngine for EuclideanKMeans {
    fn distance_model(&self) -> DistanceModel {
        DistanceModel::Euclidean
    }

    fn fit_predict(&mut self, matrix: &ProfileMatrix, k: usize) -> Result<Vec<usize>, AnalyticsError> {
        validate_fit_input(matrix, k)?;
        let rows = matrix.rows();
        let tol = self.config.tol * mean_feature_variance(rows);
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        let mut best: Option<RunResult> = None;
        for _ in 0..self.config.n_init.max(1) {
            let run = self.run_once(rows, k, &mut rng, tol);
            if best.as_ref().is_none_or(|b| run.inertia < b.inertia) {
                best = Some(run);
            }
        }
        let mut best = best.ok_or(AnalyticsError::NotFitted)?;

        let mapping = canonicalize_labels(&mut best.labels, k);
        let mut centroids = vec![Vec::new(); k];
        for (old, centroid) in best.centroids.into_iter().enumerate() {
            centroids[mapping[old]] = centroid;
        }

        debug!("Euclidean k-means k={} inertia={:.4}", k, best.inertia);
        self.centroids = centroids;
        self.inertia = Some(best.inertia);
        self.labels = Some(best.labels.clone());
        Ok(best.labels)
    }

    fn inertia(&self) -> Option<f64> {
        self.inertia
    }

    fn labels(&self) -> Option<&[usize]> {
        self.labels.as_deref()
    }
}
