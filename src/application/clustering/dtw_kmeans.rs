//! k-means under Dynamic Time Warping, with DTW Barycenter Averaging (DBA)
//! for centroid updates.

use super::kmeans::{KMeansConfig, RunResult, assign, kmeans_plus_plus, reseed_empty_clusters};
use super::{ClusterEngine, canonicalize_labels, validate_fit_input};
use crate::domain::clustering::DistanceModel;
use crate::domain::clustering::distance::{dtw_distance, dtw_path};
use crate::domain::errors::AnalyticsError;
use crate::domain::market::volatility_profile::ProfileMatrix;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

fn dtw_sq(a: &[f64], b: &[f64]) -> f64 {
    dtw_distance(a, b).powi(2)
}

/// One DBA refinement: every centroid position becomes the mean of the
/// member values aligned to it along each optimal warping path.
pub fn dba_step(centroid: &[f64], members: &[&[f64]]) -> Vec<f64> {
    let mut sums = vec![0.0f64; centroid.len()];
    let mut counts = vec![0usize; centroid.len()];
    for member in members {
        for (i, j) in dtw_path(centroid, member) {
            sums[i] += member[j];
            counts[i] += 1;
        }
    }
    sums.iter()
        .zip(&counts)
        .zip(centroid)
        .map(|((s, &c), &old)| if c > 0 { s / c as f64 } else { old })
        .collect()
}

/// Iterated DBA starting from `init`.
pub fn dba_barycenter(init: &[f64], members: &[&[f64]], iterations: usize) -> Vec<f64> {
    let mut centroid = init.to_vec();
    if members.is_empty() {
        return centroid;
    }
    for _ in 0..iterations {
        let updated = dba_step(&centroid, members);
        let moved: f64 = updated
            .iter()
            .zip(&centroid)
            .map(|(a, b)| (a - b).powi(2))
            .sum();
        centroid = updated;
        if moved < 1e-12 {
            break;
        }
    }
    centroid
}

/// k-means under DTW with DBA barycenters.
///
/// Inertia is the plain sum over items of the squared DTW distance to the
/// assigned barycenter. It is not divided by the item count.
#[derive(Debug, Clone)]
pub struct DtwKMeans {
    config: KMeansConfig,
    dba_iter: usize,
    labels: Option<Vec<usize>>,
    centroids: Vec<Vec<f64>>,
    inertia: Option<f64>,
}

impl DtwKMeans {
    pub fn new(config: KMeansConfig, dba_iter: usize) -> Self {
        Self {
            config,
            dba_iter,
            labels: None,
            centroids: Vec::new(),
            inertia: None,
        }
    }

    pub fn centroids(&self) -> &[Vec<f64>] {
        &self.centroids
    }

    fn run_once(&self, rows: &[Vec<f64>], k: usize, rng: &mut StdRng) -> RunResult {
        let mut centroids = kmeans_plus_plus(rows, k, rng, dtw_sq);
        let mut previous = f64::INFINITY;

        for iter in 0..self.config.max_iter {
            let (mut labels, mut dists, inertia) = assign(rows, &centroids, dtw_sq);
            if (previous - inertia).abs() <= self.config.tol {
                debug!("DTW k-means converged after {} iterations", iter);
                break;
            }
            previous = inertia;
            reseed_empty_clusters(rows, &mut labels, &mut dists, &mut centroids);

            for (c, centroid) in centroids.iter_mut().enumerate() {
                let members: Vec<&[f64]> = rows
                    .iter()
                    .zip(&labels)
                    .filter(|(_, l)| **l == c)
                    .map(|(r, _)| r.as_slice())
                    .collect();
                *centroid = dba_barycenter(centroid, &members, self.dba_iter);
            }
        }

        let (labels, _, inertia) = assign(rows, &centroids, dtw_sq);
        RunResult {
            labels,
            centroids,
            inertia,
        }
    }
}

impl ClusterEngine for DtwKMeans {
    fn distance_model(&self) -> DistanceModel {
        DistanceModel::Dtw
    }

    fn fit_predict(&mut self, matrix: &ProfileMatrix, k: usize) -> Result<Vec<usize>, AnalyticsError> {
        validate_fit_input(matrix, k)?;
        let rows = matrix.rows();
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        let mut best: Option<RunResult> = None;
        for _ in 0..self.config.n_init.max(1) {
            let run = self.run_once(rows, k, &mut rng);
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

        debug!("DTW k-means k={} inertia={:.4}", k, best.inertia);
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
