//! Volatility-profile clustering: engines, elbow analysis, validation and
//! 2-D projection.
//!
//! Everything downstream of an engine (elbow sweep, evaluation, projection)
//! depends only on the [`ClusterEngine`] contract, never on a concrete
//! distance model.

pub mod dtw_kmeans;
pub mod elbow;
pub mod evaluation;
pub mod kmeans;
pub mod projection;
pub mod tsne;

use crate::domain::clustering::{ClusterAssignment, DistanceModel};
use crate::domain::errors::AnalyticsError;
use crate::domain::market::volatility_profile::ProfileMatrix;
use dtw_kmeans::DtwKMeans;
use kmeans::{EuclideanKMeans, KMeansConfig};
use serde::{Deserialize, Serialize};

/// Below this many profiles clustering is refused outright.
pub const MIN_CLUSTER_ITEMS: usize = 3;

/// Partitions a profile matrix into `k` groups.
pub trait ClusterEngine {
    fn distance_model(&self) -> DistanceModel;

    /// Fits on `matrix` and returns one label in `0..k` per row.
    fn fit_predict(&mut self, matrix: &ProfileMatrix, k: usize)
    -> Result<Vec<usize>, AnalyticsError>;

    /// Sum of squared distances from each item to its centroid, once fitted.
    fn inertia(&self) -> Option<f64>;

    /// Labels of the last fit.
    fn labels(&self) -> Option<&[usize]>;

    /// Pairs `ids` (parallel to the fitted rows) with their labels.
    fn assignments(&self, ids: &[String]) -> Result<Vec<ClusterAssignment>, AnalyticsError> {
        let labels = self.labels().ok_or(AnalyticsError::NotFitted)?;
        if labels.len() != ids.len() {
            return Err(AnalyticsError::DimensionMismatch {
                reason: format!("{} ids for {} fitted items", ids.len(), labels.len()),
            });
        }
        Ok(ids
            .iter()
            .zip(labels)
            .map(|(id, &cluster)| ClusterAssignment {
                asset_id: id.clone(),
                cluster,
                category: None,
            })
            .collect())
    }
}

/// Shared precondition check for every engine.
pub fn validate_fit_input(matrix: &ProfileMatrix, k: usize) -> Result<(), AnalyticsError> {
    let n = matrix.n_items();
    if n < MIN_CLUSTER_ITEMS {
        return Err(AnalyticsError::NotEnoughItems {
            count: n,
            min: MIN_CLUSTER_ITEMS,
        });
    }
    if k == 0 || k > n {
        return Err(AnalyticsError::InvalidClusterCount { k, items: n });
    }
    Ok(())
}

/// Seeds and iteration limits for both engine kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub seed: u64,
    pub kmeans_restarts: usize,
    pub kmeans_max_iter: usize,
    pub dtw_restarts: usize,
    pub dtw_max_iter: usize,
    /// Barycenter refinement passes per DTW centroid update.
    pub dba_iter: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            kmeans_restarts: 10,
            kmeans_max_iter: 300,
            dtw_restarts: 3,
            dtw_max_iter: 50,
            dba_iter: 10,
        }
    }
}

/// Builds the engine for `model`.
pub fn build_engine(model: DistanceModel, config: &EngineConfig) -> Box<dyn ClusterEngine> {
    match model {
        DistanceModel::Euclidean => Box::new(EuclideanKMeans::new(KMeansConfig {
            n_init: config.kmeans_restarts.max(1),
            max_iter: config.kmeans_max_iter.max(1),
            tol: 1e-4,
            seed: config.seed,
        })),
        DistanceModel::Dtw => Box::new(DtwKMeans::new(
            KMeansConfig {
                n_init: config.dtw_restarts.max(1),
                max_iter: config.dtw_max_iter.max(1),
                tol: 1e-6,
                seed: config.seed,
            },
            config.dba_iter.max(1),
        )),
    }
}

/// Renumbers labels by order of first appearance so item 0 is always in
/// cluster 0. Returns the old-to-new mapping.
pub(crate) fn canonicalize_labels(labels: &mut [usize], k: usize) -> Vec<usize> {
    let mut mapping = vec![usize::MAX; k];
    let mut next = 0;
    for label in labels.iter() {
        if mapping[*label] == usize::MAX {
            mapping[*label] = next;
            next += 1;
        }
    }
    // Clusters left empty keep trailing ids
    for slot in mapping.iter_mut() {
        if *slot == usize::MAX {
            *slot = next;
            next += 1;
        }
    }
    for label in labels.iter_mut() {
        *label = mapping[*label];
    }
    mapping
}
