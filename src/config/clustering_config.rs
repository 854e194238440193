//! Clustering configuration parsing from environment variables.

use crate::application::clustering::EngineConfig;
use crate::application::clustering::elbow::MAX_SWEEP_K;
use anyhow::Result;

/// Clustering environment configuration
#[derive(Debug, Clone)]
pub struct ClusteringEnvConfig {
    /// Trailing days of volatility per profile
    pub window_days: usize,
    /// Exclusive upper bound of the elbow sweep
    pub max_k: usize,
    pub seed: u64,
    pub kmeans_restarts: usize,
    pub dtw_restarts: usize,
    pub dtw_max_iter: usize,
}

impl Default for ClusteringEnvConfig {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            window_days: 60,
            max_k: MAX_SWEEP_K,
            seed: engine.seed,
            kmeans_restarts: engine.kmeans_restarts,
            dtw_restarts: engine.dtw_restarts,
            dtw_max_iter: engine.dtw_max_iter,
        }
    }
}

impl ClusteringEnvConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let window_days = super::parse_usize("CLUSTER_WINDOW_DAYS", defaults.window_days)?;
        if window_days == 0 {
            anyhow::bail!("CLUSTER_WINDOW_DAYS must be at least 1");
        }

        Ok(Self {
            window_days,
            max_k: super::parse_usize("CLUSTER_MAX_K", defaults.max_k)?,
            seed: super::parse_u64("CLUSTER_SEED", defaults.seed)?,
            kmeans_restarts: super::parse_usize("KMEANS_RESTARTS", defaults.kmeans_restarts)?,
            dtw_restarts: super::parse_usize("DTW_RESTARTS", defaults.dtw_restarts)?,
            dtw_max_iter: super::parse_usize("DTW_MAX_ITER", defaults.dtw_max_iter)?,
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            seed: self.seed,
            kmeans_restarts: self.kmeans_restarts,
            dtw_restarts: self.dtw_restarts,
            dtw_max_iter: self.dtw_max_iter,
            ..EngineConfig::default()
        }
    }
}
