//! Direction-forecast configuration parsing from environment variables.

use crate::application::ml::direction_forecaster::{DEFAULT_NOISE_SCALE, DirectionForecaster};
use crate::application::ml::random_forest::ForestConfig;
use anyhow::{Context, Result};
use std::env;

/// Forecast environment configuration
#[derive(Debug, Clone)]
pub struct ForecastEnvConfig {
    pub horizon_days: usize,

    // Forest
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub forest_seed: u64,

    // Price path noise
    pub noise_scale: f64,
    pub noise_seed: Option<u64>,
}

impl Default for ForecastEnvConfig {
    fn default() -> Self {
        let forest = ForestConfig::default();
        Self {
            horizon_days: 5,
            n_trees: forest.n_trees,
            max_depth: forest.max_depth,
            min_samples_split: forest.min_samples_split,
            forest_seed: forest.seed,
            noise_scale: DEFAULT_NOISE_SCALE,
            noise_seed: None,
        }
    }
}

impl ForecastEnvConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let n_trees = super::parse_usize("FOREST_N_TREES", defaults.n_trees)?;
        if n_trees == 0 {
            anyhow::bail!("FOREST_N_TREES must be at least 1");
        }
        let noise_scale = super::parse_f64("PRICE_NOISE_SCALE", defaults.noise_scale)?;
        if !(noise_scale >= 0.0 && noise_scale.is_finite()) {
            anyhow::bail!("PRICE_NOISE_SCALE must be a non-negative number, got {}", noise_scale);
        }
        let noise_seed = match env::var("PRICE_NOISE_SEED") {
            Ok(raw) => Some(
                raw.parse::<u64>()
                    .context("Failed to parse PRICE_NOISE_SEED")?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            horizon_days: super::parse_usize("FORECAST_HORIZON_DAYS", defaults.horizon_days)?,
            n_trees,
            max_depth: super::parse_usize("FOREST_MAX_DEPTH", defaults.max_depth)?,
            min_samples_split: super::parse_usize(
                "FOREST_MIN_SAMPLES_SPLIT",
                defaults.min_samples_split,
            )?,
            forest_seed: super::parse_u64("FOREST_SEED", defaults.forest_seed)?,
            noise_scale,
            noise_seed,
        })
    }

    pub fn forest_config(&self) -> ForestConfig {
        ForestConfig {
            n_trees: self.n_trees,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            seed: self.forest_seed,
            ..ForestConfig::default()
        }
    }

    pub fn forecaster(&self) -> DirectionForecaster {
        DirectionForecaster::new(self.forest_config()).with_noise(self.noise_scale, self.noise_seed)
    }
}
