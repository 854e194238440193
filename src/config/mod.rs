//! Configuration module for volcast.
//!
//! This module provides structured configuration loading from environment variables,
//! organized by analytics path: Forecast and Clustering.

mod clustering_config;
mod forecast_config;

pub use clustering_config::ClusteringEnvConfig;
pub use forecast_config::ForecastEnvConfig;

use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone, Default)]
pub struct AnalyticsConfig {
    pub forecast: ForecastEnvConfig,
    pub clustering: ClusteringEnvConfig,
}

impl AnalyticsConfig {
    /// Loads `.env` (if present) then every section; unset variables take
    /// their defaults, malformed ones are errors.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let forecast = ForecastEnvConfig::from_env().context("Failed to load forecast config")?;
        let clustering =
            ClusteringEnvConfig::from_env().context("Failed to load clustering config")?;

        Ok(Self {
            forecast,
            clustering,
        })
    }
}

fn parse_usize(key: &str, default: usize) -> Result<usize> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse::<usize>()
        .context(format!("Failed to parse {}", key))
}

fn parse_u64(key: &str, default: u64) -> Result<u64> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse::<u64>()
        .context(format!("Failed to parse {}", key))
}

fn parse_f64(key: &str, default: f64) -> Result<f64> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse::<f64>()
        .context(format!("Failed to parse {}", key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_helpers_fall_back_to_default() {
        assert_eq!(parse_usize("VOLCAST_TEST_UNSET_USIZE", 7).unwrap(), 7);
        assert_eq!(parse_u64("VOLCAST_TEST_UNSET_U64", 42).unwrap(), 42);
        assert_eq!(parse_f64("VOLCAST_TEST_UNSET_F64", 0.5).unwrap(), 0.5);
    }

    #[test]
    fn test_default_sections() {
        let config = AnalyticsConfig::default();
        assert_eq!(config.forecast.horizon_days, 5);
        assert_eq!(config.clustering.window_days, 60);
    }
}
