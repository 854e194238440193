//! Normalized volatility windows, the unit of comparison for clustering.

use crate::domain::errors::AnalyticsError;
use serde::{Deserialize, Serialize};

/// Relative std below which a window counts as zero-variance.
const ZERO_VARIANCE_TOL: f64 = 16.0 * f64::EPSILON;

/// Trailing volatility window for one asset, z-scored over the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityProfile {
    pub asset_id: String,
    pub category: Option<String>,
    pub values: Vec<f64>,
}

impl VolatilityProfile {
    /// Z-scores the trailing `window` values of `history` (population std).
    ///
    /// Cells that cannot be computed (zero variance) are filled with 0.
    /// Returns `None` when the history is shorter than the window or the
    /// window contains a non-finite value.
    pub fn from_history(
        asset_id: impl Into<String>,
        category: Option<String>,
        history: &[f64],
        window: usize,
    ) -> Option<Self> {
        if window == 0 || history.len() < window {
            return None;
        }
        let tail = &history[history.len() - window..];
        if tail.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let n = tail.len() as f64;
        let mean = tail.iter().sum::<f64>() / n;
        let std = (tail.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();

        // Summation error leaves a flat window with a std of a few ulps
        let values = if std <= ZERO_VARIANCE_TOL * mean.abs().max(1.0) {
            vec![0.0; window]
        } else {
            tail.iter()
                .map(|v| {
                    let z = (v - mean) / std;
                    if z.is_finite() { z } else { 0.0 }
                })
                .collect()
        };

        Some(Self {
            asset_id: asset_id.into(),
            category,
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Rectangular matrix: rows are assets, columns are window positions.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileMatrix {
    rows: Vec<Vec<f64>>,
    width: usize,
}

impl ProfileMatrix {
    pub fn new(rows: Vec<Vec<f64>>) -> Result<Self, AnalyticsError> {
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        if width == 0 {
            return Err(AnalyticsError::DimensionMismatch {
                reason: "profile matrix must have at least one non-empty row".to_string(),
            });
        }
        if let Some((idx, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(AnalyticsError::DimensionMismatch {
                reason: format!("row {} has length {}, expected {}", idx, row.len(), width),
            });
        }
        if rows.iter().flatten().any(|v| !v.is_finite()) {
            return Err(AnalyticsError::DimensionMismatch {
                reason: "profile matrix contains non-finite values".to_string(),
            });
        }
        Ok(Self { rows, width })
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn n_items(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }
}

/// An asset dropped during batch preparation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedAsset {
    pub asset_id: String,
    pub reason: String,
}

/// Surviving profiles of one comparison set plus the skip accounting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileSet {
    pub profiles: Vec<VolatilityProfile>,
    pub skipped: Vec<SkippedAsset>,
}

impl ProfileSet {
    pub fn new(profiles: Vec<VolatilityProfile>) -> Self {
        Self {
            profiles,
            skipped: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.profiles.iter().map(|p| p.asset_id.clone()).collect()
    }

    pub fn categories(&self) -> Vec<Option<String>> {
        self.profiles.iter().map(|p| p.category.clone()).collect()
    }

    /// Profiles of differing window length are never pooled into one matrix.
    pub fn matrix(&self) -> Result<ProfileMatrix, AnalyticsError> {
        ProfileMatrix::new(self.profiles.iter().map(|p| p.values.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_is_zscored_over_trailing_window() {
        let history = vec![100.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let profile = VolatilityProfile::from_history("BTC", None, &history, 5).unwrap();

        assert_eq!(profile.len(), 5);
        let mean: f64 = profile.values.iter().sum::<f64>() / 5.0;
        let var: f64 = profile.values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 5.0;
        assert!(mean.abs() < 1e-12);
        assert!((var - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_flat_window_filled_with_zero() {
        let profile = VolatilityProfile::from_history("USDT", None, &[0.2; 10], 10).unwrap();
        assert!(profile.values.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_flat_windows_at_any_level_are_identical() {
        // Stablecoin-like histories must not pick up a +-1 sign from rounding
        for level in [0.05, 0.2, 0.3, 0.7, 1e-4, 250.0] {
            let profile = VolatilityProfile::from_history("STABLE", None, &[level; 60], 60).unwrap();
            assert_eq!(profile.values, vec![0.0; 60], "level {}", level);
        }
    }

    #[test]
    fn test_small_but_real_variation_is_kept() {
        let history: Vec<f64> = (0..60).map(|i| 0.2 + 1e-6 * (i % 3) as f64).collect();
        let profile = VolatilityProfile::from_history("LOWVOL", None, &history, 60).unwrap();
        assert!(profile.values.iter().any(|v| v.abs() > 0.5));
    }

    #[test]
    fn test_short_history_rejected() {
        assert!(VolatilityProfile::from_history("NEW", None, &[1.0, 2.0], 5).is_none());
    }

    #[test]
    fn test_matrix_rejects_ragged_rows() {
        let result = ProfileMatrix::new(vec![vec![1.0, 2.0], vec![1.0]]);
        assert!(matches!(result, Err(AnalyticsError::DimensionMismatch { .. })));
    }
}
