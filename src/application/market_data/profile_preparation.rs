//! Batch preparation of volatility profiles for clustering.

use crate::domain::errors::AnalyticsError;
use crate::domain::market::volatility_profile::{ProfileSet, SkippedAsset, VolatilityProfile};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Raw conditional-volatility history for one asset, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetHistory {
    pub asset_id: String,
    pub category: Option<String>,
    pub cv: Vec<f64>,
}

/// Normalizes each asset's trailing `window` into a profile.
///
/// Assets that cannot fill the window are skipped and recorded; processing
/// continues with the rest. Zero survivors is a precondition failure.
pub fn prepare_profiles(
    histories: Vec<AssetHistory>,
    window: usize,
) -> Result<ProfileSet, AnalyticsError> {
    let total = histories.len();
    let mut set = ProfileSet::default();

    for history in histories {
        match VolatilityProfile::from_history(
            history.asset_id.clone(),
            history.category.clone(),
            &history.cv,
            window,
        ) {
            Some(profile) => set.profiles.push(profile),
            None => {
                let reason = if history.cv.len() < window {
                    format!("insufficient data: {} < {} days", history.cv.len(), window)
                } else {
                    "non-finite volatility in window".to_string()
                };
                warn!("Skipping {}: {}", history.asset_id, reason);
                set.skipped.push(SkippedAsset {
                    asset_id: history.asset_id,
                    reason,
                });
            }
        }
    }

    if set.profiles.is_empty() {
        return Err(AnalyticsError::NoValidItems {
            skipped: set.skipped.len(),
        });
    }

    info!(
        "Prepared {}/{} volatility profiles (window={}, skipped={})",
        set.len(),
        total,
        window,
        set.skipped.len()
    );
    Ok(set)
}
