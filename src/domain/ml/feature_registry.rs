use serde::{Deserialize, Serialize};

/// Ordered list of feature names.
/// This order MUST match `FeatureVector::to_array` exactly; trees address
/// features by position.
pub const FEATURE_NAMES: &[&str] = &[
    "return_lag1",
    "return_lag2",
    "cv_lag1",
    "cv_lag2",
    "rsi_14",
    "rsi_slope",
];

/// Indicator columns the feature builder expects on the input series.
pub const REQUIRED_INDICATOR_COLUMNS: &[&str] = &["rsi_14", "rsi_slope"];

pub const N_FEATURES: usize = 6;

/// One row of predictors, kept as named fields so the roll-forward
/// transition is explicit and inspectable.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    pub return_lag1: f64,
    pub return_lag2: f64,
    pub cv_lag1: f64,
    pub cv_lag2: f64,
    pub rsi_14: f64,
    pub rsi_slope: f64,
}

impl FeatureVector {
    pub fn to_array(&self) -> [f64; N_FEATURES] {
        [
            self.return_lag1,
            self.return_lag2,
            self.cv_lag1,
            self.cv_lag2,
            self.rsi_14,
            self.rsi_slope,
        ]
    }

    /// Next synthetic feature row during a multi-day walk.
    ///
    /// Lag-2 slots take the previous lag-1 values. The newest return is
    /// unknown and resets to 0; cv lag-1, RSI and RSI slope carry forward
    /// unchanged since future volatility is unobserved.
    pub fn roll_forward(&self) -> Self {
        Self {
            return_lag1: 0.0,
            return_lag2: self.return_lag1,
            cv_lag1: self.cv_lag1,
            cv_lag2: self.cv_lag1,
            rsi_14: self.rsi_14,
            rsi_slope: self.rsi_slope,
        }
    }
}
