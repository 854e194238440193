use thiserror::Error;

/// Errors surfaced across the analytics boundary.
///
/// Every component either returns a well-defined result or one of these
/// variants; callers never see a panic from the core.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalyticsError {
    #[error("Missing required feature columns: {columns:?}")]
    MissingFeatures { columns: Vec<String> },

    #[error("Invalid time series: {reason}")]
    InvalidSeries { reason: String },

    #[error("Insufficient history: need {needed} usable rows, got {available}")]
    InsufficientHistory { needed: usize, available: usize },

    #[error("Not enough items to cluster: {count} < {min}")]
    NotEnoughItems { count: usize, min: usize },

    #[error("No valid items: all {skipped} assets were skipped")]
    NoValidItems { skipped: usize },

    #[error("Degenerate k range {start}..{end} for {items} items")]
    InvalidKRange { start: usize, end: usize, items: usize },

    #[error("Invalid cluster count k={k} for {items} items")]
    InvalidClusterCount { k: usize, items: usize },

    #[error("Dimension mismatch: {reason}")]
    DimensionMismatch { reason: String },

    #[error("Model has not been fitted")]
    NotFitted,

    #[error("Projection failed: {reason}")]
    ProjectionFailed { reason: String },
}

/// Reasons a cluster-quality metric cannot be computed.
///
/// These never abort a cluster computation; they are attached to the
/// metrics result as a description.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MetricError {
    #[error("Number of labels is {labels}. Valid values are 2 to n_samples - 1 (inclusive) for {samples} samples")]
    DegenerateLabelling { labels: usize, samples: usize },

    #[error("Label count {labels} does not match sample count {samples}")]
    LengthMismatch { labels: usize, samples: usize },

    #[error("Metric is not finite")]
    NonFinite,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_features_formatting() {
        let error = AnalyticsError::MissingFeatures {
            columns: vec!["rsi_14".to_string(), "rsi_slope".to_string()],
        };

        let msg = error.to_string();
        assert!(msg.contains("rsi_14"));
        assert!(msg.contains("rsi_slope"));
    }

    #[test]
    fn test_metric_error_formatting() {
        let error = MetricError::DegenerateLabelling {
            labels: 1,
            samples: 5,
        };

        let msg = error.to_string();
        assert!(msg.contains("Number of labels is 1"));
        assert!(msg.contains("5 samples"));
    }
}
