//! Supervised-learning table construction from a volatility-augmented series.

use crate::domain::errors::AnalyticsError;
use crate::domain::market::time_series::TimeSeries;
use crate::domain::ml::feature_registry::{FeatureVector, REQUIRED_INDICATOR_COLUMNS};
use crate::domain::ml::feature_table::{FeatureRow, FeatureTable};
use tracing::debug;

const MAX_LAG: usize = 2;

/// Builds lagged features and the next-day direction target.
///
/// Rows missing any lag, indicator or target value are dropped, never
/// imputed; the final day always goes because it has no next day. Missing
/// indicator columns are a hard precondition failure.
pub fn build_features(series: &TimeSeries) -> Result<FeatureTable, AnalyticsError> {
    let mut missing: Vec<String> = REQUIRED_INDICATOR_COLUMNS
        .iter()
        .filter(|c| !series.has_column(c))
        .map(|c| c.to_string())
        .collect();

    let records = series.records();
    if !records.is_empty() && records.iter().all(|r| r.log_return.is_none()) {
        missing.insert(0, "log_return".to_string());
    }
    if !records.is_empty() && records.iter().all(|r| r.cv.is_none()) {
        missing.push("cv".to_string());
    }
    if !missing.is_empty() {
        return Err(AnalyticsError::MissingFeatures { columns: missing });
    }

    let (Some(rsi), Some(rsi_slope)) = (series.column("rsi_14"), series.column("rsi_slope")) else {
        return Err(AnalyticsError::MissingFeatures {
            columns: REQUIRED_INDICATOR_COLUMNS.iter().map(|c| c.to_string()).collect(),
        });
    };

    let mut rows = Vec::new();
    for t in MAX_LAG..records.len().saturating_sub(1) {
        let next_return = records[t + 1].log_return;
        let values = [
            records[t - 1].log_return,
            records[t - 2].log_return,
            records[t - 1].cv,
            records[t - 2].cv,
            rsi[t],
            rsi_slope[t],
            next_return,
        ];
        if values.iter().any(|v| !v.is_some_and(f64::is_finite)) {
            continue;
        }
        let [r1, r2, c1, c2, rsi_v, slope, next] = values.map(|v| v.unwrap_or_default());

        rows.push(FeatureRow {
            date: records[t].date,
            features: FeatureVector {
                return_lag1: r1,
                return_lag2: r2,
                cv_lag1: c1,
                cv_lag2: c2,
                rsi_14: rsi_v,
                rsi_slope: slope,
            },
            target: u8::from(next > 0.0),
        });
    }

    debug!(
        "Built {} feature rows from {} records",
        rows.len(),
        records.len()
    );
    Ok(FeatureTable::new(rows))
}
