//! Daily price/volatility time series consumed by the forecasting path.
//!
//! The series is produced by an external volatility collaborator and is
//! read-only to the core. Indicator columns (RSI and friends) ride along as
//! named, optionally-missing columns so that feature construction can check
//! for their presence explicitly.

use crate::domain::errors::AnalyticsError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One OHLCV bar before volatility augmentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// One volatility-augmented day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// `ln(close[t] / close[t-1])`, undefined on the first day.
    pub log_return: Option<f64>,
    /// Conditional volatility estimate (non-negative).
    pub cv: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct TimeSeries {
    records: Vec<DailyRecord>,
    columns: BTreeMap<String, Vec<Option<f64>>>,
}

impl TimeSeries {
    /// Wraps records, enforcing strictly increasing dates.
    pub fn new(records: Vec<DailyRecord>) -> Result<Self, AnalyticsError> {
        for pair in records.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(AnalyticsError::InvalidSeries {
                    reason: format!(
                        "dates must be strictly increasing ({} follows {})",
                        pair[1].date, pair[0].date
                    ),
                });
            }
        }
        if let Some(bad) = records.iter().find(|r| r.cv.is_some_and(|cv| cv < 0.0)) {
            return Err(AnalyticsError::InvalidSeries {
                reason: format!("negative conditional volatility on {}", bad.date),
            });
        }

        Ok(Self {
            records,
            columns: BTreeMap::new(),
        })
    }

    /// Builds a series from raw bars and a parallel cv column, deriving log returns.
    pub fn from_bars(bars: Vec<DailyBar>, cv: Vec<Option<f64>>) -> Result<Self, AnalyticsError> {
        if bars.len() != cv.len() {
            return Err(AnalyticsError::DimensionMismatch {
                reason: format!("{} bars but {} cv values", bars.len(), cv.len()),
            });
        }

        let mut records = Vec::with_capacity(bars.len());
        let mut prev_close: Option<f64> = None;
        for (bar, cv) in bars.into_iter().zip(cv) {
            let log_return = match prev_close {
                Some(prev) if prev > 0.0 && bar.close > 0.0 => Some((bar.close / prev).ln()),
                _ => None,
            };
            prev_close = Some(bar.close);
            records.push(DailyRecord {
                date: bar.date,
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
                log_return,
                cv,
            });
        }

        Self::new(records)
    }

    /// Attaches (or replaces) a named indicator column.
    pub fn with_column(
        mut self,
        name: impl Into<String>,
        values: Vec<Option<f64>>,
    ) -> Result<Self, AnalyticsError> {
        let name = name.into();
        if values.len() != self.records.len() {
            return Err(AnalyticsError::DimensionMismatch {
                reason: format!(
                    "column {} has {} values for {} records",
                    name,
                    values.len(),
                    self.records.len()
                ),
            });
        }
        self.columns.insert(name, values);
        Ok(self)
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns.get(name).map(|v| v.as_slice())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn records(&self) -> &[DailyRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.close).collect()
    }

    /// Defined log returns only (the undefined first day is skipped).
    pub fn defined_log_returns(&self) -> Vec<f64> {
        self.records
            .iter()
            .filter_map(|r| r.log_return)
            .filter(|r| r.is_finite())
            .collect()
    }

    pub fn last(&self) -> Option<&DailyRecord> {
        self.records.last()
    }
}
