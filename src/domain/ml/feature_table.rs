use super::feature_registry::{FeatureVector, N_FEATURES};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One supervised-learning row: predictors as of `date` and the binary
/// next-day direction label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub features: FeatureVector,
    /// 1 iff the next day's log return is strictly positive.
    pub target: u8,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureTable {
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn new(rows: Vec<FeatureRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn features(&self) -> Vec<[f64; N_FEATURES]> {
        self.rows.iter().map(|r| r.features.to_array()).collect()
    }

    pub fn targets(&self) -> Vec<u8> {
        self.rows.iter().map(|r| r.target).collect()
    }

    /// Most recent row, the seed of a forecast walk.
    pub fn last(&self) -> Option<&FeatureRow> {
        self.rows.last()
    }

    /// Count of (down, up) labels.
    pub fn class_counts(&self) -> (usize, usize) {
        let up = self.rows.iter().filter(|r| r.target == 1).count();
        (self.rows.len() - up, up)
    }
}
