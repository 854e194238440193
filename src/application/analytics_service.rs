//! Boundary facade: runs the forecasting and clustering paths end to end.
//!
//! Every operation returns a serializable report or a typed
//! [`AnalyticsError`]; the two paths share no state.

use crate::application::clustering::elbow::sweep;
use crate::application::clustering::evaluation::{metrics, statistics};
use crate::application::clustering::projection::project;
use crate::application::clustering::{EngineConfig, build_engine};
use crate::application::market_data::indicators::attach_technical_indicators;
use crate::application::ml::direction_forecaster::DirectionForecaster;
use crate::application::ml::feature_builder::build_features;
use crate::application::ml::predictor::DirectionClassifier;
use crate::config::AnalyticsConfig;
use crate::domain::clustering::{
    ClusterAssignment, ClusterMetrics, ClusterStatistics, DistanceModel, ElbowCurve, Projection,
    ProjectionMethod,
};
use crate::domain::errors::AnalyticsError;
use crate::domain::market::time_series::TimeSeries;
use crate::domain::market::volatility_profile::{ProfileSet, SkippedAsset};
use crate::domain::ml::feature_registry::{FEATURE_NAMES, REQUIRED_INDICATOR_COLUMNS};
use crate::domain::ml::forecast::ForecastStep;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

/// Smallest k the elbow sweep starts from.
pub const ELBOW_MIN_K: usize = 2;

/// Indicator columns echoed in the forecast report when present.
const REPORTED_INDICATORS: &[&str] = &["rsi_14", "rsi_slope", "ma_10", "ma_20"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastReport {
    pub symbol: String,
    pub last_date: NaiveDate,
    pub last_close: f64,
    /// Indicator values on the last day; undefined values are left out
    pub latest_indicators: BTreeMap<String, f64>,
    pub steps: Vec<ForecastStep>,
    pub feature_importances: Vec<FeatureImportance>,
    pub training_rows: usize,
    pub up_days: usize,
    pub down_days: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ElbowReport {
    pub distance_model: DistanceModel,
    pub n_items: usize,
    #[serde(flatten)]
    pub curve: ElbowCurve,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedAsset>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterReport {
    pub distance_model: DistanceModel,
    pub k: usize,
    pub inertia: Option<f64>,
    pub assignments: Vec<ClusterAssignment>,
    pub metrics: ClusterMetrics,
    pub statistics: ClusterStatistics,
    pub projection: Projection,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedAsset>,
}

#[derive(Debug, Clone)]
pub struct AnalyticsService {
    forecaster: DirectionForecaster,
    engine: EngineConfig,
    max_k: usize,
}

impl Default for AnalyticsService {
    fn default() -> Self {
        Self::new(&AnalyticsConfig::default())
    }
}

impl AnalyticsService {
    pub fn new(config: &AnalyticsConfig) -> Self {
        Self {
            forecaster: config.forecast.forecaster(),
            engine: config.clustering.engine_config(),
            max_k: config.clustering.max_k,
        }
    }

    /// Builds features, trains a fresh forest and rolls it `horizon` days
    /// forward. RSI columns are computed from closes when absent.
    pub fn forecast(
        &self,
        symbol: &str,
        series: TimeSeries,
        horizon: usize,
    ) -> Result<ForecastReport, AnalyticsError> {
        let series = if REQUIRED_INDICATOR_COLUMNS.iter().all(|c| series.has_column(c)) {
            series
        } else {
            attach_technical_indicators(series)?
        };
        let last = series.last().cloned().ok_or(AnalyticsError::InvalidSeries {
            reason: "series is empty".to_string(),
        })?;

        let latest_indicators = REPORTED_INDICATORS
            .iter()
            .filter_map(|name| {
                let value = series.column(name)?.last().copied().flatten()?;
                Some((name.to_string(), value))
            })
            .collect();

        let table = build_features(&series)?;
        let model = self.forecaster.train(&table)?;
        let steps = self.forecaster.forecast(&model, &table, &series, horizon)?;
        let (down_days, up_days) = table.class_counts();

        let feature_importances = FEATURE_NAMES
            .iter()
            .zip(model.feature_importances())
            .map(|(name, &importance)| FeatureImportance {
                feature: name.to_string(),
                importance,
            })
            .collect();

        info!(
            "{}: {}-day forecast from {} training rows ({} up / {} down)",
            symbol,
            horizon,
            table.len(),
            up_days,
            down_days
        );

        Ok(ForecastReport {
            symbol: symbol.to_string(),
            last_date: last.date,
            last_close: last.close,
            latest_indicators,
            steps,
            feature_importances,
            training_rows: table.len(),
            up_days,
            down_days,
        })
    }

    /// Inertia curve over `k in 2..min(max_k, n)` and its elbow.
    pub fn elbow(
        &self,
        profiles: &ProfileSet,
        distance_model: DistanceModel,
    ) -> Result<ElbowReport, AnalyticsError> {
        let matrix = profiles.matrix()?;
        let n = matrix.n_items();
        let mut engine = build_engine(distance_model, &self.engine);
        let curve = sweep(&matrix, ELBOW_MIN_K..self.max_k.min(n), engine.as_mut())?;

        Ok(ElbowReport {
            distance_model,
            n_items: n,
            curve,
            skipped: profiles.skipped.clone(),
        })
    }

    /// Clusters with `k` groups, then validates, summarizes and projects.
    pub fn cluster(
        &self,
        profiles: &ProfileSet,
        k: usize,
        distance_model: DistanceModel,
        projection: ProjectionMethod,
    ) -> Result<ClusterReport, AnalyticsError> {
        let matrix = profiles.matrix()?;
        let ids = profiles.ids();

        let mut engine = build_engine(distance_model, &self.engine);
        let labels = engine.fit_predict(&matrix, k)?;

        let mut assignments = engine.assignments(&ids)?;
        for (assignment, category) in assignments.iter_mut().zip(profiles.categories()) {
            assignment.category = category;
        }

        let metrics = metrics(&matrix, &labels, distance_model);
        let statistics = statistics(&ids, &labels)?;
        let projection = project(&matrix, &labels, projection, self.engine.seed)?;

        info!(
            "Clustered {} assets into {} groups ({}), silhouette={:?}",
            ids.len(),
            statistics.len(),
            distance_model,
            metrics.silhouette_score
        );

        Ok(ClusterReport {
            distance_model,
            k,
            inertia: engine.inertia(),
            assignments,
            metrics,
            statistics,
            projection,
            skipped: profiles.skipped.clone(),
        })
    }
}
