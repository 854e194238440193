//! Trains the direction forest and walks it forward into a synthetic
//! multi-day price path.

use super::predictor::DirectionClassifier;
use super::random_forest::{ForestConfig, RandomForestClassifier};
use crate::domain::errors::AnalyticsError;
use crate::domain::market::time_series::TimeSeries;
use crate::domain::ml::feature_table::FeatureTable;
use crate::domain::ml::forecast::{Direction, ForecastStep};
use chrono::Duration;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution as _, Normal};
use statrs::statistics::{Data, Distribution};
use tracing::{debug, info};

/// Default noise std as a fraction of the historical return std.
pub const DEFAULT_NOISE_SCALE: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct DirectionForecaster {
    forest: ForestConfig,
    noise_scale: f64,
    /// `None` draws fresh entropy per call, so repeated forecasts differ.
    noise_seed: Option<u64>,
}

impl Default for DirectionForecaster {
    fn default() -> Self {
        Self::new(ForestConfig::default())
    }
}

impl DirectionForecaster {
    pub fn new(forest: ForestConfig) -> Self {
        Self {
            forest,
            noise_scale: DEFAULT_NOISE_SCALE,
            noise_seed: None,
        }
    }

    pub fn with_noise(mut self, scale: f64, seed: Option<u64>) -> Self {
        self.noise_scale = scale;
        self.noise_seed = seed;
        self
    }

    pub fn train(&self, table: &FeatureTable) -> Result<RandomForestClassifier, AnalyticsError> {
        let x: Vec<Vec<f64>> = table.features().iter().map(|row| row.to_vec()).collect();
        let y = table.targets();
        RandomForestClassifier::fit(&x, &y, self.forest.clone())
    }

    /// Rolls `model` forward `n` days from the newest feature row.
    ///
    /// Each step records the up-probability, then advances the feature
    /// vector with `FeatureVector::roll_forward`. Prices compound from the
    /// last observed close by `exp(expected + noise)`.
    pub fn forecast(
        &self,
        model: &dyn DirectionClassifier,
        table: &FeatureTable,
        series: &TimeSeries,
        n: usize,
    ) -> Result<Vec<ForecastStep>, AnalyticsError> {
        let seed_row = table.last().ok_or(AnalyticsError::InsufficientHistory {
            needed: 1,
            available: 0,
        })?;
        let last = series.last().ok_or(AnalyticsError::InvalidSeries {
            reason: "series is empty".to_string(),
        })?;

        let (mean, std) = return_moments(&series.defined_log_returns());
        let noise_std = (self.noise_scale * std).max(0.0);
        let normal = Normal::new(0.0, noise_std).map_err(|e| AnalyticsError::InvalidSeries {
            reason: format!("Invalid noise distribution: {}", e),
        })?;
        let mut rng = match self.noise_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };

        debug!(
            "Forecasting {} steps with {}: mean_return={:.6}, std_return={:.6}",
            n,
            model.name(),
            mean,
            std
        );

        let mut features = seed_row.features;
        let mut price = last.close;
        let mut steps = Vec::with_capacity(n);

        for day in 1..=n {
            let probability = model.predict_proba(&features).clamp(0.0, 1.0);
            let direction = Direction::from_probability(probability);
            let expected = match direction {
                Direction::Up => mean * probability,
                Direction::Down => -mean * (1.0 - probability),
            };
            price *= (expected + normal.sample(&mut rng)).exp();

            steps.push(ForecastStep {
                date: last.date + Duration::days(day as i64),
                direction,
                probability,
                predicted_price: price,
            });
            features = features.roll_forward();
        }

        if let Some(final_step) = steps.last() {
            info!(
                "Forecast {} days: final {} at {:.4} (p_up={:.3})",
                n, final_step.direction, final_step.predicted_price, final_step.probability
            );
        }
        Ok(steps)
    }
}

/// Sample mean and std of the log returns; undefined moments become 0.
fn return_moments(returns: &[f64]) -> (f64, f64) {
    let data = Data::new(returns.to_vec());
    let mean = data.mean().filter(|m| m.is_finite()).unwrap_or(0.0);
    let std = data.std_dev().filter(|s| s.is_finite()).unwrap_or(0.0);
    (mean, std)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::time_series::{DailyRecord, TimeSeries};
    use crate::domain::ml::feature_registry::FeatureVector;
    use crate::domain::ml::feature_table::FeatureRow;
    use chrono::NaiveDate;

    struct FixedClassifier(f64);

    impl DirectionClassifier for FixedClassifier {
        fn predict_proba(&self, _features: &FeatureVector) -> f64 {
            self.0
        }
        fn feature_importances(&self) -> &[f64] {
            &[]
        }
        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn series(closes: &[f64]) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let records = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| DailyRecord {
                date: start + Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 0.0,
                log_return: (i > 0).then(|| (close / closes[i - 1]).ln()),
                cv: Some(0.01),
            })
            .collect();
        TimeSeries::new(records).unwrap()
    }

    fn table() -> FeatureTable {
        FeatureTable::new(vec![FeatureRow {
            date: NaiveDate::from_ymd_opt(2024, 3, 3).unwrap(),
            features: FeatureVector {
                return_lag1: 0.01,
                ..Default::default()
            },
            target: 1,
        }])
    }

    #[test]
    fn test_constant_growth_without_noise() {
        // Constant 1% log growth: std is 0, so the path is deterministic
        let closes: Vec<f64> = (0..5).map(|i| 100.0 * (0.01 * i as f64).exp()).collect();
        let series = series(&closes);
        let forecaster = DirectionForecaster::default();
        let steps = forecaster
            .forecast(&FixedClassifier(0.8), &table(), &series, 3)
            .unwrap();

        assert_eq!(steps.len(), 3);
        let expected = closes[4] * (0.01f64 * 0.8).exp();
        assert!((steps[0].predicted_price - expected).abs() < 1e-9);
        assert!(steps.iter().all(|s| s.direction == Direction::Up));
        assert_eq!(steps[0].date, NaiveDate::from_ymd_opt(2024, 3, 6).unwrap());
        assert_eq!(steps[2].date, NaiveDate::from_ymd_opt(2024, 3, 8).unwrap());
    }

    #[test]
    fn test_down_direction_pulls_price_lower() {
        let closes: Vec<f64> = (0..5).map(|i| 50.0 * (0.02 * i as f64).exp()).collect();
        let series = series(&closes);
        let steps = DirectionForecaster::default()
            .forecast(&FixedClassifier(0.25), &table(), &series, 2)
            .unwrap();
        assert_eq!(steps[0].direction, Direction::Down);
        assert!(steps[1].predicted_price < steps[0].predicted_price);
        assert!(steps[0].predicted_price < closes[4]);
    }

    #[test]
    fn test_seeded_noise_is_reproducible() {
        let closes = [100.0, 103.0, 99.0, 104.0, 101.0, 106.0];
        let series = series(&closes);
        let forecaster = DirectionForecaster::default().with_noise(0.5, Some(7));
        let a = forecaster
            .forecast(&FixedClassifier(0.6), &table(), &series, 5)
            .unwrap();
        let b = forecaster
            .forecast(&FixedClassifier(0.6), &table(), &series, 5)
            .unwrap();
        assert_eq!(a, b);
        assert!(a.iter().all(|s| s.predicted_price > 0.0));
    }

    #[test]
    fn test_unseeded_noise_varies_only_the_price_path() {
        let closes = [100.0, 103.0, 99.0, 104.0, 101.0, 106.0];
        let series = series(&closes);
        let forecaster = DirectionForecaster::default();
        let model = FixedClassifier(0.6);
        let a = forecaster.forecast(&model, &table(), &series, 5).unwrap();
        let b = forecaster.forecast(&model, &table(), &series, 5).unwrap();

        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.date, y.date);
            assert_eq!(x.direction, y.direction);
            assert_eq!(x.probability, y.probability);
        }
        let prices = |steps: &[ForecastStep]| steps.iter().map(|s| s.predicted_price).collect::<Vec<_>>();
        assert_ne!(prices(&a), prices(&b));
    }

    #[test]
    fn test_empty_table_is_rejected() {
        let series = series(&[1.0, 2.0]);
        let result =
            DirectionForecaster::default().forecast(&FixedClassifier(0.5), &FeatureTable::default(), &series, 3);
        assert!(matches!(
            result,
            Err(AnalyticsError::InsufficientHistory { .. })
        ));
    }

    #[test]
    fn test_zero_horizon_is_empty() {
        let series = series(&[1.0, 2.0, 3.0]);
        let steps = DirectionForecaster::default()
            .forecast(&FixedClassifier(0.5), &table(), &series, 0)
            .unwrap();
        assert!(steps.is_empty());
    }
}
