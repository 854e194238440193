use chrono::{Duration, NaiveDate};
use volcast::application::analytics_service::AnalyticsService;
use volcast::application::market_data::indicators::attach_technical_indicators;
use volcast::application::ml::feature_builder::build_features;
use volcast::domain::errors::AnalyticsError;
use volcast::domain::market::time_series::{DailyBar, DailyRecord, TimeSeries};
use volcast::domain::ml::forecast::Direction;

// --- Fixtures ---

/// Deterministic 400-day walk with a volatility regime cycle.
fn synthetic_series(days: usize) -> TimeSeries {
    let start = NaiveDate::from_ymd_opt(2022, 6, 1).unwrap();
    let mut price = 250.0;
    let mut bars = Vec::with_capacity(days);
    let mut cv = Vec::with_capacity(days);
    for i in 0..days {
        let t = i as f64;
        let shock = 0.012 * (t * 0.9).sin() + 0.006 * (t * 2.3).cos() + 0.0004;
        price *= shock.exp();
        bars.push(DailyBar {
            date: start + Duration::days(i as i64),
            open: price * 0.998,
            high: price * 1.01,
            low: price * 0.99,
            close: price,
            volume: 1_000_000.0 + 5_000.0 * t,
        });
        cv.push(Some(0.015 + 0.01 * (t / 30.0).sin().abs()));
    }
    TimeSeries::from_bars(bars, cv).unwrap()
}

#[test]
fn test_400_day_forecast_scenario() {
    let service = AnalyticsService::default();
    let series = synthetic_series(400);
    let last_date = series.last().unwrap().date;

    let report = service.forecast("SYN", series, 5).unwrap();

    assert_eq!(report.steps.len(), 5);
    assert_eq!(report.last_date, last_date);
    for (i, step) in report.steps.iter().enumerate() {
        assert!((0.0..=1.0).contains(&step.probability));
        assert_eq!(step.direction, Direction::from_probability(step.probability));
        assert!(step.predicted_price > 0.0 && step.predicted_price.is_finite());
        assert_eq!(step.date, last_date + Duration::days(i as i64 + 1));
    }
    assert!(report.steps.windows(2).all(|w| w[0].date < w[1].date));
}

#[test]
fn test_report_carries_training_summary() {
    let service = AnalyticsService::default();
    let report = service.forecast("SYN", synthetic_series(400), 3).unwrap();

    // RSI slope first defined at day 15; final day has no target
    assert_eq!(report.training_rows, 400 - 15 - 1);
    assert_eq!(report.up_days + report.down_days, report.training_rows);

    let names: Vec<&str> = report
        .feature_importances
        .iter()
        .map(|f| f.feature.as_str())
        .collect();
    assert_eq!(
        names,
        vec!["return_lag1", "return_lag2", "cv_lag1", "cv_lag2", "rsi_14", "rsi_slope"]
    );
    let total: f64 = report.feature_importances.iter().map(|f| f.importance).sum();
    assert!((total - 1.0).abs() < 1e-9);
}

#[test]
fn test_feature_table_has_no_missing_values() {
    let series = attach_technical_indicators(synthetic_series(400)).unwrap();
    let table = build_features(&series).unwrap();

    assert!(!table.is_empty());
    for row in table.rows() {
        assert!(row.features.to_array().iter().all(|v| v.is_finite()));
    }
    assert_eq!(build_features(&series).unwrap(), table);
}

#[test]
fn test_series_without_volatility_is_rejected() {
    let series = synthetic_series(60);
    let stripped: Vec<DailyRecord> = series
        .records()
        .iter()
        .cloned()
        .map(|mut r| {
            r.cv = None;
            r
        })
        .collect();
    let series = TimeSeries::new(stripped).unwrap();

    let err = AnalyticsService::default()
        .forecast("SYN", series, 5)
        .unwrap_err();
    assert_eq!(
        err,
        AnalyticsError::MissingFeatures {
            columns: vec!["cv".to_string()]
        }
    );
}

#[test]
fn test_too_short_series_fails_cleanly() {
    let result = AnalyticsService::default().forecast("SYN", synthetic_series(10), 5);
    assert!(matches!(
        result,
        Err(AnalyticsError::InsufficientHistory { .. })
    ));
}

#[test]
fn test_report_echoes_latest_indicators() {
    let series = synthetic_series(400);
    let closes = series.closes();
    let report = AnalyticsService::default().forecast("SYN", series, 1).unwrap();

    let keys: Vec<&str> = report.latest_indicators.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["ma_10", "ma_20", "rsi_14", "rsi_slope"]);

    let ma_10: f64 = closes[closes.len() - 10..].iter().sum::<f64>() / 10.0;
    assert!((report.latest_indicators["ma_10"] - ma_10).abs() < 1e-6);
    let ma_20: f64 = closes[closes.len() - 20..].iter().sum::<f64>() / 20.0;
    assert!((report.latest_indicators["ma_20"] - ma_20).abs() < 1e-6);
    assert!((0.0..=100.0).contains(&report.latest_indicators["rsi_14"]));
}
