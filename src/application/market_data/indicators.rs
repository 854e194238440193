//! Technical indicator columns attached ahead of feature construction.
//!
//! RSI here is the simple-moving-average variant (not Wilder smoothing):
//! average gain and loss are plain 14-period rolling means of close-to-close
//! deltas. Values inside the warm-up window are reported as missing.

use crate::domain::errors::AnalyticsError;
use crate::domain::market::time_series::TimeSeries;
use ta::Next;
use ta::indicators::SimpleMovingAverage;
use tracing::debug;

pub const RSI_PERIOD: usize = 14;

/// Rolling simple mean that reports `None` until the window is full.
struct WarmSma {
    sma: SimpleMovingAverage,
    period: usize,
    seen: usize,
}

impl WarmSma {
    fn new(period: usize) -> Result<Self, AnalyticsError> {
        let sma = SimpleMovingAverage::new(period).map_err(|e| AnalyticsError::InvalidSeries {
            reason: format!("invalid moving-average period {}: {:?}", period, e),
        })?;
        Ok(Self {
            sma,
            period,
            seen: 0,
        })
    }

    fn next(&mut self, value: f64) -> Option<f64> {
        let mean = self.sma.next(value);
        self.seen += 1;
        (self.seen >= self.period).then_some(mean)
    }
}

/// RSI over closing prices; index-aligned with `closes`.
pub fn calculate_rsi(closes: &[f64], period: usize) -> Result<Vec<Option<f64>>, AnalyticsError> {
    let mut avg_gain = WarmSma::new(period)?;
    let mut avg_loss = WarmSma::new(period)?;
    let mut rsi = Vec::with_capacity(closes.len());

    for (idx, close) in closes.iter().enumerate() {
        if idx == 0 {
            rsi.push(None);
            continue;
        }
        let delta = close - closes[idx - 1];
        let gain = avg_gain.next(delta.max(0.0));
        let loss = avg_loss.next((-delta).max(0.0));

        let value = match (gain, loss) {
            (Some(g), Some(l)) => rsi_from_averages(g, l),
            _ => None,
        };
        rsi.push(value);
    }

    Ok(rsi)
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    // Running sums can leave tiny negative residue on flat windows
    let avg_gain = avg_gain.max(0.0);
    let avg_loss = avg_loss.max(0.0);
    if avg_loss == 0.0 {
        return if avg_gain == 0.0 { None } else { Some(100.0) };
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// First difference of an optionally-missing column.
pub fn first_difference(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut diff = Vec::with_capacity(values.len());
    for idx in 0..values.len() {
        let d = match (idx.checked_sub(1).and_then(|p| values[p]), values[idx]) {
            (Some(prev), Some(cur)) => Some(cur - prev),
            _ => None,
        };
        diff.push(d);
    }
    diff
}

pub fn calculate_sma(values: &[f64], period: usize) -> Result<Vec<Option<f64>>, AnalyticsError> {
    let mut sma = WarmSma::new(period)?;
    Ok(values.iter().map(|v| sma.next(*v)).collect())
}

/// Attaches `rsi_14`, `rsi_slope`, `ma_10` and `ma_20` columns.
pub fn attach_technical_indicators(series: TimeSeries) -> Result<TimeSeries, AnalyticsError> {
    let closes = series.closes();
    let rsi = calculate_rsi(&closes, RSI_PERIOD)?;
    let rsi_slope = first_difference(&rsi);
    let ma_10 = calculate_sma(&closes, 10)?;
    let ma_20 = calculate_sma(&closes, 20)?;

    debug!(
        "Attached indicators to {} records ({} with defined RSI)",
        closes.len(),
        rsi.iter().filter(|v| v.is_some()).count()
    );

    series
        .with_column("rsi_14", rsi)?
        .with_column("rsi_slope", rsi_slope)?
        .with_column("ma_10", ma_10)?
        .with_column("ma_20", ma_20)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsi_warm_up_length() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + (i as f64 * 0.7).sin() * 3.0).collect();
        let rsi = calculate_rsi(&closes, RSI_PERIOD).unwrap();

        assert_eq!(rsi.len(), closes.len());
        assert!(rsi[..RSI_PERIOD].iter().all(|v| v.is_none()));
        assert!(rsi[RSI_PERIOD..].iter().all(|v| v.is_some()));
        for v in rsi.iter().flatten() {
            assert!((0.0..=100.0).contains(v));
        }
    }

    #[test]
    fn test_rsi_monotonic_rise_is_100() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let rsi = calculate_rsi(&closes, RSI_PERIOD).unwrap();
        assert_eq!(rsi[19], Some(100.0));
    }

    #[test]
    fn test_rsi_matches_manual_calculation() {
        // Alternating +2 / -1 moves: 7 gains and 7 losses in every window
        let mut closes = vec![100.0];
        for i in 0..14 {
            let last = *closes.last().unwrap();
            closes.push(if i % 2 == 0 { last + 2.0 } else { last - 1.0 });
        }
        let rsi = calculate_rsi(&closes, RSI_PERIOD).unwrap();
        let expected = 100.0 - 100.0 / (1.0 + (14.0 / 14.0) / (7.0 / 14.0));
        assert!((rsi[14].unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_first_difference() {
        let diff = first_difference(&[None, Some(1.0), Some(3.0), None, Some(2.0)]);
        assert_eq!(diff, vec![None, None, Some(2.0), None, None]);
    }

    #[test]
    fn test_sma_warm_up() {
        let sma = calculate_sma(&[1.0, 2.0, 3.0, 4.0], 3).unwrap();
        assert_eq!(sma[1], None);
        assert!((sma[2].unwrap() - 2.0).abs() < 1e-12);
        assert!((sma[3].unwrap() - 3.0).abs() < 1e-12);
    }
}
