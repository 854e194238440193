//! CSV adapters for the CLI: daily series and per-asset profile tables.

use crate::application::market_data::profile_preparation::{AssetHistory, prepare_profiles};
use crate::domain::market::time_series::{DailyRecord, TimeSeries};
use crate::domain::market::volatility_profile::{ProfileSet, VolatilityProfile};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::info;

#[derive(Debug, Deserialize)]
struct SeriesRow {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    cv: Option<f64>,
    #[serde(default)]
    log_return: Option<f64>,
    #[serde(default)]
    rsi_14: Option<f64>,
    #[serde(default)]
    rsi_slope: Option<f64>,
}

/// Reads `date,open,high,low,close,volume,cv` rows, plus optional
/// `log_return`, `rsi_14` and `rsi_slope` columns.
///
/// Missing log returns are derived from consecutive closes. RSI columns are
/// attached only when present in the header.
pub fn read_series<R: Read>(reader: R) -> Result<TimeSeries> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers().context("Failed to read CSV header")?.clone();
    let has = |name: &str| headers.iter().any(|h| h == name);

    let mut rows: Vec<SeriesRow> = Vec::new();
    for (line, result) in rdr.deserialize().enumerate() {
        let row: SeriesRow = result.with_context(|| format!("Invalid series row {}", line + 1))?;
        rows.push(row);
    }

    let mut records = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let derived = (i > 0).then(|| (row.close / rows[i - 1].close).ln());
        records.push(DailyRecord {
            date: row.date,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
            log_return: row.log_return.or(derived).filter(|r| r.is_finite()),
            cv: row.cv,
        });
    }

    let mut series = TimeSeries::new(records)?;
    if has("rsi_14") {
        series = series.with_column("rsi_14", rows.iter().map(|r| r.rsi_14).collect())?;
    }
    if has("rsi_slope") {
        series = series.with_column("rsi_slope", rows.iter().map(|r| r.rsi_slope).collect())?;
    }
    Ok(series)
}

pub fn load_series(path: &Path) -> Result<TimeSeries> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let series = read_series(BufReader::new(file))?;
    info!("Loaded {} daily records from {:?}", series.len(), path);
    Ok(series)
}

/// One `asset_id,category,v1,v2,...` line; trailing empty cells are ignored.
fn read_asset_rows<R: Read>(reader: R) -> Result<Vec<AssetHistory>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut assets = Vec::new();

    for (line, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Invalid profile row {}", line + 1))?;
        let asset_id = record
            .get(0)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .with_context(|| format!("Missing asset_id on row {}", line + 1))?
            .to_string();
        let category = record
            .get(1)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        let cv = record
            .iter()
            .skip(2)
            .map(str::trim)
            .filter(|cell| !cell.is_empty())
            .map(|cell| {
                cell.parse::<f64>()
                    .with_context(|| format!("Invalid value {:?} for {}", cell, asset_id))
            })
            .collect::<Result<Vec<f64>>>()?;

        assets.push(AssetHistory {
            asset_id,
            category,
            cv,
        });
    }
    Ok(assets)
}

/// Rows are already-normalized profiles of equal length.
pub fn read_profiles<R: Read>(reader: R) -> Result<ProfileSet> {
    let profiles = read_asset_rows(reader)?
        .into_iter()
        .map(|asset| VolatilityProfile {
            asset_id: asset.asset_id,
            category: asset.category,
            values: asset.cv,
        })
        .collect();
    Ok(ProfileSet::new(profiles))
}

/// Rows are raw cv histories; each is normalized over its trailing `window`.
pub fn read_raw_histories<R: Read>(reader: R, window: usize) -> Result<ProfileSet> {
    let histories = read_asset_rows(reader)?;
    Ok(prepare_profiles(histories, window)?)
}

pub fn load_profiles(path: &Path, raw_window: Option<usize>) -> Result<ProfileSet> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let reader = BufReader::new(file);
    let set = match raw_window {
        Some(window) => read_raw_histories(reader, window)?,
        None => read_profiles(reader)?,
    };
    info!("Loaded {} profiles from {:?}", set.len(), path);
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_series_derives_log_returns() {
        let data = "date,open,high,low,close,volume,cv\n\
                    2024-01-01,10,10,10,10,100,0.02\n\
                    2024-01-02,11,11,11,11,100,\n";
        let series = read_series(data.as_bytes()).unwrap();
        let records = series.records();
        assert_eq!(records.len(), 2);
        assert!(records[0].log_return.is_none());
        assert!((records[1].log_return.unwrap() - (1.1f64).ln()).abs() < 1e-12);
        assert_eq!(records[1].cv, None);
        assert!(!series.has_column("rsi_14"));
    }

    #[test]
    fn test_read_series_keeps_indicator_columns() {
        let data = "date,open,high,low,close,volume,cv,rsi_14,rsi_slope\n\
                    2024-01-01,10,10,10,10,100,0.02,,\n\
                    2024-01-02,11,11,11,11,100,0.03,55.0,1.5\n";
        let series = read_series(data.as_bytes()).unwrap();
        assert_eq!(series.column("rsi_14").unwrap(), &[None, Some(55.0)]);
        assert_eq!(series.column("rsi_slope").unwrap()[1], Some(1.5));
    }

    #[test]
    fn test_read_series_rejects_unordered_dates() {
        let data = "date,open,high,low,close,volume,cv\n\
                    2024-01-02,10,10,10,10,100,0.02\n\
                    2024-01-01,11,11,11,11,100,0.02\n";
        assert!(read_series(data.as_bytes()).is_err());
    }

    #[test]
    fn test_read_profiles_with_optional_category() {
        let data = "asset_id,category,v1,v2,v3\n\
                    BTC,Layer 1,0.1,-0.2,0.1\n\
                    DOGE,,1.0,0.0,-1.0\n";
        let set = read_profiles(data.as_bytes()).unwrap();
        assert_eq!(set.ids(), vec!["BTC".to_string(), "DOGE".to_string()]);
        assert_eq!(set.categories(), vec![Some("Layer 1".to_string()), None]);
        assert_eq!(set.matrix().unwrap().width(), 3);
    }

    #[test]
    fn test_read_raw_histories_skips_short_assets() {
        let data = "asset_id,category,values\n\
                    AAA,,1,2,3,4,5\n\
                    BBB,,1,2\n\
                    CCC,,5,4,3,2,1\n";
        let set = read_raw_histories(data.as_bytes(), 4).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.skipped[0].asset_id, "BBB");
        assert!(set.profiles.iter().all(|p| p.len() == 4));
    }
}
