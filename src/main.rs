//! volcast CLI
//!
//! Direction forecasts for one daily series, and volatility clustering for a
//! universe of assets. Results are printed as JSON on stdout; logs go to
//! stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use volcast::application::analytics_service::AnalyticsService;
use volcast::config::AnalyticsConfig;
use volcast::domain::clustering::{DistanceModel, ProjectionMethod};
use volcast::infrastructure::csv_input::{load_profiles, load_series};

#[derive(Parser)]
#[command(author, version, about = "Volatility-driven direction forecasting and clustering", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Forecast direction and price path for the next N days
    Forecast {
        /// CSV with date,open,high,low,close,volume,cv columns
        #[arg(short, long)]
        input: PathBuf,

        /// Forecast horizon in days (defaults to FORECAST_HORIZON_DAYS)
        #[arg(short, long)]
        days: Option<usize>,

        /// Symbol label for the report
        #[arg(short, long, default_value = "ASSET")]
        symbol: String,
    },
    /// Compute the inertia curve and its elbow
    Elbow {
        /// CSV with asset_id,category,v1..vW rows
        #[arg(short, long)]
        input: PathBuf,

        /// Distance model (euclidean, dtw)
        #[arg(short, long, default_value = "dtw")]
        method: String,

        /// Rows are raw cv histories to normalize over CLUSTER_WINDOW_DAYS
        #[arg(long)]
        raw: bool,
    },
    /// Cluster assets into K groups with metrics and a 2-D projection
    Cluster {
        /// CSV with asset_id,category,v1..vW rows
        #[arg(short, long)]
        input: PathBuf,

        /// Number of clusters
        #[arg(short, long)]
        k: usize,

        /// Distance model (euclidean, dtw)
        #[arg(short, long, default_value = "dtw")]
        method: String,

        /// Projection (pca, tsne)
        #[arg(short, long, default_value = "pca")]
        projection: String,

        /// Rows are raw cv histories to normalize over CLUSTER_WINDOW_DAYS
        #[arg(long)]
        raw: bool,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
    println!("{}", json);
    Ok(())
}

fn main() -> Result<()> {
    // Setup logging
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let cli = Cli::parse();
    let config = AnalyticsConfig::from_env()?;
    let service = AnalyticsService::new(&config);
    let raw_window = |raw: bool| raw.then_some(config.clustering.window_days);

    match cli.command {
        Commands::Forecast {
            input,
            days,
            symbol,
        } => {
            let series = load_series(&input)?;
            let horizon = days.unwrap_or(config.forecast.horizon_days);
            info!("Forecasting {} for {} days", symbol, horizon);
            let report = service.forecast(&symbol, series, horizon)?;
            print_json(&report)?;
        }
        Commands::Elbow { input, method, raw } => {
            let model: DistanceModel = method.parse()?;
            let profiles = load_profiles(&input, raw_window(raw))?;
            let report = service.elbow(&profiles, model)?;
            print_json(&report)?;
        }
        Commands::Cluster {
            input,
            k,
            method,
            projection,
            raw,
        } => {
            let model: DistanceModel = method.parse()?;
            let projection: ProjectionMethod = projection.parse()?;
            let profiles = load_profiles(&input, raw_window(raw))?;
            let report = service.cluster(&profiles, k, model, projection)?;
            print_json(&report)?;
        }
    }

    Ok(())
}
