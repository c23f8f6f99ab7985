mod config;
mod data;
mod engine;
mod error;
mod indicators;
mod ml;
mod types;
mod web;

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::Settings;
use engine::{PredictQuery, DEFAULT_HISTORY_LIMIT, DEFAULT_HORIZON, DEFAULT_INDICATOR_LIMIT};
use indicators::IndicatorSpec;
use ml::{ManualParams, ModelKind};
use types::Frequency;
use web::{start_server, AppState};

#[derive(Parser)]
#[command(name = "price-forecaster")]
#[command(version)]
#[command(about = "Technical features and short-horizon price forecasts for OHLCV bar series", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (default: ./forecaster.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of bar files, overrides `data.dir`
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Forecast the next closes for a ticker
    Predict {
        #[arg(short, long)]
        ticker: String,
        /// Forecast horizon in bars (1-5)
        #[arg(short, long, default_value_t = DEFAULT_HORIZON)]
        days: usize,
        /// daily, weekly or monthly
        #[arg(short, long, default_value = "daily")]
        frequency: String,
        /// ridge or random_forest
        #[arg(short, long)]
        model: Option<String>,
        /// Trailing feature rows used for training
        #[arg(long)]
        window: Option<usize>,
        /// Ridge penalty
        #[arg(long)]
        alpha: Option<f64>,
        /// Market index ticker for the correlation feature
        #[arg(long)]
        market: Option<String>,
        /// Generate a drift/noise path instead of fitting a model
        #[arg(long)]
        manual: bool,
        #[arg(long)]
        base_price: Option<Decimal>,
        #[arg(long)]
        drift_pct: Option<f64>,
        #[arg(long)]
        vol_pct: Option<f64>,
        #[arg(long)]
        slope: Option<f64>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// List the feature columns a model would train on
    Features {
        #[arg(short, long)]
        ticker: String,
        #[arg(short, long, default_value = "daily")]
        frequency: String,
        #[arg(long)]
        market: Option<String>,
    },
    /// Print the most recent feature rows, or one indicator series
    Indicators {
        #[arg(short, long)]
        ticker: String,
        /// daily, weekly, monthly or TIME_SERIES_*
        #[arg(short, long, default_value = "daily")]
        frequency: String,
        #[arg(short, long, default_value_t = DEFAULT_INDICATOR_LIMIT)]
        limit: usize,
        /// Single indicator as kind[:period], e.g. sma:50, rsi, obv
        #[arg(short, long)]
        indicator: Option<String>,
    },
    /// Print the most recent raw bars
    History {
        #[arg(short, long)]
        ticker: String,
        #[arg(short, long, default_value = "daily")]
        frequency: String,
        #[arg(short, long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,
    },
    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.json_logs)?;

    if dotenvy::dotenv().is_ok() {
        debug!("Loaded .env");
    }
    let mut settings = Settings::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(dir) = cli.data_dir {
        settings.data.dir = dir;
    }

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                settings.server.host = host;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }
            check_settings(&settings)?;

            info!("Price forecaster v{}", env!("CARGO_PKG_VERSION"));
            info!("Reading bars from {}", settings.data.dir.display());
            start_server(AppState::from_settings(&settings), &settings.bind_address()).await?;
        }
        Commands::Predict {
            ticker,
            days,
            frequency,
            model,
            window,
            alpha,
            market,
            manual,
            base_price,
            drift_pct,
            vol_pct,
            slope,
            seed,
        } => {
            check_settings(&settings)?;
            let state = AppState::from_settings(&settings);

            let mut model_config = settings.model.clone();
            if let Some(name) = model {
                model_config.kind = ModelKind::from_str(&name)?;
            }
            model_config.window = window.unwrap_or(model_config.window);
            model_config.alpha = alpha.unwrap_or(model_config.alpha);

            let manual = manual.then(|| {
                let defaults = ManualParams::default();
                ManualParams {
                    base_price,
                    drift_pct: drift_pct.unwrap_or(defaults.drift_pct),
                    vol_pct: vol_pct.unwrap_or(defaults.vol_pct),
                    slope: slope.unwrap_or(defaults.slope),
                    seed,
                }
            });

            let query = PredictQuery {
                ticker,
                horizon: days,
                frequency: Frequency::from_str(&frequency)?,
                model: model_config,
                manual,
                market_ticker: market,
            };
            print_json(&state.api.predict(&query)?)?;
        }
        Commands::Features {
            ticker,
            frequency,
            market,
        } => {
            let state = AppState::from_settings(&settings);
            let frequency = Frequency::from_str(&frequency)?;
            print_json(&state.api.features_columns(&ticker, frequency, None, market.as_deref())?)?;
        }
        Commands::Indicators {
            ticker,
            frequency,
            limit,
            indicator,
        } => {
            let state = AppState::from_settings(&settings);
            let frequency = Frequency::from_str(&frequency)?;
            match indicator {
                Some(raw) => {
                    let spec = IndicatorSpec::from_str(&raw)?;
                    print_json(&state.api.indicator_series(&ticker, frequency, spec, limit)?)?;
                }
                None => print_json(&state.api.compute_indicators(&ticker, frequency, limit)?)?,
            }
        }
        Commands::History {
            ticker,
            frequency,
            limit,
        } => {
            let state = AppState::from_settings(&settings);
            let frequency = Frequency::from_str(&frequency)?;
            print_json(&state.api.history(&ticker, frequency, limit)?)?;
        }
        Commands::Config => {
            print!("{}", settings.to_toml()?);
            check_settings(&settings)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn check_settings(settings: &Settings) -> Result<()> {
    settings
        .validate()
        .map_err(|errors| anyhow!("invalid configuration: {}", errors.join("; ")))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
