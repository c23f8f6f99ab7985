use chrono::NaiveDate;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::Arc;
use tracing::debug;

use crate::error::{ForecastError, Result};
use crate::indicators::{self as ind, periods, MIN_LOOKBACK};
use crate::types::BarSeries;

/// Name of the optional market-correlation column.
pub const MARKET_CORRELATION: &str = "corr_with_index_20";

/// Feature vocabulary in column order, without the market column.
pub const BASE_COLUMNS: [&str; 63] = [
    "open",
    "high",
    "low",
    "close",
    "volume",
    "sma_5",
    "sma_10",
    "sma_20",
    "sma_50",
    "ema_12",
    "ema_20",
    "ema_26",
    "ema_50",
    "price_vs_sma_50",
    "regime_trend",
    "rsi_14",
    "macd",
    "macd_signal",
    "macd_hist",
    "stoch_k_14",
    "stoch_d_3",
    "adx_14",
    "plus_di_14",
    "minus_di_14",
    "tr",
    "atr_14",
    "atr_pct",
    "bb_mid",
    "bb_upper",
    "bb_lower",
    "bb_width",
    "bb_percent_b",
    "obv",
    "mfi_14",
    "vol_sma_20",
    "volume_spike",
    "vol_ratio",
    "hl_pct",
    "co_pct",
    "cp_pct",
    "ret_1",
    "ret_5",
    "ret_10",
    "log_ret_1",
    "close_lag_1",
    "close_lag_3",
    "close_lag_5",
    "close_lag_10",
    "rolling_std_10",
    "rolling_std_20",
    "rolling_skew_10",
    "rolling_skew_20",
    "rolling_kurt_10",
    "rolling_kurt_20",
    "rolling_zscore_10",
    "rolling_zscore_20",
    "doji",
    "bull_engulf",
    "bear_engulf",
    "support_20",
    "resistance_20",
    "breakout",
    "breakdown",
];

/// Ordered feature names. Two schemas built with the same market setting are equal.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FeatureSchema {
    columns: Vec<&'static str>,
}

impl FeatureSchema {
    pub fn new(with_market: bool) -> Self {
        let mut columns = BASE_COLUMNS.to_vec();
        if with_market {
            columns.push(MARKET_CORRELATION);
        }
        Self { columns }
    }

    pub fn columns(&self) -> &[&'static str] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| *c == name)
    }

    pub fn has_market(&self) -> bool {
        self.columns.last() == Some(&MARKET_CORRELATION)
    }
}

/// One bar's features. `None` marks a value the indicator cannot produce yet.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub values: Vec<Option<f64>>,
    schema: Arc<FeatureSchema>,
}

impl FeatureRow {
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.schema.index_of(name).and_then(|i| self.values[i])
    }

    pub fn is_complete(&self) -> bool {
        self.values.iter().all(Option::is_some)
    }
}

impl Serialize for FeatureRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + 1))?;
        map.serialize_entry("date", &self.date)?;
        for (name, value) in self.schema.columns().iter().zip(self.values.iter()) {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Feature rows aligned 1:1 with the bars they were computed from.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    schema: Arc<FeatureSchema>,
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn latest(&self) -> Option<&FeatureRow> {
        self.rows.last()
    }

    pub fn tail(&self, n: usize) -> &[FeatureRow] {
        let start = self.rows.len().saturating_sub(n);
        &self.rows[start..]
    }

    /// Rows with every feature defined, with their position in the table.
    pub fn complete_rows(&self) -> impl Iterator<Item = (usize, &FeatureRow)> {
        self.rows.iter().enumerate().filter(|(_, r)| r.is_complete())
    }
}

/// Turns a bar series into the fixed feature table.
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    schema: Arc<FeatureSchema>,
}

impl FeatureBuilder {
    pub fn new(with_market: bool) -> Self {
        Self {
            schema: Arc::new(FeatureSchema::new(with_market)),
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn build(&self, series: &BarSeries, market: Option<&BarSeries>) -> Result<FeatureTable> {
        ind::require_history("sma_50", series.len(), MIN_LOOKBACK)?;

        let columns = self.compute_columns(series, market);
        if columns.len() != self.schema.len() {
            return Err(ForecastError::ModelFit(format!(
                "computed {} feature columns for a {}-column schema",
                columns.len(),
                self.schema.len()
            )));
        }

        let rows = series
            .bars()
            .iter()
            .enumerate()
            .map(|(i, bar)| FeatureRow {
                date: bar.date,
                values: columns
                    .iter()
                    .map(|col| col[i].filter(|v| v.is_finite()))
                    .collect(),
                schema: Arc::clone(&self.schema),
            })
            .collect();

        Ok(FeatureTable {
            schema: Arc::clone(&self.schema),
            rows,
        })
    }

    fn compute_columns(&self, series: &BarSeries, market: Option<&BarSeries>) -> Vec<Vec<Option<f64>>> {
        let opens = series.opens();
        let highs = series.highs();
        let lows = series.lows();
        let closes = series.closes();
        let volumes = series.volumes();
        let defined = |v: &[f64]| -> Vec<Option<f64>> { v.iter().copied().map(Some).collect() };

        let sma_20 = ind::sma_series(&closes, periods::SMA_LONG);
        let sma_50 = ind::sma_series(&closes, periods::SMA_TREND);
        let macd = ind::macd_series(&closes, periods::EMA_FAST, periods::EMA_SLOW, periods::MACD_SIGNAL);
        let stoch = ind::stochastic_series(&highs, &lows, &closes, periods::STOCH_K, periods::STOCH_D);
        let adx = ind::adx_series(&highs, &lows, &closes, periods::ADX);
        let atr = ind::atr_series(&highs, &lows, &closes, periods::ATR);
        let bb = ind::bollinger_series(&closes, periods::BOLLINGER, periods::BOLLINGER_K);
        let support = ind::support(&closes, periods::LEVELS);
        let resistance = ind::resistance(&closes, periods::LEVELS);
        let close_col = defined(&closes);

        let mut columns = vec![
            defined(&opens),
            defined(&highs),
            defined(&lows),
            close_col.clone(),
            defined(&volumes),
            ind::sma_series(&closes, periods::SMA_SHORT),
            ind::sma_series(&closes, periods::SMA_MEDIUM),
            sma_20.clone(),
            sma_50.clone(),
            ind::ema_series(&closes, periods::EMA_FAST),
            ind::ema_series(&closes, periods::EMA_MEDIUM),
            ind::ema_series(&closes, periods::EMA_SLOW),
            ind::ema_series(&closes, periods::EMA_TREND),
            ind::zip_with(&close_col, &sma_50, |c, s| if s != 0.0 { Some((c - s) / s) } else { None }),
            ind::regime_trend(&sma_20, &sma_50),
            ind::rsi_series(&closes, periods::RSI),
            macd.macd,
            macd.signal,
            macd.histogram,
            stoch.k,
            stoch.d,
            adx.adx,
            adx.plus_di,
            adx.minus_di,
            defined(&ind::true_range_series(&highs, &lows, &closes)),
            atr.clone(),
            ind::zip_with(&atr, &close_col, |a, c| if c != 0.0 { Some(a / c) } else { None }),
            bb.mid,
            bb.upper,
            bb.lower,
            bb.width,
            bb.percent_b,
            defined(&ind::obv_series(&closes, &volumes)),
            ind::mfi_series(&highs, &lows, &closes, &volumes, periods::MFI),
            ind::sma_series(&volumes, periods::VOLUME_AVG),
            ind::volume_spike_series(&volumes, periods::VOLUME_AVG, periods::VOLUME_SPIKE_RATIO),
            ind::volume_ratio_series(&volumes, periods::VOLUME_AVG),
            ind::hl_pct(&opens, &highs, &lows),
            ind::co_pct(&opens, &closes),
            ind::cp_pct(&highs, &lows, &closes),
            ind::returns(&closes, 1),
            ind::returns(&closes, 5),
            ind::returns(&closes, 10),
            ind::log_returns(&closes),
        ];

        for lag in periods::LAGS {
            columns.push(ind::lagged(&closes, lag));
        }

        columns.extend([
            ind::rolling_std(&closes, periods::ROLLING_SHORT),
            ind::rolling_std(&closes, periods::ROLLING_LONG),
            ind::rolling_skew(&closes, periods::ROLLING_SHORT),
            ind::rolling_skew(&closes, periods::ROLLING_LONG),
            ind::rolling_kurt(&closes, periods::ROLLING_SHORT),
            ind::rolling_kurt(&closes, periods::ROLLING_LONG),
            ind::rolling_zscore(&closes, periods::ROLLING_SHORT),
            ind::rolling_zscore(&closes, periods::ROLLING_LONG),
            ind::doji(&opens, &highs, &lows, &closes),
            ind::bullish_engulfing(&opens, &closes),
            ind::bearish_engulfing(&opens, &closes),
            ind::breakout(&closes, &resistance),
            ind::breakdown(&closes, &support),
        ]);
        // support/resistance sit before the breakout flags in the vocabulary
        let flags_at = columns.len() - 2;
        columns.insert(flags_at, resistance);
        columns.insert(flags_at, support);

        if self.schema.has_market() {
            match market {
                Some(m) => columns.push(ind::market_correlation_series(series, m, periods::CORRELATION)),
                None => {
                    debug!("No market series for {}, {} left undefined", series.symbol(), MARKET_CORRELATION);
                    columns.push(vec![None; series.len()]);
                }
            }
        }

        columns
    }
}
