use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::service::{validate_horizon, PredictionMode, PredictionRequest, PredictionService};
use crate::data::{normalize_ticker, BarSource};
use crate::error::{ForecastError, Result};
use crate::indicators::IndicatorSpec;
use crate::ml::{FeatureBuilder, FeatureRow, ManualParams, ModelConfig, DEFAULT_WINDOW};
use crate::types::{Bar, BarSeries, Frequency, PredictionPoint};

pub const DEFAULT_HORIZON: usize = 5;
pub const DEFAULT_INDICATOR_LIMIT: usize = 120;
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictQuery {
    pub ticker: String,
    pub horizon: usize,
    pub frequency: Frequency,
    pub model: ModelConfig,
    /// `Some` selects manual mode.
    pub manual: Option<ManualParams>,
    pub market_ticker: Option<String>,
}

impl PredictQuery {
    pub fn automatic(ticker: impl Into<String>, horizon: usize) -> Self {
        Self {
            ticker: ticker.into(),
            horizon,
            frequency: Frequency::Daily,
            model: ModelConfig::default(),
            manual: None,
            market_ticker: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictResponse {
    pub ticker: String,
    pub predictions: Vec<PredictionPoint>,
    pub latest_features: Option<FeatureRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnsResponse {
    pub columns: Vec<&'static str>,
    pub count: usize,
    /// Complete, targeted rows in the trailing window a model would train on.
    pub training_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndicatorsResponse {
    pub ticker: String,
    pub frequency: Frequency,
    pub rows: Vec<FeatureRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorValue {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndicatorSeriesResponse {
    pub ticker: String,
    pub frequency: Frequency,
    pub indicator: String,
    pub lookback: usize,
    pub values: Vec<IndicatorValue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryResponse {
    pub ticker: String,
    pub frequency: Frequency,
    pub bars: Vec<Bar>,
}

/// The outward operations, backed by any bar source.
pub struct ForecastApi<S: BarSource> {
    source: S,
    service: PredictionService,
}

impl<S: BarSource> ForecastApi<S> {
    pub fn new(source: S, service: PredictionService) -> Self {
        Self { source, service }
    }

    pub fn predict(&self, query: &PredictQuery) -> Result<PredictResponse> {
        validate_horizon(query.horizon)?;
        let ticker = normalize_ticker(&query.ticker)?;
        query.model.validate()?;

        info!(
            "Predict {} x{} ({}, {})",
            ticker,
            query.horizon,
            query.frequency,
            if query.manual.is_some() { "manual" } else { "automatic" }
        );

        if let Some(params) = &query.manual {
            if let Some(base) = params.base_price {
                // No history needed; the path starts from today.
                let predictions = self.service.manual_generator().generate(
                    base,
                    params,
                    Utc::now().date_naive(),
                    query.frequency,
                    query.horizon,
                )?;
                return Ok(PredictResponse {
                    ticker,
                    predictions,
                    latest_features: None,
                });
            }
        }

        let series = self.source.fetch(&ticker, query.frequency)?;
        let (mode, market) = match &query.manual {
            Some(params) => (PredictionMode::Manual(params.clone()), None),
            None => (
                PredictionMode::Automatic,
                self.fetch_market(query.market_ticker.as_deref(), query.frequency)?,
            ),
        };

        let outcome = self.service.predict(PredictionRequest {
            series,
            market,
            mode,
            horizon: query.horizon,
            model: query.model.clone(),
        })?;

        Ok(PredictResponse {
            ticker,
            predictions: outcome.predictions,
            latest_features: outcome.latest_features,
        })
    }

    /// Columns a model trained for this ticker would use, and how many rows of the
    /// trailing `window` (default 60) it could train on. The history is still
    /// fetched and featurized so an unusable ticker fails here too.
    pub fn features_columns(
        &self,
        ticker: &str,
        frequency: Frequency,
        window: Option<usize>,
        market_ticker: Option<&str>,
    ) -> Result<ColumnsResponse> {
        let ticker = normalize_ticker(ticker)?;
        let window = window.unwrap_or(DEFAULT_WINDOW);
        if window == 0 {
            return Err(ForecastError::InvalidRequest("window must be at least 1".to_string()));
        }

        let series = self.source.fetch(&ticker, frequency)?;
        let market = self.fetch_market(market_ticker, frequency)?;
        let builder = FeatureBuilder::new(market.is_some());
        let table = builder.build(&series, market.as_ref())?;

        // the last row has no next close to learn
        let start = table.len().saturating_sub(window);
        let last = table.len().saturating_sub(1);
        let training_rows = table
            .complete_rows()
            .filter(|(i, _)| *i >= start && *i < last)
            .count();

        let columns = builder.schema().columns().to_vec();
        Ok(ColumnsResponse {
            count: columns.len(),
            columns,
            training_rows,
        })
    }

    /// Last `limit` feature rows for display.
    pub fn compute_indicators(&self, ticker: &str, frequency: Frequency, limit: usize) -> Result<IndicatorsResponse> {
        let ticker = normalize_ticker(ticker)?;
        if limit == 0 {
            return Err(ForecastError::InvalidRequest("limit must be at least 1".to_string()));
        }

        let series = self.source.fetch(&ticker, frequency)?;
        let table = FeatureBuilder::new(false).build(&series, None)?;
        Ok(IndicatorsResponse {
            ticker,
            frequency,
            rows: table.tail(limit).to_vec(),
        })
    }

    /// Last `limit` values of one indicator, dated by bar.
    pub fn indicator_series(
        &self,
        ticker: &str,
        frequency: Frequency,
        spec: IndicatorSpec,
        limit: usize,
    ) -> Result<IndicatorSeriesResponse> {
        let ticker = normalize_ticker(ticker)?;
        if limit == 0 {
            return Err(ForecastError::InvalidRequest("limit must be at least 1".to_string()));
        }

        let series = self.source.fetch(&ticker, frequency)?;
        let computed = spec.compute(&series)?;
        let start = computed.len().saturating_sub(limit);
        let values = series.bars()[start..]
            .iter()
            .zip(&computed[start..])
            .map(|(bar, value)| IndicatorValue {
                date: bar.date,
                value: *value,
            })
            .collect();

        Ok(IndicatorSeriesResponse {
            ticker,
            frequency,
            indicator: spec.to_string(),
            lookback: spec.lookback(),
            values,
        })
    }

    /// Last `limit` raw bars.
    pub fn history(&self, ticker: &str, frequency: Frequency, limit: usize) -> Result<HistoryResponse> {
        let ticker = normalize_ticker(ticker)?;
        if limit == 0 {
            return Err(ForecastError::InvalidRequest("limit must be at least 1".to_string()));
        }

        let series = self.source.fetch(&ticker, frequency)?;
        Ok(HistoryResponse {
            ticker,
            frequency,
            bars: series.last_n(limit).to_vec(),
        })
    }

    /// A market series that cannot be fetched only drops the correlation column;
    /// a malformed market ticker is still rejected.
    fn fetch_market(&self, market_ticker: Option<&str>, frequency: Frequency) -> Result<Option<BarSeries>> {
        let Some(raw) = market_ticker.filter(|t| !t.trim().is_empty()) else {
            return Ok(None);
        };
        let market_ticker = normalize_ticker(raw)?;
        match self.source.fetch(&market_ticker, frequency) {
            Ok(series) => Ok(Some(series)),
            Err(e) => {
                warn!("Market series {} unavailable, continuing without it: {}", market_ticker, e);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MockBarSource;
    use crate::indicators::test_support::*;
    use rust_decimal_macros::dec;

    fn api_with(source: MockBarSource) -> ForecastApi<MockBarSource> {
        ForecastApi::new(source, PredictionService::default())
    }

    fn serving(closes: Vec<f64>) -> MockBarSource {
        let mut source = MockBarSource::new();
        source
            .expect_fetch()
            .returning(move |ticker, _| {
                if ticker == "ACME" {
                    Ok(series_from_closes(&closes))
                } else {
                    Err(ForecastError::UpstreamDataUnavailable(format!("{} not found", ticker)))
                }
            });
        source
    }

    #[test]
    fn test_predict_automatic() {
        let api = api_with(serving(wavy_closes(90)));
        let response = api.predict(&PredictQuery::automatic(" acme ", 2)).unwrap();
        assert_eq!(response.ticker, "ACME");
        assert_eq!(response.predictions.len(), 2);
        assert!(response.latest_features.is_some());
    }

    #[test]
    fn test_bad_horizon_never_fetches() {
        let mut source = MockBarSource::new();
        source.expect_fetch().times(0);
        let api = api_with(source);
        let err = api.predict(&PredictQuery::automatic("ACME", 9)).unwrap_err();
        assert_eq!(err, ForecastError::InvalidHorizon(9));
    }

    #[test]
    fn test_upstream_failure_propagates() {
        let api = api_with(serving(wavy_closes(90)));
        let err = api.predict(&PredictQuery::automatic("MISSING", 1)).unwrap_err();
        assert_eq!(err.kind(), "upstream_data_unavailable");
    }

    #[test]
    fn test_manual_with_base_price_skips_fetch() {
        let mut source = MockBarSource::new();
        source.expect_fetch().times(0);
        let api = api_with(source);

        let mut query = PredictQuery::automatic("ACME", 3);
        query.manual = Some(ManualParams {
            base_price: Some(dec!(100)),
            drift_pct: 0.0,
            vol_pct: 0.0,
            slope: 2.0,
            seed: None,
        });
        let response = api.predict(&query).unwrap();
        let prices: Vec<_> = response.predictions.iter().map(|p| p.price).collect();
        assert_eq!(prices, vec![dec!(102), dec!(104), dec!(106)]);
        assert!(response.latest_features.is_none());
    }

    #[test]
    fn test_manual_without_base_price_uses_last_close() {
        let api = api_with(serving(vec![10.0, 11.0, 12.0]));
        let mut query = PredictQuery::automatic("ACME", 1);
        query.manual = Some(ManualParams {
            drift_pct: 0.0,
            vol_pct: 0.0,
            ..ManualParams::default()
        });
        let response = api.predict(&query).unwrap();
        assert_eq!(response.predictions[0].price, dec!(12));
    }

    #[test]
    fn test_missing_market_drops_correlation_column() {
        let api = api_with(serving(wavy_closes(60)));
        let with = api
            .features_columns("ACME", Frequency::Daily, None, Some("ACME"))
            .unwrap();
        let without = api
            .features_columns("ACME", Frequency::Daily, Some(30), Some("NOINDEX"))
            .unwrap();
        assert_eq!(with.count, 64);
        assert_eq!(without.count, 63);
        assert_eq!(with.columns.last(), Some(&"corr_with_index_20"));
    }

    #[test]
    fn test_features_columns_needs_history() {
        let api = api_with(serving(wavy_closes(20)));
        let err = api.features_columns("ACME", Frequency::Daily, None, None).unwrap_err();
        assert_eq!(err.kind(), "insufficient_history");
    }

    #[test]
    fn test_compute_indicators_limits_rows() {
        let api = api_with(serving(wavy_closes(70)));
        let response = api.compute_indicators("ACME", Frequency::Daily, 5).unwrap();
        assert_eq!(response.rows.len(), 5);
        assert_eq!(response.rows[4].date, start_date() + chrono::Duration::days(69));

        let all = api.compute_indicators("ACME", Frequency::Daily, 500).unwrap();
        assert_eq!(all.rows.len(), 70);

        let err = api.compute_indicators("ACME", Frequency::Daily, 0).unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
    }

    #[test]
    fn test_features_columns_counts_training_rows_in_window() {
        // 70 bars: rows 49..=68 are complete and have a next close
        let api = api_with(serving(wavy_closes(70)));
        let default_window = api.features_columns("ACME", Frequency::Daily, None, None).unwrap();
        assert_eq!(default_window.training_rows, 20);
        let narrow = api.features_columns("ACME", Frequency::Daily, Some(8), None).unwrap();
        assert_eq!(narrow.training_rows, 7);
        assert_eq!(narrow.columns, default_window.columns);

        let err = api.features_columns("ACME", Frequency::Daily, Some(0), None).unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
    }

    #[test]
    fn test_path_like_tickers_never_reach_the_source() {
        let mut source = MockBarSource::new();
        source.expect_fetch().times(0);
        let api = api_with(source);

        let err = api.predict(&PredictQuery::automatic("../secret", 1)).unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
        assert!(api.history("a/b", Frequency::Daily, 5).is_err());
        assert!(api.compute_indicators("..\\x", Frequency::Daily, 5).is_err());
    }

    #[test]
    fn test_malformed_market_ticker_is_rejected() {
        let api = api_with(serving(wavy_closes(60)));
        let err = api
            .features_columns("ACME", Frequency::Daily, None, Some("../index"))
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_request");

        let mut query = PredictQuery::automatic("ACME", 1);
        query.market_ticker = Some("^gspc/..".to_string());
        assert_eq!(api.predict(&query).unwrap_err().kind(), "invalid_request");
    }

    #[test]
    fn test_indicator_series() {
        let api = api_with(serving(wavy_closes(40)));
        let spec: IndicatorSpec = "rsi:14".parse().unwrap();
        let response = api.indicator_series("acme", Frequency::Daily, spec, 30).unwrap();
        assert_eq!(response.indicator, "RSI(14)");
        assert_eq!(response.lookback, 15);
        assert_eq!(response.values.len(), 30);
        assert_eq!(response.values[29].date, start_date() + chrono::Duration::days(39));
        // bars 10..=39 returned; RSI(14) is first defined at bar 14
        assert!(response.values[3].value.is_none());
        assert!(response.values[4].value.is_some());

        let err = api
            .indicator_series("ACME", Frequency::Daily, IndicatorSpec::Sma(50), 10)
            .unwrap_err();
        assert_eq!(
            err,
            ForecastError::InsufficientHistory {
                indicator: "SMA(50)".to_string(),
                required: 50,
                available: 40,
            }
        );
    }

    #[test]
    fn test_history_tail() {
        let api = api_with(serving(wavy_closes(30)));
        let response = api.history("ACME", Frequency::Daily, 10).unwrap();
        assert_eq!(response.bars.len(), 10);
        assert!(api.history("", Frequency::Daily, 10).is_err());
    }
}
