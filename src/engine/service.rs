use serde::Serialize;
use tracing::info;

use crate::error::{ForecastError, Result};
use crate::ml::{FeatureRow, ForecastModel, ManualGenerator, ManualParams, ModelConfig};
use crate::types::{to_f64, BarSeries, PredictionPoint};

pub const MIN_HORIZON: usize = 1;
pub const MAX_HORIZON: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub enum PredictionMode {
    Automatic,
    Manual(ManualParams),
}

#[derive(Debug, Clone)]
pub struct PredictionRequest {
    pub series: BarSeries,
    pub market: Option<BarSeries>,
    pub mode: PredictionMode,
    pub horizon: usize,
    pub model: ModelConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionOutcome {
    pub predictions: Vec<PredictionPoint>,
    pub latest_features: Option<FeatureRow>,
}

pub fn validate_horizon(horizon: usize) -> Result<()> {
    if !(MIN_HORIZON..=MAX_HORIZON).contains(&horizon) {
        return Err(ForecastError::InvalidHorizon(i64::try_from(horizon).unwrap_or(i64::MAX)));
    }
    Ok(())
}

/// Per-request coordination of feature building, training and forecasting.
/// Holds only read-only configuration, so one instance serves concurrent callers.
#[derive(Debug, Clone, Default)]
pub struct PredictionService {
    manual: ManualGenerator,
}

impl PredictionService {
    pub fn new(manual: ManualGenerator) -> Self {
        Self { manual }
    }

    pub fn predict(&self, request: PredictionRequest) -> Result<PredictionOutcome> {
        validate_horizon(request.horizon)?;

        match &request.mode {
            PredictionMode::Manual(params) => {
                let predictions = self.predict_manual(&request.series, params, request.horizon)?;
                Ok(PredictionOutcome {
                    predictions,
                    latest_features: None,
                })
            }
            PredictionMode::Automatic => {
                let model = ForecastModel::new(request.model.clone(), request.market.is_some())?;
                let market = request.market.as_ref();

                let forecast = model.forecast(&request.series, market, request.horizon)?;
                info!(
                    "Forecast {} x{} with {} ({} training rows)",
                    request.series.symbol(),
                    request.horizon,
                    forecast.report.kind,
                    forecast.report.rows_used
                );

                Ok(PredictionOutcome {
                    predictions: forecast.points,
                    latest_features: Some(forecast.latest_features),
                })
            }
        }
    }

    /// Manual path anchored on the series' last bar; `base_price` overrides its close.
    pub fn predict_manual(
        &self,
        series: &BarSeries,
        params: &ManualParams,
        horizon: usize,
    ) -> Result<Vec<PredictionPoint>> {
        validate_horizon(horizon)?;
        let last = series
            .last()
            .ok_or_else(|| ForecastError::InvalidSeries(format!("{} has no bars", series.symbol())))?;
        let base = params.base_price.unwrap_or(last.close);
        info!(
            "Manual forecast {} x{} from {:.4}",
            series.symbol(),
            horizon,
            to_f64(base)
        );
        self.manual
            .generate(base, params, last.date, series.frequency(), horizon)
    }

    pub fn manual_generator(&self) -> &ManualGenerator {
        &self.manual
    }
}
