use std::str::FromStr;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use super::AppState;
use crate::engine::{
    ColumnsResponse, HistoryResponse, IndicatorSeriesResponse, IndicatorsResponse, PredictQuery, PredictResponse,
    DEFAULT_HISTORY_LIMIT, DEFAULT_HORIZON, DEFAULT_INDICATOR_LIMIT,
};
use crate::error::{ForecastError, Result};
use crate::indicators::IndicatorSpec;
use crate::ml::{ManualParams, ModelConfig, ModelKind};
use crate::types::Frequency;

/// Error half of every handler: status from the error kind, `{kind, message}` body.
#[derive(Debug)]
pub struct ApiError(pub ForecastError);

impl From<ForecastError> for ApiError {
    fn from(err: ForecastError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ForecastError::InvalidHorizon(_)
            | ForecastError::InvalidModelConfig(_)
            | ForecastError::InvalidRequest(_)
            | ForecastError::InvalidSeries(_) => StatusCode::BAD_REQUEST,
            ForecastError::InsufficientHistory { .. } | ForecastError::InsufficientTrainingData { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ForecastError::UpstreamDataUnavailable(_) => StatusCode::BAD_GATEWAY,
            ForecastError::ModelFit(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected ({}): {}", status.as_u16(), self.0);
        }
        (status, Json(self.0.to_body())).into_response()
    }
}

/// `Json` whose rejections (bad syntax, wrong field types, missing fields, wrong
/// content type) come back as `invalid_request` bodies like every other error.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError(ForecastError::InvalidRequest(rejection.body_text()))),
        }
    }
}

/// Runs CPU-bound work off the async executor.
async fn run_blocking<T, F>(work: F) -> std::result::Result<T, ApiError>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError(ForecastError::ModelFit(format!("worker task failed: {}", e))))?
        .map_err(ApiError)
}

/// `model` may be a bare name or an object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ModelField {
    Name(String),
    Spec {
        #[serde(rename = "type")]
        kind: Option<String>,
        window: Option<usize>,
        alpha: Option<f64>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictBody {
    pub ticker: String,
    /// Signed so that out-of-range values surface as `invalid_horizon`.
    #[serde(default = "default_days", alias = "horizon")]
    pub days: i64,
    pub mode: Option<String>,
    pub frequency: Option<String>,
    pub model: Option<ModelField>,
    pub window: Option<usize>,
    pub alpha: Option<f64>,
    pub base_price: Option<Decimal>,
    pub drift_pct: Option<f64>,
    pub vol_pct: Option<f64>,
    pub slope: Option<f64>,
    pub seed: Option<u64>,
    pub market_ticker: Option<String>,
}

fn default_days() -> i64 {
    DEFAULT_HORIZON as i64
}

impl PredictBody {
    pub fn into_query(self, defaults: &ModelConfig) -> Result<PredictQuery> {
        let horizon = usize::try_from(self.days).map_err(|_| ForecastError::InvalidHorizon(self.days))?;
        let frequency = parse_frequency(None, self.frequency.as_deref())?;

        let mut model = defaults.clone();
        match &self.model {
            Some(ModelField::Name(name)) => model.kind = ModelKind::from_str(name)?,
            Some(ModelField::Spec { kind, window, alpha }) => {
                if let Some(kind) = kind {
                    model.kind = ModelKind::from_str(kind)?;
                }
                model.window = window.unwrap_or(model.window);
                model.alpha = alpha.unwrap_or(model.alpha);
            }
            None => {}
        }
        // top-level fields win over the model object
        model.window = self.window.unwrap_or(model.window);
        model.alpha = self.alpha.unwrap_or(model.alpha);

        let mode = self.mode.as_deref().map(|m| m.trim().to_lowercase());
        let manual = match mode.as_deref() {
            None | Some("ml") | Some("auto") | Some("automatic") => None,
            Some("manual") => {
                let defaults = ManualParams::default();
                Some(ManualParams {
                    base_price: self.base_price,
                    drift_pct: self.drift_pct.unwrap_or(defaults.drift_pct),
                    vol_pct: self.vol_pct.unwrap_or(defaults.vol_pct),
                    slope: self.slope.unwrap_or(defaults.slope),
                    seed: self.seed,
                })
            }
            Some(other) => {
                return Err(ForecastError::InvalidRequest(format!("unknown mode '{}'", other)));
            }
        };

        Ok(PredictQuery {
            ticker: self.ticker,
            horizon,
            frequency,
            model,
            manual,
            market_ticker: self.market_ticker,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnsBody {
    pub ticker: String,
    pub frequency: Option<String>,
    pub window: Option<usize>,
    pub market_ticker: Option<String>,
}

/// Shared by `/api/indicators` and `/api/history`; `function` (e.g.
/// `TIME_SERIES_WEEKLY`) takes precedence over `frequency`.
#[derive(Debug, Clone, Deserialize)]
pub struct SeriesBody {
    pub ticker: String,
    pub function: Option<String>,
    pub frequency: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndicatorBody {
    pub ticker: String,
    /// `kind[:period]`, e.g. `sma:50`.
    pub indicator: String,
    pub function: Option<String>,
    pub frequency: Option<String>,
    pub limit: Option<usize>,
}

fn parse_frequency(function: Option<&str>, frequency: Option<&str>) -> Result<Frequency> {
    match function.or(frequency) {
        Some(raw) => Frequency::from_str(raw),
        None => Ok(Frequency::Daily),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        message: "Price forecaster is running",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn post_predict(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<PredictBody>,
) -> std::result::Result<Json<PredictResponse>, ApiError> {
    let query = body.into_query(&state.model_defaults)?;
    let api = Arc::clone(&state.api);
    let response = run_blocking(move || api.predict(&query)).await?;
    Ok(Json(response))
}

pub async fn post_features_columns(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ColumnsBody>,
) -> std::result::Result<Json<ColumnsResponse>, ApiError> {
    let frequency = parse_frequency(None, body.frequency.as_deref())?;
    let api = Arc::clone(&state.api);
    let response = run_blocking(move || {
        api.features_columns(&body.ticker, frequency, body.window, body.market_ticker.as_deref())
    })
    .await?;
    Ok(Json(response))
}

pub async fn post_indicators(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SeriesBody>,
) -> std::result::Result<Json<IndicatorsResponse>, ApiError> {
    let frequency = parse_frequency(body.function.as_deref(), body.frequency.as_deref())?;
    let limit = body.limit.unwrap_or(DEFAULT_INDICATOR_LIMIT);
    let api = Arc::clone(&state.api);
    let response = run_blocking(move || api.compute_indicators(&body.ticker, frequency, limit)).await?;
    Ok(Json(response))
}

pub async fn post_history(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SeriesBody>,
) -> std::result::Result<Json<HistoryResponse>, ApiError> {
    let frequency = parse_frequency(body.function.as_deref(), body.frequency.as_deref())?;
    let limit = body.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let api = Arc::clone(&state.api);
    let response = run_blocking(move || api.history(&body.ticker, frequency, limit)).await?;
    Ok(Json(response))
}

pub async fn post_indicator(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<IndicatorBody>,
) -> std::result::Result<Json<IndicatorSeriesResponse>, ApiError> {
    let frequency = parse_frequency(body.function.as_deref(), body.frequency.as_deref())?;
    let spec = IndicatorSpec::from_str(&body.indicator)?;
    let limit = body.limit.unwrap_or(DEFAULT_INDICATOR_LIMIT);
    let api = Arc::clone(&state.api);
    let response = run_blocking(move || api.indicator_series(&body.ticker, frequency, spec, limit)).await?;
    Ok(Json(response))
}
