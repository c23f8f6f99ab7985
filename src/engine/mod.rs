pub mod api;
pub mod service;

pub use api::{
    ColumnsResponse, ForecastApi, HistoryResponse, IndicatorSeriesResponse, IndicatorValue, IndicatorsResponse,
    PredictQuery, PredictResponse, DEFAULT_HISTORY_LIMIT, DEFAULT_HORIZON, DEFAULT_INDICATOR_LIMIT,
};
pub use service::{
    validate_horizon, PredictionMode, PredictionOutcome, PredictionRequest, PredictionService, MAX_HORIZON,
    MIN_HORIZON,
};
