use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ForecastError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ForecastError {
    #[error("insufficient history for {indicator}: need {required} bars, got {available}")]
    InsufficientHistory {
        indicator: String,
        required: usize,
        available: usize,
    },

    #[error("insufficient training data: need {required} complete rows, got {available}")]
    InsufficientTrainingData { required: usize, available: usize },

    #[error("invalid horizon {0}: must be between 1 and 5")]
    InvalidHorizon(i64),

    #[error("invalid model config: {0}")]
    InvalidModelConfig(String),

    #[error("upstream data unavailable: {0}")]
    UpstreamDataUnavailable(String),

    #[error("invalid bar series: {0}")]
    InvalidSeries(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("model fit failed: {0}")]
    ModelFit(String),
}

impl ForecastError {
    pub fn kind(&self) -> &'static str {
        match self {
            ForecastError::InsufficientHistory { .. } => "insufficient_history",
            ForecastError::InsufficientTrainingData { .. } => "insufficient_training_data",
            ForecastError::InvalidHorizon(_) => "invalid_horizon",
            ForecastError::InvalidModelConfig(_) => "invalid_model_config",
            ForecastError::UpstreamDataUnavailable(_) => "upstream_data_unavailable",
            ForecastError::InvalidSeries(_) => "invalid_series",
            ForecastError::InvalidRequest(_) => "invalid_request",
            ForecastError::ModelFit(_) => "model_fit",
        }
    }

    pub fn insufficient_history(indicator: impl Into<String>, required: usize, available: usize) -> Self {
        ForecastError::InsufficientHistory {
            indicator: indicator.into(),
            required,
            available,
        }
    }

    /// Structured form handed to the HTTP and CLI layers.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_stable() {
        assert_eq!(ForecastError::InvalidHorizon(9).kind(), "invalid_horizon");
        assert_eq!(
            ForecastError::insufficient_history("SMA(50)", 50, 30).kind(),
            "insufficient_history"
        );
        assert_eq!(
            ForecastError::UpstreamDataUnavailable("rate limited".into()).kind(),
            "upstream_data_unavailable"
        );
    }

    #[test]
    fn test_error_body_carries_message() {
        let body = ForecastError::InsufficientTrainingData { required: 10, available: 3 }.to_body();
        assert_eq!(body.kind, "insufficient_training_data");
        assert!(body.message.contains("need 10"));
        assert!(body.message.contains("got 3"));
    }
}
