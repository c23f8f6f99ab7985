pub mod json;

pub use json::JsonBarStore;

use crate::error::{ForecastError, Result};
use crate::types::{BarSeries, Frequency};

const MAX_TICKER_LEN: usize = 32;

/// Where historical bars come from. Implementations map their own failures to
/// `ForecastError::UpstreamDataUnavailable`.
#[cfg_attr(test, mockall::automock)]
pub trait BarSource: Send + Sync {
    fn fetch(&self, ticker: &str, frequency: Frequency) -> Result<BarSeries>;
}

/// Trimmed, uppercased ticker. Only `A-Z 0-9 . ^ = -` are accepted, so a ticker
/// can always be used as part of a file name.
pub fn normalize_ticker(raw: &str) -> Result<String> {
    let ticker = raw.trim().to_uppercase();
    if ticker.is_empty() {
        return Err(ForecastError::InvalidRequest("ticker is required".to_string()));
    }
    if ticker.len() > MAX_TICKER_LEN {
        return Err(ForecastError::InvalidRequest(format!(
            "ticker is longer than {} characters",
            MAX_TICKER_LEN
        )));
    }
    if let Some(bad) = ticker
        .chars()
        .find(|&c| !(c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '.' | '^' | '=' | '-')))
    {
        return Err(ForecastError::InvalidRequest(format!("ticker '{}' contains '{}'", raw.trim(), bad)));
    }
    Ok(ticker)
}
