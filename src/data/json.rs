use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

use super::{normalize_ticker, BarSource};
use crate::error::{ForecastError, Result};
use crate::types::{Bar, BarSeries, Frequency};

/// Reads bars from `<data_dir>/<TICKER>_<frequency>.json`, a JSON array of
/// `{date, open, high, low, close, volume}` objects.
#[derive(Debug, Clone)]
pub struct JsonBarStore {
    data_dir: PathBuf,
}

impl JsonBarStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// File holding `ticker` at `frequency`; fails for tickers that are not plain symbols.
    pub fn path_for(&self, ticker: &str, frequency: Frequency) -> Result<PathBuf> {
        let ticker = normalize_ticker(ticker)?;
        Ok(self.data_dir.join(format!("{}_{}.json", ticker, frequency.as_str())))
    }

    /// Writes a series in the layout `fetch` reads.
    pub fn save(&self, series: &BarSeries) -> Result<PathBuf> {
        let path = self.path_for(series.symbol(), series.frequency())?;
        let body = serde_json::to_string_pretty(series.bars())
            .map_err(|e| ForecastError::UpstreamDataUnavailable(format!("encode {}: {}", series.symbol(), e)))?;
        fs::create_dir_all(&self.data_dir)
            .and_then(|_| fs::write(&path, body))
            .map_err(|e| ForecastError::UpstreamDataUnavailable(format!("write {}: {}", path.display(), e)))?;
        Ok(path)
    }
}

impl BarSource for JsonBarStore {
    fn fetch(&self, ticker: &str, frequency: Frequency) -> Result<BarSeries> {
        let path = self.path_for(ticker, frequency)?;
        debug!("Loading bars from {}", path.display());

        let raw = fs::read_to_string(&path).map_err(|e| {
            warn!("No bar file for {} ({}): {}", ticker, frequency, e);
            ForecastError::UpstreamDataUnavailable(format!("{} {}: {}", ticker, frequency, e))
        })?;
        let mut bars: Vec<Bar> = serde_json::from_str(&raw).map_err(|e| {
            ForecastError::UpstreamDataUnavailable(format!("malformed bars in {}: {}", path.display(), e))
        })?;
        if bars.is_empty() {
            return Err(ForecastError::UpstreamDataUnavailable(format!("{} {}: no bars", ticker, frequency)));
        }
        bars.sort_by_key(|b| b.date);

        BarSeries::new(ticker, frequency, bars)
    }
}
