pub mod ema;
pub mod rsi;
pub mod macd;
pub mod bollinger;
pub mod atr;
pub mod adx;
pub mod volume;
pub mod stochastic;
pub mod statistics;
pub mod price_action;
pub mod correlation;

pub use ema::*;
pub use rsi::*;
pub use macd::*;
pub use bollinger::*;
pub use atr::*;
pub use adx::*;
pub use volume::*;
pub use stochastic::*;
pub use statistics::*;
pub use price_action::*;
pub use correlation::*;

use std::fmt;
use std::str::FromStr;

use crate::error::{ForecastError, Result};
use crate::types::{to_f64, Bar, BarSeries};

/// Indicator windows shared by the library and the feature builder.
pub mod periods {
    pub const SMA_SHORT: usize = 5;
    pub const SMA_MEDIUM: usize = 10;
    pub const SMA_LONG: usize = 20;
    pub const SMA_TREND: usize = 50;
    pub const EMA_FAST: usize = 12;
    pub const EMA_MEDIUM: usize = 20;
    pub const EMA_SLOW: usize = 26;
    pub const EMA_TREND: usize = 50;
    pub const MACD_SIGNAL: usize = 9;
    pub const RSI: usize = 14;
    pub const ATR: usize = 14;
    pub const ADX: usize = 14;
    pub const MFI: usize = 14;
    pub const STOCH_K: usize = 14;
    pub const STOCH_D: usize = 3;
    pub const BOLLINGER: usize = 20;
    pub const BOLLINGER_K: f64 = 2.0;
    pub const ROLLING_SHORT: usize = 10;
    pub const ROLLING_LONG: usize = 20;
    pub const LEVELS: usize = 20;
    pub const VOLUME_AVG: usize = 20;
    pub const CORRELATION: usize = 20;
    pub const LAGS: [usize; 4] = [1, 3, 5, 10];
    pub const VOLUME_SPIKE_RATIO: f64 = 1.5;
    pub const DOJI_BODY_RATIO: f64 = 0.1;
}

/// Longest lookback of any column in the feature vocabulary (SMA50 / EMA50).
pub const MIN_LOOKBACK: usize = 50;

/// One bar in the float domain the indicators work in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarPoint {
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl From<&Bar> for BarPoint {
    fn from(bar: &Bar) -> Self {
        Self {
            high: to_f64(bar.high),
            low: to_f64(bar.low),
            close: to_f64(bar.close),
            volume: bar.volume as f64,
        }
    }
}

pub trait Indicator {
    fn name(&self) -> &'static str;
    /// Bars needed before the first defined value.
    fn lookback(&self) -> usize;
    /// Feeds the next bar and returns the primary output once defined.
    fn update_bar(&mut self, bar: BarPoint) -> Option<f64>;
}

/// Wilder smoothing: simple mean of the first `period` inputs, then
/// `prev * (period - 1) / period + x / period`.
#[derive(Debug, Clone)]
pub struct WilderSmoother {
    period: usize,
    count: usize,
    sum: f64,
    value: Option<f64>,
}

impl WilderSmoother {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            count: 0,
            sum: 0.0,
            value: None,
        }
    }

    pub fn update(&mut self, x: f64) -> Option<f64> {
        self.count += 1;
        let period = self.period as f64;

        if self.count < self.period {
            self.sum += x;
            return None;
        } else if self.count == self.period {
            self.sum += x;
            self.value = Some(self.sum / period);
            return self.value;
        }

        if let Some(prev) = self.value {
            self.value = Some((prev * (period - 1.0) + x) / period);
        }
        self.value
    }
}

/// Mean of the `period` values ending at each index; `None` until the window fills.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, |w| w.iter().sum::<f64>() / w.len() as f64)
}

pub fn rolling_min(values: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, |w| w.iter().copied().fold(f64::INFINITY, f64::min))
}

pub fn rolling_max(values: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, |w| w.iter().copied().fold(f64::NEG_INFINITY, f64::max))
}

pub(crate) fn rolling<F>(values: &[f64], period: usize, f: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> f64,
{
    if period == 0 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|i| {
            if i + 1 < period {
                None
            } else {
                Some(f(&values[i + 1 - period..=i]))
            }
        })
        .collect()
}

/// Value `lag` bars back; `None` for the first `lag` rows.
pub fn shift(values: &[f64], lag: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| if i >= lag { Some(values[i - lag]) } else { None })
        .collect()
}

/// Element-wise combination that stays undefined when either side is.
pub(crate) fn zip_with<F>(a: &[Option<f64>], b: &[Option<f64>], f: F) -> Vec<Option<f64>>
where
    F: Fn(f64, f64) -> Option<f64>,
{
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) => f(*x, *y),
            _ => None,
        })
        .collect()
}

pub fn require_history(indicator: &str, available: usize, required: usize) -> Result<()> {
    if available < required {
        return Err(ForecastError::insufficient_history(indicator, required, available));
    }
    Ok(())
}

/// One named indicator series computed straight from a `BarSeries`, with the
/// minimum-length check applied. Parses from `kind[:period]`, e.g. `sma:50`,
/// `rsi` or `obv`; a missing period takes the feature-table default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorSpec {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Atr(usize),
    Mfi(usize),
    Adx(usize),
    Bollinger(usize),
    StochK(usize),
    Obv,
}

impl IndicatorSpec {
    /// Fresh streaming indicator for this spec.
    pub fn build(&self) -> Box<dyn Indicator> {
        match *self {
            IndicatorSpec::Sma(n) => Box::new(Sma::new(n)),
            IndicatorSpec::Ema(n) => Box::new(Ema::new(n)),
            IndicatorSpec::Rsi(n) => Box::new(Rsi::new(n)),
            IndicatorSpec::Atr(n) => Box::new(Atr::new(n)),
            IndicatorSpec::Mfi(n) => Box::new(MoneyFlowIndex::new(n)),
            IndicatorSpec::Adx(n) => Box::new(Adx::new(n)),
            IndicatorSpec::Bollinger(n) => Box::new(BollingerBands::new(n, periods::BOLLINGER_K)),
            IndicatorSpec::StochK(n) => Box::new(Stochastic::new(n, periods::STOCH_D)),
            IndicatorSpec::Obv => Box::new(Obv::new()),
        }
    }

    /// Bars required for at least one defined value.
    pub fn lookback(&self) -> usize {
        self.build().lookback()
    }

    /// One value per bar, `None` until the indicator is defined.
    pub fn compute(&self, series: &BarSeries) -> Result<Vec<Option<f64>>> {
        if self.period() == Some(0) {
            return Err(ForecastError::InvalidRequest(format!("{} needs a positive period", self)));
        }
        let mut indicator = self.build();
        require_history(&self.to_string(), series.len(), indicator.lookback())?;

        Ok(series
            .bars()
            .iter()
            .map(|bar| indicator.update_bar(BarPoint::from(bar)))
            .collect())
    }

    fn period(&self) -> Option<usize> {
        match *self {
            IndicatorSpec::Sma(n)
            | IndicatorSpec::Ema(n)
            | IndicatorSpec::Rsi(n)
            | IndicatorSpec::Atr(n)
            | IndicatorSpec::Mfi(n)
            | IndicatorSpec::Adx(n)
            | IndicatorSpec::Bollinger(n)
            | IndicatorSpec::StochK(n) => Some(n),
            IndicatorSpec::Obv => None,
        }
    }
}

impl FromStr for IndicatorSpec {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.trim().to_lowercase();
        let (kind, period) = match raw.split_once(':') {
            Some((kind, period)) => {
                let period = period.trim().parse::<usize>().map_err(|_| {
                    ForecastError::InvalidRequest(format!("indicator period must be a whole number, got '{}'", period))
                })?;
                (kind.trim(), Some(period))
            }
            None => (raw.as_str(), None),
        };

        let spec = match kind {
            "sma" => IndicatorSpec::Sma(period.unwrap_or(periods::SMA_LONG)),
            "ema" => IndicatorSpec::Ema(period.unwrap_or(periods::EMA_FAST)),
            "rsi" => IndicatorSpec::Rsi(period.unwrap_or(periods::RSI)),
            "atr" => IndicatorSpec::Atr(period.unwrap_or(periods::ATR)),
            "mfi" => IndicatorSpec::Mfi(period.unwrap_or(periods::MFI)),
            "adx" => IndicatorSpec::Adx(period.unwrap_or(periods::ADX)),
            "bb" | "bollinger" => IndicatorSpec::Bollinger(period.unwrap_or(periods::BOLLINGER)),
            "stoch" | "stoch_k" => IndicatorSpec::StochK(period.unwrap_or(periods::STOCH_K)),
            "obv" if period.is_none() => IndicatorSpec::Obv,
            "obv" => return Err(ForecastError::InvalidRequest("OBV takes no period".to_string())),
            other => return Err(ForecastError::InvalidRequest(format!("unknown indicator '{}'", other))),
        };
        Ok(spec)
    }
}

impl fmt::Display for IndicatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.build().name();
        match self.period() {
            Some(n) => write!(f, "{}({})", name, n),
            None => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{Duration, NaiveDate};
    use rust_decimal::Decimal;

    use crate::types::{Bar, BarSeries, Frequency};

    pub fn start_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    /// Daily series with the given closes; open = previous close, a fixed 1.0 band
    /// around the body and a volume that grows by 10 each bar.
    pub fn series_from_closes(closes: &[f64]) -> BarSeries {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let open = if i == 0 { c } else { closes[i - 1] };
                let close = Decimal::try_from(c).unwrap();
                let open = Decimal::try_from(open).unwrap();
                Bar {
                    date: start_date() + Duration::days(i as i64),
                    open,
                    high: open.max(close) + Decimal::ONE,
                    low: open.min(close) - Decimal::ONE,
                    close,
                    volume: 1_000 + 10 * i as u64,
                }
            })
            .collect();
        BarSeries::new("TEST", Frequency::Daily, bars).unwrap()
    }

    pub fn linear_closes(start: f64, step: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| start + step * i as f64).collect()
    }

    /// Deterministic wavy series that never touches zero.
    pub fn wavy_closes(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let t = i as f64;
                100.0 + 0.3 * t + 4.0 * (t / 3.0).sin() + 1.5 * (t / 1.7).cos()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_wilder_smoother_seed_and_recursion() {
        let mut w = WilderSmoother::new(3);
        assert_eq!(w.update(1.0), None);
        assert_eq!(w.update(2.0), None);
        assert_eq!(w.update(3.0), Some(2.0));
        assert_eq!(w.update(5.0), Some((2.0 * 2.0 + 5.0) / 3.0));
    }

    #[test]
    fn test_rolling_helpers_align_with_input() {
        let values = [3.0, 1.0, 4.0, 1.0, 5.0];
        assert_eq!(rolling_min(&values, 3), vec![None, None, Some(1.0), Some(1.0), Some(1.0)]);
        assert_eq!(rolling_max(&values, 3), vec![None, None, Some(4.0), Some(4.0), Some(5.0)]);
        assert_eq!(shift(&values, 2), vec![None, None, Some(3.0), Some(1.0), Some(4.0)]);
    }

    #[test]
    fn test_sma_50_on_30_bars_is_insufficient_history() {
        let series = series_from_closes(&linear_closes(100.0, 1.0, 30));
        let err = IndicatorSpec::Sma(50).compute(&series).unwrap_err();
        assert_eq!(
            err,
            ForecastError::InsufficientHistory {
                indicator: "SMA(50)".to_string(),
                required: 50,
                available: 30,
            }
        );
    }

    #[test]
    fn test_spec_lookbacks_match_first_defined_index() {
        let series = series_from_closes(&wavy_closes(80));
        let specs = [
            IndicatorSpec::Sma(20),
            IndicatorSpec::Ema(12),
            IndicatorSpec::Rsi(14),
            IndicatorSpec::Atr(14),
            IndicatorSpec::Mfi(14),
            IndicatorSpec::Adx(14),
            IndicatorSpec::Bollinger(20),
            IndicatorSpec::StochK(14),
            IndicatorSpec::Obv,
        ];
        for spec in specs {
            let values = spec.compute(&series).unwrap();
            let first = values.iter().position(|v| v.is_some()).unwrap();
            assert_eq!(first + 1, spec.lookback(), "{}", spec);
            assert!(values[first..].iter().all(|v| v.map(f64::is_finite).unwrap_or(false)), "{}", spec);
        }
    }

    #[test]
    fn test_spec_parsing() {
        assert_eq!("sma:50".parse::<IndicatorSpec>().unwrap(), IndicatorSpec::Sma(50));
        assert_eq!(" RSI ".parse::<IndicatorSpec>().unwrap(), IndicatorSpec::Rsi(14));
        assert_eq!("bollinger".parse::<IndicatorSpec>().unwrap(), IndicatorSpec::Bollinger(20));
        assert_eq!("obv".parse::<IndicatorSpec>().unwrap(), IndicatorSpec::Obv);
        assert_eq!(IndicatorSpec::StochK(14).to_string(), "STOCH_K(14)");
        for bad in ["vwap", "sma:x", "obv:3", ""] {
            assert_eq!(bad.parse::<IndicatorSpec>().unwrap_err().kind(), "invalid_request", "{}", bad);
        }
    }

    #[test]
    fn test_streaming_spec_matches_slice_functions() {
        let series = series_from_closes(&wavy_closes(60));
        let closes = series.closes();
        assert_eq!(IndicatorSpec::Sma(20).compute(&series).unwrap(), sma_series(&closes, 20));
        assert_eq!(IndicatorSpec::Rsi(14).compute(&series).unwrap(), rsi_series(&closes, 14));
        let adx = adx_series(&series.highs(), &series.lows(), &closes, 14).adx;
        assert_eq!(IndicatorSpec::Adx(14).compute(&series).unwrap(), adx);
    }

    #[test]
    fn test_zero_period_rejected() {
        let series = series_from_closes(&wavy_closes(10));
        assert!(matches!(
            IndicatorSpec::Ema(0).compute(&series),
            Err(ForecastError::InvalidRequest(_))
        ));
    }
}
