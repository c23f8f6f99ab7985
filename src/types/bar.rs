use chrono::{Duration, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ForecastError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        }
    }

    /// Date of the bar `steps` intervals after `date`.
    pub fn advance(&self, date: NaiveDate, steps: u32) -> Option<NaiveDate> {
        match self {
            Frequency::Daily => date.checked_add_signed(Duration::days(steps as i64)),
            Frequency::Weekly => date.checked_add_signed(Duration::weeks(steps as i64)),
            Frequency::Monthly => date.checked_add_months(Months::new(steps)),
        }
    }
}

impl FromStr for Frequency {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "DAILY" | "D" | "1D" | "TIME_SERIES_DAILY" => Ok(Frequency::Daily),
            "WEEKLY" | "W" | "1W" | "TIME_SERIES_WEEKLY" => Ok(Frequency::Weekly),
            "MONTHLY" | "M" | "1M" | "TIME_SERIES_MONTHLY" => Ok(Frequency::Monthly),
            other => Err(ForecastError::InvalidRequest(format!("unknown frequency '{}'", other))),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
}

impl Bar {
    /// Flat bar used when the forecast loop extends a series with a predicted close.
    pub fn synthetic(date: NaiveDate, price: Decimal, volume: u64) -> Self {
        Self {
            date,
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
        }
    }

    fn check(&self) -> std::result::Result<(), String> {
        if self.open <= Decimal::ZERO
            || self.high <= Decimal::ZERO
            || self.low <= Decimal::ZERO
            || self.close <= Decimal::ZERO
        {
            return Err(format!("non-positive price on {}", self.date));
        }
        if self.low > self.open.min(self.close) || self.high < self.open.max(self.close) {
            return Err(format!("high/low do not bracket open/close on {}", self.date));
        }
        Ok(())
    }
}

/// Ordered OHLCV history for one symbol at one frequency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSeries {
    symbol: String,
    frequency: Frequency,
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(symbol: impl Into<String>, frequency: Frequency, bars: Vec<Bar>) -> Result<Self> {
        let symbol = symbol.into();
        if symbol.trim().is_empty() {
            return Err(ForecastError::InvalidSeries("symbol is empty".to_string()));
        }
        if bars.is_empty() {
            return Err(ForecastError::InvalidSeries(format!("{} has no bars", symbol)));
        }

        for bar in &bars {
            bar.check().map_err(|e| ForecastError::InvalidSeries(format!("{}: {}", symbol, e)))?;
        }
        for pair in bars.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(ForecastError::InvalidSeries(format!(
                    "{}: dates not strictly ascending at {}",
                    symbol, pair[1].date
                )));
            }
        }

        Ok(Self {
            symbol: symbol.trim().to_uppercase(),
            frequency,
            bars,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn last_n(&self, n: usize) -> &[Bar] {
        let len = self.bars.len();
        if n >= len {
            &self.bars[..]
        } else {
            &self.bars[len - n..]
        }
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| to_f64(b.close)).collect()
    }

    pub fn opens(&self) -> Vec<f64> {
        self.bars.iter().map(|b| to_f64(b.open)).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| to_f64(b.high)).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| to_f64(b.low)).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume as f64).collect()
    }

    pub fn close_on(&self, date: NaiveDate) -> Option<f64> {
        self.bars
            .binary_search_by(|b| b.date.cmp(&date))
            .ok()
            .map(|i| to_f64(self.bars[i].close))
    }

    /// Date one frequency step after the last bar.
    pub fn next_date(&self) -> Option<NaiveDate> {
        self.last().and_then(|b| self.frequency.advance(b.date, 1))
    }

    /// Appends a synthetic bar at the next step, carrying the last volume forward.
    /// Used only on the forecast loop's private working copy.
    pub fn push_synthetic(&mut self, price: Decimal) -> Result<NaiveDate> {
        let date = self
            .next_date()
            .ok_or_else(|| ForecastError::InvalidSeries("date overflow while extending series".to_string()))?;
        let volume = self.last().map(|b| b.volume).unwrap_or(0);
        self.bars.push(Bar::synthetic(date, price, volume));
        Ok(date)
    }
}

pub fn to_f64(value: Decimal) -> f64 {
    value.try_into().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bar(date: &str, close: Decimal) -> Bar {
        Bar {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            open: close,
            high: close + dec!(1),
            low: close - dec!(1),
            close,
            volume: 1_000,
        }
    }

    #[test]
    fn test_series_rejects_unordered_dates() {
        let bars = vec![bar("2024-01-03", dec!(10)), bar("2024-01-02", dec!(11))];
        let err = BarSeries::new("ACME", Frequency::Daily, bars).unwrap_err();
        assert_eq!(err.kind(), "invalid_series");
    }

    #[test]
    fn test_series_rejects_duplicate_dates() {
        let bars = vec![bar("2024-01-02", dec!(10)), bar("2024-01-02", dec!(11))];
        assert!(BarSeries::new("ACME", Frequency::Daily, bars).is_err());
    }

    #[test]
    fn test_series_rejects_non_positive_price() {
        let mut b = bar("2024-01-02", dec!(10));
        b.low = dec!(0);
        assert!(BarSeries::new("ACME", Frequency::Daily, vec![b]).is_err());
    }

    #[test]
    fn test_push_synthetic_advances_and_carries_volume() {
        let bars = vec![bar("2024-01-30", dec!(10)), bar("2024-01-31", dec!(11))];
        let mut series = BarSeries::new("acme", Frequency::Monthly, bars).unwrap();
        assert_eq!(series.symbol(), "ACME");

        let date = series.push_synthetic(dec!(12.5)).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        let last = series.last().unwrap();
        assert_eq!(last.close, dec!(12.5));
        assert_eq!(last.high, last.low);
        assert_eq!(last.volume, 1_000);
    }

    #[test]
    fn test_frequency_parsing() {
        assert_eq!("TIME_SERIES_WEEKLY".parse::<Frequency>().unwrap(), Frequency::Weekly);
        assert_eq!("daily".parse::<Frequency>().unwrap(), Frequency::Daily);
        assert!("hourly".parse::<Frequency>().is_err());
    }

    #[test]
    fn test_close_on_lookup() {
        let bars = vec![bar("2024-01-02", dec!(10)), bar("2024-01-03", dec!(11))];
        let series = BarSeries::new("ACME", Frequency::Daily, bars).unwrap();
        assert_eq!(series.close_on(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()), Some(11.0));
        assert_eq!(series.close_on(NaiveDate::from_ymd_opt(2024, 1, 4).unwrap()), None);
    }
}
