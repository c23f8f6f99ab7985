use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};

/// Decimal places kept on forecast prices.
pub const PRICE_DP: u32 = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionPoint {
    pub date: NaiveDate,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

impl PredictionPoint {
    pub fn new(date: NaiveDate, price: Decimal) -> Self {
        Self {
            date,
            price: price.round_dp(PRICE_DP),
        }
    }

    pub fn from_f64(date: NaiveDate, price: f64) -> Result<Self> {
        let price = Decimal::try_from(price)
            .map_err(|_| ForecastError::ModelFit(format!("unrepresentable price {} for {}", price, date)))?;
        Ok(Self::new(date, price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_point_rounds_price() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let point = PredictionPoint::from_f64(date, 101.234567).unwrap();
        assert_eq!(point.price, dec!(101.2346));
    }

    #[test]
    fn test_point_rejects_nan() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert!(PredictionPoint::from_f64(date, f64::NAN).is_err());
    }

    #[test]
    fn test_point_serializes_price_as_number() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let json = serde_json::to_value(PredictionPoint::new(date, dec!(10.5))).unwrap();
        assert_eq!(json["date"], "2024-03-01");
        assert_eq!(json["price"], 10.5);
    }
}
