use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ForecastError, Result};
use crate::types::{to_f64, Frequency, PredictionPoint};

pub const DEFAULT_DRIFT_PCT: f64 = 0.1;
pub const DEFAULT_VOL_PCT: f64 = 1.0;
pub const DEFAULT_SEED: u64 = 42;

/// User-supplied path parameters, all in percent except `slope` (price units per step).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualParams {
    pub base_price: Option<Decimal>,
    pub drift_pct: f64,
    pub vol_pct: f64,
    pub slope: f64,
    pub seed: Option<u64>,
}

impl Default for ManualParams {
    fn default() -> Self {
        Self {
            base_price: None,
            drift_pct: DEFAULT_DRIFT_PCT,
            vol_pct: DEFAULT_VOL_PCT,
            slope: 0.0,
            seed: None,
        }
    }
}

impl ManualParams {
    pub fn validate(&self) -> Result<()> {
        if !self.drift_pct.is_finite() || !self.slope.is_finite() {
            return Err(ForecastError::InvalidRequest("drift_pct and slope must be finite".to_string()));
        }
        if !self.vol_pct.is_finite() || self.vol_pct < 0.0 {
            return Err(ForecastError::InvalidRequest(format!(
                "vol_pct must be a non-negative number, got {}",
                self.vol_pct
            )));
        }
        if let Some(base) = self.base_price {
            if base <= Decimal::ZERO {
                return Err(ForecastError::InvalidRequest(format!("base_price must be positive, got {}", base)));
            }
        }
        Ok(())
    }
}

/// Synthetic price path: `p[t+1] = p[t] * (1 + drift + noise) + slope`, with
/// `noise ~ Normal(0, vol)` from a seeded generator. Never looks at indicators.
#[derive(Debug, Clone)]
pub struct ManualGenerator {
    default_seed: u64,
}

impl Default for ManualGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl ManualGenerator {
    pub fn new(default_seed: u64) -> Self {
        Self { default_seed }
    }

    /// `anchor` is the date the path starts after; the first point is one
    /// `frequency` step later.
    pub fn generate(
        &self,
        base_price: Decimal,
        params: &ManualParams,
        anchor: NaiveDate,
        frequency: Frequency,
        horizon: usize,
    ) -> Result<Vec<PredictionPoint>> {
        params.validate()?;

        let drift = params.drift_pct / 100.0;
        let vol = params.vol_pct / 100.0;
        let seed = params.seed.unwrap_or(self.default_seed);
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = if vol > 0.0 {
            Some(Normal::new(0.0, vol).map_err(|e| ForecastError::InvalidRequest(format!("vol_pct: {}", e)))?)
        } else {
            None
        };

        debug!(
            "Manual path from {} at {}: drift {} vol {} slope {} seed {}",
            anchor, base_price, drift, vol, params.slope, seed
        );

        let mut price = to_f64(base_price);
        let mut points = Vec::with_capacity(horizon);
        for step in 1..=horizon {
            let shock = noise.as_ref().map(|n| n.sample(&mut rng)).unwrap_or(0.0);
            price = price * (1.0 + drift + shock) + params.slope;

            let date = frequency
                .advance(anchor, step as u32)
                .ok_or_else(|| ForecastError::InvalidRequest("forecast date out of range".to_string()))?;
            points.push(PredictionPoint::from_f64(date, price)?);
        }
        Ok(points)
    }
}
