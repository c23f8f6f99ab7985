use std::collections::VecDeque;

use super::{ema::Sma, BarPoint, Indicator};

#[derive(Debug, Clone)]
pub struct Stochastic {
    k_period: usize,
    window: VecDeque<(f64, f64)>,
    d: Sma,
    k_value: Option<f64>,
    d_value: Option<f64>,
}

impl Stochastic {
    pub fn new(k_period: usize, d_period: usize) -> Self {
        Self {
            k_period,
            window: VecDeque::with_capacity(k_period + 1),
            d: Sma::new(d_period),
            k_value: None,
            d_value: None,
        }
    }

    /// Returns %K; %D is available through `d()` once `d_period` %K values exist.
    pub fn update(&mut self, high: f64, low: f64, close: f64) -> Option<f64> {
        self.window.push_back((high, low));
        if self.window.len() > self.k_period {
            self.window.pop_front();
        }
        if self.k_period == 0 || self.window.len() < self.k_period {
            return None;
        }

        let highest = self.window.iter().map(|w| w.0).fold(f64::NEG_INFINITY, f64::max);
        let lowest = self.window.iter().map(|w| w.1).fold(f64::INFINITY, f64::min);
        let range = highest - lowest;
        let k = if range > 0.0 {
            100.0 * (close - lowest) / range
        } else {
            50.0
        };

        self.k_value = Some(k);
        self.d_value = self.d.update(k);
        self.k_value
    }

    pub fn d(&self) -> Option<f64> {
        self.d_value
    }
}

impl Indicator for Stochastic {
    fn name(&self) -> &'static str {
        "STOCH_K"
    }

    fn lookback(&self) -> usize {
        self.k_period
    }

    /// %K.
    fn update_bar(&mut self, bar: BarPoint) -> Option<f64> {
        self.update(bar.high, bar.low, bar.close)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StochasticSeries {
    pub k: Vec<Option<f64>>,
    pub d: Vec<Option<f64>>,
}

pub fn stochastic_series(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    k_period: usize,
    d_period: usize,
) -> StochasticSeries {
    let mut stoch = Stochastic::new(k_period, d_period);
    let mut out = StochasticSeries::default();
    for i in 0..closes.len() {
        out.k.push(stoch.update(highs[i], lows[i], closes[i]));
        out.d.push(stoch.d());
    }
    out
}
