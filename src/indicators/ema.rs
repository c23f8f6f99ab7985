use std::collections::VecDeque;

use super::{BarPoint, Indicator};

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    window: VecDeque<f64>,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            window: VecDeque::with_capacity(period + 1),
        }
    }

    pub fn update(&mut self, value: f64) -> Option<f64> {
        self.window.push_back(value);
        if self.window.len() > self.period {
            self.window.pop_front();
        }
        self.value()
    }

    pub fn value(&self) -> Option<f64> {
        if self.period > 0 && self.window.len() == self.period {
            Some(self.window.iter().sum::<f64>() / self.period as f64)
        } else {
            None
        }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &'static str {
        "SMA"
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn update_bar(&mut self, bar: BarPoint) -> Option<f64> {
        self.update(bar.close)
    }
}

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    multiplier: f64,
    value: Option<f64>,
    count: usize,
    sum: f64,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            multiplier: 2.0 / (period as f64 + 1.0),
            value: None,
            count: 0,
            sum: 0.0,
        }
    }

    pub fn update(&mut self, price: f64) -> Option<f64> {
        self.count += 1;

        if self.count < self.period {
            self.sum += price;
            return None;
        } else if self.count == self.period {
            self.sum += price;
            self.value = Some(self.sum / self.period as f64);
            return self.value;
        }

        if let Some(prev) = self.value {
            self.value = Some(price * self.multiplier + prev * (1.0 - self.multiplier));
        }
        self.value
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for Ema {
    fn name(&self) -> &'static str {
        "EMA"
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn update_bar(&mut self, bar: BarPoint) -> Option<f64> {
        self.update(bar.close)
    }
}

pub fn sma_series(values: &[f64], period: usize) -> Vec<Option<f64>> {
    super::rolling_mean(values, period)
}

pub fn ema_series(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }
    let mut ema = Ema::new(period);
    values.iter().map(|v| ema.update(*v)).collect()
}
