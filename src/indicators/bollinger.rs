use std::collections::VecDeque;

use super::{statistics::mean_and_std, BarPoint, Indicator};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerOutput {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    /// `(upper - lower) / middle`
    pub width: f64,
    /// `None` when the band collapses to a line.
    pub percent_b: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct BollingerBands {
    period: usize,
    std_dev_multiplier: f64,
    prices: VecDeque<f64>,
}

impl BollingerBands {
    pub fn new(period: usize, std_dev_multiplier: f64) -> Self {
        Self {
            period,
            std_dev_multiplier,
            prices: VecDeque::with_capacity(period + 1),
        }
    }

    pub fn update(&mut self, price: f64) -> Option<BollingerOutput> {
        self.prices.push_back(price);
        if self.prices.len() > self.period {
            self.prices.pop_front();
        }
        if self.period == 0 || self.prices.len() < self.period {
            return None;
        }

        let window: Vec<f64> = self.prices.iter().copied().collect();
        let (middle, std_dev) = mean_and_std(&window);
        let deviation = std_dev * self.std_dev_multiplier;
        let upper = middle + deviation;
        let lower = middle - deviation;
        let band = upper - lower;

        Some(BollingerOutput {
            upper,
            middle,
            lower,
            width: if middle != 0.0 { band / middle } else { 0.0 },
            percent_b: if band > 0.0 { Some((price - lower) / band) } else { None },
        })
    }
}

impl Indicator for BollingerBands {
    fn name(&self) -> &'static str {
        "BB"
    }

    fn lookback(&self) -> usize {
        self.period
    }

    /// Middle band.
    fn update_bar(&mut self, bar: BarPoint) -> Option<f64> {
        self.update(bar.close).map(|b| b.middle)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BollingerSeries {
    pub mid: Vec<Option<f64>>,
    pub upper: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
    pub width: Vec<Option<f64>>,
    pub percent_b: Vec<Option<f64>>,
}

pub fn bollinger_series(closes: &[f64], period: usize, k: f64) -> BollingerSeries {
    let mut bands = BollingerBands::new(period, k);
    let mut out = BollingerSeries::default();
    for c in closes {
        let step = bands.update(*c);
        out.mid.push(step.map(|b| b.middle));
        out.upper.push(step.map(|b| b.upper));
        out.lower.push(step.map(|b| b.lower));
        out.width.push(step.map(|b| b.width));
        out.percent_b.push(step.and_then(|b| b.percent_b));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_ordering() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.9).cos() * 3.0).collect();
        let bb = bollinger_series(&closes, 20, 2.0);
        for i in 19..60 {
            let (l, m, u) = (bb.lower[i].unwrap(), bb.mid[i].unwrap(), bb.upper[i].unwrap());
            assert!(l <= m && m <= u);
        }
        assert!(bb.mid[18].is_none());
    }

    #[test]
    fn test_population_sigma() {
        // mean 5, population sigma 2
        let closes = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let out = bollinger_series(&closes, 8, 2.0);
        assert_eq!(out.mid[7], Some(5.0));
        assert_eq!(out.upper[7], Some(9.0));
        assert_eq!(out.lower[7], Some(1.0));
        assert_eq!(out.width[7], Some(1.6));
        assert_eq!(out.percent_b[7], Some(1.0));
    }

    #[test]
    fn test_flat_band_has_undefined_percent_b() {
        let closes = vec![10.0; 25];
        let bb = bollinger_series(&closes, 20, 2.0);
        assert_eq!(bb.width[24], Some(0.0));
        assert_eq!(bb.percent_b[24], None);
    }
}
