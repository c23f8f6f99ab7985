use super::{BarPoint, Indicator, WilderSmoother};

/// `max(h - l, |h - prev_close|, |l - prev_close|)`; just `h - l` without a previous close.
pub fn true_range(high: f64, low: f64, prev_close: Option<f64>) -> f64 {
    let hl = high - low;
    match prev_close {
        Some(pc) => hl.max((high - pc).abs()).max((low - pc).abs()),
        None => hl,
    }
}

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    prev_close: Option<f64>,
    smoother: WilderSmoother,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            prev_close: None,
            smoother: WilderSmoother::new(period),
        }
    }

    pub fn update(&mut self, high: f64, low: f64, close: f64) -> Option<f64> {
        let tr = true_range(high, low, self.prev_close);
        self.prev_close = Some(close);
        self.smoother.update(tr)
    }
}

impl Indicator for Atr {
    fn name(&self) -> &'static str {
        "ATR"
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn update_bar(&mut self, bar: BarPoint) -> Option<f64> {
        self.update(bar.high, bar.low, bar.close)
    }
}

pub fn true_range_series(highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<f64> {
    (0..closes.len())
        .map(|i| {
            let prev = if i > 0 { Some(closes[i - 1]) } else { None };
            true_range(highs[i], lows[i], prev)
        })
        .collect()
}

pub fn atr_series(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; closes.len()];
    }
    let mut atr = Atr::new(period);
    (0..closes.len())
        .map(|i| atr.update(highs[i], lows[i], closes[i]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_true_range_uses_gap() {
        assert_eq!(true_range(12.0, 10.0, None), 2.0);
        assert_eq!(true_range(12.0, 10.0, Some(15.0)), 5.0);
        assert_eq!(true_range(12.0, 10.0, Some(6.0)), 6.0);
    }

    #[test]
    fn test_atr_seed_and_smoothing() {
        let highs = [11.0, 12.0, 13.0, 14.0];
        let lows = [9.0, 10.0, 11.0, 12.0];
        let closes = [10.0, 11.0, 12.0, 13.0];
        let atr = atr_series(&highs, &lows, &closes, 3);
        assert_eq!(atr[..2], [None, None]);
        // TR = 2, 2, 2, 2
        assert_eq!(atr[2], Some(2.0));
        assert_eq!(atr[3], Some(2.0));
    }

    #[test]
    fn test_atr_is_positive_on_moving_series() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64).sin() * 2.0).collect();
        let highs: Vec<f64> = closes.iter().map(|c| c + 1.0).collect();
        let lows: Vec<f64> = closes.iter().map(|c| c - 1.0).collect();
        let atr = atr_series(&highs, &lows, &closes, 14);
        assert_eq!(atr.iter().position(|v| v.is_some()), Some(13));
        assert!(atr.into_iter().flatten().all(|v| v >= 2.0));
    }
}
