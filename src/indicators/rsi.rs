use super::{BarPoint, Indicator, WilderSmoother};

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    avg_gain: WilderSmoother,
    avg_loss: WilderSmoother,
    prev_price: Option<f64>,
    value: Option<f64>,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            avg_gain: WilderSmoother::new(period),
            avg_loss: WilderSmoother::new(period),
            prev_price: None,
            value: None,
        }
    }

    pub fn update(&mut self, price: f64) -> Option<f64> {
        if let Some(prev) = self.prev_price {
            let change = price - prev;
            let gain = change.max(0.0);
            let loss = (-change).max(0.0);

            let avg_gain = self.avg_gain.update(gain);
            let avg_loss = self.avg_loss.update(loss);
            if let (Some(g), Some(l)) = (avg_gain, avg_loss) {
                self.value = Some(rsi_from_averages(g, l));
            }
        }

        self.prev_price = Some(price);
        self.value
    }
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

impl Indicator for Rsi {
    fn name(&self) -> &'static str {
        "RSI"
    }

    fn lookback(&self) -> usize {
        self.period + 1
    }

    fn update_bar(&mut self, bar: BarPoint) -> Option<f64> {
        self.update(bar.close)
    }
}

pub fn rsi_series(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; closes.len()];
    }
    let mut rsi = Rsi::new(period);
    closes.iter().map(|c| rsi.update(*c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsi_strictly_increasing_is_100() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let rsi = rsi_series(&closes, 14);
        assert!(rsi[..14].iter().all(|v| v.is_none()));
        assert!(rsi[14..].iter().all(|v| *v == Some(100.0)));
    }

    #[test]
    fn test_rsi_strictly_decreasing_is_0() {
        let closes: Vec<f64> = (0..40).map(|i| 200.0 - i as f64).collect();
        let rsi = rsi_series(&closes, 14);
        for v in &rsi[14..] {
            assert!(v.unwrap().abs() < 1e-9);
        }
    }

    #[test]
    fn test_rsi_bounded() {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + (i as f64 / 2.0).sin() * 5.0).collect();
        for v in rsi_series(&closes, 14).into_iter().flatten() {
            assert!((0.0..=100.0).contains(&v));
        }
    }

    #[test]
    fn test_rsi_first_value_after_lookback() {
        let mut rsi = Rsi::new(2);
        assert_eq!(rsi.lookback(), 3);
        assert_eq!(rsi.update(1.0), None);
        assert_eq!(rsi.update(2.0), None);
        assert_eq!(rsi.update(3.0), Some(100.0));
    }
}
