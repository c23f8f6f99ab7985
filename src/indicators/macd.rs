use super::{ema::Ema, BarPoint, Indicator};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdOutput {
    pub macd_line: f64,
    pub signal_line: Option<f64>,
    pub histogram: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast_ema: Ema,
    slow_ema: Ema,
    signal_ema: Ema,
}

impl Macd {
    pub fn new(fast_period: usize, slow_period: usize, signal_period: usize) -> Self {
        Self {
            fast_ema: Ema::new(fast_period),
            slow_ema: Ema::new(slow_period),
            signal_ema: Ema::new(signal_period),
        }
    }

    /// The MACD line is available once the slow EMA seeds; signal and histogram
    /// follow `signal_period - 1` bars later.
    pub fn update(&mut self, price: f64) -> Option<MacdOutput> {
        let fast = self.fast_ema.update(price);
        let slow = self.slow_ema.update(price);

        if let (Some(f), Some(s)) = (fast, slow) {
            let macd_line = f - s;
            let signal_line = self.signal_ema.update(macd_line);
            return Some(MacdOutput {
                macd_line,
                signal_line,
                histogram: signal_line.map(|sig| macd_line - sig),
            });
        }
        None
    }
}

impl Indicator for Macd {
    fn name(&self) -> &'static str {
        "MACD"
    }

    fn lookback(&self) -> usize {
        self.fast_ema.period().max(self.slow_ema.period()) + self.signal_ema.period() - 1
    }

    fn update_bar(&mut self, bar: BarPoint) -> Option<f64> {
        self.update(bar.close).map(|o| o.macd_line)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MacdSeries {
    pub macd: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
}

pub fn macd_series(closes: &[f64], fast: usize, slow: usize, signal: usize) -> MacdSeries {
    let mut out = MacdSeries::default();
    if fast == 0 || slow == 0 || signal == 0 {
        out.macd = vec![None; closes.len()];
        out.signal = out.macd.clone();
        out.histogram = out.macd.clone();
        return out;
    }

    let mut macd = Macd::new(fast, slow, signal);
    for c in closes {
        let step = macd.update(*c);
        out.macd.push(step.map(|o| o.macd_line));
        out.signal.push(step.and_then(|o| o.signal_line));
        out.histogram.push(step.and_then(|o| o.histogram));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macd_definition_offsets() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.7).sin()).collect();
        let s = macd_series(&closes, 12, 26, 9);
        assert_eq!(s.macd.iter().position(|v| v.is_some()), Some(25));
        assert_eq!(s.signal.iter().position(|v| v.is_some()), Some(33));
        assert_eq!(s.histogram.iter().position(|v| v.is_some()), Some(33));
    }

    #[test]
    fn test_histogram_is_macd_minus_signal() {
        let closes: Vec<f64> = (0..60).map(|i| 50.0 + i as f64 * 0.5).collect();
        let s = macd_series(&closes, 12, 26, 9);
        for i in 33..60 {
            let expected = s.macd[i].unwrap() - s.signal[i].unwrap();
            assert!((s.histogram[i].unwrap() - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_macd_of_constant_is_zero() {
        let mut macd = Macd::new(12, 26, 9);
        let mut last = None;
        for _ in 0..40 {
            last = macd.update(10.0);
        }
        let out = last.unwrap();
        assert!(out.macd_line.abs() < 1e-12);
        assert!(out.histogram.unwrap().abs() < 1e-12);
        assert_eq!(macd.lookback(), 34);
        assert!(out.signal_line.is_some());
    }
}
