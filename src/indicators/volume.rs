use std::collections::VecDeque;

use super::{ema::sma_series, zip_with, BarPoint, Indicator};

/// On-balance volume, starting at zero on the first bar.
#[derive(Debug, Clone, Default)]
pub struct Obv {
    value: f64,
    prev_close: Option<f64>,
}

impl Obv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, close: f64, volume: f64) -> f64 {
        if let Some(prev) = self.prev_close {
            if close > prev {
                self.value += volume;
            } else if close < prev {
                self.value -= volume;
            }
        }
        self.prev_close = Some(close);
        self.value
    }
}

impl Indicator for Obv {
    fn name(&self) -> &'static str {
        "OBV"
    }

    fn lookback(&self) -> usize {
        1
    }

    fn update_bar(&mut self, bar: BarPoint) -> Option<f64> {
        Some(self.update(bar.close, bar.volume))
    }
}

#[derive(Debug, Clone)]
pub struct MoneyFlowIndex {
    period: usize,
    prev_typical: Option<f64>,
    flows: VecDeque<(f64, f64)>,
    value: Option<f64>,
}

impl MoneyFlowIndex {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            prev_typical: None,
            flows: VecDeque::with_capacity(period + 1),
            value: None,
        }
    }

    pub fn update(&mut self, high: f64, low: f64, close: f64, volume: f64) -> Option<f64> {
        let typical = (high + low + close) / 3.0;
        let raw_flow = typical * volume;

        if let Some(prev) = self.prev_typical {
            let flow = if typical > prev {
                (raw_flow, 0.0)
            } else if typical < prev {
                (0.0, raw_flow)
            } else {
                (0.0, 0.0)
            };
            self.flows.push_back(flow);
            if self.flows.len() > self.period {
                self.flows.pop_front();
            }
            if self.period > 0 && self.flows.len() == self.period {
                let positive: f64 = self.flows.iter().map(|f| f.0).sum();
                let negative: f64 = self.flows.iter().map(|f| f.1).sum();
                self.value = Some(if negative == 0.0 {
                    100.0
                } else {
                    100.0 - 100.0 / (1.0 + positive / negative)
                });
            }
        }

        self.prev_typical = Some(typical);
        self.value
    }
}

impl Indicator for MoneyFlowIndex {
    fn name(&self) -> &'static str {
        "MFI"
    }

    fn lookback(&self) -> usize {
        self.period + 1
    }

    fn update_bar(&mut self, bar: BarPoint) -> Option<f64> {
        self.update(bar.high, bar.low, bar.close, bar.volume)
    }
}

pub fn obv_series(closes: &[f64], volumes: &[f64]) -> Vec<f64> {
    let mut obv = Obv::new();
    closes
        .iter()
        .zip(volumes.iter())
        .map(|(c, v)| obv.update(*c, *v))
        .collect()
}

pub fn mfi_series(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    volumes: &[f64],
    period: usize,
) -> Vec<Option<f64>> {
    let mut mfi = MoneyFlowIndex::new(period);
    (0..closes.len())
        .map(|i| mfi.update(highs[i], lows[i], closes[i], volumes[i]))
        .collect()
}

/// 1.0 when volume exceeds `ratio` times its rolling average, else 0.0.
pub fn volume_spike_series(volumes: &[f64], period: usize, ratio: f64) -> Vec<Option<f64>> {
    let avg = sma_series(volumes, period);
    volumes
        .iter()
        .zip(avg.iter())
        .map(|(v, a)| a.map(|a| if *v > ratio * a { 1.0 } else { 0.0 }))
        .collect()
}

/// Volume over its rolling average. A zero average means every volume in the
/// window is zero, so the bar sits exactly at its average: 1.0.
pub fn volume_ratio_series(volumes: &[f64], period: usize) -> Vec<Option<f64>> {
    let current: Vec<Option<f64>> = volumes.iter().map(|v| Some(*v)).collect();
    let avg = sma_series(volumes, period);
    zip_with(&current, &avg, |v, a| if a > 0.0 { Some(v / a) } else { Some(1.0) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_obv_starts_at_zero_and_follows_direction() {
        let closes = [10.0, 11.0, 11.0, 9.0, 12.0];
        let volumes = [100.0, 200.0, 300.0, 400.0, 500.0];
        assert_eq!(obv_series(&closes, &volumes), vec![0.0, 200.0, 200.0, -200.0, 300.0]);
    }

    #[test]
    fn test_obv_monotone_on_rising_closes() {
        let closes: Vec<f64> = (0..30).map(|i| 10.0 + i as f64).collect();
        let volumes = vec![1_000.0; 30];
        let obv = obv_series(&closes, &volumes);
        assert!(obv.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_obv_monotone_on_falling_closes() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 - i as f64).collect();
        let volumes: Vec<f64> = (0..30).map(|i| 500.0 + 10.0 * i as f64).collect();
        let obv = obv_series(&closes, &volumes);
        assert_eq!(obv[0], 0.0);
        assert!(obv.windows(2).all(|w| w[1] <= w[0]));
        assert!(obv[29] < 0.0);
    }

    #[test]
    fn test_mfi_all_up_is_100() {
        let closes: Vec<f64> = (0..20).map(|i| 10.0 + i as f64).collect();
        let highs: Vec<f64> = closes.iter().map(|c| c + 0.5).collect();
        let lows: Vec<f64> = closes.iter().map(|c| c - 0.5).collect();
        let volumes = vec![500.0; 20];
        let mfi = mfi_series(&highs, &lows, &closes, &volumes, 14);
        assert_eq!(mfi.iter().position(|v| v.is_some()), Some(14));
        assert_eq!(mfi[19], Some(100.0));
    }

    #[test]
    fn test_volume_spike_flag() {
        let mut volumes = vec![100.0; 25];
        volumes[24] = 1_000.0;
        let spike = volume_spike_series(&volumes, 20, 1.5);
        assert_eq!(spike[18], None);
        assert_eq!(spike[23], Some(0.0));
        assert_eq!(spike[24], Some(1.0));

        let ratio = volume_ratio_series(&volumes, 20);
        assert_eq!(ratio[23], Some(1.0));
    }

    #[test]
    fn test_zero_volume_stays_defined() {
        let volumes = vec![0.0; 25];
        let ratio = volume_ratio_series(&volumes, 20);
        assert_eq!(ratio[18], None);
        assert!(ratio[19..].iter().all(|r| *r == Some(1.0)));

        let spike = volume_spike_series(&volumes, 20, 1.5);
        assert!(spike[19..].iter().all(|s| *s == Some(0.0)));

        let closes: Vec<f64> = (0..25).map(|i| 10.0 + (i % 3) as f64).collect();
        let highs: Vec<f64> = closes.iter().map(|c| c + 1.0).collect();
        let lows: Vec<f64> = closes.iter().map(|c| c - 1.0).collect();
        let mfi = mfi_series(&highs, &lows, &closes, &volumes, 14);
        assert!(mfi[14..].iter().all(|m| m.is_some()));
        assert!(obv_series(&closes, &volumes).iter().all(|o| *o == 0.0));
    }
}
