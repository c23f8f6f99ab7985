use super::{atr::true_range, BarPoint, Indicator, WilderSmoother};

/// Average directional index with the +DI/−DI lines it is derived from.
#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
    prev: Option<(f64, f64, f64)>,
    tr: WilderSmoother,
    plus_dm: WilderSmoother,
    minus_dm: WilderSmoother,
    dx: WilderSmoother,
    plus_di: Option<f64>,
    minus_di: Option<f64>,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            prev: None,
            tr: WilderSmoother::new(period),
            plus_dm: WilderSmoother::new(period),
            minus_dm: WilderSmoother::new(period),
            dx: WilderSmoother::new(period),
            plus_di: None,
            minus_di: None,
        }
    }

    pub fn update(&mut self, high: f64, low: f64, close: f64) -> Option<f64> {
        let Some((prev_high, prev_low, prev_close)) = self.prev.replace((high, low, close)) else {
            return None;
        };

        let up = high - prev_high;
        let down = prev_low - low;
        let plus_dm = if up > down && up > 0.0 { up } else { 0.0 };
        let minus_dm = if down > up && down > 0.0 { down } else { 0.0 };
        let tr = true_range(high, low, Some(prev_close));

        let sm_tr = self.tr.update(tr);
        let sm_plus = self.plus_dm.update(plus_dm);
        let sm_minus = self.minus_dm.update(minus_dm);

        let (Some(sm_tr), Some(sm_plus), Some(sm_minus)) = (sm_tr, sm_plus, sm_minus) else {
            return None;
        };

        let (plus_di, minus_di) = if sm_tr > 0.0 {
            (100.0 * sm_plus / sm_tr, 100.0 * sm_minus / sm_tr)
        } else {
            (0.0, 0.0)
        };
        self.plus_di = Some(plus_di);
        self.minus_di = Some(minus_di);

        let di_sum = plus_di + minus_di;
        let dx = if di_sum > 0.0 {
            100.0 * (plus_di - minus_di).abs() / di_sum
        } else {
            0.0
        };
        self.dx.update(dx)
    }

    pub fn plus_di(&self) -> Option<f64> {
        self.plus_di
    }

    pub fn minus_di(&self) -> Option<f64> {
        self.minus_di
    }
}

impl Indicator for Adx {
    fn name(&self) -> &'static str {
        "ADX"
    }

    fn lookback(&self) -> usize {
        2 * self.period
    }

    fn update_bar(&mut self, bar: BarPoint) -> Option<f64> {
        self.update(bar.high, bar.low, bar.close)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AdxSeries {
    pub adx: Vec<Option<f64>>,
    pub plus_di: Vec<Option<f64>>,
    pub minus_di: Vec<Option<f64>>,
}

pub fn adx_series(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> AdxSeries {
    let mut out = AdxSeries::default();
    if period == 0 {
        out.adx = vec![None; closes.len()];
        out.plus_di = out.adx.clone();
        out.minus_di = out.adx.clone();
        return out;
    }

    let mut adx = Adx::new(period);
    for i in 0..closes.len() {
        out.adx.push(adx.update(highs[i], lows[i], closes[i]));
        out.plus_di.push(adx.plus_di());
        out.minus_di.push(adx.minus_di());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trending(n: usize, step: f64) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let closes: Vec<f64> = (0..n).map(|i| 100.0 + step * i as f64).collect();
        let highs = closes.iter().map(|c| c + 1.0).collect();
        let lows = closes.iter().map(|c| c - 1.0).collect();
        (highs, lows, closes)
    }

    #[test]
    fn test_adx_definition_offsets() {
        let (h, l, c) = trending(60, 0.5);
        let s = adx_series(&h, &l, &c, 14);
        assert_eq!(s.plus_di.iter().position(|v| v.is_some()), Some(14));
        assert_eq!(s.adx.iter().position(|v| v.is_some()), Some(27));
    }

    #[test]
    fn test_pure_uptrend_has_full_strength() {
        let (h, l, c) = trending(60, 1.0);
        let s = adx_series(&h, &l, &c, 14);
        assert_eq!(s.minus_di[59], Some(0.0));
        assert!(s.plus_di[59].unwrap() > 0.0);
        assert!((s.adx[59].unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_adx_bounded() {
        let c: Vec<f64> = (0..80).map(|i| 50.0 + (i as f64 / 4.0).sin() * 6.0).collect();
        let h: Vec<f64> = c.iter().map(|x| x + 0.8).collect();
        let l: Vec<f64> = c.iter().map(|x| x - 0.8).collect();
        for v in adx_series(&h, &l, &c, 14).adx.into_iter().flatten() {
            assert!((0.0..=100.0).contains(&v));
        }
    }
}
