//! Bar-shape ratios, returns, candle patterns and support/resistance levels.

use super::{periods, rolling_max, rolling_min, shift};

/// `(h - l) / o`
pub fn hl_pct(opens: &[f64], highs: &[f64], lows: &[f64]) -> Vec<Option<f64>> {
    (0..opens.len())
        .map(|i| ratio(highs[i] - lows[i], opens[i]))
        .collect()
}

/// `(c - o) / o`
pub fn co_pct(opens: &[f64], closes: &[f64]) -> Vec<Option<f64>> {
    (0..opens.len())
        .map(|i| ratio(closes[i] - opens[i], opens[i]))
        .collect()
}

/// Close position within the bar's range; 0.5 for a zero-range bar.
pub fn cp_pct(highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<Option<f64>> {
    (0..closes.len())
        .map(|i| {
            let range = highs[i] - lows[i];
            if range > 0.0 {
                Some((closes[i] - lows[i]) / range)
            } else {
                Some(0.5)
            }
        })
        .collect()
}

/// Simple return over `lag` bars.
pub fn returns(closes: &[f64], lag: usize) -> Vec<Option<f64>> {
    shift(closes, lag)
        .into_iter()
        .zip(closes.iter())
        .map(|(prev, c)| prev.and_then(|p| ratio(c - p, p)))
        .collect()
}

pub fn log_returns(closes: &[f64]) -> Vec<Option<f64>> {
    shift(closes, 1)
        .into_iter()
        .zip(closes.iter())
        .map(|(prev, c)| match prev {
            Some(p) if p > 0.0 && *c > 0.0 => Some((c / p).ln()),
            _ => None,
        })
        .collect()
}

pub fn lagged(closes: &[f64], lag: usize) -> Vec<Option<f64>> {
    shift(closes, lag)
}

fn ratio(num: f64, den: f64) -> Option<f64> {
    if den != 0.0 {
        Some(num / den)
    } else {
        None
    }
}

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

pub fn doji(opens: &[f64], highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<Option<f64>> {
    (0..closes.len())
        .map(|i| {
            let body = (closes[i] - opens[i]).abs();
            let range = highs[i] - lows[i];
            Some(flag(body <= periods::DOJI_BODY_RATIO * range))
        })
        .collect()
}

pub fn bullish_engulfing(opens: &[f64], closes: &[f64]) -> Vec<Option<f64>> {
    engulfing(opens, closes, true)
}

pub fn bearish_engulfing(opens: &[f64], closes: &[f64]) -> Vec<Option<f64>> {
    engulfing(opens, closes, false)
}

fn engulfing(opens: &[f64], closes: &[f64], bullish: bool) -> Vec<Option<f64>> {
    (0..closes.len())
        .map(|i| {
            if i == 0 {
                return None;
            }
            let (po, pc, o, c) = (opens[i - 1], closes[i - 1], opens[i], closes[i]);
            let larger_body = (c - o).abs() > (pc - po).abs();
            let hit = if bullish {
                pc < po && c > o && o <= pc && c >= po
            } else {
                pc > po && c < o && o >= pc && c <= po
            };
            Some(flag(hit && larger_body))
        })
        .collect()
}

pub fn support(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling_min(closes, period)
}

pub fn resistance(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling_max(closes, period)
}

/// 1.0 when the close clears the previous bar's resistance level.
pub fn breakout(closes: &[f64], resistance: &[Option<f64>]) -> Vec<Option<f64>> {
    crossed(closes, resistance, |c, level| c > level)
}

/// 1.0 when the close falls under the previous bar's support level.
pub fn breakdown(closes: &[f64], support: &[Option<f64>]) -> Vec<Option<f64>> {
    crossed(closes, support, |c, level| c < level)
}

fn crossed<F>(closes: &[f64], levels: &[Option<f64>], test: F) -> Vec<Option<f64>>
where
    F: Fn(f64, f64) -> bool,
{
    (0..closes.len())
        .map(|i| {
            if i == 0 {
                return None;
            }
            levels[i - 1].map(|level| flag(test(closes[i], level)))
        })
        .collect()
}

/// Sign of the short trend average minus the long one: −1, 0 or 1.
pub fn regime_trend(short: &[Option<f64>], long: &[Option<f64>]) -> Vec<Option<f64>> {
    super::zip_with(short, long, |s, l| {
        Some(if s > l {
            1.0
        } else if s < l {
            -1.0
        } else {
            0.0
        })
    })
}
