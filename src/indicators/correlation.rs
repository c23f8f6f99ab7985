use crate::types::BarSeries;

use super::statistics::pearson;

/// Market closes aligned to the series dates by exact date match.
pub fn align_market_closes(series: &BarSeries, market: &BarSeries) -> Vec<Option<f64>> {
    series
        .bars()
        .iter()
        .map(|b| market.close_on(b.date))
        .collect()
}

/// Rolling Pearson correlation between the series' and the market's one-bar returns.
///
/// A return pair exists at bar `t` only when the market has closes on both `t - 1`
/// and `t`; a window with any missing pair stays undefined.
pub fn market_correlation_series(series: &BarSeries, market: &BarSeries, window: usize) -> Vec<Option<f64>> {
    let closes = series.closes();
    let market_closes = align_market_closes(series, market);

    let pairs: Vec<Option<(f64, f64)>> = (0..closes.len())
        .map(|i| {
            if i == 0 {
                return None;
            }
            let (Some(m_prev), Some(m_cur)) = (market_closes[i - 1], market_closes[i]) else {
                return None;
            };
            if closes[i - 1] == 0.0 || m_prev == 0.0 {
                return None;
            }
            Some((closes[i] / closes[i - 1] - 1.0, m_cur / m_prev - 1.0))
        })
        .collect();

    (0..pairs.len())
        .map(|i| {
            if window < 2 || i + 1 < window {
                return None;
            }
            let slice = &pairs[i + 1 - window..=i];
            let mut xs = Vec::with_capacity(window);
            let mut ys = Vec::with_capacity(window);
            for pair in slice {
                let (x, y) = (*pair)?;
                xs.push(x);
                ys.push(y);
            }
            pearson(&xs, &ys)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::*;
    use crate::types::{Bar, Frequency};

    #[test]
    fn test_self_correlation_is_one() {
        let series = series_from_closes(&wavy_closes(40));
        let corr = market_correlation_series(&series, &series, 20);
        assert_eq!(corr.iter().position(|v| v.is_some()), Some(20));
        assert!((corr[39].unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_market_dates_leave_gaps() {
        let series = series_from_closes(&wavy_closes(40));
        let bars: Vec<Bar> = series
            .bars()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != 30)
            .map(|(_, b)| b.clone())
            .collect();
        let market = BarSeries::new("INDEX", Frequency::Daily, bars).unwrap();
        let corr = market_correlation_series(&series, &market, 20);
        // pairs at 30 and 31 are missing, so every window covering them is undefined
        assert!(corr[29].is_some());
        assert!(corr[30..=39].iter().all(|v| v.is_none()));
    }
}
