//! Rolling population moments over closing prices.

use super::rolling;

/// Mean and population standard deviation.
pub fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Central moments m2, m3, m4 of a window.
fn central_moments(values: &[f64]) -> (f64, f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
    for v in values {
        let d = v - mean;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
    }
    (m2 / n, m3 / n, m4 / n)
}

const DEGENERATE_VARIANCE: f64 = 1e-18;

pub fn skewness(values: &[f64]) -> f64 {
    let (m2, m3, _) = central_moments(values);
    if m2 <= DEGENERATE_VARIANCE {
        return 0.0;
    }
    m3 / m2.powf(1.5)
}

/// Excess kurtosis.
pub fn kurtosis(values: &[f64]) -> f64 {
    let (m2, _, m4) = central_moments(values);
    if m2 <= DEGENERATE_VARIANCE {
        return 0.0;
    }
    m4 / (m2 * m2) - 3.0
}

pub fn zscore(values: &[f64]) -> f64 {
    let (mean, std) = mean_and_std(values);
    match values.last() {
        Some(last) if std * std > DEGENERATE_VARIANCE => (last - mean) / std,
        _ => 0.0,
    }
}

pub fn rolling_std(values: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, |w| mean_and_std(w).1)
}

pub fn rolling_skew(values: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, skewness)
}

pub fn rolling_kurt(values: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, kurtosis)
}

/// Z-score of the latest value within its trailing window.
pub fn rolling_zscore(values: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, zscore)
}

/// Pearson correlation; `None` when either side has zero variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mx = xs.iter().sum::<f64>() / n;
    let my = ys.iter().sum::<f64>() / n;

    let (mut cov, mut vx, mut vy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys.iter()) {
        let dx = x - mx;
        let dy = y - my;
        cov += dx * dy;
        vx += dx * dx;
        vy += dy * dy;
    }
    if vx <= DEGENERATE_VARIANCE || vy <= DEGENERATE_VARIANCE {
        return None;
    }
    Some((cov / (vx.sqrt() * vy.sqrt())).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_population_std() {
        let (mean, std) = mean_and_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(mean, 5.0);
        assert_eq!(std, 2.0);
    }

    #[test]
    fn test_symmetric_window_has_zero_skew() {
        assert!(skewness(&[1.0, 2.0, 3.0, 4.0, 5.0]).abs() < 1e-12);
        // uniform-ish: platykurtic
        assert!(kurtosis(&[1.0, 2.0, 3.0, 4.0, 5.0]) < 0.0);
    }

    #[test]
    fn test_degenerate_window_yields_zero() {
        let flat = vec![7.0; 10];
        assert_eq!(skewness(&flat), 0.0);
        assert_eq!(kurtosis(&flat), 0.0);
        assert_eq!(zscore(&flat), 0.0);
        assert_eq!(rolling_std(&flat, 10)[9], Some(0.0));
    }

    #[test]
    fn test_rolling_zscore_alignment() {
        let values: Vec<f64> = (1..=12).map(|i| i as f64).collect();
        let z = rolling_zscore(&values, 10);
        assert!(z[8].is_none());
        // last of 1..=10: (10 - 5.5) / sqrt(8.25)
        assert!((z[9].unwrap() - 4.5 / 8.25f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_right_skewed_window() {
        assert!(skewness(&[1.0, 1.0, 1.0, 1.0, 10.0]) > 0.0);
    }

    #[test]
    fn test_pearson() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        assert!((pearson(&xs, &[2.0, 4.0, 6.0, 8.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&xs, &[8.0, 6.0, 4.0, 2.0]).unwrap() + 1.0).abs() < 1e-12);
        assert_eq!(pearson(&xs, &[1.0, 1.0, 1.0, 1.0]), None);
    }
}
