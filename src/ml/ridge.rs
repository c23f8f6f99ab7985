use ndarray::{Array1, Array2};

use crate::error::{ForecastError, Result};

/// L2-regularized least squares on already-standardized features.
///
/// Closed form: `β = (XᵀX + αI)⁻¹ Xᵀ(y − ȳ)`, intercept `ȳ`.
#[derive(Debug, Clone)]
pub struct RidgeRegressor {
    alpha: f64,
    coefficients: Array1<f64>,
    intercept: f64,
}

impl RidgeRegressor {
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, alpha: f64) -> Result<Self> {
        if !(alpha.is_finite() && alpha > 0.0) {
            return Err(ForecastError::InvalidModelConfig(format!("ridge alpha must be positive, got {}", alpha)));
        }
        if x.nrows() != y.len() || x.nrows() == 0 {
            return Err(ForecastError::ModelFit(format!(
                "ridge fit on {} rows with {} targets",
                x.nrows(),
                y.len()
            )));
        }

        let intercept = y.sum() / y.len() as f64;
        let y_centered = y - intercept;

        let mut gram = x.t().dot(x);
        for i in 0..gram.nrows() {
            gram[[i, i]] += alpha;
        }
        let rhs = x.t().dot(&y_centered);
        let coefficients = cholesky_solve(&gram, &rhs)?;

        Ok(Self {
            alpha,
            coefficients,
            intercept,
        })
    }

    pub fn predict_row(&self, row: &Array1<f64>) -> f64 {
        self.intercept + self.coefficients.dot(row)
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn coefficients(&self) -> &Array1<f64> {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

/// Solves `A x = b` for symmetric positive definite `A`.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }

            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return Err(ForecastError::ModelFit("ridge system is not positive definite".to_string()));
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L z = b
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * z[j];
        }
        z[i] = (b[i] - sum) / l[[i, i]];
    }

    // Lᵀ x = z
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (z[i] - sum) / l[[i, i]];
    }

    Ok(x)
}
