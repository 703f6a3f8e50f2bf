//! Weighted ridge regression for the local surrogate
//!
//! Intercept is fitted by centering on the weighted means and is never
//! penalized. The normal equations are solved with Gaussian elimination
//! (partial pivoting); near-singular pivots yield a zero coefficient.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use super::types::ExplainError;

const PIVOT_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct RidgeFit {
    pub coefficients: Array1<f64>,
    pub intercept: f64,
    /// Weighted coefficient of determination on the training rows
    pub score: f64,
}

impl RidgeFit {
    pub fn predict(&self, row: ArrayView1<'_, f64>) -> f64 {
        self.intercept + self.coefficients.dot(&row)
    }
}

pub fn fit_weighted_ridge(
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
    weights: ArrayView1<'_, f64>,
    alpha: f64,
) -> Result<RidgeFit, ExplainError> {
    let (n, p) = x.dim();
    if n == 0 || y.len() != n || weights.len() != n {
        return Err(ExplainError::Numerical(format!(
            "inconsistent training data: {} rows, {} labels, {} weights",
            n,
            y.len(),
            weights.len()
        )));
    }
    let total_weight = weights.sum();
    if !total_weight.is_finite() || total_weight <= 0.0 {
        return Err(ExplainError::Numerical(format!("sample weights sum to {}", total_weight)));
    }

    let x_mean = weights.dot(&x) / total_weight;
    let y_mean = weights.dot(&y) / total_weight;
    let xc = &x - &x_mean.view().insert_axis(Axis(0));
    let yc = &y - y_mean;

    // X^T W X + alpha I and X^T W y
    let xw = &xc * &weights.view().insert_axis(Axis(1));
    let mut gram = xw.t().dot(&xc);
    for j in 0..p {
        gram[[j, j]] += alpha;
    }
    let rhs = xw.t().dot(&yc);

    let coefficients = solve_linear_system(gram, rhs);
    if coefficients.iter().any(|c| !c.is_finite()) {
        return Err(ExplainError::Numerical("non-finite surrogate coefficient".to_string()));
    }
    let intercept = y_mean - x_mean.dot(&coefficients);

    let fitted = x.dot(&coefficients) + intercept;
    let residual: f64 = weights
        .iter()
        .zip(y.iter().zip(fitted.iter()))
        .map(|(w, (yi, fi))| w * (yi - fi).powi(2))
        .sum();
    let spread: f64 = weights.iter().zip(yc.iter()).map(|(w, d)| w * d * d).sum();
    let score = if spread > 0.0 {
        1.0 - residual / spread
    } else if residual <= PIVOT_EPSILON {
        1.0
    } else {
        0.0
    };

    Ok(RidgeFit { coefficients, intercept, score })
}

fn solve_linear_system(mut a: Array2<f64>, mut b: Array1<f64>) -> Array1<f64> {
    let n = b.len();

    for i in 0..n {
        let pivot_row = (i..n)
            .max_by(|&r, &s| a[[r, i]].abs().total_cmp(&a[[s, i]].abs()))
            .unwrap_or(i);
        if pivot_row != i {
            for j in 0..n {
                a.swap([i, j], [pivot_row, j]);
            }
            b.swap(i, pivot_row);
        }

        let pivot = a[[i, i]];
        if pivot.abs() < PIVOT_EPSILON {
            continue;
        }
        for k in (i + 1)..n {
            let factor = a[[k, i]] / pivot;
            if factor == 0.0 {
                continue;
            }
            for j in i..n {
                a[[k, j]] -= factor * a[[i, j]];
            }
            b[k] -= factor * b[i];
        }
    }

    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = b[i];
        for j in (i + 1)..n {
            sum -= a[[i, j]] * x[j];
        }
        let pivot = a[[i, i]];
        x[i] = if pivot.abs() < PIVOT_EPSILON { 0.0 } else { sum / pivot };
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_recovers_exact_linear_relation() {
        let x = array![[0.0, 1.0], [1.0, 0.0], [2.0, 1.0], [3.0, 3.0], [1.0, 2.0]];
        let y = x.column(0).mapv(|v| 2.0 * v) - x.column(1).mapv(|v| 0.5 * v) + 1.0;
        let w = Array1::ones(5);

        let fit = fit_weighted_ridge(x.view(), y.view(), w.view(), 0.0).unwrap();
        assert!((fit.coefficients[0] - 2.0).abs() < 1e-9);
        assert!((fit.coefficients[1] + 0.5).abs() < 1e-9);
        assert!((fit.intercept - 1.0).abs() < 1e-9);
        assert!((fit.score - 1.0).abs() < 1e-9);
        assert!((fit.predict(array![1.0, 1.0].view()) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_penalty_shrinks_coefficients() {
        let x = array![[-1.0], [0.0], [1.0]];
        let y = array![-1.0, 0.0, 1.0];
        let w = Array1::ones(3);

        // slope = sxy / (sxx + alpha) = 2 / (2 + 2)
        let fit = fit_weighted_ridge(x.view(), y.view(), w.view(), 2.0).unwrap();
        assert!((fit.coefficients[0] - 0.5).abs() < 1e-12);
        assert!(fit.intercept.abs() < 1e-12);
    }

    #[test]
    fn test_zero_weight_rows_are_ignored() {
        let x = array![[0.0], [1.0], [2.0], [10.0]];
        let y = array![0.0, 1.0, 2.0, -50.0];
        let w = array![1.0, 1.0, 1.0, 0.0];

        let fit = fit_weighted_ridge(x.view(), y.view(), w.view(), 0.0).unwrap();
        assert!((fit.coefficients[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_constant_column_gets_zero_coefficient() {
        let x = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0]];
        let y = array![1.0, 2.0, 3.0];
        let w = Array1::ones(3);

        let fit = fit_weighted_ridge(x.view(), y.view(), w.view(), 0.0).unwrap();
        assert_eq!(fit.coefficients[0], 0.0);
        assert!((fit.coefficients[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_zero_total_weight() {
        let x = array![[0.0], [1.0]];
        let y = array![0.0, 1.0];
        let w = array![0.0, 0.0];
        assert!(matches!(
            fit_weighted_ridge(x.view(), y.view(), w.view(), 1.0),
            Err(ExplainError::Numerical(_))
        ));
    }
}
