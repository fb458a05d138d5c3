//! Pearson correlation between feature columns.
//!
//! ```text
//! ρ(X, Y) = Cov(X, Y) / (σ_X σ_Y)
//! ```
//!
//! Columns may contain missing cells. A pair of columns is correlated over
//! the rows where both values are present (pairwise-complete), matching
//! `pandas.DataFrame.corr`.
//!
//! # Examples
//!
//! ```
//! use provclust::stats::corr;
//!
//! let x = [Some(1.0), Some(2.0), Some(3.0), None, Some(5.0)];
//! let y = [Some(2.0), Some(4.0), Some(6.0), Some(1.0), Some(10.0)];
//!
//! let r = corr(&x, &y).expect("correlation is defined");
//! assert!((r - 1.0).abs() < 1e-12);
//! ```

use crate::error::{ClusterError, Result};
use crate::primitives::Matrix;

/// Pearson correlation over pairwise-complete observations.
///
/// Returns `None` when fewer than two complete pairs exist or either side
/// has zero variance over those pairs.
///
/// # Panics
///
/// Panics if the columns have different lengths.
#[must_use]
pub fn corr(x: &[Option<f64>], y: &[Option<f64>]) -> Option<f64> {
    assert_eq!(x.len(), y.len(), "Columns must have same length");

    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .collect();

    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let x_mean = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let y_mean = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let mut cov_sum = 0.0;
    let mut x_var_sum = 0.0;
    let mut y_var_sum = 0.0;

    for &(xi, yi) in &pairs {
        let x_diff = xi - x_mean;
        let y_diff = yi - y_mean;
        cov_sum += x_diff * y_diff;
        x_var_sum += x_diff * x_diff;
        y_var_sum += y_diff * y_diff;
    }

    if x_var_sum < 1e-24 || y_var_sum < 1e-24 {
        return None;
    }

    Some((cov_sum / (x_var_sum.sqrt() * y_var_sum.sqrt())).clamp(-1.0, 1.0))
}

/// Correlation matrix of the given columns.
///
/// Undefined correlations (zero variance) are stored as `NaN`; the
/// diagonal is always 1.
///
/// # Errors
///
/// Returns an error if the columns have different lengths.
pub fn corr_matrix(columns: &[&[Option<f64>]]) -> Result<Matrix<f64>> {
    let p = columns.len();
    if let Some(first) = columns.first() {
        for col in columns {
            if col.len() != first.len() {
                return Err(ClusterError::dimension_mismatch("column length", first.len(), col.len()));
            }
        }
    }

    let mut data = vec![0.0; p * p];
    for i in 0..p {
        data[i * p + i] = 1.0;
        for j in (i + 1)..p {
            let r = corr(columns[i], columns[j]).unwrap_or(f64::NAN);
            data[i * p + j] = r;
            data[j * p + i] = r;
        }
    }

    Matrix::from_vec(p, p, data)
}

#[cfg(test)]
#[path = "covariance_tests.rs"]
mod tests;
