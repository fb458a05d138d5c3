//! Gaussian Mixture Models (GMM) for probabilistic clustering.
//!
//! Full-covariance components fitted with Expectation-Maximization.
//! Responsibilities are computed in log space with log-sum-exp and every
//! covariance goes through a Cholesky factorization.

use super::KMeans;
use crate::error::{ClusterError, Result};
use crate::primitives::Matrix;
use crate::traits::UnsupervisedEstimator;
use nalgebra::{Cholesky, DMatrix, DVector};
use std::f64::consts::PI;
use tracing::debug;

/// Gaussian Mixture Model for probabilistic clustering.
///
/// Each restart is initialized from a single K-Means run with a seed
/// derived from the model seed; the restart with the highest mean
/// log-likelihood wins.
///
/// # Example
///
/// ```
/// use provclust::cluster::GaussianMixture;
/// use provclust::prelude::*;
///
/// let data = Matrix::from_vec(6, 2, vec![
///     1.0, 2.0, 1.2, 1.8, 0.9, 2.1,
///     8.0, 8.0, 8.2, 7.9, 7.8, 8.1,
/// ]).expect("valid");
///
/// let mut gmm = GaussianMixture::new(2).with_random_state(42);
/// gmm.fit(&data).expect("fit");
/// let labels = gmm.predict(&data).expect("fitted");
/// assert_eq!(labels[0], labels[1]);
/// assert_ne!(labels[0], labels[3]);
/// ```
#[derive(Debug, Clone)]
pub struct GaussianMixture {
    n_components: usize,
    max_iter: usize,
    tol: f64,
    reg_covar: f64,
    n_init: usize,
    random_state: Option<u64>,
    params: Option<Params>,
    labels: Option<Vec<usize>>,
    log_likelihood: f64,
    converged: bool,
    n_iter: usize,
}

/// Mixture parameters.
#[derive(Debug, Clone)]
struct Params {
    weights: Vec<f64>,
    means: Vec<DVector<f64>>,
    covariances: Vec<DMatrix<f64>>,
}

/// Cholesky factor and log-determinant of one covariance.
struct Factor {
    lower: DMatrix<f64>,
    log_det: f64,
}

/// Outcome of a single restart.
struct Run {
    params: Params,
    log_likelihood: f64,
    converged: bool,
    n_iter: usize,
}

impl GaussianMixture {
    /// Create a new GMM with `n_components` components.
    #[must_use]
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components,
            max_iter: 100,
            tol: 1e-3,
            reg_covar: 1e-6,
            n_init: 1,
            random_state: None,
            params: None,
            labels: None,
            log_likelihood: f64::NEG_INFINITY,
            converged: false,
            n_iter: 0,
        }
    }

    /// Set maximum EM iterations.
    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set convergence tolerance on the mean log-likelihood.
    #[must_use]
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Set the non-negative regularization added to covariance diagonals.
    #[must_use]
    pub fn with_reg_covar(mut self, reg_covar: f64) -> Self {
        self.reg_covar = reg_covar;
        self
    }

    /// Set number of restarts.
    #[must_use]
    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    /// Set random seed.
    #[must_use]
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Check if model is fitted.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.params.is_some()
    }

    /// Component means, one row per component.
    #[must_use]
    pub fn means(&self) -> Option<Matrix<f64>> {
        let params = self.params.as_ref()?;
        let n_features = params.means.first().map_or(0, |m| m.len());
        let data: Vec<f64> = params.means.iter().flat_map(|m| m.iter().copied()).collect();
        Matrix::from_vec(params.means.len(), n_features, data).ok()
    }

    /// Mixing weights.
    #[must_use]
    pub fn weights(&self) -> Option<&[f64]> {
        self.params.as_ref().map(|p| p.weights.as_slice())
    }

    /// Covariance matrices, one per component.
    #[must_use]
    pub fn covariances(&self) -> Option<Vec<Matrix<f64>>> {
        self.params.as_ref().map(|p| {
            p.covariances
                .iter()
                .filter_map(|c| {
                    let rows: Vec<Vec<f64>> = c.row_iter().map(|r| r.iter().copied().collect()).collect();
                    Matrix::from_rows(&rows).ok()
                })
                .collect()
        })
    }

    /// Training labels.
    #[must_use]
    pub fn labels(&self) -> Option<&[usize]> {
        self.labels.as_deref()
    }

    /// Mean per-row log-likelihood of the training data.
    #[must_use]
    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    /// Whether EM converged before the iteration cap.
    #[must_use]
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// EM iterations of the winning restart.
    #[must_use]
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Mean per-row log-likelihood of `x` under the model.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is not fitted or shapes differ.
    pub fn score(&self, x: &Matrix<f64>) -> Result<f64> {
        let params = self.fitted_params(x)?;
        Ok(e_step(x, params)?.0)
    }

    /// Posterior probability of each component for each row.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is not fitted or shapes differ.
    pub fn predict_proba(&self, x: &Matrix<f64>) -> Result<Matrix<f64>> {
        let params = self.fitted_params(x)?;
        let (_, log_resp) = e_step(x, params)?;
        let data = log_resp.iter().flatten().map(|v| v.exp()).collect();
        Matrix::from_vec(x.n_rows(), params.weights.len(), data)
    }

    fn fitted_params(&self, x: &Matrix<f64>) -> Result<&Params> {
        let params = self
            .params
            .as_ref()
            .ok_or_else(|| ClusterError::state("GaussianMixture not fitted"))?;
        let n_features = params.means.first().map_or(0, |m| m.len());
        if x.n_cols() != n_features {
            return Err(ClusterError::dimension_mismatch("n_features", n_features, x.n_cols()));
        }
        Ok(params)
    }

    fn validate(&self, n_samples: usize) -> Result<()> {
        if self.n_components == 0 || self.n_components > n_samples {
            return Err(ClusterError::invalid_param(
                "n_components",
                self.n_components,
                &format!("in [1, {n_samples}]"),
            ));
        }
        if self.n_init == 0 {
            return Err(ClusterError::invalid_param("n_init", self.n_init, ">= 1"));
        }
        if self.max_iter == 0 {
            return Err(ClusterError::invalid_param("max_iter", self.max_iter, ">= 1"));
        }
        if !(self.reg_covar >= 0.0) {
            return Err(ClusterError::invalid_param("reg_covar", self.reg_covar, ">= 0"));
        }
        Ok(())
    }

    /// Hard responsibilities from one K-Means run, then a first M-step.
    fn initialize(&self, x: &Matrix<f64>, seed: u64) -> Result<Params> {
        let mut kmeans = KMeans::new(self.n_components)
            .with_random_state(seed)
            .with_n_init(1)
            .with_max_iter(self.max_iter);
        kmeans.fit(x)?;
        let labels = kmeans
            .labels()
            .ok_or_else(|| ClusterError::Numerical("k-means initialization produced no labels".into()))?;

        let resp: Vec<Vec<f64>> = labels
            .iter()
            .map(|&l| {
                let mut row = vec![0.0; self.n_components];
                row[l] = 1.0;
                row
            })
            .collect();
        Ok(m_step(x, &resp, self.reg_covar))
    }

    fn single_run(&self, x: &Matrix<f64>, seed: u64) -> Result<Run> {
        let mut params = self.initialize(x, seed)?;
        let mut prev = f64::NEG_INFINITY;
        let mut converged = false;
        let mut n_iter = 0;

        for iter in 1..=self.max_iter {
            let (log_likelihood, log_resp) = e_step(x, &params)?;
            let resp: Vec<Vec<f64>> = log_resp
                .iter()
                .map(|row| row.iter().map(|v| v.exp()).collect())
                .collect();
            params = m_step(x, &resp, self.reg_covar);
            n_iter = iter;

            if (log_likelihood - prev).abs() < self.tol {
                converged = true;
                break;
            }
            prev = log_likelihood;
        }

        let (log_likelihood, _) = e_step(x, &params)?;
        Ok(Run {
            params,
            log_likelihood,
            converged,
            n_iter,
        })
    }
}

/// Cholesky factor of each covariance.
fn factorize(params: &Params) -> Result<Vec<Factor>> {
    params
        .covariances
        .iter()
        .enumerate()
        .map(|(k, cov)| {
            let chol = Cholesky::new(cov.clone()).ok_or_else(|| {
                ClusterError::Numerical(format!(
                    "covariance of component {k} is not positive definite; increase reg_covar"
                ))
            })?;
            let lower = chol.l();
            let log_det = 2.0 * lower.diagonal().iter().map(|v| v.ln()).sum::<f64>();
            Ok(Factor { lower, log_det })
        })
        .collect()
}

/// E-step: mean log-likelihood and log responsibilities per row.
fn e_step(x: &Matrix<f64>, params: &Params) -> Result<(f64, Vec<Vec<f64>>)> {
    let factors = factorize(params)?;
    let n_features = x.n_cols() as f64;
    let mut total = 0.0;
    let mut log_resp = Vec::with_capacity(x.n_rows());

    for row in x.rows() {
        let point = DVector::from_column_slice(row);
        let mut weighted = Vec::with_capacity(params.weights.len());
        for ((weight, mean), factor) in params.weights.iter().zip(&params.means).zip(&factors) {
            let diff = &point - mean;
            let solved = factor.lower.solve_lower_triangular(&diff).ok_or_else(|| {
                ClusterError::Numerical("singular covariance factor".into())
            })?;
            let mahalanobis = solved.norm_squared();
            let log_pdf = -0.5 * (n_features * (2.0 * PI).ln() + factor.log_det + mahalanobis);
            weighted.push(weight.ln() + log_pdf);
        }

        let norm = log_sum_exp(&weighted);
        total += norm;
        log_resp.push(weighted.iter().map(|v| v - norm).collect());
    }

    Ok((total / x.n_rows().max(1) as f64, log_resp))
}

/// M-step: weights, means and full covariances from responsibilities.
fn m_step(x: &Matrix<f64>, resp: &[Vec<f64>], reg_covar: f64) -> Params {
    let n_features = x.n_cols();
    let n_components = resp.first().map_or(0, Vec::len);

    let mut nk = vec![10.0 * f64::EPSILON; n_components];
    for row in resp {
        for (n, r) in nk.iter_mut().zip(row) {
            *n += r;
        }
    }
    let total: f64 = nk.iter().sum();
    let weights = nk.iter().map(|n| n / total).collect();

    let mut means = vec![DVector::zeros(n_features); n_components];
    for (row, r) in x.rows().zip(resp) {
        let point = DVector::from_column_slice(row);
        for (mean, &rk) in means.iter_mut().zip(r) {
            *mean += &point * rk;
        }
    }
    for (mean, n) in means.iter_mut().zip(&nk) {
        *mean /= *n;
    }

    let mut covariances = vec![DMatrix::zeros(n_features, n_features); n_components];
    for (row, r) in x.rows().zip(resp) {
        let point = DVector::from_column_slice(row);
        for ((cov, mean), &rk) in covariances.iter_mut().zip(&means).zip(r) {
            let diff = &point - mean;
            *cov += (&diff * diff.transpose()) * rk;
        }
    }
    for (cov, n) in covariances.iter_mut().zip(&nk) {
        *cov /= *n;
        for j in 0..n_features {
            cov[(j, j)] += reg_covar;
        }
    }

    Params {
        weights,
        means,
        covariances,
    }
}

fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

fn argmax(row: &[f64]) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (k, &v)| if v > best.1 { (k, v) } else { best })
        .0
}

impl UnsupervisedEstimator for GaussianMixture {
    type Labels = Vec<usize>;

    fn fit(&mut self, x: &Matrix<f64>) -> Result<()> {
        self.validate(x.n_rows())?;
        let seed = self.random_state.unwrap_or(42);

        let mut best: Option<Run> = None;
        for init in 0..self.n_init {
            let run = self.single_run(x, seed.wrapping_add(init as u64))?;
            debug!(
                init,
                log_likelihood = run.log_likelihood,
                converged = run.converged,
                n_iter = run.n_iter,
                "gaussian mixture restart"
            );
            if best.as_ref().map_or(true, |b| run.log_likelihood > b.log_likelihood) {
                best = Some(run);
            }
        }

        let best = best.ok_or_else(|| ClusterError::Numerical("no mixture restart ran".into()))?;
        let (_, log_resp) = e_step(x, &best.params)?;
        self.labels = Some(log_resp.iter().map(|row| argmax(row)).collect());
        self.log_likelihood = best.log_likelihood;
        self.converged = best.converged;
        self.n_iter = best.n_iter;
        self.params = Some(best.params);
        Ok(())
    }

    fn predict(&self, x: &Matrix<f64>) -> Result<Vec<usize>> {
        let params = self.fitted_params(x)?;
        let (_, log_resp) = e_step(x, params)?;
        Ok(log_resp.iter().map(|row| argmax(row)).collect())
    }
}

#[cfg(test)]
#[path = "tests/mixture.rs"]
mod tests;
