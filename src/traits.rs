//! Seams shared by the clustering algorithms and the feature scalers.

use crate::error::Result;
use crate::primitives::Matrix;

/// A clustering algorithm: fit on a sample-by-feature matrix, then assign
/// rows to the learned clusters.
///
/// # Examples
///
/// ```
/// use provclust::prelude::*;
///
/// let data = Matrix::from_vec(6, 2, vec![
///     0.0, 0.0, 0.1, 0.1, 0.2, 0.0,
///     10.0, 10.0, 10.1, 10.1, 10.0, 10.2,
/// ]).expect("6x2 matrix");
///
/// let mut kmeans = KMeans::new(2).with_random_state(42);
/// kmeans.fit(&data).expect("fit succeeds");
/// let labels = kmeans.predict(&data).expect("fitted model");
/// assert_eq!(labels.len(), 6);
/// ```
pub trait UnsupervisedEstimator {
    /// Per-row assignment produced by [`Self::predict`].
    type Labels;

    /// Learns clusters from `x`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for empty input or bad hyperparameters.
    fn fit(&mut self, x: &Matrix<f64>) -> Result<()>;

    /// Assigns rows of `x` to the learned clusters.
    ///
    /// # Errors
    ///
    /// Returns a state error before `fit` and a dimension mismatch when the
    /// feature count differs from training.
    fn predict(&self, x: &Matrix<f64>) -> Result<Self::Labels>;
}

/// A column-wise feature transform learned from one matrix and replayed on
/// others with the same columns.
pub trait Transformer {
    /// Learns per-column parameters.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty matrix.
    fn fit(&mut self, x: &Matrix<f64>) -> Result<()>;

    /// Applies the learned parameters.
    ///
    /// # Errors
    ///
    /// Returns a state error before `fit`.
    fn transform(&self, x: &Matrix<f64>) -> Result<Matrix<f64>>;

    /// `fit` followed by `transform` on the same matrix.
    ///
    /// # Errors
    ///
    /// As [`Self::fit`].
    fn fit_transform(&mut self, x: &Matrix<f64>) -> Result<Matrix<f64>> {
        self.fit(x)?;
        self.transform(x)
    }
}
