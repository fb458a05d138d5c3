//! Preprocessing transformers for imputation, outlier treatment, feature
//! selection and scaling.
//!
//! The scalers in this module implement [`Transformer`] and operate on dense
//! matrices. The column-level helpers in the submodules work on
//! `Option<f64>` cells because they run before missing values are resolved.
//!
//! # Example
//!
//! ```
//! use provclust::prelude::*;
//! use provclust::preprocessing::RobustScaler;
//!
//! // Income per capita and literacy rate, one outlier province
//! let data = Matrix::from_vec(5, 2, vec![
//!     10.0, 0.90,
//!     12.0, 0.92,
//!     11.0, 0.95,
//!     13.0, 0.97,
//!     95.0, 0.99,
//! ]).expect("5x2 matrix");
//!
//! let mut scaler = RobustScaler::new();
//! let scaled = scaler.fit_transform(&data).expect("fit");
//!
//! // Median row maps to zero, the outlier stays far out
//! assert!(scaled.get(1, 0).abs() < 1e-12);
//! assert!(scaled.get(4, 0) > 10.0);
//! ```

pub mod impute;
pub mod outliers;
mod pca;
pub mod selection;

pub use impute::ImputeMethod;
pub use outliers::{Bounds, OutlierAction, OutlierMethod, OutlierStat};
pub use pca::{Projection, PCA};
pub use selection::{select_by_correlation, Selection};

use crate::error::{ClusterError, Result};
use crate::primitives::Matrix;
use crate::stats::DescriptiveStats;
use crate::traits::Transformer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Feature scaling method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NormalizeMethod {
    /// Zero mean, unit (population) variance.
    #[default]
    Standard,
    /// Linear rescale to [0, 1].
    MinMax,
    /// Median centering, IQR scaling.
    Robust,
}

impl NormalizeMethod {
    const NAMES: [&'static str; 3] = ["standard", "minmax", "robust"];

    /// Returns an unfitted scaler for this method.
    #[must_use]
    pub fn scaler(self) -> Scaler {
        match self {
            Self::Standard => Scaler::Standard(StandardScaler::new()),
            Self::MinMax => Scaler::MinMax(MinMaxScaler::new()),
            Self::Robust => Scaler::Robust(RobustScaler::new()),
        }
    }
}

impl fmt::Display for NormalizeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Self::NAMES[*self as usize])
    }
}

impl FromStr for NormalizeMethod {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "minmax" | "min_max" | "min-max" => Ok(Self::MinMax),
            "robust" => Ok(Self::Robust),
            _ => Err(ClusterError::unknown_method("normalization method", s, &Self::NAMES)),
        }
    }
}

impl TryFrom<String> for NormalizeMethod {
    type Error = ClusterError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<NormalizeMethod> for String {
    fn from(value: NormalizeMethod) -> Self {
        value.to_string()
    }
}

/// Scale factor used in place of a zero spread.
fn scale_or_one(scale: f64, reference: f64) -> f64 {
    if scale > 1e-12 * reference.abs().max(1.0) {
        scale
    } else {
        1.0
    }
}

/// Applies `(x - offset) / scale` column-wise.
fn shift_and_scale(x: &Matrix<f64>, offset: &[f64], scale: &[f64]) -> Result<Matrix<f64>> {
    let (n_samples, n_features) = x.shape();
    if n_features != offset.len() {
        return Err(ClusterError::dimension_mismatch("n_features", offset.len(), n_features));
    }

    let mut result = Vec::with_capacity(n_samples * n_features);
    for row in x.rows() {
        for ((&v, &o), &s) in row.iter().zip(offset).zip(scale) {
            result.push((v - o) / s);
        }
    }

    Matrix::from_vec(n_samples, n_features, result)
}

fn not_fitted(what: &str) -> ClusterError {
    ClusterError::state(format!("{what} not fitted"))
}

/// Standardizes features by removing mean and scaling to unit variance.
///
/// The standard score of a sample x is: z = (x - mean) / std, with the
/// population standard deviation. A zero std scales by 1.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Mean of each feature (computed during fit).
    mean: Option<Vec<f64>>,
    /// Scale applied to each feature (std, or 1 where std is zero).
    scale: Option<Vec<f64>>,
}

impl StandardScaler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the mean of each feature, if fitted.
    #[must_use]
    pub fn mean(&self) -> Option<&[f64]> {
        self.mean.as_deref()
    }

    /// Returns the per-feature scale, if fitted.
    #[must_use]
    pub fn scale(&self) -> Option<&[f64]> {
        self.scale.as_deref()
    }

    /// Returns true if the scaler has been fitted.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.mean.is_some()
    }
}

impl Transformer for StandardScaler {
    /// Computes the mean and standard deviation of each feature.
    fn fit(&mut self, x: &Matrix<f64>) -> Result<()> {
        let (n_samples, n_features) = x.shape();

        if n_samples == 0 {
            return Err(ClusterError::validation("cannot fit scaler with zero samples"));
        }

        let mean = x.column_means();
        let mut scale = vec![0.0; n_features];
        for (j, scale_j) in scale.iter_mut().enumerate() {
            let sum_sq: f64 = x.rows().map(|row| (row[j] - mean[j]).powi(2)).sum();
            // Population std (divide by n, not n-1) like sklearn
            let std = (sum_sq / n_samples as f64).sqrt();
            *scale_j = scale_or_one(std, mean[j]);
        }

        self.mean = Some(mean);
        self.scale = Some(scale);
        Ok(())
    }

    fn transform(&self, x: &Matrix<f64>) -> Result<Matrix<f64>> {
        let mean = self.mean.as_ref().ok_or_else(|| not_fitted("StandardScaler"))?;
        let scale = self.scale.as_ref().ok_or_else(|| not_fitted("StandardScaler"))?;
        shift_and_scale(x, mean, scale)
    }
}

/// Scales features to [0, 1].
///
/// The transformation is: X_scaled = (X - X_min) / (X_max - X_min). A zero
/// range scales by 1.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MinMaxScaler {
    /// Minimum value of each feature (computed during fit).
    data_min: Option<Vec<f64>>,
    /// Range of each feature, or 1 where the range is zero.
    scale: Option<Vec<f64>>,
}

impl MinMaxScaler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the minimum value of each feature, if fitted.
    #[must_use]
    pub fn data_min(&self) -> Option<&[f64]> {
        self.data_min.as_deref()
    }

    /// Returns true if the scaler has been fitted.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.data_min.is_some()
    }
}

impl Transformer for MinMaxScaler {
    /// Computes the min and max of each feature.
    fn fit(&mut self, x: &Matrix<f64>) -> Result<()> {
        let (n_samples, n_features) = x.shape();

        if n_samples == 0 {
            return Err(ClusterError::validation("cannot fit scaler with zero samples"));
        }

        let mut data_min = vec![f64::INFINITY; n_features];
        let mut data_max = vec![f64::NEG_INFINITY; n_features];

        for row in x.rows() {
            for (j, &val) in row.iter().enumerate() {
                data_min[j] = data_min[j].min(val);
                data_max[j] = data_max[j].max(val);
            }
        }

        let scale = data_min
            .iter()
            .zip(&data_max)
            .map(|(&lo, &hi)| scale_or_one(hi - lo, lo))
            .collect();

        self.data_min = Some(data_min);
        self.scale = Some(scale);
        Ok(())
    }

    fn transform(&self, x: &Matrix<f64>) -> Result<Matrix<f64>> {
        let data_min = self.data_min.as_ref().ok_or_else(|| not_fitted("MinMaxScaler"))?;
        let scale = self.scale.as_ref().ok_or_else(|| not_fitted("MinMaxScaler"))?;
        shift_and_scale(x, data_min, scale)
    }
}

/// Scales features using statistics that are robust to outliers.
///
/// Centers on the median and divides by the interquartile range
/// (R-7 quartiles). A zero IQR scales by 1.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RobustScaler {
    center: Option<Vec<f64>>,
    scale: Option<Vec<f64>>,
}

impl RobustScaler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the median of each feature, if fitted.
    #[must_use]
    pub fn center(&self) -> Option<&[f64]> {
        self.center.as_deref()
    }

    /// Returns true if the scaler has been fitted.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.center.is_some()
    }
}

impl Transformer for RobustScaler {
    fn fit(&mut self, x: &Matrix<f64>) -> Result<()> {
        let (n_samples, n_features) = x.shape();

        if n_samples == 0 {
            return Err(ClusterError::validation("cannot fit scaler with zero samples"));
        }

        let mut center = Vec::with_capacity(n_features);
        let mut scale = Vec::with_capacity(n_features);
        for j in 0..n_features {
            let col = x.column(j);
            let summary = DescriptiveStats::new(&col).five_number_summary()?;
            center.push(summary.median);
            scale.push(scale_or_one(summary.q3 - summary.q1, summary.median));
        }

        self.center = Some(center);
        self.scale = Some(scale);
        Ok(())
    }

    fn transform(&self, x: &Matrix<f64>) -> Result<Matrix<f64>> {
        let center = self.center.as_ref().ok_or_else(|| not_fitted("RobustScaler"))?;
        let scale = self.scale.as_ref().ok_or_else(|| not_fitted("RobustScaler"))?;
        shift_and_scale(x, center, scale)
    }
}

/// One of the supported scalers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum Scaler {
    Standard(StandardScaler),
    MinMax(MinMaxScaler),
    Robust(RobustScaler),
}

impl Scaler {
    #[must_use]
    pub fn method(&self) -> NormalizeMethod {
        match self {
            Self::Standard(_) => NormalizeMethod::Standard,
            Self::MinMax(_) => NormalizeMethod::MinMax,
            Self::Robust(_) => NormalizeMethod::Robust,
        }
    }
}

impl Transformer for Scaler {
    fn fit(&mut self, x: &Matrix<f64>) -> Result<()> {
        match self {
            Self::Standard(s) => s.fit(x),
            Self::MinMax(s) => s.fit(x),
            Self::Robust(s) => s.fit(x),
        }
    }

    fn transform(&self, x: &Matrix<f64>) -> Result<Matrix<f64>> {
        match self {
            Self::Standard(s) => s.transform(x),
            Self::MinMax(s) => s.transform(x),
            Self::Robust(s) => s.transform(x),
        }
    }
}

/// A fitted scaler together with the feature columns it was fitted on.
///
/// Replays the same transform on new rows with the same columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerState {
    features: Vec<String>,
    scaler: Scaler,
}

impl ScalerState {
    /// Fits `method` on `x`, whose columns are `features`.
    ///
    /// # Errors
    ///
    /// Returns an error if `x` is empty or its width differs from `features`.
    pub fn fit(method: NormalizeMethod, features: Vec<String>, x: &Matrix<f64>) -> Result<Self> {
        if x.n_cols() != features.len() {
            return Err(ClusterError::dimension_mismatch(
                "n_features",
                features.len(),
                x.n_cols(),
            ));
        }
        let mut scaler = method.scaler();
        scaler.fit(x)?;
        Ok(Self { features, scaler })
    }

    #[must_use]
    pub fn method(&self) -> NormalizeMethod {
        self.scaler.method()
    }

    /// Feature columns, in matrix column order.
    #[must_use]
    pub fn features(&self) -> &[String] {
        &self.features
    }

    /// Applies the fitted transform.
    ///
    /// # Errors
    ///
    /// Returns an error if the column count differs from the fitted features.
    pub fn transform(&self, x: &Matrix<f64>) -> Result<Matrix<f64>> {
        self.scaler.transform(x)
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
