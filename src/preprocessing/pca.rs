//! Principal Component Analysis for low-dimensional projections.

use crate::error::{ClusterError, Result};
use crate::primitives::Matrix;
use crate::traits::Transformer;
use nalgebra::{DMatrix, SymmetricEigen};
use serde::Serialize;

/// Principal Component Analysis (PCA) for dimensionality reduction.
///
/// Projects data onto the directions of maximum variance. Each component's
/// sign is fixed so that its largest-magnitude loading is positive, which
/// makes projections reproducible across runs.
///
/// # Example
///
/// ```
/// use provclust::preprocessing::PCA;
/// use provclust::traits::Transformer;
/// use provclust::primitives::Matrix;
///
/// let data = Matrix::from_vec(4, 3, vec![
///     1.0, 2.0, 3.0,
///     4.0, 5.0, 6.0,
///     7.0, 8.0, 9.0,
///     10.0, 11.0, 12.0,
/// ]).expect("valid matrix dimensions");
///
/// let mut pca = PCA::new(2); // Reduce to 2 components
/// let transformed = pca.fit_transform(&data).expect("fit_transform should succeed");
/// assert_eq!(transformed.shape(), (4, 2));
/// ```
#[derive(Debug, Clone)]
pub struct PCA {
    /// Number of components to keep.
    n_components: usize,
    /// Mean of each feature (computed during fit).
    mean: Option<Vec<f64>>,
    /// Principal components (eigenvectors), one per row.
    components: Option<Matrix<f64>>,
    /// Variance explained by each component.
    explained_variance: Option<Vec<f64>>,
    /// Ratio of variance explained by each component.
    explained_variance_ratio: Option<Vec<f64>>,
}

/// Coordinates of every row in component space.
#[derive(Debug, Clone, Serialize)]
pub struct Projection {
    /// One row per sample, one column per component.
    pub coordinates: Matrix<f64>,
    /// Fraction of total variance carried by each component.
    pub explained_variance_ratio: Vec<f64>,
}

impl PCA {
    /// Creates a new PCA transformer.
    #[must_use]
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components,
            mean: None,
            components: None,
            explained_variance: None,
            explained_variance_ratio: None,
        }
    }

    /// Returns the variance explained by each component.
    #[must_use]
    pub fn explained_variance(&self) -> Option<&[f64]> {
        self.explained_variance.as_deref()
    }

    /// Returns the ratio of variance explained by each component.
    #[must_use]
    pub fn explained_variance_ratio(&self) -> Option<&[f64]> {
        self.explained_variance_ratio.as_deref()
    }

    /// Returns the principal components.
    #[must_use]
    pub fn components(&self) -> Option<&Matrix<f64>> {
        self.components.as_ref()
    }

    /// Fits on `x` and returns its projection.
    ///
    /// # Errors
    ///
    /// Same as [`Transformer::fit`].
    pub fn project(&mut self, x: &Matrix<f64>) -> Result<Projection> {
        let coordinates = self.fit_transform(x)?;
        Ok(Projection {
            coordinates,
            explained_variance_ratio: self.explained_variance_ratio.clone().unwrap_or_default(),
        })
    }
}

impl Transformer for PCA {
    fn fit(&mut self, x: &Matrix<f64>) -> Result<()> {
        let (n_samples, n_features) = x.shape();

        if self.n_components == 0 || self.n_components > n_features {
            return Err(ClusterError::invalid_param(
                "n_components",
                self.n_components,
                &format!("in [1, {n_features}]"),
            ));
        }
        if n_samples < 2 {
            return Err(ClusterError::validation("PCA needs at least 2 samples"));
        }

        let mean = x.column_means();

        // Covariance matrix: Σ = (X^T X) / (n-1) on centered data
        let mut cov = vec![0.0; n_features * n_features];
        for row in x.rows() {
            for i in 0..n_features {
                let di = row[i] - mean[i];
                for j in i..n_features {
                    cov[i * n_features + j] += di * (row[j] - mean[j]);
                }
            }
        }
        let denom = (n_samples - 1) as f64;
        for i in 0..n_features {
            for j in i..n_features {
                let v = cov[i * n_features + j] / denom;
                cov[i * n_features + j] = v;
                cov[j * n_features + i] = v;
            }
        }

        let eigen = SymmetricEigen::new(DMatrix::from_row_slice(n_features, n_features, &cov));
        let eigenvalues = eigen.eigenvalues;
        let eigenvectors = eigen.eigenvectors;

        // Sort by eigenvalue (descending)
        let mut indices: Vec<usize> = (0..n_features).collect();
        indices.sort_by(|&a, &b| eigenvalues[b].total_cmp(&eigenvalues[a]));

        let mut components_data = vec![0.0; self.n_components * n_features];
        let mut explained_variance = vec![0.0; self.n_components];

        for (i, &idx) in indices.iter().take(self.n_components).enumerate() {
            explained_variance[i] = eigenvalues[idx].max(0.0);

            let pivot = (0..n_features)
                .max_by(|&a, &b| {
                    eigenvectors[(a, idx)]
                        .abs()
                        .total_cmp(&eigenvectors[(b, idx)].abs())
                })
                .map_or(1.0, |p| eigenvectors[(p, idx)].signum());

            for j in 0..n_features {
                components_data[i * n_features + j] = pivot * eigenvectors[(j, idx)];
            }
        }

        let total_variance: f64 = eigenvalues.iter().map(|v| v.max(0.0)).sum();
        let explained_variance_ratio = explained_variance
            .iter()
            .map(|&v| if total_variance > 0.0 { v / total_variance } else { 0.0 })
            .collect();

        self.mean = Some(mean);
        self.components = Some(Matrix::from_vec(
            self.n_components,
            n_features,
            components_data,
        )?);
        self.explained_variance = Some(explained_variance);
        self.explained_variance_ratio = Some(explained_variance_ratio);

        Ok(())
    }

    fn transform(&self, x: &Matrix<f64>) -> Result<Matrix<f64>> {
        let components = self
            .components
            .as_ref()
            .ok_or_else(|| ClusterError::state("PCA not fitted"))?;
        let mean = self
            .mean
            .as_ref()
            .ok_or_else(|| ClusterError::state("PCA not fitted"))?;

        let (n_samples, n_features) = x.shape();
        if n_features != mean.len() {
            return Err(ClusterError::dimension_mismatch("n_features", mean.len(), n_features));
        }

        // Project onto principal components: X_pca = (X - mean) @ components^T
        let mut result = Vec::with_capacity(n_samples * self.n_components);
        for row in x.rows() {
            for c in 0..self.n_components {
                let value: f64 = row
                    .iter()
                    .zip(mean)
                    .zip(components.row(c))
                    .map(|((v, m), w)| (v - m) * w)
                    .sum();
                result.push(value);
            }
        }

        Matrix::from_vec(n_samples, self.n_components, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_data() -> Matrix<f64> {
        Matrix::from_vec(4, 2, vec![0.0, 0.0, 1.0, 1.0, 2.0, 2.0, 3.0, 3.0]).expect("valid")
    }

    #[test]
    fn test_first_component_captures_line() {
        let mut pca = PCA::new(2);
        pca.fit(&line_data()).expect("fit");
        let ratio = pca.explained_variance_ratio().expect("fitted");
        assert!((ratio[0] - 1.0).abs() < 1e-9);
        assert!(ratio[1].abs() < 1e-9);
    }

    #[test]
    fn test_sign_is_deterministic() {
        let mut pca = PCA::new(1);
        let projected = pca.fit_transform(&line_data()).expect("fit");
        // Largest loading is positive, so larger inputs project higher.
        assert!(projected.get(3, 0) > projected.get(0, 0));
    }

    #[test]
    fn test_project_shape() {
        let mut pca = PCA::new(2);
        let projection = pca.project(&line_data()).expect("fit");
        assert_eq!(projection.coordinates.shape(), (4, 2));
        assert_eq!(projection.explained_variance_ratio.len(), 2);
    }

    #[test]
    fn test_too_many_components() {
        let mut pca = PCA::new(3);
        assert!(pca.fit(&line_data()).is_err());
    }

    #[test]
    fn test_transform_before_fit() {
        let pca = PCA::new(1);
        assert!(pca.transform(&line_data()).is_err());
    }
}
