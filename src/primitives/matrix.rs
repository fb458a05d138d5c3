//! Dense sample-by-feature matrix.

use crate::error::{ClusterError, Result};
use serde::{Deserialize, Serialize};

/// Row-major matrix. Rows are samples and columns are features
/// throughout the crate.
///
/// # Examples
///
/// ```
/// use provclust::primitives::Matrix;
///
/// let m = Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).expect("data length matches rows * cols");
/// assert_eq!(m.shape(), (2, 3));
/// assert_eq!(m.row(1), &[4.0, 5.0, 6.0]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix<T> {
    data: Vec<T>,
    rows: usize,
    cols: usize,
}

impl<T: Copy> Matrix<T> {
    /// Wraps row-major cells.
    ///
    /// # Errors
    ///
    /// Returns a dimension mismatch unless `data.len() == rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<T>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(ClusterError::dimension_mismatch(
                "rows * cols",
                rows * cols,
                data.len(),
            ));
        }
        Ok(Self { data, rows, cols })
    }

    /// Builds a matrix from equally sized rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the rows have different lengths.
    pub fn from_rows(rows: &[Vec<T>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            if row.len() != cols {
                return Err(ClusterError::dimension_mismatch("row length", cols, row.len()));
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            data,
            rows: rows.len(),
            cols,
        })
    }

    /// `(samples, features)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Number of samples.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows
    }

    /// Number of features.
    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.cols
    }

    /// Value of feature `col` for sample `row`.
    ///
    /// # Panics
    ///
    /// Panics if `row` or `col` is outside the shape.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> T {
        assert!(col < self.cols, "column {col} outside {} features", self.cols);
        self.data[self.offset(row) + col]
    }

    /// Overwrites feature `col` of sample `row`.
    ///
    /// # Panics
    ///
    /// Panics if `row` or `col` is outside the shape.
    pub fn set(&mut self, row: usize, col: usize, value: T) {
        assert!(col < self.cols, "column {col} outside {} features", self.cols);
        let at = self.offset(row) + col;
        self.data[at] = value;
    }

    fn offset(&self, row: usize) -> usize {
        row * self.cols
    }

    /// Features of one sample.
    #[must_use]
    pub fn row(&self, row: usize) -> &[T] {
        let start = self.offset(row);
        &self.data[start..start + self.cols]
    }

    /// Samples in order.
    pub fn rows(&self) -> impl Iterator<Item = &[T]> {
        (0..self.rows).map(move |i| self.row(i))
    }

    /// One feature across all samples.
    #[must_use]
    pub fn column(&self, col: usize) -> Vec<T> {
        self.rows().map(|r| r[col]).collect()
    }

    /// Copies the listed samples, in the listed order.
    #[must_use]
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        let mut data = Vec::with_capacity(indices.len() * self.cols);
        for &i in indices {
            data.extend_from_slice(self.row(i));
        }
        Self {
            data,
            rows: indices.len(),
            cols: self.cols,
        }
    }

    /// Row-major cells.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}

impl Matrix<f64> {
    /// All-zero matrix of the given shape.
    #[must_use]
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, 0.0)
    }

    #[must_use]
    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self {
            data: vec![value; rows * cols],
            rows,
            cols,
        }
    }

    /// Column means.
    #[must_use]
    pub fn column_means(&self) -> Vec<f64> {
        let mut means = vec![0.0; self.cols];
        if self.rows == 0 {
            return means;
        }
        for row in self.rows() {
            for (m, &v) in means.iter_mut().zip(row) {
                *m += v;
            }
        }
        for m in &mut means {
            *m /= self.rows as f64;
        }
        means
    }

    /// Returns true if every element is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }
}

#[cfg(test)]
#[path = "matrix_tests.rs"]
mod tests;
