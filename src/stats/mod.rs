//! Descriptive statistics over feature columns.
//!
//! - Quantiles and percentiles using the R-7 method (Hyndman & Fan 1996),
//!   the same interpolation pandas and `NumPy` use by default
//! - Five-number summary (min, Q1, median, Q3, max) and IQR
//! - Mean, variance and standard deviation with explicit degrees of freedom
//! - Pearson correlation over pairwise-complete observations
//!
//! Columns in this crate may hold missing cells (`Option<f64>`); helpers
//! that take `&[Option<f64>]` skip them.
//!
//! # Examples
//!
//! ```
//! use provclust::stats::DescriptiveStats;
//!
//! let literacy = [0.91, 0.95, 0.97, 0.93, 0.99];
//! let stats = DescriptiveStats::new(&literacy);
//!
//! assert!((stats.quantile(0.5).expect("non-empty") - 0.95).abs() < 1e-12);
//! assert!((stats.iqr().expect("non-empty") - 0.04).abs() < 1e-12);
//! ```

pub mod covariance;

pub use covariance::{corr, corr_matrix};

use crate::error::{ClusterError, Result};

/// Order statistics of one fully present feature column.
#[derive(Debug)]
pub struct DescriptiveStats<'a> {
    data: &'a [f64],
}

/// Minimum, quartiles and maximum. Feeds the IQR outlier bounds and the
/// robust scaler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiveNumberSummary {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl<'a> DescriptiveStats<'a> {
    #[must_use]
    pub fn new(data: &'a [f64]) -> Self {
        Self { data }
    }

    /// Compute quantile using linear interpolation (R-7 method).
    ///
    /// # Errors
    /// Returns error if the data is empty or `q` is not in [0, 1].
    pub fn quantile(&self, q: f64) -> Result<f64> {
        if self.data.is_empty() {
            return Err(ClusterError::validation("cannot compute quantile of empty data"));
        }
        if !(0.0..=1.0).contains(&q) {
            return Err(ClusterError::invalid_param("quantile", q, "in [0, 1]"));
        }

        let mut sorted = self.data.to_vec();
        sorted.sort_by(f64::total_cmp);
        Ok(quantile_sorted(&sorted, q))
    }

    /// Compute multiple percentiles with a single sort.
    ///
    /// # Errors
    /// Returns error if the data is empty or a percentile is outside [0, 100].
    pub fn percentiles(&self, percentiles: &[f64]) -> Result<Vec<f64>> {
        if self.data.is_empty() {
            return Err(ClusterError::validation("cannot compute percentiles of empty data"));
        }
        for &p in percentiles {
            if !(0.0..=100.0).contains(&p) {
                return Err(ClusterError::invalid_param("percentile", p, "in [0, 100]"));
            }
        }

        let mut sorted = self.data.to_vec();
        sorted.sort_by(f64::total_cmp);

        Ok(percentiles
            .iter()
            .map(|&p| quantile_sorted(&sorted, p / 100.0))
            .collect())
    }

    /// Compute five-number summary: min, Q1, median, Q3, max.
    ///
    /// # Errors
    /// Returns error if the data is empty.
    pub fn five_number_summary(&self) -> Result<FiveNumberSummary> {
        let values = self.percentiles(&[0.0, 25.0, 50.0, 75.0, 100.0])?;

        Ok(FiveNumberSummary {
            min: values[0],
            q1: values[1],
            median: values[2],
            q3: values[3],
            max: values[4],
        })
    }

    /// Compute interquartile range (IQR = Q3 - Q1).
    ///
    /// # Errors
    /// Returns error if the data is empty.
    pub fn iqr(&self) -> Result<f64> {
        let summary = self.five_number_summary()?;
        Ok(summary.q3 - summary.q1)
    }
}

/// R-7 quantile of an already sorted, non-empty slice.
fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let h = (n - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
    }
}

/// Non-missing values of a column, in row order.
#[must_use]
pub fn present(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().filter_map(|v| *v).collect()
}

/// Arithmetic mean, `None` for empty input.
#[must_use]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Variance with `ddof` delta degrees of freedom (0 = population, 1 = sample).
///
/// Returns `None` when fewer than `ddof + 1` values are available.
#[must_use]
pub fn variance(values: &[f64], ddof: usize) -> Option<f64> {
    let n = values.len();
    if n <= ddof {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some(ss / (n - ddof) as f64)
}

/// Standard deviation with `ddof` delta degrees of freedom.
#[must_use]
pub fn std_dev(values: &[f64], ddof: usize) -> Option<f64> {
    variance(values, ddof).map(f64::sqrt)
}

/// Median, `None` for empty input.
#[must_use]
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(quantile_sorted(&sorted, 0.5))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_interpolates() {
        let data = [1.0, 2.0, 3.0, 4.0];
        let stats = DescriptiveStats::new(&data);
        // h = 3 * 0.25 = 0.75 -> 1 + 0.75 * (2 - 1)
        assert!((stats.quantile(0.25).expect("valid") - 1.75).abs() < 1e-12);
        assert!((stats.quantile(0.75).expect("valid") - 3.25).abs() < 1e-12);
    }

    #[test]
    fn test_quantile_unsorted_input() {
        let data = [5.0, 1.0, 4.0, 2.0, 3.0];
        let stats = DescriptiveStats::new(&data);
        assert_eq!(stats.quantile(0.0).expect("valid"), 1.0);
        assert_eq!(stats.quantile(1.0).expect("valid"), 5.0);
    }

    #[test]
    fn test_quantile_empty_error() {
        let data: [f64; 0] = [];
        assert!(DescriptiveStats::new(&data).quantile(0.5).is_err());
    }

    #[test]
    fn test_quantile_out_of_range() {
        let data = [1.0];
        assert!(DescriptiveStats::new(&data).quantile(1.5).is_err());
    }

    #[test]
    fn test_five_number_summary() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        let summary = DescriptiveStats::new(&data)
            .five_number_summary()
            .expect("valid");
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.q1, 2.0);
        assert_eq!(summary.median, 3.0);
        assert_eq!(summary.q3, 4.0);
        assert_eq!(summary.max, 5.0);
    }

    #[test]
    fn test_mean_variance_std() {
        let data = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&data), Some(5.0));
        assert_eq!(variance(&data, 0), Some(4.0));
        assert_eq!(std_dev(&data, 0), Some(2.0));
        assert!((variance(&data, 1).expect("enough values") - 32.0 / 7.0).abs() < 1e-12);
        assert_eq!(variance(&[1.0], 1), None);
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_median_even() {
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_present_skips_missing() {
        assert_eq!(present(&[Some(1.0), None, Some(3.0)]), vec![1.0, 3.0]);
    }
}
