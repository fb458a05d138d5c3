//! Missing-value imputation.
//!
//! Simple strategies fill each column independently. KNN imputation fills a
//! cell from the nearest rows that have it, under the NaN-Euclidean
//! distance used by scikit-learn's `KNNImputer`:
//!
//! ```text
//! d(a, b) = sqrt(total / present * Σ (a_k - b_k)²)
//! ```
//!
//! where the sum runs over coordinates present in both rows.

use crate::error::{ClusterError, Result};
use crate::stats;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Default neighbor count for KNN imputation.
pub const DEFAULT_NEIGHBORS: usize = 5;

/// Strategy for resolving missing cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImputeMethod {
    /// Remove rows with a missing cell in the targeted columns.
    Drop,
    /// Column mean.
    Mean,
    /// Column median.
    Median,
    /// Most frequent value; ties go to the smallest value.
    MostFrequent,
    /// Inverse-distance weighted mean of the nearest donor rows.
    Knn {
        /// Number of donors.
        n_neighbors: usize,
    },
}

impl ImputeMethod {
    const NAMES: [&'static str; 5] = ["drop", "mean", "median", "most_frequent", "knn"];

    /// Returns true if the method can fill text columns.
    #[must_use]
    pub fn supports_categorical(self) -> bool {
        matches!(self, Self::Drop | Self::MostFrequent)
    }
}

impl fmt::Display for ImputeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drop => f.write_str("drop"),
            Self::Mean => f.write_str("mean"),
            Self::Median => f.write_str("median"),
            Self::MostFrequent => f.write_str("most_frequent"),
            Self::Knn { n_neighbors } => write!(f, "knn({n_neighbors})"),
        }
    }
}

impl FromStr for ImputeMethod {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "mean" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            "most_frequent" | "mode" => Ok(Self::MostFrequent),
            "knn" => Ok(Self::Knn {
                n_neighbors: DEFAULT_NEIGHBORS,
            }),
            _ => Err(ClusterError::unknown_method("imputation method", s, &Self::NAMES)),
        }
    }
}

/// Fills the missing cells of a numeric column with a per-column statistic.
///
/// A column with no present values is returned unchanged.
///
/// # Errors
///
/// Returns an error for `Drop` and `Knn`, which are not per-column fills.
pub fn fill_numeric(values: &[Option<f64>], method: ImputeMethod) -> Result<Vec<Option<f64>>> {
    let present = stats::present(values);
    let fill = match method {
        ImputeMethod::Mean => stats::mean(&present),
        ImputeMethod::Median => stats::median(&present),
        ImputeMethod::MostFrequent => most_frequent_numeric(&present),
        ImputeMethod::Drop | ImputeMethod::Knn { .. } => {
            return Err(ClusterError::validation(format!(
                "'{method}' is not a per-column fill"
            )))
        }
    };

    Ok(values.iter().map(|v| v.or(fill)).collect())
}

/// Fills the missing cells of a text column with its most frequent value.
#[must_use]
pub fn fill_categorical(values: &[Option<String>]) -> Vec<Option<String>> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for v in values.iter().flatten() {
        *counts.entry(v.as_str()).or_default() += 1;
    }
    // BTreeMap iterates ascending, so the first maximum is the smallest value.
    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((value, count));
        }
    }
    let fill = best.map(|(v, _)| v.to_string());
    values
        .iter()
        .map(|v| v.clone().or_else(|| fill.clone()))
        .collect()
}

fn most_frequent_numeric(present: &[f64]) -> Option<f64> {
    let mut sorted = present.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mut best: Option<(f64, usize)> = None;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i;
        while j < sorted.len() && sorted[j] == sorted[i] {
            j += 1;
        }
        if best.map_or(true, |(_, c)| j - i > c) {
            best = Some((sorted[i], j - i));
        }
        i = j;
    }
    best.map(|(v, _)| v)
}

/// NaN-Euclidean distance between two rows with missing cells.
///
/// Returns `None` when the rows share no present coordinate.
#[must_use]
pub fn nan_euclidean(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let mut sum = 0.0;
    let mut shared = 0usize;
    for (x, y) in a.iter().zip(b) {
        if let (Some(x), Some(y)) = (x, y) {
            sum += (x - y) * (x - y);
            shared += 1;
        }
    }
    if shared == 0 {
        None
    } else {
        Some((a.len() as f64 / shared as f64 * sum).sqrt())
    }
}

/// KNN imputation over a set of numeric columns.
///
/// `columns` holds the targeted columns, which are also the coordinates of
/// the distance. Every distance is taken on the input snapshot, so filled
/// cells never act as donors for later cells. Returns the filled columns in
/// input order.
///
/// # Errors
///
/// Returns an error if `n_neighbors` is zero or the columns differ in length.
pub fn knn_impute(columns: &[&[Option<f64>]], n_neighbors: usize) -> Result<Vec<Vec<Option<f64>>>> {
    if n_neighbors == 0 {
        return Err(ClusterError::invalid_param("n_neighbors", n_neighbors, ">= 1"));
    }
    let n_rows = columns.first().map_or(0, |c| c.len());
    if let Some(c) = columns.iter().find(|c| c.len() != n_rows) {
        return Err(ClusterError::dimension_mismatch("column length", n_rows, c.len()));
    }

    let rows: Vec<Vec<Option<f64>>> = (0..n_rows)
        .map(|i| columns.iter().map(|c| c[i]).collect())
        .collect();

    let mut filled: Vec<Vec<Option<f64>>> = columns.iter().map(|c| c.to_vec()).collect();

    for (j, column) in columns.iter().enumerate() {
        let column_mean = stats::mean(&stats::present(column));
        for i in 0..n_rows {
            if column[i].is_some() {
                continue;
            }

            let mut donors: Vec<(f64, f64)> = (0..n_rows)
                .filter(|&d| d != i)
                .filter_map(|d| {
                    let value = column[d]?;
                    let dist = nan_euclidean(&rows[i], &rows[d])?;
                    Some((dist, value))
                })
                .collect();

            if donors.is_empty() {
                filled[j][i] = column_mean;
                continue;
            }

            donors.sort_by(|a, b| a.0.total_cmp(&b.0));
            donors.truncate(n_neighbors);
            filled[j][i] = Some(weighted_mean(&donors));
        }
    }

    Ok(filled)
}

/// Inverse-distance weighted mean of `(distance, value)` pairs.
///
/// Exact matches, if any, are averaged among themselves.
fn weighted_mean(donors: &[(f64, f64)]) -> f64 {
    let exact: Vec<f64> = donors
        .iter()
        .filter(|(d, _)| *d == 0.0)
        .map(|(_, v)| *v)
        .collect();
    if !exact.is_empty() {
        return exact.iter().sum::<f64>() / exact.len() as f64;
    }

    let (num, den) = donors
        .iter()
        .fold((0.0, 0.0), |(num, den), (d, v)| (num + v / d, den + 1.0 / d));
    num / den
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_methods() {
        assert_eq!("mode".parse::<ImputeMethod>().ok(), Some(ImputeMethod::MostFrequent));
        assert_eq!(
            "KNN".parse::<ImputeMethod>().ok(),
            Some(ImputeMethod::Knn { n_neighbors: 5 })
        );
        let err = "interpolate".parse::<ImputeMethod>().expect_err("unknown");
        assert!(err.to_string().contains("interpolate"));
    }

    #[test]
    fn test_fill_mean_and_median() {
        let col = [Some(1.0), None, Some(2.0), Some(9.0)];
        let mean = fill_numeric(&col, ImputeMethod::Mean).expect("fill");
        assert_eq!(mean[1], Some(4.0));
        let median = fill_numeric(&col, ImputeMethod::Median).expect("fill");
        assert_eq!(median[1], Some(2.0));
    }

    #[test]
    fn test_fill_most_frequent_tie_smallest() {
        let col = [Some(3.0), Some(1.0), Some(3.0), Some(1.0), None];
        let filled = fill_numeric(&col, ImputeMethod::MostFrequent).expect("fill");
        assert_eq!(filled[4], Some(1.0));
    }

    #[test]
    fn test_fill_all_missing_unchanged() {
        let col = [None, None];
        let filled = fill_numeric(&col, ImputeMethod::Mean).expect("fill");
        assert_eq!(filled, vec![None, None]);
    }

    #[test]
    fn test_fill_categorical() {
        let col = vec![Some("b".to_string()), Some("a".to_string()), None, Some("b".to_string())];
        let filled = fill_categorical(&col);
        assert_eq!(filled[2].as_deref(), Some("b"));
    }

    #[test]
    fn test_nan_euclidean_scales_by_present() {
        let a = [Some(0.0), None, Some(0.0)];
        let b = [Some(3.0), Some(1.0), Some(4.0)];
        // shared = 2, total = 3: sqrt(3/2 * 25)
        let d = nan_euclidean(&a, &b).expect("shared coordinates");
        assert!((d - (1.5_f64 * 25.0).sqrt()).abs() < 1e-12);
        assert!(nan_euclidean(&[None], &[Some(1.0)]).is_none());
    }

    #[test]
    fn test_knn_impute_prefers_close_rows() {
        let x = [Some(0.0), Some(0.1), Some(10.0), Some(0.05)];
        let y = [Some(1.0), Some(1.0), Some(50.0), None];
        let filled = knn_impute(&[&x, &y], 2).expect("impute");
        let v = filled[1][3].expect("filled");
        assert!((v - 1.0).abs() < 1e-9);
        assert_eq!(filled[0], x.to_vec());
    }

    #[test]
    fn test_knn_impute_exact_match() {
        let x = [Some(1.0), Some(1.0), Some(2.0)];
        let y = [None, Some(7.0), Some(100.0)];
        let filled = knn_impute(&[&x, &y], 2).expect("impute");
        assert_eq!(filled[1][0], Some(7.0));
    }

    #[test]
    fn test_knn_impute_rejects_zero_neighbors() {
        let x = [Some(1.0)];
        assert!(knn_impute(&[&x], 0).is_err());
    }
}
