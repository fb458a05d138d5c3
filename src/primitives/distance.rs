//! Pairwise distance functions between feature rows.

use crate::error::{ClusterError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::Matrix;

/// Distance metric used by hierarchical clustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DistanceMetric {
    /// L2 distance.
    Euclidean,
    /// L1 (city block) distance.
    Manhattan,
    /// One minus cosine similarity.
    Cosine,
}

impl DistanceMetric {
    const NAMES: [&'static str; 3] = ["euclidean", "manhattan", "cosine"];

    /// Distance between two rows of equal length.
    #[must_use]
    pub fn distance(self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            Self::Euclidean => euclidean(a, b),
            Self::Manhattan => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
            Self::Cosine => cosine(a, b),
        }
    }

    /// Full square distance matrix over the rows of `x`.
    #[must_use]
    pub fn pairwise(self, x: &Matrix<f64>) -> Vec<Vec<f64>> {
        let n = x.n_rows();
        let mut d = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let v = self.distance(x.row(i), x.row(j));
                d[i][j] = v;
                d[j][i] = v;
            }
        }
        d
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Euclidean => "euclidean",
            Self::Manhattan => "manhattan",
            Self::Cosine => "cosine",
        };
        f.write_str(name)
    }
}

impl FromStr for DistanceMetric {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "euclidean" | "l2" => Ok(Self::Euclidean),
            "manhattan" | "cityblock" | "l1" => Ok(Self::Manhattan),
            "cosine" => Ok(Self::Cosine),
            _ => Err(ClusterError::unknown_method("distance metric", s, &Self::NAMES)),
        }
    }
}

impl TryFrom<String> for DistanceMetric {
    type Error = ClusterError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DistanceMetric> for String {
    fn from(value: DistanceMetric) -> Self {
        value.to_string()
    }
}

/// Squared Euclidean distance.
#[must_use]
pub fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Euclidean distance.
#[must_use]
pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    squared_euclidean(a, b).sqrt()
}

fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 1.0;
    }
    (1.0 - dot / (na * nb)).max(0.0)
}
