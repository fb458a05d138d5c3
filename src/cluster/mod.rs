//! Clustering algorithms and their shared result types.
//!
//! Four families are available: centroid ([`KMeans`]), hierarchical
//! ([`AgglomerativeClustering`]), density ([`DBSCAN`]) and probabilistic
//! mixture ([`GaussianMixture`]). Every engine fit ends in a [`ClusterFit`],
//! which pairs the row labels with a model variant carrying the
//! algorithm-specific outputs.

mod dbscan;
mod gmm;
mod hierarchical;
mod kmeans;

pub use dbscan::DBSCAN;
pub use gmm::GaussianMixture;
pub use hierarchical::{AgglomerativeClustering, Linkage, LinkageMatrix, LinkageStep};
pub use kmeans::KMeans;

use crate::error::{ClusterError, Result};
use crate::primitives::{DistanceMetric, Matrix};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Cluster membership of a single row.
///
/// `Noise` orders before every assigned label, so sorted collections list
/// noise first. On the wire it is the raw integer `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Membership {
    /// Not reachable from any cluster (density clustering only).
    Noise,
    /// Member of the cluster with this zero-based id.
    Assigned(usize),
}

impl Membership {
    /// Raw integer form: the cluster id, or `-1` for noise.
    #[must_use]
    pub fn to_raw(self) -> i64 {
        match self {
            Self::Noise => -1,
            Self::Assigned(k) => k as i64,
        }
    }

    /// Parses the raw integer form.
    ///
    /// # Errors
    ///
    /// Returns a validation error for negative values other than `-1`.
    pub fn from_raw(raw: i64) -> Result<Self> {
        match raw {
            -1 => Ok(Self::Noise),
            k if k >= 0 => Ok(Self::Assigned(k as usize)),
            other => Err(ClusterError::invalid_param("label", other, "-1 or >= 0")),
        }
    }

    /// Cluster id, `None` for noise.
    #[must_use]
    pub fn label(self) -> Option<usize> {
        match self {
            Self::Noise => None,
            Self::Assigned(k) => Some(k),
        }
    }

    /// Whether this row is noise.
    #[must_use]
    pub fn is_noise(self) -> bool {
        matches!(self, Self::Noise)
    }
}

impl fmt::Display for Membership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Noise => write!(f, "noise"),
            Self::Assigned(k) => write!(f, "{k}"),
        }
    }
}

impl TryFrom<i64> for Membership {
    type Error = ClusterError;

    fn try_from(raw: i64) -> Result<Self> {
        Self::from_raw(raw)
    }
}

impl From<Membership> for i64 {
    fn from(m: Membership) -> Self {
        m.to_raw()
    }
}

/// One membership per dataset row, in row order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterAssignment(Vec<Membership>);

impl ClusterAssignment {
    /// Wraps memberships.
    #[must_use]
    pub fn new(memberships: Vec<Membership>) -> Self {
        Self(memberships)
    }

    /// Builds an assignment in which every row belongs to a cluster.
    #[must_use]
    pub fn from_labels(labels: &[usize]) -> Self {
        Self(labels.iter().map(|&k| Membership::Assigned(k)).collect())
    }

    /// Parses raw integer labels (`-1` is noise).
    ///
    /// # Errors
    ///
    /// Returns a validation error for any other negative value.
    pub fn from_raw(raw: &[i64]) -> Result<Self> {
        raw.iter()
            .map(|&r| Membership::from_raw(r))
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    /// Raw integer labels (`-1` for noise).
    #[must_use]
    pub fn to_raw(&self) -> Vec<i64> {
        self.0.iter().map(|m| m.to_raw()).collect()
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Memberships in row order.
    #[must_use]
    pub fn as_slice(&self) -> &[Membership] {
        &self.0
    }

    /// Iterates memberships in row order.
    pub fn iter(&self) -> impl Iterator<Item = Membership> + '_ {
        self.0.iter().copied()
    }

    /// Membership of row `i`.
    #[must_use]
    pub fn get(&self, i: usize) -> Option<Membership> {
        self.0.get(i).copied()
    }

    /// Distinct memberships in ascending order (noise first).
    #[must_use]
    pub fn distinct(&self) -> BTreeSet<Membership> {
        self.0.iter().copied().collect()
    }

    /// Number of distinct non-noise clusters.
    #[must_use]
    pub fn n_clusters(&self) -> usize {
        self.distinct().iter().filter(|m| !m.is_noise()).count()
    }

    /// Number of noise rows.
    #[must_use]
    pub fn n_noise(&self) -> usize {
        self.0.iter().filter(|m| m.is_noise()).count()
    }

    /// Row count per membership, noise first.
    #[must_use]
    pub fn counts(&self) -> BTreeMap<Membership, usize> {
        let mut counts = BTreeMap::new();
        for m in &self.0 {
            *counts.entry(*m).or_insert(0) += 1;
        }
        counts
    }
}

impl From<Vec<Membership>> for ClusterAssignment {
    fn from(memberships: Vec<Membership>) -> Self {
        Self(memberships)
    }
}

/// Algorithm family, as named in configuration and on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Algorithm {
    /// K-Means.
    #[default]
    KMeans,
    /// Agglomerative clustering.
    Hierarchical,
    /// DBSCAN.
    Dbscan,
    /// Gaussian mixture.
    Gmm,
}

impl Algorithm {
    /// Accepted names, in declaration order.
    pub const NAMES: [&'static str; 4] = ["kmeans", "hierarchical", "dbscan", "gmm"];
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Self::NAMES[*self as usize])
    }
}

impl FromStr for Algorithm {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "kmeans" | "k-means" => Ok(Self::KMeans),
            "hierarchical" | "agglomerative" => Ok(Self::Hierarchical),
            "dbscan" => Ok(Self::Dbscan),
            "gmm" | "gaussian_mixture" => Ok(Self::Gmm),
            _ => Err(ClusterError::unknown_method("algorithm", s, &Self::NAMES)),
        }
    }
}

impl TryFrom<String> for Algorithm {
    type Error = ClusterError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Algorithm> for String {
    fn from(a: Algorithm) -> Self {
        a.to_string()
    }
}

/// Algorithm-specific outputs of a fit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "algorithm", rename_all = "lowercase")]
pub enum FitModel {
    /// K-Means.
    Centroid {
        /// One row per cluster.
        centroids: Matrix<f64>,
        /// Within-cluster sum of squares.
        inertia: f64,
        /// Lloyd iterations of the winning restart.
        n_iter: usize,
    },
    /// Agglomerative clustering or a dendrogram cut.
    Hierarchical {
        /// Merge criterion.
        linkage: Linkage,
        /// Metric the caller asked for.
        requested_metric: DistanceMetric,
        /// Metric actually used.
        metric: DistanceMetric,
        /// True when Ward forced Euclidean over the requested metric.
        metric_overridden: bool,
        /// Full merge history.
        linkage_matrix: LinkageMatrix,
    },
    /// DBSCAN.
    Density {
        /// Neighborhood radius.
        eps: f64,
        /// Minimum neighborhood size for a core point.
        min_samples: usize,
        /// Clusters found.
        n_clusters: usize,
        /// Rows labelled noise.
        n_noise: usize,
    },
    /// Gaussian mixture.
    Mixture {
        /// Component means, one row per component.
        means: Matrix<f64>,
        /// Mixing weights.
        weights: Vec<f64>,
        /// Mean per-row log-likelihood of the winning restart.
        log_likelihood: f64,
        /// Whether EM converged within the iteration cap.
        converged: bool,
    },
}

impl FitModel {
    /// Short name of the algorithm family.
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        match self {
            Self::Centroid { .. } => Algorithm::KMeans,
            Self::Hierarchical { .. } => Algorithm::Hierarchical,
            Self::Density { .. } => Algorithm::Dbscan,
            Self::Mixture { .. } => Algorithm::Gmm,
        }
    }
}

/// Labels plus the model that produced them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterFit {
    labels: ClusterAssignment,
    model: FitModel,
}

impl ClusterFit {
    /// Pairs labels with their model.
    #[must_use]
    pub fn new(labels: ClusterAssignment, model: FitModel) -> Self {
        Self { labels, model }
    }

    /// Row labels.
    #[must_use]
    pub fn labels(&self) -> &ClusterAssignment {
        &self.labels
    }

    /// Algorithm-specific outputs.
    #[must_use]
    pub fn model(&self) -> &FitModel {
        &self.model
    }

    /// Cluster centers: centroids for K-Means, component means for a mixture.
    #[must_use]
    pub fn centroids(&self) -> Option<&Matrix<f64>> {
        match &self.model {
            FitModel::Centroid { centroids, .. } => Some(centroids),
            FitModel::Mixture { means, .. } => Some(means),
            FitModel::Hierarchical { .. } | FitModel::Density { .. } => None,
        }
    }

    /// Merge history behind a hierarchical fit, built with the metric the
    /// fit actually used.
    #[must_use]
    pub fn linkage_matrix(&self) -> Option<&LinkageMatrix> {
        match &self.model {
            FitModel::Hierarchical { linkage_matrix, .. } => Some(linkage_matrix),
            _ => None,
        }
    }

    /// Within-cluster sum of squares (K-Means only).
    #[must_use]
    pub fn inertia(&self) -> Option<f64> {
        match self.model {
            FitModel::Centroid { inertia, .. } => Some(inertia),
            _ => None,
        }
    }
}

/// Renumbers labels by first appearance in row order.
pub(crate) fn relabel_by_first_appearance(raw: &[usize]) -> Vec<usize> {
    let mut mapping: BTreeMap<usize, usize> = BTreeMap::new();
    raw.iter()
        .map(|&r| {
            let next = mapping.len();
            *mapping.entry(r).or_insert(next)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_orders_first() {
        let mut v = vec![Membership::Assigned(1), Membership::Noise, Membership::Assigned(0)];
        v.sort();
        assert_eq!(v, vec![Membership::Noise, Membership::Assigned(0), Membership::Assigned(1)]);
    }

    #[test]
    fn test_raw_boundary() {
        let labels = ClusterAssignment::from_raw(&[0, -1, 2]).expect("valid");
        assert_eq!(labels.n_noise(), 1);
        assert_eq!(labels.n_clusters(), 2);
        assert_eq!(labels.to_raw(), vec![0, -1, 2]);
        assert!(ClusterAssignment::from_raw(&[-2]).is_err());
    }

    #[test]
    fn test_serializes_as_integers() {
        let labels = ClusterAssignment::new(vec![Membership::Noise, Membership::Assigned(3)]);
        let json = serde_json::to_string(&labels).expect("serialize");
        assert_eq!(json, "[-1,3]");
        let back: ClusterAssignment = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, labels);
    }

    #[test]
    fn test_counts_noise_first() {
        let labels = ClusterAssignment::from_raw(&[1, 1, -1, 0]).expect("valid");
        let counts: Vec<_> = labels.counts().into_iter().collect();
        assert_eq!(
            counts,
            vec![(Membership::Noise, 1), (Membership::Assigned(0), 1), (Membership::Assigned(1), 2)]
        );
    }

    #[test]
    fn test_relabel_by_first_appearance() {
        assert_eq!(relabel_by_first_appearance(&[7, 7, 3, 9, 3]), vec![0, 0, 1, 2, 1]);
    }

    #[test]
    fn test_algorithm_parse() {
        assert_eq!("DBSCAN".parse::<Algorithm>().ok(), Some(Algorithm::Dbscan));
        let err = "spectral".parse::<Algorithm>().expect_err("unknown");
        assert!(err.to_string().contains("'spectral'"));
    }

    #[test]
    fn test_fit_accessors() {
        let centroids = Matrix::from_vec(1, 1, vec![0.5]).expect("valid");
        let fit = ClusterFit::new(
            ClusterAssignment::from_labels(&[0, 0]),
            FitModel::Centroid { centroids, inertia: 0.5, n_iter: 2 },
        );
        assert_eq!(fit.inertia(), Some(0.5));
        assert!(fit.centroids().is_some());
        assert_eq!(fit.model().algorithm(), Algorithm::KMeans);
    }
}
