//! Agglomerative (hierarchical) clustering.
//!
//! Bottom-up merging with Lance-Williams distance updates. The merge
//! history is kept as a [`LinkageMatrix`] in SciPy numbering: leaves are
//! `0..n` and the merge at step `i` creates node `n + i`.

use super::relabel_by_first_appearance;
use crate::error::{ClusterError, Result};
use crate::primitives::{DistanceMetric, Matrix};
use crate::traits::UnsupervisedEstimator;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Merge criterion between two clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Linkage {
    /// Minimize the increase in within-cluster variance (Euclidean only).
    #[default]
    Ward,
    /// Maximum distance between members.
    Complete,
    /// Mean distance between members.
    Average,
    /// Minimum distance between members.
    Single,
}

impl Linkage {
    /// Accepted names, in declaration order.
    pub const NAMES: [&'static str; 4] = ["ward", "complete", "average", "single"];

    /// Lance-Williams update: distance from the union of `i` and `j` to `k`.
    fn update(self, d_ik: f64, d_jk: f64, d_ij: f64, n_i: f64, n_j: f64, n_k: f64) -> f64 {
        match self {
            Self::Single => d_ik.min(d_jk),
            Self::Complete => d_ik.max(d_jk),
            Self::Average => (n_i * d_ik + n_j * d_jk) / (n_i + n_j),
            Self::Ward => {
                let total = n_i + n_j + n_k;
                let sq = ((n_i + n_k) * d_ik * d_ik + (n_j + n_k) * d_jk * d_jk
                    - n_k * d_ij * d_ij)
                    / total;
                sq.max(0.0).sqrt()
            }
        }
    }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Self::NAMES[*self as usize])
    }
}

impl FromStr for Linkage {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ward" => Ok(Self::Ward),
            "complete" => Ok(Self::Complete),
            "average" => Ok(Self::Average),
            "single" => Ok(Self::Single),
            _ => Err(ClusterError::unknown_method("linkage", s, &Self::NAMES)),
        }
    }
}

impl TryFrom<String> for Linkage {
    type Error = ClusterError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Linkage> for String {
    fn from(l: Linkage) -> Self {
        l.to_string()
    }
}

/// One merge: nodes `left` and `right` joined at `distance` into a
/// cluster of `size` leaves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkageStep {
    /// Smaller node id.
    pub left: usize,
    /// Larger node id.
    pub right: usize,
    /// Linkage distance of the merge.
    pub distance: f64,
    /// Leaves under the new node.
    pub size: usize,
}

/// Ordered merge history of a hierarchical clustering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkageMatrix {
    n_samples: usize,
    linkage: Linkage,
    metric: DistanceMetric,
    steps: Vec<LinkageStep>,
}

impl LinkageMatrix {
    /// Builds the full merge history of the rows of `x`.
    ///
    /// Ties between candidate pairs go to the pair found first in row
    /// order.
    ///
    /// # Errors
    ///
    /// Returns an error if `x` has no rows.
    pub fn build(x: &Matrix<f64>, linkage: Linkage, metric: DistanceMetric) -> Result<Self> {
        let n = x.n_rows();
        if n == 0 {
            return Err(ClusterError::validation("cannot cluster zero samples"));
        }

        let mut dist = metric.pairwise(x);
        let mut active = vec![true; n];
        let mut sizes = vec![1usize; n];
        let mut node_ids: Vec<usize> = (0..n).collect();
        let mut steps = Vec::with_capacity(n - 1);

        for step in 0..n - 1 {
            let mut best: Option<(usize, usize, f64)> = None;
            for i in (0..n).filter(|&i| active[i]) {
                for j in ((i + 1)..n).filter(|&j| active[j]) {
                    if best.map_or(true, |(_, _, d)| dist[i][j] < d) {
                        best = Some((i, j, dist[i][j]));
                    }
                }
            }
            let (i, j, d_ij) = best.ok_or_else(|| {
                ClusterError::Numerical("no active cluster pair left to merge".into())
            })?;

            let (n_i, n_j) = (sizes[i] as f64, sizes[j] as f64);
            for k in (0..n).filter(|&k| active[k] && k != i && k != j) {
                let updated = linkage.update(dist[i][k], dist[j][k], d_ij, n_i, n_j, sizes[k] as f64);
                dist[i][k] = updated;
                dist[k][i] = updated;
            }

            steps.push(LinkageStep {
                left: node_ids[i].min(node_ids[j]),
                right: node_ids[i].max(node_ids[j]),
                distance: d_ij,
                size: sizes[i] + sizes[j],
            });
            active[j] = false;
            sizes[i] += sizes[j];
            node_ids[i] = n + step;
        }

        Ok(Self {
            n_samples: n,
            linkage,
            metric,
            steps,
        })
    }

    /// Number of leaves.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Merge criterion the history was built with.
    #[must_use]
    pub fn linkage(&self) -> Linkage {
        self.linkage
    }

    /// Distance metric the history was built with.
    #[must_use]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Merge steps in order.
    #[must_use]
    pub fn steps(&self) -> &[LinkageStep] {
        &self.steps
    }

    /// Flat labels with exactly `k` clusters, from the first `n - k` merges.
    ///
    /// # Errors
    ///
    /// Returns an error unless `1 <= k <= n`.
    pub fn cut_k(&self, k: usize) -> Result<Vec<usize>> {
        if k == 0 || k > self.n_samples {
            return Err(ClusterError::invalid_param(
                "n_clusters",
                k,
                &format!("in [1, {}]", self.n_samples),
            ));
        }
        Ok(self.labels_after(self.n_samples - k))
    }

    /// Flat labels from every merge at or below `height`.
    ///
    /// # Errors
    ///
    /// Returns an error if `height` is not finite.
    pub fn cut_height(&self, height: f64) -> Result<Vec<usize>> {
        if !height.is_finite() {
            return Err(ClusterError::invalid_param("height", height, "a finite number"));
        }
        let merges = self.steps.iter().take_while(|s| s.distance <= height).count();
        Ok(self.labels_after(merges))
    }

    /// Labels after applying the first `merges` steps, numbered by first
    /// appearance in row order.
    fn labels_after(&self, merges: usize) -> Vec<usize> {
        let n = self.n_samples;
        let mut parent: Vec<usize> = (0..n).collect();
        // Any leaf under each node.
        let mut representative: Vec<usize> = (0..n).collect();

        for step in self.steps.iter().take(merges) {
            let a = find(&mut parent, representative[step.left]);
            let b = find(&mut parent, representative[step.right]);
            parent[b] = a;
            representative.push(a);
        }

        let roots: Vec<usize> = (0..n).map(|i| find(&mut parent, i)).collect();
        relabel_by_first_appearance(&roots)
    }
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Agglomerative clustering cut at a fixed number of clusters.
///
/// Ward linkage is only defined for Euclidean distances; asking for Ward
/// with another metric fits with Euclidean and records the override.
///
/// # Examples
///
/// ```
/// use provclust::cluster::{AgglomerativeClustering, Linkage};
/// use provclust::prelude::*;
///
/// let data = Matrix::from_vec(4, 1, vec![0.0, 0.5, 10.0, 10.5]).expect("valid");
/// let mut hc = AgglomerativeClustering::new(2, Linkage::Average);
/// hc.fit(&data).expect("fit");
/// assert_eq!(hc.labels(), Some(&[0, 0, 1, 1][..]));
/// ```
#[derive(Debug, Clone)]
pub struct AgglomerativeClustering {
    n_clusters: usize,
    linkage: Linkage,
    requested_metric: DistanceMetric,
    metric: DistanceMetric,
    linkage_matrix: Option<LinkageMatrix>,
    labels: Option<Vec<usize>>,
    training: Option<Matrix<f64>>,
}

impl AgglomerativeClustering {
    /// Creates a Euclidean agglomerative clustering.
    #[must_use]
    pub fn new(n_clusters: usize, linkage: Linkage) -> Self {
        Self {
            n_clusters,
            linkage,
            requested_metric: DistanceMetric::Euclidean,
            metric: DistanceMetric::Euclidean,
            linkage_matrix: None,
            labels: None,
            training: None,
        }
    }

    /// Sets the distance metric.
    #[must_use]
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.requested_metric = metric;
        self.metric = metric;
        self
    }

    /// Merge criterion.
    #[must_use]
    pub fn linkage(&self) -> Linkage {
        self.linkage
    }

    /// Metric the caller asked for.
    #[must_use]
    pub fn requested_metric(&self) -> DistanceMetric {
        self.requested_metric
    }

    /// Metric used by the fit.
    #[must_use]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Whether Ward replaced the requested metric with Euclidean.
    #[must_use]
    pub fn metric_overridden(&self) -> bool {
        self.metric != self.requested_metric
    }

    /// Merge history of the last fit.
    #[must_use]
    pub fn linkage_matrix(&self) -> Option<&LinkageMatrix> {
        self.linkage_matrix.as_ref()
    }

    /// Training labels.
    #[must_use]
    pub fn labels(&self) -> Option<&[usize]> {
        self.labels.as_deref()
    }
}

impl UnsupervisedEstimator for AgglomerativeClustering {
    type Labels = Vec<usize>;

    fn fit(&mut self, x: &Matrix<f64>) -> Result<()> {
        if self.n_clusters == 0 || self.n_clusters > x.n_rows() {
            return Err(ClusterError::invalid_param(
                "n_clusters",
                self.n_clusters,
                &format!("in [1, {}]", x.n_rows()),
            ));
        }

        self.metric = if self.linkage == Linkage::Ward {
            if self.requested_metric != DistanceMetric::Euclidean {
                warn!(
                    requested = %self.requested_metric,
                    "ward linkage requires euclidean distance, overriding metric"
                );
            }
            DistanceMetric::Euclidean
        } else {
            self.requested_metric
        };

        let matrix = LinkageMatrix::build(x, self.linkage, self.metric)?;
        self.labels = Some(matrix.cut_k(self.n_clusters)?);
        self.linkage_matrix = Some(matrix);
        self.training = Some(x.clone());
        Ok(())
    }

    /// Labels each row with the cluster of its nearest training row.
    fn predict(&self, x: &Matrix<f64>) -> Result<Vec<usize>> {
        let (training, labels) = match (&self.training, &self.labels) {
            (Some(t), Some(l)) => (t, l),
            _ => return Err(ClusterError::state("AgglomerativeClustering not fitted")),
        };
        if x.n_cols() != training.n_cols() {
            return Err(ClusterError::dimension_mismatch(
                "n_features",
                training.n_cols(),
                x.n_cols(),
            ));
        }

        Ok(x.rows()
            .map(|row| {
                training
                    .rows()
                    .zip(labels)
                    .map(|(t, &l)| (self.metric.distance(row, t), l))
                    .fold((f64::INFINITY, 0), |best, cand| if cand.0 < best.0 { cand } else { best })
                    .1
            })
            .collect())
    }
}

#[cfg(test)]
#[path = "tests/agglomerative.rs"]
mod tests;
