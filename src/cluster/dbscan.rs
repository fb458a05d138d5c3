//! Density clustering. Provinces in no dense neighborhood are reported
//! as noise rather than forced into a cluster.

use super::{ClusterAssignment, Membership};
use crate::error::{ClusterError, Result};
use crate::primitives::distance::euclidean;
use crate::primitives::Matrix;
use crate::traits::UnsupervisedEstimator;

/// Density-based clustering with a noise label.
///
/// A row is a core row when at least `min_samples` rows, itself included,
/// lie within `eps`. Clusters grow from core rows in row order and take
/// ids 0, 1, 2, ... in the order they are found. Border rows join the
/// first cluster that reaches them. Everything else is
/// [`Membership::Noise`].
///
/// ```
/// use provclust::cluster::{Membership, DBSCAN};
/// use provclust::prelude::*;
///
/// let data = Matrix::from_vec(7, 2, vec![
///     1.0, 1.0,
///     1.2, 1.1,
///     1.1, 1.2,
///     5.0, 5.0,
///     5.1, 5.2,
///     5.2, 5.1,
///     10.0, 10.0,
/// ]).expect("7x2 matrix");
///
/// let mut dbscan = DBSCAN::new(0.5, 2);
/// dbscan.fit(&data).expect("fit");
///
/// let labels = dbscan.labels().expect("fitted");
/// assert_eq!(labels.n_clusters(), 2);
/// assert_eq!(labels.get(6), Some(Membership::Noise));
/// ```
///
/// Neighborhoods are found by brute force, O(n²) distances.
#[derive(Debug, Clone)]
pub struct DBSCAN {
    eps: f64,
    min_samples: usize,
    labels: Option<ClusterAssignment>,
    /// Core rows and their cluster ids, kept for `predict`.
    core_samples: Option<(Matrix<f64>, Vec<usize>)>,
}

impl DBSCAN {
    /// Neighborhood radius `eps`, core threshold `min_samples`. Both are
    /// checked by `fit`.
    #[must_use]
    pub fn new(eps: f64, min_samples: usize) -> Self {
        Self {
            eps,
            min_samples,
            labels: None,
            core_samples: None,
        }
    }

    #[must_use]
    pub fn eps(&self) -> f64 {
        self.eps
    }

    #[must_use]
    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.labels.is_some()
    }

    /// Labels of the training rows.
    #[must_use]
    pub fn labels(&self) -> Option<&ClusterAssignment> {
        self.labels.as_ref()
    }

    /// Number of clusters found by the last fit.
    #[must_use]
    pub fn n_clusters(&self) -> usize {
        self.labels.as_ref().map_or(0, ClusterAssignment::n_clusters)
    }

    /// Rows within `eps` of row `i`, `i` included.
    fn region_query(&self, x: &Matrix<f64>, i: usize) -> Vec<usize> {
        let point = x.row(i);
        x.rows()
            .enumerate()
            .filter(|(_, other)| euclidean(point, other) <= self.eps)
            .map(|(j, _)| j)
            .collect()
    }

    /// Breadth-first growth of `cluster_id` from core row `point`.
    fn expand_cluster(
        &self,
        x: &Matrix<f64>,
        labels: &mut [Option<Membership>],
        is_core: &mut [bool],
        point: usize,
        neighbors: Vec<usize>,
        cluster_id: usize,
    ) {
        labels[point] = Some(Membership::Assigned(cluster_id));
        is_core[point] = true;

        let mut queued = vec![false; labels.len()];
        for &n in &neighbors {
            queued[n] = true;
        }
        let mut queue = neighbors;

        let mut i = 0;
        while i < queue.len() {
            let neighbor = queue[i];
            i += 1;

            match labels[neighbor] {
                None => {
                    labels[neighbor] = Some(Membership::Assigned(cluster_id));

                    // core rows extend the frontier
                    let neighbor_neighbors = self.region_query(x, neighbor);
                    if neighbor_neighbors.len() >= self.min_samples {
                        is_core[neighbor] = true;
                        for nn in neighbor_neighbors {
                            if !queued[nn] {
                                queued[nn] = true;
                                queue.push(nn);
                            }
                        }
                    }
                }
                // border row first seen as noise
                Some(Membership::Noise) => {
                    labels[neighbor] = Some(Membership::Assigned(cluster_id));
                }
                Some(Membership::Assigned(_)) => {}
            }
        }
    }
}

impl UnsupervisedEstimator for DBSCAN {
    type Labels = ClusterAssignment;

    /// Clusters the rows of `x`.
    ///
    /// # Errors
    ///
    /// Returns an error if `eps` is not a positive finite number or
    /// `min_samples` is zero.
    fn fit(&mut self, x: &Matrix<f64>) -> Result<()> {
        if !(self.eps.is_finite() && self.eps > 0.0) {
            return Err(ClusterError::invalid_param("eps", self.eps, "> 0"));
        }
        if self.min_samples == 0 {
            return Err(ClusterError::invalid_param("min_samples", self.min_samples, ">= 1"));
        }

        let n_samples = x.n_rows();
        // None = unvisited
        let mut labels: Vec<Option<Membership>> = vec![None; n_samples];
        let mut is_core = vec![false; n_samples];
        let mut cluster_id = 0;

        for i in 0..n_samples {
            if labels[i].is_some() {
                continue;
            }

            let neighbors = self.region_query(x, i);

            // may still be claimed as a border row later
            if neighbors.len() < self.min_samples {
                labels[i] = Some(Membership::Noise);
                continue;
            }

            self.expand_cluster(x, &mut labels, &mut is_core, i, neighbors, cluster_id);
            cluster_id += 1;
        }

        let labels: Vec<Membership> = labels
            .into_iter()
            .map(|l| l.unwrap_or(Membership::Noise))
            .collect();

        let core_idx: Vec<usize> = (0..n_samples).filter(|&i| is_core[i]).collect();
        let core_labels = core_idx
            .iter()
            .filter_map(|&i| labels[i].label())
            .collect();
        self.core_samples = Some((x.select_rows(&core_idx), core_labels));
        self.labels = Some(ClusterAssignment::new(labels));
        Ok(())
    }

    /// Labels each row with the cluster of its nearest core sample within
    /// `eps`, or noise when no core sample is that close.
    fn predict(&self, x: &Matrix<f64>) -> Result<ClusterAssignment> {
        let (cores, core_labels) = self
            .core_samples
            .as_ref()
            .ok_or_else(|| ClusterError::state("DBSCAN not fitted"))?;
        if cores.n_rows() > 0 && x.n_cols() != cores.n_cols() {
            return Err(ClusterError::dimension_mismatch("n_features", cores.n_cols(), x.n_cols()));
        }

        let memberships = x
            .rows()
            .map(|row| {
                cores
                    .rows()
                    .zip(core_labels)
                    .map(|(c, &l)| (euclidean(row, c), l))
                    .filter(|(d, _)| *d <= self.eps)
                    .fold(None, |best: Option<(f64, usize)>, cand| match best {
                        Some(b) if b.0 <= cand.0 => Some(b),
                        _ => Some(cand),
                    })
                    .map_or(Membership::Noise, |(_, l)| Membership::Assigned(l))
            })
            .collect();
        Ok(ClusterAssignment::new(memberships))
    }
}

#[cfg(test)]
#[path = "tests/density.rs"]
mod tests;
