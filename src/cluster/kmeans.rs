//! Centroid clustering: Lloyd iterations from k-means++ seeds, best of
//! several seeded restarts.

use crate::error::{ClusterError, Result};
use crate::metrics::inertia;
use crate::primitives::distance::squared_euclidean;
use crate::primitives::Matrix;
use crate::traits::UnsupervisedEstimator;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// K-Means over scaled province features.
///
/// Each restart draws seeds by D² sampling, then alternates nearest-centroid
/// assignment and mean updates until no centroid moves more than `tol` or
/// `max_iter` is reached. A cluster that loses every row is
/// re-seeded at the row farthest from its current centroid.
///
/// All `n_init` restarts share one generator seeded from `random_state`
/// (42 when unset), so a fixed seed gives fixed labels. The restart with
/// the strictly lowest inertia wins. Labels are renumbered to `0..m`,
/// `m` being the number of non-empty clusters.
///
/// ```
/// use provclust::prelude::*;
///
/// // Two development tiers in (income, schooling) space
/// let data = Matrix::from_vec(6, 2, vec![
///     1.0, 2.0,
///     1.5, 1.8,
///     5.0, 8.0,
///     8.0, 8.0,
///     1.0, 0.6,
///     9.0, 11.0,
/// ]).expect("6x2 matrix");
///
/// let mut kmeans = KMeans::new(2).with_random_state(7);
/// kmeans.fit(&data).expect("fit");
///
/// let labels = kmeans.predict(&data).expect("fitted");
/// assert_eq!(labels[0], labels[1]);
/// assert_ne!(labels[0], labels[5]);
/// ```
#[derive(Debug, Clone)]
pub struct KMeans {
    n_clusters: usize,
    max_iter: usize,
    /// Bound on centroid movement.
    tol: f64,
    n_init: usize,
    random_state: Option<u64>,
    centroids: Option<Matrix<f64>>,
    labels: Option<Vec<usize>>,
    inertia: f64,
    /// Iterations of the winning restart.
    n_iter: usize,
}

impl Default for KMeans {
    fn default() -> Self {
        Self::new(8)
    }
}

/// Outcome of a single restart.
struct Run {
    centroids: Matrix<f64>,
    labels: Vec<usize>,
    inertia: f64,
    n_iter: usize,
}

impl KMeans {
    /// `n_clusters` groups, 300 iterations, 10 restarts.
    #[must_use]
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            max_iter: 300,
            tol: 1e-4,
            n_init: 10,
            random_state: None,
            centroids: None,
            labels: None,
            inertia: 0.0,
            n_iter: 0,
        }
    }

    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    #[must_use]
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Number of restarts, at least 1.
    #[must_use]
    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    /// Seed of the restart generator.
    #[must_use]
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    #[must_use]
    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    /// One row per non-empty cluster, in label order.
    #[must_use]
    pub fn centroids(&self) -> Option<&Matrix<f64>> {
        self.centroids.as_ref()
    }

    /// Labels of the training rows.
    #[must_use]
    pub fn labels(&self) -> Option<&[usize]> {
        self.labels.as_deref()
    }

    /// Squared distance of each training row to its centroid, summed.
    #[must_use]
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    #[must_use]
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.centroids.is_some()
    }

    fn validate(&self, n_samples: usize) -> Result<()> {
        if n_samples == 0 {
            return Err(ClusterError::validation("cannot cluster zero samples"));
        }
        if self.n_clusters == 0 || self.n_clusters > n_samples {
            return Err(ClusterError::invalid_param(
                "n_clusters",
                self.n_clusters,
                &format!("in [1, {n_samples}]"),
            ));
        }
        if self.n_init == 0 {
            return Err(ClusterError::invalid_param("n_init", self.n_init, ">= 1"));
        }
        if self.max_iter == 0 {
            return Err(ClusterError::invalid_param("max_iter", self.max_iter, ">= 1"));
        }
        Ok(())
    }

    /// Initializes centroids using k-means++.
    fn kmeans_plusplus_init(&self, x: &Matrix<f64>, rng: &mut StdRng) -> Vec<Vec<f64>> {
        let n_samples = x.n_rows();
        let mut centroids: Vec<Vec<f64>> = Vec::with_capacity(self.n_clusters);

        // First centroid: uniform
        centroids.push(x.row(rng.gen_range(0..n_samples)).to_vec());

        let mut min_distances: Vec<f64> = x
            .rows()
            .map(|row| squared_euclidean(row, &centroids[0]))
            .collect();

        // Remaining centroids: probability proportional to D²
        for _ in 1..self.n_clusters {
            let total: f64 = min_distances.iter().sum();
            let next = if total > 0.0 {
                let target = rng.gen::<f64>() * total;
                let mut cumsum = 0.0;
                let mut chosen = min_distances
                    .iter()
                    .rposition(|&d| d > 0.0)
                    .unwrap_or(n_samples - 1);
                for (i, &d) in min_distances.iter().enumerate() {
                    cumsum += d;
                    if cumsum >= target && d > 0.0 {
                        chosen = i;
                        break;
                    }
                }
                chosen
            } else {
                rng.gen_range(0..n_samples)
            };

            let centroid = x.row(next).to_vec();
            for (d, row) in min_distances.iter_mut().zip(x.rows()) {
                *d = d.min(squared_euclidean(row, &centroid));
            }
            centroids.push(centroid);
        }

        centroids
    }

    /// Runs Lloyd iterations from one k-means++ start.
    fn single_run(&self, x: &Matrix<f64>, rng: &mut StdRng) -> Result<Run> {
        let mut centroids = self.kmeans_plusplus_init(x, rng);
        let mut n_iter = 0;

        for iter in 0..self.max_iter {
            let labels = assign_labels(x, &centroids);
            let new_centroids = update_centroids(x, &labels, &centroids);
            let converged = centroids_converged(&centroids, &new_centroids, self.tol);
            centroids = new_centroids;
            n_iter = iter + 1;
            if converged {
                break;
            }
        }

        let raw_labels = assign_labels(x, &centroids);
        let (labels, centroids) = compact(&raw_labels, &centroids, x.n_cols())?;
        let inertia = inertia(x, &centroids, &labels);

        Ok(Run {
            centroids,
            labels,
            inertia,
            n_iter,
        })
    }
}

/// Assigns each sample to the nearest centroid (lowest index on ties).
fn assign_labels(x: &Matrix<f64>, centroids: &[Vec<f64>]) -> Vec<usize> {
    x.rows()
        .map(|point| {
            let mut min_dist = f64::INFINITY;
            let mut min_cluster = 0;
            for (k, centroid) in centroids.iter().enumerate() {
                let dist = squared_euclidean(point, centroid);
                if dist < min_dist {
                    min_dist = dist;
                    min_cluster = k;
                }
            }
            min_cluster
        })
        .collect()
}

/// Updates centroids as the mean of assigned samples.
///
/// An empty cluster takes the sample farthest from its currently assigned
/// centroid. Each sample is used for at most one re-seed per update.
fn update_centroids(x: &Matrix<f64>, labels: &[usize], old: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n_features = x.n_cols();
    let mut sums = vec![vec![0.0; n_features]; old.len()];
    let mut counts = vec![0usize; old.len()];

    for (row, &label) in x.rows().zip(labels) {
        counts[label] += 1;
        for (s, &v) in sums[label].iter_mut().zip(row) {
            *s += v;
        }
    }

    let mut reseeded: Vec<usize> = Vec::new();
    for k in 0..old.len() {
        if counts[k] > 0 {
            for s in &mut sums[k] {
                *s /= counts[k] as f64;
            }
            continue;
        }

        let farthest = x
            .rows()
            .zip(labels)
            .enumerate()
            .filter(|(i, _)| !reseeded.contains(i))
            .map(|(i, (row, &label))| (i, squared_euclidean(row, &old[label])))
            .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
                Some((_, bd)) if bd >= d => best,
                _ => Some((i, d)),
            });

        match farthest {
            Some((i, _)) => {
                debug!(cluster = k, sample = i, "re-seeding empty cluster");
                reseeded.push(i);
                sums[k] = x.row(i).to_vec();
            }
            None => sums[k].clone_from(&old[k]),
        }
    }

    sums
}

/// True when no centroid moved more than `tol`.
fn centroids_converged(old: &[Vec<f64>], new: &[Vec<f64>], tol: f64) -> bool {
    old.iter()
        .zip(new)
        .all(|(a, b)| squared_euclidean(a, b) <= tol * tol)
}

/// Drops clusters with no members and renumbers the rest in id order.
fn compact(
    labels: &[usize],
    centroids: &[Vec<f64>],
    n_features: usize,
) -> Result<(Vec<usize>, Matrix<f64>)> {
    let mut used = vec![false; centroids.len()];
    for &l in labels {
        used[l] = true;
    }

    let mut remap = vec![0usize; centroids.len()];
    let mut data = Vec::new();
    let mut next = 0;
    for (k, centroid) in centroids.iter().enumerate() {
        if used[k] {
            remap[k] = next;
            data.extend_from_slice(centroid);
            next += 1;
        }
    }

    let labels = labels.iter().map(|&l| remap[l]).collect();
    Ok((labels, Matrix::from_vec(next, n_features, data)?))
}

impl UnsupervisedEstimator for KMeans {
    type Labels = Vec<usize>;

    /// Runs every restart and keeps the lowest-inertia one.
    ///
    /// # Errors
    ///
    /// Returns a validation error for empty data, `n_clusters` outside
    /// `[1, n_samples]`, or a zero `n_init` or `max_iter`.
    fn fit(&mut self, x: &Matrix<f64>) -> Result<()> {
        self.validate(x.n_rows())?;

        let mut rng = StdRng::seed_from_u64(self.random_state.unwrap_or(42));
        let mut best: Option<Run> = None;

        for restart in 0..self.n_init {
            let run = self.single_run(x, &mut rng)?;
            debug!(restart, inertia = run.inertia, n_iter = run.n_iter, "k-means restart");
            if best.as_ref().map_or(true, |b| run.inertia < b.inertia) {
                best = Some(run);
            }
        }

        let best = best.ok_or_else(|| ClusterError::Numerical("no k-means restart ran".into()))?;
        self.inertia = best.inertia;
        self.n_iter = best.n_iter;
        self.labels = Some(best.labels);
        self.centroids = Some(best.centroids);

        Ok(())
    }

    /// Nearest centroid per row.
    fn predict(&self, x: &Matrix<f64>) -> Result<Vec<usize>> {
        let centroids = self
            .centroids
            .as_ref()
            .ok_or_else(|| ClusterError::state("KMeans not fitted"))?;
        if x.n_cols() != centroids.n_cols() {
            return Err(ClusterError::dimension_mismatch(
                "n_features",
                centroids.n_cols(),
                x.n_cols(),
            ));
        }
        let rows: Vec<Vec<f64>> = centroids.rows().map(<[f64]>::to_vec).collect();
        Ok(assign_labels(x, &rows))
    }
}

#[cfg(test)]
#[path = "tests/core.rs"]
mod tests;
