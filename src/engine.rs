//! The clustering engine: one feature matrix, one current fit.
//!
//! [`ClusteringEngine`] moves through `Empty → DataLoaded → Fitted`.
//! Loading data discards any fit and every successful fit replaces the
//! previous one. Evaluation, profiles and memberships read the current fit
//! unless the caller passes explicit labels.
//!
//! # Example
//!
//! ```
//! use provclust::engine::{ClusteringEngine, EngineState};
//! use provclust::primitives::Matrix;
//!
//! let data = Matrix::from_vec(6, 1, vec![0.0, 0.1, 0.2, 5.0, 5.1, 5.2]).expect("valid");
//! let mut engine = ClusteringEngine::new();
//! engine.set_data(data).expect("non-empty");
//! engine.fit_kmeans(2, 3).expect("fit");
//! assert_eq!(engine.state(), EngineState::Fitted);
//!
//! let report = engine.evaluate(None).expect("fitted");
//! assert!(report.silhouette > 0.9);
//! ```

use crate::cluster::{
    AgglomerativeClustering, ClusterAssignment, ClusterFit, FitModel, GaussianMixture, KMeans,
    Linkage, LinkageMatrix, Membership, DBSCAN,
};
use crate::data::Dataset;
use crate::error::{ClusterError, Result};
use crate::metrics::{EvaluationReport, QualityMetric, QualityScores};
use crate::preprocessing::{Projection, PCA};
use crate::primitives::{DistanceMetric, Matrix};
use crate::traits::UnsupervisedEstimator;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;
use tracing::{debug, info, warn};

/// Default random seed.
pub const DEFAULT_SEED: u64 = 42;

/// Default iteration cap for iterative fits.
pub const DEFAULT_MAX_ITER: usize = 300;

/// Default number of restarts for K-Means and mixtures.
pub const DEFAULT_N_INIT: usize = 10;

/// Lifecycle of a [`ClusteringEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// No feature matrix.
    Empty,
    /// Feature matrix loaded, nothing fitted.
    DataLoaded,
    /// A fit is available.
    Fitted,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Empty => "empty",
            Self::DataLoaded => "data_loaded",
            Self::Fitted => "fitted",
        };
        f.write_str(name)
    }
}

/// Scores of one K in an optimal-K search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OptimalKRow {
    pub k: usize,
    /// Elbow cue only.
    pub inertia: f64,
    pub silhouette: f64,
    pub calinski_harabasz: f64,
    pub davies_bouldin: f64,
}

/// Result of [`ClusteringEngine::find_optimal_k`], one row per K.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimalKTable {
    rows: Vec<OptimalKRow>,
}

impl OptimalKTable {
    /// Rows in ascending K.
    #[must_use]
    pub fn rows(&self) -> &[OptimalKRow] {
        &self.rows
    }

    /// Best K under one metric. Ties go to the smallest K.
    #[must_use]
    pub fn recommended(&self, metric: QualityMetric) -> Option<usize> {
        let value = |row: &OptimalKRow| match metric {
            QualityMetric::Silhouette => row.silhouette,
            QualityMetric::CalinskiHarabasz => row.calinski_harabasz,
            QualityMetric::DaviesBouldin => row.davies_bouldin,
        };
        let mut best: Option<&OptimalKRow> = None;
        for row in &self.rows {
            if best.map_or(true, |b| metric.is_better(value(row), value(b))) {
                best = Some(row);
            }
        }
        best.map(|row| row.k)
    }

    /// Recommendation of every metric, keyed by metric name.
    #[must_use]
    pub fn recommendations(&self) -> BTreeMap<String, usize> {
        QualityMetric::ALL
            .iter()
            .filter_map(|&m| self.recommended(m).map(|k| (m.to_string(), k)))
            .collect()
    }
}

/// Feature means and size of one cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterProfile {
    pub label: Membership,
    pub size: usize,
    /// Mean per feature, in feature order. `None` when every member is missing.
    pub means: Vec<(String, Option<f64>)>,
}

/// Quality of one algorithm in a side-by-side comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub method: String,
    pub n_clusters: usize,
    #[serde(flatten)]
    pub scores: QualityScores,
}

/// Size of one cluster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClusterShare {
    pub label: Membership,
    pub count: usize,
    pub percentage: f64,
}

/// Fits and evaluates clusterings of one feature matrix.
#[derive(Debug, Clone)]
pub struct ClusteringEngine {
    data: Option<Matrix<f64>>,
    fit: Option<ClusterFit>,
    seed: u64,
    max_iter: usize,
    n_init: usize,
}

impl Default for ClusteringEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusteringEngine {
    /// Creates an empty engine with the default seed and iteration limits.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: None,
            fit: None,
            seed: DEFAULT_SEED,
            max_iter: DEFAULT_MAX_ITER,
            n_init: DEFAULT_N_INIT,
        }
    }

    /// Sets the random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the iteration cap.
    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Sets the restart count used by [`Self::find_optimal_k`] and
    /// [`Self::compare_pipelines`].
    #[must_use]
    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        match (&self.data, &self.fit) {
            (None, _) => EngineState::Empty,
            (Some(_), None) => EngineState::DataLoaded,
            (Some(_), Some(_)) => EngineState::Fitted,
        }
    }

    /// Loads a feature matrix and discards any fit.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty or non-finite matrix.
    pub fn set_data(&mut self, data: Matrix<f64>) -> Result<()> {
        if data.n_rows() == 0 || data.n_cols() == 0 {
            return Err(ClusterError::validation("feature matrix is empty"));
        }
        if !data.is_finite() {
            return Err(ClusterError::validation("feature matrix contains non-finite values"));
        }
        info!(rows = data.n_rows(), features = data.n_cols(), "feature matrix loaded");
        self.data = Some(data);
        self.fit = None;
        Ok(())
    }

    /// The loaded feature matrix.
    ///
    /// # Errors
    ///
    /// Returns a state error when nothing is loaded.
    pub fn data(&self) -> Result<&Matrix<f64>> {
        self.data
            .as_ref()
            .ok_or_else(|| ClusterError::state("no data loaded; call set_data first"))
    }

    /// The current fit, if any.
    #[must_use]
    pub fn current_fit(&self) -> Option<&ClusterFit> {
        self.fit.as_ref()
    }

    fn install(&mut self, fit: ClusterFit) -> Result<&ClusterAssignment> {
        let labels = fit.labels();
        info!(
            algorithm = %fit.model().algorithm(),
            clusters = labels.n_clusters(),
            noise = labels.n_noise(),
            "clustering fitted"
        );
        for share in distribution(labels) {
            info!(label = %share.label, count = share.count, percentage = share.percentage, "cluster size");
        }
        let fit = self.fit.insert(fit);
        Ok(fit.labels())
    }

    /// Scores K-Means for every K in `k_range`.
    ///
    /// # Errors
    ///
    /// Returns a state error without data and a validation error for an
    /// empty range, a range starting below 2 or one exceeding the sample
    /// count.
    pub fn find_optimal_k(&self, k_range: RangeInclusive<usize>) -> Result<OptimalKTable> {
        let x = self.data()?;
        let (k_min, k_max) = (*k_range.start(), *k_range.end());
        if k_range.is_empty() {
            return Err(ClusterError::validation(format!("empty K range {k_min}..={k_max}")));
        }
        if k_min < 2 {
            return Err(ClusterError::invalid_param("k_min", k_min, ">= 2"));
        }
        if k_max > x.n_rows() {
            return Err(ClusterError::invalid_param(
                "k_max",
                k_max,
                &format!("<= number of samples ({})", x.n_rows()),
            ));
        }

        let mut rows = Vec::with_capacity(k_max - k_min + 1);
        for k in k_range {
            let mut kmeans = self.kmeans(k, self.n_init);
            kmeans.fit(x)?;
            let labels = kmeans
                .labels()
                .ok_or_else(|| ClusterError::Numerical("k-means produced no labels".into()))?;
            let scores = QualityScores::compute(x, labels);
            debug!(
                k,
                inertia = kmeans.inertia(),
                silhouette = scores.silhouette,
                calinski_harabasz = scores.calinski_harabasz,
                davies_bouldin = scores.davies_bouldin,
                "optimal-k candidate"
            );
            rows.push(OptimalKRow {
                k,
                inertia: kmeans.inertia(),
                silhouette: scores.silhouette,
                calinski_harabasz: scores.calinski_harabasz,
                davies_bouldin: scores.davies_bouldin,
            });
        }

        let table = OptimalKTable { rows };
        for (metric, k) in table.recommendations() {
            info!(metric = %metric, k, "recommended number of clusters");
        }
        Ok(table)
    }

    fn kmeans(&self, k: usize, n_init: usize) -> KMeans {
        KMeans::new(k)
            .with_n_init(n_init)
            .with_max_iter(self.max_iter)
            .with_random_state(self.seed)
    }

    /// Fits K-Means with `n_init` seeded restarts.
    ///
    /// # Errors
    ///
    /// Returns a state error without data and a validation error unless
    /// `1 <= k <= n_samples` and `n_init >= 1`.
    pub fn fit_kmeans(&mut self, k: usize, n_init: usize) -> Result<&ClusterAssignment> {
        let x = self.data()?;
        let mut kmeans = self.kmeans(k, n_init);
        kmeans.fit(x)?;

        let (labels, centroids) = match (kmeans.labels(), kmeans.centroids()) {
            (Some(l), Some(c)) => (l, c.clone()),
            _ => return Err(ClusterError::Numerical("k-means produced no model".into())),
        };
        let fit = ClusterFit::new(
            ClusterAssignment::from_labels(labels),
            FitModel::Centroid {
                centroids,
                inertia: kmeans.inertia(),
                n_iter: kmeans.n_iter(),
            },
        );
        self.install(fit)
    }

    /// Fits agglomerative clustering cut at `k` clusters.
    ///
    /// Ward linkage always uses Euclidean distance; a different requested
    /// metric is overridden and the override is recorded in the fit.
    ///
    /// # Errors
    ///
    /// Returns a state error without data and a validation error unless
    /// `1 <= k <= n_samples`.
    pub fn fit_hierarchical(
        &mut self,
        k: usize,
        linkage: Linkage,
        metric: DistanceMetric,
    ) -> Result<&ClusterAssignment> {
        let x = self.data()?;
        let mut hc = AgglomerativeClustering::new(k, linkage).with_metric(metric);
        hc.fit(x)?;

        let (labels, linkage_matrix) = match (hc.labels(), hc.linkage_matrix()) {
            (Some(l), Some(m)) => (l, m.clone()),
            _ => return Err(ClusterError::Numerical("hierarchical fit produced no model".into())),
        };
        let fit = ClusterFit::new(
            ClusterAssignment::from_labels(labels),
            FitModel::Hierarchical {
                linkage,
                requested_metric: hc.requested_metric(),
                metric: hc.metric(),
                metric_overridden: hc.metric_overridden(),
                linkage_matrix,
            },
        );
        self.install(fit)
    }

    /// Fits DBSCAN. The number of clusters is an output.
    ///
    /// # Errors
    ///
    /// Returns a state error without data and a validation error for
    /// `eps <= 0` or `min_samples == 0`.
    pub fn fit_dbscan(&mut self, eps: f64, min_samples: usize) -> Result<&ClusterAssignment> {
        let x = self.data()?;
        let mut dbscan = DBSCAN::new(eps, min_samples);
        dbscan.fit(x)?;

        let labels = dbscan
            .labels()
            .cloned()
            .ok_or_else(|| ClusterError::Numerical("dbscan produced no labels".into()))?;
        let model = FitModel::Density {
            eps,
            min_samples,
            n_clusters: labels.n_clusters(),
            n_noise: labels.n_noise(),
        };
        self.install(ClusterFit::new(labels, model))
    }

    /// Fits a full-covariance Gaussian mixture with `n_init` restarts.
    ///
    /// # Errors
    ///
    /// Returns a state error without data, a validation error unless
    /// `1 <= k <= n_samples` and `n_init >= 1`, and a numerical error if a
    /// covariance cannot be factorized.
    pub fn fit_gaussian_mixture(&mut self, k: usize, n_init: usize) -> Result<&ClusterAssignment> {
        let x = self.data()?;
        let mut gmm = self.gaussian_mixture(k, n_init);
        gmm.fit(x)?;

        let (labels, means, weights) = match (gmm.labels(), gmm.means(), gmm.weights()) {
            (Some(l), Some(m), Some(w)) => (l, m, w.to_vec()),
            _ => return Err(ClusterError::Numerical("mixture fit produced no model".into())),
        };
        if !gmm.converged() {
            warn!(n_iter = gmm.n_iter(), "gaussian mixture did not converge");
        }
        let fit = ClusterFit::new(
            ClusterAssignment::from_labels(labels),
            FitModel::Mixture {
                means,
                weights,
                log_likelihood: gmm.log_likelihood(),
                converged: gmm.converged(),
            },
        );
        self.install(fit)
    }

    fn gaussian_mixture(&self, k: usize, n_init: usize) -> GaussianMixture {
        GaussianMixture::new(k)
            .with_n_init(n_init)
            .with_max_iter(self.max_iter)
            .with_random_state(self.seed)
    }

    /// Full Euclidean merge history, for dendrograms.
    ///
    /// # Errors
    ///
    /// Returns a state error without data.
    pub fn linkage_matrix(&self, linkage: Linkage) -> Result<LinkageMatrix> {
        LinkageMatrix::build(self.data()?, linkage, DistanceMetric::Euclidean)
    }

    /// Cuts a merge history into flat clusters and makes the cut the
    /// current fit.
    ///
    /// Exactly one of `k` and `height` must be given. Labels are zero-based
    /// and numbered by first appearance in row order.
    ///
    /// # Errors
    ///
    /// Returns a state error without data and a validation error when both
    /// or neither criterion is given, when `k` is outside `[1, n]` or when
    /// the history covers a different number of rows.
    pub fn cut_dendrogram(
        &mut self,
        matrix: &LinkageMatrix,
        k: Option<usize>,
        height: Option<f64>,
    ) -> Result<&ClusterAssignment> {
        let n_rows = self.data()?.n_rows();
        if matrix.n_samples() != n_rows {
            return Err(ClusterError::validation(format!(
                "linkage matrix covers {} rows but the data has {n_rows}",
                matrix.n_samples()
            )));
        }

        let labels = match (k, height) {
            (Some(k), None) => matrix.cut_k(k)?,
            (None, Some(h)) => matrix.cut_height(h)?,
            _ => {
                return Err(ClusterError::validation(
                    "exactly one of k and height is required to cut a dendrogram",
                ))
            }
        };

        let fit = ClusterFit::new(
            ClusterAssignment::from_labels(&labels),
            FitModel::Hierarchical {
                linkage: matrix.linkage(),
                requested_metric: matrix.metric(),
                metric: matrix.metric(),
                metric_overridden: false,
                linkage_matrix: matrix.clone(),
            },
        );
        self.install(fit)
    }

    /// Explicit labels if given, otherwise the current fit's labels.
    fn resolve_labels<'a>(
        &'a self,
        labels: Option<&'a ClusterAssignment>,
        n_rows: usize,
    ) -> Result<&'a ClusterAssignment> {
        let labels = match labels {
            Some(labels) => labels,
            None => {
                self.data()?;
                self.fit
                    .as_ref()
                    .map(ClusterFit::labels)
                    .ok_or_else(|| ClusterError::state("no clustering fitted"))?
            }
        };
        if labels.len() != n_rows {
            return Err(ClusterError::validation(format!(
                "{} labels for {n_rows} rows",
                labels.len()
            )));
        }
        Ok(labels)
    }

    /// Quality of a labelling with noise rows excluded.
    ///
    /// Inertia is reported only for a K-Means fit evaluated on its own
    /// labels.
    ///
    /// # Errors
    ///
    /// Returns a state error without data (or without a fit when `labels`
    /// is `None`) and a validation error when the label count differs from
    /// the row count.
    pub fn evaluate(&self, labels: Option<&ClusterAssignment>) -> Result<EvaluationReport> {
        let x = self.data()?;
        let resolved = self.resolve_labels(labels, x.n_rows())?;

        let (rows, ids): (Vec<usize>, Vec<usize>) = resolved
            .iter()
            .enumerate()
            .filter_map(|(i, m)| m.label().map(|l| (i, l)))
            .unzip();
        let inertia = match (labels, &self.fit) {
            (None, Some(fit)) => fit.inertia(),
            _ => None,
        };

        let report = EvaluationReport::compute(&x.select_rows(&rows), &ids, resolved.n_noise(), inertia);
        if report.n_clusters < 2 {
            warn!(clusters = report.n_clusters, "fewer than two clusters; scores are degenerate");
        }
        info!(
            silhouette = report.silhouette,
            calinski_harabasz = report.calinski_harabasz,
            davies_bouldin = report.davies_bouldin,
            "clustering evaluated"
        );
        Ok(report)
    }

    /// Per-cluster feature means, noise first when present.
    ///
    /// # Errors
    ///
    /// Returns a validation error for label/row count mismatches or
    /// non-numeric features, and a state error when `labels` is `None` and
    /// nothing is fitted.
    pub fn cluster_profiles(
        &self,
        dataset: &Dataset,
        feature_columns: &[String],
        labels: Option<&ClusterAssignment>,
    ) -> Result<Vec<ClusterProfile>> {
        let labels = self.resolve_labels(labels, dataset.n_rows())?;
        let columns = feature_columns
            .iter()
            .map(|name| dataset.numeric(name).map(|values| (name, values)))
            .collect::<Result<Vec<_>>>()?;

        Ok(members_by_label(labels)
            .into_iter()
            .map(|(label, rows)| {
                let means = columns
                    .iter()
                    .map(|(name, values)| {
                        let present: Vec<f64> = rows.iter().filter_map(|&i| values[i]).collect();
                        ((*name).clone(), crate::stats::mean(&present))
                    })
                    .collect();
                ClusterProfile {
                    label,
                    size: rows.len(),
                    means,
                }
            })
            .collect())
    }

    /// Identifiers of each cluster's rows, noise first, in row order.
    ///
    /// # Errors
    ///
    /// As [`Self::cluster_profiles`], plus a validation error for an
    /// unknown `id_column`.
    pub fn cluster_members(
        &self,
        dataset: &Dataset,
        labels: Option<&ClusterAssignment>,
        id_column: &str,
    ) -> Result<BTreeMap<Membership, Vec<String>>> {
        let labels = self.resolve_labels(labels, dataset.n_rows())?;
        let ids = dataset.column(id_column)?;

        Ok(members_by_label(labels)
            .into_iter()
            .map(|(label, rows)| {
                let names = rows.iter().map(|&i| ids.display(i).unwrap_or_default()).collect();
                (label, names)
            })
            .collect())
    }

    /// Scores K-Means, Ward, complete linkage and a Gaussian mixture at the
    /// same K. The current fit is left untouched.
    ///
    /// # Errors
    ///
    /// Returns a state error without data and a validation error unless
    /// `1 <= k <= n_samples`.
    pub fn compare_pipelines(&self, k: usize) -> Result<Vec<ComparisonRow>> {
        let x = self.data()?;

        let mut kmeans = self.kmeans(k, self.n_init);
        kmeans.fit(x)?;
        let mut ward = AgglomerativeClustering::new(k, Linkage::Ward);
        ward.fit(x)?;
        let mut complete = AgglomerativeClustering::new(k, Linkage::Complete);
        complete.fit(x)?;
        let mut gmm = self.gaussian_mixture(k, self.n_init);
        gmm.fit(x)?;

        let candidates = [
            ("kmeans", kmeans.labels()),
            ("hierarchical_ward", ward.labels()),
            ("hierarchical_complete", complete.labels()),
            ("gmm", gmm.labels()),
        ];

        candidates
            .into_iter()
            .map(|(method, labels)| {
                let labels = labels.ok_or_else(|| {
                    ClusterError::Numerical(format!("{method} produced no labels"))
                })?;
                let scores = QualityScores::compute(x, labels);
                info!(
                    method,
                    silhouette = scores.silhouette,
                    calinski_harabasz = scores.calinski_harabasz,
                    davies_bouldin = scores.davies_bouldin,
                    "pipeline compared"
                );
                Ok(ComparisonRow {
                    method: method.to_string(),
                    n_clusters: ClusterAssignment::from_labels(labels).n_clusters(),
                    scores,
                })
            })
            .collect()
    }

    /// PCA coordinates of the loaded rows.
    ///
    /// # Errors
    ///
    /// Returns a state error without data and a validation error unless
    /// `1 <= n_components <= n_features` and there are at least two rows.
    pub fn project(&self, n_components: usize) -> Result<Projection> {
        PCA::new(n_components).project(self.data()?)
    }

    /// Count and percentage of rows per label, noise first.
    ///
    /// # Errors
    ///
    /// As [`Self::evaluate`].
    pub fn cluster_distribution(&self, labels: Option<&ClusterAssignment>) -> Result<Vec<ClusterShare>> {
        let n_rows = match labels {
            Some(l) => self.data.as_ref().map_or(l.len(), Matrix::n_rows),
            None => self.data()?.n_rows(),
        };
        Ok(distribution(self.resolve_labels(labels, n_rows)?))
    }
}

fn members_by_label(labels: &ClusterAssignment) -> BTreeMap<Membership, Vec<usize>> {
    let mut groups: BTreeMap<Membership, Vec<usize>> = BTreeMap::new();
    for (i, m) in labels.iter().enumerate() {
        groups.entry(m).or_default().push(i);
    }
    groups
}

fn distribution(labels: &ClusterAssignment) -> Vec<ClusterShare> {
    let total = labels.len().max(1) as f64;
    labels
        .counts()
        .into_iter()
        .map(|(label, count)| ClusterShare {
            label,
            count,
            percentage: count as f64 / total * 100.0,
        })
        .collect()
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
