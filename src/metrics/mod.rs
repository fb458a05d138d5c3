//! Clustering quality metrics.
//!
//! Includes inertia, silhouette (per sample and averaged),
//! Calinski-Harabasz and Davies-Bouldin. Label ids may be any `usize`
//! values; they need not be contiguous. Callers drop noise rows first.

use crate::error::{ClusterError, Result};
use crate::primitives::distance::{euclidean, squared_euclidean};
use crate::primitives::{DistanceMetric, Matrix};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Within-cluster sum of squared distances to each row's own centroid.
///
/// `labels[i]` indexes a row of `centroids`.
///
/// ```
/// use provclust::metrics::inertia;
/// use provclust::primitives::Matrix;
///
/// let provinces = Matrix::from_vec(3, 1, vec![1.0, 3.0, 10.0]).expect("3x1 matrix");
/// let centroids = Matrix::from_vec(2, 1, vec![2.0, 10.0]).expect("2x1 matrix");
/// assert!((inertia(&provinces, &centroids, &[0, 0, 1]) - 2.0).abs() < 1e-12);
/// ```
#[must_use]
pub fn inertia(data: &Matrix<f64>, centroids: &Matrix<f64>, labels: &[usize]) -> f64 {
    data.rows()
        .zip(labels)
        .map(|(point, &label)| squared_euclidean(point, centroids.row(label)))
        .sum()
}

/// Row indices per cluster id, in ascending id order.
fn groups(labels: &[usize]) -> BTreeMap<usize, Vec<usize>> {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        groups.entry(label).or_default().push(i);
    }
    groups
}

/// Mean of the given rows.
fn centroid(data: &Matrix<f64>, members: &[usize]) -> Vec<f64> {
    let mut c = vec![0.0; data.n_cols()];
    for &i in members {
        for (s, &v) in c.iter_mut().zip(data.row(i)) {
            *s += v;
        }
    }
    for s in &mut c {
        *s /= members.len() as f64;
    }
    c
}

/// `(b - a) / max(a, b)`, 0 when both are 0.
fn silhouette_coefficient(a: f64, b: f64) -> f64 {
    let scale = a.max(b);
    if scale > 0.0 {
        (b - a) / scale
    } else {
        0.0
    }
}

/// Silhouette coefficient of every sample: `a` is the mean distance to
/// the rest of the sample's own cluster, `b` the smallest mean distance to
/// another cluster.
///
/// Members of singleton clusters score 0. With fewer than two clusters
/// every sample scores 0.
#[must_use]
pub fn silhouette_samples(data: &Matrix<f64>, labels: &[usize]) -> Vec<f64> {
    let groups = groups(labels);
    if groups.len() < 2 {
        return vec![0.0; labels.len()];
    }
    let dist = DistanceMetric::Euclidean.pairwise(data);

    let mean_distance = |i: usize, members: &[usize]| -> f64 {
        members.iter().map(|&j| dist[i][j]).sum::<f64>()
    };

    labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let own = &groups[label];
            if own.len() < 2 {
                return 0.0;
            }
            let a_i = mean_distance(i, own) / (own.len() - 1) as f64;
            let b_i = groups
                .iter()
                .filter(|(other, _)| *other != label)
                .map(|(_, members)| mean_distance(i, members) / members.len() as f64)
                .fold(f64::INFINITY, f64::min);
            silhouette_coefficient(a_i, b_i)
        })
        .collect()
}

/// Computes the silhouette score for clustering quality.
///
/// The mean of [`silhouette_samples`]. Values range from -1 to 1, where
/// higher is better.
///
/// # Examples
///
/// ```
/// use provclust::metrics::silhouette_score;
/// use provclust::primitives::Matrix;
///
/// let data = Matrix::from_vec(4, 2, vec![
///     0.0, 0.0,
///     0.1, 0.1,
///     5.0, 5.0,
///     5.1, 5.1,
/// ]).expect("Matrix dimensions and data length are valid");
/// let labels = vec![0, 0, 1, 1];
/// let score = silhouette_score(&data, &labels);
/// assert!(score > 0.5);
/// ```
#[must_use]
pub fn silhouette_score(data: &Matrix<f64>, labels: &[usize]) -> f64 {
    let samples = silhouette_samples(data, labels);
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Variance-ratio criterion (Calinski-Harabasz). Higher is better.
///
/// CH = [B / (k - 1)] / [W / (n - k)] with B the between-cluster and W the
/// within-cluster dispersion. Returns 1 when W is zero and 0 with fewer
/// than two clusters.
#[must_use]
pub fn calinski_harabasz_score(data: &Matrix<f64>, labels: &[usize]) -> f64 {
    let groups = groups(labels);
    let k = groups.len();
    if k < 2 {
        return 0.0;
    }
    let n = labels.len();
    let overall = data.column_means();

    let mut between = 0.0;
    let mut within = 0.0;
    for members in groups.values() {
        let c = centroid(data, members);
        between += members.len() as f64 * squared_euclidean(&c, &overall);
        within += members
            .iter()
            .map(|&i| squared_euclidean(data.row(i), &c))
            .sum::<f64>();
    }

    if within == 0.0 {
        1.0
    } else {
        between * (n - k) as f64 / (within * (k - 1) as f64)
    }
}

/// Compactness index (Davies-Bouldin). Lower is better.
///
/// The mean over clusters of the worst ratio (s_i + s_j) / d(c_i, c_j),
/// where s is the mean distance of members to their centroid. Returns 0
/// when every cluster is a point or every centroid coincides, and +∞
/// with fewer than two clusters.
#[must_use]
pub fn davies_bouldin_score(data: &Matrix<f64>, labels: &[usize]) -> f64 {
    let groups = groups(labels);
    let k = groups.len();
    if k < 2 {
        return f64::INFINITY;
    }

    let centroids: Vec<Vec<f64>> = groups.values().map(|m| centroid(data, m)).collect();
    let spread: Vec<f64> = groups
        .values()
        .zip(&centroids)
        .map(|(members, c)| {
            members.iter().map(|&i| euclidean(data.row(i), c)).sum::<f64>() / members.len() as f64
        })
        .collect();

    let mut separation = vec![vec![0.0; k]; k];
    for i in 0..k {
        for j in (i + 1)..k {
            let d = euclidean(&centroids[i], &centroids[j]);
            separation[i][j] = d;
            separation[j][i] = d;
        }
    }

    let near_zero = |v: &f64| v.abs() <= 1e-8;
    let all_pairs_zero = (0..k).all(|i| ((i + 1)..k).all(|j| near_zero(&separation[i][j])));
    if spread.iter().all(near_zero) || all_pairs_zero {
        return 0.0;
    }

    let total: f64 = (0..k)
        .map(|i| {
            (0..k)
                .filter(|&j| j != i && separation[i][j] > 0.0)
                .map(|j| (spread[i] + spread[j]) / separation[i][j])
                .fold(0.0, f64::max)
        })
        .sum();
    total / k as f64
}

/// The three automatic quality metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum QualityMetric {
    /// Mean silhouette (higher is better).
    Silhouette,
    /// Calinski-Harabasz (higher is better).
    CalinskiHarabasz,
    /// Davies-Bouldin (lower is better).
    DaviesBouldin,
}

impl QualityMetric {
    /// Accepted names, in declaration order.
    pub const NAMES: [&'static str; 3] = ["silhouette", "calinski_harabasz", "davies_bouldin"];

    /// All metrics, in declaration order.
    pub const ALL: [Self; 3] = [Self::Silhouette, Self::CalinskiHarabasz, Self::DaviesBouldin];

    /// Whether larger values mean better clusterings.
    #[must_use]
    pub fn higher_is_better(self) -> bool {
        !matches!(self, Self::DaviesBouldin)
    }

    /// Whether `candidate` is strictly better than `incumbent`.
    #[must_use]
    pub fn is_better(self, candidate: f64, incumbent: f64) -> bool {
        if self.higher_is_better() {
            candidate > incumbent
        } else {
            candidate < incumbent
        }
    }
}

impl fmt::Display for QualityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Self::NAMES[*self as usize])
    }
}

impl FromStr for QualityMetric {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "silhouette" | "silhouette_score" => Ok(Self::Silhouette),
            "calinski_harabasz" | "ch" => Ok(Self::CalinskiHarabasz),
            "davies_bouldin" | "db" => Ok(Self::DaviesBouldin),
            _ => Err(ClusterError::unknown_method("quality metric", s, &Self::NAMES)),
        }
    }
}

impl TryFrom<String> for QualityMetric {
    type Error = ClusterError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<QualityMetric> for String {
    fn from(m: QualityMetric) -> Self {
        m.to_string()
    }
}

/// Silhouette, Calinski-Harabasz and Davies-Bouldin of one labelling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityScores {
    /// Mean silhouette.
    pub silhouette: f64,
    /// Variance-ratio criterion.
    pub calinski_harabasz: f64,
    /// Compactness index.
    pub davies_bouldin: f64,
}

impl QualityScores {
    /// Scores for a labelling with fewer than two clusters.
    pub const DEGENERATE: Self = Self {
        silhouette: 0.0,
        calinski_harabasz: 0.0,
        davies_bouldin: f64::INFINITY,
    };

    /// Computes all three scores.
    #[must_use]
    pub fn compute(data: &Matrix<f64>, labels: &[usize]) -> Self {
        if groups(labels).len() < 2 {
            return Self::DEGENERATE;
        }
        Self {
            silhouette: silhouette_score(data, labels),
            calinski_harabasz: calinski_harabasz_score(data, labels),
            davies_bouldin: davies_bouldin_score(data, labels),
        }
    }

    /// Value of one metric.
    #[must_use]
    pub fn get(&self, metric: QualityMetric) -> f64 {
        match metric {
            QualityMetric::Silhouette => self.silhouette,
            QualityMetric::CalinskiHarabasz => self.calinski_harabasz,
            QualityMetric::DaviesBouldin => self.davies_bouldin,
        }
    }
}

/// Quality of one clustering, noise rows excluded.
///
/// Non-finite values serialize as JSON `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    /// Mean silhouette.
    pub silhouette: f64,
    /// Variance-ratio criterion.
    pub calinski_harabasz: f64,
    /// Compactness index.
    pub davies_bouldin: f64,
    /// Mean silhouette of each cluster's members.
    pub per_cluster_silhouette: BTreeMap<usize, f64>,
    /// Within-cluster sum of squares, for a centroid fit on its own labels.
    pub inertia: Option<f64>,
    /// Non-noise clusters.
    pub n_clusters: usize,
    /// Rows labelled noise.
    pub n_noise: usize,
}

impl EvaluationReport {
    /// Evaluates non-noise labels against their rows.
    ///
    /// `per_cluster_silhouette` covers every cluster in `labels`.
    #[must_use]
    pub fn compute(data: &Matrix<f64>, labels: &[usize], n_noise: usize, inertia: Option<f64>) -> Self {
        let groups = groups(labels);
        let scores = QualityScores::compute(data, labels);
        let samples = silhouette_samples(data, labels);
        let per_cluster_silhouette = groups
            .iter()
            .map(|(&label, members)| {
                let mean = members.iter().map(|&i| samples[i]).sum::<f64>() / members.len() as f64;
                (label, mean)
            })
            .collect();

        Self {
            silhouette: scores.silhouette,
            calinski_harabasz: scores.calinski_harabasz,
            davies_bouldin: scores.davies_bouldin,
            per_cluster_silhouette,
            inertia,
            n_clusters: groups.len(),
            n_noise,
        }
    }

    /// The three headline scores.
    #[must_use]
    pub fn scores(&self) -> QualityScores {
        QualityScores {
            silhouette: self.silhouette,
            calinski_harabasz: self.calinski_harabasz,
            davies_bouldin: self.davies_bouldin,
        }
    }

    /// Flat `metric name -> value` view.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        map.insert("silhouette_score".to_string(), self.silhouette);
        map.insert("calinski_harabasz".to_string(), self.calinski_harabasz);
        map.insert("davies_bouldin".to_string(), self.davies_bouldin);
        for (label, value) in &self.per_cluster_silhouette {
            map.insert(format!("cluster_{label}_silhouette"), *value);
        }
        if let Some(inertia) = self.inertia {
            map.insert("inertia".to_string(), inertia);
        }
        map
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
