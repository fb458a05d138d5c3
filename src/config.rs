//! Analysis configuration loaded from TOML.
//!
//! Every section is optional. Method names are parsed with the same
//! `FromStr` implementations the library uses, so an unknown name fails
//! with a message naming it.
//!
//! ```toml
//! seed = 7
//!
//! [data]
//! id_column = "il_adi"
//!
//! [preprocessing]
//! normalize = "robust"
//! outlier_action = "winsorize"
//!
//! [clustering]
//! algorithm = "hierarchical"
//! n_clusters = 6
//! linkage = "average"
//! ```

use crate::cluster::{Algorithm, Linkage};
use crate::engine::{DEFAULT_MAX_ITER, DEFAULT_N_INIT, DEFAULT_SEED};
use crate::error::{ClusterError, Result};
use crate::preprocessing::{NormalizeMethod, OutlierAction};
use crate::preprocessor::{DEFAULT_CORRELATION_THRESHOLD, DEFAULT_META_COLUMNS};
use crate::primitives::DistanceMetric;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Seed for every random draw.
    pub seed: u64,
    pub data: DataConfig,
    pub preprocessing: PreprocessingConfig,
    pub clustering: ClusteringConfig,
    pub report: ReportConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            data: DataConfig::default(),
            preprocessing: PreprocessingConfig::default(),
            clustering: ClusteringConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

/// Input table layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    /// Column whose values name each row in member lists.
    pub id_column: String,
    /// Columns that never become features.
    pub meta_columns: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            id_column: "il_adi".to_string(),
            meta_columns: DEFAULT_META_COLUMNS.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

/// Preparation pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreprocessingConfig {
    pub normalize: NormalizeMethod,
    pub outlier_action: OutlierAction,
    pub correlation_threshold: f64,
    /// Extra columns kept out of the feature set.
    pub exclude: Vec<String>,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            normalize: NormalizeMethod::default(),
            outlier_action: OutlierAction::default(),
            correlation_threshold: DEFAULT_CORRELATION_THRESHOLD,
            exclude: Vec::new(),
        }
    }
}

/// Algorithm choice and hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusteringConfig {
    pub algorithm: Algorithm,
    pub n_clusters: usize,
    /// Smallest K tried by the optimal-K search.
    pub k_min: usize,
    /// Largest K tried by the optimal-K search.
    pub k_max: usize,
    pub n_init: usize,
    pub max_iter: usize,
    pub linkage: Linkage,
    pub metric: DistanceMetric,
    pub eps: f64,
    pub min_samples: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            n_clusters: 5,
            k_min: 2,
            k_max: 10,
            n_init: DEFAULT_N_INIT,
            max_iter: DEFAULT_MAX_ITER,
            linkage: Linkage::default(),
            metric: DistanceMetric::Euclidean,
            eps: 0.5,
            min_samples: 5,
        }
    }
}

/// Settings handed to the figure, poster and document generators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    pub figure_dir: PathBuf,
    /// Artifact directory the document generator reads.
    pub report_input: Option<PathBuf>,
    pub document_output: Option<PathBuf>,
    /// Hex color per cluster id.
    pub palette: Vec<String>,
    /// Display name per cluster id.
    pub cluster_names: Vec<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            figure_dir: PathBuf::from("reports/figures"),
            report_input: None,
            document_output: None,
            palette: ["#d73027", "#fc8d59", "#fee090", "#91bfdb", "#4575b4", "#313695"]
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            cluster_names: [
                "6. Kademe (En Az Gelişmiş)",
                "5. Kademe",
                "4. Kademe",
                "3. Kademe",
                "2. Kademe",
                "1. Kademe (En Gelişmiş)",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
        }
    }
}

impl ReportConfig {
    /// Display name of a cluster, falling back to a generic one.
    #[must_use]
    pub fn cluster_name(&self, label: usize) -> String {
        self.cluster_names
            .get(label)
            .cloned()
            .unwrap_or_else(|| format!("Cluster {label}"))
    }
}

impl AnalysisConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for malformed TOML or unknown method
    /// names and a validation error for out-of-range values.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| ClusterError::Config(format!("failed to parse configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the file cannot be read, otherwise as
    /// [`Self::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Checks value ranges and cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let p = &self.preprocessing;
        if !(0.0..=1.0).contains(&p.correlation_threshold) {
            return Err(ClusterError::invalid_param(
                "preprocessing.correlation_threshold",
                p.correlation_threshold,
                "in [0, 1]",
            ));
        }

        let c = &self.clustering;
        if c.n_clusters == 0 {
            return Err(ClusterError::invalid_param("clustering.n_clusters", c.n_clusters, ">= 1"));
        }
        if c.k_min < 2 {
            return Err(ClusterError::invalid_param("clustering.k_min", c.k_min, ">= 2"));
        }
        if c.k_max < c.k_min {
            return Err(ClusterError::invalid_param(
                "clustering.k_max",
                c.k_max,
                &format!(">= k_min ({})", c.k_min),
            ));
        }
        if c.n_init == 0 {
            return Err(ClusterError::invalid_param("clustering.n_init", c.n_init, ">= 1"));
        }
        if c.max_iter == 0 {
            return Err(ClusterError::invalid_param("clustering.max_iter", c.max_iter, ">= 1"));
        }
        if !(c.eps.is_finite() && c.eps > 0.0) {
            return Err(ClusterError::invalid_param("clustering.eps", c.eps, "> 0"));
        }
        if c.min_samples == 0 {
            return Err(ClusterError::invalid_param("clustering.min_samples", c.min_samples, ">= 1"));
        }

        if self.data.id_column.is_empty() {
            return Err(ClusterError::validation("data.id_column must not be empty"));
        }
        Ok(())
    }
}
