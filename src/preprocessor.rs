//! Stateful preparation pipeline from a raw table to a feature matrix.
//!
//! The [`Preprocessor`] owns the working dataset and an untouched copy of
//! what was loaded. Only imputation and outlier treatment change the
//! working dataset. Meta columns (identifiers, names, region and tier
//! labels) never take part in correlation, KNN distance or normalization.
//!
//! # Example
//!
//! ```
//! use provclust::data::{Column, Dataset};
//! use provclust::preprocessing::{NormalizeMethod, OutlierAction};
//! use provclust::preprocessor::Preprocessor;
//!
//! let ds = Dataset::new(vec![
//!     ("il_adi".to_string(), Column::Categorical((0..6).map(|i| Some(format!("p{i}"))).collect())),
//!     ("gelir".to_string(), Column::Numeric(vec![Some(1.0), Some(2.0), None, Some(4.0), Some(5.0), Some(6.0)])),
//!     ("okul".to_string(), Column::Numeric(vec![Some(3.0), Some(1.0), Some(4.0), Some(1.0), Some(5.0), Some(9.0)])),
//! ]).expect("consistent columns");
//!
//! let mut pre = Preprocessor::from_dataset(ds);
//! let prepared = pre
//!     .prepare_for_clustering(&[], NormalizeMethod::Standard, OutlierAction::Clip)
//!     .expect("pipeline runs");
//! assert_eq!(prepared.matrix.shape(), (6, 2));
//! ```

use crate::data::{Column, ColumnKind, Dataset};
use crate::error::{ClusterError, Result};
use crate::preprocessing::impute::{self, ImputeMethod};
use crate::preprocessing::outliers::{self, Bounds, OutlierAction, OutlierMethod, OutlierStat};
use crate::preprocessing::selection::is_constant;
use crate::preprocessing::{select_by_correlation, NormalizeMethod, ScalerState};
use crate::primitives::Matrix;
use crate::stats::corr_matrix;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

/// Meta columns excluded by default.
pub const DEFAULT_META_COLUMNS: [&str; 6] = [
    "il_kodu",
    "il_adi",
    "plaka",
    "bolge",
    "sege_endeksi",
    "sege_kademe",
];

/// Default correlation threshold of [`Preprocessor::prepare_for_clustering`].
pub const DEFAULT_CORRELATION_THRESHOLD: f64 = 0.95;

/// IQR multiplier used by [`Preprocessor::prepare_for_clustering`].
pub const DEFAULT_IQR_THRESHOLD: f64 = 1.5;

/// Shape and completeness of the working dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub rows: usize,
    pub columns: usize,
    pub numeric_columns: usize,
    pub categorical_columns: usize,
    pub missing_cells: usize,
    pub missing_percentage: f64,
    /// Estimated footprint of the cell storage.
    pub memory_bytes: usize,
}

/// Missing cells of one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingStat {
    pub column: String,
    pub count: usize,
    pub percentage: f64,
    pub kind: ColumnKind,
}

/// Signed correlations between named columns.
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// `NaN` where a correlation is undefined.
    pub values: Matrix<f64>,
}

/// Output of [`Preprocessor::prepare_for_clustering`].
#[derive(Debug, Clone)]
pub struct PreparedData {
    /// Scaled feature matrix, rows aligned with `dataset`.
    pub matrix: Matrix<f64>,
    /// Working dataset after imputation and outlier treatment.
    pub dataset: Dataset,
    /// Feature columns, aligned with the matrix columns.
    pub features: Vec<String>,
    /// Fitted scaler for replaying the transform.
    pub scaler: ScalerState,
}

/// Stateful preparation pipeline.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    original: Option<Dataset>,
    data: Option<Dataset>,
    meta_columns: Vec<String>,
    feature_columns: Option<Vec<String>>,
    correlation_threshold: f64,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Preprocessor {
    /// Creates an empty preprocessor with the default meta columns.
    #[must_use]
    pub fn new() -> Self {
        Self {
            original: None,
            data: None,
            meta_columns: DEFAULT_META_COLUMNS.iter().map(|s| (*s).to_string()).collect(),
            feature_columns: None,
            correlation_threshold: DEFAULT_CORRELATION_THRESHOLD,
        }
    }

    /// Creates a preprocessor over an in-memory dataset.
    #[must_use]
    pub fn from_dataset(dataset: Dataset) -> Self {
        let mut pre = Self::new();
        pre.set_dataset(dataset);
        pre
    }

    /// Replaces the meta column list.
    #[must_use]
    pub fn with_meta_columns(mut self, meta_columns: Vec<String>) -> Self {
        self.meta_columns = meta_columns;
        self
    }

    /// Sets the correlation threshold used by [`Self::prepare_for_clustering`].
    #[must_use]
    pub fn with_correlation_threshold(mut self, threshold: f64) -> Self {
        self.correlation_threshold = threshold;
        self
    }

    /// Loads a delimited file with a header row.
    ///
    /// # Errors
    ///
    /// Returns an I/O kind error if the file is missing or malformed.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<&Dataset> {
        let path = path.as_ref();
        let dataset = Dataset::from_csv(path)?;
        info!(
            path = %path.display(),
            rows = dataset.n_rows(),
            cols = dataset.n_cols(),
            "loaded dataset"
        );
        self.set_dataset(dataset);
        self.dataset()
    }

    fn set_dataset(&mut self, dataset: Dataset) {
        debug!(
            numeric = dataset.numeric_columns().len(),
            categorical = dataset.categorical_columns().len(),
            "classified columns"
        );
        self.original = Some(dataset.clone());
        self.data = Some(dataset);
        self.feature_columns = None;
    }

    /// The working dataset.
    ///
    /// # Errors
    ///
    /// Returns a state error if nothing is loaded.
    pub fn dataset(&self) -> Result<&Dataset> {
        self.data.as_ref().ok_or_else(ClusterError::no_dataset)
    }

    fn dataset_mut(&mut self) -> Result<&mut Dataset> {
        self.data.as_mut().ok_or_else(ClusterError::no_dataset)
    }

    /// The dataset as loaded, before any step.
    #[must_use]
    pub fn original(&self) -> Option<&Dataset> {
        self.original.as_ref()
    }

    #[must_use]
    pub fn meta_columns(&self) -> &[String] {
        &self.meta_columns
    }

    /// Feature list chosen by the last [`Preprocessor::select_features`].
    #[must_use]
    pub fn feature_columns(&self) -> Option<&[String]> {
        self.feature_columns.as_deref()
    }

    fn is_meta(&self, name: &str) -> bool {
        self.meta_columns.iter().any(|m| m == name)
    }

    /// Numeric columns that are not meta columns, in column order.
    fn numeric_non_meta(&self, data: &Dataset) -> Vec<String> {
        data.numeric_columns()
            .into_iter()
            .filter(|c| !self.is_meta(c))
            .collect()
    }

    /// Row/column counts, missing cells and memory footprint.
    ///
    /// # Errors
    ///
    /// Returns a state error if nothing is loaded.
    pub fn summarize(&self) -> Result<DatasetSummary> {
        let data = self.dataset()?;
        let (rows, columns) = data.shape();
        let missing_cells = data.missing_count();
        let total = rows * columns;

        Ok(DatasetSummary {
            rows,
            columns,
            numeric_columns: data.numeric_columns().len(),
            categorical_columns: data.categorical_columns().len(),
            missing_cells,
            missing_percentage: percentage(missing_cells, total),
            memory_bytes: data.memory_usage(),
        })
    }

    /// Columns with at least one missing cell, most incomplete first.
    ///
    /// # Errors
    ///
    /// Returns a state error if nothing is loaded.
    pub fn analyze_missing(&self) -> Result<Vec<MissingStat>> {
        let data = self.dataset()?;
        let mut stats: Vec<MissingStat> = data
            .iter_columns()
            .filter_map(|(name, col)| {
                let count = col.missing_count();
                (count > 0).then(|| MissingStat {
                    column: name.to_string(),
                    count,
                    percentage: percentage(count, data.n_rows()),
                    kind: col.kind(),
                })
            })
            .collect();
        // Stable sort keeps column order among ties.
        stats.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));
        Ok(stats)
    }

    /// Resolves missing cells in the targeted columns.
    ///
    /// `columns` defaults to every numeric column. KNN fills the non-meta
    /// targets, using them as distance coordinates.
    ///
    /// # Errors
    ///
    /// Returns a state error if nothing is loaded, and a validation error
    /// for unknown columns or a numeric-only method on a text column.
    pub fn handle_missing(&mut self, method: ImputeMethod, columns: Option<&[String]>) -> Result<&Dataset> {
        let data = self.dataset()?;
        let targets = match columns {
            Some(cols) => {
                for name in cols {
                    let kind = data.column(name)?.kind();
                    if kind == ColumnKind::Categorical && !method.supports_categorical() {
                        return Err(ClusterError::validation(format!(
                            "imputation method '{method}' cannot fill text column '{name}'"
                        )));
                    }
                }
                cols.to_vec()
            }
            None => data.numeric_columns(),
        };

        let updated = match method {
            ImputeMethod::Drop => {
                let keep: Vec<bool> = (0..data.n_rows())
                    .map(|row| {
                        targets.iter().all(|name| {
                            data.column(name).map_or(true, |c| !c.is_missing(row))
                        })
                    })
                    .collect();
                let kept = data.filter_rows(&keep);
                info!(removed = data.n_rows() - kept.n_rows(), remaining = kept.n_rows(), "dropped rows with missing values");
                kept
            }
            ImputeMethod::Mean | ImputeMethod::Median | ImputeMethod::MostFrequent => {
                let mut out = data.clone();
                for name in &targets {
                    let filled = match data.column(name)? {
                        Column::Numeric(values) => Column::Numeric(impute::fill_numeric(values, method)?),
                        Column::Categorical(values) => Column::Categorical(impute::fill_categorical(values)),
                    };
                    out.replace_column(name, filled)?;
                }
                info!(method = %method, columns = targets.len(), "imputed missing values");
                out
            }
            ImputeMethod::Knn { n_neighbors } => {
                let (coords, skipped): (Vec<String>, Vec<String>) =
                    targets.into_iter().partition(|c| !self.is_meta(c));
                if !skipped.is_empty() {
                    debug!(columns = ?skipped, "meta columns left out of KNN imputation");
                }
                let values: Vec<&[Option<f64>]> = coords
                    .iter()
                    .map(|name| data.numeric(name))
                    .collect::<Result<_>>()?;
                let filled = impute::knn_impute(&values, n_neighbors)?;
                let mut out = data.clone();
                for (name, col) in coords.iter().zip(filled) {
                    out.replace_column(name, Column::Numeric(col))?;
                }
                info!(n_neighbors, columns = coords.len(), "imputed missing values with KNN");
                out
            }
        };

        let slot = self.dataset_mut()?;
        *slot = updated;
        Ok(slot)
    }

    /// Resolves the outlier target list: explicit names, or every numeric
    /// non-meta column. Text and unknown columns are skipped.
    fn outlier_targets(&self, data: &Dataset, columns: Option<&[String]>) -> Vec<String> {
        match columns {
            Some(cols) => cols
                .iter()
                .filter(|c| matches!(data.column(c), Ok(Column::Numeric(_))))
                .cloned()
                .collect(),
            None => self.numeric_non_meta(data),
        }
    }

    /// Counts outliers per column without changing data.
    ///
    /// # Errors
    ///
    /// Returns a state error if nothing is loaded, or a validation error
    /// for a negative threshold.
    pub fn detect_outliers(&self, method: OutlierMethod, columns: Option<&[String]>, threshold: f64) -> Result<Vec<OutlierStat>> {
        let data = self.dataset()?;
        let mut report = Vec::new();
        for name in self.outlier_targets(data, columns) {
            if let Some(stat) = outliers::detect(&name, data.numeric(&name)?, method, threshold)? {
                debug!(column = %name, count = stat.count, "outliers detected");
                report.push(stat);
            }
        }
        Ok(report)
    }

    /// Treats outliers column by column.
    ///
    /// Bounds are computed on the data as it stands when each column is
    /// reached, so with `Remove` later columns see only surviving rows.
    /// Rows whose cell is missing are never removed.
    ///
    /// # Errors
    ///
    /// Returns a state error if nothing is loaded, or a validation error
    /// for an invalid threshold or winsorize limit.
    pub fn handle_outliers(
        &mut self,
        method: OutlierMethod,
        action: OutlierAction,
        columns: Option<&[String]>,
        threshold: f64,
    ) -> Result<&Dataset> {
        let mut data = self.dataset()?.clone();
        let before = data.n_rows();

        for name in self.outlier_targets(&data, columns) {
            let values = data.numeric(&name)?;
            let Some(bounds) = Bounds::compute(values, method, threshold)? else {
                continue;
            };
            match action {
                OutlierAction::Clip => {
                    let clipped = outliers::clip(values, bounds);
                    data.replace_column(&name, Column::Numeric(clipped))?;
                }
                OutlierAction::Remove => {
                    let keep: Vec<bool> = values
                        .iter()
                        .map(|v| v.map_or(true, |x| bounds.contains(x)))
                        .collect();
                    data = data.filter_rows(&keep);
                }
                OutlierAction::Winsorize { limit } => {
                    let capped = outliers::winsorize(values, limit)?;
                    data.replace_column(&name, Column::Numeric(capped))?;
                }
            }
        }

        info!(action = %action, rows_before = before, rows_after = data.n_rows(), "handled outliers");
        let slot = self.dataset_mut()?;
        *slot = data;
        Ok(slot)
    }

    /// Chooses the feature list by pruning constant and redundant columns.
    ///
    /// Candidates are the numeric columns outside `exclude` and the meta
    /// list, in column order.
    ///
    /// # Errors
    ///
    /// Returns a state error if nothing is loaded, or a validation error
    /// for a threshold outside [0, 1].
    pub fn select_features(&mut self, exclude: &[String], threshold: f64) -> Result<Vec<String>> {
        let data = self.dataset()?;
        let candidates: Vec<String> = self
            .numeric_non_meta(data)
            .into_iter()
            .filter(|c| !exclude.contains(c))
            .collect();
        let columns: Vec<(&str, &[Option<f64>])> = candidates
            .iter()
            .map(|name| Ok((name.as_str(), data.numeric(name)?)))
            .collect::<Result<_>>()?;

        let selection = select_by_correlation(&columns, threshold)?;
        if !selection.constant.is_empty() {
            warn!(columns = ?selection.constant, "dropped zero-variance columns");
        }
        for (dropped, kept, r) in &selection.correlated {
            debug!(dropped = %dropped, correlated_with = %kept, r, "dropped redundant column");
        }
        info!(
            selected = selection.selected.len(),
            correlated = selection.correlated.len(),
            "selected features"
        );

        self.feature_columns = Some(selection.selected.clone());
        Ok(selection.selected)
    }

    /// Removes features left without spread by outlier treatment.
    ///
    /// IQR bounds collapse to a point when most values agree, so clipping
    /// or row removal can flatten a column that passed selection.
    fn drop_flattened(&mut self, features: Vec<String>) -> Result<Vec<String>> {
        let data = self.dataset()?;
        let mut kept = Vec::with_capacity(features.len());
        let mut flattened = Vec::new();
        for name in features {
            if is_constant(data.numeric(&name)?) {
                flattened.push(name);
            } else {
                kept.push(name);
            }
        }
        if !flattened.is_empty() {
            warn!(columns = ?flattened, "dropped columns flattened by outlier treatment");
            self.feature_columns = Some(kept.clone());
        }
        Ok(kept)
    }

    /// Default column set for correlation and normalization.
    fn feature_defaults(&self, data: &Dataset) -> Vec<String> {
        self.feature_columns
            .clone()
            .unwrap_or_else(|| self.numeric_non_meta(data))
    }

    /// Signed pairwise-complete correlations.
    ///
    /// `columns` defaults to the selected features, else every numeric
    /// non-meta column.
    ///
    /// # Errors
    ///
    /// Returns a state error if nothing is loaded, or a validation error
    /// for unknown or text columns.
    pub fn correlation_matrix(&self, columns: Option<&[String]>) -> Result<CorrelationMatrix> {
        let data = self.dataset()?;
        let columns = columns.map_or_else(|| self.feature_defaults(data), <[String]>::to_vec);
        let values: Vec<&[Option<f64>]> = columns
            .iter()
            .map(|name| data.numeric(name))
            .collect::<Result<_>>()?;
        Ok(CorrelationMatrix {
            values: corr_matrix(&values)?,
            columns,
        })
    }

    /// Scales the feature columns into a dense matrix.
    ///
    /// `columns` defaults to the selected features, else every numeric
    /// non-meta column. Meta columns are always removed.
    ///
    /// # Errors
    ///
    /// Returns a state error if nothing is loaded or a cell is missing, and
    /// a validation error if no columns remain.
    pub fn normalize(&self, method: NormalizeMethod, columns: Option<&[String]>) -> Result<(Matrix<f64>, ScalerState)> {
        let data = self.dataset()?;
        let features: Vec<String> = columns
            .map_or_else(|| self.feature_defaults(data), <[String]>::to_vec)
            .into_iter()
            .filter(|c| !self.is_meta(c))
            .collect();
        if features.is_empty() {
            return Err(ClusterError::validation("no feature columns to normalize"));
        }

        let raw = data.to_matrix(&features)?;
        let scaler = ScalerState::fit(method, features, &raw)?;
        let scaled = scaler.transform(&raw)?;
        info!(method = %method, features = scaled.n_cols(), "normalized features");
        Ok((scaled, scaler))
    }

    /// Runs the fixed preparation order: median imputation if needed,
    /// feature selection (0.95 unless configured), IQR(1.5) outlier
    /// treatment on the selected features, then normalization. Features
    /// that outlier treatment leaves constant are dropped before scaling.
    ///
    /// # Errors
    ///
    /// Propagates the errors of each step.
    pub fn prepare_for_clustering(
        &mut self,
        exclude: &[String],
        normalize_method: NormalizeMethod,
        outlier_action: OutlierAction,
    ) -> Result<PreparedData> {
        let missing = self.analyze_missing()?;
        if missing.is_empty() {
            info!("no missing values");
        } else {
            info!(columns = missing.len(), "missing values found, imputing with median");
            self.handle_missing(ImputeMethod::Median, None)?;
        }

        let mut features = self.select_features(exclude, self.correlation_threshold)?;

        let detected = self.detect_outliers(OutlierMethod::Iqr, Some(&features), DEFAULT_IQR_THRESHOLD)?;
        let total: usize = detected.iter().map(|s| s.count).sum();
        if total > 0 {
            info!(outliers = total, "outliers found");
            self.handle_outliers(OutlierMethod::Iqr, outlier_action, Some(&features), DEFAULT_IQR_THRESHOLD)?;
            features = self.drop_flattened(features)?;
        } else {
            info!("no outliers");
        }

        let (matrix, scaler) = self.normalize(normalize_method, Some(&features))?;
        info!(rows = matrix.n_rows(), features = features.len(), "data prepared for clustering");

        Ok(PreparedData {
            matrix,
            dataset: self.dataset()?.clone(),
            features,
            scaler,
        })
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
#[path = "preprocessor_tests.rs"]
mod tests;
