//! Outlier detection and treatment for numeric columns.
//!
//! Both rules reduce to an interval: values strictly outside it are
//! outliers.
//!
//! - `ZScore`: `mean ± t·σ` with the population standard deviation, which
//!   is exactly the set where `|z| > t`
//! - `Iqr`: `[Q1 − t·IQR, Q3 + t·IQR]` with R-7 quartiles

use crate::error::{ClusterError, Result};
use crate::stats::{self, DescriptiveStats};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default tail fraction for winsorizing.
pub const DEFAULT_WINSOR_LIMIT: f64 = 0.05;

/// Rule used to derive outlier bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutlierMethod {
    ZScore,
    #[default]
    Iqr,
}

impl fmt::Display for OutlierMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZScore => f.write_str("zscore"),
            Self::Iqr => f.write_str("iqr"),
        }
    }
}

impl FromStr for OutlierMethod {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zscore" | "z-score" | "z_score" => Ok(Self::ZScore),
            "iqr" => Ok(Self::Iqr),
            _ => Err(ClusterError::unknown_method("outlier method", s, &["zscore", "iqr"])),
        }
    }
}

/// What to do with detected outliers.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OutlierAction {
    /// Clip values to the bounds.
    #[default]
    Clip,
    /// Drop rows with a value outside the bounds.
    Remove,
    /// Cap the lowest and highest `limit` fraction at the next order statistic.
    Winsorize {
        /// Fraction capped on each tail.
        limit: f64,
    },
}

impl OutlierAction {
    const NAMES: [&'static str; 3] = ["clip", "remove", "winsorize"];
}

impl fmt::Display for OutlierAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clip => f.write_str("clip"),
            Self::Remove => f.write_str("remove"),
            Self::Winsorize { .. } => f.write_str("winsorize"),
        }
    }
}

impl FromStr for OutlierAction {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clip" => Ok(Self::Clip),
            "remove" => Ok(Self::Remove),
            "winsorize" => Ok(Self::Winsorize {
                limit: DEFAULT_WINSOR_LIMIT,
            }),
            _ => Err(ClusterError::unknown_method("outlier action", s, &Self::NAMES)),
        }
    }
}

impl TryFrom<String> for OutlierAction {
    type Error = ClusterError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<OutlierAction> for String {
    fn from(value: OutlierAction) -> Self {
        value.to_string()
    }
}

/// Closed interval of accepted values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    /// Bounds of the present values of a column, `None` if none are present.
    ///
    /// # Errors
    ///
    /// Returns an error if `threshold` is negative or not finite.
    pub fn compute(values: &[Option<f64>], method: OutlierMethod, threshold: f64) -> Result<Option<Self>> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ClusterError::invalid_param("threshold", threshold, ">= 0"));
        }
        let present = stats::present(values);
        if present.is_empty() {
            return Ok(None);
        }

        let bounds = match method {
            OutlierMethod::Iqr => {
                let summary = DescriptiveStats::new(&present).five_number_summary()?;
                let iqr = summary.q3 - summary.q1;
                Self {
                    lower: summary.q1 - threshold * iqr,
                    upper: summary.q3 + threshold * iqr,
                }
            }
            // Zero spread flags nothing.
            OutlierMethod::ZScore => {
                let mean = stats::mean(&present).unwrap_or(0.0);
                let std = stats::std_dev(&present, 0).unwrap_or(0.0);
                if std > 1e-12 * mean.abs().max(1.0) {
                    Self {
                        lower: mean - threshold * std,
                        upper: mean + threshold * std,
                    }
                } else {
                    Self {
                        lower: f64::NEG_INFINITY,
                        upper: f64::INFINITY,
                    }
                }
            }
        };
        Ok(Some(bounds))
    }

    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    #[must_use]
    pub fn clip(&self, value: f64) -> f64 {
        value.max(self.lower).min(self.upper)
    }
}

/// Outlier summary for one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierStat {
    pub column: String,
    pub count: usize,
    /// Share of all rows, in percent.
    pub percentage: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub bounds: Bounds,
}

/// Counts the outliers of a column. `None` if it has no present values.
///
/// # Errors
///
/// Returns an error if `threshold` is invalid.
pub fn detect(name: &str, values: &[Option<f64>], method: OutlierMethod, threshold: f64) -> Result<Option<OutlierStat>> {
    let Some(bounds) = Bounds::compute(values, method, threshold)? else {
        return Ok(None);
    };
    let present = stats::present(values);
    let count = present.iter().filter(|&&v| !bounds.contains(v)).count();

    Ok(Some(OutlierStat {
        column: name.to_string(),
        count,
        percentage: count as f64 / values.len() as f64 * 100.0,
        min: present.iter().copied().fold(f64::INFINITY, f64::min),
        max: present.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        mean: stats::mean(&present).unwrap_or(f64::NAN),
        median: stats::median(&present).unwrap_or(f64::NAN),
        bounds,
    }))
}

/// Clips every present value to `bounds`.
#[must_use]
pub fn clip(values: &[Option<f64>], bounds: Bounds) -> Vec<Option<f64>> {
    values.iter().map(|v| v.map(|x| bounds.clip(x))).collect()
}

/// Winsorizes the present values of a column.
///
/// With `n` present values and `k = ⌊limit·n⌋`, the `k` smallest values
/// become the `(k+1)`-th smallest and the `k` largest become the
/// `(k+1)`-th largest. Missing cells stay missing.
///
/// # Errors
///
/// Returns an error unless `0 <= limit < 0.5`.
pub fn winsorize(values: &[Option<f64>], limit: f64) -> Result<Vec<Option<f64>>> {
    if !(0.0..0.5).contains(&limit) {
        return Err(ClusterError::invalid_param("winsorize limit", limit, "in [0, 0.5)"));
    }

    let mut order: Vec<usize> = (0..values.len()).filter(|&i| values[i].is_some()).collect();
    let n = order.len();
    let k = (limit * n as f64).floor() as usize;
    let mut out = values.to_vec();
    if k == 0 {
        return Ok(out);
    }

    order.sort_by(|&a, &b| {
        let (a, b) = (values[a].unwrap_or(0.0), values[b].unwrap_or(0.0));
        a.total_cmp(&b)
    });

    let low = values[order[k]];
    let high = values[order[n - k - 1]];
    for &i in &order[..k] {
        out[i] = low;
    }
    for &i in &order[n - k..] {
        out[i] = high;
    }
    Ok(out)
}
