//! Correlation-driven feature pruning.
//!
//! Columns are scanned in their given order. A column is dropped when any
//! earlier candidate (kept or already dropped) correlates with it above
//! the threshold in absolute value. The result depends on column order and
//! is not a maximum independent set. It is idempotent for a fixed
//! threshold: no two kept columns exceed it.

use crate::error::{ClusterError, Result};
use crate::stats::{self, corr};
use serde::Serialize;

/// Outcome of a pruning pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Selection {
    /// Surviving columns, in input order.
    pub selected: Vec<String>,
    /// Columns without spread (all present values equal, or fewer than two).
    pub constant: Vec<String>,
    /// Columns dropped as redundant, with the earlier column that triggered it.
    pub correlated: Vec<(String, String, f64)>,
}

/// Prunes constant and highly correlated columns.
///
/// # Errors
///
/// Returns an error unless `0 <= threshold <= 1`.
pub fn select_by_correlation(columns: &[(&str, &[Option<f64>])], threshold: f64) -> Result<Selection> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(ClusterError::invalid_param("correlation_threshold", threshold, "in [0, 1]"));
    }

    let mut selection = Selection::default();
    let candidates: Vec<&(&str, &[Option<f64>])> = columns
        .iter()
        .filter(|(name, values)| {
            let constant = is_constant(values);
            if constant {
                selection.constant.push((*name).to_string());
            }
            !constant
        })
        .collect();

    for (j, (name_j, values_j)) in candidates.iter().enumerate() {
        let redundant = candidates[..j].iter().find_map(|(name_i, values_i)| {
            corr(values_i, values_j)
                .filter(|r| r.abs() > threshold)
                .map(|r| ((*name_i).to_string(), r))
        });

        match redundant {
            Some((earlier, r)) => selection.correlated.push(((*name_j).to_string(), earlier, r)),
            None => selection.selected.push((*name_j).to_string()),
        }
    }

    Ok(selection)
}

/// True when fewer than two values are present or all present values are equal.
pub(crate) fn is_constant(values: &[Option<f64>]) -> bool {
    let present = stats::present(values);
    match present.first() {
        None => true,
        Some(first) => present.len() < 2 || present.iter().all(|v| v == first),
    }
}
