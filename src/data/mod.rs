//! `Dataset` module for named column containers.
//!
//! A `Dataset` is an ordered table of named columns. Each column is either
//! numeric or categorical, and any cell may be missing. Column kinds are
//! decided once at load time: a column is numeric when every non-missing
//! cell parses as `f64`.

use crate::error::{ClusterError, Result};
use crate::primitives::Matrix;
use serde::Serialize;
use std::io::Read;
use std::path::Path;

/// Cell tokens treated as missing when reading delimited files.
pub const MISSING_TOKENS: [&str; 7] = ["", "NA", "N/A", "NaN", "nan", "null", "None"];

/// Kind of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    /// Every present cell is a number.
    Numeric,
    /// Free-form text cells.
    Categorical,
}

/// Column storage. `None` marks a missing cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Numeric values.
    Numeric(Vec<Option<f64>>),
    /// Text values.
    Categorical(Vec<Option<String>>),
}

impl Column {
    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(v) => v.len(),
            Self::Categorical(v) => v.len(),
        }
    }

    /// Returns true if the column has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn kind(&self) -> ColumnKind {
        match self {
            Self::Numeric(_) => ColumnKind::Numeric,
            Self::Categorical(_) => ColumnKind::Categorical,
        }
    }

    /// Returns true if the cell at `row` is missing.
    #[must_use]
    pub fn is_missing(&self, row: usize) -> bool {
        match self {
            Self::Numeric(v) => v[row].is_none(),
            Self::Categorical(v) => v[row].is_none(),
        }
    }

    /// Number of missing cells.
    #[must_use]
    pub fn missing_count(&self) -> usize {
        match self {
            Self::Numeric(v) => v.iter().filter(|c| c.is_none()).count(),
            Self::Categorical(v) => v.iter().filter(|c| c.is_none()).count(),
        }
    }

    /// Cell rendered as text, `None` if missing.
    ///
    /// Whole numbers render without a fractional part so that numeric
    /// identifiers such as plate codes read naturally.
    #[must_use]
    pub fn display(&self, row: usize) -> Option<String> {
        match self {
            Self::Numeric(v) => v[row].map(|x| {
                if x.fract() == 0.0 && x.abs() < 1e15 {
                    format!("{}", x as i64)
                } else {
                    x.to_string()
                }
            }),
            Self::Categorical(v) => v[row].clone(),
        }
    }

    /// Keeps only the given rows, in the given order.
    #[must_use]
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        match self {
            Self::Numeric(v) => Self::Numeric(indices.iter().map(|&i| v[i]).collect()),
            Self::Categorical(v) => {
                Self::Categorical(indices.iter().map(|&i| v[i].clone()).collect())
            }
        }
    }

    fn memory_usage(&self) -> usize {
        match self {
            Self::Numeric(v) => v.len() * std::mem::size_of::<Option<f64>>(),
            Self::Categorical(v) => v
                .iter()
                .map(|c| std::mem::size_of::<Option<String>>() + c.as_ref().map_or(0, String::len))
                .sum(),
        }
    }
}

/// An ordered table of named columns with missing cells.
///
/// # Examples
///
/// ```
/// use provclust::data::{Column, Dataset};
///
/// let ds = Dataset::new(vec![
///     ("il_adi".to_string(), Column::Categorical(vec![Some("Ankara".into()), Some("Izmir".into())])),
///     ("nufus".to_string(), Column::Numeric(vec![Some(5.7), None])),
/// ]).expect("columns are consistent");
/// assert_eq!(ds.shape(), (2, 2));
/// assert_eq!(ds.missing_count(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<(String, Column)>,
    n_rows: usize,
}

impl Dataset {
    /// Creates a new `Dataset` from named columns.
    ///
    /// # Errors
    ///
    /// Returns an error if columns have different lengths, a name is empty
    /// or duplicated, or no columns are given.
    pub fn new(columns: Vec<(String, Column)>) -> Result<Self> {
        if columns.is_empty() {
            return Err(ClusterError::validation("dataset must have at least one column"));
        }

        let n_rows = columns[0].1.len();

        for (name, col) in &columns {
            if col.len() != n_rows {
                return Err(ClusterError::validation(format!(
                    "column '{name}' has {} rows, expected {n_rows}",
                    col.len()
                )));
            }
            if name.is_empty() {
                return Err(ClusterError::validation("column names cannot be empty"));
            }
        }

        let mut names: Vec<&str> = columns.iter().map(|(n, _)| n.as_str()).collect();
        names.sort_unstable();
        for pair in names.windows(2) {
            if pair[0] == pair[1] {
                return Err(ClusterError::validation(format!(
                    "duplicate column name '{}'",
                    pair[0]
                )));
            }
        }

        Ok(Self { columns, n_rows })
    }

    /// Reads a delimited file with a header row.
    ///
    /// # Errors
    ///
    /// Returns an I/O kind error if the file is missing, unreadable or has
    /// rows whose field count differs from the header.
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self> {
        let reader = csv::Reader::from_path(path.as_ref())?;
        Self::from_csv_reader(reader)
    }

    /// Reads delimited data with a header row from any reader.
    ///
    /// # Errors
    ///
    /// Same as [`Dataset::from_csv`].
    pub fn from_reader<R: Read>(rdr: R) -> Result<Self> {
        Self::from_csv_reader(csv::Reader::from_reader(rdr))
    }

    fn from_csv_reader<R: Read>(mut reader: csv::Reader<R>) -> Result<Self> {
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut raw: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
        for record in reader.records() {
            let record = record?;
            for (cells, field) in raw.iter_mut().zip(record.iter()) {
                let field = field.trim();
                if MISSING_TOKENS.contains(&field) {
                    cells.push(None);
                } else {
                    cells.push(Some(field.to_string()));
                }
            }
        }

        let columns = headers
            .into_iter()
            .zip(raw)
            .map(|(name, cells)| (name, classify(cells)))
            .collect();

        Self::new(columns)
    }

    /// Returns the shape as (`n_rows`, `n_cols`).
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.columns.len())
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Returns the column names.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Names of numeric columns, in column order.
    #[must_use]
    pub fn numeric_columns(&self) -> Vec<String> {
        self.names_of(ColumnKind::Numeric)
    }

    /// Names of categorical columns, in column order.
    #[must_use]
    pub fn categorical_columns(&self) -> Vec<String> {
        self.names_of(ColumnKind::Categorical)
    }

    fn names_of(&self, kind: ColumnKind) -> Vec<String> {
        self.columns
            .iter()
            .filter(|(_, c)| c.kind() == kind)
            .map(|(n, _)| n.clone())
            .collect()
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    /// Returns a reference to a column by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the column doesn't exist.
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
            .ok_or_else(|| ClusterError::unknown_column(name))
    }

    /// Returns the cells of a numeric column.
    ///
    /// # Errors
    ///
    /// Returns an error if the column doesn't exist or is categorical.
    pub fn numeric(&self, name: &str) -> Result<&[Option<f64>]> {
        match self.column(name)? {
            Column::Numeric(v) => Ok(v),
            Column::Categorical(_) => Err(ClusterError::validation(format!(
                "column '{name}' is not numeric"
            ))),
        }
    }

    /// Replaces the contents of an existing column.
    ///
    /// # Errors
    ///
    /// Returns an error if the column doesn't exist or the length differs.
    pub fn replace_column(&mut self, name: &str, column: Column) -> Result<()> {
        if column.len() != self.n_rows {
            return Err(ClusterError::dimension_mismatch(
                "column length",
                self.n_rows,
                column.len(),
            ));
        }
        let slot = self
            .columns
            .iter_mut()
            .find(|(n, _)| n == name)
            .ok_or_else(|| ClusterError::unknown_column(name))?;
        slot.1 = column;
        Ok(())
    }

    /// Returns an iterator over columns as (name, column) pairs.
    pub fn iter_columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.columns.iter().map(|(n, c)| (n.as_str(), c))
    }

    /// Returns a new dataset holding only the given rows, in the given order.
    #[must_use]
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            columns: self
                .columns
                .iter()
                .map(|(n, c)| (n.clone(), c.select_rows(indices)))
                .collect(),
            n_rows: indices.len(),
        }
    }

    /// Keeps the rows for which `keep` is true.
    ///
    /// # Panics
    ///
    /// Panics if `keep` is shorter than the row count.
    #[must_use]
    pub fn filter_rows(&self, keep: &[bool]) -> Self {
        let indices: Vec<usize> = (0..self.n_rows).filter(|&i| keep[i]).collect();
        self.select_rows(&indices)
    }

    /// Total number of missing cells.
    #[must_use]
    pub fn missing_count(&self) -> usize {
        self.columns.iter().map(|(_, c)| c.missing_count()).sum()
    }

    /// Estimated memory footprint of the cell storage in bytes.
    #[must_use]
    pub fn memory_usage(&self) -> usize {
        self.columns
            .iter()
            .map(|(n, c)| n.len() + c.memory_usage())
            .sum()
    }

    /// Builds a dense matrix from the named numeric columns.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unknown or categorical columns and a
    /// state error when a cell is missing.
    pub fn to_matrix(&self, names: &[String]) -> Result<Matrix<f64>> {
        let cols: Vec<&[Option<f64>]> = names
            .iter()
            .map(|n| self.numeric(n))
            .collect::<Result<_>>()?;

        let mut data = Vec::with_capacity(self.n_rows * cols.len());
        for row in 0..self.n_rows {
            for (name, col) in names.iter().zip(&cols) {
                let value = col[row].ok_or_else(|| {
                    ClusterError::state(format!(
                        "column '{name}' has missing values; impute before building the feature matrix"
                    ))
                })?;
                data.push(value);
            }
        }

        Matrix::from_vec(self.n_rows, cols.len(), data)
    }
}

/// Decides the kind of a freshly read column.
fn classify(cells: Vec<Option<String>>) -> Column {
    let parsed: Option<Vec<Option<f64>>> = cells
        .iter()
        .map(|c| match c {
            None => Some(None),
            Some(s) => s.parse::<f64>().ok().map(Some),
        })
        .collect();

    match parsed {
        Some(values) => Column::Numeric(values),
        None => Column::Categorical(cells),
    }
}

#[cfg(test)]
#[path = "data_tests.rs"]
mod tests;
