//! # Deprivation Table Loading and Validation
//!
//! This module is the entry point for user-provided observation data. It reads a
//! delimited file with a header row, checks that every indicator named by the
//! analysis is present, and validates that each indicator column is a complete,
//! binary (0 = not deprived, 1 = deprived) numeric column.
//!
//! - The full table is kept as a `polars` `DataFrame` so that the scored output can
//!   reproduce every input column, identifiers included.
//! - The indicator columns are copied into a dense `ndarray` matrix in the canonical
//!   indicator order, which is what the scoring core works on.
//! - Failures are assumed to be user-input errors and carry enough context (column,
//!   row, value) to be fixed directly in the source file.

use crate::types::Dimensions;
use itertools::Itertools;
use log::{debug, info};
use ndarray::Array2;
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error(
        "The indicator column '{column_name}' could not be converted to the expected type '{expected_type}'. (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        expected_type: &'static str,
        found_type: String,
    },
    #[error(
        "Missing or null values were found in the indicator column '{0}'. Every observation needs a value for every indicator."
    )]
    MissingValuesFound(String),
    #[error("Non-finite values (NaN or Infinity) were found in the indicator column '{0}'.")]
    NonFiniteValuesFound(String),
    #[error(
        "Indicator column '{column}' has value {value} at row {row}; deprivation indicators must be 0 or 1."
    )]
    NonBinaryValue {
        column: String,
        row: usize,
        value: f64,
    },
}

/// Options controlling how the input file is parsed.
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    pub separator: u8,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self { separator: b',' }
    }
}

/// A validated observation table.
#[derive(Debug, Clone)]
pub struct DeprivationTable {
    /// Every column of the input, in input order.
    pub frame: DataFrame,
    /// Indicator names in canonical order; matches the columns of `matrix`.
    pub indicators: Vec<String>,
    /// Indicator values, shape `[num_observations, num_indicators]`.
    pub matrix: Array2<f64>,
}

impl DeprivationTable {
    pub fn num_observations(&self) -> usize {
        self.matrix.nrows()
    }

    /// Builds a table from an in-memory frame, applying the same validation as
    /// file loading.
    pub fn from_frame(frame: DataFrame, dimensions: &Dimensions) -> Result<Self, DataError> {
        let columns_set: HashSet<String> = frame
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();

        let indicators: Vec<String> = dimensions
            .all_indicators()
            .into_iter()
            .map(str::to_string)
            .collect();

        let missing: Vec<String> = indicators
            .iter()
            .filter(|ind| !columns_set.contains(*ind))
            .cloned()
            .sorted()
            .collect();
        if !missing.is_empty() {
            return Err(DataError::MissingColumns(missing));
        }

        let n = frame.height();
        let mut matrix = Array2::<f64>::zeros((n, indicators.len()));
        for (j, name) in indicators.iter().enumerate() {
            let values = extract_indicator_column(&frame, name)?;
            for (i, v) in values.into_iter().enumerate() {
                matrix[[i, j]] = v;
            }
        }

        debug!(
            "Validated {} indicator columns over {} observations.",
            indicators.len(),
            n
        );

        Ok(Self {
            frame,
            indicators,
            matrix,
        })
    }
}

/// Reads and validates the observation table at `path`.
pub fn load_deprivation_table(
    path: &Path,
    dimensions: &Dimensions,
    options: ReadOptions,
) -> Result<DeprivationTable, DataError> {
    info!("Loading data from '{}'", path.display());

    let frame = CsvReader::new(File::open(path)?)
        .with_options(
            CsvReadOptions::default()
                .with_has_header(true)
                .with_parse_options(CsvParseOptions::default().with_separator(options.separator)),
        )
        .finish()?;

    info!(
        "Loaded {} rows and {} columns.",
        frame.height(),
        frame.width()
    );

    DeprivationTable::from_frame(frame, dimensions)
}

/// Pulls one indicator column out as `f64`, enforcing completeness and binariness.
fn extract_indicator_column(df: &DataFrame, column_name: &str) -> Result<Vec<f64>, DataError> {
    let series = df.column(column_name)?;
    if series.null_count() > 0 {
        return Err(DataError::MissingValuesFound(column_name.to_string()));
    }

    let casted = match series.cast(&DataType::Float64) {
        Ok(casted) => casted,
        Err(_) => {
            return Err(DataError::ColumnWrongType {
                column_name: column_name.to_string(),
                expected_type: "f64 (numeric)",
                found_type: format!("{:?}", series.dtype()),
            });
        }
    };

    // A non-numeric string column casts "successfully" to all nulls.
    if casted.null_count() > 0 {
        return Err(DataError::ColumnWrongType {
            column_name: column_name.to_string(),
            expected_type: "f64 (numeric)",
            found_type: format!("{:?}", series.dtype()),
        });
    }

    let chunked = casted.f64()?.rechunk();
    let values: Vec<f64> = chunked.into_no_null_iter().collect();

    if values.iter().any(|v| !v.is_finite()) {
        return Err(DataError::NonFiniteValuesFound(column_name.to_string()));
    }
    if let Some((row, &value)) = values
        .iter()
        .enumerate()
        .find(|&(_, &v)| v != 0.0 && v != 1.0)
    {
        return Err(DataError::NonBinaryValue {
            column: column_name.to_string(),
            row: row + 1,
            value,
        });
    }

    Ok(values)
}
