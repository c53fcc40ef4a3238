//! Column schema inference and numeric extraction from polars frames

use crate::error::{OdysseyError, Result};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Coarse column type used for validation and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Integer,
    Float,
    Boolean,
    Text,
    Temporal,
    Other,
}

impl ColumnKind {
    pub fn of(dtype: &DataType) -> Self {
        if dtype.is_integer() {
            ColumnKind::Integer
        } else if dtype.is_float() {
            ColumnKind::Float
        } else if dtype.is_bool() {
            ColumnKind::Boolean
        } else if dtype.is_string() {
            ColumnKind::Text
        } else if dtype.is_temporal() {
            ColumnKind::Temporal
        } else {
            ColumnKind::Other
        }
    }

    /// Whether values can be used as model features
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Float | ColumnKind::Boolean)
    }
}

/// One column of a dataset schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub kind: ColumnKind,
    /// Polars dtype as displayed
    pub dtype: String,
    pub null_count: usize,
}

impl ColumnSchema {
    /// Infer the ordered schema of a frame
    pub fn infer(df: &DataFrame) -> Vec<ColumnSchema> {
        df.get_columns()
            .iter()
            .map(|col| ColumnSchema {
                name: col.name().to_string(),
                kind: ColumnKind::of(col.dtype()),
                dtype: col.dtype().to_string(),
                null_count: col.null_count(),
            })
            .collect()
    }
}

/// Extract a numeric column as optional f64 values.
///
/// Nulls and NaNs become `None`. Non-numeric columns are rejected.
pub fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| OdysseyError::InvalidData(format!("column '{}' not found", name)))?;

    if !ColumnKind::of(column.dtype()).is_numeric() {
        return Err(OdysseyError::InvalidData(format!(
            "column '{}' is not numeric (dtype {})",
            name,
            column.dtype()
        )));
    }

    let values = column
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect();
    Ok(values)
}

/// Indices of rows where every listed column holds a value
pub fn complete_rows(columns: &[Vec<Option<f64>>], n_rows: usize) -> Vec<usize> {
    (0..n_rows)
        .filter(|&r| columns.iter().all(|c| c[r].is_some()))
        .collect()
}

/// Build a row-major feature matrix from extracted columns, keeping only `rows`
pub fn to_matrix(columns: &[Vec<Option<f64>>], rows: &[usize]) -> Array2<f64> {
    Array2::from_shape_fn((rows.len(), columns.len()), |(r, c)| {
        columns[c][rows[r]].unwrap_or(f64::NAN)
    })
}
