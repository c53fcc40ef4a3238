//! Tabular datasets and their on-disk store
//!
//! Datasets are CSV files in a single directory. Logical names are
//! normalized (lower-cased, whitespace replaced by underscores, `.csv`
//! suffix enforced) and persisted rows are never rewritten in place unless
//! an overwrite is requested.

mod samples;
mod schema;
mod store;

pub use samples::SampleDataset;
pub use schema::{complete_rows, numeric_column, to_matrix, ColumnKind, ColumnSchema};
pub use store::{normalize_name, DatasetRef, DatasetStore, SaveMode};

use polars::prelude::*;

/// A loaded dataset: name, rows and inferred schema
#[derive(Debug, Clone)]
pub struct Dataset {
    name: String,
    frame: DataFrame,
    schema: Vec<ColumnSchema>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, frame: DataFrame) -> Self {
        let schema = ColumnSchema::infer(&frame);
        Self {
            name: name.into(),
            frame,
            schema,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Ordered column schema
    pub fn columns(&self) -> &[ColumnSchema] {
        &self.schema
    }

    pub fn row_count(&self) -> usize {
        self.frame.height()
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        self.frame.shape()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.schema.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.schema.iter().map(|c| c.name.clone()).collect()
    }

    /// First `n` rows
    pub fn head(&self, n: usize) -> DataFrame {
        self.frame.head(Some(n))
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }
}
