//! Trained model artifacts: fitted state bundled with the feature schema

use super::algorithm::AlgorithmKind;
use super::models::{Capabilities, Classifier, FittedModel};
use crate::error::{OdysseyError, Result};
use bincode::Options;
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Magic string at the head of every artifact file
pub const ARTIFACT_FORMAT: &str = "odyssey-model";
/// Current envelope version
pub const ARTIFACT_VERSION: u32 = 2;

const MAX_ARTIFACT_BYTES: u64 = 1 << 30;

/// Ordered class labels of a target column. Class code `c` is `labels[c]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassLabels {
    pub labels: Vec<String>,
    /// Numeric value per class when the target column was numeric
    pub numeric: Option<Vec<f64>>,
    /// Target column was boolean; decoded predictions are booleans too
    #[serde(default)]
    pub boolean: bool,
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

impl ClassLabels {
    /// Derive labels from a target column and encode it into class codes.
    /// Numeric targets sort numerically, everything else lexically.
    pub fn fit(column: &Column) -> Result<(Self, Vec<usize>)> {
        let name = column.name().to_string();
        if column.null_count() > 0 {
            return Err(OdysseyError::TrainingConfig(format!(
                "target column '{}' has {} missing values",
                name,
                column.null_count()
            )));
        }

        let dtype = column.dtype();
        if dtype.is_integer() || dtype.is_float() || dtype.is_bool() {
            let values = column.cast(&DataType::Float64)?;
            let values: Vec<f64> = values.f64()?.into_no_null_iter().collect();
            if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
                return Err(OdysseyError::TrainingConfig(format!(
                    "target column '{}' holds non-finite value {}",
                    name, bad
                )));
            }

            let mut distinct = values.clone();
            distinct.sort_by(f64::total_cmp);
            distinct.dedup();

            let codes = values
                .iter()
                .map(|v| distinct.partition_point(|d| d < v))
                .collect();
            let boolean = dtype.is_bool();
            let labels = Self {
                labels: distinct
                    .iter()
                    .map(|&v| if boolean { (v != 0.0).to_string() } else { format_number(v) })
                    .collect(),
                numeric: Some(distinct),
                boolean,
            };
            return Ok((labels, codes));
        }

        let values = column.cast(&DataType::String)?;
        let values: Vec<String> = values
            .str()?
            .into_no_null_iter()
            .map(|s| s.to_string())
            .collect();
        let mut distinct = values.clone();
        distinct.sort();
        distinct.dedup();

        let codes = values
            .iter()
            .map(|v| distinct.partition_point(|d| d < v))
            .collect();
        Ok((
            Self {
                labels: distinct,
                numeric: None,
                boolean: false,
            },
            codes,
        ))
    }

    /// Encode a column with these labels. Values that match no label, and
    /// nulls, come back as `None`.
    pub fn encode(&self, column: &Column) -> Result<Vec<Option<usize>>> {
        match &self.numeric {
            Some(numbers) => {
                let values = column.cast(&DataType::Float64)?;
                Ok(values
                    .f64()?
                    .into_iter()
                    .map(|v| v.and_then(|v| numbers.iter().position(|n| *n == v)))
                    .collect())
            }
            None => {
                let values = column.cast(&DataType::String)?;
                Ok(values
                    .str()?
                    .into_iter()
                    .map(|v| v.and_then(|v| self.labels.iter().position(|l| l == v)))
                    .collect())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn is_binary(&self) -> bool {
        self.labels.len() == 2
    }

    pub fn label(&self, code: usize) -> Option<&str> {
        self.labels.get(code).map(String::as_str)
    }

    /// Column of decoded labels: numeric targets decode back to numbers
    pub fn decode_column(&self, name: &str, codes: &[usize]) -> Column {
        match &self.numeric {
            Some(numbers) if self.boolean => {
                let values: Vec<Option<bool>> =
                    codes.iter().map(|&c| numbers.get(c).map(|v| *v != 0.0)).collect();
                Series::new(name.into(), values).into()
            }
            Some(numbers) if numbers.iter().all(|v| v.fract() == 0.0) => {
                let values: Vec<Option<i64>> =
                    codes.iter().map(|&c| numbers.get(c).map(|v| *v as i64)).collect();
                Series::new(name.into(), values).into()
            }
            Some(numbers) => {
                let values: Vec<Option<f64>> = codes.iter().map(|&c| numbers.get(c).copied()).collect();
                Series::new(name.into(), values).into()
            }
            None => {
                let values: Vec<Option<&str>> = codes.iter().map(|&c| self.label(c)).collect();
                Series::new(name.into(), values).into()
            }
        }
    }
}

/// Context recorded when the artifact was trained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    pub dataset: String,
    pub test_fraction: f64,
    pub seed: u64,
    pub trained_at: DateTime<Utc>,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Identity of a stored artifact: `{algorithm}_{seed}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelId(String);

impl ModelId {
    pub fn new(algorithm: AlgorithmKind, seed: u64) -> Self {
        Self(format!("{}_{}", algorithm.slug(), seed))
    }

    /// Accept an id typed by a user, with or without the `.bin` suffix
    pub fn parse(raw: &str) -> Result<Self> {
        let id = raw.trim();
        let id = id.strip_suffix(".bin").unwrap_or(id);
        if id.is_empty() || id.starts_with('.') || id.contains(['/', '\\']) {
            return Err(OdysseyError::model_load(raw, "not a valid model id"));
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn file_name(&self) -> String {
        format!("{}.bin", self.0)
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A trained classifier with the schema it was trained on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub algorithm: AlgorithmKind,
    pub model: FittedModel,
    /// Feature order fixed at training time
    pub feature_names: Vec<String>,
    pub target_column: String,
    pub class_labels: ClassLabels,
    pub capabilities: Capabilities,
    /// Aligned with `feature_names`; absent when the model has no importance
    pub feature_importance: Option<Vec<f64>>,
    pub metadata: TrainingMetadata,
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    format: &'a str,
    version: u32,
    artifact: &'a ModelArtifact,
}

#[derive(Deserialize)]
struct Header {
    format: String,
    version: u32,
}

#[derive(Deserialize)]
struct Envelope {
    #[allow(dead_code)]
    format: String,
    #[allow(dead_code)]
    version: u32,
    artifact: ModelArtifact,
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new().with_limit(MAX_ARTIFACT_BYTES)
}

impl ModelArtifact {
    pub fn id(&self) -> ModelId {
        ModelId::new(self.algorithm, self.metadata.seed)
    }

    /// Check the schema invariants every usable artifact satisfies
    pub fn validate(&self) -> Result<()> {
        let id = self.id();
        let fail = |reason: String| Err(OdysseyError::model_load(&id, reason));

        if self.feature_names.is_empty() {
            return fail("artifact has no feature names".to_string());
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.feature_names.iter().find(|n| !seen.insert(n.as_str())) {
            return fail(format!("duplicate feature name '{}'", dup));
        }
        if self.feature_names.contains(&self.target_column) {
            return fail(format!("target '{}' is listed as a feature", self.target_column));
        }
        if self.model.kind() != self.algorithm {
            return fail(format!(
                "model state is {} but artifact says {}",
                self.model.kind(),
                self.algorithm
            ));
        }
        if self.model.n_features() != self.feature_names.len() {
            return fail(format!(
                "model expects {} features, schema lists {}",
                self.model.n_features(),
                self.feature_names.len()
            ));
        }
        if self.class_labels.len() < 2 {
            return fail("fewer than two class labels".to_string());
        }
        if let Some(importance) = &self.feature_importance {
            if importance.len() != self.feature_names.len() {
                return fail(format!(
                    "importance has {} entries for {} features",
                    importance.len(),
                    self.feature_names.len()
                ));
            }
        }
        Ok(())
    }

    /// Importance as (feature, value) pairs, if the model has one
    pub fn importance_pairs(&self) -> Option<Vec<(String, f64)>> {
        let values = self.feature_importance.as_ref()?;
        Some(self.feature_names.iter().cloned().zip(values.iter().copied()).collect())
    }

    /// Serialize into the versioned envelope
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let envelope = EnvelopeRef {
            format: ARTIFACT_FORMAT,
            version: ARTIFACT_VERSION,
            artifact: self,
        };
        Ok(codec().serialize(&envelope)?)
    }

    /// Decode and validate an envelope. Every failure is a `ModelLoad` error.
    pub fn from_bytes(id: &ModelId, bytes: &[u8]) -> Result<Self> {
        let header: Header = codec()
            .allow_trailing_bytes()
            .deserialize(bytes)
            .map_err(|e| OdysseyError::model_load(id, format!("unreadable header: {}", e)))?;
        if header.format != ARTIFACT_FORMAT {
            return Err(OdysseyError::model_load(id, format!("unknown format '{}'", header.format)));
        }
        if header.version != ARTIFACT_VERSION {
            return Err(OdysseyError::model_load(
                id,
                format!("unsupported artifact version {} (expected {})", header.version, ARTIFACT_VERSION),
            ));
        }

        let envelope: Envelope = codec()
            .deserialize(bytes)
            .map_err(|e| OdysseyError::model_load(id, format!("corrupt artifact: {}", e)))?;
        envelope.artifact.validate()?;
        Ok(envelope.artifact)
    }
}
