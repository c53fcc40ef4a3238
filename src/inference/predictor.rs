//! Schema-checked batch prediction with a stored model
//!
//! Features:
//! - Validation of input columns against the artifact's feature order
//! - Batched prediction, parallel via rayon for large inputs
//! - Optional class probabilities
//! - Output frame with an appended `Predictions` column

use super::config::PredictorConfig;
use crate::data::numeric_column;
use crate::error::{OdysseyError, Result};
use crate::training::{Classifier, ModelArtifact};
use crate::utils;
use ndarray::{concatenate, s, Array1, Array2, Axis};
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Name of the column appended to the input rows
pub const PREDICTIONS_COLUMN: &str = "Predictions";

/// Predictions for every input row, in input order
#[derive(Debug, Clone)]
pub struct PredictionResult {
    pub model_id: String,
    /// Predicted class label per row
    pub labels: Vec<String>,
    /// Predicted class code per row
    pub codes: Vec<usize>,
    /// One column per class, when the model has probabilities
    pub probabilities: Option<Array2<f64>>,
    /// Input rows plus the `Predictions` column
    pub frame: DataFrame,
    pub class_labels: Vec<String>,
    pub elapsed_secs: f64,
}

/// Aggregate view of a prediction run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSummary {
    pub model_id: String,
    pub rows: usize,
    /// Predicted rows per class, in class order
    pub class_counts: Vec<(String, usize)>,
    /// Mean probability of the predicted class
    pub mean_confidence: Option<f64>,
    pub elapsed_secs: f64,
}

impl PredictionResult {
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn summary(&self) -> PredictionSummary {
        let mut counts = vec![0usize; self.class_labels.len()];
        for &c in &self.codes {
            if let Some(n) = counts.get_mut(c) {
                *n += 1;
            }
        }

        let mean_confidence = self.probabilities.as_ref().filter(|p| p.nrows() > 0).map(|p| {
            let total: f64 = self
                .codes
                .iter()
                .enumerate()
                .map(|(i, &c)| p.get((i, c)).copied().unwrap_or(0.0))
                .sum();
            total / p.nrows() as f64
        });

        PredictionSummary {
            model_id: self.model_id.clone(),
            rows: self.codes.len(),
            class_counts: self.class_labels.iter().cloned().zip(counts).collect(),
            mean_confidence,
            elapsed_secs: self.elapsed_secs,
        }
    }

    /// Write the augmented rows as CSV
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut frame = self.frame.clone();
        let bytes = utils::to_csv_bytes(&mut frame)?;
        utils::write_atomic(path, &bytes)?;
        info!(path = %path.display(), rows = frame.height(), "predictions written");
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Predictor {
    config: PredictorConfig,
}

impl Predictor {
    pub fn new(config: PredictorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    /// Predict every row of `rows` with `artifact`.
    ///
    /// Columns are matched by name and reordered to the artifact's feature
    /// order; extra columns are ignored. Any missing feature fails the whole
    /// call with [`OdysseyError::SchemaMismatch`].
    #[tracing::instrument(skip_all, fields(model = %artifact.id(), rows = rows.height()))]
    pub fn predict(&self, artifact: &ModelArtifact, rows: &DataFrame) -> Result<PredictionResult> {
        let start = Instant::now();
        let x = feature_matrix(artifact, rows)?;
        let n_classes = artifact.class_labels.len();
        let wants_proba = self.config.output_probabilities && artifact.capabilities.probability;

        if x.nrows() == 0 {
            let mut frame = rows.clone();
            frame.with_column(artifact.class_labels.decode_column(PREDICTIONS_COLUMN, &[]))?;
            debug!("no rows to predict");
            return Ok(PredictionResult {
                model_id: artifact.id().to_string(),
                labels: Vec::new(),
                codes: Vec::new(),
                probabilities: wants_proba.then(|| Array2::zeros((0, n_classes))),
                frame,
                class_labels: artifact.class_labels.labels.clone(),
                elapsed_secs: start.elapsed().as_secs_f64(),
            });
        }

        let predictions = self.run_batched(&x, |batch| artifact.model.predict(batch))?;
        let codes = predictions
            .iter()
            .map(|&p| {
                let code = p as usize;
                if p >= 0.0 && code < n_classes {
                    Ok(code)
                } else {
                    Err(OdysseyError::Computation(format!("model predicted unknown class code {}", p)))
                }
            })
            .collect::<Result<Vec<usize>>>()?;

        let probabilities = if wants_proba {
            let proba = self.run_batched(&x, |batch| {
                artifact
                    .model
                    .predict_proba(batch)
                    .unwrap_or_else(|| Err(OdysseyError::Computation("model has no probabilities".to_string())))
            })?;
            Some(proba)
        } else {
            None
        };

        let labels: Vec<String> = codes
            .iter()
            .map(|&c| artifact.class_labels.label(c).unwrap_or_default().to_string())
            .collect();

        let mut frame = rows.clone();
        frame.with_column(artifact.class_labels.decode_column(PREDICTIONS_COLUMN, &codes))?;

        let elapsed_secs = start.elapsed().as_secs_f64();
        info!(rows = codes.len(), elapsed_secs, "predictions computed");
        Ok(PredictionResult {
            model_id: artifact.id().to_string(),
            labels,
            codes,
            probabilities,
            frame,
            class_labels: artifact.class_labels.labels.clone(),
            elapsed_secs,
        })
    }

    /// Apply `f` to row batches and stack the outputs in order
    fn run_batched<T, F>(&self, x: &Array2<f64>, f: F) -> Result<T>
    where
        T: Stack,
        F: Fn(&Array2<f64>) -> Result<T> + Sync,
        T: Send,
    {
        let n_rows = x.nrows();
        let batch_size = self.config.batch_size.max(1);
        if n_rows <= batch_size {
            return f(x);
        }

        let batches: Vec<Array2<f64>> = (0..n_rows)
            .step_by(batch_size)
            .map(|start| x.slice(s![start..(start + batch_size).min(n_rows), ..]).to_owned())
            .collect();

        let n_workers = self.config.n_workers.unwrap_or_else(rayon::current_num_threads);
        let outputs = if n_workers > 1 && n_rows > batch_size * 2 {
            debug!(batches = batches.len(), "parallel batch prediction");
            let run = || batches.par_iter().map(&f).collect::<Result<Vec<T>>>();
            match self.config.n_workers {
                Some(n) => rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| OdysseyError::Computation(format!("thread pool error: {}", e)))?
                    .install(run)?,
                None => run()?,
            }
        } else {
            batches.iter().map(&f).collect::<Result<Vec<T>>>()?
        };
        T::stack(outputs)
    }
}

/// Predict with default settings
pub fn predict(artifact: &ModelArtifact, rows: &DataFrame) -> Result<PredictionResult> {
    Predictor::default().predict(artifact, rows)
}

/// Feature matrix in the artifact's column order
fn feature_matrix(artifact: &ModelArtifact, rows: &DataFrame) -> Result<Array2<f64>> {
    let present: Vec<String> = rows.get_column_names().iter().map(|n| n.to_string()).collect();
    let missing: Vec<String> = artifact
        .feature_names
        .iter()
        .filter(|n| !present.contains(n))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(OdysseyError::SchemaMismatch { missing });
    }

    let columns = artifact
        .feature_names
        .iter()
        .map(|name| numeric_column(rows, name))
        .collect::<Result<Vec<_>>>()?;

    let incomplete: Vec<String> = artifact
        .feature_names
        .iter()
        .zip(&columns)
        .filter_map(|(name, values)| {
            let missing = values.iter().filter(|v| v.is_none()).count();
            (missing > 0).then(|| format!("{} ({} missing)", name, missing))
        })
        .collect();
    if !incomplete.is_empty() {
        return Err(OdysseyError::InvalidData(format!(
            "feature columns contain missing values: {}",
            incomplete.join(", ")
        )));
    }

    Ok(Array2::from_shape_fn((rows.height(), columns.len()), |(r, c)| {
        columns[c][r].unwrap_or(f64::NAN)
    }))
}

/// Row-wise concatenation of batch outputs
trait Stack: Sized {
    fn stack(parts: Vec<Self>) -> Result<Self>;
}

impl Stack for Array1<f64> {
    fn stack(parts: Vec<Self>) -> Result<Self> {
        Ok(parts.into_iter().flatten().collect())
    }
}

impl Stack for Array2<f64> {
    fn stack(parts: Vec<Self>) -> Result<Self> {
        let views: Vec<_> = parts.iter().map(|p| p.view()).collect();
        Ok(concatenate(Axis(0), &views)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dataset;
    use crate::training::{train, AlgorithmKind};

    fn artifact() -> ModelArtifact {
        let a: Vec<f64> = (0..60).map(|i| i as f64).collect();
        let b: Vec<f64> = (0..60).map(|i| ((i * 5) % 11) as f64).collect();
        let y: Vec<&str> = (0..60).map(|i| if i < 30 { "low" } else { "high" }).collect();
        let dataset = Dataset::new("toy", df!("A" => a, "B" => b, "y" => y).unwrap());
        train(&dataset, "y", AlgorithmKind::RandomForest, 0.2, 42).unwrap().1
    }

    #[test]
    fn test_reorders_columns_and_appends_predictions() {
        let artifact = artifact();
        let rows = df!(
            "extra" => &["x", "y", "z"],
            "B" => &[1.0, 2.0, 3.0],
            "A" => &[1.0, 30.0, 58.0]
        )
        .unwrap();

        let result = predict(&artifact, &rows).unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result.frame.width(), 4);
        assert_eq!(result.frame.get_column_names().last().unwrap().as_str(), PREDICTIONS_COLUMN);
        assert_eq!(result.labels[0], "low");
        assert_eq!(result.labels[2], "high");
        assert_eq!(result.probabilities.as_ref().unwrap().shape(), &[3, 2]);
    }

    #[test]
    fn test_missing_features_fail_without_predictions() {
        let artifact = artifact();
        let rows = df!("A" => &[1.0]).unwrap();
        match predict(&artifact, &rows) {
            Err(OdysseyError::SchemaMismatch { missing }) => assert_eq!(missing, vec!["B".to_string()]),
            other => panic!("expected schema mismatch, got {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn test_zero_rows_give_empty_result() {
        let artifact = artifact();
        let rows = df!("A" => Vec::<f64>::new(), "B" => Vec::<f64>::new()).unwrap();

        let result = predict(&artifact, &rows).unwrap();
        assert!(result.is_empty());
        assert!(result.labels.is_empty());
        assert_eq!(result.frame.height(), 0);
        assert_eq!(result.frame.get_column_names().last().unwrap().as_str(), PREDICTIONS_COLUMN);
        assert_eq!(result.probabilities.as_ref().unwrap().shape(), &[0, 2]);

        let summary = result.summary();
        assert_eq!(summary.rows, 0);
        assert_eq!(summary.mean_confidence, None);
    }

    #[test]
    fn test_null_features_rejected() {
        let artifact = artifact();
        let rows = df!("A" => &[Some(1.0), None], "B" => &[Some(1.0), Some(2.0)]).unwrap();
        assert!(matches!(predict(&artifact, &rows), Err(OdysseyError::InvalidData(_))));
    }

    #[test]
    fn test_batched_matches_single_call() {
        let artifact = artifact();
        let a: Vec<f64> = (0..250).map(|i| (i % 60) as f64).collect();
        let b: Vec<f64> = (0..250).map(|i| (i % 11) as f64).collect();
        let rows = df!("A" => a, "B" => b).unwrap();

        let whole = predict(&artifact, &rows).unwrap();
        let batched = Predictor::new(PredictorConfig::default().with_batch_size(16))
            .predict(&artifact, &rows)
            .unwrap();
        assert_eq!(whole.codes, batched.codes);
        assert_eq!(whole.probabilities, batched.probabilities);
    }

    #[test]
    fn test_summary_and_csv_export() {
        let artifact = artifact();
        let rows = df!("A" => &[1.0, 2.0, 55.0], "B" => &[0.0, 0.0, 0.0]).unwrap();
        let result = predict(&artifact, &rows).unwrap();

        let summary = result.summary();
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.class_counts.iter().map(|(_, n)| n).sum::<usize>(), 3);
        let confidence = summary.mean_confidence.unwrap();
        assert!((0.0..=1.0).contains(&confidence));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        result.write_csv(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.lines().next().unwrap().ends_with("Predictions"));
        assert_eq!(written.lines().count(), 4);
    }
}
