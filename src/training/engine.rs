//! Training engine: validation, seeded split, fitting and evaluation

use super::algorithm::AlgorithmKind;
use super::artifact::{ClassLabels, ModelArtifact, TrainingMetadata};
use super::metrics::{ClassificationMetrics, ConfusionMatrix};
use super::models::{Classifier, FittedModel};
use crate::config::TrainingConfig;
use crate::data::{numeric_column, to_matrix, Dataset};
use crate::error::{OdysseyError, Result};
use chrono::Utc;
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of one training invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRun {
    pub algorithm: AlgorithmKind,
    pub dataset: String,
    pub target_column: String,
    pub feature_names: Vec<String>,
    /// Evaluated on the held-out test split
    pub metrics: ClassificationMetrics,
    /// Aligned with `feature_names`
    pub feature_importance: Option<Vec<f64>>,
    pub train_rows: usize,
    pub test_rows: usize,
    pub training_time_secs: f64,
    /// Non-fatal conditions noticed during training
    pub warnings: Vec<String>,
}

impl TrainingRun {
    pub fn accuracy(&self) -> f64 {
        self.metrics.accuracy
    }

    pub fn confusion_matrix(&self) -> &ConfusionMatrix {
        &self.metrics.confusion_matrix
    }
}

/// Row indices of a seeded train/test partition
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle `0..n_rows` with `seed` and hold out `ceil(n_rows * test_fraction)` rows.
pub fn train_test_split(n_rows: usize, test_fraction: f64, seed: u64) -> Result<Split> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(OdysseyError::TrainingConfig(format!(
            "test_fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }

    let test_size = (n_rows as f64 * test_fraction).ceil() as usize;
    if test_size == 0 || test_size >= n_rows {
        return Err(OdysseyError::TrainingConfig(format!(
            "{} rows cannot be split with test_fraction {}: train split would hold {} rows and test split {}",
            n_rows,
            test_fraction,
            n_rows.saturating_sub(test_size),
            test_size
        )));
    }

    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(test_size);
    Ok(Split { train, test: indices })
}

/// Fits one configured algorithm on a dataset
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    config: TrainingConfig,
}

impl ModelTrainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train on `dataset` and evaluate on a held-out split.
    ///
    /// Nothing is persisted; storing the artifact is the registry's job.
    #[tracing::instrument(skip(self, dataset), fields(dataset = dataset.name(), algorithm = %self.config.algorithm))]
    pub fn train(&self, dataset: &Dataset) -> Result<(TrainingRun, ModelArtifact)> {
        let start = Instant::now();
        let config = &self.config;
        let df = dataset.frame();

        let target = config.target_column.as_str();
        let target_col = df.column(target).map_err(|_| {
            OdysseyError::TrainingConfig(format!(
                "target column '{}' not found in dataset '{}'",
                target,
                dataset.name()
            ))
        })?;

        let feature_names = self.feature_names(dataset)?;
        let columns = self.feature_values(dataset, &feature_names)?;

        let (class_labels, codes) = ClassLabels::fit(target_col)?;
        if class_labels.len() < 2 {
            return Err(OdysseyError::TrainingConfig(format!(
                "target column '{}' has a single class; at least two are required",
                target
            )));
        }
        if config.algorithm.requires_binary_target() && !class_labels.is_binary() {
            return Err(OdysseyError::TrainingConfig(format!(
                "{} requires a binary target, '{}' has {} classes",
                config.algorithm.display_name(),
                target,
                class_labels.len()
            )));
        }

        let split = train_test_split(dataset.row_count(), config.test_fraction, config.seed)?;
        let mut warnings = Vec::new();
        check_split_classes(&split, &codes, &class_labels, &mut warnings)?;

        let x_train = to_matrix(&columns, &split.train);
        let x_test = to_matrix(&columns, &split.test);
        let y_train = select_codes(&codes, &split.train);
        let y_test = select_codes(&codes, &split.test);
        debug!(train_rows = x_train.nrows(), test_rows = x_test.nrows(), "split prepared");

        let mut model = FittedModel::untrained(config.algorithm, &config.hyperparameters, config.seed);
        model.fit(&x_train, &y_train, class_labels.len())?;

        let y_pred = model.predict(&x_test)?;
        let metrics = ClassificationMetrics::compute(&y_test, &y_pred, &class_labels.labels);

        let (capabilities, importance) = model.capabilities();
        let feature_importance = importance.map(|v| v.to_vec());

        let artifact = ModelArtifact {
            algorithm: config.algorithm,
            model,
            feature_names: feature_names.clone(),
            target_column: target.to_string(),
            class_labels,
            capabilities,
            feature_importance: feature_importance.clone(),
            metadata: TrainingMetadata {
                dataset: dataset.name().to_string(),
                test_fraction: config.test_fraction,
                seed: config.seed,
                trained_at: Utc::now(),
                train_rows: split.train.len(),
                test_rows: split.test.len(),
            },
        };
        artifact.validate()?;

        let run = TrainingRun {
            algorithm: config.algorithm,
            dataset: dataset.name().to_string(),
            target_column: target.to_string(),
            feature_names,
            metrics,
            feature_importance,
            train_rows: split.train.len(),
            test_rows: split.test.len(),
            training_time_secs: start.elapsed().as_secs_f64(),
            warnings,
        };

        info!(
            accuracy = run.accuracy(),
            test_rows = run.test_rows,
            elapsed_secs = run.training_time_secs,
            "model trained"
        );
        Ok((run, artifact))
    }

    /// Configured features, or every column except the target, minus exclusions
    fn feature_names(&self, dataset: &Dataset) -> Result<Vec<String>> {
        let target = &self.config.target_column;
        let excluded = &self.config.excluded_columns;
        let unknown: Vec<&str> = excluded
            .iter()
            .filter(|n| !dataset.has_column(n))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            return Err(OdysseyError::TrainingConfig(format!(
                "excluded columns not found in dataset: {}",
                unknown.join(", ")
            )));
        }

        let names = match &self.config.feature_columns {
            Some(names) => {
                if names.contains(target) {
                    return Err(OdysseyError::TrainingConfig(format!(
                        "target column '{}' cannot also be a feature",
                        target
                    )));
                }
                let missing: Vec<&str> = names
                    .iter()
                    .filter(|n| !dataset.has_column(n))
                    .map(String::as_str)
                    .collect();
                if !missing.is_empty() {
                    return Err(OdysseyError::TrainingConfig(format!(
                        "feature columns not found in dataset: {}",
                        missing.join(", ")
                    )));
                }
                names.clone()
            }
            None => dataset
                .column_names()
                .into_iter()
                .filter(|n| n != target)
                .collect(),
        };
        let names: Vec<String> = names.into_iter().filter(|n| !excluded.contains(n)).collect();

        if names.is_empty() {
            return Err(OdysseyError::TrainingConfig("no feature columns to train on".to_string()));
        }
        let distinct: BTreeSet<&String> = names.iter().collect();
        if distinct.len() != names.len() {
            return Err(OdysseyError::TrainingConfig("feature columns contain duplicates".to_string()));
        }
        Ok(names)
    }

    /// Numeric values of every feature; non-numeric or incomplete columns are rejected
    fn feature_values(&self, dataset: &Dataset, names: &[String]) -> Result<Vec<Vec<Option<f64>>>> {
        let non_numeric: Vec<String> = names
            .iter()
            .filter_map(|n| dataset.column(n))
            .filter(|c| !c.kind.is_numeric())
            .map(|c| format!("{} ({})", c.name, c.dtype))
            .collect();
        if !non_numeric.is_empty() {
            return Err(OdysseyError::TrainingConfig(format!(
                "feature columns must be numeric: {}",
                non_numeric.join(", ")
            )));
        }

        let mut columns = Vec::with_capacity(names.len());
        let mut incomplete = Vec::new();
        for name in names {
            let values = numeric_column(dataset.frame(), name)?;
            let missing = values.iter().filter(|v| v.is_none()).count();
            if missing > 0 {
                incomplete.push(format!("{} ({} missing)", name, missing));
            }
            columns.push(values);
        }
        if !incomplete.is_empty() {
            return Err(OdysseyError::TrainingConfig(format!(
                "feature columns contain missing values: {}",
                incomplete.join(", ")
            )));
        }
        Ok(columns)
    }
}

/// Train on a dataset with default hyperparameters
pub fn train(
    dataset: &Dataset,
    target_column: &str,
    algorithm: AlgorithmKind,
    test_fraction: f64,
    seed: u64,
) -> Result<(TrainingRun, ModelArtifact)> {
    let config = TrainingConfig::new(target_column, algorithm)
        .with_test_fraction(test_fraction)
        .with_seed(seed);
    ModelTrainer::new(config).train(dataset)
}

fn select_codes(codes: &[usize], rows: &[usize]) -> Array1<f64> {
    rows.iter().map(|&r| codes[r] as f64).collect()
}

fn classes_in(codes: &[usize], rows: &[usize]) -> BTreeSet<usize> {
    rows.iter().map(|&r| codes[r]).collect()
}

/// The train split needs two classes. A test split that misses a training
/// class is allowed but reported.
fn check_split_classes(
    split: &Split,
    codes: &[usize],
    labels: &ClassLabels,
    warnings: &mut Vec<String>,
) -> Result<()> {
    let train_classes = classes_in(codes, &split.train);
    if train_classes.len() < 2 {
        return Err(OdysseyError::TrainingConfig(
            "training split holds a single class; use more rows or another seed".to_string(),
        ));
    }

    let test_classes = classes_in(codes, &split.test);
    let absent: Vec<&str> = train_classes
        .difference(&test_classes)
        .filter_map(|&c| labels.label(c))
        .collect();
    if !absent.is_empty() {
        let message = format!("test split has no rows of class(es): {}", absent.join(", "));
        warn!("{}", message);
        warnings.push(message);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn binary_dataset(n: usize) -> Dataset {
        let a: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let b: Vec<f64> = (0..n).map(|i| ((i * 7) % 5) as f64).collect();
        let target: Vec<i64> = (0..n).map(|i| if i >= n / 2 { 1 } else { 0 }).collect();
        let df = df!("A" => a, "B" => b, "target" => target).unwrap();
        Dataset::new("scenario.csv", df)
    }

    #[test]
    fn test_split_sizes_and_determinism() {
        let split = train_test_split(100, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 20);
        assert_eq!(split.train.len(), 80);
        assert_eq!(split, train_test_split(100, 0.2, 42).unwrap());
        assert_ne!(split, train_test_split(100, 0.2, 43).unwrap());

        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_rounds_test_size_up() {
        assert_eq!(train_test_split(11, 0.2, 0).unwrap().test.len(), 3);
    }

    #[test]
    fn test_split_infeasible() {
        assert!(matches!(train_test_split(1, 0.5, 0), Err(OdysseyError::TrainingConfig(_))));
        assert!(matches!(train_test_split(10, 0.0, 0), Err(OdysseyError::TrainingConfig(_))));
        assert!(matches!(train_test_split(10, 1.0, 0), Err(OdysseyError::TrainingConfig(_))));
    }

    #[test]
    fn test_train_binary() {
        let dataset = binary_dataset(100);
        let (run, artifact) = train(&dataset, "target", AlgorithmKind::LogisticRegression, 0.2, 42).unwrap();

        assert_eq!(run.confusion_matrix().total(), 20);
        assert!((0.0..=1.0).contains(&run.accuracy()));
        assert_eq!(artifact.feature_names, vec!["A", "B"]);
        assert_eq!(artifact.target_column, "target");
        assert_eq!(run.feature_importance.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn test_missing_target() {
        let dataset = binary_dataset(20);
        let err = train(&dataset, "label", AlgorithmKind::RandomForest, 0.2, 1).unwrap_err();
        match err {
            OdysseyError::TrainingConfig(msg) => assert!(msg.contains("label")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_rejects_text_features() {
        let df = df!(
            "city" => &["a", "b", "c", "d", "e", "f"],
            "y" => &[0i64, 1, 0, 1, 0, 1]
        )
        .unwrap();
        let dataset = Dataset::new("cities.csv", df);
        let err = train(&dataset, "y", AlgorithmKind::RandomForest, 0.3, 1).unwrap_err();
        assert!(matches!(err, OdysseyError::TrainingConfig(msg) if msg.contains("city")));
    }

    #[test]
    fn test_rejects_missing_feature_values() {
        let df = df!(
            "x" => &[Some(1.0), None, Some(3.0), Some(4.0), Some(5.0), Some(6.0)],
            "y" => &[0i64, 1, 0, 1, 0, 1]
        )
        .unwrap();
        let dataset = Dataset::new("gaps.csv", df);
        let err = train(&dataset, "y", AlgorithmKind::LogisticRegression, 0.3, 1).unwrap_err();
        assert!(matches!(err, OdysseyError::TrainingConfig(msg) if msg.contains("missing")));
    }

    #[test]
    fn test_excluded_columns_dropped_from_features() {
        let df = df!(
            "x" => &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
            "gaps" => &[Some(1.0), None, Some(3.0), None, Some(5.0), Some(6.0), None, Some(8.0)],
            "y" => &[0i64, 0, 0, 0, 1, 1, 1, 1]
        )
        .unwrap();
        let dataset = Dataset::new("gaps.csv", df);
        let config = TrainingConfig::new("y", AlgorithmKind::LogisticRegression)
            .with_test_fraction(0.25)
            .with_excluded(vec!["gaps".to_string()]);
        let (_, artifact) = ModelTrainer::new(config).train(&dataset).unwrap();
        assert_eq!(artifact.feature_names, vec!["x"]);

        let unknown = TrainingConfig::new("y", AlgorithmKind::LogisticRegression).with_excluded(vec!["nope".to_string()]);
        let err = ModelTrainer::new(unknown).train(&dataset).unwrap_err();
        assert!(matches!(err, OdysseyError::TrainingConfig(msg) if msg.contains("nope")));
    }

    #[test]
    fn test_single_class_target() {
        let df = df!("x" => &[1.0, 2.0, 3.0, 4.0], "y" => &[1i64, 1, 1, 1]).unwrap();
        let dataset = Dataset::new("flat.csv", df);
        assert!(matches!(
            train(&dataset, "y", AlgorithmKind::LogisticRegression, 0.25, 1),
            Err(OdysseyError::TrainingConfig(_))
        ));
    }

    #[test]
    fn test_gradient_boosting_needs_binary_target() {
        let df = df!(
            "x" => &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            "y" => &["a", "b", "c", "a", "b", "c"]
        )
        .unwrap();
        let dataset = Dataset::new("three.csv", df);
        let err = train(&dataset, "y", AlgorithmKind::GradientBoosting, 0.3, 1).unwrap_err();
        assert!(matches!(err, OdysseyError::TrainingConfig(msg) if msg.contains("binary")));
    }

    #[test]
    fn test_target_as_feature_rejected() {
        let dataset = binary_dataset(20);
        let config = TrainingConfig::new("target", AlgorithmKind::RandomForest)
            .with_features(vec!["A".to_string(), "target".to_string()]);
        assert!(matches!(
            ModelTrainer::new(config).train(&dataset),
            Err(OdysseyError::TrainingConfig(_))
        ));
    }
}
