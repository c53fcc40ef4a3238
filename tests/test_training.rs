//! Integration test: training pipeline end-to-end

use odyssey_ml::config::TrainingConfig;
use odyssey_ml::data::{Dataset, DatasetStore, SampleDataset};
use odyssey_ml::error::OdysseyError;
use odyssey_ml::training::{train, AlgorithmKind, ImportanceKind, KernelType, ModelTrainer, SVMConfig};
use polars::prelude::*;

/// Columns `[A, B, target]` with 100 rows and a binary target
fn scenario_df() -> DataFrame {
    let a: Vec<f64> = (0..100).map(|i| (i % 50) as f64 * 0.1 + if i % 2 == 0 { 0.0 } else { 3.0 }).collect();
    let b: Vec<f64> = (0..100).map(|i| ((i * 37) % 23) as f64).collect();
    let target: Vec<i64> = (0..100).map(|i| (i % 2) as i64).collect();
    df!("A" => a, "B" => b, "target" => target).unwrap()
}

fn three_class_df() -> DataFrame {
    let x: Vec<f64> = (0..60).map(|i| (i / 20) as f64 * 5.0 + (i % 4) as f64).collect();
    let y: Vec<f64> = (0..60).map(|i| ((i * 7) % 9) as f64).collect();
    let label: Vec<&str> = (0..60).map(|i| ["a", "b", "c"][i / 20]).collect();
    df!("x" => x, "y" => y, "label" => label).unwrap()
}

#[test]
fn test_scenario_a_confusion_matrix_covers_test_split() {
    let dataset = Dataset::new("scenario", scenario_df());
    for algorithm in AlgorithmKind::all() {
        let (run, artifact) = train(&dataset, "target", algorithm, 0.2, 42)
            .unwrap_or_else(|e| panic!("{} failed: {}", algorithm, e));

        assert_eq!(run.test_rows, 20, "{}", algorithm);
        assert_eq!(run.train_rows, 80, "{}", algorithm);
        assert_eq!(run.confusion_matrix().total(), 20, "{}", algorithm);
        assert!((0.0..=1.0).contains(&run.accuracy()), "{}", algorithm);
        assert_eq!(artifact.feature_names, vec!["A", "B"]);
        assert_eq!(artifact.target_column, "target");
    }
}

#[test]
fn test_training_is_idempotent() {
    let dataset = Dataset::new("scenario", scenario_df());
    for algorithm in AlgorithmKind::all() {
        let (first, a1) = train(&dataset, "target", algorithm, 0.2, 7).unwrap();
        let (second, a2) = train(&dataset, "target", algorithm, 0.2, 7).unwrap();

        assert_eq!(first.metrics, second.metrics, "{}", algorithm);
        assert_eq!(first.feature_importance, second.feature_importance, "{}", algorithm);
        assert_eq!(a1.feature_names, a2.feature_names);
        assert_eq!(a1.target_column, a2.target_column);
        assert_eq!(a1.id(), a2.id());
    }
}

#[test]
fn test_scenario_c_rbf_svm_has_no_importance() {
    let dataset = Dataset::new("scenario", scenario_df());
    let mut config = TrainingConfig::new("target", AlgorithmKind::Svm).with_seed(42);
    config.hyperparameters.svm = SVMConfig {
        kernel: KernelType::RBF { gamma: None },
        ..SVMConfig::default()
    };
    let (run, artifact) = ModelTrainer::new(config).train(&dataset).unwrap();

    assert!(run.feature_importance.is_none());
    assert!(artifact.feature_importance.is_none());
    assert_eq!(artifact.capabilities.importance, ImportanceKind::Unsupported);
    assert!(!artifact.capabilities.probability);
}

#[test]
fn test_linear_svm_importance_from_coefficients() {
    let dataset = Dataset::new("scenario", scenario_df());
    let mut config = TrainingConfig::new("target", AlgorithmKind::Svm);
    config.hyperparameters.svm = SVMConfig {
        kernel: KernelType::Linear,
        ..SVMConfig::default()
    };
    let (_, artifact) = ModelTrainer::new(config).train(&dataset).unwrap();

    assert_eq!(artifact.capabilities.importance, ImportanceKind::Coefficients);
    let importance = artifact.feature_importance.unwrap();
    assert_eq!(importance.len(), 2);
    assert!(importance.iter().all(|v| *v >= 0.0));
}

#[test]
fn test_gradient_boosting_rejects_multiclass_target() {
    let dataset = Dataset::new("three", three_class_df());
    let err = train(&dataset, "label", AlgorithmKind::GradientBoosting, 0.2, 42).unwrap_err();
    assert!(matches!(err, OdysseyError::TrainingConfig(_)));

    let (run, artifact) = train(&dataset, "label", AlgorithmKind::RandomForest, 0.2, 42).unwrap();
    assert_eq!(artifact.class_labels.labels, vec!["a", "b", "c"]);
    assert_eq!(run.confusion_matrix().labels.len(), 3);
}

#[test]
fn test_invalid_configurations() {
    let dataset = Dataset::new("scenario", scenario_df());

    let missing_target = train(&dataset, "nope", AlgorithmKind::RandomForest, 0.2, 42).unwrap_err();
    assert!(matches!(missing_target, OdysseyError::TrainingConfig(_)));

    let bad_fraction = train(&dataset, "target", AlgorithmKind::RandomForest, 1.0, 42).unwrap_err();
    assert!(matches!(bad_fraction, OdysseyError::TrainingConfig(_)));

    let tiny = Dataset::new("tiny", df!("A" => &[1.0, 2.0], "target" => &[0i64, 1]).unwrap());
    let infeasible = train(&tiny, "target", AlgorithmKind::LogisticRegression, 0.2, 42).unwrap_err();
    assert!(matches!(infeasible, OdysseyError::TrainingConfig(_)));
}

#[test]
fn test_missing_values_are_rejected_until_excluded() {
    let dir = tempfile::tempdir().unwrap();
    let store = DatasetStore::open(dir.path()).unwrap();
    store.load_sample(SampleDataset::Titanic).unwrap();
    let titanic = store.load("titanic").unwrap();

    let err = train(&titanic, "survived", AlgorithmKind::LogisticRegression, 0.2, 42).unwrap_err();
    match err {
        OdysseyError::TrainingConfig(message) => assert!(message.contains("age")),
        other => panic!("unexpected error: {other}"),
    }

    let features = ["pclass", "sex", "sibsp", "parch", "fare"].map(String::from).to_vec();
    let config = TrainingConfig::new("survived", AlgorithmKind::GradientBoosting).with_features(features.clone());
    let (run, artifact) = ModelTrainer::new(config).train(&titanic).unwrap();
    assert_eq!(artifact.feature_names, features);
    assert!(run.accuracy() > 0.55);
}

#[test]
fn test_non_numeric_feature_rejected() {
    let df = df!(
        "name" => &["a", "b", "c", "d", "e", "f"],
        "x" => &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        "y" => &[0i64, 1, 0, 1, 0, 1]
    )
    .unwrap();
    let err = train(&Dataset::new("text", df), "y", AlgorithmKind::RandomForest, 0.3, 1).unwrap_err();
    assert!(matches!(err, OdysseyError::TrainingConfig(_)));
}
