//! Integration test: schema-checked prediction

use odyssey_ml::data::Dataset;
use odyssey_ml::error::OdysseyError;
use odyssey_ml::inference::{predict, Predictor, PredictorConfig, PREDICTIONS_COLUMN};
use odyssey_ml::registry::ModelRegistry;
use odyssey_ml::training::{train, AlgorithmKind, ModelArtifact};
use polars::prelude::*;

fn training_df() -> DataFrame {
    let a: Vec<f64> = (0..100).map(|i| if i % 2 == 0 { (i % 10) as f64 } else { 20.0 + (i % 10) as f64 }).collect();
    let b: Vec<f64> = (0..100).map(|i| ((i * 13) % 17) as f64).collect();
    let target: Vec<&str> = (0..100).map(|i| if i % 2 == 0 { "no" } else { "yes" }).collect();
    df!("A" => a, "B" => b, "target" => target).unwrap()
}

fn trained(algorithm: AlgorithmKind) -> ModelArtifact {
    let (_, artifact) = train(&Dataset::new("train", training_df()), "target", algorithm, 0.2, 42).unwrap();
    artifact
}

#[test]
fn test_scenario_b_missing_feature_is_schema_mismatch() {
    let artifact = trained(AlgorithmKind::RandomForest);
    let rows = df!("A" => &[1.0, 25.0]).unwrap();

    match predict(&artifact, &rows).unwrap_err() {
        OdysseyError::SchemaMismatch { missing } => assert_eq!(missing, vec!["B".to_string()]),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_predictions_appended_in_input_order() {
    let artifact = trained(AlgorithmKind::LogisticRegression);
    let rows = df!("A" => &[2.0, 24.0, 4.0, 28.0], "B" => &[3.0, 3.0, 8.0, 8.0]).unwrap();

    let result = predict(&artifact, &rows).unwrap();
    assert_eq!(result.len(), 4);
    assert_eq!(result.labels, vec!["no", "yes", "no", "yes"]);
    assert_eq!(result.frame.width(), 3);
    let appended = result.frame.column(PREDICTIONS_COLUMN).unwrap();
    assert_eq!(appended.str().unwrap().get(1), Some("yes"));

    let proba = result.probabilities.as_ref().unwrap();
    assert_eq!(proba.dim(), (4, 2));
    for row in proba.rows() {
        assert!((row.sum() - 1.0).abs() < 1e-9);
    }
}

#[test]
fn test_column_order_and_extra_columns_do_not_matter() {
    let artifact = trained(AlgorithmKind::RandomForest);
    let ordered = df!("A" => &[1.0, 21.0, 5.0], "B" => &[2.0, 9.0, 14.0]).unwrap();
    let shuffled = df!(
        "note" => &["x", "y", "z"],
        "B" => &[2.0, 9.0, 14.0],
        "A" => &[1.0, 21.0, 5.0]
    )
    .unwrap();

    let a = predict(&artifact, &ordered).unwrap();
    let b = predict(&artifact, &shuffled).unwrap();
    assert_eq!(a.codes, b.codes);
    assert_eq!(b.frame.get_column_names()[0].as_str(), "note");
}

#[test]
fn test_null_feature_values_rejected() {
    let artifact = trained(AlgorithmKind::LogisticRegression);
    let rows = df!("A" => &[Some(1.0), None], "B" => &[Some(2.0), Some(3.0)]).unwrap();
    assert!(matches!(predict(&artifact, &rows), Err(OdysseyError::InvalidData(_))));
}

#[test]
fn test_batched_prediction_matches_single_batch() {
    let artifact = trained(AlgorithmKind::GradientBoosting);
    let a: Vec<f64> = (0..250).map(|i| (i % 30) as f64).collect();
    let b: Vec<f64> = (0..250).map(|i| (i % 17) as f64).collect();
    let rows = df!("A" => a, "B" => b).unwrap();

    let whole = Predictor::new(PredictorConfig::default()).predict(&artifact, &rows).unwrap();
    let batched = Predictor::new(PredictorConfig::default().with_batch_size(16))
        .predict(&artifact, &rows)
        .unwrap();
    assert_eq!(whole.codes, batched.codes);
    assert_eq!(whole.probabilities, batched.probabilities);
}

#[test]
fn test_loaded_model_predicts_like_trained_model() {
    let dir = tempfile::tempdir().unwrap();
    let registry = ModelRegistry::open(dir.path()).unwrap();
    let artifact = trained(AlgorithmKind::Svm);
    let id = registry.store(&artifact).unwrap();
    let loaded = registry.load(&id).unwrap();

    let rows = df!("B" => &[1.0, 7.0, 12.0], "A" => &[3.0, 26.0, 22.0]).unwrap();
    let before = predict(&artifact, &rows).unwrap();
    let after = predict(&loaded, &rows).unwrap();
    assert_eq!(before.labels, after.labels);
    assert!(after.probabilities.is_none());
}

#[test]
fn test_summary_and_csv_output() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = trained(AlgorithmKind::RandomForest);
    let rows = df!("A" => &[0.0, 2.0, 22.0], "B" => &[1.0, 1.0, 1.0]).unwrap();
    let result = predict(&artifact, &rows).unwrap();

    let summary = result.summary();
    assert_eq!(summary.rows, 3);
    assert_eq!(summary.class_counts.iter().map(|(_, n)| n).sum::<usize>(), 3);
    assert!(summary.mean_confidence.is_some_and(|c| (0.5..=1.0).contains(&c)));

    let path = dir.path().join("out.csv");
    result.write_csv(&path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.lines().next().unwrap().ends_with(PREDICTIONS_COLUMN));
    assert_eq!(text.lines().count(), 4);
}

#[test]
fn test_boolean_target_predicts_booleans_after_reload() {
    let df = training_df();
    let flag: Vec<bool> = (0..100).map(|i| i % 2 == 1).collect();
    let df = df.drop("target").unwrap().hstack(&[Column::new("flag".into(), flag)]).unwrap();
    let (_, artifact) = train(&Dataset::new("flags", df), "flag", AlgorithmKind::RandomForest, 0.2, 42).unwrap();
    assert_eq!(artifact.class_labels.labels, vec!["false", "true"]);

    let dir = tempfile::tempdir().unwrap();
    let registry = ModelRegistry::open(dir.path()).unwrap();
    let loaded = registry.load(&registry.store(&artifact).unwrap()).unwrap();

    let rows = df!("A" => &[2.0, 24.0], "B" => &[3.0, 3.0]).unwrap();
    let result = predict(&loaded, &rows).unwrap();
    let column = result.frame.column(PREDICTIONS_COLUMN).unwrap();
    assert_eq!(column.dtype(), &DataType::Boolean);
    assert_eq!(column.bool().unwrap().into_iter().collect::<Vec<_>>(), vec![Some(false), Some(true)]);
}

#[test]
fn test_empty_batch_predicts_nothing() {
    let artifact = trained(AlgorithmKind::GradientBoosting);
    let rows = df!("A" => Vec::<f64>::new(), "B" => Vec::<f64>::new()).unwrap();

    let result = predict(&artifact, &rows).unwrap();
    assert!(result.is_empty());
    assert_eq!(result.frame.height(), 0);
    assert!(result.frame.column(PREDICTIONS_COLUMN).is_ok());
}
