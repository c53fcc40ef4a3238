//! Model training module
//!
//! Classifiers share the [`Classifier`] trait and are selected through
//! [`AlgorithmKind`]:
//! - Logistic regression (linear)
//! - Random forest (tree ensemble)
//! - Support vector machine (kernel, margin-based)
//! - Gradient boosting (binary targets)
//!
//! [`ModelTrainer`] validates a dataset, splits it with a seed, fits the
//! selected algorithm and returns a [`TrainingRun`] plus a [`ModelArtifact`].

mod algorithm;
mod artifact;
mod engine;
mod metrics;
mod models;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod linear_models;
pub mod random_forest;
pub mod svm;

pub use algorithm::{AlgorithmKind, Hyperparameters};
pub use artifact::{ClassLabels, ModelArtifact, ModelId, TrainingMetadata, ARTIFACT_FORMAT, ARTIFACT_VERSION};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use engine::{train, train_test_split, ModelTrainer, Split, TrainingRun};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use linear_models::{LogisticConfig, LogisticRegression};
pub use metrics::{AverageScores, ClassReport, ClassificationMetrics, ConfusionMatrix};
pub use models::{resolve_importance, Capabilities, Classifier, FittedModel, ImportanceKind};
pub use random_forest::{ForestConfig, MaxFeatures, RandomForest};
pub use svm::{KernelType, SVMClassifier, SVMConfig};

use ndarray::{Array1, Array2, Axis};

/// Column index of each row's largest score; ties go to the lowest index
pub(crate) fn argmax_rows(scores: &Array2<f64>) -> Array1<f64> {
    scores
        .rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0usize, f64::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
                .0 as f64
        })
        .collect()
}

/// Per-column means and standard deviations for standardization. Moments are
/// taken on values divided by the column's largest magnitude so sums stay
/// finite; near-constant columns get a scale of 1.
pub(crate) fn standardization(x: &Array2<f64>) -> (Array1<f64>, Array1<f64>) {
    let (means, scales): (Vec<f64>, Vec<f64>) = x
        .axis_iter(Axis(1))
        .map(|column| {
            let magnitude = column.iter().fold(0.0f64, |m, v| m.max(v.abs()));
            if column.is_empty() || magnitude == 0.0 || !magnitude.is_finite() {
                return (0.0, 1.0);
            }
            let n = column.len() as f64;
            let mean = column.iter().map(|v| v / magnitude).sum::<f64>() / n;
            let var = column.iter().map(|v| (v / magnitude - mean).powi(2)).sum::<f64>() / n;
            let std = var.sqrt() * magnitude;
            (mean * magnitude, if std > 1e-12 { std } else { 1.0 })
        })
        .unzip();
    (Array1::from(means), Array1::from(scales))
}

/// `(x - means) / scales`, halved first so the difference cannot overflow
pub(crate) fn standardize(x: &Array2<f64>, means: &Array1<f64>, scales: &Array1<f64>) -> Array2<f64> {
    (x * 0.5 - &(means * 0.5)) / &(scales * 0.5)
}
