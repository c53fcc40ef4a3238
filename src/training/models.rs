//! Classifier trait and the fitted-model enum that dispatches through it

use super::algorithm::{AlgorithmKind, Hyperparameters};
use super::gradient_boosting::GradientBoostingClassifier;
use super::linear_models::LogisticRegression;
use super::random_forest::RandomForest;
use super::svm::SVMClassifier;
use crate::error::{OdysseyError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Common interface of every classifier. Targets are class codes `0..k`.
///
/// `predict_proba` and the importance accessors are optional capabilities:
/// they return `None` when the algorithm does not provide them.
pub trait Classifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, n_classes: usize) -> Result<()>;

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Class probabilities with one column per class code
    fn predict_proba(&self, _x: &Array2<f64>) -> Option<Result<Array2<f64>>> {
        None
    }

    fn supports_proba(&self) -> bool {
        false
    }

    /// Per-feature importances computed by the algorithm itself
    fn native_importances(&self) -> Option<Array1<f64>> {
        None
    }

    /// Linear coefficients, one row per fitted decision function
    fn coefficients(&self) -> Option<Array2<f64>> {
        None
    }

    fn n_features(&self) -> usize;
}

/// Where a model's importance vector comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportanceKind {
    Native,
    Coefficients,
    Unsupported,
}

/// Capabilities resolved once after fitting and stored with the artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub probability: bool,
    pub importance: ImportanceKind,
}

impl Capabilities {
    pub fn has_importance(&self) -> bool {
        self.importance != ImportanceKind::Unsupported
    }
}

/// Importance policy: native importances, else mean absolute coefficient
/// per feature, else absent.
pub fn resolve_importance<C: Classifier + ?Sized>(model: &C) -> (ImportanceKind, Option<Array1<f64>>) {
    if let Some(native) = model.native_importances() {
        return (ImportanceKind::Native, Some(native));
    }
    if let Some(coef) = model.coefficients() {
        if let Some(magnitude) = coef.mapv(f64::abs).mean_axis(Axis(0)) {
            return (ImportanceKind::Coefficients, Some(magnitude));
        }
    }
    (ImportanceKind::Unsupported, None)
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, n_classes: usize) -> Result<()> {
        LogisticRegression::fit(self, x, y, n_classes).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        LogisticRegression::predict(self, x)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Option<Result<Array2<f64>>> {
        Some(LogisticRegression::predict_proba(self, x))
    }

    fn supports_proba(&self) -> bool {
        true
    }

    fn coefficients(&self) -> Option<Array2<f64>> {
        LogisticRegression::coefficients(self)
    }

    fn n_features(&self) -> usize {
        LogisticRegression::n_features(self)
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, n_classes: usize) -> Result<()> {
        RandomForest::fit(self, x, y, n_classes).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        RandomForest::predict(self, x)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Option<Result<Array2<f64>>> {
        Some(RandomForest::predict_proba(self, x))
    }

    fn supports_proba(&self) -> bool {
        true
    }

    fn native_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances().cloned()
    }

    fn n_features(&self) -> usize {
        RandomForest::n_features(self)
    }
}

impl Classifier for SVMClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, n_classes: usize) -> Result<()> {
        SVMClassifier::fit(self, x, y, n_classes)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        SVMClassifier::predict(self, x)
    }

    fn coefficients(&self) -> Option<Array2<f64>> {
        SVMClassifier::coefficients(self)
    }

    fn n_features(&self) -> usize {
        SVMClassifier::n_features(self)
    }
}

impl Classifier for GradientBoostingClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, n_classes: usize) -> Result<()> {
        if n_classes > 2 {
            return Err(OdysseyError::TrainingConfig(format!(
                "gradient boosting requires a binary target, got {} classes",
                n_classes
            )));
        }
        GradientBoostingClassifier::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        GradientBoostingClassifier::predict(self, x)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Option<Result<Array2<f64>>> {
        Some(GradientBoostingClassifier::predict_proba(self, x))
    }

    fn supports_proba(&self) -> bool {
        true
    }

    fn native_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances().cloned()
    }

    fn n_features(&self) -> usize {
        GradientBoostingClassifier::n_features(self)
    }
}

/// A fitted classifier of any supported kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FittedModel {
    LogisticRegression(LogisticRegression),
    RandomForest(RandomForest),
    Svm(SVMClassifier),
    GradientBoosting(GradientBoostingClassifier),
}

impl FittedModel {
    /// Unfitted model of the requested kind
    pub fn untrained(kind: AlgorithmKind, params: &Hyperparameters, seed: u64) -> Self {
        match kind {
            AlgorithmKind::LogisticRegression => {
                FittedModel::LogisticRegression(LogisticRegression::new(params.logistic.clone()))
            }
            AlgorithmKind::RandomForest => {
                FittedModel::RandomForest(RandomForest::new(params.forest.clone(), seed))
            }
            AlgorithmKind::Svm => FittedModel::Svm(SVMClassifier::new(params.svm.clone(), seed)),
            AlgorithmKind::GradientBoosting => FittedModel::GradientBoosting(
                GradientBoostingClassifier::new(params.boosting.clone(), seed),
            ),
        }
    }

    pub fn kind(&self) -> AlgorithmKind {
        match self {
            FittedModel::LogisticRegression(_) => AlgorithmKind::LogisticRegression,
            FittedModel::RandomForest(_) => AlgorithmKind::RandomForest,
            FittedModel::Svm(_) => AlgorithmKind::Svm,
            FittedModel::GradientBoosting(_) => AlgorithmKind::GradientBoosting,
        }
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            FittedModel::LogisticRegression(m) => m,
            FittedModel::RandomForest(m) => m,
            FittedModel::Svm(m) => m,
            FittedModel::GradientBoosting(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Classifier {
        match self {
            FittedModel::LogisticRegression(m) => m,
            FittedModel::RandomForest(m) => m,
            FittedModel::Svm(m) => m,
            FittedModel::GradientBoosting(m) => m,
        }
    }

    /// Capability flags plus the importance vector, if any
    pub fn capabilities(&self) -> (Capabilities, Option<Array1<f64>>) {
        let (importance, values) = resolve_importance(self);
        let probability = self.supports_proba();
        (Capabilities { probability, importance }, values)
    }

    /// Hyperparameters the model was built with, as JSON
    pub fn hyperparameters(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            FittedModel::LogisticRegression(m) => serde_json::to_value(m.config()),
            FittedModel::RandomForest(m) => serde_json::to_value(m.config()),
            FittedModel::Svm(m) => serde_json::to_value(m.config()),
            FittedModel::GradientBoosting(m) => serde_json::to_value(m.config()),
        }
    }
}

impl Classifier for FittedModel {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, n_classes: usize) -> Result<()> {
        self.inner_mut().fit(x, y, n_classes)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.inner().predict(x)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Option<Result<Array2<f64>>> {
        self.inner().predict_proba(x)
    }

    fn supports_proba(&self) -> bool {
        self.inner().supports_proba()
    }

    fn native_importances(&self) -> Option<Array1<f64>> {
        self.inner().native_importances()
    }

    fn coefficients(&self) -> Option<Array2<f64>> {
        self.inner().coefficients()
    }

    fn n_features(&self) -> usize {
        self.inner().n_features()
    }
}
