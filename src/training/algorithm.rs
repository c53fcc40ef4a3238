//! Algorithm selection and per-algorithm hyperparameters

use super::gradient_boosting::GradientBoostingConfig;
use super::linear_models::LogisticConfig;
use super::random_forest::ForestConfig;
use super::svm::SVMConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classifier families the trainer can fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    /// Linear classifier
    LogisticRegression,
    /// Tree-ensemble classifier
    RandomForest,
    /// Margin-based kernel classifier
    Svm,
    /// Gradient-boosted trees, binary targets only
    GradientBoosting,
}

impl AlgorithmKind {
    pub fn all() -> [AlgorithmKind; 4] {
        [
            AlgorithmKind::LogisticRegression,
            AlgorithmKind::RandomForest,
            AlgorithmKind::Svm,
            AlgorithmKind::GradientBoosting,
        ]
    }

    /// Stable identifier used in model ids and file names
    pub fn slug(&self) -> &'static str {
        match self {
            AlgorithmKind::LogisticRegression => "logistic_regression",
            AlgorithmKind::RandomForest => "random_forest",
            AlgorithmKind::Svm => "svm",
            AlgorithmKind::GradientBoosting => "gradient_boosting",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AlgorithmKind::LogisticRegression => "Logistic Regression",
            AlgorithmKind::RandomForest => "Random Forest",
            AlgorithmKind::Svm => "Support Vector Machine",
            AlgorithmKind::GradientBoosting => "Gradient Boosting",
        }
    }

    pub fn requires_binary_target(&self) -> bool {
        matches!(self, AlgorithmKind::GradientBoosting)
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for AlgorithmKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace(['-', ' '], "_");
        match key.as_str() {
            "logistic_regression" | "logistic" | "lr" => Ok(AlgorithmKind::LogisticRegression),
            "random_forest" | "rf" => Ok(AlgorithmKind::RandomForest),
            "svm" | "svc" | "support_vector_machine" => Ok(AlgorithmKind::Svm),
            "gradient_boosting" | "gb" | "gbm" => Ok(AlgorithmKind::GradientBoosting),
            _ => Err(format!(
                "unknown algorithm '{}' (expected one of: {})",
                s,
                AlgorithmKind::all().map(|k| k.slug()).join(", ")
            )),
        }
    }
}

/// Hyperparameters for every algorithm; only the selected one is used
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub logistic: LogisticConfig,
    pub forest: ForestConfig,
    pub svm: SVMConfig,
    pub boosting: GradientBoostingConfig,
}

impl Hyperparameters {
    /// The selected algorithm's settings as JSON
    pub fn to_json(&self, kind: AlgorithmKind) -> serde_json::Result<serde_json::Value> {
        match kind {
            AlgorithmKind::LogisticRegression => serde_json::to_value(&self.logistic),
            AlgorithmKind::RandomForest => serde_json::to_value(&self.forest),
            AlgorithmKind::Svm => serde_json::to_value(&self.svm),
            AlgorithmKind::GradientBoosting => serde_json::to_value(&self.boosting),
        }
    }
}
