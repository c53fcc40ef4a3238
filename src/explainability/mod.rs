//! Model explainability module
//!
//! Builds an [`ExplainabilityReport`] from a stored model and a dataset:
//! - Feature importance (stored or recomputed)
//! - SHAP-like local explanations and their summary
//! - Missing values and the correlation matrix
//! - ROC curve for binary probabilistic models
//! - Per-feature t-tests, drift and class-split histograms

mod data_quality;
mod engine;
mod local_explanations;
mod roc;

pub use data_quality::{
    average_ranks, pearson, ClassHistogram, CorrelationMatrix, CorrelationMethod, FeatureDistribution,
    MissingValues,
};
pub use engine::{
    explain, AttributionReport, ExplainabilityEngine, ExplainabilityReport, FeatureDrift, FeatureImportance,
    FeatureTest, ImportanceSource,
};
pub use local_explanations::{FeatureContribution, LocalExplainer, LocalExplanation, ShapSummary};
pub use roc::{RocCurve, RocPoint};
