//! Builds an explainability report for a stored model against a dataset

use super::data_quality::{CorrelationMatrix, FeatureDistribution, MissingValues};
use super::local_explanations::{LocalExplainer, LocalExplanation, ShapSummary};
use super::roc::RocCurve;
use crate::config::ExplainConfig;
use crate::data::{numeric_column, to_matrix, Dataset};
use crate::drift::{DriftDetector, DriftResult, KolmogorovSmirnovTest, StatisticalTest};
use crate::error::{OdysseyError, Result};
use crate::training::{
    resolve_importance, AlgorithmKind, ClassificationMetrics, Classifier, ImportanceKind, ModelArtifact,
};
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Where the reported importance came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportanceSource {
    /// Stored with the artifact at training time
    Training,
    /// Recomputed from the fitted model
    Recomputed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub kind: ImportanceKind,
    pub source: ImportanceSource,
    /// (feature, importance) in training feature order
    pub values: Vec<(String, f64)>,
}

impl FeatureImportance {
    /// Features by importance, descending
    pub fn ranked(&self) -> Vec<(String, f64)> {
        let mut ranked = self.values.clone();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}

/// Per-row attributions and their aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionReport {
    pub permutations: usize,
    pub background_rows: usize,
    pub explanations: Vec<LocalExplanation>,
    pub summary: ShapSummary,
    /// Features by mean absolute contribution, descending
    pub ranking: Vec<(String, f64)>,
}

/// Two-sample mean comparison of one feature between the two target classes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTest {
    pub feature: String,
    pub test: StatisticalTest,
    /// `None` when the statistic is undefined for this feature
    pub statistic: Option<f64>,
    pub p_value: Option<f64>,
}

/// Kolmogorov-Smirnov comparison of one feature between the two target classes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDrift {
    pub feature: String,
    pub result: Option<DriftResult>,
}

/// Everything derived from one model and one dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainabilityReport {
    pub model_id: String,
    pub algorithm: AlgorithmKind,
    pub dataset: String,
    pub target_column: String,
    pub feature_names: Vec<String>,
    /// Rows with complete features and a known target
    pub evaluated_rows: usize,
    pub feature_importance: Option<FeatureImportance>,
    pub attribution: Option<AttributionReport>,
    pub missing_values: Vec<MissingValues>,
    /// Features plus the encoded target
    pub correlation: CorrelationMatrix,
    /// Binary targets with a probabilistic model only
    pub roc: Option<RocCurve>,
    /// Binary targets only
    pub statistical_tests: Option<Vec<FeatureTest>>,
    /// Binary targets only
    pub drift: Option<Vec<FeatureDrift>>,
    pub distributions: Vec<FeatureDistribution>,
    /// The model evaluated on every usable row of the dataset
    pub performance: ClassificationMetrics,
    /// Sections that were omitted and why
    pub warnings: Vec<String>,
}

impl ExplainabilityReport {
    /// Features whose test p-value falls below `alpha`
    pub fn significant_features(&self, alpha: f64) -> Vec<&str> {
        self.statistical_tests
            .iter()
            .flatten()
            .filter(|t| t.p_value.is_some_and(|p| p < alpha))
            .map(|t| t.feature.as_str())
            .collect()
    }
}

/// Dataset columns resolved against the artifact schema
struct Inputs {
    /// Aligned with the artifact's feature order
    columns: Vec<Vec<Option<f64>>>,
    /// Target class code per dataset row
    target: Vec<Option<usize>>,
    /// Rows usable for model evaluation
    usable: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct ExplainabilityEngine {
    config: ExplainConfig,
}

impl ExplainabilityEngine {
    pub fn new(config: ExplainConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExplainConfig {
        &self.config
    }

    /// Derive a report for `artifact` on `dataset`.
    ///
    /// Attribution and ROC failures are recorded in `warnings` and leave
    /// their section empty; every other failure aborts.
    #[tracing::instrument(skip_all, fields(model = %artifact.id(), dataset = dataset.name()))]
    pub fn explain(&self, artifact: &ModelArtifact, dataset: &Dataset) -> Result<ExplainabilityReport> {
        let inputs = self.resolve_inputs(artifact, dataset)?;
        let labels = &artifact.class_labels;
        let mut warnings = Vec::new();

        if inputs.usable.len() < dataset.row_count() {
            let message = format!(
                "{} of {} rows have missing features or an unknown target and were excluded from model evaluation",
                dataset.row_count() - inputs.usable.len(),
                dataset.row_count()
            );
            warn!("{}", message);
            warnings.push(message);
        }

        let x = to_matrix(&inputs.columns, &inputs.usable);
        let y_true: Array1<f64> = inputs
            .usable
            .iter()
            .filter_map(|&r| inputs.target[r])
            .map(|c| c as f64)
            .collect();
        let y_pred = artifact.model.predict(&x)?;
        let performance = ClassificationMetrics::compute(&y_true, &y_pred, &labels.labels);
        debug!(accuracy = performance.accuracy, rows = x.nrows(), "model evaluated");

        let feature_importance = importance(artifact);

        let attribution = if self.config.max_attribution_rows == 0 {
            None
        } else {
            match self.attribution(artifact, &inputs) {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!(error = %e, "attribution omitted");
                    warnings.push(format!("attribution omitted: {}", e));
                    None
                }
            }
        };

        let roc = match self.roc(artifact, &x, &y_true) {
            Ok(roc) => roc,
            Err(e) => {
                warn!(error = %e, "ROC curve omitted");
                warnings.push(format!("ROC curve omitted: {}", e));
                None
            }
        };

        let missing_values = dataset
            .columns()
            .iter()
            .map(|c| MissingValues::new(c.name.clone(), c.null_count, dataset.row_count()))
            .collect();

        let mut corr_columns = artifact.feature_names.clone();
        corr_columns.push(artifact.target_column.clone());
        let mut corr_data = inputs.columns.clone();
        corr_data.push(inputs.target.iter().map(|c| c.map(|c| c as f64)).collect());
        let correlation = CorrelationMatrix::compute(self.config.correlation, corr_columns, &corr_data);

        let groups: Vec<Vec<Vec<f64>>> = inputs
            .columns
            .iter()
            .map(|values| group_by_class(values, &inputs.target, labels.len()))
            .collect();

        let distributions = artifact
            .feature_names
            .iter()
            .zip(&groups)
            .filter_map(|(name, g)| FeatureDistribution::compute(name, &labels.labels, g, self.config.histogram_bins))
            .collect();

        let (statistical_tests, drift) = if labels.is_binary() {
            (
                Some(self.feature_tests(&artifact.feature_names, &groups)),
                Some(self.feature_drift(&artifact.feature_names, &groups)),
            )
        } else {
            debug!(classes = labels.len(), "target is not binary; skipping two-sample tests");
            (None, None)
        };

        let report = ExplainabilityReport {
            model_id: artifact.id().to_string(),
            algorithm: artifact.algorithm,
            dataset: dataset.name().to_string(),
            target_column: artifact.target_column.clone(),
            feature_names: artifact.feature_names.clone(),
            evaluated_rows: inputs.usable.len(),
            feature_importance,
            attribution,
            missing_values,
            correlation,
            roc,
            statistical_tests,
            drift,
            distributions,
            performance,
            warnings,
        };
        info!(
            rows = report.evaluated_rows,
            warnings = report.warnings.len(),
            "explainability report built"
        );
        Ok(report)
    }

    fn resolve_inputs(&self, artifact: &ModelArtifact, dataset: &Dataset) -> Result<Inputs> {
        let missing: Vec<String> = artifact
            .feature_names
            .iter()
            .filter(|n| !dataset.has_column(n))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(OdysseyError::SchemaMismatch { missing });
        }

        let target_col = dataset.frame().column(&artifact.target_column).map_err(|_| {
            OdysseyError::InvalidData(format!(
                "dataset '{}' has no target column '{}'",
                dataset.name(),
                artifact.target_column
            ))
        })?;
        let target = artifact.class_labels.encode(target_col)?;

        let columns = artifact
            .feature_names
            .iter()
            .map(|name| numeric_column(dataset.frame(), name))
            .collect::<Result<Vec<_>>>()?;

        let usable: Vec<usize> = (0..dataset.row_count())
            .filter(|&r| target[r].is_some() && columns.iter().all(|c| c[r].is_some()))
            .collect();
        if usable.is_empty() {
            return Err(OdysseyError::InvalidData(format!(
                "dataset '{}' has no rows with complete features and a known '{}' label",
                dataset.name(),
                artifact.target_column
            )));
        }
        Ok(Inputs { columns, target, usable })
    }

    fn attribution(&self, artifact: &ModelArtifact, inputs: &Inputs) -> Result<AttributionReport> {
        let config = &self.config;
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

        let mut explained = inputs.usable.clone();
        explained.shuffle(&mut rng);
        explained.truncate(config.max_attribution_rows);
        explained.sort_unstable();

        let mut background = inputs.usable.clone();
        background.shuffle(&mut rng);
        background.truncate(config.background_size.max(1));

        let model = &artifact.model;
        let n_classes = artifact.class_labels.len();
        let score = |x: &Array2<f64>| -> Result<Array2<f64>> {
            match model.predict_proba(x) {
                Some(proba) => proba,
                None => Ok(one_hot(&model.predict(x)?, n_classes)),
            }
        };

        let explainer = LocalExplainer::new(
            score,
            to_matrix(&inputs.columns, &background),
            artifact.feature_names.clone(),
        )?
        .with_permutations(config.permutations)
        .with_seed(config.seed);

        let explanations = explainer.explain_batch(&to_matrix(&inputs.columns, &explained), &explained)?;
        let summary = ShapSummary::from_explanations(&artifact.feature_names, &explanations);
        let ranking = summary.feature_ranking();
        debug!(rows = explanations.len(), "attribution computed");

        Ok(AttributionReport {
            permutations: config.permutations,
            background_rows: background.len(),
            explanations,
            summary,
            ranking,
        })
    }

    fn roc(&self, artifact: &ModelArtifact, x: &Array2<f64>, y_true: &Array1<f64>) -> Result<Option<RocCurve>> {
        if !self.config.include_roc || !artifact.class_labels.is_binary() {
            return Ok(None);
        }
        let Some(proba) = artifact.model.predict_proba(x) else {
            debug!("model has no probability output; skipping ROC");
            return Ok(None);
        };
        let proba = proba.map_err(|e| OdysseyError::explain("roc", e))?;
        if proba.ncols() != 2 {
            return Err(OdysseyError::explain(
                "roc",
                format!("expected 2 probability columns, got {}", proba.ncols()),
            ));
        }
        let scores = proba.column(1).to_vec();
        let positives: Vec<bool> = y_true.iter().map(|&c| c == 1.0).collect();
        RocCurve::compute(&scores, &positives).map(Some)
    }

    fn feature_tests(&self, features: &[String], groups: &[Vec<Vec<f64>>]) -> Vec<FeatureTest> {
        let test = self.config.statistical_test;
        features
            .iter()
            .zip(groups)
            .map(|(feature, g)| {
                let outcome = test.compare(&g[0], &g[1]);
                FeatureTest {
                    feature: feature.clone(),
                    test,
                    statistic: outcome.map(|o| o.statistic),
                    p_value: outcome.map(|o| o.p_value),
                }
            })
            .collect()
    }

    fn feature_drift(&self, features: &[String], groups: &[Vec<Vec<f64>>]) -> Vec<FeatureDrift> {
        let ks = KolmogorovSmirnovTest::new(self.config.drift_alpha);
        features
            .iter()
            .zip(groups)
            .map(|(feature, g)| FeatureDrift {
                feature: feature.clone(),
                result: ks.detect(&g[0], &g[1]).ok(),
            })
            .collect()
    }
}

/// Explain with an engine built from `config`
pub fn explain(artifact: &ModelArtifact, dataset: &Dataset, config: &ExplainConfig) -> Result<ExplainabilityReport> {
    ExplainabilityEngine::new(config.clone()).explain(artifact, dataset)
}

/// Importance stored at training time, else recomputed from the model
fn importance(artifact: &ModelArtifact) -> Option<FeatureImportance> {
    if let Some(values) = artifact.importance_pairs() {
        return Some(FeatureImportance {
            kind: artifact.capabilities.importance,
            source: ImportanceSource::Training,
            values,
        });
    }
    let (kind, values) = resolve_importance(&artifact.model);
    let values = values?;
    Some(FeatureImportance {
        kind,
        source: ImportanceSource::Recomputed,
        values: artifact.feature_names.iter().cloned().zip(values.iter().copied()).collect(),
    })
}

/// Values of one feature split by target class; rows missing either are skipped
fn group_by_class(values: &[Option<f64>], target: &[Option<usize>], n_classes: usize) -> Vec<Vec<f64>> {
    let mut groups = vec![Vec::new(); n_classes];
    for (v, c) in values.iter().zip(target) {
        if let (Some(v), Some(c)) = (v, c) {
            if let Some(group) = groups.get_mut(*c) {
                group.push(*v);
            }
        }
    }
    groups
}

fn one_hot(predictions: &Array1<f64>, n_classes: usize) -> Array2<f64> {
    let mut out = Array2::zeros((predictions.len(), n_classes));
    for (i, &code) in predictions.iter().enumerate() {
        let code = code as usize;
        if code < n_classes {
            out[[i, code]] = 1.0;
        }
    }
    out
}
