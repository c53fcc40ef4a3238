//! Application state: the dataset store, the model registry and settings
//!
//! Callers hold one [`Workspace`] and pass it by reference. The async
//! variants run the blocking computation on tokio's blocking pool under a
//! deadline.

use crate::config::{ExplainConfig, StoreConfig, TimeoutConfig, TrainingConfig};
use crate::data::DatasetStore;
use crate::error::{OdysseyError, Result};
use crate::explainability::{ExplainabilityEngine, ExplainabilityReport};
use crate::inference::{PredictionResult, Predictor, PredictorConfig};
use crate::registry::ModelRegistry;
use crate::report::{ReportAssembler, ReportPayload};
use crate::training::{ModelId, ModelTrainer, TrainingRun};
use polars::prelude::DataFrame;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{info, warn};

/// Result of [`Workspace::train_and_store`]
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub run: TrainingRun,
    pub model_id: ModelId,
    pub report: ReportPayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Commit {
    Pending,
    Committed,
    Cancelled,
}

#[derive(Debug)]
pub struct Workspace {
    config: StoreConfig,
    datasets: DatasetStore,
    registry: ModelRegistry,
    timeouts: TimeoutConfig,
    explain: ExplainConfig,
    predictor: PredictorConfig,
}

impl Workspace {
    /// Open both stores, creating their directories if needed
    pub fn open(config: StoreConfig) -> Result<Self> {
        let datasets = DatasetStore::open(&config.datasets_dir)?;
        let registry = ModelRegistry::open(&config.models_dir)?;
        Ok(Self {
            config,
            datasets,
            registry,
            timeouts: TimeoutConfig::default(),
            explain: ExplainConfig::default(),
            predictor: PredictorConfig::default(),
        })
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_explain_config(mut self, explain: ExplainConfig) -> Self {
        self.explain = explain;
        self
    }

    pub fn with_predictor_config(mut self, predictor: PredictorConfig) -> Self {
        self.predictor = predictor;
        self
    }

    pub fn store_config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn datasets(&self) -> &DatasetStore {
        &self.datasets
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn timeouts(&self) -> &TimeoutConfig {
        &self.timeouts
    }

    pub fn explain_config(&self) -> &ExplainConfig {
        &self.explain
    }

    /// Train on a stored dataset and persist the artifact
    pub fn train_and_store(&self, dataset: &str, config: TrainingConfig) -> Result<TrainedModel> {
        let state = Mutex::new(Commit::Pending);
        self.train_guarded(dataset, config, &state)
    }

    /// Train, then store only if `state` has not been cancelled meanwhile
    fn train_guarded(&self, dataset: &str, config: TrainingConfig, state: &Mutex<Commit>) -> Result<TrainedModel> {
        let dataset = self.datasets.load(dataset)?;
        let (run, artifact) = ModelTrainer::new(config).train(&dataset)?;

        let model_id = {
            let mut commit = state.lock().unwrap_or_else(PoisonError::into_inner);
            if *commit == Commit::Cancelled {
                return Err(OdysseyError::Timeout {
                    operation: "training".to_string(),
                    seconds: self.timeouts.train_secs,
                });
            }
            let id = self.registry.store(&artifact)?;
            *commit = Commit::Committed;
            id
        };

        info!(model = %model_id, accuracy = run.accuracy(), "model trained and stored");
        let report = ReportAssembler::new().training(run.clone(), None);
        Ok(TrainedModel { run, model_id, report })
    }

    /// Predict every row of a stored dataset
    pub fn predict_dataset(&self, model_id: &ModelId, dataset: &str) -> Result<PredictionResult> {
        let dataset = self.datasets.load(dataset)?;
        self.predict_rows(model_id, dataset.frame())
    }

    pub fn predict_rows(&self, model_id: &ModelId, rows: &DataFrame) -> Result<PredictionResult> {
        let artifact = self.registry.load(model_id)?;
        Predictor::new(self.predictor.clone()).predict(&artifact, rows)
    }

    /// Explainability report for a stored model on a stored dataset
    pub fn explain_model(&self, model_id: &ModelId, dataset: &str) -> Result<ExplainabilityReport> {
        let artifact = self.registry.load(model_id)?;
        let dataset = self.datasets.load(dataset)?;
        ExplainabilityEngine::new(self.explain.clone()).explain(&artifact, &dataset)
    }

    /// [`Workspace::train_and_store`] under the training deadline.
    ///
    /// On timeout nothing is persisted: the background task finishes its
    /// computation but skips the store.
    pub async fn train_and_store_with_timeout(
        self: Arc<Self>,
        dataset: String,
        config: TrainingConfig,
    ) -> Result<TrainedModel> {
        let limit = self.timeouts.train();
        let state = Arc::new(Mutex::new(Commit::Pending));

        let workspace = Arc::clone(&self);
        let task_state = Arc::clone(&state);
        let mut handle =
            tokio::task::spawn_blocking(move || workspace.train_guarded(&dataset, config, &task_state));

        match tokio::time::timeout(limit, &mut handle).await {
            Ok(joined) => joined.map_err(|e| OdysseyError::Computation(format!("training task failed: {}", e)))?,
            Err(_) => {
                let committed = {
                    let mut commit = state.lock().unwrap_or_else(PoisonError::into_inner);
                    if *commit == Commit::Pending {
                        *commit = Commit::Cancelled;
                    }
                    *commit == Commit::Committed
                };
                if committed {
                    // Already stored; report the finished run
                    return handle
                        .await
                        .map_err(|e| OdysseyError::Computation(format!("training task failed: {}", e)))?;
                }
                warn!(seconds = limit.as_secs(), "training timed out");
                Err(timeout("training", limit))
            }
        }
    }

    /// [`Workspace::explain_model`] under the explain deadline
    pub async fn explain_with_timeout(
        self: Arc<Self>,
        model_id: ModelId,
        dataset: String,
    ) -> Result<ExplainabilityReport> {
        let limit = self.timeouts.explain();
        let workspace = Arc::clone(&self);
        let handle = tokio::task::spawn_blocking(move || workspace.explain_model(&model_id, &dataset));

        match tokio::time::timeout(limit, handle).await {
            Ok(joined) => joined.map_err(|e| OdysseyError::Computation(format!("explain task failed: {}", e)))?,
            Err(_) => {
                warn!(seconds = limit.as_secs(), "explainability timed out");
                Err(timeout("explainability", limit))
            }
        }
    }
}

fn timeout(operation: &str, limit: Duration) -> OdysseyError {
    OdysseyError::Timeout {
        operation: operation.to_string(),
        seconds: limit.as_secs(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SampleDataset;
    use crate::training::AlgorithmKind;

    fn workspace(dir: &std::path::Path) -> Workspace {
        Workspace::open(StoreConfig::under(dir))
            .unwrap()
            .with_explain_config(ExplainConfig::default().with_max_attribution_rows(3).with_permutations(2))
    }

    #[test]
    fn test_train_predict_explain() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());
        ws.datasets().load_sample(SampleDataset::Iris).unwrap();

        let config = TrainingConfig::new("species", AlgorithmKind::RandomForest).with_seed(1);
        let trained = ws.train_and_store("iris", config).unwrap();
        assert_eq!(trained.model_id.as_str(), "random_forest_1");
        assert!(ws.registry().exists(&trained.model_id));

        let predictions = ws.predict_dataset(&trained.model_id, "iris").unwrap();
        assert_eq!(predictions.len(), 150);

        let report = ws.explain_model(&trained.model_id, "iris").unwrap();
        assert!(report.roc.is_none());
        assert!(report.feature_importance.is_some());
    }

    #[test]
    fn test_cancelled_training_is_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());
        ws.datasets().load_sample(SampleDataset::Iris).unwrap();

        let state = Mutex::new(Commit::Cancelled);
        let config = TrainingConfig::new("species", AlgorithmKind::LogisticRegression);
        let err = ws.train_guarded("iris", config, &state).unwrap_err();
        assert!(matches!(err, OdysseyError::Timeout { .. }));
        assert!(ws.registry().list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_explain_with_timeout_completes() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Arc::new(workspace(dir.path()));
        ws.datasets().load_sample(SampleDataset::Iris).unwrap();
        let config = TrainingConfig::new("species", AlgorithmKind::LogisticRegression).with_seed(3);
        let id = Arc::clone(&ws)
            .train_and_store_with_timeout("iris".to_string(), config)
            .await
            .unwrap()
            .model_id;

        let report = ws.explain_with_timeout(id, "iris".to_string()).await.unwrap();
        assert_eq!(report.evaluated_rows, 150);
    }
}
