//! Directory-backed model registry
//!
//! One artifact per file, named `{algorithm}_{seed}.bin`. Writes are atomic
//! so readers never see a partially written model, and the schema travels
//! in the same file as the fitted state.

use crate::error::{OdysseyError, Result};
use crate::training::{AlgorithmKind, Capabilities, ModelArtifact, ModelId, TrainingMetadata};
use crate::utils::{self, fs::is_temp_file};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const SUFFIX: &str = ".bin";

/// A stored artifact file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRef {
    pub id: ModelId,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: DateTime<Utc>,
}

/// Descriptive view of a stored model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: ModelId,
    pub algorithm: AlgorithmKind,
    pub algorithm_name: String,
    pub hyperparameters: serde_json::Value,
    pub feature_importance: Option<Vec<(String, f64)>>,
    pub feature_names: Vec<String>,
    pub target_column: String,
    pub class_labels: Vec<String>,
    pub capabilities: Capabilities,
    pub metadata: TrainingMetadata,
}

impl ModelInfo {
    pub fn from_artifact(artifact: &ModelArtifact) -> Result<Self> {
        Ok(Self {
            id: artifact.id(),
            algorithm: artifact.algorithm,
            algorithm_name: artifact.algorithm.display_name().to_string(),
            hyperparameters: artifact.model.hyperparameters()?,
            feature_importance: artifact.importance_pairs(),
            feature_names: artifact.feature_names.clone(),
            target_column: artifact.target_column.clone(),
            class_labels: artifact.class_labels.labels.clone(),
            capabilities: artifact.capabilities,
            metadata: artifact.metadata.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    root: PathBuf,
}

impl ModelRegistry {
    /// Open the registry, creating its directory if needed
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| {
            OdysseyError::Data(format!("failed to create model dir {}: {}", root.display(), e))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, id: &ModelId) -> PathBuf {
        self.root.join(id.file_name())
    }

    /// Validate and persist an artifact. An existing artifact with the same
    /// id is replaced.
    #[tracing::instrument(skip_all, fields(model = %artifact.id()))]
    pub fn store(&self, artifact: &ModelArtifact) -> Result<ModelId> {
        artifact.validate()?;
        let id = artifact.id();
        let path = self.path_of(&id);
        let bytes = artifact.to_bytes()?;

        utils::write_atomic(&path, &bytes).map_err(|e| {
            OdysseyError::Data(format!("failed to write {}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), bytes = bytes.len(), "model stored");
        Ok(id)
    }

    /// Stored artifacts sorted by id. Contents are not decoded.
    pub fn list(&self) -> Result<Vec<ModelRef>> {
        let mut refs = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_temp_file(&name) || !entry.file_type()?.is_file() {
                continue;
            }
            let Some(stem) = name.strip_suffix(SUFFIX) else {
                continue;
            };
            let Ok(id) = ModelId::parse(stem) else {
                continue;
            };
            let meta = entry.metadata()?;
            refs.push(ModelRef {
                id,
                path: entry.path(),
                size_bytes: meta.len(),
                modified: DateTime::<Utc>::from(meta.modified()?),
            });
        }
        refs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(refs)
    }

    pub fn exists(&self, id: &ModelId) -> bool {
        self.path_of(id).is_file()
    }

    /// Load and validate an artifact
    pub fn load(&self, id: &ModelId) -> Result<ModelArtifact> {
        let path = self.path_of(id);
        if !path.is_file() {
            return Err(OdysseyError::model_load(id, "no such model"));
        }
        let bytes = fs::read(&path).map_err(|e| OdysseyError::model_load(id, e))?;
        let artifact = ModelArtifact::from_bytes(id, &bytes)?;
        if artifact.id() != *id {
            return Err(OdysseyError::model_load(
                id,
                format!("file holds model {}", artifact.id()),
            ));
        }
        debug!(model = %id, features = artifact.feature_names.len(), "model loaded");
        Ok(artifact)
    }

    pub fn info(&self, id: &ModelId) -> Result<ModelInfo> {
        ModelInfo::from_artifact(&self.load(id)?)
    }

    /// Remove a stored artifact
    pub fn delete(&self, id: &ModelId) -> Result<()> {
        let path = self.path_of(id);
        if !path.exists() {
            return Err(OdysseyError::model_load(id, "no such model"));
        }
        fs::remove_file(&path).map_err(|e| OdysseyError::Deletion {
            name: id.file_name(),
            reason: e.to_string(),
        })?;
        info!(model = %id, "model deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dataset;
    use crate::training::train;
    use polars::prelude::*;

    fn trained(seed: u64) -> ModelArtifact {
        let a: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let b: Vec<f64> = (0..40).map(|i| ((i * 3) % 7) as f64).collect();
        let y: Vec<i64> = (0..40).map(|i| (i >= 20) as i64).collect();
        let dataset = Dataset::new("toy", df!("a" => a, "b" => b, "y" => y).unwrap());
        train(&dataset, "y", AlgorithmKind::LogisticRegression, 0.25, seed).unwrap().1
    }

    #[test]
    fn test_delete_surfaces_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path()).unwrap();
        let id = ModelId::parse("svm_1").unwrap();
        fs::create_dir(dir.path().join(id.file_name())).unwrap();

        match registry.delete(&id) {
            Err(OdysseyError::Deletion { name, .. }) => assert_eq!(name, "svm_1.bin"),
            other => panic!("expected a deletion error, got {:?}", other),
        }
        assert!(dir.path().join("svm_1.bin").is_dir());
    }

    #[test]
    fn test_store_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path()).unwrap();
        let artifact = trained(42);

        let id = registry.store(&artifact).unwrap();
        assert_eq!(id.as_str(), "logistic_regression_42");
        assert!(dir.path().join("logistic_regression_42.bin").is_file());

        let loaded = registry.load(&id).unwrap();
        assert_eq!(loaded.feature_names, artifact.feature_names);
        assert_eq!(loaded.target_column, artifact.target_column);
        assert_eq!(loaded.class_labels, artifact.class_labels);
    }

    #[test]
    fn test_list_skips_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path()).unwrap();
        registry.store(&trained(2)).unwrap();
        registry.store(&trained(1)).unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let ids: Vec<String> = registry.list().unwrap().into_iter().map(|r| r.id.to_string()).collect();
        assert_eq!(ids, vec!["logistic_regression_1", "logistic_regression_2"]);
    }

    #[test]
    fn test_corrupt_and_missing_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path()).unwrap();
        let id = ModelId::parse("random_forest_9").unwrap();

        assert!(matches!(registry.load(&id), Err(OdysseyError::ModelLoad { .. })));

        fs::write(dir.path().join("random_forest_9.bin"), b"not a model").unwrap();
        assert!(matches!(registry.load(&id), Err(OdysseyError::ModelLoad { .. })));
    }

    #[test]
    fn test_info_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path()).unwrap();
        let id = registry.store(&trained(5)).unwrap();

        let info = registry.info(&id).unwrap();
        assert_eq!(info.algorithm_name, "Logistic Regression");
        assert_eq!(info.feature_names, vec!["a", "b"]);
        assert_eq!(info.class_labels, vec!["0", "1"]);
        assert!(info.feature_importance.is_some());
        assert!(info.hyperparameters.get("max_iter").is_some());

        registry.delete(&id).unwrap();
        assert!(!registry.exists(&id));
        assert!(matches!(registry.delete(&id), Err(OdysseyError::ModelLoad { .. })));
    }
}
