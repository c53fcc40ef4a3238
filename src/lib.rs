//! Odyssey - tabular classifier lifecycle
//!
//! This crate trains classifiers on stored CSV datasets, persists them with
//! their feature schema, applies them to new rows and explains them.
//!
//! # Modules
//!
//! ## Core
//! - [`data`] - Dataset store, schema inference and sample datasets
//! - [`training`] - Classifiers, seeded training and artifacts
//! - [`registry`] - Directory-backed model registry
//! - [`inference`] - Schema-checked prediction
//! - [`explainability`] - Importance, SHAP-like attribution, ROC and data quality
//! - [`drift`] - Two-sample statistical tests
//! - [`report`] - Report payloads for presentation layers
//!
//! ## Application
//! - [`workspace`] - Application state with timeout-bounded operations
//! - [`cli`] - Command-line interface
//!
//! ## Support
//! - [`config`] - Store, training, explainability and timeout settings
//! - [`error`] - Error type
//! - [`utils`] - CSV and filesystem helpers

// Core error handling
pub mod config;
pub mod error;

// Core lifecycle
pub mod data;
pub mod training;
pub mod registry;
pub mod inference;

// Reporting
pub mod explainability;
pub mod drift;
pub mod report;

// Application
pub mod workspace;
pub mod cli;

// Utilities
pub mod utils;

pub use error::{OdysseyError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{OdysseyError, Result};

    // Configuration
    pub use crate::config::{ExplainConfig, StoreConfig, TimeoutConfig, TrainingConfig};

    // Datasets
    pub use crate::data::{Dataset, DatasetStore, SampleDataset};

    // Training
    pub use crate::training::{AlgorithmKind, ModelArtifact, ModelId, ModelTrainer, TrainingRun};

    // Registry and inference
    pub use crate::inference::{PredictionResult, Predictor};
    pub use crate::registry::{ModelInfo, ModelRegistry};

    // Explainability
    pub use crate::explainability::{ExplainabilityEngine, ExplainabilityReport};

    // Reports
    pub use crate::report::{ReportAssembler, ReportPayload};

    // Application state
    pub use crate::workspace::Workspace;
}
