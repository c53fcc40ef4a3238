//! Configuration for stores, training, explainability and timeouts
//!
//! Defaults read `ODYSSEY_*` environment variables and fall back to
//! built-in values when a variable is unset or unparseable.

use crate::drift::StatisticalTest;
use crate::explainability::CorrelationMethod;
use crate::training::{AlgorithmKind, Hyperparameters};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Locations of the on-disk dataset and model stores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub datasets_dir: PathBuf,
    pub models_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            datasets_dir: std::env::var("ODYSSEY_DATASETS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./datasets")),
            models_dir: std::env::var("ODYSSEY_MODELS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./models")),
        }
    }
}

impl StoreConfig {
    /// Both stores under a single root: `<root>/datasets` and `<root>/models`
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            datasets_dir: root.join("datasets"),
            models_dir: root.join("models"),
        }
    }
}

/// Training configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Column to predict
    pub target_column: String,
    /// Algorithm to fit
    pub algorithm: AlgorithmKind,
    /// Explicit feature columns; every non-target column when `None`
    pub feature_columns: Option<Vec<String>>,
    /// Columns dropped from the feature set, e.g. ones with missing values
    #[serde(default)]
    pub excluded_columns: Vec<String>,
    /// Fraction of rows held out for evaluation, in (0, 1)
    pub test_fraction: f64,
    /// Seed for the split and for stochastic algorithms
    pub seed: u64,
    /// Per-algorithm hyperparameters
    pub hyperparameters: Hyperparameters,
}

impl TrainingConfig {
    pub fn new(target_column: impl Into<String>, algorithm: AlgorithmKind) -> Self {
        Self {
            target_column: target_column.into(),
            algorithm,
            feature_columns: None,
            excluded_columns: Vec::new(),
            test_fraction: env_or("ODYSSEY_TEST_FRACTION", 0.2),
            seed: env_or("ODYSSEY_SEED", 42),
            hyperparameters: Hyperparameters::default(),
        }
    }

    pub fn with_test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = fraction;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_features(mut self, features: Vec<String>) -> Self {
        self.feature_columns = Some(features);
        self
    }

    pub fn with_excluded(mut self, columns: Vec<String>) -> Self {
        self.excluded_columns = columns;
        self
    }

    pub fn with_hyperparameters(mut self, hyperparameters: Hyperparameters) -> Self {
        self.hyperparameters = hyperparameters;
        self
    }
}

/// Explainability report configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainConfig {
    /// Maximum number of rows that receive a per-row attribution
    pub max_attribution_rows: usize,
    /// Sampled feature permutations per explained row
    pub permutations: usize,
    /// Background rows used as the attribution baseline
    pub background_size: usize,
    /// Seed for row, background and permutation sampling
    pub seed: u64,
    /// Compute the ROC curve when the target is binary and the model has probabilities
    pub include_roc: bool,
    /// Per-feature two-sample test against the binary target
    pub statistical_test: StatisticalTest,
    pub correlation: CorrelationMethod,
    /// Bins per feature histogram
    pub histogram_bins: usize,
    /// Significance level for the drift summary
    pub drift_alpha: f64,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            max_attribution_rows: env_or("ODYSSEY_ATTRIBUTION_ROWS", 50),
            permutations: env_or("ODYSSEY_ATTRIBUTION_PERMUTATIONS", 32),
            background_size: 50,
            seed: 42,
            include_roc: true,
            statistical_test: StatisticalTest::default(),
            correlation: CorrelationMethod::default(),
            histogram_bins: 10,
            drift_alpha: 0.05,
        }
    }
}

impl ExplainConfig {
    pub fn with_max_attribution_rows(mut self, rows: usize) -> Self {
        self.max_attribution_rows = rows;
        self
    }

    pub fn with_permutations(mut self, permutations: usize) -> Self {
        self.permutations = permutations;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_statistical_test(mut self, test: StatisticalTest) -> Self {
        self.statistical_test = test;
        self
    }

    pub fn with_roc(mut self, include_roc: bool) -> Self {
        self.include_roc = include_roc;
        self
    }

    pub fn with_correlation(mut self, method: CorrelationMethod) -> Self {
        self.correlation = method;
        self
    }
}

/// Deadlines for long-running operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub train_secs: u64,
    pub explain_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            train_secs: env_or("ODYSSEY_TRAIN_TIMEOUT_SECS", 600),
            explain_secs: env_or("ODYSSEY_EXPLAIN_TIMEOUT_SECS", 300),
        }
    }
}

impl TimeoutConfig {
    pub fn train(&self) -> Duration {
        Duration::from_secs(self.train_secs)
    }

    pub fn explain(&self) -> Duration {
        Duration::from_secs(self.explain_secs)
    }
}
