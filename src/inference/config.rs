//! Prediction configuration

use serde::{Deserialize, Serialize};

/// Configuration for batch prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorConfig {
    /// Rows per model call
    pub batch_size: usize,

    /// Number of parallel workers (defaults to the rayon pool size)
    pub n_workers: Option<usize>,

    /// Also compute class probabilities when the model supports them
    pub output_probabilities: bool,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            n_workers: None,
            output_probabilities: true,
        }
    }
}

impl PredictorConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_probabilities(mut self, enabled: bool) -> Self {
        self.output_probabilities = enabled;
        self
    }
}
