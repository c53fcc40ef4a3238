//! Inference module
//!
//! Applies a stored model to new rows. Input columns are validated against
//! the artifact's feature names and reordered before prediction.

mod config;
mod predictor;

pub use config::PredictorConfig;
pub use predictor::{predict, PredictionResult, PredictionSummary, Predictor, PREDICTIONS_COLUMN};
