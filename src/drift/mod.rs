//! Two-sample comparisons between groups of a feature
//!
//! The Kolmogorov-Smirnov detector measures distribution shift; the
//! t-tests compare means. Both are used to contrast a feature's values
//! across the two classes of a binary target.

mod data_drift;

pub use data_drift::KolmogorovSmirnovTest;
pub use statistical_tests::{ln_gamma, regularized_incomplete_beta, student_t_sf, StatisticalTest, TTestResult};

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Outcome of one two-sample comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftResult {
    /// p-value fell below the detector's alpha
    pub drift_detected: bool,
    /// Test statistic
    pub score: f64,
    pub p_value: Option<f64>,
    /// Threshold the score was compared against
    pub threshold: f64,
    /// 0 when the samples agree, 1 for a shift, 2 for a shift well past the threshold
    pub severity: u8,
    pub message: String,
}

impl DriftResult {
    pub fn no_drift(score: f64, threshold: f64) -> Self {
        Self {
            drift_detected: false,
            score,
            p_value: None,
            threshold,
            severity: 0,
            message: "samples are consistent with one distribution".to_string(),
        }
    }

    pub fn drift(score: f64, threshold: f64, severity: u8, message: &str) -> Self {
        Self {
            drift_detected: true,
            score,
            p_value: None,
            threshold,
            severity,
            message: message.to_string(),
        }
    }

    pub fn with_p_value(mut self, p_value: f64) -> Self {
        self.p_value = Some(p_value);
        self
    }
}

/// Two-sample detector over raw feature values
pub trait DriftDetector: Send + Sync {
    /// Compare `test` against `reference`
    fn detect(&self, reference: &[f64], test: &[f64]) -> Result<DriftResult>;

    fn alpha(&self) -> f64;
}
