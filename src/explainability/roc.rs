//! ROC curve and AUC for binary targets

use crate::error::{OdysseyError, Result};
use serde::{Deserialize, Serialize};

/// One operating point of the curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    pub fpr: f64,
    pub tpr: f64,
    /// Score threshold; `None` for the origin, where nothing is predicted positive
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    pub points: Vec<RocPoint>,
    pub auc: f64,
}

impl RocCurve {
    /// Build the curve from positive-class scores and binary truth.
    ///
    /// Tied scores produce a single point.
    pub fn compute(scores: &[f64], positives: &[bool]) -> Result<Self> {
        if scores.len() != positives.len() {
            return Err(OdysseyError::explain(
                "roc",
                format!("{} scores for {} labels", scores.len(), positives.len()),
            ));
        }
        if scores.iter().any(|s| !s.is_finite()) {
            return Err(OdysseyError::explain("roc", "non-finite score"));
        }

        let n_pos = positives.iter().filter(|&&p| p).count();
        let n_neg = positives.len() - n_pos;
        if n_pos == 0 || n_neg == 0 {
            return Err(OdysseyError::explain("roc", "both classes must be present"));
        }

        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

        let mut points = vec![RocPoint {
            fpr: 0.0,
            tpr: 0.0,
            threshold: None,
        }];
        let (mut tp, mut fp) = (0usize, 0usize);
        let mut i = 0;
        while i < order.len() {
            let threshold = scores[order[i]];
            while i < order.len() && scores[order[i]] == threshold {
                if positives[order[i]] {
                    tp += 1;
                } else {
                    fp += 1;
                }
                i += 1;
            }
            points.push(RocPoint {
                fpr: fp as f64 / n_neg as f64,
                tpr: tp as f64 / n_pos as f64,
                threshold: Some(threshold),
            });
        }

        let auc = points
            .windows(2)
            .map(|w| (w[1].fpr - w[0].fpr) * (w[1].tpr + w[0].tpr) / 2.0)
            .sum();

        Ok(Self { points, auc })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_ranking() {
        let roc = RocCurve::compute(&[0.9, 0.8, 0.3, 0.1], &[true, true, false, false]).unwrap();
        assert!((roc.auc - 1.0).abs() < 1e-12);
        assert_eq!(roc.points.first().unwrap().threshold, None);
        let last = roc.points.last().unwrap();
        assert_eq!((last.fpr, last.tpr), (1.0, 1.0));
    }

    #[test]
    fn test_inverted_ranking() {
        let roc = RocCurve::compute(&[0.1, 0.2, 0.8, 0.9], &[true, true, false, false]).unwrap();
        assert!(roc.auc.abs() < 1e-12);
    }

    #[test]
    fn test_ties_collapse_to_one_point() {
        let roc = RocCurve::compute(&[0.5, 0.5, 0.5, 0.5], &[true, false, true, false]).unwrap();
        assert_eq!(roc.points.len(), 2);
        assert!((roc.auc - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_single_class_is_an_error() {
        let err = RocCurve::compute(&[0.2, 0.4], &[true, true]).unwrap_err();
        assert!(matches!(err, OdysseyError::ExplainabilityComputation { .. }));
    }
}
