//! Classification metrics

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Confusion matrix over every known class. Rows are actual classes,
/// columns are predicted classes, both in label order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<String>,
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    /// Sum of all cells
    pub fn total(&self) -> usize {
        self.counts.iter().map(|row| row.iter().sum::<usize>()).sum()
    }

    fn correct(&self) -> usize {
        (0..self.counts.len()).map(|i| self.counts[i][i]).sum()
    }
}

/// Precision, recall and F1 for one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassReport {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    /// Actual rows of this class
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AverageScores {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

/// Metrics for one evaluation split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub confusion_matrix: ConfusionMatrix,
    pub report: Vec<ClassReport>,
    pub macro_avg: AverageScores,
    pub weighted_avg: AverageScores,
    pub n_samples: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl ClassificationMetrics {
    /// Compute metrics from class codes. `labels[c]` names code `c`;
    /// codes outside the label range are ignored.
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>, labels: &[String]) -> Self {
        let k = labels.len();
        let mut counts = vec![vec![0usize; k]; k];
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            let (t, p) = (t as usize, p as usize);
            if t < k && p < k {
                counts[t][p] += 1;
            }
        }
        let confusion_matrix = ConfusionMatrix {
            labels: labels.to_vec(),
            counts,
        };

        let report: Vec<ClassReport> = (0..k)
            .map(|c| {
                let tp = confusion_matrix.counts[c][c];
                let support: usize = confusion_matrix.counts[c].iter().sum();
                let predicted: usize = confusion_matrix.counts.iter().map(|row| row[c]).sum();

                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let f1_score = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };

                ClassReport {
                    label: labels[c].clone(),
                    precision,
                    recall,
                    f1_score,
                    support,
                }
            })
            .collect();

        let n_samples = confusion_matrix.total();
        let accuracy = ratio(confusion_matrix.correct(), n_samples);

        let macro_avg = AverageScores {
            precision: mean(report.iter().map(|r| r.precision), k),
            recall: mean(report.iter().map(|r| r.recall), k),
            f1_score: mean(report.iter().map(|r| r.f1_score), k),
        };

        let weight = |f: fn(&ClassReport) -> f64| -> f64 {
            if n_samples == 0 {
                return 0.0;
            }
            report.iter().map(|r| f(r) * r.support as f64).sum::<f64>() / n_samples as f64
        };
        let weighted_avg = AverageScores {
            precision: weight(|r| r.precision),
            recall: weight(|r| r.recall),
            f1_score: weight(|r| r.f1_score),
        };

        Self {
            accuracy,
            confusion_matrix,
            report,
            macro_avg,
            weighted_avg,
            n_samples,
        }
    }
}

fn mean(values: impl Iterator<Item = f64>, n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        values.sum::<f64>() / n as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_binary_metrics() {
        let y_true = array![0.0, 0.0, 1.0, 1.0, 1.0];
        let y_pred = array![0.0, 1.0, 1.0, 1.0, 0.0];
        let m = ClassificationMetrics::compute(&y_true, &y_pred, &labels(&["no", "yes"]));

        assert_eq!(m.confusion_matrix.counts, vec![vec![1, 1], vec![1, 2]]);
        assert_eq!(m.confusion_matrix.total(), 5);
        assert!((m.accuracy - 0.6).abs() < 1e-12);

        let yes = &m.report[1];
        assert_eq!(yes.label, "yes");
        assert!((yes.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((yes.recall - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(yes.support, 3);
    }

    #[test]
    fn test_absent_class_scores_zero() {
        let y_true = array![0.0, 0.0, 1.0];
        let y_pred = array![0.0, 0.0, 1.0];
        let m = ClassificationMetrics::compute(&y_true, &y_pred, &labels(&["a", "b", "c"]));

        assert_eq!(m.confusion_matrix.counts.len(), 3);
        assert_eq!(m.report[2].support, 0);
        assert_eq!(m.report[2].f1_score, 0.0);
        assert_eq!(m.accuracy, 1.0);
        assert!((m.macro_avg.recall - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(m.weighted_avg.recall, 1.0);
    }

    #[test]
    fn test_empty_split() {
        let empty = Array1::<f64>::zeros(0);
        let m = ClassificationMetrics::compute(&empty, &empty, &labels(&["a", "b"]));
        assert_eq!(m.accuracy, 0.0);
        assert_eq!(m.n_samples, 0);
    }
}
