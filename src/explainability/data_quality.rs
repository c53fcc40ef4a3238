//! Data quality sections: missing values, correlations, class-split histograms

use serde::{Deserialize, Serialize};

/// Correlation coefficient used for the correlation matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CorrelationMethod {
    #[default]
    Pearson,
    /// Pearson on average ranks
    Spearman,
}

/// Missing values in one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingValues {
    pub column: String,
    pub missing: usize,
    pub fraction: f64,
}

impl MissingValues {
    pub fn new(column: impl Into<String>, missing: usize, rows: usize) -> Self {
        let fraction = if rows == 0 { 0.0 } else { missing as f64 / rows as f64 };
        Self {
            column: column.into(),
            missing,
            fraction,
        }
    }
}

/// Symmetric matrix over `columns`; `None` where the coefficient is undefined
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub method: CorrelationMethod,
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    /// Pairwise-complete correlations between the given columns
    pub fn compute(method: CorrelationMethod, columns: Vec<String>, data: &[Vec<Option<f64>>]) -> Self {
        let n = data.len();
        let mut values = vec![vec![None; n]; n];
        for i in 0..n {
            for j in i..n {
                let r = pairwise(method, &data[i], &data[j]);
                values[i][j] = r;
                values[j][i] = r;
            }
        }
        Self { method, columns, values }
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        self.values[i][j]
    }
}

fn pairwise(method: CorrelationMethod, a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .unzip();
    match method {
        CorrelationMethod::Pearson => pearson(&xs, &ys),
        CorrelationMethod::Spearman => pearson(&average_ranks(&xs), &average_ranks(&ys)),
    }
}

/// Pearson correlation; `None` for fewer than two pairs or a constant input
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len();
    if n < 2 || n != y.len() {
        return None;
    }
    // Scale invariant; unit-magnitude values keep the sums finite
    let magnitude = |v: &[f64]| v.iter().fold(0.0f64, |m, a| m.max(a.abs()));
    let (kx, ky) = (magnitude(x), magnitude(y));
    if kx == 0.0 || ky == 0.0 || !kx.is_finite() || !ky.is_finite() {
        return None;
    }
    let mx = x.iter().map(|a| a / kx).sum::<f64>() / n as f64;
    let my = y.iter().map(|b| b / ky).sum::<f64>() / n as f64;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a / kx - mx, b / ky - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let denom = (sxx * syy).sqrt();
    if denom <= f64::EPSILON || !denom.is_finite() {
        return None;
    }
    Some((sxy / denom).clamp(-1.0, 1.0))
}

/// 1-based ranks with ties sharing their average rank
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        i = j + 1;
    }
    ranks
}

/// Bin counts of one target class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassHistogram {
    pub label: String,
    pub counts: Vec<usize>,
}

/// Histogram of a feature per target class over shared bin edges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDistribution {
    pub feature: String,
    /// `bins + 1` ascending edges; the last bin is closed on the right
    pub edges: Vec<f64>,
    pub classes: Vec<ClassHistogram>,
}

impl FeatureDistribution {
    /// `groups[c]` holds the feature values of rows in class `labels[c]`.
    /// Returns `None` when there are no values at all.
    pub fn compute(feature: &str, labels: &[String], groups: &[Vec<f64>], bins: usize) -> Option<Self> {
        let bins = bins.max(1);
        let (lo, hi) = groups
            .iter()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if !lo.is_finite() || !hi.is_finite() {
            return None;
        }
        let (lo, hi) = if hi > lo { (lo, hi) } else { (lo - 0.5, hi + 0.5) };
        let width = (hi - lo) / bins as f64;
        let edges = (0..=bins).map(|i| lo + width * i as f64).collect();

        let classes = labels
            .iter()
            .zip(groups)
            .map(|(label, values)| {
                let mut counts = vec![0usize; bins];
                for &v in values {
                    let bin = (((v - lo) / width) as usize).min(bins - 1);
                    counts[bin] += 1;
                }
                ClassHistogram {
                    label: label.clone(),
                    counts,
                }
            })
            .collect();

        Some(Self {
            feature: feature.to_string(),
            edges,
            classes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pearson_perfect_and_undefined() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        assert!((pearson(&x, &y).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(pearson(&x, &[1.0, 1.0, 1.0, 1.0]), None);
        assert_eq!(pearson(&[1.0], &[2.0]), None);
    }

    #[test]
    fn test_pearson_with_extreme_magnitudes() {
        let x = [-1e300, -0.5e300, 0.5e300, 1e300];
        let y = [0.0, 0.0, 1.0, 1.0];
        let r = pearson(&x, &y).unwrap();
        assert!(r > 0.8 && r <= 1.0);
    }

    #[test]
    fn test_average_ranks_with_ties() {
        assert_eq!(average_ranks(&[10.0, 20.0, 10.0, 30.0]), vec![1.5, 3.0, 1.5, 4.0]);
    }

    #[test]
    fn test_spearman_is_rank_based() {
        let data = vec![
            vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)],
            vec![Some(1.0), Some(8.0), Some(27.0), Some(64.0)],
        ];
        let names = vec!["x".to_string(), "y".to_string()];
        let spearman = CorrelationMatrix::compute(CorrelationMethod::Spearman, names.clone(), &data);
        let pearson = CorrelationMatrix::compute(CorrelationMethod::Pearson, names, &data);
        assert!((spearman.get("x", "y").unwrap() - 1.0).abs() < 1e-12);
        assert!(pearson.get("x", "y").unwrap() < 1.0);
        assert_eq!(spearman.get("x", "x"), Some(1.0));
    }

    #[test]
    fn test_correlation_skips_missing_pairs() {
        let data = vec![
            vec![Some(1.0), None, Some(3.0), Some(4.0)],
            vec![Some(2.0), Some(100.0), Some(6.0), Some(8.0)],
        ];
        let m = CorrelationMatrix::compute(CorrelationMethod::Pearson, vec!["a".into(), "b".into()], &data);
        assert!((m.values[0][1].unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_histogram_shares_edges() {
        let labels = vec!["no".to_string(), "yes".to_string()];
        let groups = vec![vec![0.0, 0.5, 1.0], vec![8.0, 9.0, 10.0]];
        let dist = FeatureDistribution::compute("age", &labels, &groups, 5).unwrap();
        assert_eq!(dist.edges.len(), 6);
        assert_eq!(dist.edges[0], 0.0);
        assert_eq!(dist.edges[5], 10.0);
        assert_eq!(dist.classes[0].counts, vec![3, 0, 0, 0, 0]);
        assert_eq!(dist.classes[1].counts, vec![0, 0, 0, 0, 3]);
    }

    #[test]
    fn test_histogram_of_constant_feature() {
        let labels = vec!["a".to_string()];
        let dist = FeatureDistribution::compute("c", &labels, &[vec![3.0, 3.0]], 4).unwrap();
        assert_eq!(dist.classes[0].counts.iter().sum::<usize>(), 2);
        assert!(FeatureDistribution::compute("c", &labels, &[vec![]], 4).is_none());
    }

    #[test]
    fn test_missing_fraction() {
        let m = MissingValues::new("age", 3, 12);
        assert_eq!(m.fraction, 0.25);
        assert_eq!(MissingValues::new("x", 0, 0).fraction, 0.0);
    }
}
