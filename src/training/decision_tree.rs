//! CART decision tree used standalone by ensembles
//!
//! Classification trees expect class codes `0..n_classes` as f64 targets.
//! Regression trees fit continuous targets (boosting residuals).

use crate::error::{OdysseyError, Result};
use ndarray::{Array1, Array2};
use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value and class distribution
    Leaf {
        value: f64,
        /// Class fractions at this leaf (empty for regression)
        distribution: Vec<f64>,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Entropy (classification)
    Entropy,
    /// Mean squared error (regression)
    MSE,
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features sampled at each split; all when `None`
    pub max_features: Option<usize>,
    pub criterion: Criterion,
    /// Seed for per-split feature sampling
    pub random_state: Option<u64>,
    n_features: usize,
    n_classes: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

/// Running sums for one side of a candidate split
#[derive(Clone)]
struct SideStats {
    count: usize,
    sum: f64,
    sq_sum: f64,
    class_counts: Vec<usize>,
}

impl SideStats {
    fn new(n_classes: usize) -> Self {
        Self {
            count: 0,
            sum: 0.0,
            sq_sum: 0.0,
            class_counts: vec![0; n_classes],
        }
    }

    fn add(&mut self, y: f64, classify: bool) {
        self.count += 1;
        self.sum += y;
        self.sq_sum += y * y;
        if classify {
            self.class_counts[y as usize] += 1;
        }
    }

    fn remove(&mut self, y: f64, classify: bool) {
        self.count -= 1;
        self.sum -= y;
        self.sq_sum -= y * y;
        if classify {
            self.class_counts[y as usize] -= 1;
        }
    }
}

impl DecisionTree {
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: None,
            n_features: 0,
            n_classes: 0,
            feature_importances: None,
        }
    }

    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::MSE,
            ..Self::new_classifier()
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features.max(1));
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    fn is_classification(&self) -> bool {
        self.criterion != Criterion::MSE
    }

    /// Fit the tree. Classification targets must be non-negative class codes.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        self.fit_with_classes(x, y, None)
    }

    /// Fit a classification tree whose leaf distributions span `n_classes`
    /// even when some classes are absent from `y` (bootstrap samples).
    pub fn fit_with_classes(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        n_classes: Option<usize>,
    ) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(OdysseyError::Shape {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(OdysseyError::InvalidInput("cannot fit a tree on zero samples".to_string()));
        }

        self.n_features = n_features;
        self.n_classes = 0;
        if self.is_classification() {
            if let Some(bad) = y.iter().find(|v| **v < 0.0 || v.fract() != 0.0) {
                return Err(OdysseyError::InvalidInput(format!(
                    "classification tree expects class codes, got {}",
                    bad
                )));
            }
            let observed = y.iter().fold(0.0f64, |m, &v| m.max(v)) as usize + 1;
            self.n_classes = n_classes.unwrap_or(observed).max(observed);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(0));
        let mut importances = vec![0.0; n_features];
        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_tree(x, y, &indices, 0, &mut importances, &mut rng));

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let mut stats = SideStats::new(self.n_classes);
        for &i in indices {
            stats.add(y[i], self.is_classification());
        }
        let parent_impurity = self.impurity(&stats);

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || parent_impurity <= 1e-12;

        if should_stop {
            return self.leaf(&stats);
        }

        let features = self.candidate_features(rng);
        let Some((feature, threshold, gain)) = self.find_best_split(x, y, indices, &features, parent_impurity)
        else {
            return self.leaf(&stats);
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, feature]] <= threshold);

        importances[feature] += n_samples as f64 * gain;

        let left = Box::new(self.build_tree(x, y, &left_indices, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(x, y, &right_indices, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx: feature,
            threshold,
            left,
            right,
            n_samples,
        }
    }

    fn candidate_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        match self.max_features {
            Some(k) if k < self.n_features => {
                let mut picked = index::sample(rng, self.n_features, k).into_vec();
                picked.sort_unstable();
                picked
            }
            _ => (0..self.n_features).collect(),
        }
    }

    /// Best (feature, threshold, gain) over the candidate features.
    /// Each feature is scanned independently in sorted order.
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        features: &[usize],
        parent_impurity: f64,
    ) -> Option<(usize, f64, f64)> {
        let classify = self.is_classification();
        let n = indices.len() as f64;

        let feature_results: Vec<Option<(usize, f64, f64)>> = features
            .par_iter()
            .map(|&feature_idx| {
                let mut order: Vec<usize> = indices.to_vec();
                order.sort_by(|&a, &b| x[[a, feature_idx]].total_cmp(&x[[b, feature_idx]]));

                let mut left = SideStats::new(self.n_classes);
                let mut right = SideStats::new(self.n_classes);
                for &i in &order {
                    right.add(y[i], classify);
                }

                let mut best: Option<(f64, f64)> = None;
                for pos in 0..order.len() - 1 {
                    let i = order[pos];
                    left.add(y[i], classify);
                    right.remove(y[i], classify);

                    let current = x[[i, feature_idx]];
                    let next = x[[order[pos + 1], feature_idx]];
                    if next <= current {
                        continue;
                    }
                    if left.count < self.min_samples_leaf || right.count < self.min_samples_leaf {
                        continue;
                    }

                    let weighted = (left.count as f64 * self.impurity(&left)
                        + right.count as f64 * self.impurity(&right))
                        / n;
                    let gain = parent_impurity - weighted;
                    if gain > best.map_or(1e-12, |(g, _)| g) {
                        best = Some((gain, (current + next) / 2.0));
                    }
                }

                best.map(|(gain, threshold)| (feature_idx, threshold, gain))
            })
            .collect();

        // First feature wins ties so results do not depend on thread scheduling
        feature_results
            .into_iter()
            .flatten()
            .fold(None, |acc: Option<(usize, f64, f64)>, cand| match acc {
                Some(a) if a.2 >= cand.2 => Some(a),
                _ => Some(cand),
            })
    }

    fn impurity(&self, stats: &SideStats) -> f64 {
        if stats.count == 0 {
            return 0.0;
        }
        let n = stats.count as f64;
        match self.criterion {
            Criterion::Gini => {
                1.0 - stats
                    .class_counts
                    .iter()
                    .map(|&c| (c as f64 / n).powi(2))
                    .sum::<f64>()
            }
            Criterion::Entropy => -stats
                .class_counts
                .iter()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / n;
                    p * p.ln()
                })
                .sum::<f64>(),
            Criterion::MSE => (stats.sq_sum / n - (stats.sum / n).powi(2)).max(0.0),
        }
    }

    fn leaf(&self, stats: &SideStats) -> TreeNode {
        let n = stats.count.max(1) as f64;
        if self.is_classification() {
            let distribution: Vec<f64> = stats.class_counts.iter().map(|&c| c as f64 / n).collect();
            // Lowest class code wins ties
            let value = stats
                .class_counts
                .iter()
                .enumerate()
                .fold((0usize, 0usize), |best, (class, &count)| {
                    if count > best.1 {
                        (class, count)
                    } else {
                        best
                    }
                })
                .0 as f64;
            TreeNode::Leaf {
                value,
                distribution,
                n_samples: stats.count,
            }
        } else {
            TreeNode::Leaf {
                value: stats.sum / n,
                distribution: Vec::new(),
                n_samples: stats.count,
            }
        }
    }

    fn check_input(&self, x: &Array2<f64>) -> Result<&TreeNode> {
        let root = self.root.as_ref().ok_or(OdysseyError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(OdysseyError::Shape {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(root)
    }

    fn find_leaf<'a>(node: &'a TreeNode, x: &Array2<f64>, row: usize) -> &'a TreeNode {
        match node {
            TreeNode::Leaf { .. } => node,
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
                ..
            } => {
                if x[[row, *feature_idx]] <= *threshold {
                    Self::find_leaf(left, x, row)
                } else {
                    Self::find_leaf(right, x, row)
                }
            }
        }
    }

    /// Predict class codes (classification) or values (regression)
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.check_input(x)?;
        Ok((0..x.nrows())
            .map(|i| match Self::find_leaf(root, x, i) {
                TreeNode::Leaf { value, .. } => *value,
                TreeNode::Split { .. } => 0.0,
            })
            .collect())
    }

    /// Leaf class fractions, shape (n_samples, n_classes)
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let root = self.check_input(x)?;
        if !self.is_classification() {
            return Err(OdysseyError::InvalidInput(
                "predict_proba is only available for classification trees".to_string(),
            ));
        }

        let mut proba = Array2::zeros((x.nrows(), self.n_classes));
        for i in 0..x.nrows() {
            if let TreeNode::Leaf { distribution, .. } = Self::find_leaf(root, x, i) {
                for (j, &p) in distribution.iter().enumerate() {
                    proba[[i, j]] = p;
                }
            }
        }
        Ok(proba)
    }

    /// Normalized impurity-decrease importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }

    pub fn get_n_leaves(&self) -> usize {
        fn leaves(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => leaves(left) + leaves(right),
            }
        }
        self.root.as_ref().map_or(0, leaves)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_separates_classes() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.get_n_leaves(), 2);
    }

    #[test]
    fn test_regressor_simple() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut tree = DecisionTree::new_regressor();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        let mse: f64 = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / y.len() as f64;
        assert!(mse < 1e-9, "MSE too high: {}", mse);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![0.0, 1.0, 0.0, 1.0];

        let mut tree = DecisionTree::new_classifier().with_max_depth(2);
        tree.fit(&x, &y).unwrap();

        assert!(tree.get_depth() <= 3);
    }

    #[test]
    fn test_feature_importances_favor_informative_feature() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert_eq!(importances[0], 1.0);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_predict_proba_spans_declared_classes() {
        let x = array![[0.0], [1.0]];
        let y = array![0.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit_with_classes(&x, &y, Some(3)).unwrap();

        let proba = tree.predict_proba(&x).unwrap();
        assert_eq!(proba.shape(), &[2, 3]);
        assert_eq!(proba[[0, 0]], 1.0);
        assert_eq!(proba[[1, 1]], 1.0);
    }

    #[test]
    fn test_rejects_non_code_labels() {
        let x = array![[0.0], [1.0]];
        let y = array![0.5, 1.0];
        assert!(DecisionTree::new_classifier().fit(&x, &y).is_err());
    }

    #[test]
    fn test_predict_before_fit() {
        let tree = DecisionTree::new_classifier();
        assert!(matches!(tree.predict(&array![[1.0]]), Err(OdysseyError::ModelNotFitted)));
    }
}
