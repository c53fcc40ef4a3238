//! Gradient boosted trees for binary classification
//!
//! Regression trees are fit to the log-loss gradient and added to the
//! running log-odds with shrinkage.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::decision_tree::DecisionTree;
use crate::error::{OdysseyError, Result};

/// Gradient Boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Row subsample ratio for each tree
    pub subsample: f64,
    /// Column subsample ratio for each tree
    pub colsample_bytree: f64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 0.8,
            colsample_bytree: 0.8,
        }
    }
}

fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

/// Binary gradient boosting classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    config: GradientBoostingConfig,
    random_state: u64,
    trees: Vec<DecisionTree>,
    col_indices_per_tree: Vec<Vec<usize>>,
    initial_log_odds: f64,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig, random_state: u64) -> Self {
        Self {
            config,
            random_state,
            trees: Vec::new(),
            col_indices_per_tree: Vec::new(),
            initial_log_odds: 0.0,
            n_features: 0,
            feature_importances: None,
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    /// Fit on class codes 0 and 1
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(OdysseyError::Shape {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(OdysseyError::InvalidInput("cannot fit on zero samples".to_string()));
        }
        if y.iter().any(|&v| v != 0.0 && v != 1.0) {
            return Err(OdysseyError::TrainingConfig(
                "gradient boosting supports binary targets only".to_string(),
            ));
        }

        let p = y.mean().unwrap_or(0.5).clamp(1e-6, 1.0 - 1e-6);
        self.initial_log_odds = (p / (1.0 - p)).ln();

        let mut log_odds = Array1::from_elem(n_samples, self.initial_log_odds);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.random_state);
        let mut importances = Array1::<f64>::zeros(n_features);

        self.trees.clear();
        self.col_indices_per_tree.clear();

        for _ in 0..self.config.n_estimators {
            let residuals: Array1<f64> = y
                .iter()
                .zip(log_odds.iter())
                .map(|(&yi, &lo)| yi - sigmoid(lo))
                .collect();

            let rows = sample_indices(n_samples, self.config.subsample, &mut rng);
            let cols = sample_indices(n_features, self.config.colsample_bytree, &mut rng);

            let x_cols = x.select(Axis(1), &cols);
            let x_sub = x_cols.select(Axis(0), &rows);
            let y_sub: Array1<f64> = rows.iter().map(|&i| residuals[i]).collect();

            let mut tree = DecisionTree::new_regressor()
                .with_max_depth(self.config.max_depth)
                .with_min_samples_leaf(self.config.min_samples_leaf);
            tree.fit(&x_sub, &y_sub)?;

            // Every row moves, not only the sampled ones
            let step = tree.predict(&x_cols)?;
            log_odds.scaled_add(self.config.learning_rate, &step);

            if let Some(tree_importance) = tree.feature_importances() {
                for (&col, &imp) in cols.iter().zip(tree_importance.iter()) {
                    importances[col] += imp;
                }
            }

            self.trees.push(tree);
            self.col_indices_per_tree.push(cols);
        }

        let total = importances.sum();
        if total > 0.0 {
            importances /= total;
        }
        self.feature_importances = Some(importances);
        self.n_features = n_features;

        Ok(())
    }

    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(OdysseyError::ModelNotFitted);
        }

        let mut log_odds = Array1::from_elem(x.nrows(), self.initial_log_odds);
        for (tree, cols) in self.trees.iter().zip(&self.col_indices_per_tree) {
            let step = tree.predict(&x.select(Axis(1), cols))?;
            log_odds.scaled_add(self.config.learning_rate, &step);
        }
        Ok(log_odds)
    }

    /// Probabilities for classes 0 and 1, shape (n_samples, 2)
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let log_odds = self.decision_function(x)?;
        let mut proba = Array2::zeros((x.nrows(), 2));
        for (i, &lo) in log_odds.iter().enumerate() {
            let p = sigmoid(lo);
            proba[[i, 0]] = 1.0 - p;
            proba[[i, 1]] = p;
        }
        Ok(proba)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let log_odds = self.decision_function(x)?;
        Ok(log_odds.mapv(|lo| if lo > 0.0 { 1.0 } else { 0.0 }))
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

/// Sorted random subset holding `ratio` of `0..n`, at least one index
fn sample_indices(n: usize, ratio: f64, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
    let size = ((n as f64) * ratio).ceil().clamp(1.0, n as f64) as usize;
    let mut indices: Vec<usize> = (0..n).collect();
    if size < n {
        indices.shuffle(rng);
        indices.truncate(size);
        indices.sort_unstable();
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((40, 3), |(i, j)| match j {
            0 => i as f64,
            1 => ((i * 13) % 7) as f64,
            _ => 1.0,
        });
        let y: Array1<f64> = (0..40).map(|i| if i >= 20 { 1.0 } else { 0.0 }).collect();
        (x, y)
    }

    #[test]
    fn test_gradient_boosting_classifier() {
        let (x, y) = separable();
        let mut gb = GradientBoostingClassifier::new(GradientBoostingConfig::default(), 42);
        gb.fit(&x, &y).unwrap();

        let predictions = gb.predict(&x).unwrap();
        let correct = predictions.iter().zip(y.iter()).filter(|(p, a)| p == a).count();
        assert!(correct >= 38, "only {} of 40 correct", correct);

        let proba = gb.predict_proba(&x).unwrap();
        assert_eq!(proba.shape(), &[40, 2]);
        assert!(proba[[0, 0]] > 0.5);
        assert!(proba[[39, 1]] > 0.5);
    }

    #[test]
    fn test_importances_favor_signal() {
        let (x, y) = separable();
        let mut gb = GradientBoostingClassifier::new(GradientBoostingConfig::default(), 7);
        gb.fit(&x, &y).unwrap();

        let importances = gb.feature_importances().unwrap();
        assert!((importances.sum() - 1.0).abs() < 1e-9);
        assert!(importances[0] > importances[1]);
        assert_eq!(importances[2], 0.0);
    }

    #[test]
    fn test_rejects_multiclass_codes() {
        let x = Array2::from_shape_fn((3, 1), |(i, _)| i as f64);
        let y = Array1::from(vec![0.0, 1.0, 2.0]);
        let mut gb = GradientBoostingClassifier::new(GradientBoostingConfig::default(), 0);
        assert!(matches!(gb.fit(&x, &y), Err(OdysseyError::TrainingConfig(_))));
    }
}
