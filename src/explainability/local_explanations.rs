//! Local explanations (SHAP-like feature contributions)
//!
//! Contributions are estimated by sampling feature permutations: starting
//! from a background row, features are switched to the explained row's
//! values one at a time and each switch is credited with the change in the
//! model output. Every permutation telescopes to `f(x) - f(background)`, so
//! `base_value + Σ contributions == prediction` holds exactly.

use crate::error::{OdysseyError, Result};
use ndarray::{Array2, ArrayView1, Axis};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Feature contribution to a prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature_index: usize,
    pub feature_name: String,
    /// Feature value for this instance
    pub feature_value: f64,
    /// Contribution to the explained output (SHAP value)
    pub contribution: f64,
}

/// Local explanation for a single prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalExplanation {
    /// Row index in the explained dataset
    pub instance_index: usize,
    /// Output column that was explained (the predicted class)
    pub output_index: usize,
    /// Expected output over the sampled background rows
    pub base_value: f64,
    /// Model output for this row
    pub prediction: f64,
    pub contributions: Vec<FeatureContribution>,
}

impl LocalExplanation {
    pub fn sum_contributions(&self) -> f64 {
        self.contributions.iter().map(|c| c.contribution).sum()
    }

    /// Contributions by absolute value, descending
    pub fn sorted_contributions(&self) -> Vec<&FeatureContribution> {
        let mut sorted: Vec<&FeatureContribution> = self.contributions.iter().collect();
        sorted.sort_by(|a, b| b.contribution.abs().total_cmp(&a.contribution.abs()));
        sorted
    }

    pub fn top_k_contributors(&self, k: usize) -> Vec<&FeatureContribution> {
        self.sorted_contributions().into_iter().take(k).collect()
    }
}

/// Permutation-sampling explainer over a black-box scoring function.
///
/// `predict_fn` maps a batch of rows to a score matrix with one column per
/// class; each row is explained on the column where its own score peaks.
pub struct LocalExplainer<F>
where
    F: Fn(&Array2<f64>) -> Result<Array2<f64>> + Sync,
{
    predict_fn: F,
    background: Array2<f64>,
    feature_names: Vec<String>,
    permutations: usize,
    seed: u64,
}

impl<F> LocalExplainer<F>
where
    F: Fn(&Array2<f64>) -> Result<Array2<f64>> + Sync,
{
    pub fn new(predict_fn: F, background: Array2<f64>, feature_names: Vec<String>) -> Result<Self> {
        if background.nrows() == 0 {
            return Err(OdysseyError::explain("attribution", "background sample is empty"));
        }
        if background.ncols() != feature_names.len() {
            return Err(OdysseyError::explain(
                "attribution",
                format!(
                    "background has {} columns for {} features",
                    background.ncols(),
                    feature_names.len()
                ),
            ));
        }
        Ok(Self {
            predict_fn,
            background,
            feature_names,
            permutations: 32,
            seed: 0,
        })
    }

    pub fn with_permutations(mut self, permutations: usize) -> Self {
        self.permutations = permutations;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Explain each row of `instances`; `indices[i]` is the dataset row of `instances.row(i)`
    pub fn explain_batch(&self, instances: &Array2<f64>, indices: &[usize]) -> Result<Vec<LocalExplanation>> {
        if instances.nrows() != indices.len() {
            return Err(OdysseyError::explain(
                "attribution",
                format!("{} rows but {} indices", instances.nrows(), indices.len()),
            ));
        }
        (0..instances.nrows())
            .into_par_iter()
            .map(|i| self.explain_row(instances.row(i), indices[i]))
            .collect()
    }

    pub fn explain_row(&self, instance: ArrayView1<f64>, instance_index: usize) -> Result<LocalExplanation> {
        let n_features = self.feature_names.len();
        if self.permutations == 0 {
            return Err(OdysseyError::explain("attribution", "at least one permutation is required"));
        }
        if instance.len() != n_features {
            return Err(OdysseyError::explain(
                "attribution",
                format!("row has {} values for {} features", instance.len(), n_features),
            ));
        }

        let own = (self.predict_fn)(&instance.to_owned().insert_axis(Axis(0)))?;
        let Some(scores) = own.rows().into_iter().next() else {
            return Err(OdysseyError::explain("attribution", "model returned no scores"));
        };
        let (output_index, prediction) = scores
            .iter()
            .copied()
            .enumerate()
            .fold((0usize, f64::NEG_INFINITY), |best, (i, v)| if v > best.1 { (i, v) } else { best });

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(instance_index as u64));
        let chain = n_features + 1;
        let mut batch = Array2::zeros((self.permutations * chain, n_features));
        let mut orders = Vec::with_capacity(self.permutations);

        for t in 0..self.permutations {
            let mut order: Vec<usize> = (0..n_features).collect();
            order.shuffle(&mut rng);
            let bg = self.background.row(rng.gen_range(0..self.background.nrows()));

            let mut current = bg.to_owned();
            batch.row_mut(t * chain).assign(&current);
            for (step, &feature) in order.iter().enumerate() {
                current[feature] = instance[feature];
                batch.row_mut(t * chain + step + 1).assign(&current);
            }
            orders.push(order);
        }

        let out = (self.predict_fn)(&batch)?;
        if out.nrows() != batch.nrows() || out.ncols() <= output_index {
            return Err(OdysseyError::explain(
                "attribution",
                format!("model returned {:?} scores for {} rows", out.shape(), batch.nrows()),
            ));
        }
        let column = out.column(output_index);

        let mut contributions = vec![0.0; n_features];
        let mut base_value = 0.0;
        for (t, order) in orders.iter().enumerate() {
            let start = t * chain;
            base_value += column[start];
            for (step, &feature) in order.iter().enumerate() {
                contributions[feature] += column[start + step + 1] - column[start + step];
            }
        }

        let n = self.permutations as f64;
        base_value /= n;
        for c in &mut contributions {
            *c /= n;
        }
        if !base_value.is_finite() || contributions.iter().any(|c| !c.is_finite()) {
            return Err(OdysseyError::explain("attribution", "model produced non-finite scores"));
        }

        Ok(LocalExplanation {
            instance_index,
            output_index,
            base_value,
            prediction,
            contributions: contributions
                .into_iter()
                .enumerate()
                .map(|(idx, contribution)| FeatureContribution {
                    feature_index: idx,
                    feature_name: self.feature_names[idx].clone(),
                    feature_value: instance[idx],
                    contribution,
                })
                .collect(),
        })
    }
}

/// Summary of contributions across many explained rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapSummary {
    pub feature_names: Vec<String>,
    /// Mean absolute contribution per feature
    pub mean_abs_shap: Vec<f64>,
    pub mean_shap: Vec<f64>,
    pub std_shap: Vec<f64>,
    pub min_shap: Vec<f64>,
    pub max_shap: Vec<f64>,
}

impl ShapSummary {
    pub fn from_explanations(feature_names: &[String], explanations: &[LocalExplanation]) -> Self {
        let n_features = feature_names.len();
        let n_instances = explanations.len().max(1) as f64;

        let mut mean_abs = vec![0.0; n_features];
        let mut mean = vec![0.0; n_features];
        let mut min_vals = vec![f64::INFINITY; n_features];
        let mut max_vals = vec![f64::NEG_INFINITY; n_features];

        for exp in explanations {
            for c in exp.contributions.iter().filter(|c| c.feature_index < n_features) {
                let idx = c.feature_index;
                mean_abs[idx] += c.contribution.abs();
                mean[idx] += c.contribution;
                min_vals[idx] = min_vals[idx].min(c.contribution);
                max_vals[idx] = max_vals[idx].max(c.contribution);
            }
        }
        for i in 0..n_features {
            mean_abs[i] /= n_instances;
            mean[i] /= n_instances;
        }

        let mut sum_sq = vec![0.0; n_features];
        for exp in explanations {
            for c in exp.contributions.iter().filter(|c| c.feature_index < n_features) {
                sum_sq[c.feature_index] += (c.contribution - mean[c.feature_index]).powi(2);
            }
        }
        let std = sum_sq.into_iter().map(|s| (s / n_instances).sqrt()).collect();

        if explanations.is_empty() {
            min_vals.fill(0.0);
            max_vals.fill(0.0);
        }

        Self {
            feature_names: feature_names.to_vec(),
            mean_abs_shap: mean_abs,
            mean_shap: mean,
            std_shap: std,
            min_shap: min_vals,
            max_shap: max_vals,
        }
    }

    /// Features by mean absolute contribution, descending
    pub fn feature_ranking(&self) -> Vec<(String, f64)> {
        let mut indexed: Vec<(String, f64)> = self
            .feature_names
            .iter()
            .cloned()
            .zip(self.mean_abs_shap.iter().copied())
            .collect();
        indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
        indexed
    }
}
