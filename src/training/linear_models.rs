//! Logistic regression

use crate::error::{OdysseyError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Logistic regression hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticConfig {
    /// Regularization strength (L2)
    pub alpha: f64,
    /// Maximum gradient descent iterations
    pub max_iter: usize,
    /// Convergence tolerance on the gradient norm
    pub tol: f64,
    pub learning_rate: f64,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            alpha: 0.01,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.1,
        }
    }
}

/// Logistic regression over standardized inputs.
///
/// Binary targets fit a single model; more classes fit one model per class
/// (one-vs-rest) and normalize the scores into probabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    config: LogisticConfig,
    means: Option<Array1<f64>>,
    scales: Option<Array1<f64>>,
    /// One row per fitted model, in standardized units
    weights: Option<Array2<f64>>,
    intercepts: Option<Array1<f64>>,
    n_classes: usize,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new(LogisticConfig::default())
    }
}

fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

impl LogisticRegression {
    pub fn new(config: LogisticConfig) -> Self {
        Self {
            config,
            means: None,
            scales: None,
            weights: None,
            intercepts: None,
            n_classes: 0,
        }
    }

    pub fn config(&self) -> &LogisticConfig {
        &self.config
    }

    /// Fit on class codes `0..n_classes`
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, n_classes: usize) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(OdysseyError::Shape {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(OdysseyError::InvalidInput("cannot fit on zero samples".to_string()));
        }

        let n_classes = n_classes.max(2);
        let (means, scales) = super::standardization(x);
        let xs = super::standardize(x, &means, &scales);

        // Binary needs only the positive-class model
        let targets: Vec<usize> = if n_classes == 2 { vec![1] } else { (0..n_classes).collect() };

        let mut weights = Array2::zeros((targets.len(), x.ncols()));
        let mut intercepts = Array1::zeros(targets.len());
        for (row, &class) in targets.iter().enumerate() {
            let y_bin = y.mapv(|v| if v as usize == class { 1.0 } else { 0.0 });
            let (w, b) = self.gradient_descent(&xs, &y_bin);
            weights.row_mut(row).assign(&w);
            intercepts[row] = b;
        }

        self.means = Some(means);
        self.scales = Some(scales);
        self.weights = Some(weights);
        self.intercepts = Some(intercepts);
        self.n_classes = n_classes;

        Ok(self)
    }

    fn gradient_descent(&self, x: &Array2<f64>, y: &Array1<f64>) -> (Array1<f64>, f64) {
        let n_samples = x.nrows() as f64;
        let mut weights = Array1::zeros(x.ncols());
        let mut bias = 0.0;

        let lr = self.config.learning_rate;
        let alpha = self.config.alpha;

        for _ in 0..self.config.max_iter {
            let predictions = (x.dot(&weights) + bias).mapv(sigmoid);

            let errors = &predictions - y;
            let dw = (x.t().dot(&errors) / n_samples) + (alpha * &weights);
            let db = errors.sum() / n_samples;

            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if grad_norm < self.config.tol {
                break;
            }

            weights = weights - lr * dw;
            bias -= lr * db;
        }

        (weights, bias)
    }

    fn parts(&self) -> Result<(&Array1<f64>, &Array1<f64>, &Array2<f64>, &Array1<f64>)> {
        match (&self.means, &self.scales, &self.weights, &self.intercepts) {
            (Some(m), Some(s), Some(w), Some(b)) => Ok((m, s, w, b)),
            _ => Err(OdysseyError::ModelNotFitted),
        }
    }

    /// Class probabilities, shape (n_samples, n_classes)
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (means, scales, weights, intercepts) = self.parts()?;
        if x.ncols() != means.len() {
            return Err(OdysseyError::Shape {
                expected: format!("{} features", means.len()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let xs = super::standardize(x, means, scales);
        let scores = (xs.dot(&weights.t()) + intercepts).mapv(sigmoid);

        if self.n_classes == 2 {
            let mut proba = Array2::zeros((x.nrows(), 2));
            for (i, &p) in scores.column(0).iter().enumerate() {
                proba[[i, 0]] = 1.0 - p;
                proba[[i, 1]] = p;
            }
            return Ok(proba);
        }

        let mut proba = scores;
        let uniform = 1.0 / self.n_classes as f64;
        for mut row in proba.rows_mut() {
            let total = row.sum();
            if total > 0.0 {
                row /= total;
            } else {
                row.fill(uniform);
            }
        }
        Ok(proba)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(super::argmax_rows(&proba))
    }

    /// Coefficients in the units of the raw features, one row per fitted model
    pub fn coefficients(&self) -> Option<Array2<f64>> {
        let (_, scales, weights, _) = self.parts().ok()?;
        Some(weights / scales)
    }

    pub fn n_features(&self) -> usize {
        self.means.as_ref().map_or(0, |m| m.len())
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_binary_classification() {
        let x = array![[0.0, 1.0], [0.5, 1.2], [1.0, 0.8], [4.0, 1.1], [4.5, 0.9], [5.0, 1.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut model = LogisticRegression::default();
        model.fit(&x, &y, 2).unwrap();

        assert_eq!(model.predict(&x).unwrap(), y);

        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.shape(), &[6, 2]);
        assert!(proba[[0, 0]] > 0.5);
        assert!(proba[[5, 1]] > 0.5);
    }

    #[test]
    fn test_extreme_magnitudes_standardize() {
        let x = array![[-1e300], [-0.8e300], [-1.2e300], [1e300], [0.8e300], [1.2e300]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut model = LogisticRegression::default();
        model.fit(&x, &y, 2).unwrap();

        assert_eq!(model.predict(&x).unwrap(), y);
        assert!(model.predict_proba(&x).unwrap().iter().all(|p| p.is_finite()));
        let coefficients = model.coefficients().unwrap();
        assert!(coefficients[[0, 0]] > 0.0 && coefficients[[0, 0]].is_finite());
    }

    #[test]
    fn test_multiclass_one_vs_rest() {
        let x = array![[0.0], [0.2], [5.0], [5.2], [10.0], [10.2]];
        let y = array![0.0, 0.0, 1.0, 1.0, 2.0, 2.0];

        let mut model = LogisticRegression::new(LogisticConfig {
            max_iter: 3000,
            ..Default::default()
        });
        model.fit(&x, &y, 3).unwrap();

        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.shape(), &[6, 3]);
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
        assert_eq!(model.predict(&array![[0.1], [10.1]]).unwrap(), array![0.0, 2.0]);
    }

    #[test]
    fn test_coefficients_follow_signal() {
        let x = array![[1.0, 3.0], [2.0, 3.0], [3.0, 3.0], [6.0, 3.0], [7.0, 3.0], [8.0, 3.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut model = LogisticRegression::default();
        model.fit(&x, &y, 2).unwrap();

        let coef = model.coefficients().unwrap();
        assert_eq!(coef.shape(), &[1, 2]);
        assert!(coef[[0, 0]] > 0.0);
        assert_eq!(coef[[0, 1]], 0.0);
    }

    #[test]
    fn test_unfitted() {
        let model = LogisticRegression::default();
        assert!(matches!(
            model.predict(&array![[1.0]]),
            Err(OdysseyError::ModelNotFitted)
        ));
        assert!(model.coefficients().is_none());
    }
}
