//! Support Vector Machine classifier
//!
//! Trained with SMO (Sequential Minimal Optimization) on standardized inputs.
//! Multi-class targets use one machine per class (one-vs-rest). The machine
//! produces margins, not probabilities.

use crate::error::{OdysseyError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Maximum number of samples for eager kernel matrix computation.
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// Consecutive passes without alpha changes before SMO stops
const STABLE_PASSES: usize = 5;

/// Kernel function type. A `None` gamma resolves to `1 / n_features`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KernelType {
    /// Linear kernel: K(x, y) = x · y
    Linear,
    /// Polynomial kernel: K(x, y) = (γ * x · y + r)^d
    Polynomial { degree: u32, gamma: Option<f64>, coef0: f64 },
    /// Radial Basis Function (Gaussian): K(x, y) = exp(-γ * ||x - y||²)
    RBF { gamma: Option<f64> },
    /// Sigmoid kernel: K(x, y) = tanh(γ * x · y + r)
    Sigmoid { gamma: Option<f64>, coef0: f64 },
}

impl Default for KernelType {
    fn default() -> Self {
        KernelType::RBF { gamma: None }
    }
}

impl KernelType {
    fn gamma(&self) -> Option<f64> {
        match self {
            KernelType::Linear => None,
            KernelType::Polynomial { gamma, .. }
            | KernelType::RBF { gamma }
            | KernelType::Sigmoid { gamma, .. } => *gamma,
        }
    }

    fn eval(&self, gamma: f64, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match self {
            KernelType::Linear => a.dot(&b),
            KernelType::Polynomial { degree, coef0, .. } => {
                (gamma * a.dot(&b) + coef0).powi((*degree).min(i32::MAX as u32) as i32)
            }
            KernelType::RBF { .. } => {
                let norm_sq: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum();
                (-gamma * norm_sq).exp()
            }
            KernelType::Sigmoid { coef0, .. } => (gamma * a.dot(&b) + coef0).tanh(),
        }
    }
}

/// SVM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    pub kernel: KernelType,
    /// Tolerance for the KKT check
    pub tol: f64,
    /// Maximum number of SMO passes over the data
    pub max_iter: usize,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: KernelType::default(),
            tol: 1e-3,
            max_iter: 200,
        }
    }
}

/// One binary machine: positive class vs rest
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BinarySVM {
    support_vectors: Array2<f64>,
    /// alpha_i * y_i per support vector
    dual_coef: Array1<f64>,
    bias: f64,
}

/// Support Vector Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMClassifier {
    config: SVMConfig,
    random_state: u64,
    gamma: f64,
    means: Option<Array1<f64>>,
    scales: Option<Array1<f64>>,
    machines: Vec<BinarySVM>,
    n_classes: usize,
}

impl SVMClassifier {
    pub fn new(config: SVMConfig, random_state: u64) -> Self {
        Self {
            config,
            random_state,
            gamma: 1.0,
            means: None,
            scales: None,
            machines: Vec::new(),
            n_classes: 0,
        }
    }

    pub fn config(&self) -> &SVMConfig {
        &self.config
    }

    /// Fit on class codes `0..n_classes`
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, n_classes: usize) -> Result<()> {
        let n = x.nrows();
        if n != y.len() {
            return Err(OdysseyError::Shape {
                expected: format!("y length = {}", n),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n < 2 {
            return Err(OdysseyError::InvalidInput("SVM needs at least 2 samples".to_string()));
        }
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(OdysseyError::TrainingConfig(format!(
                "dataset has {} training rows, exceeding the SVM limit of {}",
                n, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }

        let n_classes = n_classes.max(2);
        let (means, scales) = super::standardization(x);
        let xs = super::standardize(x, &means, &scales);

        self.gamma = self
            .config
            .kernel
            .gamma()
            .unwrap_or(1.0 / x.ncols().max(1) as f64);

        let kernel_matrix = self.kernel_matrix(&xs);
        let targets: Vec<usize> = if n_classes == 2 { vec![1] } else { (0..n_classes).collect() };

        self.machines = targets
            .iter()
            .map(|&class| {
                let y_signed = y.mapv(|v| if v as usize == class { 1.0 } else { -1.0 });
                let seed = self.random_state.wrapping_add(class as u64);
                self.smo(&xs, &kernel_matrix, &y_signed, seed)
            })
            .collect();

        self.means = Some(means);
        self.scales = Some(scales);
        self.n_classes = n_classes;
        Ok(())
    }

    /// SMO with a cached error vector
    fn smo(&self, x: &Array2<f64>, k: &Array2<f64>, y: &Array1<f64>, seed: u64) -> BinarySVM {
        let n = x.nrows();
        let c = self.config.c;
        let tol = self.config.tol;

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let mut alphas = Array1::<f64>::zeros(n);
        let mut bias = 0.0;
        // f(x_i) - y_i with all alphas at zero
        let mut errors = y.mapv(|v| -v);

        let mut stable = 0;
        let mut passes = 0;
        while stable < STABLE_PASSES && passes < self.config.max_iter {
            let mut changed = 0;

            for i in 0..n {
                let e_i = errors[i];
                let violates = (y[i] * e_i < -tol && alphas[i] < c) || (y[i] * e_i > tol && alphas[i] > 0.0);
                if !violates {
                    continue;
                }

                let j = loop {
                    let j = rng.gen_range(0..n);
                    if j != i {
                        break j;
                    }
                };
                let e_j = errors[j];

                let (a_i_old, a_j_old) = (alphas[i], alphas[j]);
                let (lo, hi) = if y[i] != y[j] {
                    ((a_j_old - a_i_old).max(0.0), (c + a_j_old - a_i_old).min(c))
                } else {
                    ((a_i_old + a_j_old - c).max(0.0), (a_i_old + a_j_old).min(c))
                };
                if (hi - lo).abs() < 1e-10 {
                    continue;
                }

                let eta = 2.0 * k[[i, j]] - k[[i, i]] - k[[j, j]];
                if eta >= 0.0 {
                    continue;
                }

                let a_j = (a_j_old - y[j] * (e_i - e_j) / eta).clamp(lo, hi);
                if (a_j - a_j_old).abs() < 1e-5 {
                    continue;
                }
                let a_i = a_i_old + y[i] * y[j] * (a_j_old - a_j);

                let d_i = y[i] * (a_i - a_i_old);
                let d_j = y[j] * (a_j - a_j_old);
                let b1 = bias - e_i - d_i * k[[i, i]] - d_j * k[[i, j]];
                let b2 = bias - e_j - d_i * k[[i, j]] - d_j * k[[j, j]];
                let new_bias = if a_i > 0.0 && a_i < c {
                    b1
                } else if a_j > 0.0 && a_j < c {
                    b2
                } else {
                    (b1 + b2) / 2.0
                };

                let d_b = new_bias - bias;
                for (m, err) in errors.iter_mut().enumerate() {
                    *err += d_i * k[[i, m]] + d_j * k[[j, m]] + d_b;
                }

                alphas[i] = a_i;
                alphas[j] = a_j;
                bias = new_bias;
                changed += 1;
            }

            passes += 1;
            stable = if changed == 0 { stable + 1 } else { 0 };
        }

        let support: Vec<usize> = (0..n).filter(|&i| alphas[i] > 1e-8).collect();
        BinarySVM {
            support_vectors: x.select(Axis(0), &support),
            dual_coef: support.iter().map(|&i| alphas[i] * y[i]).collect(),
            bias,
        }
    }

    fn kernel_matrix(&self, x: &Array2<f64>) -> Array2<f64> {
        let n = x.nrows();
        let kernel = &self.config.kernel;
        let gamma = self.gamma;

        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| (0..n).map(|j| kernel.eval(gamma, x.row(i), x.row(j))).collect())
            .collect();

        let mut k = Array2::zeros((n, n));
        for (i, row) in rows.into_iter().enumerate() {
            for (j, val) in row.into_iter().enumerate() {
                k[[i, j]] = val;
            }
        }
        k
    }

    fn standardize(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (Some(means), Some(scales)) = (&self.means, &self.scales) else {
            return Err(OdysseyError::ModelNotFitted);
        };
        if x.ncols() != means.len() {
            return Err(OdysseyError::Shape {
                expected: format!("{} features", means.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(super::standardize(x, means, scales))
    }

    /// Margins, one column per machine
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let xs = self.standardize(x)?;
        let kernel = &self.config.kernel;
        let gamma = self.gamma;

        let rows: Vec<Vec<f64>> = (0..xs.nrows())
            .into_par_iter()
            .map(|i| {
                let sample = xs.row(i);
                self.machines
                    .iter()
                    .map(|m| {
                        m.support_vectors
                            .rows()
                            .into_iter()
                            .zip(m.dual_coef.iter())
                            .map(|(sv, &coef)| coef * kernel.eval(gamma, sv, sample))
                            .sum::<f64>()
                            + m.bias
                    })
                    .collect()
            })
            .collect();

        let mut scores = Array2::zeros((xs.nrows(), self.machines.len()));
        for (i, row) in rows.into_iter().enumerate() {
            for (j, val) in row.into_iter().enumerate() {
                scores[[i, j]] = val;
            }
        }
        Ok(scores)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scores = self.decision_function(x)?;
        if self.n_classes == 2 {
            return Ok(scores.column(0).mapv(|s| if s >= 0.0 { 1.0 } else { 0.0 }));
        }
        Ok(super::argmax_rows(&scores))
    }

    /// Primal weights for the linear kernel, in raw feature units
    pub fn coefficients(&self) -> Option<Array2<f64>> {
        if self.config.kernel != KernelType::Linear || self.machines.is_empty() {
            return None;
        }
        let scales = self.scales.as_ref()?;

        let mut coef = Array2::zeros((self.machines.len(), scales.len()));
        for (row, m) in self.machines.iter().enumerate() {
            let w = m.support_vectors.t().dot(&m.dual_coef);
            coef.row_mut(row).assign(&(w / scales));
        }
        Some(coef)
    }

    pub fn n_support_vectors(&self) -> usize {
        self.machines.iter().map(|m| m.support_vectors.nrows()).sum()
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

    fn blobs() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec(
            (10, 2),
            vec![
                1.0, 1.0, 1.5, 1.2, 2.0, 1.5, 1.2, 0.8, 0.8, 1.4, //
                5.0, 5.0, 5.5, 5.2, 6.0, 5.5, 5.2, 4.8, 4.8, 5.4,
            ],
        )
        .unwrap();
        let y = array![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_svm_classifier_binary() {
        let (x, y) = blobs();
        let mut svm = SVMClassifier::new(SVMConfig::default(), 42);
        svm.fit(&x, &y, 2).unwrap();

        assert_eq!(svm.predict(&x).unwrap(), y);
        assert!(svm.n_support_vectors() > 0);
        assert!(svm.coefficients().is_none());
    }

    #[test]
    fn test_linear_kernel_coefficients() {
        let (x, y) = blobs();
        let config = SVMConfig {
            kernel: KernelType::Linear,
            c: 10.0,
            ..Default::default()
        };
        let mut svm = SVMClassifier::new(config, 42);
        svm.fit(&x, &y, 2).unwrap();

        let coef = svm.coefficients().unwrap();
        assert_eq!(coef.shape(), &[1, 2]);
        assert!(coef.iter().any(|&w| w > 0.0));
        assert_eq!(svm.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_svm_classifier_multiclass() {
        let x = Array2::from_shape_vec(
            (15, 2),
            vec![
                1.0, 1.0, 1.5, 1.2, 2.0, 2.0, 1.2, 1.8, 0.8, 1.5, //
                5.0, 5.0, 5.5, 5.2, 6.0, 6.0, 5.2, 5.8, 4.8, 5.5, //
                1.0, 5.0, 1.5, 5.2, 2.0, 6.0, 1.2, 5.8, 0.8, 5.5,
            ],
        )
        .unwrap();
        let y = Array1::from_vec(vec![
            0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0, 2.0,
        ]);

        let config = SVMConfig {
            c: 10.0,
            kernel: KernelType::RBF { gamma: Some(0.5) },
            ..Default::default()
        };
        let mut svm = SVMClassifier::new(config, 42);
        svm.fit(&x, &y, 3).unwrap();

        let predictions = svm.predict(&x).unwrap();
        let correct = y.iter().zip(predictions.iter()).filter(|(a, b)| a == b).count();
        let accuracy = correct as f64 / y.len() as f64;
        assert!(accuracy > 0.6, "Multi-class accuracy {} should be > 0.6", accuracy);
        assert_eq!(svm.decision_function(&x).unwrap().shape(), &[15, 3]);
    }

    #[test]
    fn test_unfitted() {
        let svm = SVMClassifier::new(SVMConfig::default(), 0);
        assert!(matches!(svm.predict(&array![[1.0]]), Err(OdysseyError::ModelNotFitted)));
    }
}
