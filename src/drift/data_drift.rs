//! Kolmogorov-Smirnov two-sample test

use crate::drift::{DriftDetector, DriftResult};
use crate::error::{OdysseyError, Result};
use serde::{Deserialize, Serialize};

/// Kolmogorov-Smirnov test for distribution comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KolmogorovSmirnovTest {
    /// Significance level (alpha)
    alpha: f64,
}

impl KolmogorovSmirnovTest {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.001, 0.5),
        }
    }

    /// Approximate critical value of the two-sample statistic
    fn critical_value(&self, n1: usize, n2: usize) -> f64 {
        let c_alpha = (-0.5 * (self.alpha / 2.0).ln()).sqrt();
        c_alpha * ((n1 + n2) as f64 / (n1 * n2) as f64).sqrt()
    }

    /// Largest gap between the two empirical CDFs
    pub fn statistic(reference: &[f64], test: &[f64]) -> f64 {
        let mut a = reference.to_vec();
        let mut b = test.to_vec();
        a.sort_by(f64::total_cmp);
        b.sort_by(f64::total_cmp);

        let (n1, n2) = (a.len() as f64, b.len() as f64);
        let (mut i, mut j) = (0usize, 0usize);
        let mut d: f64 = 0.0;
        while i < a.len() && j < b.len() {
            let x = a[i].min(b[j]);
            while i < a.len() && a[i] <= x {
                i += 1;
            }
            while j < b.len() && b[j] <= x {
                j += 1;
            }
            d = d.max((i as f64 / n1 - j as f64 / n2).abs());
        }
        d
    }

    /// Asymptotic p-value of statistic `d` for sample sizes `n1`, `n2`
    pub fn p_value(d: f64, n1: usize, n2: usize) -> f64 {
        let en = ((n1 * n2) as f64 / (n1 + n2) as f64).sqrt();
        kolmogorov_q((en + 0.12 + 0.11 / en) * d)
    }
}

/// Kolmogorov distribution survival function Q_KS(λ)
fn kolmogorov_q(lambda: f64) -> f64 {
    if lambda < 1e-3 {
        return 1.0;
    }
    let a2 = -2.0 * lambda * lambda;
    let mut sum = 0.0;
    let mut sign = 1.0;
    let mut prev_term = 0.0;
    for k in 1..=100 {
        let term = sign * 2.0 * (a2 * (k * k) as f64).exp();
        sum += term;
        if term.abs() <= 1e-10 * prev_term || term.abs() <= 1e-16 * sum.abs() {
            return sum.clamp(0.0, 1.0);
        }
        sign = -sign;
        prev_term = term.abs();
    }
    // Series did not converge: λ is tiny
    1.0
}

impl Default for KolmogorovSmirnovTest {
    fn default() -> Self {
        Self::new(0.05)
    }
}

impl DriftDetector for KolmogorovSmirnovTest {
    fn detect(&self, reference: &[f64], test: &[f64]) -> Result<DriftResult> {
        if reference.is_empty() || test.is_empty() {
            return Err(OdysseyError::InvalidInput("Empty samples provided".to_string()));
        }

        let ks_statistic = Self::statistic(reference, test);
        let p_value = Self::p_value(ks_statistic, reference.len(), test.len());
        let threshold = self.critical_value(reference.len(), test.len());

        let result = if p_value < self.alpha {
            let severity = if ks_statistic > threshold * 1.5 { 2 } else { 1 };
            DriftResult::drift(
                ks_statistic,
                threshold,
                severity,
                &format!("KS statistic ({:.4}) exceeds threshold ({:.4})", ks_statistic, threshold),
            )
        } else {
            DriftResult::no_drift(ks_statistic, threshold)
        };
        Ok(result.with_p_value(p_value))
    }

    fn alpha(&self) -> f64 {
        self.alpha
    }
}
