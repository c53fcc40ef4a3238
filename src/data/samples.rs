//! Built-in sample datasets, generated deterministically

use crate::error::Result;
use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SAMPLE_SEED: u64 = 1912;

/// Sample datasets that can be loaded into the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleDataset {
    /// 150 flowers, four measurements, three species
    Iris,
    /// Passenger table with a binary `survived` target
    Titanic,
}

impl SampleDataset {
    pub fn all() -> [SampleDataset; 2] {
        [SampleDataset::Iris, SampleDataset::Titanic]
    }

    /// Store name the sample is saved under
    pub fn name(&self) -> &'static str {
        match self {
            SampleDataset::Iris => "iris",
            SampleDataset::Titanic => "titanic",
        }
    }

    /// Target column of the sample
    pub fn target_column(&self) -> &'static str {
        match self {
            SampleDataset::Iris => "species",
            SampleDataset::Titanic => "survived",
        }
    }

    pub fn generate(&self) -> Result<DataFrame> {
        match self {
            SampleDataset::Iris => generate_iris(),
            SampleDataset::Titanic => generate_titanic(),
        }
    }
}

impl fmt::Display for SampleDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SampleDataset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "iris" => Ok(SampleDataset::Iris),
            "titanic" => Ok(SampleDataset::Titanic),
            other => Err(format!("unknown sample dataset '{}' (expected iris or titanic)", other)),
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn generate_iris() -> Result<DataFrame> {
    let mut rng = ChaCha8Rng::seed_from_u64(SAMPLE_SEED);
    let n = 150;

    // (sepal_length, sepal_width, petal_length, petal_width) base per species
    let bases = [
        [4.6, 3.1, 1.2, 0.1],
        [5.6, 2.5, 3.9, 1.1],
        [6.1, 2.8, 5.1, 1.8],
    ];
    let spreads = [0.9, 0.6, 0.6, 0.4];
    let names = ["setosa", "versicolor", "virginica"];

    let mut columns: [Vec<f64>; 4] = Default::default();
    let mut species = Vec::with_capacity(n);
    for i in 0..n {
        let class = i / 50;
        for (j, column) in columns.iter_mut().enumerate() {
            column.push(round2(bases[class][j] + rng.gen::<f64>() * spreads[j]));
        }
        species.push(names[class]);
    }

    let [sepal_length, sepal_width, petal_length, petal_width] = columns;
    Ok(DataFrame::new(vec![
        Series::new("sepal_length".into(), sepal_length).into(),
        Series::new("sepal_width".into(), sepal_width).into(),
        Series::new("petal_length".into(), petal_length).into(),
        Series::new("petal_width".into(), petal_width).into(),
        Series::new("species".into(), species).into(),
    ])?)
}

fn generate_titanic() -> Result<DataFrame> {
    let mut rng = ChaCha8Rng::seed_from_u64(SAMPLE_SEED + 1);
    let n = 891;

    let mut pclass = Vec::with_capacity(n);
    let mut sex = Vec::with_capacity(n);
    let mut age = Vec::with_capacity(n);
    let mut sibsp = Vec::with_capacity(n);
    let mut parch = Vec::with_capacity(n);
    let mut fare = Vec::with_capacity(n);
    let mut survived = Vec::with_capacity(n);

    for _ in 0..n {
        let class: i64 = match rng.gen::<f64>() {
            p if p < 0.24 => 1,
            p if p < 0.45 => 2,
            _ => 3,
        };
        let is_female: i64 = if rng.gen::<f64>() < 0.35 { 1 } else { 0 };
        let years = round2((rng.gen::<f64>() * 60.0 + 1.0).min(80.0));
        let siblings: i64 = if rng.gen::<f64>() < 0.7 { 0 } else { rng.gen_range(1..5) };
        let parents: i64 = if rng.gen::<f64>() < 0.75 { 0 } else { rng.gen_range(1..4) };
        let base_fare = match class {
            1 => 60.0,
            2 => 20.0,
            _ => 8.0,
        };
        let ticket = round2(base_fare * (0.5 + rng.gen::<f64>() * 1.5));

        let logit = 2.4 * is_female as f64
            - 0.9 * (class as f64 - 2.0)
            - 0.02 * (years - 30.0)
            - 0.2 * siblings as f64
            - 0.5;
        let p = 1.0 / (1.0 + (-logit).exp());

        pclass.push(class);
        sex.push(is_female);
        // Roughly a fifth of passengers have no recorded age
        age.push(if rng.gen::<f64>() < 0.2 { None } else { Some(years) });
        sibsp.push(siblings);
        parch.push(parents);
        fare.push(ticket);
        survived.push(if rng.gen::<f64>() < p { 1i64 } else { 0 });
    }

    Ok(DataFrame::new(vec![
        Series::new("pclass".into(), pclass).into(),
        Series::new("sex".into(), sex).into(),
        Series::new("age".into(), age).into(),
        Series::new("sibsp".into(), sibsp).into(),
        Series::new("parch".into(), parch).into(),
        Series::new("fare".into(), fare).into(),
        Series::new("survived".into(), survived).into(),
    ])?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iris_shape_and_classes() {
        let df = SampleDataset::Iris.generate().unwrap();
        assert_eq!(df.shape(), (150, 5));
        assert_eq!(df.column("species").unwrap().n_unique().unwrap(), 3);
    }

    #[test]
    fn test_titanic_has_missing_ages() {
        let df = SampleDataset::Titanic.generate().unwrap();
        assert_eq!(df.height(), 891);
        assert!(df.column("age").unwrap().null_count() > 0);
        assert_eq!(df.column("survived").unwrap().n_unique().unwrap(), 2);
    }

    #[test]
    fn test_samples_are_deterministic() {
        let a = SampleDataset::Titanic.generate().unwrap();
        let b = SampleDataset::Titanic.generate().unwrap();
        assert!(a.equals_missing(&b));
    }

    #[test]
    fn test_parse_sample_name() {
        assert_eq!("Iris".parse::<SampleDataset>().unwrap(), SampleDataset::Iris);
        assert!("mnist".parse::<SampleDataset>().is_err());
    }
}
