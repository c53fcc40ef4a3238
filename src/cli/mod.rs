//! Odyssey CLI Module
//!
//! Command-line interface for datasets, training, prediction,
//! explainability reports and the model registry.

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::config::{StoreConfig, TrainingConfig};
use crate::data::{SampleDataset, SaveMode};
use crate::explainability::ExplainabilityReport;
use crate::inference::PredictionResult;
use crate::registry::ModelInfo;
use crate::training::{AlgorithmKind, ModelId, TrainingRun};
use crate::utils;
use crate::workspace::Workspace;

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn bar(value: f64, max: f64) -> String {
    let width = if max > 0.0 { ((value / max) * 24.0).round() as usize } else { 0 };
    "█".repeat(width.min(24))
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{:.4}", v)).unwrap_or_else(|| "n/a".to_string())
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "odyssey")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train, store, apply and explain tabular classifiers")]
#[command(long_about = None)]
pub struct Cli {
    /// Directory holding the `datasets/` and `models/` stores
    /// (defaults to ODYSSEY_DATASETS_DIR / ODYSSEY_MODELS_DIR)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn store_config(&self) -> StoreConfig {
        match &self.root {
            Some(root) => StoreConfig::under(root),
            None => StoreConfig::default(),
        }
    }
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Stored dataset name
    #[arg(short, long)]
    pub dataset: String,

    /// Target column name
    #[arg(short, long)]
    pub target: String,

    /// Algorithm (logistic_regression, random_forest, svm, gradient_boosting)
    #[arg(short, long, default_value = "random_forest")]
    pub algorithm: AlgorithmKind,

    /// Feature columns, comma separated; defaults to every non-target column
    #[arg(short, long, value_delimiter = ',')]
    pub features: Option<Vec<String>>,

    /// Columns to leave out of the features, comma separated
    #[arg(short, long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Fraction of rows held out for evaluation
    #[arg(long, default_value = "0.2")]
    pub test_fraction: f64,

    /// Seed for the split and the algorithm
    #[arg(long, default_value = "42")]
    pub seed: u64,
}

impl TrainArgs {
    pub fn training_config(&self) -> TrainingConfig {
        let mut config = TrainingConfig::new(&self.target, self.algorithm)
            .with_test_fraction(self.test_fraction)
            .with_seed(self.seed)
            .with_excluded(self.exclude.clone());
        if let Some(features) = &self.features {
            config = config.with_features(features.clone());
        }
        config
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage stored datasets
    Datasets {
        #[command(subcommand)]
        action: DatasetCommand,
    },

    /// Train a model on a stored dataset and register it
    Train(TrainArgs),

    /// Make predictions using a registered model
    Predict {
        /// Model id, e.g. random_forest_42
        #[arg(short, long)]
        model: String,

        /// CSV file or stored dataset name
        #[arg(short, long)]
        data: String,

        /// Output predictions file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Explain a registered model against a stored dataset
    Explain {
        /// Model id
        #[arg(short, long)]
        model: String,

        /// Stored dataset name
        #[arg(short, long)]
        dataset: String,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage registered models
    Models {
        #[command(subcommand)]
        action: ModelCommand,
    },
}

#[derive(Subcommand)]
pub enum DatasetCommand {
    /// List stored datasets
    List,
    /// Store a CSV file under a name
    Save {
        /// Logical name (normalized to lower_snake_case.csv)
        name: String,
        /// CSV file to import
        file: PathBuf,
        /// Replace an existing dataset with different content
        #[arg(long)]
        overwrite: bool,
    },
    /// Store a built-in sample dataset
    Sample {
        #[arg(value_enum)]
        sample: SampleArg,
    },
    /// Show a dataset's schema and first rows
    Info {
        name: String,
        #[arg(long, default_value = "5")]
        rows: usize,
    },
    /// Delete a stored dataset
    Delete { name: String },
}

#[derive(Subcommand)]
pub enum ModelCommand {
    /// List registered models
    List,
    /// Show a model's schema, hyperparameters and metadata
    Info { id: String },
    /// Delete a registered model
    Delete { id: String },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SampleArg {
    Iris,
    Titanic,
}

impl From<SampleArg> for SampleDataset {
    fn from(arg: SampleArg) -> Self {
        match arg {
            SampleArg::Iris => SampleDataset::Iris,
            SampleArg::Titanic => SampleDataset::Titanic,
        }
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_datasets(ws: &Workspace, action: DatasetCommand) -> anyhow::Result<()> {
    let store = ws.datasets();
    match action {
        DatasetCommand::List => {
            section("Datasets");
            let refs = store.list()?;
            if refs.is_empty() {
                println!("  {}", dim("no datasets stored"));
            }
            for r in refs {
                println!(
                    "  {:<32} {:>10} {}",
                    r.name.white(),
                    format!("{} B", r.size_bytes),
                    dim(&r.modified.format("%Y-%m-%d %H:%M").to_string())
                );
            }
        }
        DatasetCommand::Save { name, file, overwrite } => {
            section("Save dataset");
            step_run(&format!("Reading {}", file.display()));
            let bytes = std::fs::read(&file)?;
            step_done(&format!("{} bytes", bytes.len()));

            let mode = if overwrite { SaveMode::Overwrite } else { SaveMode::CreateNew };
            let saved = store.save_with_mode(&name, &bytes, mode)?;
            step_ok(&format!("saved as {}", saved.name.white().bold()));
        }
        DatasetCommand::Sample { sample } => {
            section("Sample dataset");
            let sample = SampleDataset::from(sample);
            let saved = store.load_sample(sample)?;
            step_ok(&format!(
                "saved as {} (target column: {})",
                saved.name.white().bold(),
                sample.target_column()
            ));
        }
        DatasetCommand::Info { name, rows } => {
            let dataset = store.load(&name)?;
            let (height, width) = dataset.shape();
            section(&format!("Dataset {}", dataset.name()));
            println!("  {:<12} {}", muted("Rows"), height);
            println!("  {:<12} {}", muted("Columns"), width);
            println!();

            println!("  {:<24} {:<12} {:>6}", muted("Column"), muted("Type"), muted("Nulls"));
            println!("  {}", dim(&"─".repeat(44)));
            for col in dataset.columns() {
                println!(
                    "  {:<24} {:<12} {:>6}",
                    col.name,
                    col.dtype.truecolor(140, 140, 140),
                    col.null_count
                );
            }
            println!();
            println!("{}", dataset.head(rows));
        }
        DatasetCommand::Delete { name } => {
            store.delete(&name)?;
            step_ok(&format!("deleted {}", name));
        }
    }
    println!();
    Ok(())
}

pub async fn cmd_train(ws: Arc<Workspace>, args: TrainArgs) -> anyhow::Result<()> {
    section("Train");

    let config = args.training_config();
    let (dataset, algorithm) = (args.dataset.as_str(), args.algorithm);

    step_run(&format!("Training {} on {}", algorithm.display_name().cyan(), dataset));
    let start = Instant::now();
    let trained = ws.train_and_store_with_timeout(dataset.to_string(), config).await?;
    step_done(&format!("{:.2?}", start.elapsed()));

    print_training_run(&trained.run);
    println!();
    step_ok(&format!("stored as {}", trained.model_id.as_str().white().bold()));
    println!();
    Ok(())
}

fn print_training_run(run: &TrainingRun) {
    println!();
    println!("  {:<16} {}", muted("Accuracy"), format!("{:.4}", run.accuracy()).white().bold());
    println!("  {:<16} {}", muted("Macro F1"), format!("{:.4}", run.metrics.macro_avg.f1_score).white());
    println!("  {:<16} {} / {}", muted("Rows"), run.train_rows, run.test_rows);
    println!("  {:<16} {}", muted("Time"), format!("{:.3}s", run.training_time_secs).white());

    section("Confusion matrix (test split)");
    let cm = run.confusion_matrix();
    print!("  {:<14}", "");
    for label in &cm.labels {
        print!("{:>10}", muted(label));
    }
    println!();
    for (label, row) in cm.labels.iter().zip(&cm.counts) {
        print!("  {:<14}", muted(label));
        for count in row {
            print!("{:>10}", count);
        }
        println!();
    }

    match &run.feature_importance {
        Some(values) => {
            section("Feature importance");
            let max = values.iter().copied().fold(0.0, f64::max);
            let mut ranked: Vec<(&String, f64)> = run.feature_names.iter().zip(values.iter().copied()).collect();
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
            for (name, value) in ranked {
                println!("  {:<20} {:>8.4} {}", name, value, accent(&bar(value, max)));
            }
        }
        None => {
            println!();
            println!("  {}", dim("feature importance not available for this model"));
        }
    }

    for warning in &run.warnings {
        println!("  {} {}", "!".yellow(), warning);
    }
}

pub fn cmd_predict(ws: &Workspace, model: &str, data: &str, output: Option<&Path>) -> anyhow::Result<()> {
    section("Predict");
    let id = ModelId::parse(model)?;

    step_run("Loading data");
    let start = Instant::now();
    let path = Path::new(data);
    let result = if path.is_file() {
        let rows = utils::load_csv(path)?;
        step_done(&format!("{} rows × {} cols", rows.height(), rows.width()));
        ws.predict_rows(&id, &rows)?
    } else {
        step_done("stored dataset");
        ws.predict_dataset(&id, data)?
    };
    step_ok(&format!("{} predictions in {:.2?}", result.len(), start.elapsed()));

    print_prediction(&result);

    if let Some(output) = output {
        result.write_csv(output)?;
        step_ok(&format!("written to {}", output.display()));
    }
    println!();
    Ok(())
}

fn print_prediction(result: &PredictionResult) {
    let summary = result.summary();
    println!();
    for (label, count) in &summary.class_counts {
        println!("  {:<16} {}", muted(label), count);
    }
    if let Some(confidence) = summary.mean_confidence {
        println!("  {:<16} {:.4}", muted("Confidence"), confidence);
    }
    println!();
    println!("{}", result.frame.head(Some(10)));
}

pub async fn cmd_explain(ws: Arc<Workspace>, model: &str, dataset: &str, json: bool) -> anyhow::Result<()> {
    let id = ModelId::parse(model)?;
    if json {
        let report = ws.explain_with_timeout(id, dataset.to_string()).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    section("Explain");
    step_run(&format!("Explaining {} on {}", id, dataset));
    let start = Instant::now();
    let report = ws.explain_with_timeout(id, dataset.to_string()).await?;
    step_done(&format!("{:.2?}", start.elapsed()));

    print_report(&report);
    println!();
    Ok(())
}

fn print_report(report: &ExplainabilityReport) {
    println!();
    println!("  {:<16} {}", muted("Rows"), report.evaluated_rows);
    println!(
        "  {:<16} {}",
        muted("Accuracy"),
        format!("{:.4}", report.performance.accuracy).white().bold()
    );
    if let Some(roc) = &report.roc {
        println!("  {:<16} {}", muted("AUC"), format!("{:.4}", roc.auc).white());
    }

    if let Some(importance) = &report.feature_importance {
        section("Feature importance");
        let ranked = importance.ranked();
        let max = ranked.first().map(|(_, v)| *v).unwrap_or(0.0);
        for (name, value) in ranked {
            println!("  {:<20} {:>8.4} {}", name, value, accent(&bar(value, max)));
        }
    }

    if let Some(attribution) = &report.attribution {
        section(&format!("Mean |attribution| ({} rows)", attribution.explanations.len()));
        let max = attribution.ranking.first().map(|(_, v)| *v).unwrap_or(0.0);
        for (name, value) in &attribution.ranking {
            println!("  {:<20} {:>8.4} {}", name, value, accent(&bar(*value, max)));
        }
    }

    if let (Some(tests), Some(drift)) = (&report.statistical_tests, &report.drift) {
        section("Class comparison");
        println!(
            "  {:<20} {:>10} {:>10} {:>8} {:>10}",
            muted("Feature"),
            muted("t"),
            muted("p"),
            muted("KS"),
            muted("KS p")
        );
        for (test, shift) in tests.iter().zip(drift) {
            let ks = shift.result.as_ref();
            let flag = if ks.is_some_and(|r| r.drift_detected) { "*".yellow() } else { " ".normal() };
            println!(
                "  {:<20} {:>10} {:>10} {:>8} {:>10}{}",
                test.feature,
                fmt_opt(test.statistic),
                fmt_opt(test.p_value),
                fmt_opt(ks.map(|r| r.score)),
                fmt_opt(ks.and_then(|r| r.p_value)),
                flag
            );
        }
    }

    let missing: Vec<_> = report.missing_values.iter().filter(|m| m.missing > 0).collect();
    if !missing.is_empty() {
        section("Missing values");
        for m in missing {
            println!("  {:<20} {:>6} ({:.1}%)", m.column, m.missing, m.fraction * 100.0);
        }
    }

    for warning in &report.warnings {
        println!("  {} {}", "!".yellow(), warning);
    }
}

pub fn cmd_models(ws: &Workspace, action: ModelCommand) -> anyhow::Result<()> {
    let registry = ws.registry();
    match action {
        ModelCommand::List => {
            section("Models");
            let refs = registry.list()?;
            if refs.is_empty() {
                println!("  {}", dim("no models registered"));
            }
            for r in refs {
                println!(
                    "  {:<32} {:>10} {}",
                    r.id.as_str().white(),
                    format!("{} B", r.size_bytes),
                    dim(&r.modified.format("%Y-%m-%d %H:%M").to_string())
                );
            }
        }
        ModelCommand::Info { id } => {
            let info = registry.info(&ModelId::parse(&id)?)?;
            print_model_info(&info)?;
        }
        ModelCommand::Delete { id } => {
            registry.delete(&ModelId::parse(&id)?)?;
            step_ok(&format!("deleted {}", id));
        }
    }
    println!();
    Ok(())
}

fn print_model_info(info: &ModelInfo) -> anyhow::Result<()> {
    println!();
    line_box_top();
    line_box(&format!("{}", info.id.as_str().white().bold()));
    line_box(&kv("Algorithm ", &info.algorithm_name));
    line_box_sep();
    line_box(&kv("Dataset   ", &info.metadata.dataset));
    line_box(&kv("Target    ", &info.target_column));
    line_box(&kv("Classes   ", &info.class_labels.join(", ")));
    line_box(&kv("Features  ", &info.feature_names.len().to_string()));
    line_box(&kv("Seed      ", &info.metadata.seed.to_string()));
    line_box(&kv("Trained   ", &info.metadata.trained_at.format("%Y-%m-%d %H:%M UTC").to_string()));
    line_box(&kv("Proba     ", if info.capabilities.probability { "yes" } else { "no" }));
    line_box(&kv("Importance", &format!("{:?}", info.capabilities.importance)));
    line_box_bottom();

    section("Features");
    match &info.feature_importance {
        Some(pairs) => {
            for (name, value) in pairs {
                println!("  {:<24} {:.4}", name, value);
            }
        }
        None => {
            for name in &info.feature_names {
                println!("  {}", name);
            }
        }
    }

    section("Hyperparameters");
    for line in serde_json::to_string_pretty(&info.hyperparameters)?.lines() {
        println!("  {}", dim(line));
    }
    Ok(())
}
