//! Odyssey - Main Entry Point
//!
//! Command-line front end for the tabular classifier lifecycle.

use clap::Parser;
use odyssey_ml::cli::{cmd_datasets, cmd_explain, cmd_models, cmd_predict, cmd_train, Cli, Commands};
use odyssey_ml::workspace::Workspace;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "odyssey_ml=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let workspace = Arc::new(Workspace::open(cli.store_config())?);

    match cli.command {
        Commands::Datasets { action } => {
            cmd_datasets(&workspace, action)?;
        }
        Commands::Train(args) => {
            if !(args.test_fraction > 0.0 && args.test_fraction < 1.0) {
                anyhow::bail!("--test-fraction must be between 0 and 1, got {}", args.test_fraction);
            }
            cmd_train(workspace, args).await?;
        }
        Commands::Predict { model, data, output } => {
            cmd_predict(&workspace, &model, &data, output.as_deref())?;
        }
        Commands::Explain { model, dataset, json } => {
            cmd_explain(workspace, &model, &dataset, json).await?;
        }
        Commands::Models { action } => {
            cmd_models(&workspace, action)?;
        }
    }

    Ok(())
}
