//! BMI Forecast - Main Entry Point
//!
//! Serves the web app by default; `train`, `predict` and `analyze` run once
//! and exit.

use bmi_forecast::cli::{cmd_analyze, cmd_predict, cmd_serve, cmd_train, Cli, Commands};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bmi_forecast=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { host, port }) => {
            cmd_serve(host, port).await?;
        }
        Some(Commands::Train { data }) => {
            cmd_train(data.as_deref())?;
        }
        Some(Commands::Predict { gender, height, weight, algorithm, data }) => {
            cmd_predict(&gender, &height, &weight, algorithm.as_deref(), data.as_deref())?;
        }
        Some(Commands::Analyze { data }) => {
            cmd_analyze(data.as_deref())?;
        }
        None => {
            cmd_serve(None, None).await?;
        }
    }

    Ok(())
}
