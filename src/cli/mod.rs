//! BMI Forecast CLI Module
//!
//! Command-line interface for serving the web app, training the model bank,
//! one-off predictions and dataset summaries.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::analysis::{DatasetAnalysis, Table};
use crate::config::TrainingConfig;
use crate::prediction::{ModelContext, PredictionRequest};

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

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

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

fn print_table(table: &Table) {
    let widths: Vec<usize> = (0..table.headers.len())
        .map(|i| {
            table
                .rows
                .iter()
                .filter_map(|r| r.get(i))
                .chain(std::iter::once(&table.headers[i]))
                .map(|c| c.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let header: Vec<String> = table
        .headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| format!("{:<w$}", h, w = *w))
        .collect();
    println!("  {}", muted(&header.join("  ")));
    for row in &table.rows {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<w$}", c, w = *w))
            .collect();
        println!("  {}", cells.join("  "));
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "bmi-forecast")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Post-intervention BMI prediction with cluster-routed model selection")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train the models and start the web server
    Serve {
        /// Server host [env: API_HOST]
        #[arg(long)]
        host: Option<String>,

        /// Server port [env: API_PORT]
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Train every model and print the evaluation and cluster tables
    Train {
        /// Input CSV [env: DATASET_PATH]
        #[arg(short, long)]
        data: Option<PathBuf>,
    },

    /// Train, then predict a single BMI value
    Predict {
        /// male or female
        #[arg(short, long)]
        gender: String,

        /// Height in centimetres
        #[arg(long)]
        height: String,

        /// Weight in kilograms
        #[arg(short, long)]
        weight: String,

        /// Model name, or "Best Fit" to route by cluster
        #[arg(short, long)]
        algorithm: Option<String>,

        /// Input CSV [env: DATASET_PATH]
        #[arg(short, long)]
        data: Option<PathBuf>,
    },

    /// Summarize a dataset
    Analyze {
        /// Input CSV [env: DATASET_PATH]
        #[arg(short, long)]
        data: Option<PathBuf>,
    },
}

fn training_config(data: Option<&Path>) -> TrainingConfig {
    let config = TrainingConfig::from_env();
    match data {
        Some(path) => config.with_dataset_path(path),
        None => config,
    }
}

fn train_context(config: &TrainingConfig) -> anyhow::Result<ModelContext> {
    step_run(&format!("Training on {}", config.dataset_path.display()));
    let start = Instant::now();
    let context = ModelContext::train(config)?;
    step_done(&format!(
        "{} models, {} train / {} test rows in {:?}",
        context.bank().len(),
        context.n_train(),
        context.n_test(),
        start.elapsed()
    ));
    Ok(context)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(data: Option<&Path>) -> anyhow::Result<()> {
    section("Train");
    let config = training_config(data);
    let context = train_context(&config)?;

    section("Held-out metrics");
    let report = context.report();
    let best = report.best().name.clone();
    println!(
        "  {}",
        muted(&format!("{:<20} {:>10} {:>10} {:>10} {:>8}", "Model", "MAE", "MSE", "RMSE", "R²"))
    );
    for score in report.iter() {
        let line = format!(
            "{:<20} {:>10.4} {:>10.4} {:>10.4} {:>8.4}",
            score.name, score.metrics.mae, score.metrics.mse, score.metrics.rmse, score.metrics.r2
        );
        if score.name == best {
            println!("  {}", line.white().bold());
        } else {
            println!("  {}", line);
        }
    }

    section("Best Fit clusters");
    for assignment in context.router().assignments().values() {
        println!(
            "  {:<4} {:<20} {} {}",
            accent(&assignment.cluster.to_string()),
            assignment.model,
            muted(&format!("R² {:.4}", assignment.score)),
            dim(&format!("{} rows", assignment.n_samples)),
        );
    }

    println!();
    println!("  {:<16} {}", muted("Best model"), best.white().bold());
    println!();
    Ok(())
}

pub fn cmd_predict(
    gender: &str,
    height: &str,
    weight: &str,
    algorithm: Option<&str>,
    data: Option<&Path>,
) -> anyhow::Result<()> {
    section("Predict");
    let request = PredictionRequest::parse(gender, height, weight, algorithm)?;
    let config = training_config(data);
    let context = train_context(&config)?;

    let prediction = context.predict(&request)?;
    println!();
    println!("  {:<16} {}", muted("BMI"), format!("{:.2}", prediction.value).white().bold());
    println!("  {:<16} {}", muted("Model"), prediction.model.white());
    if let Some(cluster) = prediction.cluster {
        println!("  {:<16} {}", muted("Cluster"), cluster.to_string().white());
    }
    println!();
    Ok(())
}

pub fn cmd_analyze(data: Option<&Path>) -> anyhow::Result<()> {
    section("Analyze");
    let config = training_config(data);

    step_run(&format!("Reading {}", config.dataset_path.display()));
    let start = Instant::now();
    let analysis = DatasetAnalysis::from_path(&config.dataset_path)?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    println!("  {}", analysis.insights.white());

    section("Descriptive statistics");
    print_table(&analysis.description);

    section("Missing values");
    print_table(&analysis.missing_values);

    section("Correlation");
    print_table(&analysis.correlation);

    section("BMI_Post by gender");
    match (&analysis.group_analysis, analysis.group_analysis_text()) {
        (Some(table), _) => print_table(table),
        (None, Some(text)) => println!("  {}", text.yellow()),
        (None, None) => {}
    }

    section("BMI_Post frequency");
    match (&analysis.frequency, analysis.frequency_text()) {
        (Some(table), _) => print_table(table),
        (None, Some(text)) => println!("  {}", text.yellow()),
        (None, None) => {}
    }

    println!();
    Ok(())
}

pub async fn cmd_serve(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    use crate::server::{run_server, ServerConfig};

    let config = ServerConfig::default().with_address(host, port);
    let base = format!("http://{}:{}", config.host, config.port);

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "BMI Forecast".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("Web UI ", &base));
    line_box(&kv("Models ", &format!("{}/api/models", base)));
    line_box(&kv("Health ", &format!("{}/health", base)));
    line_box(&kv("Dataset", &config.training.dataset_path.display().to_string()));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box_center(&format!("{}", dim("training runs before the port opens, ctrl+c to stop")));
    line_box_empty();
    line_box_bottom();
    println!();

    run_server(config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_predict() {
        let cli = Cli::try_parse_from([
            "bmi-forecast",
            "predict",
            "--gender",
            "female",
            "--height",
            "165",
            "--weight",
            "60",
            "--algorithm",
            "Linear Regression",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Predict { gender, algorithm, data, .. }) => {
                assert_eq!(gender, "female");
                assert_eq!(algorithm.as_deref(), Some("Linear Regression"));
                assert!(data.is_none());
            }
            _ => panic!("expected predict"),
        }
    }

    #[test]
    fn test_no_subcommand_is_allowed() {
        let cli = Cli::try_parse_from(["bmi-forecast"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_strip_ansi() {
        let colored = format!("{}", "x".red());
        assert_eq!(strip_ansi(&colored), "x");
    }
}
