//! `instasense`: sentiment and engagement analysis of an Instagram
//! account's recent posts and comments.
//!
//! ```bash
//! # Analyse the last posts of an account (needs APIFY_API_TOKEN)
//! instasense analyze natgeo --config ./instasense.toml
//!
//! # Classify a single text with the configured backend
//! instasense classify "what a great shot"
//!
//! # Show the effective configuration
//! instasense config
//! ```

use anyhow::Context;
use apify_client::ApifyClient;
use clap::{Args, Parser, Subcommand, ValueEnum};
use engagement_analyzer::{AnalysisOptions, AnalysisPipeline};
use instasense_core::{AppConfig, CoreError, ErrorExt, ErrorReporter};
use sentiment_engine::{Classifier, SentimentClassifier};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str =
    "instasense=info,apify_client=info,sentiment_engine=info,engagement_analyzer=info";

#[derive(Parser)]
#[command(
    name = "instasense",
    version,
    about = "Sentiment and engagement analysis for Instagram accounts"
)]
struct Cli {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch posts and comments of an account and report on them.
    Analyze(AnalyzeArgs),

    /// Classify one text with the configured sentiment backend.
    Classify {
        /// Text to classify.
        text: String,
    },

    /// Print the effective configuration with secrets masked.
    Config,
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Instagram username, with or without a leading '@'.
    username: String,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Number of comments in each top list.
    #[arg(long)]
    top_k: Option<usize>,

    /// Trend bucket width: daily, weekly or <hours>h.
    #[arg(long)]
    bucket: Option<String>,

    /// Concurrent classifications.
    #[arg(long)]
    workers: Option<usize>,

    /// Wall-clock budget for classifying all comments, in seconds.
    #[arg(long)]
    budget_secs: Option<u64>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref()).map_err(report)?;

    match cli.command {
        Commands::Analyze(args) => {
            apply_overrides(&mut config, &args)?;
            analyze(&config, &args).await
        }
        Commands::Classify { text } => classify(&config, &text).await,
        Commands::Config => {
            let rendered = toml::to_string_pretty(&config.masked())
                .context("Failed to render configuration")?;
            print!("{rendered}");
            Ok(())
        }
    }
}

fn apply_overrides(config: &mut AppConfig, args: &AnalyzeArgs) -> anyhow::Result<()> {
    if let Some(top_k) = args.top_k {
        config.analysis.top_k = top_k;
    }
    if let Some(bucket) = &args.bucket {
        config.analysis.bucket = bucket.clone();
    }
    if let Some(workers) = args.workers {
        config.analysis.workers = workers;
    }
    if let Some(budget) = args.budget_secs {
        config.analysis.budget_secs = Some(budget);
    }
    config.validate().map_err(report)
}

async fn analyze(config: &AppConfig, args: &AnalyzeArgs) -> anyhow::Result<()> {
    config.require_apify_token().map_err(report)?;

    let client = ApifyClient::from_config(&config.apify).map_err(report)?;
    let classifier = Classifier::from_config(&config.classifier).map_err(report)?;
    let options = AnalysisOptions::from_config(&config.analysis).map_err(report)?;

    tracing::info!("Starting analysis of {}", args.username);
    let pipeline = AnalysisPipeline::new(&client, &client, classifier, options);
    let report_data = pipeline.run(&args.username).await.map_err(report)?;

    match args.format {
        OutputFormat::Text => print!("{report_data}"),
        OutputFormat::Json => println!("{}", report_data.to_json().map_err(report)?),
    }

    let metrics = client.retry_executor().get_metrics();
    tracing::debug!(
        "Apify retries: {} total, {} failed, {} breaker trips",
        metrics.total_retries,
        metrics.failed_retries,
        metrics.circuit_breaker_trips
    );
    Ok(())
}

async fn classify(config: &AppConfig, text: &str) -> anyhow::Result<()> {
    let classifier = Classifier::from_config(&config.classifier).map_err(report)?;
    let result = classifier
        .classify(text)
        .await
        .map_err(|e| report(CoreError::from(e)))?;
    println!("{} ({:.2})", result.label, result.score);
    Ok(())
}

/// Logs the error with its code and turns it into a user-facing failure.
fn report<E: Into<CoreError>>(error: E) -> anyhow::Error {
    let error = error.into();
    ErrorReporter::new().report_error(&error);
    let message = error.user_friendly_message();
    anyhow::Error::new(error).context(message)
}
