//! # apiprobe
//!
//! Command-line front end for apiprobe:
//! - `apiprobe run`: test every endpoint of an OpenAPI document in-process
//! - `apiprobe rerun`: re-execute the cases of a saved report
//! - `apiprobe serve`: start the Run API server

mod report;

use anyhow::{Context, Result};
use apiprobe_adapters::{HttpExecutor, build_collaborators};
use apiprobe_core::{Pipeline, ProbeConfig, RunRequest, derive_base_url, rerun_report};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::io::{IsTerminal, stdout};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Color output mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
enum ColorMode {
    /// Automatically detect if stdout is a TTY
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl ColorMode {
    fn should_use_colors(self) -> bool {
        match self {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => stdout().is_terminal(),
        }
    }
}

/// apiprobe - functional verification of HTTP APIs from their OpenAPI description
#[derive(Parser, Debug)]
#[command(name = "apiprobe", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (defaults to apiprobe.yml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Color output mode (auto, always, never)
    #[arg(long, value_enum, default_value_t = ColorMode::Auto, global = true)]
    color: ColorMode,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate, execute and verify test cases for an API
    Run(RunArgs),

    /// Re-execute the cases of a saved report
    Rerun(RerunArgs),

    /// Start the Run API server
    Serve(ServeArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// URL of the OpenAPI / Swagger document
    #[arg(long, value_name = "URL")]
    swagger_url: String,

    /// Name of the program under test
    #[arg(long, value_name = "NAME")]
    program: String,

    /// Additional testing requirements
    #[arg(long, value_name = "TEXT")]
    extra: Option<String>,

    /// Only test endpoints with this tag (repeatable)
    #[arg(long = "tag", value_name = "TAG")]
    tags: Vec<String>,

    /// Bearer token sent with every case
    #[arg(long, value_name = "TOKEN")]
    token: Option<String>,

    /// Write the JSON report to this file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct RerunArgs {
    /// Report (or task record) written by a previous run
    #[arg(long, value_name = "FILE")]
    report: PathBuf,

    /// Base URL to run against instead of the report's
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Write the JSON report to this file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ServeArgs {
    /// Port to listen on (overrides server.port)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "apiprobe=debug"
    } else {
        "apiprobe=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let use_colors = cli.color.should_use_colors();
    colored::control::set_override(use_colors);

    let config = ProbeConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Run(args) => run_command(&config, args, use_colors).await,
        Commands::Rerun(args) => rerun_command(&config, args, use_colors).await,
        Commands::Serve(args) => serve_command(config, args).await,
    }
}

async fn run_command(config: &ProbeConfig, args: RunArgs, use_colors: bool) -> Result<()> {
    let collaborators = build_collaborators(config).context("Failed to set up collaborators")?;
    let pipeline = Pipeline::new(collaborators, config.pipeline_config());
    let request = RunRequest {
        swagger_url: args.swagger_url,
        program_name: args.program,
        extra: args.extra.unwrap_or_default(),
        tags: args.tags,
        authorization: args.token,
    };

    let report = pipeline.run(&request).await.context("Run failed")?;
    println!("{}", report::render_metrics(&report.metrics, use_colors));
    if !report.summary.trim().is_empty() {
        println!("{}\n{}", "Analysis".bold(), report.summary.trim());
    }
    save(args.output, &report)
}

async fn rerun_command(config: &ProbeConfig, args: RerunArgs, use_colors: bool) -> Result<()> {
    let previous = report::load_report(&args.report)?;
    let base_url = derive_base_url(
        args.base_url.as_deref(),
        &previous,
        &config.pipeline.default_base_url,
    );
    let executor = HttpExecutor::new(
        Duration::from_secs(config.http.connect_timeout_secs),
        Duration::from_secs(config.http.request_timeout_secs),
    )
    .context("Failed to create HTTP client")?;

    info!(cases = previous.test_cases.len(), base_url = %base_url, "Re-running report");
    let report = rerun_report(
        &executor,
        &previous,
        &base_url,
        Duration::from_secs(config.pipeline.executor_timeout_secs),
    )
    .await;
    println!("{}", report::render_metrics(&report.metrics, use_colors));
    save(args.output, &report)
}

async fn serve_command(mut config: ProbeConfig, args: ServeArgs) -> Result<()> {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    apiprobe_web::serve(&config)
        .await
        .context("Run API server failed")
}

fn save(output: Option<PathBuf>, report: &apiprobe_core::RunReport) -> Result<()> {
    if let Some(path) = output {
        report::write_report(&path, report)?;
        println!("{}", format!("Report written: {}", path.display()).dimmed());
    }
    Ok(())
}
