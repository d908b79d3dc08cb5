//! Taskbreaker - timed microtask breakdowns
//!
//! CLI entry point for one-shot breakdowns, the interactive session, and the
//! offline parse/prompt helpers.

use std::fs;
use std::io::Read;
use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info, warn};

use taskbreaker::cli::{Cli, Command, OutputFormat};
use taskbreaker::config::Config;
use taskbreaker::display::{degraded_reason, print_degraded, print_outcome, print_tasks};
use taskbreaker::pipeline::Pipeline;
use taskbreaker::prompts::{PromptLoader, TemplateName, TemplateSource};
use taskbreaker::repl;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskbreaker")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("taskbreaker.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Read the log level before the full config load so that load is logged
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(
        provider = %config.llm.provider,
        model = %config.llm.model,
        "Taskbreaker loaded config"
    );

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Breakdown { task, session, format } => cmd_breakdown(&config, &task, session, format).await,
        Command::Repl { session } => cmd_repl(&config, session).await,
        Command::Parse { file, format } => cmd_parse(file, format),
        Command::Prompts { name } => cmd_prompts(&config, &name),
    }
}

/// Build the pipeline, failing fast on configuration problems
fn build_pipeline(config: &Config) -> Result<Pipeline> {
    config.validate()?;
    Pipeline::from_config(config).context("Failed to initialize pipeline")
}

/// One-shot breakdown
async fn cmd_breakdown(config: &Config, task: &str, session: Option<String>, format: OutputFormat) -> Result<()> {
    debug!(%task, ?session, %format, "cmd_breakdown: called");
    let pipeline = build_pipeline(config)?;
    let session_id = session.unwrap_or_else(|| uuid::Uuid::now_v7().to_string());

    match pipeline.breakdown_and_extract(&session_id, task).await {
        Ok(outcome) => {
            match format {
                OutputFormat::Text => print_outcome(&outcome),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
            }
            Ok(())
        }
        Err(e) => {
            if let Some(breakdown) = e.breakdown() {
                warn!(error = %e, "Showing raw breakdown after extraction failure");
                print_degraded(breakdown, &degraded_reason(&e));
                return Ok(());
            }
            Err(e).context("Breakdown failed")
        }
    }
}

/// Interactive session
async fn cmd_repl(config: &Config, session: Option<String>) -> Result<()> {
    debug!(?session, "cmd_repl: called");
    let pipeline = build_pipeline(config)?;
    repl::run_interactive(pipeline, session).await
}

/// Decode extraction output without calling a model
fn cmd_parse(file: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    debug!(?file, %format, "cmd_parse: called");
    let raw = match &file {
        Some(path) => fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    let tasks = taskbreaker::pipeline::parse(&raw).context("Failed to decode extraction output")?;
    match format {
        OutputFormat::Text => {
            if tasks.is_empty() {
                println!("{}", "No tasks found.".dimmed());
            } else {
                print_tasks(&tasks);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tasks)?),
    }
    Ok(())
}

/// Print a resolved template and where it came from
fn cmd_prompts(config: &Config, name: &str) -> Result<()> {
    debug!(%name, "cmd_prompts: called");
    let template = TemplateName::parse(name).ok_or_else(|| {
        let names: Vec<&str> = TemplateName::ALL.iter().map(|t| t.as_str()).collect();
        eyre::eyre!("Unknown template '{}'. Available: {}", name, names.join(", "))
    })?;

    let loader = PromptLoader::new(config.prompts.expanded_dir());
    let (text, source) = loader.load_template(template)?;
    let origin = match source {
        TemplateSource::File(path) => path.display().to_string(),
        TemplateSource::Embedded => "embedded".to_string(),
    };
    eprintln!("{} {}", "Source:".dimmed(), origin.dimmed());
    print!("{}", text);
    Ok(())
}
