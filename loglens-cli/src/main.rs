mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use loglens_core::config::ProviderKind;
use loglens_core::{
    AgentStatus, AnalysisInput, CounterSnapshot, InputFile, LoglensConfig, OrchestrationError,
    Orchestrator, Report,
};

use crate::logging::init_logging;

#[derive(Parser, Debug)]
#[command(
    name = "loglens",
    version,
    about = "Process-flow and bottleneck analysis for log files"
)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Command,
}

/// Settings that take precedence over the config file.
#[derive(Args, Debug, Default)]
struct Overrides {
    /// TOML config file
    #[arg(long, global = true, env = "LOGLENS_CONFIG")]
    config: Option<PathBuf>,

    /// Inference provider (ollama, openai, llama_cpp, none)
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Provider base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Model name
    #[arg(long, global = true)]
    model: Option<String>,

    /// GGUF model file for the llama.cpp provider
    #[arg(long, global = true)]
    model_path: Option<PathBuf>,

    /// Retries after the first inference attempt
    #[arg(long, global = true)]
    max_retries: Option<u32>,

    /// Log level (error,warn,info,debug,trace); RUST_LOG wins when set
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyse log files and print the report as JSON
    Analyze {
        /// Also print the agent status and counters
        #[arg(long)]
        status: bool,

        /// Log files, analysed in the given order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Probe the provider once and print the agent status as JSON
    Status,
}

#[derive(Serialize)]
struct AnalyzeOutput<'a> {
    report: &'a Report,
    status: AgentStatus,
    counters: CounterSnapshot,
}

fn load_config(overrides: &Overrides) -> Result<LoglensConfig> {
    let mut config = match &overrides.config {
        Some(path) => LoglensConfig::from_file(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => LoglensConfig::default(),
    };

    if let Some(provider) = &overrides.provider {
        config.llm.provider = provider.parse::<ProviderKind>()?;
    }
    if let Some(base_url) = &overrides.base_url {
        config.llm.base_url = Some(base_url.clone());
    }
    if let Some(model) = &overrides.model {
        config.llm.model.clone_from(model);
    }
    if let Some(model_path) = &overrides.model_path {
        config.llm.model_path.clone_from(model_path);
    }
    if let Some(max_retries) = overrides.max_retries {
        config.orchestrator.max_retries = max_retries;
    }
    if let Some(level) = &overrides.log_level {
        config.general.log_level.clone_from(level);
    }

    config.validate()?;
    Ok(config)
}

async fn read_input(paths: &[PathBuf]) -> Result<AnalysisInput> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("read {}", path.display()))?;
        files.push(InputFile::from_bytes(display_name(path), &bytes));
    }
    Ok(AnalysisInput::new(files))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling analysis");
            trigger.cancel();
        }
    });
    token
}

async fn analyze(config: &LoglensConfig, files: &[PathBuf], with_status: bool) -> Result<ExitCode> {
    let input = read_input(files).await?;
    let orchestrator = Orchestrator::from_config(config).await?;

    let report = match orchestrator
        .analyze_with_cancel(&input, &cancel_on_ctrl_c())
        .await
    {
        Ok(report) => report,
        Err(OrchestrationError::Cancelled) => return Ok(ExitCode::from(130)),
        Err(err) => return Err(err).context("analysis rejected"),
    };
    info!(mode = ?report.mode, files = input.len(), "report ready");

    let text = if with_status {
        serde_json::to_string_pretty(&AnalyzeOutput {
            report: &report,
            status: orchestrator.status(),
            counters: orchestrator.counters(),
        })?
    } else {
        serde_json::to_string_pretty(&report)?
    };
    println!("{text}");
    Ok(ExitCode::SUCCESS)
}

async fn status(config: &LoglensConfig) -> Result<ExitCode> {
    let orchestrator = Orchestrator::from_config(config).await?;
    println!("{}", serde_json::to_string_pretty(&orchestrator.status())?);
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = load_config(&cli.overrides)?;
    init_logging(&config.general.log_level, cli.overrides.log_json)?;

    match cli.command {
        Command::Analyze {
            status: with_status,
            files,
        } => analyze(&config, &files, with_status).await,
        Command::Status => status(&config).await,
    }
}
