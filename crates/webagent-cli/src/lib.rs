//! Command-line front end: argument parsing, logging setup, one agent run,
//! and a summary on the way out.

pub mod metrics;
pub mod ui_writer;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use webagent_config::Config;
use webagent_core::paths;
use webagent_core::provider_registration::create_provider;
use webagent_core::{load_instruction, Agent};

use crate::ui_writer::ConsoleUiWriter;

/// Build websites with a tool-calling model, confined to one directory.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "webagent", version)]
#[command(about = "Run the web-building agent on .webagent/instruction.md")]
pub struct Cli {
    /// Project directory the agent works in (defaults to the current directory)
    #[arg(short = 'w', long, value_name = "DIR")]
    pub working_dir: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    pub debug: bool,

    /// Override agent.max_turns from the config file
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_turns: Option<u32>,
}

/// Run the agent once and return the process exit code.
///
/// Startup failures come back as `Err`; the caller maps them to exit code 1.
pub async fn run(cli: Cli) -> Result<i32> {
    let working_dir = resolve_working_dir(cli.working_dir.as_deref())?;
    init_logging(&working_dir, cli.debug)?;
    info!("webagent starting in {}", working_dir.display());

    let mut config = Config::load(&working_dir).context("Failed to load configuration")?;
    if let Some(max_turns) = cli.max_turns {
        debug!("Overriding max_turns: {} -> {}", config.agent.max_turns, max_turns);
        config.agent.max_turns = max_turns as usize;
    }

    let instruction = load_instruction(&working_dir)?;
    let provider = create_provider(&config, &working_dir)?;

    let ui_writer = ConsoleUiWriter::new();
    let mut agent = Agent::new(config, &working_dir, provider, ui_writer)?;
    let (provider_name, model) = agent.provider_info();
    agent.ui_writer().print_banner(&provider_name, &model, agent.registry().len());

    let result = agent.run(&instruction).await?;

    println!("{}", metrics::format_run_summary(&result));
    info!(
        "Run finished after {} turns with exit code {}",
        result.turns,
        result.outcome.exit_code()
    );
    Ok(result.outcome.exit_code())
}

fn resolve_working_dir(arg: Option<&Path>) -> Result<PathBuf> {
    let dir = match arg {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };
    let dir = dir
        .canonicalize()
        .with_context(|| format!("Working directory {} does not exist", dir.display()))?;
    if !dir.is_dir() {
        anyhow::bail!("{} is not a directory", dir.display());
    }
    Ok(dir)
}

/// Install the stderr layer and, when the state directory exists, a plain
/// text layer writing `.webagent/agent.log` (truncated per run).
fn init_logging(working_dir: &Path, debug: bool) -> Result<()> {
    let default_level = if debug { "debug" } else { "info" };
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    // The console belongs to the UI writer, so stderr only gets warnings
    // unless --debug is set.
    let stderr_level = if debug { LevelFilter::DEBUG } else { LevelFilter::WARN };
    let stderr_layer = fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(stderr_level)
        .with_filter(filter());

    let state_dir = paths::state_dir(working_dir);
    let file_layer = if state_dir.is_dir() {
        let log_path = paths::agent_log_path(working_dir);
        let file = File::create(&log_path)
            .with_context(|| format!("Failed to create log file {}", log_path.display()))?;
        Some(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_filter(filter()),
        )
    } else {
        None
    };

    // An embedding process or test harness may already own the global subscriber.
    if let Err(e) = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
    {
        debug!("Logging already initialized: {}", e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_working_dir_rejects_missing_dir() {
        let err = resolve_working_dir(Some(Path::new("/definitely/not/here"))).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_resolve_working_dir_rejects_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("f.txt");
        std::fs::write(&file, "x").unwrap();
        assert!(resolve_working_dir(Some(&file)).is_err());
    }

    #[test]
    fn test_resolve_working_dir_canonicalizes() {
        let dir = tempfile::TempDir::new().unwrap();
        let resolved = resolve_working_dir(Some(dir.path())).unwrap();
        assert_eq!(resolved, dir.path().canonicalize().unwrap());
    }
}
