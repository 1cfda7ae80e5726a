pub mod background_process;
pub mod error;
pub mod error_handling;
pub mod history;
pub mod paths;
pub mod project;
pub mod prompts;
pub mod protocol;
pub mod provider_registration;
pub mod run_result;
pub mod sandbox;
pub mod tools;
pub mod ui_writer;
pub mod utils;
mod agent_loop;

pub use error::{ErrorKind, ToolFailure};
pub use history::{CompressionPolicy, EntryKind, HistoryStore, TerminationReason};
pub use run_result::{RunOutcome, RunResult, TurnMetrics};
pub use sandbox::{Sandbox, SandboxPolicy};
pub use tools::{ToolCallResult, ToolRegistry};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use webagent_config::Config;
use webagent_providers::LLMProvider;

use crate::background_process::ServerProcess;
use crate::project::ProjectState;
use crate::tools::ToolContext;
use crate::ui_writer::UiWriter;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    pub args: serde_json::Value, // Should be a JSON object with tool-specific arguments
}

/// States of the agent loop. `Terminated` and `Aborted` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Init,
    AwaitingModel,
    ParsingResponse,
    DispatchingTool,
    Terminated,
    Aborted,
}

impl AgentState {
    pub fn is_final(&self) -> bool {
        matches!(self, AgentState::Terminated | AgentState::Aborted)
    }
}

pub struct Agent<W: UiWriter> {
    config: Config,
    working_dir: PathBuf,
    provider: Box<dyn LLMProvider>,
    registry: ToolRegistry,
    sandbox: Sandbox,
    project: ProjectState,
    server: ServerProcess,
    history: HistoryStore,
    compression: CompressionPolicy,
    ui_writer: W,
    state: AgentState,
    tool_call_metrics: Vec<(String, Duration, bool)>, // (tool_name, duration, success)
    turn_metrics: Vec<TurnMetrics>,
    consecutive_backend_failures: u32,
}

impl<W: UiWriter> Agent<W> {
    /// Build an agent with the built-in tool set.
    ///
    /// Fails on an unusable working directory, a bad protected-path pattern,
    /// or a duplicate tool registration.
    pub fn new(
        config: Config,
        working_dir: &Path,
        provider: Box<dyn LLMProvider>,
        ui_writer: W,
    ) -> Result<Self> {
        let mut registry = ToolRegistry::new();
        tools::register_builtin_tools(&mut registry, &config)
            .context("Failed to register built-in tools")?;
        Self::with_registry(config, working_dir, provider, registry, ui_writer)
    }

    /// Build an agent around an explicit tool registry.
    pub fn with_registry(
        config: Config,
        working_dir: &Path,
        provider: Box<dyn LLMProvider>,
        registry: ToolRegistry,
        ui_writer: W,
    ) -> Result<Self> {
        let sandbox = Sandbox::new(SandboxPolicy::new(
            working_dir,
            config.sandbox.protected_paths.clone(),
        ))
        .with_context(|| format!("Invalid working directory {}", working_dir.display()))?;
        let root = sandbox.root().to_path_buf();

        let server = ServerProcess::new(
            config.server.command.clone(),
            root.clone(),
            paths::server_log_path(&root),
            Duration::from_millis(config.server.startup_wait_ms),
        );

        debug!(
            "Agent created in {} with {} tools",
            root.display(),
            registry.len()
        );

        Ok(Self {
            compression: CompressionPolicy::from(&config.history),
            project: ProjectState::new(&root),
            working_dir: root,
            provider,
            registry,
            sandbox,
            server,
            history: HistoryStore::new(),
            ui_writer,
            state: AgentState::Init,
            tool_call_metrics: Vec::new(),
            turn_metrics: Vec::new(),
            consecutive_backend_failures: 0,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn ui_writer(&self) -> &W {
        &self.ui_writer
    }

    pub fn get_tool_call_metrics(&self) -> &Vec<(String, Duration, bool)> {
        &self.tool_call_metrics
    }

    pub fn turn_metrics(&self) -> &[TurnMetrics] {
        &self.turn_metrics
    }

    pub fn provider_info(&self) -> (String, String) {
        (
            self.provider.name().to_string(),
            self.provider.model().to_string(),
        )
    }

    /// Run one tool call outside the loop. History is not touched.
    pub async fn execute_tool(&mut self, tool_call: &ToolCall) -> ToolCallResult {
        self.dispatch(tool_call).await
    }

    async fn dispatch(&mut self, tool_call: &ToolCall) -> ToolCallResult {
        let start = Instant::now();
        let mut ctx = ToolContext {
            sandbox: &self.sandbox,
            project: &mut self.project,
            server: &mut self.server,
            config: &self.config,
        };
        let result = self.registry.dispatch(tool_call, &mut ctx).await;
        self.tool_call_metrics
            .push((tool_call.tool.clone(), start.elapsed(), result.is_success()));
        result
    }

    /// Move to `next` unless the current state is final.
    fn transition(&mut self, next: AgentState) {
        if self.state.is_final() {
            warn!("Ignoring transition {:?} -> {:?}", self.state, next);
            return;
        }
        if self.state != next {
            debug!("Agent state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

/// Read the instruction source, `.webagent/instruction.md`.
pub fn load_instruction(working_dir: &Path) -> Result<String> {
    let path = paths::instruction_path(working_dir);
    let instruction = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read instruction file {}", path.display()))?;
    if instruction.trim().is_empty() {
        anyhow::bail!("Instruction file {} is empty", path.display());
    }
    Ok(instruction)
}
