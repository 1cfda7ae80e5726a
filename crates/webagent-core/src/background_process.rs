//! The project's development server, run as a single managed child process.
//!
//! The command comes from configuration only; the model can start and stop it
//! but never choose what runs. Output is appended to `.webagent/server.log`.

use serde::Serialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::error::ToolError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerStatus {
    pub running: bool,
    pub pid: Option<u32>,
    pub exit_code: Option<i32>,
}

#[derive(Debug)]
pub struct ServerProcess {
    command: Vec<String>,
    working_dir: PathBuf,
    log_path: PathBuf,
    startup_wait: Duration,
    child: Option<Child>,
    last_exit: Option<i32>,
}

impl ServerProcess {
    pub fn new(
        command: Vec<String>,
        working_dir: PathBuf,
        log_path: PathBuf,
        startup_wait: Duration,
    ) -> Self {
        Self {
            command,
            working_dir,
            log_path,
            startup_wait,
            child: None,
            last_exit: None,
        }
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn log_path(&self) -> &PathBuf {
        &self.log_path
    }

    /// Reap the child if it has exited since the last check.
    fn refresh(&mut self) {
        if let Some(child) = self.child.as_mut() {
            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!("Server process exited with {}", status);
                    self.last_exit = status.code();
                    self.child = None;
                }
                Ok(None) => {}
                Err(e) => warn!("Failed to poll server process: {}", e),
            }
        }
    }

    pub fn status(&mut self) -> ServerStatus {
        self.refresh();
        ServerStatus {
            running: self.child.is_some(),
            pid: self.child.as_ref().and_then(Child::id),
            exit_code: if self.child.is_some() { None } else { self.last_exit },
        }
    }

    pub async fn start(&mut self) -> Result<ServerStatus, ToolError> {
        self.refresh();
        if let Some(child) = &self.child {
            return Err(ToolError::Execution(format!(
                "server already running (pid {})",
                child.id().unwrap_or_default()
            )));
        }
        let Some((program, args)) = self.command.split_first() else {
            return Err(ToolError::Execution(
                "no server command configured (set server.command in .webagent/config.json)"
                    .to_string(),
            ));
        };

        if let Some(parent) = self.log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let log = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        let log_err = log.try_clone()?;

        let child = Command::new(program)
            .args(args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::Execution(format!("failed to start '{}': {}", program, e)))?;

        info!("Started server process {:?} (pid {:?})", self.command, child.id());
        self.child = Some(child);
        self.last_exit = None;

        tokio::time::sleep(self.startup_wait).await;
        let status = self.status();
        if !status.running {
            return Err(ToolError::Execution(format!(
                "server exited during startup with code {:?}; see server.logs",
                status.exit_code
            )));
        }
        Ok(status)
    }

    pub async fn stop(&mut self) -> Result<ServerStatus, ToolError> {
        self.refresh();
        let Some(mut child) = self.child.take() else {
            return Err(ToolError::Execution("server is not running".to_string()));
        };
        let pid = child.id();
        child.start_kill()?;
        let status = child.wait().await?;
        info!("Stopped server process (pid {:?}): {}", pid, status);
        self.last_exit = status.code();
        Ok(ServerStatus {
            running: false,
            pid,
            exit_code: self.last_exit,
        })
    }

    /// Last `lines` lines of the server log; empty when nothing was logged yet.
    pub fn tail_logs(&self, lines: usize) -> Result<Vec<String>, ToolError> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }
        let bytes = std::fs::read(&self.log_path)?;
        let content = String::from_utf8_lossy(&bytes);
        let all: Vec<&str> = content.lines().collect();
        let start = all.len().saturating_sub(lines);
        Ok(all[start..].iter().map(|l| l.to_string()).collect())
    }
}
