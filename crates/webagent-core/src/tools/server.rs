use async_trait::async_trait;
use serde_json::{json, Value};

use super::{ParamSpec, ParamType, ToolContext, ToolDefinition, ToolHandler, ValidatedArgs};
use crate::error::ToolError;

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "server.start",
            "Start the project's configured development server.",
            Vec::new(),
            StartServer,
        ),
        ToolDefinition::new(
            "server.stop",
            "Stop the development server.",
            Vec::new(),
            StopServer,
        ),
        ToolDefinition::new(
            "server.status",
            "Report whether the development server is running.",
            Vec::new(),
            ServerStatusTool,
        ),
        ToolDefinition::new(
            "server.logs",
            "Show the last lines of the development server output.",
            vec![ParamSpec::optional("lines", ParamType::Integer, "Number of lines")],
            ServerLogs,
        ),
    ]
}

struct StartServer;

#[async_trait]
impl ToolHandler for StartServer {
    async fn call(&self, _args: &ValidatedArgs, ctx: &mut ToolContext<'_>) -> Result<Value, ToolError> {
        let status = ctx.server.start().await?;
        Ok(json!({
            "pid": status.pid,
            "command": ctx.server.command(),
        }))
    }
}

struct StopServer;

#[async_trait]
impl ToolHandler for StopServer {
    async fn call(&self, _args: &ValidatedArgs, ctx: &mut ToolContext<'_>) -> Result<Value, ToolError> {
        let status = ctx.server.stop().await?;
        Ok(json!(status))
    }
}

struct ServerStatusTool;

#[async_trait]
impl ToolHandler for ServerStatusTool {
    async fn call(&self, _args: &ValidatedArgs, ctx: &mut ToolContext<'_>) -> Result<Value, ToolError> {
        Ok(json!(ctx.server.status()))
    }
}

struct ServerLogs;

#[async_trait]
impl ToolHandler for ServerLogs {
    async fn call(&self, args: &ValidatedArgs, ctx: &mut ToolContext<'_>) -> Result<Value, ToolError> {
        let lines = match args.get("lines") {
            Some(_) => {
                let n = args.i64("lines")?;
                usize::try_from(n).map_err(|_| {
                    ToolError::InvalidArguments(format!("lines must be positive (got {})", n))
                })?
            }
            None => ctx.config.server.log_tail_lines,
        };
        let tail = ctx.server.tail_logs(lines)?;
        Ok(json!({
            "count": tail.len(),
            "lines": tail,
        }))
    }
}
