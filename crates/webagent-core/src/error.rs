//! Error taxonomy shared by the sandbox, the dispatcher and the agent loop.
//!
//! Typed errors stay typed until they reach a boundary that feeds them back to
//! the model; there they are flattened into a serializable [`ToolFailure`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Closed set of failure categories recorded in history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    PathEscape,
    ProtectedPath,
    NotFound,
    DuplicateTool,
    UnknownTool,
    SchemaViolation,
    BackendTimeout,
    BackendError,
    MalformedToolCall,
    /// Handler failure that is not a sandbox or schema problem.
    Execution,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::PathEscape => "path_escape",
            ErrorKind::ProtectedPath => "protected_path",
            ErrorKind::NotFound => "not_found",
            ErrorKind::DuplicateTool => "duplicate_tool",
            ErrorKind::UnknownTool => "unknown_tool",
            ErrorKind::SchemaViolation => "schema_violation",
            ErrorKind::BackendTimeout => "backend_timeout",
            ErrorKind::BackendError => "backend_error",
            ErrorKind::MalformedToolCall => "malformed_tool_call",
            ErrorKind::Execution => "execution",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The shape in which every failure is stored in history and shown to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl ToolFailure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("path escapes the working directory: {path}")]
    PathEscape { path: String },
    #[error("path is protected and cannot be modified: {path}")]
    ProtectedPath { path: String },
    #[error("no such file or directory: {path}")]
    NotFound { path: String },
    #[error("invalid sandbox policy: {0}")]
    InvalidPolicy(String),
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SandboxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SandboxError::PathEscape { .. } => ErrorKind::PathEscape,
            SandboxError::ProtectedPath { .. } => ErrorKind::ProtectedPath,
            SandboxError::NotFound { .. } => ErrorKind::NotFound,
            SandboxError::InvalidPolicy(_) | SandboxError::Io { .. } => ErrorKind::Execution,
        }
    }
}

/// Failures raised by tool handlers.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Execution(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ToolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::Sandbox(e) => e.kind(),
            ToolError::NotFound(_) => ErrorKind::NotFound,
            ToolError::InvalidArguments(_)
            | ToolError::Execution(_)
            | ToolError::Io(_)
            | ToolError::Json(_) => ErrorKind::Execution,
        }
    }

    pub fn to_failure(&self) -> ToolFailure {
        ToolFailure::new(self.kind(), self.to_string())
    }
}

/// Startup-time registration errors. These indicate a programming error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool already registered: {0}")]
    DuplicateTool(String),
}

/// Failures detected before a handler runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("schema violation on parameter '{param}': {reason}")]
    SchemaViolation { param: String, reason: String },
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::UnknownTool(_) => ErrorKind::UnknownTool,
            DispatchError::SchemaViolation { .. } => ErrorKind::SchemaViolation,
        }
    }

    pub fn to_failure(&self) -> ToolFailure {
        ToolFailure::new(self.kind(), self.to_string())
    }
}

/// Failures absorbed by the agent loop itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoopError {
    #[error("model backend timed out after {0:?}")]
    BackendTimeout(Duration),
    #[error("model backend error: {0}")]
    BackendError(String),
    #[error("malformed tool call: {0}")]
    MalformedToolCall(String),
}

impl LoopError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoopError::BackendTimeout(_) => ErrorKind::BackendTimeout,
            LoopError::BackendError(_) => ErrorKind::BackendError,
            LoopError::MalformedToolCall(_) => ErrorKind::MalformedToolCall,
        }
    }

    pub fn to_failure(&self) -> ToolFailure {
        ToolFailure::new(self.kind(), self.to_string())
    }
}
