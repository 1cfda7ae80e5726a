//! Tool definitions, argument schemas and the handler seam.
//!
//! A tool is a name, a parameter schema and a [`ToolHandler`]. Handlers only
//! ever see arguments that passed schema validation, with defaults applied.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::background_process::ServerProcess;
use crate::error::{RegistryError, ToolError, ToolFailure};
use crate::project::ProjectState;
use crate::sandbox::Sandbox;
use crate::ToolCall;
use webagent_config::Config;

pub mod component;
pub mod fs;
pub mod page;
pub mod registry;
pub mod server;
pub mod todo;

pub use registry::ToolRegistry;

/// Declared type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }

    /// Convert `value` to this type, or explain why it cannot be.
    pub fn coerce(&self, value: &Value) -> Result<Value, String> {
        match (self, value) {
            (ParamType::String, Value::String(_)) => Ok(value.clone()),
            (ParamType::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
            (ParamType::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),

            (ParamType::Integer, Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::from(i))
                } else if let Some(f) = n.as_f64().filter(|f| f.fract() == 0.0) {
                    if f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                        Ok(Value::from(f as i64))
                    } else {
                        Err(format!("{} is out of range for an integer", n))
                    }
                } else {
                    Err(format!("expected an integer, got {}", n))
                }
            }
            (ParamType::Integer, Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("expected an integer, got \"{}\"", s)),

            (ParamType::Number, Value::Number(_)) => Ok(value.clone()),
            (ParamType::Number, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("expected a number, got \"{}\"", s)),

            (ParamType::Boolean, Value::Bool(_)) => Ok(value.clone()),
            (ParamType::Boolean, Value::String(s)) => match s.trim() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(format!("expected a boolean, got \"{}\"", s)),
            },

            (ParamType::Array, Value::Array(_)) => Ok(value.clone()),
            (ParamType::Object, Value::Object(_)) => Ok(value.clone()),

            (ty, other) => Err(format!(
                "expected {}, got {}",
                ty.as_str(),
                json_type_name(other)
            )),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
    pub required: bool,
    pub default: Option<Value>,
    pub description: String,
}

impl ParamSpec {
    pub fn required(name: &str, ty: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            ty,
            required: true,
            default: None,
            description: description.to_string(),
        }
    }

    pub fn optional(name: &str, ty: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            ty,
            required: false,
            default: None,
            description: description.to_string(),
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// `name: type`, `name?: type` or `name: type = default`.
    pub fn signature(&self) -> String {
        match (&self.default, self.required) {
            (Some(d), _) => format!("{}: {} = {}", self.name, self.ty.as_str(), d),
            (None, true) => format!("{}: {}", self.name, self.ty.as_str()),
            (None, false) => format!("{}?: {}", self.name, self.ty.as_str()),
        }
    }
}

/// Arguments that passed schema validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedArgs(Map<String, Value>);

impl ValidatedArgs {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn str(&self, name: &str) -> Result<&str, ToolError> {
        self.opt_str(name)
            .ok_or_else(|| ToolError::InvalidArguments(format!("missing string '{}'", name)))
    }

    pub fn opt_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn i64(&self, name: &str) -> Result<i64, ToolError> {
        self.0
            .get(name)
            .and_then(Value::as_i64)
            .ok_or_else(|| ToolError::InvalidArguments(format!("missing integer '{}'", name)))
    }

    pub fn bool_or(&self, name: &str, fallback: bool) -> bool {
        self.0.get(name).and_then(Value::as_bool).unwrap_or(fallback)
    }

    pub fn array(&self, name: &str) -> Option<&Vec<Value>> {
        self.0.get(name).and_then(Value::as_array)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Everything a handler may touch during one invocation.
///
/// Borrowed from the agent for the duration of a single call only.
pub struct ToolContext<'a> {
    pub sandbox: &'a Sandbox,
    pub project: &'a mut ProjectState,
    pub server: &'a mut ServerProcess,
    pub config: &'a Config,
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: &ValidatedArgs, ctx: &mut ToolContext<'_>)
        -> Result<Value, ToolError>;
}

pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
    pub handler: Box<dyn ToolHandler>,
}

impl ToolDefinition {
    pub fn new(
        name: &str,
        description: &str,
        params: Vec<ParamSpec>,
        handler: impl ToolHandler + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            params,
            handler: Box::new(handler),
        }
    }

    /// `fs.write(path: string, content: string)`
    pub fn signature(&self) -> String {
        let params: Vec<String> = self.params.iter().map(ParamSpec::signature).collect();
        format!("{}({})", self.name, params.join(", "))
    }
}

impl std::fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Outcome of one dispatch. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    success: bool,
    tool: String,
    request: ToolCall,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<ToolFailure>,
}

impl ToolCallResult {
    pub fn success(request: ToolCall, result: Value) -> Self {
        Self {
            success: true,
            tool: request.tool.clone(),
            request,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(request: ToolCall, error: ToolFailure) -> Self {
        Self {
            success: false,
            tool: request.tool.clone(),
            request,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn request(&self) -> &ToolCall {
        &self.request
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&ToolFailure> {
        self.error.as_ref()
    }

    /// The JSON the model sees after `Tool result: `.
    pub fn to_model_json(&self) -> Value {
        let mut out = serde_json::json!({
            "tool": self.tool,
            "success": self.success,
        });
        if let Some(result) = &self.result {
            out["result"] = result.clone();
        }
        if let Some(error) = &self.error {
            out["error"] = serde_json::json!({
                "kind": error.kind,
                "message": error.message,
            });
        }
        out
    }
}

/// Register every built-in tool permitted by `allowed_tools`.
pub fn register_builtin_tools(
    registry: &mut ToolRegistry,
    config: &Config,
) -> Result<(), RegistryError> {
    let all = fs::definitions()
        .into_iter()
        .chain(todo::definitions())
        .chain(component::definitions())
        .chain(page::definitions())
        .chain(server::definitions());

    for definition in all {
        if config.is_tool_allowed(&definition.name) {
            registry.register(definition)?;
        }
    }
    Ok(())
}
