use futures_util::FutureExt;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{debug, warn};

use super::{ParamSpec, ToolCallResult, ToolContext, ToolDefinition, ValidatedArgs};
use crate::error::{DispatchError, ErrorKind, RegistryError, ToolFailure};
use crate::ToolCall;

/// Registered tools, in registration order.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: ToolDefinition) -> Result<(), RegistryError> {
        if self.index.contains_key(&definition.name) {
            return Err(RegistryError::DuplicateTool(definition.name));
        }
        debug!("Registered tool {}", definition.name);
        self.index.insert(definition.name.clone(), self.tools.len());
        self.tools.push(definition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Look up and validate without invoking anything.
    pub fn validate(&self, request: &ToolCall) -> Result<ValidatedArgs, DispatchError> {
        let definition = self
            .get(&request.tool)
            .ok_or_else(|| DispatchError::UnknownTool(request.tool.clone()))?;
        validate_args(&definition.params, &request.args)
    }

    /// Validate and run one tool call.
    ///
    /// Never fails: unknown tools, schema violations, handler errors and
    /// handler panics all come back as a failed [`ToolCallResult`].
    pub async fn dispatch(&self, request: &ToolCall, ctx: &mut ToolContext<'_>) -> ToolCallResult {
        let args = match self.validate(request) {
            Ok(args) => args,
            Err(e) => {
                warn!("Rejected call to {}: {}", request.tool, e);
                return ToolCallResult::failure(request.clone(), e.to_failure());
            }
        };

        // validate() succeeded, so the tool exists
        let Some(definition) = self.get(&request.tool) else {
            return ToolCallResult::failure(
                request.clone(),
                DispatchError::UnknownTool(request.tool.clone()).to_failure(),
            );
        };

        debug!("Dispatching {} with args {}", request.tool, args.clone().into_value());
        let start = Instant::now();
        let outcome = AssertUnwindSafe(definition.handler.call(&args, ctx))
            .catch_unwind()
            .await;
        let elapsed = start.elapsed();

        match outcome {
            Ok(Ok(value)) => {
                debug!("{} succeeded in {:?}", request.tool, elapsed);
                ToolCallResult::success(request.clone(), value)
            }
            Ok(Err(e)) => {
                debug!("{} failed in {:?}: {}", request.tool, elapsed, e);
                ToolCallResult::failure(request.clone(), e.to_failure())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!("{} panicked: {}", request.tool, message);
                ToolCallResult::failure(
                    request.clone(),
                    ToolFailure::new(
                        ErrorKind::Execution,
                        format!("tool panicked: {}", message),
                    ),
                )
            }
        }
    }
}

/// Check `args` against `params`, converting values and filling defaults.
///
/// Required parameters are checked in declaration order before unknown
/// parameters, so the reported parameter is deterministic.
pub fn validate_args(params: &[ParamSpec], args: &Value) -> Result<ValidatedArgs, DispatchError> {
    let empty = Map::new();
    let supplied = match args {
        Value::Object(map) => map,
        Value::Null => &empty,
        _ => {
            return Err(DispatchError::SchemaViolation {
                param: "args".to_string(),
                reason: "arguments must be a JSON object".to_string(),
            })
        }
    };

    let mut validated = Map::new();
    for spec in params {
        match supplied.get(&spec.name).filter(|v| !v.is_null()) {
            Some(value) => {
                let converted =
                    spec.ty
                        .coerce(value)
                        .map_err(|reason| DispatchError::SchemaViolation {
                            param: spec.name.clone(),
                            reason,
                        })?;
                validated.insert(spec.name.clone(), converted);
            }
            None if spec.required => {
                return Err(DispatchError::SchemaViolation {
                    param: spec.name.clone(),
                    reason: "required parameter is missing".to_string(),
                });
            }
            None => {
                if let Some(default) = &spec.default {
                    validated.insert(spec.name.clone(), default.clone());
                }
            }
        }
    }

    if let Some(unknown) = supplied
        .keys()
        .find(|k| !params.iter().any(|p| &p.name == *k))
    {
        return Err(DispatchError::SchemaViolation {
            param: unknown.clone(),
            reason: "unknown parameter".to_string(),
        });
    }

    Ok(ValidatedArgs::new(validated))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ParamType;
    use serde_json::json;

    fn params() -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("path", ParamType::String, ""),
            ParamSpec::optional("recursive", ParamType::Boolean, "").with_default(json!(false)),
            ParamSpec::optional("note", ParamType::String, ""),
        ]
    }

    #[test]
    fn test_defaults_are_applied_and_absent_optionals_skipped() {
        let args = validate_args(&params(), &json!({"path": "a"})).unwrap();
        assert_eq!(args.get("recursive"), Some(&json!(false)));
        assert!(args.get("note").is_none());
    }

    #[test]
    fn test_null_counts_as_absent() {
        let err = validate_args(&params(), &json!({"path": null})).unwrap_err();
        assert_eq!(
            err,
            DispatchError::SchemaViolation {
                param: "path".into(),
                reason: "required parameter is missing".into()
            }
        );
        assert!(validate_args(&params(), &json!({"path": "a", "note": null})).is_ok());
    }

    #[test]
    fn test_null_args_treated_as_empty_object() {
        let no_params: Vec<ParamSpec> = Vec::new();
        assert!(validate_args(&no_params, &Value::Null).is_ok());
        let err = validate_args(&no_params, &json!([1, 2])).unwrap_err();
        assert!(matches!(err, DispatchError::SchemaViolation { ref param, .. } if param == "args"));
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let err = validate_args(&params(), &json!({"path": "a", "mode": "x"})).unwrap_err();
        assert!(matches!(err, DispatchError::SchemaViolation { ref param, .. } if param == "mode"));
    }

    #[test]
    fn test_values_are_converted() {
        let args = validate_args(&params(), &json!({"path": 12, "recursive": "true"})).unwrap();
        assert_eq!(args.str("path").unwrap(), "12");
        assert!(args.bool_or("recursive", false));
    }
}
