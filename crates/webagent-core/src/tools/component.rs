use async_trait::async_trait;
use serde_json::{json, Value};

use super::{ParamSpec, ParamType, ToolContext, ToolDefinition, ToolHandler, ValidatedArgs};
use crate::error::ToolError;
use crate::project::ComponentEntry;

/// Directory component paths are relative to.
pub const COMPONENTS_DIR: &str = "components";

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "component.register",
            "Register a reusable component. Registering an existing name replaces it.",
            vec![
                ParamSpec::required("name", ParamType::String, "Unique component name"),
                ParamSpec::required("path", ParamType::String, "Path relative to components/"),
                ParamSpec::optional("description", ParamType::String, "What the component is")
                    .with_default(json!("")),
            ],
            RegisterComponent,
        ),
        ToolDefinition::new(
            "component.list",
            "List registered components.",
            Vec::new(),
            ListComponents,
        ),
    ]
}

struct RegisterComponent;

#[async_trait]
impl ToolHandler for RegisterComponent {
    async fn call(&self, args: &ValidatedArgs, ctx: &mut ToolContext<'_>) -> Result<Value, ToolError> {
        let name = args.str("name")?.trim();
        if name.is_empty() {
            return Err(ToolError::InvalidArguments("name must not be empty".to_string()));
        }
        let path = args.str("path")?.trim();
        if path.is_empty() {
            return Err(ToolError::InvalidArguments("path must not be empty".to_string()));
        }
        ctx.sandbox.check_read(&format!("{}/{}", COMPONENTS_DIR, path))?;

        let entry = ComponentEntry {
            path: path.to_string(),
            description: args.opt_str("description").unwrap_or_default().to_string(),
        };

        let registry = &mut ctx.project.components;
        registry.reload()?;
        let updated = registry.register(name, entry.clone());
        registry.save()?;

        Ok(json!({
            "name": name,
            "entry": entry,
            "updated": updated,
        }))
    }
}

struct ListComponents;

#[async_trait]
impl ToolHandler for ListComponents {
    async fn call(&self, _args: &ValidatedArgs, ctx: &mut ToolContext<'_>) -> Result<Value, ToolError> {
        let registry = &mut ctx.project.components;
        registry.reload()?;
        Ok(json!({
            "count": registry.entries().len(),
            "components": registry.entries(),
        }))
    }
}
