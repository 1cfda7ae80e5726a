use async_trait::async_trait;
use serde_json::{json, Value};

use super::{ParamSpec, ParamType, ToolContext, ToolDefinition, ToolHandler, ValidatedArgs};
use crate::error::ToolError;
use crate::project::PageEntry;

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "page.register",
            "Register a page, its route and the components it uses. Registering an existing name replaces it.",
            vec![
                ParamSpec::required("name", ParamType::String, "Page file name, e.g. about.html"),
                ParamSpec::optional("route", ParamType::String, "URL route; derived from name when omitted"),
                ParamSpec::optional("title", ParamType::String, "Page title; defaults to name"),
                ParamSpec::optional("components", ParamType::Array, "Names of components used")
                    .with_default(json!([])),
            ],
            RegisterPage,
        ),
        ToolDefinition::new("page.list", "List registered pages.", Vec::new(), ListPages),
    ]
}

struct RegisterPage;

#[async_trait]
impl ToolHandler for RegisterPage {
    async fn call(&self, args: &ValidatedArgs, ctx: &mut ToolContext<'_>) -> Result<Value, ToolError> {
        let name = args.str("name")?.trim();
        if name.is_empty() {
            return Err(ToolError::InvalidArguments("name must not be empty".to_string()));
        }

        let components = args
            .array("components")
            .map(|items| {
                items
                    .iter()
                    .map(|v| {
                        v.as_str().map(str::to_string).ok_or_else(|| {
                            ToolError::InvalidArguments(
                                "components must be a list of component names".to_string(),
                            )
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();

        let entry = PageEntry {
            route: args
                .opt_str("route")
                .map(str::to_string)
                .unwrap_or_else(|| PageEntry::default_route(name)),
            title: args.opt_str("title").unwrap_or(name).to_string(),
            components,
        };

        let registry = &mut ctx.project.pages;
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

struct ListPages;

#[async_trait]
impl ToolHandler for ListPages {
    async fn call(&self, _args: &ValidatedArgs, ctx: &mut ToolContext<'_>) -> Result<Value, ToolError> {
        let registry = &mut ctx.project.pages;
        registry.reload()?;
        Ok(json!({
            "count": registry.entries().len(),
            "pages": registry.entries(),
        }))
    }
}
