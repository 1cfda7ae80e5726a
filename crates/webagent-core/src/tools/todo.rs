//! `todo.*` tools over the project's TODO list.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{ParamSpec, ParamType, ToolContext, ToolDefinition, ToolHandler, ValidatedArgs};
use crate::error::ToolError;
use crate::project::TodoFilter;

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "todo.add",
            "Add a pending TODO item.",
            vec![ParamSpec::required("description", ParamType::String, "What needs doing")],
            AddTodo,
        ),
        ToolDefinition::new(
            "todo.list",
            "List TODO items.",
            vec![ParamSpec::optional("status", ParamType::String, "all, pending or completed")
                .with_default(json!("all"))],
            ListTodos,
        ),
        ToolDefinition::new(
            "todo.complete",
            "Mark a TODO item as completed.",
            vec![ParamSpec::required("id", ParamType::Integer, "Item id")],
            CompleteTodo,
        ),
        ToolDefinition::new(
            "todo.remove",
            "Remove a TODO item.",
            vec![ParamSpec::required("id", ParamType::Integer, "Item id")],
            RemoveTodo,
        ),
    ]
}

fn item_id(args: &ValidatedArgs) -> Result<u64, ToolError> {
    let id = args.i64("id")?;
    u64::try_from(id)
        .map_err(|_| ToolError::InvalidArguments(format!("id must be positive (got {})", id)))
}

struct AddTodo;

#[async_trait]
impl ToolHandler for AddTodo {
    async fn call(&self, args: &ValidatedArgs, ctx: &mut ToolContext<'_>) -> Result<Value, ToolError> {
        let todos = &mut ctx.project.todos;
        todos.reload()?;
        let item = serde_json::to_value(todos.add(args.str("description")?)?)?;
        todos.save()?;
        Ok(json!({ "item": item }))
    }
}

struct ListTodos;

#[async_trait]
impl ToolHandler for ListTodos {
    async fn call(&self, args: &ValidatedArgs, ctx: &mut ToolContext<'_>) -> Result<Value, ToolError> {
        let filter: TodoFilter = args.opt_str("status").unwrap_or("all").parse()?;
        let todos = &mut ctx.project.todos;
        todos.reload()?;
        let items = todos.list(filter);
        Ok(json!({
            "count": items.len(),
            "items": items,
        }))
    }
}

struct CompleteTodo;

#[async_trait]
impl ToolHandler for CompleteTodo {
    async fn call(&self, args: &ValidatedArgs, ctx: &mut ToolContext<'_>) -> Result<Value, ToolError> {
        let id = item_id(args)?;
        let todos = &mut ctx.project.todos;
        todos.reload()?;
        let item = serde_json::to_value(todos.complete(id)?)?;
        todos.save()?;
        Ok(json!({ "item": item }))
    }
}

struct RemoveTodo;

#[async_trait]
impl ToolHandler for RemoveTodo {
    async fn call(&self, args: &ValidatedArgs, ctx: &mut ToolContext<'_>) -> Result<Value, ToolError> {
        let id = item_id(args)?;
        let todos = &mut ctx.project.todos;
        todos.reload()?;
        let item = todos.remove(id)?;
        todos.save()?;
        Ok(json!({
            "removed": true,
            "item": item,
            "remaining": todos.items().len(),
        }))
    }
}
