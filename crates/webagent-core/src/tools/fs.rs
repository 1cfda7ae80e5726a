//! `fs.*` tools. Every handler goes through the sandbox before touching disk.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::path::Path;
use walkdir::WalkDir;

use super::{ParamSpec, ParamType, ToolContext, ToolDefinition, ToolHandler, ValidatedArgs};
use crate::error::{SandboxError, ToolError};
use crate::utils::atomic_write;

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "fs.write",
            "Create or overwrite a file. Parent directories are created as needed.",
            vec![
                ParamSpec::required("path", ParamType::String, "File path relative to the project root"),
                ParamSpec::required("content", ParamType::String, "Full file content"),
            ],
            WriteFile,
        ),
        ToolDefinition::new(
            "fs.read",
            "Read a text file.",
            vec![ParamSpec::required("path", ParamType::String, "File path relative to the project root")],
            ReadFile,
        ),
        ToolDefinition::new(
            "fs.edit",
            "Edit an existing file, either replacing the first occurrence of old_text with new_text or replacing the whole file with content.",
            vec![
                ParamSpec::required("path", ParamType::String, "File path relative to the project root"),
                ParamSpec::optional("old_text", ParamType::String, "Exact text to find"),
                ParamSpec::optional("new_text", ParamType::String, "Replacement text"),
                ParamSpec::optional("content", ParamType::String, "New full content"),
            ],
            EditFile,
        ),
        ToolDefinition::new(
            "fs.delete",
            "Delete a file.",
            vec![ParamSpec::required("path", ParamType::String, "File path relative to the project root")],
            DeleteFile,
        ),
        ToolDefinition::new(
            "fs.mkdir",
            "Create a directory and any missing parents.",
            vec![ParamSpec::required("path", ParamType::String, "Directory path relative to the project root")],
            MakeDir,
        ),
        ToolDefinition::new(
            "fs.rmdir",
            "Remove a directory. Fails on a non-empty directory unless recursive is true.",
            vec![
                ParamSpec::required("path", ParamType::String, "Directory path relative to the project root"),
                ParamSpec::optional("recursive", ParamType::Boolean, "Remove contents too")
                    .with_default(json!(false)),
            ],
            RemoveDir,
        ),
        ToolDefinition::new(
            "fs.ls",
            "List a directory. Directories come first.",
            vec![ParamSpec::optional("path", ParamType::String, "Directory path relative to the project root")
                .with_default(json!("."))],
            ListDir,
        ),
        ToolDefinition::new(
            "fs.tree",
            "Show a directory tree.",
            vec![
                ParamSpec::optional("path", ParamType::String, "Directory path relative to the project root")
                    .with_default(json!(".")),
                ParamSpec::optional("max_depth", ParamType::Integer, "Levels to descend")
                    .with_default(json!(3)),
            ],
            Tree,
        ),
    ]
}

fn not_found(path: &str) -> ToolError {
    SandboxError::NotFound {
        path: path.to_string(),
    }
    .into()
}

fn exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

struct WriteFile;

#[async_trait]
impl ToolHandler for WriteFile {
    async fn call(&self, args: &ValidatedArgs, ctx: &mut ToolContext<'_>) -> Result<Value, ToolError> {
        let raw = args.str("path")?;
        let content = args.str("content")?;
        let path = ctx.sandbox.check_write(raw)?;

        if path.is_dir() {
            return Err(ToolError::InvalidArguments(format!("{} is a directory", raw)));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        atomic_write(&path, content.as_bytes())?;

        Ok(json!({
            "path": ctx.sandbox.display(&path),
            "bytes_written": content.len(),
        }))
    }
}

struct ReadFile;

#[async_trait]
impl ToolHandler for ReadFile {
    async fn call(&self, args: &ValidatedArgs, ctx: &mut ToolContext<'_>) -> Result<Value, ToolError> {
        let raw = args.str("path")?;
        let path = ctx.sandbox.check_read(raw)?;

        if !path.exists() {
            return Err(not_found(raw));
        }
        if !path.is_file() {
            return Err(ToolError::InvalidArguments(format!("{} is not a file", raw)));
        }
        let bytes = std::fs::read(&path)?;
        let size_bytes = bytes.len();
        let content = String::from_utf8(bytes).map_err(|_| {
            ToolError::Execution(format!(
                "{} is not UTF-8 text ({} bytes); only text files can be read",
                raw, size_bytes
            ))
        })?;

        Ok(json!({
            "path": ctx.sandbox.display(&path),
            "content": content,
            "size_bytes": size_bytes,
            "line_count": content.lines().count(),
        }))
    }
}

struct EditFile;

#[async_trait]
impl ToolHandler for EditFile {
    async fn call(&self, args: &ValidatedArgs, ctx: &mut ToolContext<'_>) -> Result<Value, ToolError> {
        let raw = args.str("path")?;
        let path = ctx.sandbox.check_write(raw)?;

        if !path.is_file() {
            return Err(not_found(raw));
        }

        let (mode, updated) = match (
            args.opt_str("content"),
            args.opt_str("old_text"),
            args.opt_str("new_text"),
        ) {
            (Some(content), None, None) => ("replace_all", content.to_string()),
            (None, Some(old_text), Some(new_text)) => {
                if old_text.is_empty() {
                    return Err(ToolError::InvalidArguments(
                        "old_text must not be empty".to_string(),
                    ));
                }
                let current = std::fs::read_to_string(&path)?;
                if !current.contains(old_text) {
                    return Err(ToolError::Execution(format!(
                        "old_text not found in {}",
                        raw
                    )));
                }
                ("search_replace", current.replacen(old_text, new_text, 1))
            }
            _ => {
                return Err(ToolError::InvalidArguments(
                    "provide either content, or both old_text and new_text".to_string(),
                ))
            }
        };

        atomic_write(&path, updated.as_bytes())?;

        Ok(json!({
            "path": ctx.sandbox.display(&path),
            "mode": mode,
            "bytes_written": updated.len(),
        }))
    }
}

struct DeleteFile;

#[async_trait]
impl ToolHandler for DeleteFile {
    async fn call(&self, args: &ValidatedArgs, ctx: &mut ToolContext<'_>) -> Result<Value, ToolError> {
        let raw = args.str("path")?;
        let path = ctx.sandbox.check_write(raw)?;

        if !exists(&path) {
            return Err(not_found(raw));
        }
        if path.is_dir() {
            return Err(ToolError::InvalidArguments(format!(
                "{} is a directory; use fs.rmdir",
                raw
            )));
        }
        std::fs::remove_file(&path)?;

        Ok(json!({ "path": ctx.sandbox.display(&path), "deleted": true }))
    }
}

struct MakeDir;

#[async_trait]
impl ToolHandler for MakeDir {
    async fn call(&self, args: &ValidatedArgs, ctx: &mut ToolContext<'_>) -> Result<Value, ToolError> {
        let raw = args.str("path")?;
        let path = ctx.sandbox.check_write(raw)?;

        if path.is_file() {
            return Err(ToolError::Execution(format!("{} exists and is a file", raw)));
        }
        let created = !path.is_dir();
        std::fs::create_dir_all(&path)?;

        Ok(json!({ "path": ctx.sandbox.display(&path), "created": created }))
    }
}

struct RemoveDir;

#[async_trait]
impl ToolHandler for RemoveDir {
    async fn call(&self, args: &ValidatedArgs, ctx: &mut ToolContext<'_>) -> Result<Value, ToolError> {
        let raw = args.str("path")?;
        let recursive = args.bool_or("recursive", false);
        let path = ctx.sandbox.check_write(raw)?;

        if !exists(&path) {
            return Err(not_found(raw));
        }
        if !path.is_dir() {
            return Err(ToolError::InvalidArguments(format!("{} is not a directory", raw)));
        }

        if recursive {
            std::fs::remove_dir_all(&path)?;
        } else {
            if std::fs::read_dir(&path)?.next().is_some() {
                return Err(ToolError::Execution(format!("Directory not empty: {}", raw)));
            }
            std::fs::remove_dir(&path)?;
        }

        Ok(json!({
            "path": ctx.sandbox.display(&path),
            "removed": true,
            "recursive": recursive,
        }))
    }
}

/// Directories first, then case-insensitive name.
fn compare_entries(a: &walkdir::DirEntry, b: &walkdir::DirEntry) -> Ordering {
    let a_dir = a.file_type().is_dir();
    let b_dir = b.file_type().is_dir();
    b_dir.cmp(&a_dir).then_with(|| {
        a.file_name()
            .to_string_lossy()
            .to_lowercase()
            .cmp(&b.file_name().to_string_lossy().to_lowercase())
    })
}

fn sorted_children(dir: &Path) -> Result<Vec<walkdir::DirEntry>, ToolError> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by(compare_entries)
        .into_iter()
        .map(|entry| {
            entry.map_err(|e| {
                ToolError::Execution(format!("failed to read {}: {}", dir.display(), e))
            })
        })
        .collect()
}

fn entry_type(entry: &walkdir::DirEntry) -> &'static str {
    let ft = entry.file_type();
    if ft.is_dir() {
        "directory"
    } else if ft.is_symlink() {
        "symlink"
    } else {
        "file"
    }
}

struct ListDir;

#[async_trait]
impl ToolHandler for ListDir {
    async fn call(&self, args: &ValidatedArgs, ctx: &mut ToolContext<'_>) -> Result<Value, ToolError> {
        let raw = args.opt_str("path").unwrap_or(".");
        let path = ctx.sandbox.check_read(raw)?;

        if !path.exists() {
            return Err(not_found(raw));
        }
        if !path.is_dir() {
            return Err(ToolError::InvalidArguments(format!("{} is not a directory", raw)));
        }

        let entries: Vec<Value> = sorted_children(&path)?
            .iter()
            .map(|entry| {
                let size = if entry.file_type().is_file() {
                    entry.metadata().map(|m| m.len()).unwrap_or(0)
                } else {
                    0
                };
                json!({
                    "name": entry.file_name().to_string_lossy(),
                    "type": entry_type(entry),
                    "size": size,
                })
            })
            .collect();

        Ok(json!({
            "path": ctx.sandbox.display(&path),
            "count": entries.len(),
            "entries": entries,
        }))
    }
}

struct Tree;

#[async_trait]
impl ToolHandler for Tree {
    async fn call(&self, args: &ValidatedArgs, ctx: &mut ToolContext<'_>) -> Result<Value, ToolError> {
        let raw = args.opt_str("path").unwrap_or(".");
        let max_depth = args.i64("max_depth")?;
        if max_depth < 1 {
            return Err(ToolError::InvalidArguments(
                "max_depth must be at least 1".to_string(),
            ));
        }
        let path = ctx.sandbox.check_read(raw)?;

        if !path.exists() {
            return Err(not_found(raw));
        }
        if !path.is_dir() {
            return Err(ToolError::InvalidArguments(format!("{} is not a directory", raw)));
        }

        let mut lines = vec![format!("{}/", ctx.sandbox.display(&path))];
        render_tree(&path, "", 1, max_depth as usize, &mut lines)?;

        Ok(json!({
            "path": ctx.sandbox.display(&path),
            "tree": lines,
        }))
    }
}

fn render_tree(
    dir: &Path,
    prefix: &str,
    depth: usize,
    max_depth: usize,
    lines: &mut Vec<String>,
) -> Result<(), ToolError> {
    let children = sorted_children(dir)?;
    let last = children.len().saturating_sub(1);

    for (i, entry) in children.iter().enumerate() {
        let is_last = i == last;
        let connector = if is_last { "└── " } else { "├── " };
        let is_dir = entry.file_type().is_dir();
        let name = entry.file_name().to_string_lossy();
        lines.push(format!(
            "{}{}{}{}",
            prefix,
            connector,
            name,
            if is_dir { "/" } else { "" }
        ));

        if is_dir && depth < max_depth {
            let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });
            render_tree(entry.path(), &child_prefix, depth + 1, max_depth, lines)?;
        }
    }
    Ok(())
}
