//! Durable project registries: TODO list, component registry, page registry.
//!
//! Each registry is an explicit value owned by the agent's [`ProjectState`].
//! Tool handlers reload it from disk before use and write it back after a
//! mutation, so edits made between calls are picked up.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::ToolError;
use crate::paths;
use crate::utils::atomic_write;

fn load_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T, ToolError> {
    if !path.exists() {
        return Ok(T::default());
    }
    let raw = std::fs::read_to_string(path)?;
    if raw.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(&raw).map_err(|e| {
        ToolError::Execution(format!("corrupt registry file {}: {}", path.display(), e))
    })
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ToolError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let raw = serde_json::to_string_pretty(value)?;
    atomic_write(path, raw.as_bytes())?;
    Ok(())
}

// =============================================================================
// TODO list
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TodoStatus {
    Pending,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: u64,
    pub description: String,
    pub status: TodoStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TodoFilter {
    All,
    Pending,
    Completed,
}

impl std::str::FromStr for TodoFilter {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(TodoFilter::All),
            "pending" => Ok(TodoFilter::Pending),
            "completed" => Ok(TodoFilter::Completed),
            other => Err(ToolError::InvalidArguments(format!(
                "status must be one of all, pending, completed (got '{}')",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TodoList {
    path: PathBuf,
    items: Vec<TodoItem>,
}

impl TodoList {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            items: Vec::new(),
        }
    }

    pub fn reload(&mut self) -> Result<(), ToolError> {
        self.items = load_json(&self.path)?;
        Ok(())
    }

    pub fn save(&self) -> Result<(), ToolError> {
        save_json(&self.path, &self.items)
    }

    pub fn items(&self) -> &[TodoItem] {
        &self.items
    }

    pub fn add(&mut self, description: &str) -> Result<&TodoItem, ToolError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(ToolError::InvalidArguments(
                "description must not be empty".to_string(),
            ));
        }
        let id = self.items.iter().map(|i| i.id).max().unwrap_or(0) + 1;
        self.items.push(TodoItem {
            id,
            description: description.to_string(),
            status: TodoStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
        });
        Ok(&self.items[self.items.len() - 1])
    }

    pub fn list(&self, filter: TodoFilter) -> Vec<&TodoItem> {
        self.items
            .iter()
            .filter(|i| match filter {
                TodoFilter::All => true,
                TodoFilter::Pending => i.status == TodoStatus::Pending,
                TodoFilter::Completed => i.status == TodoStatus::Completed,
            })
            .collect()
    }

    pub fn complete(&mut self, id: u64) -> Result<&TodoItem, ToolError> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| ToolError::NotFound(format!("todo item {}", id)))?;
        if item.status == TodoStatus::Completed {
            return Err(ToolError::Execution(format!(
                "todo item {} is already completed",
                id
            )));
        }
        item.status = TodoStatus::Completed;
        item.completed_at = Some(Utc::now());
        Ok(item)
    }

    pub fn remove(&mut self, id: u64) -> Result<TodoItem, ToolError> {
        let pos = self
            .items
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| ToolError::NotFound(format!("todo item {}", id)))?;
        Ok(self.items.remove(pos))
    }
}

// =============================================================================
// Component registry
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentEntry {
    /// Relative to `components/`.
    pub path: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct ComponentRegistry {
    path: PathBuf,
    entries: BTreeMap<String, ComponentEntry>,
}

impl ComponentRegistry {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            entries: BTreeMap::new(),
        }
    }

    pub fn reload(&mut self) -> Result<(), ToolError> {
        self.entries = load_json(&self.path)?;
        Ok(())
    }

    pub fn save(&self) -> Result<(), ToolError> {
        save_json(&self.path, &self.entries)
    }

    /// Insert or replace; returns true when an existing entry was replaced.
    pub fn register(&mut self, name: &str, entry: ComponentEntry) -> bool {
        self.entries.insert(name.to_string(), entry).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&ComponentEntry> {
        self.entries.get(name)
    }

    pub fn entries(&self) -> &BTreeMap<String, ComponentEntry> {
        &self.entries
    }
}

// =============================================================================
// Page registry
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageEntry {
    pub route: String,
    pub title: String,
    #[serde(default)]
    pub components: Vec<String>,
}

impl PageEntry {
    /// `/` for `index.html`, otherwise `/` plus the name without `.html`.
    pub fn default_route(name: &str) -> String {
        if name == "index.html" {
            "/".to_string()
        } else {
            format!("/{}", name.strip_suffix(".html").unwrap_or(name))
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageRegistry {
    path: PathBuf,
    entries: BTreeMap<String, PageEntry>,
}

impl PageRegistry {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            entries: BTreeMap::new(),
        }
    }

    pub fn reload(&mut self) -> Result<(), ToolError> {
        self.entries = load_json(&self.path)?;
        Ok(())
    }

    pub fn save(&self) -> Result<(), ToolError> {
        save_json(&self.path, &self.entries)
    }

    pub fn register(&mut self, name: &str, entry: PageEntry) -> bool {
        self.entries.insert(name.to_string(), entry).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&PageEntry> {
        self.entries.get(name)
    }

    pub fn entries(&self) -> &BTreeMap<String, PageEntry> {
        &self.entries
    }
}

/// All registries for one working directory.
#[derive(Debug, Clone)]
pub struct ProjectState {
    pub todos: TodoList,
    pub components: ComponentRegistry,
    pub pages: PageRegistry,
}

impl ProjectState {
    pub fn new(working_dir: &Path) -> Self {
        Self {
            todos: TodoList::new(paths::todo_path(working_dir)),
            components: ComponentRegistry::new(paths::components_path(working_dir)),
            pages: PageRegistry::new(paths::pages_path(working_dir)),
        }
    }
}
