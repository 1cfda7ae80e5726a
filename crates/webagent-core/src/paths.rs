//! Locations of the project state files under `<working_dir>/.webagent/`.

use std::path::{Path, PathBuf};

pub use webagent_config::{state_dir, STATE_DIR_NAME};

pub const INSTRUCTION_FILE: &str = "instruction.md";
pub const TODO_FILE: &str = "todo.json";
pub const COMPONENTS_FILE: &str = "components.json";
pub const PAGES_FILE: &str = "pages.json";
pub const HISTORY_FILE: &str = "history.json";
pub const SERVER_LOG_FILE: &str = "server.log";
pub const AGENT_LOG_FILE: &str = "agent.log";

pub fn instruction_path(working_dir: &Path) -> PathBuf {
    state_dir(working_dir).join(INSTRUCTION_FILE)
}

pub fn todo_path(working_dir: &Path) -> PathBuf {
    state_dir(working_dir).join(TODO_FILE)
}

pub fn components_path(working_dir: &Path) -> PathBuf {
    state_dir(working_dir).join(COMPONENTS_FILE)
}

pub fn pages_path(working_dir: &Path) -> PathBuf {
    state_dir(working_dir).join(PAGES_FILE)
}

pub fn history_path(working_dir: &Path) -> PathBuf {
    state_dir(working_dir).join(HISTORY_FILE)
}

pub fn server_log_path(working_dir: &Path) -> PathBuf {
    state_dir(working_dir).join(SERVER_LOG_FILE)
}

pub fn agent_log_path(working_dir: &Path) -> PathBuf {
    state_dir(working_dir).join(AGENT_LOG_FILE)
}
