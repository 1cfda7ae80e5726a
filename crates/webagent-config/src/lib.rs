//! Runtime configuration for webagent.
//!
//! Configuration lives in `<working_dir>/.webagent/config.json`. Every section
//! carries serde defaults, so a partial file (or `{}`) is a valid config.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Name of the per-project state directory.
pub const STATE_DIR_NAME: &str = ".webagent";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const MOCK_RESPONSES_JSON: &str = "mock_responses.json";
pub const MOCK_RESPONSES_TXT: &str = "mock_responses.txt";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    Missing(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub agent: AgentConfig,
    pub history: HistoryConfig,
    pub sandbox: SandboxConfig,
    /// When present and non-empty, only these tools are registered.
    pub allowed_tools: Option<Vec<String>>,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Replays canned responses in a cycle. Used for offline runs and tests.
    Scripted {
        #[serde(default)]
        responses: Vec<String>,
    },
    /// Anthropic Messages API over HTTP.
    Anthropic {
        #[serde(default = "default_anthropic_endpoint")]
        endpoint: String,
        model: String,
        #[serde(default = "default_api_key_env")]
        api_key_env: String,
        #[serde(default)]
        max_tokens: Option<u32>,
        #[serde(default)]
        temperature: Option<f32>,
    },
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::Scripted {
            responses: Vec::new(),
        }
    }
}

fn default_anthropic_endpoint() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub max_turns: usize,
    pub backend_timeout_secs: u64,
    pub max_retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub max_consecutive_backend_failures: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: 50,
            backend_timeout_secs: 120,
            max_retry_attempts: 3,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 10_000,
            max_consecutive_backend_failures: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Serialized history size (bytes) above which compression runs.
    pub compression_threshold_bytes: usize,
    /// Number of most recent entries that are never compressed.
    pub recency_window: usize,
    /// Free-text entries longer than this are truncated when compressed.
    pub max_text_len: usize,
    /// Write `.webagent/history.json` when a run ends.
    pub save_transcript: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            compression_threshold_bytes: 64_000,
            recency_window: 10,
            max_text_len: 2_000,
            save_transcript: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Relative paths (exact or descendant match) or glob patterns.
    pub protected_paths: Vec<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            protected_paths: vec![STATE_DIR_NAME.to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// argv of the project server; empty means no server is configured.
    pub command: Vec<String>,
    pub startup_wait_ms: u64,
    pub log_tail_lines: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            startup_wait_ms: 500,
            log_tail_lines: 50,
        }
    }
}

impl Config {
    /// Load `.webagent/config.json` from the given working directory.
    pub fn load(working_dir: &Path) -> Result<Self, ConfigError> {
        let path = state_dir(working_dir).join(CONFIG_FILE_NAME);
        if !path.is_file() {
            return Err(ConfigError::Missing(path));
        }
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_json(&raw).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.clone(),
                source,
            },
            other => other,
        })?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::from(CONFIG_FILE_NAME),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_turns == 0 {
            return Err(ConfigError::Invalid("agent.max_turns must be at least 1".into()));
        }
        if self.agent.backend_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "agent.backend_timeout_secs must be at least 1".into(),
            ));
        }
        if self.agent.max_consecutive_backend_failures == 0 {
            return Err(ConfigError::Invalid(
                "agent.max_consecutive_backend_failures must be at least 1".into(),
            ));
        }
        if let ProviderConfig::Anthropic { model, .. } = &self.provider {
            if model.trim().is_empty() {
                return Err(ConfigError::Invalid("provider.model must not be empty".into()));
            }
        }
        Ok(())
    }

    /// Whether a tool should be registered under the `allowed_tools` filter.
    pub fn is_tool_allowed(&self, name: &str) -> bool {
        match &self.allowed_tools {
            Some(list) if !list.is_empty() => list.iter().any(|t| t == name),
            _ => true,
        }
    }

    /// Responses for the scripted provider.
    ///
    /// Falls back to `.webagent/mock_responses.json`, then
    /// `.webagent/mock_responses.txt` (one response per non-empty line), then
    /// a lone termination marker.
    pub fn scripted_responses(&self, working_dir: &Path) -> Result<Vec<String>, ConfigError> {
        if let ProviderConfig::Scripted { responses } = &self.provider {
            if !responses.is_empty() {
                return Ok(responses.clone());
            }
        }

        let dir = state_dir(working_dir);
        let json_path = dir.join(MOCK_RESPONSES_JSON);
        if json_path.is_file() {
            let raw = read(&json_path)?;
            let responses: Vec<String> =
                serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                    path: json_path.clone(),
                    source,
                })?;
            if !responses.is_empty() {
                return Ok(responses);
            }
        }

        let txt_path = dir.join(MOCK_RESPONSES_TXT);
        if txt_path.is_file() {
            let raw = read(&txt_path)?;
            let responses: Vec<String> = raw
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect();
            if !responses.is_empty() {
                return Ok(responses);
            }
        }

        Ok(vec!["<terminate>".to_string()])
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// `<working_dir>/.webagent`
pub fn state_dir(working_dir: &Path) -> PathBuf {
    working_dir.join(STATE_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config.agent.max_turns, 50);
        assert_eq!(config.sandbox.protected_paths, vec![".webagent".to_string()]);
        assert!(matches!(config.provider, ProviderConfig::Scripted { .. }));
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = Config::from_json(r#"{"agent": {"max_turns": 7}}"#).unwrap();
        assert_eq!(config.agent.max_turns, 7);
        assert_eq!(config.agent.max_retry_attempts, 3);
        assert_eq!(config.history.recency_window, 10);
    }

    #[test]
    fn test_anthropic_provider_section() {
        let config = Config::from_json(
            r#"{"provider": {"type": "anthropic", "model": "claude-test", "max_tokens": 1024}}"#,
        )
        .unwrap();
        match config.provider {
            ProviderConfig::Anthropic {
                endpoint,
                model,
                api_key_env,
                max_tokens,
                ..
            } => {
                assert_eq!(endpoint, "https://api.anthropic.com/v1/messages");
                assert_eq!(model, "claude-test");
                assert_eq!(api_key_env, "ANTHROPIC_API_KEY");
                assert_eq!(max_tokens, Some(1024));
            }
            other => panic!("unexpected provider: {:?}", other),
        }
    }

    #[test]
    fn test_zero_max_turns_rejected() {
        let err = Config::from_json(r#"{"agent": {"max_turns": 0}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn test_load_reports_parse_path() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(state_dir(dir.path())).unwrap();
        std::fs::write(state_dir(dir.path()).join(CONFIG_FILE_NAME), "{not json").unwrap();
        let err = Config::load(dir.path()).unwrap_err();
        match err {
            ConfigError::Parse { path, .. } => assert!(path.ends_with("config.json")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_allowed_tools_filter() {
        let mut config = Config::default();
        assert!(config.is_tool_allowed("fs.write"));
        config.allowed_tools = Some(vec!["fs.read".into()]);
        assert!(config.is_tool_allowed("fs.read"));
        assert!(!config.is_tool_allowed("fs.write"));
        config.allowed_tools = Some(Vec::new());
        assert!(config.is_tool_allowed("fs.write"));
    }

    #[test]
    fn test_scripted_responses_fallback_order() {
        let dir = TempDir::new().unwrap();
        let config = Config::default();
        assert_eq!(
            config.scripted_responses(dir.path()).unwrap(),
            vec!["<terminate>".to_string()]
        );

        std::fs::create_dir_all(state_dir(dir.path())).unwrap();
        std::fs::write(
            state_dir(dir.path()).join(MOCK_RESPONSES_TXT),
            "first\n\n  second  \n",
        )
        .unwrap();
        assert_eq!(
            config.scripted_responses(dir.path()).unwrap(),
            vec!["first".to_string(), "second".to_string()]
        );

        std::fs::write(
            state_dir(dir.path()).join(MOCK_RESPONSES_JSON),
            r#"["from json"]"#,
        )
        .unwrap();
        assert_eq!(
            config.scripted_responses(dir.path()).unwrap(),
            vec!["from json".to_string()]
        );

        let inline = Config {
            provider: ProviderConfig::Scripted {
                responses: vec!["inline".into()],
            },
            ..Config::default()
        };
        assert_eq!(
            inline.scripted_responses(dir.path()).unwrap(),
            vec!["inline".to_string()]
        );
    }
}
