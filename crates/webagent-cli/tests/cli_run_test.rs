//! CLI Run Integration Tests
//!
//! CHARACTERIZATION: These tests call the CLI entry point against temporary
//! project directories configured with the scripted provider.
//!
//! What these tests protect:
//! - Argument parsing for the working directory, debug and turn budget flags
//! - Exit code 0 on termination and 2 when the turn budget runs out
//! - Startup failures (missing config or instruction) surface as errors
//! - The agent log is written into the state directory
//!
//! What these tests intentionally do NOT assert:
//! - Console output formatting
//! - Log line contents

use clap::Parser;
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use webagent_cli::{run, Cli};

// =============================================================================
// Test Helpers
// =============================================================================

fn project(responses: &[&str], instruction: Option<&str>) -> TempDir {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join(".webagent");
    fs::create_dir_all(&state).unwrap();
    let config = json!({
        "provider": {"type": "scripted", "responses": responses},
        "agent": {"retry_base_delay_ms": 1, "retry_max_delay_ms": 1},
    });
    fs::write(state.join("config.json"), config.to_string()).unwrap();
    if let Some(instruction) = instruction {
        fs::write(state.join("instruction.md"), instruction).unwrap();
    }
    dir
}

fn cli_for(dir: &Path, max_turns: Option<u32>) -> Cli {
    Cli {
        working_dir: Some(dir.to_path_buf()),
        debug: false,
        max_turns,
    }
}

// =============================================================================
// Test: Argument parsing
// =============================================================================

mod argument_parsing {
    use super::*;

    /// All flags parse into the expected fields
    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "webagent",
            "--working-dir",
            "/tmp/site",
            "--debug",
            "--max-turns",
            "7",
        ])
        .unwrap();
        assert_eq!(cli.working_dir.as_deref(), Some(Path::new("/tmp/site")));
        assert!(cli.debug);
        assert_eq!(cli.max_turns, Some(7));
    }

    /// No flags means current directory, quiet logging and the config's budget
    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["webagent"]).unwrap();
        assert_eq!(cli.working_dir, None);
        assert!(!cli.debug);
        assert_eq!(cli.max_turns, None);
    }

    /// A zero or non-numeric turn budget is rejected
    #[test]
    fn test_invalid_max_turns() {
        assert!(Cli::try_parse_from(["webagent", "--max-turns", "0"]).is_err());
        assert!(Cli::try_parse_from(["webagent", "--max-turns", "many"]).is_err());
    }
}

// =============================================================================
// Test: Runs
// =============================================================================

mod runs {
    use super::*;

    /// A scripted write followed by termination exits 0
    #[tokio::test]
    async fn test_terminated_run_exits_zero() {
        let dir = project(
            &[
                r#"<tool_call>{"tool": "fs.write", "args": {"path": "index.html", "content": "<h1>Hello</h1>"}}</tool_call>"#,
                "<terminate>",
            ],
            Some("Create index.html saying Hello"),
        );

        let code = run(cli_for(dir.path(), None)).await.unwrap();

        assert_eq!(code, 0);
        assert_eq!(
            fs::read_to_string(dir.path().join("index.html")).unwrap(),
            "<h1>Hello</h1>"
        );
        assert!(dir.path().join(".webagent/history.json").exists());
        assert!(dir.path().join(".webagent/agent.log").exists());
    }

    /// The --max-turns override aborts the run with exit code 2
    #[tokio::test]
    async fn test_turn_budget_exits_two() {
        let dir = project(&["Let me think."], Some("Think"));

        let code = run(cli_for(dir.path(), Some(2))).await.unwrap();

        assert_eq!(code, 2);
    }

    /// A missing instruction file is a startup failure
    #[tokio::test]
    async fn test_missing_instruction_is_error() {
        let dir = project(&["<terminate>"], None);

        let err = run(cli_for(dir.path(), None)).await.unwrap_err();
        assert!(format!("{:#}", err).contains("instruction.md"), "{:#}", err);
    }

    /// A missing config file is a startup failure
    #[tokio::test]
    async fn test_missing_config_is_error() {
        let dir = TempDir::new().unwrap();

        let err = run(cli_for(dir.path(), None)).await.unwrap_err();
        assert!(format!("{:#}", err).contains("config.json"), "{:#}", err);
    }

    /// A working directory that does not exist is a startup failure
    #[tokio::test]
    async fn test_missing_working_dir_is_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");

        assert!(run(cli_for(&missing, None)).await.is_err());
    }
}
