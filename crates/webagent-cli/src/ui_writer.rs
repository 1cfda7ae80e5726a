use crossterm::style::Stylize;
use serde_json::Value;
use std::io::Write;

use webagent_core::error::ToolFailure;
use webagent_core::history::CompressionReport;
use webagent_core::ui_writer::UiWriter;
use webagent_core::ToolCallResult;

/// Longest argument value shown in a tool header before it is elided.
const MAX_ARG_DISPLAY: usize = 60;
/// Result lines shown under a tool header.
const MAX_RESULT_LINES: usize = 8;

/// Prints agent progress to stdout with terminal styling.
#[derive(Debug, Default)]
pub struct ConsoleUiWriter;

impl ConsoleUiWriter {
    pub fn new() -> Self {
        Self
    }

    pub fn print_banner(&self, provider: &str, model: &str, tool_count: usize) {
        self.print_context_status(&format!(
            "provider={}, model={}, tools={}",
            provider, model, tool_count
        ));
    }
}

impl UiWriter for ConsoleUiWriter {
    fn println(&self, message: &str) {
        println!("{}", message);
    }

    fn print_context_status(&self, message: &str) {
        println!("{}", message.dark_grey());
    }

    fn print_agent_prompt(&self, instruction: &str) {
        println!("{}", "Instruction".bold().cyan());
        for line in instruction.trim().lines() {
            println!("  {}", line);
        }
        println!();
    }

    fn print_agent_response(&self, content: &str) {
        let text = content.trim();
        if !text.is_empty() {
            println!("{}", text);
        }
    }

    fn print_tool_header(&self, tool_name: &str, args: &Value) {
        let now = chrono::Local::now().format("%H:%M:%S");
        println!(
            "{} {} {}",
            format!("[{}]", now).dark_grey(),
            format!("┌─ {}", tool_name).bold().blue(),
            format_args_summary(args).dark_grey()
        );
    }

    fn print_tool_result(&self, result: &ToolCallResult) {
        if let Some(error) = result.error() {
            println!(
                "{} {}",
                "└─ failed:".red().bold(),
                format!("[{}] {}", error.kind, error.message).red()
            );
            return;
        }

        let rendered = result
            .result()
            .map(summarize_value)
            .unwrap_or_default();
        let lines: Vec<&str> = rendered.lines().collect();
        for line in lines.iter().take(MAX_RESULT_LINES) {
            println!("{} {}", "│".dark_grey(), line);
        }
        if lines.len() > MAX_RESULT_LINES {
            println!(
                "{} {}",
                "│".dark_grey(),
                format!("... {} more lines", lines.len() - MAX_RESULT_LINES).dark_grey()
            );
        }
        println!("{}", "└─ ok".green());
    }

    fn print_backend_error(&self, failure: &ToolFailure) {
        println!(
            "{} {}",
            "Model backend failed:".yellow().bold(),
            failure.message.as_str().yellow()
        );
    }

    fn print_context_thinning(&self, report: &CompressionReport) {
        println!(
            "{}",
            format!(
                "History compressed: {} entries, {} -> {} bytes",
                report.entries_compressed, report.bytes_before, report.bytes_after
            )
            .magenta()
        );
    }

    fn flush(&self) {
        let _ = std::io::stdout().flush();
    }
}

/// `path=index.html, content=<42 chars>`
fn format_args_summary(args: &Value) -> String {
    let Some(map) = args.as_object() else {
        return String::new();
    };
    map.iter()
        .map(|(key, value)| {
            let shown = match value {
                Value::String(s) if s.contains('\n') || s.chars().count() > MAX_ARG_DISPLAY => {
                    format!("<{} chars>", s.chars().count())
                }
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("{}={}", key, shown)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Human-oriented rendering of a tool result.
///
/// Tree output and file contents print as text; everything else as JSON.
fn summarize_value(value: &Value) -> String {
    if let Some(tree) = value.get("tree").and_then(Value::as_array) {
        return tree
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("\n");
    }
    if let Some(content) = value.get("content").and_then(Value::as_str) {
        return content.to_string();
    }
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_args_summary_elides_long_strings() {
        let summary = format_args_summary(&json!({
            "path": "index.html",
            "content": "<html>\n</html>",
        }));
        assert_eq!(summary, "content=<14 chars>, path=index.html");
    }

    #[test]
    fn test_args_summary_non_object() {
        assert_eq!(format_args_summary(&json!(null)), "");
    }

    #[test]
    fn test_summarize_tree_and_content() {
        assert_eq!(
            summarize_value(&json!({"tree": ["./", "└── a.html"]})),
            "./\n└── a.html"
        );
        assert_eq!(summarize_value(&json!({"content": "hi"})), "hi");
        assert!(summarize_value(&json!({"count": 1})).contains("\"count\": 1"));
    }
}
