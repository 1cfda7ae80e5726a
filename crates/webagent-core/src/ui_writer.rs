use crate::error::ToolFailure;
use crate::history::CompressionReport;
use crate::tools::ToolCallResult;

/// Where user-facing progress goes. Logging is separate and uses `tracing`.
pub trait UiWriter: Send + Sync {
    fn println(&self, message: &str);

    /// Status line about the run itself (turns, retries, termination).
    fn print_context_status(&self, message: &str);

    fn print_agent_prompt(&self, instruction: &str);

    fn print_agent_response(&self, content: &str);

    fn print_tool_header(&self, tool_name: &str, args: &serde_json::Value);

    fn print_tool_result(&self, result: &ToolCallResult);

    /// A backend failure that was absorbed by the loop.
    fn print_backend_error(&self, failure: &ToolFailure);

    fn print_context_thinning(&self, report: &CompressionReport);

    fn flush(&self) {}
}

/// Discards everything. Used by tests and embedders that only want the result.
pub struct NullUiWriter;

impl UiWriter for NullUiWriter {
    fn println(&self, _message: &str) {}
    fn print_context_status(&self, _message: &str) {}
    fn print_agent_prompt(&self, _instruction: &str) {}
    fn print_agent_response(&self, _content: &str) {}
    fn print_tool_header(&self, _tool_name: &str, _args: &serde_json::Value) {}
    fn print_tool_result(&self, _result: &ToolCallResult) {}
    fn print_backend_error(&self, _failure: &ToolFailure) {}
    fn print_context_thinning(&self, _report: &CompressionReport) {}
}
