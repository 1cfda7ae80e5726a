//! Tool Call Parser Integration Tests
//!
//! CHARACTERIZATION: These tests verify how model responses are split into
//! tool calls, a termination marker and leftover text.
//!
//! What these tests protect:
//! - Multiple tool calls come out in textual order
//! - Unparseable blocks are reported as malformed without losing valid ones
//! - Termination markers are recognized in all accepted forms
//!
//! What these tests intentionally do NOT assert:
//! - The wording of malformed-call reasons
//! - Whitespace inside the leftover text

use serde_json::json;
use webagent_core::protocol::{parse_response, ParsedToolCall, TerminationMarker};
use webagent_core::ToolCall;

// =============================================================================
// Test Helpers
// =============================================================================

fn valid(tool: &str, args: serde_json::Value) -> ParsedToolCall {
    ParsedToolCall::Valid(ToolCall {
        tool: tool.to_string(),
        args,
    })
}

// =============================================================================
// Test: Tool call extraction
// =============================================================================

mod tool_calls {
    use super::*;

    /// Calls are returned in the order they appear
    #[test]
    fn test_multiple_calls_in_order() {
        let response = r#"First the page.
<tool_call>{"tool": "fs.write", "args": {"path": "index.html", "content": "<h1>Hi</h1>"}}</tool_call>
Then the todo.
<tool_call>{"tool": "todo.complete", "args": {"id": 1}}</tool_call>"#;

        let parsed = parse_response(response);
        assert_eq!(
            parsed.tool_calls,
            vec![
                valid("fs.write", json!({"path": "index.html", "content": "<h1>Hi</h1>"})),
                valid("todo.complete", json!({"id": 1})),
            ]
        );
        assert!(parsed.termination.is_none());
        assert!(parsed.text.contains("First the page."));
        assert!(parsed.text.contains("Then the todo."));
        assert!(!parsed.text.contains("tool_call"));
    }

    /// Missing args and the `arguments` alias both work
    #[test]
    fn test_args_forms() {
        let parsed = parse_response(
            r#"<tool_call>{"tool": "page.list"}</tool_call><tool_call>{"tool": "fs.read", "arguments": {"path": "a"}}</tool_call>"#,
        );
        assert_eq!(
            parsed.tool_calls,
            vec![
                valid("page.list", json!({})),
                valid("fs.read", json!({"path": "a"})),
            ]
        );
    }

    /// A broken block sits between valid ones and does not disturb them
    #[test]
    fn test_malformed_between_valid() {
        let parsed = parse_response(
            r#"<tool_call>{"tool": "todo.list"}</tool_call>
<tool_call>{"tool": "fs.write", "args": {"path": </tool_call>
<tool_call>{"tool": "page.list"}</tool_call>"#,
        );
        assert_eq!(parsed.tool_calls.len(), 3);
        assert_eq!(parsed.tool_calls[0], valid("todo.list", json!({})));
        assert!(matches!(parsed.tool_calls[1], ParsedToolCall::Malformed { .. }));
        assert_eq!(parsed.tool_calls[2], valid("page.list", json!({})));
    }

    /// Each structural problem is reported as malformed
    #[test]
    fn test_malformed_shapes() {
        for body in [
            "not json",
            "[1, 2]",
            r#"{"args": {}}"#,
            r#"{"tool": ""}"#,
            r#"{"tool": 5}"#,
            r#"{"tool": "fs.read", "args": "path=a"}"#,
        ] {
            let parsed = parse_response(&format!("<tool_call>{}</tool_call>", body));
            match &parsed.tool_calls[..] {
                [ParsedToolCall::Malformed { raw, .. }] => assert_eq!(raw, body),
                other => panic!("{} should be malformed, got {:?}", body, other),
            }
        }
    }

    /// An unclosed block is malformed and ends parsing
    #[test]
    fn test_unterminated_block() {
        let parsed = parse_response(
            r#"<tool_call>{"tool": "todo.list"}</tool_call><tool_call>{"tool": "fs.read""#,
        );
        assert_eq!(parsed.tool_calls.len(), 2);
        assert!(matches!(parsed.tool_calls[1], ParsedToolCall::Malformed { .. }));
    }

    /// Code fences are unwrapped whatever their info string
    #[test]
    fn test_code_fence_info_strings() {
        for fence in ["```JSON\n", "```jsonc\n", "```\n", "```json ", "```"] {
            let response = format!(
                "<tool_call>{}{{\"tool\": \"page.list\"}}\n```</tool_call>",
                fence
            );
            let parsed = parse_response(&response);
            assert_eq!(
                parsed.tool_calls,
                vec![valid("page.list", json!({}))],
                "fence {:?}",
                fence
            );
        }
    }
}

// =============================================================================
// Test: Termination
// =============================================================================

mod termination {
    use super::*;

    /// All marker forms are recognized
    #[test]
    fn test_marker_forms() {
        for response in ["<terminate>", "Done <terminate/>", "Done <terminate />"] {
            let parsed = parse_response(response);
            assert_eq!(
                parsed.termination,
                Some(TerminationMarker { reason: None }),
                "{}",
                response
            );
        }
    }

    /// A closed terminate block carries its reason
    #[test]
    fn test_reason() {
        let parsed = parse_response("<terminate>Site is complete</terminate>");
        assert_eq!(
            parsed.termination,
            Some(TerminationMarker {
                reason: Some("Site is complete".to_string())
            })
        );
        assert!(parsed.text.is_empty());
    }

    /// Tool calls before a termination marker are still returned
    #[test]
    fn test_calls_and_termination_together() {
        let parsed = parse_response(
            r#"<tool_call>{"tool": "todo.complete", "args": {"id": 3}}</tool_call>
<terminate>"#,
        );
        assert_eq!(parsed.tool_calls, vec![valid("todo.complete", json!({"id": 3}))]);
        assert!(parsed.termination.is_some());
    }

    /// Text that merely mentions terminating is not a marker
    #[test]
    fn test_lookalikes_are_text() {
        let parsed = parse_response("I will terminate soon. <terminated> <tool_calls>");
        assert!(parsed.is_empty());
    }
}
