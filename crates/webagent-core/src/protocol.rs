//! Parser for the tool-call embedding protocol in model responses.
//!
//! Two delimiter forms are recognized:
//!
//! ```text
//! <tool_call>{"tool": "fs.write", "args": {"path": "index.html", "content": "..."}}</tool_call>
//! <terminate>   <terminate/>   <terminate>optional reason</terminate>
//! ```
//!
//! Anything else, including unknown tags, is plain text. The parser never
//! fails: a block it cannot read becomes a [`ParsedToolCall::Malformed`].

use serde_json::Value;

use crate::ToolCall;

pub const TOOL_CALL_OPEN: &str = "<tool_call>";
pub const TOOL_CALL_CLOSE: &str = "</tool_call>";
pub const TERMINATE_OPEN: &str = "<terminate>";
pub const TERMINATE_CLOSE: &str = "</terminate>";
const TERMINATE_SELF_CLOSING: [&str; 2] = ["<terminate/>", "<terminate />"];

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedToolCall {
    Valid(ToolCall),
    Malformed { raw: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminationMarker {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResponse {
    /// In textual order.
    pub tool_calls: Vec<ParsedToolCall>,
    /// First termination marker, if any.
    pub termination: Option<TerminationMarker>,
    /// Response text with all recognized blocks removed.
    pub text: String,
}

impl ParsedResponse {
    pub fn is_empty(&self) -> bool {
        self.tool_calls.is_empty() && self.termination.is_none()
    }
}

pub fn parse_response(input: &str) -> ParsedResponse {
    let mut parsed = ParsedResponse::default();
    let mut rest = input;

    loop {
        let next_call = rest.find(TOOL_CALL_OPEN);
        let next_term = find_terminate(rest);

        let take_call = match (next_call, next_term) {
            (None, None) => {
                parsed.text.push_str(rest);
                break;
            }
            (Some(c), Some((t, _))) => c < t,
            (Some(_), None) => true,
            (None, Some(_)) => false,
        };

        if take_call {
            let start = next_call.unwrap_or_default();
            parsed.text.push_str(&rest[..start]);
            let after_open = &rest[start + TOOL_CALL_OPEN.len()..];
            match after_open.find(TOOL_CALL_CLOSE) {
                Some(end) => {
                    parsed.tool_calls.push(parse_tool_call(&after_open[..end]));
                    rest = &after_open[end + TOOL_CALL_CLOSE.len()..];
                }
                None => {
                    parsed.tool_calls.push(ParsedToolCall::Malformed {
                        raw: after_open.trim().to_string(),
                        reason: format!("unterminated {} block", TOOL_CALL_OPEN),
                    });
                    break;
                }
            }
        } else if let Some((start, len)) = next_term {
            parsed.text.push_str(&rest[..start]);
            let marker_text = &rest[start..start + len];
            let mut after = &rest[start + len..];
            let mut reason = None;

            if marker_text == TERMINATE_OPEN {
                if let Some(end) = after.find(TERMINATE_CLOSE) {
                    let body = after[..end].trim();
                    if !body.is_empty() && !body.contains(TOOL_CALL_OPEN) {
                        reason = Some(body.to_string());
                        after = &after[end + TERMINATE_CLOSE.len()..];
                    }
                }
            }

            if parsed.termination.is_none() {
                parsed.termination = Some(TerminationMarker { reason });
            }
            rest = after;
        }
    }

    parsed.text = parsed.text.trim().to_string();
    parsed
}

/// Position and length of the earliest termination marker.
fn find_terminate(s: &str) -> Option<(usize, usize)> {
    std::iter::once(TERMINATE_OPEN)
        .chain(TERMINATE_SELF_CLOSING)
        .filter_map(|marker| s.find(marker).map(|pos| (pos, marker.len())))
        .min_by_key(|(pos, _)| *pos)
}

fn parse_tool_call(body: &str) -> ParsedToolCall {
    let raw = body.trim();
    let malformed = |reason: String| ParsedToolCall::Malformed {
        raw: raw.to_string(),
        reason,
    };

    let json_text = strip_code_fence(raw);
    let value: Value = match serde_json::from_str(json_text) {
        Ok(v) => v,
        Err(e) => return malformed(format!("invalid JSON: {}", e)),
    };
    let Value::Object(mut object) = value else {
        return malformed("tool call must be a JSON object".to_string());
    };

    let tool = match object.remove("tool") {
        Some(Value::String(name)) if !name.trim().is_empty() => name.trim().to_string(),
        Some(_) => return malformed("\"tool\" must be a non-empty string".to_string()),
        None => return malformed("missing \"tool\" field".to_string()),
    };

    let args = match object.remove("args").or_else(|| object.remove("arguments")) {
        None | Some(Value::Null) => Value::Object(Default::default()),
        Some(args @ Value::Object(_)) => args,
        Some(_) => return malformed("\"args\" must be a JSON object".to_string()),
    };

    ParsedToolCall::Valid(ToolCall { tool, args })
}

/// Accept a payload wrapped in a Markdown code fence with any info string
/// (`json`, `JSON`, `jsonc`, ...).
fn strip_code_fence(s: &str) -> &str {
    let Some(inner) = s.strip_prefix("```") else {
        return s;
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    let body = match inner.find(|c| c == '\n' || c == '{') {
        Some(idx) if inner[idx..].starts_with('\n') => &inner[idx + 1..],
        Some(idx) => &inner[idx..],
        None => inner,
    };
    body.trim()
}
