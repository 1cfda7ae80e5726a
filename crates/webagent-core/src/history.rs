//! Ordered conversation log for one agent run, with in-place compression.
//!
//! Entries are append-only. Compression is the only mutation: it rewrites the
//! payload of an eligible entry in place and marks it `compressed`, keeping its
//! sequence number, kind and position, so ordering never changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::tools::ToolCallResult;
use crate::utils::{atomic_write, truncate_chars};
use crate::ToolCall;
use webagent_config::HistoryConfig;
use webagent_providers::{Message, MessageRole};

/// Fixed summary text for compressed tool entries.
pub const TOOL_SUMMARY: &str = "Tool execution completed (details hidden)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    SystemPrompt,
    UserInstruction,
    LlmQuery,
    LlmResponse,
    ToolCall,
    ToolCallResult,
    Termination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The model emitted the termination marker.
    Explicit,
    TurnBudgetExhausted,
    /// Too many consecutive backend failures.
    BackendFailure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Text {
        text: String,
    },
    ToolCall {
        call: ToolCall,
    },
    ToolResult {
        result: ToolCallResult,
    },
    /// Replacement payload of a compressed tool entry.
    Summary {
        tool_name: String,
        summary: String,
    },
    Termination {
        reason: TerminationReason,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    seq: u64,
    timestamp: DateTime<Utc>,
    kind: EntryKind,
    payload: Payload,
    #[serde(default)]
    compressed: bool,
}

impl HistoryEntry {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Free text of a text entry.
    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn tool_result(&self) -> Option<&ToolCallResult> {
        match &self.payload {
            Payload::ToolResult { result } => Some(result),
            _ => None,
        }
    }
}

/// Knobs for [`HistoryStore::compress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionPolicy {
    /// Serialized size above which `maybe_compress` runs.
    pub threshold_bytes: usize,
    /// The last `recency_window` entries are never compressed.
    pub recency_window: usize,
    /// Free-text entries longer than this many characters are truncated.
    pub max_text_len: usize,
}

impl Default for CompressionPolicy {
    fn default() -> Self {
        Self::from(&HistoryConfig::default())
    }
}

impl From<&HistoryConfig> for CompressionPolicy {
    fn from(config: &HistoryConfig) -> Self {
        Self {
            threshold_bytes: config.compression_threshold_bytes,
            recency_window: config.recency_window,
            max_text_len: config.max_text_len,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionReport {
    pub entries_compressed: usize,
    pub bytes_before: usize,
    pub bytes_after: usize,
}

impl CompressionReport {
    pub fn bytes_saved(&self) -> usize {
        self.bytes_before.saturating_sub(self.bytes_after)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredHistory")]
pub struct HistoryStore {
    entries: Vec<HistoryEntry>,
    next_seq: u64,
    /// Sum of the serialized sizes of `entries`, kept current by `append`
    /// and `compress`.
    #[serde(skip)]
    entry_bytes: usize,
}

/// On-disk shape of a history; the byte count is rebuilt on load.
#[derive(Deserialize)]
struct StoredHistory {
    entries: Vec<HistoryEntry>,
    next_seq: u64,
}

impl From<StoredHistory> for HistoryStore {
    fn from(stored: StoredHistory) -> Self {
        let entry_bytes = stored.entries.iter().map(entry_len).sum();
        Self {
            entries: stored.entries,
            next_seq: stored.next_seq,
            entry_bytes,
        }
    }
}

fn entry_len(entry: &HistoryEntry) -> usize {
    serde_json::to_vec(entry).map(|v| v.len()).unwrap_or(0)
}

impl HistoryStore {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_seq: 1,
            entry_bytes: 0,
        }
    }

    /// Append an entry and return its sequence number.
    pub fn append(&mut self, kind: EntryKind, payload: Payload) -> u64 {
        // A deserialized store written before any append may carry 0.
        let seq = self.next_seq.max(1);
        self.next_seq = seq + 1;
        let entry = HistoryEntry {
            seq,
            timestamp: Utc::now(),
            kind,
            payload,
            compressed: false,
        };
        self.entry_bytes += entry_len(&entry);
        self.entries.push(entry);
        seq
    }

    pub fn append_text(&mut self, kind: EntryKind, text: impl Into<String>) -> u64 {
        self.append(kind, Payload::Text { text: text.into() })
    }

    pub fn append_tool_call(&mut self, call: ToolCall) -> u64 {
        self.append(EntryKind::ToolCall, Payload::ToolCall { call })
    }

    pub fn append_tool_result(&mut self, result: ToolCallResult) -> u64 {
        self.append(EntryKind::ToolCallResult, Payload::ToolResult { result })
    }

    pub fn append_termination(&mut self, reason: TerminationReason, detail: Option<String>) -> u64 {
        self.append(EntryKind::Termination, Payload::Termination { reason, detail })
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    /// Size of the compact JSON serialization of all entries: the entries,
    /// the separating commas and the enclosing brackets.
    pub fn serialized_len(&self) -> usize {
        self.entry_bytes + self.entries.len().saturating_sub(1) + 2
    }

    /// Compress every eligible entry outside the recency window.
    ///
    /// Never touches the system prompt, the first user instruction, or
    /// termination entries. Already-compressed entries are skipped, so running
    /// this twice is the same as running it once.
    pub fn compress(&mut self, policy: &CompressionPolicy) -> CompressionReport {
        let bytes_before = self.serialized_len();
        let cutoff = self.entries.len().saturating_sub(policy.recency_window);
        let first_instruction = self
            .entries
            .iter()
            .position(|e| e.kind == EntryKind::UserInstruction);

        let mut entries_compressed = 0;
        for (idx, entry) in self.entries.iter_mut().enumerate().take(cutoff) {
            if entry.compressed || Some(idx) == first_instruction {
                continue;
            }
            if let Some(payload) = compressed_payload(entry, policy.max_text_len) {
                let old_len = entry_len(entry);
                entry.payload = payload;
                entry.compressed = true;
                self.entry_bytes = self.entry_bytes - old_len + entry_len(entry);
                entries_compressed += 1;
            }
        }

        let bytes_after = self.serialized_len();

        debug!(
            "Compressed {} history entries ({} -> {} bytes)",
            entries_compressed, bytes_before, bytes_after
        );

        CompressionReport {
            entries_compressed,
            bytes_before,
            bytes_after,
        }
    }

    /// Compress only when the serialized history exceeds the threshold.
    pub fn maybe_compress(&mut self, policy: &CompressionPolicy) -> Option<CompressionReport> {
        if self.serialized_len() <= policy.threshold_bytes {
            return None;
        }
        let report = self.compress(policy);
        if report.entries_compressed == 0 {
            return None;
        }
        info!(
            "History compressed: {} entries, {} bytes saved",
            report.entries_compressed,
            report.bytes_saved()
        );
        Some(report)
    }

    /// The conversation as the model sees it.
    ///
    /// Query log entries, tool call echoes and termination records are
    /// bookkeeping and are left out; tool results become user messages.
    pub fn to_messages(&self) -> Vec<Message> {
        self.entries
            .iter()
            .filter_map(|entry| {
                let role = match entry.kind {
                    EntryKind::SystemPrompt => MessageRole::System,
                    EntryKind::UserInstruction | EntryKind::ToolCallResult => MessageRole::User,
                    EntryKind::LlmResponse => MessageRole::Assistant,
                    EntryKind::LlmQuery | EntryKind::ToolCall | EntryKind::Termination => {
                        return None
                    }
                };
                let content = match &entry.payload {
                    Payload::Text { text } => text.clone(),
                    Payload::ToolResult { result } => {
                        format!("Tool result: {}", result.to_model_json())
                    }
                    Payload::Summary { tool_name, summary } => format!(
                        "Tool result: {}",
                        serde_json::json!({ "tool_name": tool_name, "summary": summary })
                    ),
                    Payload::ToolCall { .. } | Payload::Termination { .. } => return None,
                };
                Some(Message::new(role, content))
            })
            .collect()
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        atomic_write(path, raw.as_bytes())?;
        Ok(())
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

fn compressed_payload(entry: &HistoryEntry, max_text_len: usize) -> Option<Payload> {
    match (entry.kind, &entry.payload) {
        (EntryKind::SystemPrompt | EntryKind::Termination, _) => None,
        (EntryKind::ToolCall, Payload::ToolCall { call }) => Some(Payload::Summary {
            tool_name: call.tool.clone(),
            summary: TOOL_SUMMARY.to_string(),
        }),
        (EntryKind::ToolCallResult, Payload::ToolResult { result }) => Some(Payload::Summary {
            tool_name: result.tool().to_string(),
            summary: TOOL_SUMMARY.to_string(),
        }),
        (
            EntryKind::LlmResponse | EntryKind::LlmQuery | EntryKind::UserInstruction,
            Payload::Text { text },
        ) => {
            let total = text.chars().count();
            if total <= max_text_len {
                return None;
            }
            let kept = truncate_chars(text, max_text_len);
            Some(Payload::Text {
                text: format!("{}\n[... {} characters omitted]", kept, total - max_text_len),
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(n: usize) -> ToolCall {
        ToolCall {
            tool: "fs.write".to_string(),
            args: json!({ "path": format!("page{}.html", n), "content": "x".repeat(200) }),
        }
    }

    #[test]
    fn test_sequence_starts_at_one_and_increments() {
        let mut history = HistoryStore::new();
        assert_eq!(history.append_text(EntryKind::SystemPrompt, "sys"), 1);
        assert_eq!(history.append_text(EntryKind::UserInstruction, "go"), 2);
        assert_eq!(history.append_tool_call(call(0)), 3);
    }

    #[test]
    fn test_short_text_is_never_rewritten() {
        let mut history = HistoryStore::new();
        history.append_text(EntryKind::SystemPrompt, "sys");
        history.append_text(EntryKind::UserInstruction, "go");
        history.append_text(EntryKind::LlmResponse, "short");
        let report = history.compress(&CompressionPolicy {
            threshold_bytes: 0,
            recency_window: 0,
            max_text_len: 100,
        });
        assert_eq!(report.entries_compressed, 0);
        assert_eq!(history.entries()[2].text(), Some("short"));
    }

    #[test]
    fn test_long_response_is_truncated_on_char_boundary() {
        let mut history = HistoryStore::new();
        history.append_text(EntryKind::UserInstruction, "go");
        history.append_text(EntryKind::LlmResponse, "é".repeat(50));
        history.compress(&CompressionPolicy {
            threshold_bytes: 0,
            recency_window: 0,
            max_text_len: 10,
        });
        let text = history.entries()[1].text().unwrap();
        assert!(text.starts_with(&"é".repeat(10)));
        assert!(text.contains("40 characters omitted"));
        assert!(history.entries()[1].is_compressed());
    }

    #[test]
    fn test_recency_window_is_respected() {
        let mut history = HistoryStore::new();
        history.append_text(EntryKind::UserInstruction, "go");
        for n in 0..5 {
            history.append_tool_call(call(n));
        }
        history.compress(&CompressionPolicy {
            threshold_bytes: 0,
            recency_window: 2,
            max_text_len: 100,
        });
        let flags: Vec<bool> = history.entries().iter().map(|e| e.is_compressed()).collect();
        assert_eq!(flags, vec![false, true, true, true, false, false]);
    }

    #[test]
    fn test_maybe_compress_below_threshold_is_noop() {
        let mut history = HistoryStore::new();
        history.append_tool_call(call(0));
        let before = history.clone();
        assert!(history
            .maybe_compress(&CompressionPolicy {
                threshold_bytes: usize::MAX,
                recency_window: 0,
                max_text_len: 10,
            })
            .is_none());
        assert_eq!(history, before);
    }

    #[test]
    fn test_to_messages_skips_bookkeeping_entries() {
        let mut history = HistoryStore::new();
        history.append_text(EntryKind::SystemPrompt, "sys");
        history.append_text(EntryKind::UserInstruction, "go");
        history.append_text(EntryKind::LlmQuery, "turn 1");
        history.append_text(EntryKind::LlmResponse, "<tool_call>...</tool_call>");
        history.append_tool_call(call(0));
        history.append_tool_result(ToolCallResult::success(call(0), json!({"ok": true})));
        history.append_termination(TerminationReason::Explicit, None);

        let messages = history.to_messages();
        let roles: Vec<MessageRole> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::System,
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::User
            ]
        );
        assert!(messages[3].content.starts_with("Tool result: "));
    }

    #[test]
    fn test_save_and_load_roundtrip_preserves_next_seq() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        let mut history = HistoryStore::new();
        history.append_text(EntryKind::UserInstruction, "go");
        history.save(&path).unwrap();

        let mut loaded = HistoryStore::load(&path).unwrap();
        assert_eq!(loaded, history);
        assert_eq!(loaded.append_text(EntryKind::LlmResponse, "next"), 2);
    }
}
