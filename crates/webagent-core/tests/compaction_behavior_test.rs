//! History Compaction Integration Tests
//!
//! CHARACTERIZATION: These tests verify how HistoryStore shrinks a long
//! conversation while keeping its shape.
//!
//! What these tests protect:
//! - Old tool entries become fixed summaries that keep the tool name
//! - The system prompt, first instruction and recent entries stay verbatim
//! - Sequence numbers and entry order survive compression
//! - Compressing twice changes nothing the second time
//! - The threshold gates automatic compression
//! - The tracked history size stays equal to a full serialization
//!
//! What these tests intentionally do NOT assert:
//! - Exact byte counts in the compression report
//! - Timestamps

use serde_json::json;
use tempfile::TempDir;
use webagent_core::error::{ErrorKind, ToolFailure};
use webagent_core::history::{Payload, TOOL_SUMMARY};
use webagent_core::{
    CompressionPolicy, EntryKind, HistoryStore, TerminationReason, ToolCall, ToolCallResult,
};

// =============================================================================
// Test Helpers
// =============================================================================

fn write_call(i: usize) -> ToolCall {
    ToolCall {
        tool: "fs.write".to_string(),
        args: json!({"path": format!("page{}.html", i), "content": "x".repeat(200)}),
    }
}

/// System prompt, instruction, then `pairs` tool call / result pairs.
fn long_history(pairs: usize) -> HistoryStore {
    let mut history = HistoryStore::new();
    history.append_text(EntryKind::SystemPrompt, "You build websites.");
    history.append_text(EntryKind::UserInstruction, "Build a landing page.");
    for i in 0..pairs {
        let call = write_call(i);
        history.append_tool_call(call.clone());
        let result = if i % 7 == 0 {
            ToolCallResult::failure(call, ToolFailure::new(ErrorKind::ProtectedPath, "nope"))
        } else {
            ToolCallResult::success(call, json!({"bytes_written": 200}))
        };
        history.append_tool_result(result);
    }
    history
}

fn policy(recency_window: usize) -> CompressionPolicy {
    CompressionPolicy {
        threshold_bytes: 1_000,
        recency_window,
        max_text_len: 100,
    }
}

// =============================================================================
// Test: Compression shape
// =============================================================================

mod compression_shape {
    use super::*;

    /// Fifty pairs compress down to summaries outside the recency window
    #[test]
    fn test_old_tool_entries_become_summaries() {
        let mut history = long_history(50);
        let before = history.serialized_len();

        let report = history.compress(&policy(10));

        assert!(report.entries_compressed > 0);
        assert!(history.serialized_len() < before);
        assert_eq!(history.len(), 102);

        let entries = history.entries();
        let cutoff = entries.len() - 10;
        for entry in &entries[2..cutoff] {
            assert!(entry.is_compressed(), "seq {} should be compressed", entry.seq());
            match entry.payload() {
                Payload::Summary { tool_name, summary } => {
                    assert_eq!(tool_name, "fs.write");
                    assert_eq!(summary, TOOL_SUMMARY);
                }
                other => panic!("expected a summary, got {:?}", other),
            }
        }
        for entry in &entries[cutoff..] {
            assert!(!entry.is_compressed());
        }
        assert!(entries[cutoff..]
            .iter()
            .filter(|e| e.kind() == EntryKind::ToolCallResult)
            .all(|e| e.tool_result().is_some()));
    }

    /// The system prompt and the instruction are never compressed
    #[test]
    fn test_prompt_and_instruction_survive() {
        let mut history = long_history(50);
        history.compress(&policy(0));

        let entries = history.entries();
        assert_eq!(entries[0].kind(), EntryKind::SystemPrompt);
        assert_eq!(entries[0].text(), Some("You build websites."));
        assert!(!entries[0].is_compressed());
        assert_eq!(entries[1].kind(), EntryKind::UserInstruction);
        assert_eq!(entries[1].text(), Some("Build a landing page."));
        assert!(!entries[1].is_compressed());
    }

    /// Sequence numbers keep increasing and kinds keep their positions
    #[test]
    fn test_order_is_preserved() {
        let mut history = long_history(50);
        let kinds_before: Vec<EntryKind> = history.entries().iter().map(|e| e.kind()).collect();
        let seqs_before: Vec<u64> = history.entries().iter().map(|e| e.seq()).collect();

        history.compress(&policy(10));

        let kinds_after: Vec<EntryKind> = history.entries().iter().map(|e| e.kind()).collect();
        let seqs_after: Vec<u64> = history.entries().iter().map(|e| e.seq()).collect();
        assert_eq!(kinds_before, kinds_after);
        assert_eq!(seqs_before, seqs_after);
        assert!(seqs_after.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seqs_after[0], 1);
    }

    /// A second pass compresses nothing and changes nothing
    #[test]
    fn test_compression_is_idempotent() {
        let mut history = long_history(50);
        history.compress(&policy(10));
        let snapshot = history.clone();

        let report = history.compress(&policy(10));

        assert_eq!(report.entries_compressed, 0);
        assert_eq!(report.bytes_before, report.bytes_after);
        assert_eq!(history, snapshot);
    }

    /// Long model text is truncated with a marker; termination records are kept
    #[test]
    fn test_long_text_truncated_and_termination_kept() {
        let mut history = HistoryStore::new();
        history.append_text(EntryKind::UserInstruction, "go");
        history.append_text(EntryKind::LlmResponse, "y".repeat(500));
        history.append_termination(TerminationReason::Explicit, Some("done".into()));
        history.append_text(EntryKind::LlmResponse, "recent");

        history.compress(&policy(1));

        let entries = history.entries();
        let truncated = entries[1].text().unwrap();
        assert!(truncated.starts_with(&"y".repeat(100)));
        assert!(truncated.contains("400 characters omitted"), "{}", truncated);
        assert!(!entries[2].is_compressed());
        assert_eq!(entries[3].text(), Some("recent"));
    }
}

// =============================================================================
// Test: Threshold and model view
// =============================================================================

mod threshold_and_messages {
    use super::*;

    /// Small histories are left alone
    #[test]
    fn test_below_threshold_is_noop() {
        let mut history = long_history(1);
        let relaxed = CompressionPolicy {
            threshold_bytes: 1_000_000,
            ..policy(0)
        };
        assert!(history.maybe_compress(&relaxed).is_none());
        assert!(history.entries().iter().all(|e| !e.is_compressed()));
    }

    /// Large histories compress once they cross the threshold
    #[test]
    fn test_above_threshold_compresses() {
        let mut history = long_history(50);
        let report = history.maybe_compress(&policy(10)).unwrap();
        assert!(report.bytes_saved() > 0);
        assert!(history.entries()[2].is_compressed());
    }

    /// The model sees summaries as tool results and never sees bookkeeping entries
    #[test]
    fn test_messages_after_compression() {
        let mut history = long_history(3);
        history.append_text(EntryKind::LlmQuery, "turn 1");
        history.compress(&policy(2));

        let messages = history.to_messages();
        assert_eq!(messages[0].content, "You build websites.");
        assert_eq!(messages[1].content, "Build a landing page.");
        assert!(messages
            .iter()
            .all(|m| !m.content.contains("turn 1")));
        assert!(messages[2].content.starts_with("Tool result: "));
        assert!(messages[2].content.contains(TOOL_SUMMARY));
    }

    /// A saved history loads back identically
    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".webagent/history.json");
        let mut history = long_history(5);
        history.compress(&policy(4));

        history.save(&path).unwrap();
        let loaded = HistoryStore::load(&path).unwrap();
        assert_eq!(loaded, history);
    }

    /// The tracked size matches a full serialization through appends,
    /// compression and a save/load cycle
    #[test]
    fn test_serialized_len_tracks_entries() {
        let full_len = |h: &HistoryStore| serde_json::to_vec(h.entries()).unwrap().len();

        let empty = HistoryStore::new();
        assert_eq!(empty.serialized_len(), full_len(&empty));

        let mut history = long_history(20);
        assert_eq!(history.serialized_len(), full_len(&history));

        history.compress(&policy(6));
        assert_eq!(history.serialized_len(), full_len(&history));

        history.append_text(EntryKind::LlmResponse, "é".repeat(300));
        assert_eq!(history.serialized_len(), full_len(&history));

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        history.save(&path).unwrap();
        let loaded = HistoryStore::load(&path).unwrap();
        assert_eq!(loaded.serialized_len(), full_len(&history));
    }
}
