use std::time::Duration;

use crate::history::{EntryKind, HistoryStore};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The model emitted the termination marker.
    Terminated { reason: Option<String> },
    /// The turn budget ran out first.
    Aborted,
}

impl RunOutcome {
    pub fn is_terminated(&self) -> bool {
        matches!(self, RunOutcome::Terminated { .. })
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Terminated { .. } => 0,
            RunOutcome::Aborted => 2,
        }
    }
}

/// Metrics captured for a single turn of interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnMetrics {
    pub turn_number: usize,
    pub tokens_used: u32,
    pub tool_calls: usize,
    pub wall_clock_time: Duration,
}

/// Result of a run: outcome plus everything needed to report on it.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub outcome: RunOutcome,
    pub turns: usize,
    pub history: HistoryStore,
    /// (tool_name, duration, success)
    pub tool_call_metrics: Vec<(String, Duration, bool)>,
    pub turn_metrics: Vec<TurnMetrics>,
    pub elapsed: Duration,
}

impl RunResult {
    /// Text of the last model response.
    pub fn final_response(&self) -> Option<&str> {
        self.history
            .entries()
            .iter()
            .rev()
            .find(|e| e.kind() == EntryKind::LlmResponse)
            .and_then(|e| e.text())
    }

    pub fn tool_calls_succeeded(&self) -> usize {
        self.tool_call_metrics.iter().filter(|(_, _, ok)| *ok).count()
    }

    pub fn tool_calls_failed(&self) -> usize {
        self.tool_call_metrics.len() - self.tool_calls_succeeded()
    }

    pub fn total_tokens(&self) -> u32 {
        self.turn_metrics.iter().map(|t| t.tokens_used).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(outcome: RunOutcome) -> RunResult {
        RunResult {
            outcome,
            turns: 1,
            history: HistoryStore::new(),
            tool_call_metrics: vec![
                ("fs.write".into(), Duration::from_millis(3), true),
                ("fs.read".into(), Duration::from_millis(1), false),
                ("todo.add".into(), Duration::from_millis(2), true),
            ],
            turn_metrics: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunOutcome::Terminated { reason: None }.exit_code(), 0);
        assert_eq!(RunOutcome::Aborted.exit_code(), 2);
    }

    #[test]
    fn test_tool_call_counts() {
        let r = result(RunOutcome::Aborted);
        assert_eq!(r.tool_calls_succeeded(), 2);
        assert_eq!(r.tool_calls_failed(), 1);
    }

    #[test]
    fn test_final_response_picks_last_llm_response() {
        let mut r = result(RunOutcome::Aborted);
        r.history.append_text(EntryKind::LlmResponse, "first");
        r.history.append_text(EntryKind::LlmResponse, "second");
        r.history.append_text(EntryKind::LlmQuery, "turn 3");
        assert_eq!(r.final_response(), Some("second"));
    }
}
