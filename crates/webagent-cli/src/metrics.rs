//! Run summary printed when the CLI exits: outcome, per-tool tallies and a
//! per-turn bar chart.

use std::collections::BTreeMap;
use std::time::Duration;

use webagent_core::{RunOutcome, RunResult, TurnMetrics};

const BAR_WIDTH: usize = 32;
const BAR_FULL: char = '█';
const BAR_EMPTY: char = '·';

/// Human-readable elapsed time: "850ms", "12.4s", "3m 07s", "1h 02m".
pub fn format_elapsed_time(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else if duration.as_millis() >= 1000 {
        format!("{:.1}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

fn outcome_line(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Terminated { reason: Some(reason) } => format!("terminated ({})", reason),
        RunOutcome::Terminated { reason: None } => "terminated".to_string(),
        RunOutcome::Aborted => "aborted: turn budget exhausted".to_string(),
    }
}

pub fn format_run_summary(result: &RunResult) -> String {
    let mut out = String::from("\nRun Summary\n");
    out.push_str(&format!("  outcome     {}\n", outcome_line(&result.outcome)));
    out.push_str(&format!("  turns       {}\n", result.turns));
    out.push_str(&format!("  elapsed     {}\n", format_elapsed_time(result.elapsed)));
    out.push_str(&format!("  tokens      {}\n", result.total_tokens()));
    out.push_str(&format!(
        "  tool calls  {} ok / {} failed\n",
        result.tool_calls_succeeded(),
        result.tool_calls_failed()
    ));

    let tools = tool_breakdown(&result.tool_call_metrics);
    if !tools.is_empty() {
        out.push('\n');
        out.push_str(&tools);
    }
    out.push('\n');
    out.push_str(&turn_chart(&result.turn_metrics));
    out
}

#[derive(Default)]
struct ToolTally {
    calls: usize,
    failed: usize,
    time: Duration,
}

/// One line per tool name, sorted by name.
pub fn tool_breakdown(tool_call_metrics: &[(String, Duration, bool)]) -> String {
    let mut tallies: BTreeMap<&str, ToolTally> = BTreeMap::new();
    for (name, duration, ok) in tool_call_metrics {
        let tally = tallies.entry(name.as_str()).or_default();
        tally.calls += 1;
        tally.time += *duration;
        if !ok {
            tally.failed += 1;
        }
    }

    let width = tallies.keys().map(|n| n.len()).max().unwrap_or(0);
    let mut out = String::new();
    for (name, tally) in tallies {
        out.push_str(&format!(
            "  {:<width$}  {:>3} calls",
            name,
            tally.calls,
            width = width
        ));
        if tally.failed > 0 {
            out.push_str(&format!(", {} failed", tally.failed));
        }
        out.push_str(&format!("  ({})\n", format_elapsed_time(tally.time)));
    }
    out
}

/// Bar chart of tokens per turn, annotated with tool calls and turn time.
pub fn turn_chart(turn_metrics: &[TurnMetrics]) -> String {
    if turn_metrics.is_empty() {
        return "  no turns recorded\n".to_string();
    }

    let peak = turn_metrics.iter().map(|t| t.tokens_used).max().unwrap_or(0);
    let mut out = format!("  tokens per turn (peak {})\n", peak);
    for turn in turn_metrics {
        out.push_str(&format!(
            "  {:>4} │{}│ {:>6} tok {:>3} calls {:>8}\n",
            turn.turn_number,
            bar(turn.tokens_used, peak),
            turn.tokens_used,
            turn.tool_calls,
            format_elapsed_time(turn.wall_clock_time)
        ));
    }
    out
}

fn bar(value: u32, peak: u32) -> String {
    let filled = if peak == 0 {
        0
    } else {
        (value as u64 * BAR_WIDTH as u64 / peak as u64) as usize
    };
    let mut s = BAR_FULL.to_string().repeat(filled);
    s.push_str(&BAR_EMPTY.to_string().repeat(BAR_WIDTH - filled));
    s
}
