//! The turn loop: query the model, parse its response, dispatch tool calls,
//! compress history, repeat until termination or the turn budget runs out.

use anyhow::Result;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use webagent_providers::{CompletionRequest, CompletionResponse};

use crate::error::LoopError;
use crate::error_handling::{calculate_retry_delay, classify_message};
use crate::history::{EntryKind, TerminationReason};
use crate::protocol::{parse_response, ParsedToolCall};
use crate::run_result::{RunOutcome, RunResult, TurnMetrics};
use crate::tools::ToolCallResult;
use crate::ui_writer::UiWriter;
use crate::{paths, prompts, Agent, AgentState, ToolCall};

/// Pseudo-tool names used when a failure did not come from a real tool.
const MODEL_QUERY_TOOL: &str = "model.query";
const INVALID_TOOL: &str = "invalid";

impl<W: UiWriter> Agent<W> {
    /// Run the agent on `instruction` until it terminates or the turn budget
    /// is exhausted.
    ///
    /// Tool failures and isolated backend failures are fed back into history.
    /// Only repeated backend failure ends the run with an error.
    pub async fn run(&mut self, instruction: &str) -> Result<RunResult> {
        if self.state != AgentState::Init {
            anyhow::bail!("agent has already run (state {:?})", self.state);
        }
        let run_start = Instant::now();

        let system_prompt = prompts::get_system_prompt(&self.registry, &self.sandbox);
        self.history
            .append_text(EntryKind::SystemPrompt, system_prompt);
        self.history
            .append_text(EntryKind::UserInstruction, instruction);
        self.ui_writer.print_agent_prompt(instruction);

        let max_turns = self.config.agent.max_turns;
        let mut turn = 0;

        let outcome = loop {
            if turn >= max_turns {
                warn!("Turn budget of {} exhausted", max_turns);
                break RunOutcome::Aborted;
            }
            turn += 1;
            let turn_start = Instant::now();

            self.transition(AgentState::AwaitingModel);
            let response = match self.query_model(turn).await {
                Ok(response) => {
                    self.consecutive_backend_failures = 0;
                    response
                }
                Err(e) => {
                    self.consecutive_backend_failures += 1;
                    self.record_backend_failure(turn, &e);
                    self.turn_metrics.push(TurnMetrics {
                        turn_number: turn,
                        tokens_used: 0,
                        tool_calls: 0,
                        wall_clock_time: turn_start.elapsed(),
                    });

                    let limit = self.config.agent.max_consecutive_backend_failures;
                    if self.consecutive_backend_failures >= limit {
                        error!("Giving up after {} consecutive backend failures", limit);
                        self.finish(
                            AgentState::Aborted,
                            TerminationReason::BackendFailure,
                            Some(e.to_string()),
                        );
                        anyhow::bail!(
                            "model backend failed {} turns in a row; last error: {}",
                            limit,
                            e
                        );
                    }
                    continue;
                }
            };

            let content = response.content;
            self.history
                .append_text(EntryKind::LlmResponse, content.clone());
            self.ui_writer.print_agent_response(&content);

            self.transition(AgentState::ParsingResponse);
            let parsed = parse_response(&content);
            let call_count = parsed.tool_calls.len();

            if call_count > 0 {
                self.transition(AgentState::DispatchingTool);
                for call in parsed.tool_calls {
                    match call {
                        ParsedToolCall::Valid(tool_call) => {
                            self.dispatch_and_record(tool_call).await;
                        }
                        ParsedToolCall::Malformed { raw, reason } => {
                            self.record_malformed_call(raw, reason);
                        }
                    }
                    self.maybe_compress();
                }
            } else if parsed.termination.is_none() {
                debug!("Turn {} produced neither tool calls nor termination", turn);
            }

            self.turn_metrics.push(TurnMetrics {
                turn_number: turn,
                tokens_used: response.usage.total_tokens,
                tool_calls: call_count,
                wall_clock_time: turn_start.elapsed(),
            });

            if let Some(marker) = parsed.termination {
                info!("Model terminated the run after {} turns", turn);
                break RunOutcome::Terminated {
                    reason: marker.reason,
                };
            }
        };

        match &outcome {
            RunOutcome::Terminated { reason } => {
                self.finish(AgentState::Terminated, TerminationReason::Explicit, reason.clone())
            }
            RunOutcome::Aborted => self.finish(
                AgentState::Aborted,
                TerminationReason::TurnBudgetExhausted,
                Some(format!("turn budget of {} exhausted", max_turns)),
            ),
        }

        Ok(RunResult {
            outcome,
            turns: turn,
            history: self.history.clone(),
            tool_call_metrics: self.tool_call_metrics.clone(),
            turn_metrics: self.turn_metrics.clone(),
            elapsed: run_start.elapsed(),
        })
    }

    /// One backend call with timeout, bounded retries and backoff.
    ///
    /// A context overflow compresses history and retries with the smaller
    /// conversation.
    async fn query_model(&mut self, turn: usize) -> Result<CompletionResponse, LoopError> {
        let timeout = Duration::from_secs(self.config.agent.backend_timeout_secs);
        let max_retries = self.config.agent.max_retry_attempts;
        let base_delay = Duration::from_millis(self.config.agent.retry_base_delay_ms);
        let max_delay = Duration::from_millis(self.config.agent.retry_max_delay_ms);

        let messages = self.history.to_messages();
        let payload_bytes: usize = messages.iter().map(|m| m.content.len()).sum();
        self.history.append_text(
            EntryKind::LlmQuery,
            format!(
                "turn {}: {} messages, {} bytes",
                turn,
                messages.len(),
                payload_bytes
            ),
        );

        let mut messages = messages;
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let request = CompletionRequest {
                messages: messages.clone(),
                max_tokens: None,
                temperature: None,
            };

            let err = match tokio::time::timeout(timeout, self.provider.complete(request)).await {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(e)) => LoopError::BackendError(format!("{:#}", e)),
                Err(_) => LoopError::BackendTimeout(timeout),
            };

            let (retryable, shrink) = match &err {
                LoopError::BackendTimeout(_) => (true, false),
                LoopError::BackendError(msg) => {
                    let class = classify_message(msg);
                    (class.is_retryable(), class.needs_smaller_context())
                }
                LoopError::MalformedToolCall(_) => (false, false),
            };

            if attempt > max_retries || !(retryable || shrink) {
                warn!("Backend call failed on attempt {}: {}", attempt, err);
                return Err(err);
            }

            if shrink {
                let report = self.history.compress(&self.compression);
                if report.entries_compressed == 0 {
                    warn!("Context too large and nothing left to compress: {}", err);
                    return Err(err);
                }
                self.ui_writer.print_context_thinning(&report);
                messages = self.history.to_messages();
                continue;
            }

            let delay = calculate_retry_delay(attempt, base_delay, max_delay);
            warn!(
                "Backend call failed (attempt {}/{}), retrying in {:?}: {}",
                attempt,
                max_retries + 1,
                delay,
                err
            );
            self.ui_writer.print_context_status(&format!(
                "Model backend error, retrying in {:.1}s ({}/{})",
                delay.as_secs_f64(),
                attempt,
                max_retries
            ));
            tokio::time::sleep(delay).await;
        }
    }

    async fn dispatch_and_record(&mut self, tool_call: ToolCall) {
        self.ui_writer
            .print_tool_header(&tool_call.tool, &tool_call.args);
        self.history.append_tool_call(tool_call.clone());

        let result = self.dispatch(&tool_call).await;
        if !result.is_success() {
            if let Some(failure) = result.error() {
                debug!("{} failed: {}", tool_call.tool, failure);
            }
        }

        self.ui_writer.print_tool_result(&result);
        self.history.append_tool_result(result);
    }

    fn record_malformed_call(&mut self, raw: String, reason: String) {
        warn!("Malformed tool call: {}", reason);
        let request = ToolCall {
            tool: INVALID_TOOL.to_string(),
            args: json!({ "raw": raw }),
        };
        let failure = LoopError::MalformedToolCall(reason).to_failure();
        let result = ToolCallResult::failure(request, failure);
        self.tool_call_metrics
            .push((INVALID_TOOL.to_string(), Duration::ZERO, false));
        self.ui_writer.print_tool_result(&result);
        self.history.append_tool_result(result);
    }

    fn record_backend_failure(&mut self, turn: usize, err: &LoopError) {
        let failure = err.to_failure();
        self.ui_writer.print_backend_error(&failure);
        let request = ToolCall {
            tool: MODEL_QUERY_TOOL.to_string(),
            args: json!({ "turn": turn }),
        };
        self.history
            .append_tool_result(ToolCallResult::failure(request, failure));
    }

    fn maybe_compress(&mut self) {
        if let Some(report) = self.history.maybe_compress(&self.compression) {
            self.ui_writer.print_context_thinning(&report);
        }
    }

    /// Enter a final state, record why, and persist the transcript.
    fn finish(&mut self, state: AgentState, reason: TerminationReason, detail: Option<String>) {
        self.transition(state);
        self.history.append_termination(reason, detail);
        self.ui_writer
            .print_context_status(&format!("Run finished: {:?}", reason));

        if self.config.history.save_transcript {
            let path = paths::history_path(&self.working_dir);
            if let Err(e) = self.history.save(&path) {
                warn!("Failed to save history to {}: {}", path.display(), e);
            }
        }
        self.ui_writer.flush();
    }
}
