//! The multi-turn LLM/tool-calling loop itself (§4.7).

use std::sync::Arc;
use std::time::Duration;

use chatos_llm::{LlmRequest, LlmToolDefinition, Message, MessageContent, MessageRole};
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::events::{ToolLoopEvent, ToolLoopEventSink};
use crate::invoker::ToolInvoker;
use crate::turn::LlmTurn;

/// Default turn budget when a run doesn't override it (§4.7).
pub const DEFAULT_MAX_TURNS: u32 = 100;

/// Parameters for one tool-call loop run.
pub struct ToolLoopRequest {
    /// The system prompt.
    pub system_prompt: String,
    /// The user's task message.
    pub user_message: String,
    /// Tools the model may call this run.
    pub tools: Vec<LlmToolDefinition>,
    /// Turn budget; `None` uses [`DEFAULT_MAX_TURNS`].
    pub max_turns: Option<u32>,
    /// Output byte cap passed through to every completion call.
    pub max_output_bytes: Option<u64>,
    /// Wall-clock budget for the whole run (all turns combined), in
    /// milliseconds. Also passed as the per-call timeout, so a single
    /// hung call cannot outlast the run's own budget.
    pub timeout_ms: Option<u64>,
    /// Retry budget passed through to every turn's `LlmRequest`; `None`
    /// uses `RetryPolicy::default` (§4.6).
    pub max_retries: Option<u32>,
}

/// Why a run ended without ever producing a textual answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `maxTurns` was exhausted without a final answer.
    MaxTurnsExceeded,
    /// The external cancellation token fired.
    Cancelled,
    /// The run's wall-clock budget elapsed.
    TimedOut,
    /// The underlying LLM call failed (after its own retries).
    LlmError,
}

/// The result of running a tool-call loop to completion.
#[derive(Debug, Clone)]
pub struct ToolLoopOutcome {
    /// The final textual answer, if one was produced.
    pub text: Option<String>,
    /// Set if the final answer was cut short by the output-byte cap.
    pub truncated: bool,
    /// Number of turns actually used.
    pub turns_used: u32,
    /// Set when the loop ended via [`ToolLoopOutcome::text`] being `None`.
    pub stop_reason: Option<StopReason>,
}

/// Drives one multi-turn LLM/tool-calling conversation to a final answer or
/// a [`StopReason`] (§4.7).
pub struct ToolLoop<'a> {
    llm: &'a dyn LlmTurn,
    invoker: &'a dyn ToolInvoker,
    sink: Option<Arc<dyn ToolLoopEventSink>>,
    cancel: CancellationToken,
}

impl<'a> ToolLoop<'a> {
    /// Build a loop over `llm` dispatching tool calls through `invoker`.
    /// `sink` receives lifecycle events; `cancel` stops the loop at the next
    /// turn boundary (or between a tool call and the next).
    #[must_use]
    pub fn new(
        llm: &'a dyn LlmTurn,
        invoker: &'a dyn ToolInvoker,
        sink: Option<Arc<dyn ToolLoopEventSink>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            llm,
            invoker,
            sink,
            cancel,
        }
    }

    async fn emit(&self, event: ToolLoopEvent) {
        if let Some(sink) = &self.sink {
            sink.on_event(event).await;
        }
    }

    fn stopped(turns_used: u32, reason: StopReason) -> ToolLoopOutcome {
        ToolLoopOutcome {
            text: None,
            truncated: false,
            turns_used,
            stop_reason: Some(reason),
        }
    }

    /// Run the loop to completion (§4.7 steps 1-3; termination conditions:
    /// no tool calls, `maxTurns` exhausted, cancellation, or timeout).
    pub async fn run(&self, request: &ToolLoopRequest) -> ToolLoopOutcome {
        let max_turns = request.max_turns.unwrap_or(DEFAULT_MAX_TURNS);
        let deadline = request.timeout_ms.map(|ms| Instant::now() + Duration::from_millis(ms));

        let mut messages = vec![
            Message::system(request.system_prompt.clone()),
            Message::user(request.user_message.clone()),
        ];

        let mut turn: u32 = 0;
        loop {
            if self.cancel.is_cancelled() {
                self.emit(ToolLoopEvent::FinishError { reason: "cancelled".to_string() }).await;
                return Self::stopped(turn, StopReason::Cancelled);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                self.emit(ToolLoopEvent::FinishError { reason: "timeout".to_string() }).await;
                return Self::stopped(turn, StopReason::TimedOut);
            }
            if turn >= max_turns {
                self.emit(ToolLoopEvent::FinishError { reason: "max_turns_exceeded".to_string() }).await;
                return Self::stopped(turn, StopReason::MaxTurnsExceeded);
            }
            turn = turn.saturating_add(1);

            let llm_request = LlmRequest {
                messages: messages.clone(),
                tools: request.tools.clone(),
                timeout_ms: request.timeout_ms,
                max_output_bytes: request.max_output_bytes,
                max_retries: request.max_retries,
            };

            let response = match self.llm.complete(&llm_request).await {
                Ok(response) => response,
                Err(e) => {
                    debug!(error = %e, turn, "tool loop: llm call failed");
                    self.emit(ToolLoopEvent::FinishError { reason: format!("llm_error: {e}") }).await;
                    return Self::stopped(turn, StopReason::LlmError);
                }
            };

            if response.tool_calls.is_empty() {
                return ToolLoopOutcome {
                    text: Some(response.text),
                    truncated: response.truncated,
                    turns_used: turn,
                    stop_reason: None,
                };
            }

            messages.push(Message {
                role: MessageRole::Assistant,
                content: MessageContent::ToolCalls {
                    text: response.text.clone(),
                    calls: response.tool_calls.clone(),
                },
            });

            for call in &response.tool_calls {
                self.emit(ToolLoopEvent::ToolCall {
                    turn,
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                })
                .await;

                let result = match serde_json::from_str::<Value>(&call.arguments) {
                    Ok(args) => self.invoker.invoke(&call.name, args).await,
                    Err(e) => serde_json::json!({
                        "ok": false,
                        "error": format!("invalid tool arguments: {e}"),
                    })
                    .to_string(),
                };

                self.emit(ToolLoopEvent::ToolResult {
                    turn,
                    name: call.name.clone(),
                    result: result.clone(),
                })
                .await;
                messages.push(Message::tool_result(call.id.clone(), result));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chatos_llm::{LlmError, ToolCall};
    use std::sync::Mutex;

    struct ScriptedLlm {
        responses: Mutex<Vec<LlmResponseFixture>>,
    }

    enum LlmResponseFixture {
        ToolCall(ToolCall),
        Text(&'static str),
    }

    #[async_trait]
    impl LlmTurn for ScriptedLlm {
        async fn complete(&self, _request: &LlmRequest) -> chatos_llm::LlmResult<chatos_llm::LlmResponse> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(LlmError::InvalidResponse("script exhausted".to_string()));
            }
            match responses.remove(0) {
                LlmResponseFixture::ToolCall(call) => Ok(chatos_llm::LlmResponse {
                    text: String::new(),
                    tool_calls: vec![call],
                    truncated: false,
                }),
                LlmResponseFixture::Text(text) => Ok(chatos_llm::LlmResponse {
                    text: text.to_string(),
                    tool_calls: vec![],
                    truncated: false,
                }),
            }
        }
    }

    struct EchoInvoker;

    #[async_trait]
    impl ToolInvoker for EchoInvoker {
        async fn invoke(&self, name: &str, args: Value) -> String {
            serde_json::json!({"ok": true, "tool": name, "echo": args}).to_string()
        }
    }

    struct RecordingSink {
        events: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ToolLoopEventSink for RecordingSink {
        async fn on_event(&self, event: ToolLoopEvent) {
            let label = match event {
                ToolLoopEvent::ToolCall { name, .. } => format!("tool_call:{name}"),
                ToolLoopEvent::ToolResult { name, .. } => format!("tool_result:{name}"),
                ToolLoopEvent::FinishError { reason } => format!("finish_error:{reason}"),
            };
            self.events.lock().unwrap().push(label);
        }
    }

    fn base_request() -> ToolLoopRequest {
        ToolLoopRequest {
            system_prompt: "be helpful".to_string(),
            user_message: "do the thing".to_string(),
            tools: vec![],
            max_turns: None,
            max_output_bytes: None,
            timeout_ms: None,
            max_retries: None,
        }
    }

    #[tokio::test]
    async fn no_tool_calls_returns_final_answer_immediately() {
        let llm = ScriptedLlm {
            responses: Mutex::new(vec![LlmResponseFixture::Text("all done")]),
        };
        let invoker = EchoInvoker;
        let tool_loop = ToolLoop::new(&llm, &invoker, None, CancellationToken::new());
        let outcome = tool_loop.run(&base_request()).await;
        assert_eq!(outcome.text.as_deref(), Some("all done"));
        assert_eq!(outcome.turns_used, 1);
        assert!(outcome.stop_reason.is_none());
    }

    #[tokio::test]
    async fn tool_call_then_answer_invokes_and_records_events() {
        let call = ToolCall {
            id: "call-1".to_string(),
            name: "search".to_string(),
            arguments: "{\"q\":\"rust\"}".to_string(),
        };
        let llm = ScriptedLlm {
            responses: Mutex::new(vec![LlmResponseFixture::ToolCall(call), LlmResponseFixture::Text("found it")]),
        };
        let invoker = EchoInvoker;
        let sink = Arc::new(RecordingSink { events: Mutex::new(vec![]) });
        let tool_loop = ToolLoop::new(&llm, &invoker, Some(sink.clone()), CancellationToken::new());
        let outcome = tool_loop.run(&base_request()).await;
        assert_eq!(outcome.text.as_deref(), Some("found it"));
        assert_eq!(outcome.turns_used, 2);
        let events = sink.events.lock().unwrap();
        assert_eq!(*events, vec!["tool_call:search".to_string(), "tool_result:search".to_string()]);
    }

    #[tokio::test]
    async fn malformed_tool_arguments_synthesize_error_result_without_invoking() {
        let call = ToolCall {
            id: "call-1".to_string(),
            name: "search".to_string(),
            arguments: "not json".to_string(),
        };
        let llm = ScriptedLlm {
            responses: Mutex::new(vec![LlmResponseFixture::ToolCall(call), LlmResponseFixture::Text("recovered")]),
        };

        struct PanicIfCalled;
        #[async_trait]
        impl ToolInvoker for PanicIfCalled {
            async fn invoke(&self, _name: &str, _args: Value) -> String {
                panic!("invoke should not be called for malformed arguments");
            }
        }

        let invoker = PanicIfCalled;
        let tool_loop = ToolLoop::new(&llm, &invoker, None, CancellationToken::new());
        let outcome = tool_loop.run(&base_request()).await;
        assert_eq!(outcome.text.as_deref(), Some("recovered"));
    }

    #[tokio::test]
    async fn exhausting_max_turns_reports_stop_reason_without_answer() {
        let invoker = EchoInvoker;
        let sink = Arc::new(RecordingSink { events: Mutex::new(vec![]) });

        struct RepeatingLlm;
        #[async_trait]
        impl LlmTurn for RepeatingLlm {
            async fn complete(&self, _request: &LlmRequest) -> chatos_llm::LlmResult<chatos_llm::LlmResponse> {
                Ok(chatos_llm::LlmResponse {
                    text: String::new(),
                    tool_calls: vec![ToolCall {
                        id: "c1".to_string(),
                        name: "loopy".to_string(),
                        arguments: "{}".to_string(),
                    }],
                    truncated: false,
                })
            }
        }
        let repeating = RepeatingLlm;

        let request = ToolLoopRequest { max_turns: Some(2), ..base_request() };
        let tool_loop = ToolLoop::new(&repeating, &invoker, Some(sink.clone()), CancellationToken::new());
        let outcome = tool_loop.run(&request).await;
        assert!(outcome.text.is_none());
        assert_eq!(outcome.stop_reason, Some(StopReason::MaxTurnsExceeded));
        assert_eq!(outcome.turns_used, 2);
        assert!(sink.events.lock().unwrap().contains(&"finish_error:max_turns_exceeded".to_string()));
    }

    #[tokio::test]
    async fn cancellation_stops_loop_before_next_turn() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let llm = ScriptedLlm {
            responses: Mutex::new(vec![LlmResponseFixture::Text("should not be reached")]),
        };
        let invoker = EchoInvoker;
        let tool_loop = ToolLoop::new(&llm, &invoker, None, cancel);
        let outcome = tool_loop.run(&base_request()).await;
        assert!(outcome.text.is_none());
        assert_eq!(outcome.stop_reason, Some(StopReason::Cancelled));
        assert_eq!(outcome.turns_used, 0);
    }
}
