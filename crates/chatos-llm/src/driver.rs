//! The LLM driver: one HTTP (or `SUBAGENT_LLM_CMD`-substituted) call with
//! retry/backoff, streaming accumulation, and event emission (§4.6).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chatos_config::ModelConfig;
use chatos_core::retry::{AttemptError, RetryDecision, RetryPolicy};
use chatos_process::{CommandSpec, Exec, ProcessError, RunOptions, SpawnContext};
use futures::StreamExt;
use reqwest::Client;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{LlmError, LlmResult};
use crate::events::{AiEvent, AiEventSink, truncate_for_event};
use crate::types::{LlmResponse, LlmToolDefinition, Message, MessageContent, ToolCall};

/// How many characters of a request/response payload are kept in emitted
/// events before truncation (§4.6).
const EVENT_TRUNCATE_CHARS: usize = 4000;

/// One call's request parameters, independent of how many times it is
/// retried.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// The conversation so far, oldest first.
    pub messages: Vec<Message>,
    /// Tools the model may call this turn.
    pub tools: Vec<LlmToolDefinition>,
    /// Wall-clock budget for the whole call (including retries), in
    /// milliseconds. `None` means unbounded.
    pub timeout_ms: Option<u64>,
    /// Output byte cap; exceeding it truncates and stops the stream.
    pub max_output_bytes: Option<u64>,
    /// Retry budget; `None` uses [`RetryPolicy::default`].
    pub max_retries: Option<u32>,
}

/// Drives one LLM turn against a configured model, retrying transient
/// failures and emitting [`AiEvent`]s for observability (§4.6).
pub struct LlmDriver {
    model: ModelConfig,
    client: Client,
    sink: Option<Arc<dyn AiEventSink>>,
    cancel: CancellationToken,
}

impl LlmDriver {
    /// Build a driver for `model`. `sink` receives lifecycle events;
    /// `cancel` aborts the in-flight attempt immediately when triggered
    /// (§4.6 "Cancellation").
    #[must_use]
    pub fn new(model: ModelConfig, sink: Option<Arc<dyn AiEventSink>>, cancel: CancellationToken) -> Self {
        Self {
            model,
            client: Client::new(),
            sink,
            cancel,
        }
    }

    async fn emit(&self, event: AiEvent) {
        if let Some(sink) = &self.sink {
            match &event {
                AiEvent::Request { payload } => debug!(payload = %payload, "ai_request"),
                AiEvent::Response { payload } => debug!(payload = %payload, "ai_response"),
                AiEvent::Error { message } => warn!(message, "ai_error"),
                AiEvent::Retry {
                    attempt,
                    delay_ms,
                    message,
                } => warn!(attempt, delay_ms, message, "ai_retry"),
            }
            sink.on_event(event).await;
        }
    }

    /// Run one LLM turn, retrying per §4.6's policy until success, abort, or
    /// retry-budget exhaustion.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Aborted`] if `cancel` fired, [`LlmError::TimedOut`]
    /// if `request.timeout_ms` elapsed, or [`LlmError::RetriesExhausted`]
    /// once the retry budget is spent.
    pub async fn complete(&self, request: &LlmRequest) -> LlmResult<LlmResponse> {
        let budget = request
            .timeout_ms
            .filter(|&ms| ms > 0)
            .map(Duration::from_millis);
        let call = self.complete_inner(request);
        match budget {
            None => call.await,
            Some(budget) => match tokio::time::timeout(budget, call).await {
                Ok(result) => result,
                Err(_) => Err(LlmError::TimedOut),
            },
        }
    }

    async fn complete_inner(&self, request: &LlmRequest) -> LlmResult<LlmResponse> {
        if let Ok(cmd) = std::env::var("SUBAGENT_LLM_CMD") {
            if !cmd.trim().is_empty() {
                return self.complete_via_command(&cmd, request).await;
            }
        }

        let policy = RetryPolicy::new(request.max_retries.unwrap_or(5));
        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            if self.cancel.is_cancelled() {
                self.emit(AiEvent::Error {
                    message: "aborted".to_string(),
                })
                .await;
                return Err(LlmError::Aborted);
            }

            let outcome = self.attempt_once(request).await;
            match outcome {
                Ok(response) => return Ok(response),
                Err(attempt_err) => {
                    let aborted = self.cancel.is_cancelled();
                    match policy.decide(&attempt_err_for_retry(&attempt_err), attempt, aborted) {
                        RetryDecision::Retry { delay_ms } => {
                            self.emit(AiEvent::Retry {
                                attempt,
                                delay_ms,
                                message: attempt_err.to_string(),
                            })
                            .await;
                            tokio::select! {
                                () = tokio::time::sleep(Duration::from_millis(delay_ms)) => {}
                                () = self.cancel.cancelled() => {
                                    return Err(LlmError::Aborted);
                                }
                            }
                        }
                        RetryDecision::Fail => {
                            if aborted {
                                self.emit(AiEvent::Error {
                                    message: "aborted".to_string(),
                                })
                                .await;
                                return Err(LlmError::Aborted);
                            }
                            self.emit(AiEvent::Error {
                                message: attempt_err.to_string(),
                            })
                            .await;
                            return Err(LlmError::RetriesExhausted(attempt_err.to_string()));
                        }
                    }
                }
            }
        }
    }

    async fn attempt_once(&self, request: &LlmRequest) -> Result<LlmResponse, AttemptFailure> {
        let body = self.build_body(request);
        self.emit(AiEvent::Request {
            payload: redact_request(&body),
        })
        .await;

        let url = if self.model.responses_enabled {
            format!("{}/responses", self.model.base_url)
        } else {
            format!("{}/chat/completions", self.model.base_url)
        };

        let response = tokio::select! {
            result = self.client
                .post(&url)
                .bearer_auth(&self.model.api_key)
                .json(&body)
                .send() => result.map_err(|e| AttemptFailure::transport(e.to_string()))?,
            () = self.cancel.cancelled() => return Err(AttemptFailure::Aborted),
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AttemptFailure::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let parsed = if self.model.responses_enabled {
            self.stream_responses(response, request.max_output_bytes).await?
        } else {
            self.stream_chat_completions(response, request.max_output_bytes).await?
        };

        self.emit(AiEvent::Response {
            payload: json!({
                "text": truncate_for_event(&parsed.text, EVENT_TRUNCATE_CHARS),
                "toolCalls": parsed.tool_calls.len(),
                "truncated": parsed.truncated,
            }),
        })
        .await;

        Ok(parsed)
    }

    fn build_body(&self, request: &LlmRequest) -> Value {
        let messages: Vec<Value> = request.messages.iter().map(message_to_json).collect();
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect();

        let mut body = json!({
            "model": self.model.model,
            "messages": messages,
            "stream": true,
        });
        if self.model.responses_enabled {
            body["input"] = body["messages"].clone();
        }
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools);
        }
        if self.model.reasoning_enabled && self.model.is_moonshot_like() {
            body["thinking"] = json!({"type": "enabled"});
        }
        body
    }

    async fn stream_chat_completions(
        &self,
        response: reqwest::Response,
        max_output_bytes: Option<u64>,
    ) -> Result<LlmResponse, AttemptFailure> {
        let cap = max_output_bytes.filter(|&b| b > 0);
        let mut text = String::new();
        let mut truncated = false;
        let mut tool_calls: HashMap<usize, PartialToolCall> = HashMap::new();
        let mut order: Vec<usize> = Vec::new();

        let mut lines = sse_lines(response);
        while let Some(line) = lines.next().await {
            let line = line.map_err(|e| AttemptFailure::transport(e.to_string()))?;
            let Some(data) = line.strip_prefix("data: ") else {
                continue;
            };
            if data == "[DONE]" {
                break;
            }
            let chunk: Value = serde_json::from_str(data)
                .map_err(|e| AttemptFailure::Invalid(format!("bad chunk json: {e}")))?;
            let Some(choice) = chunk["choices"].get(0) else {
                continue;
            };
            let delta = &choice["delta"];
            if let Some(piece) = delta["content"].as_str() {
                if let Some(cap) = cap {
                    let remaining = (cap as usize).saturating_sub(text.len());
                    if remaining == 0 {
                        truncated = true;
                        break;
                    }
                    let take = remaining.min(piece.len());
                    text.push_str(&piece[..take]);
                    if take < piece.len() {
                        truncated = true;
                        break;
                    }
                } else {
                    text.push_str(piece);
                }
            }
            if let Some(calls) = delta["tool_calls"].as_array() {
                for call in calls {
                    let Some(index) = call["index"].as_u64().map(|i| i as usize) else {
                        continue;
                    };
                    let entry = tool_calls.entry(index).or_insert_with(|| {
                        order.push(index);
                        PartialToolCall::default()
                    });
                    if let Some(id) = call["id"].as_str() {
                        entry.id = id.to_string();
                    }
                    if let Some(name) = call["function"]["name"].as_str() {
                        entry.name.push_str(name);
                    }
                    if let Some(args) = call["function"]["arguments"].as_str() {
                        entry.arguments.push_str(args);
                    }
                }
            }
        }

        let tool_calls = order
            .into_iter()
            .filter_map(|i| tool_calls.remove(&i))
            .map(PartialToolCall::into_tool_call)
            .collect();

        Ok(LlmResponse {
            text,
            tool_calls,
            truncated,
        })
    }

    async fn stream_responses(
        &self,
        response: reqwest::Response,
        max_output_bytes: Option<u64>,
    ) -> Result<LlmResponse, AttemptFailure> {
        let cap = max_output_bytes.filter(|&b| b > 0);
        let mut text = String::new();
        let mut truncated = false;
        let mut final_event: Option<Value> = None;

        let mut lines = sse_lines(response);
        while let Some(line) = lines.next().await {
            let line = line.map_err(|e| AttemptFailure::transport(e.to_string()))?;
            let Some(data) = line.strip_prefix("data: ") else {
                continue;
            };
            if data == "[DONE]" {
                break;
            }
            let event: Value = serde_json::from_str(data)
                .map_err(|e| AttemptFailure::Invalid(format!("bad event json: {e}")))?;
            let kind = event["type"].as_str().unwrap_or_default();
            if kind == "response.output_text.delta" {
                if let Some(piece) = event["delta"].as_str() {
                    if let Some(cap) = cap {
                        let remaining = (cap as usize).saturating_sub(text.len());
                        if remaining == 0 {
                            truncated = true;
                            break;
                        }
                        let take = remaining.min(piece.len());
                        text.push_str(&piece[..take]);
                        if take < piece.len() {
                            truncated = true;
                            break;
                        }
                    } else {
                        text.push_str(piece);
                    }
                }
            } else if kind == "response.completed" {
                final_event = Some(event);
            }
        }

        let mut tool_calls = Vec::new();
        if text.is_empty() {
            if let Some(final_event) = &final_event {
                if let Some(items) = final_event["response"]["output"].as_array() {
                    for item in items {
                        if item["type"] == "message" {
                            if let Some(parts) = item["content"].as_array() {
                                for part in parts {
                                    if let Some(piece) = part["text"].as_str() {
                                        text.push_str(piece);
                                    }
                                }
                            }
                        } else if item["type"] == "function_call" {
                            tool_calls.push(ToolCall {
                                id: item["call_id"]
                                    .as_str()
                                    .or_else(|| item["id"].as_str())
                                    .unwrap_or_default()
                                    .to_string(),
                                name: item["name"].as_str().unwrap_or_default().to_string(),
                                arguments: item["arguments"].as_str().unwrap_or("{}").to_string(),
                            });
                        }
                    }
                }
            }
        }

        Ok(LlmResponse {
            text,
            tool_calls,
            truncated,
        })
    }

    /// `SUBAGENT_LLM_CMD` override (§4.6, §6): spawn `cmd` via the process
    /// runner, writing the rendered prompt to stdin and treating the full
    /// stdout as the answer.
    async fn complete_via_command(&self, cmd: &str, request: &LlmRequest) -> LlmResult<LlmResponse> {
        let prompt = render_prompt(&request.messages);
        self.emit(AiEvent::Request {
            payload: json!({"command": cmd, "prompt": truncate_for_event(&prompt, EVENT_TRUNCATE_CHARS)}),
        })
        .await;

        let spec = CommandSpec {
            exec: Exec::Shell(cmd.to_string()).into_argv(),
            cwd: None,
            env: HashMap::new(),
        };
        let opts = RunOptions {
            timeout_ms: request.timeout_ms,
            max_output_bytes: request.max_output_bytes,
        };
        let handle = chatos_process::spawn_with_input(&spec, &SpawnContext::default(), &opts, prompt.into_bytes())
            .await
            .map_err(command_to_llm_error)?;
        let result = handle.wait().await.map_err(command_to_llm_error)?;

        if !result.success() {
            let message = if result.timed_out {
                "timed out".to_string()
            } else {
                result
                    .error
                    .unwrap_or_else(|| format!("exit code {:?}", result.exit_code))
            };
            self.emit(AiEvent::Error {
                message: message.clone(),
            })
            .await;
            return Err(LlmError::Transport(message));
        }

        let response = LlmResponse {
            text: result.stdout,
            tool_calls: Vec::new(),
            truncated: result.stdout_truncated,
        };
        self.emit(AiEvent::Response {
            payload: json!({
                "text": truncate_for_event(&response.text, EVENT_TRUNCATE_CHARS),
                "toolCalls": 0,
                "truncated": response.truncated,
            }),
        })
        .await;
        Ok(response)
    }
}

fn command_to_llm_error(e: ProcessError) -> LlmError {
    LlmError::Command(e)
}

fn render_prompt(messages: &[Message]) -> String {
    let mut out = String::new();
    for message in messages {
        let role = match message.role {
            crate::types::MessageRole::System => "system",
            crate::types::MessageRole::User => "user",
            crate::types::MessageRole::Assistant => "assistant",
            crate::types::MessageRole::Tool => "tool",
        };
        out.push_str(role);
        out.push_str(": ");
        match &message.content {
            MessageContent::Text(text) => out.push_str(text),
            MessageContent::ToolCalls { text, .. } => out.push_str(text),
            MessageContent::ToolResult { content, .. } => out.push_str(content),
        }
        out.push('\n');
    }
    out
}

fn message_to_json(message: &Message) -> Value {
    let role = match message.role {
        crate::types::MessageRole::System => "system",
        crate::types::MessageRole::User => "user",
        crate::types::MessageRole::Assistant => "assistant",
        crate::types::MessageRole::Tool => "tool",
    };
    match &message.content {
        MessageContent::Text(text) => json!({"role": role, "content": text}),
        MessageContent::ToolCalls { text, calls } => json!({
            "role": role,
            "content": text,
            "tool_calls": calls.iter().map(|c| json!({
                "id": c.id,
                "type": "function",
                "function": {"name": c.name, "arguments": c.arguments},
            })).collect::<Vec<_>>(),
        }),
        MessageContent::ToolResult {
            tool_call_id,
            content,
        } => json!({"role": role, "tool_call_id": tool_call_id, "content": content}),
    }
}

/// Drop the `Authorization`-bearing fields before an event payload is
/// persisted; the body itself carries no secret beyond the header, which
/// `reqwest` attaches out of band, so this is currently a pass-through kept
/// for symmetry with future fields that might.
fn redact_request(body: &Value) -> Value {
    body.clone()
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl PartialToolCall {
    fn into_tool_call(self) -> ToolCall {
        ToolCall {
            id: self.id,
            name: self.name,
            arguments: self.arguments,
        }
    }
}

#[derive(Debug, Clone)]
enum AttemptFailure {
    Transport(String),
    Api { status: u16, message: String },
    Invalid(String),
    Aborted,
}

impl AttemptFailure {
    fn transport(message: String) -> Self {
        Self::Transport(message)
    }
}

impl std::fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptFailure::Transport(m) => write!(f, "transport error: {m}"),
            AttemptFailure::Api { status, message } => write!(f, "api error ({status}): {message}"),
            AttemptFailure::Invalid(m) => write!(f, "invalid response: {m}"),
            AttemptFailure::Aborted => write!(f, "aborted"),
        }
    }
}

fn attempt_err_for_retry(failure: &AttemptFailure) -> AttemptError {
    match failure {
        AttemptFailure::Transport(m) => AttemptError::new(m.clone(), None),
        AttemptFailure::Api { status, message } => AttemptError::new(message.clone(), Some(*status)),
        AttemptFailure::Invalid(m) => AttemptError::new(m.clone(), None),
        AttemptFailure::Aborted => AttemptError::new("aborted", None),
    }
}

/// Split a streamed response body into newline-delimited SSE lines, each
/// `Ok(String)` line already stripped of its trailing `\n`/`\r\n`.
fn sse_lines(response: reqwest::Response) -> impl futures::Stream<Item = Result<String, AttemptFailure>> {
    let byte_stream = response.bytes_stream();
    async_stream::stream! {
        let mut buf = Vec::new();
        tokio::pin!(byte_stream);
        while let Some(chunk) = byte_stream.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    yield Err(AttemptFailure::transport(e.to_string()));
                    return;
                }
            };
            buf.extend_from_slice(&chunk);
            while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);
                let line = line.trim_end_matches(['\r', '\n']);
                if !line.is_empty() {
                    yield Ok(line.to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn model(responses_enabled: bool) -> ModelConfig {
        ModelConfig {
            id: "m1".into(),
            name: "test".into(),
            api_key: "key".into(),
            base_url: "http://127.0.0.1:0/v1".into(),
            model: "gpt-test".into(),
            reasoning_enabled: false,
            responses_enabled,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn build_body_includes_tools_and_messages() {
        let driver = LlmDriver::new(model(false), None, CancellationToken::new());
        let request = LlmRequest {
            messages: vec![Message::system("be terse"), Message::user("hi")],
            tools: vec![LlmToolDefinition {
                name: "echo".into(),
                description: "echoes".into(),
                parameters: json!({"type": "object"}),
            }],
            timeout_ms: None,
            max_output_bytes: None,
            max_retries: None,
        };
        let body = driver.build_body(&request);
        assert_eq!(body["model"], "gpt-test");
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
        assert_eq!(body["tools"][0]["function"]["name"], "echo");
        assert!(body.get("thinking").is_none());
    }

    #[test]
    fn build_body_injects_thinking_for_moonshot_like_models() {
        let mut cfg = model(false);
        cfg.base_url = "https://api.moonshot.cn/v1".into();
        cfg.reasoning_enabled = true;
        let driver = LlmDriver::new(cfg, None, CancellationToken::new());
        let request = LlmRequest {
            messages: vec![Message::user("hi")],
            tools: vec![],
            timeout_ms: None,
            max_output_bytes: None,
            max_retries: None,
        };
        let body = driver.build_body(&request);
        assert_eq!(body["thinking"]["type"], "enabled");
    }

    #[tokio::test]
    async fn abort_before_attempt_returns_aborted() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let driver = LlmDriver::new(model(false), None, cancel);
        let request = LlmRequest {
            messages: vec![Message::user("hi")],
            tools: vec![],
            timeout_ms: None,
            max_output_bytes: None,
            max_retries: Some(3),
        };
        let err = driver.complete(&request).await.unwrap_err();
        assert!(matches!(err, LlmError::Aborted));
    }

    #[allow(unsafe_code)]
    #[tokio::test]
    async fn llm_cmd_override_runs_process_and_captures_stdout() {
        // SAFETY: test-local env var, no concurrent readers of this key in
        // this process's test binary.
        unsafe {
            std::env::set_var("SUBAGENT_LLM_CMD", "/bin/cat");
        }
        let driver = LlmDriver::new(model(false), None, CancellationToken::new());
        let request = LlmRequest {
            messages: vec![Message::user("echo me back")],
            tools: vec![],
            timeout_ms: Some(5000),
            max_output_bytes: None,
            max_retries: None,
        };
        let response = driver.complete(&request).await.unwrap();
        assert!(response.text.contains("echo me back"));
        unsafe {
            std::env::remove_var("SUBAGENT_LLM_CMD");
        }
    }
}
