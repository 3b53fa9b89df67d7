//! Adapters forwarding `chatos-llm` and `chatos-toolloop` lifecycle events
//! into the durable job-event log (§4.6, §4.7, §4.9).
//!
//! Diagnostic persistence is gated on `--log-ai`; when disabled the sink is
//! still installed (so the driver's own `tracing` mirroring keeps firing,
//! §4.6) but `on_event` is a no-op beyond that.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Value, json};

use chatos_jobs::{JobEventKind, JobStore};
use chatos_llm::{AiEvent, AiEventSink, truncate_for_event};
use chatos_toolloop::{ToolLoopEvent, ToolLoopEventSink};

/// Forwards `ai_*` and `tool_*` lifecycle events for one job into the job
/// store, truncating oversized payloads and optionally mirroring them to a
/// per-job file for offline inspection.
pub struct JobEventSink {
    job_store: Arc<JobStore>,
    job_id: String,
    session_id: chatos_core::SessionId,
    run_id: chatos_core::RunId,
    enabled: bool,
    max_chars: usize,
    mirror_dir: Option<PathBuf>,
}

impl JobEventSink {
    #[must_use]
    pub fn new(
        job_store: Arc<JobStore>,
        job_id: impl Into<String>,
        session_id: chatos_core::SessionId,
        run_id: chatos_core::RunId,
        enabled: bool,
        max_chars: usize,
        mirror_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            job_store,
            job_id: job_id.into(),
            session_id,
            run_id,
            enabled,
            max_chars,
            mirror_dir,
        }
    }

    async fn record(&self, kind: JobEventKind, payload: Value) {
        if !self.enabled {
            return;
        }
        self.mirror(&kind, &payload);
        let _ = self
            .job_store
            .append_event(
                self.job_id.clone(),
                kind,
                Some(payload),
                self.session_id.clone(),
                self.run_id.clone(),
            )
            .await;
    }

    fn mirror(&self, kind: &JobEventKind, payload: &Value) {
        let Some(dir) = &self.mirror_dir else {
            return;
        };
        let path = dir.join(format!("{}.log", self.job_id));
        let line = json!({"kind": format!("{kind:?}"), "payload": payload}).to_string();
        if std::fs::create_dir_all(dir).is_ok() {
            use std::io::Write;
            if let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open(path) {
                let _ = writeln!(file, "{line}");
            }
        }
    }

    fn truncate(&self, s: &str) -> String {
        truncate_for_event(s, self.max_chars)
    }
}

#[async_trait::async_trait]
impl AiEventSink for JobEventSink {
    async fn on_event(&self, event: AiEvent) {
        match event {
            AiEvent::Request { payload } => {
                self.record(JobEventKind::AiRequest, truncate_value(&payload, self)).await;
            }
            AiEvent::Response { payload } => {
                self.record(JobEventKind::AiResponse, truncate_value(&payload, self)).await;
            }
            AiEvent::Error { message } => {
                self.record(JobEventKind::AiError, json!({"message": self.truncate(&message)})).await;
            }
            AiEvent::Retry { attempt, delay_ms, message } => {
                self.record(
                    JobEventKind::AiRetry,
                    json!({"attempt": attempt, "delay_ms": delay_ms, "message": self.truncate(&message)}),
                )
                .await;
            }
        }
    }
}

#[async_trait::async_trait]
impl ToolLoopEventSink for JobEventSink {
    async fn on_event(&self, event: ToolLoopEvent) {
        match event {
            ToolLoopEvent::ToolCall { turn, name, arguments } => {
                self.record(
                    JobEventKind::ToolCall,
                    json!({"turn": turn, "name": name, "arguments": self.truncate(&arguments)}),
                )
                .await;
            }
            ToolLoopEvent::ToolResult { turn, name, result } => {
                self.record(
                    JobEventKind::ToolResult,
                    json!({"turn": turn, "name": name, "result": self.truncate(&result)}),
                )
                .await;
            }
            ToolLoopEvent::FinishError { reason } => {
                self.record(JobEventKind::FinishError, json!({"reason": reason})).await;
            }
        }
    }
}

/// Re-cap an already-small payload (the driver truncates long text fields
/// itself before emitting) against the router's own `--log-ai-max-chars`
/// budget, falling back to a flat truncated string if the capped form no
/// longer round-trips as JSON.
fn truncate_value(payload: &Value, sink: &JobEventSink) -> Value {
    let rendered = serde_json::to_string(payload).unwrap_or_default();
    if rendered.chars().count() <= sink.max_chars {
        return payload.clone();
    }
    let capped = sink.truncate(&rendered);
    serde_json::from_str(&capped).unwrap_or(Value::String(capped))
}
